pub mod accounts;
pub mod alerts;
pub mod audit;
pub mod instances;
pub mod pagination;
