pub mod accounts;
pub mod audit;
pub mod quotas;
pub mod repository;

pub use accounts::{AccountFilter, Accounts};
pub use audit::{AuditFilter, AuditRecords};
pub use quotas::Quotas;
pub use repository::Repository;
