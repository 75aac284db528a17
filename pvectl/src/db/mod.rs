//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL,
//! following the repository pattern: request handlers talk to repositories
//! ([`handlers`]), repositories map to record structures ([`models`]), and
//! records map to tables.
//!
//! # Transactions
//!
//! Repositories are constructed from a `&mut PgConnection`, so they work both
//! on pooled connections (read paths) and inside transactions (write paths).
//! Privileged mutations and their audit records share one transaction: if the
//! audit insert fails, the `?` propagates before `commit` and the mutation is
//! rolled back with it.
//!
//! # Migrations
//!
//! Migrations live in the crate-level `migrations/` directory and are run on
//! startup via [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
