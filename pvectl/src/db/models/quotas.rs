//! Database models for per-account quotas.

use crate::types::AccountId;
use sqlx::FromRow;

/// Database response for a quota row. One per account, created with it.
#[derive(Debug, Clone, FromRow)]
pub struct QuotaDBResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub max_vcpus: i64,
    pub max_ram_gb: i64,
    pub max_disk_gb: i64,
    /// Comma-separated bridge identifiers the account may attach to.
    pub allowed_networks: String,
}

/// Database request for the quota row created alongside a new account.
#[derive(Debug, Clone)]
pub struct QuotaCreateDBRequest {
    pub max_vcpus: i64,
    pub max_ram_gb: i64,
    pub max_disk_gb: i64,
    pub allowed_networks: String,
}

/// Database request for updating a quota. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct QuotaUpdateDBRequest {
    pub max_vcpus: Option<i64>,
    pub max_ram_gb: Option<i64>,
    pub max_disk_gb: Option<i64>,
    pub allowed_networks: Option<String>,
}
