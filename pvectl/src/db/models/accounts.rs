//! Database models for accounts.

use crate::api::models::accounts::{AccountStatus, Role};
use crate::db::models::quotas::QuotaCreateDBRequest;
use crate::types::AccountId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new account.
///
/// Role and status are decided by the caller (the login upsert grants
/// admin/approved only to the very first account), never taken from user
/// input.
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    /// Quota row created in the same transaction as the account.
    pub quota: QuotaCreateDBRequest,
}

/// Database request for updating an account (admin actions only)
#[derive(Debug, Clone, Default)]
pub struct AccountUpdateDBRequest {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
}

/// Database response for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl AccountDBResponse {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
