//! API request/response models for accounts, quotas, and login.

use super::pagination::Pagination;
use crate::db::models::{accounts::AccountDBResponse, quotas::QuotaDBResponse};
use crate::types::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Account role. Admins bypass ownership and quota checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Account approval state. New accounts start pending and can only be moved
/// by an admin; pending and rejected accounts cannot touch resources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

// Account response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: AccountId,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    /// Quota ceilings (only included where the handler fetched them)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaResponse>,
}

impl From<AccountDBResponse> for AccountResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            picture: db.picture,
            role: db.role,
            status: db.status,
            created_at: db.created_at,
            last_login: db.last_login,
            quota: None,
        }
    }
}

impl AccountResponse {
    pub fn with_quota(mut self, quota: QuotaResponse) -> Self {
        self.quota = Some(quota);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaResponse {
    pub max_vcpus: i64,
    pub max_ram_gb: i64,
    pub max_disk_gb: i64,
    /// Bridge identifiers the account may attach instances to
    pub allowed_networks: Vec<String>,
}

impl From<QuotaDBResponse> for QuotaResponse {
    fn from(db: QuotaDBResponse) -> Self {
        Self {
            max_vcpus: db.max_vcpus,
            max_ram_gb: db.max_ram_gb,
            max_disk_gb: db.max_disk_gb,
            allowed_networks: db
                .allowed_networks
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Admin request to adjust an account's quota. `None` fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct QuotaUpdateRequest {
    pub max_vcpus: Option<i64>,
    pub max_ram_gb: Option<i64>,
    pub max_disk_gb: Option<i64>,
    pub allowed_networks: Option<Vec<String>>,
}

/// Admin request to change an account's role
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

/// Admin request to change an account's status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: AccountStatus,
}

/// Query parameters for listing accounts
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListAccountsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Login request carrying the external identity assertion (a Google ID token)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,
    pub account: AccountResponse,
}

/// Live consumption across both resource kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub vcpus: i64,
    pub ram_gb: f64,
    pub disk_gb: f64,
}

/// Usage plus the ceilings it is measured against
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaUsageResponse {
    pub usage: UsageResponse,
    pub limits: QuotaResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{account, quota};

    #[test]
    fn login_response_embeds_account_and_quota() {
        let response = LoginResponse {
            token: "jwt".to_string(),
            account: AccountResponse::from(account(1, Role::User, AccountStatus::Pending)).with_quota(quota(1, 8, 16, 200).into()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token"], "jwt");
        assert_eq!(json["account"]["quota"]["max_vcpus"], 8);
        assert_eq!(json["account"]["quota"]["max_ram_gb"], 16);
        assert_eq!(json["account"]["quota"]["max_disk_gb"], 200);
    }

    #[test]
    fn quota_without_networks_serializes_an_empty_list() {
        let q: QuotaResponse = quota(1, 8, 16, 200).into();
        assert!(q.allowed_networks.is_empty());

        let mut with_networks = quota(1, 8, 16, 200);
        with_networks.allowed_networks = "vmbr0, vmbr1".to_string();
        let q: QuotaResponse = with_networks.into();
        assert_eq!(q.allowed_networks, vec!["vmbr0", "vmbr1"]);
    }
}
