//! API models for the audit log.

use super::pagination::Pagination;
use crate::db::models::audit::AuditRecordDBResponse;
use crate::types::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListAuditQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by resource kind ("vm", "lxc", "account", ...)
    pub resource_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecordResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub action: String,
    pub resource_kind: String,
    pub resource_id: Option<String>,
    pub detail: String,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditRecordDBResponse> for AuditRecordResponse {
    fn from(db: AuditRecordDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            action: db.action,
            resource_kind: db.resource_kind,
            resource_id: db.resource_id,
            detail: db.detail,
            origin: db.origin,
            created_at: db.created_at,
        }
    }
}
