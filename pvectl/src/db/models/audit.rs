//! Database models for the append-only audit log.

use crate::types::AccountId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for appending an audit record.
#[derive(Debug, Clone)]
pub struct AuditRecordCreateDBRequest {
    pub account_id: AccountId,
    /// Dotted action name, e.g. "vm.create" or "account.status".
    pub action: String,
    pub resource_kind: String,
    pub resource_id: Option<String>,
    pub detail: String,
    pub origin: Option<String>,
}

/// Database response for an audit record. Immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct AuditRecordDBResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub action: String,
    pub resource_kind: String,
    pub resource_id: Option<String>,
    pub detail: String,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}
