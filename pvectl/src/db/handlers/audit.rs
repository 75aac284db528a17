//! Database repository for the append-only audit log.
//!
//! Records are written inside the same transaction as the mutation they
//! describe, so an action and its audit trail commit or roll back together.
//! There is no update or delete path.

use crate::db::{
    errors::Result,
    models::audit::{AuditRecordCreateDBRequest, AuditRecordDBResponse},
};
use crate::types::AccountId;
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing audit records, newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub account_id: Option<AccountId>,
    pub resource_kind: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl AuditFilter {
    pub fn with_limit(limit: i64) -> Self {
        Self { limit, ..Default::default() }
    }
}

pub struct AuditRecords<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditRecords<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(account_id = request.account_id, action = %request.action), err)]
    pub async fn record(&mut self, request: &AuditRecordCreateDBRequest) -> Result<AuditRecordDBResponse> {
        let record = sqlx::query_as::<_, AuditRecordDBResponse>(
            r#"
            INSERT INTO audit_log (account_id, action, resource_kind, resource_id, detail, origin)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.account_id)
        .bind(&request.action)
        .bind(&request.resource_kind)
        .bind(&request.resource_id)
        .bind(&request.detail)
        .bind(&request.origin)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AuditFilter) -> Result<Vec<AuditRecordDBResponse>> {
        let records = sqlx::query_as::<_, AuditRecordDBResponse>(
            r#"
            SELECT * FROM audit_log
            WHERE ($1::bigint IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR resource_kind = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.account_id)
        .bind(&filter.resource_kind)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(records)
    }
}
