//! Audit trail listing.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::AppState;
use crate::api::models::audit::{AuditRecordResponse, ListAuditQuery};
use crate::auth::CurrentAccount;
use crate::db::handlers::{AuditFilter, AuditRecords};
use crate::errors::{Error, Result};

#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "audit",
    summary = "List audit records, newest first",
    params(ListAuditQuery),
    responses(
        (status = 200, description = "Audit records", body = Vec<AuditRecordResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = account.id))]
pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<Vec<AuditRecordResponse>>> {
    // Admins see the whole trail; everyone else only their own actions.
    let filter = AuditFilter {
        account_id: if account.is_admin() { None } else { Some(account.id) },
        resource_kind: query.resource_kind,
        skip: query.pagination.skip,
        limit: query.pagination.limit.min(1000),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let records = AuditRecords::new(&mut conn).list(&filter).await?;
    Ok(Json(records.into_iter().map(AuditRecordResponse::from).collect()))
}
