//! Admin handlers: account approval, role and quota management, claim runs.
//!
//! Every mutation here writes its audit record inside the same transaction
//! as the change itself.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use sqlx::Acquire;

use crate::api::models::accounts::{
    AccountResponse, ListAccountsQuery, QuotaUpdateRequest, RoleUpdateRequest, StatusUpdateRequest,
};
use crate::api::handlers::ClientAddr;
use crate::auth::AdminAccount;
use crate::claim::{self, ClaimSummary};
use crate::db::handlers::{AccountFilter, Accounts, AuditRecords, Quotas, Repository};
use crate::db::models::accounts::AccountUpdateDBRequest;
use crate::db::models::audit::AuditRecordCreateDBRequest;
use crate::db::models::quotas::QuotaUpdateDBRequest;
use crate::errors::{Error, Result};
use crate::types::AccountId;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/admin/accounts",
    tag = "admin",
    summary = "List all accounts with their quotas",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Accounts", body = Vec<AccountResponse>),
        (status = 403, description = "Admin access required")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
    AdminAccount(_admin): AdminAccount,
) -> Result<Json<Vec<AccountResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let accounts = Accounts::new(&mut conn)
        .list(&AccountFilter {
            skip: query.pagination.skip,
            limit: query.pagination.limit.min(1000),
        })
        .await?;

    let mut responses = Vec::with_capacity(accounts.len());
    for account in accounts {
        let quota = Quotas::new(&mut conn).get_for_account(account.id).await?;
        responses.push(AccountResponse::from(account).with_quota(quota.into()));
    }
    Ok(Json(responses))
}

#[utoipa::path(
    put,
    path = "/api/admin/accounts/{id}/quota",
    tag = "admin",
    summary = "Adjust an account's quota ceilings",
    params(("id" = i64, Path, description = "Account id")),
    request_body = QuotaUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No such account")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = id))]
pub async fn update_quota(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AdminAccount(admin): AdminAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<QuotaUpdateRequest>,
) -> Result<Json<AccountResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let response = {
        let account = Accounts::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?)
            .get_by_id(id)
            .await?
            .ok_or(Error::NotFound {
                resource: "account".to_string(),
                id: id.to_string(),
            })?;

        let quota = Quotas::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?)
            .update_for_account(
                id,
                &QuotaUpdateDBRequest {
                    max_vcpus: request.max_vcpus,
                    max_ram_gb: request.max_ram_gb,
                    max_disk_gb: request.max_disk_gb,
                    allowed_networks: request.allowed_networks.as_ref().map(|networks| networks.join(",")),
                },
            )
            .await?;

        AuditRecords::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?)
            .record(&AuditRecordCreateDBRequest {
                account_id: admin.id,
                action: "account.quota".to_string(),
                resource_kind: "account".to_string(),
                resource_id: Some(id.to_string()),
                detail: format!(
                    "quota set to {} vcpus / {} GB ram / {} GB disk",
                    quota.max_vcpus, quota.max_ram_gb, quota.max_disk_gb
                ),
                origin,
            })
            .await?;

        AccountResponse::from(account).with_quota(quota.into())
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/api/admin/accounts/{id}/role",
    tag = "admin",
    summary = "Change an account's role",
    params(("id" = i64, Path, description = "Account id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 400, description = "Cannot change your own role"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No such account")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = id))]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AdminAccount(admin): AdminAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<RoleUpdateRequest>,
) -> Result<Json<AccountResponse>> {
    // Self-demotion could leave the system with no admin at all.
    if id == admin.id {
        return Err(Error::BadRequest {
            message: "cannot change your own role".to_string(),
        });
    }
    let update = AccountUpdateDBRequest {
        role: Some(request.role),
        status: None,
    };
    let account = apply_account_update(
        &state,
        &admin,
        id,
        &update,
        "account.role",
        format!("role set to {:?}", request.role),
        origin,
    )
    .await?;
    Ok(Json(account.into()))
}

#[utoipa::path(
    put,
    path = "/api/admin/accounts/{id}/status",
    tag = "admin",
    summary = "Approve or reject an account",
    params(("id" = i64, Path, description = "Account id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 400, description = "Cannot change your own status"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No such account")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = id))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    AdminAccount(admin): AdminAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<AccountResponse>> {
    if id == admin.id {
        return Err(Error::BadRequest {
            message: "cannot change your own status".to_string(),
        });
    }
    let update = AccountUpdateDBRequest {
        role: None,
        status: Some(request.status),
    };
    let account = apply_account_update(
        &state,
        &admin,
        id,
        &update,
        "account.status",
        format!("status set to {:?}", request.status),
        origin,
    )
    .await?;
    Ok(Json(account.into()))
}

/// Run the account update and its audit record in one transaction.
async fn apply_account_update(
    state: &AppState,
    admin: &crate::db::models::accounts::AccountDBResponse,
    id: AccountId,
    update: &AccountUpdateDBRequest,
    action: &str,
    detail: String,
    origin: Option<String>,
) -> Result<crate::db::models::accounts::AccountDBResponse> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let account = {
        let mut accounts = Accounts::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        if accounts.get_by_id(id).await?.is_none() {
            return Err(Error::NotFound {
                resource: "account".to_string(),
                id: id.to_string(),
            });
        }
        let account = accounts.update(id, update).await?;

        AuditRecords::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?)
            .record(&AuditRecordCreateDBRequest {
                account_id: admin.id,
                action: action.to_string(),
                resource_kind: "account".to_string(),
                resource_id: Some(id.to_string()),
                detail,
                origin,
            })
            .await?;
        account
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(account)
}

#[utoipa::path(
    post,
    path = "/api/admin/claim-unowned",
    tag = "admin",
    summary = "Claim every unowned cluster resource for this admin",
    responses(
        (status = 200, description = "Reconciliation summary", body = ClaimSummary),
        (status = 403, description = "Admin access required"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = admin.id))]
pub async fn run_claim(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    ClientAddr(origin): ClientAddr,
) -> Result<Json<ClaimSummary>> {
    let summary = claim::claim_unowned(state.inventory.as_ref(), admin.id).await?;

    crate::api::handlers::record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: admin.id,
            action: "claim.run".to_string(),
            resource_kind: "cluster".to_string(),
            resource_id: None,
            detail: format!(
                "claimed {} resources ({} already owned, {} failed)",
                summary.claimed, summary.skipped, summary.failed
            ),
            origin,
        },
    )
    .await;

    Ok(Json(summary))
}
