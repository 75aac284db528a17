//! Login and session introspection handlers.

use axum::{Json, extract::State};
use tracing::{info, warn};

use crate::api::models::accounts::{
    AccountResponse, AccountStatus, LoginRequest, LoginResponse, QuotaUsageResponse, Role,
};
use crate::auth::{CurrentAccount, ProvisionalAccount, session};
use crate::db::handlers::{Accounts, Quotas, Repository};
use crate::db::models::accounts::{AccountCreateDBRequest, AccountDBResponse};
use crate::errors::{Error, Result};
use crate::{claim, AppState};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    summary = "Exchange an identity assertion for a session token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created", body = LoginResponse),
        (status = 401, description = "Invalid credential"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let identity = state.verifier.verify(&request.credential).await?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (account, first_account) = upsert_account(&mut tx, &identity, &state).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    // The very first account inherits every unowned resource in the cluster.
    // The scan runs detached: login latency must not depend on cluster size.
    if first_account {
        info!(account_id = account.id, "first account created, starting claim reconciliation");
        let inventory = state.inventory.clone();
        let shutdown = state.shutdown.clone();
        let admin_id = account.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(admin_id, "claim reconciliation cancelled by shutdown");
                }
                result = claim::claim_unowned(inventory.as_ref(), admin_id) => {
                    if let Err(e) = result {
                        warn!(admin_id, error = %e, "claim reconciliation after first login failed");
                    }
                }
            }
        });
    }

    // The login response carries the quota so the client can render limits
    // without a second round trip.
    let quota = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Quotas::new(&mut conn).get_for_account(account.id).await?
    };
    let token = session::create_session_token(&account, &state.config)?;
    Ok(Json(LoginResponse {
        token,
        account: AccountResponse::from(account).with_quota(quota.into()),
    }))
}

/// Find-or-create the account for a verified identity. Returns the account
/// and whether it was the first one ever created.
async fn upsert_account(
    tx: &mut sqlx::PgConnection,
    identity: &crate::auth::ExternalIdentity,
    state: &AppState,
) -> Result<(AccountDBResponse, bool)> {
    let mut accounts = Accounts::new(tx);

    if let Some(existing) = accounts.get_by_subject(&identity.subject).await? {
        let refreshed = accounts
            .touch_login(existing.id, &identity.name, identity.picture.as_deref())
            .await?;
        return Ok((refreshed, false));
    }

    // Serialize the empty-table check so two concurrent first logins cannot
    // both become admin.
    accounts.lock_first_account_creation().await?;
    let first_account = accounts.count().await? == 0;
    let (role, status) = if first_account {
        (Role::Admin, AccountStatus::Approved)
    } else {
        (Role::User, AccountStatus::Pending)
    };

    let created = accounts
        .create(&AccountCreateDBRequest {
            subject: identity.subject.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            picture: identity.picture.clone(),
            role,
            status,
            quota: state.config.quota.default_quota(),
        })
        .await?;
    Ok((created, first_account))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    summary = "Current account, including pending/rejected ones",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, ProvisionalAccount(account): ProvisionalAccount) -> Result<Json<AccountResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let quota = Quotas::new(&mut conn).get_for_account(account.id).await?;
    Ok(Json(AccountResponse::from(account).with_quota(quota.into())))
}

#[utoipa::path(
    get,
    path = "/api/auth/me/usage",
    tag = "auth",
    summary = "Live resource consumption against quota limits",
    responses(
        (status = 200, description = "Usage and limits", body = QuotaUsageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn my_usage(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<QuotaUsageResponse>> {
    let quota = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Quotas::new(&mut conn).get_for_account(account.id).await?
    };
    let usage = state.quota.usage_for(account.id).await?;
    Ok(Json(QuotaUsageResponse {
        usage,
        limits: quota.into(),
    }))
}
