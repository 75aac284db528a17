//! Axum extractors resolving a session token to an account.
//!
//! Three levels:
//! - [`ProvisionalAccount`]: valid session only, status NOT enforced. Used
//!   solely by the who-am-I endpoint so pending/rejected users can poll
//!   their approval state.
//! - [`CurrentAccount`]: valid session + status=approved. The default for
//!   every resource-touching endpoint.
//! - [`AdminAccount`]: [`CurrentAccount`] + role=admin.
//!
//! The account row is re-read from the database on every request, so an
//! admin flipping someone to approved or rejected takes effect immediately
//! rather than at token expiry.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::instrument;

use crate::{
    AppState,
    api::models::accounts::AccountStatus,
    auth::session,
    db::handlers::{Accounts, Repository},
    db::models::accounts::AccountDBResponse,
    errors::{Error, Result},
    types::ForbiddenReason,
};

/// A valid session whose account may be pending or rejected.
#[derive(Debug, Clone)]
pub struct ProvisionalAccount(pub AccountDBResponse);

/// A valid session for an approved account.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub AccountDBResponse);

/// A valid session for an approved admin account.
#[derive(Debug, Clone)]
pub struct AdminAccount(pub AccountDBResponse);

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Error::Unauthenticated { message: None })?;
    let value = header.to_str().map_err(|e| Error::BadRequest {
        message: format!("Invalid authorization header: {e}"),
    })?;
    value.strip_prefix("Bearer ").ok_or(Error::Unauthenticated { message: None })
}

/// Status gate applied to every endpoint except who-am-I.
pub fn enforce_status(account: &AccountDBResponse) -> Result<()> {
    match account.status {
        AccountStatus::Approved => Ok(()),
        AccountStatus::Pending => Err(Error::Forbidden {
            reason: ForbiddenReason::Pending,
        }),
        AccountStatus::Rejected => Err(Error::Forbidden {
            reason: ForbiddenReason::Rejected,
        }),
    }
}

#[instrument(skip_all)]
async fn resolve_account(parts: &Parts, state: &AppState) -> Result<AccountDBResponse> {
    let token = bearer_token(parts)?;
    let claims = session::verify_session_token(token, &state.config)?;

    let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let mut accounts = Accounts::new(&mut conn);
    accounts
        .get_by_id(claims.sub)
        .await?
        .ok_or(Error::Unauthenticated { message: None })
}

impl FromRequestParts<AppState> for ProvisionalAccount {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        Ok(Self(resolve_account(parts, state).await?))
    }
}

impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let account = resolve_account(parts, state).await?;
        enforce_status(&account)?;
        Ok(Self(account))
    }
}

impl FromRequestParts<AppState> for AdminAccount {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let account = resolve_account(parts, state).await?;
        enforce_status(&account)?;
        if !account.is_admin() {
            return Err(Error::Forbidden {
                reason: ForbiddenReason::InsufficientRole,
            });
        }
        Ok(Self(account))
    }
}
