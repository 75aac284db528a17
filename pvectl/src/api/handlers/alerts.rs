//! Threshold alert rule handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::handlers::instances::fetch_accessible;
use crate::api::models::alerts::{AlertCheckResponse, AlertRuleCreateRequest, AlertRuleResponse};
use crate::auth::CurrentAccount;
use crate::errors::{Error, Result};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/alerts/rules",
    tag = "alerts",
    summary = "List this account's alert rules",
    responses(
        (status = 200, description = "Alert rules", body = Vec<AlertRuleResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_alert_rules(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<Vec<AlertRuleResponse>>> {
    Ok(Json(state.alert_rules.list_for(account.id)))
}

#[utoipa::path(
    post,
    path = "/api/alerts/rules",
    tag = "alerts",
    summary = "Create an alert rule on an owned instance",
    request_body = AlertRuleCreateRequest,
    responses(
        (status = 201, description = "Rule created", body = AlertRuleResponse),
        (status = 400, description = "Invalid threshold"),
        (status = 403, description = "Not your resource")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = account.id, vmid = request.vmid))]
pub async fn create_alert_rule(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(request): Json<AlertRuleCreateRequest>,
) -> Result<(StatusCode, Json<AlertRuleResponse>)> {
    if !(0.0..=100.0).contains(&request.threshold) {
        return Err(Error::BadRequest {
            message: "threshold must be a percentage between 0 and 100".to_string(),
        });
    }
    // A rule can only watch a resource the account could touch directly.
    fetch_accessible(&state, &account, request.resource_kind, &request.node, request.vmid).await?;

    let rule = state.alert_rules.create(account.id, request);
    Ok((StatusCode::CREATED, Json(rule)))
}

#[utoipa::path(
    delete,
    path = "/api/alerts/rules/{id}",
    tag = "alerts",
    summary = "Delete an alert rule",
    params(("id" = i64, Path, description = "Alert rule id")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 403, description = "Not your rule"),
        (status = 404, description = "No such rule")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = id))]
pub async fn delete_alert_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentAccount(account): CurrentAccount,
) -> Result<StatusCode> {
    state.alert_rules.delete(id, &account)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/alerts/check",
    tag = "alerts",
    summary = "Evaluate this account's enabled rules right now",
    responses(
        (status = 200, description = "Check outcome", body = AlertCheckResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = account.id))]
pub async fn check_alert_rules(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<AlertCheckResponse>> {
    let response = state.alert_rules.check(state.inventory.as_ref(), account.id).await;
    Ok(Json(response))
}
