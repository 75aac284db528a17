//! LXC container creation.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::handlers::{record_audit_best_effort, ClientAddr};
use crate::api::models::instances::{CreateContainerRequest, TaskResponse};
use crate::auth::CurrentAccount;
use crate::db::handlers::Quotas;
use crate::db::models::audit::AuditRecordCreateDBRequest;
use crate::db::models::quotas::QuotaDBResponse;
use crate::errors::{Error, Result};
use crate::proxmox::types::CtCreateParams;
use crate::quota::ResourceRequest;
use crate::{AppState, ownership};

#[utoipa::path(
    post,
    path = "/api/containers",
    tag = "instances",
    summary = "Create an LXC container from an OS template",
    request_body = CreateContainerRequest,
    responses(
        (status = 201, description = "Container created", body = TaskResponse),
        (status = 400, description = "Network not allowed for this account"),
        (status = 403, description = "Quota exceeded"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = account.id, name = %request.name))]
pub async fn create_container(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<CreateContainerRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    if request.cores < 1 || request.memory_mb < 16 || request.disk_gb < 1 {
        return Err(Error::BadRequest {
            message: "cores, memory_mb and disk_gb must be positive".to_string(),
        });
    }

    let quota = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Quotas::new(&mut conn).get_for_account(account.id).await?
    };
    check_network_allowed(&quota, &request.net_bridge, account.is_admin())?;
    state
        .quota
        .check_and_admit(
            &account,
            &quota,
            ResourceRequest {
                vcpus: request.cores,
                ram_mb: request.memory_mb,
                disk_gb: request.disk_gb,
            },
        )
        .await?;

    let vmid = state.inventory.next_id().await?;
    let net_ip = match (&request.net_gateway, request.net_ip.as_str()) {
        // A gateway only makes sense with a static address.
        (Some(gw), ip) if ip != "dhcp" => format!("{ip},gw={gw}"),
        _ => request.net_ip.clone(),
    };
    let params = CtCreateParams {
        vmid,
        hostname: request.name.clone(),
        ostemplate: request.ostemplate.clone(),
        memory_mb: request.memory_mb,
        swap_mb: request.swap_mb,
        cores: request.cores,
        disk_gb: request.disk_gb,
        storage: request.storage.clone(),
        net_bridge: request.net_bridge.clone(),
        net_ip,
        unprivileged: request.unprivileged,
        start: request.start_after_create,
        description: request.description.clone().unwrap_or_default(),
        tags: ownership::with_marker_added(account.id, request.tags.as_deref()),
        password: request.password.clone(),
    };
    let task = state.inventory.create_ct(&request.node, &params).await?;

    record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: account.id,
            action: "lxc.create".to_string(),
            resource_kind: "lxc".to_string(),
            resource_id: Some(vmid.to_string()),
            detail: format!(
                "created container '{}' on {} from {} ({} cores, {} MB, {} GB)",
                request.name, request.node, request.ostemplate, request.cores, request.memory_mb, request.disk_gb
            ),
            origin,
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

/// An empty allow-list means any bridge; otherwise the requested bridge must
/// be on it. Admins are exempt.
fn check_network_allowed(quota: &QuotaDBResponse, bridge: &str, is_admin: bool) -> Result<()> {
    if is_admin || quota.allowed_networks.trim().is_empty() {
        return Ok(());
    }
    let allowed = quota
        .allowed_networks
        .split(',')
        .map(str::trim)
        .any(|network| network == bridge);
    if allowed {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!("network '{bridge}' is not in this account's allowed networks"),
        })
    }
}
