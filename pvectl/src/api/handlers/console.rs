//! VNC console ticket issuance.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::handlers::{instances::fetch_accessible, record_audit_best_effort, ClientAddr};
use crate::api::models::instances::ConsoleTicketResponse;
use crate::auth::CurrentAccount;
use crate::db::models::audit::AuditRecordCreateDBRequest;
use crate::errors::Result;
use crate::types::{ResourceKind, VmId};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/console/{kind}/{node}/{vmid}/ticket",
    tag = "console",
    summary = "Issue a VNC console ticket",
    params(
        ("kind" = ResourceKind, Path, description = "Resource kind: vm or lxc"),
        ("node" = String, Path, description = "Cluster node name"),
        ("vmid" = u32, Path, description = "Instance VMID")
    ),
    responses(
        (status = 200, description = "Console ticket", body = ConsoleTicketResponse),
        (status = 403, description = "Not your resource"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(kind = %kind, node = %node, vmid))]
pub async fn create_console_ticket(
    State(state): State<AppState>,
    Path((kind, node, vmid)): Path<(ResourceKind, String, VmId)>,
    CurrentAccount(account): CurrentAccount,
    ClientAddr(origin): ClientAddr,
) -> Result<Json<ConsoleTicketResponse>> {
    fetch_accessible(&state, &account, kind, &node, vmid).await?;
    let ticket = state.inventory.console_ticket(kind, &node, vmid).await?;

    record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: account.id,
            action: format!("{kind}.console"),
            resource_kind: kind.to_string(),
            resource_id: Some(vmid.to_string()),
            detail: format!("console ticket issued on {node}"),
            origin,
        },
    )
    .await;

    Ok(Json(ConsoleTicketResponse {
        ticket: ticket.ticket,
        port: ticket.port,
        user: ticket.user,
        cert: ticket.cert,
    }))
}
