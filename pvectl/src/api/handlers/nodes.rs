//! Cluster node listing.

use axum::{Json, extract::State};

use crate::AppState;
use crate::auth::CurrentAccount;
use crate::errors::Result;
use crate::proxmox::types::NodeInfo;

#[utoipa::path(
    get,
    path = "/api/nodes",
    tag = "nodes",
    summary = "List cluster nodes",
    responses(
        (status = 200, description = "Cluster nodes", body = Vec<NodeInfo>),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_nodes(State(state): State<AppState>, CurrentAccount(_account): CurrentAccount) -> Result<Json<Vec<NodeInfo>>> {
    let nodes = state.inventory.nodes().await?;
    Ok(Json(nodes))
}
