//! Claim reconciliation: assign unowned cluster resources to an admin.
//!
//! The very first admin inherits everything that existed before this system
//! was deployed. The scan only ever touches resources with no owner marker,
//! which makes it idempotent and safe to re-run at startup or on demand.

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::errors::Result;
use crate::ownership;
use crate::proxmox::Inventory;
use crate::types::{AccountId, ResourceKind};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClaimSummary {
    /// Resources that received the admin's marker
    pub claimed: usize,
    /// Resources that already had an owner
    pub skipped: usize,
    /// Tag writes that failed (logged, never fatal)
    pub failed: usize,
}

/// Scan every resource of both kinds and append the admin's owner marker to
/// each one that carries no marker at all. Per-resource write failures are
/// logged and counted, they never abort the scan.
pub async fn claim_unowned(inventory: &dyn Inventory, admin_id: AccountId) -> Result<ClaimSummary> {
    let mut summary = ClaimSummary::default();

    for kind in [ResourceKind::Vm, ResourceKind::Lxc] {
        let resources = inventory.list(kind, None).await?;
        for r in resources {
            if ownership::has_owner(&r.tags) {
                summary.skipped += 1;
                continue;
            }
            let tags = ownership::with_marker_appended(&r.tags, admin_id);
            match inventory.set_tags(kind, &r.node, r.vmid, &tags).await {
                Ok(()) => summary.claimed += 1,
                Err(e) => {
                    warn!(kind = %kind, node = %r.node, vmid = r.vmid, error = %e, "failed to claim resource");
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        admin_id,
        claimed = summary.claimed,
        skipped = summary.skipped,
        failed = summary.failed,
        "claim reconciliation finished"
    );
    Ok(summary)
}
