//! Quota engine: re-derives an account's live consumption from the cluster
//! and admits or rejects a requested allocation.
//!
//! The check is deliberately not atomic with the creation that follows it.
//! Two concurrent creates can both pass against the same stale snapshot and
//! briefly push an account over quota; taking a lock against an external
//! cluster we do not control would cost more than the window is worth.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::models::accounts::UsageResponse;
use crate::config::EnforcementMode;
use crate::db::models::accounts::AccountDBResponse;
use crate::db::models::quotas::QuotaDBResponse;
use crate::directory;
use crate::errors::{Error, Result};
use crate::proxmox::Inventory;
use crate::types::{AccountId, QuotaDimension};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A requested allocation, in the units creation requests use.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest {
    pub vcpus: i64,
    pub ram_mb: i64,
    pub disk_gb: i64,
}

pub struct QuotaEngine {
    inventory: Arc<dyn Inventory>,
    enforcement: EnforcementMode,
}

impl QuotaEngine {
    pub fn new(inventory: Arc<dyn Inventory>, enforcement: EnforcementMode) -> Self {
        Self { inventory, enforcement }
    }

    /// Current consumption summed over the account's owned, non-template
    /// resources of both kinds.
    pub async fn usage_for(&self, account_id: AccountId) -> Result<UsageResponse> {
        let owned = directory::owned_non_templates(self.inventory.as_ref(), account_id).await?;
        let mut usage = UsageResponse::default();
        for r in &owned {
            usage.vcpus += r.vcpus;
            usage.ram_gb += r.mem_bytes as f64 / GIB;
            usage.disk_gb += r.disk_bytes as f64 / GIB;
        }
        debug!(account_id, resources = owned.len(), ?usage, "computed live usage");
        Ok(usage)
    }

    /// Admit or reject a requested allocation against the account's quota.
    ///
    /// Dimensions are checked in the fixed order vcpu, ram, disk and only the
    /// first violation is reported. If the cluster cannot be queried the
    /// configured enforcement mode decides: fail-open admits with a warning,
    /// fail-closed surfaces the upstream error.
    pub async fn check_and_admit(
        &self,
        account: &AccountDBResponse,
        quota: &QuotaDBResponse,
        requested: ResourceRequest,
    ) -> Result<()> {
        if account.is_admin() {
            return Ok(());
        }

        let usage = match self.usage_for(account.id).await {
            Ok(usage) => usage,
            Err(e) => {
                return match self.enforcement {
                    EnforcementMode::FailOpen => {
                        warn!(account_id = account.id, error = %e, "quota check skipped: inventory unavailable, admitting");
                        Ok(())
                    }
                    EnforcementMode::FailClosed => Err(e),
                };
            }
        };

        if usage.vcpus + requested.vcpus > quota.max_vcpus {
            return Err(Error::QuotaViolation {
                dimension: QuotaDimension::Vcpus,
                current: usage.vcpus as f64,
                requested: requested.vcpus as f64,
                limit: quota.max_vcpus as f64,
            });
        }
        let requested_ram_gb = requested.ram_mb as f64 / 1024.0;
        if usage.ram_gb + requested_ram_gb > quota.max_ram_gb as f64 {
            return Err(Error::QuotaViolation {
                dimension: QuotaDimension::Ram,
                current: usage.ram_gb,
                requested: requested_ram_gb,
                limit: quota.max_ram_gb as f64,
            });
        }
        if usage.disk_gb + requested.disk_gb as f64 > quota.max_disk_gb as f64 {
            return Err(Error::QuotaViolation {
                dimension: QuotaDimension::Disk,
                current: usage.disk_gb,
                requested: requested.disk_gb as f64,
                limit: quota.max_disk_gb as f64,
            });
        }
        Ok(())
    }
}
