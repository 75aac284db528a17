//! Shared helpers for unit tests: an in-memory [`Inventory`] stub and model
//! builders, so core logic is exercised without a cluster or a database.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::api::models::accounts::{AccountStatus, Role};
use crate::db::models::accounts::AccountDBResponse;
use crate::db::models::quotas::QuotaDBResponse;
use crate::errors::{Error, Result};
use crate::proxmox::Inventory;
use crate::proxmox::types::{ConsoleTicket, CtCreateParams, NodeInfo, Resource};
use crate::types::{AccountId, ResourceKind, VmId};

const GIB: i64 = 1024 * 1024 * 1024;

/// Build a normalized resource with sizes given in GiB.
pub fn resource(kind: ResourceKind, vmid: VmId, tags: &str, vcpus: i64, ram_gb: i64, disk_gb: i64) -> Resource {
    Resource {
        kind,
        vmid,
        node: "pve1".to_string(),
        name: format!("{kind}-{vmid}"),
        status: "running".to_string(),
        tags: tags.to_string(),
        template: false,
        vcpus,
        mem_bytes: ram_gb * GIB,
        disk_bytes: disk_gb * GIB,
        uptime: 0,
        cpu: 0.0,
        mem_used_bytes: 0,
        disk_used_bytes: 0,
    }
}

pub fn template(kind: ResourceKind, vmid: VmId) -> Resource {
    Resource {
        template: true,
        status: "stopped".to_string(),
        ..resource(kind, vmid, "", 2, 2, 32)
    }
}

pub fn account(id: AccountId, role: Role, status: AccountStatus) -> AccountDBResponse {
    AccountDBResponse {
        id,
        subject: format!("subject-{id}"),
        email: format!("user{id}@example.com"),
        name: format!("User {id}"),
        picture: None,
        role,
        status,
        created_at: Utc::now(),
        last_login: Utc::now(),
    }
}

pub fn quota(account_id: AccountId, max_vcpus: i64, max_ram_gb: i64, max_disk_gb: i64) -> QuotaDBResponse {
    QuotaDBResponse {
        id: account_id,
        account_id,
        max_vcpus,
        max_ram_gb,
        max_disk_gb,
        allowed_networks: String::new(),
    }
}

/// In-memory inventory. Listing failures and per-vmid tag-write failures can
/// be injected to exercise the best-effort paths.
#[derive(Default)]
pub struct StubInventory {
    pub resources: Mutex<Vec<Resource>>,
    pub fail_list: AtomicBool,
    pub fail_set_tags_for: Mutex<Vec<VmId>>,
    pub tag_writes: Mutex<Vec<(VmId, String)>>,
}

impl StubInventory {
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        Self {
            resources: Mutex::new(resources),
            ..Default::default()
        }
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Inventory for StubInventory {
    async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        Ok(vec![NodeInfo {
            node: "pve1".to_string(),
            status: Some("online".to_string()),
            cpu: None,
            mem: None,
            maxmem: None,
            uptime: None,
        }])
    }

    async fn list(&self, kind: ResourceKind, node: Option<&str>) -> Result<Vec<Resource>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Upstream {
                message: "stubbed outage".to_string(),
            });
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind && node.map_or(true, |n| r.node == n))
            .cloned()
            .collect())
    }

    async fn get(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Resource> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Upstream {
                message: "stubbed outage".to_string(),
            });
        }
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.kind == kind && r.node == node && r.vmid == vmid)
            .cloned()
            .ok_or(Error::NotFound {
                resource: kind.to_string(),
                id: vmid.to_string(),
            })
    }

    async fn set_tags(&self, kind: ResourceKind, node: &str, vmid: VmId, tags: &str) -> Result<()> {
        if self.fail_set_tags_for.lock().unwrap().contains(&vmid) {
            return Err(Error::Upstream {
                message: format!("tag write refused for {vmid}"),
            });
        }
        self.tag_writes.lock().unwrap().push((vmid, tags.to_string()));
        if let Some(r) = self
            .resources
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.kind == kind && r.node == node && r.vmid == vmid)
        {
            r.tags = tags.to_string();
        }
        Ok(())
    }

    async fn next_id(&self) -> Result<VmId> {
        Ok(100 + self.resources.lock().unwrap().len() as VmId)
    }

    async fn clone_vm(
        &self,
        node: &str,
        _template_vmid: VmId,
        new_vmid: VmId,
        name: &str,
        _storage: &str,
        _description: &str,
    ) -> Result<Option<String>> {
        let mut created = resource(ResourceKind::Vm, new_vmid, "", 0, 0, 0);
        created.node = node.to_string();
        created.name = name.to_string();
        created.status = "stopped".to_string();
        self.resources.lock().unwrap().push(created);
        Ok(Some(format!("UPID:{node}:clone:{new_vmid}")))
    }

    async fn configure_vm(&self, node: &str, vmid: VmId, cores: i64, memory_mb: i64, tags: &str) -> Result<()> {
        if let Some(r) = self
            .resources
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.kind == ResourceKind::Vm && r.node == node && r.vmid == vmid)
        {
            r.vcpus = cores;
            r.mem_bytes = memory_mb * 1024 * 1024;
            r.tags = tags.to_string();
        }
        Ok(())
    }

    async fn resize_vm_disk(&self, node: &str, vmid: VmId, _disk: &str, size_gb: i64) -> Result<()> {
        if let Some(r) = self
            .resources
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.kind == ResourceKind::Vm && r.node == node && r.vmid == vmid)
        {
            r.disk_bytes = size_gb * GIB;
        }
        Ok(())
    }

    async fn create_ct(&self, node: &str, params: &CtCreateParams) -> Result<Option<String>> {
        let mut created = resource(ResourceKind::Lxc, params.vmid, &params.tags, params.cores, 0, params.disk_gb);
        created.node = node.to_string();
        created.name = params.hostname.clone();
        created.mem_bytes = params.memory_mb * 1024 * 1024;
        created.status = if params.start { "running" } else { "stopped" }.to_string();
        self.resources.lock().unwrap().push(created);
        Ok(Some(format!("UPID:{node}:ctcreate:{}", params.vmid)))
    }

    async fn status_action(&self, _kind: ResourceKind, node: &str, vmid: VmId, action: &str) -> Result<Option<String>> {
        Ok(Some(format!("UPID:{node}:{action}:{vmid}")))
    }

    async fn delete(&self, kind: ResourceKind, node: &str, vmid: VmId) -> Result<Option<String>> {
        self.resources
            .lock()
            .unwrap()
            .retain(|r| !(r.kind == kind && r.node == node && r.vmid == vmid));
        Ok(Some(format!("UPID:{node}:destroy:{vmid}")))
    }

    async fn console_ticket(&self, _kind: ResourceKind, _node: &str, _vmid: VmId) -> Result<ConsoleTicket> {
        Ok(ConsoleTicket {
            ticket: "PVEVNC:stub".to_string(),
            port: "5900".to_string(),
            user: None,
            cert: None,
        })
    }
}
