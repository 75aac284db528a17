//! API request/response models for VM and container instances.

use crate::proxmox::types::Resource;
use crate::types::{ResourceKind, VmId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Listing scope. Admins see everything by default and can narrow to their
/// own resources with `mine`; for regular users the scope is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Mine,
    All,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListInstancesQuery {
    /// Restrict to a single cluster node
    pub node: Option<String>,
    pub scope: Option<Scope>,
}

/// Normalized instance summary returned by all listing and get endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstanceResponse {
    pub vmid: VmId,
    pub name: String,
    pub node: String,
    pub kind: ResourceKind,
    pub status: String,
    pub vcpus: i64,
    pub memory_mb: i64,
    pub disk_gb: f64,
    pub uptime: i64,
    pub tags: String,
}

impl From<Resource> for InstanceResponse {
    fn from(r: Resource) -> Self {
        Self {
            vmid: r.vmid,
            name: r.name,
            node: r.node,
            kind: r.kind,
            status: r.status,
            vcpus: r.vcpus,
            memory_mb: (r.mem_bytes as f64 / MIB).round() as i64,
            disk_gb: (r.disk_bytes as f64 / GIB * 10.0).round() / 10.0,
            uptime: r.uptime,
            tags: r.tags,
        }
    }
}

fn default_storage() -> String {
    "local-lvm".to_string()
}

fn default_bridge() -> String {
    "vmbr0".to_string()
}

fn default_net_ip() -> String {
    "dhcp".to_string()
}

fn default_true() -> bool {
    true
}

/// Request to create a VM by cloning a template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub node: String,
    /// VMID of the template to clone
    pub template_vmid: VmId,
    pub vcpus: i64,
    pub memory_mb: i64,
    #[serde(default = "default_storage")]
    pub storage: String,
    pub disk_gb: i64,
    #[serde(default = "default_true")]
    pub start_after_create: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Caller tags, comma-separated; the owner marker is added on top
    #[serde(default)]
    pub tags: Option<String>,
}

/// Request to create an LXC container from an OS template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateContainerRequest {
    pub name: String,
    pub node: String,
    /// Volume id of the OS template, e.g. "local:vztmpl/debian-12.tar.zst"
    pub ostemplate: String,
    pub cores: i64,
    pub memory_mb: i64,
    #[serde(default)]
    pub swap_mb: i64,
    pub disk_gb: i64,
    #[serde(default = "default_storage")]
    pub storage: String,
    #[serde(default = "default_bridge")]
    pub net_bridge: String,
    #[serde(default = "default_net_ip")]
    pub net_ip: String,
    #[serde(default)]
    pub net_gateway: Option<String>,
    #[serde(default = "default_true")]
    pub unprivileged: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub start_after_create: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// Lifecycle action on a running or stopped instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstanceAction {
    Start,
    Stop,
    Shutdown,
    Reset,
    Suspend,
    Resume,
    Reboot,
}

impl InstanceAction {
    /// Upstream status endpoint segment
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Shutdown => "shutdown",
            Self::Reset => "reset",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Reboot => "reboot",
        }
    }

    /// Containers support a narrower action set than VMs
    pub fn supported_for(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Vm => !matches!(self, Self::Reboot),
            ResourceKind::Lxc => matches!(self, Self::Start | Self::Stop | Self::Shutdown | Self::Reboot),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstanceActionRequest {
    pub action: InstanceAction,
}

/// Upstream task identifier returned by mutating calls
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    /// Proxmox UPID of the started task, if the upstream returned one
    pub task: Option<String>,
}

/// VNC console ticket, passed through for the console tunnel collaborator
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsoleTicketResponse {
    pub ticket: String,
    pub port: String,
    pub user: Option<String>,
    pub cert: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_memory_and_disk_units() {
        let r = Resource {
            kind: ResourceKind::Vm,
            vmid: 100,
            node: "pve1".into(),
            name: "web".into(),
            status: "running".into(),
            tags: "owner:1".into(),
            template: false,
            vcpus: 2,
            mem_bytes: 4 * 1024 * 1024 * 1024,
            disk_bytes: 32 * 1024 * 1024 * 1024 + 512 * 1024 * 1024,
            uptime: 42,
            cpu: 0.1,
            mem_used_bytes: 0,
            disk_used_bytes: 0,
        };
        let resp = InstanceResponse::from(r);
        assert_eq!(resp.memory_mb, 4096);
        assert_eq!(resp.disk_gb, 32.5);
        assert_eq!(resp.vcpus, 2);
    }

    #[test]
    fn action_support_per_kind() {
        assert!(InstanceAction::Reset.supported_for(ResourceKind::Vm));
        assert!(!InstanceAction::Reset.supported_for(ResourceKind::Lxc));
        assert!(InstanceAction::Reboot.supported_for(ResourceKind::Lxc));
        assert!(!InstanceAction::Reboot.supported_for(ResourceKind::Vm));
        assert!(InstanceAction::Start.supported_for(ResourceKind::Lxc));
    }
}
