//! Wire types for the Proxmox VE HTTP API and the normalized resource shape
//! the rest of the system consumes.
//!
//! Proxmox responses are loosely typed: numeric fields come and go between
//! listing and status endpoints, `cpus` may be fractional, `nextid` is a
//! string, and tags may be absent entirely. Everything is normalized into
//! [`Resource`] at the client boundary.

use crate::types::{ResourceKind, VmId};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// All Proxmox API responses wrap their payload in a `data` field.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Normalized view of a VM or container, fetched fresh per request.
/// Never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub vmid: VmId,
    pub node: String,
    pub name: String,
    pub status: String,
    /// Raw tag string as stored by Proxmox (semicolon-delimited)
    pub tags: String,
    pub template: bool,
    pub vcpus: i64,
    pub mem_bytes: i64,
    pub disk_bytes: i64,
    pub uptime: i64,
    /// Current cpu load as a fraction of allocated cores (0.0-1.0)
    pub cpu: f64,
    pub mem_used_bytes: i64,
    pub disk_used_bytes: i64,
}

/// Raw entry from `GET /nodes/{node}/qemu` or `/lxc` listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInstance {
    pub vmid: VmId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub maxcpu: Option<f64>,
    #[serde(default)]
    pub maxmem: Option<i64>,
    #[serde(default)]
    pub maxdisk: Option<i64>,
    #[serde(default)]
    pub uptime: Option<i64>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub template: Option<u8>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub mem: Option<i64>,
    #[serde(default)]
    pub disk: Option<i64>,
}

impl RawInstance {
    /// Fold a raw listing/status entry into the normalized shape.
    pub fn normalize(self, kind: ResourceKind, node: &str) -> Resource {
        let vcpus = self
            .cpus
            .or(self.maxcpu)
            .map(|c| c.round() as i64)
            .unwrap_or(0);
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}-{}", kind, self.vmid));
        Resource {
            kind,
            vmid: self.vmid,
            node: node.to_string(),
            name,
            status: self.status.unwrap_or_else(|| "unknown".to_string()),
            tags: self.tags.unwrap_or_default(),
            template: self.template == Some(1),
            vcpus,
            mem_bytes: self.maxmem.unwrap_or(0),
            disk_bytes: self.maxdisk.unwrap_or(0),
            uptime: self.uptime.unwrap_or(0),
            cpu: self.cpu.unwrap_or(0.0),
            mem_used_bytes: self.mem.unwrap_or(0),
            disk_used_bytes: self.disk.unwrap_or(0),
        }
    }
}

/// Raw config from `GET /nodes/{node}/{qemu|lxc}/{vmid}/config`. Only the
/// fields the status endpoint does not carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub template: Option<u8>,
}

/// Cluster node as returned by `GET /nodes`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeInfo {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub mem: Option<i64>,
    #[serde(default)]
    pub maxmem: Option<i64>,
    #[serde(default)]
    pub uptime: Option<i64>,
}

/// VNC proxy ticket from `POST .../vncproxy`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleTicket {
    pub ticket: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub cert: Option<String>,
}

/// Parameters for `POST /nodes/{node}/lxc`.
#[derive(Debug, Clone)]
pub struct CtCreateParams {
    pub vmid: VmId,
    pub hostname: String,
    pub ostemplate: String,
    pub memory_mb: i64,
    pub swap_mb: i64,
    pub cores: i64,
    pub disk_gb: i64,
    pub storage: String,
    pub net_bridge: String,
    pub net_ip: String,
    pub unprivileged: bool,
    pub start: bool,
    pub description: String,
    pub tags: String,
    pub password: Option<String>,
}

/// Proxmox returns some numeric fields (vnc port, nextid) as JSON strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}
