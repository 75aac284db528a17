//! Common type definitions shared across the crate.
//!
//! This module defines:
//! - The [`AccountId`] alias used everywhere an account is referenced
//! - [`ResourceKind`], the closed set of externally managed resource kinds
//! - [`ForbiddenReason`] and [`QuotaDimension`], the vocabularies used by the
//!   error taxonomy in [`crate::errors`]

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Local account identifier (BIGSERIAL primary key).
pub type AccountId = i64;

/// Proxmox VMID. Shared between QEMU VMs and LXC containers.
pub type VmId = u32;

/// The two kinds of resources the external control plane manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vm,
    #[serde(alias = "container")]
    Lxc,
}

impl ResourceKind {
    /// Path segment used by the Proxmox API (`/nodes/{node}/qemu` vs `/nodes/{node}/lxc`).
    pub fn api_segment(self) -> &'static str {
        match self {
            ResourceKind::Vm => "qemu",
            ResourceKind::Lxc => "lxc",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Vm => write!(f, "vm"),
            ResourceKind::Lxc => write!(f, "lxc"),
        }
    }
}

/// Why an authenticated request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ForbiddenReason {
    /// Account exists but has not been approved by an admin yet.
    Pending,
    /// Account was rejected by an admin.
    Rejected,
    /// Operation requires the admin role.
    InsufficientRole,
    /// Resource belongs to a different account.
    NotOwner,
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenReason::Pending => write!(f, "pending"),
            ForbiddenReason::Rejected => write!(f, "rejected"),
            ForbiddenReason::InsufficientRole => write!(f, "insufficient-role"),
            ForbiddenReason::NotOwner => write!(f, "not-owner"),
        }
    }
}

/// The three independently enforced quota dimensions, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuotaDimension {
    Vcpus,
    Ram,
    Disk,
}

impl fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaDimension::Vcpus => write!(f, "vCPU"),
            QuotaDimension::Ram => write!(f, "RAM"),
            QuotaDimension::Disk => write!(f, "disk"),
        }
    }
}
