//! Proxmox VE API client and wire types.

pub mod client;
pub mod types;

pub use client::{Inventory, ProxmoxClient};
