//! API models for threshold alert rules.

use crate::types::{AccountId, ResourceKind, VmId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertMetric {
    Cpu,
    Memory,
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertOperator {
    Gt,
    Lt,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertRuleCreateRequest {
    pub name: String,
    pub resource_kind: ResourceKind,
    pub vmid: VmId,
    pub node: String,
    pub metric: AlertMetric,
    pub operator: AlertOperator,
    /// Threshold as a percentage of capacity (0-100)
    pub threshold: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertRuleResponse {
    pub id: i64,
    pub owner_id: AccountId,
    pub name: String,
    pub resource_kind: ResourceKind,
    pub vmid: VmId,
    pub node: String,
    pub metric: AlertMetric,
    pub operator: AlertOperator,
    pub threshold: f64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TriggeredAlert {
    pub rule: AlertRuleResponse,
    pub current_value: f64,
    pub resource_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertCheckResponse {
    /// Number of enabled rules evaluated
    pub checked: usize,
    pub triggered: Vec<TriggeredAlert>,
    pub checked_at: DateTime<Utc>,
}
