//! Threshold alert rules over live resource metrics.
//!
//! Rules live in an in-process arena keyed by a monotonically increasing id;
//! they are per-owner, evaluated on demand against fresh inventory reads,
//! and are not persisted across restarts.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::api::models::alerts::{
    AlertCheckResponse, AlertMetric, AlertOperator, AlertRuleCreateRequest, AlertRuleResponse, TriggeredAlert,
};
use crate::db::models::accounts::AccountDBResponse;
use crate::errors::{Error, Result};
use crate::proxmox::Inventory;
use crate::proxmox::types::Resource;
use crate::types::{AccountId, ForbiddenReason};

#[derive(Default)]
pub struct AlertRules {
    rules: DashMap<i64, AlertRuleResponse>,
    next_id: AtomicI64,
}

impl AlertRules {
    pub fn create(&self, owner_id: AccountId, request: AlertRuleCreateRequest) -> AlertRuleResponse {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let rule = AlertRuleResponse {
            id,
            owner_id,
            name: request.name,
            resource_kind: request.resource_kind,
            vmid: request.vmid,
            node: request.node,
            metric: request.metric,
            operator: request.operator,
            threshold: request.threshold,
            enabled: request.enabled,
            created_at: Utc::now(),
            last_triggered: None,
        };
        self.rules.insert(id, rule.clone());
        rule
    }

    pub fn list_for(&self, owner_id: AccountId) -> Vec<AlertRuleResponse> {
        let mut rules: Vec<_> = self
            .rules
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.clone())
            .collect();
        rules.sort_by_key(|r| r.id);
        rules
    }

    /// Delete a rule. Owners may delete their own; admins may delete any.
    pub fn delete(&self, id: i64, account: &AccountDBResponse) -> Result<()> {
        let rule = self.rules.get(&id).ok_or(Error::NotFound {
            resource: "alert rule".to_string(),
            id: id.to_string(),
        })?;
        if rule.owner_id != account.id && !account.is_admin() {
            return Err(Error::Forbidden {
                reason: ForbiddenReason::NotOwner,
            });
        }
        drop(rule);
        self.rules.remove(&id);
        Ok(())
    }

    /// Evaluate all of an owner's enabled rules against fresh inventory
    /// reads. A rule whose resource cannot be fetched is skipped.
    pub async fn check(&self, inventory: &dyn Inventory, owner_id: AccountId) -> AlertCheckResponse {
        let enabled: Vec<AlertRuleResponse> = self
            .rules
            .iter()
            .filter(|r| r.owner_id == owner_id && r.enabled)
            .map(|r| r.clone())
            .collect();

        let mut triggered = Vec::new();
        for rule in &enabled {
            let resource = match inventory.get(rule.resource_kind, &rule.node, rule.vmid).await {
                Ok(r) => r,
                Err(e) => {
                    debug!(rule_id = rule.id, error = %e, "skipping alert rule, resource unavailable");
                    continue;
                }
            };
            let current_value = metric_value(rule.metric, &resource);
            if is_triggered(rule.operator, current_value, rule.threshold) {
                let now = Utc::now();
                if let Some(mut stored) = self.rules.get_mut(&rule.id) {
                    stored.last_triggered = Some(now);
                }
                let mut rule = rule.clone();
                rule.last_triggered = Some(now);
                triggered.push(TriggeredAlert {
                    rule,
                    current_value: (current_value * 10.0).round() / 10.0,
                    resource_name: resource.name.clone(),
                });
            }
        }

        AlertCheckResponse {
            checked: enabled.len(),
            triggered,
            checked_at: Utc::now(),
        }
    }
}

/// Current metric value as a percentage of capacity.
fn metric_value(metric: AlertMetric, resource: &Resource) -> f64 {
    match metric {
        AlertMetric::Cpu => resource.cpu * 100.0,
        AlertMetric::Memory => {
            let max = resource.mem_bytes.max(1) as f64;
            resource.mem_used_bytes as f64 / max * 100.0
        }
        AlertMetric::Disk => {
            let max = resource.disk_bytes.max(1) as f64;
            resource.disk_used_bytes as f64 / max * 100.0
        }
    }
}

fn is_triggered(operator: AlertOperator, current: f64, threshold: f64) -> bool {
    match operator {
        AlertOperator::Gt => current > threshold,
        AlertOperator::Lt => current < threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::accounts::{AccountStatus, Role};
    use crate::test_utils::{StubInventory, account, resource};
    use crate::types::ResourceKind;

    fn rule_request(vmid: u32, metric: AlertMetric, operator: AlertOperator, threshold: f64) -> AlertRuleCreateRequest {
        AlertRuleCreateRequest {
            name: format!("rule-{vmid}"),
            resource_kind: ResourceKind::Vm,
            vmid,
            node: "pve1".to_string(),
            metric,
            operator,
            threshold,
            enabled: true,
        }
    }

    #[test]
    fn ids_are_monotonic_and_listing_is_per_owner() {
        let rules = AlertRules::default();
        let r1 = rules.create(1, rule_request(100, AlertMetric::Cpu, AlertOperator::Gt, 90.0));
        let r2 = rules.create(2, rule_request(101, AlertMetric::Cpu, AlertOperator::Gt, 90.0));
        let r3 = rules.create(1, rule_request(102, AlertMetric::Disk, AlertOperator::Gt, 80.0));
        assert!(r1.id < r2.id && r2.id < r3.id);

        let mine = rules.list_for(1);
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r1.id, r3.id]);
    }

    #[test]
    fn delete_enforces_ownership() {
        let rules = AlertRules::default();
        let rule = rules.create(1, rule_request(100, AlertMetric::Cpu, AlertOperator::Gt, 90.0));

        let stranger = account(2, Role::User, AccountStatus::Approved);
        let err = rules.delete(rule.id, &stranger).unwrap_err();
        assert!(matches!(
            err,
            Error::Forbidden {
                reason: ForbiddenReason::NotOwner
            }
        ));

        let admin = account(3, Role::Admin, AccountStatus::Approved);
        rules.delete(rule.id, &admin).unwrap();
        assert!(matches!(rules.delete(rule.id, &admin).unwrap_err(), Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn check_triggers_and_stamps_last_triggered() {
        let mut busy = resource(ResourceKind::Vm, 100, "owner:1", 4, 8, 100);
        busy.cpu = 0.95;
        let inventory = StubInventory::with_resources(vec![busy]);

        let rules = AlertRules::default();
        let rule = rules.create(1, rule_request(100, AlertMetric::Cpu, AlertOperator::Gt, 90.0));
        // A rule whose resource does not exist is skipped, not fatal.
        rules.create(1, rule_request(999, AlertMetric::Cpu, AlertOperator::Gt, 90.0));

        let response = rules.check(&inventory, 1).await;
        assert_eq!(response.checked, 2);
        assert_eq!(response.triggered.len(), 1);
        assert_eq!(response.triggered[0].rule.id, rule.id);
        assert_eq!(response.triggered[0].current_value, 95.0);
        assert!(rules.list_for(1)[0].last_triggered.is_some());
    }

    #[test]
    fn memory_metric_is_a_percentage() {
        let mut r = resource(ResourceKind::Vm, 100, "", 4, 8, 100);
        r.mem_used_bytes = r.mem_bytes / 2;
        assert_eq!(metric_value(AlertMetric::Memory, &r), 50.0);
        assert!(is_triggered(AlertOperator::Lt, 50.0, 60.0));
        assert!(!is_triggered(AlertOperator::Gt, 50.0, 60.0));
    }
}
