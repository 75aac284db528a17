//! Scoped inventory views: which resources an account is allowed to see.
//!
//! Templates never appear in tenant-facing listings. Admins see the whole
//! cluster unless they narrow to `scope=mine`; everyone else only sees
//! resources carrying their owner marker.

use crate::api::models::instances::Scope;
use crate::db::models::accounts::AccountDBResponse;
use crate::errors::Result;
use crate::ownership;
use crate::proxmox::Inventory;
use crate::proxmox::types::Resource;
use crate::types::{AccountId, ResourceKind};

/// List one kind of resource through the account's visibility scope.
pub async fn scoped_list(
    inventory: &dyn Inventory,
    account: &AccountDBResponse,
    kind: ResourceKind,
    scope: Option<Scope>,
    node: Option<&str>,
) -> Result<Vec<Resource>> {
    let all = inventory.list(kind, node).await?;
    Ok(filter_scoped(all, account, scope))
}

/// The pure filtering half of [`scoped_list`].
pub fn filter_scoped(resources: Vec<Resource>, account: &AccountDBResponse, scope: Option<Scope>) -> Vec<Resource> {
    resources
        .into_iter()
        .filter(|r| !r.template)
        .filter(|r| {
            if account.is_admin() && scope != Some(Scope::Mine) {
                true
            } else {
                ownership::owns(&r.tags, account.id)
            }
        })
        .collect()
}

/// All non-template resources of BOTH kinds owned by an account. This is the
/// inventory view the quota engine sums over.
pub async fn owned_non_templates(inventory: &dyn Inventory, account_id: AccountId) -> Result<Vec<Resource>> {
    let mut all = inventory.list(ResourceKind::Vm, None).await?;
    all.extend(inventory.list(ResourceKind::Lxc, None).await?);
    Ok(all
        .into_iter()
        .filter(|r| !r.template && ownership::owns(&r.tags, account_id))
        .collect())
}

/// Whether the account may touch this specific resource: admins always,
/// everyone else only their own.
pub fn can_access(account: &AccountDBResponse, resource: &Resource) -> bool {
    account.is_admin() || ownership::owns(&resource.tags, account.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::accounts::{AccountStatus, Role};
    use crate::test_utils::{StubInventory, account, resource, template};

    fn mixed_inventory() -> Vec<Resource> {
        vec![
            resource(ResourceKind::Vm, 100, "owner:1", 2, 4, 32),
            resource(ResourceKind::Vm, 101, "owner:2;web", 2, 4, 32),
            template(ResourceKind::Vm, 9000),
        ]
    }

    #[test]
    fn templates_are_always_excluded() {
        let admin = account(1, Role::Admin, AccountStatus::Approved);
        let visible = filter_scoped(mixed_inventory(), &admin, None);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|r| !r.template));
    }

    #[test]
    fn users_see_only_their_own() {
        let user = account(2, Role::User, AccountStatus::Approved);
        let visible = filter_scoped(mixed_inventory(), &user, None);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].vmid, 101);
        // Scope is ignored for non-admins.
        let visible = filter_scoped(mixed_inventory(), &user, Some(Scope::All));
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn admin_scope_mine_narrows_to_owned() {
        let admin = account(1, Role::Admin, AccountStatus::Approved);
        let visible = filter_scoped(mixed_inventory(), &admin, Some(Scope::Mine));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].vmid, 100);
    }

    #[tokio::test]
    async fn owned_non_templates_spans_both_kinds() {
        let inventory = StubInventory::with_resources(vec![
            resource(ResourceKind::Vm, 100, "owner:1", 2, 4, 32),
            resource(ResourceKind::Lxc, 200, "owner:1;db", 1, 1, 8),
            resource(ResourceKind::Lxc, 201, "owner:10", 1, 1, 8),
            template(ResourceKind::Vm, 9000),
        ]);
        let owned = owned_non_templates(&inventory, 1).await.unwrap();
        let mut vmids: Vec<_> = owned.iter().map(|r| r.vmid).collect();
        vmids.sort_unstable();
        assert_eq!(vmids, vec![100, 200]);
    }

    #[test]
    fn can_access_is_owner_or_admin() {
        let admin = account(1, Role::Admin, AccountStatus::Approved);
        let user = account(2, Role::User, AccountStatus::Approved);
        let theirs = resource(ResourceKind::Vm, 100, "owner:2", 2, 4, 32);
        let not_theirs = resource(ResourceKind::Vm, 101, "owner:20", 2, 4, 32);
        assert!(can_access(&admin, &not_theirs));
        assert!(can_access(&user, &theirs));
        assert!(!can_access(&user, &not_theirs));
    }
}
