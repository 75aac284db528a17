//! VM and container lifecycle handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::api::handlers::{record_audit_best_effort, ClientAddr};
use crate::api::models::instances::{
    CreateInstanceRequest, InstanceActionRequest, InstanceResponse, ListInstancesQuery, TaskResponse,
};
use crate::auth::CurrentAccount;
use crate::db::handlers::Quotas;
use crate::db::models::audit::AuditRecordCreateDBRequest;
use crate::errors::{Error, Result};
use crate::proxmox::types::Resource;
use crate::quota::ResourceRequest;
use crate::types::{ForbiddenReason, ResourceKind, VmId};
use crate::{AppState, directory, ownership};

/// Boot disk device grown after a clone when the request asks for more space
/// than the template carries.
const VM_BOOT_DISK: &str = "scsi0";

#[utoipa::path(
    get,
    path = "/api/instances/{kind}",
    tag = "instances",
    summary = "List visible instances of one kind",
    params(
        ("kind" = ResourceKind, Path, description = "Resource kind: vm or lxc"),
        ListInstancesQuery
    ),
    responses(
        (status = 200, description = "Visible instances", body = Vec<InstanceResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(kind = %kind))]
pub async fn list_instances(
    State(state): State<AppState>,
    Path(kind): Path<ResourceKind>,
    Query(query): Query<ListInstancesQuery>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<Vec<InstanceResponse>>> {
    let resources = directory::scoped_list(
        state.inventory.as_ref(),
        &account,
        kind,
        query.scope,
        query.node.as_deref(),
    )
    .await?;
    Ok(Json(resources.into_iter().map(InstanceResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/instances/{kind}/{node}/{vmid}",
    tag = "instances",
    summary = "Fetch one instance",
    params(
        ("kind" = ResourceKind, Path, description = "Resource kind: vm or lxc"),
        ("node" = String, Path, description = "Cluster node name"),
        ("vmid" = u32, Path, description = "Instance VMID")
    ),
    responses(
        (status = 200, description = "Instance detail", body = InstanceResponse),
        (status = 403, description = "Not your resource"),
        (status = 404, description = "Not found"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(kind = %kind, node = %node, vmid))]
pub async fn get_instance(
    State(state): State<AppState>,
    Path((kind, node, vmid)): Path<(ResourceKind, String, VmId)>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<InstanceResponse>> {
    let resource = fetch_accessible(&state, &account, kind, &node, vmid).await?;
    Ok(Json(resource.into()))
}

#[utoipa::path(
    post,
    path = "/api/instances",
    tag = "instances",
    summary = "Create a VM by cloning a template",
    request_body = CreateInstanceRequest,
    responses(
        (status = 201, description = "VM created", body = TaskResponse),
        (status = 403, description = "Quota exceeded"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = account.id, name = %request.name))]
pub async fn create_instance(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    if request.vcpus < 1 || request.memory_mb < 16 || request.disk_gb < 1 {
        return Err(Error::BadRequest {
            message: "vcpus, memory_mb and disk_gb must be positive".to_string(),
        });
    }

    let quota = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Quotas::new(&mut conn).get_for_account(account.id).await?
    };
    state
        .quota
        .check_and_admit(
            &account,
            &quota,
            ResourceRequest {
                vcpus: request.vcpus,
                ram_mb: request.memory_mb,
                disk_gb: request.disk_gb,
            },
        )
        .await?;

    let new_vmid = state.inventory.next_id().await?;
    let description = request.description.clone().unwrap_or_default();
    let task = state
        .inventory
        .clone_vm(
            &request.node,
            request.template_vmid,
            new_vmid,
            &request.name,
            &request.storage,
            &description,
        )
        .await?;

    // The owner marker rides on the same config write that sizes the VM, so
    // the instance is never visible to the cluster without an owner.
    let tags = ownership::with_marker_added(account.id, request.tags.as_deref());
    state
        .inventory
        .configure_vm(&request.node, new_vmid, request.vcpus, request.memory_mb, &tags)
        .await?;
    state
        .inventory
        .resize_vm_disk(&request.node, new_vmid, VM_BOOT_DISK, request.disk_gb)
        .await?;

    if request.start_after_create {
        state
            .inventory
            .status_action(ResourceKind::Vm, &request.node, new_vmid, "start")
            .await?;
    }

    record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: account.id,
            action: "vm.create".to_string(),
            resource_kind: "vm".to_string(),
            resource_id: Some(new_vmid.to_string()),
            detail: format!(
                "cloned template {} to '{}' on {} ({} vcpus, {} MB, {} GB)",
                request.template_vmid, request.name, request.node, request.vcpus, request.memory_mb, request.disk_gb
            ),
            origin,
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

#[utoipa::path(
    post,
    path = "/api/instances/{kind}/{node}/{vmid}/action",
    tag = "instances",
    summary = "Run a lifecycle action",
    params(
        ("kind" = ResourceKind, Path, description = "Resource kind: vm or lxc"),
        ("node" = String, Path, description = "Cluster node name"),
        ("vmid" = u32, Path, description = "Instance VMID")
    ),
    request_body = InstanceActionRequest,
    responses(
        (status = 200, description = "Action started", body = TaskResponse),
        (status = 400, description = "Action not supported for this kind"),
        (status = 403, description = "Not your resource"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(kind = %kind, node = %node, vmid, action = ?request.action))]
pub async fn instance_action(
    State(state): State<AppState>,
    Path((kind, node, vmid)): Path<(ResourceKind, String, VmId)>,
    CurrentAccount(account): CurrentAccount,
    ClientAddr(origin): ClientAddr,
    Json(request): Json<InstanceActionRequest>,
) -> Result<Json<TaskResponse>> {
    if !request.action.supported_for(kind) {
        return Err(Error::BadRequest {
            message: format!("action '{}' is not supported for {kind}", request.action.as_str()),
        });
    }
    fetch_accessible(&state, &account, kind, &node, vmid).await?;

    let task = state
        .inventory
        .status_action(kind, &node, vmid, request.action.as_str())
        .await?;

    record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: account.id,
            action: format!("{kind}.{}", request.action.as_str()),
            resource_kind: kind.to_string(),
            resource_id: Some(vmid.to_string()),
            detail: format!("{} on {node}", request.action.as_str()),
            origin,
        },
    )
    .await;

    Ok(Json(TaskResponse { task }))
}

#[utoipa::path(
    delete,
    path = "/api/instances/{kind}/{node}/{vmid}",
    tag = "instances",
    summary = "Delete a stopped instance",
    params(
        ("kind" = ResourceKind, Path, description = "Resource kind: vm or lxc"),
        ("node" = String, Path, description = "Cluster node name"),
        ("vmid" = u32, Path, description = "Instance VMID")
    ),
    responses(
        (status = 200, description = "Deletion started", body = TaskResponse),
        (status = 400, description = "Instance is still running"),
        (status = 403, description = "Not your resource"),
        (status = 502, description = "Cluster unavailable")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(kind = %kind, node = %node, vmid))]
pub async fn delete_instance(
    State(state): State<AppState>,
    Path((kind, node, vmid)): Path<(ResourceKind, String, VmId)>,
    CurrentAccount(account): CurrentAccount,
    ClientAddr(origin): ClientAddr,
) -> Result<Json<TaskResponse>> {
    let resource = fetch_accessible(&state, &account, kind, &node, vmid).await?;
    if resource.status == "running" {
        return Err(Error::BadRequest {
            message: "instance must be stopped before deletion".to_string(),
        });
    }

    let task = state.inventory.delete(kind, &node, vmid).await?;

    record_audit_best_effort(
        &state,
        AuditRecordCreateDBRequest {
            account_id: account.id,
            action: format!("{kind}.delete"),
            resource_kind: kind.to_string(),
            resource_id: Some(vmid.to_string()),
            detail: format!("deleted '{}' on {node}", resource.name),
            origin,
        },
    )
    .await;

    Ok(Json(TaskResponse { task }))
}

/// Fetch a resource and enforce ownership. Templates are hidden from
/// non-admins entirely (404, not 403: their existence is not tenant-visible).
pub(crate) async fn fetch_accessible(
    state: &AppState,
    account: &crate::db::models::accounts::AccountDBResponse,
    kind: ResourceKind,
    node: &str,
    vmid: VmId,
) -> Result<Resource> {
    let resource = state.inventory.get(kind, node, vmid).await?;
    if resource.template && !account.is_admin() {
        return Err(Error::NotFound {
            resource: kind.to_string(),
            id: vmid.to_string(),
        });
    }
    if !directory::can_access(account, &resource) {
        return Err(Error::Forbidden {
            reason: ForbiddenReason::NotOwner,
        });
    }
    Ok(resource)
}
