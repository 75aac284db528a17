//! OpenAPI documentation assembly.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers;
use crate::api::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pvectl API",
        description = "Multi-tenant control plane for a Proxmox VE cluster: \
            identity and approval, tag-based ownership, quota enforcement, \
            and an audit trail over VM and container lifecycles."
    ),
    paths(
        handlers::auth::login,
        handlers::auth::me,
        handlers::auth::my_usage,
        handlers::nodes::list_nodes,
        handlers::instances::list_instances,
        handlers::instances::get_instance,
        handlers::instances::create_instance,
        handlers::instances::instance_action,
        handlers::instances::delete_instance,
        handlers::containers::create_container,
        handlers::console::create_console_ticket,
        handlers::alerts::list_alert_rules,
        handlers::alerts::create_alert_rule,
        handlers::alerts::delete_alert_rule,
        handlers::alerts::check_alert_rules,
        handlers::audit::list_audit,
        handlers::admin::list_accounts,
        handlers::admin::update_quota,
        handlers::admin::update_role,
        handlers::admin::update_status,
        handlers::admin::run_claim,
    ),
    components(schemas(
        crate::types::ResourceKind,
        crate::types::ForbiddenReason,
        crate::types::QuotaDimension,
        crate::claim::ClaimSummary,
        crate::proxmox::types::NodeInfo,
        models::accounts::Role,
        models::accounts::AccountStatus,
        models::accounts::AccountResponse,
        models::accounts::QuotaResponse,
        models::accounts::QuotaUpdateRequest,
        models::accounts::RoleUpdateRequest,
        models::accounts::StatusUpdateRequest,
        models::accounts::LoginRequest,
        models::accounts::LoginResponse,
        models::accounts::UsageResponse,
        models::accounts::QuotaUsageResponse,
        models::instances::Scope,
        models::instances::InstanceResponse,
        models::instances::CreateInstanceRequest,
        models::instances::CreateContainerRequest,
        models::instances::InstanceAction,
        models::instances::InstanceActionRequest,
        models::instances::TaskResponse,
        models::instances::ConsoleTicketResponse,
        models::alerts::AlertMetric,
        models::alerts::AlertOperator,
        models::alerts::AlertRuleCreateRequest,
        models::alerts::AlertRuleResponse,
        models::alerts::TriggeredAlert,
        models::alerts::AlertCheckResponse,
        models::audit::AuditRecordResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and session introspection"),
        (name = "instances", description = "VM and container lifecycle"),
        (name = "nodes", description = "Cluster nodes"),
        (name = "console", description = "VNC console tickets"),
        (name = "alerts", description = "Threshold alert rules"),
        (name = "audit", description = "Action audit trail"),
        (name = "admin", description = "Account and quota administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerAuth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}
