//! # pvectl: Multi-Tenant Control Plane for Proxmox VE
//!
//! `pvectl` sits between browser clients and a Proxmox VE cluster and turns a
//! single shared cluster into a multi-tenant self-service platform. It owns
//! identity (Google sign-in with admin approval), resource ownership (a
//! marker tag on every VM and container), per-account quotas enforced
//! against live cluster usage, and an append-only audit trail of every
//! privileged action.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for accounts, quotas, and the audit
//! log. The cluster itself stays the source of truth for all resource state:
//! nothing about a VM is persisted locally, every read goes to the Proxmox
//! API and every ownership fact lives in the resource's tag string. That
//! makes the control plane stateless with respect to the cluster and safe to
//! restart at any time.
//!
//! A request enters through the session extractors in [`auth`], which
//! re-read the account row on every request so approval or rejection by an
//! admin takes effect immediately. Handlers in [`api`] then combine the
//! [`directory`] visibility rules, the [`quota`] engine, and the
//! [`proxmox`] client to serve the request, recording privileged actions
//! through the [`db`] layer's audit repository.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use pvectl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = pvectl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     pvectl::telemetry::init_telemetry();
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```

pub mod alerts;
pub mod api;
pub mod auth;
pub mod claim;
pub mod config;
pub mod db;
pub mod directory;
pub mod errors;
mod openapi;
pub mod ownership;
pub mod proxmox;
pub mod quota;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::alerts::AlertRules;
use crate::api::models::accounts::AccountStatus;
use crate::auth::{GoogleVerifier, IdentityVerifier};
use crate::config::CorsOrigin;
use crate::db::handlers::{AccountFilter, Accounts, Repository};
use crate::openapi::ApiDoc;
use crate::proxmox::{Inventory, ProxmoxClient};
use crate::quota::QuotaEngine;

pub use config::Config;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub inventory: Arc<dyn Inventory>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub quota: Arc<QuotaEngine>,
    pub alert_rules: Arc<AlertRules>,
    /// Cancelled on shutdown; background claim tasks watch it.
    pub shutdown: CancellationToken,
}

/// Get the pvectl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Authentication and self-service
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/me", get(api::handlers::auth::me))
        .route("/auth/me/usage", get(api::handlers::auth::my_usage))
        // Cluster nodes
        .route("/nodes", get(api::handlers::nodes::list_nodes))
        // Instance lifecycle
        .route("/instances", post(api::handlers::instances::create_instance))
        .route("/instances/{kind}", get(api::handlers::instances::list_instances))
        .route("/instances/{kind}/{node}/{vmid}", get(api::handlers::instances::get_instance))
        .route(
            "/instances/{kind}/{node}/{vmid}",
            delete(api::handlers::instances::delete_instance),
        )
        .route(
            "/instances/{kind}/{node}/{vmid}/action",
            post(api::handlers::instances::instance_action),
        )
        .route("/containers", post(api::handlers::containers::create_container))
        // Console access
        .route(
            "/console/{kind}/{node}/{vmid}/ticket",
            post(api::handlers::console::create_console_ticket),
        )
        // Alert rules
        .route(
            "/alerts/rules",
            get(api::handlers::alerts::list_alert_rules).post(api::handlers::alerts::create_alert_rule),
        )
        .route("/alerts/rules/{id}", delete(api::handlers::alerts::delete_alert_rule))
        .route("/alerts/check", get(api::handlers::alerts::check_alert_rules))
        // Audit trail
        .route("/audit", get(api::handlers::audit::list_audit))
        // Administration
        .route("/admin/accounts", get(api::handlers::admin::list_accounts))
        .route("/admin/accounts/{id}/quota", put(api::handlers::admin::update_quota))
        .route("/admin/accounts/{id}/role", put(api::handlers::admin::update_role))
        .route("/admin/accounts/{id}/status", put(api::handlers::admin::update_status))
        .route("/admin/claim-unowned", post(api::handlers::admin::run_claim))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Run a claim pass at startup if one is configured and an approved admin
/// already exists; without an admin there is nobody to assign resources to
/// and the first login will handle it instead.
#[instrument(skip_all)]
async fn startup_claim(state: &AppState) {
    let admin = async {
        let mut conn = state.db.acquire().await?;
        let accounts = Accounts::new(&mut conn).list(&AccountFilter::default()).await?;
        Ok::<_, crate::db::errors::DbError>(
            accounts
                .into_iter()
                .find(|a| a.is_admin() && a.status == AccountStatus::Approved),
        )
    }
    .await;

    match admin {
        Ok(Some(admin)) => {
            let inventory = state.inventory.clone();
            let shutdown = state.shutdown.clone();
            let admin_id = admin.id;
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(admin_id, "startup claim reconciliation cancelled by shutdown");
                    }
                    result = claim::claim_unowned(inventory.as_ref(), admin_id) => {
                        if let Err(e) = result {
                            warn!(admin_id, error = %e, "startup claim reconciliation failed");
                        }
                    }
                }
            });
        }
        Ok(None) => info!("no approved admin yet, skipping startup claim reconciliation"),
        Err(e) => warn!(error = %e, "could not look up an admin for startup claim reconciliation"),
    }
}

/// Main application struct that owns all resources and lifecycle.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Create a new application instance: connect, migrate, wire up state.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = PgPool::connect(&config.database_url).await?;
        migrator().run(&pool).await?;

        let inventory: Arc<dyn Inventory> = Arc::new(ProxmoxClient::new(&config.proxmox)?);
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(GoogleVerifier::new(&config.auth));
        let quota = Arc::new(QuotaEngine::new(inventory.clone(), config.quota.enforcement));
        let shutdown_token = CancellationToken::new();

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .inventory(inventory)
            .verifier(verifier)
            .quota(quota)
            .alert_rules(Arc::new(AlertRules::default()))
            .shutdown(shutdown_token.clone())
            .build();

        if config.claim.run_on_startup {
            startup_claim(&state).await;
        }

        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
            shutdown_token,
        })
    }

    /// Start serving the application until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("pvectl listening on http://{bind_addr}");

        let token = self.shutdown_token;
        // ConnectInfo feeds the client address recorded on audit entries.
        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
            .with_graceful_shutdown(async move {
                shutdown.await;
                token.cancel();
            })
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ExternalIdentity;
    use crate::errors::Error;
    use crate::test_utils::StubInventory;
    use axum_test::TestServer;

    struct RejectingVerifier;

    #[async_trait::async_trait]
    impl IdentityVerifier for RejectingVerifier {
        async fn verify(&self, _assertion: &str) -> crate::errors::Result<ExternalIdentity> {
            Err(Error::InvalidCredential {
                message: "stubbed rejection".to_string(),
            })
        }
    }

    fn test_server() -> TestServer {
        let config = Config {
            secret_key: Some("test-secret".to_string()),
            ..Default::default()
        };
        // Lazy pool: no connection is made until a handler touches the
        // database, which none of these tests do.
        let db = PgPool::connect_lazy(&config.database_url).unwrap();
        let inventory: Arc<dyn Inventory> = Arc::new(StubInventory::default());
        let state = AppState::builder()
            .db(db)
            .config(config.clone())
            .inventory(inventory.clone())
            .verifier(Arc::new(RejectingVerifier))
            .quota(Arc::new(QuotaEngine::new(inventory, config.quota.enforcement)))
            .alert_rules(Arc::new(AlertRules::default()))
            .shutdown(CancellationToken::new())
            .build();
        TestServer::new(build_router(state).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_public() {
        let server = test_server();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn api_endpoints_require_a_session() {
        let server = test_server();
        for path in ["/api/nodes", "/api/instances/vm", "/api/audit", "/api/alerts/rules", "/api/admin/accounts"] {
            let response = server.get(path).await;
            assert_eq!(response.status_code().as_u16(), 401, "expected 401 for {path}");
        }
    }

    #[tokio::test]
    async fn garbage_session_token_is_rejected_before_any_db_access() {
        let server = test_server();
        let response = server.get("/api/nodes").authorization_bearer("not-a-valid-token").await;
        assert_eq!(response.status_code().as_u16(), 401);
    }

    #[tokio::test]
    async fn login_with_invalid_credential_is_unauthorized() {
        let server = test_server();
        let response = server
            .post("/api/auth/login")
            .json(&serde_json::json!({"credential": "garbage"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
    }

    #[tokio::test]
    async fn openapi_docs_are_served() {
        let server = test_server();
        server.get("/docs").await.assert_status_ok();
    }
}
