//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/api/auth/*`): Login and session introspection
//! - **Instances** (`/api/instances/*`, `/api/containers`): VM and container lifecycle
//! - **Nodes** (`/api/nodes`): Cluster node listing
//! - **Console** (`/api/console/*`): VNC console tickets
//! - **Alerts** (`/api/alerts/*`): Threshold alert rules
//! - **Audit** (`/api/audit`): The append-only action trail
//! - **Admin** (`/api/admin/*`): Account approval, quotas, and claim runs
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive docs are served at `/docs`.

pub mod handlers;
pub mod models;
