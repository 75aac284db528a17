//! Axum route handlers.

pub mod admin;
pub mod alerts;
pub mod audit;
pub mod auth;
pub mod console;
pub mod containers;
pub mod instances;
pub mod nodes;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use tracing::warn;

use crate::db::handlers::AuditRecords;
use crate::db::models::audit::AuditRecordCreateDBRequest;
use crate::AppState;

/// The network origin recorded on audit entries. Behind a proxy the first
/// `X-Forwarded-For` hop is the real client; otherwise the socket peer
/// address is used. Absent both (as in router-level tests) it stays `None`.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub Option<String>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        Ok(Self(client_addr(parts)))
    }
}

fn client_addr(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
}

/// Append an audit record on its own connection, after the action it
/// describes has already succeeded upstream. A failed write is logged and
/// swallowed: the cluster mutation happened and the response must say so.
///
/// Privileged database mutations do NOT use this; they write their audit
/// record inside the same transaction as the change.
pub(crate) async fn record_audit_best_effort(state: &AppState, request: AuditRecordCreateDBRequest) {
    let result = async {
        let mut conn = state.db.acquire().await?;
        AuditRecords::new(&mut conn).record(&request).await?;
        Ok::<_, crate::db::errors::DbError>(())
    }
    .await;

    if let Err(e) = result {
        warn!(account_id = request.account_id, action = %request.action, error = %e, "failed to write audit record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_for(forwarded: Option<&str>, peer: Option<SocketAddr>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/api/instances");
        if let Some(v) = forwarded {
            builder = builder.header("x-forwarded-for", v);
        }
        let (mut parts, _body) = builder.body(()).unwrap().into_parts();
        if let Some(addr) = peer {
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[test]
    fn forwarded_header_wins_over_socket_peer() {
        let peer: SocketAddr = "10.0.0.1:443".parse().unwrap();
        let parts = parts_for(Some("203.0.113.7, 10.0.0.1"), Some(peer));
        assert_eq!(client_addr(&parts).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn socket_peer_is_the_fallback() {
        let peer: SocketAddr = "192.0.2.9:51234".parse().unwrap();
        let parts = parts_for(None, Some(peer));
        assert_eq!(client_addr(&parts).as_deref(), Some("192.0.2.9"));
    }

    #[test]
    fn no_source_means_no_origin() {
        let parts = parts_for(None, None);
        assert_eq!(client_addr(&parts), None);
        let parts = parts_for(Some("   "), None);
        assert_eq!(client_addr(&parts), None);
    }
}
