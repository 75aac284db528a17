use crate::db::errors::DbError;
use crate::types::{ForbiddenReason, QuotaDimension};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// External identity assertion failed verification (signature, issuer, audience)
    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    /// Authentication required but not provided, or the session token is invalid/expired
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated but not allowed to perform the operation
    #[error("Forbidden: {reason}")]
    Forbidden { reason: ForbiddenReason },

    /// A creation request would exceed the account's quota in one dimension
    #[error("{dimension} quota exceeded: {current} + {requested} > {limit}")]
    QuotaViolation {
        dimension: QuotaDimension,
        current: f64,
        requested: f64,
        limit: f64,
    },

    /// The external virtualization API failed or returned a protocol error
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredential { .. } | Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } | Error::QuotaViolation { .. } => StatusCode::FORBIDDEN,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details.
    ///
    /// In particular `Upstream` never exposes transport or protocol internals; the
    /// full cause is logged server-side only.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidCredential { .. } => "Invalid credential".to_string(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { reason } => match reason {
                ForbiddenReason::Pending => "Account is pending approval".to_string(),
                ForbiddenReason::Rejected => "Account has been rejected".to_string(),
                ForbiddenReason::InsufficientRole => "Admin access required".to_string(),
                ForbiddenReason::NotOwner => "Access denied: not your resource".to_string(),
            },
            Error::QuotaViolation {
                dimension,
                current,
                requested,
                limit,
            } => format!("{dimension} quota exceeded: {current} + {requested} > {limit}"),
            Error::Upstream { .. } => "Virtualization backend request failed".to_string(),
            Error::NotFound { resource, id } => format!("{resource} {id} not found"),
            Error::BadRequest { message } => message.clone(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("accounts"), Some(c)) if c.contains("email") => {
                        "An account with this email address already exists".to_string()
                    }
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Upstream { message } => {
                tracing::warn!("Upstream virtualization API error: {message}");
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::InvalidCredential { .. } | Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::QuotaViolation { .. } => {
                tracing::info!("Quota violation: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Forbidden carries a machine-readable reason so clients can distinguish
            // pending-approval from real denials
            Error::Forbidden { reason } => {
                let body = json!({ "message": self.user_message(), "reason": reason });
                (status, axum::response::Json(body)).into_response()
            }
            // Quota violations are structured so the dashboard can render the dimension
            Error::QuotaViolation {
                dimension,
                current,
                requested,
                limit,
            } => {
                let body = json!({
                    "message": self.user_message(),
                    "dimension": dimension,
                    "current": current,
                    "requested": requested,
                    "limit": limit,
                });
                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_taxonomy() {
        assert_eq!(
            Error::InvalidCredential {
                message: "bad signature".into()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::Unauthenticated { message: None }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Forbidden {
                reason: ForbiddenReason::Pending
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::QuotaViolation {
                dimension: QuotaDimension::Vcpus,
                current: 6.0,
                requested: 4.0,
                limit: 8.0,
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Upstream {
                message: "connection refused".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::NotFound {
                resource: "vm".into(),
                id: "105".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_upstream_message_does_not_leak_transport_details() {
        let err = Error::Upstream {
            message: "error sending request for url (https://10.0.0.1:8006/api2/json/nodes)".into(),
        };
        let msg = err.user_message();
        assert!(!msg.contains("10.0.0.1"));
        assert!(!msg.contains("api2"));
    }

    #[test]
    fn test_quota_violation_message_names_all_three_numbers() {
        let err = Error::QuotaViolation {
            dimension: QuotaDimension::Vcpus,
            current: 6.0,
            requested: 4.0,
            limit: 8.0,
        };
        let msg = err.user_message();
        assert!(msg.contains('6') && msg.contains('4') && msg.contains('8'), "{msg}");
        assert!(msg.contains("vCPU"));
    }
}
