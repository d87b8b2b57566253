//! Error types for kino-catalog
//!
//! `CatalogError` carries the engine's error kinds unchanged up to the
//! transport layer; `ApiError` maps them to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::natural_keys::EntityKind;

/// Engine error type
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Storage fault while resolving an entity (not a create race)
    #[error("Failed to resolve {kind} '{key}': {source}")]
    Resolution {
        kind: EntityKind,
        key: String,
        #[source]
        source: sqlx::Error,
    },

    /// Referenced entity absent; `entity` names which side is missing
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Attempted add/remove of a guarded value
    #[error("Value \"{0}\" is protected and cannot be added or removed")]
    ProtectedValue(String),

    /// Invalid caller input, rejected before any write
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ingestion stopped by its cancellation token
    #[error("Ingestion cancelled after {0}")]
    Cancelled(String),

    /// Image collaborator failure
    #[error("Collaborator '{collaborator}' unavailable: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// Database error outside of entity resolution
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// kino-common error
    #[error(transparent)]
    Common(#[from] kino_common::Error),
}

impl CatalogError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Resolution { .. } => "RESOLUTION_ERROR",
            CatalogError::NotFound { .. } => "NOT_FOUND",
            CatalogError::ProtectedValue(_) => "PROTECTED_VALUE",
            CatalogError::InvalidInput(_) => "BAD_REQUEST",
            CatalogError::Cancelled(_) => "CANCELLED",
            CatalogError::Collaborator { .. } => "COLLABORATOR_UNAVAILABLE",
            CatalogError::Database(_) => "DATABASE_ERROR",
            CatalogError::Common(_) => "COMMON_ERROR",
        }
    }
}

/// Result type for engine operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Engine error, mapped by kind
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Catalog(err) => {
                let status = match &err {
                    CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CatalogError::ProtectedValue(_) | CatalogError::InvalidInput(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    CatalogError::Cancelled(_) => StatusCode::CONFLICT,
                    CatalogError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
                    CatalogError::Resolution { .. }
                    | CatalogError::Database(_)
                    | CatalogError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
