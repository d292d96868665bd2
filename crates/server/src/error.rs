//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use registry::{RegistryError, StoreError};

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input from the caller.
    #[error("invalid request: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// Bad credentials.
    #[error("{message}")]
    Unauthorized {
        /// Description shown to the caller.
        message: String,
    },

    /// The referenced entity does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The entity already exists.
    #[error("{what} already exists")]
    Conflict {
        /// What collided.
        what: String,
    },

    /// An error from the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A backing-store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Convenience constructor for validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Registry(RegistryError::NodeNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Registry(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
