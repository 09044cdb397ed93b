//! Error taxonomy for the store, sync engine and API surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use uuid::Uuid;

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub(crate) enum ApiError {
    /// Missing, malformed or expired caller identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// Absent, or owned by another user. Callers cannot tell which.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Malformed input. Aborts the surrounding database transaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Constraint violation, I/O or connectivity failure in the store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {e}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("request worker failed: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
