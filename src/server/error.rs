//! HTTP error responses.
//!
//! Every handler error becomes a JSON body `{"error": ..., "details": ...}`
//! with a status code chosen by kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::geofence::GeometryError;
use crate::queue::QueueError;
use crate::service::LocationError;
use crate::zones::RepositoryError;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or parameters are malformed.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("X-API-Key header required")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("location check failed: {0}")]
    Location(#[from] LocationError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::Geometry(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::Location(LocationError::InvalidLocation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Location(_) | ApiError::Repository(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid request",
            ApiError::Geometry(_) => "invalid incident area",
            ApiError::MissingApiKey => "X-API-Key header required",
            ApiError::InvalidApiKey => "invalid API key",
            ApiError::Location(LocationError::InvalidLocation(_)) => "invalid location",
            ApiError::Location(_) => "failed to check location",
            ApiError::Repository(RepositoryError::NotFound(_)) => "incident not found",
            ApiError::Repository(_) => "incident storage failed",
            ApiError::Queue(_) => "queue inspection failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let details = match &self {
            ApiError::MissingApiKey | ApiError::InvalidApiKey => String::new(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.summary().to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
