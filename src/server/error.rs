// src/server/error.rs

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::engine::SlotBusy;
use crate::errors::LabError;
use crate::vms::PowerError;

/// Errors returned by JSON endpoints, rendered as `{"detail": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<SlotBusy> for ApiError {
    fn from(busy: SlotBusy) -> Self {
        ApiError::Conflict(format!("Another operation is running: {}", busy.label))
    }
}

impl From<PowerError> for ApiError {
    fn from(err: PowerError) -> Self {
        match err {
            PowerError::UnknownVm(_) | PowerError::NotProvisioned(_) => {
                ApiError::NotFound(err.to_string())
            }
            PowerError::Failed { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::PlaybookNotFound(_) => ApiError::NotFound(err.to_string()),
            LabError::ConfigError(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
