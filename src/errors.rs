use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid JSON: {0}")]
    MalformedInput(String),
    #[error("{0}")]
    Validation(String),
    #[error("Non-streaming mode not implemented. Use stream=true")]
    UnsupportedMode,
    #[error("Backend must be 'local' or 'openai-compatible', got '{0}'")]
    InvalidBackend(String),
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(rename = "type")]
    error_type: &'static str,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) | Self::UnsupportedMode | Self::InvalidBackend(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::Validation(_) => "validation_error",
            Self::UnsupportedMode => "unsupported_mode",
            Self::InvalidBackend(_) => "invalid_backend",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Internal(_) => "server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Internal(detail) => {
                error!(error = %detail, "unexpected failure");
                "Internal server error".to_owned()
            }
            other => other.to_string(),
        };

        let payload = ErrorBody {
            detail,
            error_type: self.error_type(),
        };
        (status, Json(payload)).into_response()
    }
}
