//! API error types and HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sg_core::validation::ValidationError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 400 with the per-field issue list.
    Validation(ValidationError),
    Conflict(String),
    Unavailable(String),
    Internal(String),
    /// 500 that also names the warehouse statement that failed.
    Statement { message: String, statement: String },
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Statement { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(e) => json!({ "error": e.issues }),
            ApiError::Conflict(message)
            | ApiError::Unavailable(message)
            | ApiError::Internal(message) => json!({ "error": message }),
            ApiError::Statement { message, statement } => {
                json!({ "error": message, "statement": statement })
            }
        };
        (status, Json(body)).into_response()
    }
}
