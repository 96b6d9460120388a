// ABOUTME: Error model and HTTP mapping for the API: {error, message, status, details?}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use benchwatch_types::BenchwatchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Error envelope returned by every failed request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status
    pub status: u16,

    /// Detailed error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream data rejected: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Upstream(_) => "UPSTREAM_REJECTED",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code().as_u16(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.to_body())).into_response()
    }
}

// Domain errors map onto the HTTP kinds from the error design: transient
// failures surface as 503, fatal ones as 500, incoherent ingest as 422.
impl From<BenchwatchError> for ApiError {
    fn from(err: BenchwatchError) -> Self {
        match err {
            BenchwatchError::NotFound(msg) => ApiError::NotFound(msg),
            BenchwatchError::Validation(msg) => ApiError::Validation(msg),
            BenchwatchError::Conflict(msg) => ApiError::Conflict(msg),
            BenchwatchError::Transient(msg) => ApiError::Unavailable(msg),
            BenchwatchError::Fatal(msg) => ApiError::Internal(msg),
            BenchwatchError::Upstream(msg) => ApiError::Upstream(msg),
            BenchwatchError::Io(e) => ApiError::Internal(format!("IO error: {e}")),
            BenchwatchError::Json(e) => ApiError::Internal(format!("JSON error: {e}")),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(format!("JSON parsing error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_follows_error_design() {
        assert_eq!(
            ApiError::from(BenchwatchError::NotFound("run x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(BenchwatchError::Validation("bad".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(BenchwatchError::Conflict("dup".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(BenchwatchError::Transient("timeout".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(BenchwatchError::Fatal("schema".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(BenchwatchError::Upstream("totals".into())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = ApiError::NotFound("run 123".to_string()).to_body();
        assert_eq!(body.error, "NOT_FOUND");
        assert_eq!(body.status, 404);
        assert!(body.message.contains("run 123"));
        assert!(body.details.is_none());
    }
}
