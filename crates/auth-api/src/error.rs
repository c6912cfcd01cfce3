use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use auth_core::error::AuthError;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Field-level validation error
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error message for this field
    pub message: String,
}

pub struct ApiError {
    pub inner: AuthError,
    pub request_id: Option<Uuid>,
}

impl ApiError {
    pub fn new(error: AuthError) -> Self {
        Self {
            inner: error,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = self.inner.code().to_uppercase();
        let message = match &self.inner {
            // Internal details never reach the client; callers shouldn't learn
            // which dependency or subsystem failed.
            AuthError::DependencyUnavailable { .. } | AuthError::Internal(_) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            code,
            message,
            fields: None,
            request_id: self.request_id.map(|id| id.to_string()),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(inner: AuthError) -> Self {
        ApiError::new(inner)
    }
}