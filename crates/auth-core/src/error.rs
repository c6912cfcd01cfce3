//! Error taxonomy for the authentication and authorization core.
//!
//! One `thiserror` enum covering every kind the system must distinguish,
//! each carrying enough context for the HTTP layer to pick a status code
//! and a safe, non-leaky message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    InputInvalid { message: String },

    /// Token missing, malformed, expired, revoked, or wrong kind.
    #[error("authentication required: {reason}")]
    AuthRequired { reason: String },

    /// Password wrong, MFA wrong, email unverified. Message is always the
    /// generic public-facing string; callers must not leak which check failed.
    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("account locked until {locked_until}")]
    AccountLocked { locked_until: String },

    #[error("permission denied: {permission} on {resource}")]
    PermissionDenied { permission: String, resource: String },

    #[error("tenant is not active")]
    TenantInactive,

    #[error("{resource} not found")]
    ResourceMissing { resource: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("rate limit exceeded: {limit} per {window_seconds}s")]
    RateLimited { limit: u32, window_seconds: u64 },

    #[error("upstream error from {provider}: {message}")]
    UpstreamError {
        provider: String,
        message: String,
        retryable: bool,
    },

    #[error("no channel available for model {model}")]
    NoChannelAvailable { model: String },

    #[error("dependency unavailable: {dependency}")]
    DependencyUnavailable { dependency: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn user_not_found() -> Self {
        Self::ResourceMissing {
            resource: "user".to_string(),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::AuthFailed {
            message: "email or password is incorrect".to_string(),
        }
    }

    /// HTTP status code this error maps to, per the error-handling taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InputInvalid { .. } => 400,
            AuthError::AuthRequired { .. } => 401,
            AuthError::AuthFailed { .. } => 401,
            AuthError::AccountLocked { .. } => 423,
            AuthError::PermissionDenied { .. } => 403,
            AuthError::TenantInactive => 403,
            AuthError::ResourceMissing { .. } => 404,
            AuthError::Conflict { .. } => 409,
            AuthError::RateLimited { .. } => 429,
            AuthError::UpstreamError { .. } => 502,
            AuthError::NoChannelAvailable { .. } => 503,
            AuthError::DependencyUnavailable { .. } => 503,
            AuthError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for the response body's `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InputInvalid { .. } => "input_invalid",
            AuthError::AuthRequired { .. } => "auth_required",
            AuthError::AuthFailed { .. } => "auth_failed",
            AuthError::AccountLocked { .. } => "account_locked",
            AuthError::PermissionDenied { .. } => "permission_denied",
            AuthError::TenantInactive => "tenant_inactive",
            AuthError::ResourceMissing { .. } => "resource_missing",
            AuthError::Conflict { .. } => "conflict",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::UpstreamError { .. } => "upstream_error",
            AuthError::NoChannelAvailable { .. } => "no_channel_available",
            AuthError::DependencyUnavailable { .. } => "dependency_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AuthError::ResourceMissing {
                resource: "row".to_string(),
            },
            other => AuthError::DependencyUnavailable {
                dependency: format!("database: {other}"),
            },
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::InputInvalid {
            message: err.to_string(),
        }
    }
}

impl From<auth_crypto::JwtError> for AuthError {
    fn from(err: auth_crypto::JwtError) -> Self {
        AuthError::AuthRequired {
            reason: err.reason().to_string(),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::DependencyUnavailable {
            dependency: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(AuthError::invalid_credentials().status_code(), 401);
        assert_eq!(AuthError::user_not_found().status_code(), 404);
        assert_eq!(
            AuthError::RateLimited {
                limit: 5,
                window_seconds: 60
            }
            .status_code(),
            429
        );
        assert_eq!(
            AuthError::NoChannelAvailable {
                model: "gpt-4".to_string()
            }
            .status_code(),
            503
        );
    }
}
