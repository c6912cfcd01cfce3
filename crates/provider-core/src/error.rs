//! Provider-side errors, folded into the platform's `AuthError` taxonomy at
//! the boundary so callers see one error shape regardless of subsystem.

use auth_core::error::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown provider type {0}")]
    UnknownType(String),

    #[error("credential field {0} is required")]
    MissingCredential(String),

    #[error("credential probe failed: {0}")]
    ProbeFailed(String),

    #[error("upstream request failed: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("no channel available for model {0}")]
    NoChannelAvailable(String),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UnknownType(t) => AuthError::InputInvalid {
                message: format!("unknown provider type {t}"),
            },
            ProviderError::MissingCredential(field) => AuthError::InputInvalid {
                message: format!("missing credential field {field}"),
            },
            ProviderError::ProbeFailed(message) => AuthError::UpstreamError {
                provider: "unknown".to_string(),
                message,
                retryable: true,
            },
            ProviderError::Upstream { message, retryable } => AuthError::UpstreamError {
                provider: "unknown".to_string(),
                message,
                retryable,
            },
            ProviderError::NoChannelAvailable(model) => AuthError::NoChannelAvailable { model },
        }
    }
}
