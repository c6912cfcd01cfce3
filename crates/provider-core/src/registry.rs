//! Provider-type registry: static declarations of how to talk to each
//! upstream family, loaded once at startup from the provider-type config
//! directory.

use crate::error::ProviderError;
use crate::models::{AuthScheme, ModelInfo, ProviderTypeConfig};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

pub struct ProviderTypeRegistry {
    types: HashMap<String, ProviderTypeConfig>,
}

impl ProviderTypeRegistry {
    pub fn new(types: Vec<ProviderTypeConfig>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    /// The two provider families this gateway ships converters for out of
    /// the box. Additional types are loaded from `provider_type_dir`.
    pub fn with_builtins() -> Self {
        Self::new(vec![
            ProviderTypeConfig {
                id: "openai".to_string(),
                name: "OpenAI".to_string(),
                base_url: "https://api.openai.com".to_string(),
                auth_header: "Authorization".to_string(),
                auth_scheme: AuthScheme::Bearer,
                probe_path: "/v1/models".to_string(),
                credential_fields: vec![crate::models::CredentialField {
                    name: "api_key".to_string(),
                    label: "API key".to_string(),
                    secret: true,
                    required: true,
                }],
                models: vec![
                    ModelInfo {
                        id: "gpt-4o".to_string(),
                        context_window: 128_000,
                        supports_streaming: true,
                    },
                    ModelInfo {
                        id: "gpt-4o-mini".to_string(),
                        context_window: 128_000,
                        supports_streaming: true,
                    },
                ],
            },
            ProviderTypeConfig {
                id: "anthropic".to_string(),
                name: "Anthropic".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
                auth_header: "x-api-key".to_string(),
                auth_scheme: AuthScheme::Raw,
                probe_path: "/v1/models".to_string(),
                credential_fields: vec![crate::models::CredentialField {
                    name: "api_key".to_string(),
                    label: "API key".to_string(),
                    secret: true,
                    required: true,
                }],
                models: vec![ModelInfo {
                    id: "claude-3-5-sonnet-20241022".to_string(),
                    context_window: 200_000,
                    supports_streaming: true,
                }],
            },
        ])
    }

    pub fn list_types(&self) -> Vec<&ProviderTypeConfig> {
        self.types.values().collect()
    }

    pub fn get_type(&self, id: &str) -> Option<&ProviderTypeConfig> {
        self.types.get(id)
    }

    pub fn supported_models(&self, id: &str) -> Vec<&ModelInfo> {
        self.get_type(id)
            .map(|t| t.models.iter().collect())
            .unwrap_or_default()
    }

    /// Checks required fields are present, then issues a minimal live probe
    /// against the provider's own endpoint with the supplied credentials.
    pub async fn validate_credentials(
        &self,
        id: &str,
        credentials: &serde_json::Value,
        client: &reqwest::Client,
    ) -> Result<(), ProviderError> {
        let provider_type = self
            .get_type(id)
            .ok_or_else(|| ProviderError::UnknownType(id.to_string()))?;

        for field in &provider_type.credential_fields {
            if field.required && credentials.get(&field.name).is_none() {
                return Err(ProviderError::MissingCredential(field.name.clone()));
            }
        }

        probe(provider_type, credentials, client).await
    }
}

/// Issues one minimal authenticated GET against the provider, under a 5s
/// deadline, to confirm the credentials and endpoint are reachable.
pub async fn probe(
    provider_type: &ProviderTypeConfig,
    credentials: &serde_json::Value,
    client: &reqwest::Client,
) -> Result<(), ProviderError> {
    let api_key = credentials
        .get("api_key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::MissingCredential("api_key".to_string()))?;

    let url = format!("{}{}", provider_type.base_url, provider_type.probe_path);
    let mut request = client.get(&url);
    request = match provider_type.auth_scheme {
        AuthScheme::Bearer => request.bearer_auth(api_key),
        AuthScheme::Raw => request.header(provider_type.auth_header.as_str(), api_key),
    };

    let response = tokio::time::timeout(Duration::from_secs(5), request.send())
        .await
        .map_err(|_| ProviderError::ProbeFailed("timed out".to_string()))?
        .map_err(|e| ProviderError::ProbeFailed(e.to_string()))?;

    if response.status().is_success() {
        Ok(())
    } else {
        warn!(
            "probe against {} returned {}",
            provider_type.id,
            response.status()
        );
        Err(ProviderError::ProbeFailed(format!(
            "status {}",
            response.status()
        )))
    }
}
