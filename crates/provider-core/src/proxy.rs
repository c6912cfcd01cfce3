//! Proxy handler: the per-request path from a canonical chat request to an
//! upstream call and back, with channel-exclude-and-retry on transient
//! failure and Server-Sent-Events framing for streaming.

use crate::channel::{ChannelManager, ProbeOutcome};
use crate::converter::{CanonicalRequest, CanonicalResponse, Converter};
use crate::error::ProviderError;
use crate::models::{AuthScheme, Channel, ProviderTypeConfig};
use crate::registry::ProviderTypeRegistry;
use auth_core::error::AuthError;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct ProxyHandler {
    channels: Arc<ChannelManager>,
    registry: Arc<ProviderTypeRegistry>,
    client: reqwest::Client,
    max_retries: u32,
}

/// One line of attribution recorded per completed request, for the audit
/// log and usage accounting.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub channel_id: Uuid,
    pub provider_type: String,
    pub duration_ms: f64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub success: bool,
}

impl ProxyHandler {
    pub fn new(
        channels: Arc<ChannelManager>,
        registry: Arc<ProviderTypeRegistry>,
        max_retries: u32,
    ) -> Self {
        Self {
            channels,
            registry,
            client: reqwest::Client::new(),
            max_retries,
        }
    }

    fn converter_for(&self, provider_type: &str) -> Box<dyn Converter> {
        match provider_type {
            "anthropic" => Box::new(crate::converter::AnthropicConverter),
            _ => Box::new(crate::converter::OpenAiConverter),
        }
    }

    fn build_request(
        &self,
        provider_type: &ProviderTypeConfig,
        channel: &Channel,
        body: serde_json::Value,
    ) -> Result<reqwest::RequestBuilder, AuthError> {
        let api_key = channel
            .credentials
            .get("api_key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AuthError::Internal("channel missing api_key credential".to_string()))?;

        let url = if provider_type.id == "openai" {
            format!("{}/v1/chat/completions", provider_type.base_url)
        } else {
            format!("{}/v1/messages", provider_type.base_url)
        };

        let mut request = self.client.post(url).json(&body);
        request = match provider_type.auth_scheme {
            AuthScheme::Bearer => request.bearer_auth(api_key),
            AuthScheme::Raw => request.header(provider_type.auth_header.as_str(), api_key),
        };
        Ok(request)
    }

    /// Non-streaming path: selects a channel, converts, calls upstream, and
    /// retries against a different channel on a retryable failure.
    pub async fn complete(
        &self,
        request: CanonicalRequest,
        tenant_id: Uuid,
    ) -> Result<(CanonicalResponse, UsageRecord), AuthError> {
        let mut excluded = HashSet::new();

        for attempt in 0..=self.max_retries {
            let channel = self
                .channels
                .select(&request.model, tenant_id, &excluded)
                .map_err(AuthError::from)?;

            let provider_type = self
                .registry
                .get_type(&channel.provider_type)
                .ok_or_else(|| ProviderError::UnknownType(channel.provider_type.clone()))?;

            let converter = self.converter_for(&channel.provider_type);
            let body = converter.to_provider_request(&request);
            let upstream_request = self.build_request(provider_type, &channel, body)?;

            let start = Instant::now();
            match upstream_request.send().await {
                Ok(response) if response.status().is_success() => {
                    let elapsed = start.elapsed().as_millis() as f64;
                    let json = response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| AuthError::UpstreamError {
                            provider: channel.provider_type.clone(),
                            message: e.to_string(),
                            retryable: false,
                        })?;
                    let canonical = converter.from_provider_response(&request.model, &json);
                    self.channels.record_outcome(
                        channel.id,
                        ProbeOutcome::Success {
                            response_time_ms: elapsed,
                        },
                        Utc::now(),
                    );
                    let usage = canonical.usage.as_ref();
                    return Ok((
                        canonical.clone(),
                        UsageRecord {
                            channel_id: channel.id,
                            provider_type: channel.provider_type.clone(),
                            duration_ms: elapsed,
                            prompt_tokens: usage.map(|u| u.prompt_tokens).unwrap_or(0),
                            completion_tokens: usage.map(|u| u.completion_tokens).unwrap_or(0),
                            success: true,
                        },
                    ));
                }
                Ok(response) => {
                    self.channels
                        .record_outcome(channel.id, ProbeOutcome::Failure, Utc::now());
                    let retryable = response.status().is_server_error() || response.status().as_u16() == 429;
                    let status = response.status();
                    if retryable && attempt < self.max_retries {
                        warn!(
                            "channel {} returned {}, excluding and retrying (attempt {attempt})",
                            channel.id, status
                        );
                        excluded.insert(channel.id);
                        continue;
                    }
                    return Err(AuthError::UpstreamError {
                        provider: channel.provider_type.clone(),
                        message: format!("status {status}"),
                        retryable,
                    });
                }
                Err(e) => {
                    self.channels
                        .record_outcome(channel.id, ProbeOutcome::Failure, Utc::now());
                    if attempt < self.max_retries {
                        warn!("channel {} connection error, excluding and retrying: {e}", channel.id);
                        excluded.insert(channel.id);
                        continue;
                    }
                    return Err(AuthError::UpstreamError {
                        provider: channel.provider_type.clone(),
                        message: e.to_string(),
                        retryable: true,
                    });
                }
            }
        }

        Err(AuthError::NoChannelAvailable {
            model: request.model,
        })
    }

    /// Streaming path: selects a channel, then pipes provider chunks through
    /// the converter into Server-Sent-Events framing. Retries are not
    /// attempted mid-stream — a dropped connection after bytes have already
    /// reached the client cannot be silently replayed on another channel.
    pub async fn stream(
        &self,
        request: CanonicalRequest,
        tenant_id: Uuid,
    ) -> Result<(Pin<Box<dyn Stream<Item = String> + Send>>, Uuid, String), AuthError> {
        let channel = self
            .channels
            .select(&request.model, tenant_id, &HashSet::new())
            .map_err(AuthError::from)?;

        let provider_type = self
            .registry
            .get_type(&channel.provider_type)
            .ok_or_else(|| ProviderError::UnknownType(channel.provider_type.clone()))?
            .clone();

        let converter_kind = channel.provider_type.clone();
        let converter = self.converter_for(&converter_kind);
        let mut body = converter.to_provider_request(&request);
        body["stream"] = serde_json::Value::Bool(true);

        let upstream_request = self.build_request(&provider_type, &channel, body)?;
        let response = upstream_request
            .send()
            .await
            .map_err(|e| AuthError::UpstreamError {
                provider: channel.provider_type.clone(),
                message: e.to_string(),
                retryable: true,
            })?;

        let model = request.model.clone();
        let channel_id = channel.id;
        let manager = self.channels.clone();
        let byte_stream = response.bytes_stream();

        let framed = byte_stream.filter_map(move |chunk| {
            let converter_kind = converter_kind.clone();
            let model = model.clone();
            let manager = manager.clone();
            async move {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("stream read error on channel {channel_id}: {e}");
                        manager.record_outcome(channel_id, ProbeOutcome::Failure, Utc::now());
                        return None;
                    }
                };
                let text = String::from_utf8_lossy(&bytes);
                let converter: Box<dyn Converter> = if converter_kind == "anthropic" {
                    Box::new(crate::converter::AnthropicConverter)
                } else {
                    Box::new(crate::converter::OpenAiConverter)
                };

                let mut events = String::new();
                for line in text.lines() {
                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if payload.trim() == "[DONE]" {
                        events.push_str("data: [DONE]\n\n");
                        continue;
                    }
                    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
                        continue;
                    };
                    if let Some(canonical) = converter.from_provider_chunk(&model, &value) {
                        if let Ok(json) = serde_json::to_string(&canonical) {
                            events.push_str("data: ");
                            events.push_str(&json);
                            events.push_str("\n\n");
                        }
                    }
                }
                if events.is_empty() {
                    None
                } else {
                    Some(events)
                }
            }
        });

        Ok((Box::pin(framed), channel_id, channel.provider_type.clone()))
    }
}
