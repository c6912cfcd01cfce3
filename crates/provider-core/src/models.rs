//! Shapes shared across the provider registry, channel manager, and proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A single credential field a provider type expects (e.g. an API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialField {
    pub name: String,
    pub label: String,
    pub secret: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub context_window: u32,
    pub supports_streaming: bool,
}

/// Declares how to talk to one provider family: where to send requests, what
/// credentials it needs, and how to probe it for health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTypeConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub auth_header: String,
    pub auth_scheme: AuthScheme,
    pub probe_path: String,
    pub credential_fields: Vec<CredentialField>,
    pub models: Vec<ModelInfo>,
}

/// How the credential value is placed on the probe/proxy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Bearer,
    /// Sent verbatim under `auth_header`, e.g. Anthropic's `x-api-key`.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealth {
    Unknown,
    Healthy,
    Unhealthy,
}

/// A configured route to a provider account: which models it serves, its
/// cleartext credentials (held in memory only), and its selection weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub provider_type: String,
    pub models: Vec<String>,
    pub credentials: serde_json::Value,
    pub weight: u32,
    pub priority: u32,
    /// 0 means unlimited.
    pub max_requests_per_minute: u32,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live metrics for one channel, updated by both health probes and real
/// traffic through the same code path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub success_rate: f64,
    pub ema_response_time_ms: Option<f64>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub health: ChannelHealth,
    /// Timestamp of every request in roughly the last minute, for
    /// per-minute quota enforcement. Pruned on each write.
    pub recent_requests: VecDeque<DateTime<Utc>>,
}

impl Default for ChannelMetrics {
    fn default() -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            success_rate: 1.0,
            ema_response_time_ms: None,
            last_success: None,
            last_error: None,
            health: ChannelHealth::Unknown,
            recent_requests: VecDeque::new(),
        }
    }
}

const EMA_ALPHA: f64 = 0.3;

impl ChannelMetrics {
    pub fn record_success(&mut self, response_time_ms: f64, at: DateTime<Utc>) {
        self.ema_response_time_ms = Some(match self.ema_response_time_ms {
            Some(ema) => (1.0 - EMA_ALPHA) * ema + EMA_ALPHA * response_time_ms,
            None => response_time_ms,
        });
        self.last_success = Some(at);
        self.request_count += 1;
        self.recompute_success_rate();
        self.health = ChannelHealth::Healthy;
        self.track_request(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.error_count += 1;
        self.last_error = Some(at);
        self.request_count += 1;
        self.recompute_success_rate();
        self.health = ChannelHealth::Unhealthy;
        self.track_request(at);
    }

    fn track_request(&mut self, at: DateTime<Utc>) {
        self.recent_requests.push_back(at);
        while let Some(oldest) = self.recent_requests.front() {
            if at.signed_duration_since(*oldest) > chrono::Duration::minutes(1) {
                self.recent_requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Count of requests within the last minute of `now`, for quota checks.
    pub fn requests_in_last_minute(&self, now: DateTime<Utc>) -> u32 {
        self.recent_requests
            .iter()
            .filter(|t| now.signed_duration_since(**t) < chrono::Duration::minutes(1))
            .count() as u32
    }

    fn recompute_success_rate(&mut self) {
        self.success_rate = if self.request_count == 0 {
            1.0
        } else {
            (self.request_count - self.error_count) as f64 / self.request_count as f64
        };
    }

    /// A channel earns traffic while it answers and hasn't just fallen over:
    /// a healthy success rate, and no error in the last 5 minutes that is
    /// also the most recent event.
    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        if self.request_count > 0 && self.success_rate < 0.8 {
            return false;
        }
        let recent_error = match self.last_error {
            Some(err) => now.signed_duration_since(err) < chrono::Duration::minutes(5),
            None => false,
        };
        if !recent_error {
            return true;
        }
        match self.last_success {
            Some(ok) => self.last_error.unwrap() <= ok,
            None => false,
        }
    }
}
