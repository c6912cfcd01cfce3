//! Channel manager: the registry of configured provider routes, their live
//! metrics, and the weighted-selection algorithm that picks one per request.

use crate::error::ProviderError;
use crate::models::{Channel, ChannelMetrics, ChannelStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

/// Map of channel id -> channel, a parallel metrics map, and a model -> ids
/// reverse index. Reads are lock-free across channels; a write only takes
/// the shard lock for the entry it touches.
pub struct ChannelManager {
    channels: DashMap<Uuid, Channel>,
    metrics: DashMap<Uuid, ChannelMetrics>,
    model_index: DashMap<String, HashSet<Uuid>>,
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            metrics: DashMap::new(),
            model_index: DashMap::new(),
        }
    }

    pub fn register(&self, channel: Channel) {
        for model in &channel.models {
            self.model_index
                .entry(model.clone())
                .or_default()
                .insert(channel.id);
        }
        self.metrics.entry(channel.id).or_default();
        self.channels.insert(channel.id, channel);
    }

    /// Replaces a channel's configuration, re-indexing by model. Metrics are
    /// left untouched — the channel's track record carries over.
    pub fn update(&self, channel: Channel) {
        if let Some(old) = self.channels.get(&channel.id) {
            for model in &old.models {
                if let Some(mut ids) = self.model_index.get_mut(model) {
                    ids.remove(&channel.id);
                }
            }
        }
        for model in &channel.models {
            self.model_index
                .entry(model.clone())
                .or_default()
                .insert(channel.id);
        }
        self.channels.insert(channel.id, channel);
    }

    pub fn delete(&self, id: Uuid) {
        if let Some((_, channel)) = self.channels.remove(&id) {
            for model in &channel.models {
                if let Some(mut ids) = self.model_index.get_mut(model) {
                    ids.remove(&id);
                }
            }
        }
        self.metrics.remove(&id);
    }

    pub fn get(&self, id: Uuid) -> Option<Channel> {
        self.channels.get(&id).map(|c| c.clone())
    }

    pub fn list(&self, tenant_id: Uuid) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Every registered channel across tenants, for the health loop.
    pub fn all(&self) -> Vec<Channel> {
        self.channels.iter().map(|entry| entry.clone()).collect()
    }

    pub fn metrics_for(&self, id: Uuid) -> Option<ChannelMetrics> {
        self.metrics.get(&id).map(|m| m.clone())
    }

    /// Merges the outcome of one real request or health probe into a
    /// channel's metrics. Safe under concurrent writers from both the
    /// request path and the health loop.
    pub fn record_outcome(&self, id: Uuid, outcome: ProbeOutcome, at: DateTime<Utc>) {
        let mut metrics = self.metrics.entry(id).or_default();
        match outcome {
            ProbeOutcome::Success { response_time_ms } => {
                metrics.record_success(response_time_ms, at)
            }
            ProbeOutcome::Failure => metrics.record_failure(at),
        }
    }

    /// Picks one channel able to serve `model` for `tenant_id`, excluding
    /// any id in `exclude` (already tried and failed this request).
    pub fn select(
        &self,
        model: &str,
        tenant_id: Uuid,
        exclude: &HashSet<Uuid>,
    ) -> Result<Channel, ProviderError> {
        let now = Utc::now();

        let candidate_ids: Vec<Uuid> = self
            .model_index
            .get(model)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        let mut candidates: Vec<(Channel, ChannelMetrics)> = candidate_ids
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| {
                let channel = self.channels.get(&id)?.clone();
                if channel.tenant_id != tenant_id || channel.status != ChannelStatus::Active {
                    return None;
                }
                let metrics = self.metrics.get(&id).map(|m| m.clone()).unwrap_or_default();
                if channel.max_requests_per_minute > 0
                    && !self.within_quota(&channel, &metrics, now)
                {
                    return None;
                }
                Some((channel, metrics))
            })
            .filter(|(_, metrics)| metrics.is_healthy(now))
            .collect();

        if candidates.is_empty() {
            return Err(ProviderError::NoChannelAvailable(model.to_string()));
        }
        if candidates.len() == 1 {
            return Ok(candidates.remove(0).0);
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|(channel, metrics)| effective_weight(channel, metrics))
            .collect();
        let total: f64 = weights.iter().sum();
        let mut draw = rand::thread_rng().gen_range(0.0..total);
        for (idx, weight) in weights.iter().enumerate() {
            if draw < *weight {
                return Ok(candidates.remove(idx).0);
            }
            draw -= weight;
        }
        Ok(candidates.pop().expect("candidates checked non-empty above").0)
    }

    /// A channel with no recorded activity is always within quota; otherwise
    /// compares the count of requests actually seen in the last minute
    /// against the configured cap.
    fn within_quota(&self, channel: &Channel, metrics: &ChannelMetrics, now: DateTime<Utc>) -> bool {
        metrics.requests_in_last_minute(now) < channel.max_requests_per_minute
    }
}

pub enum ProbeOutcome {
    Success { response_time_ms: f64 },
    Failure,
}

/// `w_eff = max(1, weight * latency_factor * success_rate * priority_factor)`
fn effective_weight(channel: &Channel, metrics: &ChannelMetrics) -> f64 {
    let latency_factor = match metrics.ema_response_time_ms {
        Some(ema) => 1000.0 / ema.max(100.0),
        None => 1.0,
    };
    let priority_factor = 1.0 + (channel.priority as f64) / 100.0;
    let raw = channel.weight as f64 * latency_factor * metrics.success_rate * priority_factor;
    raw.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelHealth;

    fn test_channel(model: &str, weight: u32, priority: u32) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: "test".to_string(),
            provider_type: "openai".to_string(),
            models: vec![model.to_string()],
            credentials: serde_json::json!({}),
            weight,
            priority,
            max_requests_per_minute: 0,
            status: ChannelStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn selects_the_only_healthy_candidate() {
        let manager = ChannelManager::new();
        let channel = test_channel("gpt-4o", 1, 0);
        let id = channel.id;
        let tenant = channel.tenant_id;
        manager.register(channel);

        let selected = manager.select("gpt-4o", tenant, &HashSet::new()).unwrap();
        assert_eq!(selected.id, id);
    }

    #[test]
    fn excludes_unhealthy_channel_after_failures() {
        let manager = ChannelManager::new();
        let channel = test_channel("gpt-4o", 1, 0);
        let id = channel.id;
        let tenant = channel.tenant_id;
        manager.register(channel);

        let now = Utc::now();
        for _ in 0..5 {
            manager.record_outcome(id, ProbeOutcome::Failure, now);
        }

        let result = manager.select("gpt-4o", tenant, &HashSet::new());
        assert!(matches!(result, Err(ProviderError::NoChannelAvailable(_))));
    }

    #[test]
    fn no_channel_for_unknown_model() {
        let manager = ChannelManager::new();
        manager.register(test_channel("gpt-4o", 1, 0));
        let result = manager.select("claude-3-5-sonnet-20241022", Uuid::nil(), &HashSet::new());
        assert!(result.is_err());
    }

    #[test]
    fn higher_priority_channel_draws_more_often() {
        let lo = test_channel("gpt-4o", 1, 0);
        let hi = test_channel("gpt-4o", 1, 100);
        let hi_weight = effective_weight(&hi, &ChannelMetrics::default());
        let lo_weight = effective_weight(&lo, &ChannelMetrics::default());
        assert!(hi_weight > lo_weight);
    }

    #[test]
    fn deleted_channel_is_not_selectable() {
        let manager = ChannelManager::new();
        let channel = test_channel("gpt-4o", 1, 0);
        let id = channel.id;
        let tenant = channel.tenant_id;
        manager.register(channel);
        manager.delete(id);

        let result = manager.select("gpt-4o", tenant, &HashSet::new());
        assert!(result.is_err());
        assert!(manager.get(id).is_none());
    }

    #[test]
    fn health_flag_reflects_latest_probe() {
        let mut metrics = ChannelMetrics::default();
        let now = Utc::now();
        metrics.record_success(50.0, now);
        assert_eq!(metrics.health, ChannelHealth::Healthy);
        metrics.record_failure(now);
        assert_eq!(metrics.health, ChannelHealth::Unhealthy);
    }
}
