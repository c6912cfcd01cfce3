//! Background health loop: wakes on an interval and fans out one probe per
//! channel concurrently, feeding outcomes back into the same metrics the
//! request path writes to.

use crate::channel::{ChannelManager, ProbeOutcome};
use crate::registry::{probe, ProviderTypeRegistry};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub struct HealthLoop {
    channels: Arc<ChannelManager>,
    registry: Arc<ProviderTypeRegistry>,
    client: reqwest::Client,
    interval: Duration,
}

impl HealthLoop {
    pub fn new(
        channels: Arc<ChannelManager>,
        registry: Arc<ProviderTypeRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            channels,
            registry,
            client: reqwest::Client::new(),
            interval,
        }
    }

    /// Runs forever; intended to be spawned as a single background task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let channels = self.channels.all();

            let probes = channels.into_iter().map(|channel| {
                let registry = self.registry.clone();
                let manager = self.channels.clone();
                let client = self.client.clone();
                async move {
                    let Some(provider_type) = registry.get_type(&channel.provider_type) else {
                        warn!("channel {} references unknown provider type {}", channel.id, channel.provider_type);
                        return;
                    };

                    let start = Instant::now();
                    let outcome = tokio::time::timeout(
                        Duration::from_secs(5),
                        probe(provider_type, &channel.credentials, &client),
                    )
                    .await;

                    let result = match outcome {
                        Ok(Ok(())) => ProbeOutcome::Success {
                            response_time_ms: start.elapsed().as_millis() as f64,
                        },
                        Ok(Err(e)) => {
                            warn!("health probe failed for channel {}: {e}", channel.id);
                            ProbeOutcome::Failure
                        }
                        Err(_) => {
                            warn!("health probe timed out for channel {}", channel.id);
                            ProbeOutcome::Failure
                        }
                    };
                    manager.record_outcome(channel.id, result, Utc::now());
                }
            });

            futures::future::join_all(probes).await;
        }
    }
}
