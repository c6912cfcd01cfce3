//! Sliding-window rate limiting, backed by the KV store's sorted-set
//! primitive so every instance in the fleet shares one count per key
//! rather than tracking requests in process memory.

use auth_cache::KvStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_minutes: i64,
}

pub struct RateLimiter {
    rules: HashMap<&'static str, RateLimitRule>,
    kv: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            "otp_request_per_identifier",
            RateLimitRule {
                max_requests: 5,
                window_minutes: 15,
            },
        );
        rules.insert(
            "otp_request_per_ip",
            RateLimitRule {
                max_requests: 10,
                window_minutes: 15,
            },
        );
        rules.insert(
            "otp_verification_per_session",
            RateLimitRule {
                max_requests: 5,
                window_minutes: 10,
            },
        );
        Self { rules, kv }
    }

    fn rule(&self, rule_name: &str) -> Result<RateLimitRule, String> {
        self.rules
            .get(rule_name)
            .copied()
            .ok_or_else(|| format!("unknown rate limit rule: {rule_name}"))
    }

    /// Records one event and reports whether the key is still within its
    /// limit. A KV outage fails open (the request proceeds) rather than
    /// locking users out because a rate-limit check couldn't run.
    pub async fn check_limit(&self, key: &str, rule_name: &str) -> Result<bool, String> {
        let rule = self.rule(rule_name)?;
        let window = StdDuration::from_secs((rule.window_minutes * 60) as u64);
        match self.kv.record_in_window(key, window).await {
            Ok(count) => Ok(count <= rule.max_requests as u64),
            Err(e) => {
                tracing::warn!("KV unreachable during rate limit check, allowing: {e}");
                Ok(true)
            }
        }
    }

    pub async fn get_remaining(&self, key: &str, rule_name: &str) -> Result<u32, String> {
        let rule = self.rule(rule_name)?;
        let window = StdDuration::from_secs((rule.window_minutes * 60) as u64);
        match self.kv.count_in_window(key, window).await {
            Ok(count) => Ok(rule.max_requests.saturating_sub(count as u32)),
            Err(e) => {
                tracing::warn!("KV unreachable fetching remaining quota: {e}");
                Ok(rule.max_requests)
            }
        }
    }

    pub async fn clear_limit(&self, key: &str) -> Result<(), String> {
        self.kv.clear(key).await.map_err(|e| e.to_string())
    }
}

pub fn identifier_key(tenant_id: &Uuid, identifier: &str) -> String {
    format!("otp:identifier:{tenant_id}:{identifier}")
}

pub fn ip_key(ip: &str) -> String {
    format!("otp:ip:{ip}")
}

pub fn session_key(session_id: &Uuid) -> String {
    format!("otp:session:{session_id}")
}

/// Only used so `get_reset_time`'s signature can stay expressive; the
/// sliding window itself has no single fixed reset instant the way a
/// fixed window does, so callers get an estimate based on the window size.
pub fn estimated_reset(rule: &RateLimitRule) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(rule.window_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeKv(AtomicU64);

    #[async_trait]
    impl KvStore for FakeKv {
        async fn record_in_window(&self, _key: &str, _window: StdDuration) -> anyhow::Result<u64> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
        async fn count_in_window(&self, _key: &str, _window: StdDuration) -> anyhow::Result<u64> {
            Ok(self.0.load(Ordering::SeqCst))
        }
        async fn incr(&self, _key: &str, _ttl: StdDuration) -> anyhow::Result<i64> {
            unimplemented!()
        }
        async fn set_nx(&self, _key: &str, _value: &str, _ttl: StdDuration) -> anyhow::Result<bool> {
            unimplemented!()
        }
        async fn set_value(&self, _key: &str, _value: &str, _ttl: StdDuration) -> anyhow::Result<()> {
            unimplemented!()
        }
        async fn get_value(&self, _key: &str) -> anyhow::Result<Option<String>> {
            unimplemented!()
        }
        async fn exists(&self, _key: &str) -> anyhow::Result<bool> {
            unimplemented!()
        }
        async fn clear(&self, _key: &str) -> anyhow::Result<()> {
            self.0.store(0, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn sixth_request_exceeds_limit() {
        let limiter = RateLimiter::new(Arc::new(FakeKv(AtomicU64::new(0))));
        for _ in 0..5 {
            assert!(limiter.check_limit("k", "otp_request_per_identifier").await.unwrap());
        }
        assert!(!limiter.check_limit("k", "otp_request_per_identifier").await.unwrap());
    }

    #[tokio::test]
    async fn clear_resets_the_window() {
        let limiter = RateLimiter::new(Arc::new(FakeKv(AtomicU64::new(5))));
        assert!(!limiter.check_limit("k", "otp_request_per_identifier").await.unwrap());
        limiter.clear_limit("k").await.unwrap();
        assert!(limiter.check_limit("k", "otp_request_per_identifier").await.unwrap());
    }
}
