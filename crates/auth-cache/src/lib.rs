use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error};

#[async_trait]
pub trait Cache: Send + Sync {
    /// Object-safe core: every value crosses the trait boundary as JSON so
    /// `Cache` can be held behind `Arc<dyn Cache>`. Typed callers use the
    /// `get`/`set` methods below instead of calling this directly.
    async fn get_json(&self, key: &str) -> Option<serde_json::Value>;
    async fn set_json(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Typed convenience wrapper over `get_json`. `Self: Sized` keeps it out
    /// of the vtable so the trait stays object-safe; callers going through
    /// `Arc<dyn Cache>` use the identical inherent methods on `dyn Cache`
    /// below instead.
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        let value = self.get_json(key).await?;
        serde_json::from_value(value).ok()
    }

    async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        self.set_json(key, serde_json::to_value(value)?, ttl).await
    }
}

impl dyn Cache {
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_json(key).await?;
        serde_json::from_value(value).ok()
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        self.set_json(key, serde_json::to_value(value)?, ttl).await
    }
}

/// Atomic counters and sliding-window primitives backed by Redis, used for
/// login-lockout tracking, the unified rate limiter and one-shot codes
/// (MFA challenges, backup codes, revoked-token markers). These need real
/// cross-instance atomicity, so unlike `Cache` they always hit L2.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Record one event for `key` at the current time and return the number
    /// of events still inside the trailing `window`. Implemented with a
    /// Redis sorted set: each call adds a uniquely-scored member, trims
    /// everything older than `window`, and reports the remaining cardinality.
    async fn record_in_window(&self, key: &str, window: Duration) -> anyhow::Result<u64>;

    /// Current count within the trailing `window`, without recording a new
    /// event. Used for read-only remaining-quota checks.
    async fn count_in_window(&self, key: &str, window: Duration) -> anyhow::Result<u64>;

    /// Atomically increment an integer counter, creating it with the given
    /// TTL on first write. Used for simple (non-sliding) failure counters.
    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<i64>;

    /// Set-if-absent: returns `true` if `key` was not already present and is
    /// now set to `value` with the given TTL. Used for one-shot codes and
    /// the revoked-token set, where first-writer-wins matters.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Unconditional set with TTL, returning the previous value if any.
    /// Used for the per-(tenant,user) revoke-before stamp, which must be
    /// overwritable (a second "revoke all sessions" call must win).
    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn get_value(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Cheap existence check, without deserializing a value.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Clear a key outright (admin unlock, explicit revoke, logout-all).
    async fn clear(&self, key: &str) -> anyhow::Result<()>;
}

pub struct MultiLevelCache {
    l1: DashMap<String, (String, std::time::Instant)>, // Value (JSON), Expiry
    l2: Client,
}

impl MultiLevelCache {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            l1: DashMap::new(),
            l2: client,
        })
    }

    // Used for L1 invalidation simulation in tests
    pub fn invalidate_l1(&self, key: &str) {
        self.l1.remove(key);
    }

    async fn conn(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.l2.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl Cache for MultiLevelCache {
    async fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        // L1 Check
        if let Some(entry) = self.l1.get(key) {
            if entry.1 > std::time::Instant::now() {
                debug!("L1 Cache Hit: {}", key);
                if let Ok(val) = serde_json::from_str(&entry.0) {
                    return Some(val);
                }
            } else {
                // Expired
                drop(entry); // explicit drop to avoid deadlock if remove needs lock (DashMap handles this fine though)
                self.l1.remove(key);
            }
        }

        // L2 Check (Redis)
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                error!("Redis connection error: {}", e);
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(val_str)) => {
                debug!("L2 Cache Hit: {}", key);
                // Populate L1 (Default TTL 60s for simplicity if not stored)
                // In real app, fetch TTL from Redis or use config
                self.l1.insert(key.to_string(), (val_str.clone(), std::time::Instant::now() + Duration::from_secs(60)));

                serde_json::from_str(&val_str).ok()
            }
            Ok(None) => None,
            Err(e) => {
                error!("Redis get error: {}", e);
                None
            }
        }
    }

    async fn set_json(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()> {
        let val_str = serde_json::to_string(&value)?;

        // Update L1
        self.l1.insert(key.to_string(), (val_str.clone(), std::time::Instant::now() + ttl));

        // Update L2
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, val_str, ttl.as_secs().max(1)).await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.l1.remove(key);
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for MultiLevelCache {
    async fn record_in_window(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;
        let now_millis = chrono::Utc::now().timestamp_millis();
        let member = format!("{now_millis}-{}", uuid::Uuid::new_v4());
        let window_start = now_millis - window.as_millis() as i64;

        let _: () = conn.zadd(key, &member, now_millis).await?;
        let _: () = conn.zrembyscore(key, i64::MIN, window_start).await?;
        let count: u64 = conn.zcard(key).await?;
        let _: bool = conn.expire(key, window.as_secs().max(1) as i64).await?;

        Ok(count)
    }

    async fn count_in_window(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;
        let now_millis = chrono::Utc::now().timestamp_millis();
        let window_start = now_millis - window.as_millis() as i64;

        let _: () = conn.zrembyscore(key, i64::MIN, window_start).await?;
        let count: u64 = conn.zcard(key).await?;
        Ok(count)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let value: i64 = conn.incr(key, 1).await?;
        if value == 1 {
            let _: bool = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        }
        Ok(value)
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn clear(&self, key: &str) -> anyhow::Result<()> {
        self.l1.remove(key);
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_l1_removes_entry() {
        // Client::open validates the URL eagerly but never connects, so this
        // stays a pure in-memory test.
        let cache = MultiLevelCache::new("redis://127.0.0.1/").unwrap();
        cache.l1.insert(
            "k".to_string(),
            ("\"v\"".to_string(), std::time::Instant::now() + Duration::from_secs(60)),
        );
        cache.invalidate_l1("k");
        assert!(cache.l1.get("k").is_none());
    }
}
