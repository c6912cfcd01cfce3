//! Session registry: an independent audit surface, not required for token
//! validity. Sessions live entirely in the KV store under a TTL and are
//! looked up by their opaque id; nothing about token verification depends on
//! a session existing.

use crate::error::AuthError;
use crate::models::Session;
use auth_cache::KvStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SESSION_TTL_REMEMBER: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const INDEX_TTL: Duration = SESSION_TTL_REMEMBER;

fn session_key(id: Uuid) -> String {
    format!("session:{id}")
}

fn index_key(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("session:index:{tenant_id}:{user_id}")
}

pub struct SessionService {
    kv: Arc<dyn KvStore>,
}

impl SessionService {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn create_session(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        client_address: Option<String>,
        remember: bool,
    ) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            tenant_id,
            client_address,
            created_at: now,
            last_seen_at: now,
        };

        let ttl = if remember { SESSION_TTL_REMEMBER } else { SESSION_TTL };
        let serialized = serde_json::to_string(&session).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.kv
            .set_value(&session_key(session.id), &serialized, ttl)
            .await
            .map_err(|e| AuthError::DependencyUnavailable {
                dependency: format!("kv store: {e}"),
            })?;

        self.add_to_index(tenant_id, user_id, session.id).await;

        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AuthError> {
        let raw = self.kv.get_value(&session_key(id)).await.map_err(|e| AuthError::DependencyUnavailable {
            dependency: format!("kv store: {e}"),
        })?;
        let Some(raw) = raw else { return Ok(None) };
        serde_json::from_str(&raw).map(Some).map_err(|e| AuthError::Internal(e.to_string()))
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<(), AuthError> {
        self.kv.clear(&session_key(id)).await.map_err(|e| AuthError::DependencyUnavailable {
            dependency: format!("kv store: {e}"),
        })
    }

    /// Deletes every session the index knows about for this user. The index
    /// is best-effort: a session whose key already expired is simply a no-op
    /// delete, and a session created concurrently with this call may survive
    /// until its own TTL runs out.
    pub async fn revoke_all_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AuthError> {
        let key = index_key(tenant_id, user_id);
        let raw = self.kv.get_value(&key).await.map_err(|e| AuthError::DependencyUnavailable {
            dependency: format!("kv store: {e}"),
        })?;

        if let Some(raw) = raw {
            for id in raw.split(',').filter(|s| !s.is_empty()) {
                if let Ok(id) = id.parse::<Uuid>() {
                    if let Err(e) = self.kv.clear(&session_key(id)).await {
                        warn!("failed to clear session {id} during revoke-all: {e}");
                    }
                }
            }
        }

        self.kv.clear(&key).await.map_err(|e| AuthError::DependencyUnavailable {
            dependency: format!("kv store: {e}"),
        })
    }

    async fn add_to_index(&self, tenant_id: Uuid, user_id: Uuid, session_id: Uuid) {
        let key = index_key(tenant_id, user_id);
        let existing = self.kv.get_value(&key).await.unwrap_or(None).unwrap_or_default();
        let updated = if existing.is_empty() {
            session_id.to_string()
        } else {
            format!("{existing},{session_id}")
        };
        if let Err(e) = self.kv.set_value(&key, &updated, INDEX_TTL).await {
            warn!("failed to update session index for {tenant_id}:{user_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct FakeKv(DashMap<String, String>);

    #[async_trait::async_trait]
    impl KvStore for FakeKv {
        async fn record_in_window(&self, _key: &str, _window: Duration) -> anyhow::Result<u64> {
            unimplemented!()
        }
        async fn count_in_window(&self, _key: &str, _window: Duration) -> anyhow::Result<u64> {
            unimplemented!()
        }
        async fn incr(&self, _key: &str, _ttl: Duration) -> anyhow::Result<i64> {
            unimplemented!()
        }
        async fn set_nx(&self, _key: &str, _value: &str, _ttl: Duration) -> anyhow::Result<bool> {
            unimplemented!()
        }
        async fn set_value(&self, key: &str, value: &str, _ttl: Duration) -> anyhow::Result<()> {
            self.0.insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn get_value(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.get(key).map(|v| v.clone()))
        }
        async fn exists(&self, key: &str) -> anyhow::Result<bool> {
            Ok(self.0.contains_key(key))
        }
        async fn clear(&self, key: &str) -> anyhow::Result<()> {
            self.0.remove(key);
            Ok(())
        }
    }

    fn service() -> SessionService {
        SessionService::new(Arc::new(FakeKv(DashMap::new())))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let session = svc
            .create_session(user_id, tenant_id, Some("127.0.0.1".to_string()), false)
            .await
            .unwrap();

        let fetched = svc.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user_id);
        assert_eq!(fetched.tenant_id, tenant_id);
    }

    #[tokio::test]
    async fn delete_session_removes_it() {
        let svc = service();
        let session = svc.create_session(Uuid::new_v4(), Uuid::new_v4(), None, false).await.unwrap();
        svc.delete_session(session.id).await.unwrap();
        assert!(svc.get_session(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_for_user_clears_every_session() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let a = svc.create_session(user_id, tenant_id, None, false).await.unwrap();
        let b = svc.create_session(user_id, tenant_id, None, true).await.unwrap();

        svc.revoke_all_for_user(tenant_id, user_id).await.unwrap();

        assert!(svc.get_session(a.id).await.unwrap().is_none());
        assert!(svc.get_session(b.id).await.unwrap().is_none());
    }
}
