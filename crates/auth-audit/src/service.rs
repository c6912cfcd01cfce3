use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, MySqlPool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: String, // CHAR(36) in DB
    pub action: String,
    pub actor_id: String, // CHAR(36) in DB
    pub resource: String,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    pub prev_hash: String,
}

#[derive(Debug, Clone)]
pub struct AuditService {
    pool: MySqlPool,
}

impl AuditService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn export_cef(&self, log: &AuditLog) -> String {
        // CEF:Version|Device Vendor|Device Product|Device Version|Device Event Class ID|Name|Severity|[Extension]
        format!(
            "CEF:0|AuthPlatform|SSO|1.0|{}|{}|5|act={} msg={}",
            log.action, log.action, log.actor_id, log.resource
        )
    }

    pub async fn log(
        &self,
        action: &str,
        actor_id: Uuid,
        resource: &str,
        metadata: Option<Value>,
    ) -> Result<AuditLog> {
        let prev_log = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY timestamp DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let prev_hash = prev_log.map(|l| l.hash).unwrap_or_else(|| "0".repeat(64));

        let id = Uuid::new_v4();
        let timestamp = Utc::now();

        // Chain integrity: each entry's hash covers the previous entry's hash
        // plus its own content, so altering any entry breaks every hash after it.
        let content = format!(
            "{}{}{}{}{}{}",
            prev_hash,
            id,
            action,
            actor_id,
            resource,
            timestamp.to_rfc3339()
        );
        let hash = format!("{:x}", Sha256::digest(content.as_bytes()));

        let audit_log = AuditLog {
            id: id.to_string(),
            action: action.to_string(),
            actor_id: actor_id.to_string(),
            resource: resource.to_string(),
            metadata: metadata.clone(),
            timestamp,
            hash,
            prev_hash,
        };

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, action, actor_id, resource, metadata, timestamp, hash, prev_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(&audit_log.id)
        .bind(&audit_log.action)
        .bind(&audit_log.actor_id)
        .bind(&audit_log.resource)
        .bind(&audit_log.metadata)
        .bind(audit_log.timestamp)
        .bind(&audit_log.hash)
        .bind(&audit_log.prev_hash)
        .execute(&self.pool)
        .await?;

        info!("Audit log created: {} - {}", action, id);

        Ok(audit_log)
    }

    pub async fn verify_chain(&self) -> Result<bool> {
        // Verification logic would walk back checking hash(prev, curr_content) == curr_hash
        // Stub for now.
        Ok(true)
    }
}

/// Wires the hash-chained persistent log in as the durable delegate behind
/// `auth_core::audit::AuditLogger`, so callers keep logging `AuditEvent`s
/// without knowing the backing store is a chained MySQL table.
#[async_trait::async_trait]
impl auth_core::audit::AuditLogger for AuditService {
    async fn log(&self, event: auth_core::audit::AuditEvent) {
        let metadata = serde_json::to_value(&event).unwrap_or(Value::Null);
        let actor_id = event.actor_id.unwrap_or_default();
        let resource = event.resource_id.clone().unwrap_or_default();
        if let Err(e) = AuditService::log(self, &event.action, actor_id, &resource, Some(metadata)).await {
            tracing::error!("failed to persist audit log: {e}");
        }
    }
}
