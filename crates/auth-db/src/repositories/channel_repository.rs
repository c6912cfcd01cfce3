//! Tenant-scoped CRUD persistence for provider channels. The in-memory
//! `ChannelManager` is the source of truth for routing; this repository is
//! what reloads it at startup and what the channel admin endpoints write
//! through to.

use auth_core::error::AuthError;
use provider_core::{Channel, ChannelStatus};
use sqlx::{MySql, Pool, Row};
use uuid::Uuid;

/// A channel as persisted, before its credential ciphertext has been
/// unsealed. `channel.credentials` is `Null` until the caller decrypts
/// `encrypted_credentials` (the vault holds the key, not this repository).
pub struct StoredChannel {
    pub channel: Channel,
    pub encrypted_credentials: String,
}

#[derive(Clone)]
pub struct ChannelRepository {
    pool: Pool<MySql>,
}

impl ChannelRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<StoredChannel, sqlx::Error> {
        let id_str: String = row.try_get("id")?;
        let tenant_str: String = row.try_get("tenant_id")?;
        let models_json: serde_json::Value = row.try_get("models")?;
        let encrypted_credentials: String = row.try_get("credentials")?;
        let status_str: String = row.try_get("status")?;

        let channel = Channel {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            tenant_id: Uuid::parse_str(&tenant_str).unwrap_or_default(),
            name: row.try_get("name")?,
            provider_type: row.try_get("provider_type")?,
            models: serde_json::from_value(models_json).unwrap_or_default(),
            credentials: serde_json::Value::Null,
            weight: row.try_get::<i32, _>("weight")? as u32,
            priority: row.try_get::<i32, _>("priority")? as u32,
            max_requests_per_minute: row.try_get::<i32, _>("max_requests_per_minute")? as u32,
            status: match status_str.as_str() {
                "inactive" => ChannelStatus::Inactive,
                "maintenance" => ChannelStatus::Maintenance,
                _ => ChannelStatus::Active,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        Ok(StoredChannel {
            channel,
            encrypted_credentials,
        })
    }

    fn status_str(status: ChannelStatus) -> &'static str {
        match status {
            ChannelStatus::Active => "active",
            ChannelStatus::Inactive => "inactive",
            ChannelStatus::Maintenance => "maintenance",
        }
    }

    const SELECT: &'static str = "SELECT id, tenant_id, name, provider_type, models, credentials, weight, priority, max_requests_per_minute, status, created_at, updated_at FROM channels";

    /// Credentials are stored pre-encrypted by the caller (the channel admin
    /// handler holds the vault); this repository only moves opaque text.
    pub async fn create(&self, channel: &Channel, encrypted_credentials: &str) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, tenant_id, name, provider_type, models, credentials, weight, priority, max_requests_per_minute, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(channel.id.to_string())
        .bind(channel.tenant_id.to_string())
        .bind(&channel.name)
        .bind(&channel.provider_type)
        .bind(serde_json::to_value(&channel.models).unwrap())
        .bind(encrypted_credentials)
        .bind(channel.weight as i32)
        .bind(channel.priority as i32)
        .bind(channel.max_requests_per_minute as i32)
        .bind(Self::status_str(channel.status))
        .bind(channel.created_at)
        .bind(channel.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }

    pub async fn update(&self, channel: &Channel, encrypted_credentials: &str) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            UPDATE channels
            SET name = ?, models = ?, credentials = ?, weight = ?, priority = ?,
                max_requests_per_minute = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&channel.name)
        .bind(serde_json::to_value(&channel.models).unwrap())
        .bind(encrypted_credentials)
        .bind(channel.weight as i32)
        .bind(channel.priority as i32)
        .bind(channel.max_requests_per_minute as i32)
        .bind(Self::status_str(channel.status))
        .bind(channel.updated_at)
        .bind(channel.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredChannel>, AuthError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", Self::SELECT))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::from)?;
        row.map(|r| self.map_row(r)).transpose().map_err(AuthError::from)
    }

    pub async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<StoredChannel>, AuthError> {
        let rows = sqlx::query(&format!("{} WHERE tenant_id = ?", Self::SELECT))
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(AuthError::from)?;
        rows.into_iter().map(|r| self.map_row(r)).collect::<Result<_, _>>().map_err(AuthError::from)
    }

    /// All channels across tenants, for populating `ChannelManager` at startup.
    pub async fn find_all(&self) -> Result<Vec<StoredChannel>, AuthError> {
        let rows = sqlx::query(Self::SELECT)
            .fetch_all(&self.pool)
            .await
            .map_err(AuthError::from)?;
        rows.into_iter().map(|r| self.map_row(r)).collect::<Result<_, _>>().map_err(AuthError::from)
    }
}
