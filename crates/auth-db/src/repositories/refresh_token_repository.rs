//! Refresh token repository, with family tracking for rotation-breach detection.

use async_trait::async_trait;
use auth_core::error::AuthError;
use auth_core::models::RefreshToken;
use auth_core::services::token_service::RefreshTokenStore;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool, Row};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RefreshTokenError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("token not found")]
    TokenNotFound,
}

impl From<RefreshTokenError> for AuthError {
    fn from(err: RefreshTokenError) -> Self {
        match err {
            RefreshTokenError::TokenNotFound => AuthError::user_not_found(),
            RefreshTokenError::DatabaseError(e) => AuthError::from(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_family: Uuid,
    pub token_hash: String,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: Pool<MySql>,
}

impl RefreshTokenRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<RefreshTokenRecord, sqlx::Error> {
        let id_str: String = row.try_get("id")?;
        let user_id_str: String = row.try_get("user_id")?;
        let tenant_id_str: String = row.try_get("tenant_id")?;
        let family_str: String = row.try_get("token_family")?;

        Ok(RefreshTokenRecord {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
            tenant_id: Uuid::parse_str(&tenant_id_str).unwrap_or_default(),
            token_family: Uuid::parse_str(&family_str).unwrap_or_default(),
            token_hash: row.try_get("token_hash")?,
            device_fingerprint: row.try_get("device_fingerprint")?,
            user_agent: row.try_get("user_agent")?,
            ip_address: row.try_get("ip_address")?,
            expires_at: row.try_get("expires_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_reason: row.try_get("revoked_reason")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Save a fully formed refresh token record.
    pub async fn save(&self, record: &RefreshTokenRecord) -> Result<(), RefreshTokenError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id, user_id, tenant_id, token_family, token_hash,
                device_fingerprint, user_agent, ip_address,
                expires_at, revoked_at, revoked_reason, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.tenant_id.to_string())
        .bind(record.token_family.to_string())
        .bind(&record.token_hash)
        .bind(&record.device_fingerprint)
        .bind(&record.user_agent)
        .bind(&record.ip_address)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .bind(&record.revoked_reason)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RefreshTokenError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, tenant_id, token_family, token_hash,
                   device_fingerprint, user_agent, ip_address,
                   expires_at, revoked_at, revoked_reason, created_at
            FROM refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.map_row(r)).transpose().map_err(RefreshTokenError::from)
    }

    /// All records sharing a rotation family, most recent first.
    pub async fn find_by_family(
        &self,
        token_family: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, RefreshTokenError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, tenant_id, token_family, token_hash,
                   device_fingerprint, user_agent, ip_address,
                   expires_at, revoked_at, revoked_reason, created_at
            FROM refresh_tokens
            WHERE token_family = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(token_family.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| self.map_row(row))
            .collect::<Result<_, _>>()
            .map_err(RefreshTokenError::from)
    }

    pub async fn revoke_token(
        &self,
        token_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), RefreshTokenError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = ?, revoked_reason = ?
            WHERE id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(token_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RefreshTokenError::TokenNotFound);
        }

        Ok(())
    }

    /// Revoke every token sharing a family, for rotation-breach containment.
    pub async fn revoke_family(
        &self,
        token_family: Uuid,
        reason: &str,
    ) -> Result<u64, RefreshTokenError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = ?, revoked_reason = ?
            WHERE token_family = ? AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(token_family.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired(&self) -> Result<u64, RefreshTokenError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// A revoked token presented again signals the family may be compromised.
    pub async fn detect_breach(&self, token_hash: &str) -> Result<Option<Uuid>, RefreshTokenError> {
        let row = sqlx::query(
            "SELECT token_family FROM refresh_tokens WHERE token_hash = ? AND revoked_at IS NOT NULL",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let family_str: String = row.try_get("token_family")?;
                Ok(Uuid::parse_str(&family_str).ok())
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
    async fn create(&self, token: RefreshToken) -> Result<(), AuthError> {
        let record = RefreshTokenRecord {
            id: token.id,
            user_id: token.user_id,
            tenant_id: token.tenant_id,
            token_family: token.token_family,
            token_hash: token.token_hash,
            device_fingerprint: token.device_fingerprint,
            user_agent: token.user_agent,
            ip_address: token.ip_address,
            expires_at: token.expires_at,
            revoked_at: token.revoked_at,
            revoked_reason: token.revoked_reason,
            created_at: token.created_at,
        };

        self.save(&record).await.map_err(AuthError::from)
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<RefreshToken>, AuthError> {
        let record = self.find_by_token_hash(hash).await.map_err(AuthError::from)?;
        Ok(record.map(|record| RefreshToken {
            id: record.id,
            user_id: record.user_id,
            tenant_id: record.tenant_id,
            token_family: record.token_family,
            token_hash: record.token_hash,
            device_fingerprint: record.device_fingerprint,
            user_agent: record.user_agent,
            ip_address: record.ip_address,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
            revoked_reason: record.revoked_reason,
            created_at: record.created_at,
        }))
    }

    async fn revoke(&self, token_id: Uuid) -> Result<(), AuthError> {
        self.revoke_token(token_id, Some("rotated".to_string()))
            .await
            .map_err(AuthError::from)
    }
}
