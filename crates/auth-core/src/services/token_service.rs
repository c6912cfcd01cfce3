//! Token issuance, verification, rotation and revocation.
//!
//! The revocation set and the per-(tenant,user) "revoke-before" stamp both
//! live in the KV store behind `auth_cache::KvStore`, keyed with the token's
//! remaining lifetime as TTL so entries expire themselves. If the KV store
//! is unreachable, creation and signature verification still succeed;
//! revocation checks degrade to "not revoked" and log, per the fail-open
//! policy for ancillary checks.

use crate::error::AuthError;
use crate::models::token::{TokenFailureReason, TokenKind};
use crate::models::{AccessToken, Claims, RefreshToken, TokenPair};
use async_trait::async_trait;
use auth_cache::KvStore;
use auth_crypto::{JwtClaims, JwtError, JwtService};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::warn;
use uuid::Uuid;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: RefreshToken) -> Result<(), AuthError>;
    async fn find_by_hash(&self, hash: &str) -> Result<Option<RefreshToken>, AuthError>;
    async fn revoke(&self, token_id: Uuid) -> Result<(), AuthError>;
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn issue_pair(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        permissions: Vec<String>,
        roles: Vec<String>,
    ) -> Result<TokenPair, AuthError>;

    /// Verify a token of the expected kind. Returns the structured failure
    /// reason on rejection rather than a generic error so callers can map
    /// it onto the `AuthRequired` taxonomy entry.
    async fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, TokenFailureReason>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Add this token's id to the revocation set for its remaining lifetime.
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), AuthError>;

    /// Stamp (tenant, user) so every token issued before now is rejected.
    async fn revoke_all_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AuthError>;
}

fn revocation_key(jti: Uuid) -> String {
    format!("token:revoked:{jti}")
}

fn revoke_before_key(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("token:revoke-before:{tenant_id}:{user_id}")
}

pub struct TokenEngine {
    jwt_service: JwtService,
    kv: Arc<dyn KvStore>,
    refresh_store: Arc<dyn RefreshTokenStore>,
}

impl TokenEngine {
    pub fn new(
        jwt_service: JwtService,
        kv: Arc<dyn KvStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            jwt_service,
            kv,
            refresh_store,
        }
    }

    fn to_core_claims(claims: &JwtClaims) -> Claims {
        Claims {
            sub: claims.sub.clone(),
            iss: claims.iss.clone(),
            aud: claims.aud.clone(),
            exp: claims.exp,
            iat: claims.iat,
            nbf: claims.nbf,
            jti: claims.jti.clone(),
            tenant_id: claims.tenant_id.clone(),
            kind: if claims.kind == "refresh" {
                TokenKind::Refresh
            } else {
                TokenKind::Access
            },
            permissions: claims.permissions.clone(),
            roles: claims.roles.clone(),
            scope: claims.scope.clone(),
        }
    }

}

#[async_trait]
impl TokenProvider for TokenEngine {
    async fn issue_pair(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        permissions: Vec<String>,
        roles: Vec<String>,
    ) -> Result<TokenPair, AuthError> {
        let (access_raw, access_claims) = self
            .jwt_service
            .issue(user_id, tenant_id, "access", permissions, roles, None)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let (refresh_raw, refresh_claims) = self
            .jwt_service
            .issue(user_id, tenant_id, "refresh", vec![], vec![], None)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let refresh_token = RefreshToken {
            id: Uuid::parse_str(&refresh_claims.jti).unwrap_or_else(|_| Uuid::new_v4()),
            user_id,
            tenant_id,
            token_family: Uuid::new_v4(),
            token_hash: refresh_raw.clone(),
            device_fingerprint: None,
            user_agent: None,
            ip_address: None,
            expires_at: self.jwt_service.expiration(&refresh_claims),
            revoked_at: None,
            revoked_reason: None,
            created_at: Utc::now(),
        };
        self.refresh_store.create(refresh_token).await?;

        Ok(TokenPair {
            access_token: AccessToken {
                token: access_raw,
                token_type: "Bearer".to_string(),
                expires_in: (self.jwt_service.expiration(&access_claims) - Utc::now())
                    .num_seconds()
                    .max(0) as u64,
                scope: access_claims.scope,
            },
            refresh_token: refresh_raw,
        })
    }

    async fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, TokenFailureReason> {
        let expected_str = match expected_kind {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        };

        let jwt_claims = self
            .jwt_service
            .decode_expect_kind(token, expected_str)
            .map_err(|e| match e {
                JwtError::Format | JwtError::Encoding(_) => TokenFailureReason::Format,
                JwtError::Signature => TokenFailureReason::Signature,
                JwtError::Expired => TokenFailureReason::Expired,
                JwtError::WrongKind { .. } => TokenFailureReason::WrongKind,
            })?;

        let jti = Uuid::parse_str(&jwt_claims.jti).map_err(|_| TokenFailureReason::Format)?;
        let revoked = match self.kv.exists(&revocation_key(jti)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("KV unreachable during revocation check, allowing: {e}");
                false
            }
        };
        if revoked {
            return Err(TokenFailureReason::Revoked);
        }

        if let (Ok(tenant_id), Ok(user_id)) = (
            Uuid::parse_str(&jwt_claims.tenant_id),
            Uuid::parse_str(&jwt_claims.sub),
        ) {
            let key = revoke_before_key(tenant_id, user_id);
            match self.kv.get_value(&key).await {
                Ok(Some(stamp)) => {
                    if let Ok(revoke_before) = stamp.parse::<i64>() {
                        if jwt_claims.iat < revoke_before {
                            return Err(TokenFailureReason::Revoked);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("KV unreachable during revoke-before check, allowing: {e}"),
            }
        }

        Ok(Self::to_core_claims(&jwt_claims))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let record = self
            .refresh_store
            .find_by_hash(refresh_token)
            .await?
            .ok_or_else(AuthError::invalid_credentials)?;

        if record.revoked_at.is_some() || record.expires_at < Utc::now() {
            return Err(AuthError::AuthRequired {
                reason: "revoked".to_string(),
            });
        }

        // Rotation: the old refresh token id is retired immediately.
        self.refresh_store.revoke(record.id).await?;
        self.revoke_token(record.id, record.expires_at).await?;

        self.issue_pair(record.user_id, record.tenant_id, vec![], vec![])
            .await
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        let ttl = (expires_at - Utc::now()).num_seconds().max(1) as u64;
        if let Err(e) = self
            .kv
            .set_nx(&revocation_key(jti), "1", StdDuration::from_secs(ttl))
            .await
        {
            warn!("failed to record revocation for {jti}, will rely on expiry: {e}");
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AuthError> {
        let key = revoke_before_key(tenant_id, user_id);
        let stamp = Utc::now().timestamp();
        // Covers the longest-lived token kind (refresh tokens) so the stamp
        // outlives anything it needs to reject.
        let ttl = StdDuration::from_secs(Duration::days(7).num_seconds() as u64);
        self.kv
            .set_value(&key, &stamp.to_string(), ttl)
            .await
            .map_err(|e| AuthError::DependencyUnavailable {
                dependency: format!("kv store: {e}"),
            })?;
        Ok(())
    }
}
