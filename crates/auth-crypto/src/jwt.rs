//! JWT issuance and verification with a symmetric MAC (HS256/384/512).
//!
//! This module only deals with the cryptographic envelope: encoding claims,
//! checking the signature, expiry and `kind`. Revocation-set and
//! revoke-before checks live one layer up, in `auth-core`'s token service,
//! since they need a KV store this crate doesn't know about.

use crate::keys::KeyManager;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("token is malformed")]
    Format,
    #[error("token signature is invalid")]
    Signature,
    #[error("token has expired")]
    Expired,
    #[error("token kind mismatch: expected {expected}, got {actual}")]
    WrongKind { expected: String, actual: String },
}

impl JwtError {
    /// Structured reason per the spec's verify contract
    /// (`format`, `expired`, `revoked`, `wrong-kind`, `signature`).
    pub fn reason(&self) -> &'static str {
        match self {
            JwtError::Encoding(_) | JwtError::Format => "format",
            JwtError::Signature => "signature",
            JwtError::Expired => "expired",
            JwtError::WrongKind { .. } => "wrong-kind",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub tenant_id: String,
    /// `"access"` or `"refresh"`. Kept as a plain string so this crate does
    /// not need to depend on auth-core's token-kind enum.
    pub kind: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "gateway-platform".to_string(),
            audience: "gateway-platform".to_string(),
            access_token_ttl: chrono::Duration::minutes(60),
            refresh_token_ttl: chrono::Duration::days(7),
        }
    }
}

pub struct JwtService {
    config: JwtConfig,
    key_manager: KeyManager,
}

impl JwtService {
    pub fn new(config: JwtConfig, key_manager: KeyManager) -> Self {
        Self { config, key_manager }
    }

    fn ttl_for(&self, kind: &str) -> chrono::Duration {
        if kind == "refresh" {
            self.config.refresh_token_ttl
        } else {
            self.config.access_token_ttl
        }
    }

    /// Mint a signed token of the given kind for `sub`/`tenant_id`.
    pub fn issue(
        &self,
        sub: Uuid,
        tenant_id: Uuid,
        kind: &str,
        permissions: Vec<String>,
        roles: Vec<String>,
        scope: Option<String>,
    ) -> Result<(String, JwtClaims), JwtError> {
        let now = Utc::now();
        let exp = now + self.ttl_for(kind);

        let claims = JwtClaims {
            sub: sub.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind: kind.to_string(),
            permissions,
            roles,
            scope,
        };

        let header = Header::new(self.key_manager.algorithm());
        let token = encode(&header, &claims, &self.key_manager.encoding_key())?;
        Ok((token, claims))
    }

    /// Decode and verify signature/expiry/issuer/audience. Does not check
    /// revocation or kind; callers that care about kind use `decode_expect_kind`.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let mut validation = Validation::new(self.key_manager.algorithm());
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<JwtClaims>(token, &self.key_manager.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::Signature,
                _ => JwtError::Format,
            })?;

        Ok(token_data.claims)
    }

    /// Decode and additionally require `claims.kind == expected_kind`.
    pub fn decode_expect_kind(
        &self,
        token: &str,
        expected_kind: &str,
    ) -> Result<JwtClaims, JwtError> {
        let claims = self.decode(token)?;
        if claims.kind != expected_kind {
            return Err(JwtError::WrongKind {
                expected: expected_kind.to_string(),
                actual: claims.kind,
            });
        }
        Ok(claims)
    }

    pub fn is_expired(&self, claims: &JwtClaims) -> bool {
        claims.exp <= Utc::now().timestamp()
    }

    pub fn expiration(&self, claims: &JwtClaims) -> DateTime<Utc> {
        DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(JwtConfig::default(), KeyManager::new_for_testing())
    }

    #[test]
    fn issue_and_decode_round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let (token, _) = svc
            .issue(
                user_id,
                tenant_id,
                "access",
                vec!["user:read".to_string()],
                vec!["end_user".to_string()],
                None,
            )
            .unwrap();

        let claims = svc.decode_expect_kind(&token, "access").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.tenant_id, tenant_id.to_string());
        assert!(!svc.is_expired(&claims));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let svc = service();
        let (token, _) = svc
            .issue(Uuid::new_v4(), Uuid::new_v4(), "refresh", vec![], vec![], None)
            .unwrap();

        let err = svc.decode_expect_kind(&token, "access").unwrap_err();
        assert!(matches!(err, JwtError::WrongKind { .. }));
        assert_eq!(err.reason(), "wrong-kind");
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = JwtConfig::default();
        config.access_token_ttl = chrono::Duration::milliseconds(1);
        let svc = JwtService::new(config, KeyManager::new_for_testing());

        let (token, _) = svc
            .issue(Uuid::new_v4(), Uuid::new_v4(), "access", vec![], vec![], None)
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));

        let err = svc.decode(&token).unwrap_err();
        assert!(matches!(err, JwtError::Expired));
        assert_eq!(err.reason(), "expired");
    }
}
