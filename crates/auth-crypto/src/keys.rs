//! Symmetric signing-key management for the token issuer.
//!
//! The source RS256 keypair is gone: the spec signs with a shared secret
//! (HS256/384/512). The key never needs to be published, so there is no
//! JWK-set endpoint here, only an encoding/decoding key pair derived from
//! one secret.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing key is empty")]
    EmptySecret,
    #[error("unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),
}

/// Holds the process-wide HMAC signing secret and hands out `jsonwebtoken`
/// key handles for it. Cheap to clone: both key types are plain byte copies.
#[derive(Clone)]
pub struct KeyManager {
    secret: Secret<String>,
    algorithm: Algorithm,
}

impl KeyManager {
    pub fn new(secret: Secret<String>, algorithm: Algorithm) -> Result<Self, KeyError> {
        if secret.expose_secret().is_empty() {
            return Err(KeyError::EmptySecret);
        }
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {}
            other => return Err(KeyError::UnsupportedAlgorithm(other)),
        }
        Ok(Self { secret, algorithm })
    }

    /// Fixed secret for unit tests only.
    pub fn new_for_testing() -> Self {
        Self::new(
            Secret::new("test-signing-secret-do-not-use-in-production".to_string()),
            Algorithm::HS256,
        )
        .expect("static test secret is valid")
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_secret() {
        let err = KeyManager::new(Secret::new(String::new()), Algorithm::HS256);
        assert!(matches!(err, Err(KeyError::EmptySecret)));
    }

    #[test]
    fn rejects_asymmetric_algorithm() {
        let err = KeyManager::new(Secret::new("x".repeat(32)), Algorithm::RS256);
        assert!(matches!(err, Err(KeyError::UnsupportedAlgorithm(_))));
    }
}
