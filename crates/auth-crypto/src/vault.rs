//! Credential vault: AEAD encryption of provider credentials at rest.
//!
//! Mirrors the original encryption helper (SHA-256 of a process secret,
//! used directly as a symmetric key) but swaps Fernet for
//! `ring::aead::AES_256_GCM`: a random 96-bit nonce is prepended to the
//! ciphertext and the whole thing is base64-encoded. Decrypted credentials
//! are handed to callers as cleartext `serde_json::Value` and are not
//! re-encrypted while held in memory by the channel manager.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("credential payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("ciphertext is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("ciphertext is too short to contain a nonce")]
    Truncated,
    #[error("encryption failed")]
    Seal,
    #[error("decryption failed: ciphertext is invalid or the key is wrong")]
    Open,
}

/// Keyed from the process-wide AEAD secret. Stateless beyond the derived key
/// and a system RNG, so it is cheap to share behind an `Arc`.
pub struct CredentialVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialVault {
    pub fn new(secret: &Secret<String>) -> Self {
        let key_bytes = digest(&SHA256, secret.expose_secret().as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes.as_ref())
            .expect("SHA-256 digest is exactly 32 bytes, valid for AES-256-GCM");
        Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt a credential payload, returning a base64 string safe to store
    /// in the channel's `credentials` column.
    pub fn encrypt(&self, credentials: &serde_json::Value) -> Result<String, VaultError> {
        let plaintext = serde_json::to_vec(credentials)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::Seal)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext;
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypt a value produced by `encrypt`, returning cleartext JSON.
    pub fn decrypt(&self, encoded: &str) -> Result<serde_json::Value, VaultError> {
        let raw = URL_SAFE_NO_PAD.decode(encoded)?;
        if raw.len() < NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| VaultError::Open)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Open)?;

        Ok(serde_json::from_slice(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_credentials() {
        let vault = CredentialVault::new(&Secret::new("vault-test-secret".to_string()));
        let creds = json!({"api_key": "sk-test-123", "org_id": "org_abc"});

        let encrypted = vault.encrypt(&creds).unwrap();
        assert_ne!(encrypted, creds.to_string());

        let decrypted = vault.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, creds);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let vault_a = CredentialVault::new(&Secret::new("key-a".to_string()));
        let vault_b = CredentialVault::new(&Secret::new("key-b".to_string()));

        let encrypted = vault_a.encrypt(&json!({"api_key": "x"})).unwrap();
        assert!(matches!(vault_b.decrypt(&encrypted), Err(VaultError::Open)));
    }

    #[test]
    fn distinct_nonces_produce_distinct_ciphertexts() {
        let vault = CredentialVault::new(&Secret::new("vault-test-secret".to_string()));
        let creds = json!({"api_key": "sk-test-123"});

        let a = vault.encrypt(&creds).unwrap();
        let b = vault.encrypt(&creds).unwrap();
        assert_ne!(a, b);
    }
}
