//! Crypto gateway
//!
//! Each session row carries its own random key (`skey`). The variable buffer
//! is sealed with that key and stored as base64 text in `data`.

mod xchacha;

pub use xchacha::XChaChaProvider;

use crate::error::{Result, SessionError};
use crate::storage::{Column, StorageAdapter};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Length in bytes of a freshly generated session key
pub const KEY_LENGTH: usize = 56;

/// Symmetric cipher used for session payloads
pub trait CipherProvider: Send + Sync {
    /// Seal `plaintext` under `key`
    fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Open a frame produced by [`CipherProvider::encrypt`]
    fn decrypt(&self, key: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// `len` random bytes from a secure source, as printable text
    fn random_key(&self, len: usize) -> String;
}

/// Key lookup plus base64 framing around a [`CipherProvider`]
#[derive(Clone)]
pub struct CryptoGateway {
    provider: Arc<dyn CipherProvider>,
}

impl Default for CryptoGateway {
    fn default() -> Self {
        Self::new(Arc::new(XChaChaProvider::new()))
    }
}

impl std::fmt::Debug for CryptoGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoGateway").finish_non_exhaustive()
    }
}

impl CryptoGateway {
    pub fn new(provider: Arc<dyn CipherProvider>) -> Self {
        Self { provider }
    }

    /// The stored key for `id`, or a fresh one if the row has none.
    ///
    /// A fresh key is not persisted here; it reaches storage with the next
    /// write of the session.
    pub fn retrieve_or_create_key(&self, storage: &dyn StorageAdapter, id: &str) -> Result<String> {
        let stored = storage.select_single(Column::Key, id)?;
        match stored.as_ref().and_then(|f| f.as_text()).filter(|k| !k.is_empty()) {
            Some(key) => Ok(key.to_string()),
            None => {
                log::trace!("No stored key for session, generating one");
                Ok(self.provider.random_key(KEY_LENGTH))
            }
        }
    }

    /// Decode base64 text and decrypt it
    pub fn open(&self, encoded: &str, key: &str) -> Result<Vec<u8>> {
        let frame = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SessionError::Crypto(format!("invalid base64 payload: {}", e)))?;
        self.provider.decrypt(key, &frame)
    }

    /// Encrypt and encode as base64 text
    pub fn seal(&self, plaintext: &[u8], key: &str) -> Result<String> {
        let frame = self.provider.encrypt(key, plaintext)?;
        Ok(STANDARD.encode(frame))
    }

    pub fn random_key(&self) -> String {
        self.provider.random_key(KEY_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::{self, SessionRecord};

    #[test]
    fn test_seal_open_roundtrip() {
        let gateway = CryptoGateway::default();
        let key = gateway.random_key();
        let sealed = gateway.seal(b"cart|a:0:{}", &key).unwrap();

        assert!(STANDARD.decode(&sealed).is_ok());
        assert_eq!(gateway.open(&sealed, &key).unwrap(), b"cart|a:0:{}");
    }

    #[test]
    fn test_open_rejects_bad_base64() {
        let gateway = CryptoGateway::default();
        assert!(matches!(gateway.open("***", "k"), Err(SessionError::Crypto(_))));
    }

    #[test]
    fn test_key_is_stable_once_stored() {
        let gateway = CryptoGateway::default();
        let adapter = storage::connect(&DatabaseConfig::in_memory()).unwrap();
        adapter.create_table().unwrap();

        // Nothing stored yet: every call yields a new key.
        let first = gateway.retrieve_or_create_key(adapter.as_ref(), "s1").unwrap();
        let second = gateway.retrieve_or_create_key(adapter.as_ref(), "s1").unwrap();
        assert_ne!(first, second);

        adapter
            .upsert(&SessionRecord {
                id: "s1".into(),
                user_id: 0,
                expire_at: 10,
                encrypted_data: String::new(),
                key: first.clone(),
            })
            .unwrap();
        assert_eq!(gateway.retrieve_or_create_key(adapter.as_ref(), "s1").unwrap(), first);
        assert_eq!(gateway.retrieve_or_create_key(adapter.as_ref(), "s1").unwrap(), first);
    }
}
