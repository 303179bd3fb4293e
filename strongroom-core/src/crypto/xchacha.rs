//! Default cipher provider: XChaCha20-Poly1305 keyed through HKDF-SHA256

use super::CipherProvider;
use crate::error::{Result, SessionError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

const FRAME_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HKDF_INFO: &[u8] = b"strongroom:session-data:v1";

/// Authenticated encryption of session payloads.
///
/// Frame layout: `version | salt(16) | nonce(24) | ciphertext+tag`.
/// Salt and nonce are fresh per message, so sealing the same plaintext twice
/// never yields the same frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaChaProvider;

impl XChaChaProvider {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &str, salt: &[u8]) -> Result<XChaCha20Poly1305> {
        if key.is_empty() {
            return Err(SessionError::Crypto("empty session key".to_string()));
        }
        let hk = Hkdf::<Sha256>::new(Some(salt), key.as_bytes());
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(HKDF_INFO, &mut okm[..])
            .map_err(|e| SessionError::Crypto(format!("key derivation failed: {}", e)))?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(&okm[..])))
    }
}

impl CipherProvider for XChaChaProvider {
    fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let cipher = Self::cipher(key, &salt)?;
        let aad = [FRAME_VERSION];
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: &aad })
            .map_err(|_| SessionError::Crypto("encryption failed".to_string()))?;

        let mut frame = Vec::with_capacity(1 + SALT_LEN + NONCE_LEN + ciphertext.len());
        frame.push(FRAME_VERSION);
        frame.extend_from_slice(&salt);
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    fn decrypt(&self, key: &str, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.len() < 1 + SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(SessionError::Crypto(format!("ciphertext too short ({} bytes)", frame.len())));
        }
        if frame[0] != FRAME_VERSION {
            return Err(SessionError::Crypto(format!("unsupported frame version {}", frame[0])));
        }

        let (salt, rest) = frame[1..].split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let cipher = Self::cipher(key, salt)?;
        let aad = [FRAME_VERSION];
        cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| SessionError::Crypto("authentication failed".to_string()))
    }

    fn random_key(&self, len: usize) -> String {
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(bytes.as_mut_slice());
        STANDARD.encode(bytes.as_slice())
    }
}
