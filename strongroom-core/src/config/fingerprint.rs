//! Fingerprint configuration

use crate::fingerprint::FingerprintMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Env: SR_FINGERPRINT_ENABLED
    /// Default: true
    pub enabled: bool,

    /// "basic" binds to the user agent, "shield" adds the client IP
    /// Env: SR_FINGERPRINT_MODE
    /// Default: basic
    pub mode: FingerprintMode,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self { enabled: true, mode: FingerprintMode::Basic }
    }
}

impl FingerprintConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(enabled) = env::var("SR_FINGERPRINT_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(mode) = env::var("SR_FINGERPRINT_MODE") {
            match mode.parse() {
                Ok(m) => self.mode = m,
                Err(_) => log::warn!("Ignoring SR_FINGERPRINT_MODE='{}'", mode),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
