//! Session configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Session lifetime and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime in seconds
    /// Env: SR_SESSION_LIFETIME
    /// Default: 1800 (30 minutes)
    pub lifetime: u64,

    /// Cookie domain, required
    /// Env: SR_SESSION_COOKIE_DOMAIN
    pub cookie_domain: String,

    /// Session (cookie) name
    /// Env: SR_SESSION_NAME
    /// Default: "SESSID"
    pub name: String,

    /// Env: SR_SESSION_COOKIE_PATH
    /// Default: "/"
    pub cookie_path: String,

    /// Set Secure flag on cookies (HTTPS only)
    /// Env: SR_SESSION_COOKIE_SECURE
    /// Default: true
    pub cookie_secure: bool,

    /// Set HttpOnly flag on cookies
    /// Env: SR_SESSION_COOKIE_HTTPONLY
    /// Default: true
    pub cookie_httponly: bool,

    /// Sweep expired rows whenever a session starts
    /// Env: SR_SESSION_GC_ON_START
    /// Default: true
    pub gc_on_start: bool,

    /// Background sweep interval in seconds for the janitor
    /// Env: SR_SESSION_GC_INTERVAL
    /// Default: 300 (5 minutes)
    pub gc_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: 1800,
            cookie_domain: String::new(),
            name: "SESSID".to_string(),
            cookie_path: "/".to_string(),
            cookie_secure: true,
            cookie_httponly: true,
            gc_on_start: true,
            gc_interval: 300,
        }
    }
}

impl SessionConfig {
    pub fn merge(&mut self, other: Self) {
        self.lifetime = other.lifetime;
        self.cookie_domain = other.cookie_domain;
        self.name = other.name;
        self.cookie_path = other.cookie_path;
        self.cookie_secure = other.cookie_secure;
        self.cookie_httponly = other.cookie_httponly;
        self.gc_on_start = other.gc_on_start;
        self.gc_interval = other.gc_interval;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(lifetime) = env::var("SR_SESSION_LIFETIME") {
            if let Ok(l) = lifetime.parse() {
                self.lifetime = l;
            }
        }

        if let Ok(domain) = env::var("SR_SESSION_COOKIE_DOMAIN") {
            self.cookie_domain = domain;
        }

        if let Ok(name) = env::var("SR_SESSION_NAME") {
            self.name = name;
        }

        if let Ok(path) = env::var("SR_SESSION_COOKIE_PATH") {
            self.cookie_path = path;
        }

        if let Ok(secure) = env::var("SR_SESSION_COOKIE_SECURE") {
            self.cookie_secure = secure.parse().unwrap_or(true);
        }

        if let Ok(httponly) = env::var("SR_SESSION_COOKIE_HTTPONLY") {
            self.cookie_httponly = httponly.parse().unwrap_or(true);
        }

        if let Ok(gc) = env::var("SR_SESSION_GC_ON_START") {
            self.gc_on_start = gc.parse().unwrap_or(true);
        }

        if let Ok(interval) = env::var("SR_SESSION_GC_INTERVAL") {
            if let Ok(i) = interval.parse() {
                self.gc_interval = i;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cookie_domain.trim().is_empty() {
            bail!("Cookie domain empty");
        }

        if self.lifetime == 0 {
            bail!("Invalid lifetime: must be greater than 0");
        }

        if self.lifetime > i64::MAX as u64 / 2 {
            bail!("Invalid lifetime: {} seconds is out of range", self.lifetime);
        }

        if self.name.is_empty()
            || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!("Invalid session name '{}': use letters, digits, '_' or '-'", self.name);
        }

        if self.gc_interval == 0 {
            bail!("Invalid gc_interval: must be greater than 0");
        }

        Ok(())
    }
}
