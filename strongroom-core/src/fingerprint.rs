//! Client fingerprinting
//!
//! A fingerprint is the hex SHA-256 of `STRONGROOM;<user agent>` (basic mode)
//! or `STRONGROOM;<user agent>;<client ip>` (shield mode). It is stored in
//! the session on every start and compared on the next one; a different
//! value means the session id is being replayed by another client.
//!
//! Shield mode also binds to the client IP and therefore rejects clients
//! whose address changes between requests (mobile carriers, rotating
//! proxies).

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Namespace prepended to every fingerprint input
pub const FINGERPRINT_PREFIX: &str = "STRONGROOM";

const SEPARATOR: char = ';';

/// What the fingerprint binds to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// User agent only
    #[default]
    Basic,
    /// User agent and client IP
    Shield,
}

impl fmt::Display for FingerprintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintMode::Basic => f.write_str("basic"),
            FingerprintMode::Shield => f.write_str("shield"),
        }
    }
}

impl FromStr for FingerprintMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(FingerprintMode::Basic),
            "shield" => Ok(FingerprintMode::Shield),
            other => {
                Err(SessionError::Configuration(format!("unknown fingerprint mode '{}'", other)))
            }
        }
    }
}

/// Request metadata the store needs from the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    /// Raw `X-Forwarded-For` value, possibly a comma-separated chain
    pub forwarded_for: Option<String>,
    /// Raw `Client-IP` value
    pub client_ip: Option<String>,
    /// Transport peer address
    pub remote_addr: Option<String>,
}

impl RequestMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect metadata from an HTTP request and its peer address
    pub fn from_request<B>(req: &http::Request<B>, peer: Option<SocketAddr>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            user_agent: header("user-agent"),
            forwarded_for: header("x-forwarded-for"),
            client_ip: header("client-ip"),
            remote_addr: peer.map(|addr| addr.ip().to_string()),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_forwarded_for(mut self, value: &str) -> Self {
        self.forwarded_for = Some(value.to_string());
        self
    }

    pub fn with_client_ip(mut self, value: &str) -> Self {
        self.client_ip = Some(value.to_string());
        self
    }

    pub fn with_remote_addr(mut self, value: &str) -> Self {
        self.remote_addr = Some(value.to_string());
        self
    }

    /// Client IP: forwarded-for first, then client-ip, then the peer.
    ///
    /// The first source present is used; if it is not a valid IPv4 or IPv6
    /// literal the result is `None`, later sources are not consulted.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded =
            self.forwarded_for.as_deref().and_then(|chain| chain.split(',').next()).map(str::trim);
        let candidate = [forwarded, self.client_ip.as_deref(), self.remote_addr.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty())?;
        candidate.parse().ok()
    }
}

/// Computes and verifies client fingerprints
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintGuard {
    mode: FingerprintMode,
}

impl FingerprintGuard {
    pub fn new(mode: FingerprintMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    /// Fingerprint for `meta`, or `None` when the request has no user agent.
    ///
    /// In shield mode a request without a usable IP hashes an empty IP
    /// segment.
    pub fn compute(&self, meta: &RequestMeta) -> Option<String> {
        let user_agent = meta.user_agent.as_deref().filter(|ua| !ua.is_empty())?;

        let mut input = format!("{}{}{}", FINGERPRINT_PREFIX, SEPARATOR, user_agent);
        if self.mode == FingerprintMode::Shield {
            input.push(SEPARATOR);
            if let Some(ip) = meta.client_ip() {
                input.push_str(&ip.to_string());
            }
        }

        Some(hex::encode(Sha256::digest(input.as_bytes())))
    }

    /// Compare a stored fingerprint against the current request
    pub fn check(&self, stored: Option<&str>, meta: &RequestMeta) -> Result<()> {
        let stored = stored
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SessionError::FingerprintMismatch("no stored fingerprint".to_string()))?;
        let current = self.compute(meta).ok_or_else(|| {
            SessionError::FingerprintMismatch("request has no user agent".to_string())
        })?;

        if current.as_bytes() == stored.as_bytes() {
            Ok(())
        } else {
            Err(SessionError::FingerprintMismatch(format!("{} fingerprint differs", self.mode)))
        }
    }

    pub fn verify(&self, stored: Option<&str>, meta: &RequestMeta) -> bool {
        self.check(stored, meta).is_ok()
    }
}
