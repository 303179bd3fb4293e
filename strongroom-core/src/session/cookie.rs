//! Session cookie parameters

use crate::config::SessionConfig;
use chrono::{Duration, Utc};

/// Cookie attributes for the session id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieParams {
    pub name: String,
    pub domain: String,
    pub path: String,
    /// Seconds; also the session lifetime
    pub lifetime: u64,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag (no JavaScript access)
    pub http_only: bool,
}

impl CookieParams {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.name.clone(),
            domain: config.cookie_domain.clone(),
            path: config.cookie_path.clone(),
            lifetime: config.lifetime,
            secure: config.cookie_secure,
            http_only: config.cookie_httponly,
        }
    }

    /// `Set-Cookie` value carrying `session_id`
    pub fn set_cookie_header(&self, session_id: &str) -> String {
        let expires = i64::try_from(self.lifetime)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| Utc::now().checked_add_signed(d));

        let mut parts = vec![format!("{}={}", self.name, session_id)];
        if let Some(expires) = expires {
            parts.push(format!("Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }
        parts.push(format!("Max-Age={}", self.lifetime));
        self.push_scope(&mut parts);
        parts.join("; ")
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn expire_cookie_header(&self) -> String {
        let mut parts = vec![
            format!("{}=deleted", self.name),
            "Expires=Thu, 01 Jan 1970 00:00:01 GMT".to_string(),
            "Max-Age=0".to_string(),
        ];
        self.push_scope(&mut parts);
        parts.join("; ")
    }

    fn push_scope(&self, parts: &mut Vec<String>) {
        parts.push(format!("Path={}", self.path));
        if !self.domain.is_empty() {
            parts.push(format!("Domain={}", self.domain));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
    }

    /// Session id from a `Cookie` request header
    pub fn extract_from_header(&self, cookie_header: &str) -> Option<String> {
        cookie_header.split(';').find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == self.name).then(|| value.trim_matches('"').to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CookieParams {
        CookieParams {
            name: "SESSID".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            lifetime: 3600,
            secure: true,
            http_only: true,
        }
    }

    #[test]
    fn test_set_cookie_header() {
        let header = params().set_cookie_header("abc123");
        assert!(header.starts_with("SESSID=abc123; Expires="));
        assert!(header.contains("Max-Age=3600"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Domain=example.com"));
        assert!(header.contains("Secure"));
        assert!(header.ends_with("HttpOnly"));
    }

    #[test]
    fn test_expire_cookie_header() {
        let header = CookieParams { secure: false, ..params() }.expire_cookie_header();
        assert!(header.starts_with("SESSID=deleted"));
        assert!(header.contains("Max-Age=0"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_extract_from_header() {
        let params = params();
        assert_eq!(params.extract_from_header("SESSID=abc123; other=value"), Some("abc123".into()));
        assert_eq!(params.extract_from_header("other=value; SESSID=xyz789"), Some("xyz789".into()));
        assert_eq!(params.extract_from_header("MYSESSID=nope"), None);
        assert_eq!(params.extract_from_header("other=value"), None);
    }

    #[test]
    fn test_from_config() {
        let config = SessionConfig { cookie_domain: "a.example".to_string(), ..Default::default() };
        let params = CookieParams::from_config(&config);
        assert_eq!(params.name, "SESSID");
        assert_eq!(params.domain, "a.example");
        assert_eq!(params.lifetime, 1800);
    }
}
