//! Configuration system for Strongroom
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (builder methods)
//! 2. **Environment variables** (`SR_*`)
//! 3. **Config file** (`strongroom.toml`)
//! 4. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use strongroom_core::config::StrongroomConfig;
//!
//! let config = StrongroomConfig::load()?.with_cookie_domain("example.com");
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod database;
pub mod fingerprint;
pub mod logging;
pub mod sessions;

pub use database::DatabaseConfig;
pub use fingerprint::FingerprintConfig;
pub use logging::LoggingConfig;
pub use sessions::SessionConfig;

use crate::fingerprint::FingerprintMode;
use crate::storage::Driver;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const CONFIG_FILE: &str = "strongroom.toml";

/// Complete Strongroom configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongroomConfig {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub fingerprint: FingerprintConfig,
    pub logging: LoggingConfig,
}

impl StrongroomConfig {
    /// Load `strongroom.toml` from the working directory, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific file, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();
        Ok(config)
    }

    /// Load configuration from a TOML file only
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.database.merge(other.database);
        self.session.merge(other.session);
        self.fingerprint.merge(other.fingerprint);
        self.logging.merge(other.logging);
    }

    pub fn apply_env_vars(&mut self) {
        self.database.apply_env_vars();
        self.session.apply_env_vars();
        self.fingerprint.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Check every section, reporting the first failed rule
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.database.validate()?;
        self.fingerprint.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Configuration backed by an in-memory database, for tests and tooling
    pub fn in_memory(cookie_domain: &str) -> Self {
        Self { database: DatabaseConfig::in_memory(), ..Self::default() }
            .with_cookie_domain(cookie_domain)
    }

    pub fn with_cookie_domain(mut self, domain: &str) -> Self {
        self.session.cookie_domain = domain.to_string();
        self
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.database.driver = Some(driver);
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.database.table = table.to_string();
        self
    }

    /// Session lifetime in seconds
    pub fn with_lifetime(mut self, seconds: u64) -> Self {
        self.session.lifetime = seconds;
        self
    }

    pub fn with_fingerprint(mut self, enabled: bool, mode: FingerprintMode) -> Self {
        self.fingerprint.enabled = enabled;
        self.fingerprint.mode = mode;
        self
    }

    pub fn with_gc_on_start(mut self, enabled: bool) -> Self {
        self.session.gc_on_start = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StrongroomConfig::default();
        assert_eq!(config.session.lifetime, 1800);
        assert_eq!(config.session.name, "SESSID");
        assert_eq!(config.database.table, "sessions");
        assert_eq!(config.database.driver, Some(Driver::Prepared));
        assert!(config.fingerprint.enabled);
        assert_eq!(config.fingerprint.mode, FingerprintMode::Basic);
    }

    #[test]
    fn test_cookie_domain_is_required() {
        let err = StrongroomConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("Cookie domain"));
        assert!(StrongroomConfig::in_memory("example.com").validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
driver = "classic"
table = "web_sessions"

[session]
cookie_domain = "example.org"
lifetime = 600

[fingerprint]
mode = "shield"
"#
        )
        .unwrap();

        let loaded = StrongroomConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.database.driver, Some(Driver::Classic));
        assert_eq!(loaded.database.table, "web_sessions");
        assert_eq!(loaded.database.name, "sessions.db");
        assert_eq!(loaded.session.lifetime, 600);
        assert_eq!(loaded.session.name, "SESSID");
        assert_eq!(loaded.fingerprint.mode, FingerprintMode::Shield);
        assert!(loaded.fingerprint.enabled);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database\ndriver = ").unwrap();
        let err = StrongroomConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = StrongroomConfig::from_file("/nonexistent/strongroom.toml");
        assert!(config.is_err());

        let mut config = StrongroomConfig::default();
        config.merge(StrongroomConfig::in_memory("a.example"));
        assert_eq!(config.session.cookie_domain, "a.example");
        assert_eq!(config.database.host, ":memory:");
    }

    #[test]
    fn test_builder_methods() {
        let config = StrongroomConfig::in_memory("example.com")
            .with_driver(Driver::Enhanced)
            .with_table("sess")
            .with_lifetime(60)
            .with_fingerprint(false, FingerprintMode::Shield)
            .with_gc_on_start(false);

        assert_eq!(config.database.driver, Some(Driver::Enhanced));
        assert_eq!(config.database.table, "sess");
        assert_eq!(config.session.lifetime, 60);
        assert!(!config.fingerprint.enabled);
        assert!(!config.session.gc_on_start);
    }
}
