//! Database configuration

use crate::storage::Driver;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Connection settings for the session table
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage driver: "classic", "enhanced" or "prepared"
    /// Env: SR_DB_DRIVER
    /// Default: prepared
    pub driver: Option<Driver>,

    /// Database directory, or `:memory:`
    /// Env: SR_DB_HOST
    /// Default: "./data"
    pub host: String,

    /// Env: SR_DB_PORT
    pub port: Option<u16>,

    /// Database file name
    /// Env: SR_DB_NAME
    /// Default: "sessions.db"
    pub name: String,

    /// Env: SR_DB_USER
    pub user: String,

    /// Env: SR_DB_PASSWORD
    #[serde(skip_serializing)]
    pub password: String,

    /// Connection charset
    /// Env: SR_DB_CHARSET
    /// Default: "utf8"
    pub charset: Option<String>,

    /// Session table name
    /// Env: SR_DB_TABLE
    /// Default: "sessions"
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: Some(Driver::Prepared),
            host: "./data".to_string(),
            port: None,
            name: "sessions.db".to_string(),
            user: String::new(),
            password: String::new(),
            charset: Some("utf8".to_string()),
            table: "sessions".to_string(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("charset", &self.charset)
            .field("table", &self.table)
            .finish()
    }
}

impl DatabaseConfig {
    /// Defaults pointed at a private in-memory database
    pub fn in_memory() -> Self {
        Self { host: ":memory:".to_string(), ..Self::default() }
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub(crate) fn user_label(&self) -> &str {
        if self.user.is_empty() {
            "(anonymous)"
        } else {
            &self.user
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.driver = other.driver;
        self.host = other.host;
        self.port = other.port;
        self.name = other.name;
        self.user = other.user;
        if !other.password.is_empty() {
            self.password = other.password;
        }
        self.charset = other.charset;
        self.table = other.table;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(driver) = env::var("SR_DB_DRIVER") {
            self.driver = match driver.parse() {
                Ok(d) => Some(d),
                Err(_) => {
                    log::warn!("Ignoring SR_DB_DRIVER='{}': unknown driver", driver);
                    None
                }
            };
        }

        if let Ok(host) = env::var("SR_DB_HOST") {
            self.host = host;
        }

        if let Ok(port) = env::var("SR_DB_PORT") {
            self.port = port.parse().ok();
        }

        if let Ok(name) = env::var("SR_DB_NAME") {
            self.name = name;
        }

        if let Ok(user) = env::var("SR_DB_USER") {
            self.user = user;
        }

        if let Ok(password) = env::var("SR_DB_PASSWORD") {
            self.password = password;
        }

        if let Ok(charset) = env::var("SR_DB_CHARSET") {
            self.charset = Some(charset).filter(|c| !c.is_empty());
        }

        if let Ok(table) = env::var("SR_DB_TABLE") {
            self.table = table;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            bail!("Database table empty");
        }

        if !is_identifier(&self.table) {
            bail!("Invalid database table '{}': must match [A-Za-z_][A-Za-z0-9_]*", self.table);
        }

        if self.driver.is_none() {
            bail!("Database driver empty: choose classic, enhanced or prepared");
        }

        if self.host.is_empty() {
            bail!("Database host empty");
        }

        if self.name.is_empty() {
            bail!("Database name empty");
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
