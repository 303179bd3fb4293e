//! Logging configuration

use crate::logging::{self, LogFormat, LogOutput, Verbosity};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "quiet", "simple", "report" or "debug"
    /// Env: SR_LOG_VERBOSITY
    /// Default: simple
    pub verbosity: Verbosity,

    /// "json", "human" or "logfmt"
    /// Env: SR_LOG_FORMAT
    /// Default: "human"
    pub format: String,

    /// "stdout", "stderr" or "file"
    /// Env: SR_LOG_OUTPUT
    /// Default: "stderr"
    pub output: String,

    /// Append-only log file used when `output = "file"`
    /// Env: SR_LOG_FILE
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Simple,
            format: "human".to_string(),
            output: "stderr".to_string(),
            file_path: "./logs/strongroom.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(verbosity) = env::var("SR_LOG_VERBOSITY") {
            match verbosity.parse() {
                Ok(v) => self.verbosity = v,
                Err(_) => log::warn!("Ignoring SR_LOG_VERBOSITY='{}'", verbosity),
            }
        }

        if let Ok(format) = env::var("SR_LOG_FORMAT") {
            self.format = format;
        }

        if let Ok(output) = env::var("SR_LOG_OUTPUT") {
            self.output = output;
        }

        if let Ok(path) = env::var("SR_LOG_FILE") {
            self.file_path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.log_format()?;
        self.log_output()?;
        Ok(())
    }

    fn log_format(&self) -> Result<LogFormat> {
        match self.format.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" => Ok(LogFormat::Human),
            "logfmt" => Ok(LogFormat::Logfmt),
            other => bail!("Invalid log format '{}': must be json, human or logfmt", other),
        }
    }

    fn log_output(&self) -> Result<LogOutput> {
        match self.output.to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout { format: None }),
            "stderr" => Ok(LogOutput::Stderr { format: None }),
            "file" if self.file_path.is_empty() => bail!("Log output is 'file' but file_path is empty"),
            "file" => Ok(LogOutput::File { path: self.file_path.clone() }),
            other => bail!("Invalid log output '{}': must be stdout, stderr or file", other),
        }
    }

    /// Logger settings for [`crate::logging::init_logging`]
    pub fn to_runtime(&self) -> Result<logging::LoggingConfig> {
        Ok(logging::LoggingConfig::from_verbosity(self.verbosity)
            .with_format(self.log_format()?)
            .with_output(self.log_output()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_mapping() {
        let config = LoggingConfig {
            verbosity: Verbosity::Report,
            format: "json".to_string(),
            output: "file".to_string(),
            file_path: "/tmp/sr.log".to_string(),
        };
        let runtime = config.to_runtime().unwrap();
        assert_eq!(runtime.level, log::Level::Debug);
        assert_eq!(runtime.format, LogFormat::Json);
        assert_eq!(runtime.outputs.len(), 1);
    }

    #[test]
    fn test_invalid_values() {
        let config = LoggingConfig { format: "xml".to_string(), ..LoggingConfig::default() };
        assert!(config.validate().is_err());

        let config = LoggingConfig { output: "syslog".to_string(), ..LoggingConfig::default() };
        assert!(config.validate().is_err());
    }
}
