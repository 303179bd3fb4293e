//! Logger settings

use crate::logging::{LogFormat, LogOutput};
use log::Level;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Runtime settings for the installed logger
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Most verbose level written
    pub level: Level,
    /// Where logs are sent; stdout when empty
    pub outputs: Vec<LogOutput>,
    /// Default format for all outputs (can be overridden per output)
    pub format: LogFormat,
    /// Context fields added to every log entry
    pub context_fields: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            outputs: vec![LogOutput::Stdout { format: None }],
            format: LogFormat::Human,
            context_fields: HashMap::new(),
        }
    }
}

/// Operator-facing debug verbosity
///
/// | verbosity | level |
/// |-----------|-------|
/// | quiet     | error |
/// | simple    | info  |
/// | report    | debug |
/// | debug     | trace |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Simple,
    Report,
    Debug,
}

impl Verbosity {
    pub fn level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::Error,
            Verbosity::Simple => Level::Info,
            Verbosity::Report => Level::Debug,
            Verbosity::Debug => Level::Trace,
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "simple" => Ok(Verbosity::Simple),
            "report" => Ok(Verbosity::Report),
            "debug" => Ok(Verbosity::Debug),
            other => Err(format!("unknown verbosity '{}'", other)),
        }
    }
}

impl LoggingConfig {
    /// Level from `verbosity`, no outputs yet (stdout unless one is added)
    pub fn from_verbosity(verbosity: Verbosity) -> Self {
        Self { level: verbosity.level(), outputs: Vec::new(), ..Self::default() }
    }

    /// Add an append-only file output
    pub fn with_file_output(mut self, path: &str) -> Self {
        self.outputs.push(LogOutput::File { path: path.to_string() });
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Add a context field that appears in every log entry
    pub fn with_context_field(mut self, key: &str, value: &str) -> Self {
        self.context_fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::Quiet.level(), Level::Error);
        assert_eq!(Verbosity::Simple.level(), Level::Info);
        assert_eq!(Verbosity::Report.level(), Level::Debug);
        assert_eq!(Verbosity::Debug.level(), Level::Trace);
        assert_eq!("REPORT".parse::<Verbosity>(), Ok(Verbosity::Report));
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = LoggingConfig::default()
            .with_file_output("./test.log")
            .with_context_field("service", "sessions")
            .with_format(LogFormat::Json)
            .with_level(Level::Debug);

        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.context_fields.get("service"), Some(&"sessions".to_string()));
    }

    #[test]
    fn test_from_verbosity_starts_without_outputs() {
        let config = LoggingConfig::from_verbosity(Verbosity::Quiet);
        assert_eq!(config.level, Level::Error);
        assert!(config.outputs.is_empty());
    }
}
