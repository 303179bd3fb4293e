//! Log output destinations and entries

use crate::logging::{LogFormat, LoggingConfig};
use log::Level;
use std::collections::BTreeMap;

/// Where logs should be sent
#[derive(Clone, Debug, PartialEq)]
pub enum LogOutput {
    Stdout {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
    Stderr {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
    /// Append to a file, creating it and its directory if needed
    File { path: String },
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: Level,
    pub message: String,
    /// Usually the module path
    pub target: String,
    /// Extra key/value pairs, rendered in key order
    pub fields: BTreeMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location for a log entry
#[derive(Debug, Clone)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
}

impl LogEntry {
    pub fn new(level: Level, message: String, target: String) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message,
            target,
            fields: BTreeMap::new(),
            location: None,
        }
    }

    /// Build an entry from a `log::Record`, adding the configured context fields
    pub fn from_log_record(record: &log::Record, config: &LoggingConfig) -> Self {
        let mut entry = Self::new(
            record.level(),
            record.args().to_string(),
            record.target().to_string(),
        );

        if let (Some(file), Some(line)) = (record.file(), record.line()) {
            entry.location = Some(LogLocation { file: file.to_string(), line });
        }

        for (key, value) in &config.context_fields {
            entry.fields.insert(key.clone(), serde_json::Value::String(value.clone()));
        }

        entry
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}
