//! Log line rendering

use crate::logging::destinations::LogEntry;
use serde_json::Value as JsonValue;

/// Line format for a log destination
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LogFormat {
    /// One JSON object per line:
    /// `{"ts":"2024-01-15T10:30:00Z","level":"INFO","target":"strongroom_core::session","msg":"Swept 3 expired sessions"}`
    Json,

    /// `2024-01-15 10:30:00.000 INFO  strongroom_core::session: Swept 3 expired sessions`
    #[default]
    Human,

    /// `ts=2024-01-15T10:30:00Z level=INFO target=strongroom_core::session msg="Swept 3 expired sessions"`
    Logfmt,
}

impl LogFormat {
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        match self {
            LogFormat::Json => json_line(entry),
            LogFormat::Human => human_line(entry),
            LogFormat::Logfmt => logfmt_line(entry),
        }
    }
}

fn level(entry: &LogEntry) -> String {
    entry.level.as_str().to_string()
}

/// Field value without JSON string quotes
fn plain(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Quote a logfmt value when it contains spaces, quotes or `=`
fn logfmt_value(raw: &str) -> String {
    if raw.is_empty() || raw.contains([' ', '"', '=']) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw.to_string()
    }
}

fn json_line(entry: &LogEntry) -> String {
    let mut line = serde_json::json!({
        "ts": entry.timestamp.to_rfc3339(),
        "level": level(entry),
        "target": entry.target,
        "msg": entry.message,
    });

    if let Some(object) = line.as_object_mut() {
        if let Some(location) = &entry.location {
            object.insert("src".to_string(), JsonValue::from(format!("{}:{}", location.file, location.line)));
        }
        object.extend(entry.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    line.to_string()
}

fn human_line(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} {:<5} {}: {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        level(entry),
        entry.target,
        entry.message
    );
    for (key, value) in &entry.fields {
        line.push_str(&format!(" {}={}", key, plain(value)));
    }
    line
}

fn logfmt_line(entry: &LogEntry) -> String {
    let mut pairs = vec![
        ("ts".to_string(), entry.timestamp.to_rfc3339()),
        ("level".to_string(), level(entry)),
        ("target".to_string(), entry.target.clone()),
        ("msg".to_string(), entry.message.clone()),
    ];
    if let Some(location) = &entry.location {
        pairs.push(("src".to_string(), format!("{}:{}", location.file, location.line)));
    }
    pairs.extend(entry.fields.iter().map(|(k, v)| (k.clone(), plain(v))));

    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, logfmt_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn sweep_entry(level: Level) -> LogEntry {
        LogEntry::new(level, "Swept 3 expired sessions".to_string(), "strongroom_core::session".to_string())
            .with_field("driver", JsonValue::from("PREPARED"))
            .with_field("rows", JsonValue::from(3))
    }

    #[test]
    fn test_json_line_carries_fields() {
        let line = LogFormat::Json.format_entry(&sweep_entry(Level::Info));
        let parsed: JsonValue = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["msg"], "Swept 3 expired sessions");
        assert_eq!(parsed["target"], "strongroom_core::session");
        assert_eq!(parsed["driver"], "PREPARED");
        assert_eq!(parsed["rows"], 3);
    }

    #[test]
    fn test_human_line() {
        let line = LogFormat::Human.format_entry(&sweep_entry(Level::Error));
        assert!(line.contains("ERROR strongroom_core::session: Swept 3 expired sessions"));
        assert!(line.ends_with("driver=PREPARED rows=3"));
    }

    #[test]
    fn test_logfmt_quotes_only_when_needed() {
        let entry = LogEntry::new(
            Level::Warn,
            "Fingerprint \"mismatch\"".to_string(),
            "strongroom_core::fingerprint".to_string(),
        )
        .with_field("mode", JsonValue::from("shield"));

        let line = LogFormat::Logfmt.format_entry(&entry);
        assert!(line.contains("level=WARN"));
        assert!(line.contains("target=strongroom_core::fingerprint"));
        assert!(line.contains(r#"msg="Fingerprint \"mismatch\"""#));
        assert!(line.ends_with("mode=shield"));
    }

    #[test]
    fn test_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }
}
