//! Logging backend for the `log` facade
//!
//! Library code only uses the standard macros (`log::info!`, `log::debug!`,
//! ...). Binaries and hosts that want Strongroom's formatting call
//! [`init_logging`] once at startup.
//!
//! Secret material never reaches a log line: keys, plaintext buffers and
//! ciphertexts are reported by length only.
//!
//! ```rust,no_run
//! use strongroom_core::logging::{LoggingConfig, Verbosity};
//!
//! let config = LoggingConfig::from_verbosity(Verbosity::Report)
//!     .with_file_output("./logs/sessions.log");
//! strongroom_core::logging::init_logging(&config).unwrap();
//!
//! log::info!("Session store ready");
//! ```

pub mod config;
pub mod destinations;
pub mod formatter;

pub use config::{LoggingConfig, Verbosity};
pub use destinations::{LogEntry, LogOutput};
pub use formatter::LogFormat;

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, Once};

static INSTALL: Once = Once::new();

/// Install the Strongroom logger as the global `log` backend.
///
/// Only the first call installs anything; later calls return `Ok(())`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let mut outcome = Ok(());
    INSTALL.call_once(|| outcome = install(config));
    outcome
}

fn install(config: &LoggingConfig) -> anyhow::Result<()> {
    let logger = StrongroomLogger::new(config.clone())?;
    log::set_boxed_logger(Box::new(logger)).context("A global logger is already installed")?;
    log::set_max_level(config.level.to_level_filter());
    Ok(())
}

/// Receives fully rendered lines
trait LogSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
    fn flush(&self) -> std::io::Result<()>;
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

struct ConsoleSink(Stream);

impl LogSink for ConsoleSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        match self.0 {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        match self.0 {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
        }
    }
}

/// Append-only log file, created with its directory on first use
struct FileSink(Mutex<File>);

impl FileSink {
    fn open(path: &str) -> anyhow::Result<Self> {
        let path = Path::new(path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        Ok(Self(Mutex::new(file)))
    }

    fn file(&self) -> std::io::Result<std::sync::MutexGuard<'_, File>> {
        self.0.lock().map_err(|_| std::io::Error::other("log file lock poisoned"))
    }
}

impl LogSink for FileSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = self.file()?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")
    }

    fn flush(&self) -> std::io::Result<()> {
        self.file()?.flush()
    }
}

struct StrongroomLogger {
    config: LoggingConfig,
    sinks: Vec<(LogFormat, Box<dyn LogSink>)>,
}

impl StrongroomLogger {
    fn new(config: LoggingConfig) -> anyhow::Result<Self> {
        let mut sinks: Vec<(LogFormat, Box<dyn LogSink>)> = Vec::with_capacity(config.outputs.len());

        for output in &config.outputs {
            let sink: (LogFormat, Box<dyn LogSink>) = match output {
                LogOutput::Stdout { format } => {
                    (format.unwrap_or(config.format), Box::new(ConsoleSink(Stream::Stdout)))
                }
                LogOutput::Stderr { format } => {
                    (format.unwrap_or(config.format), Box::new(ConsoleSink(Stream::Stderr)))
                }
                LogOutput::File { path } => (config.format, Box::new(FileSink::open(path)?)),
            };
            sinks.push(sink);
        }

        if sinks.is_empty() {
            sinks.push((config.format, Box::new(ConsoleSink(Stream::Stdout))));
        }

        Ok(Self { config, sinks })
    }
}

impl log::Log for StrongroomLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.config.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry::from_log_record(record, &self.config);
        // Render each distinct format once.
        let mut rendered: Vec<(LogFormat, String)> = Vec::new();
        for (format, sink) in &self.sinks {
            let line = match rendered.iter().find(|(f, _)| f == format) {
                Some((_, line)) => line.clone(),
                None => {
                    let line = format.format_entry(&entry);
                    rendered.push((*format, line.clone()));
                    line
                }
            };
            // Nowhere to report a failing log sink.
            let _ = sink.write_line(&line);
        }
    }

    fn flush(&self) {
        for (_, sink) in &self.sinks {
            let _ = sink.flush();
        }
    }
}
