//! Logging initialization.
//!
//! Every binary calls [`init_logging`] once at startup and then uses the
//! standard `tracing` macros. Events are written as JSONL to
//! `~/.abet/logs/console.jsonl`, optionally mirrored to stderr.

use crate::CoreResult;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default filter (e.g. "info"). `RUST_LOG` takes precedence when set.
    pub default_level: String,
    /// JSONL file to append to. `None` disables the file layer.
    pub log_path: Option<PathBuf>,
    /// Also emit compact human-readable lines on stderr.
    pub also_stderr: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_logging(options: LogOptions) -> CoreResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_level));

    let file_layer = match &options.log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = options
        .also_stderr
        .then(|| fmt::layer().with_writer(std::io::stderr).compact());

    if tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }

    Ok(())
}

/// Parse a level name ("warning" is accepted for warn).
fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

/// Turn a configured level into an `EnvFilter` default.
///
/// Directive lists (`abet_auth=debug,info`) pass through unchanged. A bare
/// word must name a level; `None` means it does not.
pub fn normalize_filter(filter: &str) -> Option<String> {
    let filter = filter.trim();
    if filter.contains('=') || filter.contains(',') {
        return Some(filter.to_string());
    }
    parse_level(filter).map(|level| level.as_str().to_lowercase())
}
