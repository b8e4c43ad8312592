//! # Observability
//!
//! Tracing bootstrap shared by every Taskboard binary.
//!
//! Library crates never configure a subscriber. They emit events with the
//! plain `tracing` macros and leave routing to whichever binary links them.
//! Binaries call [`init`] or [`init_with_config`] once at startup.
//!
//! Events are written as one JSON object per line to
//! `~/.taskboard/logs/client.jsonl` so a session can be followed with
//! `tail -f ~/.taskboard/logs/client.jsonl | jq`. A compact human-readable
//! copy can also go to stderr.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "taskboard-cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every log line (e.g. "taskboard-cli").
    pub service_name: String,

    /// Default filter directive, overridden by `RUST_LOG`.
    pub default_level: String,

    /// Custom JSONL path. Defaults to `~/.taskboard/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr in compact form.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default location of the JSONL log file.
///
/// Falls back to the working directory when no home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskboard")
        .join("logs")
        .join("client.jsonl")
}

/// Initialize logging with defaults for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Calling this more than once is harmless: the first subscriber wins and
/// later calls are ignored. When the log file cannot be opened, events still
/// reach stderr if `also_stderr` is set.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let json_layer = match AppendLogWriter::open(&log_path) {
        Ok(writer) => Some(
            JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                .with_filter(env_filter(&config.default_level)),
        ),
        Err(e) => {
            eprintln!("observability: cannot open {}: {e}", log_path.display());
            None
        }
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "observability initialized"
        );
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};
