//! Logging initialization for client binaries.

use crate::{ClientConfig, Paths};

/// Initialize tracing for a client binary.
///
/// JSONL goes to `~/.taskboard/logs/client.jsonl`; `RUST_LOG` overrides the
/// configured level. `foreground` mirrors events to stderr.
pub fn init_logging(service_name: &str, config: &ClientConfig, paths: &Paths, foreground: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: config.log_level.clone(),
        log_path: Some(paths.log_file()),
        also_stderr: foreground,
    });
}
