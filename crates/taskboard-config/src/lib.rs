//! Configuration, filesystem paths and logging bootstrap for the Taskboard client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_READ_RETRY_LIMIT,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
