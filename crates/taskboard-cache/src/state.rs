//! Observable per-key query state.

use taskboard_api::ApiError;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one cache entry as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub last_error: Option<ApiError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            last_error: None,
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Cached data, or the last error when nothing usable was loaded.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.last_error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError::Transport {
                message: "query produced no data".to_string(),
                timed_out: false,
            }),
        }
    }
}
