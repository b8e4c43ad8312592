//! Failure reporting contract.
//!
//! The cache never decides what a failure means to the user. It reports each
//! failed operation exactly once to a [`FailureSink`] after any rollback has
//! already been applied.

use parking_lot::Mutex;
use taskboard_api::ApiError;

/// Receives classified failures from the cache.
pub trait FailureSink: Send + Sync {
    fn report(&self, error: &ApiError);
}

/// Discards all failures.
#[derive(Debug, Default)]
pub struct NullSink;

impl FailureSink for NullSink {
    fn report(&self, _error: &ApiError) {}
}

/// Records failures for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<ApiError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ApiError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, error: &ApiError) {
        self.errors.lock().push(error.clone());
    }
}
