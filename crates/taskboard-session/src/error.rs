//! Session error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid transition in the probe FSM
    #[error("Invalid probe state transition: {0}")]
    InvalidStateTransition(String),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
