//! Error classification and dispatch.
//!
//! [`classify`] is pure. [`ErrorDispatcher`] is the only component that
//! reacts to a failure by touching the session: a 401 logs the user out when
//! one is present. Everything else becomes exactly one [`Notice`].

use crate::store::SessionStore;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use taskboard_api::{ApiError, ErrorKind, FieldErrors};
use taskboard_cache::FailureSink;
use tracing::{info, warn};

/// Flattened view of a failure for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub server_message: Option<String>,
    pub field_errors: Option<FieldErrors>,
    /// Transport failure caused by the request timeout.
    pub timed_out: bool,
}

pub fn classify(error: &ApiError) -> Classification {
    Classification {
        kind: error.kind(),
        status: error.status_code(),
        server_message: error.server_message().map(str::to_string),
        field_errors: error.field_errors().cloned(),
        timed_out: error.is_timeout(),
    }
}

/// Category of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    SessionExpired,
    Forbidden,
    NotFound,
    Validation,
    Server,
    Transport,
    Other,
}

/// A user-facing message produced by a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Side channel for notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Records notices for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().iter().map(|n| n.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().is_empty()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Notice for a non-auth classification.
fn notice_for(classification: &Classification) -> Notice {
    let (kind, message) = match classification.kind {
        ErrorKind::Forbidden => (
            NoticeKind::Forbidden,
            "You do not have permission to perform this action.".to_string(),
        ),
        ErrorKind::NotFound => (
            NoticeKind::NotFound,
            "The requested resource was not found.".to_string(),
        ),
        ErrorKind::Validation => (
            NoticeKind::Validation,
            classification
                .field_errors
                .as_ref()
                .and_then(FieldErrors::first_message)
                .or(classification.server_message.as_deref())
                .unwrap_or("Please check your input.")
                .to_string(),
        ),
        ErrorKind::Server => (
            NoticeKind::Server,
            "A server error occurred. Please try again later.".to_string(),
        ),
        ErrorKind::Transport if classification.timed_out => (
            NoticeKind::Transport,
            "The request timed out. Please try again.".to_string(),
        ),
        ErrorKind::Transport => (
            NoticeKind::Transport,
            "Network error. Check your connection.".to_string(),
        ),
        ErrorKind::Auth | ErrorKind::Other => (
            NoticeKind::Other,
            classification
                .server_message
                .clone()
                .unwrap_or_else(|| "Something went wrong.".to_string()),
        ),
    };
    Notice { kind, message }
}

/// Routes classified failures to the session store and the notifier.
#[derive(Clone)]
pub struct ErrorDispatcher {
    store: SessionStore,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for ErrorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDispatcher")
            .field("store", &self.store)
            .finish()
    }
}

impl ErrorDispatcher {
    pub fn new(store: SessionStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Handle one failed operation.
    pub fn dispatch(&self, error: &ApiError) {
        let classification = classify(error);

        if classification.kind == ErrorKind::Auth {
            if self.store.logout() {
                info!(status = ?classification.status, "Session expired, logged out");
                self.notifier.notify(Notice {
                    kind: NoticeKind::SessionExpired,
                    message: "Your session has expired. Please sign in again.".to_string(),
                });
            }
            return;
        }

        warn!(
            kind = %classification.kind,
            status = ?classification.status,
            server_message = ?classification.server_message,
            "Request failed"
        );
        self.notifier.notify(notice_for(&classification));
    }
}

impl FailureSink for ErrorDispatcher {
    fn report(&self, error: &ApiError) {
        self.dispatch(error);
    }
}
