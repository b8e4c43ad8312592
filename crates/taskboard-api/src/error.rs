//! Error taxonomy for remote calls.
//!
//! Every failure leaving this crate is an [`ApiError`]: either no response was
//! obtained (`Transport`), the server answered with a non-success status
//! (`Http`), or the input was rejected locally before any request was made
//! (`InvalidInput`). Downstream code matches on [`ApiError::kind`] and never
//! inspects transport details.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Per-field validation messages, as returned by the server for a 400.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field convenience constructor.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Collect field errors from a JSON error body.
    ///
    /// Every top-level entry whose value is a string or an array of strings is
    /// taken; anything else is skipped.
    pub fn from_body(body: &Value) -> Self {
        let mut errors = Self::new();
        let Some(object) = body.as_object() else {
            return errors;
        };
        for (field, value) in object {
            match value {
                Value::String(message) => errors.push(field.clone(), message.clone()),
                Value::Array(items) => {
                    for item in items.iter().filter_map(Value::as_str) {
                        errors.push(field.clone(), item);
                    }
                }
                _ => {}
            }
        }
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// First message in field order, used for one-line notices.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flat_map(|m| m.iter()).map(String::as_str).next()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.first_message().unwrap_or("invalid input"))
    }
}

/// Refined classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response: timeout, DNS, connection refused.
    Transport,
    /// 400, or input rejected before sending.
    Validation,
    /// 401
    Auth,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 5xx
    Server,
    /// Any other status.
    Other,
}

impl ErrorKind {
    /// Classification of an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Auth,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Validation => "http.validation",
            ErrorKind::Auth => "http.auth",
            ErrorKind::Forbidden => "http.forbidden",
            ErrorKind::NotFound => "http.not_found",
            ErrorKind::Server => "http.server",
            ErrorKind::Other => "http.other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was obtained.
    #[error("Network error: {message}")]
    Transport { message: String, timed_out: bool },

    /// The server answered with a non-success status, or with an undecodable body.
    #[error("HTTP {status}: {}", .server_message.as_deref().unwrap_or("request failed"))]
    Http {
        status: u16,
        server_message: Option<String>,
        field_errors: FieldErrors,
    },

    /// Input rejected locally; nothing was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(FieldErrors),
}

impl ApiError {
    /// Build an HTTP error from a status and a raw response body.
    ///
    /// `detail` or `message` becomes the server message; a 400 body also
    /// yields field errors.
    pub fn from_status_body(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let server_message = parsed.as_ref().and_then(|value| {
            ["detail", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        });
        let field_errors = match (&parsed, status) {
            (Some(value), 400) => FieldErrors::from_body(value),
            _ => FieldErrors::new(),
        };

        ApiError::Http {
            status,
            server_message,
            field_errors,
        }
    }

    /// Shorthand for an HTTP error with no body.
    pub fn status(status: u16) -> Self {
        ApiError::Http {
            status,
            server_message: None,
            field_errors: FieldErrors::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Http { status, .. } => ErrorKind::from_status(*status),
            ApiError::InvalidInput(_) => ErrorKind::Validation,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Http { server_message, .. } => server_message.as_deref(),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Http { field_errors, .. } | ApiError::InvalidInput(field_errors)
                if !field_errors.is_empty() =>
            {
                Some(field_errors)
            }
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport { timed_out: true, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // Status-bearing reqwest errors only come from error_for_status, which we
        // never call; everything reaching here had no usable response.
        match e.status() {
            Some(status) => ApiError::status(status.as_u16()),
            None => ApiError::Transport {
                timed_out: e.is_timeout(),
                message: e.to_string(),
            },
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
