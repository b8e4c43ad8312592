//! Resource types shared by the client, the cache and the session layer.
//!
//! Wire records mirror the server's JSON (`todo_title`, `user`, ...). The
//! domain [`Task`] carries a [`TaskId`] that distinguishes a locally created
//! placeholder from a server-assigned identifier.

use crate::error::{ApiError, FieldErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum title length accepted by the server.
pub const MAX_TITLE_LEN: usize = 255;

/// Snapshot of the authenticated user. Replaced whole, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// Email/password pair for sign-in and sign-up.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject blank fields before any request is made.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.email.trim().is_empty() {
            errors.push("email", "Email is required.");
        }
        if self.password.is_empty() {
            errors.push("password", "Password is required.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::InvalidInput(errors))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response to sign-in and sign-up. Token fields ride in cookies and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<User>,
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            _ => Err(ApiError::InvalidInput(FieldErrors::single(
                "priority",
                format!("\"{s}\" is not one of LOW, MEDIUM, HIGH."),
            ))),
        }
    }
}

/// Completion percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const COMPLETE: Progress = Progress(100);

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self == Self::COMPLETE
    }
}

impl TryFrom<i64> for Progress {
    type Error = ApiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Progress(v)),
            _ => Err(ApiError::InvalidInput(FieldErrors::single(
                "progress",
                "Progress must be between 0 and 100.",
            ))),
        }
    }
}

impl From<Progress> for u8 {
    fn from(progress: Progress) -> Self {
        progress.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Client-generated identifier for a task the server has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(Uuid);

impl LocalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", &self.0.simple().to_string()[..8])
    }
}

/// Identity of a cached task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Optimistically created, awaiting the server.
    Pending(LocalId),
    /// Assigned by the server.
    Confirmed(i64),
}

impl TaskId {
    pub fn server_id(&self) -> Option<i64> {
        match self {
            TaskId::Confirmed(id) => Some(*id),
            TaskId::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TaskId::Pending(_))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Pending(local) => local.fmt(f),
            TaskId::Confirmed(id) => id.fmt(f),
        }
    }
}

/// A task as held in the client cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub progress: Progress,
    /// Owner's email; empty for an optimistic placeholder.
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Complete means progress is 100; there is no separate flag.
    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }
}

/// Task as serialized by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    #[serde(rename = "todo_title")]
    pub title: String,
    pub priority: Priority,
    pub progress: Progress,
    #[serde(rename = "user")]
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        Task {
            id: TaskId::Confirmed(record.id),
            title: record.title,
            priority: record.priority,
            progress: record.progress,
            owner: record.owner,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Trim a title and check it against the server's rules.
pub fn normalize_title(title: &str) -> Result<String, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(FieldErrors::single(
            "title",
            "Title cannot be empty.",
        )));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::InvalidInput(FieldErrors::single(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters."),
        )));
    }
    Ok(trimmed.to_string())
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    #[serde(rename = "todo_title")]
    pub title: String,
    pub priority: Priority,
    pub progress: Progress,
}

impl NewTask {
    /// Validated constructor; the title is trimmed.
    pub fn new(title: &str, priority: Priority, progress: Progress) -> Result<Self, ApiError> {
        Ok(Self {
            title: normalize_title(title)?,
            priority,
            progress,
        })
    }
}

/// Partial update; `None` fields are left untouched and not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(rename = "todo_title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl TaskPatch {
    pub fn progress(progress: Progress) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.priority.is_none() && self.progress.is_none()
    }

    /// Normalize the title and refuse an empty patch.
    pub fn validated(self) -> Result<Self, ApiError> {
        if self.is_empty() {
            return Err(ApiError::InvalidInput(FieldErrors::single(
                "patch",
                "Nothing to update.",
            )));
        }
        let title = self.title.as_deref().map(normalize_title).transpose()?;
        Ok(Self { title, ..self })
    }

    /// Merge the patched fields into `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(progress) = self.progress {
            task.progress = progress;
        }
    }
}

/// Task count for one priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: u64,
}

/// Progress histogram as returned by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressHistogram {
    #[serde(default)]
    pub range_0_20: u64,
    #[serde(default)]
    pub range_21_40: u64,
    #[serde(default)]
    pub range_41_60: u64,
    #[serde(default)]
    pub range_61_80: u64,
    #[serde(default)]
    pub range_81_100: u64,
}

/// One labelled histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBucket {
    pub label: &'static str,
    pub count: u64,
}

impl ProgressHistogram {
    /// Buckets in ascending range order.
    pub fn buckets(&self) -> Vec<ProgressBucket> {
        [
            ("0-20%", self.range_0_20),
            ("21-40%", self.range_21_40),
            ("41-60%", self.range_41_60),
            ("61-80%", self.range_61_80),
            ("81-100%", self.range_81_100),
        ]
        .into_iter()
        .map(|(label, count)| ProgressBucket { label, count })
        .collect()
    }
}
