//! Taskboard API client.
//!
//! Typed access to the Taskboard REST API: session probing, sign-in/up/out,
//! task CRUD and aggregate statistics. All failures surface as [`ApiError`],
//! already classified into an [`ErrorKind`].
//!
//! Consumers depend on the [`TaskApi`] trait; [`HttpTaskApi`] is the reqwest
//! implementation and, with the `testing` feature, [`testing::ScriptedApi`] is
//! an in-memory one.

mod client;
mod error;
mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{HttpOptions, HttpTaskApi, RetryPolicy, TaskApi};
pub use error::{ApiError, ApiResult, ErrorKind, FieldErrors};
pub use types::{
    normalize_title, AuthResponse, Credentials, LocalId, NewTask, Priority, PriorityCount,
    Progress, ProgressBucket, ProgressHistogram, Task, TaskId, TaskPatch, TaskRecord, User,
    MAX_TITLE_LEN,
};
