//! # Taskboard cache
//!
//! A keyed cache of server-owned resources with optimistic writes.
//!
//! ## Principles
//!
//! - **One entry per key** - keys are a closed set ([`QueryKey`])
//! - **Reads dedupe** - concurrent queries of a key share one fetch
//! - **Writes are optimistic** - cancel, snapshot, apply, reconcile
//! - **Rollback is exact** - a failed write restores its snapshot wholesale
//! - **Failures leave through one door** - each is reported once to a [`FailureSink`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskboard_api::{HttpOptions, HttpTaskApi, Priority, Progress};
//! use taskboard_cache::{NullSink, QueryClient, TaskList};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpTaskApi::new("http://localhost:8000/api/v1/".parse()?, HttpOptions::default())?;
//! let cache = QueryClient::new(Arc::new(api), Arc::new(NullSink));
//!
//! let tasks = cache.query::<TaskList>().await;
//! println!("{} tasks", tasks.data.map(|t| t.len()).unwrap_or(0));
//!
//! let created = cache.create_task("Write report", Priority::High, Progress::ZERO).await?;
//! created.revalidation.wait().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod key;
mod resource;
mod sink;
mod state;
mod tasks;

#[cfg(test)]
mod tests;

pub use client::{MutationOutcome, QueryClient, Revalidation, Snapshot};
pub use key::{QueryKey, StalePolicy};
pub use resource::{ProgressStats, Resource, SessionUser, Slot, Slots, TaskList, TaskStats};
pub use sink::{FailureSink, NullSink, RecordingSink};
pub use state::{QueryState, QueryStatus};
pub use tasks::{apply_change, TaskChange};
