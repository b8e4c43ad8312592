//! Behavioural tests for the cache against the in-memory API.
//!
//! - `queries.rs`    - read path: dedupe, staleness, cancellation, invalidation
//! - `optimistic.rs` - write path: apply, reconcile, rollback

mod optimistic;
mod queries;

use crate::{QueryClient, RecordingSink, TaskList};
use std::sync::Arc;
use taskboard_api::testing::ScriptedApi;
use taskboard_api::{Priority, Progress, TaskId};

pub(crate) const EMAIL: &str = "a@b.com";

pub(crate) struct Harness {
    pub api: ScriptedApi,
    pub sink: Arc<RecordingSink>,
    pub client: QueryClient,
}

pub(crate) fn harness() -> Harness {
    let api = ScriptedApi::new().with_session(EMAIL, "pw");
    let sink = Arc::new(RecordingSink::new());
    let client = QueryClient::new(Arc::new(api.clone()), sink.clone());
    Harness { api, sink, client }
}

pub(crate) fn progress(value: i64) -> Progress {
    Progress::try_from(value).unwrap()
}

pub(crate) fn cached_ids(client: &QueryClient) -> Vec<TaskId> {
    client
        .state::<TaskList>()
        .data
        .unwrap_or_default()
        .iter()
        .map(|t| t.id)
        .collect()
}

/// Basic workflow: load, create, list again.
#[tokio::test]
async fn basic_workflow() {
    let h = harness();
    h.api
        .seed_task(EMAIL, "Existing", Priority::Low, progress(10));

    let tasks = h.client.query::<TaskList>().await;
    assert!(tasks.is_success());
    assert_eq!(tasks.data.as_ref().map(Vec::len), Some(1));

    let created = h
        .client
        .create_task("Write report", Priority::High, Progress::ZERO)
        .await
        .unwrap();
    assert!(!created.value.id.is_pending());
    created.revalidation.wait().await;

    let tasks = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].title, "Write report");
    assert!(h.sink.is_empty());
}
