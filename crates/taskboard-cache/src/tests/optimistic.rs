use super::{cached_ids, harness, progress, EMAIL};
use crate::{QueryKey, QueryStatus, TaskList};
use taskboard_api::testing::Endpoint;
use taskboard_api::{ApiError, ErrorKind, Priority, Progress, TaskId, TaskPatch};

#[tokio::test]
async fn failed_update_rolls_back_and_reports_once() {
    let h = harness();
    let id = h.api.seed_task(EMAIL, "Report", Priority::Medium, progress(50));
    h.client.query::<TaskList>().await;

    let gate = h.api.hold(Endpoint::UpdateTask);
    let update = tokio::spawn({
        let client = h.client.clone();
        async move {
            client
                .update_task(id, TaskPatch::progress(Progress::COMPLETE))
                .await
        }
    });
    h.api.wait_for_calls(Endpoint::UpdateTask, 1).await;

    let optimistic = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(optimistic[0].progress, Progress::COMPLETE);

    h.api.fail_next(Endpoint::UpdateTask, ApiError::status(500));
    gate.release();
    let err = update.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);

    let rolled_back = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(rolled_back[0].progress, progress(50));
    let reported = h.sink.errors();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind(), ErrorKind::Server);
}

#[tokio::test]
async fn rollback_restores_snapshot_exactly() {
    let h = harness();
    let id = h.api.seed_task(EMAIL, "Original", Priority::Low, progress(20));
    h.api.seed_task(EMAIL, "Untouched", Priority::High, progress(70));
    h.client.query::<TaskList>().await;
    let before = h.client.snapshot::<TaskList>();

    h.api.fail_next(Endpoint::UpdateTask, ApiError::status(403));
    let patch = TaskPatch {
        title: Some("Renamed".to_string()),
        priority: Some(Priority::High),
        progress: Some(progress(90)),
    };
    let err = h.client.update_task(id, patch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    assert_eq!(h.client.state::<TaskList>().data.as_ref(), before.data());
}

#[tokio::test]
async fn created_placeholder_is_replaced_by_server_id() {
    let h = harness();
    h.client.query::<TaskList>().await;

    let gate = h.api.hold(Endpoint::CreateTask);
    let create = tokio::spawn({
        let client = h.client.clone();
        async move {
            client
                .create_task("  Plan sprint ", Priority::High, progress(5))
                .await
        }
    });
    h.api.wait_for_calls(Endpoint::CreateTask, 1).await;

    let optimistic = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(optimistic.len(), 1);
    assert!(optimistic[0].id.is_pending());
    assert_eq!(optimistic[0].title, "Plan sprint");

    gate.release();
    let outcome = create.await.unwrap().unwrap();
    let server_id = outcome.value.id;
    assert!(matches!(server_id, TaskId::Confirmed(_)));
    outcome.revalidation.wait().await;

    let settled = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(settled.len(), 1);
    assert!(settled.iter().all(|t| !t.id.is_pending()));
    assert_eq!(settled[0].id, server_id);
    assert_eq!(settled[0].title, optimistic[0].title);
    assert_eq!(settled[0].priority, optimistic[0].priority);
    assert_eq!(settled[0].progress, optimistic[0].progress);
}

#[tokio::test]
async fn delete_applies_immediately_without_flicker() {
    let h = harness();
    let first = h.api.seed_task(EMAIL, "one", Priority::Low, progress(0));
    let second = h.api.seed_task(EMAIL, "two", Priority::Low, progress(0));
    h.client.query::<TaskList>().await;

    let gate = h.api.hold(Endpoint::DeleteTask);
    let delete = tokio::spawn({
        let client = h.client.clone();
        async move { client.delete_task(second).await }
    });
    h.api.wait_for_calls(Endpoint::DeleteTask, 1).await;
    assert_eq!(cached_ids(&h.client), [TaskId::Confirmed(first)]);

    let mut rx = h.client.subscribe::<TaskList>();
    gate.release();
    let outcome = delete.await.unwrap().unwrap();
    outcome.revalidation.wait().await;

    assert_eq!(cached_ids(&h.client), [TaskId::Confirmed(first)]);
    let seen = rx.borrow_and_update().data.clone().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn invalid_input_never_reaches_network_or_cache() {
    let h = harness();
    h.client.query::<TaskList>().await;
    let before = h.client.state::<TaskList>();

    let err = h
        .client
        .create_task("   ", Priority::Low, Progress::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h
        .client
        .update_task(1, TaskPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(h.api.calls(Endpoint::CreateTask), 0);
    assert_eq!(h.api.calls(Endpoint::UpdateTask), 0);
    assert_eq!(h.client.state::<TaskList>(), before);
    assert_eq!(h.sink.len(), 2);
}

#[tokio::test]
async fn write_cancels_in_flight_read() {
    let h = harness();
    let reads = h.api.hold(Endpoint::ListTasks);
    let read = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    h.api.wait_for_calls(Endpoint::ListTasks, 1).await;
    assert!(h.client.is_fetching::<TaskList>());

    let writes = h.api.hold(Endpoint::CreateTask);
    let create = tokio::spawn({
        let client = h.client.clone();
        async move {
            client
                .create_task("Urgent", Priority::High, Progress::ZERO)
                .await
        }
    });
    h.api.wait_for_calls(Endpoint::CreateTask, 1).await;

    assert!(!h.client.is_fetching::<TaskList>());
    let state = h.client.state::<TaskList>();
    assert_ne!(state.status, QueryStatus::Loading);
    assert_eq!(state.data.map(|t| t.len()), Some(1));

    writes.open();
    reads.open();
    read.await.unwrap();
    let outcome = create.await.unwrap().unwrap();
    outcome.revalidation.wait().await;
    assert_eq!(h.api.titles_of(EMAIL), ["Urgent"]);
    assert_eq!(cached_ids(&h.client), [outcome.value.id]);
}

#[tokio::test]
async fn toggle_flips_completion() {
    let h = harness();
    let id = h.api.seed_task(EMAIL, "Toggle", Priority::Low, progress(40));
    h.client.query::<TaskList>().await;

    let outcome = h.client.toggle_complete(id).await.unwrap();
    assert!(outcome.value.is_complete());
    outcome.revalidation.wait().await;

    let outcome = h.client.toggle_complete(id).await.unwrap();
    assert_eq!(outcome.value.progress, Progress::ZERO);

    let missing = h.client.toggle_complete(999).await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Validation);
}

/// A failed write restores the snapshot taken at its own start, discarding a
/// later write's optimistic effect until revalidation brings server truth back.
#[tokio::test]
async fn rollback_restores_own_snapshot_over_later_write() {
    let h = harness();
    let first = h.api.seed_task(EMAIL, "one", Priority::Low, progress(50));
    let second = h.api.seed_task(EMAIL, "two", Priority::Low, progress(0));
    h.client.query::<TaskList>().await;

    let gate = h.api.hold(Endpoint::UpdateTask);
    let update = tokio::spawn({
        let client = h.client.clone();
        async move {
            client
                .update_task(first, TaskPatch::progress(Progress::COMPLETE))
                .await
        }
    });
    h.api.wait_for_calls(Endpoint::UpdateTask, 1).await;

    let reads = h.api.hold(Endpoint::ListTasks);
    let deleted = h.client.delete_task(second).await.unwrap();
    drop(deleted.revalidation);
    assert_eq!(cached_ids(&h.client), [TaskId::Confirmed(first)]);

    h.api.fail_next(Endpoint::UpdateTask, ApiError::status(500));
    gate.release();
    update.await.unwrap().unwrap_err();
    assert_eq!(
        cached_ids(&h.client),
        [TaskId::Confirmed(first), TaskId::Confirmed(second)]
    );

    reads.open();
    h.client.invalidate(&QueryKey::Tasks).wait().await;
    let tasks = h.client.state::<TaskList>().data.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].progress, progress(50));
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn revalidation_failure_after_successful_write_is_reported() {
    let h = harness();
    let id = h.api.seed_task(EMAIL, "Gone", Priority::Low, progress(0));
    h.client.query::<TaskList>().await;

    h.api.fail_next(Endpoint::ListTasks, ApiError::status(500));
    let outcome = h.client.delete_task(id).await.unwrap();
    outcome.revalidation.wait().await;

    let state = h.client.state::<TaskList>();
    assert_eq!(state.status, QueryStatus::Error);
    let reported = h.sink.errors();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind(), ErrorKind::Server);
}

#[tokio::test]
async fn revalidation_failure_after_failed_write_stays_quiet() {
    let h = harness();
    let id = h.api.seed_task(EMAIL, "Stay", Priority::Low, progress(30));
    h.client.query::<TaskList>().await;

    let reads = h.api.hold(Endpoint::ListTasks);
    h.api.fail_next(Endpoint::UpdateTask, ApiError::status(503));
    h.client
        .update_task(id, TaskPatch::progress(Progress::COMPLETE))
        .await
        .unwrap_err();
    h.api.wait_for_calls(Endpoint::ListTasks, 2).await;

    h.api.fail_next(Endpoint::ListTasks, ApiError::status(500));
    reads.open();
    while h.client.is_fetching::<TaskList>() {
        tokio::task::yield_now().await;
    }

    assert!(h.client.state::<TaskList>().is_error());
    let reported = h.sink.errors();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind(), ErrorKind::Server);
    assert_eq!(reported[0].status_code(), Some(503));
}
