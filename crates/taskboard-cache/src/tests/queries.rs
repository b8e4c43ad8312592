use super::{harness, progress, EMAIL};
use crate::{ProgressStats, QueryKey, QueryStatus, SessionUser, TaskList, TaskStats};
use taskboard_api::testing::Endpoint;
use taskboard_api::{ApiError, ErrorKind, Priority};

#[tokio::test]
async fn first_query_loads() {
    let h = harness();
    assert_eq!(h.client.state::<TaskList>().status, QueryStatus::Idle);

    let state = h.client.query::<TaskList>().await;
    assert!(state.is_success());
    assert_eq!(state.data, Some(Vec::new()));
    assert_eq!(h.api.calls(Endpoint::ListTasks), 1);
}

#[tokio::test]
async fn concurrent_queries_share_one_fetch() {
    let h = harness();
    let gate = h.api.hold(Endpoint::ListTasks);

    let first = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    let second = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    h.api.wait_for_calls(Endpoint::ListTasks, 1).await;
    tokio::task::yield_now().await;
    assert!(h.client.state::<TaskList>().is_loading());

    gate.release();
    assert!(first.await.unwrap().is_success());
    assert!(second.await.unwrap().is_success());
    assert_eq!(h.api.calls(Endpoint::ListTasks), 1);
}

#[tokio::test]
async fn session_key_is_fresh_until_invalidated() {
    let h = harness();
    h.client.query::<SessionUser>().await;
    h.client.query::<SessionUser>().await;
    assert_eq!(h.api.calls(Endpoint::Probe), 1);

    h.client.invalidate(&QueryKey::Session).wait().await;
    assert_eq!(h.api.calls(Endpoint::Probe), 2);
    h.client.query::<SessionUser>().await;
    assert_eq!(h.api.calls(Endpoint::Probe), 2);
}

#[tokio::test]
async fn task_key_revalidates_on_every_query() {
    let h = harness();
    h.client.query::<TaskList>().await;
    h.client.query::<TaskList>().await;
    assert_eq!(h.api.calls(Endpoint::ListTasks), 2);
}

#[tokio::test]
async fn failure_keeps_data_and_is_reported_once() {
    let h = harness();
    h.api.seed_task(EMAIL, "Keep me", Priority::Low, progress(0));
    h.client.query::<TaskList>().await;

    h.api.fail_next(Endpoint::ListTasks, ApiError::status(503));
    let gate = h.api.hold(Endpoint::ListTasks);
    let joined = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    let also_joined = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    h.api.wait_for_calls(Endpoint::ListTasks, 2).await;
    tokio::task::yield_now().await;
    gate.release();

    let state = joined.await.unwrap();
    also_joined.await.unwrap();
    assert!(state.is_error());
    assert_eq!(state.data.map(|t| t.len()), Some(1));
    assert_eq!(state.last_error.map(|e| e.kind()), Some(ErrorKind::Server));
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn cancelled_fetch_result_is_ignored() {
    let h = harness();
    let gate = h.api.hold(Endpoint::ListTasks);
    let pending = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    h.api.wait_for_calls(Endpoint::ListTasks, 1).await;

    assert!(h.client.cancel::<TaskList>());
    assert!(!h.client.cancel::<TaskList>());
    assert_eq!(h.client.state::<TaskList>().status, QueryStatus::Idle);

    h.api.seed_task(EMAIL, "Late", Priority::Low, progress(0));
    gate.release();
    let state = pending.await.unwrap();
    assert_eq!(state.data, None);
    assert_eq!(state.status, QueryStatus::Idle);
}

#[tokio::test]
async fn background_failures_are_reported_once() {
    let h = harness();
    h.client.query::<TaskList>().await;

    h.api.fail_next(Endpoint::ListTasks, ApiError::status(503));
    h.client.invalidate(&QueryKey::Tasks).wait().await;
    assert!(h.client.state::<TaskList>().is_error());
    assert_eq!(h.sink.len(), 1);

    h.api.fail_next(Endpoint::ListTasks, ApiError::status(401));
    h.client.invalidate(&QueryKey::Tasks).wait().await;
    let reported = h.sink.errors();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].kind(), ErrorKind::Server);
    assert!(reported[1].is_auth());
}

#[tokio::test]
async fn query_joining_failed_revalidation_reports_once() {
    let h = harness();
    h.client.query::<TaskStats>().await;

    let gate = h.api.hold(Endpoint::TaskStats);
    let revalidation = h.client.invalidate(&QueryKey::TaskStats);
    let joined = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskStats>().await }
    });
    h.api.wait_for_calls(Endpoint::TaskStats, 2).await;
    tokio::task::yield_now().await;

    h.api.fail_next(Endpoint::TaskStats, ApiError::status(502));
    gate.release();
    revalidation.wait().await;
    assert!(joined.await.unwrap().is_error());
    assert_eq!(h.api.calls(Endpoint::TaskStats), 2);
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn invalidation_skips_unobserved_keys() {
    let h = harness();
    h.client.query::<TaskStats>().await;

    let revalidation = h.client.invalidate(&QueryKey::Tasks);
    assert_eq!(revalidation.len(), 1);
    revalidation.wait().await;

    assert_eq!(h.api.calls(Endpoint::TaskStats), 2);
    assert_eq!(h.api.calls(Endpoint::ListTasks), 0);
    assert_eq!(h.api.calls(Endpoint::ProgressStats), 0);
}

#[tokio::test]
async fn stats_views_follow_server_state() {
    let h = harness();
    h.api.seed_task(EMAIL, "a", Priority::High, progress(10));
    h.api.seed_task(EMAIL, "b", Priority::High, progress(95));

    let stats = h.client.query::<TaskStats>().await.data.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].priority, Priority::High);
    assert_eq!(stats[0].count, 2);

    let histogram = h.client.query::<ProgressStats>().await.data.unwrap();
    let counts: Vec<_> = histogram.buckets().iter().map(|b| b.count).collect();
    assert_eq!(counts, [1, 0, 0, 0, 1]);
}

#[tokio::test]
async fn clear_drops_entries_and_in_flight_results() {
    let h = harness();
    h.client.query::<SessionUser>().await;
    let gate = h.api.hold(Endpoint::ListTasks);
    let pending = tokio::spawn({
        let client = h.client.clone();
        async move { client.query::<TaskList>().await }
    });
    h.api.wait_for_calls(Endpoint::ListTasks, 1).await;

    h.client.clear();
    gate.release();
    pending.await.unwrap();

    assert_eq!(h.client.state::<SessionUser>().data, None);
    assert_eq!(h.client.state::<TaskList>().status, QueryStatus::Idle);
    assert!(h.client.invalidate(&QueryKey::Session).is_empty());
}

#[tokio::test]
async fn subscribers_see_changes() {
    let h = harness();
    let mut rx = h.client.subscribe::<TaskList>();
    assert!(!rx.has_changed().unwrap());

    h.client.query::<TaskList>().await;
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_success());
}
