//! The query client: reads, invalidation and the optimistic write phases.
//!
//! # Locking
//!
//! All slots sit behind one `parking_lot::Mutex`. The lock is never held
//! across an `.await`, and watch notifications are sent while it is held so
//! that observers see transitions in the order they were made.

use crate::key::QueryKey;
use crate::resource::{Fetch, FetchDone, ProgressStats, Resource, SessionUser, Slots, TaskList, TaskStats};
use crate::sink::FailureSink;
use crate::state::{QueryState, QueryStatus};
use futures_util::future::join_all;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskboard_api::{ApiError, ApiResult, TaskApi};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Who started a fetch, which decides who reports its failure.
///
/// Foreground failures are reported by the callers that join the fetch.
/// Background failures are reported by the fetch itself. A refetch that
/// follows a failed write only reports a 401: the write already produced the
/// notice for that operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOrigin {
    Foreground,
    Background,
    AfterFailedWrite,
}

impl FetchOrigin {
    fn reports_itself(self, error: &ApiError) -> bool {
        match self {
            FetchOrigin::Foreground => false,
            FetchOrigin::Background => true,
            FetchOrigin::AfterFailedWrite => error.is_auth(),
        }
    }
}

/// Refetches scheduled by an invalidation. Await [`Revalidation::wait`] to
/// observe them settle, or drop it to let them run detached.
#[must_use = "drop to detach, or call wait() to await the refetches"]
#[derive(Default)]
pub struct Revalidation {
    pending: Vec<FetchDone>,
}

impl Revalidation {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub async fn wait(self) {
        join_all(self.pending).await;
    }

    fn merge(&mut self, other: Revalidation) {
        self.pending.extend(other.pending);
    }
}

impl fmt::Debug for Revalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revalidation")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Pre-write value of one key, captured for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    key: QueryKey,
    state: QueryState<T>,
}

impl<T> Snapshot<T> {
    pub fn key(&self) -> QueryKey {
        self.key
    }

    pub fn data(&self) -> Option<&T> {
        self.state.data.as_ref()
    }
}

/// Result of a successful write.
#[derive(Debug)]
pub struct MutationOutcome<T> {
    pub value: T,
    pub revalidation: Revalidation,
}

struct Inner {
    api: Arc<dyn TaskApi>,
    sink: Arc<dyn FailureSink>,
    slots: Mutex<Slots>,
}

/// Shared handle to the cache. Clones refer to the same cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("slots", &*self.inner.slots.lock())
            .finish()
    }
}

impl QueryClient {
    pub fn new(api: Arc<dyn TaskApi>, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                sink,
                slots: Mutex::new(Slots::new()),
            }),
        }
    }

    pub fn api(&self) -> &Arc<dyn TaskApi> {
        &self.inner.api
    }

    /// Hand a failure to the sink.
    pub fn report(&self, error: &ApiError) {
        warn!(kind = %error.kind(), status = ?error.status_code(), "Operation failed");
        self.inner.sink.report(error);
    }

    fn report_once(&self, reported: &AtomicBool, error: &ApiError) {
        if !reported.swap(true, Ordering::SeqCst) {
            self.report(error);
        }
    }

    // -- Reads ---------------------------------------------------------------

    /// Current state of `R` without fetching.
    pub fn state<R: Resource>(&self) -> QueryState<R::Data> {
        let mut slots = self.inner.slots.lock();
        R::slot(&mut slots).snapshot()
    }

    /// Receiver notified on every state change of `R`.
    pub fn subscribe<R: Resource>(&self) -> watch::Receiver<QueryState<R::Data>> {
        let mut slots = self.inner.slots.lock();
        R::slot(&mut slots).state.subscribe()
    }

    /// Read `R`, fetching when its policy says the cached value is stale.
    ///
    /// Joins an in-flight fetch for the same key instead of starting another.
    /// A failure is reported once, however many callers joined the fetch.
    pub async fn query<R: Resource>(&self) -> QueryState<R::Data> {
        let fetch = {
            let mut slots = self.inner.slots.lock();
            let slot = R::slot(&mut slots);
            slot.observed = true;
            if let Some(fetch) = slot.inflight.clone() {
                Some(fetch)
            } else if slot.is_fresh(R::STALE) {
                None
            } else {
                Some(self.start_fetch::<R>(&mut slots, FetchOrigin::Foreground))
            }
        };

        if let Some(fetch) = fetch {
            self.join(fetch).await;
        }
        self.state::<R>()
    }

    /// Fetch `R` regardless of freshness, joining any fetch already in flight.
    pub async fn refetch<R: Resource>(&self) -> QueryState<R::Data> {
        let fetch = {
            let mut slots = self.inner.slots.lock();
            let slot = R::slot(&mut slots);
            slot.observed = true;
            match slot.inflight.clone() {
                Some(fetch) => fetch,
                None => self.start_fetch::<R>(&mut slots, FetchOrigin::Foreground),
            }
        };
        self.join(fetch).await;
        self.state::<R>()
    }

    /// Whether a fetch of `R` is in flight.
    pub fn is_fetching<R: Resource>(&self) -> bool {
        let mut slots = self.inner.slots.lock();
        R::slot(&mut slots).inflight.is_some()
    }

    async fn join(&self, fetch: Fetch) {
        if let Some(error) = fetch.done.clone().await {
            self.report_once(&fetch.reported, &error);
        }
    }

    fn start_fetch<R: Resource>(&self, slots: &mut Slots, origin: FetchOrigin) -> Fetch {
        let slot = R::slot(slots);
        slot.generation += 1;
        let generation = slot.generation;
        slot.state.send_modify(|state| state.status = QueryStatus::Loading);
        debug!(key = %R::KEY, generation, ?origin, "Fetch started");

        let reported = Arc::new(AtomicBool::new(false));
        let api = Arc::clone(&self.inner.api);
        let client = self.clone();
        let task_reported = Arc::clone(&reported);
        let handle = tokio::spawn(async move {
            let result = R::fetch(api).await;
            let failure = client.settle::<R>(generation, result);
            if let Some(error) = failure.as_ref().filter(|e| origin.reports_itself(e)) {
                client.report_once(&task_reported, error);
            }
            failure
        });

        let client = self.clone();
        let done = async move {
            match handle.await {
                Ok(failure) => failure,
                Err(join_error) => client.settle::<R>(
                    generation,
                    Err(ApiError::Transport {
                        message: format!("fetch task aborted: {join_error}"),
                        timed_out: false,
                    }),
                ),
            }
        }
        .boxed()
        .shared();

        let fetch = Fetch {
            generation,
            done,
            reported,
        };
        slot.inflight = Some(fetch.clone());
        fetch
    }

    /// Install a fetch result unless the fetch was cancelled or superseded.
    /// Returns the error of an applied failure.
    fn settle<R: Resource>(&self, generation: u64, result: ApiResult<R::Data>) -> Option<ApiError> {
        let mut slots = self.inner.slots.lock();
        let slot = R::slot(&mut slots);
        let current = slot
            .inflight
            .as_ref()
            .is_some_and(|fetch| fetch.generation == generation);
        if !current {
            debug!(key = %R::KEY, generation, "Ignoring result of cancelled fetch");
            return None;
        }
        slot.inflight = None;

        match result {
            Ok(data) => {
                slot.stale = false;
                slot.state.send_modify(|state| {
                    state.data = Some(data);
                    state.status = QueryStatus::Success;
                    state.last_error = None;
                });
                debug!(key = %R::KEY, generation, "Fetch succeeded");
                None
            }
            Err(error) => {
                slot.state.send_modify(|state| {
                    state.status = QueryStatus::Error;
                    state.last_error = Some(error.clone());
                });
                debug!(key = %R::KEY, generation, kind = %error.kind(), "Fetch failed");
                Some(error)
            }
        }
    }

    // -- Invalidation --------------------------------------------------------

    /// Mark every key under `prefix` stale and refetch the observed ones in
    /// the background. An in-flight fetch of a matched key is superseded.
    ///
    /// A failed refetch is reported once.
    pub fn invalidate(&self, prefix: &QueryKey) -> Revalidation {
        self.invalidate_from(prefix, FetchOrigin::Background)
    }

    fn invalidate_from(&self, prefix: &QueryKey, origin: FetchOrigin) -> Revalidation {
        let mut revalidation = Revalidation::default();
        for key in QueryKey::matching(prefix) {
            revalidation.merge(match key {
                QueryKey::Session => self.invalidate_one::<SessionUser>(origin),
                QueryKey::Tasks => self.invalidate_one::<TaskList>(origin),
                QueryKey::TaskStats => self.invalidate_one::<TaskStats>(origin),
                QueryKey::ProgressStats => self.invalidate_one::<ProgressStats>(origin),
            });
        }
        debug!(prefix = %prefix, refetches = revalidation.len(), ?origin, "Invalidated");
        revalidation
    }

    fn invalidate_one<R: Resource>(&self, origin: FetchOrigin) -> Revalidation {
        let mut slots = self.inner.slots.lock();
        let slot = R::slot(&mut slots);
        slot.stale = true;
        if !slot.observed {
            return Revalidation::default();
        }
        slot.cancel();
        let fetch = self.start_fetch::<R>(&mut slots, origin);
        Revalidation {
            pending: vec![fetch.done],
        }
    }

    /// Drop every entry and ignore all in-flight fetches.
    pub fn clear(&self) {
        self.inner.slots.lock().reset_all();
        debug!("Cache cleared");
    }

    /// Install `data` for `R` as if it had just been fetched.
    pub fn set_data<R: Resource>(&self, data: R::Data) {
        let mut slots = self.inner.slots.lock();
        let slot = R::slot(&mut slots);
        slot.cancel();
        slot.stale = false;
        slot.observed = true;
        slot.state.send_modify(|state| {
            state.data = Some(data);
            state.status = QueryStatus::Success;
            state.last_error = None;
        });
    }

    // -- Optimistic write phases ----------------------------------------------

    /// Phase 1: ignore the eventual result of any in-flight read of `R`.
    pub fn cancel<R: Resource>(&self) -> bool {
        let mut slots = self.inner.slots.lock();
        let cancelled = R::slot(&mut slots).cancel();
        if cancelled {
            debug!(key = %R::KEY, "Cancelled in-flight fetch");
        }
        cancelled
    }

    /// Phase 2: capture the current value of `R` for rollback.
    pub fn snapshot<R: Resource>(&self) -> Snapshot<R::Data> {
        Snapshot {
            key: R::KEY,
            state: self.state::<R>(),
        }
    }

    /// Phase 3: replace the cached data of `R` with `f(current)` and notify.
    pub fn apply<R, F>(&self, f: F)
    where
        R: Resource,
        F: FnOnce(Option<&R::Data>) -> Option<R::Data>,
    {
        let mut slots = self.inner.slots.lock();
        let slot = R::slot(&mut slots);
        slot.state.send_modify(|state| {
            state.data = f(state.data.as_ref());
        });
        if slot.state.borrow().data.is_some() {
            slot.observed = true;
        }
    }

    /// Restore `snapshot` exactly.
    pub fn rollback<R: Resource>(&self, snapshot: Snapshot<R::Data>) {
        let mut slots = self.inner.slots.lock();
        R::slot(&mut slots).state.send_replace(snapshot.state);
        warn!(key = %snapshot.key, "Rolled back optimistic change");
    }

    /// Phase 4: await `write`, then either `confirm` the result into the
    /// cache or restore `snapshot` and report the failure.
    ///
    /// Keys under `R::KEY` are invalidated after success and failure alike;
    /// after a failure only a 401 from the refetch is reported.
    pub async fn reconcile<R, T, W, C>(
        &self,
        snapshot: Snapshot<R::Data>,
        write: W,
        confirm: C,
    ) -> ApiResult<MutationOutcome<T>>
    where
        R: Resource,
        W: std::future::Future<Output = ApiResult<T>>,
        C: FnOnce(&T, Option<&R::Data>) -> Option<R::Data>,
    {
        match write.await {
            Ok(value) => {
                self.apply::<R, _>(|current| confirm(&value, current));
                let revalidation = self.invalidate(&R::KEY);
                Ok(MutationOutcome {
                    value,
                    revalidation,
                })
            }
            Err(error) => {
                self.rollback::<R>(snapshot);
                self.report(&error);
                drop(self.invalidate_from(&R::KEY, FetchOrigin::AfterFailedWrite));
                Err(error)
            }
        }
    }
}
