//! The fixed set of cached resources and their storage slots.

use crate::key::{QueryKey, StalePolicy};
use crate::state::{QueryState, QueryStatus};
use futures_util::future::{BoxFuture, Shared};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use taskboard_api::{ApiError, ApiResult, PriorityCount, ProgressHistogram, Task, TaskApi, User};
use tokio::sync::watch;

/// Resolves to the fetch's unreported failure, or `None` on success or cancellation.
pub(crate) type FetchDone = Shared<BoxFuture<'static, Option<ApiError>>>;

/// An in-flight fetch that later callers join instead of duplicating.
#[derive(Clone)]
pub(crate) struct Fetch {
    pub(crate) generation: u64,
    pub(crate) done: FetchDone,
    /// Set once the failure has been handed to the sink.
    pub(crate) reported: Arc<AtomicBool>,
}

/// Storage for one cache key.
pub struct Slot<T> {
    pub(crate) state: watch::Sender<QueryState<T>>,
    /// Invalidated since the last successful fetch.
    pub(crate) stale: bool,
    /// Queried or seeded at least once; only observed keys are revalidated.
    pub(crate) observed: bool,
    /// Bumped on every fetch start and cancellation; settles from older generations are dropped.
    pub(crate) generation: u64,
    pub(crate) inflight: Option<Fetch>,
}

impl<T: Clone> Slot<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            stale: false,
            observed: false,
            generation: 0,
            inflight: None,
        }
    }

    pub(crate) fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn is_fresh(&self, policy: StalePolicy) -> bool {
        let state = self.state.borrow();
        policy == StalePolicy::Never
            && !self.stale
            && state.data.is_some()
            && state.status == QueryStatus::Success
    }

    /// Drop any in-flight fetch; its eventual result will be ignored.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.inflight.take().is_none() {
            return false;
        }
        self.generation += 1;
        self.state.send_modify(|state| {
            state.status = if state.data.is_some() {
                QueryStatus::Success
            } else {
                QueryStatus::Idle
            };
        });
        true
    }

    pub(crate) fn reset(&mut self) {
        self.inflight = None;
        self.generation += 1;
        self.stale = false;
        self.observed = false;
        self.state.send_replace(QueryState::default());
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("stale", &self.stale)
            .field("observed", &self.observed)
            .field("generation", &self.generation)
            .field("inflight", &self.inflight.is_some())
            .finish()
    }
}

/// All cache slots, one per [`QueryKey`].
#[derive(Debug)]
pub struct Slots {
    session: Slot<User>,
    tasks: Slot<Vec<Task>>,
    task_stats: Slot<Vec<PriorityCount>>,
    progress_stats: Slot<ProgressHistogram>,
}

impl Slots {
    pub(crate) fn new() -> Self {
        Self {
            session: Slot::new(),
            tasks: Slot::new(),
            task_stats: Slot::new(),
            progress_stats: Slot::new(),
        }
    }

    pub(crate) fn reset_all(&mut self) {
        self.session.reset();
        self.tasks.reset();
        self.task_stats.reset();
        self.progress_stats.reset();
    }
}

/// A cached resource: its key, staleness policy, slot and fetch function.
pub trait Resource: Send + Sync + 'static {
    type Data: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    const KEY: QueryKey;
    const STALE: StalePolicy;

    #[doc(hidden)]
    fn slot(slots: &mut Slots) -> &mut Slot<Self::Data>;

    fn fetch(api: Arc<dyn TaskApi>) -> BoxFuture<'static, ApiResult<Self::Data>>;
}

/// The authenticated user, loaded by the session probe.
#[derive(Debug)]
pub struct SessionUser;

impl Resource for SessionUser {
    type Data = User;
    const KEY: QueryKey = QueryKey::Session;
    const STALE: StalePolicy = StalePolicy::Never;

    fn slot(slots: &mut Slots) -> &mut Slot<User> {
        &mut slots.session
    }

    fn fetch(api: Arc<dyn TaskApi>) -> BoxFuture<'static, ApiResult<User>> {
        Box::pin(async move { api.probe_session().await })
    }
}

/// The current user's task collection.
#[derive(Debug)]
pub struct TaskList;

impl Resource for TaskList {
    type Data = Vec<Task>;
    const KEY: QueryKey = QueryKey::Tasks;
    const STALE: StalePolicy = StalePolicy::Always;

    fn slot(slots: &mut Slots) -> &mut Slot<Vec<Task>> {
        &mut slots.tasks
    }

    fn fetch(api: Arc<dyn TaskApi>) -> BoxFuture<'static, ApiResult<Vec<Task>>> {
        Box::pin(async move { api.list_tasks().await })
    }
}

/// Task counts per priority.
#[derive(Debug)]
pub struct TaskStats;

impl Resource for TaskStats {
    type Data = Vec<PriorityCount>;
    const KEY: QueryKey = QueryKey::TaskStats;
    const STALE: StalePolicy = StalePolicy::Always;

    fn slot(slots: &mut Slots) -> &mut Slot<Vec<PriorityCount>> {
        &mut slots.task_stats
    }

    fn fetch(api: Arc<dyn TaskApi>) -> BoxFuture<'static, ApiResult<Vec<PriorityCount>>> {
        Box::pin(async move { api.task_stats().await })
    }
}

/// Progress histogram.
#[derive(Debug)]
pub struct ProgressStats;

impl Resource for ProgressStats {
    type Data = ProgressHistogram;
    const KEY: QueryKey = QueryKey::ProgressStats;
    const STALE: StalePolicy = StalePolicy::Always;

    fn slot(slots: &mut Slots) -> &mut Slot<ProgressHistogram> {
        &mut slots.progress_stats
    }

    fn fetch(api: Arc<dyn TaskApi>) -> BoxFuture<'static, ApiResult<ProgressHistogram>> {
        Box::pin(async move { api.progress_stats().await })
    }
}
