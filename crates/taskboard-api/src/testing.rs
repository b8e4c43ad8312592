//! In-memory [`TaskApi`] for tests.
//!
//! [`ScriptedApi`] behaves like a small server: it keeps accounts, one
//! session and per-owner tasks, and answers task endpoints with 401 when no
//! session is active. Tests can queue failures per endpoint, count calls and
//! hold an endpoint behind a [`Gate`] to observe in-flight states.

use crate::client::TaskApi;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::types::{
    AuthResponse, Credentials, NewTask, Priority, PriorityCount, Progress, ProgressHistogram,
    Task, TaskPatch, TaskRecord, User,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Remote operation selector for scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Probe,
    SignIn,
    SignUp,
    SignOut,
    ListTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    TaskStats,
    ProgressStats,
}

/// Blocks calls to one endpoint until permits are released.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    /// Let one held call proceed.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    /// Let every current and future call proceed.
    pub fn open(&self) {
        self.permits.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct ServerState {
    accounts: HashMap<String, Account>,
    session: Option<String>,
    tasks: Vec<TaskRecord>,
    next_task_id: i64,
    next_user_id: i64,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    calls: HashMap<Endpoint, usize>,
    gates: HashMap<Endpoint, Gate>,
}

impl ServerState {
    fn session_user(&self) -> ApiResult<User> {
        self.session
            .as_ref()
            .and_then(|email| self.accounts.get(email))
            .map(|account| account.user.clone())
            .ok_or_else(unauthenticated)
    }

    fn owned_task(&mut self, owner: &str, id: i64) -> ApiResult<&mut TaskRecord> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner == owner)
            .ok_or_else(|| ApiError::from_status_body(404, r#"{"detail":"Not found."}"#))
    }

    fn tasks_of<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a TaskRecord> + 'a {
        self.tasks.iter().filter(move |t| t.owner == owner)
    }
}

fn unauthenticated() -> ApiError {
    ApiError::from_status_body(
        401,
        r#"{"detail":"Authentication credentials were not provided."}"#,
    )
}

fn bad_request(field: &str, message: &str) -> ApiError {
    ApiError::Http {
        status: 400,
        server_message: None,
        field_errors: FieldErrors::single(field, message),
    }
}

/// Scriptable in-memory server.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.register(email, password);
        self
    }

    /// Register an account and start a session for it, as if a cookie were present.
    pub fn with_session(self, email: &str, password: &str) -> Self {
        self.register(email, password);
        self.state.lock().session = Some(email.to_string());
        self
    }

    fn register(&self, email: &str, password: &str) -> User {
        let mut state = self.state.lock();
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Insert a task owned by `owner` directly, returning its id.
    pub fn seed_task(&self, owner: &str, title: &str, priority: Priority, progress: Progress) -> i64 {
        let mut state = self.state.lock();
        state.next_task_id += 1;
        let id = state.next_task_id;
        let now = Utc::now();
        state.tasks.push(TaskRecord {
            id,
            title: title.to_string(),
            priority,
            progress,
            owner: owner.to_string(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Drop the server-side session, as when the cookie expires.
    pub fn expire_session(&self) {
        self.state.lock().session = None;
    }

    pub fn has_session(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Server-side task titles for `owner`, in insertion order.
    pub fn titles_of(&self, owner: &str) -> Vec<String> {
        let state = self.state.lock();
        state.tasks_of(owner).map(|t| t.title.clone()).collect()
    }

    /// Fail the next call to `endpoint` with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.state
            .lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    /// Calls made to `endpoint` so far, including held and failed ones.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// Hold every subsequent call to `endpoint` until the returned gate releases it.
    pub fn hold(&self, endpoint: Endpoint) -> Gate {
        let gate = Gate {
            permits: Arc::new(Semaphore::new(0)),
        };
        self.state.lock().gates.insert(endpoint, gate.clone());
        gate
    }

    /// Wait until `endpoint` has been called at least `count` times.
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) {
        while self.calls(endpoint) < count {
            tokio::task::yield_now().await;
        }
    }

    /// Count the call, wait at the gate, then pop a scripted failure if any.
    async fn enter(&self, endpoint: Endpoint) -> ApiResult<()> {
        let gate = {
            let mut state = self.state.lock();
            *state.calls.entry(endpoint).or_default() += 1;
            state.gates.get(&endpoint).cloned()
        };

        if let Some(gate) = gate {
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
        }

        let mut state = self.state.lock();
        match state.failures.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn probe_session(&self) -> ApiResult<User> {
        self.enter(Endpoint::Probe).await?;
        self.state.lock().session_user()
    }

    async fn sign_in(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        self.enter(Endpoint::SignIn).await?;
        let mut state = self.state.lock();
        let user = match state.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => account.user.clone(),
            _ => {
                return Err(bad_request(
                    "non_field_errors",
                    "Unable to log in with provided credentials.",
                ))
            }
        };
        state.session = Some(user.email.clone());
        Ok(AuthResponse { user: Some(user) })
    }

    async fn sign_up(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        self.enter(Endpoint::SignUp).await?;
        if self.state.lock().accounts.contains_key(&credentials.email) {
            return Err(bad_request(
                "email",
                "A user is already registered with this e-mail address.",
            ));
        }
        let user = self.register(&credentials.email, &credentials.password);
        self.state.lock().session = Some(user.email.clone());
        Ok(AuthResponse { user: Some(user) })
    }

    async fn sign_out(&self) -> ApiResult<()> {
        self.enter(Endpoint::SignOut).await?;
        self.state.lock().session = None;
        Ok(())
    }

    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.enter(Endpoint::ListTasks).await?;
        let state = self.state.lock();
        let user = state.session_user()?;
        Ok(state.tasks_of(&user.email).cloned().map(Task::from).collect())
    }

    async fn create_task(&self, input: &NewTask) -> ApiResult<Task> {
        self.enter(Endpoint::CreateTask).await?;
        let owner = self.state.lock().session_user()?.email;
        let id = self.seed_task(&owner, &input.title, input.priority, input.progress);
        let state = self.state.lock();
        let record = state
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ApiError::status(500))?;
        Ok(record.into())
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> ApiResult<Task> {
        self.enter(Endpoint::UpdateTask).await?;
        let mut state = self.state.lock();
        let owner = state.session_user()?.email;
        let record = state.owned_task(&owner, id)?;
        if let Some(title) = &patch.title {
            record.title = title.clone();
        }
        if let Some(priority) = patch.priority {
            record.priority = priority;
        }
        if let Some(progress) = patch.progress {
            record.progress = progress;
        }
        record.updated_at = Utc::now();
        Ok(record.clone().into())
    }

    async fn delete_task(&self, id: i64) -> ApiResult<()> {
        self.enter(Endpoint::DeleteTask).await?;
        let mut state = self.state.lock();
        let owner = state.session_user()?.email;
        state.owned_task(&owner, id)?;
        state.tasks.retain(|t| t.id != id);
        Ok(())
    }

    async fn task_stats(&self) -> ApiResult<Vec<PriorityCount>> {
        self.enter(Endpoint::TaskStats).await?;
        let state = self.state.lock();
        let owner = state.session_user()?.email;
        Ok(Priority::ALL
            .iter()
            .map(|&priority| PriorityCount {
                priority,
                count: state.tasks_of(&owner).filter(|t| t.priority == priority).count() as u64,
            })
            .filter(|c| c.count > 0)
            .collect())
    }

    async fn progress_stats(&self) -> ApiResult<ProgressHistogram> {
        self.enter(Endpoint::ProgressStats).await?;
        let state = self.state.lock();
        let owner = state.session_user()?.email;
        let mut histogram = ProgressHistogram::default();
        for task in state.tasks_of(&owner) {
            match task.progress.value() {
                0..=20 => histogram.range_0_20 += 1,
                21..=40 => histogram.range_21_40 += 1,
                41..=60 => histogram.range_41_60 += 1,
                61..=80 => histogram.range_61_80 += 1,
                _ => histogram.range_81_100 += 1,
            }
        }
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_task_endpoints_require_session() {
        let api = ScriptedApi::new().with_account("a@b.com", "pw");
        let err = api.list_tasks().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);

        api.sign_in(&Credentials::new("a@b.com", "pw")).await.unwrap();
        assert!(api.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_are_validation_errors() {
        let api = ScriptedApi::new().with_account("a@b.com", "pw");
        let err = api
            .sign_in(&Credentials::new("a@b.com", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!api.has_session());
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_once() {
        let api = ScriptedApi::new().with_session("a@b.com", "pw");
        api.fail_next(Endpoint::ListTasks, ApiError::status(503));

        assert_eq!(api.list_tasks().await.unwrap_err().kind(), ErrorKind::Server);
        assert!(api.list_tasks().await.is_ok());
        assert_eq!(api.calls(Endpoint::ListTasks), 2);
    }

    #[tokio::test]
    async fn test_tasks_are_scoped_to_owner() {
        let api = ScriptedApi::new().with_session("a@b.com", "pw");
        api.seed_task("other@b.com", "Not mine", Priority::Low, Progress::ZERO);
        let mine = api.seed_task("a@b.com", "Mine", Priority::High, Progress::ZERO);

        let tasks = api.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id.server_id(), Some(mine));

        let err = api.delete_task(1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_progress_histogram_bounds() {
        let api = ScriptedApi::new().with_session("a@b.com", "pw");
        for value in [0, 20, 21, 80, 81, 100] {
            let progress = Progress::try_from(value).unwrap();
            api.seed_task("a@b.com", "t", Priority::Medium, progress);
        }
        let histogram = api.progress_stats().await.unwrap();
        assert_eq!(histogram.range_0_20, 2);
        assert_eq!(histogram.range_21_40, 1);
        assert_eq!(histogram.range_41_60, 0);
        assert_eq!(histogram.range_61_80, 1);
        assert_eq!(histogram.range_81_100, 2);
    }

    #[tokio::test]
    async fn test_held_call_waits_for_release() {
        let api = ScriptedApi::new().with_session("a@b.com", "pw");
        let gate = api.hold(Endpoint::Probe);

        let pending = tokio::spawn({
            let api = api.clone();
            async move { api.probe_session().await }
        });
        api.wait_for_calls(Endpoint::Probe, 1).await;
        assert!(!pending.is_finished());

        gate.release();
        let user = pending.await.unwrap().unwrap();
        assert_eq!(user.email, "a@b.com");
    }
}
