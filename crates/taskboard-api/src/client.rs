//! Resource client: the [`TaskApi`] seam and its reqwest implementation.
//!
//! The session credential is an HTTP-only cookie. The reqwest cookie jar
//! stores and replays it; nothing in this crate reads it.

use crate::error::{ApiError, ApiResult};
use crate::types::{
    AuthResponse, Credentials, NewTask, PriorityCount, ProgressHistogram, Task, TaskPatch,
    TaskRecord, User,
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Remote operations consumed by the cache and session layers.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Succeeds only while the ambient session cookie is valid.
    async fn probe_session(&self) -> ApiResult<User>;
    async fn sign_in(&self, credentials: &Credentials) -> ApiResult<AuthResponse>;
    async fn sign_up(&self, credentials: &Credentials) -> ApiResult<AuthResponse>;
    async fn sign_out(&self) -> ApiResult<()>;

    async fn list_tasks(&self) -> ApiResult<Vec<Task>>;
    /// Not idempotent: a retried create may produce a duplicate.
    async fn create_task(&self, input: &NewTask) -> ApiResult<Task>;
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> ApiResult<Task>;
    async fn delete_task(&self, id: i64) -> ApiResult<()>;

    async fn task_stats(&self) -> ApiResult<Vec<PriorityCount>>;
    async fn progress_stats(&self) -> ApiResult<ProgressHistogram>;
}

/// Statuses worth retrying for idempotent methods.
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Retry behaviour for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub limit: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 3,
            initial_delay_ms: 300,
            max_delay_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            limit: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), doubling up to the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn applies_to(method: &Method) -> bool {
        *method == Method::GET || *method == Method::PUT || *method == Method::DELETE
    }
}

/// Transport settings for [`HttpTaskApi`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// reqwest-backed [`TaskApi`].
#[derive(Clone, Debug)]
pub struct HttpTaskApi {
    http_client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpTaskApi {
    /// Create a client rooted at `base_url` (which must end with `/`).
    pub fn new(base_url: Url, options: HttpOptions) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(options.timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            retry: options.retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url.join(path).map_err(|e| ApiError::Transport {
            message: format!("invalid endpoint {path}: {e}"),
            timed_out: false,
        })
    }

    /// Send a request, retrying idempotent methods on gateway/server errors.
    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<reqwest::Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(path)?;
        let retryable = RetryPolicy::applies_to(&method);
        let mut attempt = 0u32;

        loop {
            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, path, attempt, "Sending request");
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if retryable && attempt < self.retry.limit && RETRY_STATUSES.contains(&status) {
                let delay = self.retry.delay_for_attempt(attempt);
                warn!(
                    method = %method,
                    path,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status_body(status.as_u16(), &body);
            debug!(method = %method, path, status = status.as_u16(), kind = %err.kind(), "Request failed");
            return Err(err);
        }
    }

    /// Decode a success body; a malformed body keeps its status and classifies as `http.other`.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(status, error = %e, "Malformed response body");
            ApiError::Http {
                status,
                server_message: Some(format!("Malformed response body: {e}")),
                field_errors: Default::default(),
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn probe_session(&self) -> ApiResult<User> {
        self.get("auth/user/").await
    }

    async fn sign_in(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let response = self.send(Method::POST, "auth/login/", Some(&body)).await?;
        Self::decode(response).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let body = json!({
            "email": credentials.email,
            "password1": credentials.password,
            "password2": credentials.password,
        });
        let response = self
            .send(Method::POST, "auth/registration/", Some(&body))
            .await?;
        Self::decode(response).await
    }

    async fn sign_out(&self) -> ApiResult<()> {
        self.send::<()>(Method::POST, "auth/logout/", None).await?;
        Ok(())
    }

    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        let records: Vec<TaskRecord> = self.get("todos/").await?;
        Ok(records.into_iter().map(Task::from).collect())
    }

    async fn create_task(&self, input: &NewTask) -> ApiResult<Task> {
        let response = self.send(Method::POST, "todos/", Some(input)).await?;
        let record: TaskRecord = Self::decode(response).await?;
        Ok(record.into())
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> ApiResult<Task> {
        let path = format!("todos/{id}/");
        let response = self.send(Method::PATCH, &path, Some(patch)).await?;
        let record: TaskRecord = Self::decode(response).await?;
        Ok(record.into())
    }

    async fn delete_task(&self, id: i64) -> ApiResult<()> {
        let path = format!("todos/{id}/");
        self.send::<()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn task_stats(&self) -> ApiResult<Vec<PriorityCount>> {
        self.get("todos/stats/").await
    }

    async fn progress_stats(&self) -> ApiResult<ProgressHistogram> {
        self.get("todos/progress-stats/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(3000));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(3000));
    }

    #[test]
    fn test_retry_methods() {
        assert!(RetryPolicy::applies_to(&Method::GET));
        assert!(RetryPolicy::applies_to(&Method::PUT));
        assert!(RetryPolicy::applies_to(&Method::DELETE));
        assert!(!RetryPolicy::applies_to(&Method::POST));
        assert!(!RetryPolicy::applies_to(&Method::PATCH));
    }

    #[test]
    fn test_endpoint_join_keeps_prefix() {
        let base = Url::parse("http://localhost:8000/api/v1/").unwrap();
        let api = HttpTaskApi::new(base, HttpOptions::default()).unwrap();
        assert_eq!(
            api.endpoint("todos/3/").unwrap().as_str(),
            "http://localhost:8000/api/v1/todos/3/"
        );
    }
}
