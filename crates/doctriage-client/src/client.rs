//! HTTP implementation of the [`Classifier`] contract.
//!
//! Protocol: `POST /api/v2/process` with a multipart body `{file, prompt}`
//! returns `{task_id}`; `GET /api/v2/status/{task_id}` is polled until the
//! task reaches a terminal status. All calls except the health probe carry
//! a bearer token.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use doctriage_types::{ApiConfig, TaskResult, WorkItem};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::classifier::Classifier;
use crate::error::{ClientError, Result};
use crate::retry::{compute_delay, is_retryable, RetryConfig};

/// How much of an error response body is kept in error reasons.
const ERROR_BODY_LIMIT: usize = 300;

/// Configuration for [`ClassifierClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
    /// Bearer token for all calls except health.
    pub token: Option<String>,
    /// Timeout for a single HTTP request (upload or one poll).
    pub http_timeout: Duration,
    /// Delay between consecutive status polls.
    pub poll_interval: Duration,
    /// Delay after a transient poll error (connection refused, overload).
    pub error_backoff: Duration,
}

impl ClientConfig {
    /// Build a client configuration from the shared [`ApiConfig`] section.
    pub fn from_api(api: &ApiConfig) -> Self {
        Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token: api.token.clone(),
            http_timeout: Duration::from_secs(api.http_timeout_seconds),
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Wire format of the upload response.
#[derive(Debug, Deserialize)]
struct ProcessResponse {
    task_id: Option<String>,
}

/// Wire format of the status response.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// The resilient HTTP client for the classification service.
///
/// Shared across all workers of a run; the embedded [`CircuitBreaker`]
/// therefore tracks consecutive failures process-wide.
pub struct ClassifierClient {
    config: ClientConfig,
    retry: RetryConfig,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl ClassifierClient {
    /// Create a client with default retry and breaker settings.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            retry: RetryConfig::default(),
            http: reqwest::Client::new(),
            breaker: CircuitBreaker::default(),
        }
    }

    /// Override the upload retry configuration.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the circuit breaker configuration.
    pub fn with_breaker_config(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(breaker);
        self
    }

    /// Returns the circuit breaker, for status reporting.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.token.as_deref().unwrap_or_default())
    }

    /// Full call sequence: upload with retry, then poll to completion.
    async fn analyze_inner(
        &self,
        item: &WorkItem,
        prompt: &str,
        deadline: Instant,
        budget_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<TaskResult> {
        let call_token = self
            .upload_with_retry(item, prompt, deadline, budget_secs, cancel)
            .await?;
        debug!(item_id = item.id, call_token = %call_token, "upload accepted");

        let (payload, raw) = self
            .poll_result(&call_token, deadline, budget_secs, cancel)
            .await?;

        if payload.status == "completed" {
            let result = payload.result.unwrap_or(serde_json::Value::Null);
            let summary = result
                .get("resume")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(TaskResult::completed(call_token, result, summary, raw))
        } else {
            let reason = payload
                .error
                .unwrap_or_else(|| "remote classification failed".into());
            info!(item_id = item.id, reason = %reason, "service reported failure");
            Ok(TaskResult::failed(reason))
        }
    }

    /// Upload the file and prompt, retrying transient failures with
    /// exponential backoff.
    async fn upload_with_retry(
        &self,
        item: &WorkItem,
        prompt: &str,
        deadline: Instant,
        budget_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let content = tokio::fs::read(&item.path).await?;
        let file_name = item
            .path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("document")
            .to_string();

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(ClientError::BudgetExceeded { budget_secs });
            }

            match self.try_upload(content.clone(), &file_name, prompt).await {
                Ok(token) => {
                    if attempt > 0 {
                        debug!(item_id = item.id, attempt, "upload succeeded after retry");
                    }
                    return Ok(token);
                }
                Err(err) if is_retryable(&err) && attempt + 1 < self.retry.max_attempts => {
                    // Never sleep past the deadline; the budget check at
                    // the top of the loop then reports the exhaustion.
                    let delay = compute_delay(&self.retry, attempt)
                        .min(deadline.saturating_duration_since(Instant::now()));
                    warn!(
                        item_id = item.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying upload after transient error"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One upload attempt.
    async fn try_upload(&self, content: Vec<u8>, file_name: &str, prompt: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("prompt", prompt.to_string());

        let response = self
            .http
            .post(format!("{}/api/v2/process", self.config.base_url))
            .header("Authorization", self.auth_header())
            .multipart(form)
            .timeout(self.config.http_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(ERROR_BODY_LIMIT);
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ProcessResponse = response.json().await.map_err(|e| {
            ClientError::InvalidResponse(format!("upload response not parseable: {e}"))
        })?;
        payload.task_id.ok_or(ClientError::MissingCallToken)
    }

    /// Poll the status endpoint until a terminal status, the deadline, or
    /// cancellation.
    ///
    /// Transient poll errors do not abort the call: a request timeout gets
    /// a brief sleep, a connection error or an overload status (429, 502,
    /// 503) gets a longer one, and polling continues. Any other HTTP error
    /// is terminal.
    async fn poll_result(
        &self,
        call_token: &str,
        deadline: Instant,
        budget_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<(StatusResponse, String)> {
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(ClientError::BudgetExceeded { budget_secs });
            }

            let backoff = match self.try_status(call_token).await {
                Ok((payload, raw)) => {
                    if payload.status == "completed" || payload.status == "failed" {
                        return Ok((payload, raw));
                    }
                    self.config.poll_interval
                }
                Err(ClientError::Http(e)) if e.is_timeout() => {
                    debug!(call_token, "status poll timed out, continuing");
                    self.config.poll_interval
                }
                Err(ClientError::Http(e)) if e.is_connect() => {
                    warn!(call_token, error = %e, "connection error during poll, backing off");
                    self.config.error_backoff
                }
                Err(ClientError::RequestFailed { status, .. })
                    if matches!(status, 429 | 502 | 503) =>
                {
                    warn!(call_token, status, "service overloaded during poll, backing off");
                    self.config.error_backoff
                }
                Err(err) => return Err(err),
            };

            // Clamp to the deadline so a long poll interval cannot push
            // the call past its budget.
            let backoff = backoff.min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// One status request.
    async fn try_status(&self, call_token: &str) -> Result<(StatusResponse, String)> {
        let response = self
            .http
            .get(format!(
                "{}/api/v2/status/{call_token}",
                self.config.base_url
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.config.http_timeout)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let mut body = raw;
            body.truncate(ERROR_BODY_LIMIT);
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let payload: StatusResponse = serde_json::from_str(&raw)
            .map_err(|e| ClientError::InvalidResponse(format!("status response not parseable: {e}")))?;
        Ok((payload, raw))
    }
}

#[async_trait]
impl Classifier for ClassifierClient {
    async fn analyze(
        &self,
        item: &WorkItem,
        prompt: &str,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> TaskResult {
        if let Err(err) = self.breaker.check() {
            debug!(item_id = item.id, "circuit open, failing fast");
            return TaskResult::failed(err.to_string());
        }

        let budget_secs = budget.as_secs();
        let deadline = Instant::now() + budget;

        match self.analyze_inner(item, prompt, deadline, budget_secs, cancel).await {
            Ok(result) => {
                // A terminal answer from the service, success or not, means
                // the service itself is healthy.
                self.breaker.record_success();
                result
            }
            Err(ClientError::Cancelled) => {
                // If this call held the half-open probe slot, release it.
                self.breaker.abort_probe();
                TaskResult::cancelled()
            }
            Err(ClientError::BudgetExceeded { budget_secs }) => {
                self.breaker.abort_probe();
                TaskResult::timed_out(budget_secs)
            }
            Err(err) => {
                if err.counts_as_failure() {
                    self.breaker.record_failure();
                }
                TaskResult::failed(err.to_string())
            }
        }
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/v2/health", self.config.base_url);
        match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!(error = %err, "health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Some("test-token".into()),
            http_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            error_backoff: Duration::from_millis(40),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn temp_item() -> (tempfile::NamedTempFile, WorkItem) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"sample document body").unwrap();
        let item = WorkItem {
            id: 7,
            path: file.path().to_string_lossy().into_owned(),
            fingerprint: Some("abc123".into()),
            file_size: 20,
            priority: 10,
            creation_time: None,
        };
        (file, item)
    }

    #[tokio::test]
    async fn analyze_uploads_and_polls_to_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-42"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "result": {"classification": "invoice", "resume": "An invoice."}
            })))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "classify this", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Completed);
        assert_eq!(result.call_token.as_deref(), Some("task-42"));
        assert_eq!(result.summary, "An invoice.");
        assert!(result.raw_response.contains("invoice"));
    }

    #[tokio::test]
    async fn analyze_waits_through_pending_states() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-9"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "pending"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "result": {}
            })))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn upload_retries_transient_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "result": {}
            })))
            .mount(&server)
            .await;

        let client =
            ClassifierClient::new(fast_config(&server.uri())).with_retry_config(fast_retry());
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn terminal_http_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad multipart"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ClassifierClient::new(fast_config(&server.uri())).with_retry_config(fast_retry());
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        let reason = result.error.unwrap();
        assert!(reason.contains("HTTP 400"), "reason was: {reason}");
    }

    #[tokio::test]
    async fn service_reported_failure_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-3"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "error": "unsupported format"
            })))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("unsupported format"));
    }

    #[tokio::test]
    async fn circuit_opens_after_consecutive_failures() {
        let server = MockServer::start().await;
        // 400 is terminal (no upload retry), so each call is one request.
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(400))
            .expect(2)
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()))
            .with_retry_config(fast_retry())
            .with_breaker_config(BreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(60),
            });
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let result = client
                .analyze(&item, "p", Duration::from_secs(10), &cancel)
                .await;
            assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        }

        // Third call must fail fast; the expect(2) above verifies that no
        // further network attempt reached the server.
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;
        assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        assert!(result.error.unwrap().contains("circuit open"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-5"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "pending"
            })))
            .mount(&server)
            .await;

        let mut config = fast_config(&server.uri());
        config.poll_interval = Duration::from_secs(30);
        let client = ClassifierClient::new(config);
        let (_file, item) = temp_item();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = client
            .analyze(&item, "p", Duration::from_secs(300), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Cancelled);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "cancellation took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn budget_exhaustion_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-6"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "pending"
            })))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(1), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::TimedOut);
        assert_eq!(result.error.as_deref(), Some("timeout_1s"));
    }

    #[tokio::test]
    async fn budget_is_enforced_through_long_poll_sleeps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-8"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "pending"
            })))
            .mount(&server)
            .await;

        // A poll interval far longer than the budget must not delay the
        // timeout verdict.
        let mut config = fast_config(&server.uri());
        config.poll_interval = Duration::from_secs(30);
        let client = ClassifierClient::new(config);
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let result = client
            .analyze(&item, "p", Duration::from_secs(1), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::TimedOut);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "timeout verdict took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn timed_out_probe_does_not_wedge_the_breaker() {
        let server = MockServer::start().await;
        // First upload fails terminally and opens the breaker; later
        // uploads are accepted but never complete.
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(400))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-10"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status/task-10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "pending"
            })))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()))
            .with_retry_config(fast_retry())
            .with_breaker_config(BreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_millis(100),
            });
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();

        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;
        assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        assert!(client.breaker().is_open());

        // Cool-down elapses; the probe call is admitted and times out.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let result = client
            .analyze(&item, "p", Duration::from_secs(1), &cancel)
            .await;
        assert_eq!(result.status, doctriage_types::TaskStatus::TimedOut);

        // The inconclusive probe re-opened the breaker; after another
        // cool-down the next call must reach the network again instead of
        // failing fast forever.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let result = client
            .analyze(&item, "p", Duration::from_secs(1), &cancel)
            .await;
        assert_eq!(result.status, doctriage_types::TaskStatus::TimedOut);
    }

    #[tokio::test]
    async fn missing_call_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        let (_file, item) = temp_item();
        let cancel = CancellationToken::new();
        let result = client
            .analyze(&item, "p", Duration::from_secs(10), &cancel)
            .await;

        assert_eq!(result.status, doctriage_types::TaskStatus::Failed);
        assert!(result.error.unwrap().contains("call token"));
    }

    #[tokio::test]
    async fn health_check_reports_liveness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ClassifierClient::new(fast_config(&server.uri()));
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn health_check_false_when_unreachable() {
        let client = ClassifierClient::new(fast_config("http://127.0.0.1:1"));
        assert!(!client.health_check().await);
    }
}
