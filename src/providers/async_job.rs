//! Asynchronous-job adapter variant (spec §6 adapter table): the initial
//! POST returns a job descriptor with a `get` URL; the caller polls until
//! `status` reaches a terminal value. Grounded on `BackoffConfig`'s
//! exponential-with-jitter poll cadence, reusing [`crate::retry::drive`]
//! as the poll driver instead of a bespoke loop.

use crate::errors::FederationError;
use crate::model::{FinishReason, LLMRequest, LLMResponse};
use crate::providers::base::{score_confidence, LLMResponseStream, Provider, ProviderCapabilities};
use crate::providers::provider_http_client;
use crate::providers::transport::{send_json, AuthScheme, Deadline, RequestSpec};
use crate::retry::{drive, Outcome, RetryConfig};
use crate::stream::StreamFrame;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Terminal job states (spec §6: `status ∈ {succeeded, failed, canceled}`).
fn is_terminal(status: &str) -> bool {
    matches!(status, "succeeded" | "failed" | "canceled")
}

pub struct AsyncJobProvider {
    provider_id: String,
    display_name: String,
    api_key: String,
    model: String,
    submit_url: String,
    client: Client,
    submit_retry: RetryConfig,
    poll_interval: RetryConfig,
}

impl AsyncJobProvider {
    pub fn new(provider_id: impl Into<String>, display_name: impl Into<String>, api_key: String, model: String, submit_url: String) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: display_name.into(),
            api_key,
            model,
            submit_url,
            client: provider_http_client(),
            submit_retry: RetryConfig::default(),
            poll_interval: RetryConfig {
                max_retries: 120,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(5),
                multiplier: 1.2,
            },
        }
    }

    fn submit_payload(&self, req: &LLMRequest) -> Value {
        let max_tokens = crate::providers::base::resolve_max_tokens(req.params.max_output_tokens, 4096);
        json!({
            "model": req.params.model.clone().unwrap_or_else(|| self.model.clone()),
            "input": req.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("\n"),
            "max_output_tokens": max_tokens,
        })
    }

    async fn submit(&self, req: &LLMRequest, cancel: &CancellationToken) -> Result<String, FederationError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.submit_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: self.submit_payload(req),
            deadline: Deadline::General,
        };
        let body = send_json(&self.client, &spec, &self.submit_retry, cancel, &self.display_name).await?;
        body["get"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FederationError::Protocol("job response missing get URL".into()).with_provider(&self.display_name))
    }

    /// Poll the job's `get` URL until it reaches a terminal status, using
    /// the shared backoff driver as the poll cadence. Cancellation aborts
    /// the poll (spec §6: "cancellation aborts poll").
    async fn poll(&self, get_url: &str, cancel: &CancellationToken) -> Result<Value, FederationError> {
        drive(&self.poll_interval, cancel, |_attempt| async {
            let spec = RequestSpec {
                method: Method::GET,
                url: get_url.to_string(),
                auth: AuthScheme::Bearer,
                api_key: &self.api_key,
                extra_headers: Vec::new(),
                body: Value::Null,
                deadline: Deadline::LowLatency,
            };
            match send_json(&self.client, &spec, &RetryConfig { max_retries: 0, ..RetryConfig::default() }, cancel, &self.display_name).await {
                Ok(body) => {
                    let status = body["status"].as_str().unwrap_or("");
                    if is_terminal(status) {
                        Outcome::Done(Ok(body))
                    } else {
                        Outcome::Retry(FederationError::Transport(format!("job not yet terminal: {status}")))
                    }
                }
                Err(e) if e.is_retryable() => Outcome::Retry(e),
                Err(e) => Outcome::Done(Err(e)),
            }
        })
        .await
    }

    /// Job output may be a single string or a string array to be
    /// concatenated in order (spec §6).
    fn extract_output(job: &Value) -> String {
        match &job["output"] {
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(""),
            _ => String::new(),
        }
    }

    fn to_response(&self, req_id: &str, job: &Value, elapsed_ms: u64) -> LLMResponse {
        let content = Self::extract_output(job);
        let status = job["status"].as_str().unwrap_or("succeeded");
        let finish_reason = if status == "succeeded" { FinishReason::Stop } else { FinishReason::normalize(status) };
        let confidence = score_confidence(&content, status);
        LLMResponse {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: req_id.to_string(),
            provider_id: self.provider_id.clone(),
            provider_display_name: self.display_name.clone(),
            content,
            confidence,
            tokens_used: job["usage"]["total_tokens"].as_u64().unwrap_or(0),
            response_time_ms: elapsed_ms,
            finish_reason,
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
            created_at: now_unix(),
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[async_trait]
impl Provider for AsyncJobProvider {
    async fn complete(&self, req: LLMRequest, cancel: CancellationToken) -> Result<LLMResponse, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let start = std::time::Instant::now();
        let get_url = self.submit(&req, &cancel).await?;
        let job = self.poll(&get_url, &cancel).await?;

        let status = job["status"].as_str().unwrap_or("");
        if status == "failed" || status == "canceled" {
            return Err(FederationError::Upstream { status: 502, body: format!("job {status}") }.with_provider(&self.display_name));
        }

        Ok(self.to_response(&req.request_id, &job, start.elapsed().as_millis() as u64))
    }

    /// No incremental delivery: poll to completion, then emit the whole
    /// output as one final frame, or a single error frame if polling fails
    /// (spec §6/§7), same fallback as the legacy variant.
    async fn complete_stream(
        &self,
        req: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponseStream, FederationError> {
        let (tx, rx) = mpsc::channel(1);
        let frame = match self.complete(req, cancel).await {
            Ok(response) => StreamFrame {
                content: response.content,
                is_final: true,
                finish_reason: Some(response.finish_reason),
                elapsed_ms: Some(response.response_time_ms),
            },
            Err(e) => {
                warn!(provider = %self.display_name, error = %e, "async job failed; synthesizing error frame");
                StreamFrame { content: String::new(), is_final: true, finish_reason: Some(FinishReason::Error), elapsed_ms: None }
            }
        };
        let _ = tx.send(frame).await;
        Ok(LLMResponseStream { rx })
    }

    async fn health_check(&self) -> Result<(), FederationError> {
        let spec = RequestSpec {
            method: Method::GET,
            url: self.submit_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: Value::Null,
            deadline: Deadline::LowLatency,
        };
        match send_json(&self.client, &spec, &RetryConfig { max_retries: 0, ..RetryConfig::default() }, &CancellationToken::new(), &self.display_name).await {
            Ok(_) => Ok(()),
            // A 404/405 on a bare GET to the submit URL still proves the
            // host is reachable; only transport-level failures fail the check.
            Err(FederationError::Upstream { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_ids: vec![self.model.clone()],
            feature_tags: vec!["async-job".to_string()],
            streaming: false,
            function_calling: false,
            vision: false,
            tools: false,
            reasoning: true,
            code: true,
            max_tokens: 32_768,
            max_input: 200_000,
            max_output: 32_768,
            max_concurrent: 4,
            metadata: HashMap::new(),
        }
    }

    fn validate_config(&self, config: &HashMap<String, String>) -> (bool, Vec<String>) {
        let mut errors = Vec::new();
        if config.get("api_key").map(String::is_empty).unwrap_or(true) {
            errors.push("api_key is required".to_string());
        }
        (errors.is_empty(), errors)
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}

impl std::fmt::Debug for AsyncJobProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncJobProvider")
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
