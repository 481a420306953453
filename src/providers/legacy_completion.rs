//! Text-inference legacy adapter variant (spec §6 adapter table): a
//! single-prompt input with no structured message history; streaming is not
//! natively supported, so `complete_stream` falls back to a synthesized
//! one-frame stream. Grounded on the endpoint-selection and body-building
//! shape of `OllamaBackend::build_generate_body`/`build_chat_body`, folded
//! into one always-prompt path since this variant never carries history.

use crate::errors::FederationError;
use crate::model::{FinishReason, LLMRequest, LLMResponse, Role};
use crate::providers::base::{score_confidence, LLMResponseStream, Provider, ProviderCapabilities};
use crate::providers::provider_http_client;
use crate::providers::transport::{send_json, AuthScheme, Deadline, RequestSpec};
use crate::retry::RetryConfig;
use crate::stream::StreamFrame;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct LegacyCompletionProvider {
    provider_id: String,
    display_name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    retry: RetryConfig,
}

impl LegacyCompletionProvider {
    pub fn new(provider_id: impl Into<String>, display_name: impl Into<String>, api_key: String, model: String, base_url: String) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: display_name.into(),
            api_key,
            model,
            base_url,
            client: provider_http_client(),
            retry: RetryConfig::default(),
        }
    }

    /// Flatten the neutral request's system prompt and message history into
    /// one prompt string, since this variant has no structured input.
    fn flatten_prompt(req: &LLMRequest) -> String {
        let mut parts = Vec::new();
        if let Some(system) = &req.system_prompt {
            parts.push(format!("System: {system}"));
        }
        for m in &req.messages {
            let label = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
            };
            parts.push(format!("{label}: {}", m.content));
        }
        parts.push("Assistant:".to_string());
        parts.join("\n")
    }

    fn payload(&self, req: &LLMRequest) -> Value {
        let max_tokens = crate::providers::base::resolve_max_tokens(req.params.max_output_tokens, 2048);
        json!({
            "model": req.params.model.clone().unwrap_or_else(|| self.model.clone()),
            "prompt": Self::flatten_prompt(req),
            "max_tokens": max_tokens,
            "temperature": req.params.temperature.unwrap_or(0.7),
            "stream": false,
        })
    }

    fn parse_response(&self, req_id: &str, body: &Value, elapsed_ms: u64) -> Result<LLMResponse, FederationError> {
        let content = body["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["text"].as_str())
            .or_else(|| body["response"].as_str())
            .ok_or_else(|| FederationError::Protocol("no completion text in response".into()).with_provider(&self.display_name))?
            .to_string();

        let finish_raw = body["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["finish_reason"].as_str())
            .unwrap_or("stop");
        let finish_reason = FinishReason::normalize(finish_raw);
        let confidence = score_confidence(&content, finish_raw);
        let tokens_used = body["usage"]["total_tokens"].as_u64().unwrap_or(0);

        Ok(LLMResponse {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: req_id.to_string(),
            provider_id: self.provider_id.clone(),
            provider_display_name: self.display_name.clone(),
            content,
            confidence,
            tokens_used,
            response_time_ms: elapsed_ms,
            finish_reason,
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
            created_at: now_unix(),
        })
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[async_trait]
impl Provider for LegacyCompletionProvider {
    async fn complete(&self, req: LLMRequest, cancel: CancellationToken) -> Result<LLMResponse, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let start = std::time::Instant::now();
        let spec = RequestSpec {
            method: Method::POST,
            url: self.base_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: self.payload(&req),
            deadline: Deadline::General,
        };
        let body = send_json(&self.client, &spec, &self.retry, &cancel, &self.display_name).await?;
        self.parse_response(&req.request_id, &body, start.elapsed().as_millis() as u64)
    }

    /// No native streaming: run the request to completion, then emit it as
    /// a single synthesized frame, or a single error frame if the underlying
    /// call fails (spec §6: "streaming falls back to a synthesized one-frame
    /// stream (or an error frame)"; spec §7: consumers get a terminal
    /// `finish_reason=error` frame rather than a raised error).
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
                warn!(provider = %self.display_name, error = %e, "legacy completion failed; synthesizing error frame");
                StreamFrame { content: String::new(), is_final: true, finish_reason: Some(FinishReason::Error), elapsed_ms: None }
            }
        };
        let _ = tx.send(frame).await;
        Ok(LLMResponseStream { rx })
    }

    async fn health_check(&self) -> Result<(), FederationError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.base_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: json!({"model": self.model, "prompt": "hi", "max_tokens": 1}),
            deadline: Deadline::LowLatency,
        };
        send_json(&self.client, &spec, &RetryConfig { max_retries: 0, ..RetryConfig::default() }, &CancellationToken::new(), &self.display_name)
            .await
            .map(|_| ())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_ids: vec![self.model.clone()],
            feature_tags: vec!["legacy-completion".to_string()],
            streaming: false,
            function_calling: false,
            vision: false,
            tools: false,
            reasoning: false,
            code: false,
            max_tokens: 2048,
            max_input: 4096,
            max_output: 2048,
            max_concurrent: 8,
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

impl std::fmt::Debug for LegacyCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyCompletionProvider")
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
