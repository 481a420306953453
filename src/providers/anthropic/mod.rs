//! System-as-preamble adapter variant (spec §6 adapter table): the neutral
//! request's `system_prompt` is lifted into a top-level `system` field and
//! messages never carry a `system` role. Folds in the teacher's former
//! `anthropic_common` message/tool conversion helpers, which this is the
//! sole remaining caller of.

use crate::errors::FederationError;
use crate::model::{FinishReason, LLMRequest, LLMResponse, Message, Role, ToolCall, ToolChoice, ToolSpec};
use crate::providers::base::{score_confidence, LLMResponseStream, Provider, ProviderCapabilities};
use crate::providers::transport::{send_json, send_stream, AuthScheme, Deadline, RequestSpec};
use crate::providers::provider_http_client;
use crate::retry::RetryConfig;
use crate::stream::decode_sse_stream;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    provider_id: String,
    display_name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    retry: RetryConfig,
}

impl AnthropicProvider {
    pub fn new(provider_id: impl Into<String>, api_key: String, model: String) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: "Anthropic".to_string(),
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
            client: provider_http_client(),
            retry: RetryConfig::default(),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self { base_url, ..Self::new("anthropic", api_key, model) }
    }

    fn convert_messages(system_prompt: &Option<String>, messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let converted = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let mut value = json!({
                    "role": if m.role == Role::Tool { "user" } else { m.role.as_str() },
                    "content": m.content,
                });
                if m.role == Role::Assistant && !m.tool_calls.is_empty() {
                    let blocks: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.name,
                                "input": serde_json::from_str::<Value>(&tc.arguments).unwrap_or(json!({})),
                            })
                        })
                        .collect();
                    value["content"] = json!(blocks);
                }
                if m.role == Role::Tool
                    && let Some(id) = &m.tool_call_id
                {
                    value["content"] = json!([{
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": m.content,
                    }]);
                }
                value
            })
            .collect();
        (system_prompt.clone(), converted)
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
            .collect()
    }

    fn parse_response(&self, req_id: &str, json: &Value, elapsed_ms: u64) -> Result<LLMResponse, FederationError> {
        let blocks = json["content"]
            .as_array()
            .ok_or_else(|| FederationError::Protocol("missing content array".into()).with_provider(&self.display_name))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => content.push_str(block["text"].as_str().unwrap_or("")),
                Some("tool_use") => tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    call_type: "function".to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: serde_json::to_string(&block["input"]).unwrap_or_else(|_| "{}".to_string()),
                }),
                _ => {}
            }
        }

        let stop_reason = json["stop_reason"].as_str().unwrap_or("");
        let finish_reason = FinishReason::normalize_for_response(stop_reason, !tool_calls.is_empty());
        let confidence = score_confidence(&content, stop_reason);
        let tokens_used = json["usage"]["input_tokens"].as_u64().unwrap_or(0)
            + json["usage"]["output_tokens"].as_u64().unwrap_or(0);

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
            tool_calls,
            metadata: HashMap::new(),
            created_at: now_unix(),
        })
    }

    fn payload(&self, req: &LLMRequest) -> Value {
        let (system, messages) = Self::convert_messages(&req.system_prompt, &req.messages);
        let max_tokens = crate::providers::base::resolve_max_tokens(req.params.max_output_tokens, 4096);

        let mut payload = json!({
            "model": req.params.model.clone().unwrap_or_else(|| self.model.clone()),
            "messages": messages,
            "max_tokens": max_tokens,
        });
        if let Some(temperature) = req.params.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        if let Some(tools) = &req.tools {
            payload["tools"] = json!(Self::convert_tools(tools));
            payload["tool_choice"] = match &req.tool_choice {
                ToolChoice::Auto => json!({"type": "auto"}),
                ToolChoice::Any => json!({"type": "any"}),
                ToolChoice::None => json!({"type": "auto"}),
                ToolChoice::Function { name } => json!({"type": "tool", "name": name}),
            };
        }
        payload
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn anthropic_delta_extractor() -> impl crate::stream::DeltaExtractor {
    |payload: &Value| match payload["type"].as_str() {
        Some("content_block_delta") => payload["delta"]["text"].as_str().map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(&self, req: LLMRequest, cancel: CancellationToken) -> Result<LLMResponse, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let start = std::time::Instant::now();
        let payload = self.payload(&req);
        let spec = RequestSpec {
            method: Method::POST,
            url: self.base_url.clone(),
            auth: AuthScheme::Header("x-api-key"),
            api_key: &self.api_key,
            extra_headers: vec![("anthropic-version", ANTHROPIC_VERSION.to_string())],
            body: payload,
            deadline: Deadline::General,
        };
        let body = send_json(&self.client, &spec, &self.retry, &cancel, &self.display_name).await?;
        self.parse_response(&req.request_id, &body, start.elapsed().as_millis() as u64)
    }

    async fn complete_stream(
        &self,
        req: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponseStream, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let mut payload = self.payload(&req);
        payload["stream"] = json!(true);
        let spec = RequestSpec {
            method: Method::POST,
            url: self.base_url.clone(),
            auth: AuthScheme::Header("x-api-key"),
            api_key: &self.api_key,
            extra_headers: vec![("anthropic-version", ANTHROPIC_VERSION.to_string())],
            body: payload,
            deadline: Deadline::General,
        };
        let reader = send_stream(&self.client, &spec, &self.retry, &cancel, &self.display_name).await?;

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(decode_sse_stream(reader, anthropic_delta_extractor(), cancel, tx));
        Ok(LLMResponseStream { rx })
    }

    async fn health_check(&self) -> Result<(), FederationError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.base_url.clone(),
            auth: AuthScheme::Header("x-api-key"),
            api_key: &self.api_key,
            extra_headers: vec![("anthropic-version", ANTHROPIC_VERSION.to_string())],
            body: json!({"model": self.model, "messages": [{"role": "user", "content": "hi"}], "max_tokens": 1}),
            deadline: Deadline::LowLatency,
        };
        send_json(&self.client, &spec, &RetryConfig { max_retries: 0, ..RetryConfig::default() }, &CancellationToken::new(), &self.display_name)
            .await
            .map(|_| ())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_ids: vec![self.model.clone()],
            feature_tags: vec!["system-preamble".to_string()],
            streaming: true,
            function_calling: true,
            vision: true,
            tools: true,
            reasoning: true,
            code: true,
            max_tokens: 8192,
            max_input: 200_000,
            max_output: 8192,
            max_concurrent: 16,
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

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
