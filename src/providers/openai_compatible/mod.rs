//! OpenAI-compatible baseline adapter (spec §6 adapter table): data-driven
//! so one struct serves several concrete providers differing only in
//! hostname, model catalog, and default token cap. Grounded on the
//! teacher's `OpenAIProvider`, generalized from a single hardcoded
//! `API_URL`/`gpt-4o` pair to constructor parameters.

use crate::errors::FederationError;
use crate::model::{FinishReason, LLMRequest, LLMResponse, Role, ToolCall, ToolChoice};
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

/// Per-instantiation catalog: what varies between concrete
/// OpenAI-compatible providers (spec §6 note: "several concrete adapters
/// with different hostnames, model catalogs, and default tokens caps").
#[derive(Debug, Clone)]
pub struct Catalog {
    pub provider_id: String,
    pub display_name: String,
    pub base_url: String,
    pub model_ids: Vec<String>,
    pub default_max_tokens: i64,
}

impl Catalog {
    pub fn openai() -> Self {
        Self {
            provider_id: "openai".into(),
            display_name: "OpenAI".into(),
            base_url: "https://api.openai.com/v1/chat/completions".into(),
            model_ids: vec!["gpt-4o".into(), "gpt-4o-mini".into()],
            default_max_tokens: 4096,
        }
    }

    pub fn mistral() -> Self {
        Self {
            provider_id: "mistral".into(),
            display_name: "Mistral".into(),
            base_url: "https://api.mistral.ai/v1/chat/completions".into(),
            model_ids: vec!["mistral-large-latest".into()],
            default_max_tokens: 4096,
        }
    }

    pub fn deepseek() -> Self {
        Self {
            provider_id: "deepseek".into(),
            display_name: "DeepSeek".into(),
            base_url: "https://api.deepseek.com/v1/chat/completions".into(),
            model_ids: vec!["deepseek-chat".into(), "deepseek-reasoner".into()],
            default_max_tokens: 8192,
        }
    }
}

pub struct OpenAICompatibleProvider {
    catalog: Catalog,
    api_key: String,
    model: String,
    client: Client,
    retry: RetryConfig,
}

impl OpenAICompatibleProvider {
    pub fn new(catalog: Catalog, api_key: String) -> Self {
        let model = catalog.model_ids.first().cloned().unwrap_or_default();
        Self { catalog, api_key, model, client: provider_http_client(), retry: RetryConfig::default() }
    }

    #[cfg(test)]
    fn with_base_url(api_key: String, base_url: String) -> Self {
        let mut catalog = Catalog::openai();
        catalog.base_url = base_url;
        Self::new(catalog, api_key)
    }

    fn to_wire_messages(req: &LLMRequest) -> Vec<Value> {
        let mut out = Vec::new();
        if let Some(system) = &req.system_prompt {
            out.push(json!({"role": "system", "content": system}));
        }
        for m in &req.messages {
            let mut value = json!({"role": m.role.as_str(), "content": m.content});
            if m.role == Role::Assistant && !m.tool_calls.is_empty() {
                value["tool_calls"] = json!(m
                    .tool_calls
                    .iter()
                    .map(|tc| json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.arguments},
                    }))
                    .collect::<Vec<_>>());
            }
            if let Some(id) = &m.tool_call_id {
                value["tool_call_id"] = json!(id);
            }
            out.push(value);
        }
        out
    }

    fn payload(&self, req: &LLMRequest, stream: bool) -> Value {
        let max_tokens =
            crate::providers::base::resolve_max_tokens(req.params.max_output_tokens, self.catalog.default_max_tokens);
        let mut payload = json!({
            "model": req.params.model.clone().unwrap_or_else(|| self.model.clone()),
            "messages": Self::to_wire_messages(req),
            "max_tokens": max_tokens,
            "stream": stream,
        });
        if let Some(temperature) = req.params.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(tools) = &req.tools {
            payload["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {"name": t.name, "description": t.description, "parameters": t.parameters},
                }))
                .collect::<Vec<_>>());
            payload["tool_choice"] = match &req.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Any => json!("required"),
                ToolChoice::None => json!("none"),
                ToolChoice::Function { name } => json!({"type": "function", "function": {"name": name}}),
            };
        }
        payload
    }

    fn parse_response(&self, req_id: &str, body: &Value, elapsed_ms: u64) -> Result<LLMResponse, FederationError> {
        let choice = body["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| FederationError::Protocol("no choices in response".into()).with_provider(&self.catalog.display_name))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|tc| ToolCall {
                        id: tc["id"].as_str().unwrap_or("").to_string(),
                        call_type: "function".to_string(),
                        name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                        arguments: tc["function"]["arguments"].as_str().unwrap_or("{}").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_raw = choice["finish_reason"].as_str().unwrap_or("");
        let finish_reason = FinishReason::normalize_for_response(finish_raw, !tool_calls.is_empty());
        let confidence = score_confidence(&content, finish_raw);
        let tokens_used = body["usage"]["total_tokens"].as_u64().unwrap_or(0);

        Ok(LLMResponse {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: req_id.to_string(),
            provider_id: self.catalog.provider_id.clone(),
            provider_display_name: self.catalog.display_name.clone(),
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
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn openai_delta_extractor() -> impl crate::stream::DeltaExtractor {
    |payload: &Value| payload["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}

#[async_trait]
impl Provider for OpenAICompatibleProvider {
    async fn complete(&self, req: LLMRequest, cancel: CancellationToken) -> Result<LLMResponse, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let start = std::time::Instant::now();
        let spec = RequestSpec {
            method: Method::POST,
            url: self.catalog.base_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: self.payload(&req, false),
            deadline: Deadline::General,
        };
        let body = send_json(&self.client, &spec, &self.retry, &cancel, &self.catalog.display_name).await?;
        self.parse_response(&req.request_id, &body, start.elapsed().as_millis() as u64)
    }

    async fn complete_stream(
        &self,
        req: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponseStream, FederationError> {
        req.validate().map_err(FederationError::Configuration)?;
        let spec = RequestSpec {
            method: Method::POST,
            url: self.catalog.base_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: self.payload(&req, true),
            deadline: Deadline::General,
        };
        let reader = send_stream(&self.client, &spec, &self.retry, &cancel, &self.catalog.display_name).await?;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(decode_sse_stream(reader, openai_delta_extractor(), cancel, tx));
        Ok(LLMResponseStream { rx })
    }

    async fn health_check(&self) -> Result<(), FederationError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.catalog.base_url.clone(),
            auth: AuthScheme::Bearer,
            api_key: &self.api_key,
            extra_headers: Vec::new(),
            body: json!({"model": self.model, "messages": [{"role": "user", "content": "hi"}], "max_tokens": 1}),
            deadline: Deadline::LowLatency,
        };
        send_json(&self.client, &spec, &RetryConfig { max_retries: 0, ..RetryConfig::default() }, &CancellationToken::new(), &self.catalog.display_name)
            .await
            .map(|_| ())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_ids: self.catalog.model_ids.clone(),
            feature_tags: vec!["openai-compatible".to_string()],
            streaming: true,
            function_calling: true,
            vision: false,
            tools: true,
            reasoning: false,
            code: true,
            max_tokens: self.catalog.default_max_tokens as u32,
            max_input: 128_000,
            max_output: self.catalog.default_max_tokens as u32,
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
        &self.catalog.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}

impl std::fmt::Debug for OpenAICompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatibleProvider")
            .field("provider_id", &self.catalog.provider_id)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
