//! Neutral request/response model shared across every provider adapter and
//! MCP tool-call result. Pure data — field validation only, no behavior.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Message role. Closed set per spec: `{system, user, assistant, tool}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool-call request emitted by the model inside an assistant message, or
/// echoed back in a `ToolChoice::Function` directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_function_type")]
    pub call_type: String,
    pub name: String,
    /// Arguments are carried as JSON text, never as a parsed structure, to
    /// preserve round-trip fidelity with upstreams that return non-strict
    /// JSON (spec §4.A).
    pub arguments: String,
}

fn default_function_type() -> String {
    "function".to_string()
}

/// One message in the ordered conversation. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls, tool_call_id: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool advertised to the model: `{type=function, name, description, schema}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type", default = "default_function_type")]
    pub spec_type: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// `auto` (default), `any` (force tool use), `none`, or a specific function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Any,
    None,
    Function { name: String },
}

impl Default for ToolChoice {
    fn default() -> Self {
        Self::Auto
    }
}

/// Model parameters shared across providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// Neutral request accepted by every provider adapter (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub params: ModelParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

impl LLMRequest {
    /// Validate recognized roles and non-negative token counts (spec §4.A).
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.params.max_output_tokens
            && max < 0
        {
            return Err("max_output_tokens must be non-negative".into());
        }
        Ok(())
    }
}

/// Normalized terminal cause of a completion (spec Glossary: Finish reason).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    /// Pass-through provider string when unknown.
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Normalize a raw provider finish-reason string into the closed set,
    /// falling back to `Other` verbatim (spec §3: "raw provider string if
    /// unknown").
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            "error" => Self::Error,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Normalize a raw provider finish reason the way every adapter's
    /// response translation must (spec §4.D): if tool calls are present and
    /// the wire reason isn't already a clean-stop/length/content-filter
    /// classification, the call terminated to invoke a tool, so report
    /// `ToolCalls` regardless of what the provider's own string says (e.g.
    /// Anthropic's `stop_reason: "tool_use"`).
    pub fn normalize_for_response(raw: &str, has_tool_calls: bool) -> Self {
        let normalized = Self::normalize(raw);
        if has_tool_calls && !matches!(normalized, Self::Stop | Self::Length | Self::ContentFilter) {
            Self::ToolCalls
        } else {
            normalized
        }
    }
}

impl Serialize for FinishReason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// Neutral response returned by every provider adapter (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub id: String,
    pub request_id: String,
    pub provider_id: String,
    pub provider_display_name: String,
    #[serde(default)]
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub tokens_used: u64,
    pub response_time_ms: u64,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: i64,
}
