//! The provider capability set (spec §4.D/§6) and confidence scoring.
//! Grounded on `LLMProvider`/`ChatRequest`/`chat_with_retry`: the trait
//! shape and the "retry drives chat" relationship survive, generalized
//! from one hand-rolled backoff loop per trait to [`crate::retry::drive`]
//! shared with [`crate::providers::transport`].

use crate::errors::FederationError;
use crate::model::{LLMRequest, LLMResponse};
use crate::stream::StreamFrame;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a provider supports (spec §3 `ProviderCapabilities`).
#[derive(Debug, Clone, Default)]
pub struct ProviderCapabilities {
    pub model_ids: Vec<String>,
    pub feature_tags: Vec<String>,
    pub streaming: bool,
    pub function_calling: bool,
    pub vision: bool,
    pub tools: bool,
    pub reasoning: bool,
    pub code: bool,
    pub max_tokens: u32,
    pub max_input: u32,
    pub max_output: u32,
    pub max_concurrent: u32,
    pub metadata: HashMap<String, Value>,
}

/// A lazy, finite, single-consumer, cancellable sequence of response frames
/// for one streaming completion (spec §4.D).
pub struct LLMResponseStream {
    pub rx: mpsc::Receiver<StreamFrame>,
}

impl LLMResponseStream {
    pub async fn next(&mut self) -> Option<StreamFrame> {
        self.rx.recv().await
    }
}

/// The operations every adapter implements (spec §6 adapter table).
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, req: LLMRequest, cancel: CancellationToken) -> Result<LLMResponse, FederationError>;

    async fn complete_stream(
        &self,
        req: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponseStream, FederationError>;

    async fn health_check(&self) -> Result<(), FederationError>;

    fn capabilities(&self) -> ProviderCapabilities;

    fn validate_config(&self, config: &HashMap<String, String>) -> (bool, Vec<String>);

    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn set_model(&mut self, model: String);
}

/// Starts at 0.85 (spec §4.D confidence-scoring table). Clamped to `[0, 1]`.
pub fn score_confidence(content: &str, finish_reason_raw: &str) -> f32 {
    let mut score: f32 = 0.85;

    let clean_stop = matches!(
        finish_reason_raw,
        "stop" | "end_turn" | "COMPLETE" | "eos_token" | "succeeded"
    );
    let truncated = matches!(finish_reason_raw, "length" | "MAX_TOKENS");
    let unsafe_or_error = matches!(finish_reason_raw, "content_filter" | "ERROR" | "failed");

    if clean_stop {
        score += 0.10;
    }
    if truncated {
        score -= 0.10;
    }
    if unsafe_or_error {
        score -= 0.30;
    }
    if content.chars().count() > 100 {
        score += 0.03;
    }

    score.clamp(0.0, 1.0)
}

/// A non-positive requested max-output-tokens falls back to the provider's
/// own default (spec §4.D).
pub fn resolve_max_tokens(requested: Option<i64>, provider_default: i64) -> i64 {
    match requested {
        Some(n) if n > 0 => n,
        _ => provider_default,
    }
}

#[cfg(test)]
mod tests;
