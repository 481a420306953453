use super::*;

#[test]
fn confidence_starts_at_baseline_for_neutral_finish() {
    let score = score_confidence("short", "unknown_reason");
    assert!((score - 0.85).abs() < 1e-6);
}

#[test]
fn confidence_rewards_clean_stop_and_long_content() {
    let long = "x".repeat(101);
    let score = score_confidence(&long, "stop");
    assert!((score - 0.98).abs() < 1e-6);
}

#[test]
fn confidence_penalizes_truncation() {
    let score = score_confidence("short", "length");
    assert!((score - 0.75).abs() < 1e-6);
}

#[test]
fn confidence_penalizes_safety_termination_harder_than_truncation() {
    let truncated = score_confidence("short", "length");
    let unsafe_term = score_confidence("short", "content_filter");
    assert!(unsafe_term < truncated);
    assert!((unsafe_term - 0.55).abs() < 1e-6);
}

#[test]
fn confidence_clamps_to_unit_interval() {
    let long = "x".repeat(200);
    let capped = score_confidence(&long, "succeeded");
    assert!(capped <= 1.0);
    let floored = score_confidence("short", "content_filter");
    assert!(floored >= 0.0);
}

#[test]
fn resolve_max_tokens_falls_back_on_non_positive_request() {
    assert_eq!(resolve_max_tokens(Some(0), 4096), 4096);
    assert_eq!(resolve_max_tokens(Some(-1), 4096), 4096);
    assert_eq!(resolve_max_tokens(None, 4096), 4096);
    assert_eq!(resolve_max_tokens(Some(512), 4096), 512);
}

struct NoopProvider {
    model: String,
}

#[async_trait]
impl Provider for NoopProvider {
    async fn complete(
        &self,
        req: LLMRequest,
        _cancel: CancellationToken,
    ) -> Result<LLMResponse, FederationError> {
        Ok(LLMResponse {
            id: "resp-1".into(),
            request_id: req.request_id,
            provider_id: "noop".into(),
            provider_display_name: "Noop".into(),
            content: "ok".into(),
            confidence: 0.95,
            tokens_used: 1,
            response_time_ms: 0,
            finish_reason: crate::model::FinishReason::Stop,
            tool_calls: Vec::new(),
            metadata: Default::default(),
            created_at: 0,
        })
    }

    async fn complete_stream(
        &self,
        _req: LLMRequest,
        _cancel: CancellationToken,
    ) -> Result<LLMResponseStream, FederationError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(LLMResponseStream { rx })
    }

    async fn health_check(&self) -> Result<(), FederationError> {
        Ok(())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    fn validate_config(&self, _config: &HashMap<String, String>) -> (bool, Vec<String>) {
        (true, Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }
}

#[tokio::test]
async fn noop_provider_round_trips_request_id() {
    let provider = NoopProvider { model: "noop-1".into() };
    let req = LLMRequest {
        request_id: "req-42".into(),
        system_prompt: None,
        messages: Vec::new(),
        params: Default::default(),
        tools: None,
        tool_choice: Default::default(),
    };
    let resp = provider.complete(req, CancellationToken::new()).await.unwrap();
    assert_eq!(resp.request_id, "req-42");
}

#[test]
fn set_model_changes_name() {
    let mut provider = NoopProvider { model: "a".into() };
    provider.set_model("b".into());
    assert_eq!(provider.model(), "b");
}
