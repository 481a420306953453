//! Shared HTTP invocation for every adapter variant (spec §4.E). Grounded on
//! the request-building and `check_response`-via-`ProviderErrorHandler` shape
//! that both `AnthropicProvider::chat` and `OpenAIProvider::chat` repeated
//! independently; folded into one driver so each adapter supplies only its
//! URL, headers, and payload.

use crate::errors::FederationError;
use crate::providers::errors::ProviderErrorHandler;
use crate::retry::{drive, Outcome, RetryConfig};
use futures_util::StreamExt;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// How the adapter's API key is attached to the request.
#[derive(Debug, Clone, Copy)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (OpenAI-compatible, legacy, async-job).
    Bearer,
    /// A vendor-specific header, e.g. Anthropic's `x-api-key`.
    Header(&'static str),
}

/// Per-call deadline. Low-latency calls (health checks, warm-up) get the
/// tighter bound; ordinary completions get the general one (spec §4.E).
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    LowLatency,
    General,
}

impl Deadline {
    fn as_duration(self) -> Duration {
        match self {
            Self::LowLatency => Duration::from_secs(60),
            Self::General => Duration::from_secs(120),
        }
    }
}

/// One HTTP call an adapter wants the shared transport to make.
pub struct RequestSpec<'a> {
    pub method: Method,
    pub url: String,
    pub auth: AuthScheme,
    pub api_key: &'a str,
    pub extra_headers: Vec<(&'static str, String)>,
    pub body: Value,
    pub deadline: Deadline,
}

impl<'a> RequestSpec<'a> {
    fn build(&self, client: &Client, accept_event_stream: bool) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .timeout(self.deadline.as_duration())
            .json(&self.body);

        builder = match self.auth {
            AuthScheme::Bearer => builder.header("Authorization", format!("Bearer {}", self.api_key)),
            AuthScheme::Header(name) => builder.header(name, self.api_key),
        };

        builder = builder.header(
            "Accept",
            if accept_event_stream { "text/event-stream" } else { "application/json" },
        );

        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value);
        }

        builder
    }
}

/// Send a non-streaming request, retrying transient failures through the
/// shared backoff driver, and return the decoded JSON body.
pub async fn send_json(
    client: &Client,
    spec: &RequestSpec<'_>,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    provider_name: &str,
) -> Result<Value, FederationError> {
    drive(retry, cancel, |_attempt| async {
        let result = spec.build(client, false).send().await;
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return Outcome::Retry(FederationError::Transport(e.to_string()).with_provider(provider_name)),
        };

        let status = resp.status();
        if status.is_success() {
            return match resp.json::<Value>().await {
                Ok(body) => Outcome::Done(Ok(body)),
                Err(e) => Outcome::Done(Err(FederationError::Protocol(e.to_string()).with_provider(provider_name))),
            };
        }

        let body = resp.text().await.unwrap_or_default();
        let err = ProviderErrorHandler::parse_api_error(status.as_u16(), &body).with_provider(provider_name);
        ProviderErrorHandler::log_and_handle_error(&err, provider_name, "send_json");
        if err.is_retryable() {
            Outcome::Retry(err)
        } else {
            Outcome::Done(Err(err))
        }
    })
    .await
}

/// Send a streaming request and hand back the raw body as an
/// [`AsyncBufRead`] for [`crate::stream::decode_sse_stream`]. Non-2xx
/// responses still go through the retry engine once (no point streaming a
/// response that never started); a successfully-opened stream is not itself
/// retried — partial delivery failures are the stream decoder's problem.
pub async fn send_stream(
    client: &Client,
    spec: &RequestSpec<'_>,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    provider_name: &str,
) -> Result<impl AsyncBufRead + Unpin, FederationError> {
    let resp = drive(retry, cancel, |_attempt| async {
        let result = spec.build(client, true).send().await;
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return Outcome::Retry(FederationError::Transport(e.to_string()).with_provider(provider_name)),
        };

        let status = resp.status();
        if status.is_success() {
            return Outcome::Done(Ok(resp));
        }

        let body = resp.text().await.unwrap_or_default();
        let err = ProviderErrorHandler::parse_api_error(status.as_u16(), &body).with_provider(provider_name);
        ProviderErrorHandler::log_and_handle_error(&err, provider_name, "send_stream");
        if err.is_retryable() {
            Outcome::Retry(err)
        } else {
            Outcome::Done(Err(err))
        }
    })
    .await?;

    let byte_stream = resp
        .bytes_stream()
        .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
    Ok(BufReader::new(StreamReader::new(byte_stream)))
}
