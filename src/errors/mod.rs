use thiserror::Error;

/// Typed error hierarchy for the federation layer and MCP pool.
///
/// Use at module boundaries (provider calls, transport I/O, handshake,
/// config validation). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion
/// via the `?` operator.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Missing/invalid credentials or URL. Returned from `validate_config`
    /// and from the first `complete`/`register_server` attempt.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, TLS failure, process spawn failure. Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP non-2xx. Retryable iff status is 429 or >= 500.
    #[error("upstream error: status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Malformed response body, missing required fields, unexpected `error`
    /// field in the MCP handshake. Not retried.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Propagated unchanged; the caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Carries the last underlying error as cause.
    #[error("max retries exceeded: {source}")]
    ExhaustedRetries {
        #[source]
        source: Box<FederationError>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FederationError {
    /// Whether this error is transient and the operation should be retried.
    ///
    /// Mirrors spec §4.B/§7: network/transport errors, HTTP 429, and HTTP
    /// >= 500 are retryable. All other kinds are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Configuration(_)
            | Self::Protocol(_)
            | Self::Cancelled
            | Self::ExhaustedRetries { .. } => false,
            Self::Internal(_) => true,
        }
    }

    /// Wrap this error with a provider name, as the transport layer does
    /// before re-raising transport/upstream errors (spec §7 propagation
    /// policy).
    pub fn with_provider(self, provider: &str) -> Self {
        match self {
            Self::Transport(msg) => Self::Transport(format!("{provider}: {msg}")),
            Self::Upstream { status, body } => Self::Upstream {
                status,
                body: format!("{provider}: {body}"),
            },
            other => other,
        }
    }

    pub fn exhausted(last: FederationError) -> Self {
        Self::ExhaustedRetries {
            source: Box::new(last),
        }
    }
}
