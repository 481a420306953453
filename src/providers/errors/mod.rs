//! Error-body parsing shared by every adapter. Grounded on the teacher's
//! `ProviderErrorHandler`, adapted to build a [`FederationError`] instead of
//! an ad hoc `anyhow::Error` so `is_retryable()` drives the retry engine
//! directly.

use crate::errors::FederationError;
use serde_json::Value;
use tracing::error;

pub struct ProviderErrorHandler;

impl ProviderErrorHandler {
    /// Turn a non-2xx response into a [`FederationError::Upstream`], pulling
    /// a human-readable message out of the body's `error.type`/`error.message`
    /// fields when the upstream follows that convention.
    pub fn parse_api_error(status: u16, error_text: &str) -> FederationError {
        if let Ok(error_json) = serde_json::from_str::<Value>(error_text)
            && let Some(error) = error_json.get("error")
        {
            let error_type = error.get("type").and_then(Value::as_str).unwrap_or("unknown");
            let error_msg = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return FederationError::Upstream {
                status,
                body: format!("{error_type}: {error_msg}"),
            };
        }

        FederationError::Upstream {
            status,
            body: error_text.to_string(),
        }
    }

    /// Logs a non-2xx response at the one call site that produces them
    /// (`transport::send_json`/`send_stream`), so every adapter gets
    /// consistent error visibility without logging at each adapter site.
    pub fn log_and_handle_error(e: &FederationError, provider_name: &str, operation: &str) {
        error!(provider = provider_name, operation, error = %e, "provider error");
    }
}

#[cfg(test)]
mod tests;
