//! SSE / line-framed stream decoder (spec §4.C). Grounded on
//! `providers::sse::parse_sse_chunk`'s line-splitting and `[DONE]`/JSON
//! handling, generalized from "parse one buffered chunk" to "decode an
//! async byte stream incrementally, one frame at a time, respecting
//! consumer backpressure."

use crate::model::FinishReason;
use serde_json::Value;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One decoded frame pushed to the stream consumer.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    /// This frame's content. For non-final frames this is the incremental
    /// delta; for the final frame this is the full accumulated content
    /// (spec §4.C: "synthesized final frame carrying the accumulated
    /// content").
    pub content: String,
    pub is_final: bool,
    pub finish_reason: Option<FinishReason>,
    pub elapsed_ms: Option<u64>,
}

impl StreamFrame {
    fn delta(content: String) -> Self {
        Self { content, is_final: false, finish_reason: None, elapsed_ms: None }
    }

    fn final_frame(content: String, finish_reason: FinishReason, elapsed_ms: u64) -> Self {
        Self { content, is_final: true, finish_reason: Some(finish_reason), elapsed_ms: Some(elapsed_ms) }
    }
}

/// Extracts a content delta from one decoded `data:` JSON payload, or
/// `None` if the event carries no content (e.g. a `message_start` event).
/// Provider-specific: each adapter supplies its own wire shape.
pub trait DeltaExtractor: Send {
    fn extract(&mut self, payload: &Value) -> Option<String>;
}

impl<F> DeltaExtractor for F
where
    F: FnMut(&Value) -> Option<String> + Send,
{
    fn extract(&mut self, payload: &Value) -> Option<String> {
        self(payload)
    }
}

/// Decode an SSE-framed async byte stream, pushing frames to `tx` (capacity
/// 1, enforcing the "never more than one pending frame" invariant).
///
/// - Blank lines and lines not starting with `data:` are skipped.
/// - A literal `[DONE]` payload terminates the stream with a synthesized
///   final frame.
/// - Malformed JSON payloads are silently skipped (do not terminate).
/// - EOF without `[DONE]` terminates cleanly with a final `stop` frame.
/// - An unexpected read error emits one error frame, then terminates.
/// - Cancellation closes the channel after at most one in-flight frame.
pub async fn decode_sse_stream<R, E>(
    reader: R,
    mut extract: E,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamFrame>,
) where
    R: AsyncBufRead + Unpin,
    E: DeltaExtractor,
{
    let start = Instant::now();
    let mut accumulated = String::new();
    let mut lines = reader.lines();

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match next {
            Ok(Some(line)) => {
                let Some(payload) = line.strip_prefix("data:") else { continue };
                let payload = payload.trim();
                if payload.is_empty() {
                    continue;
                }
                if payload == "[DONE]" {
                    let frame = StreamFrame::final_frame(
                        accumulated.clone(),
                        FinishReason::Stop,
                        start.elapsed().as_millis() as u64,
                    );
                    let _ = tx.send(frame).await;
                    return;
                }
                let Ok(value) = serde_json::from_str::<Value>(payload) else { continue };
                if let Some(delta) = extract.extract(&value) {
                    accumulated.push_str(&delta);
                    if tx.send(StreamFrame::delta(delta)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                let frame = StreamFrame::final_frame(
                    accumulated.clone(),
                    FinishReason::Stop,
                    start.elapsed().as_millis() as u64,
                );
                let _ = tx.send(frame).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "stream read error; emitting terminal error frame");
                let frame = StreamFrame::final_frame(
                    accumulated.clone(),
                    FinishReason::Error,
                    start.elapsed().as_millis() as u64,
                );
                let _ = tx.send(frame).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests;
