//! Hand-rolled JSON-RPC transports for the MCP pool (spec §4.F). No
//! precedent in the teacher for this exact shape — `rmcp`'s `ServiceExt`
//! abstraction doesn't expose the per-connection handshake hooks the pool's
//! state machine needs, so this is written in the teacher's manner
//! (`tracing` at the same call sites, `tokio::process::Command` piped
//! stdio, `Arc`-shared state) without depending on `rmcp`. The stdio
//! child-spawn reuses `crate::utils::subprocess::scrubbed_command`'s
//! environment-scrubbing so MCP servers never inherit the parent's full
//! environment by accident.

use crate::errors::FederationError;
use crate::utils::subprocess::scrubbed_command;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;

/// One JSON-RPC request/response channel to an MCP server. Implementors
/// must not block while holding any lock the pool itself relies on (spec
/// §4.G lock discipline).
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&mut self, message: &Value) -> Result<(), FederationError>;
    async fn receive(&mut self) -> Result<Value, FederationError>;
    async fn close(&mut self) -> Result<(), FederationError>;
    fn is_connected(&self) -> bool;
}

/// Line-delimited JSON-RPC over a child process's stdin/stdout.
pub struct StdioTransport {
    child: Child,
    stdin: tokio::process::ChildStdin,
    stdout: BufReader<tokio::process::ChildStdout>,
    connected: AtomicBool,
}

impl StdioTransport {
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self, FederationError> {
        let mut cmd = scrubbed_command(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| FederationError::Transport(format!("failed to spawn MCP server: {e}")))?;
        let stdin = child.stdin.take().ok_or_else(|| FederationError::Transport("child has no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| FederationError::Transport("child has no stdout".into()))?;

        Ok(Self { child, stdin, stdout: BufReader::new(stdout), connected: AtomicBool::new(true) })
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&mut self, message: &Value) -> Result<(), FederationError> {
        let mut line = serde_json::to_string(message).map_err(|e| FederationError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await.map_err(|e| FederationError::Transport(e.to_string()))?;
        self.stdin.flush().await.map_err(|e| FederationError::Transport(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Value, FederationError> {
        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).await.map_err(|e| FederationError::Transport(e.to_string()))?;
        if n == 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(FederationError::Transport("MCP server closed stdout".into()));
        }
        serde_json::from_str(line.trim()).map_err(|e| FederationError::Protocol(format!("malformed JSON-RPC message: {e}")))
    }

    async fn close(&mut self) -> Result<(), FederationError> {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.child.start_kill();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// JSON-RPC over HTTP POST: one request per `send`, the response body is
/// the next `receive` (no independent push channel).
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    pending: Option<Value>,
    connected: bool,
}

impl HttpTransport {
    pub fn new(url: String) -> Self {
        Self { client: crate::providers::provider_http_client(), url, pending: None, connected: true }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&mut self, message: &Value) -> Result<(), FederationError> {
        let resp = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| FederationError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            self.connected = false;
            return Err(FederationError::Upstream { status: resp.status().as_u16(), body: resp.text().await.unwrap_or_default() });
        }

        let body: Value = resp.json().await.map_err(|e| FederationError::Protocol(e.to_string()))?;
        self.pending = Some(body);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Value, FederationError> {
        self.pending.take().ok_or_else(|| FederationError::Protocol("receive() called without a pending response".into()))
    }

    async fn close(&mut self) -> Result<(), FederationError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests;
