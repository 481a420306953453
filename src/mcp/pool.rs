//! Lazily-initialized MCP connection pool (spec §4.G). Grounded on the
//! teacher's `ToolRegistry` (`name -> Arc<...>` registry shape,
//! `tokio::sync::Mutex` per cached entry) and `CircuitBreaker`'s
//! single-mutex-guarded-state pattern, generalized to a reader/writer
//! registry lock plus per-connection state machine with a handshake.

use crate::errors::FederationError;
use crate::mcp::model::{ConnectionState, MCPServerConfig, TransportConfig};
use crate::mcp::transport::{HttpTransport, McpTransport, StdioTransport};
use crate::retry::{self, Outcome, RetryConfig};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "helixagent";

fn initialize_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") }
        }
    })
}

fn initialized_notification() -> Value {
    json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })
}

fn build_transport(transport: &TransportConfig) -> Result<Box<dyn McpTransport>, FederationError> {
    match transport {
        TransportConfig::Stdio { command, args, env } => Ok(Box::new(StdioTransport::spawn(command, args, env)?)),
        TransportConfig::Http { url } => Ok(Box::new(HttpTransport::new(url.clone()))),
    }
}

/// `initialize` (id=1) strictly precedes `notifications/initialized`, which
/// strictly precedes any user-level call (spec §5 ordering guarantees).
async fn handshake(transport: &mut dyn McpTransport) -> Result<(), FederationError> {
    transport.send(&initialize_request()).await?;
    let response = transport.receive().await?;
    if !response.is_object() {
        return Err(FederationError::Protocol("initialize response was not a JSON object".into()));
    }
    if let Some(error) = response.get("error") {
        return Err(FederationError::Protocol(format!("initialize returned an error: {error}")));
    }
    transport.send(&initialized_notification()).await?;
    Ok(())
}

/// One registered server's live state. `transport` is only ever touched with
/// the connection's mutex held for the mutation itself, never across an
/// I/O await (spec §4.G concurrency discipline).
pub struct MCPConnection {
    pub config: MCPServerConfig,
    pub state: ConnectionState,
    transport: Option<Box<dyn McpTransport>>,
    pub last_used: Option<Instant>,
    pub last_error: Option<String>,
    pub connected_at: Option<Instant>,
    pub request_count: u64,
}

struct Entry {
    conn: Mutex<MCPConnection>,
    /// Lets a caller that observes `Connecting` wait for the in-flight
    /// attempt without holding `conn`'s lock.
    state_tx: watch::Sender<ConnectionState>,
}

/// Lock-free counters (spec §3 pool metrics).
#[derive(Default)]
pub struct PoolMetrics {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicI64,
    pub failed_connections: AtomicU64,
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    total_latency_us: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolMetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: i64,
    pub failed_connections: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_latency_us: f64,
}

impl PoolMetrics {
    fn record_request(&self, elapsed_us: u64, ok: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(elapsed_us, Ordering::Relaxed);
        if ok {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let avg_latency_us = if total_requests == 0 {
            0.0
        } else {
            self.total_latency_us.load(Ordering::Relaxed) as f64 / total_requests as f64
        };
        PoolMetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_latency_us,
        }
    }
}

/// Registration, lazy connect, handshake, warm-up, health check, and
/// shutdown for every MCP server the agent knows about (spec §4.G).
pub struct McpPool {
    registry: RwLock<HashMap<String, Arc<Entry>>>,
    retry: RetryConfig,
    closed: AtomicBool,
    pub metrics: PoolMetrics,
}

impl McpPool {
    pub fn new(retry: RetryConfig) -> Self {
        Self { registry: RwLock::new(HashMap::new()), retry, closed: AtomicBool::new(false), metrics: PoolMetrics::default() }
    }

    /// Stores the record; never connects (spec §4.G "Registration").
    pub async fn register_server(&self, config: MCPServerConfig) -> Result<(), FederationError> {
        let mut registry = self.registry.write().await;
        if registry.contains_key(&config.name) {
            return Err(FederationError::Configuration(format!("server '{}' is already registered", config.name)));
        }
        let (state_tx, _rx) = watch::channel(ConnectionState::Pending);
        let name = config.name.clone();
        let conn = MCPConnection {
            config,
            state: ConnectionState::Pending,
            transport: None,
            last_used: None,
            last_error: None,
            connected_at: None,
            request_count: 0,
        };
        registry.insert(name, Arc::new(Entry { conn: Mutex::new(conn), state_tx }));
        self.metrics.total_connections.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<Arc<Entry>, FederationError> {
        self.registry.read().await.get(name).cloned().ok_or_else(|| FederationError::Configuration(format!("no MCP server registered as '{name}'")))
    }

    /// Ensures `name` has a live connection, connecting it if needed
    /// (spec §4.G "Lazy acquisition").
    pub async fn ensure_connected(&self, cancel: &CancellationToken, name: &str) -> Result<(), FederationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FederationError::Configuration("pool is closed".into()));
        }
        let entry = self.find(name).await?;
        loop {
            let state = {
                let mut conn = entry.conn.lock().await;
                if conn.state == ConnectionState::Connected {
                    conn.last_used = Some(Instant::now());
                    return Ok(());
                }
                conn.state.clone()
            };
            match state {
                ConnectionState::Connecting => {
                    let mut rx = entry.state_tx.subscribe();
                    tokio::select! {
                        () = cancel.cancelled() => return Err(FederationError::Cancelled),
                        result = rx.changed() => {
                            result.map_err(|_| FederationError::Transport("connection dropped while waiting".into()))?;
                        }
                    }
                }
                ConnectionState::Pending | ConnectionState::Failed(_) | ConnectionState::Closed => {
                    return self.drive_connect(cancel, name, &entry).await;
                }
                ConnectionState::Connected => unreachable!("handled above"),
            }
        }
    }

    async fn drive_connect(&self, cancel: &CancellationToken, name: &str, entry: &Arc<Entry>) -> Result<(), FederationError> {
        {
            let mut conn = entry.conn.lock().await;
            conn.state = ConnectionState::Connecting;
        }
        let _ = entry.state_tx.send(ConnectionState::Connecting);

        let transport_cfg = entry.conn.lock().await.config.transport.clone();

        let result = retry::drive(&self.retry, cancel, |attempt| {
            let transport_cfg = transport_cfg.clone();
            async move {
                match build_transport(&transport_cfg) {
                    Ok(mut transport) => match handshake(transport.as_mut()).await {
                        Ok(()) => Outcome::Done(Ok(transport)),
                        Err(e) => {
                            warn!(name, attempt, error = %e, "MCP handshake failed");
                            let _ = transport.close().await;
                            Outcome::Retry(e)
                        }
                    },
                    Err(e) => Outcome::Retry(e),
                }
            }
        })
        .await;

        match result {
            Ok(transport) => {
                {
                    let mut conn = entry.conn.lock().await;
                    conn.transport = Some(transport);
                    conn.state = ConnectionState::Connected;
                    conn.connected_at = Some(Instant::now());
                    conn.last_used = Some(Instant::now());
                }
                self.metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                let _ = entry.state_tx.send(ConnectionState::Connected);
                info!(name, "MCP server connected");
                Ok(())
            }
            Err(e) => {
                let failed = ConnectionState::Failed(e.to_string());
                {
                    let mut conn = entry.conn.lock().await;
                    conn.state = failed.clone();
                    conn.last_error = Some(e.to_string());
                }
                self.metrics.failed_connections.fetch_add(1, Ordering::Relaxed);
                let _ = entry.state_tx.send(failed);
                Err(e)
            }
        }
    }

    /// Sends one JSON-RPC message and returns its response, connecting
    /// first if necessary. Holds the connection's lock only to take and
    /// replace the transport, never across the I/O itself.
    pub async fn call(&self, cancel: &CancellationToken, name: &str, message: Value) -> Result<Value, FederationError> {
        self.ensure_connected(cancel, name).await?;
        let entry = self.find(name).await?;

        let mut transport = {
            let mut conn = entry.conn.lock().await;
            conn.transport.take().ok_or_else(|| FederationError::Transport(format!("'{name}' has no transport despite being connected")))?
        };

        let started = Instant::now();
        let result = tokio::select! {
            () = cancel.cancelled() => Err(FederationError::Cancelled),
            r = async { transport.send(&message).await?; transport.receive().await } => r,
        };
        let elapsed_us = started.elapsed().as_micros() as u64;

        // A cancellation mid-exchange leaves the wire protocol in an
        // indeterminate state (spec §5: cancellation aborts the in-flight
        // call); close rather than hand the transport back for reuse.
        let cancelled = matches!(result, Err(FederationError::Cancelled));
        if cancelled {
            let _ = transport.close().await;
        }
        {
            let mut conn = entry.conn.lock().await;
            conn.last_used = Some(Instant::now());
            conn.request_count += 1;
            if cancelled {
                conn.state = ConnectionState::Closed;
            } else {
                conn.transport = Some(transport);
            }
        }
        if cancelled {
            let _ = entry.state_tx.send(ConnectionState::Closed);
            self.metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
        }
        self.metrics.record_request(elapsed_us, result.is_ok());
        result
    }

    /// Connects to `names` (or every registered server) concurrently;
    /// never disturbs an already-connected peer (spec §4.G "Warm-up").
    pub async fn warm_up(&self, cancel: &CancellationToken, names: Option<&[String]>) -> Result<(), FederationError> {
        let targets: Vec<String> = match names {
            Some(names) => names.to_vec(),
            None => self.registry.read().await.keys().cloned().collect(),
        };

        let results = futures_util::future::join_all(targets.iter().map(|name| self.ensure_connected(cancel, name))).await;

        let errors: Vec<String> = targets
            .iter()
            .zip(results)
            .filter_map(|(name, result)| result.err().map(|e| format!("{name}: {e}")))
            .collect();

        if errors.is_empty() { Ok(()) } else { Err(FederationError::Transport(format!("warm-up failures: {}", errors.join("; ")))) }
    }

    /// `connected && transport.is_connected()` for every registration;
    /// never sends traffic (spec §4.G "Health check").
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let registry = self.registry.read().await;
        let mut report = HashMap::with_capacity(registry.len());
        for (name, entry) in registry.iter() {
            let conn = entry.conn.lock().await;
            let healthy = conn.state == ConnectionState::Connected && conn.transport.as_ref().is_some_and(|t| t.is_connected());
            report.insert(name.clone(), healthy);
        }
        report
    }

    pub async fn close_connection(&self, name: &str) -> Result<(), FederationError> {
        let entry = self.find(name).await?;
        let mut conn = entry.conn.lock().await;
        if conn.state.is_terminal() {
            return Ok(());
        }
        let was_connected = conn.state == ConnectionState::Connected;
        if let Some(mut transport) = conn.transport.take() {
            transport.close().await?;
        }
        conn.state = ConnectionState::Closed;
        drop(conn);
        let _ = entry.state_tx.send(ConnectionState::Closed);
        if was_connected {
            self.metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Idempotently closes every connection and marks the pool closed;
    /// future registrations/acquisitions fail.
    pub async fn close(&self) -> Result<(), FederationError> {
        self.closed.store(true, Ordering::SeqCst);
        let names: Vec<String> = self.registry.read().await.keys().cloned().collect();
        for name in names {
            self.close_connection(&name).await?;
        }
        Ok(())
    }

    pub async fn list_servers(&self) -> Vec<String> {
        self.registry.read().await.keys().cloned().collect()
    }

    pub async fn server_status(&self, name: &str) -> Result<ConnectionState, FederationError> {
        let entry = self.find(name).await?;
        Ok(entry.conn.lock().await.state.clone())
    }
}

#[cfg(test)]
mod tests;
