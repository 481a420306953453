//! MCP server configuration and per-connection state machine (spec §4.F/§4.G).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to reach one MCP server. Grounded on `McpManager::connect_server`'s
/// stdio subprocess path, generalized with an HTTP variant (spec §4.F:
/// "two transports").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// A connection's lifecycle (spec §4.G): `pending` before any attempt is
/// made, `connecting` during the handshake, then either `connected` or
/// `failed`, and `closed` once shut down. No transition skips a state;
/// `closed` is not a dead end, though — a later acquisition still drives
/// `pending`, `failed`, or `closed` back to `connecting` (spec §3: "GetConnection
/// drives pending|failed|closed -> connecting").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Connecting,
    Connected,
    Failed(String),
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether `next` is a legal transition from `self` (spec §3/§4.G state
    /// machine: pending|failed|closed -> connecting -> {connected, failed};
    /// any non-closed state may transition to closed).
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Pending, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting, Failed(_)) => true,
            (Failed(_), Connecting) => true,
            (Closed, Connecting) => true,
            (_, Closed) if !self.is_terminal() => true,
            _ => false,
        }
    }
}
