//! MCP environment discovery and credential-gated server resolution
//! (spec §4.H). Layers `.env*` files via `crate::config::env_file`, checks
//! each tool server's credential requirement against the merged
//! environment, and assigns it a port/category/URL from the compile-time
//! table in `crate::mcp::ports`.

use crate::config::env_file;
use crate::errors::FederationError;
use crate::mcp::ports;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A server's credential eligibility rule (spec §6 credential table).
#[derive(Debug, Clone, Copy)]
enum Requirement {
    /// Declared unconditionally — always enabled (core servers, and the
    /// first-party `helixagent` band).
    Unconditional,
    /// Every listed variable must be present.
    AllOf(&'static [&'static str]),
    /// At least one listed variable must be present.
    AnyOf(&'static [&'static str]),
}

impl Requirement {
    fn check(&self, env: &HashMap<String, String>) -> (bool, Vec<&'static str>) {
        let present = |key: &str| env.get(key).is_some_and(|v| !v.is_empty());
        match self {
            Self::Unconditional => (true, Vec::new()),
            Self::AllOf(keys) => {
                let missing: Vec<&'static str> = keys.iter().copied().filter(|k| !present(k)).collect();
                let ok = missing.is_empty();
                (ok, missing)
            }
            Self::AnyOf(keys) => {
                if keys.iter().any(|k| present(k)) { (true, Vec::new()) } else { (false, keys.to_vec()) }
            }
        }
    }
}

/// Authoritative subset from spec §6, extended with the rest of the port
/// table's entries (core servers unconditional; the few categories with no
/// named credential in the spec — browser/finance/design/helixagent — are
/// unconditional placeholders, noted in DESIGN.md).
const REQUIREMENTS: &[(&str, Requirement)] = &[
    ("fetch", Requirement::Unconditional),
    ("git", Requirement::Unconditional),
    ("time", Requirement::Unconditional),
    ("filesystem", Requirement::Unconditional),
    ("memory", Requirement::Unconditional),
    ("everything", Requirement::Unconditional),
    ("sequential-thinking", Requirement::Unconditional),
    ("sqlite", Requirement::Unconditional),
    ("puppeteer", Requirement::Unconditional),
    ("playwright", Requirement::Unconditional),
    ("postgres", Requirement::AnyOf(&["POSTGRES_URL", "POSTGRES_HOST"])),
    ("redis", Requirement::AnyOf(&["REDIS_URL", "REDIS_HOST"])),
    ("mongodb", Requirement::AnyOf(&["MONGODB_URL", "MONGODB_HOST"])),
    ("pinecone", Requirement::AllOf(&["PINECONE_API_KEY"])),
    ("github", Requirement::AllOf(&["GITHUB_TOKEN"])),
    ("gitlab", Requirement::AllOf(&["GITLAB_TOKEN"])),
    ("kubernetes", Requirement::AllOf(&["KUBECONFIG"])),
    ("aws", Requirement::AllOf(&["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"])),
    ("slack", Requirement::AllOf(&["SLACK_BOT_TOKEN", "SLACK_TEAM_ID"])),
    ("notion", Requirement::AllOf(&["NOTION_API_KEY"])),
    ("jira", Requirement::AllOf(&["JIRA_URL", "JIRA_EMAIL", "JIRA_API_TOKEN"])),
    ("brave-search", Requirement::AllOf(&["BRAVE_API_KEY"])),
    ("google-drive", Requirement::AllOf(&["GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"])),
    ("google-calendar", Requirement::AllOf(&["GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"])),
    ("gmail", Requirement::AllOf(&["GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"])),
    ("sentry", Requirement::AllOf(&["SENTRY_AUTH_TOKEN", "SENTRY_ORG"])),
    ("stripe", Requirement::AllOf(&["STRIPE_API_KEY"])),
    ("figma", Requirement::AllOf(&["FIGMA_API_TOKEN"])),
    ("helixagent-memory", Requirement::Unconditional),
];

fn requirement_for(name: &str) -> Option<&'static Requirement> {
    REQUIREMENTS.iter().find(|(n, _)| *n == name).map(|(_, r)| r)
}

/// One server's resolved eligibility, port, and URL (spec §4.H "Outputs").
/// This layer targets container-hosted tool servers exclusively: every
/// entry is `remote` HTTP, never a subprocess command.
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub port: u16,
    pub category: &'static str,
    /// `Some("Missing: X, Y")` when `enabled` is false.
    pub reason: Option<String>,
}

/// The environment snapshot is taken once at construction and treated as
/// immutable thereafter (spec §5 "No global mutable state"); rebuild the
/// resolver to observe env changes.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: HashMap<String, String>,
}

/// `.env` layering order: later files win (spec §4.H).
pub const ENV_FILE_STACK: &[&str] = &[".env", ".env.local", ".env.mcp", ".env.mcp.generated"];

impl ConfigResolver {
    pub fn new(env: HashMap<String, String>) -> Self {
        Self { env }
    }

    /// Loads `ENV_FILE_STACK` relative to `base_dir`, then overlays the
    /// live process environment (which always wins).
    pub fn from_base_dir(base_dir: &Path) -> Self {
        let paths: Vec<PathBuf> = ENV_FILE_STACK.iter().map(|f| base_dir.join(f)).collect();
        let refs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
        Self::new(env_file::layered_load(&refs, std::env::vars()))
    }

    /// `MCP_CONTAINER_HOST`, defaulting to `localhost` (spec §4.H, §6).
    pub fn host(&self) -> String {
        self.env.get("MCP_CONTAINER_HOST").filter(|v| !v.is_empty()).cloned().unwrap_or_else(|| "localhost".to_string())
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedServer, FederationError> {
        let (port, category) =
            ports::lookup(name).ok_or_else(|| FederationError::Configuration(format!("'{name}' has no port-table entry")))?;
        let requirement = requirement_for(name)
            .ok_or_else(|| FederationError::Configuration(format!("'{name}' has no credential requirement entry")))?;
        let (enabled, missing) = requirement.check(&self.env);
        let reason = if enabled { None } else { Some(format!("Missing: {}", missing.join(", "))) };
        Ok(ResolvedServer { name: name.to_string(), url: format!("http://{}:{}/sse", self.host(), port), enabled, port, category, reason })
    }

    /// Resolves every server in the port table, failing fast on a
    /// port-conflict before resolving any individual entry (spec §4.H
    /// "Port assignment").
    pub fn resolve_all(&self) -> Result<Vec<ResolvedServer>, FederationError> {
        ports::validate().map_err(FederationError::Configuration)?;
        ports::TABLE.iter().map(|(name, _, _)| self.resolve(name)).collect()
    }
}
