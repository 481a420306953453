//! Per-provider credential configuration. Grounded on the teacher's
//! `ProviderConfig`/`redact_debug!` pattern: secrets are held as plain
//! `String`s but never leak through `{:?}`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// TT-muncher that derives a `Debug` impl redacting the named fields.
/// Grounded on the teacher's `config::schema::redact_debug!`.
macro_rules! redact_debug {
    ($ty:ident { $($field:ident),* $(,)? } redact: [$($redacted:ident),* $(,)?]) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut s = f.debug_struct(stringify!($ty));
                $(s.field(stringify!($field), &self.$field);)*
                $(s.field(stringify!($redacted), &"<redacted>");)*
                s.finish()
            }
        }
    };
}

/// Credentials and endpoint overrides for one provider adapter instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

redact_debug!(ProviderConfig { api_base, headers } redact: [api_key]);

impl ProviderConfig {
    pub fn from_env(prefix: &str, env: &HashMap<String, String>) -> Option<Self> {
        let api_key = env.get(&format!("{prefix}_API_KEY"))?.clone();
        let api_base = env.get(&format!("{prefix}_API_BASE")).cloned();
        Some(Self { api_key, api_base, headers: HashMap::new() })
    }
}
