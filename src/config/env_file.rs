//! Minimal `.env` file parser shared by provider credential loading and the
//! MCP config resolver's layered env-file stack (spec §4.H).

use std::collections::HashMap;
use std::path::Path;

/// Parse `KEY=VALUE` lines, skipping blank lines and `#` comments. Values
/// may be wrapped in single or double quotes, which are stripped. Later
/// keys in the same file overwrite earlier ones.
pub fn parse(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()));
    }
    vars
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Read and parse a `.env`-style file. Returns an empty map if the file
/// doesn't exist — layered loading treats a missing file as "contributes
/// nothing", not an error.
pub fn load_file(path: impl AsRef<Path>) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents),
        Err(_) => HashMap::new(),
    }
}

/// Layer a sequence of `.env` files in order (later files override earlier
/// ones), then overlay the process environment on top (spec §4.H: process
/// env always wins over file-provided values).
pub fn layered_load(paths: &[&Path], process_env: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    for path in paths {
        merged.extend(load_file(path));
    }
    merged.extend(process_env);
    merged
}

#[cfg(test)]
mod tests;
