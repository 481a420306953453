use super::*;
use std::io::Write;

#[test]
fn parse_skips_blank_lines_and_comments() {
    let vars = parse("# comment\n\nKEY=value\n");
    assert_eq!(vars.get("KEY"), Some(&"value".to_string()));
    assert_eq!(vars.len(), 1);
}

#[test]
fn parse_strips_matching_quotes() {
    let vars = parse("A=\"quoted value\"\nB='single'\nC=bare\n");
    assert_eq!(vars.get("A"), Some(&"quoted value".to_string()));
    assert_eq!(vars.get("B"), Some(&"single".to_string()));
    assert_eq!(vars.get("C"), Some(&"bare".to_string()));
}

#[test]
fn parse_ignores_malformed_lines() {
    let vars = parse("no_equals_sign\n=no_key\nKEY=value");
    assert_eq!(vars.len(), 1);
    assert_eq!(vars.get("KEY"), Some(&"value".to_string()));
}

#[test]
fn load_file_returns_empty_map_for_missing_file() {
    let vars = load_file("/nonexistent/path/does-not-exist.env");
    assert!(vars.is_empty());
}

#[test]
fn layered_load_later_files_override_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".env");
    let local = dir.path().join(".env.local");
    std::fs::File::create(&base).unwrap().write_all(b"KEY=base\nOTHER=base_only").unwrap();
    std::fs::File::create(&local).unwrap().write_all(b"KEY=local").unwrap();

    let merged = layered_load(&[&base, &local], std::iter::empty());
    assert_eq!(merged.get("KEY"), Some(&"local".to_string()));
    assert_eq!(merged.get("OTHER"), Some(&"base_only".to_string()));
}

#[test]
fn layered_load_process_env_overrides_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".env");
    std::fs::File::create(&base).unwrap().write_all(b"KEY=from_file").unwrap();

    let process_env = vec![("KEY".to_string(), "from_process".to_string())];
    let merged = layered_load(&[&base], process_env.into_iter());
    assert_eq!(merged.get("KEY"), Some(&"from_process".to_string()));
}
