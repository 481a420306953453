use super::*;

#[test]
fn table_validates_cleanly() {
    validate().unwrap();
}

#[test]
fn all_ports_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for (_, port, _) in TABLE {
        assert!(seen.insert(*port), "duplicate port {port}");
    }
}

#[test]
fn every_entry_falls_within_its_band() {
    for (name, port, category) in TABLE {
        let band = BANDS.iter().find(|b| b.category == *category).unwrap_or_else(|| panic!("no band for {category}"));
        assert!(*port >= band.start && *port <= band.end, "{name}'s port {port} outside {category} band");
    }
}

#[test]
fn core_servers_are_all_present() {
    for name in ["fetch", "git", "time", "filesystem", "memory", "everything", "sequential-thinking", "sqlite", "puppeteer"] {
        assert!(lookup(name).is_some(), "missing core server {name}");
    }
}

#[test]
fn lookup_returns_port_and_category() {
    assert_eq!(lookup("github"), Some((9401, "devops")));
}

#[test]
fn lookup_unknown_name_is_none() {
    assert_eq!(lookup("does-not-exist"), None);
}

#[test]
fn helixagent_category_is_represented() {
    assert_eq!(lookup("helixagent-memory"), Some((10301, "helixagent")));
}
