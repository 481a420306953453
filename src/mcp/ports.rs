//! Compile-time port allocation table (spec §3/§4.H/§6). Every known tool
//! server gets exactly one port, grouped into contiguous 100-wide bands per
//! category. The `google`, `helixagent` and a couple of low-signal
//! categories (`finance`, `design`, `browser`) have no credential table
//! entry in §6, so their single member below is a reasonable placeholder
//! occupant of the band rather than something pulled from the spec text —
//! noted in DESIGN.md.

/// One category's contiguous port range, start inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBand {
    pub category: &'static str,
    pub start: u16,
    pub end: u16,
}

pub const BANDS: &[PortBand] = &[
    PortBand { category: "core", start: 9101, end: 9199 },
    PortBand { category: "database", start: 9201, end: 9299 },
    PortBand { category: "vector", start: 9301, end: 9399 },
    PortBand { category: "devops", start: 9401, end: 9499 },
    PortBand { category: "browser", start: 9501, end: 9599 },
    PortBand { category: "communication", start: 9601, end: 9699 },
    PortBand { category: "productivity", start: 9701, end: 9799 },
    PortBand { category: "search", start: 9801, end: 9899 },
    PortBand { category: "google", start: 9901, end: 9999 },
    PortBand { category: "monitoring", start: 10001, end: 10099 },
    PortBand { category: "finance", start: 10101, end: 10199 },
    PortBand { category: "design", start: 10201, end: 10299 },
    PortBand { category: "helixagent", start: 10301, end: 10399 },
];

/// `(name, port, category)`. Ports are assigned in ascending order within
/// each band starting at its `start`; nothing here depends on that order
/// beyond uniqueness.
pub const TABLE: &[(&str, u16, &str)] = &[
    ("fetch", 9101, "core"),
    ("git", 9102, "core"),
    ("time", 9103, "core"),
    ("filesystem", 9104, "core"),
    ("memory", 9105, "core"),
    ("everything", 9106, "core"),
    ("sequential-thinking", 9107, "core"),
    ("sqlite", 9108, "core"),
    ("puppeteer", 9109, "core"),
    ("postgres", 9201, "database"),
    ("redis", 9202, "database"),
    ("mongodb", 9203, "database"),
    ("pinecone", 9301, "vector"),
    ("github", 9401, "devops"),
    ("gitlab", 9402, "devops"),
    ("kubernetes", 9403, "devops"),
    ("aws", 9404, "devops"),
    ("playwright", 9501, "browser"),
    ("slack", 9601, "communication"),
    ("notion", 9701, "productivity"),
    ("jira", 9702, "productivity"),
    ("brave-search", 9801, "search"),
    ("google-drive", 9901, "google"),
    ("google-calendar", 9902, "google"),
    ("gmail", 9903, "google"),
    ("sentry", 10001, "monitoring"),
    ("stripe", 10101, "finance"),
    ("figma", 10201, "design"),
    ("helixagent-memory", 10301, "helixagent"),
];

/// Looks up a server's assigned port and category by name.
pub fn lookup(name: &str) -> Option<(u16, &'static str)> {
    TABLE.iter().find(|(n, _, _)| *n == name).map(|(_, port, category)| (*port, *category))
}

/// Validates the table's invariants: every port unique, and every port
/// within its declared category's band (spec §3 port-allocation invariant).
pub fn validate() -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for (name, port, category) in TABLE {
        if !seen.insert(*port) {
            return Err(format!("duplicate port {port} (entry {name})"));
        }
        let band = BANDS.iter().find(|b| b.category == *category).ok_or_else(|| format!("unknown category {category} for {name}"))?;
        if *port < band.start || *port > band.end {
            return Err(format!("{name}'s port {port} falls outside the {category} band [{}, {}]", band.start, band.end));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
