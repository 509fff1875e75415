//! Content-ID resolution: rewrite `cid:` references to local paths.
//!
//! Runs after binary materialization, because the replacement paths
//! depend on that message's collision resolution. References whose
//! content-id has no mapping are left exactly as found.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static CID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"cid:([^\s)"'<>]+)"#).unwrap());

/// Replace every `cid:<id>` reference present in `mapping` with its
/// local relative path. Unmapped references are returned unchanged.
pub fn resolve_cids(markdown: &str, mapping: &HashMap<String, String>) -> String {
    if mapping.is_empty() {
        return markdown.to_string();
    }

    CID_RE
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            match mapping.get(&caps[1]) {
                Some(path) => path.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Content-ids referenced from the text, in order of first appearance.
pub fn referenced_cids(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in CID_RE.captures_iter(text) {
        let id = caps[1].to_string();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
