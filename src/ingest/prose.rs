// src/ingest/prose.rs
//! Best-effort recovery of records from a numbered prose listing such as
//!
//! ```text
//! 1. **Headline** [1] — Publication: one-sentence summary.
//! ```
//!
//! paired with a list of reference URLs where `[k]` points at `urls[k - 1]`.
//! Lines that don't fit are skipped, never reported as errors.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::SourceRecord;

static RE_ENUMERATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]").unwrap());
static RE_ENUMERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());
static RE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").unwrap());
// A hyphen only separates when it stands apart from words ("Post-fire" stays whole).
static RE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*(?:[\x{2014}\x{2013}]|\s-{1,2}\s)\s*(.+)$").unwrap());

/// Hostname with a leading `www.` removed, or `fallback` when the URL doesn't parse.
pub fn source_label(link: &str, fallback: &str) -> String {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h).to_string()))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn resolve_link<'a>(line: &str, urls: &'a [String]) -> Option<&'a str> {
    let caps = RE_REF.captures(line)?;
    let k: usize = caps[1].parse().ok()?;
    let url = urls.get(k.checked_sub(1)?)?;
    let url = url.trim();
    (!url.is_empty()).then_some(url)
}

fn split_headline(text: &str) -> (String, String) {
    match RE_SPLIT.captures(text) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
        None => (text.trim().to_string(), String::new()),
    }
}

/// Parse one listing. `published_at` is stamped on every record because the
/// listing carries no per-item dates.
pub fn parse_listing(
    content: &str,
    urls: &[String],
    published_at: DateTime<Utc>,
    fallback_source: &str,
) -> Vec<SourceRecord> {
    let mut out = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if !RE_ENUMERATED.is_match(line) {
            continue;
        }
        let Some(link) = resolve_link(line, urls) else {
            tracing::debug!(target: "ingest", line, "prose line without a resolvable reference");
            continue;
        };

        let stripped = RE_ENUMERATOR.replace(line, "");
        let stripped = RE_REF.replace_all(&stripped, "");
        let stripped = stripped.replace("**", "");

        let (title, summary) = split_headline(stripped.trim());
        if title.is_empty() {
            continue;
        }

        out.push(SourceRecord {
            title,
            link: link.to_string(),
            published_at,
            summary,
            source_name: source_label(link, fallback_source),
        });
    }

    out
}
