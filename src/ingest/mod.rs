// src/ingest/mod.rs
pub mod prose;
pub mod providers;
pub mod types;

use crate::ingest::types::{NewsSource, SourceRecord};
use anyhow::anyhow;
use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_records_total",
            "Records kept after merge, dedup and truncation."
        );
        describe_counter!(
            "digest_duplicates_total",
            "Records dropped because a higher-priority source had the same title."
        );
        describe_counter!(
            "digest_source_errors_total",
            "Source fetch/parse errors and timeouts."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]*>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup to plain text: drop tags, decode entities, collapse whitespace.
pub fn strip_markup(s: &str) -> String {
    let out = RE_TAGS.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// True iff at least one keyword occurs (case-insensitive substring) in the joined text.
pub fn is_relevant(fields: &[&str], keywords: &[String]) -> bool {
    let haystack = fields.join(" ").to_lowercase();
    keywords
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .any(|kw| haystack.contains(&kw))
}

/// Outcome of one aggregation pass.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub records: Vec<SourceRecord>,
    pub failed_sources: Vec<String>,
    pub duplicates: usize,
}

/// Dedup by normalized title in the given order (first wins), sort newest first,
/// keep at most `max_records`. Returns (records, duplicates dropped).
pub fn merge_records<I>(ordered: I, max_records: usize) -> (Vec<SourceRecord>, usize)
where
    I: IntoIterator<Item = SourceRecord>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    let mut duplicates = 0usize;

    for rec in ordered {
        if !seen.insert(rec.dedup_key()) {
            duplicates += 1;
            continue;
        }
        kept.push(rec);
    }

    kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    kept.truncate(max_records);
    (kept, duplicates)
}

/// Fetch every source in parallel, each under its own timeout. A failed or slow
/// source contributes nothing; it never aborts the others.
pub async fn aggregate(sources: &[Arc<dyn NewsSource>], max_records: usize) -> AggregateReport {
    ensure_metrics_described();

    let fetches = sources.iter().map(|src| async move {
        let limit = src.timeout();
        let res = match tokio::time::timeout(limit, src.fetch()).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!("timed out after {}s", limit.as_secs())),
        };
        (src.name().to_string(), src.tier(), res)
    });
    let settled = join_all(fetches).await;

    let mut batches = Vec::with_capacity(settled.len());
    let mut failed_sources = Vec::new();
    for (name, tier, res) in settled {
        match res {
            Ok(records) => {
                tracing::debug!(target: "ingest", source = %name, count = records.len(), "source fetched");
                batches.push((tier, records));
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = %name, "source failed, continuing without it");
                counter!("digest_source_errors_total").increment(1);
                failed_sources.push(name);
            }
        }
    }

    // Stable: keeps configured order within a tier.
    batches.sort_by_key(|(tier, _)| *tier);
    let (records, duplicates) =
        merge_records(batches.into_iter().flat_map(|(_, recs)| recs), max_records);

    counter!("digest_records_total").increment(records.len() as u64);
    counter!("digest_duplicates_total").increment(duplicates as u64);
    tracing::info!(
        target: "ingest",
        kept = records.len(),
        duplicates,
        failed = failed_sources.len(),
        "aggregation finished"
    );

    AggregateReport {
        records,
        failed_sources,
        duplicates,
    }
}
