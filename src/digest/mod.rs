// src/digest/mod.rs
//! The cached artifact and how it is assembled from synthesis output.

pub mod synth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::digest::synth::{RawCitation, SynthesisOutput};
use crate::ingest::types::SourceRecord;

pub const NO_NEWS_INTRO: &str =
    "No new articles were found in today's news feeds. Please check back later.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub index: usize, // 1-based into the records given to synthesis
    pub title: String,
    pub url: String,
    pub source_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigestSection {
    pub heading: String,
    pub body: String, // may contain inline [N] markers
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub date: String,
    pub headline: String,
    pub intro: String,
    #[serde(default)]
    pub sections: Vec<DigestSection>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub record_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl Digest {
    /// Fixed digest for a day with no records; synthesis is never involved.
    pub fn no_news(topic: &str, date: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            date: date.to_string(),
            headline: format!("{topic} Morning Digest"),
            intro: NO_NEWS_INTRO.to_string(),
            sections: Vec::new(),
            citations: Vec::new(),
            record_count: 0,
            generated_at,
        }
    }

    /// Combine synthesis output with the records it was given. `record_count`
    /// is the number of records sent, not the number cited.
    pub fn from_synthesis(
        out: SynthesisOutput,
        date: &str,
        records: &[SourceRecord],
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date: date.to_string(),
            headline: out.headline,
            intro: out.intro,
            sections: out.sections,
            citations: sanitize_citations(out.citations, records),
            record_count: records.len(),
            generated_at,
        }
    }
}

/// Keep citations whose index points at a record that was actually sent.
/// Out-of-range, non-integral and repeated indices are dropped; first
/// appearance wins and order is preserved. Blank fields fall back to the record.
pub fn sanitize_citations(raw: Vec<RawCitation>, records: &[SourceRecord]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for c in raw {
        if c.index.fract() != 0.0 || c.index < 1.0 || c.index > records.len() as f64 {
            tracing::debug!(target: "digest", index = c.index, "dropping out-of-range citation");
            continue;
        }
        let index = c.index as usize;
        if !seen.insert(index) {
            continue;
        }
        let rec = &records[index - 1];
        out.push(Citation {
            index,
            title: non_blank_or(c.title, &rec.title),
            url: non_blank_or(c.url, &rec.link),
            source_name: non_blank_or(c.source, &rec.source_name),
        });
    }

    out
}

fn non_blank_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
