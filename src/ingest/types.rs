// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One candidate news item. Built once by a source, never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub summary: String, // plain text, markup stripped
    pub source_name: String,
}

impl SourceRecord {
    /// Dedup identity: lowercase, trimmed title.
    pub fn dedup_key(&self) -> String {
        normalize_title(&self.title)
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Merge priority. Primary sources are concatenated ahead of secondary ones,
/// so they win title collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceTier {
    Primary,
    Secondary,
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<SourceRecord>>;
    fn name(&self) -> &str;
    fn tier(&self) -> SourceTier {
        SourceTier::Primary
    }
    /// Upper bound the aggregator waits for this source.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}
