// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::ingest::types::{NewsSource, SourceRecord, SourceTier};
use crate::ingest::{is_relevant, strip_markup};

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize, Default)]
struct AtomText {
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Format-neutral view of one feed entry before filtering.
struct RawEntry {
    title: String,
    link: String,
    published: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}

fn raw_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let xml = scrub_html_entities_for_xml(xml);

    let rss_err = match from_str::<Rss>(&xml) {
        Ok(rss) => {
            return Ok(rss
                .channel
                .item
                .into_iter()
                .map(|it| RawEntry {
                    title: it.title.unwrap_or_default(),
                    link: it.link.unwrap_or_default(),
                    published: it.pub_date,
                    summary: it.description,
                    content: it.content,
                })
                .collect())
        }
        Err(e) => e,
    };
    if !xml.contains("<feed") {
        return Err(rss_err).context("parsing rss xml");
    }

    let atom: AtomFeed = from_str(&xml)
        .with_context(|| format!("parsing feed xml (not rss: {rss_err}; not atom)"))?;
    Ok(atom
        .entry
        .into_iter()
        .map(|e| {
            let link = e
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| e.links.first())
                .and_then(|l| l.href.clone())
                .unwrap_or_default();
            RawEntry {
                title: e.title.map(|t| t.text).unwrap_or_default(),
                link,
                published: e.published.or(e.updated),
                summary: e.summary.map(|t| t.text),
                content: e.content.map(|t| t.text),
            }
        })
        .collect())
}

/// Parse a feed document into records. Entries without a title or link are
/// dropped; non-strict feeds also drop entries that match no keyword.
pub fn parse_feed(
    xml: &str,
    source_name: &str,
    strict: bool,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<SourceRecord>> {
    let entries = raw_entries(xml)?;
    let total = entries.len();

    let mut out = Vec::with_capacity(total);
    for e in entries {
        let title = strip_markup(&e.title);
        let link = e.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            continue;
        }

        let content = e.content.as_deref().map(strip_markup).unwrap_or_default();
        let summary_field = e.summary.as_deref().map(strip_markup).unwrap_or_default();
        if !strict && !is_relevant(&[&title, &content, &summary_field], keywords) {
            continue;
        }

        let summary = if summary_field.is_empty() {
            content
        } else {
            summary_field
        };

        out.push(SourceRecord {
            title,
            link,
            published_at: e
                .published
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(fetched_at),
            summary,
            source_name: source_name.to_string(),
        });
    }

    tracing::debug!(target: "ingest", source = source_name, total, kept = out.len(), "feed parsed");
    Ok(out)
}

/// One syndication feed as a [`NewsSource`].
pub struct RssSourceFetcher {
    feed: FeedConfig,
    keywords: Arc<Vec<String>>,
    client: reqwest::Client,
    timeout: Duration,
}

impl RssSourceFetcher {
    pub fn new(
        feed: FeedConfig,
        keywords: Arc<Vec<String>>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            feed,
            keywords,
            client,
            timeout,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.feed.strict
    }
}

#[async_trait]
impl NewsSource for RssSourceFetcher {
    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        let body = self
            .client
            .get(&self.feed.url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("{} http get()", self.feed.name))?
            .error_for_status()
            .with_context(|| format!("{} http status", self.feed.name))?
            .text()
            .await
            .with_context(|| format!("{} http .text()", self.feed.name))?;

        parse_feed(
            &body,
            &self.feed.name,
            self.feed.strict,
            &self.keywords,
            Utc::now(),
        )
    }

    fn name(&self) -> &str {
        &self.feed.name
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Primary
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
