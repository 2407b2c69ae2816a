// tests/common/mod.rs
// Shared fakes: in-process HTTP server, canned sources, counting synthesizer,
// failing store.
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use firenews_digest::digest::synth::{DigestSynthesizer, RawCitation, SynthesisOutput};
use firenews_digest::freshness::FreshnessPolicy;
use firenews_digest::ingest::types::{NewsSource, SourceRecord, SourceTier};
use firenews_digest::orchestrator::{DigestService, ServiceParts};
use firenews_digest::store::{DigestStore, DynStore};
use firenews_digest::{Digest, DigestSection};

/// Serve `app` on an ephemeral localhost port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

pub fn record(title: &str, source: &str, published_at: DateTime<Utc>) -> SourceRecord {
    SourceRecord {
        title: title.to_string(),
        link: format!(
            "https://news.test/{}",
            title.trim().to_lowercase().replace(' ', "-")
        ),
        published_at,
        summary: format!("About {title}"),
        source_name: source.to_string(),
    }
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(h)
}

pub struct StaticSource {
    pub name: String,
    pub tier: SourceTier,
    pub records: Vec<SourceRecord>,
}

impl StaticSource {
    pub fn primary(name: &str, records: Vec<SourceRecord>) -> Arc<dyn NewsSource> {
        Arc::new(Self {
            name: name.into(),
            tier: SourceTier::Primary,
            records,
        })
    }

    pub fn secondary(name: &str, records: Vec<SourceRecord>) -> Arc<dyn NewsSource> {
        Arc::new(Self {
            name: name.into(),
            tier: SourceTier::Secondary,
            records,
        })
    }
}

#[async_trait]
impl NewsSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        Ok(self.records.clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn tier(&self) -> SourceTier {
        self.tier
    }
}

pub struct FailingSource;

#[async_trait]
impl NewsSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        bail!("connection refused")
    }
    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps far past its own timeout.
pub struct SlowSource;

#[async_trait]
impl NewsSource for SlowSource {
    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![record("Too late", "slow", Utc::now())])
    }
    fn name(&self) -> &str {
        "slow"
    }
    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }
}

pub struct CountingSynth {
    pub calls: AtomicUsize,
    pub last_len: AtomicUsize,
    pub fail: bool,
    pub citations: Vec<RawCitation>,
}

impl CountingSynth {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_len: AtomicUsize::new(0),
            fail: false,
            citations: vec![RawCitation {
                index: 1.0,
                title: "First".into(),
                url: "https://news.test/first".into(),
                source: "Feed".into(),
            }],
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_len: AtomicUsize::new(0),
            fail: true,
            citations: Vec::new(),
        })
    }

    pub fn with_citations(citations: Vec<RawCitation>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_len: AtomicUsize::new(0),
            fail: false,
            citations,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DigestSynthesizer for CountingSynth {
    async fn synthesize(&self, records: &[SourceRecord], date: &str) -> Result<SynthesisOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(records.len(), Ordering::SeqCst);
        if self.fail {
            bail!("model overloaded");
        }
        Ok(SynthesisOutput {
            headline: format!("Morning Digest – {date}"),
            intro: "Roads reopened[1].".into(),
            sections: vec![
                DigestSection {
                    heading: "Recovery & Rebuilding".into(),
                    body: "Permits are up[1].".into(),
                },
                DigestSection {
                    heading: "Community Resources".into(),
                    body: "A new center opened.".into(),
                },
            ],
            citations: self.citations.clone(),
        })
    }
    fn provider_name(&self) -> &'static str {
        "counting"
    }
}

/// Reads nothing, refuses every write.
pub struct BrokenStore;

#[async_trait]
impl DigestStore for BrokenStore {
    async fn read(&self) -> Option<Digest> {
        None
    }
    async fn write(&self, _digest: &Digest) -> Result<()> {
        bail!("disk full")
    }
    fn backend(&self) -> &'static str {
        "broken"
    }
}

pub fn service(
    sources: Vec<Arc<dyn NewsSource>>,
    synth: Arc<CountingSynth>,
    store: DynStore,
) -> DigestService {
    DigestService::new(ServiceParts {
        sources,
        synthesizer: synth,
        store,
        freshness: FreshnessPolicy::pacific(),
        topic: "Altadena & Eaton Fire".into(),
        max_records: 25,
        reservation_ttl: Duration::from_secs(600),
    })
}

pub fn digest_generated_at(at: DateTime<Utc>) -> Digest {
    Digest {
        date: "June 10, 2025".into(),
        headline: "Old digest".into(),
        intro: "Earlier news[1].".into(),
        sections: vec![DigestSection {
            heading: "Notable Stories".into(),
            body: "Something happened[1].".into(),
        }],
        citations: Vec::new(),
        record_count: 4,
        generated_at: at,
    }
}
