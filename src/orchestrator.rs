// src/orchestrator.rs
//! Read/refresh protocol over the single stored digest.
//!
//! A read never waits on fetching or synthesis. It answers from the store and,
//! when the digest is stale or missing, hands back a [`DeferredRefresh`] for the
//! transport layer to run after responding.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::digest::synth::DynSynthesizer;
use crate::digest::Digest;
use crate::freshness::FreshnessPolicy;
use crate::ingest::{self, types::NewsSource};
use crate::store::DynStore;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_reads_total", "Digest reads by observed state.");
        describe_counter!("digest_refresh_total", "Refresh runs by outcome.");
        describe_gauge!(
            "digest_last_refresh_ts",
            "Unix ts of the last successful refresh."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestState {
    Missing,
    Stale,
    Fresh,
}

impl DigestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestState::Missing => "missing",
            DigestState::Stale => "stale",
            DigestState::Fresh => "fresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadResponse {
    Fresh(Digest),
    Stale(Digest),
    /// Nothing generated yet. Not an error.
    Pending,
}

impl ReadResponse {
    pub fn state(&self) -> DigestState {
        match self {
            ReadResponse::Fresh(_) => DigestState::Fresh,
            ReadResponse::Stale(_) => DigestState::Stale,
            ReadResponse::Pending => DigestState::Missing,
        }
    }
}

pub struct ReadOutcome {
    pub response: ReadResponse,
    /// Present when the caller should run a refresh after responding.
    pub deferred: Option<DeferredRefresh>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub ok: bool,
    pub record_count: usize,
    pub section_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<&Digest> for RefreshSummary {
    fn from(d: &Digest) -> Self {
        Self {
            ok: true,
            record_count: d.record_count,
            section_count: d.sections.len(),
            generated_at: d.generated_at,
        }
    }
}

// ------------------------------------------------------------
// Refresh reservation
// ------------------------------------------------------------

/// At most one read-triggered refresh in flight per civil day in this process.
/// A reservation expires after `ttl` even if its holder never finishes.
pub struct RefreshGate {
    ttl: Duration,
    slot: Mutex<Option<Reservation>>,
    next_token: Mutex<u64>,
}

struct Reservation {
    day: NaiveDate,
    taken_at: Instant,
    token: u64,
}

/// Releases its reservation on drop.
pub struct RefreshPermit {
    gate: Arc<RefreshGate>,
    token: u64,
    day: NaiveDate,
}

impl RefreshPermit {
    pub fn day(&self) -> NaiveDate {
        self.day
    }
}

impl RefreshGate {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            slot: Mutex::new(None),
            next_token: Mutex::new(0),
        })
    }

    pub fn try_reserve(self: &Arc<Self>, day: NaiveDate) -> Option<RefreshPermit> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(r) = slot.as_ref() {
            if r.day == day && r.taken_at.elapsed() < self.ttl {
                return None;
            }
        }
        let token = {
            let mut n = self.next_token.lock().unwrap_or_else(|p| p.into_inner());
            *n += 1;
            *n
        };
        *slot = Some(Reservation {
            day,
            taken_at: Instant::now(),
            token,
        });
        Some(RefreshPermit {
            gate: Arc::clone(self),
            token,
            day,
        })
    }

    pub fn is_reserved(&self, day: NaiveDate) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref()
            .is_some_and(|r| r.day == day && r.taken_at.elapsed() < self.ttl)
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        let mut slot = self.gate.slot.lock().unwrap_or_else(|p| p.into_inner());
        // An expired reservation may already belong to someone else.
        if slot.as_ref().is_some_and(|r| r.token == self.token) {
            *slot = None;
        }
    }
}

// ------------------------------------------------------------
// Service
// ------------------------------------------------------------

/// Everything the service is assembled from.
pub struct ServiceParts {
    pub sources: Vec<Arc<dyn NewsSource>>,
    pub synthesizer: DynSynthesizer,
    pub store: DynStore,
    pub freshness: FreshnessPolicy,
    pub topic: String,
    pub max_records: usize,
    pub reservation_ttl: Duration,
}

struct Inner {
    sources: Vec<Arc<dyn NewsSource>>,
    synthesizer: DynSynthesizer,
    store: DynStore,
    freshness: FreshnessPolicy,
    topic: String,
    max_records: usize,
    gate: Arc<RefreshGate>,
}

/// Cheap to clone; all clones share the same sources, store and gate.
#[derive(Clone)]
pub struct DigestService {
    inner: Arc<Inner>,
}

impl DigestService {
    pub fn new(parts: ServiceParts) -> Self {
        ensure_metrics_described();
        Self {
            inner: Arc::new(Inner {
                sources: parts.sources,
                synthesizer: parts.synthesizer,
                store: parts.store,
                freshness: parts.freshness,
                topic: parts.topic,
                max_records: parts.max_records.max(1),
                gate: RefreshGate::new(parts.reservation_ttl),
            }),
        }
    }

    pub fn freshness(&self) -> FreshnessPolicy {
        self.inner.freshness
    }

    pub fn store_backend(&self) -> &'static str {
        self.inner.store.backend()
    }

    pub async fn read(&self) -> ReadOutcome {
        self.read_at(Utc::now()).await
    }

    /// Classify the stored digest against `now`. Only the store is touched.
    pub async fn read_at(&self, now: DateTime<Utc>) -> ReadOutcome {
        let response = match self.inner.store.read().await {
            Some(d) if self.inner.freshness.is_fresh(d.generated_at, now) => {
                ReadResponse::Fresh(d)
            }
            Some(d) => ReadResponse::Stale(d),
            None => ReadResponse::Pending,
        };
        let state = response.state();
        counter!("digest_reads_total", "state" => state.as_str()).increment(1);

        let deferred = match state {
            DigestState::Fresh => None,
            DigestState::Stale | DigestState::Missing => self.defer_refresh(state, now),
        };

        ReadOutcome { response, deferred }
    }

    fn defer_refresh(&self, trigger: DigestState, now: DateTime<Utc>) -> Option<DeferredRefresh> {
        let day = self.inner.freshness.civil_date(now);
        match self.inner.gate.try_reserve(day) {
            Some(permit) => Some(DeferredRefresh {
                service: self.clone(),
                trigger,
                permit,
            }),
            None => {
                tracing::debug!(target: "digest", %day, "refresh already in flight, not scheduling another");
                None
            }
        }
    }

    /// Fetch, aggregate, synthesize and store, unconditionally. Freshness is not
    /// consulted.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        match self.run_refresh().await {
            Ok(summary) => {
                counter!("digest_refresh_total", "outcome" => "ok").increment(1);
                gauge!("digest_last_refresh_ts").set(summary.generated_at.timestamp() as f64);
                tracing::info!(
                    target: "digest",
                    records = summary.record_count,
                    sections = summary.section_count,
                    "digest refreshed"
                );
                Ok(summary)
            }
            Err(e) => {
                counter!("digest_refresh_total", "outcome" => "error").increment(1);
                Err(e)
            }
        }
    }

    async fn run_refresh(&self) -> Result<RefreshSummary> {
        let inner = &self.inner;
        let started = Utc::now();
        let report = ingest::aggregate(&inner.sources, inner.max_records).await;
        let date = inner.freshness.date_label(started);

        let digest = if report.records.is_empty() {
            tracing::info!(target: "digest", "no records today, storing the no-news digest");
            Digest::no_news(&inner.topic, &date, Utc::now())
        } else {
            let out = inner
                .synthesizer
                .synthesize(&report.records, &date)
                .await
                .with_context(|| {
                    format!("synthesis via {} failed", inner.synthesizer.provider_name())
                })?;
            Digest::from_synthesis(out, &date, &report.records, Utc::now())
        };

        inner
            .store
            .write(&digest)
            .await
            .with_context(|| format!("writing digest to {} store", inner.store.backend()))?;

        Ok(RefreshSummary::from(&digest))
    }
}

/// Refresh work a read asked for. Holding it keeps the day's reservation.
pub struct DeferredRefresh {
    service: DigestService,
    trigger: DigestState,
    permit: RefreshPermit,
}

impl DeferredRefresh {
    /// The read state that caused this refresh (stale or missing).
    pub fn trigger(&self) -> DigestState {
        self.trigger
    }

    /// Run to completion. Failures are logged here; nobody else observes them
    /// except through the next read of the store.
    pub async fn run(self) -> Result<RefreshSummary> {
        let res = self.service.refresh().await;
        if let Err(e) = &res {
            tracing::error!(
                target: "digest",
                error = ?e,
                trigger = self.trigger.as_str(),
                day = %self.permit.day(),
                "background refresh failed"
            );
        }
        res
    }

    /// Fire and forget on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let _ = self.run().await;
        })
    }
}
