// src/bootstrap.rs
//! Assemble the service from configuration. Backend and sources are decided
//! here once; nothing downstream re-reads the environment.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::{DigestConfig, Secrets, StoreBackend};
use crate::digest::synth::{AnthropicSynthesizer, DisabledSynthesizer, DynSynthesizer};
use crate::freshness::FreshnessPolicy;
use crate::ingest::providers::{build_http_client, research::ResearchSource, rss::RssSourceFetcher};
use crate::ingest::types::NewsSource;
use crate::orchestrator::{DigestService, ServiceParts};
use crate::store::{build_store, DynStore};

/// Feed fetchers first, then the research source when a key is present.
pub fn build_sources(
    cfg: &DigestConfig,
    secrets: &Secrets,
    http: &reqwest::Client,
) -> Vec<Arc<dyn NewsSource>> {
    let keywords = Arc::new(cfg.keywords.clone());
    let fetch_timeout = Duration::from_secs(cfg.fetch_timeout_secs);

    let mut sources: Vec<Arc<dyn NewsSource>> = cfg
        .feeds
        .iter()
        .map(|feed| {
            Arc::new(RssSourceFetcher::new(
                feed.clone(),
                Arc::clone(&keywords),
                http.clone(),
                fetch_timeout,
            )) as Arc<dyn NewsSource>
        })
        .collect();

    match &secrets.research_api_key {
        Some(key) => sources.push(Arc::new(ResearchSource::new(
            http.clone(),
            key.clone(),
            cfg.research_model.clone(),
            cfg.research_query.clone(),
            cfg.research_label.clone(),
            Duration::from_secs(cfg.research_timeout_secs),
        ))),
        None => info!("research source disabled: no API key"),
    }

    sources
}

pub fn build_synthesizer(
    cfg: &DigestConfig,
    secrets: &Secrets,
    http: &reqwest::Client,
) -> DynSynthesizer {
    match &secrets.synth_api_key {
        Some(key) => Arc::new(AnthropicSynthesizer::new(
            http.clone(),
            key.clone(),
            cfg.synth_model.clone(),
            cfg.topic.clone(),
        )),
        None => {
            warn!("synthesis disabled: no API key; refreshes with records will fail");
            Arc::new(DisabledSynthesizer)
        }
    }
}

pub fn build_service_with_store(
    cfg: &DigestConfig,
    secrets: &Secrets,
    store: DynStore,
    http: &reqwest::Client,
) -> Result<DigestService> {
    let freshness = FreshnessPolicy::new(cfg.time_zone()?);
    Ok(DigestService::new(ServiceParts {
        sources: build_sources(cfg, secrets, http),
        synthesizer: build_synthesizer(cfg, secrets, http),
        store,
        freshness,
        topic: cfg.topic.clone(),
        max_records: cfg.max_records,
        reservation_ttl: Duration::from_secs(cfg.refresh_reservation_secs),
    }))
}

pub fn build_state(
    cfg: &DigestConfig,
    secrets: &Secrets,
    backend: &StoreBackend,
) -> Result<AppState> {
    let http = build_http_client()?;
    let store = build_store(backend, http.clone());
    // Safe diagnostics: presence only, never values.
    info!(
        store = backend.name(),
        feeds = cfg.feeds.len(),
        timezone = %cfg.timezone,
        secrets = ?secrets,
        "digest service configured"
    );
    Ok(AppState {
        service: build_service_with_store(cfg, secrets, store, &http)?,
        refresh_secret: secrets.refresh_secret.clone(),
    })
}

/// Entry point wiring: config file or defaults, secrets and backend from env.
pub fn app_state_from_env() -> Result<AppState> {
    let cfg = DigestConfig::load_default()?;
    build_state(&cfg, &Secrets::from_env(), &StoreBackend::from_env())
}
