// src/config.rs
//! Service configuration: a TOML file (or built-in defaults) for the feed set and
//! tunables, plus environment variables for secrets and the store backend.

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

pub const ENV_SYNTH_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_RESEARCH_KEY: &str = "PERPLEXITY_API_KEY";
pub const ENV_REFRESH_SECRET: &str = "CRON_SECRET";
pub const ENV_BLOB_URL: &str = "DIGEST_BLOB_URL";
pub const ENV_BLOB_TOKEN: &str = "BLOB_READ_WRITE_TOKEN";
pub const ENV_CACHE_PATH: &str = "DIGEST_CACHE_PATH";
pub const ENV_STORE: &str = "DIGEST_STORE";

pub const DEFAULT_CACHE_PATH: &str = "/tmp/firenews-digest.json";

/// One syndication feed. `strict` feeds are already scoped to the topic by their
/// query and skip keyword filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub strict: bool,
}

impl FeedConfig {
    fn new(name: &str, url: &str, strict: bool) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            strict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Human topic label used in headlines and prompts.
    pub topic: String,
    /// IANA zone whose calendar day decides freshness.
    pub timezone: String,
    pub max_records: usize,
    pub fetch_timeout_secs: u64,
    pub research_timeout_secs: u64,
    pub keywords: Vec<String>,
    pub feeds: Vec<FeedConfig>,
    pub synth_model: String,
    pub research_model: String,
    pub research_query: String,
    /// `sourceName` for research records whose URL has no usable host.
    pub research_label: String,
    /// How long an in-flight background refresh holds its reservation.
    pub refresh_reservation_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            topic: "Altadena & Eaton Fire".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            max_records: 25,
            fetch_timeout_secs: 10,
            research_timeout_secs: 30,
            keywords: [
                "altadena",
                "eaton fire",
                "eaton canyon fire",
                "pasadena fire",
                "altadena rebuild",
                "altadena recovery",
                "san gabriel valley fire",
                "la county fire",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            feeds: vec![
                FeedConfig::new(
                    "Google News – Eaton Fire",
                    "https://news.google.com/rss/search?q=Eaton+Fire+California&hl=en-US&gl=US&ceid=US:en",
                    true,
                ),
                FeedConfig::new(
                    "Google News – Altadena",
                    "https://news.google.com/rss/search?q=Altadena+California&hl=en-US&gl=US&ceid=US:en",
                    true,
                ),
                FeedConfig::new(
                    "Google News – Altadena Fire Recovery",
                    "https://news.google.com/rss/search?q=Altadena+fire+recovery+rebuild&hl=en-US&gl=US&ceid=US:en",
                    true,
                ),
                FeedConfig::new(
                    "Pasadena Star-News",
                    "https://www.pasadenastarnews.com/feed",
                    false,
                ),
                FeedConfig::new("LAist", "https://laist.com/feeds/news.xml", false),
            ],
            synth_model: "claude-sonnet-4-5".to_string(),
            research_model: "sonar-pro".to_string(),
            research_query: "Find all news articles from the past 24 hours about: Altadena California fire recovery, \
                Eaton Fire damage or insurance claims, Altadena rebuild permits or debris removal, \
                LA County fire recovery resources, air quality in Pasadena or Altadena after the Eaton Fire. \
                For each item give: the headline, then a dash, then the publication name and a one-sentence summary. \
                Number each item."
                .to_string(),
            research_label: "Web research".to_string(),
            refresh_reservation_secs: 600,
        }
    }
}

impl DigestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: DigestConfig = toml::from_str(s).context("parsing digest config toml")?;
        cfg.validated()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// 1) $DIGEST_CONFIG_PATH (must exist)
    /// 2) config/digest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Self::default().validated()
    }

    pub fn time_zone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown time zone '{}': {e}", self.timezone))
    }

    fn validated(mut self) -> Result<Self> {
        self.time_zone()?;
        self.max_records = self.max_records.max(1);
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = 10;
        }
        if self.research_timeout_secs == 0 {
            self.research_timeout_secs = 30;
        }
        self.keywords = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Ok(self)
    }
}

/// Where the single digest artifact lives. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared HTTP object store, consistent across instances.
    Blob { url: String, token: String },
    /// Local JSON file; only valid with exactly one instance.
    File { path: PathBuf },
    /// Process memory; lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn from_env() -> Self {
        let url = non_empty_env(ENV_BLOB_URL);
        let token = non_empty_env(ENV_BLOB_TOKEN);
        if let (Some(url), Some(token)) = (url, token) {
            return StoreBackend::Blob { url, token };
        }
        if non_empty_env(ENV_STORE).is_some_and(|v| v.eq_ignore_ascii_case("memory")) {
            return StoreBackend::Memory;
        }
        let path = non_empty_env(ENV_CACHE_PATH).unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string());
        StoreBackend::File {
            path: PathBuf::from(path),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Blob { .. } => "blob",
            StoreBackend::File { .. } => "file",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Credentials read from the environment. Empty values count as absent.
#[derive(Clone, Default)]
pub struct Secrets {
    pub synth_api_key: Option<String>,
    pub research_api_key: Option<String>,
    pub refresh_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            synth_api_key: non_empty_env(ENV_SYNTH_KEY),
            research_api_key: non_empty_env(ENV_RESEARCH_KEY),
            refresh_secret: non_empty_env(ENV_REFRESH_SECRET),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the values themselves.
        f.debug_struct("Secrets")
            .field("synth_api_key", &self.synth_api_key.is_some())
            .field("research_api_key", &self.research_api_key.is_some())
            .field("refresh_secret", &self.refresh_secret.is_some())
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
