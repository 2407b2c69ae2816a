// src/store.rs
//! Single-slot digest storage. Exactly one artifact; writes replace it whole.
//!
//! Backends share one contract: `read` degrades to `None` on any backend or
//! decode error (logged), `write` reports failure to the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::StoreBackend;
use crate::digest::Digest;

#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn read(&self) -> Option<Digest>;
    async fn write(&self, digest: &Digest) -> Result<()>;
    fn backend(&self) -> &'static str;
}

pub type DynStore = Arc<dyn DigestStore>;

/// Build the configured backend. Called once at startup.
pub fn build_store(backend: &StoreBackend, http: reqwest::Client) -> DynStore {
    match backend {
        StoreBackend::Blob { url, token } => {
            Arc::new(BlobStore::new(http, url.clone(), token.clone()))
        }
        StoreBackend::File { path } => Arc::new(FileStore::new(path.clone())),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

// ------------------------------------------------------------
// Local file (single instance)
// ------------------------------------------------------------

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DigestStore for FileStore {
    async fn read(&self) -> Option<Digest> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(target: "store", error = %e, path = %self.path.display(), "digest read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(target: "store", error = %e, path = %self.path.display(), "stored digest is not valid json");
                None
            }
        }
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        let json = serde_json::to_vec(digest).context("serializing digest")?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &json))
            .await
            .context("file store writer task")?
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// Readers never see a half-written file: each write fills its own temp file
/// in the target directory, then renames it over the target.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("writing {}", tmp.path().display()))?;
    tmp.as_file().sync_all().context("syncing digest temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

// ------------------------------------------------------------
// Process memory
// ------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    slot: RwLock<Option<Digest>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_digest(digest: Digest) -> Self {
        Self {
            slot: RwLock::new(Some(digest)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    async fn read(&self) -> Option<Digest> {
        match self.slot.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        let mut g = match self.slot.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        *g = Some(digest.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ------------------------------------------------------------
// Shared HTTP object store
// ------------------------------------------------------------

/// One named JSON object behind a URL. `GET` reads it (404 = absent), `PUT`
/// overwrites it. Both carry the bearer token.
pub struct BlobStore {
    http: reqwest::Client,
    url: String,
    token: String,
    timeout: Duration,
}

impl BlobStore {
    pub fn new(http: reqwest::Client, url: String, token: String) -> Self {
        Self {
            http,
            url,
            token,
            timeout: Duration::from_secs(10),
        }
    }

    async fn fetch(&self) -> Result<Option<Digest>> {
        let resp = self
            .http
            .get(&self.url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await
            .context("blob http get()")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status().context("blob http status")?;
        let digest = resp.json::<Digest>().await.context("blob digest json")?;
        Ok(Some(digest))
    }
}

#[async_trait]
impl DigestStore for BlobStore {
    async fn read(&self) -> Option<Digest> {
        match self.fetch().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(target: "store", error = ?e, "blob read failed, treating as absent");
                None
            }
        }
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        self.http
            .put(&self.url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(digest)
            .send()
            .await
            .context("blob http put()")?
            .error_for_status()
            .context("blob http put status")?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "blob"
    }
}
