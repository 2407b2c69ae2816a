// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod digest;
pub mod freshness;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router as router, AppState};
pub use crate::digest::{Citation, Digest, DigestSection};
pub use crate::ingest::types::SourceRecord;
pub use crate::orchestrator::{DigestService, ReadResponse, RefreshSummary};
