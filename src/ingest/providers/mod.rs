pub mod research;
pub mod rss;

use anyhow::{Context, Result};
use std::time::Duration;

pub const USER_AGENT: &str = concat!(
    "firenews-digest/",
    env!("CARGO_PKG_VERSION"),
    " (compatible; news digest)"
);

/// Shared client for feeds and APIs. Per-request timeouts are set by each caller.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .build()
        .context("building http client")
}
