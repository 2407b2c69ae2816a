//! Daily digest service binary.
//! Boots the Axum HTTP server with the digest routes and optional /metrics.

use firenews_digest::{bootstrap, metrics::Metrics, router};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}

/// Compact logs in development (DIGEST_DEV_LOG=1), JSON logs when DIGEST_LOG_JSON=1.
/// Uses `try_init` so a subscriber installed by the runtime wins silently.
fn init_tracing() {
    let flag = |k: &str| std::env::var(k).ok().is_some_and(|v| v == "1");
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("firenews_digest=info,ingest=info,digest=info,store=info,api=info,warn"))
    };

    if flag("DIGEST_LOG_JSON") {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().json())
            .try_init();
    } else if flag("DIGEST_DEV_LOG") && is_dev_env() {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().compact())
            .try_init();
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let state = bootstrap::app_state_from_env()?;
    let mut app = router(state);

    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(app.into())
}
