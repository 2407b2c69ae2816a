use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::digest::Digest;
use crate::orchestrator::{DigestService, ReadResponse};

#[derive(Clone)]
pub struct AppState {
    pub service: DigestService,
    /// Bearer secret for /api/refresh. `None` disables the check.
    pub refresh_secret: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/digest", get(get_digest))
        .route("/api/refresh", get(refresh).post(refresh))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct StaleDigest<'a> {
    #[serde(flatten)]
    digest: &'a Digest,
    stale: bool,
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

async fn get_digest(State(state): State<AppState>) -> Response {
    let outcome = state.service.read().await;

    // Runs after this handler returns; never awaited here.
    if let Some(deferred) = outcome.deferred {
        tracing::info!(target: "api", trigger = deferred.trigger().as_str(), "scheduling background refresh");
        deferred.spawn();
    }

    let body = match &outcome.response {
        ReadResponse::Fresh(d) => serde_json::to_value(d),
        ReadResponse::Stale(d) => serde_json::to_value(StaleDigest {
            digest: d,
            stale: true,
        }),
        ReadResponse::Pending => {
            return (StatusCode::ACCEPTED, Json(json!({ "pending": true }))).into_response();
        }
    };

    match body {
        Ok(v) => Json(v).into_response(),
        Err(e) => {
            tracing::error!(target: "api", error = %e, "digest serialization failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to load digest" }),
            )
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without bailing out at the first differing byte.
fn secrets_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(expected) = state.refresh_secret.as_deref() {
        let ok = bearer_token(&headers).is_some_and(|t| secrets_match(t, expected));
        if !ok {
            tracing::warn!(target: "api", "refresh rejected: bad or missing bearer token");
            return error_response(StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" }));
        }
    }

    match state.service.refresh().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::error!(target: "api", error = ?e, "refresh failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Refresh failed", "detail": format!("{e:#}") }),
            )
        }
    }
}
