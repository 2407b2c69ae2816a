// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/digest  (pending, fresh, stale + background refresh)
// - GET|POST /api/refresh  (auth, summary, failure)

mod common;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt as _; // for `oneshot`

use common::{digest_generated_at, hours_ago, record, service, CountingSynth, StaticSource};
use firenews_digest::store::{DynStore, MemoryStore};
use firenews_digest::{router, AppState, Digest};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_app(
    initial: Option<Digest>,
    synth: Arc<CountingSynth>,
    secret: Option<&str>,
) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(match initial {
        Some(d) => MemoryStore::with_digest(d),
        None => MemoryStore::new(),
    });
    let dyn_store: DynStore = store.clone();
    let sources = vec![StaticSource::primary(
        "feed",
        vec![record("Altadena library reopens", "Pasadena Star-News", hours_ago(1))],
    )];
    let state = AppState {
        service: service(sources, synth, dyn_store),
        refresh_secret: secret.map(str::to_string),
    };
    (router(state), store)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

async fn wait_for_writes(store: &MemoryStore, n: usize) {
    for _ in 0..100 {
        if store.write_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("store saw {} writes, wanted {n}", store.write_count());
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_app(None, CountingSynth::ok(), None);
    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "OK");
}

#[tokio::test]
async fn empty_store_returns_202_pending_then_fills_in() {
    let synth = CountingSynth::ok();
    let (app, store) = test_app(None, synth.clone(), None);

    let (status, body) = call(app.clone(), get("/api/digest")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["pending"], true);

    wait_for_writes(&store, 1).await;
    let (status, body) = call(app, get("/api/digest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recordCount"], 1);
    assert!(body.get("stale").is_none());
    assert_eq!(synth.calls(), 1);
}

#[tokio::test]
async fn fresh_digest_is_returned_without_stale_marker() {
    let synth = CountingSynth::ok();
    let (app, store) = test_app(Some(digest_generated_at(Utc::now())), synth.clone(), None);

    let (status, body) = call(app, get("/api/digest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["headline"], "Old digest");
    assert!(body["generatedAt"].is_string());
    assert!(body.get("stale").is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.write_count(), 0);
    assert_eq!(synth.calls(), 0);
}

#[tokio::test]
async fn stale_digest_is_marked_and_refreshed_in_background() {
    let old = digest_generated_at(Utc::now() - ChronoDuration::days(2));
    let (app, store) = test_app(Some(old), CountingSynth::ok(), None);

    let (status, body) = call(app, get("/api/digest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stale"], true);
    assert_eq!(body["headline"], "Old digest");

    wait_for_writes(&store, 1).await;
}

#[tokio::test]
async fn refresh_requires_bearer_secret_when_configured() {
    let (app, store) = test_app(None, CountingSynth::ok(), Some("cron-secret"));

    let (status, body) = call(app.clone(), get("/api/refresh")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/refresh")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(app, wrong).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn refresh_returns_summary() {
    let (app, store) = test_app(None, CountingSynth::ok(), Some("cron-secret"));

    let req = Request::builder()
        .method("POST")
        .uri("/api/refresh")
        .header(header::AUTHORIZATION, "Bearer cron-secret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["recordCount"], 1);
    assert_eq!(body["sectionCount"], 2);
    assert!(body["generatedAt"].is_string());
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn refresh_failure_is_500_with_detail() {
    let (app, _) = test_app(None, CountingSynth::failing(), None);

    let (status, body) = call(app, get("/api/refresh")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Refresh failed");
    assert!(body["detail"].as_str().unwrap().contains("model overloaded"));
}
