// tests/providers_rss.rs
mod common;

use axum::{http::StatusCode, routing::get, Router};
use chrono::{TimeZone, Utc};
use firenews_digest::config::{DigestConfig, FeedConfig};
use firenews_digest::ingest::providers::rss::{parse_feed, RssSourceFetcher};
use firenews_digest::ingest::types::NewsSource;
use std::sync::Arc;
use std::time::Duration;

const GENERAL: &str = include_str!("fixtures/general_feed.xml");
const GOOGLE: &str = include_str!("fixtures/google_news.xml");
const ATOM: &str = include_str!("fixtures/atom_feed.xml");

fn keywords() -> Vec<String> {
    DigestConfig::default().keywords
}

#[test]
fn general_feed_keeps_only_topic_matches() {
    let now = Utc::now();
    let recs = parse_feed(GENERAL, "Pasadena Star-News", false, &keywords(), now).unwrap();

    let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(recs.len(), 2, "got {titles:?}");
    assert!(titles.iter().all(|t| !t.contains("Rose Bowl")));
    assert!(recs.iter().all(|r| r.source_name == "Pasadena Star-News"));
    assert!(recs.iter().all(|r| !r.summary.contains('<')));
}

#[test]
fn strict_feed_keeps_everything_with_title_and_link() {
    let recs = parse_feed(GOOGLE, "Google News", true, &[], Utc::now()).unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(
        recs[0].published_at,
        Utc.with_ymd_and_hms(2025, 6, 10, 13, 5, 0).unwrap()
    );
    assert!(recs.iter().all(|r| r.link.starts_with("https://")));
}

#[test]
fn atom_entries_parse_with_fallback_dates() {
    let recs = parse_feed(ATOM, "Community Updates", true, &[], Utc::now()).unwrap();
    assert_eq!(recs.len(), 2);

    let air = &recs[0];
    assert_eq!(air.link, "https://updates.test/air-quality");
    assert_eq!(
        air.published_at,
        Utc.with_ymd_and_hms(2025, 6, 10, 18, 30, 2).unwrap()
    );

    let market = &recs[1];
    assert_eq!(market.summary, "Vendors relocate for the heat wave.");
    assert_eq!(
        market.published_at,
        Utc.with_ymd_and_hms(2025, 6, 9, 15, 0, 0).unwrap()
    );

    let filtered = parse_feed(ATOM, "Community Updates", false, &keywords(), Utc::now()).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].title, "Altadena air quality advisory lifted");
}

#[tokio::test]
async fn fetcher_reads_over_http_and_reports_status_errors() {
    let app = Router::new()
        .route("/feed.xml", get(|| async { GENERAL }))
        .route(
            "/broken.xml",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
    let addr = common::serve(app).await;
    let http = reqwest::Client::new();
    let kw = Arc::new(keywords());

    let ok = RssSourceFetcher::new(
        FeedConfig {
            name: "Pasadena Star-News".into(),
            url: format!("http://{addr}/feed.xml"),
            strict: false,
        },
        Arc::clone(&kw),
        http.clone(),
        Duration::from_secs(5),
    );
    assert!(!ok.is_strict());
    assert_eq!(ok.name(), "Pasadena Star-News");
    assert_eq!(ok.fetch().await.unwrap().len(), 2);

    let broken = RssSourceFetcher::new(
        FeedConfig {
            name: "Broken".into(),
            url: format!("http://{addr}/broken.xml"),
            strict: true,
        },
        kw,
        http,
        Duration::from_secs(5),
    );
    assert!(broken.fetch().await.is_err());
}
