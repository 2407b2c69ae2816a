// tests/aggregate.rs
mod common;

use common::{hours_ago, record, FailingSource, SlowSource, StaticSource};
use firenews_digest::ingest::aggregate;
use firenews_digest::ingest::types::NewsSource;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn primary_tier_wins_duplicates_even_when_listed_later() {
    // Research is configured first but is a lower tier than the feed.
    let sources = vec![
        StaticSource::secondary(
            "research",
            vec![record("  ROAD closed on Lake Ave ", "Web research", hours_ago(1))],
        ),
        StaticSource::primary(
            "feed",
            vec![
                record("Road closed on Lake Ave", "Pasadena Star-News", hours_ago(3)),
                record("Library reopens", "Pasadena Star-News", hours_ago(2)),
            ],
        ),
    ];

    let report = aggregate(&sources, 25).await;
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.records.len(), 2);

    let road = report
        .records
        .iter()
        .find(|r| r.title.to_lowercase().contains("road closed"))
        .unwrap();
    assert_eq!(road.source_name, "Pasadena Star-News");
}

#[tokio::test]
async fn output_is_newest_first_and_bounded() {
    let records = (0..40)
        .map(|i| record(&format!("Story {i}"), "Feed", hours_ago(i)))
        .collect::<Vec<_>>();
    let sources = vec![StaticSource::primary("feed", records)];

    let report = aggregate(&sources, 25).await;
    assert_eq!(report.records.len(), 25);
    assert_eq!(report.records[0].title, "Story 0");
    assert_eq!(report.records[24].title, "Story 24");
    assert!(report
        .records
        .windows(2)
        .all(|w| w[0].published_at >= w[1].published_at));
}

#[tokio::test]
async fn failing_and_slow_sources_do_not_abort_the_rest() {
    let sources: Vec<Arc<dyn NewsSource>> = vec![
        Arc::new(FailingSource),
        Arc::new(SlowSource),
        StaticSource::primary("feed", vec![record("Debris removal", "LAist", hours_ago(1))]),
    ];

    let started = Instant::now();
    let report = aggregate(&sources, 25).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].title, "Debris removal");
    let mut failed = report.failed_sources.clone();
    failed.sort();
    assert_eq!(failed, vec!["failing".to_string(), "slow".to_string()]);
}

#[tokio::test]
async fn every_source_empty_or_failed_yields_nothing() {
    let sources: Vec<Arc<dyn NewsSource>> = vec![
        StaticSource::primary("feed", Vec::new()),
        Arc::new(FailingSource),
    ];
    let report = aggregate(&sources, 25).await;
    assert!(report.records.is_empty());
    assert_eq!(report.duplicates, 0);

    let none = aggregate(&[], 25).await;
    assert!(none.records.is_empty());
}
