//! Tests for the prediction store

use super::*;
use chrono::Duration;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

fn prediction(event: &str, entrant: &str, rank: u32, win: f64) -> NewPrediction {
    NewPrediction {
        event_id: event.to_string(),
        event_date: day(1),
        venue: "Flemington".to_string(),
        entrant_id: entrant.to_string(),
        predicted_rank: rank,
        raw_win_prob: win + 0.02,
        predicted_win_prob: win,
        predicted_place_prob: (win * 2.5).min(0.9),
        confidence: 0.7,
        odds_at_prediction: Some(4.0),
        model_version: "v1".to_string(),
    }
}

#[tokio::test]
async fn test_upsert_overwrites_outstanding_prediction() {
    let store = Store::in_memory().await.unwrap();

    let first = store.upsert_prediction(&prediction("R1", "A", 1, 0.30)).await.unwrap();
    let second = store.upsert_prediction(&prediction("R1", "A", 2, 0.25)).await.unwrap();
    assert_eq!(first, second);

    let entries = store.event_entries("R1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].predicted_rank, 2);
    assert_eq!(entries[0].predicted_win_prob, 0.25);
    assert!(!entries[0].is_validated());
}

#[tokio::test]
async fn test_versions_are_separate_slots() {
    let store = Store::in_memory().await.unwrap();
    let mut v2 = prediction("R1", "A", 1, 0.30);
    v2.model_version = "v2".to_string();

    let a = store.upsert_prediction(&prediction("R1", "A", 1, 0.30)).await.unwrap();
    let b = store.upsert_prediction(&v2).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(store.event_entries("R1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_record_result_sets_position_only() {
    let store = Store::in_memory().await.unwrap();
    store.upsert_prediction(&prediction("R1", "A", 1, 0.30)).await.unwrap();
    store.upsert_prediction(&prediction("R1", "B", 2, 0.20)).await.unwrap();

    let updated = store.record_result("R1", "A", 3, Utc::now()).await.unwrap();
    assert_eq!(updated, 1);
    assert_eq!(store.record_result("R1", "Z", 1, Utc::now()).await.unwrap(), 0);

    let entries = store.event_entries("R1").await.unwrap();
    let a = entries.iter().find(|e| e.entrant_id == "A").unwrap();
    assert_eq!(a.actual_position, Some(3));
    assert!(a.is_validated());
    assert_eq!(a.predicted_win_prob, 0.30);
    assert_eq!(a.predicted_rank, 1);
    assert_eq!(a.odds_at_prediction, Some(4.0));

    let b = entries.iter().find(|e| e.entrant_id == "B").unwrap();
    assert_eq!(b.actual_position, None);
}

#[tokio::test]
async fn test_logging_after_validation_opens_a_new_slot() {
    let store = Store::in_memory().await.unwrap();
    let first = store.upsert_prediction(&prediction("R1", "A", 1, 0.30)).await.unwrap();
    store.record_result("R1", "A", 1, Utc::now()).await.unwrap();

    let second = store.upsert_prediction(&prediction("R1", "A", 1, 0.35)).await.unwrap();
    assert_ne!(first, second);

    let entries = store.event_entries("R1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries.iter().filter(|e| e.is_validated()).count(), 1);
}

#[tokio::test]
async fn test_entry_filters() {
    let store = Store::in_memory().await.unwrap();

    let mut early = prediction("R1", "A", 1, 0.3);
    early.event_date = day(1);
    let mut late = prediction("R2", "B", 1, 0.3);
    late.event_date = day(10);
    late.venue = "Randwick".to_string();
    let mut other_version = prediction("R3", "C", 1, 0.3);
    other_version.event_date = day(5);
    other_version.model_version = "v2".to_string();

    for p in [&early, &late, &other_version] {
        store.upsert_prediction(p).await.unwrap();
    }
    store.record_result("R2", "B", 1, Utc::now()).await.unwrap();

    assert_eq!(store.entries(&EntryFilter::default()).await.unwrap().len(), 3);

    let validated = store.entries(&EntryFilter::validated()).await.unwrap();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].event_id, "R2");

    let window = store
        .entries(&EntryFilter::default().between(day(1), day(5)))
        .await
        .unwrap();
    assert_eq!(window.len(), 2);
    // ordered by event date
    assert_eq!(window[0].event_id, "R1");
    assert_eq!(window[1].event_id, "R3");

    let by_venue = store.entries(&EntryFilter::default().venue("Randwick")).await.unwrap();
    assert_eq!(by_venue.len(), 1);

    let by_version = store.entries(&EntryFilter::default().model_version("v2")).await.unwrap();
    assert_eq!(by_version.len(), 1);
    assert_eq!(by_version[0].entrant_id, "C");
}

#[tokio::test]
async fn test_historical_events_use_raw_probabilities() {
    let store = Store::in_memory().await.unwrap();
    store.upsert_prediction(&prediction("R1", "A", 1, 0.40)).await.unwrap();
    store.upsert_prediction(&prediction("R1", "B", 2, 0.20)).await.unwrap();
    store.upsert_prediction(&prediction("R2", "C", 1, 0.50)).await.unwrap();

    store.record_result("R1", "A", 2, Utc::now()).await.unwrap();
    store.record_result("R1", "B", 1, Utc::now()).await.unwrap();

    let events = store.historical_events(&EntryFilter::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_id, "R1");
    assert_eq!(event.probabilities.len(), 2);
    assert!((event.probabilities[0] - 0.42).abs() < 1e-9);
    assert_eq!(event.winners, vec![false, true]);
}

#[tokio::test]
async fn test_daily_accuracy_cache() {
    let store = Store::in_memory().await.unwrap();
    assert!(store.cached_daily_accuracy(day(1), None).await.unwrap().is_none());

    let metrics = AccuracyMetrics {
        total_predictions: 12,
        total_events: 2,
        winners_correct: 3,
        win_rate: 0.25,
        place_rate: 0.5,
        roi: -0.05,
        ..Default::default()
    };
    store.store_daily_accuracy(day(1), None, &metrics).await.unwrap();
    store
        .store_daily_accuracy(day(1), Some("Randwick"), &AccuracyMetrics::default())
        .await
        .unwrap();

    assert_eq!(store.cached_daily_accuracy(day(1), None).await.unwrap(), Some(metrics));
    assert_eq!(
        store.cached_daily_accuracy(day(1), Some("Randwick")).await.unwrap(),
        Some(AccuracyMetrics::default())
    );
    assert!(store.cached_daily_accuracy(day(2), None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_model_performance_upsert_and_order() {
    let store = Store::in_memory().await.unwrap();
    let perf = |start: NaiveDate, end: NaiveDate, win_rate: f64| ModelPerformance {
        model_version: "v1".to_string(),
        date_start: start,
        date_end: end,
        total_predictions: 40,
        win_rate,
        place_rate: 0.4,
        roi: 0.02,
        brier_score: 0.08,
        calibration_error: 0.05,
        recorded_at: Utc::now(),
    };

    store.record_model_performance(&perf(day(1), day(7), 0.10)).await.unwrap();
    store.record_model_performance(&perf(day(8), day(14), 0.12)).await.unwrap();
    store.record_model_performance(&perf(day(1), day(7), 0.15)).await.unwrap();

    let rows = store.model_performance("v1").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date_end, day(14));
    assert_eq!(rows[1].win_rate, 0.15);
    assert!(store.model_performance("v9").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: 2,
    };

    let store = Store::connect(&config).await.unwrap();
    store.upsert_prediction(&prediction("R1", "A", 1, 0.3)).await.unwrap();
    assert!(path.exists());

    // schema creation is idempotent
    let reopened = Store::connect(&config).await.unwrap();
    let since = day(1) - Duration::days(1);
    let entries = reopened
        .entries(&EntryFilter::default().between(since, day(1)))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}
