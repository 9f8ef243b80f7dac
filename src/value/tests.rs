//! Tests for value analysis

use super::market::*;
use super::movement::*;
use super::*;
use crate::types::OddsSnapshot;
use chrono::{Duration, TimeZone, Utc};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn priced(id: &str, probability: f64, odds: Option<f64>) -> PricedEntrant {
    PricedEntrant {
        entrant_id: id.to_string(),
        probability,
        confidence: 0.8,
        odds,
    }
}

fn snapshots(id: &str, odds: &[f64]) -> Vec<OddsSnapshot> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    odds.iter()
        .enumerate()
        .map(|(i, o)| OddsSnapshot {
            entrant_id: id.to_string(),
            win_odds: *o,
            place_odds: None,
            timestamp: start + Duration::minutes(10 * i as i64),
        })
        .collect()
}

#[test]
fn test_edge_basic() {
    assert!(approx(edge(0.25, 5.0), 0.25));
    assert!(approx(edge(0.2, 4.0), -0.2));
    assert_eq!(edge(0.5, 0.0), 0.0);
    assert_eq!(edge(0.5, -3.0), 0.0);
}

#[test]
fn test_try_edge_range_errors() {
    assert!(try_edge(0.3, 4.0).is_ok());
    assert!(matches!(try_edge(0.3, 1.0), Err(EngineError::Range(_))));
    assert!(matches!(try_edge(0.0, 4.0), Err(EngineError::Range(_))));
    assert!(matches!(try_edge(1.0, 4.0), Err(EngineError::Range(_))));
}

#[test]
fn test_classification_thresholds() {
    let config = ValueConfig::default();
    assert_eq!(classify(0.06, &config), ValueClass::Undervalued);
    assert_eq!(classify(0.05, &config), ValueClass::Fair);
    assert_eq!(classify(-0.05, &config), ValueClass::Fair);
    assert_eq!(classify(-0.06, &config), ValueClass::Overvalued);
}

#[test]
fn test_fair_odds_and_parlay() {
    assert_eq!(fair_odds(0.25), Some(4.0));
    assert_eq!(fair_odds(0.0), None);
    assert_eq!(implied_probability(4.0), Some(0.25));
    assert!(approx(parlay_odds(&[2.0, 3.0, -1.0]), 6.0));
    assert_eq!(parlay_odds(&[]), 0.0);
}

#[test]
fn test_opportunity_rating() {
    assert_eq!(OpportunityRating::from_edge(0.3, 0.8), OpportunityRating::StrongBuy);
    assert_eq!(OpportunityRating::from_edge(0.15, 0.8), OpportunityRating::Buy);
    assert_eq!(OpportunityRating::from_edge(0.07, 0.8), OpportunityRating::Consider);
    assert_eq!(OpportunityRating::from_edge(-0.2, 0.8), OpportunityRating::Avoid);
    assert_eq!(OpportunityRating::from_edge(0.0, 0.8), OpportunityRating::Neutral);
}

#[test]
fn test_rank_opportunities_by_edge_times_confidence() {
    let config = ValueConfig::default();
    let mut low_conf = priced("B", 0.4, Some(4.0));
    low_conf.confidence = 0.2;
    let entrants = vec![
        priced("A", 0.3, Some(4.0)), // edge 0.2, score 0.16
        low_conf,                    // edge 0.6, score 0.12
        priced("C", 0.1, Some(5.0)), // negative edge
        priced("D", 0.2, None),      // no price
    ];
    let ranked = rank_opportunities(&entrants, 0.0, &config);
    let ids: Vec<&str> = ranked.iter().map(|a| a.entrant_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn test_undervalued_and_overvalued_lists() {
    let config = ValueConfig::default();
    let entrants = vec![
        priced("A", 0.3, Some(4.0)),
        priced("B", 0.1, Some(5.0)),
        priced("C", 0.25, Some(4.0)),
        priced("D", 0.5, Some(3.0)),
    ];
    let under = undervalued(&entrants, &config);
    assert_eq!(under.len(), 2);
    assert_eq!(under[0].entrant_id, "D");

    let over = overvalued(&entrants, &config);
    assert_eq!(over.len(), 1);
    assert_eq!(over[0].entrant_id, "B");
}

#[test]
fn test_mispriced_events() {
    let config = ValueConfig::default();
    let rich = vec![priced("A", 0.3, Some(4.0)), priced("D", 0.5, Some(3.0))];
    let thin = vec![priced("A", 0.3, Some(4.0)), priced("B", 0.1, Some(5.0))];
    let events = vec![("R1", rich.as_slice()), ("R2", thin.as_slice())];
    let found = mispriced_events(events, &config);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].event_id, "R1");
    assert_eq!(found[0].value_count, 2);
}

#[test]
fn test_movement_shortening_regardless_of_arrival_order() {
    let config = ValueConfig::default();
    let mut history = snapshots("A", &[8.0, 7.0, 6.0]);
    history.reverse();
    let movement = analyze_movement(&history, &config);
    assert_eq!(movement.direction, MovementDirection::Shortening);
    assert!(approx(movement.magnitude, 0.25));
}

#[test]
fn test_movement_drifting_and_stable() {
    let config = ValueConfig::default();
    let drifting = analyze_movement(&snapshots("A", &[4.0, 5.0]), &config);
    assert_eq!(drifting.direction, MovementDirection::Drifting);

    let stable = analyze_movement(&snapshots("A", &[4.0, 4.2]), &config);
    assert_eq!(stable.direction, MovementDirection::Stable);

    let unknown = analyze_movement(&snapshots("A", &[4.0]), &config);
    assert_eq!(unknown.direction, MovementDirection::Unknown);
}

#[test]
fn test_smart_money_needs_three_points() {
    assert_eq!(smart_money_score(&[10.0, 5.0], 0.15), 0.0);
    // moves: 0.5, 0.04
    assert!(approx(smart_money_score(&[10.0, 5.0, 5.2], 0.15), 0.5));
}

#[test]
fn test_value_shift() {
    let config = ValueConfig::default();
    // history values: (5*0.25-1)*100 = 25, (4*0.25-1)*100 = 0 → mean 12.5
    let history = snapshots("A", &[5.0, 4.0]);
    let shift = detect_value_shift(6.0, 0.25, &history, &config);
    assert!(approx(shift.current_value, 50.0));
    assert!(approx(shift.change, 37.5));
    assert_eq!(shift.trend, ValueTrend::Improving);

    let shift = detect_value_shift(3.0, 0.25, &history, &config);
    assert_eq!(shift.trend, ValueTrend::Deteriorating);

    let shift = detect_value_shift(3.0, 0.25, &[], &config);
    assert_eq!(shift.trend, ValueTrend::Unknown);
}

#[test]
fn test_pressure_ranking() {
    let mut history = snapshots("A", &[10.0, 9.0, 8.0]);
    history.extend(snapshots("B", &[4.0, 5.0, 6.0]));
    history.extend(snapshots("C", &[3.0, 2.0]));
    let ranking = pressure_ranking(&history, 5);
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].entrant_id, "B");
    assert!(ranking[0].strength < 0.0);
    assert!(approx(ranking[1].strength, 0.2));
}

#[test]
fn test_market_consensus() {
    let config = ValueConfig::default();
    let consensus = market_consensus(&[2.0, 3.0, 3.5, 10.0, 20.0], &config);
    assert_eq!(consensus.bias, FavouriteBias::Heavy);
    assert!(approx(consensus.favourite_concentration, 0.6));
    assert!(consensus.confidence > 0.0 && consensus.confidence < 1.0);
    assert!(consensus.strength >= 0.0 && consensus.strength <= 1.0);

    let balanced = market_consensus(&[5.0, 8.0, 10.0, 12.0, 15.0, 21.0], &config);
    assert_eq!(balanced.bias, FavouriteBias::Balanced);

    let unknown = market_consensus(&[2.0, 3.0], &config);
    assert_eq!(unknown.bias, FavouriteBias::Unknown);

    let flat = market_consensus(&[5.0, 5.0, 5.0], &config);
    assert_eq!(flat.strength, 1.0);
    assert_eq!(flat.confidence, 1.0);
}

#[test]
fn test_win_place_spread() {
    let config = ValueConfig::default();
    // expected 3.5, actual 7.0 → anomaly capped at 1
    let spread = win_place_spread(10.0, 3.0, &config).unwrap();
    assert!(approx(spread.spread, 7.0));
    assert_eq!(spread.anomaly, 1.0);
    assert!(spread.unusual);

    let normal = win_place_spread(10.0, 6.5, &config).unwrap();
    assert!(!normal.unusual);

    assert!(win_place_spread(10.0, 0.0, &config).is_none());
}

#[test]
fn test_contrarian_plays() {
    let config = ValueConfig::default();
    let entrants = vec![
        priced("A", 0.35, Some(4.0)),
        priced("B", 0.28, Some(4.0)),
        priced("C", 0.5, None),
    ];
    let plays = contrarian_plays(&entrants, &config);
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].entrant_id, "A");
    assert!(approx(plays[0].discrepancy, 0.1));
    assert!(approx(plays[0].expected_value, 0.4));
}
