//! Integration tests for the prediction models

use super::*;
use crate::config::{CalibrationConfig, ComponentWeights};
use crate::error::EngineError;
use std::str::FromStr;
use std::sync::Arc;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn calibrator(method: CalibrationMethod) -> Calibrator {
    let config = CalibrationConfig {
        method,
        ..Default::default()
    };
    let model = CalibrationModel::from_config(&config);
    Calibrator::new(config, Arc::new(model))
}

fn strong_features() -> EntrantFeatures {
    EntrantFeatures {
        last_5_avg: Some(1.5),
        consistency_score: Some(85.0),
        momentum_score: Some(80.0),
        win_rate: Some(0.45),
        track_score: Some(80.0),
        distance_score: Some(85.0),
        odds_score: Some(90.0),
        implied_prob: Some(0.4),
        jockey_score: Some(85.0),
        trainer_score: Some(80.0),
        fitness_health_score: Some(90.0),
        form_available: Some(true),
        odds_available: Some(true),
        track_experience: Some(5.0),
        ..Default::default()
    }
}

#[test]
fn test_ensemble_renormalizes_over_present_components() {
    let combiner = EnsembleCombiner::new(&ComponentWeights::default()).unwrap();
    let features = EntrantFeatures {
        last_5_avg: Some(3.0),
        odds_score: Some(60.0),
        ..Default::default()
    };

    let components = combiner.components(&features);
    assert_eq!(components.len(), 2);

    let form = &components[0];
    let market = &components[1];
    let expected = (form.probability * 0.30 + market.probability * 0.20) / 0.50;

    let combined = combiner.combine(&features).unwrap();
    assert!(approx(combined.raw_probability, expected));
}

#[test]
fn test_ensemble_without_components_is_insufficient_data() {
    let combiner = EnsembleCombiner::new(&ComponentWeights::default()).unwrap();
    let err = combiner.combine(&EntrantFeatures::default()).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData(_)));
}

#[test]
fn test_ensemble_rejects_bad_weights() {
    let weights = ComponentWeights {
        form: 0.8,
        ..Default::default()
    };
    assert!(matches!(
        EnsembleCombiner::new(&weights),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn test_confidence_bounds() {
    let combiner = EnsembleCombiner::new(&ComponentWeights::default()).unwrap();
    let combined = combiner.combine(&strong_features()).unwrap();
    assert!(combined.confidence >= 0.15 && combined.confidence <= 0.99);

    let sparse = EntrantFeatures {
        jockey_score: Some(30.0),
        vet_clear: Some(false),
        ..Default::default()
    };
    let combined = combiner.combine(&sparse).unwrap();
    // agreement 1.0 (single component); data (0 + 0.5 + 0 + 0.6 + 0) / 5
    assert!(approx(combined.confidence, 0.6 + 0.4 * 0.22));
}

#[test]
fn test_explanation_strong_contender() {
    let combiner = EnsembleCombiner::new(&ComponentWeights::default()).unwrap();
    let features = EntrantFeatures {
        recent_win_rate: Some(0.6),
        is_favorite: Some(true),
        current_odds: Some(2.5),
        ..strong_features()
    };
    let combined = combiner.combine(&features).unwrap();
    let explanation = ensemble::explain(&combined.components, &features, 0.32, 0.8);

    assert_eq!(explanation.verdict, Verdict::StrongContender);
    assert_eq!(explanation.risk_assessment, crate::types::RiskLevel::Low);
    assert!(explanation.key_factors.iter().any(|k| k.factor == "Market Favorite"));
    assert!(explanation.why_predicted.starts_with("Predicted at 32.0% based on: strong"));
}

#[test]
fn test_explanation_risk_ladder() {
    let features = EntrantFeatures {
        first_up: Some(true),
        vet_concerns: Some(1.0),
        outside_draw: Some(true),
        ..Default::default()
    };
    let explanation = ensemble::explain(&[], &features, 0.20, 0.9);
    assert_eq!(explanation.risk_factors.len(), 3);
    assert_eq!(explanation.risk_assessment, crate::types::RiskLevel::High);
    // three risks rule out both contender tiers
    assert_eq!(explanation.verdict, Verdict::Roughie);
    assert!(explanation.why_predicted.ends_with("average performance across all factors"));

    let explanation = ensemble::explain(&[], &EntrantFeatures::default(), 0.05, 0.9);
    assert_eq!(explanation.verdict, Verdict::Outsider);
}

#[test]
fn test_power_law_event_sums_to_one() {
    let model = CalibrationModel::from_config(&CalibrationConfig::default());
    let out = model.transform_event(&[0.6, 0.5, 0.3, 0.2], &[None; 4]);
    assert!(approx(out.iter().sum::<f64>(), 1.0));
    // flattening: exponent < 1 shrinks the gap between entrants
    assert!(out[0] / out[3] < 0.6 / 0.2);
}

#[test]
fn test_power_law_field_keeps_ranking() {
    let model = CalibrationModel::from_config(&CalibrationConfig::default());
    assert!(approx(model.power_exponent, 0.75));
    let raw = [0.4, 0.2, 0.15, 0.1, 0.08, 0.07];
    let out = model.transform_event(&raw, &[None; 6]);
    assert!(approx(out.iter().sum::<f64>(), 1.0));
    for pair in out.windows(2) {
        assert!(pair[0] > pair[1]);
    }
    let total: f64 = raw.iter().map(|p| p.powf(0.75)).sum();
    assert!(approx(out[0], 0.4f64.powf(0.75) / total));
}

#[test]
fn test_calibrate_one_per_method() {
    let power = calibrator(CalibrationMethod::PowerLaw);
    assert!(approx(power.calibrate_one(0.2, None), 0.2f64.powf(0.75)));
    // 0.5^0.75 lands above the favourite threshold and is compressed
    let lifted = 0.5f64.powf(0.75);
    assert!(approx(power.calibrate_one(0.5, None), lifted - (lifted - 0.35) * 0.15));

    let shifted = calibrator(CalibrationMethod::LogitShift);
    assert!(approx(shifted.calibrate_one(0.5, None), 1.0 / (1.0 + 0.8f64.exp())));

    // blends with the entrant's own implied probability 1/odds
    let market = calibrator(CalibrationMethod::MarketAdjusted);
    assert!(approx(market.calibrate_one(0.2, Some(4.0)), 0.7 * 0.2 + 0.3 * 0.25));
    assert!(approx(market.calibrate_one(0.2, None), 0.2));
    assert!(approx(market.calibrate_one(0.2, Some(1.0)), 0.2));
}

#[test]
fn test_logit_shift_lowers_probability() {
    let config = CalibrationConfig {
        method: CalibrationMethod::LogitShift,
        ..Default::default()
    };
    let model = CalibrationModel::from_config(&config);
    assert!(model.transform_one(0.5, None) < 0.5);
    // clipped at the extremes
    assert!(model.transform_one(0.0, None) > 0.0);
}

#[test]
fn test_market_blend() {
    let config = CalibrationConfig {
        method: CalibrationMethod::MarketAdjusted,
        ..Default::default()
    };
    let model = CalibrationModel::from_config(&config);
    let out = model.transform_event(&[0.5, 0.5], &[Some(2.0), Some(4.0)]);
    assert!(approx(out[0], 0.55));
    assert!(approx(out[1], 0.45));
}

#[test]
fn test_market_blend_falls_back_without_odds() {
    let config = CalibrationConfig {
        method: CalibrationMethod::MarketAdjusted,
        ..Default::default()
    };
    let model = CalibrationModel::from_config(&config);
    let out = model.transform_event(&[0.6, 0.2], &[Some(2.0), None]);
    assert!(approx(out[0], 0.75));
    assert!(approx(out[1], 0.25));
}

#[test]
fn test_adjust_compression_boost_and_clamp() {
    let cal = calibrator(CalibrationMethod::PowerLaw);
    assert!(approx(cal.adjust(0.5), 0.5 - 0.15 * 0.15));
    assert!(approx(cal.adjust(0.05), 0.054));
    assert!(approx(cal.adjust(0.001), 0.005));
    assert!(approx(cal.adjust(0.2), 0.2));
    assert!(cal.adjust(1.0) <= 0.95);
}

#[test]
fn test_batch_compression_only_above_trigger() {
    let cal = calibrator(CalibrationMethod::PowerLaw);

    let compressed = cal.compress_batch(vec![0.3; 5]);
    // total 1.5 → target min(1.0, max(0.7, 1.35)) = 1.0
    assert!(approx(compressed.iter().sum::<f64>(), 1.0));

    let untouched = cal.compress_batch(vec![0.3; 4]);
    assert_eq!(untouched, vec![0.3; 4]);
}

#[test]
fn test_calibrated_event_within_bounds() {
    let cal = calibrator(CalibrationMethod::PowerLaw);
    let raw = [0.95, 0.7, 0.4, 0.1, 0.02, 0.0001];
    let out = cal.calibrate_event(&raw, &[None; 6]);
    assert_eq!(out.len(), raw.len());
    for p in &out {
        assert!(*p >= 0.005 && *p <= 0.95);
    }
    // ordering preserved
    for pair in out.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
}

#[test]
fn test_unknown_method_name() {
    assert_eq!(CalibrationMethod::from_str("logit_shift").unwrap(), CalibrationMethod::LogitShift);
    assert!(matches!(
        CalibrationMethod::from_str("isotonic"),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn test_grids_are_inclusive_and_exact() {
    let power = fitting::power_law_grid();
    assert_eq!(power.len(), 13);
    assert_eq!(power[0], 0.5);
    assert_eq!(power[10], 1.0);
    assert_eq!(power[12], 1.1);

    let shift = fitting::logit_shift_grid();
    assert_eq!(shift.len(), 31);
    assert_eq!(shift[0], -2.0);
    assert_eq!(shift[12], -0.8);
    assert_eq!(shift[30], 1.0);
}

#[test]
fn test_grid_search_ties_keep_first() {
    let grid = [0.5, 0.6, 0.7];
    assert_eq!(fitting::grid_search(&grid, |_| 1.0), Some((0.5, 1.0)));
    assert_eq!(fitting::grid_search(&grid, |x| (x - 0.6).abs()), Some((0.6, 0.0)));
    assert_eq!(fitting::grid_search(&[], |x| x), None);
    assert_eq!(fitting::grid_search(&grid, |_| f64::NAN), None);
}

fn favourite_history() -> Vec<HistoricalEvent> {
    (0..10)
        .map(|i| HistoricalEvent {
            event_id: format!("E{i}"),
            probabilities: vec![0.6, 0.3, 0.1],
            winners: vec![true, false, false],
        })
        .collect()
}

#[test]
fn test_fit_power_law_is_deterministic() {
    let base = CalibrationModel::from_config(&CalibrationConfig::default());
    let history = favourite_history();

    let a = fitting::fit(CalibrationMethod::PowerLaw, &base, &history).unwrap();
    let b = fitting::fit(CalibrationMethod::PowerLaw, &base, &history).unwrap();
    assert_eq!(a.power_exponent, b.power_exponent);
    assert_eq!(a.brier_score, b.brier_score);
    // favourites always win, so the sharpest exponent is best
    assert_eq!(a.power_exponent, 1.1);
    assert_eq!(a.samples, 30);
    assert!(a.fitted_at.is_some());
}

#[test]
fn test_fit_logit_shift() {
    let base = CalibrationModel::from_config(&CalibrationConfig::default());
    let history = vec![HistoricalEvent {
        event_id: "E1".into(),
        probabilities: vec![0.5, 0.5],
        winners: vec![false, false],
    }];
    let model = fitting::fit(CalibrationMethod::LogitShift, &base, &history).unwrap();
    assert_eq!(model.method, CalibrationMethod::LogitShift);
    assert_eq!(model.logit_shift, -2.0);
}

#[test]
fn test_fit_errors() {
    let base = CalibrationModel::from_config(&CalibrationConfig::default());
    assert!(matches!(
        fitting::fit(CalibrationMethod::PowerLaw, &base, &[]),
        Err(EngineError::InsufficientData(_))
    ));
    assert!(matches!(
        fitting::fit(CalibrationMethod::MarketAdjusted, &base, &favourite_history()),
        Err(EngineError::Configuration(_))
    ));

    let malformed = vec![HistoricalEvent {
        event_id: "bad".into(),
        probabilities: vec![0.5],
        winners: vec![],
    }];
    assert!(matches!(
        fitting::fit(CalibrationMethod::PowerLaw, &base, &malformed),
        Err(EngineError::InsufficientData(_))
    ));
}

#[tokio::test]
async fn test_handle_refit_persists_then_swaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let base = CalibrationModel::from_config(&CalibrationConfig::default());

    let handle = CalibrationHandle::open(&path, base.clone()).await.unwrap();
    let before = handle.snapshot();
    assert_eq!(*before, base);

    let fitted = handle
        .refit(CalibrationMethod::PowerLaw, Arc::new(favourite_history()))
        .await
        .unwrap();
    assert_eq!(fitted.power_exponent, 1.1);
    // old snapshot untouched, new one visible
    assert_eq!(before.power_exponent, 0.75);
    assert_eq!(handle.snapshot().power_exponent, 1.1);

    let reloaded = CalibrationModel::load(&path).await.unwrap();
    assert_eq!(reloaded, *fitted);

    let reopened = CalibrationHandle::open(&path, base).await.unwrap();
    assert_eq!(reopened.snapshot().power_exponent, 1.1);
}

#[tokio::test]
async fn test_failed_refit_keeps_current_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let base = CalibrationModel::from_config(&CalibrationConfig::default());
    let handle = CalibrationHandle::new(base.clone(), &path);

    let result = handle
        .refit(CalibrationMethod::PowerLaw, Arc::new(Vec::new()))
        .await;
    assert!(result.is_err());
    assert_eq!(*handle.snapshot(), base);
    assert!(!path.exists());
}
