//! Typed entrant features
//!
//! The aggregator hands over a loose name → value map. It is resolved once
//! into [`EntrantFeatures`], a struct of optional signals. Each component
//! predictor owns its own default table for the signals it reads.

use crate::types::RawFeatureMap;
use serde::{Deserialize, Serialize};

/// Resolved per-entrant signals. `None` means the aggregator did not supply it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrantFeatures {
    // Form
    pub last_5_avg: Option<f64>,
    pub consistency_score: Option<f64>,
    pub momentum_score: Option<f64>,
    pub win_rate: Option<f64>,
    pub place_rate: Option<f64>,
    pub recent_win_rate: Option<f64>,
    /// Positive means finishing worse over recent starts
    pub form_trend: Option<f64>,
    pub form_available: Option<bool>,

    // Track and distance
    pub track_score: Option<f64>,
    pub distance_score: Option<f64>,
    pub track_distance_synergy: Option<f64>,
    pub draw_score: Option<f64>,
    pub track_experience: Option<f64>,
    pub track_favorite: Option<bool>,
    pub track_win_rate: Option<f64>,
    pub distance_specialist: Option<bool>,
    pub draw: Option<f64>,
    pub outside_draw: Option<bool>,

    // Market
    pub odds_score: Option<f64>,
    pub market_support: Option<f64>,
    pub implied_prob: Option<f64>,
    pub current_odds: Option<f64>,
    pub is_favorite: Option<bool>,
    pub odds_available: Option<bool>,

    // Human
    pub jockey_score: Option<f64>,
    pub trainer_score: Option<f64>,
    pub jt_synergy_score: Option<f64>,
    pub jt_synergy: Option<f64>,
    pub jt_combo_win_rate: Option<f64>,

    // Health
    pub fitness_health_score: Option<f64>,
    pub preparation_score: Option<f64>,
    pub first_up: Option<bool>,
    pub weight_score: Option<f64>,
    pub days_since_last_race: Option<f64>,
    pub vet_clear: Option<bool>,
    pub vet_concerns: Option<f64>,
    pub injury_history: Option<bool>,
    pub injury_count: Option<f64>,
    pub is_heavy_weight: Option<bool>,
    pub weight: Option<f64>,
    pub trial_win: Option<bool>,
}

impl EntrantFeatures {
    /// Resolve a raw feature map. Unknown keys are ignored; values of the
    /// wrong type are treated as absent.
    pub fn from_raw(raw: &RawFeatureMap) -> Self {
        let num = |key: &str| raw.get(key).and_then(|v| v.as_f64());
        let flag = |key: &str| raw.get(key).and_then(|v| v.as_bool());

        Self {
            last_5_avg: num("last_5_avg"),
            consistency_score: num("consistency_score"),
            momentum_score: num("momentum_score"),
            win_rate: num("win_rate"),
            place_rate: num("place_rate"),
            recent_win_rate: num("recent_win_rate"),
            form_trend: num("form_trend"),
            form_available: flag("form_available"),

            track_score: num("track_score"),
            distance_score: num("distance_score"),
            track_distance_synergy: num("track_distance_synergy"),
            draw_score: num("draw_score"),
            track_experience: num("track_experience"),
            track_favorite: flag("track_favorite"),
            track_win_rate: num("track_win_rate"),
            distance_specialist: flag("distance_specialist"),
            draw: num("draw"),
            outside_draw: flag("outside_draw"),

            odds_score: num("odds_score"),
            market_support: num("market_support"),
            implied_prob: num("implied_prob"),
            current_odds: num("current_odds"),
            is_favorite: flag("is_favorite"),
            odds_available: flag("odds_available"),

            jockey_score: num("jockey_score"),
            trainer_score: num("trainer_score"),
            jt_synergy_score: num("jt_synergy_score"),
            jt_synergy: num("jt_synergy"),
            jt_combo_win_rate: num("jt_combo_win_rate"),

            fitness_health_score: num("fitness_health_score"),
            preparation_score: num("preparation_score"),
            first_up: flag("first_up_flag"),
            weight_score: num("weight_score"),
            days_since_last_race: num("days_since_last_race"),
            vet_clear: flag("vet_clear"),
            vet_concerns: num("vet_concerns"),
            injury_history: flag("injury_history"),
            injury_count: num("injury_count"),
            is_heavy_weight: flag("is_heavy_weight"),
            weight: num("weight"),
            trial_win: flag("trial_win"),
        }
    }

    /// Fill market signals from live odds when the aggregator did not
    pub fn with_odds(mut self, win_odds: Option<f64>) -> Self {
        if let Some(odds) = win_odds.filter(|o| o.is_finite() && *o > 1.0) {
            self.current_odds.get_or_insert(odds);
            self.implied_prob.get_or_insert(1.0 / odds);
            self.odds_available.get_or_insert(true);
        }
        self
    }

    /// Decimal odds to use for market-aware steps
    pub fn odds(&self) -> Option<f64> {
        self.current_odds.filter(|o| o.is_finite() && *o > 1.0)
    }
}

/// Data completeness factors feeding the confidence estimate
pub(crate) fn completeness_factors(features: &EntrantFeatures) -> [f64; 5] {
    let flag = |v: Option<bool>, default: f64| {
        v.map(|b| if b { 1.0 } else { 0.0 }).unwrap_or(default)
    };
    [
        flag(features.form_available, 0.0),
        if features.track_experience.unwrap_or(0.0) > 0.0 { 1.0 } else { 0.5 },
        flag(features.odds_available, 0.0),
        if features.jockey_score.unwrap_or(50.0) > 40.0 { 1.0 } else { 0.6 },
        flag(features.vet_clear, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureValue;

    fn raw(pairs: &[(&str, FeatureValue)]) -> RawFeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_from_raw_resolves_known_keys() {
        let map = raw(&[
            ("last_5_avg", FeatureValue::Number(2.4)),
            ("first_up_flag", FeatureValue::Flag(true)),
            ("jockey", FeatureValue::Text("Z Purton".into())),
            ("mystery_signal", FeatureValue::Number(9.0)),
        ]);
        let features = EntrantFeatures::from_raw(&map);
        assert_eq!(features.last_5_avg, Some(2.4));
        assert_eq!(features.first_up, Some(true));
        assert_eq!(features.jockey_score, None);
    }

    #[test]
    fn test_wrong_type_is_absent() {
        let map = raw(&[("track_score", FeatureValue::Text("good".into()))]);
        assert_eq!(EntrantFeatures::from_raw(&map).track_score, None);
    }

    #[test]
    fn test_with_odds_fills_market_signals() {
        let features = EntrantFeatures::default().with_odds(Some(4.0));
        assert_eq!(features.current_odds, Some(4.0));
        assert_eq!(features.implied_prob, Some(0.25));
        assert_eq!(features.odds_available, Some(true));

        // Supplied values win
        let features = EntrantFeatures {
            implied_prob: Some(0.3),
            ..Default::default()
        }
        .with_odds(Some(4.0));
        assert_eq!(features.implied_prob, Some(0.3));

        // Invalid odds ignored
        let features = EntrantFeatures::default().with_odds(Some(0.9));
        assert_eq!(features.odds(), None);
    }

    #[test]
    fn test_completeness_defaults() {
        let factors = completeness_factors(&EntrantFeatures::default());
        assert_eq!(factors, [0.0, 0.5, 0.0, 1.0, 1.0]);
    }
}
