//! Component predictors
//!
//! Five independent views of an entrant (form, track, market, human, health).
//! Each one folds a handful of sub-factors into a 0-100 score and maps it to a
//! probability with a logistic curve centred on 50.

use super::features::EntrantFeatures;
use crate::config::ComponentWeights;
use serde::{Deserialize, Serialize};

/// Fallback values for missing signals, one table per predictor
pub mod defaults {
    pub mod form {
        pub const LAST_5_AVG: f64 = 8.0;
        pub const CONSISTENCY_SCORE: f64 = 50.0;
        pub const MOMENTUM_SCORE: f64 = 50.0;
        pub const WIN_RATE: f64 = 0.0;
    }

    pub mod track {
        pub const TRACK_SCORE: f64 = 50.0;
        pub const DISTANCE_SCORE: f64 = 50.0;
        pub const TRACK_DISTANCE_SYNERGY: f64 = 50.0;
        pub const DRAW_SCORE: f64 = 50.0;
    }

    pub mod market {
        pub const ODDS_SCORE: f64 = 50.0;
        pub const MARKET_SUPPORT: f64 = 0.0;
        pub const IMPLIED_PROB: f64 = 0.10;
    }

    pub mod human {
        pub const JOCKEY_SCORE: f64 = 50.0;
        pub const TRAINER_SCORE: f64 = 50.0;
        pub const JT_SYNERGY_SCORE: f64 = 50.0;
    }

    pub mod health {
        pub const FITNESS_HEALTH_SCORE: f64 = 70.0;
        pub const PREPARATION_SCORE: f64 = 50.0;
        pub const FIRST_UP: bool = false;
        pub const WEIGHT_SCORE: f64 = 70.0;
    }
}

/// Which view of the entrant a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Form,
    Track,
    Market,
    Human,
    Health,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Form,
        ComponentKind::Track,
        ComponentKind::Market,
        ComponentKind::Human,
        ComponentKind::Health,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Form => "form",
            ComponentKind::Track => "track",
            ComponentKind::Market => "market",
            ComponentKind::Human => "human",
            ComponentKind::Health => "health",
        }
    }

    pub fn weight_in(&self, weights: &ComponentWeights) -> f64 {
        match self {
            ComponentKind::Form => weights.form,
            ComponentKind::Track => weights.track,
            ComponentKind::Market => weights.market,
            ComponentKind::Human => weights.human,
            ComponentKind::Health => weights.health,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One sub-factor contributing to a component score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    pub name: &'static str,
    pub value: f64,
    pub weight: f64,
    /// True when the value came from the default table
    pub imputed: bool,
}

/// Output of a single component predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentPrediction {
    pub component: ComponentKind,
    /// 0-100
    pub score: f64,
    pub probability: f64,
    pub weight: f64,
    pub details: Vec<SubScore>,
}

/// Logistic map from a 0-100 score to a probability
pub fn score_to_probability(score: f64) -> f64 {
    sigmoid((score - 50.0) / 10.0)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A component predictor. Returns `None` when none of its signals are present.
pub trait ComponentPredictor: Send + Sync {
    fn kind(&self) -> ComponentKind;

    fn weight(&self) -> f64;

    fn predict(&self, features: &EntrantFeatures) -> Option<ComponentPrediction>;
}

struct Factor {
    name: &'static str,
    value: Option<f64>,
    default: f64,
    weight: f64,
}

fn factor(name: &'static str, value: Option<f64>, default: f64, weight: f64) -> Factor {
    Factor {
        name,
        value,
        default,
        weight,
    }
}

fn combine(kind: ComponentKind, weight: f64, factors: &[Factor]) -> Option<ComponentPrediction> {
    if factors.iter().all(|f| f.value.is_none()) {
        return None;
    }

    let details: Vec<SubScore> = factors
        .iter()
        .map(|f| SubScore {
            name: f.name,
            value: f.value.unwrap_or(f.default),
            weight: f.weight,
            imputed: f.value.is_none(),
        })
        .collect();

    let score = details
        .iter()
        .map(|d| d.value * d.weight)
        .sum::<f64>()
        .clamp(0.0, 100.0);

    Some(ComponentPrediction {
        component: kind,
        score,
        probability: score_to_probability(score),
        weight,
        details,
    })
}

/// Recent results, consistency and momentum
pub struct FormPredictor {
    weight: f64,
}

impl FormPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl ComponentPredictor for FormPredictor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Form
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predict(&self, f: &EntrantFeatures) -> Option<ComponentPrediction> {
        use defaults::form::*;
        let recent = |avg: f64| (100.0 - avg * 10.0).max(0.0);
        combine(
            self.kind(),
            self.weight,
            &[
                factor("recent_form", f.last_5_avg.map(recent), recent(LAST_5_AVG), 0.40),
                factor("consistency", f.consistency_score, CONSISTENCY_SCORE, 0.20),
                factor("momentum", f.momentum_score, MOMENTUM_SCORE, 0.20),
                factor("win_rate", f.win_rate.map(|r| r * 100.0), WIN_RATE * 100.0, 0.20),
            ],
        )
    }
}

/// Course, distance and barrier suitability
pub struct TrackPredictor {
    weight: f64,
}

impl TrackPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl ComponentPredictor for TrackPredictor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Track
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predict(&self, f: &EntrantFeatures) -> Option<ComponentPrediction> {
        use defaults::track::*;
        combine(
            self.kind(),
            self.weight,
            &[
                factor("track", f.track_score, TRACK_SCORE, 0.35),
                factor("distance", f.distance_score, DISTANCE_SCORE, 0.35),
                factor(
                    "track_distance_synergy",
                    f.track_distance_synergy,
                    TRACK_DISTANCE_SYNERGY,
                    0.20,
                ),
                factor("draw", f.draw_score, DRAW_SCORE, 0.10),
            ],
        )
    }
}

/// What the betting market thinks
pub struct MarketPredictor {
    weight: f64,
}

impl MarketPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl ComponentPredictor for MarketPredictor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Market
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predict(&self, f: &EntrantFeatures) -> Option<ComponentPrediction> {
        use defaults::market::*;
        combine(
            self.kind(),
            self.weight,
            &[
                factor("odds", f.odds_score, ODDS_SCORE, 0.50),
                factor(
                    "market_support",
                    f.market_support.map(|s| 50.0 + s),
                    50.0 + MARKET_SUPPORT,
                    0.30,
                ),
                factor(
                    "implied_probability",
                    f.implied_prob.map(|p| p * 100.0),
                    IMPLIED_PROB * 100.0,
                    0.20,
                ),
            ],
        )
    }
}

/// Jockey, trainer and their combination
pub struct HumanPredictor {
    weight: f64,
}

impl HumanPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl ComponentPredictor for HumanPredictor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Human
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predict(&self, f: &EntrantFeatures) -> Option<ComponentPrediction> {
        use defaults::human::*;
        combine(
            self.kind(),
            self.weight,
            &[
                factor("jockey", f.jockey_score, JOCKEY_SCORE, 0.35),
                factor("trainer", f.trainer_score, TRAINER_SCORE, 0.35),
                factor("jockey_trainer_synergy", f.jt_synergy_score, JT_SYNERGY_SCORE, 0.30),
            ],
        )
    }
}

/// Fitness, preparation and weight carried
pub struct HealthPredictor {
    weight: f64,
}

impl HealthPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl ComponentPredictor for HealthPredictor {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Health
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predict(&self, f: &EntrantFeatures) -> Option<ComponentPrediction> {
        use defaults::health::*;
        let freshness = |first_up: bool| if first_up { 65.0 } else { 75.0 };
        combine(
            self.kind(),
            self.weight,
            &[
                factor("fitness", f.fitness_health_score, FITNESS_HEALTH_SCORE, 0.35),
                factor("preparation", f.preparation_score, PREPARATION_SCORE, 0.30),
                factor("freshness", f.first_up.map(freshness), freshness(FIRST_UP), 0.20),
                factor("weight", f.weight_score, WEIGHT_SCORE, 0.15),
            ],
        )
    }
}

/// The standard five predictors with the given weights
pub fn standard_predictors(weights: &ComponentWeights) -> Vec<Box<dyn ComponentPredictor>> {
    vec![
        Box::new(FormPredictor::new(weights.form)),
        Box::new(TrackPredictor::new(weights.track)),
        Box::new(MarketPredictor::new(weights.market)),
        Box::new(HumanPredictor::new(weights.human)),
        Box::new(HealthPredictor::new(weights.health)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_score_to_probability_centre() {
        assert!(approx(score_to_probability(50.0), 0.5));
        assert!(score_to_probability(80.0) > 0.95);
        assert!(score_to_probability(20.0) < 0.05);
    }

    #[test]
    fn test_form_predictor_scores() {
        let features = EntrantFeatures {
            last_5_avg: Some(2.0),
            consistency_score: Some(70.0),
            momentum_score: Some(60.0),
            win_rate: Some(0.4),
            ..Default::default()
        };
        let pred = FormPredictor::new(0.3).predict(&features).unwrap();
        // 80*0.4 + 70*0.2 + 60*0.2 + 40*0.2
        assert!(approx(pred.score, 66.0));
        assert!(approx(pred.probability, sigmoid(1.6)));
        assert!(pred.details.iter().all(|d| !d.imputed));
    }

    #[test]
    fn test_form_recent_never_negative() {
        let features = EntrantFeatures {
            last_5_avg: Some(14.0),
            ..Default::default()
        };
        let pred = FormPredictor::new(0.3).predict(&features).unwrap();
        assert_eq!(pred.details[0].value, 0.0);
        // 0 + 50*0.2 + 50*0.2 + 0
        assert!(approx(pred.score, 20.0));
    }

    #[test]
    fn test_predictor_unavailable_without_signals() {
        let features = EntrantFeatures::default();
        for predictor in standard_predictors(&ComponentWeights::default()) {
            assert!(predictor.predict(&features).is_none(), "{}", predictor.kind());
        }
    }

    #[test]
    fn test_partial_signals_use_defaults() {
        let features = EntrantFeatures {
            jockey_score: Some(80.0),
            ..Default::default()
        };
        let pred = HumanPredictor::new(0.15).predict(&features).unwrap();
        // 80*0.35 + 50*0.35 + 50*0.30
        assert!(approx(pred.score, 60.5));
        assert_eq!(pred.details.iter().filter(|d| d.imputed).count(), 2);
    }

    #[test]
    fn test_market_predictor() {
        let features = EntrantFeatures {
            odds_score: Some(70.0),
            market_support: Some(10.0),
            implied_prob: Some(0.25),
            ..Default::default()
        };
        let pred = MarketPredictor::new(0.2).predict(&features).unwrap();
        // 70*0.5 + 60*0.3 + 25*0.2
        assert!(approx(pred.score, 58.0));
    }

    #[test]
    fn test_health_first_up_penalty() {
        let fresh = EntrantFeatures { first_up: Some(false), ..Default::default() };
        let first_up = EntrantFeatures { first_up: Some(true), ..Default::default() };
        let p = HealthPredictor::new(0.1);
        let a = p.predict(&fresh).unwrap().score;
        let b = p.predict(&first_up).unwrap().score;
        assert!(approx(a - b, 2.0));
    }

    #[test]
    fn test_track_score_clamped() {
        let features = EntrantFeatures {
            track_score: Some(400.0),
            distance_score: Some(400.0),
            ..Default::default()
        };
        let pred = TrackPredictor::new(0.25).predict(&features).unwrap();
        assert_eq!(pred.score, 100.0);
    }
}
