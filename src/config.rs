//! Configuration loading
//!
//! Values come from a TOML file, overridden by `RACING_EDGE__SECTION__KEY`
//! environment variables (a `.env` file is honoured).

use crate::error::{EngineError, Result};
use crate::ml::calibration::CalibrationMethod;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// Tolerance for component weights summing to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub place: PlaceConfig,
    #[serde(default)]
    pub value: ValueConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from file and environment, then validate it
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("RACING_EDGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ensemble.weights.validate()?;
        self.calibration.validate()?;
        self.place.validate()
    }
}

/// Weights of the five component predictors
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ComponentWeights {
    #[serde(default = "default_form_weight")]
    pub form: f64,
    #[serde(default = "default_track_weight")]
    pub track: f64,
    #[serde(default = "default_market_weight")]
    pub market: f64,
    #[serde(default = "default_human_weight")]
    pub human: f64,
    #[serde(default = "default_health_weight")]
    pub health: f64,
}

fn default_form_weight() -> f64 {
    0.30
}

fn default_track_weight() -> f64 {
    0.25
}

fn default_market_weight() -> f64 {
    0.20
}

fn default_human_weight() -> f64 {
    0.15
}

fn default_health_weight() -> f64 {
    0.10
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            form: default_form_weight(),
            track: default_track_weight(),
            market: default_market_weight(),
            human: default_human_weight(),
            health: default_health_weight(),
        }
    }
}

impl ComponentWeights {
    pub fn sum(&self) -> f64 {
        self.form + self.track + self.market + self.human + self.health
    }

    /// Weights must be non-negative and sum to 1.0 within tolerance
    pub fn validate(&self) -> Result<()> {
        let all = [self.form, self.track, self.market, self.human, self.health];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::Configuration(format!(
                "component weights must be non-negative, got {all:?}"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Configuration(format!(
                "component weights must sum to 1.0, got {sum:.4}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub weights: ComponentWeights,
}

/// Calibration transform selection and post-transform adjustments
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub method: CalibrationMethod,
    #[serde(default = "default_power_exponent")]
    pub power_exponent: f64,
    #[serde(default = "default_logit_shift")]
    pub logit_shift: f64,
    #[serde(default = "default_market_blend")]
    pub market_weight: f64,
    #[serde(default = "default_favorite_threshold")]
    pub favorite_threshold: f64,
    #[serde(default = "default_favorite_compression")]
    pub favorite_compression: f64,
    #[serde(default = "default_longshot_threshold")]
    pub longshot_threshold: f64,
    #[serde(default = "default_longshot_boost")]
    pub longshot_boost: f64,
    #[serde(default = "default_min_probability")]
    pub min_probability: f64,
    #[serde(default = "default_max_probability")]
    pub max_probability: f64,
    /// Batch sum above which probabilities get compressed
    #[serde(default = "default_renorm_trigger")]
    pub renorm_trigger: f64,
    #[serde(default = "default_renorm_scale")]
    pub renorm_scale: f64,
    #[serde(default = "default_renorm_floor")]
    pub renorm_floor: f64,
    #[serde(default = "default_renorm_ceiling")]
    pub renorm_ceiling: f64,
    /// Where the fitted calibration model is persisted
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

fn default_power_exponent() -> f64 {
    0.75
}

fn default_logit_shift() -> f64 {
    -0.8
}

fn default_market_blend() -> f64 {
    0.3
}

fn default_favorite_threshold() -> f64 {
    0.35
}

fn default_favorite_compression() -> f64 {
    0.15
}

fn default_longshot_threshold() -> f64 {
    0.08
}

fn default_longshot_boost() -> f64 {
    0.08
}

fn default_min_probability() -> f64 {
    0.005
}

fn default_max_probability() -> f64 {
    0.95
}

fn default_renorm_trigger() -> f64 {
    1.3
}

fn default_renorm_scale() -> f64 {
    0.9
}

fn default_renorm_floor() -> f64 {
    0.7
}

fn default_renorm_ceiling() -> f64 {
    1.0
}

fn default_model_path() -> PathBuf {
    PathBuf::from("calibration_model.json")
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            method: CalibrationMethod::default(),
            power_exponent: default_power_exponent(),
            logit_shift: default_logit_shift(),
            market_weight: default_market_blend(),
            favorite_threshold: default_favorite_threshold(),
            favorite_compression: default_favorite_compression(),
            longshot_threshold: default_longshot_threshold(),
            longshot_boost: default_longshot_boost(),
            min_probability: default_min_probability(),
            max_probability: default_max_probability(),
            renorm_trigger: default_renorm_trigger(),
            renorm_scale: default_renorm_scale(),
            renorm_floor: default_renorm_floor(),
            renorm_ceiling: default_renorm_ceiling(),
            model_path: default_model_path(),
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.min_probability)
            || !(0.0..=1.0).contains(&self.max_probability)
            || self.min_probability >= self.max_probability
        {
            return Err(EngineError::Configuration(format!(
                "invalid probability bounds [{}, {}]",
                self.min_probability, self.max_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.market_weight) {
            return Err(EngineError::Configuration(format!(
                "market weight must be in [0, 1], got {}",
                self.market_weight
            )));
        }
        if self.power_exponent <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "power exponent must be positive, got {}",
                self.power_exponent
            )));
        }
        if self.renorm_floor > self.renorm_ceiling {
            return Err(EngineError::Configuration(format!(
                "renormalization floor {} exceeds ceiling {}",
                self.renorm_floor, self.renorm_ceiling
            )));
        }
        Ok(())
    }
}

/// Place probability blend
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceConfig {
    #[serde(default = "default_place_win_weight")]
    pub win_weight: f64,
    #[serde(default = "default_place_consistency_weight")]
    pub consistency_weight: f64,
    #[serde(default = "default_place_form_weight")]
    pub form_weight: f64,
    #[serde(default = "default_place_lower_multiplier")]
    pub lower_multiplier: f64,
    #[serde(default = "default_place_upper_multiplier")]
    pub upper_multiplier: f64,
    #[serde(default = "default_place_cap")]
    pub upper_cap: f64,
}

fn default_place_win_weight() -> f64 {
    0.40
}

fn default_place_consistency_weight() -> f64 {
    0.35
}

fn default_place_form_weight() -> f64 {
    0.25
}

fn default_place_lower_multiplier() -> f64 {
    1.5
}

fn default_place_upper_multiplier() -> f64 {
    4.0
}

fn default_place_cap() -> f64 {
    0.85
}

impl Default for PlaceConfig {
    fn default() -> Self {
        Self {
            win_weight: default_place_win_weight(),
            consistency_weight: default_place_consistency_weight(),
            form_weight: default_place_form_weight(),
            lower_multiplier: default_place_lower_multiplier(),
            upper_multiplier: default_place_upper_multiplier(),
            upper_cap: default_place_cap(),
        }
    }
}

impl PlaceConfig {
    pub fn validate(&self) -> Result<()> {
        let sum = self.win_weight + self.consistency_weight + self.form_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Configuration(format!(
                "place weights must sum to 1.0, got {sum:.4}"
            )));
        }
        Ok(())
    }
}

/// Value and market analysis thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ValueConfig {
    #[serde(default = "default_undervalued")]
    pub undervalued_threshold: f64,
    #[serde(default = "default_overvalued")]
    pub overvalued_threshold: f64,
    /// Relative odds change treated as a real move
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
    /// Single-step relative move counted as a sharp move
    #[serde(default = "default_sharp_move")]
    pub sharp_move_threshold: f64,
    /// Value percentage points treated as a real shift
    #[serde(default = "default_value_shift")]
    pub value_shift_threshold: f64,
    #[serde(default = "default_favourite_odds")]
    pub favourite_odds: f64,
    #[serde(default = "default_spread_ratio")]
    pub expected_place_ratio: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_undervalued() -> f64 {
    0.05
}

fn default_overvalued() -> f64 {
    -0.05
}

fn default_movement_threshold() -> f64 {
    0.10
}

fn default_sharp_move() -> f64 {
    0.15
}

fn default_value_shift() -> f64 {
    5.0
}

fn default_favourite_odds() -> f64 {
    3.5
}

fn default_spread_ratio() -> f64 {
    0.35
}

fn default_top_n() -> usize {
    3
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            undervalued_threshold: default_undervalued(),
            overvalued_threshold: default_overvalued(),
            movement_threshold: default_movement_threshold(),
            sharp_move_threshold: default_sharp_move(),
            value_shift_threshold: default_value_shift(),
            favourite_odds: default_favourite_odds(),
            expected_place_ratio: default_spread_ratio(),
            top_n: default_top_n(),
        }
    }
}

/// Bankroll and Kelly sizing
#[derive(Debug, Clone, Deserialize)]
pub struct StakingConfig {
    #[serde(default = "default_bankroll")]
    pub bankroll: Decimal,
    /// Fraction of full Kelly to stake
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
    #[serde(default = "default_min_bet")]
    pub min_bet: Decimal,
    /// Largest stake as a share of bankroll
    #[serde(default = "default_max_bet_pct")]
    pub max_bet_pct: Decimal,
    #[serde(default = "default_adaptive_min")]
    pub adaptive_min_fraction: f64,
    #[serde(default = "default_adaptive_max")]
    pub adaptive_max_fraction: f64,
    /// Resolved bets needed before the adaptive multiplier kicks in
    #[serde(default = "default_adaptive_history")]
    pub adaptive_min_history: usize,
}

fn default_bankroll() -> Decimal {
    dec!(1000)
}

fn default_kelly_fraction() -> f64 {
    0.25
}

fn default_min_bet() -> Decimal {
    dec!(10)
}

fn default_max_bet_pct() -> Decimal {
    dec!(0.25)
}

fn default_adaptive_min() -> f64 {
    0.05
}

fn default_adaptive_max() -> f64 {
    0.25
}

fn default_adaptive_history() -> usize {
    5
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            bankroll: default_bankroll(),
            kelly_fraction: default_kelly_fraction(),
            min_bet: default_min_bet(),
            max_bet_pct: default_max_bet_pct(),
            adaptive_min_fraction: default_adaptive_min(),
            adaptive_max_fraction: default_adaptive_max(),
            adaptive_min_history: default_adaptive_history(),
        }
    }
}

/// Accuracy verification, drift and health thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_model_version")]
    pub model_version: String,
    #[serde(default = "default_win_rate_critical")]
    pub win_rate_critical: f64,
    #[serde(default = "default_win_rate_warning")]
    pub win_rate_warning: f64,
    #[serde(default = "default_roi_critical")]
    pub roi_critical: f64,
    #[serde(default = "default_roi_warning")]
    pub roi_warning: f64,
    #[serde(default = "default_calibration_warning")]
    pub calibration_error_warning: f64,
    #[serde(default = "default_position_error_warning")]
    pub position_error_warning: f64,
    #[serde(default = "default_drift_window")]
    pub drift_window: usize,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    /// Samples needed before confidence/accuracy correlation is reported
    #[serde(default = "default_correlation_samples")]
    pub min_correlation_samples: usize,
    /// Days of history the health check looks at
    #[serde(default = "default_health_days")]
    pub health_window_days: i64,
}

fn default_model_version() -> String {
    "v1".to_string()
}

fn default_win_rate_critical() -> f64 {
    0.10
}

fn default_win_rate_warning() -> f64 {
    0.15
}

fn default_roi_critical() -> f64 {
    -0.20
}

fn default_roi_warning() -> f64 {
    -0.10
}

fn default_calibration_warning() -> f64 {
    0.15
}

fn default_position_error_warning() -> f64 {
    3.0
}

fn default_drift_window() -> usize {
    7
}

fn default_drift_threshold() -> f64 {
    0.1
}

fn default_correlation_samples() -> usize {
    10
}

fn default_health_days() -> i64 {
    30
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            model_version: default_model_version(),
            win_rate_critical: default_win_rate_critical(),
            win_rate_warning: default_win_rate_warning(),
            roi_critical: default_roi_critical(),
            roi_warning: default_roi_warning(),
            calibration_error_warning: default_calibration_warning(),
            position_error_warning: default_position_error_warning(),
            drift_window: default_drift_window(),
            drift_threshold: default_drift_threshold(),
            min_correlation_samples: default_correlation_samples(),
            health_window_days: default_health_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://racing_edge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}
