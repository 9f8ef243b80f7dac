//! Place (top three) probability

use super::features::EntrantFeatures;
use crate::config::PlaceConfig;

const DEFAULT_CONSISTENCY: f64 = 50.0;
const DEFAULT_PLACE_RATE: f64 = 0.25;

/// Derives a place probability from a calibrated win probability
#[derive(Debug, Clone, Default)]
pub struct PlaceDeriver {
    config: PlaceConfig,
}

impl PlaceDeriver {
    pub fn new(config: PlaceConfig) -> Self {
        Self { config }
    }

    /// Blend of win probability, consistency and historical place rate,
    /// clamped to `[1.5 * win, min(0.85, 4 * win)]`.
    ///
    /// When that interval is inverted (very short favourites) the upper bound
    /// applies, so the result never exceeds the cap.
    pub fn derive(&self, win: f64, features: &EntrantFeatures) -> f64 {
        let c = &self.config;
        let consistency = features.consistency_score.unwrap_or(DEFAULT_CONSISTENCY) / 100.0;
        let place_rate = features.place_rate.unwrap_or(DEFAULT_PLACE_RATE);

        let blended = win * c.win_weight
            + consistency * c.consistency_weight
            + place_rate * c.form_weight;

        let lower = win * c.lower_multiplier;
        let upper = c.upper_cap.min(win * c.upper_multiplier);
        blended.max(lower).min(upper)
    }
}
