//! Prediction models
//!
//! - Typed feature resolution from aggregator output
//! - Five component predictors (form, track, market, human, health)
//! - Weighted ensemble with confidence and explanations
//! - Probability calibration (power law, logit shift, market blend)
//! - Offline calibration fitting by grid search
//! - Place probability derivation

pub mod calibration;
pub mod components;
pub mod ensemble;
pub mod features;
pub mod fitting;
pub mod place;

#[cfg(test)]
mod tests;

pub use calibration::{CalibrationHandle, CalibrationMethod, CalibrationModel, Calibrator};
pub use components::{ComponentKind, ComponentPrediction, ComponentPredictor};
pub use ensemble::{CombinedPrediction, EnsembleCombiner, Explanation, Verdict};
pub use features::EntrantFeatures;
pub use fitting::HistoricalEvent;
pub use place::PlaceDeriver;
