//! Racing Edge
//!
//! Win and place probability engine for race events, with value detection,
//! Kelly staking and prediction verification.
//!
//! ## Architecture
//!
//! ```text
//! EventCard → Features → Components (form/track/market/human/health)
//!                              ↓
//!                  Ensemble → Calibration → Place → Value → Staking
//!                              ↓
//!                  Prediction log (SQLite) ← Finishing positions
//!                              ↓
//!            Metrics / Drift / Health / Reports → Calibration refit
//! ```

pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod ml;
pub mod staking;
pub mod storage;
pub mod types;
pub mod value;
pub mod verification;

#[cfg(test)]
mod types_tests;
#[cfg(test)]
mod error_tests;
