//! Error types for the prediction engine

use thiserror::Error;

/// Engine error taxonomy
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown calibration method, weights that do not sum to 1.0, bad config file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Nothing to score, fit or validate against
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Odds or probability outside the domain of a strict primitive
    #[error("Value out of range: {0}")]
    Range(String),

    /// Unknown bet or invalid ledger transition
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Internal(format!("worker task failed: {err}"))
    }
}

impl EngineError {
    /// Whether the error is scoped to a single entrant and the batch may continue
    pub fn is_entrant_scoped(&self) -> bool {
        matches!(self, EngineError::InsufficientData(_) | EngineError::Range(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
