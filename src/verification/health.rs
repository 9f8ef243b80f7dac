//! Model health check

use super::metrics::AccuracyMetrics;
use crate::config::VerificationConfig;
use crate::types::HealthStatus;
use serde::Serialize;

/// Health of the model over a window. Never an error: missing data and
/// store failures are states of their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum HealthOutcome {
    Healthy {
        metrics: AccuracyMetrics,
    },
    Degraded {
        status: HealthStatus,
        metrics: AccuracyMetrics,
        reasons: Vec<String>,
    },
    /// No validated predictions in the window
    Empty,
}

impl HealthOutcome {
    /// `Empty` reports as a warning: nothing has been verified
    pub fn status(&self) -> HealthStatus {
        match self {
            HealthOutcome::Healthy { .. } => HealthStatus::Healthy,
            HealthOutcome::Degraded { status, .. } => *status,
            HealthOutcome::Empty => HealthStatus::Warning,
        }
    }

    pub fn metrics(&self) -> Option<&AccuracyMetrics> {
        match self {
            HealthOutcome::Healthy { metrics } | HealthOutcome::Degraded { metrics, .. } => {
                Some(metrics)
            }
            HealthOutcome::Empty => None,
        }
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            HealthOutcome::Degraded { reasons, .. } => reasons,
            _ => &[],
        }
    }

    /// Critical outcome for a store that could not be read
    pub fn unavailable(reason: impl Into<String>) -> Self {
        HealthOutcome::Degraded {
            status: HealthStatus::Critical,
            metrics: AccuracyMetrics::default(),
            reasons: vec![reason.into()],
        }
    }
}

/// Apply the health thresholds to a metrics snapshot
pub fn assess_health(metrics: AccuracyMetrics, config: &VerificationConfig) -> HealthOutcome {
    if metrics.total_predictions == 0 {
        return HealthOutcome::Empty;
    }

    let mut status = HealthStatus::Healthy;
    let mut reasons = Vec::new();
    let mut flag = |level: HealthStatus, reason: String| {
        status = status.max(level);
        reasons.push(reason);
    };

    if metrics.win_rate < config.win_rate_critical {
        flag(
            HealthStatus::Critical,
            format!("Win rate below {:.0}%", config.win_rate_critical * 100.0),
        );
    } else if metrics.win_rate < config.win_rate_warning {
        flag(
            HealthStatus::Warning,
            format!("Win rate below {:.0}%", config.win_rate_warning * 100.0),
        );
    }

    if metrics.roi < config.roi_critical {
        flag(HealthStatus::Critical, format!("ROI below {:.0}%", config.roi_critical * 100.0));
    } else if metrics.roi < config.roi_warning {
        flag(HealthStatus::Warning, format!("ROI below {:.0}%", config.roi_warning * 100.0));
    }

    if metrics.calibration_error > config.calibration_error_warning {
        flag(HealthStatus::Warning, "Poor probability calibration".to_string());
    }
    if metrics.avg_position_error > config.position_error_warning {
        flag(HealthStatus::Warning, "High average position error".to_string());
    }

    if reasons.is_empty() {
        HealthOutcome::Healthy { metrics }
    } else {
        HealthOutcome::Degraded {
            status,
            metrics,
            reasons,
        }
    }
}
