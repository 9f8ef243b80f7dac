//! Odds movement over time

use crate::config::ValueConfig;
use crate::types::OddsSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MovementDirection {
    /// Odds coming in: money for the entrant
    Shortening,
    /// Odds going out: money against
    Drifting,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsMovement {
    pub direction: MovementDirection,
    /// `(oldest - latest) / oldest`; positive means shortening
    pub magnitude: f64,
    /// Share of single-step moves larger than the sharp-move threshold
    pub smart_money: f64,
}

impl OddsMovement {
    fn unknown() -> Self {
        Self {
            direction: MovementDirection::Unknown,
            magnitude: 0.0,
            smart_money: 0.0,
        }
    }
}

/// Win odds of a history in chronological order, invalid prices dropped
fn chronological_odds(history: &[OddsSnapshot]) -> Vec<f64> {
    let mut sorted: Vec<&OddsSnapshot> = history
        .iter()
        .filter(|s| s.win_odds.is_finite() && s.win_odds > 0.0)
        .collect();
    sorted.sort_by_key(|s| s.timestamp);
    sorted.into_iter().map(|s| s.win_odds).collect()
}

/// Compare the oldest and latest observation. Snapshots are sorted by
/// timestamp first, so arrival order does not matter.
pub fn analyze_movement(history: &[OddsSnapshot], config: &ValueConfig) -> OddsMovement {
    let odds = chronological_odds(history);
    if odds.len() < 2 {
        return OddsMovement::unknown();
    }
    let (oldest, latest) = (odds[0], odds[odds.len() - 1]);

    let magnitude = (oldest - latest) / oldest;
    let direction = if magnitude > config.movement_threshold {
        MovementDirection::Shortening
    } else if magnitude < -config.movement_threshold {
        MovementDirection::Drifting
    } else {
        MovementDirection::Stable
    };

    OddsMovement {
        direction,
        magnitude,
        smart_money: smart_money_score(&odds, config.sharp_move_threshold),
    }
}

/// Fraction of consecutive moves exceeding `threshold`; needs 3+ points
pub fn smart_money_score(odds: &[f64], threshold: f64) -> f64 {
    if odds.len() < 3 {
        return 0.0;
    }
    let moves: Vec<f64> = odds
        .windows(2)
        .map(|w| (w[1] - w[0]).abs() / w[0])
        .collect();
    let sharp = moves.iter().filter(|m| **m > threshold).count();
    (sharp as f64 / moves.len() as f64).min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueTrend {
    Improving,
    Deteriorating,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueShift {
    /// Current value in percent: `(odds * p - 1) * 100`
    pub current_value: f64,
    pub trend: ValueTrend,
    /// Current value minus historical mean, percentage points
    pub change: f64,
}

/// Has the value on offer improved against recent prices?
pub fn detect_value_shift(
    current_odds: f64,
    probability: f64,
    history: &[OddsSnapshot],
    config: &ValueConfig,
) -> ValueShift {
    let value_pct = |odds: f64| (odds * probability - 1.0) * 100.0;
    let current_value = value_pct(current_odds);

    let historical = chronological_odds(history);
    if historical.is_empty() {
        return ValueShift {
            current_value,
            trend: ValueTrend::Unknown,
            change: 0.0,
        };
    }

    let mean = historical.iter().map(|o| value_pct(*o)).sum::<f64>() / historical.len() as f64;
    let change = current_value - mean;
    let trend = if change > config.value_shift_threshold {
        ValueTrend::Improving
    } else if change < -config.value_shift_threshold {
        ValueTrend::Deteriorating
    } else {
        ValueTrend::Stable
    };

    ValueShift {
        current_value,
        trend,
        change,
    }
}

/// Entrant under the strongest price pressure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePressure {
    pub entrant_id: String,
    /// Positive for support, negative for resistance
    pub strength: f64,
}

/// Rank entrants by absolute odds movement; entrants need 3+ snapshots
pub fn pressure_ranking(history: &[OddsSnapshot], limit: usize) -> Vec<PricePressure> {
    let mut ids: Vec<&str> = history.iter().map(|s| s.entrant_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut ranking: Vec<PricePressure> = ids
        .into_iter()
        .filter_map(|id| {
            let own: Vec<OddsSnapshot> = history
                .iter()
                .filter(|s| s.entrant_id == id)
                .cloned()
                .collect();
            let odds = chronological_odds(&own);
            if odds.len() < 3 {
                return None;
            }
            let (oldest, latest) = (odds[0], odds[odds.len() - 1]);
            Some(PricePressure {
                entrant_id: id.to_string(),
                strength: (oldest - latest) / oldest,
            })
        })
        .collect();

    ranking.sort_by(|a, b| b.strength.abs().total_cmp(&a.strength.abs()));
    ranking.truncate(limit);
    ranking
}
