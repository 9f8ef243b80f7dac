//! Market-wide views: consensus, win/place spread, contrarian plays

use super::{edge, PricedEntrant};
use crate::config::ValueConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FavouriteBias {
    Heavy,
    Moderate,
    Balanced,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketConsensus {
    pub bias: FavouriteBias,
    /// Share of entrants at or below favourite odds
    pub favourite_concentration: f64,
    /// `1 / (1 + std / 2)`
    pub confidence: f64,
    /// `max(0, 1 - std / (max - min))`
    pub strength: f64,
}

/// How concentrated the market is on its favourites. Needs 3+ valid prices.
pub fn market_consensus(odds: &[f64], config: &ValueConfig) -> MarketConsensus {
    let valid: Vec<f64> = odds.iter().copied().filter(|o| o.is_finite() && *o > 0.0).collect();
    if valid.len() < 3 {
        return MarketConsensus {
            bias: FavouriteBias::Unknown,
            favourite_concentration: 0.0,
            confidence: 0.0,
            strength: 0.0,
        };
    }

    let n = valid.len() as f64;
    let favourites = valid.iter().filter(|o| **o <= config.favourite_odds).count();
    let concentration = favourites as f64 / n;

    let mean = valid.iter().sum::<f64>() / n;
    let std = (valid.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / n).sqrt();
    let max = valid.iter().copied().fold(f64::MIN, f64::max);
    let min = valid.iter().copied().fold(f64::MAX, f64::min);

    let bias = if concentration > 0.4 {
        FavouriteBias::Heavy
    } else if concentration < 0.2 {
        FavouriteBias::Balanced
    } else {
        FavouriteBias::Moderate
    };

    // identical prices: perfect agreement
    let strength = if max > min { (1.0 - std / (max - min)).max(0.0) } else { 1.0 };

    MarketConsensus {
        bias,
        favourite_concentration: concentration,
        confidence: 1.0 / (1.0 + std / 2.0),
        strength,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadAnalysis {
    pub spread: f64,
    /// Relative deviation from the expected spread, capped at 1
    pub anomaly: f64,
    pub unusual: bool,
}

/// Win/place price spread against the expected `ratio * win_odds`
pub fn win_place_spread(
    win_odds: f64,
    place_odds: f64,
    config: &ValueConfig,
) -> Option<SpreadAnalysis> {
    if !(win_odds > 0.0 && place_odds > 0.0) {
        return None;
    }
    let spread = win_odds - place_odds;
    let expected = win_odds * config.expected_place_ratio;
    let anomaly = if expected != 0.0 { (spread - expected).abs() / expected } else { 0.0 };
    Some(SpreadAnalysis {
        spread,
        anomaly: anomaly.min(1.0),
        unusual: anomaly > 0.2,
    })
}

/// Entrant the model rates well above the market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContrarianPlay {
    pub entrant_id: String,
    pub model_probability: f64,
    pub market_odds: f64,
    pub implied_probability: f64,
    pub discrepancy: f64,
    pub expected_value: f64,
}

/// Entrants whose model probability beats the implied one by more than the
/// undervalued threshold, largest discrepancy first
pub fn contrarian_plays(entrants: &[PricedEntrant], config: &ValueConfig) -> Vec<ContrarianPlay> {
    let mut plays: Vec<ContrarianPlay> = entrants
        .iter()
        .filter_map(|e| {
            let odds = e.odds.filter(|o| *o > 0.0)?;
            let implied = 1.0 / odds;
            let discrepancy = e.probability - implied;
            (discrepancy > config.undervalued_threshold).then(|| ContrarianPlay {
                entrant_id: e.entrant_id.clone(),
                model_probability: e.probability,
                market_odds: odds,
                implied_probability: implied,
                discrepancy,
                expected_value: edge(e.probability, odds),
            })
        })
        .collect();
    plays.sort_by(|a, b| b.discrepancy.total_cmp(&a.discrepancy));
    plays
}
