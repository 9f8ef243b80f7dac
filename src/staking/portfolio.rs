//! Kelly allocation across several events

use super::{BetSizer, BetSizing};
use rust_decimal::Decimal;
use serde::Serialize;

/// An entrant eligible for the portfolio
#[derive(Debug, Clone)]
pub struct PortfolioCandidate {
    pub event_id: String,
    pub entrant_id: String,
    pub probability: f64,
    pub odds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioPosition {
    pub event_id: String,
    pub entrant_id: String,
    pub sizing: BetSizing,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    /// Highest expected value first
    pub positions: Vec<PortfolioPosition>,
    pub total_allocated: Decimal,
    /// Allocated share of bankroll, percent
    pub utilisation_percent: Decimal,
    pub expected_value: Decimal,
}

/// Size every candidate independently on the same bankroll and keep the
/// ones with a positive stake
pub fn optimize_portfolio(
    candidates: &[PortfolioCandidate],
    bankroll: Decimal,
    sizer: &BetSizer,
    fraction: f64,
) -> Portfolio {
    let mut positions: Vec<PortfolioPosition> = candidates
        .iter()
        .filter_map(|c| {
            let sizing = sizer.size_with_fraction(bankroll, c.probability, c.odds, fraction);
            (sizing.bet_amount > Decimal::ZERO).then(|| PortfolioPosition {
                event_id: c.event_id.clone(),
                entrant_id: c.entrant_id.clone(),
                sizing,
            })
        })
        .collect();
    positions.sort_by(|a, b| b.sizing.expected_value.cmp(&a.sizing.expected_value));

    let total_allocated: Decimal = positions.iter().map(|p| p.sizing.bet_amount).sum();
    let expected_value: Decimal = positions.iter().map(|p| p.sizing.expected_value).sum();
    let utilisation_percent = if bankroll > Decimal::ZERO {
        (total_allocated / bankroll * Decimal::ONE_HUNDRED).round_dp(1)
    } else {
        Decimal::ZERO
    };

    Portfolio {
        positions,
        total_allocated,
        utilisation_percent,
        expected_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candidate(event: &str, entrant: &str, probability: f64, odds: f64) -> PortfolioCandidate {
        PortfolioCandidate {
            event_id: event.to_string(),
            entrant_id: entrant.to_string(),
            probability,
            odds,
        }
    }

    #[test]
    fn test_portfolio_keeps_positive_kelly_sorted_by_ev() {
        let sizer = BetSizer::default();
        let candidates = vec![
            candidate("R1", "A", 0.4, 3.0),  // stake 25, EV 5
            candidate("R1", "B", 0.1, 4.0),  // negative Kelly
            candidate("R2", "C", 0.5, 3.0),  // full 0.25, stake 62.5, EV 31.25
        ];
        let portfolio = optimize_portfolio(&candidates, dec!(1000), &sizer, 0.25);

        assert_eq!(portfolio.positions.len(), 2);
        assert_eq!(portfolio.positions[0].entrant_id, "C");
        assert_eq!(portfolio.total_allocated, dec!(87.5));
        assert_eq!(portfolio.utilisation_percent, dec!(8.8));
    }

    #[test]
    fn test_empty_portfolio() {
        let portfolio = optimize_portfolio(&[], dec!(1000), &BetSizer::default(), 0.25);
        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.total_allocated, Decimal::ZERO);
    }
}
