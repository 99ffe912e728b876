//! Joins resolved triggers with live positions.

use constraint_core::{normalize_symbol, Position, PositionFigures, PositionStatus};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Positions keyed by normalized symbol. A later duplicate replaces an
/// earlier one.
pub struct PositionIndex<'a> {
    by_symbol: HashMap<String, &'a Position>,
}

impl<'a> PositionIndex<'a> {
    pub fn new(positions: &'a [Position]) -> Self {
        let by_symbol = positions
            .iter()
            .map(|p| (normalize_symbol(&p.stock_symbol), p))
            .collect();
        Self { by_symbol }
    }

    pub fn get(&self, symbol: &str) -> Option<&'a Position> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn figures(&self, symbol: &str) -> PositionFigures {
        join_position(self.get(symbol))
    }
}

/// Market value and unrealized P&L for a symbol. Without a position every
/// figure is zero and the symbol is only being watched.
pub fn join_position(position: Option<&Position>) -> PositionFigures {
    let Some(position) = position else {
        return PositionFigures::watching();
    };

    let quantity = Decimal::from_f64(position.quantity).unwrap_or_default();
    let average_cost = Decimal::from_f64(position.average_cost).unwrap_or_default();
    let current_price = Decimal::from_f64(position.current_price).unwrap_or_default();

    if quantity <= Decimal::ZERO {
        return PositionFigures {
            current_price: current_price.to_f64().unwrap_or(0.0),
            quantity: 0.0,
            average_cost: average_cost.to_f64().unwrap_or(0.0),
            ..PositionFigures::watching()
        };
    }

    let market_value = quantity * current_price;
    let cost_basis = quantity * average_cost;
    let unrealized_pnl = market_value - cost_basis;
    let unrealized_pnl_percent = if cost_basis > Decimal::ZERO {
        ((unrealized_pnl / cost_basis) * Decimal::from(100)).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };

    PositionFigures {
        current_price: current_price.to_f64().unwrap_or(0.0),
        quantity: quantity.to_f64().unwrap_or(0.0),
        average_cost: average_cost.to_f64().unwrap_or(0.0),
        market_value: market_value.to_f64().unwrap_or(0.0),
        unrealized_pnl: unrealized_pnl.to_f64().unwrap_or(0.0),
        unrealized_pnl_percent,
        status: PositionStatus::Position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::position;

    #[test]
    fn test_profitable_position() {
        let p = position("AAPL", 10.0, 100.0, 110.0);
        let figures = join_position(Some(&p));

        assert_eq!(figures.market_value, 1100.0);
        assert_eq!(figures.unrealized_pnl, 100.0);
        assert_eq!(figures.unrealized_pnl_percent, 10.0);
        assert_eq!(figures.status, PositionStatus::Position);
    }

    #[test]
    fn test_losing_position() {
        let p = position("TSLA", 4.0, 250.0, 200.0);
        let figures = join_position(Some(&p));

        assert_eq!(figures.market_value, 800.0);
        assert_eq!(figures.unrealized_pnl, -200.0);
        assert_eq!(figures.unrealized_pnl_percent, -20.0);
    }

    #[test]
    fn test_missing_position_is_watching() {
        let figures = join_position(None);
        assert_eq!(figures, PositionFigures::watching());
    }

    #[test]
    fn test_zero_quantity_has_zero_pnl() {
        let p = position("AAPL", 0.0, 150.0, 180.0);
        let figures = join_position(Some(&p));

        assert_eq!(figures.unrealized_pnl, 0.0);
        assert_eq!(figures.unrealized_pnl_percent, 0.0);
        assert_eq!(figures.market_value, 0.0);
        assert_eq!(figures.current_price, 180.0);
        assert_eq!(figures.status, PositionStatus::Watching);
    }

    #[test]
    fn test_zero_cost_basis_is_not_nan() {
        let p = position("GIFT", 5.0, 0.0, 20.0);
        let figures = join_position(Some(&p));

        assert_eq!(figures.market_value, 100.0);
        assert_eq!(figures.unrealized_pnl, 100.0);
        assert_eq!(figures.unrealized_pnl_percent, 0.0);
        assert!(figures.unrealized_pnl_percent.is_finite());
    }

    #[test]
    fn test_index_lookup_uses_normalized_symbol() {
        let positions = vec![position("aapl", 1.0, 10.0, 12.0)];
        let index = PositionIndex::new(&positions);

        assert_eq!(index.figures("AAPL").market_value, 12.0);
        assert_eq!(index.figures("MSFT").status, PositionStatus::Watching);
    }
}
