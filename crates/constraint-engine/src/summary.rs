use constraint_core::{ConstraintPosition, ConstraintType, PositionStatus};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dashboard totals over a reconciled constraint position list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSummary {
    pub total_entries: usize,
    pub positions: usize,
    pub watching: usize,
    pub individual: usize,
    pub group: usize,
    pub active: usize,
    pub total_market_value: f64,
    pub total_cost_basis: f64,
    pub total_unrealized_pnl: f64,
    pub total_unrealized_pnl_percent: f64,
}

pub fn summarize(entries: &[ConstraintPosition]) -> ConstraintSummary {
    let mut summary = ConstraintSummary {
        total_entries: entries.len(),
        ..Default::default()
    };
    let mut total_value = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;

    for entry in entries {
        match entry.figures.status {
            PositionStatus::Position => summary.positions += 1,
            PositionStatus::Watching => summary.watching += 1,
        }
        match entry.constraint_type {
            ConstraintType::Individual => summary.individual += 1,
            ConstraintType::Group => summary.group += 1,
        }
        if entry.is_active {
            summary.active += 1;
        }

        total_value += Decimal::from_f64(entry.figures.market_value).unwrap_or_default();
        total_cost += Decimal::from_f64(entry.figures.cost_basis()).unwrap_or_default();
    }

    let total_pnl = total_value - total_cost;
    summary.total_market_value = total_value.to_f64().unwrap_or(0.0);
    summary.total_cost_basis = total_cost.to_f64().unwrap_or(0.0);
    summary.total_unrealized_pnl = total_pnl.to_f64().unwrap_or(0.0);
    summary.total_unrealized_pnl_percent = if total_cost > Decimal::ZERO {
        ((total_pnl / total_cost) * Decimal::from(100)).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, ReconcileInputs};
    use crate::fixtures::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_totals() {
        let mut paused = group(2, "Paused", &["KO"], &[]);
        paused.is_active = false;
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "AAPL"), constraint(2, "MSFT")],
            constraint_groups: vec![paused],
            positions: vec![
                position("AAPL", 10.0, 100.0, 110.0),
                position("KO", 20.0, 60.0, 57.0),
            ],
            ..Default::default()
        };

        let summary = summarize(&aggregate(&inputs));
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.positions, 2);
        assert_eq!(summary.watching, 1);
        assert_eq!(summary.individual, 2);
        assert_eq!(summary.group, 1);
        assert_eq!(summary.active, 2);

        // 1100 + 1140 against 1000 + 1200
        assert_eq!(summary.total_market_value, 2240.0);
        assert_eq!(summary.total_cost_basis, 2200.0);
        assert_eq!(summary.total_unrealized_pnl, 40.0);
        let expected = (dec!(40) / dec!(2200) * dec!(100)).to_f64().unwrap();
        assert_eq!(summary.total_unrealized_pnl_percent, expected);
    }

    #[test]
    fn test_empty_summary_has_zero_percent() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_entries, 0);
        assert_eq!(summary.total_unrealized_pnl_percent, 0.0);
    }
}
