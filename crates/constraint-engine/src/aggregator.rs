//! Constraint position aggregation.
//!
//! Individual constraints are emitted first and win over any group that also
//! covers the same symbol. Groups are then walked in input order, active or
//! not, and contribute each expanded symbol that is still unclaimed. The
//! result is sorted held positions first, then watch-only entries, each
//! bucket alphabetical.

use constraint_core::{
    normalize_symbol, ConstraintGroup, ConstraintPosition, ConstraintType, Position, StockGroup,
    TradingConstraint,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::expander::{expand_stocks, StockGroupIndex};
use crate::joiner::PositionIndex;
use crate::triggers::{resolve_group, resolve_individual};

/// Everything one reconciliation pass reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileInputs {
    pub constraints: Vec<TradingConstraint>,
    pub constraint_groups: Vec<ConstraintGroup>,
    pub stock_groups: Vec<StockGroup>,
    pub positions: Vec<Position>,
}

pub fn aggregate(inputs: &ReconcileInputs) -> Vec<ConstraintPosition> {
    let positions = PositionIndex::new(&inputs.positions);
    let stock_groups = StockGroupIndex::new(&inputs.stock_groups);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<ConstraintPosition> = Vec::new();

    for constraint in &inputs.constraints {
        let symbol = normalize_symbol(&constraint.stock_symbol);
        if symbol.is_empty() || !seen.insert(symbol.clone()) {
            continue;
        }
        out.push(ConstraintPosition {
            figures: positions.figures(&symbol),
            stock_symbol: symbol,
            constraint_type: ConstraintType::Individual,
            constraint_name: None,
            constraint_id: constraint.id,
            is_active: constraint.is_active,
            triggers: resolve_individual(constraint),
        });
    }

    for group in &inputs.constraint_groups {
        for symbol in expand_stocks(group, &stock_groups) {
            if seen.contains(&symbol) {
                continue;
            }
            out.push(ConstraintPosition {
                figures: positions.figures(&symbol),
                triggers: resolve_group(group, &symbol),
                constraint_type: ConstraintType::Group,
                constraint_name: Some(group.name.clone()),
                constraint_id: group.id,
                is_active: group.is_active,
                stock_symbol: symbol.clone(),
            });
            seen.insert(symbol);
        }
    }

    sort_constraint_positions(&mut out);
    out
}

/// Held positions before watch-only entries, alphabetical within each.
pub fn sort_constraint_positions(entries: &mut [ConstraintPosition]) {
    entries.sort_by(|a, b| {
        a.status()
            .cmp(&b.status())
            .then_with(|| a.stock_symbol.cmp(&b.stock_symbol))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use constraint_core::{PositionStatus, TriggerOverride};

    fn symbols(entries: &[ConstraintPosition]) -> Vec<&str> {
        entries.iter().map(|e| e.stock_symbol.as_str()).collect()
    }

    #[test]
    fn test_positions_sort_before_watching() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "MSFT"), constraint(2, "AAPL"), constraint(3, "GOOG")],
            positions: vec![
                position("AAPL", 10.0, 100.0, 110.0),
                position("GOOG", 2.0, 90.0, 95.0),
            ],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(symbols(&out), vec!["AAPL", "GOOG", "MSFT"]);
        assert_eq!(out[0].status(), PositionStatus::Position);
        assert_eq!(out[1].status(), PositionStatus::Position);
        assert_eq!(out[2].status(), PositionStatus::Watching);
    }

    #[test]
    fn test_individual_wins_over_group() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "AAPL")],
            constraint_groups: vec![group(7, "Tech", &["AAPL", "MSFT"], &[])],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out.len(), 2);

        let aapl = out.iter().find(|e| e.stock_symbol == "AAPL").unwrap();
        assert_eq!(aapl.constraint_type, ConstraintType::Individual);
        assert_eq!(aapl.constraint_name, None);
        assert_eq!(aapl.triggers, triggers());

        let msft = out.iter().find(|e| e.stock_symbol == "MSFT").unwrap();
        assert_eq!(msft.constraint_type, ConstraintType::Group);
        assert_eq!(msft.constraint_name.as_deref(), Some("Tech"));
        assert_eq!(msft.constraint_id, Some(7));
    }

    #[test]
    fn test_individual_wins_over_stock_group_member() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "NVDA")],
            constraint_groups: vec![group(7, "Semis", &[], &[3])],
            stock_groups: vec![stock_group(3, "Chips", &["NVDA", "AMD"])],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        let nvda: Vec<_> = out.iter().filter(|e| e.stock_symbol == "NVDA").collect();
        assert_eq!(nvda.len(), 1);
        assert_eq!(nvda[0].constraint_type, ConstraintType::Individual);
        assert_eq!(symbols(&out), vec!["AMD", "NVDA"]);
    }

    #[test]
    fn test_first_group_claims_shared_symbol() {
        let inputs = ReconcileInputs {
            constraint_groups: vec![
                group(1, "Growth", &["AAPL"], &[]),
                group(2, "Value", &["AAPL", "KO"], &[]),
            ],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out.len(), 2);
        let aapl = out.iter().find(|e| e.stock_symbol == "AAPL").unwrap();
        assert_eq!(aapl.constraint_name.as_deref(), Some("Growth"));
    }

    #[test]
    fn test_group_entries_use_overrides() {
        let mut g = group(1, "Tech", &["AAPL", "MSFT"], &[]);
        g.triggers.buy_trigger_percent = -5.0;
        g.triggers.buy_amount = 1000.0;
        g.stock_overrides.insert(
            "AAPL".to_string(),
            TriggerOverride {
                buy_amount: Some(2000.0),
                ..Default::default()
            },
        );
        let inputs = ReconcileInputs {
            constraint_groups: vec![g],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out[0].stock_symbol, "AAPL");
        assert_eq!(out[0].triggers.buy_amount, 2000.0);
        assert_eq!(out[0].triggers.buy_trigger_percent, -5.0);
        assert_eq!(out[1].triggers.buy_amount, 1000.0);
    }

    #[test]
    fn test_lowercase_group_stock_keeps_its_override() {
        let mut g = group(1, "Tech", &["aapl"], &[]);
        g.stock_overrides.insert(
            "aapl".to_string(),
            TriggerOverride {
                buy_amount: Some(2000.0),
                ..Default::default()
            },
        );
        let inputs = ReconcileInputs {
            constraint_groups: vec![g],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stock_symbol, "AAPL");
        assert_eq!(out[0].triggers.buy_amount, 2000.0);
    }

    #[test]
    fn test_inactive_groups_are_included() {
        let mut g = group(1, "Paused", &["F"], &[]);
        g.is_active = false;
        let inputs = ReconcileInputs {
            constraint_groups: vec![g],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_active);
    }

    #[test]
    fn test_position_fields_are_joined() {
        let inputs = ReconcileInputs {
            constraint_groups: vec![group(1, "Tech", &["AAPL"], &[])],
            positions: vec![position("AAPL", 10.0, 100.0, 110.0)],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out[0].figures.market_value, 1100.0);
        assert_eq!(out[0].figures.unrealized_pnl, 100.0);
        assert_eq!(out[0].figures.unrealized_pnl_percent, 10.0);
    }

    #[test]
    fn test_positions_without_constraints_are_ignored() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "AAPL")],
            positions: vec![position("ORCL", 3.0, 100.0, 101.0)],
            ..Default::default()
        };

        assert_eq!(symbols(&aggregate(&inputs)), vec!["AAPL"]);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "ZM"), constraint(2, "AAPL")],
            constraint_groups: vec![group(1, "Tech", &["MSFT", "AAPL"], &[5])],
            stock_groups: vec![stock_group(5, "Cloud", &["SNOW", "NET"])],
            positions: vec![position("NET", 1.0, 80.0, 90.0)],
        };

        let first = aggregate(&inputs);
        let second = aggregate(&inputs);
        assert_eq!(first, second);
        assert_eq!(symbols(&first), vec!["NET", "AAPL", "MSFT", "SNOW", "ZM"]);
    }

    #[test]
    fn test_duplicate_individual_constraints_collapse() {
        let inputs = ReconcileInputs {
            constraints: vec![constraint(1, "AAPL"), constraint(2, "aapl")],
            ..Default::default()
        };

        let out = aggregate(&inputs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].constraint_id, Some(1));
    }
}
