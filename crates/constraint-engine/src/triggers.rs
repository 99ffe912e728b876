//! Effective trigger resolution.

use constraint_core::{normalize_symbol, ConstraintGroup, TradingConstraint, TriggerOverride, TriggerSet};

/// Individual constraints carry no override layer.
pub fn resolve_individual(constraint: &TradingConstraint) -> TriggerSet {
    constraint.triggers
}

/// Resolve the triggers a group applies to `symbol`, honouring the
/// symbol's override field by field. Override keys match case-insensitively.
pub fn resolve_group(group: &ConstraintGroup, symbol: &str) -> TriggerSet {
    match find_override(group, symbol) {
        Some(over) => apply_override(&group.triggers, over),
        None => group.triggers,
    }
}

fn find_override<'a>(group: &'a ConstraintGroup, symbol: &str) -> Option<&'a TriggerOverride> {
    let symbol = normalize_symbol(symbol);
    group.stock_overrides.get(&symbol).or_else(|| {
        group
            .stock_overrides
            .iter()
            .find(|(key, _)| normalize_symbol(key) == symbol)
            .map(|(_, over)| over)
    })
}

pub fn apply_override(base: &TriggerSet, over: &TriggerOverride) -> TriggerSet {
    base.with_override(over)
}
