//! Stock set expansion for constraint groups.

use constraint_core::{normalize_symbol, ConstraintGroup, StockGroup};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Stock groups keyed by id.
pub struct StockGroupIndex<'a> {
    by_id: HashMap<i64, &'a StockGroup>,
}

impl<'a> StockGroupIndex<'a> {
    pub fn new(stock_groups: &'a [StockGroup]) -> Self {
        let by_id = stock_groups
            .iter()
            .filter_map(|sg| sg.id.map(|id| (id, sg)))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, id: i64) -> Option<&'a StockGroup> {
        self.by_id.get(&id).copied()
    }
}

/// Union of the group's direct stocks and the stocks of every stock group it
/// references. References to stock groups that no longer exist contribute
/// nothing.
pub fn expand_stocks(group: &ConstraintGroup, index: &StockGroupIndex<'_>) -> BTreeSet<String> {
    let mut symbols: BTreeSet<String> = group.stocks.iter().map(|s| normalize_symbol(s)).collect();

    for &stock_group_id in &group.stock_groups {
        match index.get(stock_group_id) {
            Some(sg) => symbols.extend(sg.stocks.iter().map(|s| normalize_symbol(s))),
            None => warn!(
                group = %group.name,
                stock_group_id,
                "Constraint group references a missing stock group, skipping"
            ),
        }
    }

    symbols.retain(|s| !s.is_empty());
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    #[test]
    fn test_union_collapses_duplicates() {
        let sgs = vec![
            stock_group(10, "Chips", &["NVDA", "AMD", "AAPL"]),
            stock_group(11, "Cloud", &["MSFT", "AMZN"]),
        ];
        let index = StockGroupIndex::new(&sgs);
        let g = group(1, "Tech", &["AAPL", "GOOG"], &[10, 11]);

        let expanded = expand_stocks(&g, &index);
        let expected: BTreeSet<String> = ["AAPL", "AMD", "AMZN", "GOOG", "MSFT", "NVDA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn test_missing_stock_group_is_skipped() {
        let sgs = vec![stock_group(10, "Chips", &["NVDA"])];
        let index = StockGroupIndex::new(&sgs);
        let g = group(1, "Tech", &["AAPL"], &[10, 99]);

        let expanded = expand_stocks(&g, &index);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.contains("AAPL"));
        assert!(expanded.contains("NVDA"));
    }

    #[test]
    fn test_symbols_are_normalized() {
        let sgs = vec![stock_group(10, "Mixed", &["aapl ", "Msft"])];
        let index = StockGroupIndex::new(&sgs);
        let g = group(1, "Tech", &["AAPL"], &[10]);

        let expanded: Vec<String> = expand_stocks(&g, &index).into_iter().collect();
        assert_eq!(expanded, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_empty_group_expands_to_nothing() {
        let index = StockGroupIndex::new(&[]);
        let g = group(1, "Empty", &[], &[]);
        assert!(expand_stocks(&g, &index).is_empty());
    }
}
