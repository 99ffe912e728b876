//! Trigger evaluation over reconciled constraint positions.
//!
//! Only active rules on held positions are evaluated. The price change is
//! measured against average cost, and at most one trigger fires per symbol:
//! profit target first, then price rise, then price drop.

use constraint_core::{
    ConstraintPosition, ConstraintType, PositionStatus, TradeOrder, TradeType, TriggerType,
};
use serde::{Deserialize, Serialize};

/// A fired trigger and the trade it proposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSignal {
    pub stock_symbol: String,
    pub constraint_type: ConstraintType,
    pub constraint_name: Option<String>,
    pub trigger_type: TriggerType,
    pub trade_type: TradeType,
    pub quantity: f64,
    pub current_price: f64,
    /// Change versus average cost, in percent
    pub change_percent: f64,
    pub trigger_percent: f64,
    /// Price at which the trigger threshold is crossed
    pub trigger_price: f64,
}

impl TriggerSignal {
    pub fn to_order(&self) -> TradeOrder {
        TradeOrder {
            stock_symbol: self.stock_symbol.clone(),
            trade_type: self.trade_type,
            quantity: self.quantity,
            price: self.current_price,
            trigger_type: Some(self.trigger_type),
            trigger_price: Some(self.trigger_price),
        }
    }
}

pub fn evaluate(entry: &ConstraintPosition) -> Option<TriggerSignal> {
    let figures = &entry.figures;
    if !entry.is_active || figures.status != PositionStatus::Position || figures.current_price <= 0.0 {
        return None;
    }

    let change = figures.unrealized_pnl_percent;
    let triggers = &entry.triggers;

    let (trigger_type, trigger_percent) = match triggers.profit_trigger_percent {
        Some(profit) if change >= profit => (TriggerType::ProfitTarget, profit),
        _ if change >= triggers.sell_trigger_percent && triggers.sell_trigger_percent > 0.0 => {
            (TriggerType::PriceRise, triggers.sell_trigger_percent)
        }
        _ if change <= triggers.buy_trigger_percent && triggers.buy_trigger_percent < 0.0 => {
            (TriggerType::PriceDrop, triggers.buy_trigger_percent)
        }
        _ => return None,
    };

    let (trade_type, quantity) = match trigger_type {
        TriggerType::ProfitTarget => (TradeType::Sell, figures.quantity),
        TriggerType::PriceRise => (
            TradeType::Sell,
            whole_shares(triggers.sell_amount, figures.current_price).min(figures.quantity),
        ),
        TriggerType::PriceDrop => (
            TradeType::Buy,
            whole_shares(triggers.buy_amount, figures.current_price),
        ),
    };

    if quantity <= 0.0 {
        return None;
    }

    Some(TriggerSignal {
        stock_symbol: entry.stock_symbol.clone(),
        constraint_type: entry.constraint_type,
        constraint_name: entry.constraint_name.clone(),
        trigger_type,
        trade_type,
        quantity,
        current_price: figures.current_price,
        change_percent: change,
        trigger_percent,
        trigger_price: figures.average_cost * (1.0 + trigger_percent / 100.0),
    })
}

pub fn evaluate_all(entries: &[ConstraintPosition]) -> Vec<TriggerSignal> {
    entries.iter().filter_map(evaluate).collect()
}

fn whole_shares(amount: f64, price: f64) -> f64 {
    if price <= 0.0 || amount <= 0.0 {
        return 0.0;
    }
    (amount / price).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::joiner::join_position;
    use constraint_core::PositionFigures;

    fn entry(quantity: f64, average_cost: f64, current_price: f64) -> ConstraintPosition {
        let p = position("AAPL", quantity, average_cost, current_price);
        ConstraintPosition {
            stock_symbol: "AAPL".to_string(),
            constraint_type: ConstraintType::Individual,
            constraint_name: None,
            constraint_id: Some(1),
            is_active: true,
            // buy -5%, sell +10%, profit +20%, buy $1000, sell $500
            triggers: triggers(),
            figures: join_position(Some(&p)),
        }
    }

    #[test]
    fn test_no_signal_inside_band() {
        assert!(evaluate(&entry(10.0, 100.0, 103.0)).is_none());
    }

    #[test]
    fn test_price_drop_buys_whole_shares() {
        let signal = evaluate(&entry(10.0, 100.0, 94.0)).unwrap();
        assert_eq!(signal.trigger_type, TriggerType::PriceDrop);
        assert_eq!(signal.trade_type, TradeType::Buy);
        // floor(1000 / 94)
        assert_eq!(signal.quantity, 10.0);
        assert_eq!(signal.trigger_price, 95.0);
    }

    #[test]
    fn test_price_rise_sells_capped_by_holding() {
        let signal = evaluate(&entry(2.0, 100.0, 112.0)).unwrap();
        assert_eq!(signal.trigger_type, TriggerType::PriceRise);
        assert_eq!(signal.trade_type, TradeType::Sell);
        // floor(500 / 112) = 4, capped at the 2 held
        assert_eq!(signal.quantity, 2.0);
    }

    #[test]
    fn test_profit_target_takes_precedence_and_sells_all() {
        let signal = evaluate(&entry(7.0, 100.0, 125.0)).unwrap();
        assert_eq!(signal.trigger_type, TriggerType::ProfitTarget);
        assert_eq!(signal.quantity, 7.0);
        assert_eq!(signal.trigger_price, 120.0);
    }

    #[test]
    fn test_disabled_profit_trigger_falls_back_to_price_rise() {
        let mut e = entry(7.0, 100.0, 125.0);
        e.triggers.profit_trigger_percent = None;
        let signal = evaluate(&e).unwrap();
        assert_eq!(signal.trigger_type, TriggerType::PriceRise);
    }

    #[test]
    fn test_inactive_and_watching_entries_are_skipped() {
        let mut inactive = entry(10.0, 100.0, 80.0);
        inactive.is_active = false;
        assert!(evaluate(&inactive).is_none());

        let mut watching = entry(10.0, 100.0, 80.0);
        watching.figures = PositionFigures::watching();
        assert!(evaluate(&watching).is_none());
    }

    #[test]
    fn test_amount_below_share_price_yields_nothing() {
        let mut e = entry(10.0, 100.0, 90.0);
        e.triggers.buy_amount = 50.0;
        assert!(evaluate(&e).is_none());
    }

    #[test]
    fn test_signal_converts_to_order() {
        let order = evaluate(&entry(10.0, 100.0, 94.0)).unwrap().to_order();
        assert_eq!(order.trade_type, TradeType::Buy);
        assert_eq!(order.price, 94.0);
        assert_eq!(order.trigger_type, Some(TriggerType::PriceDrop));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_evaluate_all_filters() {
        let entries = vec![entry(10.0, 100.0, 94.0), entry(10.0, 100.0, 101.0)];
        assert_eq!(evaluate_all(&entries).len(), 1);
    }
}
