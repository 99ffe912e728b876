use chrono::Utc;
use constraint_core::*;

pub fn triggers() -> TriggerSet {
    TriggerSet {
        buy_trigger_percent: -5.0,
        sell_trigger_percent: 10.0,
        profit_trigger_percent: Some(20.0),
        buy_amount: 1000.0,
        sell_amount: 500.0,
    }
}

pub fn constraint(id: i64, symbol: &str) -> TradingConstraint {
    TradingConstraint {
        id: Some(id),
        user_id: "default".to_string(),
        stock_symbol: symbol.to_string(),
        triggers: triggers(),
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}

pub fn group(id: i64, name: &str, stocks: &[&str], stock_groups: &[i64]) -> ConstraintGroup {
    ConstraintGroup {
        id: Some(id),
        user_id: "default".to_string(),
        name: name.to_string(),
        description: None,
        triggers: TriggerSet {
            buy_trigger_percent: -8.0,
            sell_trigger_percent: 15.0,
            profit_trigger_percent: None,
            buy_amount: 2500.0,
            sell_amount: 2500.0,
        },
        is_active: true,
        stocks: stocks.iter().map(|s| s.to_string()).collect(),
        stock_groups: stock_groups.iter().copied().collect(),
        stock_overrides: Default::default(),
        created_at: None,
        updated_at: None,
    }
}

pub fn stock_group(id: i64, name: &str, stocks: &[&str]) -> StockGroup {
    StockGroup {
        id: Some(id),
        user_id: "default".to_string(),
        name: name.to_string(),
        description: None,
        color: Some("#3b82f6".to_string()),
        stocks: stocks.iter().map(|s| s.to_string()).collect(),
        created_at: None,
    }
}

pub fn position(symbol: &str, quantity: f64, average_cost: f64, current_price: f64) -> Position {
    Position {
        id: None,
        user_id: "default".to_string(),
        stock_symbol: symbol.to_string(),
        quantity,
        average_cost,
        current_price,
        last_updated: Utc::now(),
    }
}
