use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::ConstraintError;

/// Trim and upper-case a ticker symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Effective trigger values for one stock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerSet {
    /// Percentage drop that triggers a buy (negative)
    pub buy_trigger_percent: f64,
    /// Percentage rise that triggers a sell (positive)
    pub sell_trigger_percent: f64,
    /// Profit target; `None` means the profit trigger is disabled
    #[serde(default)]
    pub profit_trigger_percent: Option<f64>,
    /// Dollar amount to buy when the buy trigger fires
    pub buy_amount: f64,
    /// Dollar amount to sell when the sell trigger fires
    pub sell_amount: f64,
}

impl TriggerSet {
    /// Present override fields win, absent ones keep this set's values.
    pub fn with_override(&self, over: &TriggerOverride) -> TriggerSet {
        TriggerSet {
            buy_trigger_percent: over.buy_trigger_percent.unwrap_or(self.buy_trigger_percent),
            sell_trigger_percent: over.sell_trigger_percent.unwrap_or(self.sell_trigger_percent),
            profit_trigger_percent: over.profit_trigger_percent.or(self.profit_trigger_percent),
            buy_amount: over.buy_amount.unwrap_or(self.buy_amount),
            sell_amount: over.sell_amount.unwrap_or(self.sell_amount),
        }
    }

    /// Check signs and amounts. Shared by constraints, groups and overrides.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if !self.buy_trigger_percent.is_finite() || self.buy_trigger_percent > 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "buy_trigger_percent must be zero or negative, got {}",
                self.buy_trigger_percent
            )));
        }
        if !self.sell_trigger_percent.is_finite() || self.sell_trigger_percent < 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "sell_trigger_percent must be zero or positive, got {}",
                self.sell_trigger_percent
            )));
        }
        if let Some(profit) = self.profit_trigger_percent {
            if !profit.is_finite() || profit <= 0.0 {
                return Err(ConstraintError::InvalidInput(format!(
                    "profit_trigger_percent must be positive, got {profit}"
                )));
            }
        }
        if !self.buy_amount.is_finite() || self.buy_amount < 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "buy_amount must not be negative, got {}",
                self.buy_amount
            )));
        }
        if !self.sell_amount.is_finite() || self.sell_amount < 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "sell_amount must not be negative, got {}",
                self.sell_amount
            )));
        }
        Ok(())
    }
}

/// Partial trigger set attached to one symbol of a constraint group.
/// Present fields win over the group's values, absent fields inherit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerOverride {
    #[serde(default)]
    pub buy_trigger_percent: Option<f64>,
    #[serde(default)]
    pub sell_trigger_percent: Option<f64>,
    #[serde(default)]
    pub profit_trigger_percent: Option<f64>,
    #[serde(default)]
    pub buy_amount: Option<f64>,
    #[serde(default)]
    pub sell_amount: Option<f64>,
}

impl TriggerOverride {
    pub fn is_empty(&self) -> bool {
        self.buy_trigger_percent.is_none()
            && self.sell_trigger_percent.is_none()
            && self.profit_trigger_percent.is_none()
            && self.buy_amount.is_none()
            && self.sell_amount.is_none()
    }
}

/// Individual per-stock trading rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConstraint {
    pub id: Option<i64>,
    pub user_id: String,
    pub stock_symbol: String,
    #[serde(flatten)]
    pub triggers: TriggerSet,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Named rule applied to a set of stocks and stock groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintGroup {
    pub id: Option<i64>,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub triggers: TriggerSet,
    pub is_active: bool,
    #[serde(default)]
    pub stocks: BTreeSet<String>,
    /// Ids of referenced stock groups
    #[serde(default)]
    pub stock_groups: BTreeSet<i64>,
    #[serde(default)]
    pub stock_overrides: BTreeMap<String, TriggerOverride>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reusable named bag of symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockGroup {
    pub id: Option<i64>,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub stocks: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Current holding in a stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Option<i64>,
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub current_price: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Individual,
    Group,
}

/// `Position` orders before `Watching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Position,
    Watching,
}

/// Market value and P&L of one symbol, derived from its position (if any)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFigures {
    pub current_price: f64,
    pub quantity: f64,
    pub average_cost: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub status: PositionStatus,
}

impl PositionFigures {
    pub fn watching() -> Self {
        Self {
            current_price: 0.0,
            quantity: 0.0,
            average_cost: 0.0,
            market_value: 0.0,
            unrealized_pnl: 0.0,
            unrealized_pnl_percent: 0.0,
            status: PositionStatus::Watching,
        }
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_cost
    }
}

/// Reconciled view of one symbol: its effective rule joined with its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintPosition {
    pub stock_symbol: String,
    pub constraint_type: ConstraintType,
    /// Group name, only set for group-derived entries
    pub constraint_name: Option<String>,
    pub constraint_id: Option<i64>,
    pub is_active: bool,
    #[serde(flatten)]
    pub triggers: TriggerSet,
    #[serde(flatten)]
    pub figures: PositionFigures,
}

impl ConstraintPosition {
    pub fn status(&self) -> PositionStatus {
        self.figures.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl FromStr for TradeType {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(ConstraintError::InvalidInput(format!(
                "unknown trade type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    PriceDrop,
    PriceRise,
    ProfitTarget,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::PriceDrop => "PRICE_DROP",
            TriggerType::PriceRise => "PRICE_RISE",
            TriggerType::ProfitTarget => "PROFIT_TARGET",
        }
    }
}

impl FromStr for TriggerType {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PRICE_DROP" => Ok(TriggerType::PriceDrop),
            "PRICE_RISE" => Ok(TriggerType::PriceRise),
            "PROFIT_TARGET" => Ok(TriggerType::ProfitTarget),
            other => Err(ConstraintError::InvalidInput(format!(
                "unknown trigger type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only trade log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub id: Option<i64>,
    pub user_id: String,
    pub stock_symbol: String,
    pub trade_type: TradeType,
    /// `None` for manual trades
    pub trigger_type: Option<TriggerType>,
    pub quantity: f64,
    pub price: f64,
    pub trigger_price: Option<f64>,
    pub executed_at: DateTime<Utc>,
}

/// A trade about to be executed, manual or signal-driven
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub stock_symbol: String,
    pub trade_type: TradeType,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub trigger_price: Option<f64>,
}

impl TradeOrder {
    pub fn manual(symbol: &str, trade_type: TradeType, quantity: f64, price: f64) -> Self {
        Self {
            stock_symbol: normalize_symbol(symbol),
            trade_type,
            quantity,
            price,
            trigger_type: None,
            trigger_price: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        if self.stock_symbol.trim().is_empty() {
            return Err(ConstraintError::InvalidInput("stock symbol is empty".to_string()));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ConstraintError::InvalidInput(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}
