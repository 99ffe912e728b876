use chrono::{DateTime, Utc};
use constraint_core::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// Row types mirror the SQLite tables; public models live in constraint-core.

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ConstraintRow {
    pub id: i64,
    pub user_id: String,
    pub stock_symbol: String,
    pub buy_trigger_percent: f64,
    pub sell_trigger_percent: f64,
    pub profit_trigger_percent: Option<f64>,
    pub buy_amount: f64,
    pub sell_amount: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConstraintRow> for TradingConstraint {
    fn from(row: ConstraintRow) -> Self {
        Self {
            id: Some(row.id),
            user_id: row.user_id,
            stock_symbol: row.stock_symbol,
            triggers: TriggerSet {
                buy_trigger_percent: row.buy_trigger_percent,
                sell_trigger_percent: row.sell_trigger_percent,
                profit_trigger_percent: row.profit_trigger_percent,
                buy_amount: row.buy_amount,
                sell_amount: row.sell_amount,
            },
            is_active: row.is_active,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ConstraintGroupRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub buy_trigger_percent: f64,
    pub sell_trigger_percent: f64,
    pub profit_trigger_percent: Option<f64>,
    pub buy_amount: f64,
    pub sell_amount: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConstraintGroupRow {
    /// Members are attached separately by the store.
    pub fn into_group(self) -> ConstraintGroup {
        ConstraintGroup {
            id: Some(self.id),
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            triggers: TriggerSet {
                buy_trigger_percent: self.buy_trigger_percent,
                sell_trigger_percent: self.sell_trigger_percent,
                profit_trigger_percent: self.profit_trigger_percent,
                buy_amount: self.buy_amount,
                sell_amount: self.sell_amount,
            },
            is_active: self.is_active,
            stocks: BTreeSet::new(),
            stock_groups: BTreeSet::new(),
            stock_overrides: BTreeMap::new(),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OverrideRow {
    pub group_id: i64,
    pub stock_symbol: String,
    pub buy_trigger_percent: Option<f64>,
    pub sell_trigger_percent: Option<f64>,
    pub profit_trigger_percent: Option<f64>,
    pub buy_amount: Option<f64>,
    pub sell_amount: Option<f64>,
}

impl OverrideRow {
    pub fn into_override(self) -> (String, TriggerOverride) {
        (
            self.stock_symbol,
            TriggerOverride {
                buy_trigger_percent: self.buy_trigger_percent,
                sell_trigger_percent: self.sell_trigger_percent,
                profit_trigger_percent: self.profit_trigger_percent,
                buy_amount: self.buy_amount,
                sell_amount: self.sell_amount,
            },
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct StockGroupRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockGroupRow {
    pub fn into_stock_group(self) -> StockGroup {
        StockGroup {
            id: Some(self.id),
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            color: self.color,
            stocks: BTreeSet::new(),
            created_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PositionRow {
    pub id: i64,
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub current_price: f64,
    pub last_updated: DateTime<Utc>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Self {
            id: Some(row.id),
            user_id: row.user_id,
            stock_symbol: row.stock_symbol,
            quantity: row.quantity,
            average_cost: row.average_cost,
            current_price: row.current_price,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TradeRow {
    pub id: i64,
    pub user_id: String,
    pub stock_symbol: String,
    pub trade_type: String,
    pub trigger_type: Option<String>,
    pub quantity: f64,
    pub price: f64,
    pub trigger_price: Option<f64>,
    pub executed_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for TradeHistory {
    type Error = ConstraintError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            user_id: row.user_id,
            stock_symbol: row.stock_symbol,
            trade_type: row.trade_type.parse()?,
            trigger_type: row.trigger_type.as_deref().map(str::parse).transpose()?,
            quantity: row.quantity,
            price: row.price,
            trigger_price: row.trigger_price,
            executed_at: row.executed_at,
        })
    }
}

// Inputs accepted by the stores

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintInput {
    pub stock_symbol: String,
    #[serde(flatten)]
    pub triggers: TriggerSet,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl ConstraintInput {
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if normalize_symbol(&self.stock_symbol).is_empty() {
            return Err(ConstraintError::InvalidInput("stock_symbol is required".to_string()));
        }
        self.triggers.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintGroupInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub triggers: TriggerSet,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub stocks: BTreeSet<String>,
    #[serde(default)]
    pub stock_groups: BTreeSet<i64>,
    #[serde(default)]
    pub stock_overrides: BTreeMap<String, TriggerOverride>,
}

impl ConstraintGroupInput {
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if self.name.trim().is_empty() {
            return Err(ConstraintError::InvalidInput("group name is required".to_string()));
        }
        self.triggers.validate()?;
        for over in self.stock_overrides.values() {
            validate_override(&self.triggers, over)?;
        }
        Ok(())
    }
}

/// An override is valid when the trigger set it produces is valid.
pub fn validate_override(base: &TriggerSet, over: &TriggerOverride) -> Result<(), ConstraintError> {
    base.with_override(over).validate()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockGroupInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stocks: BTreeSet<String>,
}

impl StockGroupInput {
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if self.name.trim().is_empty() {
            return Err(ConstraintError::InvalidInput("stock group name is required".to_string()));
        }
        Ok(())
    }
}

fn default_active() -> bool {
    true
}

/// Normalize and drop empty symbols.
pub(crate) fn normalize_symbols<'a>(symbols: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    symbols
        .into_iter()
        .map(|s| normalize_symbol(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Result of executing one trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub trade: TradeHistory,
    /// Position after the trade; `None` once it is fully sold
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeHistoryQuery {
    pub symbol: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub closing_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_realized_pnl: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub triggered_trades: usize,
    pub manual_trades: usize,
}

/// One entry of a bulk price refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub stock_symbol: String,
    pub price: f64,
}

pub(crate) fn validate_price(price: f64) -> Result<(), ConstraintError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ConstraintError::InvalidInput(format!(
            "price must be positive, got {price}"
        )));
    }
    Ok(())
}

/// An order that could not be executed as part of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOrder {
    pub order: TradeOrder,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchExecution {
    pub executed: Vec<TradeExecution>,
    pub failed: Vec<FailedOrder>,
}
