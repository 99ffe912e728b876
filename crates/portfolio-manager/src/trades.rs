use crate::db::PortfolioDb;
use crate::models::*;
use crate::portfolio::{apply_buy, apply_sell};
use anyhow::Result;
use chrono::Utc;
use constraint_core::{normalize_symbol, TradeHistory, TradeOrder, TradeType};
use sqlx::SqliteConnection;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

/// Append-only record of executed trades
#[derive(Clone)]
pub struct TradeLog {
    db: PortfolioDb,
}

impl TradeLog {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Append a trade without touching positions
    pub async fn record(&self, user_id: &str, order: &TradeOrder) -> Result<TradeHistory> {
        order.validate()?;
        let mut conn = self.db.pool().acquire().await?;
        insert_trade(&mut conn, user_id, order).await
    }

    pub async fn get(&self, user_id: &str, id: i64) -> Result<Option<TradeHistory>> {
        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trade_history WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(TradeHistory::try_from).transpose()?)
    }

    /// Newest first, optionally filtered by symbol and capped at `limit`
    pub async fn list(&self, user_id: &str, query: &TradeHistoryQuery) -> Result<Vec<TradeHistory>> {
        let symbol = query.symbol.as_deref().map(normalize_symbol);
        // SQLite treats a negative LIMIT as no limit
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(-1);

        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT * FROM trade_history
            WHERE user_id = ? AND (? IS NULL OR stock_symbol = ?)
            ORDER BY executed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(&symbol)
        .bind(&symbol)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(TradeHistory::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Realized performance of a user's trades
    pub async fn performance(&self, user_id: &str) -> Result<PerformanceMetrics> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trade_history WHERE user_id = ? ORDER BY executed_at, id",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let trades = rows
            .into_iter()
            .map(TradeHistory::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(compute_performance(&trades))
    }
}

async fn insert_trade(conn: &mut SqliteConnection, user_id: &str, order: &TradeOrder) -> Result<TradeHistory> {
    let row = sqlx::query_as::<_, TradeRow>(
        r#"
        INSERT INTO trade_history
        (user_id, stock_symbol, trade_type, trigger_type, quantity, price, trigger_price, executed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(normalize_symbol(&order.stock_symbol))
    .bind(order.trade_type.as_str())
    .bind(order.trigger_type.map(|t| t.as_str()))
    .bind(order.quantity)
    .bind(order.price)
    .bind(order.trigger_price)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(TradeHistory::try_from(row)?)
}

/// Match sells against earlier buys of the same symbol, first in first out.
/// `trades` must be in execution order.
pub fn compute_performance(trades: &[TradeHistory]) -> PerformanceMetrics {
    let mut lots: HashMap<&str, VecDeque<(f64, f64)>> = HashMap::new();
    let mut closes: Vec<f64> = Vec::new();

    for trade in trades {
        let entry = lots.entry(trade.stock_symbol.as_str()).or_default();

        match trade.trade_type {
            TradeType::Buy => entry.push_back((trade.quantity, trade.price)),
            TradeType::Sell => {
                let mut remaining = trade.quantity;
                let mut matched = 0.0;
                let mut cost = 0.0;

                while remaining > 0.0001 {
                    let Some(lot) = entry.front_mut() else { break };
                    let take = remaining.min(lot.0);
                    cost += take * lot.1;
                    matched += take;
                    remaining -= take;

                    if take >= lot.0 - 0.0001 {
                        entry.pop_front();
                    } else {
                        lot.0 -= take;
                    }
                }

                // Only shares matched to a recorded buy count as closed
                if matched > 0.0 {
                    closes.push(matched * trade.price - cost);
                }
            }
        }
    }

    let wins: Vec<f64> = closes.iter().copied().filter(|pnl| *pnl > 0.0).collect();
    let losses: Vec<f64> = closes.iter().copied().filter(|pnl| *pnl < 0.0).collect();

    let triggered_trades = trades.iter().filter(|t| t.trigger_type.is_some()).count();

    PerformanceMetrics {
        total_trades: trades.len(),
        closing_trades: closes.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: if closes.is_empty() {
            0.0
        } else {
            (wins.len() as f64 / closes.len() as f64) * 100.0
        },
        total_realized_pnl: closes.iter().sum(),
        average_win: average(&wins),
        average_loss: average(&losses),
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        triggered_trades,
        manual_trades: trades.len() - triggered_trades,
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Executes orders against the position book and the trade log together
#[derive(Clone)]
pub struct TradingDesk {
    db: PortfolioDb,
}

impl TradingDesk {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Apply the position change and append the history entry in one
    /// transaction. A rejected order leaves both untouched.
    pub async fn execute(&self, user_id: &str, order: &TradeOrder) -> Result<TradeExecution> {
        order.validate()?;
        let symbol = normalize_symbol(&order.stock_symbol);
        let mut tx = self.db.pool().begin().await?;

        let position = match order.trade_type {
            TradeType::Buy => Some(apply_buy(&mut tx, user_id, &symbol, order.quantity, order.price).await?),
            TradeType::Sell => apply_sell(&mut tx, user_id, &symbol, order.quantity, order.price).await?,
        };
        let trade = insert_trade(&mut tx, user_id, order).await?;
        tx.commit().await?;

        info!(
            user_id,
            symbol = %symbol,
            trade_type = %order.trade_type,
            trigger = ?order.trigger_type,
            quantity = order.quantity,
            price = order.price,
            "Trade executed"
        );
        Ok(TradeExecution { trade, position })
    }

    /// Execute each order in its own transaction. Failed orders are
    /// reported and do not stop the rest.
    pub async fn execute_all(&self, user_id: &str, orders: Vec<TradeOrder>) -> BatchExecution {
        let mut batch = BatchExecution::default();

        for order in orders {
            match self.execute(user_id, &order).await {
                Ok(execution) => batch.executed.push(execution),
                Err(e) => {
                    warn!(user_id, symbol = %order.stock_symbol, error = %e, "Order rejected");
                    batch.failed.push(FailedOrder {
                        order,
                        error: e.to_string(),
                    });
                }
            }
        }

        batch
    }
}
