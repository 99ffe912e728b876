use crate::db::PortfolioDb;
use crate::models::*;
use anyhow::Result;
use chrono::Utc;
use constraint_core::{normalize_symbol, ConstraintError, Position};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Quantities at or below this are treated as a closed position
const DUST_QUANTITY: f64 = 0.0001;

/// Per-user stock holdings
#[derive(Clone)]
pub struct PositionBook {
    db: PortfolioDb,
}

impl PositionBook {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// All open positions of a user, ordered by symbol
    pub async fn list(&self, user_id: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE user_id = ? ORDER BY stock_symbol",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, user_id: &str, symbol: &str) -> Result<Option<Position>> {
        let mut conn = self.db.pool().acquire().await?;
        find_position(&mut conn, user_id, &normalize_symbol(symbol)).await
    }

    /// Record the latest market price of a held stock. `None` when the
    /// user holds no position in it.
    pub async fn update_price(&self, user_id: &str, symbol: &str, price: f64) -> Result<Option<Position>> {
        validate_price(price)?;

        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE positions
            SET current_price = ?, last_updated = ?
            WHERE user_id = ? AND stock_symbol = ?
            RETURNING *
            "#,
        )
        .bind(price)
        .bind(Utc::now())
        .bind(user_id)
        .bind(normalize_symbol(symbol))
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    /// Apply a batch of prices in one transaction. Symbols without a
    /// position are skipped. Returns the number of positions updated.
    pub async fn update_prices(&self, user_id: &str, updates: &[PriceUpdate]) -> Result<usize> {
        for update in updates {
            validate_price(update.price)?;
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let mut updated = 0;

        for update in updates {
            let result = sqlx::query(
                "UPDATE positions SET current_price = ?, last_updated = ? WHERE user_id = ? AND stock_symbol = ?",
            )
            .bind(update.price)
            .bind(now)
            .bind(user_id)
            .bind(normalize_symbol(&update.stock_symbol))
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected() as usize;
        }
        tx.commit().await?;

        debug!(user_id, requested = updates.len(), updated, "Applied price updates");
        Ok(updated)
    }

    /// Drop a position without recording a trade
    pub async fn delete(&self, user_id: &str, symbol: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM positions WHERE user_id = ? AND stock_symbol = ?")
            .bind(user_id)
            .bind(normalize_symbol(symbol))
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub(crate) async fn find_position(
    conn: &mut SqliteConnection,
    user_id: &str,
    symbol: &str,
) -> Result<Option<Position>> {
    let row = sqlx::query_as::<_, PositionRow>(
        "SELECT * FROM positions WHERE user_id = ? AND stock_symbol = ?",
    )
    .bind(user_id)
    .bind(symbol)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Add shares at `price`, blending the average cost by quantity.
pub(crate) async fn apply_buy(
    conn: &mut SqliteConnection,
    user_id: &str,
    symbol: &str,
    quantity: f64,
    price: f64,
) -> Result<Position> {
    let (new_quantity, new_average) = match find_position(conn, user_id, symbol).await? {
        Some(existing) => {
            let held = Decimal::from_f64(existing.quantity).unwrap_or_default();
            let avg = Decimal::from_f64(existing.average_cost).unwrap_or_default();
            let qty = Decimal::from_f64(quantity).unwrap_or_default();
            let px = Decimal::from_f64(price).unwrap_or_default();

            let total = held + qty;
            let blended = if total > Decimal::ZERO {
                (held * avg + qty * px) / total
            } else {
                px
            };
            (
                total.to_f64().unwrap_or(0.0),
                blended.to_f64().unwrap_or(0.0),
            )
        }
        None => (quantity, price),
    };

    let row = sqlx::query_as::<_, PositionRow>(
        r#"
        INSERT INTO positions (user_id, stock_symbol, quantity, average_cost, current_price, last_updated)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, stock_symbol) DO UPDATE SET
            quantity = excluded.quantity,
            average_cost = excluded.average_cost,
            current_price = excluded.current_price,
            last_updated = excluded.last_updated
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(symbol)
    .bind(new_quantity)
    .bind(new_average)
    .bind(price)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    info!(user_id, symbol, quantity, price, "Position increased");
    Ok(row.into())
}

/// Remove shares sold at `price`. Selling more than is held is rejected;
/// a position sold down to nothing is deleted and `None` is returned.
pub(crate) async fn apply_sell(
    conn: &mut SqliteConnection,
    user_id: &str,
    symbol: &str,
    quantity: f64,
    price: f64,
) -> Result<Option<Position>> {
    let existing = find_position(conn, user_id, symbol)
        .await?
        .ok_or_else(|| ConstraintError::InvalidInput(format!("no position held in {symbol}")))?;

    let held = Decimal::from_f64(existing.quantity).unwrap_or_default();
    let qty = Decimal::from_f64(quantity).unwrap_or_default();
    let dust = Decimal::from_f64(DUST_QUANTITY).unwrap_or_default();

    if qty > held + dust {
        return Err(ConstraintError::InvalidInput(format!(
            "cannot sell {quantity} {symbol}, only {} held",
            existing.quantity
        ))
        .into());
    }

    let remaining = held - qty;
    if remaining <= dust {
        sqlx::query("DELETE FROM positions WHERE user_id = ? AND stock_symbol = ?")
            .bind(user_id)
            .bind(symbol)
            .execute(&mut *conn)
            .await?;

        info!(user_id, symbol, quantity, price, "Position closed");
        return Ok(None);
    }

    let row = sqlx::query_as::<_, PositionRow>(
        r#"
        UPDATE positions
        SET quantity = ?, current_price = ?, last_updated = ?
        WHERE user_id = ? AND stock_symbol = ?
        RETURNING *
        "#,
    )
    .bind(remaining.to_f64().unwrap_or(0.0))
    .bind(price)
    .bind(Utc::now())
    .bind(user_id)
    .bind(symbol)
    .fetch_one(&mut *conn)
    .await?;

    info!(user_id, symbol, quantity, price, "Position reduced");
    Ok(Some(row.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> PortfolioDb {
        PortfolioDb::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_buy_blends_average_cost() {
        let db = setup_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let first = apply_buy(&mut conn, "alice", "AAPL", 10.0, 100.0).await.unwrap();
        assert_eq!(first.quantity, 10.0);
        assert_eq!(first.average_cost, 100.0);

        let second = apply_buy(&mut conn, "alice", "AAPL", 10.0, 120.0).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity, 20.0);
        assert_eq!(second.average_cost, 110.0);
        assert_eq!(second.current_price, 120.0);
    }

    #[tokio::test]
    async fn test_sell_reduces_then_closes() {
        let db = setup_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        apply_buy(&mut conn, "alice", "AAPL", 10.0, 100.0).await.unwrap();

        let reduced = apply_sell(&mut conn, "alice", "AAPL", 4.0, 130.0).await.unwrap().unwrap();
        assert_eq!(reduced.quantity, 6.0);
        assert_eq!(reduced.average_cost, 100.0);
        assert_eq!(reduced.current_price, 130.0);

        let closed = apply_sell(&mut conn, "alice", "AAPL", 6.0, 130.0).await.unwrap();
        assert!(closed.is_none());
        assert!(find_position(&mut conn, "alice", "AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversell_is_rejected() {
        let db = setup_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        apply_buy(&mut conn, "alice", "AAPL", 5.0, 100.0).await.unwrap();

        let err = apply_sell(&mut conn, "alice", "AAPL", 6.0, 100.0).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConstraintError>(),
            Some(ConstraintError::InvalidInput(_))
        ));
        assert!(apply_sell(&mut conn, "alice", "MSFT", 1.0, 100.0).await.is_err());

        let unchanged = find_position(&mut conn, "alice", "AAPL").await.unwrap().unwrap();
        assert_eq!(unchanged.quantity, 5.0);
    }

    #[tokio::test]
    async fn test_price_updates() {
        let db = setup_test_db().await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            apply_buy(&mut conn, "alice", "AAPL", 10.0, 100.0).await.unwrap();
            apply_buy(&mut conn, "alice", "MSFT", 2.0, 300.0).await.unwrap();
        }
        let book = PositionBook::new(db);

        let updated = book.update_price("alice", "aapl", 95.0).await.unwrap().unwrap();
        assert_eq!(updated.current_price, 95.0);
        assert!(book.update_price("alice", "NVDA", 95.0).await.unwrap().is_none());
        assert!(book.update_price("alice", "AAPL", 0.0).await.is_err());

        let count = book
            .update_prices(
                "alice",
                &[
                    PriceUpdate { stock_symbol: "AAPL".to_string(), price: 101.0 },
                    PriceUpdate { stock_symbol: "MSFT".to_string(), price: 310.0 },
                    PriceUpdate { stock_symbol: "KO".to_string(), price: 60.0 },
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 2);

        let positions = book.list("alice").await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].stock_symbol, "AAPL");
        assert_eq!(positions[0].current_price, 101.0);
        assert_eq!(positions[1].current_price, 310.0);
    }

    #[tokio::test]
    async fn test_positions_are_per_user() {
        let db = setup_test_db().await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            apply_buy(&mut conn, "alice", "AAPL", 10.0, 100.0).await.unwrap();
        }
        let book = PositionBook::new(db);

        assert!(book.get("bob", "AAPL").await.unwrap().is_none());
        assert!(!book.delete("bob", "AAPL").await.unwrap());
        assert!(book.delete("alice", "AAPL").await.unwrap());
        assert!(book.list("alice").await.unwrap().is_empty());
    }
}
