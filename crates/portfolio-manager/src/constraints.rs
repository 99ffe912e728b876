use crate::db::PortfolioDb;
use crate::models::*;
use anyhow::Result;
use chrono::Utc;
use constraint_core::{normalize_symbol, ConstraintError, TradingConstraint};
use tracing::info;

const SELECT_CONSTRAINT: &str = r#"
    SELECT id, user_id, stock_symbol, buy_trigger_percent, sell_trigger_percent,
           profit_trigger_percent, buy_amount, sell_amount, is_active, created_at, updated_at
    FROM trading_constraints
"#;

#[derive(Clone)]
pub struct ConstraintStore {
    db: PortfolioDb,
}

impl ConstraintStore {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Create a constraint. An existing constraint on the same stock is
    /// replaced, keeping one constraint per (user, stock).
    pub async fn create(&self, user_id: &str, input: ConstraintInput) -> Result<TradingConstraint> {
        input.validate()?;
        let symbol = normalize_symbol(&input.stock_symbol);
        let now = Utc::now();

        let row = sqlx::query_as::<_, ConstraintRow>(
            r#"
            INSERT INTO trading_constraints
            (user_id, stock_symbol, buy_trigger_percent, sell_trigger_percent, profit_trigger_percent,
             buy_amount, sell_amount, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, stock_symbol) DO UPDATE SET
                buy_trigger_percent = excluded.buy_trigger_percent,
                sell_trigger_percent = excluded.sell_trigger_percent,
                profit_trigger_percent = excluded.profit_trigger_percent,
                buy_amount = excluded.buy_amount,
                sell_amount = excluded.sell_amount,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&symbol)
        .bind(input.triggers.buy_trigger_percent)
        .bind(input.triggers.sell_trigger_percent)
        .bind(input.triggers.profit_trigger_percent)
        .bind(input.triggers.buy_amount)
        .bind(input.triggers.sell_amount)
        .bind(input.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        info!(user_id, symbol = %symbol, "Saved trading constraint");
        Ok(row.into())
    }

    pub async fn get(&self, user_id: &str, id: i64) -> Result<Option<TradingConstraint>> {
        let row = sqlx::query_as::<_, ConstraintRow>(&format!(
            "{SELECT_CONSTRAINT} WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn get_by_symbol(&self, user_id: &str, symbol: &str) -> Result<Option<TradingConstraint>> {
        let row = sqlx::query_as::<_, ConstraintRow>(&format!(
            "{SELECT_CONSTRAINT} WHERE user_id = ? AND stock_symbol = ?"
        ))
        .bind(user_id)
        .bind(normalize_symbol(symbol))
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    /// All constraints of a user, ordered by symbol
    pub async fn list(&self, user_id: &str) -> Result<Vec<TradingConstraint>> {
        let rows = sqlx::query_as::<_, ConstraintRow>(&format!(
            "{SELECT_CONSTRAINT} WHERE user_id = ? ORDER BY stock_symbol"
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace every editable field. `None` when the constraint does not exist.
    /// Moving onto a stock another constraint of the user already covers is
    /// rejected as invalid input.
    pub async fn update(
        &self,
        user_id: &str,
        id: i64,
        input: ConstraintInput,
    ) -> Result<Option<TradingConstraint>> {
        input.validate()?;
        let symbol = normalize_symbol(&input.stock_symbol);

        if let Some(existing) = self.get_by_symbol(user_id, &symbol).await? {
            if existing.id != Some(id) {
                return Err(ConstraintError::InvalidInput(format!(
                    "a constraint on {symbol} already exists"
                ))
                .into());
            }
        }

        let row = sqlx::query_as::<_, ConstraintRow>(
            r#"
            UPDATE trading_constraints
            SET stock_symbol = ?, buy_trigger_percent = ?, sell_trigger_percent = ?,
                profit_trigger_percent = ?, buy_amount = ?, sell_amount = ?, is_active = ?,
                updated_at = ?
            WHERE user_id = ? AND id = ?
            RETURNING *
            "#,
        )
        .bind(&symbol)
        .bind(input.triggers.buy_trigger_percent)
        .bind(input.triggers.sell_trigger_percent)
        .bind(input.triggers.profit_trigger_percent)
        .bind(input.triggers.buy_amount)
        .bind(input.triggers.sell_amount)
        .bind(input.is_active)
        .bind(Utc::now())
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    /// Flip `is_active`
    pub async fn toggle(&self, user_id: &str, id: i64) -> Result<Option<TradingConstraint>> {
        let row = sqlx::query_as::<_, ConstraintRow>(
            r#"
            UPDATE trading_constraints
            SET is_active = NOT is_active, updated_at = ?
            WHERE user_id = ? AND id = ?
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a constraint. The position on the same stock is left alone.
    pub async fn delete(&self, user_id: &str, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trading_constraints WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
