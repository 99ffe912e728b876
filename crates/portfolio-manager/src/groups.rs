use crate::db::PortfolioDb;
use crate::models::*;
use anyhow::Result;
use chrono::Utc;
use constraint_core::{normalize_symbol, ConstraintError, ConstraintGroup, StockGroup, TriggerOverride};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::info;

const SELECT_GROUP: &str = r#"
    SELECT id, user_id, name, description, buy_trigger_percent, sell_trigger_percent,
           profit_trigger_percent, buy_amount, sell_amount, is_active, created_at, updated_at
    FROM constraint_groups
"#;

const SELECT_STOCK_GROUP: &str =
    "SELECT id, user_id, name, description, color, created_at FROM stock_groups";

/// Constraint groups (with their stocks, stock group references and
/// overrides) and stock groups
#[derive(Clone)]
pub struct GroupStore {
    db: PortfolioDb,
}

impl GroupStore {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    // ── Constraint groups ────────────────────────────────────────────────────

    pub async fn create_group(&self, user_id: &str, input: ConstraintGroupInput) -> Result<ConstraintGroup> {
        input.validate()?;
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO constraint_groups
            (user_id, name, description, buy_trigger_percent, sell_trigger_percent,
             profit_trigger_percent, buy_amount, sell_amount, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.triggers.buy_trigger_percent)
        .bind(input.triggers.sell_trigger_percent)
        .bind(input.triggers.profit_trigger_percent)
        .bind(input.triggers.buy_amount)
        .bind(input.triggers.sell_amount)
        .bind(input.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        write_group_members(&mut tx, id, &input).await?;
        tx.commit().await?;

        info!(user_id, group_id = id, name = %input.name, "Created constraint group");
        self.require_group(user_id, id).await
    }

    pub async fn get_group(&self, user_id: &str, id: i64) -> Result<Option<ConstraintGroup>> {
        let row = sqlx::query_as::<_, ConstraintGroupRow>(&format!(
            "{SELECT_GROUP} WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => {
                let mut groups = vec![row.into_group()];
                self.attach_group_members(user_id, &mut groups).await?;
                Ok(groups.pop())
            }
            None => Ok(None),
        }
    }

    /// All constraint groups of a user in creation order
    pub async fn list_groups(&self, user_id: &str) -> Result<Vec<ConstraintGroup>> {
        let rows = sqlx::query_as::<_, ConstraintGroupRow>(&format!(
            "{SELECT_GROUP} WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut groups: Vec<ConstraintGroup> = rows.into_iter().map(|r| r.into_group()).collect();
        self.attach_group_members(user_id, &mut groups).await?;
        Ok(groups)
    }

    /// Replace the group's fields and members
    pub async fn update_group(
        &self,
        user_id: &str,
        id: i64,
        input: ConstraintGroupInput,
    ) -> Result<Option<ConstraintGroup>> {
        input.validate()?;
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE constraint_groups
            SET name = ?, description = ?, buy_trigger_percent = ?, sell_trigger_percent = ?,
                profit_trigger_percent = ?, buy_amount = ?, sell_amount = ?, is_active = ?,
                updated_at = ?
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.triggers.buy_trigger_percent)
        .bind(input.triggers.sell_trigger_percent)
        .bind(input.triggers.profit_trigger_percent)
        .bind(input.triggers.buy_amount)
        .bind(input.triggers.sell_amount)
        .bind(input.is_active)
        .bind(Utc::now())
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        for table in [
            "constraint_group_stocks",
            "constraint_group_stock_groups",
            "constraint_group_overrides",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE group_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        write_group_members(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_group(user_id, id).await
    }

    pub async fn toggle_group(&self, user_id: &str, id: i64) -> Result<Option<ConstraintGroup>> {
        let result = sqlx::query(
            "UPDATE constraint_groups SET is_active = NOT is_active, updated_at = ? WHERE user_id = ? AND id = ?",
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_group(user_id, id).await
    }

    /// Delete a group together with its members and overrides
    pub async fn delete_group(&self, user_id: &str, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM constraint_groups WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the override for one symbol. An empty override clears it.
    pub async fn set_override(
        &self,
        user_id: &str,
        group_id: i64,
        symbol: &str,
        over: TriggerOverride,
    ) -> Result<Option<ConstraintGroup>> {
        let Some(group) = self.get_group(user_id, group_id).await? else {
            return Ok(None);
        };
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ConstraintError::InvalidInput("stock symbol is required".to_string()).into());
        }

        if over.is_empty() {
            self.clear_override(user_id, group_id, &symbol).await?;
        } else {
            validate_override(&group.triggers, &over)?;
            sqlx::query(
                r#"
                INSERT INTO constraint_group_overrides
                (group_id, stock_symbol, buy_trigger_percent, sell_trigger_percent,
                 profit_trigger_percent, buy_amount, sell_amount)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(group_id, stock_symbol) DO UPDATE SET
                    buy_trigger_percent = excluded.buy_trigger_percent,
                    sell_trigger_percent = excluded.sell_trigger_percent,
                    profit_trigger_percent = excluded.profit_trigger_percent,
                    buy_amount = excluded.buy_amount,
                    sell_amount = excluded.sell_amount
                "#,
            )
            .bind(group_id)
            .bind(&symbol)
            .bind(over.buy_trigger_percent)
            .bind(over.sell_trigger_percent)
            .bind(over.profit_trigger_percent)
            .bind(over.buy_amount)
            .bind(over.sell_amount)
            .execute(self.db.pool())
            .await?;
        }

        self.get_group(user_id, group_id).await
    }

    pub async fn clear_override(&self, user_id: &str, group_id: i64, symbol: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM constraint_group_overrides
            WHERE stock_symbol = ?
              AND group_id IN (SELECT id FROM constraint_groups WHERE user_id = ? AND id = ?)
            "#,
        )
        .bind(normalize_symbol(symbol))
        .bind(user_id)
        .bind(group_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn require_group(&self, user_id: &str, id: i64) -> Result<ConstraintGroup> {
        self.get_group(user_id, id)
            .await?
            .ok_or_else(|| ConstraintError::NotFound(format!("constraint group {id}")).into())
    }

    /// Load stocks, stock group references and overrides for the given
    /// groups with one query per member table.
    async fn attach_group_members(&self, user_id: &str, groups: &mut [ConstraintGroup]) -> Result<()> {
        if groups.is_empty() {
            return Ok(());
        }
        let mut by_id: HashMap<i64, &mut ConstraintGroup> = groups
            .iter_mut()
            .filter_map(|g| g.id.map(|id| (id, g)))
            .collect();

        let stocks: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT s.group_id, s.stock_symbol
            FROM constraint_group_stocks s
            JOIN constraint_groups g ON g.id = s.group_id
            WHERE g.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        for (group_id, symbol) in stocks {
            if let Some(group) = by_id.get_mut(&group_id) {
                group.stocks.insert(symbol);
            }
        }

        let refs: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT r.group_id, r.stock_group_id
            FROM constraint_group_stock_groups r
            JOIN constraint_groups g ON g.id = r.group_id
            WHERE g.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        for (group_id, stock_group_id) in refs {
            if let Some(group) = by_id.get_mut(&group_id) {
                group.stock_groups.insert(stock_group_id);
            }
        }

        let overrides = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT o.group_id, o.stock_symbol, o.buy_trigger_percent, o.sell_trigger_percent,
                   o.profit_trigger_percent, o.buy_amount, o.sell_amount
            FROM constraint_group_overrides o
            JOIN constraint_groups g ON g.id = o.group_id
            WHERE g.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        for row in overrides {
            if let Some(group) = by_id.get_mut(&row.group_id) {
                let (symbol, over) = row.into_override();
                group.stock_overrides.insert(symbol, over);
            }
        }

        Ok(())
    }

    // ── Stock groups ─────────────────────────────────────────────────────────

    pub async fn create_stock_group(&self, user_id: &str, input: StockGroupInput) -> Result<StockGroup> {
        input.validate()?;
        let mut tx = self.db.pool().begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO stock_groups (user_id, name, description, color, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.color)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        write_stock_group_members(&mut tx, id, &input).await?;
        tx.commit().await?;

        info!(user_id, stock_group_id = id, name = %input.name, "Created stock group");
        self.get_stock_group(user_id, id)
            .await?
            .ok_or_else(|| ConstraintError::NotFound(format!("stock group {id}")).into())
    }

    pub async fn get_stock_group(&self, user_id: &str, id: i64) -> Result<Option<StockGroup>> {
        let row = sqlx::query_as::<_, StockGroupRow>(&format!(
            "{SELECT_STOCK_GROUP} WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => {
                let mut stock_groups = vec![row.into_stock_group()];
                self.attach_stock_group_members(user_id, &mut stock_groups).await?;
                Ok(stock_groups.pop())
            }
            None => Ok(None),
        }
    }

    pub async fn list_stock_groups(&self, user_id: &str) -> Result<Vec<StockGroup>> {
        let rows = sqlx::query_as::<_, StockGroupRow>(&format!(
            "{SELECT_STOCK_GROUP} WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut stock_groups: Vec<StockGroup> = rows.into_iter().map(|r| r.into_stock_group()).collect();
        self.attach_stock_group_members(user_id, &mut stock_groups).await?;
        Ok(stock_groups)
    }

    pub async fn update_stock_group(
        &self,
        user_id: &str,
        id: i64,
        input: StockGroupInput,
    ) -> Result<Option<StockGroup>> {
        input.validate()?;
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE stock_groups SET name = ?, description = ?, color = ? WHERE user_id = ? AND id = ?",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.color)
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM stock_group_members WHERE stock_group_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        write_stock_group_members(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_stock_group(user_id, id).await
    }

    /// Delete a stock group. Constraint groups that reference it keep the
    /// reference; reconciliation skips it.
    pub async fn delete_stock_group(&self, user_id: &str, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stock_groups WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn attach_stock_group_members(&self, user_id: &str, stock_groups: &mut [StockGroup]) -> Result<()> {
        if stock_groups.is_empty() {
            return Ok(());
        }
        let mut by_id: HashMap<i64, &mut StockGroup> = stock_groups
            .iter_mut()
            .filter_map(|sg| sg.id.map(|id| (id, sg)))
            .collect();

        let members: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT m.stock_group_id, m.stock_symbol
            FROM stock_group_members m
            JOIN stock_groups sg ON sg.id = m.stock_group_id
            WHERE sg.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        for (stock_group_id, symbol) in members {
            if let Some(sg) = by_id.get_mut(&stock_group_id) {
                sg.stocks.insert(symbol);
            }
        }

        Ok(())
    }
}

async fn write_group_members(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: i64,
    input: &ConstraintGroupInput,
) -> Result<()> {
    for symbol in normalize_symbols(&input.stocks) {
        sqlx::query("INSERT OR IGNORE INTO constraint_group_stocks (group_id, stock_symbol) VALUES (?, ?)")
            .bind(group_id)
            .bind(symbol)
            .execute(&mut **tx)
            .await?;
    }

    for stock_group_id in &input.stock_groups {
        sqlx::query(
            "INSERT OR IGNORE INTO constraint_group_stock_groups (group_id, stock_group_id) VALUES (?, ?)",
        )
        .bind(group_id)
        .bind(stock_group_id)
        .execute(&mut **tx)
        .await?;
    }

    for (symbol, over) in &input.stock_overrides {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() || over.is_empty() {
            continue;
        }
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO constraint_group_overrides
            (group_id, stock_symbol, buy_trigger_percent, sell_trigger_percent,
             profit_trigger_percent, buy_amount, sell_amount)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_id)
        .bind(symbol)
        .bind(over.buy_trigger_percent)
        .bind(over.sell_trigger_percent)
        .bind(over.profit_trigger_percent)
        .bind(over.buy_amount)
        .bind(over.sell_amount)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn write_stock_group_members(
    tx: &mut Transaction<'_, Sqlite>,
    stock_group_id: i64,
    input: &StockGroupInput,
) -> Result<()> {
    for symbol in normalize_symbols(&input.stocks) {
        sqlx::query("INSERT OR IGNORE INTO stock_group_members (stock_group_id, stock_symbol) VALUES (?, ?)")
            .bind(stock_group_id)
            .bind(symbol)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
