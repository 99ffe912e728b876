use crate::constraints::ConstraintStore;
use crate::db::PortfolioDb;
use crate::groups::GroupStore;
use crate::portfolio::PositionBook;
use async_trait::async_trait;
use constraint_core::*;

/// Reconciliation reads backed by the SQLite stores
#[derive(Clone)]
pub struct SqliteSource {
    constraints: ConstraintStore,
    groups: GroupStore,
    positions: PositionBook,
}

impl SqliteSource {
    pub fn new(db: PortfolioDb) -> Self {
        Self {
            constraints: ConstraintStore::new(db.clone()),
            groups: GroupStore::new(db.clone()),
            positions: PositionBook::new(db),
        }
    }
}

#[async_trait]
impl ConstraintSource for SqliteSource {
    async fn list_constraints(&self, user_id: &str) -> Result<Vec<TradingConstraint>, ConstraintError> {
        self.constraints
            .list(user_id)
            .await
            .map_err(|e| ConstraintError::fetch("constraints", e))
    }

    async fn list_constraint_groups(&self, user_id: &str) -> Result<Vec<ConstraintGroup>, ConstraintError> {
        self.groups
            .list_groups(user_id)
            .await
            .map_err(|e| ConstraintError::fetch("constraint groups", e))
    }

    async fn list_stock_groups(&self, user_id: &str) -> Result<Vec<StockGroup>, ConstraintError> {
        self.groups
            .list_stock_groups(user_id)
            .await
            .map_err(|e| ConstraintError::fetch("stock groups", e))
    }

    async fn get_positions(&self, user_id: &str) -> Result<Vec<Position>, ConstraintError> {
        self.positions
            .list(user_id)
            .await
            .map_err(|e| ConstraintError::fetch("positions", e))
    }
}
