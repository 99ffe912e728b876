use async_trait::async_trait;

use crate::{ConstraintError, ConstraintGroup, Position, StockGroup, TradingConstraint};

/// Read side consumed by reconciliation. Every call is scoped to one user.
#[async_trait]
pub trait ConstraintSource: Send + Sync {
    async fn list_constraints(&self, user_id: &str) -> Result<Vec<TradingConstraint>, ConstraintError>;

    async fn list_constraint_groups(&self, user_id: &str) -> Result<Vec<ConstraintGroup>, ConstraintError>;

    async fn list_stock_groups(&self, user_id: &str) -> Result<Vec<StockGroup>, ConstraintError>;

    /// May fail independently; reconciliation substitutes an empty set.
    async fn get_positions(&self, user_id: &str) -> Result<Vec<Position>, ConstraintError>;
}
