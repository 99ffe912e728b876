//! Constraint Reconciliation
//!
//! Merges a user's trading rules (individual constraints, constraint groups
//! with per-stock overrides, and the stock groups they reference) with the
//! user's positions into one list of constraint positions. The same list
//! drives the dashboard summary and trigger evaluation.

pub mod aggregator;
pub mod expander;
pub mod joiner;
pub mod reconcile;
pub mod signals;
pub mod summary;
pub mod triggers;

#[cfg(test)]
mod fixtures;

pub use aggregator::{aggregate, ReconcileInputs};
pub use expander::{expand_stocks, StockGroupIndex};
pub use joiner::{join_position, PositionIndex};
pub use reconcile::{fetch_inputs, reconcile};
pub use signals::{evaluate, evaluate_all, TriggerSignal};
pub use summary::{summarize, ConstraintSummary};
pub use triggers::{apply_override, resolve_group, resolve_individual};
