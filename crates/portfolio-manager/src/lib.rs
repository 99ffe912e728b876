pub mod constraints;
pub mod db;
pub mod groups;
pub mod models;
pub mod portfolio;
pub mod source;
pub mod trades;

pub use constraints::ConstraintStore;
pub use db::PortfolioDb;
pub use groups::GroupStore;
pub use models::*;
pub use portfolio::PositionBook;
pub use source::SqliteSource;
pub use trades::{compute_performance, TradeLog, TradingDesk};
