use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use constraint_core::{TradeHistory, TradeOrder, TradeType};
use portfolio_manager::{PerformanceMetrics, TradeExecution, TradeHistoryQuery};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState, UserQuery};

#[derive(Deserialize)]
pub struct HistoryParams {
    pub user_id: Option<String>,
    pub symbol: Option<String>,
    pub limit: Option<i64>,
}

/// Manual trade from the trading panel
#[derive(Deserialize)]
pub struct ManualTradeRequest {
    pub stock_symbol: String,
    pub quantity: f64,
    pub price: f64,
}

pub fn trade_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trades", get(get_trades))
        .route("/api/trades/buy", post(buy))
        .route("/api/trades/sell", post(sell))
        .route("/api/trades/performance", get(get_performance))
        .route("/api/trades/:id", get(get_trade))
}

async fn get_trades(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<Vec<TradeHistory>>>, AppError> {
    let user = UserQuery {
        user_id: params.user_id,
    };
    let query = TradeHistoryQuery {
        symbol: params.symbol,
        limit: params.limit,
    };

    let trades = state.trades.list(user.user_id(), &query).await?;
    Ok(Json(ApiResponse::success(trades)))
}

async fn get_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<TradeHistory>>, AppError> {
    let trade = state
        .trades
        .get(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Trade {id}")))?;

    Ok(Json(ApiResponse::success(trade)))
}

async fn buy(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(req): Json<ManualTradeRequest>,
) -> Result<Json<ApiResponse<TradeExecution>>, AppError> {
    execute_manual(&state, query.user_id(), TradeType::Buy, req).await
}

async fn sell(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(req): Json<ManualTradeRequest>,
) -> Result<Json<ApiResponse<TradeExecution>>, AppError> {
    execute_manual(&state, query.user_id(), TradeType::Sell, req).await
}

async fn execute_manual(
    state: &AppState,
    user_id: &str,
    trade_type: TradeType,
    req: ManualTradeRequest,
) -> Result<Json<ApiResponse<TradeExecution>>, AppError> {
    let order = TradeOrder::manual(&req.stock_symbol, trade_type, req.quantity, req.price);
    let execution = state.desk.execute(user_id, &order).await?;
    Ok(Json(ApiResponse::success(execution)))
}

async fn get_performance(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<PerformanceMetrics>>, AppError> {
    let metrics = state.trades.performance(query.user_id()).await?;
    Ok(Json(ApiResponse::success(metrics)))
}
