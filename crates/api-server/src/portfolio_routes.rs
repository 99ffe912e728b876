use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use constraint_core::Position;
use portfolio_manager::PriceUpdate;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState, UserQuery};

#[derive(Deserialize)]
pub struct PriceRequest {
    pub price: f64,
}

#[derive(Deserialize)]
pub struct BulkPriceRequest {
    pub prices: Vec<PriceUpdate>,
}

#[derive(Serialize)]
pub struct BulkPriceResponse {
    pub requested: usize,
    pub updated: usize,
}

pub fn portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/positions", get(get_positions))
        .route("/api/positions/prices", post(update_prices))
        .route("/api/positions/:symbol", get(get_position).delete(delete_position))
        .route("/api/positions/:symbol/price", put(update_price))
}

async fn get_positions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<Position>>>, AppError> {
    let positions = state.positions.list(query.user_id()).await?;
    Ok(Json(ApiResponse::success(positions)))
}

async fn get_position(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Position>>, AppError> {
    let position = state
        .positions
        .get(query.user_id(), &symbol)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Position in {}", symbol.to_uppercase())))?;

    Ok(Json(ApiResponse::success(position)))
}

async fn update_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<UserQuery>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<ApiResponse<Position>>, AppError> {
    let position = state
        .positions
        .update_price(query.user_id(), &symbol, req.price)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Position in {}", symbol.to_uppercase())))?;

    Ok(Json(ApiResponse::success(position)))
}

async fn update_prices(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(req): Json<BulkPriceRequest>,
) -> Result<Json<ApiResponse<BulkPriceResponse>>, AppError> {
    let updated = state.positions.update_prices(query.user_id(), &req.prices).await?;

    Ok(Json(ApiResponse::success(BulkPriceResponse {
        requested: req.prices.len(),
        updated,
    })))
}

async fn delete_position(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    if !state.positions.delete(query.user_id(), &symbol).await? {
        return Err(AppError::not_found(format!("Position in {}", symbol.to_uppercase())));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "message": "Position deleted" }))))
}
