//! Constraint group and stock group endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use constraint_core::{ConstraintGroup, StockGroup, TriggerOverride};
use portfolio_manager::{ConstraintGroupInput, StockGroupInput};

use crate::{ApiResponse, AppError, AppState, UserQuery};

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/api/constraint-groups", get(list_groups).post(create_group))
        .route(
            "/api/constraint-groups/:id",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/api/constraint-groups/:id/toggle", post(toggle_group))
        .route(
            "/api/constraint-groups/:id/overrides/:symbol",
            put(set_override).delete(clear_override),
        )
        .route("/api/stock-groups", get(list_stock_groups).post(create_stock_group))
        .route(
            "/api/stock-groups/:id",
            get(get_stock_group).put(update_stock_group).delete(delete_stock_group),
        )
}

// ── Constraint groups ───────────────────────────────────────────────────────

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<ConstraintGroup>>>, AppError> {
    let groups = state.groups.list_groups(query.user_id()).await?;
    Ok(Json(ApiResponse::success(groups)))
}

async fn create_group(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(input): Json<ConstraintGroupInput>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let group = state.groups.create_group(query.user_id(), input).await?;
    Ok(Json(ApiResponse::success(group)))
}

async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let group = state
        .groups
        .get_group(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint group {id}")))?;

    Ok(Json(ApiResponse::success(group)))
}

async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    Json(input): Json<ConstraintGroupInput>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let group = state
        .groups
        .update_group(query.user_id(), id, input)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint group {id}")))?;

    Ok(Json(ApiResponse::success(group)))
}

async fn toggle_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let group = state
        .groups
        .toggle_group(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint group {id}")))?;

    Ok(Json(ApiResponse::success(group)))
}

async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    if !state.groups.delete_group(query.user_id(), id).await? {
        return Err(AppError::not_found(format!("Constraint group {id}")));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "message": "Constraint group deleted" }))))
}

async fn set_override(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(i64, String)>,
    Query(query): Query<UserQuery>,
    Json(over): Json<TriggerOverride>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let group = state
        .groups
        .set_override(query.user_id(), id, &symbol, over)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint group {id}")))?;

    Ok(Json(ApiResponse::success(group)))
}

async fn clear_override(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(i64, String)>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<ConstraintGroup>>, AppError> {
    let user_id = query.user_id();
    state.groups.clear_override(user_id, id, &symbol).await?;

    let group = state
        .groups
        .get_group(user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint group {id}")))?;

    Ok(Json(ApiResponse::success(group)))
}

// ── Stock groups ────────────────────────────────────────────────────────────

async fn list_stock_groups(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<StockGroup>>>, AppError> {
    let stock_groups = state.groups.list_stock_groups(query.user_id()).await?;
    Ok(Json(ApiResponse::success(stock_groups)))
}

async fn create_stock_group(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(input): Json<StockGroupInput>,
) -> Result<Json<ApiResponse<StockGroup>>, AppError> {
    let stock_group = state.groups.create_stock_group(query.user_id(), input).await?;
    Ok(Json(ApiResponse::success(stock_group)))
}

async fn get_stock_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<StockGroup>>, AppError> {
    let stock_group = state
        .groups
        .get_stock_group(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Stock group {id}")))?;

    Ok(Json(ApiResponse::success(stock_group)))
}

async fn update_stock_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    Json(input): Json<StockGroupInput>,
) -> Result<Json<ApiResponse<StockGroup>>, AppError> {
    let stock_group = state
        .groups
        .update_stock_group(query.user_id(), id, input)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Stock group {id}")))?;

    Ok(Json(ApiResponse::success(stock_group)))
}

async fn delete_stock_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    if !state.groups.delete_stock_group(query.user_id(), id).await? {
        return Err(AppError::not_found(format!("Stock group {id}")));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "message": "Stock group deleted" }))))
}
