use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use constraint_core::TradingConstraint;
use portfolio_manager::ConstraintInput;

use crate::{ApiResponse, AppError, AppState, UserQuery};

pub fn constraint_routes() -> Router<AppState> {
    Router::new()
        .route("/api/constraints", get(list_constraints).post(create_constraint))
        .route(
            "/api/constraints/:id",
            get(get_constraint).put(update_constraint).delete(delete_constraint),
        )
        .route("/api/constraints/:id/toggle", post(toggle_constraint))
}

async fn list_constraints(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<TradingConstraint>>>, AppError> {
    let constraints = state.constraints.list(query.user_id()).await?;
    Ok(Json(ApiResponse::success(constraints)))
}

async fn create_constraint(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(input): Json<ConstraintInput>,
) -> Result<Json<ApiResponse<TradingConstraint>>, AppError> {
    let constraint = state.constraints.create(query.user_id(), input).await?;
    Ok(Json(ApiResponse::success(constraint)))
}

async fn get_constraint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<TradingConstraint>>, AppError> {
    let constraint = state
        .constraints
        .get(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint {id}")))?;

    Ok(Json(ApiResponse::success(constraint)))
}

async fn update_constraint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    Json(input): Json<ConstraintInput>,
) -> Result<Json<ApiResponse<TradingConstraint>>, AppError> {
    let constraint = state
        .constraints
        .update(query.user_id(), id, input)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint {id}")))?;

    Ok(Json(ApiResponse::success(constraint)))
}

async fn toggle_constraint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<TradingConstraint>>, AppError> {
    let constraint = state
        .constraints
        .toggle(query.user_id(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Constraint {id}")))?;

    Ok(Json(ApiResponse::success(constraint)))
}

async fn delete_constraint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    if !state.constraints.delete(query.user_id(), id).await? {
        return Err(AppError::not_found(format!("Constraint {id}")));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "message": "Constraint deleted" }))))
}
