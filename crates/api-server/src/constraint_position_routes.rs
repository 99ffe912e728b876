//! Reconciled constraint positions, their summary and trigger signals.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use constraint_core::ConstraintPosition;
use constraint_engine::{evaluate_all, reconcile, summarize, ConstraintSummary, TriggerSignal};
use portfolio_manager::BatchExecution;
use serde::Serialize;
use tracing::info;

use crate::{ApiResponse, AppError, AppState, UserQuery};

#[derive(Serialize)]
pub struct SignalExecutionResponse {
    pub signals: Vec<TriggerSignal>,
    #[serde(flatten)]
    pub batch: BatchExecution,
}

pub fn constraint_position_routes() -> Router<AppState> {
    Router::new()
        .route("/api/constraint-positions", get(get_constraint_positions))
        .route("/api/constraint-positions/summary", get(get_summary))
        .route("/api/constraint-positions/signals", get(get_signals))
        .route("/api/constraint-positions/signals/execute", post(execute_signals))
}

async fn get_constraint_positions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<ConstraintPosition>>>, AppError> {
    let entries = reconcile(&*state.source, query.user_id()).await?;
    Ok(Json(ApiResponse::success(entries)))
}

async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<ConstraintSummary>>, AppError> {
    let entries = reconcile(&*state.source, query.user_id()).await?;
    Ok(Json(ApiResponse::success(summarize(&entries))))
}

async fn get_signals(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<TriggerSignal>>>, AppError> {
    let entries = reconcile(&*state.source, query.user_id()).await?;
    Ok(Json(ApiResponse::success(evaluate_all(&entries))))
}

async fn execute_signals(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<SignalExecutionResponse>>, AppError> {
    let user_id = query.user_id();
    let entries = reconcile(&*state.source, user_id).await?;
    let signals = evaluate_all(&entries);

    let orders = signals.iter().map(TriggerSignal::to_order).collect();
    let batch = state.desk.execute_all(user_id, orders).await;

    info!(
        user_id,
        signals = signals.len(),
        executed = batch.executed.len(),
        failed = batch.failed.len(),
        "Executed trigger signals"
    );
    Ok(Json(ApiResponse::success(SignalExecutionResponse { signals, batch })))
}
