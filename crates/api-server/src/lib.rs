//! HTTP surface for trading constraints, positions and trades.

pub mod config;
mod constraint_position_routes;
mod constraint_routes;
mod group_routes;
mod portfolio_routes;
pub mod request_id;
mod trade_routes;

use axum::{
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use constraint_core::{ConstraintError, ConstraintSource};
use portfolio_manager::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub constraints: ConstraintStore,
    pub groups: GroupStore,
    pub positions: PositionBook,
    pub trades: TradeLog,
    pub desk: TradingDesk,
    pub source: Arc<dyn ConstraintSource>,
}

impl AppState {
    pub fn new(db: PortfolioDb) -> Self {
        Self {
            constraints: ConstraintStore::new(db.clone()),
            groups: GroupStore::new(db.clone()),
            positions: PositionBook::new(db.clone()),
            trades: TradeLog::new(db.clone()),
            desk: TradingDesk::new(db.clone()),
            source: Arc::new(SqliteSource::new(db)),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Every route is scoped to a user through `?user_id=`.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    pub fn user_id(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or("default")
    }
}

pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("{what} not found"))
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<ConstraintError>() {
            Some(ConstraintError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Some(ConstraintError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(ConstraintError::Upstream(_)) | Some(ConstraintError::Source(_)) => StatusCode::BAD_GATEWAY,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.error, "Request failed");
        }
        (self.status, Json(ApiResponse::<()>::error(self.error.to_string()))).into_response()
    }
}

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    })))
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(constraint_routes::constraint_routes())
        .merge(group_routes::group_routes())
        .merge(portfolio_routes::portfolio_routes())
        .merge(trade_routes::trade_routes())
        .merge(constraint_position_routes::constraint_position_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_id::make_request_span))
        .layer(timeout_layer(config))
        .layer(cors)
        .with_state(state)
}

/// Requests running past the configured timeout get a 408
fn timeout_layer(config: &ServerConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout())
}

pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;
    init_tracing(config.json_logs);

    let db = PortfolioDb::new(&config.database_url).await?;
    let app = build_router(AppState::new(db), &config);

    info!(addr = %config.bind_addr, "Constraint API listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    pub async fn test_app() -> Router {
        let db = PortfolioDb::new("sqlite::memory:").await.unwrap();
        build_router(AppState::new(db), &ServerConfig::default())
    }

    /// Send one request and return the status with the decoded JSON body
    pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
