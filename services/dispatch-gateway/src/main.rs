use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::info;

mod config;
mod handlers;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fleetline_core::logging::init();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::new(&config)?);
    if !state.engine.is_configured() {
        info!("no routing credential configured; ETA requests will return placeholders");
    }

    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Dispatch gateway listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/eta", post(handlers::estimate_eta))
        .route("/api/delivery-id", get(handlers::delivery_id))
        .with_state(state)
        .layer(ServiceBuilder::new().into_inner())
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "dispatch-gateway",
        "timestamp": Utc::now().to_rfc3339()
    })))
}
