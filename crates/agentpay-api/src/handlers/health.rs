//! Health endpoints for load balancers and probes

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let db_ok = state.db.health_check().await.unwrap_or(false);
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "healthy": db_ok,
            "database": db_ok,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
