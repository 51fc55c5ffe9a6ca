use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::state::AppState;

// GET / - liveness and surface description, no side effects
pub async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "chat-relay is running",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
        "endpoints": {
            "chat": "POST /",
            "usage": "GET /usage",
            "health": "GET /health",
            "metrics": "GET /metrics",
        }
    }))
}
