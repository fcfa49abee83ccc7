//! Health check handler.

use axum::Json;

/// `GET /health/ping`
pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
