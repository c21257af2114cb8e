use axum::Json;
use serde_json::{json, Value};

/// GET /health (public, no authentication).
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "skillsync-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
