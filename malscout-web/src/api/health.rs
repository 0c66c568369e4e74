//! Service health endpoint

use axum::Json;
use serde_json::{json, Value};

/// GET /health - liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "malscout-web",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
