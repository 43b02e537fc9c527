pub mod auth;
pub mod fees;
pub mod obligations;

use axum::Json;
use serde_json::{Value, json};

/// `GET /health`: unauthenticated liveness check.
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
