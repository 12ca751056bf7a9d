// src/handlers/health.rs
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
}

pub async fn home() -> Json<Value> {
    Json(json!({ "message": "MP4 to GIF Converter API" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
