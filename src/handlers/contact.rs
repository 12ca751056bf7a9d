// src/handlers/contact.rs
use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::json_body;
use crate::error::ApiError;
use crate::models::api::ContactRequest;
use crate::state::AppState;

pub fn contact_routes() -> Router {
    Router::new().route("/api/contact", post(submit_contact))
}

pub async fn submit_contact(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let contact = json_body(payload)?.validate()?;
    state.notifier.send_contact(&contact).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Message sent"
    })))
}
