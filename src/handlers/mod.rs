// src/handlers/mod.rs
pub mod contact;
pub mod convert;
pub mod health;
pub mod upload;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ApiError;
use crate::middleware::logging::request_logging_middleware;
use crate::state::AppState;

/// Unwrap a JSON body, turning axum's rejection into the service's error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(format!("Invalid JSON body: {}", rejection.body_text())))
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Every route of the service with logging, CORS and shared state attached.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::health_routes())
        .merge(upload::upload_routes(state.max_upload_bytes))
        .merge(convert::convert_routes())
        .merge(contact::contact_routes())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(cors_layer(&state.cors_origins))
        .layer(Extension(state))
}
