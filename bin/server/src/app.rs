//! HTTP router.

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::{self, AppState};

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Airform server is running",
    }))
}

/// Browsers may only call the API from the configured front end.
fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, frontend_url, "front-end URL is not a valid origin");
            layer
        }
    }
}

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.frontend_url);

    Router::new()
        .route("/", get(health))
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .nest("/api/v1", api::router())
        .route("/webhooks/airtable", post(api::webhook::receive))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
