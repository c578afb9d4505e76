use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::ServerConfig;
use crate::server::handlers::{documents, health, query};
use crate::state::AppState;

/// Routes: `/health` (also `/`), `/add`, `/query`, with CORS and request
/// tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server);
    Router::new()
        .route("/", get(health::health))
        .route("/health", get(health::health))
        .route("/add", post(documents::add_document))
        .route("/query", get(query::query).post(query::query))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let configured = config
        .cors_allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let origins = if configured.is_empty() {
        default_local_origins()
    } else {
        configured
    };

    let allow_origin = AllowOrigin::list(
        origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>(),
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
