use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness. Reports the document count only once the store has been built,
/// so probing never triggers backend initialization.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = json!({
        "status": "ok",
        "generator": state.pipeline.generator_name(),
        "store_initialized": state.store.is_initialized(),
    });

    if state.store.is_initialized() {
        if let Ok(store) = state.store.get().await {
            match store.count().await {
                Ok(count) => body["documents"] = json!(count),
                Err(err) => tracing::warn!("Failed to count documents: {}", err),
            }
        }
    }

    Json(body)
}
