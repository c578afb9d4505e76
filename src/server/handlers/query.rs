use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::RagError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub q: Option<String>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, RagError> {
    let q = params.q.unwrap_or_default();
    let answer = state.pipeline.answer(&q).await?;

    let sources: Vec<Value> = answer
        .source_passages
        .into_iter()
        .map(|passage| {
            json!({
                "id": passage.id,
                "text": passage.text,
                "score": passage.score,
            })
        })
        .collect();

    Ok(Json(json!({
        "answer": answer.text,
        "sources": sources,
    })))
}
