use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::RagError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub text: String,
    pub id: Option<String>,
}

/// `/add` body, accepted either as a url-encoded form or as JSON.
pub struct AddDocumentPayload(pub AddDocumentRequest);

#[async_trait]
impl<S> FromRequest<S> for AddDocumentPayload
where
    S: Send + Sync,
{
    type Rejection = RagError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        let payload = if is_json {
            Json::<AddDocumentRequest>::from_request(req, state)
                .await
                .map(|Json(payload)| payload)
                .map_err(|e| RagError::InvalidDocument(e.body_text()))?
        } else {
            Form::<AddDocumentRequest>::from_request(req, state)
                .await
                .map(|Form(payload)| payload)
                .map_err(|e| RagError::InvalidDocument(e.body_text()))?
        };

        Ok(Self(payload))
    }
}

pub async fn add_document(
    State(state): State<Arc<AppState>>,
    AddDocumentPayload(payload): AddDocumentPayload,
) -> Result<impl IntoResponse, RagError> {
    let receipt = state
        .pipeline
        .ingest(&payload.text, payload.id.as_deref())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "id": receipt.id,
        "chunks": receipt.chunks,
    })))
}
