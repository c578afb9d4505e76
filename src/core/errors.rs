use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::StoreUnavailable(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        RagError::GenerationUnavailable(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RagError::InvalidQuery(_) | RagError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            RagError::StoreUnavailable(_) | RagError::GenerationUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RagError::Configuration(_) | RagError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Caller input errors echo their message; backend failures stay generic.
        let message = match &self {
            RagError::InvalidQuery(msg) | RagError::InvalidDocument(msg) => msg.clone(),
            RagError::StoreUnavailable(_) => "Vector store unavailable".to_string(),
            RagError::GenerationUnavailable(_) => "Language model unavailable".to_string(),
            RagError::Configuration(_) | RagError::Internal(_) => {
                "Internal server error".to_string()
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
