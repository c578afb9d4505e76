use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::prompt::build_chat_request;
use super::provider::{ensure_query, AnswerGenerator};
use super::types::ChatRequest;
use crate::core::config::LlmConfig;
use crate::core::errors::RagError;

/// Chat completion against an Ollama server (`/api/chat`, non-streaming).
#[derive(Clone)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    temperature: Option<f64>,
    client: Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, RagError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });
        if let (Some(obj), Some(t)) = (body.as_object_mut(), request.temperature) {
            obj.insert("options".to_string(), json!({ "temperature": t }));
        }

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::generation)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::GenerationUnavailable(format!(
                "Ollama chat error ({}): {}",
                status, text
            )));
        }

        let payload: ChatResponse = res.json().await.map_err(RagError::generation)?;
        payload
            .message
            .content
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                RagError::GenerationUnavailable("Ollama response has no content".to_string())
            })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, query: &str, context: &[String]) -> Result<String, RagError> {
        ensure_query(query)?;
        let request = build_chat_request(query, context).with_temperature(self.temperature);
        tracing::debug!(
            "Requesting completion: model={}, passages={}",
            self.model,
            context.len()
        );
        self.chat(request).await
    }
}
