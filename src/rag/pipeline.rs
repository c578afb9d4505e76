//! Query answering and document ingest on top of the shared store.

use std::sync::Arc;

use super::chunker::Chunker;
use super::store::SharedStore;
use super::types::{derive_document_id, Answer, Document, IngestReceipt};
use crate::core::errors::RagError;
use crate::llm::AnswerGenerator;

/// Returned when retrieval finds nothing; the generator is not consulted.
pub const NO_INFORMATION_ANSWER: &str = "I don't have any information about that yet.";

pub struct RagPipeline {
    store: Arc<SharedStore>,
    generator: Arc<dyn AnswerGenerator>,
    chunker: Option<Chunker>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(store: Arc<SharedStore>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            store,
            generator,
            chunker: None,
            top_k: 1,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_chunker(mut self, chunker: Option<Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub async fn answer(&self, query: &str) -> Result<Answer, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }

        let store = self.store.get().await?;
        let passages = store.query(query, self.top_k).await?;

        if passages.is_empty() {
            tracing::debug!("No passages retrieved for query");
            return Ok(Answer {
                text: NO_INFORMATION_ANSWER.to_string(),
                source_passages: Vec::new(),
            });
        }

        let context: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let text = self.generator.generate(query, &context).await?;

        Ok(Answer {
            text,
            source_passages: passages,
        })
    }

    /// Stores `text` under `id` (or a content-derived id). Long texts are
    /// split when chunking is enabled; records from an earlier ingest of the
    /// same id that are no longer produced get removed.
    pub async fn ingest(&self, text: &str, id: Option<&str>) -> Result<IngestReceipt, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidDocument(
                "document text must not be empty".to_string(),
            ));
        }

        let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => derive_document_id(text),
        };

        let documents = match &self.chunker {
            Some(chunker) if chunker.needs_split(text) => chunker
                .split(text)
                .into_iter()
                .map(|chunk| Document::chunk_of(&id, chunk.chunk_index, chunk.text))
                .collect(),
            _ => vec![Document::new(&id, text)],
        };

        let store = self.store.get().await?;
        let chunks = store.replace_document(&id, documents).await?;
        tracing::info!("Ingested document '{}' ({} records)", id, chunks);

        Ok(IngestReceipt { id, chunks })
    }
}
