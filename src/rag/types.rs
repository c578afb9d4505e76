use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A piece of text to be stored, keyed by id.
///
/// `source` is the id of the ingested document this record was cut from.
/// For unchunked documents it equals `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source: id.clone(),
            id,
            text: text.into(),
        }
    }

    pub fn chunk_of(source: &str, index: usize, text: impl Into<String>) -> Self {
        Self {
            id: format!("{}#{}", source, index),
            text: text.into(),
            source: source.to_string(),
        }
    }
}

/// A document together with the vector the collection's embedding function
/// produced for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub source: String,
}

impl EmbeddingRecord {
    pub fn new(document: Document, vector: Vec<f32>) -> Self {
        Self {
            id: document.id,
            vector,
            text: document.text,
            source: document.source,
        }
    }
}

/// One retrieval hit. Higher `score` means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source_passages: Vec<RetrievedPassage>,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub id: String,
    pub chunks: usize,
}

/// Content-derived document id: identical text always maps to the same id,
/// so re-ingesting a document replaces it instead of duplicating it.
pub fn derive_document_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("doc-{}", hex::encode(&digest[..16]))
}
