//! Retrieval side of the service.
//!
//! - `EmbeddingStore` / `SharedStore`: vector storage behind a lazily built,
//!   process-wide handle (local SQLite or remote Chroma)
//! - `RagPipeline`: ingest and answer, composing the store with an
//!   `AnswerGenerator`

pub mod chroma;
pub mod chunker;
pub mod collection;
pub mod embedding;
pub mod pipeline;
pub mod sqlite;
pub mod store;
pub mod types;

pub use chunker::Chunker;
pub use collection::{Collection, QueryMatch, VectorClient};
pub use embedding::{embedder_from_config, EmbeddingFunction, HashingEmbedder, OllamaEmbedder};
pub use pipeline::{RagPipeline, NO_INFORMATION_ANSWER};
pub use store::{EmbeddingStore, SharedStore, StoreFactory};
pub use types::{derive_document_id, Answer, Document, IngestReceipt, RetrievedPassage};
