pub mod paths;
pub mod service;
pub mod types;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use types::{
    BackendKind, ChunkingConfig, EmbedderKind, EmbeddingConfig, LlmConfig, LoggingConfig,
    RagConfig, RemoteCredentials, RetrievalConfig, ServerConfig, StoreConfig,
};
