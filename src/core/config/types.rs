use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Path value that selects a non-persistent SQLite database.
pub const IN_MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// SQLite file for the local backend. `None` is resolved to the data
    /// directory at load time; `":memory:"` keeps everything in process.
    pub persistence_path: Option<PathBuf>,
    pub collection_name: String,
    pub remote: RemoteCredentials,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            persistence_path: None,
            collection_name: "documents".to_string(),
            remote: RemoteCredentials::default(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            persistence_path: Some(PathBuf::from(IN_MEMORY_PATH)),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.persistence_path
            .as_deref()
            .map(|p| p.as_os_str() == IN_MEMORY_PATH)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCredentials {
    pub url: String,
    pub api_key: Option<String>,
    pub tenant: Option<String>,
    pub database: Option<String>,
}

impl Default for RemoteCredentials {
    fn default() -> Self {
        Self {
            url: "https://api.trychroma.com".to_string(),
            api_key: None,
            tenant: None,
            database: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbedderKind,
    /// Output size of the hashing embedder. Ollama models report their own.
    pub dimension: usize,
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::Hashing,
            dimension: 384,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub mock: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mock: false,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: None,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub enabled: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS; local dev origins when empty.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
}
