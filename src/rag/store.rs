//! EmbeddingStore and its process-wide lazy accessor.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::chroma::ChromaClient;
use super::collection::{Collection, VectorClient};
use super::embedding::embedder_from_config;
use super::sqlite::SqliteClient;
use super::types::{Document, RetrievedPassage};
use crate::core::config::{BackendKind, EmbeddingConfig, StoreConfig};
use crate::core::errors::RagError;

/// One collection handle plus the operations the pipeline needs from it.
pub struct EmbeddingStore {
    backend: String,
    collection: Arc<dyn Collection>,
}

impl EmbeddingStore {
    pub fn new(backend: impl Into<String>, collection: Arc<dyn Collection>) -> Self {
        Self {
            backend: backend.into(),
            collection,
        }
    }

    /// Builds the backend client and opens (or creates) the configured
    /// collection, binding it to the configured embedding function.
    pub async fn initialize(
        store: &StoreConfig,
        embedding: &EmbeddingConfig,
    ) -> Result<Self, RagError> {
        let client: Box<dyn VectorClient> = match store.backend {
            BackendKind::Local if store.is_in_memory() => Box::new(SqliteClient::in_memory().await?),
            BackendKind::Local => {
                let path = store.persistence_path.as_deref().ok_or_else(|| {
                    RagError::Configuration("store.persistence_path is required".to_string())
                })?;
                Box::new(SqliteClient::open(path).await?)
            }
            BackendKind::Remote => Box::new(ChromaClient::new(&store.remote)?),
        };

        let embedder = embedder_from_config(embedding);
        let collection = client
            .get_or_create_collection(&store.collection_name, embedder)
            .await?;

        tracing::info!(
            "Embedding store ready: backend={}, collection={}",
            client.backend(),
            collection.name()
        );

        Ok(Self::new(client.backend(), collection))
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Upserts a single record; an existing `id` is replaced.
    pub async fn add(&self, text: &str, id: &str) -> Result<(), RagError> {
        self.collection.upsert(&[Document::new(id, text)]).await
    }

    /// Writes every record of one source document and removes records left
    /// over from an earlier version of it.
    pub async fn replace_document(
        &self,
        source_id: &str,
        documents: Vec<Document>,
    ) -> Result<usize, RagError> {
        let previous = self.collection.ids_for_source(source_id).await?;

        self.collection.upsert(&documents).await?;

        let stale: Vec<String> = previous
            .into_iter()
            .filter(|id| !documents.iter().any(|d| &d.id == id))
            .collect();
        if !stale.is_empty() {
            let removed = self.collection.delete(&stale).await?;
            tracing::debug!("Removed {} stale records of '{}'", removed, source_id);
        }

        Ok(documents.len())
    }

    /// Top-`k` passages, best first. An empty store yields an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>, RagError> {
        let matches = self.collection.query(text, k.max(1)).await?;
        Ok(matches
            .into_iter()
            .map(|m| RetrievedPassage {
                id: m.id,
                text: m.text,
                score: m.score,
            })
            .collect())
    }

    pub async fn contains(&self, id: &str) -> Result<bool, RagError> {
        Ok(self.collection.get(id).await?.is_some())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, RagError> {
        self.collection.get(id).await
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.collection.count().await
    }
}

/// Constructs the store on first use.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn build(&self) -> Result<EmbeddingStore, RagError>;
}

pub struct ConfiguredStoreFactory {
    store: StoreConfig,
    embedding: EmbeddingConfig,
}

impl ConfiguredStoreFactory {
    pub fn new(store: StoreConfig, embedding: EmbeddingConfig) -> Self {
        Self { store, embedding }
    }
}

#[async_trait]
impl StoreFactory for ConfiguredStoreFactory {
    async fn build(&self) -> Result<EmbeddingStore, RagError> {
        EmbeddingStore::initialize(&self.store, &self.embedding).await
    }
}

/// Process-wide store accessor. The first caller builds the store, concurrent
/// callers wait for that build, and later callers get the cached instance.
/// A failed build is not cached.
pub struct SharedStore {
    factory: Arc<dyn StoreFactory>,
    cell: OnceCell<Arc<EmbeddingStore>>,
}

impl SharedStore {
    pub fn new(factory: Arc<dyn StoreFactory>) -> Self {
        Self {
            factory,
            cell: OnceCell::new(),
        }
    }

    pub fn from_config(store: StoreConfig, embedding: EmbeddingConfig) -> Self {
        Self::new(Arc::new(ConfiguredStoreFactory::new(store, embedding)))
    }

    pub async fn get(&self) -> Result<Arc<EmbeddingStore>, RagError> {
        self.cell
            .get_or_try_init(|| async { self.factory.build().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::rag::embedding::HashingEmbedder;

    async fn memory_store() -> EmbeddingStore {
        EmbeddingStore::initialize(&StoreConfig::in_memory(), &EmbeddingConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_then_query_round_trips() {
        let store = memory_store().await;
        let text = "Kubernetes is an open-source container orchestration system.";
        store.add(text, "doc1").await.unwrap();
        store
            .add("Paris is the capital of France.", "doc2")
            .await
            .unwrap();

        let passages = store.query("container orchestration", 1).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, text);
        assert_eq!(passages[0].id, "doc1");
    }

    #[tokio::test]
    async fn re_adding_an_id_keeps_one_record() {
        let store = memory_store().await;
        store.add("first version", "doc").await.unwrap();
        store.add("second version", "doc").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("doc").await.unwrap().unwrap().text, "second version");
    }

    #[tokio::test]
    async fn empty_store_query_is_empty_not_error() {
        let store = memory_store().await;
        assert!(store.query("anything", 5).await.unwrap().is_empty());
        assert!(!store.contains("missing").await.unwrap());
    }

    #[tokio::test]
    async fn replace_document_drops_stale_chunks() {
        let store = memory_store().await;
        store
            .replace_document(
                "manual",
                vec![
                    Document::chunk_of("manual", 0, "part zero"),
                    Document::chunk_of("manual", 1, "part one"),
                    Document::chunk_of("manual", 2, "part two"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let written = store
            .replace_document("manual", vec![Document::new("manual", "short now")])
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.contains("manual").await.unwrap());
        assert!(!store.contains("manual#2").await.unwrap());
    }

    #[tokio::test]
    async fn remote_without_credentials_fails_fast() {
        let config = StoreConfig {
            backend: BackendKind::Remote,
            ..StoreConfig::default()
        };
        let err = EmbeddingStore::initialize(&config, &EmbeddingConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    struct CountingFactory {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl StoreFactory for CountingFactory {
        async fn build(&self) -> Result<EmbeddingStore, RagError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            // widen the race window
            tokio::time::sleep(Duration::from_millis(25)).await;
            let client = SqliteClient::in_memory().await?;
            let collection = client
                .get_or_create_collection("shared", Arc::new(HashingEmbedder::new(32)))
                .await?;
            Ok(EmbeddingStore::new("sqlite", collection))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_builds_once() {
        let factory = Arc::new(CountingFactory {
            builds: AtomicUsize::new(0),
        });
        let shared = Arc::new(SharedStore::new(factory.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let shared = shared.clone();
                tokio::spawn(async move { shared.get().await.unwrap() })
            })
            .collect();

        let stores = futures_util::future::join_all(handles).await;
        let first = stores[0].as_ref().unwrap().clone();
        for store in &stores {
            assert!(Arc::ptr_eq(&first, store.as_ref().unwrap()));
        }
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(shared.is_initialized());
    }

    struct FailingOnceFactory {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl StoreFactory for FailingOnceFactory {
        async fn build(&self) -> Result<EmbeddingStore, RagError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RagError::StoreUnavailable("connection refused".to_string()));
            }
            EmbeddingStore::initialize(&StoreConfig::in_memory(), &EmbeddingConfig::default())
                .await
        }
    }

    #[tokio::test]
    async fn failed_initialization_is_retried() {
        let shared = SharedStore::new(Arc::new(FailingOnceFactory {
            attempts: AtomicUsize::new(0),
        }));

        assert!(matches!(
            shared.get().await.err().unwrap(),
            RagError::StoreUnavailable(_)
        ));
        assert!(!shared.is_initialized());
        assert!(shared.get().await.is_ok());
    }
}
