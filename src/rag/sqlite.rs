//! SQLite-backed local vector backend.
//!
//! Records live in one table keyed by `(collection, doc_id)`; search is
//! brute-force cosine similarity over the collection's rows.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::collection::{rank_best_first, Collection, QueryMatch, VectorClient};
use super::embedding::EmbeddingFunction;
use super::types::{Document, EmbeddingRecord};
use crate::core::errors::RagError;

pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    pub async fn open(db_path: &Path) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(RagError::store)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let client = Self { pool };
        client.init_schema().await?;
        Ok(client)
    }

    /// Non-persistent database. A single pinned connection, since every
    /// in-memory connection would otherwise be its own database.
    pub async fn in_memory() -> Result<Self, RagError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(RagError::store)?;

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let client = Self { pool };
        client.init_schema().await?;
        Ok(client)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embedder TEXT NOT NULL,
                dimension INTEGER,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embeddings (
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (collection, doc_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_embeddings_source ON embeddings(collection, source)",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(())
    }
}

#[async_trait]
impl VectorClient for SqliteClient {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Arc<dyn Collection>, RagError> {
        let embedder_name = embedder.name();

        let existing: Option<String> =
            sqlx::query_scalar("SELECT embedder FROM collections WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(RagError::store)?;

        match existing {
            Some(bound) if bound != embedder_name => {
                return Err(RagError::Configuration(format!(
                    "collection '{}' is bound to embedding function '{}', not '{}'",
                    name, bound, embedder_name
                )));
            }
            Some(_) => {}
            None => {
                sqlx::query("INSERT OR IGNORE INTO collections (name, embedder) VALUES (?1, ?2)")
                    .bind(name)
                    .bind(&embedder_name)
                    .execute(&self.pool)
                    .await
                    .map_err(RagError::store)?;
                tracing::info!(
                    "Created collection '{}' with embedding function {}",
                    name,
                    embedder_name
                );
            }
        }

        Ok(Arc::new(SqliteCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
            embedder,
        }))
    }
}

pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
    embedder: Arc<dyn EmbeddingFunction>,
}

impl SqliteCollection {
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
        Document {
            id: row.get("doc_id"),
            text: row.get("content"),
            source: row.get("source"),
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    let similarity = dot / denom;
    if denom <= f32::EPSILON || !similarity.is_finite() {
        0.0
    } else {
        similarity
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, documents: &[Document]) -> Result<(), RagError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(RagError::Internal(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                vectors.len()
            )));
        }

        let records: Vec<EmbeddingRecord> = documents
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(document, vector)| EmbeddingRecord::new(document, vector))
            .collect();

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        let bound_dimension: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT dimension FROM collections WHERE name = ?1")
                .bind(&self.name)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RagError::store)?
                .flatten();

        let dimension = match bound_dimension {
            Some(d) => d as usize,
            None => {
                let d = records[0].vector.len();
                sqlx::query("UPDATE collections SET dimension = ?1 WHERE name = ?2")
                    .bind(d as i64)
                    .bind(&self.name)
                    .execute(&mut *tx)
                    .await
                    .map_err(RagError::store)?;
                d
            }
        };

        for record in &records {
            if record.vector.len() != dimension {
                return Err(RagError::Configuration(format!(
                    "embedding for '{}' has {} dimensions, collection '{}' expects {}",
                    record.id,
                    record.vector.len(),
                    self.name,
                    dimension
                )));
            }

            let blob = Self::serialize_embedding(&record.vector);
            sqlx::query(
                "INSERT INTO embeddings (collection, doc_id, source, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, doc_id) DO UPDATE SET
                    source = excluded.source,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
            )
            .bind(&self.name)
            .bind(&record.id)
            .bind(&record.source)
            .bind(&record.text)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<QueryMatch>, RagError> {
        let rows = sqlx::query(
            "SELECT doc_id, content, embedding
             FROM embeddings
             WHERE collection = ?1
             ORDER BY rowid",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(text).await?;

        let mut scored: Vec<QueryMatch> = rows
            .iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                QueryMatch {
                    id: row.get("doc_id"),
                    text: row.get("content"),
                    score: cosine_similarity(&query_embedding, &stored),
                }
            })
            .collect();

        // rows arrive in rowid order, so ties stay in insertion order
        rank_best_first(&mut scored);
        scored.truncate(n_results.max(1));

        Ok(scored)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, RagError> {
        let row = sqlx::query(
            "SELECT doc_id, content, source
             FROM embeddings
             WHERE collection = ?1 AND doc_id = ?2",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(row.as_ref().map(Self::row_to_document))
    }

    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>, RagError> {
        sqlx::query_scalar::<_, String>(
            "SELECT doc_id FROM embeddings
             WHERE collection = ?1 AND source = ?2
             ORDER BY rowid",
        )
        .bind(&self.name)
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, RagError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM embeddings WHERE collection = ?1 AND doc_id = ?2")
                .bind(&self.name)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;
            deleted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(RagError::store)?;

        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE collection = ?1")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedding::HashingEmbedder;

    async fn collection(client: &SqliteClient) -> Arc<dyn Collection> {
        client
            .get_or_create_collection("docs", Arc::new(HashingEmbedder::new(64)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_and_search() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = collection(&client).await;

        docs.upsert(&[Document::new("c1", "Hello world")]).await.unwrap();
        assert_eq!(docs.count().await.unwrap(), 1);

        let results = docs.query("Hello world", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c1");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn empty_collection_returns_no_matches() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = collection(&client).await;

        assert!(docs.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = collection(&client).await;

        docs.upsert(&[Document::new("a", "alpha text")]).await.unwrap();
        docs.upsert(&[Document::new("b", "beta text")]).await.unwrap();
        docs.upsert(&[Document::new("a", "gamma text")]).await.unwrap();

        assert_eq!(docs.count().await.unwrap(), 2);
        assert_eq!(docs.get("a").await.unwrap().unwrap().text, "gamma text");

        // a stop-word query scores every record 0.0, so ties fall back to
        // insertion order and "a" keeps its original slot
        let ranked = docs.query("the", 2).await.unwrap();
        assert_eq!(ranked[0].id, "a");
        assert_eq!(ranked[1].id, "b");
    }

    #[tokio::test]
    async fn ranking_is_best_first() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = collection(&client).await;

        docs.upsert(&[
            Document::new("bread", "Sourdough bread needs a long fermentation."),
            Document::new("k8s", "Kubernetes schedules containers across a cluster."),
        ])
        .await
        .unwrap();

        let ranked = docs.query("kubernetes cluster", 2).await.unwrap();
        assert_eq!(ranked[0].id, "k8s");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[tokio::test]
    async fn source_lookup_and_delete() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = collection(&client).await;

        docs.upsert(&[
            Document::chunk_of("manual", 0, "first part"),
            Document::chunk_of("manual", 1, "second part"),
            Document::new("other", "unrelated"),
        ])
        .await
        .unwrap();

        let ids = docs.ids_for_source("manual").await.unwrap();
        assert_eq!(ids, vec!["manual#0", "manual#1"]);

        assert_eq!(docs.delete(&ids).await.unwrap(), 2);
        assert_eq!(docs.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reopening_with_another_embedder_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rag.db");

        {
            let client = SqliteClient::open(&path).await.unwrap();
            let docs = collection(&client).await;
            docs.upsert(&[Document::new("a", "persisted")]).await.unwrap();
        }

        let client = SqliteClient::open(&path).await.unwrap();
        let err = client
            .get_or_create_collection("docs", Arc::new(HashingEmbedder::new(128)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Configuration(_)));

        let docs = collection(&client).await;
        assert_eq!(docs.get("a").await.unwrap().unwrap().text, "persisted");
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    /// Yields NaN vectors for texts mentioning "broken".
    struct FlakyEmbedder(HashingEmbedder);

    #[async_trait]
    impl EmbeddingFunction for FlakyEmbedder {
        fn name(&self) -> String {
            "flaky".to_string()
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    if text.contains("broken") {
                        vec![f32::NAN; 64]
                    } else {
                        self.0.embed_text(text)
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn nan_vectors_do_not_break_ranking() {
        let client = SqliteClient::in_memory().await.unwrap();
        let docs = client
            .get_or_create_collection("docs", Arc::new(FlakyEmbedder(HashingEmbedder::new(64))))
            .await
            .unwrap();

        docs.upsert(&[
            Document::new("broken", "broken vector"),
            Document::new("k8s", "Kubernetes schedules containers"),
        ])
        .await
        .unwrap();

        let ranked = docs.query("kubernetes containers", 2).await.unwrap();
        assert_eq!(ranked[0].id, "k8s");
        assert_eq!(ranked[1].score, 0.0);
    }
}
