//! Remote vector backend speaking the Chroma HTTP API (v2).
//!
//! Embeddings are computed client-side with the collection's embedding
//! function and sent along with the documents; the server only indexes.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::collection::{rank_best_first, Collection, QueryMatch, VectorClient};
use super::embedding::EmbeddingFunction;
use super::types::Document;
use crate::core::config::RemoteCredentials;
use crate::core::errors::RagError;

const TOKEN_HEADER: &str = "x-chroma-token";
const EMBEDDER_METADATA_KEY: &str = "embedding_function";

#[derive(Clone)]
pub struct ChromaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CollectionModel {
    id: String,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Value>>>,
}

impl ChromaClient {
    pub fn new(credentials: &RemoteCredentials) -> Result<Self, RagError> {
        let api_key = required(credentials.api_key.as_deref(), "api_key")?;
        let tenant = required(credentials.tenant.as_deref(), "tenant")?;
        let database = required(credentials.database.as_deref(), "database")?;
        let url = required(Some(credentials.url.as_str()), "url")?;

        let base_url = format!(
            "{}/api/v2/tenants/{}/databases/{}",
            url.trim_end_matches('/'),
            tenant,
            database
        );

        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(TOKEN_HEADER, &self.api_key)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, RagError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RagError::Configuration(format!(
            "remote backend requires store.remote.{}",
            field
        ))),
    }
}

async fn read_json<T: DeserializeOwned>(res: Response, action: &str) -> Result<T, RagError> {
    let res = check_status(res, action).await?;
    res.json::<T>().await.map_err(RagError::store)
}

async fn check_status(res: Response, action: &str) -> Result<Response, RagError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    Err(RagError::StoreUnavailable(format!(
        "chroma {} failed ({}): {}",
        action, status, text
    )))
}

#[async_trait]
impl VectorClient for ChromaClient {
    fn backend(&self) -> &str {
        "chroma"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Arc<dyn Collection>, RagError> {
        let embedder_name = embedder.name();
        let url = format!("{}/collections", self.base_url);
        let body = json!({
            "name": name,
            "get_or_create": true,
            "metadata": {
                "hnsw:space": "cosine",
                "embedding_function": embedder_name,
            },
        });

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(RagError::store)?;
        let model: CollectionModel = read_json(res, "get_or_create_collection").await?;

        let bound = model
            .metadata
            .as_ref()
            .and_then(|m| m.get(EMBEDDER_METADATA_KEY))
            .and_then(|v| v.as_str());
        if let Some(bound) = bound {
            if bound != embedder_name {
                return Err(RagError::Configuration(format!(
                    "collection '{}' is bound to embedding function '{}', not '{}'",
                    name, bound, embedder_name
                )));
            }
        }

        tracing::info!("Opened remote collection '{}' ({})", name, model.id);

        Ok(Arc::new(ChromaCollection {
            client: self.clone(),
            name: name.to_string(),
            url: format!("{}/collections/{}", self.base_url, model.id),
            embedder,
        }))
    }
}

pub struct ChromaCollection {
    client: ChromaClient,
    name: String,
    url: String,
    embedder: Arc<dyn EmbeddingFunction>,
}

impl ChromaCollection {
    async fn send(&self, action: &str, body: Value) -> Result<Response, RagError> {
        let url = format!("{}/{}", self.url, action);
        self.client
            .authorized(self.client.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(RagError::store)
    }

    async fn post<T: DeserializeOwned>(&self, action: &str, body: Value) -> Result<T, RagError> {
        let res = self.send(action, body).await?;
        read_json(res, action).await
    }

    /// For endpoints whose response body carries nothing we use.
    async fn post_unit(&self, action: &str, body: Value) -> Result<(), RagError> {
        let res = self.send(action, body).await?;
        check_status(res, action).await.map(|_| ())
    }
}

#[async_trait]
impl Collection for ChromaCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, documents: &[Document]) -> Result<(), RagError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(RagError::Internal(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let metadatas: Vec<Value> = documents
            .iter()
            .map(|d| json!({ "source": d.source }))
            .collect();

        self.post_unit(
            "upsert",
            json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": texts,
                "metadatas": metadatas,
            }),
        )
        .await
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<QueryMatch>, RagError> {
        if self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(text).await?;
        let response: QueryResponse = self
            .post(
                "query",
                json!({
                    "query_embeddings": [query_embedding],
                    "n_results": n_results.max(1),
                    "include": ["documents", "distances"],
                }),
            )
            .await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let documents = response
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let mut matches: Vec<QueryMatch> = ids
            .into_iter()
            .enumerate()
            .map(|(idx, id)| {
                let text = documents.get(idx).cloned().flatten().unwrap_or_default();
                let distance = distances.get(idx).copied().flatten().unwrap_or(1.0);
                QueryMatch {
                    id,
                    text,
                    // cosine space: distance = 1 - similarity
                    score: 1.0 - distance,
                }
            })
            .collect();

        rank_best_first(&mut matches);
        matches.truncate(n_results.max(1));
        Ok(matches)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, RagError> {
        let response: GetResponse = self
            .post(
                "get",
                json!({ "ids": [id], "include": ["documents", "metadatas"] }),
            )
            .await?;

        let Some(found_id) = response.ids.into_iter().next() else {
            return Ok(None);
        };
        let text = response
            .documents
            .and_then(|d| d.into_iter().next())
            .flatten()
            .unwrap_or_default();
        let source = response
            .metadatas
            .and_then(|m| m.into_iter().next())
            .flatten()
            .and_then(|m| m.get("source").and_then(|s| s.as_str()).map(str::to_string))
            .unwrap_or_else(|| found_id.clone());

        Ok(Some(Document {
            id: found_id,
            text,
            source,
        }))
    }

    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>, RagError> {
        let response: GetResponse = self
            .post(
                "get",
                json!({ "where": { "source": source }, "include": [] }),
            )
            .await?;
        Ok(response.ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, RagError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.post_unit("delete", json!({ "ids": ids })).await?;
        Ok(ids.len())
    }

    async fn count(&self) -> Result<usize, RagError> {
        let url = format!("{}/count", self.url);
        let res = self
            .client
            .authorized(self.client.client.get(&url))
            .send()
            .await
            .map_err(RagError::store)?;
        read_json::<usize>(res, "count").await
    }
}
