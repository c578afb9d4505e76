use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rag_service::core::config::{
    BackendKind, EmbeddingConfig, RemoteCredentials, StoreConfig,
};
use rag_service::core::errors::RagError;
use rag_service::rag::EmbeddingStore;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const TOKEN: &str = "ck-test";

#[derive(Clone)]
struct Record {
    id: String,
    embedding: Vec<f32>,
    document: String,
    metadata: Value,
}

#[derive(Clone, Default)]
struct FakeChroma {
    records: Arc<Mutex<Vec<Record>>>,
    metadata: Arc<Mutex<Option<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-chroma-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == TOKEN)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "bad token").into_response()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

fn as_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

async fn create_collection(
    State(fake): State<FakeChroma>,
    Path((_tenant, _database)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut stored = fake.metadata.lock().unwrap();
    let metadata = stored.get_or_insert_with(|| body["metadata"].clone()).clone();
    Json(json!({ "id": "c-1", "name": body["name"], "metadata": metadata })).into_response()
}

async fn upsert(
    State(fake): State<FakeChroma>,
    Path(_): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let ids = as_strings(&body["ids"]);
    let documents = as_strings(&body["documents"]);
    let mut records = fake.records.lock().unwrap();

    for (idx, id) in ids.into_iter().enumerate() {
        let embedding: Vec<f32> = serde_json::from_value(body["embeddings"][idx].clone()).unwrap();
        let record = Record {
            id: id.clone(),
            embedding,
            document: documents[idx].clone(),
            metadata: body["metadatas"][idx].clone(),
        };
        match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }
    Json(json!({})).into_response()
}

async fn query(
    State(fake): State<FakeChroma>,
    Path(_): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let target: Vec<f32> = serde_json::from_value(body["query_embeddings"][0].clone()).unwrap();
    let n = body["n_results"].as_u64().unwrap_or(1) as usize;

    let mut scored: Vec<(f32, Record)> = fake
        .records
        .lock()
        .unwrap()
        .iter()
        .map(|r| (cosine_distance(&target, &r.embedding), r.clone()))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    scored.truncate(n);

    Json(json!({
        "ids": [scored.iter().map(|(_, r)| r.id.clone()).collect::<Vec<_>>()],
        "documents": [scored.iter().map(|(_, r)| r.document.clone()).collect::<Vec<_>>()],
        "distances": [scored.iter().map(|(d, _)| *d).collect::<Vec<_>>()],
    }))
    .into_response()
}

async fn get_records(
    State(fake): State<FakeChroma>,
    Path(_): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let ids = as_strings(&body["ids"]);
    let source = body["where"]["source"].as_str().map(str::to_string);

    let found: Vec<Record> = fake
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|r| ids.is_empty() || ids.contains(&r.id))
        .filter(|r| match &source {
            Some(s) => r.metadata["source"] == *s,
            None => true,
        })
        .cloned()
        .collect();

    Json(json!({
        "ids": found.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
        "documents": found.iter().map(|r| r.document.clone()).collect::<Vec<_>>(),
        "metadatas": found.iter().map(|r| r.metadata.clone()).collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn delete(
    State(fake): State<FakeChroma>,
    Path(_): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let ids = as_strings(&body["ids"]);
    fake.records.lock().unwrap().retain(|r| !ids.contains(&r.id));
    Json(json!({})).into_response()
}

async fn count(State(fake): State<FakeChroma>) -> Response {
    Json(json!(fake.records.lock().unwrap().len())).into_response()
}

async fn spawn(fake: FakeChroma) -> String {
    let base = "/api/v2/tenants/:tenant/databases/:database/collections";
    let app = Router::new()
        .route(base, post(create_collection))
        .route(&format!("{}/:id/upsert", base), post(upsert))
        .route(&format!("{}/:id/query", base), post(query))
        .route(&format!("{}/:id/get", base), post(get_records))
        .route(&format!("{}/:id/delete", base), post(delete))
        .route(&format!("{}/:id/count", base), get(count))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn remote_config(url: String, api_key: &str) -> StoreConfig {
    StoreConfig {
        backend: BackendKind::Remote,
        remote: RemoteCredentials {
            url,
            api_key: Some(api_key.to_string()),
            tenant: Some("acme".to_string()),
            database: Some("docs".to_string()),
        },
        ..StoreConfig::default()
    }
}

#[tokio::test]
async fn remote_store_round_trips_through_chroma_api() {
    let fake = FakeChroma::default();
    let url = spawn(fake.clone()).await;

    let store = EmbeddingStore::initialize(&remote_config(url, TOKEN), &EmbeddingConfig::default())
        .await
        .unwrap();
    assert_eq!(store.backend(), "chroma");
    assert!(store.query("anything", 1).await.unwrap().is_empty());

    store
        .add(
            "Kubernetes is an open-source container orchestration system.",
            "k8s",
        )
        .await
        .unwrap();
    store
        .add("Paris is the capital of France.", "paris")
        .await
        .unwrap();
    store
        .add("Paris is the capital and largest city of France.", "paris")
        .await
        .unwrap();

    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.contains("k8s").await.unwrap());
    assert!(!store.contains("missing").await.unwrap());

    let passages = store.query("container orchestration", 1).await.unwrap();
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].id, "k8s");
    assert!(passages[0].score > 0.0);

    let metadata = fake.metadata.lock().unwrap().clone().unwrap();
    assert_eq!(metadata["hnsw:space"], "cosine");
}

#[tokio::test]
async fn rejected_token_is_store_unavailable() {
    let url = spawn(FakeChroma::default()).await;

    let err = EmbeddingStore::initialize(
        &remote_config(url, "wrong-token"),
        &EmbeddingConfig::default(),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(err, RagError::StoreUnavailable(_)));
}

#[tokio::test]
async fn collection_bound_to_other_embedder_is_refused() {
    let url = spawn(FakeChroma::default()).await;

    EmbeddingStore::initialize(&remote_config(url.clone(), TOKEN), &EmbeddingConfig::default())
        .await
        .unwrap();

    let other = EmbeddingConfig {
        dimension: 64,
        ..EmbeddingConfig::default()
    };
    let err = EmbeddingStore::initialize(&remote_config(url, TOKEN), &other)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, RagError::Configuration(_)));
}
