//! Vector backend contract.
//!
//! A [`VectorClient`] hands out named collections; each [`Collection`] is
//! bound to one embedding function and does its own text → vector work, so
//! callers only ever deal in text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::embedding::EmbeddingFunction;
use super::types::Document;
use crate::core::errors::RagError;

/// A nearest-neighbor hit as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub text: String,
    /// Similarity, higher is better.
    pub score: f32,
}

/// Sorts best first. The sort is stable, so equal scores keep the order the
/// backend returned them in; NaN scores rank last.
pub(crate) fn rank_best_first(matches: &mut [QueryMatch]) {
    fn key(score: f32) -> f32 {
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }
    matches.sort_by(|a, b| key(b.score).total_cmp(&key(a.score)));
}

#[async_trait]
pub trait VectorClient: Send + Sync {
    /// Backend label used in logs ("sqlite", "chroma").
    fn backend(&self) -> &str;

    async fn get_or_create_collection(
        &self,
        name: &str,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Arc<dyn Collection>, RagError>;
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts or replaces records by id. A replaced record keeps its
    /// original insertion position.
    async fn upsert(&self, documents: &[Document]) -> Result<(), RagError>;

    /// Top `n_results` matches, best first; ties keep insertion order.
    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<QueryMatch>, RagError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, RagError>;

    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>, RagError>;

    async fn delete(&self, ids: &[String]) -> Result<usize, RagError>;

    async fn count(&self) -> Result<usize, RagError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            text: String::new(),
            score,
        }
    }

    #[test]
    fn ranking_keeps_tie_order_and_sinks_nan() {
        let mut matches = vec![
            hit("nan", f32::NAN),
            hit("first-tie", 0.5),
            hit("best", 0.9),
            hit("second-tie", 0.5),
            hit("worst", -0.2),
        ];

        rank_best_first(&mut matches);

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "first-tie", "second-tie", "worst", "nan"]);
    }
}
