use async_trait::async_trait;

use super::provider::{ensure_query, AnswerGenerator};
use crate::core::errors::RagError;
use crate::rag::pipeline::NO_INFORMATION_ANSWER;

const PREFIX: &str = "Based on the available information: ";
const MAX_PASSAGE_CHARS: usize = 500;

/// Network-free generator that answers with the best passage verbatim.
/// Same input, same output.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, query: &str, context: &[String]) -> Result<String, RagError> {
        ensure_query(query)?;

        let Some(passage) = context
            .iter()
            .map(|p| p.trim())
            .find(|p| !p.is_empty())
        else {
            return Ok(NO_INFORMATION_ANSWER.to_string());
        };

        let mut excerpt: String = passage.chars().take(MAX_PASSAGE_CHARS).collect();
        if passage.chars().count() > MAX_PASSAGE_CHARS {
            excerpt = format!("{}...", excerpt.trim_end());
        } else if !excerpt.ends_with(['.', '!', '?']) {
            excerpt.push('.');
        }

        Ok(format!("{}{}", PREFIX, excerpt))
    }
}
