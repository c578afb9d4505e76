use std::sync::Arc;

use async_trait::async_trait;

use super::mock::MockGenerator;
use super::ollama::OllamaGenerator;
use crate::core::config::LlmConfig;
use crate::core::errors::RagError;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// generator label for logs ("ollama", "mock")
    fn name(&self) -> &str;

    /// answer `query` from `context`, passages in ranking order
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, RagError>;
}

/// Chooses the generator variant once, at startup.
pub fn generator_from_config(config: &LlmConfig) -> Result<Arc<dyn AnswerGenerator>, RagError> {
    if config.mock {
        tracing::info!("Using mock answer generator");
        return Ok(Arc::new(MockGenerator::new()));
    }

    let generator = OllamaGenerator::new(config)?;
    tracing::info!(
        "Using Ollama answer generator: model={}, url={}",
        config.model,
        config.base_url
    );
    Ok(Arc::new(generator))
}

pub(crate) fn ensure_query(query: &str) -> Result<(), RagError> {
    if query.trim().is_empty() {
        return Err(RagError::InvalidQuery("query must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_flag_selects_mock() {
        let config = LlmConfig {
            mock: true,
            ..LlmConfig::default()
        };
        assert_eq!(generator_from_config(&config).unwrap().name(), "mock");
    }

    #[test]
    fn default_selects_ollama() {
        let generator = generator_from_config(&LlmConfig::default()).unwrap();
        assert_eq!(generator.name(), "ollama");
    }
}
