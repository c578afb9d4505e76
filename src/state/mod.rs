use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, RagConfig};
use crate::llm::{generator_from_config, AnswerGenerator};
use crate::rag::{Chunker, RagPipeline, SharedStore};

pub mod error;

use error::InitializationError;

/// State shared by every route.
///
/// The store is not opened here; `SharedStore` builds it on first use so a
/// slow or absent backend does not block startup.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config_service: ConfigService,
    pub config: Arc<RagConfig>,
    pub store: Arc<SharedStore>,
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    /// Resolves paths and loads configuration. Runs before logging is set up,
    /// since the log directory comes from the loaded config.
    pub fn load_config() -> Result<(Arc<AppPaths>, ConfigService, RagConfig), InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config_service = ConfigService::new(paths.clone());
        let config = config_service
            .load_config()
            .map_err(InitializationError::Config)?;
        Ok((paths, config_service, config))
    }

    /// Selects the generator and wires the pipeline.
    pub fn initialize(
        paths: Arc<AppPaths>,
        config_service: ConfigService,
        config: RagConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let generator =
            generator_from_config(&config.llm).map_err(InitializationError::Generator)?;

        Ok(Arc::new(Self::from_parts(
            paths,
            config_service,
            config,
            generator,
        )))
    }

    /// Assembles state from an already loaded config. Tests use this to plug
    /// in their own generator.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config_service: ConfigService,
        config: RagConfig,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let store = Arc::new(SharedStore::from_config(
            config.store.clone(),
            config.embedding.clone(),
        ));

        let pipeline = RagPipeline::new(store.clone(), generator)
            .with_top_k(config.retrieval.top_k)
            .with_chunker(Chunker::from_config(&config.chunking));

        Self {
            paths,
            config_service,
            config: Arc::new(config),
            store,
            pipeline: Arc::new(pipeline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StoreConfig;

    #[test]
    fn initialize_selects_configured_generator() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            dir.path().to_path_buf(),
            dir.path().join("data"),
        ));
        let mut config = RagConfig {
            store: StoreConfig::in_memory(),
            ..RagConfig::default()
        };
        config.llm.mock = true;
        config.retrieval.top_k = 3;

        let state = AppState::initialize(paths.clone(), ConfigService::new(paths), config).unwrap();

        assert_eq!(state.pipeline.generator_name(), "mock");
        assert_eq!(state.config.retrieval.top_k, 3);
        assert!(!state.store.is_initialized());
    }
}
