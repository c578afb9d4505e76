use thiserror::Error;

use crate::core::errors::RagError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] RagError),

    #[error("Failed to initialize answer generator: {0}")]
    Generator(#[source] RagError),
}
