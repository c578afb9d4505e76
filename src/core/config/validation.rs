use super::types::{BackendKind, RagConfig};
use crate::core::errors::RagError;

const MAX_TOP_K: usize = 100;

pub fn validate_config(config: &RagConfig) -> Result<(), RagError> {
    validate_collection_name(&config.store.collection_name)?;

    if config.store.backend == BackendKind::Remote {
        let remote = &config.store.remote;
        require_non_empty("store.remote.api_key", remote.api_key.as_deref())?;
        require_non_empty("store.remote.tenant", remote.tenant.as_deref())?;
        require_non_empty("store.remote.database", remote.database.as_deref())?;
        require_non_empty("store.remote.url", Some(remote.url.as_str()))?;
    }

    validate_range("retrieval.top_k", config.retrieval.top_k, 1, MAX_TOP_K)?;
    validate_range("embedding.dimension", config.embedding.dimension, 8, 8192)?;

    if config.chunking.enabled {
        validate_range("chunking.chunk_size", config.chunking.chunk_size, 1, 1_000_000)?;
        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            return Err(RagError::Configuration(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".to_string(),
            ));
        }
    }

    if !config.llm.mock {
        require_non_empty("llm.base_url", Some(config.llm.base_url.as_str()))?;
        require_non_empty("llm.model", Some(config.llm.model.as_str()))?;
    }

    Ok(())
}

/// Collection names follow the remote backend's rules so a config works
/// against both backends: 3-63 chars of `[A-Za-z0-9_-]`.
pub fn validate_collection_name(name: &str) -> Result<(), RagError> {
    let len = name.chars().count();
    if !(3..=63).contains(&len) {
        return Err(RagError::Configuration(format!(
            "store.collection_name must be 3-63 characters, got {}",
            len
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RagError::Configuration(format!(
            "store.collection_name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: Option<&str>) -> Result<(), RagError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(RagError::Configuration(format!("{} is required", field))),
    }
}

fn validate_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), RagError> {
    if value < min || value > max {
        return Err(RagError::Configuration(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}
