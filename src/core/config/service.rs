use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::types::RagConfig;
use super::validation::validate_config;
use crate::core::errors::RagError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
];

/// Environment variable → dotted config path.
const ENV_OVERRIDES: [(&str, &str); 16] = [
    ("RAG_BACKEND", "store.backend"),
    ("RAG_PERSIST_PATH", "store.persistence_path"),
    ("RAG_COLLECTION", "store.collection_name"),
    ("CHROMA_URL", "store.remote.url"),
    ("CHROMA_API_KEY", "store.remote.api_key"),
    ("CHROMA_TENANT", "store.remote.tenant"),
    ("CHROMA_DATABASE", "store.remote.database"),
    ("RAG_EMBEDDER", "embedding.provider"),
    ("OLLAMA_HOST", "llm.base_url"),
    ("OLLAMA_MODEL", "llm.model"),
    ("RAG_EMBEDDING_MODEL", "embedding.model"),
    ("USE_MOCK_LLM", "llm.mock"),
    ("RAG_TOP_K", "retrieval.top_k"),
    ("RAG_LOG_DIR", "logging.dir"),
    ("HOST", "server.host"),
    ("PORT", "server.port"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("RAG_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let data_config = self.paths.data_dir.join("config.yml");
        if data_config.exists() {
            return data_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Loads the YAML config, layers process environment on top and validates.
    pub fn load_config(&self) -> Result<RagConfig, RagError> {
        self.load_with_env(&self.config_path(), env::vars())
    }

    pub fn load_with_env<I>(&self, path: &Path, vars: I) -> Result<RagConfig, RagError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_config = load_yaml_file(path)?;
        let merged = deep_merge(&file_config, &env_overrides(vars));

        let mut config: RagConfig = serde_json::from_value(merged)
            .map_err(|e| RagError::Configuration(format!("invalid config: {}", e)))?;

        if config.store.persistence_path.is_none() {
            config.store.persistence_path = Some(self.paths.db_path.clone());
        }
        if config.logging.dir.is_none() {
            config.logging.dir = Some(self.paths.log_dir.clone());
        }

        validate_config(&config)?;
        Ok(config)
    }

    pub fn redact_sensitive_values(&self, config: &RagConfig) -> Value {
        serde_json::to_value(config)
            .map(|value| redact_sensitive_values(&value))
            .unwrap_or(Value::Null)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, RagError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;

    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(RagError::Configuration(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
        Err(e) => Err(RagError::Configuration(format!(
            "failed to parse {}: {}",
            path.display(),
            e
        ))),
    }
}

fn env_overrides<I>(vars: I) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Value::Object(Map::new());

    for (key, raw) in vars {
        let Some((_, path)) = ENV_OVERRIDES.iter().find(|(name, _)| *name == key) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let value = match key.as_str() {
            "USE_MOCK_LLM" => Value::Bool(parse_flag(raw)),
            "RAG_TOP_K" | "PORT" => match raw.parse::<u64>() {
                Ok(n) => Value::from(n),
                // left as a string so deserialization reports the bad value
                Err(_) => Value::String(raw.to_string()),
            },
            "RAG_BACKEND" | "RAG_EMBEDDER" => Value::String(raw.to_lowercase()),
            _ => Value::String(raw.to_string()),
        };

        let segments: Vec<&str> = path.split('.').collect();
        ensure_object_path(&mut root, &segments, value);

        if key == "OLLAMA_HOST" {
            ensure_object_path(
                &mut root,
                &["embedding", "base_url"],
                Value::String(raw.to_string()),
            );
        }
    }

    root
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
