//! Global configuration types for Colloquy.
//!
//! `GlobalConfig` represents the top-level `config.toml` that selects the
//! chat storage backend and configures the embedding endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level configuration.
///
/// Loaded from `~/.colloquy/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// User id used by the CLI when `--user` is not given.
    #[serde(default)]
    pub default_user: Option<String>,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding endpoint settings. Embedding commands are unavailable
    /// when this section is missing.
    #[serde(default)]
    pub embeddings: Option<EmbeddingsConfig>,
}

/// Which chat history backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Process-local maps. Nothing survives the process, so the `colloquy`
    /// CLI refuses chat and message commands with this backend; it serves
    /// embedding-only setups and tests.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite URL. Defaults to `{data_dir}/colloquy.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// SageMaker-style embedding endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Name of the deployed endpoint; unique within a region.
    pub endpoint_name: String,
    /// AWS region, e.g. `us-west-2`. Falls back to `AWS_REGION`.
    #[serde(default)]
    pub region: Option<String>,
    /// Profile in the shared credentials file. Falls back to ambient credentials.
    #[serde(default)]
    pub credentials_profile: Option<String>,
    /// Number of texts grouped into one endpoint call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the runtime base URL (VPC endpoints, local testing).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Keyword arguments merged into the request payload.
    #[serde(default)]
    pub model_kwargs: Map<String, Value>,
    /// Extra invocation options (`CustomAttributes`, `TargetVariant`, ...).
    #[serde(default)]
    pub endpoint_kwargs: Map<String, Value>,
}

pub fn default_chunk_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingsConfig {
    pub fn new(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            region: None,
            credentials_profile: None,
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
            endpoint_url: None,
            model_kwargs: Map::new(),
            endpoint_kwargs: Map::new(),
        }
    }
}
