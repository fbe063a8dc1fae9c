//! Configuration management for nexsync.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) with support for:
//! - Multiple embedding providers with fallback priority
//! - Qdrant connection and the shared collection name
//! - Source data directory, schema file and batch size

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use nexsync_embeddings::{default_endpoint, default_model, EmbeddingConfig, EmbeddingProviderConfig};

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

/// Default number of records embedded and written per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding `<MODEL>_data.json` source files
    pub data_dir: PathBuf,
    /// JSON file with the schema registry rows
    pub schema_path: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8787").parse().unwrap_or(8787),
            },
            qdrant: QdrantConfig {
                url: env_or("QDRANT_URL", "http://localhost:6334"),
                collection: env_or("QDRANT_COLLECTION", "nexsync_unified"),
            },
            embedding: Self::parse_embedding_config(),
            sync: SyncConfig {
                data_dir: PathBuf::from(env_or("DATA_DIR", "./data")),
                schema_path: PathBuf::from(env_or("SCHEMA_PATH", "./data/schema.json")),
                batch_size: env_or("SYNC_BATCH_SIZE", &DEFAULT_BATCH_SIZE.to_string())
                    .parse()
                    .ok()
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(DEFAULT_BATCH_SIZE),
            },
            logging: LoggingConfig {
                json: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            },
        }
    }

    /// Embedding providers from the environment, lowest priority first.
    ///
    /// A hosted provider is enabled by its API key, Ollama by `OLLAMA_URL`.
    /// Each one can override its model and priority.
    fn parse_embedding_config() -> EmbeddingConfig {
        const PROVIDERS: &[(&str, &str, &str, u8)] = &[
            // name, enabling variable, env prefix, default priority
            ("gemini", "GOOGLE_API_KEY", "GEMINI", 1),
            ("openai", "OPENAI_API_KEY", "OPENAI", 2),
            ("ollama", "OLLAMA_URL", "OLLAMA", 3),
        ];

        let mut providers: Vec<EmbeddingProviderConfig> = PROVIDERS
            .iter()
            .filter_map(|&(name, var, prefix, priority)| {
                let value = env::var(var).ok().filter(|v| !v.is_empty())?;
                let (base_url, api_key) = if name == "ollama" {
                    (value, String::new())
                } else {
                    (default_endpoint(name).to_string(), value)
                };
                Some(EmbeddingProviderConfig {
                    name: name.to_string(),
                    base_url,
                    model: env_or(&format!("{}_EMBEDDING_MODEL", prefix), default_model(name)),
                    api_key,
                    priority: env_or(&format!("{}_PRIORITY", prefix), "")
                        .parse()
                        .unwrap_or(priority),
                })
            })
            .collect();
        providers.sort_by_key(|p| p.priority);

        // Shared by every provider and the placeholder vectors so the
        // collection survives adding or swapping a provider.
        let dimension = env_or("EMBEDDING_DIMENSION", "768").parse().unwrap_or(768);

        EmbeddingConfig {
            providers,
            dimension,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
