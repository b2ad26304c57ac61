//! Engine configuration.
//!
//! Loaded from a TOML file with environment-variable overrides, mirroring
//! the teacher's `RLM_DB_PATH` env-override convention in
//! `cli::parser::Cli`. Every operator tunable (embedding model, index
//! paths, ontology path, guardrail config path, locale defaults,
//! concurrency ceilings, cache TTLs, session timeout, OCR confidence
//! discount) lives here so the rest of the engine takes configuration as an
//! explicit argument rather than reading the environment itself.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "fincore-state.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".fincore/fincore-state.db";

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "FINCORE_DB_PATH";

/// Environment variable overriding the ontology file path.
pub const ENV_ONTOLOGY_PATH: &str = "FINCORE_ONTOLOGY_PATH";

/// Environment variable overriding the guardrail config file path.
pub const ENV_GUARDRAILS_PATH: &str = "FINCORE_GUARDRAILS_PATH";

/// Top-level engine configuration, loaded once at startup and threaded
/// through the orchestrator as an `Arc<EngineConfig>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Path to the ontology YAML file.
    pub ontology_path: PathBuf,
    /// Path to the guardrail rules YAML file.
    pub guardrails_path: PathBuf,
    /// Embedding configuration.
    pub embedding: EmbeddingConfig,
    /// Retrieval configuration.
    pub retrieval: RetrievalConfig,
    /// Locale defaults applied when a document does not declare its own.
    pub locale: LocaleConfig,
    /// Concurrency ceilings.
    pub concurrency: ConcurrencyConfig,
    /// Cache time-to-live settings, in seconds.
    pub cache: CacheConfig,
    /// Session timeout, in seconds.
    pub session_timeout_seconds: i64,
    /// Multiplier applied to OCR-sourced confidence scores: OCR confidence
    /// is discounted relative to native extraction by this factor.
    pub ocr_confidence_discount: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            ontology_path: PathBuf::from("ontology.yaml"),
            guardrails_path: PathBuf::from("guardrails.yaml"),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            locale: LocaleConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            cache: CacheConfig::default(),
            session_timeout_seconds: crate::access::session::DEFAULT_SESSION_TTL_SECONDS,
            ocr_confidence_discount: 0.8,
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier passed to the embedder factory.
    pub model: String,
    /// Embedding vector width.
    pub dimensions: usize,
    /// Max texts per batch call.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "bge-small-en-v1.5".to_string(),
            dimensions: crate::embedding::DEFAULT_DIMENSIONS,
            batch_size: 32,
        }
    }
}

/// Retrieval fusion and reranking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of results returned from `retrieve`.
    pub top_k: usize,
    /// Lexical (BM25) weight in weighted min-max fusion.
    pub lexical_weight: f32,
    /// Dense weight in weighted min-max fusion.
    pub dense_weight: f32,
    /// Whether cross-encoder reranking runs after fusion.
    pub rerank_enabled: bool,
    /// Number of top fused results passed into the reranker.
    pub rerank_candidates: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            lexical_weight: 0.4,
            dense_weight: 0.6,
            rerank_enabled: false,
            rerank_candidates: 50,
        }
    }
}

/// Locale defaults for number/period parsing when a document doesn't state
/// its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// BCP-47-ish locale tag, e.g. `it-IT`, `en-US`.
    pub default_locale: String,
    /// ISO currency code assumed when a figure carries no currency marker.
    pub default_currency: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_locale: "it-IT".to_string(),
            default_currency: "EUR".to_string(),
        }
    }
}

/// Concurrency ceilings for ingest and query paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum documents being extracted at once.
    pub max_concurrent_ingests: usize,
    /// Maximum in-flight orchestrator queries.
    pub max_concurrent_queries: usize,
    /// Bounded queue depth before `OrchestratorError::QueueFull`.
    pub ingest_queue_capacity: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_ingests: 4,
            max_concurrent_queries: 16,
            ingest_queue_capacity: 256,
        }
    }
}

/// Cache time-to-live configuration, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Query-result cache TTL.
    pub query_cache_ttl_seconds: u64,
    /// Maximum cached query entries.
    pub query_cache_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_cache_ttl_seconds: 300,
            query_cache_capacity: 512,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file at `path`, then applies
    /// environment-variable overrides for the paths most operators need to
    /// change without editing the file (db/ontology/guardrails paths).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as
    /// valid configuration TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file: {e}"),
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|e| Error::Config {
            message: format!("failed to parse config file: {e}"),
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Returns the default configuration with environment overrides
    /// applied, used when no config file is given.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(ENV_ONTOLOGY_PATH) {
            self.ontology_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(ENV_GUARDRAILS_PATH) {
            self.guardrails_path = PathBuf::from(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_spec_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retrieval.lexical_weight, 0.4);
        assert_eq!(config.retrieval.dense_weight, 0.6);
        assert_eq!(config.ocr_confidence_discount, 0.8);
    }

    #[test]
    fn test_load_parses_toml_and_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fincore.toml");
        std::fs::write(
            &path,
            r#"
            [retrieval]
            top_k = 25
            lexical_weight = 0.4
            dense_weight = 0.6
            rerank_enabled = true
            rerank_candidates = 50
            "#,
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 25);
        assert!(config.retrieval.rerank_enabled);
        // Unset sections fall back to defaults.
        assert_eq!(config.locale.default_currency, "EUR");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = EngineConfig::load(Path::new("/nonexistent/fincore.toml"));
        assert!(result.is_err());
    }
}
