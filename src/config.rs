//! TOML configuration.
//!
//! Every section is optional; missing values fall back to the defaults the
//! pipeline was tuned with (500-character chunks with 100 characters of
//! overlap, a local MiniLM embedder, and a Groq-hosted Llama model).
//!
//! API keys are never read from the file, only from the environment
//! variable named by `llm.api_key_env` (or `OPENAI_API_KEY` for OpenAI
//! embeddings).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Where the collection lives on disk. Both values must stay stable across
/// restarts for an existing collection to be reused.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            collection: default_collection(),
        }
    }
}

impl StoreConfig {
    /// Path of the SQLite file backing the store.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("vectorstore.sqlite")
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("resources/vectorstore")
}
fn default_collection() -> String {
    "real_estate".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_separators() -> Vec<String> {
    vec![
        "\n\n".to_string(),
        "\n".to_string(),
        ".".to_string(),
        " ".to_string(),
    ]
}

/// Retrieval depth rule: queries mentioning any `summary_keywords` get
/// `summary_k` chunks, everything else gets `default_k`.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_summary_k")]
    pub summary_k: usize,
    #[serde(default = "default_summary_keywords")]
    pub summary_keywords: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            summary_k: default_summary_k(),
            summary_keywords: default_summary_keywords(),
        }
    }
}

fn default_k() -> usize {
    20
}
fn default_summary_k() -> usize {
    35
}
fn default_summary_keywords() -> Vec<String> {
    vec!["summary".to_string(), "summarize".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL override. Defaults depend on the provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults depend on the provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_llm_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "groq".to_string()
}
fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    500
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Index the URLs that could be fetched instead of failing the batch.
    #[serde(default)]
    pub skip_failed_urls: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            skip_failed_urls: false,
        }
    }
}

fn default_max_urls() -> usize {
    3
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("webquery-rag/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.store.collection.trim().is_empty() {
            bail!("store.collection must not be empty");
        }

        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.default_k < 1 || self.retrieval.summary_k < 1 {
            bail!("retrieval.default_k and retrieval.summary_k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.llm.provider.as_str() {
            "disabled" | "groq" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled, groq, openai, or ollama.",
                other
            ),
        }

        if self.loader.max_urls == 0 {
            bail!("loader.max_urls must be >= 1");
        }

        Ok(())
    }
}

/// Load and validate a config file.
///
/// A missing file is not an error: the defaults are used so that `wq` works
/// out of the box in an empty directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Parse config TOML without touching the filesystem.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.separators, vec!["\n\n", "\n", ".", " "]);
        assert_eq!(config.retrieval.default_k, 20);
        assert_eq!(config.retrieval.summary_k, 35);
        assert_eq!(config.store.collection, "real_estate");
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.loader.max_urls, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [chunking]
            chunk_size = 200

            [store]
            dir = "/tmp/wq"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.store.db_path(), PathBuf::from("/tmp/wq/vectorstore.sqlite"));
        assert_eq!(config.store.collection, "real_estate");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let config = parse_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn unknown_providers_rejected() {
        let config = parse_config("[llm]\nprovider = \"mystery\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = parse_config("[embedding]\nprovider = \"mystery\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_embeddings_need_model_and_dims() {
        let config = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
        )
        .unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(include_str!("../config/wq.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.llm.max_tokens, 500);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/definitely/not/here/wq.toml")).unwrap();
        assert_eq!(config.retrieval.default_k, 20);
    }
}
