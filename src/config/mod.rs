
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;

/// Gemini allows at most 100 texts per batch embedding request.
const MAX_EMBED_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// Loaded from the `GEMINI_API_KEY` environment variable, never from disk.
    #[serde(skip)]
    pub api_key: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimension: usize,
    pub batch_size: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            embedding_model: "gemini-embedding-001".to_string(),
            chat_model: "gemini-2.0-flash-lite".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks joined into the answer context.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 40,
            window_secs: 3600,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid embedding dimension: {0} (must be between 64 and 8192)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid batch size: {0} (must be between 1 and {MAX_EMBED_BATCH_SIZE})")]
    InvalidBatchSize(usize),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be greater than 0)")]
    InvalidTopK(usize),
    #[error("Invalid rate limit quota: {0} (must be greater than 0)")]
    InvalidMaxRequests(u32),
    #[error("Invalid rate limit window: {0} seconds (must be greater than 0)")]
    InvalidWindow(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load the configuration from `config.toml` under `base_dir`, falling
    /// back to defaults when the file does not exist. The Gemini API key is
    /// always taken from the `GEMINI_API_KEY` environment variable.
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Config::default()
        };

        config.base_dir = base_dir.as_ref().to_path_buf();
        config.gemini.api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create config directory: {}", self.base_dir.display())
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(64..=8192).contains(&self.gemini.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.gemini.embedding_dimension,
            ));
        }

        if self.gemini.batch_size == 0 || self.gemini.batch_size > MAX_EMBED_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.gemini.batch_size));
        }

        if self.gemini.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.gemini.embedding_model.clone()));
        }

        if self.gemini.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.gemini.chat_model.clone()));
        }

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }

        // An overlap at or above the chunk size would stall the chunking
        // cursor, so it is rejected here rather than handled downstream.
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidMaxRequests(self.rate_limit.max_requests));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidWindow(self.rate_limit.window_secs));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the per-document index and chunk artifacts.
    #[inline]
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    #[inline]
    pub fn ensure_data_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(dir)
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

/// Default base directory for configuration and document artifacts.
#[inline]
pub fn default_base_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Could not determine a data directory for this platform")?
        .join("askdoc");
    Ok(dir)
}
