
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;
use crate::resolver::MAX_RESULTS_CAP;

/// Environment variable overriding the config directory, mainly for tests
const CONFIG_DIR_ENV: &str = "ANSWERDESK_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Tuning for the answer resolver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverSettings {
    /// Passages returned per resolution
    pub max_results: usize,
    /// Overall budget for one resolution, embedding call included
    pub timeout_seconds: u64,
}

impl Default for ResolverSettings {
    #[inline]
    fn default() -> Self {
        Self {
            max_results: 8,
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid target chunk size: {0} (must be between 100 and 4096 characters)")]
    InvalidTargetChunkSize(usize),
    #[error("Max chunk size ({0}) must be greater than target chunk size ({1})")]
    MaxChunkSizeTooSmall(usize, usize),
    #[error("Target chunk size ({0}) must be greater than min chunk size ({1})")]
    TargetChunkSizeTooSmall(usize, usize),
    #[error("Invalid overlap size: {0} (must be smaller than min chunk size {1})")]
    InvalidOverlapSize(usize, usize),
    #[error("Invalid max results: {0} (must be between 1 and {1})")]
    InvalidMaxResults(usize, usize),
    #[error("Invalid resolver timeout: {0} (must be between 1 and 60 seconds)")]
    InvalidResolverTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Resolve the application config directory
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join("answerdesk"))
        .ok_or_else(|| ConfigError::DirectoryError.into())
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            resolver: ResolverSettings::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default config directory
    #[inline]
    pub fn load() -> Result<Self> {
        Self::load_from(get_config_dir()?)
    }

    /// Load configuration from an explicit directory; missing files fall back
    /// to defaults so a fresh install works without a setup step
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            let mut config = Self::default();
            config.base_dir = config_dir.as_ref().to_path_buf();
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

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
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path of the SQLite metadata database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("metadata.db")
    }

    /// Directory holding the LanceDB vector tables
    #[inline]
    pub fn vector_db_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    /// Base URL of the embedding provider
    #[inline]
    pub fn ollama_url(&self) -> Result<Url> {
        let raw = format!(
            "{}://{}:{}",
            self.ollama.protocol, self.ollama.host, self.ollama.port
        );
        Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw).into())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ollama.protocol != "http" && self.ollama.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.ollama.protocol.clone()));
        }
        if self.ollama.port == 0 {
            return Err(ConfigError::InvalidPort(self.ollama.port));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.ollama.model.clone()));
        }
        if self.ollama.batch_size == 0 || self.ollama.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.ollama.batch_size));
        }
        if !(64..=4096).contains(&self.ollama.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.ollama.embedding_dimension,
            ));
        }

        if !(100..=4096).contains(&self.chunking.target_chars) {
            return Err(ConfigError::InvalidTargetChunkSize(
                self.chunking.target_chars,
            ));
        }
        if self.chunking.max_chars <= self.chunking.target_chars {
            return Err(ConfigError::MaxChunkSizeTooSmall(
                self.chunking.max_chars,
                self.chunking.target_chars,
            ));
        }
        if self.chunking.target_chars <= self.chunking.min_chars {
            return Err(ConfigError::TargetChunkSizeTooSmall(
                self.chunking.target_chars,
                self.chunking.min_chars,
            ));
        }
        if self.chunking.overlap_chars >= self.chunking.min_chars {
            return Err(ConfigError::InvalidOverlapSize(
                self.chunking.overlap_chars,
                self.chunking.min_chars,
            ));
        }

        if self.resolver.max_results == 0 || self.resolver.max_results > MAX_RESULTS_CAP {
            return Err(ConfigError::InvalidMaxResults(
                self.resolver.max_results,
                MAX_RESULTS_CAP,
            ));
        }
        if self.resolver.timeout_seconds == 0 || self.resolver.timeout_seconds > 60 {
            return Err(ConfigError::InvalidResolverTimeout(
                self.resolver.timeout_seconds,
            ));
        }

        Ok(())
    }
}
