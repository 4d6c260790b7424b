use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EasyConfig {
    pub logging: LoggingConfig,
    pub hub: HubConfig,
    pub models: ModelsConfig,
    pub document: DocumentConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HubConfig {
    /// Base URL of the Hugging Face hub (API and file resolution).
    pub hf_endpoint: String,
    /// Maximum records requested per hub search.
    pub search_limit: usize,
    /// Extra Flair embedding names searched when `user_uploaded` is set.
    pub flair_user_models: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub cache_dir: String,
    /// Sub-token limit for transformer inputs.
    pub max_seq_len: usize,
    /// URL template for static word vectors, `{name}` is substituted.
    pub word_vectors_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DocumentConfig {
    pub pool: PoolConfig,
    pub rnn: RnnConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    /// One of `mean`, `min`, `max`.
    pub pooling: String,
    /// One of `none`, `linear`, `nonlinear`.
    pub fine_tune_mode: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RnnConfig {
    pub hidden_size: usize,
    pub rnn_layers: usize,
    pub reproject_words: bool,
    pub reproject_words_dimension: Option<usize>,
    pub bidirectional: bool,
    pub dropout: f32,
    pub word_dropout: f32,
    pub locked_dropout: f32,
    /// One of `gru`, `lstm`.
    pub rnn_type: String,
    pub fine_tune: bool,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hf_endpoint: "https://huggingface.co".into(),
            search_limit: 20,
            flair_user_models: Vec::new(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let cache_dir = default_easynlp_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            cache_dir,
            max_seq_len: 512,
            word_vectors_url: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pooling: "mean".into(),
            fine_tune_mode: "linear".into(),
        }
    }
}

impl Default for RnnConfig {
    fn default() -> Self {
        Self {
            hidden_size: 512,
            rnn_layers: 1,
            reproject_words: true,
            reproject_words_dimension: Some(256),
            bidirectional: false,
            dropout: 0.5,
            word_dropout: 0.0,
            locked_dropout: 0.0,
            rnn_type: "gru".into(),
            fine_tune: true,
            seed: 42,
        }
    }
}

/// Returns `~/.easynlp/`
pub fn default_easynlp_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".easynlp")
}

/// Returns the default config file path: `~/.easynlp/config.toml`
pub fn default_config_path() -> PathBuf {
    default_easynlp_dir().join("config.toml")
}

impl EasyConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EasyConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (EASYNLP_CACHE_DIR, EASYNLP_HF_ENDPOINT, EASYNLP_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EASYNLP_CACHE_DIR") {
            self.models.cache_dir = val;
        }
        if let Ok(val) = std::env::var("EASYNLP_HF_ENDPOINT") {
            self.hub.hf_endpoint = val;
        }
        if let Ok(val) = std::env::var("EASYNLP_LOG_LEVEL") {
            self.logging.log_level = val;
        }
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.models.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
