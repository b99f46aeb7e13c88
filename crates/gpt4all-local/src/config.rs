//! Model configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::{
    paths, DEFAULT_CTX_SIZE, DEFAULT_DOWNLOAD_URL, DEFAULT_MODELS_DIR, DEFAULT_MODEL_NAME,
    DEFAULT_PORT,
};

/// Configuration for the local model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model identifier (GGUF filename inside `models_dir`)
    pub model_name: String,
    /// Storage directory for weights
    pub models_dir: PathBuf,
    /// Fetch weights over the network when they are missing
    pub allow_download: bool,
    /// Base URL the weights are downloaded from
    pub download_url: String,
    /// Expected SHA-256 of the downloaded weights (hex)
    pub model_sha256: Option<String>,
    /// Path to the llama-server binary
    pub server_binary: PathBuf,
    /// Port the managed llama-server listens on
    pub server_port: u16,
    /// Context window in tokens
    pub ctx_size: u32,
    /// How long to wait for llama-server to report healthy
    pub ready_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            allow_download: true,
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            model_sha256: None,
            server_binary: paths::llama_server_path(),
            server_port: DEFAULT_PORT,
            ctx_size: DEFAULT_CTX_SIZE,
            ready_timeout: Duration::from_secs(120),
        }
    }
}

impl ModelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model_name = lookup("GPT4ALL_MODEL").unwrap_or(defaults.model_name);

        let models_dir = lookup("GPT4ALL_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.models_dir);

        let allow_download = lookup("GPT4ALL_ALLOW_DOWNLOAD")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.allow_download);

        let download_url = lookup("GPT4ALL_DOWNLOAD_URL").unwrap_or(defaults.download_url);

        let model_sha256 = lookup("GPT4ALL_MODEL_SHA256")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());

        let server_binary = lookup("GPT4ALL_LLAMA_SERVER")
            .map(PathBuf::from)
            .unwrap_or(defaults.server_binary);

        let server_port = lookup("GPT4ALL_LLAMA_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.server_port);

        let ctx_size = lookup("GPT4ALL_CTX_SIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ctx_size);

        let ready_timeout = lookup("GPT4ALL_READY_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ready_timeout);

        Self {
            model_name,
            models_dir,
            allow_download,
            download_url,
            model_sha256,
            server_binary,
            server_port,
            ctx_size,
            ready_timeout,
        }
    }

    /// Full path of the configured weight file.
    pub fn model_path(&self) -> PathBuf {
        paths::model_path(&self.models_dir, &self.model_name)
    }

    /// Create a builder for configuration.
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }
}

/// Builder for model configuration.
#[derive(Debug, Default)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.config.model_name = name.into();
        self
    }

    pub fn models_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.models_dir = path.into();
        self
    }

    pub fn allow_download(mut self, allow: bool) -> Self {
        self.config.allow_download = allow;
        self
    }

    pub fn download_url(mut self, url: impl Into<String>) -> Self {
        self.config.download_url = url.into();
        self
    }

    pub fn model_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.config.model_sha256 = Some(sha256.into());
        self
    }

    pub fn server_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.server_binary = path.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn ctx_size(mut self, ctx_size: u32) -> Self {
        self.config.ctx_size = ctx_size;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}
