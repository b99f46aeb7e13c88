//! Lifecycle owner of the loaded model.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::backend::{Backend, GenerationParams, LanguageModel};
use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::llama::LlamaCppBackend;
use crate::prompt::build_prompt;

/// Presence of the cached model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Healthy,
    NotLoaded,
}

/// Health view of the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: ModelStatus,
    pub model_name: String,
    pub models_dir: String,
}

/// Owns at most one loaded model and hands it out to callers.
///
/// Concurrent first callers wait on the same in-flight load. A failed load
/// leaves the manager unloaded, so the next call tries again.
pub struct ModelManager {
    model_name: String,
    models_dir: PathBuf,
    backend: Box<dyn Backend>,
    model: OnceCell<Arc<dyn LanguageModel>>,
}

impl ModelManager {
    /// Create a manager backed by llama.cpp.
    pub fn new(config: ModelConfig) -> Self {
        let model_name = config.model_name.clone();
        let models_dir = config.models_dir.clone();
        Self::with_backend(model_name, models_dir, LlamaCppBackend::new(config))
    }

    /// Create a manager over an arbitrary backend.
    pub fn with_backend(
        model_name: impl Into<String>,
        models_dir: impl Into<PathBuf>,
        backend: impl Backend + 'static,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            models_dir: models_dir.into(),
            backend: Box::new(backend),
            model: OnceCell::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Load the model on first use, then return the cached handle.
    pub async fn load(&self) -> Result<Arc<dyn LanguageModel>, ModelError> {
        let model = self
            .model
            .get_or_try_init(|| self.backend.load())
            .await
            .map_err(ModelError::Unavailable)?;
        Ok(Arc::clone(model))
    }

    /// Whether a model is cached.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Generate a completion for `prompt`.
    ///
    /// A non-empty `system_prompt` wraps the prompt in the System/User/
    /// Assistant template. The session is closed whether or not generation
    /// succeeds.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let model = self.load().await?;

        let full_prompt = build_prompt(prompt, system_prompt);
        let params = GenerationParams {
            max_tokens,
            temperature,
        };

        let mut session = model
            .open_session()
            .await
            .map_err(ModelError::Generation)?;
        debug!(?params, "generating");
        let result = session.generate(&full_prompt, params).await;
        session.close().await;

        result
            .map(|text| text.trim().to_string())
            .map_err(ModelError::Generation)
    }

    /// Report whether the model is loaded. Never triggers a load.
    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            status: if self.is_loaded() {
                ModelStatus::Healthy
            } else {
                ModelStatus::NotLoaded
            },
            model_name: self.model_name.clone(),
            models_dir: self.models_dir.display().to_string(),
        }
    }
}
