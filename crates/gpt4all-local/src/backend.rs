//! Seams between the model manager and a concrete inference engine.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::LocalModelError;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// Something that can instantiate a model.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Instantiate the model. Called at most once per successful load.
    async fn load(&self) -> Result<Arc<dyn LanguageModel>, LocalModelError>;
}

/// A loaded model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Open a session whose state lives until [`InferenceSession::close`].
    async fn open_session(&self) -> Result<Box<dyn InferenceSession>, LocalModelError>;
}

/// Scoped inference context.
#[async_trait]
pub trait InferenceSession: Send {
    async fn generate(
        &mut self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LocalModelError>;

    /// Release session state. Must be called even after a failed generation.
    async fn close(self: Box<Self>);
}
