//! llama.cpp implementation of the backend traits.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::backend::{Backend, GenerationParams, InferenceSession, LanguageModel};
use crate::client::{CompletionRequest, LlamaCppClient};
use crate::config::ModelConfig;
use crate::error::LocalModelError;
use crate::model::{ModelInfo, ModelStore};
use crate::server::LlamaCppServer;

/// Loads GGUF weights into a managed llama-server process.
pub struct LlamaCppBackend {
    config: ModelConfig,
    store: ModelStore,
}

impl LlamaCppBackend {
    pub fn new(config: ModelConfig) -> Self {
        let store = ModelStore::new(config.models_dir.clone());
        Self { config, store }
    }

    /// Descriptor of the configured weight file.
    pub fn model_info(&self) -> ModelInfo {
        let info = ModelInfo::from_catalogue(&self.config.model_name, &self.config.download_url);
        match &self.config.model_sha256 {
            Some(sha256) => info.with_sha256(sha256),
            None => info,
        }
    }
}

#[async_trait]
impl Backend for LlamaCppBackend {
    async fn load(&self) -> Result<Arc<dyn LanguageModel>, LocalModelError> {
        info!("Loading model: {}", self.config.model_name);
        info!("Models directory: {}", self.config.models_dir.display());

        let weights = self
            .store
            .ensure_installed(&self.model_info(), self.config.allow_download)
            .await?;

        let mut server = LlamaCppServer::new(&self.config.server_binary, weights)
            .with_port(self.config.server_port)
            .with_ctx_size(self.config.ctx_size);
        server.start().await?;
        // A failed wait drops `server`, which stops the child.
        server.wait_ready(self.config.ready_timeout).await?;

        let client = server.client();
        info!("Model loaded successfully!");

        Ok(Arc::new(LlamaCppModel {
            client,
            server: Mutex::new(server),
        }))
    }
}

/// A model being served by a running llama-server.
///
/// Dropping it stops the server process.
pub struct LlamaCppModel {
    client: LlamaCppClient,
    server: Mutex<LlamaCppServer>,
}

impl LlamaCppModel {
    /// Whether the backing process is still alive.
    fn is_running(&self) -> bool {
        self.server
            .lock()
            .map(|mut server| server.is_running())
            .unwrap_or(false)
    }
}

#[async_trait]
impl LanguageModel for LlamaCppModel {
    async fn open_session(&self) -> Result<Box<dyn InferenceSession>, LocalModelError> {
        if !self.is_running() {
            return Err(LocalModelError::ServerDied(format!(
                "llama-server at {} is no longer running",
                self.client.base_url()
            )));
        }
        Ok(Box::new(LlamaCppSession::new(self.client.clone())))
    }
}

/// A session pinned to the server slot of its first completion.
pub struct LlamaCppSession {
    client: LlamaCppClient,
    slot: Option<i32>,
}

impl LlamaCppSession {
    pub fn new(client: LlamaCppClient) -> Self {
        Self { client, slot: None }
    }

    pub fn slot(&self) -> Option<i32> {
        self.slot
    }
}

#[async_trait]
impl InferenceSession for LlamaCppSession {
    async fn generate(
        &mut self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LocalModelError> {
        let request = CompletionRequest::new(prompt, params.max_tokens, params.temperature)
            .on_slot(self.slot);

        let response = self.client.complete(&request).await?;
        if self.slot.is_none() {
            self.slot = response.id_slot;
        }
        debug!(
            slot = ?self.slot,
            tokens = ?response.tokens_predicted,
            "completion finished"
        );

        Ok(response.content)
    }

    async fn close(self: Box<Self>) {
        if let Some(slot) = self.slot {
            if let Err(e) = self.client.erase_slot(slot).await {
                warn!("Failed to release llama-server slot {}: {}", slot, e);
            }
        }
    }
}
