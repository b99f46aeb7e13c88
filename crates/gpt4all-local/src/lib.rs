//! Local model backend for the GPT4All chat service.
//!
//! The [`ModelManager`] owns at most one loaded model per process. Loading
//! is lazy: the first caller of [`ModelManager::load`] or
//! [`ModelManager::generate`] instantiates the model through a [`Backend`],
//! and everything after reuses the cached handle.
//!
//! The production backend is [`LlamaCppBackend`], which downloads GGUF
//! weights into the storage directory when they are missing and serves them
//! through a managed `llama-server` process.

mod backend;
mod client;
mod config;
mod error;
mod llama;
mod manager;
mod model;
pub mod paths;
pub mod prompt;
mod server;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, GenerationParams, InferenceSession, LanguageModel};
pub use client::{CompletionRequest, CompletionResponse, LlamaCppClient};
pub use config::{ModelConfig, ModelConfigBuilder};
pub use error::{LocalModelError, ModelError};
pub use llama::{LlamaCppBackend, LlamaCppModel, LlamaCppSession};
pub use manager::{HealthStatus, ModelManager, ModelStatus};
pub use model::{ModelInfo, ModelStore};
pub use server::LlamaCppServer;

/// Default port for the managed llama-server instance.
pub const DEFAULT_PORT: u16 = 11436;

/// Default model file, resolved inside the storage directory.
pub const DEFAULT_MODEL_NAME: &str = "orca-mini-3b-gguf2-q4_0.gguf";

/// Default storage directory for model weights.
pub const DEFAULT_MODELS_DIR: &str = "/app/models";

/// Base URL the GPT4All model catalogue serves GGUF files from.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://gpt4all.io/models/gguf/";

/// Default context window handed to llama-server.
pub const DEFAULT_CTX_SIZE: u32 = 2048;
