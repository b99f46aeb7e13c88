//! Error types for local model operations.

use thiserror::Error;

/// Errors raised by the llama.cpp plumbing.
#[derive(Debug, Error)]
pub enum LocalModelError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error: {0}")]
    Api(String),

    /// Server is not running or not reachable.
    #[error("llama-server not reachable at {0}")]
    ServerNotRunning(String),

    /// Server failed to start.
    #[error("Failed to start llama-server: {0}")]
    ServerStartFailed(String),

    /// Server process exited while we were waiting on it.
    #[error("llama-server process died: {0}")]
    ServerDied(String),

    /// Model not found locally and downloads are disabled.
    #[error("Model '{0}' not found in the models directory")]
    ModelNotFound(String),

    /// Model download failed.
    #[error("Failed to download model: {0}")]
    DownloadFailed(String),

    /// Checksum verification failed.
    #[error("Model checksum mismatch. Expected: {expected}, got: {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// llama-server binary not found.
    #[error("llama-server binary not found at {0}")]
    ServerBinaryNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for server to start.
    #[error("Timeout waiting for llama-server to become ready")]
    ServerStartTimeout,
}

/// Errors surfaced by [`crate::ModelManager`].
///
/// Load and generation failures stay distinct so callers can tell
/// "model unavailable" apart from "generation failed".
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(#[source] LocalModelError),
    #[error("generation failed: {0}")]
    Generation(#[source] LocalModelError),
}

impl ModelError {
    /// Whether this failure happened while loading the model.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ModelError::Unavailable(_))
    }
}
