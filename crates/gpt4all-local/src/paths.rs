//! Path utilities for the local data directories.

use std::path::{Path, PathBuf};

/// Get the service data directory (~/.gpt4all/).
///
/// Falls back to a relative `.gpt4all` when no home directory is known,
/// which is the usual case inside minimal containers.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gpt4all")
}

/// Get the bin directory (~/.gpt4all/bin/).
pub fn bin_dir() -> PathBuf {
    data_dir().join("bin")
}

/// Get the default path to the llama-server binary.
pub fn llama_server_path() -> PathBuf {
    let binary_name = if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    bin_dir().join(binary_name)
}

/// Get the path to a model file inside `models_dir`.
pub fn model_path(models_dir: &Path, filename: &str) -> PathBuf {
    models_dir.join(filename)
}

/// Ensure the models directory exists.
pub fn ensure_models_dir(models_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(models_dir)
}
