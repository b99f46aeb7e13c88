//! Model weight download and management.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::LocalModelError;
use crate::paths::{ensure_models_dir, model_path};

/// Weight file descriptor.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Display name of the model.
    pub name: String,
    /// Filename on disk.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Expected SHA256 checksum (optional).
    pub sha256: Option<String>,
    /// Size in bytes (for progress display).
    pub size_bytes: Option<u64>,
}

impl ModelInfo {
    /// Describe `filename` as served from the catalogue at `base_url`.
    pub fn from_catalogue(filename: &str, base_url: &str) -> Self {
        let name = filename.trim_end_matches(".gguf").to_string();
        let url = format!("{}/{}", base_url.trim_end_matches('/'), filename);
        Self {
            name,
            filename: filename.to_string(),
            url,
            sha256: None,
            size_bytes: None,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// Local store of GGUF weights under one directory.
pub struct ModelStore {
    client: reqwest::Client,
    models_dir: PathBuf,
}

impl ModelStore {
    /// Create a store rooted at `models_dir`.
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            models_dir: models_dir.into(),
        }
    }

    /// List all installed models.
    pub fn list_installed(&self) -> Result<Vec<String>, LocalModelError> {
        if !self.models_dir.exists() {
            return Ok(vec![]);
        }

        let models: Vec<String> = fs::read_dir(&self.models_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext == "gguf")
                    .unwrap_or(false)
            })
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();

        Ok(models)
    }

    /// Check if a model is installed.
    pub fn is_installed(&self, filename: &str) -> bool {
        model_path(&self.models_dir, filename).is_file()
    }

    /// Return the local path of `model`, downloading it first when missing.
    pub async fn ensure_installed(
        &self,
        model: &ModelInfo,
        allow_download: bool,
    ) -> Result<PathBuf, LocalModelError> {
        ensure_models_dir(&self.models_dir)?;

        let path = model_path(&self.models_dir, &model.filename);
        if path.is_file() {
            debug!("Model '{}' found at {:?}", model.name, path);
            return Ok(path);
        }

        if !allow_download {
            return Err(LocalModelError::ModelNotFound(model.filename.clone()));
        }

        self.download(model).await
    }

    /// Download a model from its URL.
    ///
    /// Bytes are streamed into `<filename>.part` and renamed into place only
    /// after the checksum (if any) matches. The partial file is removed on
    /// any failure.
    pub async fn download(&self, model: &ModelInfo) -> Result<PathBuf, LocalModelError> {
        ensure_models_dir(&self.models_dir)?;

        let dest_path = model_path(&self.models_dir, &model.filename);
        let part_path = model_path(&self.models_dir, &format!("{}.part", model.filename));

        info!("Downloading model '{}' to {:?}", model.name, dest_path);

        let result = match self.fetch_into(model, &part_path).await {
            Ok(()) => fs::rename(&part_path, &dest_path).map_err(LocalModelError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            let _ = fs::remove_file(&part_path);
            return Err(e);
        }

        info!("Model '{}' downloaded successfully", model.name);
        Ok(dest_path)
    }

    async fn fetch_into(
        &self,
        model: &ModelInfo,
        part_path: &Path,
    ) -> Result<(), LocalModelError> {
        let response = self
            .client
            .get(&model.url)
            .send()
            .await
            .map_err(|e| LocalModelError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocalModelError::DownloadFailed(format!(
                "HTTP {}: {}",
                response.status(),
                model.url
            )));
        }

        let total_size = response.content_length().or(model.size_bytes);
        let pb = progress_bar(total_size);

        let mut file = File::create(part_path)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LocalModelError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;
        drop(file);

        pb.finish_with_message("Download complete");

        if let Some(expected) = &model.sha256 {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LocalModelError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified: {}", actual);
        }

        Ok(())
    }

    /// Remove an installed model.
    pub fn remove(&self, filename: &str) -> Result<(), LocalModelError> {
        let path = model_path(&self.models_dir, filename);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed model: {}", filename);
        }
        Ok(())
    }
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
            {
                pb.set_style(style);
            }
            pb
        }
    }
}
