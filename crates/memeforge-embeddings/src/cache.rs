//! Model file caching.
//!
//! Downloads and caches CLIP model files from HuggingFace Hub.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default model repository on HuggingFace
pub const DEFAULT_MODEL_REPO: &str = "openai/clip-vit-base-patch32";

/// Revision of the default repository that ships safetensors weights
pub const DEFAULT_MODEL_REVISION: &str = "refs/pr/15";

/// Required model files
pub const MODEL_FILES: &[&str] = &["tokenizer.json", "model.safetensors"];

/// Model cache configuration
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Model repository ID
    pub repo_id: String,
    /// Revision the weights are fetched from
    pub revision: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("memeforge")
            .join("models");

        Self {
            cache_dir,
            repo_id: DEFAULT_MODEL_REPO.to_string(),
            revision: DEFAULT_MODEL_REVISION.to_string(),
        }
    }
}

impl ModelCache {
    /// Create a new model cache with custom settings
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        repo_id: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
            revision: revision.into(),
        }
    }

    /// Get the model directory path
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Check if all model files are cached
    pub fn is_cached(&self) -> bool {
        let model_dir = self.model_dir();
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    /// Get path to a specific model file
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Get or download model files.
///
/// Returns paths to tokenizer.json and model.safetensors.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let model_dir = cache.model_dir();

    if cache.is_cached() {
        debug!(path = ?model_dir, "Using cached model");
    } else {
        info!(repo = %cache.repo_id, revision = %cache.revision, "Downloading model files...");
        download_model_files(cache)?;
    }

    Ok(ModelPaths {
        tokenizer: model_dir.join("tokenizer.json"),
        weights: model_dir.join("model.safetensors"),
    })
}

/// Download model files from HuggingFace Hub.
///
/// The tokenizer comes from the default branch, the weights from the
/// configured revision.
fn download_model_files(cache: &ModelCache) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;
    use hf_hub::{Repo, RepoType};

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let main = api.model(cache.repo_id.clone());
    let pinned = api.repo(Repo::with_revision(
        cache.repo_id.clone(),
        RepoType::Model,
        cache.revision.clone(),
    ));

    std::fs::create_dir_all(cache.model_dir())?;

    for filename in MODEL_FILES {
        info!(file = filename, "Downloading...");
        let source = if *filename == "model.safetensors" {
            &pinned
        } else {
            &main
        };
        let source_path = source
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;

        let dest_path = cache.file_path(filename);
        std::fs::copy(&source_path, &dest_path)?;
        debug!(file = filename, "Downloaded to {:?}", dest_path);
    }

    Ok(())
}
