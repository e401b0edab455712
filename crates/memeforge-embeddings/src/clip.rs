//! Candle-based CLIP embedding implementation.
//!
//! Uses CLIP ViT-B/32 so template images and caption text land in the
//! same 512-dimensional space.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use image::imageops::FilterType;
use image::RgbImage;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{EmbeddingProvider, ModelInfo};

/// Embedding dimension for CLIP ViT-B/32
pub const EMBEDDING_DIM: usize = 512;

/// Padding / end-of-text token of the CLIP tokenizer
const PAD_TOKEN: &str = "<|endoftext|>";

/// CLIP embedder running on the CPU.
pub struct ClipEmbedder {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    pad_id: u32,
    max_text_len: usize,
    image_size: usize,
    info: ModelInfo,
}

impl ClipEmbedder {
    /// Load the model from cache (downloading if needed).
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::load_from_paths(&paths.tokenizer, &paths.weights, &cache.repo_id)
    }

    /// Load with default cache settings
    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    /// Load from explicit file paths. `model_name` is the identifier
    /// recorded in indexes built with this embedder.
    pub fn load_from_paths(
        tokenizer_path: &Path,
        weights_path: &Path,
        model_name: &str,
    ) -> Result<Self, EmbeddingError> {
        info!(model = model_name, "Loading CLIP model...");

        let device = Device::Cpu;
        let config = ClipConfig::vit_base_patch32();

        if !weights_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                weights_path.display().to_string(),
            ));
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        let pad_id = tokenizer
            .token_to_id(PAD_TOKEN)
            .ok_or_else(|| EmbeddingError::Tokenizer(format!("vocabulary lacks {PAD_TOKEN}")))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = ClipModel::new(vb, &config)?;

        info!(
            dim = EMBEDDING_DIM,
            image_size = config.image_size,
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            pad_id,
            max_text_len: config.text_config.max_position_embeddings,
            image_size: config.image_size,
            info: ModelInfo::new(model_name, EMBEDDING_DIM),
        })
    }

    /// Token ids truncated or padded to the model's context length.
    fn token_ids(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        Ok(fit_to_context(
            encoding.get_ids().to_vec(),
            self.max_text_len,
            self.pad_id,
        ))
    }

    /// Resize to the model's input size and scale pixels to [-1, 1], CHW layout.
    fn pixel_tensor(&self, image: &RgbImage) -> Result<Tensor, EmbeddingError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbeddingError::InvalidInput(
                "image has zero width or height".to_string(),
            ));
        }
        let size = self.image_size as u32;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let tensor = Tensor::from_vec(
            resized.into_raw(),
            (self.image_size, self.image_size, 3),
            &self.device,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(2.0 / 255.0, -1.0)?;
        Ok(tensor)
    }
}

impl EmbeddingProvider for ClipEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let ids = self.token_ids(text)?;
        let input_ids = Tensor::from_vec(ids, (1, self.max_text_len), &self.device)?;
        let features = self.model.get_text_features(&input_ids)?;
        let mut rows: Vec<Vec<f32>> = features.to_vec2()?;
        debug!(chars = text.len(), "Embedded text");
        rows.pop()
            .ok_or_else(|| EmbeddingError::InvalidOutput("no text features returned".to_string()))
    }

    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        let mut rows = self.embed_images(std::slice::from_ref(image))?;
        rows.pop()
            .ok_or_else(|| EmbeddingError::InvalidOutput("no image features returned".to_string()))
    }

    fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = images.len(), "Embedding image batch");

        let pixels = images
            .iter()
            .map(|img| self.pixel_tensor(img))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = Tensor::stack(&pixels, 0)?;
        let features = self.model.get_image_features(&batch)?;
        let rows: Vec<Vec<f32>> = features.to_vec2()?;

        if rows.len() != images.len() {
            return Err(EmbeddingError::InvalidOutput(format!(
                "expected {} image vectors, got {}",
                images.len(),
                rows.len()
            )));
        }
        Ok(rows)
    }
}

/// Truncate or pad `ids` to `len` tokens.
///
/// Text features are pooled at the end-of-text token, so a truncated
/// sequence gets `eos_id` written back into its last slot. The pad token
/// is the end-of-text token.
fn fit_to_context(mut ids: Vec<u32>, len: usize, eos_id: u32) -> Vec<u32> {
    if ids.len() > len {
        ids.truncate(len);
        if let Some(last) = ids.last_mut() {
            *last = eos_id;
        }
    }
    ids.resize(len, eos_id);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::checked_embedding;

    // Integration tests require model download, run with:
    // cargo test -p memeforge-embeddings -- --ignored

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        let embedder = ClipEmbedder::load_default().unwrap();
        assert_eq!(embedder.info().dimension, EMBEDDING_DIM);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_text_and_image_share_dimension() {
        let embedder = ClipEmbedder::load_default().unwrap();
        let text = embedder.embed_text("a dog wearing sunglasses").unwrap();
        let image = embedder
            .embed_image(&RgbImage::from_pixel(64, 48, image::Rgb([200, 30, 30])))
            .unwrap();
        assert_eq!(text.len(), EMBEDDING_DIM);
        assert_eq!(image.len(), EMBEDDING_DIM);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_long_text_is_truncated() {
        let embedder = ClipEmbedder::load_default().unwrap();
        let long = "meme ".repeat(500);
        let raw = embedder.embed_text(&long).unwrap();
        let emb = checked_embedding(raw, embedder.info()).unwrap();
        assert!(emb.is_unit(1e-6));
    }

    #[test]
    fn test_fit_to_context_keeps_end_of_text() {
        assert_eq!(fit_to_context(vec![1, 5, 6, 7, 2], 4, 2), vec![1, 5, 6, 2]);
        assert_eq!(fit_to_context(vec![1, 5, 2], 5, 2), vec![1, 5, 2, 2, 2]);
        assert_eq!(fit_to_context(vec![1, 5, 2], 3, 2), vec![1, 5, 2]);
    }

    #[test]
    fn test_missing_weights_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = ClipEmbedder::load_from_paths(
            &temp.path().join("tokenizer.json"),
            &temp.path().join("model.safetensors"),
            "openai/clip-vit-base-patch32",
        );
        assert!(matches!(result, Err(EmbeddingError::ModelNotFound(_))));
    }
}
