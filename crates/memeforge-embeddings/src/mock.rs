//! Mock embedding provider for testing.

use std::collections::HashMap;

use image::{Rgb, RgbImage};

use crate::error::EmbeddingError;
use crate::model::{EmbeddingProvider, ModelInfo};

/// Mock provider that returns fixture vectors.
///
/// Texts map to registered vectors verbatim. Images map to the vector
/// registered for the colour closest to the image's mean colour, so
/// solid-colour fixtures survive lossy encodings such as JPEG.
///
/// Useful for testing without downloading a model.
pub struct MockEmbedder {
    info: ModelInfo,
    texts: HashMap<String, Vec<f32>>,
    colors: Vec<(Rgb<u8>, Vec<f32>)>,
}

impl MockEmbedder {
    /// Create a new mock provider for the given model name and dimension.
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            info: ModelInfo::new(model_name, dimension),
            texts: HashMap::new(),
            colors: Vec::new(),
        }
    }

    /// Register the vector returned for `text`.
    pub fn with_text(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.texts.insert(text.into(), vector);
        self
    }

    /// Register the vector returned for images whose mean colour is nearest to `color`.
    pub fn with_color(mut self, color: Rgb<u8>, vector: Vec<f32>) -> Self {
        self.colors.push((color, vector));
        self
    }
}

fn mean_color(image: &RgbImage) -> [f64; 3] {
    let count = f64::from(image.width()) * f64::from(image.height());
    let mut sum = [0.0f64; 3];
    for px in image.pixels() {
        for (acc, &c) in sum.iter_mut().zip(px.0.iter()) {
            *acc += f64::from(c);
        }
    }
    sum.map(|s| s / count)
}

impl EmbeddingProvider for MockEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.texts
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::InvalidInput(format!("no fixture for text {text:?}")))
    }

    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbeddingError::InvalidInput(
                "image has zero width or height".to_string(),
            ));
        }
        let mean = mean_color(image);
        self.colors
            .iter()
            .map(|(color, vector)| {
                let dist: f64 = color
                    .0
                    .iter()
                    .zip(mean.iter())
                    .map(|(&c, &m)| (f64::from(c) - m).powi(2))
                    .sum();
                (dist, vector)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, vector)| vector.clone())
            .ok_or_else(|| EmbeddingError::InvalidInput("no colour fixtures registered".to_string()))
    }
}
