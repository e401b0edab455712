//! Embedding provider trait and types.
//!
//! Defines the interface for embedding text and images into one vector space.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// Vector embedding - a normalized float array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    /// The embedding vector (normalized to unit length)
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector.
    /// Normalizes the vector to unit length; a zero vector is kept as is.
    pub fn new(values: Vec<f32>) -> Self {
        let norm = l2_norm(&values);
        let normalized = if norm > 0.0 {
            values
                .iter()
                .map(|&x| (f64::from(x) / norm) as f32)
                .collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    /// Create embedding without normalization (for pre-normalized vectors)
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean length of the vector
    pub fn norm(&self) -> f64 {
        l2_norm(&self.values)
    }

    /// Whether the vector has unit length within `tolerance`.
    pub fn is_unit(&self, tolerance: f64) -> bool {
        (self.norm() - 1.0).abs() <= tolerance
    }

    /// Re-normalize in place. Idempotent for vectors that are already unit length.
    pub fn renormalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in self.values.iter_mut() {
                *v = (f64::from(*v) / norm) as f32;
            }
        }
    }

    /// Compute cosine similarity with another embedding.
    /// Returns value in [-1, 1] range (1 = identical).
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        // Both are normalized, so the dot product is the cosine
        let dot: f64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum();
        dot.clamp(-1.0, 1.0) as f32
    }
}

fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Model information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier (e.g., "openai/clip-vit-base-patch32").
    /// Indexes record it so queries can be checked against the same space.
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }
}

/// Trait for embedding providers.
///
/// Text and image embeddings must share one vector space and dimension.
/// Methods return raw vectors; callers pass them through
/// [`checked_embedding`] before use.
pub trait EmbeddingProvider: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Embed a caption or query text.
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a decoded template image.
    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several images at once.
    /// Default implementation calls embed_image() for each image.
    fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        images.iter().map(|img| self.embed_image(img)).collect()
    }
}

/// Validate a raw provider vector and normalize it to unit length.
///
/// Rejects empty, non-finite and all-zero vectors, and vectors whose
/// length differs from the model's advertised dimension.
pub fn checked_embedding(values: Vec<f32>, info: &ModelInfo) -> Result<Embedding, EmbeddingError> {
    if values.is_empty() {
        return Err(EmbeddingError::InvalidOutput(format!(
            "{} returned an empty vector",
            info.name
        )));
    }
    if values.len() != info.dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: info.dimension,
            actual: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::InvalidOutput(format!(
            "{} returned non-finite values",
            info.name
        )));
    }
    let embedding = Embedding::new(values);
    if embedding.norm() == 0.0 {
        return Err(EmbeddingError::InvalidOutput(format!(
            "{} returned a zero vector",
            info.name
        )));
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
        assert!(emb.is_unit(1e-6));
    }

    #[test]
    fn test_renormalize_is_idempotent() {
        let mut emb = Embedding::new(vec![0.3, -1.7, 2.2, 0.01]);
        let before = emb.clone();
        emb.renormalize();
        for (a, b) in before.values.iter().zip(emb.values.iter()) {
            assert!((a - b).abs() < 1e-7);
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let emb1 = Embedding::new(vec![1.0, 0.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((emb1.cosine_similarity(&emb2) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![0.0, 1.0]);
        assert!(emb1.cosine_similarity(&emb2).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![-1.0, 0.0]);
        assert!((emb1.cosine_similarity(&emb2) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_checked_embedding_rejects_bad_vectors() {
        let info = ModelInfo::new("test", 2);
        assert!(matches!(
            checked_embedding(vec![], &info),
            Err(EmbeddingError::InvalidOutput(_))
        ));
        assert!(matches!(
            checked_embedding(vec![0.0, 0.0], &info),
            Err(EmbeddingError::InvalidOutput(_))
        ));
        assert!(matches!(
            checked_embedding(vec![f32::NAN, 1.0], &info),
            Err(EmbeddingError::InvalidOutput(_))
        ));
        assert!(matches!(
            checked_embedding(vec![1.0, 0.0, 0.0], &info),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_checked_embedding_normalizes() {
        let info = ModelInfo::new("test", 2);
        let emb = checked_embedding(vec![0.9, 0.1], &info).unwrap();
        assert!(emb.is_unit(1e-6));
    }

    #[test]
    fn test_embedding_serializes_as_plain_array() {
        let emb = Embedding::from_normalized(vec![0.6, 0.8]);
        let json = serde_json::to_string(&emb).unwrap();
        assert_eq!(json, "[0.6,0.8]");
        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, emb);
    }
}
