//! Template records and the immutable template index.
//!
//! Records are read-only once an index exists: there is no way to reach
//! an embedding mutably, so searches always see the vectors the index
//! was validated with.

use std::collections::HashSet;

use memeforge_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// One entry per library image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Stable identifier: the template's storage path
    id: String,
    /// Unit-length image embedding
    embedding: Embedding,
}

impl TemplateRecord {
    pub fn new(id: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            id: id.into(),
            embedding,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of templates in the index
    pub template_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Embedding space the index was built in
    pub embedding_model: String,
}

/// Immutable snapshot of the template library.
///
/// Invariants checked at construction: at least one record, unique ids,
/// equal non-zero dimensions, finite non-zero vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateIndex {
    embedding_model: String,
    dimension: usize,
    records: Vec<TemplateRecord>,
}

impl TemplateIndex {
    /// Validate `records` and wrap them into an index. Record order is kept.
    pub fn new(
        embedding_model: impl Into<String>,
        records: Vec<TemplateRecord>,
    ) -> Result<Self, IndexError> {
        let embedding_model = embedding_model.into();
        if embedding_model.trim().is_empty() {
            return Err(IndexError::InvalidIndex(
                "embedding model identifier is empty".to_string(),
            ));
        }

        let first = records
            .first()
            .ok_or_else(|| IndexError::InvalidIndex("index has no records".to_string()))?;
        let dimension = first.embedding.dimension();
        if dimension == 0 {
            return Err(IndexError::InvalidIndex(format!(
                "record {:?} has an empty embedding",
                first.id
            )));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(IndexError::InvalidIndex(format!(
                    "duplicate template id {:?}",
                    record.id
                )));
            }
            if record.embedding.dimension() != dimension {
                return Err(IndexError::InvalidIndex(format!(
                    "record {:?} has dimension {}, expected {}",
                    record.id,
                    record.embedding.dimension(),
                    dimension
                )));
            }
            if record.embedding.values.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::InvalidIndex(format!(
                    "record {:?} has non-finite values",
                    record.id
                )));
            }
            if record.embedding.norm() == 0.0 {
                return Err(IndexError::InvalidIndex(format!(
                    "record {:?} has a zero embedding",
                    record.id
                )));
            }
        }

        Ok(Self {
            embedding_model,
            dimension,
            records,
        })
    }

    /// Re-normalize every embedding to unit length.
    ///
    /// Idempotent for vectors that already have unit length; used after
    /// loading so stored data can never break the unit-norm invariant.
    pub fn renormalized(mut self) -> Self {
        for record in &mut self.records {
            record.embedding.renormalize();
        }
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn records(&self) -> &[TemplateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a constructed index; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record by id.
    pub fn get(&self, id: &str) -> Option<&TemplateRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            template_count: self.records.len(),
            dimension: self.dimension,
            embedding_model: self.embedding_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>) -> TemplateRecord {
        TemplateRecord::new(id, Embedding::from_normalized(values))
    }

    #[test]
    fn test_valid_index() {
        let index = TemplateIndex::new(
            "mock",
            vec![record("a.png", vec![1.0, 0.0]), record("b.png", vec![0.0, 1.0])],
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.records()[1].id(), "b.png");
        assert!(index.get("a.png").is_some());
        assert_eq!(
            index.stats(),
            IndexStats {
                template_count: 2,
                dimension: 2,
                embedding_model: "mock".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            TemplateIndex::new("mock", vec![]),
            Err(IndexError::InvalidIndex(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let result = TemplateIndex::new(
            "mock",
            vec![record("a.png", vec![1.0, 0.0]), record("b.png", vec![1.0, 0.0, 0.0])],
        );
        assert!(matches!(result, Err(IndexError::InvalidIndex(_))));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = TemplateIndex::new(
            "mock",
            vec![record("a.png", vec![1.0, 0.0]), record("a.png", vec![0.0, 1.0])],
        );
        assert!(matches!(result, Err(IndexError::InvalidIndex(_))));
    }

    #[test]
    fn test_rejects_zero_and_nan_vectors() {
        assert!(TemplateIndex::new("mock", vec![record("z.png", vec![0.0, 0.0])]).is_err());
        assert!(TemplateIndex::new("mock", vec![record("n.png", vec![f32::NAN, 1.0])]).is_err());
    }

    #[test]
    fn test_renormalized_restores_unit_length() {
        let index = TemplateIndex::new(
            "mock",
            vec![record("a.png", vec![3.0, 4.0]), record("b.png", vec![0.6, 0.8])],
        )
        .unwrap()
        .renormalized();
        for r in index.records() {
            assert!(r.embedding().is_unit(1e-6));
        }
        assert!((index.records()[0].embedding().values[0] - 0.6).abs() < 1e-6);
    }
}
