//! Nearest-neighbour search over a template index.
//!
//! `ExactSearch` scans every record (O(n·d) per query), which is plenty
//! for libraries in the hundreds. An approximate index can implement
//! `SimilaritySearch` later without changing what selection returns.

use std::cmp::Ordering;
use std::sync::Arc;

use memeforge_embeddings::Embedding;

use crate::record::TemplateIndex;

/// A scored template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    /// Position of the record in index order
    pub position: usize,
    /// Template identifier (its storage path)
    pub template_id: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Trait for similarity search over unit-length embeddings.
///
/// Ties are broken by index order: the earliest record wins.
/// Implementations must be thread-safe for concurrent read access.
pub trait SimilaritySearch: Send + Sync {
    /// Best match for `query`, `None` only for an empty index.
    fn nearest(&self, query: &Embedding) -> Option<TemplateMatch> {
        self.top_k(query, 1).into_iter().next()
    }

    /// Up to `k` matches sorted by descending score.
    fn top_k(&self, query: &Embedding, k: usize) -> Vec<TemplateMatch>;
}

/// Flat scan over every record.
pub struct ExactSearch {
    index: Arc<TemplateIndex>,
}

impl ExactSearch {
    pub fn new(index: Arc<TemplateIndex>) -> Self {
        Self { index }
    }

    fn scores<'a>(&'a self, query: &'a Embedding) -> impl Iterator<Item = (usize, f32)> + 'a {
        self.index
            .records()
            .iter()
            .enumerate()
            .map(move |(i, r)| (i, r.embedding().cosine_similarity(query)))
    }

    fn to_match(&self, position: usize, score: f32) -> TemplateMatch {
        TemplateMatch {
            position,
            template_id: self.index.records()[position].id().to_string(),
            score,
        }
    }
}

impl SimilaritySearch for ExactSearch {
    fn nearest(&self, query: &Embedding) -> Option<TemplateMatch> {
        let mut best: Option<(usize, f32)> = None;
        for (i, score) in self.scores(query) {
            // strict comparison keeps the first record on ties
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, score)| self.to_match(i, score))
    }

    fn top_k(&self, query: &Embedding, k: usize) -> Vec<TemplateMatch> {
        let mut scored: Vec<(usize, f32)> = self.scores(query).collect();
        // stable sort: equal scores stay in index order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| self.to_match(i, score))
            .collect()
    }
}
