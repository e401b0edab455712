//! Template selection for caption text.
//!
//! The selector owns a loaded index and the provider used to embed
//! queries. It is read-only after construction, so one instance can
//! serve concurrent `select` calls without locking.

use std::path::PathBuf;
use std::sync::Arc;

use memeforge_embeddings::{checked_embedding, EmbeddingProvider};
use tracing::{debug, info, warn};

use crate::builder::{BuildConfig, IndexBuilder};
use crate::error::IndexError;
use crate::record::TemplateIndex;
use crate::search::{ExactSearch, SimilaritySearch, TemplateMatch};
use crate::store;

/// Where the selector finds (or rebuilds) its index.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Persisted index file
    pub index_path: PathBuf,
    /// Template directory used when the index has to be rebuilt
    pub templates_dir: PathBuf,
    /// Build settings for the rebuild
    pub build: BuildConfig,
}

impl SelectorConfig {
    pub fn new(index_path: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            templates_dir: templates_dir.into(),
            build: BuildConfig::default(),
        }
    }

    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }
}

/// Picks the template whose embedding is closest to a caption's.
pub struct TemplateSelector {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<TemplateIndex>,
    search: Box<dyn SimilaritySearch>,
}

impl TemplateSelector {
    /// Load the index, repairing it at most once.
    ///
    /// A missing cache is built from the template directory; a corrupt
    /// cache is deleted first and then rebuilt. If that single repair
    /// fails, or loading fails for any other reason, the cause is
    /// returned wrapped in `SelectorInit`.
    pub fn initialize(
        config: &SelectorConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, IndexError> {
        let index = match store::load(&config.index_path) {
            Ok(index) => index,
            Err(IndexError::IndexMissing(path)) => {
                info!(path = ?path, "Template index not found, building it");
                Self::repair(config, provider.as_ref())?
            }
            Err(IndexError::IndexCorrupt { path, reason }) => {
                warn!(path = ?path, reason = %reason, "Template index is corrupt, deleting and rebuilding");
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return Err(IndexError::SelectorInit(Box::new(e.into())));
                    }
                }
                Self::repair(config, provider.as_ref())?
            }
            Err(other) => return Err(IndexError::SelectorInit(Box::new(other))),
        };

        if index.embedding_model() != provider.info().name {
            warn!(
                index_model = index.embedding_model(),
                provider_model = %provider.info().name,
                "Template index was built with a different embedding model; queries will be rejected"
            );
        }

        Ok(Self::from_index(index, provider))
    }

    /// Single build-then-load attempt. Never retried.
    fn repair(
        config: &SelectorConfig,
        provider: &dyn EmbeddingProvider,
    ) -> Result<TemplateIndex, IndexError> {
        let attempt = || -> Result<TemplateIndex, IndexError> {
            let report = IndexBuilder::new(provider, config.build.clone())
                .build_and_persist(&config.templates_dir, &config.index_path)?;
            if report.skipped_count() > 0 {
                warn!(skipped = report.skipped_count(), "Some templates were skipped during rebuild");
            }
            store::load(&config.index_path)
        };
        attempt().map_err(|e| IndexError::SelectorInit(Box::new(e)))
    }

    /// Wrap an already loaded index. Embeddings are re-normalized.
    pub fn from_index(index: TemplateIndex, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let index = Arc::new(index.renormalized());
        let search = Box::new(ExactSearch::new(Arc::clone(&index)));
        info!(
            templates = index.len(),
            model = index.embedding_model(),
            "Template selector ready"
        );
        Self {
            provider,
            index,
            search,
        }
    }

    /// Replace the search strategy (e.g. with an approximate index).
    pub fn with_search(mut self, search: Box<dyn SimilaritySearch>) -> Self {
        self.search = search;
        self
    }

    pub fn index(&self) -> &TemplateIndex {
        &self.index
    }

    /// Best-matching template for `query` and its cosine similarity.
    ///
    /// Ties go to the earliest template in index order, so repeated
    /// calls with the same query return the same result.
    pub fn select(&self, query: &str) -> Result<TemplateMatch, IndexError> {
        let embedding = self.embed_query(query)?;
        let best = self
            .search
            .nearest(&embedding)
            .ok_or_else(|| IndexError::InvalidIndex("index has no records".to_string()))?;
        debug!(template = %best.template_id, score = best.score, "Selected template");
        Ok(best)
    }

    /// The `k` best templates for `query`, best first.
    pub fn select_top(&self, query: &str, k: usize) -> Result<Vec<TemplateMatch>, IndexError> {
        let embedding = self.embed_query(query)?;
        Ok(self.search.top_k(&embedding, k))
    }

    fn embed_query(&self, query: &str) -> Result<memeforge_embeddings::Embedding, IndexError> {
        let info = self.provider.info();
        if info.name != self.index.embedding_model() {
            return Err(IndexError::ModelMismatch {
                index_model: self.index.embedding_model().to_string(),
                provider_model: info.name.clone(),
            });
        }

        let raw = self.provider.embed_text(query)?;
        let embedding = checked_embedding(raw, info)?;
        if embedding.dimension() != self.index.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: embedding.dimension(),
            });
        }
        Ok(embedding)
    }
}
