//! Template index construction.
//!
//! Scans a template directory, decodes every allowed image, embeds the
//! decodable ones in batches and produces a validated [`TemplateIndex`].
//! Files that fail to decode are skipped and reported, never fatal.

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use memeforge_embeddings::{checked_embedding, EmbeddingError, EmbeddingProvider};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::IndexError;
use crate::record::{TemplateIndex, TemplateRecord};
use crate::store;

/// Raster extensions accepted as templates (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "jfif"];

/// Index build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Images per provider call
    pub batch_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { batch_size: 8 }
    }
}

impl BuildConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

/// A template file left out of the index
#[derive(Debug, Clone)]
pub struct SkippedTemplate {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a build: the index plus every file that was skipped.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub index: TemplateIndex,
    pub skipped: Vec<SkippedTemplate>,
}

impl BuildReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// List template candidates directly inside `dir`, sorted by file name.
pub fn scan_templates(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let meta = std::fs::metadata(dir).map_err(|source| IndexError::TemplateDirUnavailable {
        dir: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(IndexError::TemplateDirUnavailable {
            dir: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() && has_allowed_extension(entry.path()) => {
                paths.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!(dir = ?dir, error = %e, "Skipping unreadable directory entry"),
        }
    }
    Ok(paths)
}

fn decode_template(path: &Path) -> Result<RgbImage, image::ImageError> {
    Ok(ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb8())
}

/// Builds template indexes with an embedding provider.
pub struct IndexBuilder<'a> {
    provider: &'a dyn EmbeddingProvider,
    config: BuildConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, config: BuildConfig) -> Self {
        Self { provider, config }
    }

    /// Build an index from every decodable template in `dir`.
    ///
    /// Fails with `EmptyLibrary` when nothing decodes.
    pub fn build(&self, dir: &Path) -> Result<BuildReport, IndexError> {
        let paths = scan_templates(dir)?;
        info!(dir = ?dir, candidates = paths.len(), "Loading templates");

        let mut records = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        let info = self.provider.info();

        for chunk in paths.chunks(self.config.batch_size.max(1)) {
            let mut images = Vec::with_capacity(chunk.len());
            let mut ids = Vec::with_capacity(chunk.len());

            for path in chunk {
                match decode_template(path) {
                    Ok(image) => {
                        debug!(path = ?path, "Loaded template");
                        images.push(image);
                        ids.push(path.to_string_lossy().to_string());
                    }
                    Err(e) => {
                        warn!(path = ?path, error = %e, "Skipping undecodable template");
                        skipped.push(SkippedTemplate {
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if images.is_empty() {
                continue;
            }

            let vectors = self.provider.embed_images(&images)?;
            if vectors.len() != images.len() {
                return Err(EmbeddingError::InvalidOutput(format!(
                    "provider returned {} vectors for {} images",
                    vectors.len(),
                    images.len()
                ))
                .into());
            }
            for (id, raw) in ids.into_iter().zip(vectors) {
                records.push(TemplateRecord::new(id, checked_embedding(raw, info)?));
            }
            debug!(batch = images.len(), total = records.len(), "Embedded template batch");
        }

        if records.is_empty() {
            return Err(IndexError::EmptyLibrary {
                dir: dir.to_path_buf(),
                skipped: skipped.len(),
            });
        }

        let index = TemplateIndex::new(info.name.clone(), records)?;
        info!(
            templates = index.len(),
            skipped = skipped.len(),
            model = %info.name,
            "Built template index"
        );
        Ok(BuildReport { index, skipped })
    }

    /// Build from `dir` and atomically publish the result at `index_path`.
    pub fn build_and_persist(&self, dir: &Path, index_path: &Path) -> Result<BuildReport, IndexError> {
        let report = self.build(dir)?;
        store::persist(&report.index, index_path)?;
        Ok(report)
    }
}
