//! Template index error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building, loading or querying the template index.
///
/// Each condition callers may want to react to differently has its own
/// variant; only `SelectorInit` is fatal at construction.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Template directory is absent or not readable
    #[error("Template directory {dir:?} is unavailable: {source}")]
    TemplateDirUnavailable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No template in the directory could be decoded
    #[error(
        "No decodable templates in {dir:?} ({skipped} skipped); allowed extensions: jpg, jpeg, png, webp, jfif"
    )]
    EmptyLibrary { dir: PathBuf, skipped: usize },

    /// Cache file does not exist
    #[error("Template index not found at {0:?}")]
    IndexMissing(PathBuf),

    /// Cache file exists but cannot be used; delete and rebuild
    #[error("Template index at {path:?} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    /// Records that do not form a valid index
    #[error("Invalid template index: {0}")]
    InvalidIndex(String),

    /// Load failed and the single build-then-load repair failed too
    #[error("Template selector initialization failed")]
    SelectorInit(#[source] Box<IndexError>),

    /// Query provider and index were built in different embedding spaces
    #[error("Embedding model mismatch: index built with {index_model:?}, provider is {provider_model:?}")]
    ModelMismatch {
        index_model: String,
        provider_model: String,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding error
    #[error("Embedding error: {0}")]
    Embedding(#[from] memeforge_embeddings::EmbeddingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}
