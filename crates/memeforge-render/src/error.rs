//! Render error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rendering a meme.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template image is unreadable or undecodable
    #[error("Failed to load template {path:?}: {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Caller supplied an output name that is not a bare file name
    #[error("Invalid output name {0:?}: expected a file name without directories")]
    InvalidOutputName(String),

    /// Encoding or writing the output image failed
    #[error("Failed to save meme to {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The configured typeface could not be used.
///
/// Not fatal: rendering continues with the built-in bitmap font.
#[derive(Debug, Clone, Error)]
#[error("Could not load font {path:?} ({reason}); using built-in bitmap font")]
pub struct FontLoadWarning {
    pub path: PathBuf,
    pub reason: String,
}
