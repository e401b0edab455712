//! # memeforge-index
//!
//! Template library index for memeforge.
//!
//! Every template image is embedded once, L2-normalized and persisted.
//! A caption is then matched against the library by cosine similarity
//! to pick the template that fits it best.
//!
//! ## Features
//! - Directory scan with partial-success reporting for undecodable files
//! - Atomic persistence (write to temp, fsync, rename)
//! - Structural validation on load (`IndexCorrupt` instead of garbage)
//! - Exact nearest-neighbour search behind the `SimilaritySearch` trait
//! - Selector that repairs a missing or corrupt cache exactly once

pub mod builder;
pub mod error;
pub mod record;
pub mod search;
pub mod selector;
pub mod store;

pub use builder::{scan_templates, BuildConfig, BuildReport, IndexBuilder, SkippedTemplate, ALLOWED_EXTENSIONS};
pub use error::IndexError;
pub use record::{IndexStats, TemplateIndex, TemplateRecord};
pub use search::{ExactSearch, SimilaritySearch, TemplateMatch};
pub use selector::{SelectorConfig, TemplateSelector};
pub use store::{load, persist, INDEX_FORMAT_VERSION};
