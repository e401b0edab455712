//! # memeforge-embeddings
//!
//! Embedding provider boundary for memeforge.
//!
//! Templates (images) and captions (text) are embedded into one shared
//! vector space so a caption can be matched against the template library
//! by cosine similarity.
//!
//! ## Features
//! - `EmbeddingProvider` trait returning raw vectors, validated and
//!   normalized at the boundary by [`checked_embedding`]
//! - CLIP ViT-B/32 via Candle (512 dimensions, local inference)
//! - Automatic model file caching
//! - `MockEmbedder` fixture for deterministic tests

pub mod cache;
pub mod clip;
pub mod error;
pub mod mock;
pub mod model;

pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use clip::ClipEmbedder;
pub use error::EmbeddingError;
pub use mock::MockEmbedder;
pub use model::{checked_embedding, Embedding, EmbeddingProvider, ModelInfo};
