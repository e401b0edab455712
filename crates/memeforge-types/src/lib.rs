//! # memeforge-types
//!
//! Shared configuration types for memeforge.
//!
//! Every component receives its settings explicitly at construction;
//! this crate only knows how to assemble them from defaults, config
//! files and the environment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memeforge_types::Settings;
//!
//! let settings = Settings::load(None).unwrap();
//! println!("templates: {}", settings.templates_dir);
//! ```

pub mod config;
pub mod error;

pub use config::{EmbeddingSettings, RenderSettings, Settings};
pub use error::SettingsError;
