//! Configuration loading for memeforge.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config_dir>/memeforge/config.{toml,json,yaml}`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SettingsError;

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// HuggingFace repository of the CLIP model.
    /// This string is also the model identifier recorded in the index.
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Repository revision holding `model.safetensors`
    #[serde(default = "default_model_revision")]
    pub revision: String,

    /// Where downloaded model files are kept (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Images per provider call while building the index
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_model_repo() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

fn default_model_revision() -> String {
    "refs/pr/15".to_string()
}

fn default_batch_size() -> usize {
    8
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_repo: default_model_repo(),
            revision: default_model_revision(),
            cache_dir: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Caption rendering settings.
///
/// Sizes are fractions of the template dimensions so captions stay
/// proportionate across templates of different resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Font size as a fraction of template height
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,

    /// Smallest font size in pixels
    #[serde(default = "default_min_font_px")]
    pub min_font_px: u32,

    /// Horizontal caption padding as a fraction of template width
    #[serde(default = "default_padding_x_ratio")]
    pub padding_x_ratio: f32,

    /// Vertical caption padding as a fraction of template height
    #[serde(default = "default_padding_y_ratio")]
    pub padding_y_ratio: f32,

    /// Outline thickness in pixels
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,

    /// Glyph fill colour (RGB)
    #[serde(default = "default_fill")]
    pub fill: [u8; 3],

    /// Glyph outline colour (RGB)
    #[serde(default = "default_outline")]
    pub outline: [u8; 3],

    /// Caption panel background (RGB)
    #[serde(default = "default_background")]
    pub background: [u8; 3],
}

fn default_font_scale() -> f32 {
    0.05
}

fn default_min_font_px() -> u32 {
    22
}

fn default_padding_x_ratio() -> f32 {
    0.07
}

fn default_padding_y_ratio() -> f32 {
    0.05
}

fn default_outline_width() -> u32 {
    2
}

fn default_fill() -> [u8; 3] {
    [0, 0, 0]
}

fn default_outline() -> [u8; 3] {
    [255, 255, 255]
}

fn default_background() -> [u8; 3] {
    [255, 255, 255]
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_scale: default_font_scale(),
            min_font_px: default_min_font_px(),
            padding_x_ratio: default_padding_x_ratio(),
            padding_y_ratio: default_padding_y_ratio(),
            outline_width: default_outline_width(),
            fill: default_fill(),
            outline: default_outline(),
            background: default_background(),
        }
    }
}

impl RenderSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.font_scale > 0.0 && self.font_scale <= 1.0) {
            return Err(format!("font_scale must be in (0, 1], got {}", self.font_scale));
        }
        for (name, ratio) in [
            ("padding_x_ratio", self.padding_x_ratio),
            ("padding_y_ratio", self.padding_y_ratio),
        ] {
            if !(0.0..0.5).contains(&ratio) {
                return Err(format!("{name} must be in [0, 0.5), got {ratio}"));
            }
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory of template images
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,

    /// Persisted template index file
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Directory rendered memes are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// TrueType font for captions; the built-in bitmap font is used when
    /// unset or unreadable
    #[serde(default = "default_font_path")]
    pub font_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub render: RenderSettings,
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "memeforge")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn default_templates_dir() -> String {
    data_dir().join("templates").to_string_lossy().to_string()
}

fn default_index_path() -> String {
    data_dir()
        .join("models")
        .join("clip_image_index.json")
        .to_string_lossy()
        .to_string()
}

fn default_output_dir() -> String {
    data_dir().join("output").to_string_lossy().to_string()
}

fn default_font_path() -> Option<String> {
    Some(
        data_dir()
            .join("fonts")
            .join("Impact.ttf")
            .to_string_lossy()
            .to_string(),
    )
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            index_path: default_index_path(),
            output_dir: default_output_dir(),
            font_path: default_font_path(),
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (<config_dir>/memeforge/config.*)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MEMEFORGE_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SettingsError> {
        let config_dir = ProjectDirs::from("", "", "memeforge")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("templates_dir", default_templates_dir())?
            .set_default("index_path", default_index_path())?
            .set_default("output_dir", default_output_dir())?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: MEMEFORGE_INDEX_PATH, MEMEFORGE_RENDER__FONT_SCALE, ...
        builder = builder.add_source(
            Environment::with_prefix("MEMEFORGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.embedding.batch_size == 0 {
            return Err(SettingsError::Invalid(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }
        if self.embedding.model_repo.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "embedding.model_repo must not be empty".to_string(),
            ));
        }
        self.render
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("render: {e}")))
    }

    pub fn templates_dir(&self) -> PathBuf {
        expand_home(&self.templates_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        self.font_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(expand_home)
    }

    pub fn model_cache_dir(&self) -> Option<PathBuf> {
        self.embedding.cache_dir.as_deref().map(expand_home)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
