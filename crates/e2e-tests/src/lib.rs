//! End-to-end test infrastructure for memeforge.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the caption-to-meme pipeline: template library, index
//! build and load, selection, layout and rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};

use memeforge_embeddings::{EmbeddingProvider, MockEmbedder};
use memeforge_index::{BuildConfig, SelectorConfig};
use memeforge_render::{BitmapFace, CompositorConfig, MemeCompositor, TextExtent, TextMeasure};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Model name reported by [`mock_provider`].
pub const MOCK_MODEL: &str = "mock-clip";

/// Shared test harness for E2E tests.
///
/// Owns a temp directory with a template library, an index path and an
/// output directory.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Template library directory (created empty)
    pub templates_dir: PathBuf,
    /// Index cache file (not created)
    pub index_path: PathBuf,
    /// Rendered meme directory (not created)
    pub output_dir: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with an empty template library.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let templates_dir = temp_dir.path().join("templates");
        std::fs::create_dir_all(&templates_dir).expect("Failed to create templates dir");

        Self {
            index_path: temp_dir.path().join("models").join("clip_image_index.json"),
            output_dir: temp_dir.path().join("output_memes"),
            templates_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Write a solid-colour template. The format follows the extension
    /// (`.jpg`/`.jpeg`/`.jfif` as JPEG, everything else as PNG).
    pub fn add_template(&self, name: &str, color: Rgb<u8>, width: u32, height: u32) -> PathBuf {
        let path = self.templates_dir.join(name);
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let format = match ext.as_str() {
            "jpg" | "jpeg" | "jfif" => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        };
        RgbImage::from_pixel(width, height, color)
            .save_with_format(&path, format)
            .expect("Failed to write template");
        path
    }

    /// Write raw bytes into the template directory.
    pub fn add_raw_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.templates_dir.join(name);
        std::fs::write(&path, bytes).expect("Failed to write file");
        path
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig::new(&self.index_path, &self.templates_dir)
            .with_build(BuildConfig::default().with_batch_size(2))
    }

    /// Compositor with default settings and the built-in bitmap font.
    pub fn compositor(&self) -> MemeCompositor {
        MemeCompositor::with_typeface(CompositorConfig::new(&self.output_dir), Arc::new(BitmapFace))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture provider over a two-dimensional embedding space.
///
/// Red templates embed to `[1, 0]`, blue to `[0, 1]`, green to the
/// diagonal. Registered captions:
/// - `"drake hotline bling"` -> `[0.9, 0.1]`
/// - `"such wow very doge"` -> `[0.1, 0.9]`
/// - `"balanced opinion"` -> `[1, 1]`
pub fn mock_provider() -> MockEmbedder {
    MockEmbedder::new(MOCK_MODEL, 2)
        .with_color(RED, vec![1.0, 0.0])
        .with_color(BLUE, vec![0.0, 1.0])
        .with_color(GREEN, vec![1.0, 1.0])
        .with_text("drake hotline bling", vec![0.9, 0.1])
        .with_text("such wow very doge", vec![0.1, 0.9])
        .with_text("balanced opinion", vec![1.0, 1.0])
}

pub fn shared_provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(mock_provider())
}

/// Monospace measurer: every character advances `advance` pixels and
/// every non-empty line is `height` pixels tall.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    pub advance: u32,
    pub height: u32,
}

impl TextMeasure for FixedAdvance {
    fn measure(&self, text: &str) -> TextExtent {
        let chars = text.chars().count() as u32;
        TextExtent {
            width: chars * self.advance,
            height: if chars == 0 { 0 } else { self.height },
        }
    }
}
