//! Two-panel meme compositor.
//!
//! The output canvas is twice as wide as the template. The template is
//! copied into the left half; the right half is a blank panel split at
//! the vertical midline into a top and a bottom caption region.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, ImageReader, Rgb, RgbImage};
use memeforge_types::RenderSettings;
use tracing::{debug, info};

use crate::error::{FontLoadWarning, RenderError};
use crate::layout::{center_block, layout, Region};
use crate::typeface::{load_typeface, SizedFont, Typeface};

/// Suffix appended to the template stem for the default output name
pub const OUTPUT_SUFFIX: &str = "_captioned.png";

/// Compositor configuration.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Directory rendered memes are written to
    pub output_dir: PathBuf,
    /// TrueType font; `None` uses the built-in bitmap font
    pub font_path: Option<PathBuf>,
    /// Font size as a fraction of template height
    pub font_scale: f32,
    /// Smallest font size in pixels
    pub min_font_px: u32,
    /// Horizontal padding as a fraction of template width
    pub padding_x_ratio: f32,
    /// Vertical padding as a fraction of template height
    pub padding_y_ratio: f32,
    /// Outline offset in pixels
    pub outline_width: u32,
    pub fill: Rgb<u8>,
    pub outline: Rgb<u8>,
    pub background: Rgb<u8>,
}

impl CompositorConfig {
    /// Default settings writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(&RenderSettings::default(), output_dir, None)
    }

    pub fn from_settings(
        settings: &RenderSettings,
        output_dir: impl Into<PathBuf>,
        font_path: Option<PathBuf>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            font_path,
            font_scale: settings.font_scale,
            min_font_px: settings.min_font_px,
            padding_x_ratio: settings.padding_x_ratio,
            padding_y_ratio: settings.padding_y_ratio,
            outline_width: settings.outline_width,
            fill: Rgb(settings.fill),
            outline: Rgb(settings.outline),
            background: Rgb(settings.background),
        }
    }

    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }
}

/// Geometry of one composed meme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPlan {
    pub width: u32,
    pub height: u32,
    pub font_px: f32,
    pub padding_x: i32,
    pub padding_y: i32,
    /// Widest a caption line may be before it wraps
    pub max_text_width: u32,
    pub top: Region,
    pub bottom: Region,
}

impl CanvasPlan {
    /// Plan the canvas for a `template_width` x `template_height` template.
    pub fn new(template_width: u32, template_height: u32, config: &CompositorConfig) -> Self {
        let w = i64::from(template_width);
        let h = i64::from(template_height);

        let scaled = (h as f64 * f64::from(config.font_scale)).floor();
        let font_px = scaled.max(f64::from(config.min_font_px)) as f32;
        let padding_x = (w as f64 * f64::from(config.padding_x_ratio)).floor() as i64;
        let padding_y = (h as f64 * f64::from(config.padding_y_ratio)).floor() as i64;

        let text_left = w + padding_x;
        let text_width = (2 * w - padding_x) - text_left;
        let mid = h.div_euclid(2);

        let region = |top: i64, bottom: i64| Region {
            left: clamp_i32(text_left),
            top: clamp_i32(top),
            width: clamp_i32(text_width),
            height: clamp_i32(bottom - top),
        };

        Self {
            width: template_width.saturating_mul(2),
            height: template_height,
            font_px,
            padding_x: clamp_i32(padding_x),
            padding_y: clamp_i32(padding_y),
            max_text_width: u32::try_from(text_width.max(0)).unwrap_or(u32::MAX),
            top: region(padding_y, mid - padding_y),
            bottom: region(mid + padding_y, h - padding_y),
        }
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// The eight outline offsets around a glyph, `width` pixels away.
fn outline_offsets(width: i32) -> impl Iterator<Item = (i32, i32)> {
    [-width, 0, width]
        .into_iter()
        .flat_map(move |dx| [-width, 0, width].into_iter().map(move |dy| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
}

/// Composes captioned memes.
///
/// Stateless per call: every `compose` owns its own canvas, so one
/// compositor can serve concurrent renders to different output names.
pub struct MemeCompositor {
    config: CompositorConfig,
    typeface: Arc<dyn Typeface>,
    font_warning: Option<FontLoadWarning>,
}

impl MemeCompositor {
    /// Create a compositor, loading the configured font.
    ///
    /// A font that cannot be loaded is not an error: the built-in bitmap
    /// font is used and the warning is kept for [`font_warning`](Self::font_warning).
    pub fn new(config: CompositorConfig) -> Self {
        let (typeface, font_warning) = load_typeface(config.font_path.as_deref());
        Self {
            config,
            typeface,
            font_warning,
        }
    }

    /// Create a compositor drawing with `typeface`.
    pub fn with_typeface(config: CompositorConfig, typeface: Arc<dyn Typeface>) -> Self {
        Self {
            config,
            typeface,
            font_warning: None,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn typeface(&self) -> &dyn Typeface {
        self.typeface.as_ref()
    }

    /// Why the configured font was replaced by the bitmap font, if it was.
    pub fn font_warning(&self) -> Option<&FontLoadWarning> {
        self.font_warning.as_ref()
    }

    pub fn plan(&self, template: &RgbImage) -> CanvasPlan {
        CanvasPlan::new(template.width(), template.height(), &self.config)
    }

    /// Compose `template` with `top` and `bottom` captions into a new canvas.
    pub fn compose(&self, template: &RgbImage, top: &str, bottom: &str) -> RgbImage {
        let plan = self.plan(template);
        let mut canvas = RgbImage::from_pixel(plan.width, plan.height, self.config.background);
        image::imageops::replace(&mut canvas, template, 0, 0);

        let font = SizedFont::new(self.typeface.as_ref(), plan.font_px);
        for (text, region) in [(top, plan.top), (bottom, plan.bottom)] {
            let caption = layout(text, plan.max_text_width, &font);
            debug!(
                lines = caption.lines.len(),
                block_height = caption.total_height(),
                region_height = region.height,
                "Laid out caption"
            );
            for placement in center_block(&caption.lines, caption.line_height, region, &font) {
                self.draw_outlined(&mut canvas, &font, placement.x, placement.y, &placement.line);
            }
        }
        canvas
    }

    fn draw_outlined(&self, canvas: &mut RgbImage, font: &SizedFont<'_>, x: i32, y: i32, line: &str) {
        if line.is_empty() {
            return;
        }
        let width = i32::try_from(self.config.outline_width).unwrap_or(i32::MAX);
        if width > 0 {
            for (dx, dy) in outline_offsets(width) {
                font.draw(canvas, x.saturating_add(dx), y.saturating_add(dy), line, self.config.outline);
            }
        }
        font.draw(canvas, x, y, line, self.config.fill);
    }

    /// Render a meme from the template file at `template` and save it.
    ///
    /// The output goes to `output_dir/output_name`, or to
    /// `output_dir/<template stem>_captioned.png` when no name is given.
    /// An existing file with that name is overwritten.
    pub fn render(
        &self,
        template: &Path,
        top: &str,
        bottom: &str,
        output_name: Option<&str>,
    ) -> Result<PathBuf, RenderError> {
        let file_name = match output_name {
            Some(name) => validate_output_name(name)?,
            None => default_output_name(template),
        };

        let image = load_template(template)?;
        let canvas = self.compose(&image, top, bottom);

        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(file_name);
        let format = ImageFormat::from_path(&path).unwrap_or(ImageFormat::Png);
        canvas
            .save_with_format(&path, format)
            .map_err(|source| RenderError::Save {
                path: path.clone(),
                source,
            })?;

        info!(template = ?template, output = ?path, "Rendered meme");
        Ok(path)
    }
}

fn load_template(path: &Path) -> Result<RgbImage, RenderError> {
    let decode = || -> Result<RgbImage, image::ImageError> {
        Ok(ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8())
    };
    decode().map_err(|source| RenderError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// `<template stem>_captioned.png`
pub fn default_output_name(template: &Path) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "meme".to_string());
    format!("{stem}{OUTPUT_SUFFIX}")
}

fn validate_output_name(name: &str) -> Result<String, RenderError> {
    let bare = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if name.trim().is_empty() || !bare || name.contains(['/', '\\']) {
        return Err(RenderError::InvalidOutputName(name.to_string()));
    }
    Ok(name.to_string())
}
