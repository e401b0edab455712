//! Typefaces used to measure and draw captions.
//!
//! `TrueTypeFace` rasterizes an outline font through imageproc. When no
//! font is configured, or the configured file cannot be parsed,
//! `BitmapFace` draws the public-domain 8x8 glyphs from `font8x8` scaled
//! by an integer factor, so a render never fails because of the font.

use std::path::Path;
use std::sync::Arc;

use ab_glyph::{FontArc, PxScale};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::error::FontLoadWarning;
use crate::layout::{TextExtent, TextMeasure};

/// A font that can measure and draw single lines of text at a pixel size.
pub trait Typeface: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Bounding box of `text` rendered at `px`.
    fn measure(&self, text: &str, px: f32) -> TextExtent;

    /// Draw `text` with its top-left corner at `(x, y)`. Pixels outside
    /// the canvas are clipped.
    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, px: f32, color: Rgb<u8>);
}

/// Outline font rasterized with ab_glyph.
pub struct TrueTypeFace {
    font: FontArc,
    name: String,
}

impl TrueTypeFace {
    /// Parse a TrueType/OpenType font from raw bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        Ok(Self {
            font: FontArc::try_from_vec(bytes)?,
            name: name.into(),
        })
    }

    /// Read and parse a font file.
    pub fn from_file(path: &Path) -> Result<Self, FontLoadWarning> {
        let warning = |reason: String| FontLoadWarning {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| warning(e.to_string()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "truetype".to_string());
        Self::from_bytes(name, bytes).map_err(|e| warning(e.to_string()))
    }
}

impl Typeface for TrueTypeFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self, text: &str, px: f32) -> TextExtent {
        let (width, height) = text_size(PxScale::from(px), &self.font, text);
        TextExtent { width, height }
    }

    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, px: f32, color: Rgb<u8>) {
        draw_text_mut(canvas, color, x, y, PxScale::from(px), &self.font, text);
    }
}

/// Built-in 8x8 bitmap font.
///
/// Every glyph is a fixed 8x8 cell scaled by `max(1, round(px / 8))`.
/// Characters outside the basic Latin set are drawn as `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitmapFace;

impl BitmapFace {
    const CELL: u32 = 8;

    fn scale(px: f32) -> u32 {
        let scale = (px / Self::CELL as f32).round();
        if scale.is_finite() && scale >= 1.0 {
            scale as u32
        } else {
            1
        }
    }

    fn glyph(ch: char) -> [u8; 8] {
        BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8])
    }
}

impl Typeface for BitmapFace {
    fn name(&self) -> &str {
        "builtin-8x8"
    }

    fn measure(&self, text: &str, px: f32) -> TextExtent {
        let cell = Self::CELL * Self::scale(px);
        let chars = text.chars().count() as u32;
        TextExtent {
            width: chars.saturating_mul(cell),
            height: if chars == 0 { 0 } else { cell },
        }
    }

    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, px: f32, color: Rgb<u8>) {
        let scale = Self::scale(px);
        let step = (Self::CELL * scale) as i32;
        let dot = scale as i32;

        for (i, ch) in text.chars().enumerate() {
            let gx = x.saturating_add((i as i32).saturating_mul(step));
            for (row, bits) in Self::glyph(ch).iter().enumerate() {
                for col in 0..Self::CELL as i32 {
                    // bit 0 is the leftmost pixel
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    let rect = Rect::at(gx + col * dot, y + row as i32 * dot).of_size(scale, scale);
                    draw_filled_rect_mut(canvas, rect, color);
                }
            }
        }
    }
}

/// A typeface fixed at one pixel size, as seen by the layout engine.
pub struct SizedFont<'a> {
    face: &'a dyn Typeface,
    px: f32,
}

impl<'a> SizedFont<'a> {
    pub fn new(face: &'a dyn Typeface, px: f32) -> Self {
        Self { face, px }
    }

    pub fn px(&self) -> f32 {
        self.px
    }

    pub fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        self.face.draw(canvas, x, y, text, self.px, color);
    }
}

impl TextMeasure for SizedFont<'_> {
    fn measure(&self, text: &str) -> TextExtent {
        self.face.measure(text, self.px)
    }
}

/// Load the configured font, falling back to [`BitmapFace`].
///
/// A configured font that cannot be read or parsed yields a
/// [`FontLoadWarning`], which is also logged.
pub fn load_typeface(path: Option<&Path>) -> (Arc<dyn Typeface>, Option<FontLoadWarning>) {
    let Some(path) = path else {
        debug!("No font configured, using built-in bitmap font");
        return (Arc::new(BitmapFace), None);
    };

    match TrueTypeFace::from_file(path) {
        Ok(face) => {
            info!(path = ?path, font = face.name(), "Loaded caption font");
            (Arc::new(face), None)
        }
        Err(warning) => {
            warn!(path = ?warning.path, reason = %warning.reason, "Could not load caption font, falling back to built-in bitmap font");
            (Arc::new(BitmapFace), Some(warning))
        }
    }
}
