//! # memeforge-render
//!
//! Caption layout and compositing for memeforge.
//!
//! A template is placed on the left half of a double-width canvas and
//! the top and bottom captions are wrapped, centered and drawn with an
//! outline on the blank right half.
//!
//! ## Features
//! - Greedy word wrapping against any `TextMeasure`
//! - Floor-division block centering, overflow allowed
//! - TrueType captions via ab_glyph, with a built-in bitmap fallback font
//! - Deterministic output names derived from the template

pub mod compositor;
pub mod error;
pub mod layout;
pub mod typeface;

pub use compositor::{default_output_name, CanvasPlan, CompositorConfig, MemeCompositor, OUTPUT_SUFFIX};
pub use error::{FontLoadWarning, RenderError};
pub use layout::{center_block, layout, wrap, LayoutResult, Placement, Region, TextExtent, TextMeasure, Wrap, LINE_HEIGHT_PROBE};
pub use typeface::{load_typeface, BitmapFace, SizedFont, TrueTypeFace, Typeface};
