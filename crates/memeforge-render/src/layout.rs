//! Caption layout: greedy word wrapping and block centering.
//!
//! Layout only needs text extents, so everything here works against the
//! `TextMeasure` trait and can be tested with a fixed-advance measurer.

use std::iter::Peekable;
use std::str::SplitWhitespace;

/// Width and height of rendered text, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

/// Measures text at a fixed font and size.
///
/// Must be deterministic: the same text always yields the same extent.
pub trait TextMeasure {
    fn measure(&self, text: &str) -> TextExtent;
}

/// Lazy greedy line breaker returned by [`wrap`].
///
/// Words are packed onto a line until the next one would push its
/// measured width past `max_width`. A word that is too wide on its own
/// still gets its own line and overflows. A clone continues from the
/// same position; call [`wrap`] again to start over.
pub struct Wrap<'a, M: TextMeasure + ?Sized> {
    words: Peekable<SplitWhitespace<'a>>,
    max_width: u32,
    measure: &'a M,
    started: bool,
}

impl<M: TextMeasure + ?Sized> Clone for Wrap<'_, M> {
    fn clone(&self) -> Self {
        Self {
            words: self.words.clone(),
            max_width: self.max_width,
            measure: self.measure,
            started: self.started,
        }
    }
}

impl<M: TextMeasure + ?Sized> Iterator for Wrap<'_, M> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let Some(first) = self.words.next() else {
            // blank text still yields one (empty) line
            if self.started {
                return None;
            }
            self.started = true;
            return Some(String::new());
        };
        self.started = true;

        let mut line = first.to_string();
        while let Some(&word) = self.words.peek() {
            let candidate = format!("{line} {word}");
            if self.measure.measure(&candidate).width > self.max_width {
                break;
            }
            line = candidate;
            self.words.next();
        }
        Some(line)
    }
}

/// Greedily wrap `text` into lines no wider than `max_width`.
///
/// Words are split on whitespace; runs of whitespace collapse to one
/// space. Empty or blank text produces a single empty line.
pub fn wrap<'a, M: TextMeasure + ?Sized>(text: &'a str, max_width: u32, measure: &'a M) -> Wrap<'a, M> {
    Wrap {
        words: text.split_whitespace().peekable(),
        max_width,
        measure,
        started: false,
    }
}

/// Text used to size a line: a cap plus a descender.
pub const LINE_HEIGHT_PROBE: &str = "Ay";

/// Wrapped caption ready for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutResult {
    pub lines: Vec<String>,
    pub line_height: u32,
}

impl LayoutResult {
    pub fn total_height(&self) -> u32 {
        (self.lines.len() as u32).saturating_mul(self.line_height)
    }
}

/// Wrap `text` and size its lines with `measure`.
pub fn layout<M: TextMeasure + ?Sized>(text: &str, max_width: u32, measure: &M) -> LayoutResult {
    LayoutResult {
        lines: wrap(text, max_width, measure).collect(),
        line_height: measure.measure(LINE_HEIGHT_PROBE).height,
    }
}

/// Axis-aligned rectangle on the canvas. Extents may be negative when
/// padding exceeds the available space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Where one line is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub line: String,
    pub x: i32,
    pub y: i32,
}

/// Center a block of lines inside `region`.
///
/// The block is centered vertically and every line horizontally on its
/// own, using floor division. Blocks larger than the region start above
/// or left of it; positions are never clamped.
pub fn center_block<M: TextMeasure + ?Sized>(
    lines: &[String],
    line_height: u32,
    region: Region,
    measure: &M,
) -> Vec<Placement> {
    let line_height = i64::from(line_height);
    let block = lines.len() as i64 * line_height;
    let mut y = i64::from(region.top) + (i64::from(region.height) - block).div_euclid(2);

    lines
        .iter()
        .map(|line| {
            let width = i64::from(measure.measure(line).width);
            let x = i64::from(region.left) + (i64::from(region.width) - width).div_euclid(2);
            let placement = Placement {
                line: line.clone(),
                x: saturate(x),
                y: saturate(y),
            };
            y += line_height;
            placement
        })
        .collect()
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
