//! Word inputs: text, size, color, padding and rotation.

use rand::Rng;
use tiny_skia::ColorU8;

/// The d3 category20b palette, used when a word gets a random color.
pub(crate) const PALETTE: [&str; 20] = [
    "#393b79", "#5254a3", "#6b6ecf", "#9c9ede", "#637939", "#8ca252", "#b5cf6b", "#cedb9c",
    "#8c6d31", "#bd9e39", "#e7ba52", "#e7cb94", "#843c39", "#ad494a", "#d6616b", "#e7969c",
    "#7b4173", "#a55194", "#ce6dbd", "#de9ed6",
];

/// A single label to lay out. Immutable once handed to the renderer.
#[derive(Debug, Clone)]
pub struct Word {
    pub(crate) text: String,
    pub(crate) size: i32,
    pub(crate) padding: i32,
    pub(crate) color: Option<ColorU8>,
    pub(crate) rotate: Option<i32>,
}

impl Word {
    /// A word of `size` points, black, unpadded, with rotation left to the
    /// renderer's configured auto-rotation (angle 0 when none is set).
    pub fn new(text: impl Into<String>, size: i32) -> Self {
        Self {
            text: text.into(),
            size: size.max(1),
            padding: 0,
            color: None,
            rotate: None,
        }
    }

    pub fn color(mut self, color: ColorU8) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the color from `#rgb`, `#rrggbb` or `#rrggbbaa` notation.
    /// Unparseable strings leave the color unchanged.
    pub fn hex_color(mut self, hex: &str) -> Self {
        if let Some(color) = parse_hex_color(hex) {
            self.color = Some(color);
        }
        self
    }

    /// Extra margin in pixels kept clear around the word's ink.
    pub fn padding(mut self, padding: i32) -> Self {
        self.padding = padding.max(0);
        self
    }

    /// Fixes the rotation angle in degrees instead of the auto pick.
    pub fn rotate(mut self, degrees: i32) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> i32 {
        self.size
    }
}

/// Builds one `Word` per input text with a random size in `10..=55` and a
/// random palette color, sorted by descending size so large labels claim
/// central canvas space first.
pub fn random_words<R: Rng>(texts: &[&str], rng: &mut R) -> Vec<Word> {
    let mut words: Vec<Word> = texts
        .iter()
        .map(|text| Word::new(*text, rng.random_range(10..56)).color(random_color(rng)))
        .collect();
    words.sort_by(|a, b| b.size.cmp(&a.size));
    words
}

pub(crate) fn random_color<R: Rng>(rng: &mut R) -> ColorU8 {
    let hex = PALETTE[rng.random_range(0..PALETTE.len())];
    parse_hex_color(hex).unwrap_or_else(|| ColorU8::from_rgba(0, 0, 0, 255))
}

pub(crate) fn parse_hex_color(hex: &str) -> Option<ColorU8> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let (r, g, b) = (nibble(0)?, nibble(1)?, nibble(2)?);
            Some(ColorU8::from_rgba(r << 4 | r, g << 4 | g, b << 4 | b, 255))
        }
        6 => Some(ColorU8::from_rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(ColorU8::from_rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}
