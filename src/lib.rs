//! Dense word cloud layout and rendering.
//!
//! Each word is rasterized once into a trimmed, packed-bit mask on a shared
//! scratch surface. Placement then walks an Archimedean spiral outward from
//! the canvas center, testing every candidate position against a packed-bit
//! occupancy board, so a full collision test costs one AND per 64 mask
//! pixels. Placed masks are committed to the board and the word is drawn
//! into the output surface at the same anchor.
//!
//! ```no_run
//! use rand::SeedableRng;
//! use wordcloud::{random_words, WordCloud};
//!
//! # fn main() -> Result<(), wordcloud::Error> {
//! let mut cloud = WordCloud::new(400, 400);
//! cloud.set_font_file("fonts/SmileySans.ttf")?;
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
//! let words = random_words(&["rust", "layout", "cloud"], &mut rng);
//! cloud.render(&words, "out.png")?;
//! # Ok(())
//! # }
//! ```

mod raster;
mod word;

#[cfg(test)]
mod tests;

pub use tiny_skia::ColorU8;
pub use word::{random_words, Word};

use std::fs;
use std::path::Path;

use fontdue::{Font, FontSettings};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use raster::Surface;

/// Packed word width of the board and of mask rows.
const WORD_BITS: usize = 64;

/// Edge of the square scratch surface words are batch-rasterized on.
/// Tunable; a smaller surface only costs extra packing passes.
const SCRATCH_EDGE: u32 = 1 << 12;

/// Horizontal gap between words packed on the scratch surface.
const GUTTER: i32 = 10;

/// Angle increment per spiral step, in radians.
const SPIRAL_STEP: f64 = 0.1;

/// Alternating-direction spiral attempts before a word is given up on.
const PLACE_ATTEMPTS: u32 = 10;

/// Default fraction of a word's measured height kept above the baseline.
const BASELINE_DEFAULT: f64 = 0.9;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Error)]
pub enum Error {
    /// Rendering or measuring was attempted before a font was configured.
    #[error("no font set; call set_font, set_font_bytes or set_font_file first")]
    FontUnavailable,
    /// A single word's bounding box can never fit the scratch surface.
    #[error("word {0:?} is too large for the rasterization surface")]
    OversizedWord(String),
    /// The spiral search ran out of room for some word.
    #[error("canvas too small for the remaining words; increase its width and height")]
    CanvasExhausted,
    #[error("font error: {0}")]
    Font(String),
    #[error("render error: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Packed-Bit Primitives
// =============================================================================

/// Number of 64-bit words needed to hold `bits` bits.
fn word_count(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// True if any set bit of `run` is also set in `words` when the run is laid
/// down starting at absolute bit `offset`. An unaligned run straddles two
/// words; the spill into the second exists only when `offset % 64 != 0`, so
/// a shift by the full word width is never executed.
fn test_run(words: &[u64], offset: usize, run: u64) -> bool {
    let (index, shift) = (offset / WORD_BITS, offset % WORD_BITS);
    if words[index] & (run << shift) != 0 {
        return true;
    }
    if shift != 0 {
        let spill = run >> (WORD_BITS - shift);
        if spill != 0 && words[index + 1] & spill != 0 {
            return true;
        }
    }
    false
}

/// ORs `run` into `words` at absolute bit `offset`; the write twin of
/// [`test_run`].
fn set_run(words: &mut [u64], offset: usize, run: u64) {
    let (index, shift) = (offset / WORD_BITS, offset % WORD_BITS);
    words[index] |= run << shift;
    if shift != 0 {
        let spill = run >> (WORD_BITS - shift);
        if spill != 0 {
            words[index + 1] |= spill;
        }
    }
}

// =============================================================================
// Occupancy Board
// =============================================================================

/// The canvas-wide occupancy bitset: bit `p % 64` of word `p / 64` is set
/// iff pixel `p = y * width + x` has been claimed by some placed word.
pub struct Board {
    width: i32,
    height: i32,
    bits: Vec<u64>,
}

impl Board {
    fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            bits: vec![0; word_count((width * height) as usize)],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Occupancy of the pixel with linear index `index`.
    pub fn bit(&self, index: usize) -> bool {
        self.bits[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// The raw packed words, row-major by linear pixel index.
    pub fn bits(&self) -> &[u64] {
        &self.bits
    }

    /// Tests the mask anchored at `(x, y)` against the board, stopping at
    /// the first overlapping segment. Zero segments are skipped before any
    /// board address is formed, and segments beyond the last ink column are
    /// pruned. The caller has already bounds-checked the anchor.
    fn is_collide(&self, mask: &GlyphMask, x: i32, y: i32) -> bool {
        let row_words = mask.row_words();
        for row in mask.ink_top..=mask.ink_bottom {
            let base = (row - mask.ink_top) as usize * row_words;
            let mut col = 0;
            while col <= mask.ink_right {
                let run = mask.bits[base + col as usize / WORD_BITS];
                if run != 0 {
                    let offset = ((row + y) * self.width + col + x) as usize;
                    if test_run(&self.bits, offset, run) {
                        return true;
                    }
                }
                col += WORD_BITS as i32;
            }
        }
        false
    }

    /// ORs the mask into the board at `(x, y)`. Only called after
    /// [`Board::is_collide`] reported the spot free; there is no re-check.
    fn commit(&mut self, mask: &GlyphMask, x: i32, y: i32) {
        let row_words = mask.row_words();
        for row in mask.ink_top..=mask.ink_bottom {
            let base = (row - mask.ink_top) as usize * row_words;
            let mut col = 0;
            while col < mask.width {
                let run = mask.bits[base + col as usize / WORD_BITS];
                if run != 0 {
                    let offset = ((row + y) * self.width + col + x) as usize;
                    set_run(&mut self.bits, offset, run);
                }
                col += WORD_BITS as i32;
            }
        }
    }

    /// Writes the occupancy as green-on-transparent pixels, for eyeballing
    /// how tightly a render packed.
    fn save_debug_png(&self, path: &Path) -> Result<(), Error> {
        let mut pixmap = Pixmap::new(self.width as u32, self.height as u32)
            .ok_or_else(|| Error::Render("cannot allocate the board visualization".into()))?;
        if let Some(green) = PremultipliedColorU8::from_rgba(0, 255, 0, 255) {
            let pixels = pixmap.pixels_mut();
            for index in 0..(self.width * self.height) as usize {
                if self.bit(index) {
                    pixels[index] = green;
                }
            }
        }
        raster::write_png(&pixmap, path)
    }
}

// =============================================================================
// Glyph Masks
// =============================================================================

/// The trimmed, packed-bit footprint of one rasterized word.
///
/// `bits` stores only the rows of the post-rotation bounding box that carry
/// ink, `row_words()` 64-bit words per row, LSB first within each word. A
/// word that rasterized blank keeps `ink_bottom` at the `-1` sentinel and an
/// empty bit vector.
struct GlyphMask {
    /// Post-rotation bounding box.
    width: i32,
    height: i32,
    /// Measured height before rotation, padding included; the final draw
    /// re-derives its baseline anchor from this.
    measured_h: i32,
    ink_top: i32,
    ink_bottom: i32,
    ink_left: i32,
    ink_right: i32,
    /// Resolved rotation in degrees, never the auto sentinel.
    rotate: i32,
    padding: i32,
    bits: Vec<u64>,
}

impl GlyphMask {
    /// Trims untrimmed packed rows down to the ink band and records the ink
    /// column bounds. Interior blank rows are kept; only leading and
    /// trailing blank rows are dropped.
    fn from_rows(
        width: i32,
        height: i32,
        measured_h: i32,
        rotate: i32,
        padding: i32,
        rows: Vec<u64>,
    ) -> Self {
        let row_words = word_count(width as usize);
        let mut ink_top = 0;
        let mut ink_bottom = -1;
        let mut ink_left = (width - 1).max(0);
        let mut ink_right = 0;
        for y in 0..height as usize {
            let mut any = false;
            for (k, &bits) in rows[y * row_words..(y + 1) * row_words].iter().enumerate() {
                if bits == 0 {
                    continue;
                }
                any = true;
                let first = (k * WORD_BITS) as i32 + bits.trailing_zeros() as i32;
                let last = (k * WORD_BITS + WORD_BITS - 1) as i32 - bits.leading_zeros() as i32;
                ink_left = ink_left.min(first);
                ink_right = ink_right.max(last);
            }
            if any {
                ink_bottom = y as i32;
            } else if ink_bottom < 0 {
                ink_top += 1;
            }
        }
        let bits = if ink_bottom >= ink_top {
            rows[ink_top as usize * row_words..(ink_bottom as usize + 1) * row_words].to_vec()
        } else {
            Vec::new()
        };
        Self {
            width,
            height,
            measured_h,
            ink_top,
            ink_bottom,
            ink_left,
            ink_right,
            rotate,
            padding,
            bits,
        }
    }

    fn row_words(&self) -> usize {
        word_count(self.width as usize)
    }
}

/// In-place Chebyshev dilation of packed rows by `radius` pixels: each pass
/// ORs every bit into its eight neighbors, carrying across 64-bit word
/// boundaries, then clips bits beyond `width` so growth never wraps into the
/// next packed row.
fn dilate_rows(rows: &mut [u64], row_words: usize, width: i32, radius: i32) {
    if row_words == 0 || rows.is_empty() || radius <= 0 {
        return;
    }
    let height = rows.len() / row_words;
    let tail_bits = width as usize % WORD_BITS;
    let tail_mask: u64 = if tail_bits == 0 {
        !0
    } else {
        (1u64 << tail_bits) - 1
    };
    let mut smeared = vec![0u64; rows.len()];
    for _ in 0..radius {
        for y in 0..height {
            let src = &rows[y * row_words..(y + 1) * row_words];
            let dst = &mut smeared[y * row_words..(y + 1) * row_words];
            for k in 0..row_words {
                let mut v = src[k] | src[k] << 1 | src[k] >> 1;
                if k > 0 {
                    v |= src[k - 1] >> (WORD_BITS - 1);
                }
                if k + 1 < row_words {
                    v |= src[k + 1] << (WORD_BITS - 1);
                }
                dst[k] = v;
            }
            dst[row_words - 1] &= tail_mask;
        }
        for y in 0..height {
            for k in 0..row_words {
                let mut v = smeared[y * row_words + k];
                if y > 0 {
                    v |= smeared[(y - 1) * row_words + k];
                }
                if y + 1 < height {
                    v |= smeared[(y + 1) * row_words + k];
                }
                rows[y * row_words + k] = v;
            }
        }
    }
}

// =============================================================================
// Spiral Search
// =============================================================================

/// Archimedean spiral offsets from the canvas center: `θ = t·step`, `r = θ`,
/// stretched horizontally by the canvas aspect ratio so the path traces an
/// ellipse matching the canvas proportions. The iterator ends once the
/// offset is guaranteed outside the canvas on both axes. A negative `dt`
/// traces the spiral in the opposite rotational sense.
struct Spiral {
    t: i32,
    dt: i32,
    aspect: f64,
    max_delta: f64,
}

impl Spiral {
    fn new(width: i32, height: i32, dt: i32) -> Self {
        Self {
            t: 0,
            dt,
            aspect: f64::from(width) / f64::from(height),
            max_delta: (f64::from(width).powi(2) + f64::from(height).powi(2)).sqrt(),
        }
    }
}

impl Iterator for Spiral {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        self.t += self.dt;
        let theta = f64::from(self.t) * SPIRAL_STEP;
        let dx = self.aspect * theta * theta.cos();
        let dy = theta * theta.sin();
        if dx.abs().min(dy.abs()) > self.max_delta {
            return None;
        }
        Some((dx as i32, dy as i32))
    }
}

// =============================================================================
// Word Cloud
// =============================================================================

/// Lays words out on a `width × height` canvas and renders them to PNG.
///
/// Words are processed strictly in the order the caller supplies; sort by
/// descending size (as [`random_words`] does) so large labels claim central
/// space first.
pub struct WordCloud {
    width: i32,
    height: i32,
    angle_range: i32,
    orientations: i32,
    baseline: f64,
    font: Option<Font>,
    rng: ChaCha8Rng,
}

impl WordCloud {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            angle_range: 0,
            orientations: 0,
            baseline: BASELINE_DEFAULT,
            font: None,
            rng: ChaCha8Rng::from_os_rng(),
        }
    }

    pub fn set_font(&mut self, font: Font) {
        self.font = Some(font);
    }

    pub fn set_font_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        let font =
            Font::from_bytes(data, FontSettings::default()).map_err(|e| Error::Font(e.into()))?;
        self.font = Some(font);
        Ok(())
    }

    pub fn set_font_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let data = fs::read(path)?;
        self.set_font_bytes(&data)
    }

    /// Enables auto rotation: a word without an explicit angle picks one of
    /// `orientations` evenly spaced angles in `[-range/2, +range/2]`. The
    /// range is clamped to `[30, 120]` degrees, the count to at least 2.
    pub fn set_rotate(&mut self, angle_range: i32, orientations: i32) {
        self.angle_range = angle_range.clamp(30, 120);
        self.orientations = orientations.max(2);
    }

    /// Reseeds the random source. Two renders of the same word list from the
    /// same seed produce bit-identical occupancy boards.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Fraction of a word's measured height kept above the text baseline
    /// when anchoring glyphs, 0.9 by default. A tuning knob for fonts whose
    /// ascent metrics sit unusually high or low.
    pub fn set_baseline(&mut self, fraction: f64) {
        self.baseline = fraction.clamp(0.05, 1.0);
    }

    /// Lays out `words` and writes the rendered cloud to `path`.
    pub fn render(&mut self, words: &[Word], path: impl AsRef<Path>) -> Result<(), Error> {
        self.render_all(words, path, false).map(|_| ())
    }

    /// Like [`WordCloud::render`], but returns the final occupancy board.
    /// With `render_others`, the last scratch pass (`cal_board.png`) and a
    /// board visualization (`board.png`) are written next to the output.
    ///
    /// Any placement failure aborts the whole render; there is no partial
    /// success.
    pub fn render_all(
        &mut self,
        words: &[Word],
        path: impl AsRef<Path>,
        render_others: bool,
    ) -> Result<Board, Error> {
        let path = path.as_ref();
        let mut output = Surface::new(self.width as u32, self.height as u32)?;
        let mut scratch = Surface::new(SCRATCH_EDGE, SCRATCH_EDGE)?;

        let mut masks = self.build_masks(&mut scratch, words)?;
        while masks.len() < words.len() {
            let more = self.build_masks(&mut scratch, &words[masks.len()..])?;
            if more.is_empty() {
                // A fresh pass produced nothing, so the next word can never fit.
                return Err(Error::OversizedWord(words[masks.len()].text.clone()));
            }
            masks.extend(more);
        }

        let mut board = Board::new(self.width, self.height);
        for (word, mask) in words.iter().zip(&masks) {
            let (x, y) = self.place(&board, mask)?;
            self.draw_word(&mut output, word, mask, x, y)?;
            board.commit(mask, x, y);
        }
        info!(
            "placed {} words on a {}x{} canvas",
            words.len(),
            self.width,
            self.height
        );

        if render_others {
            let dir = path.parent().unwrap_or(Path::new(""));
            scratch.save_png(&dir.join("cal_board.png"))?;
            board.save_debug_png(&dir.join("board.png"))?;
        }
        output.save_png(path)?;
        Ok(board)
    }

    /// Rasterizes a prefix of `words` into masks, packing left-to-right,
    /// top-to-bottom across the scratch surface. Returns fewer masks than
    /// words when the surface fills up; the caller re-invokes on the rest.
    fn build_masks(
        &mut self,
        scratch: &mut Surface,
        words: &[Word],
    ) -> Result<Vec<GlyphMask>, Error> {
        let Self {
            font,
            rng,
            angle_range,
            orientations,
            baseline,
            ..
        } = self;
        let font = font.as_ref().ok_or(Error::FontUnavailable)?;
        let (angle_range, orientations, baseline) = (*angle_range, *orientations, *baseline);

        let ink = ColorU8::from_rgba(0, 0, 0, 255);
        let (surface_w, surface_h) = (scratch.width(), scratch.height());
        scratch.clear();
        let (mut left, mut top, mut max_row_h) = (0, 0, 0);
        let mut masks = Vec::new();

        for word in words {
            let (mut measured_w, mut measured_h) =
                raster::measure_string(font, &word.text, word.size);
            if word.padding > 0 {
                measured_w += word.padding * 2;
                measured_h += word.padding * 2;
            }
            let rotate = match word.rotate {
                Some(degrees) => degrees,
                None if angle_range == 0 => 0,
                None => rand_rotate(rng, angle_range, orientations),
            };
            let radians = f64::from(rotate).to_radians();
            let (sin, cos) = radians.sin_cos();
            let (box_w, box_h) = if rotate != 0 {
                (
                    (cos.abs() * f64::from(measured_w) + sin.abs() * f64::from(measured_h) + 1.0)
                        as i32,
                    (cos.abs() * f64::from(measured_h) + sin.abs() * f64::from(measured_w) + 1.0)
                        as i32,
                )
            } else {
                (measured_w, measured_h)
            };

            if box_w >= surface_w || box_h >= surface_h {
                return Err(Error::OversizedWord(word.text.clone()));
            }
            if left + box_w >= surface_w {
                top += max_row_h;
                left = 0;
            }
            if top + box_h >= surface_h {
                // Surface exhausted for this pass; the rest go into the next.
                break;
            }

            if rotate != 0 {
                let (anchor_x, anchor_y) =
                    draw_anchor(left, top, measured_h, box_h, word.padding, radians, baseline);
                scratch.draw_string(font, &word.text, word.size, anchor_x, anchor_y, radians, ink);
            } else {
                let anchor_x = f64::from(left + word.padding);
                let anchor_y = f64::from(top + baseline_drop(box_h, baseline));
                scratch.draw_string(font, &word.text, word.size, anchor_x, anchor_y, 0.0, ink);
            }

            let row_words = word_count(box_w as usize);
            let mut rows = vec![0u64; row_words * box_h as usize];
            for y in 0..box_h {
                for x in 0..box_w {
                    if scratch.is_ink(left + x, top + y) {
                        rows[y as usize * row_words + x as usize / WORD_BITS] |=
                            1u64 << (x as usize % WORD_BITS);
                    }
                }
            }
            dilate_rows(&mut rows, row_words, box_w, word.padding);

            masks.push(GlyphMask::from_rows(
                box_w,
                box_h,
                measured_h,
                rotate,
                word.padding,
                rows,
            ));
            max_row_h = max_row_h.max(box_h);
            left += box_w + GUTTER;
        }

        debug!(
            "rasterized {} of {} words in one scratch pass",
            masks.len(),
            words.len()
        );
        Ok(masks)
    }

    /// Finds a free spot for the mask, spiraling out from the canvas center.
    /// The initial rotational sense is random; on exhaustion the spiral is
    /// retraced in the opposite sense, alternating for up to ten attempts to
    /// escape traversals that happen to graze every occupied region.
    fn place(&mut self, board: &Board, mask: &GlyphMask) -> Result<(i32, i32), Error> {
        let mut dt = if self.rng.random_bool(0.5) { 1 } else { -1 };
        for attempt in 0..PLACE_ATTEMPTS {
            if let Some(found) = self.place_by_dt(dt, board, mask) {
                return Ok(found);
            }
            debug!("spiral pass {attempt} exhausted, flipping direction");
            dt = -dt;
        }
        Err(Error::CanvasExhausted)
    }

    fn place_by_dt(&self, dt: i32, board: &Board, mask: &GlyphMask) -> Option<(i32, i32)> {
        let center_x = self.width / 2;
        let center_y = self.height / 2;
        for (dx, dy) in Spiral::new(self.width, self.height, dt) {
            // Center the ink box, not the raw box, on the spiral point.
            let x = center_x + dx - mask.ink_left - (mask.ink_right - mask.ink_left) / 2;
            let y = center_y + dy - mask.ink_top - (mask.ink_bottom - mask.ink_top) / 2;
            if !self.fits(x, y, mask) {
                continue;
            }
            if !board.is_collide(mask, x, y) {
                return Some((x, y));
            }
        }
        None
    }

    /// The ink-plus-padding box must lie inside the canvas, and the anchor
    /// itself must not go negative: packed runs are addressed through the
    /// flat pixel index, so a negative anchor column would alias the
    /// previous row.
    fn fits(&self, x: i32, y: i32, mask: &GlyphMask) -> bool {
        x >= 0
            && x + mask.ink_left - mask.padding >= 0
            && x + mask.ink_right + 1 + mask.padding < self.width
            && y + mask.ink_top - mask.padding >= 0
            && y + mask.ink_bottom + 1 + mask.padding < self.height
    }

    /// Draws the word into the output surface at the placement anchor,
    /// deriving the baseline exactly as the mask pass did so the ink lands
    /// on the committed bits.
    fn draw_word(
        &self,
        output: &mut Surface,
        word: &Word,
        mask: &GlyphMask,
        x: i32,
        y: i32,
    ) -> Result<(), Error> {
        let font = self.font.as_ref().ok_or(Error::FontUnavailable)?;
        let color = word
            .color
            .unwrap_or_else(|| ColorU8::from_rgba(0, 0, 0, 255));
        if mask.rotate != 0 {
            let radians = f64::from(mask.rotate).to_radians();
            let (anchor_x, anchor_y) = draw_anchor(
                x,
                y,
                mask.measured_h,
                mask.height,
                mask.padding,
                radians,
                self.baseline,
            );
            output.draw_string(font, &word.text, word.size, anchor_x, anchor_y, radians, color);
        } else {
            let anchor_x = f64::from(x + mask.padding);
            let anchor_y = f64::from(y + baseline_drop(mask.height, self.baseline));
            output.draw_string(font, &word.text, word.size, anchor_x, anchor_y, 0.0, color);
        }
        Ok(())
    }
}

/// One of `orientations` evenly spaced angles across `[-range/2, +range/2]`.
fn rand_rotate<R: Rng>(rng: &mut R, angle_range: i32, orientations: i32) -> i32 {
    rng.random_range(0..orientations) * angle_range / (orientations - 1) - angle_range / 2
}

/// Baseline anchor for a rotated word whose box top-left sits at
/// `(base_x, base_y)`: `baseline` of the measured height stays above the
/// baseline for either rotation direction, and the horizontal inset keeps
/// padded glyphs off the box edge.
fn draw_anchor(
    base_x: i32,
    base_y: i32,
    measured_h: i32,
    box_h: i32,
    padding: i32,
    radians: f64,
    baseline: f64,
) -> (f64, f64) {
    let (sin, cos) = radians.sin_cos();
    let inset = (f64::from(padding) * (sin.abs() + cos.abs())).ceil();
    let x = (f64::from(base_x) + inset)
        .max((f64::from(base_x) - sin * f64::from(measured_h) * baseline).ceil());
    let y = if sin < 0.0 {
        (f64::from(box_h) * baseline).ceil() + f64::from(base_y)
    } else {
        (f64::from(measured_h) * baseline * cos).ceil() + f64::from(base_y)
    };
    (x, y)
}

/// Baseline offset from the box top for an unrotated word.
fn baseline_drop(box_h: i32, baseline: f64) -> i32 {
    box_h - (f64::from(box_h) * (1.0 - baseline)) as i32
}
