//! Thin drawing glue over `tiny_skia::Pixmap` and `fontdue`.
//!
//! The layout engine only needs three things from a surface: blend glyph
//! coverage at an (optionally rotated) baseline anchor, answer "does this
//! pixel differ from the cleared background", and save itself as a PNG.

use std::fs;
use std::path::Path;

use fontdue::{Font, LineMetrics};
use tiny_skia::{Color, ColorU8, Pixmap, PremultipliedColorU8};

use crate::Error;

/// A white-backed RGBA pixel surface.
pub(crate) struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    pub(crate) fn new(width: u32, height: u32) -> Result<Self, Error> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Render(format!("cannot allocate a {width}x{height} surface")))?;
        let mut surface = Self { pixmap };
        surface.clear();
        Ok(surface)
    }

    pub(crate) fn width(&self) -> i32 {
        self.pixmap.width() as i32
    }

    pub(crate) fn height(&self) -> i32 {
        self.pixmap.height() as i32
    }

    /// Resets every pixel to opaque white, the background all ink scans
    /// compare against.
    pub(crate) fn clear(&mut self) {
        self.pixmap.fill(Color::WHITE);
    }

    /// True if the pixel differs from the cleared background. Out-of-range
    /// coordinates are never ink.
    pub(crate) fn is_ink(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return false;
        }
        let px = self.pixmap.pixels()[y as usize * self.pixmap.width() as usize + x as usize];
        !(px.red() == 255 && px.green() == 255 && px.blue() == 255 && px.alpha() == 255)
    }

    /// Draws `text` with its baseline starting at `(x, y)`, rotated by
    /// `radians` around that anchor. Glyph coverage is blended source-over,
    /// so anti-aliased edges land on the surface exactly as they will be
    /// scanned.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn draw_string(
        &mut self,
        font: &Font,
        text: &str,
        size: i32,
        x: f64,
        y: f64,
        radians: f64,
        color: ColorU8,
    ) {
        let (sin, cos) = radians.sin_cos();
        let mut pen = 0.0f64;
        for ch in text.chars() {
            let (metrics, coverage) = font.rasterize(ch, size as f32);
            let glyph_left = pen + f64::from(metrics.xmin);
            let glyph_top = -(metrics.height as f64) - f64::from(metrics.ymin);
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let cov = coverage[gy * metrics.width + gx];
                    if cov == 0 {
                        continue;
                    }
                    let lx = glyph_left + gx as f64;
                    let ly = glyph_top + gy as f64;
                    let px = x + lx * cos - ly * sin;
                    let py = y + lx * sin + ly * cos;
                    self.blend_pixel(px.round() as i32, py.round() as i32, color, cov);
                }
            }
            pen += f64::from(metrics.advance_width);
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: ColorU8, coverage: u8) {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return;
        }
        let alpha = u32::from(coverage) * u32::from(color.alpha()) / 255;
        if alpha == 0 {
            return;
        }
        let idx = y as usize * self.pixmap.width() as usize + x as usize;
        let dst = self.pixmap.pixels_mut()[idx];
        // Surfaces stay opaque (cleared to opaque white), so the stored
        // premultiplied channels equal the straight ones and the result
        // keeps alpha 255.
        let inv = 255 - alpha;
        let r = ((u32::from(color.red()) * alpha + u32::from(dst.red()) * inv) / 255) as u8;
        let g = ((u32::from(color.green()) * alpha + u32::from(dst.green()) * inv) / 255) as u8;
        let b = ((u32::from(color.blue()) * alpha + u32::from(dst.blue()) * inv) / 255) as u8;
        if let Some(px) = PremultipliedColorU8::from_rgba(r, g, b, 255) {
            self.pixmap.pixels_mut()[idx] = px;
        }
    }

    pub(crate) fn save_png(&self, path: &Path) -> Result<(), Error> {
        write_png(&self.pixmap, path)
    }
}

pub(crate) fn write_png(pixmap: &Pixmap, path: &Path) -> Result<(), Error> {
    let data = pixmap
        .encode_png()
        .map_err(|e| Error::Render(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

/// Measures the rendered box of `text` at `size` points. The height carries
/// a 50% allowance on top of the raw ascent-to-descent span; mixed scripts
/// routinely overshoot their nominal line box and the mask scan trims the
/// slack away again.
pub(crate) fn measure_string(font: &Font, text: &str, size: i32) -> (i32, i32) {
    let px = size as f32;
    let mut width = 0.0f32;
    for ch in text.chars() {
        width += font.metrics(ch, px).advance_width;
    }
    let line = font.horizontal_line_metrics(px).unwrap_or(LineMetrics {
        ascent: px * 0.8,
        descent: px * -0.2,
        line_gap: 0.0,
        new_line_size: px,
    });
    let mut height = line.ascent - line.descent;
    height += height / 2.0;
    (width as i32, height as i32)
}
