use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::Rgba;

use crate::canvas::PixelBuffer;

/// Font files tried, in order, when no font is configured.
const FALLBACK_FONT_FILES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Embedded last-resort font, so the text tool works without system fonts.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

pub fn bundled_font() -> Option<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).ok()
}

pub fn load_font_file(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            log_warn!("Text: {} is not a usable font: {}", path.display(), e);
            None
        }
    }
}

/// Lazily resolved font for the text tool.
///
/// The configured path wins; otherwise the first readable well-known system
/// font is used, then the embedded one. Resolution happens once, on first use.
pub struct TextRasterizer {
    font_path: Option<PathBuf>,
    font: Option<FontArc>,
    resolved: bool,
}

impl TextRasterizer {
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self {
            font_path,
            font: None,
            resolved: false,
        }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font_path: None,
            font: Some(font),
            resolved: true,
        }
    }

    pub fn font(&mut self) -> Option<&FontArc> {
        if !self.resolved {
            self.resolved = true;
            self.font = self.resolve();
        }
        self.font.as_ref()
    }

    fn resolve(&self) -> Option<FontArc> {
        if let Some(path) = &self.font_path {
            if let Some(font) = load_font_file(path) {
                log_info!("Text: using font {}", path.display());
                return Some(font);
            }
            log_warn!("Text: configured font {} could not be loaded", path.display());
        }
        for candidate in FALLBACK_FONT_FILES {
            let path = Path::new(candidate);
            if path.is_file() {
                if let Some(font) = load_font_file(path) {
                    log_info!("Text: using system font {}", candidate);
                    return Some(font);
                }
            }
        }
        let font = bundled_font();
        if font.is_some() {
            log_info!("Text: using embedded font");
        } else {
            log_err!("Text: no font available");
        }
        font
    }
}

/// Lay out `text` with the first baseline at y = 0 and lines stacked by the
/// font's line height. Returns `(glyph, x, y)` positions.
pub fn layout_text(font: &FontArc, text: &str, font_size: f32) -> Vec<(GlyphId, f32, f32)> {
    let scaled = font.as_scaled(font_size);
    let line_height = scaled.height() + scaled.line_gap();
    let mut glyphs = Vec::new();

    for (line_idx, line) in text.split('\n').enumerate() {
        let y = line_idx as f32 * line_height;
        let mut cursor_x = 0.0f32;
        let mut last: Option<GlyphId> = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = last {
                cursor_x += scaled.kern(prev, id);
            }
            glyphs.push((id, cursor_x, y));
            cursor_x += scaled.h_advance(id);
            last = Some(id);
        }
    }
    glyphs
}

/// Draw `text` with its first baseline starting at (origin_x, origin_y).
///
/// Glyph coverage is accumulated into a single-channel buffer over the text's
/// on-canvas bounds, then composited with `color`'s alpha scaled by coverage.
/// Returns the number of pixels touched.
pub fn rasterize_text(
    buffer: &mut PixelBuffer,
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    color: Rgba<u8>,
) -> usize {
    let glyphs = layout_text(font, text, font_size);
    if glyphs.is_empty() || !(font_size > 0.0) {
        return 0;
    }

    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for &(id, gx, gy) in &glyphs {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let b = font.glyph_bounds(&glyph);
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64 + 1).min(buffer.width() as i64);
    let y1 = (max_y.ceil() as i64 + 1).min(buffer.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return 0;
    }
    let (cov_w, cov_h) = ((x1 - x0) as usize, (y1 - y0) as usize);
    let mut coverage = vec![0.0f32; cov_w * cov_h];

    for &(id, gx, gy) in &glyphs {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let b = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let cx = b.min.x as i64 + px as i64 - x0;
            let cy = b.min.y as i64 + py as i64 - y0;
            if cx >= 0 && cy >= 0 && (cx as usize) < cov_w && (cy as usize) < cov_h {
                let idx = cy as usize * cov_w + cx as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    let mut touched = 0;
    for (i, &cov) in coverage.iter().enumerate() {
        if cov <= 0.001 {
            continue;
        }
        let a = (color[3] as f32 * cov.min(1.0)).round() as u8;
        let x = x0 + (i % cov_w) as i64;
        let y = y0 + (i / cov_w) as i64;
        if buffer.blend_pixel(x, y, Rgba([color[0], color[1], color[2], a])) {
            touched += 1;
        }
    }
    touched
}
