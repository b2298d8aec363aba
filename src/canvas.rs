use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::colors::{WHITE, blend_over};
use crate::error::PaintError;

/// Upper bound on canvas area; larger requests are clamped to 1×1.
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// SNAPSHOT – immutable raster copy owned by the history log
// ============================================================================

/// Immutable copy of a buffer's raster content at one instant.
///
/// The pixels sit behind an `Arc`, so cloning a snapshot (history hand-back,
/// export on a worker thread) never copies pixel data, and nothing can write
/// through it.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pixels: Arc<RgbaImage>,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the very same recorded state.
    pub fn same_entry(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Pixel bytes held by this snapshot.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.same_entry(other)
            || (self.dimensions() == other.dimensions() && self.as_raw() == other.as_raw())
    }
}

impl Eq for Snapshot {}

// ============================================================================
// PIXEL BUFFER – the live raster surface
// ============================================================================

/// W×H RGBA surface, stored as a flat `RgbaImage` (length is always W×H×4).
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    pixels: RgbaImage,
    background: Rgba<u8>,
}

fn clamp_dimensions(width: u32, height: u32) -> (u32, u32) {
    let (width, height) = (width.max(1), height.max(1));
    if width as u64 * height as u64 > MAX_PIXELS {
        log_warn!(
            "PixelBuffer: {}×{} exceeds {} pixels, clamped to 1×1",
            width,
            height,
            MAX_PIXELS
        );
        return (1, 1);
    }
    (width, height)
}

impl PixelBuffer {
    /// Opaque white paint surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_background(width, height, WHITE)
    }

    pub fn with_background(width: u32, height: u32, background: Rgba<u8>) -> Self {
        let (width, height) = clamp_dimensions(width, height);
        Self {
            pixels: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    /// Changes the color used by `clear` and `resize`; existing pixels are untouched.
    pub fn set_background(&mut self, background: Rgba<u8>) {
        self.background = background;
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    fn out_of_bounds(&self, x: i64, y: i64) -> PaintError {
        PaintError::OutOfBounds {
            x,
            y,
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Result<Rgba<u8>, PaintError> {
        if !self.contains(x as i64, y as i64) {
            return Err(self.out_of_bounds(x as i64, y as i64));
        }
        Ok(*self.pixels.get_pixel(x, y))
    }

    pub fn set(&mut self, x: u32, y: u32, color: Rgba<u8>) -> Result<(), PaintError> {
        if !self.contains(x as i64, y as i64) {
            return Err(self.out_of_bounds(x as i64, y as i64));
        }
        self.pixels.put_pixel(x, y, color);
        Ok(())
    }

    /// Pointer-space lookup: floors the coordinates, rejects anything off-canvas.
    pub fn pixel_at(&self, x: f32, y: f32) -> Result<(u32, u32), PaintError> {
        let (ix, iy) = (x.floor() as i64, y.floor() as i64);
        if !x.is_finite() || !y.is_finite() || !self.contains(ix, iy) {
            return Err(self.out_of_bounds(ix, iy));
        }
        Ok((ix as u32, iy as u32))
    }

    /// Source-over composite `color` at (x, y). Off-canvas writes are dropped,
    /// which is what drawing primitives straddling an edge want.
    #[inline]
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba<u8>) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        *px = blend_over(*px, color);
        true
    }

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        let raw: &mut [u8] = &mut self.pixels;
        raw.par_chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&color.0));
    }

    /// Fill every pixel with the background color.
    pub fn clear(&mut self) {
        self.fill(self.background);
    }

    /// Reallocate to `width`×`height`, keeping the overlapping region at the
    /// origin and painting new area with the background color.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = clamp_dimensions(width, height);
        if (width, height) == self.dimensions() {
            return;
        }

        let old_w = self.width() as usize;
        let copy_w = old_w.min(width as usize);
        let copy_h = (self.height() as usize).min(height as usize);
        let old_raw = self.pixels.as_raw();
        let bg = self.background.0;

        let row_bytes = width as usize * 4;
        let mut raw = vec![0u8; row_bytes * height as usize];
        raw.par_chunks_exact_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let kept = if y < copy_h {
                    let src = y * old_w * 4;
                    row[..copy_w * 4].copy_from_slice(&old_raw[src..src + copy_w * 4]);
                    copy_w * 4
                } else {
                    0
                };
                for px in row[kept..].chunks_exact_mut(4) {
                    px.copy_from_slice(&bg);
                }
            });

        self.pixels = RgbaImage::from_raw(width, height, raw)
            .unwrap_or_else(|| RgbaImage::from_pixel(width, height, Rgba(bg)));
    }

    /// Immutable deep copy of the current raster.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pixels: Arc::new(self.pixels.clone()),
        }
    }

    /// Overwrite the whole raster with `snapshot`. Dimensions must match; the
    /// caller resizes first when they do not.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), PaintError> {
        if snapshot.dimensions() != self.dimensions() {
            return Err(PaintError::DimensionMismatch {
                expected: self.dimensions(),
                found: snapshot.dimensions(),
            });
        }
        let raw: &mut [u8] = &mut self.pixels;
        raw.copy_from_slice(snapshot.as_raw());
        Ok(())
    }

    /// Copy `src` with its top-left corner at (x, y), clipped to the canvas.
    /// Returns the number of pixels written.
    pub fn blit(&mut self, src: &RgbaImage, x: i64, y: i64) -> usize {
        let mut written = 0;
        for (sx, sy, px) in src.enumerate_pixels() {
            let (dx, dy) = (x + sx as i64, y + sy as i64);
            if self.contains(dx, dy) {
                self.pixels.put_pixel(dx as u32, dy as u32, *px);
                written += 1;
            }
        }
        written
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn raw_length_tracks_dimensions() {
        let mut buf = PixelBuffer::new(7, 3);
        assert_eq!(buf.as_raw().len(), 7 * 3 * 4);
        buf.resize(2, 9);
        assert_eq!(buf.as_raw().len(), 2 * 9 * 4);
    }

    #[test]
    fn zero_dimensions_clamp_to_one() {
        let buf = PixelBuffer::new(0, 0);
        assert_eq!(buf.dimensions(), (1, 1));
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.set(3, 3, RED).unwrap();
        assert_eq!(buf.get(3, 3).unwrap(), RED);
        assert!(matches!(buf.get(4, 0), Err(PaintError::OutOfBounds { x: 4, y: 0, .. })));
        assert!(matches!(buf.set(0, 4, RED), Err(PaintError::OutOfBounds { .. })));
    }

    #[test]
    fn pixel_at_floors_and_rejects_negatives() {
        let buf = PixelBuffer::new(4, 4);
        assert_eq!(buf.pixel_at(2.9, 0.1).unwrap(), (2, 0));
        assert!(buf.pixel_at(-0.5, 1.0).is_err());
        assert!(buf.pixel_at(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn resize_keeps_origin_content_and_pads_with_background() {
        let mut buf = PixelBuffer::new(3, 3);
        buf.set(0, 0, RED).unwrap();
        buf.set(2, 2, RED).unwrap();
        buf.resize(5, 2);

        assert_eq!(buf.get(0, 0).unwrap(), RED);
        assert_eq!(buf.get(4, 1).unwrap(), WHITE);
        assert_eq!(buf.get(3, 0).unwrap(), WHITE);

        buf.resize(5, 5);
        // Row 2 was cropped away by the previous shrink.
        assert_eq!(buf.get(2, 2).unwrap(), WHITE);
    }

    #[test]
    fn restore_after_resize_is_a_dimension_mismatch() {
        let mut buf = PixelBuffer::new(10, 10);
        let snap = buf.snapshot();
        buf.resize(12, 10);
        match buf.restore(&snap) {
            Err(PaintError::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, (12, 10));
                assert_eq!(found, (10, 10));
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn snapshot_is_independent_of_later_edits() {
        let mut buf = PixelBuffer::new(2, 2);
        let snap = buf.snapshot();
        buf.set(1, 1, RED).unwrap();
        assert_eq!(snap.get_pixel(1, 1), Some(WHITE));

        buf.restore(&snap).unwrap();
        assert_eq!(buf.get(1, 1).unwrap(), WHITE);
    }

    #[test]
    fn blit_clips_at_edges() {
        let mut buf = PixelBuffer::new(3, 3);
        let src = RgbaImage::from_pixel(2, 2, RED);
        assert_eq!(buf.blit(&src, 2, -1), 1);
        assert_eq!(buf.get(2, 0).unwrap(), RED);
        assert_eq!(buf.get(1, 0).unwrap(), WHITE);
    }

    #[test]
    fn clear_uses_background() {
        let mut buf = PixelBuffer::with_background(2, 2, RED);
        buf.fill(WHITE);
        buf.clear();
        assert!(buf.image().pixels().all(|p| *p == RED));
    }
}
