use image::Rgba;

use crate::canvas::PixelBuffer;
use crate::error::PaintError;

/// What a flood fill changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FillOutcome {
    /// Number of pixels recolored.
    pub filled: usize,
    /// Inclusive `(min_x, min_y, max_x, max_y)` of the recolored region.
    pub bounds: Option<(u32, u32, u32, u32)>,
}

/// Recolor the 4-connected region of pixels exactly matching the seed color.
///
/// DFS over a `Vec` stack of packed flat indices, working directly on the raw
/// RGBA bytes. A recolored pixel can never match the target again, so each
/// pixel is pushed at most four times. Filling with the seed's own color is a
/// no-op.
pub fn flood_fill(
    buffer: &mut PixelBuffer,
    start_x: u32,
    start_y: u32,
    fill: Rgba<u8>,
) -> Result<FillOutcome, PaintError> {
    let target = buffer.get(start_x, start_y)?;
    if target == fill {
        return Ok(FillOutcome::default());
    }

    let (canvas_w, canvas_h) = buffer.dimensions();
    let wu = canvas_w as usize;
    let tc = target.0;
    let fc = fill.0;
    let flat = buffer.as_raw_mut();

    #[inline(always)]
    fn matches(flat: &[u8], idx: usize, tc: [u8; 4]) -> bool {
        let o = idx * 4;
        flat[o..o + 4] == tc
    }

    let mut min_x = start_x;
    let mut min_y = start_y;
    let mut max_x = start_x;
    let mut max_y = start_y;
    let mut filled = 0usize;

    // Packed index = y * canvas_w + x; canvas area is capped well below u32::MAX.
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    stack.push((start_y as usize * wu + start_x as usize) as u32);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        if !matches(flat, idx, tc) {
            continue;
        }
        flat[idx * 4..idx * 4 + 4].copy_from_slice(&fc);
        filled += 1;

        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        // Left
        if x > 0 && matches(flat, idx - 1, tc) {
            stack.push((idx - 1) as u32);
        }
        // Right
        if x + 1 < canvas_w && matches(flat, idx + 1, tc) {
            stack.push((idx + 1) as u32);
        }
        // Up
        if y > 0 && matches(flat, idx - wu, tc) {
            stack.push((idx - wu) as u32);
        }
        // Down
        if y + 1 < canvas_h && matches(flat, idx + wu, tc) {
            stack.push((idx + wu) as u32);
        }
    }

    Ok(FillOutcome {
        filled,
        bounds: Some((min_x, min_y, max_x, max_y)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::{BLACK, WHITE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn bordered(size: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(size, size);
        for i in 0..size {
            buf.set(i, 0, BLACK).unwrap();
            buf.set(i, size - 1, BLACK).unwrap();
            buf.set(0, i, BLACK).unwrap();
            buf.set(size - 1, i, BLACK).unwrap();
        }
        buf
    }

    #[test]
    fn blank_canvas_fills_completely() {
        let mut buf = PixelBuffer::new(10, 10);
        let out = flood_fill(&mut buf, 5, 5, RED).unwrap();
        assert_eq!(out.filled, 100);
        assert_eq!(out.bounds, Some((0, 0, 9, 9)));
        assert!(buf.image().pixels().all(|p| *p == RED));
    }

    #[test]
    fn border_blocks_connectivity() {
        let mut buf = bordered(10);
        let out = flood_fill(&mut buf, 5, 5, BLUE).unwrap();
        assert_eq!(out.filled, 64);
        assert_eq!(out.bounds, Some((1, 1, 8, 8)));
        for y in 0..10 {
            for x in 0..10 {
                let edge = x == 0 || y == 0 || x == 9 || y == 9;
                let expected = if edge { BLACK } else { BLUE };
                assert_eq!(buf.get(x, y).unwrap(), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn diagonal_neighbours_are_not_connected() {
        // White pixel at (1,1) touches the white corner (0,0) only diagonally.
        let mut buf = PixelBuffer::new(3, 3);
        buf.fill(BLACK);
        buf.set(0, 0, WHITE).unwrap();
        buf.set(1, 1, WHITE).unwrap();
        let out = flood_fill(&mut buf, 1, 1, RED).unwrap();
        assert_eq!(out.filled, 1);
        assert_eq!(buf.get(0, 0).unwrap(), WHITE);
    }

    #[test]
    fn alpha_takes_part_in_matching() {
        let mut buf = PixelBuffer::new(3, 1);
        buf.set(1, 0, Rgba([255, 255, 255, 254])).unwrap();
        flood_fill(&mut buf, 0, 0, RED).unwrap();
        assert_eq!(buf.get(2, 0).unwrap(), WHITE);
    }

    #[test]
    fn seed_outside_buffer_fails_without_mutation() {
        let mut buf = PixelBuffer::new(4, 4);
        let before = buf.snapshot();
        assert!(matches!(flood_fill(&mut buf, 4, 1, RED), Err(PaintError::OutOfBounds { .. })));
        assert_eq!(buf.snapshot(), before);
    }

    #[test]
    fn fill_with_seed_color_is_noop_on_random_buffers() {
        let mut rng = StdRng::seed_from_u64(7);
        let palette = [WHITE, BLACK, RED, BLUE];
        for _ in 0..25 {
            let (w, h) = (rng.gen_range(1..16), rng.gen_range(1..16));
            let mut buf = PixelBuffer::new(w, h);
            for y in 0..h {
                for x in 0..w {
                    buf.set(x, y, palette[rng.gen_range(0..palette.len())]).unwrap();
                }
            }
            let (sx, sy) = (rng.gen_range(0..w), rng.gen_range(0..h));
            let seed = buf.get(sx, sy).unwrap();
            let before = buf.snapshot();
            let out = flood_fill(&mut buf, sx, sy, seed).unwrap();
            assert_eq!(out.filled, 0);
            assert_eq!(buf.snapshot(), before);
        }
    }

    /// Reference region: breadth-first reachability over the untouched buffer.
    fn reachable(buf: &PixelBuffer, sx: u32, sy: u32) -> Vec<bool> {
        let (w, h) = buf.dimensions();
        let target = buf.get(sx, sy).unwrap();
        let mut seen = vec![false; (w * h) as usize];
        let mut queue = std::collections::VecDeque::from([(sx, sy)]);
        seen[(sy * w + sx) as usize] = true;
        while let Some((x, y)) = queue.pop_front() {
            let mut visit = |nx: u32, ny: u32| {
                let i = (ny * w + nx) as usize;
                if !seen[i] && buf.get(nx, ny).unwrap() == target {
                    seen[i] = true;
                    queue.push_back((nx, ny));
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < h {
                visit(x, y + 1);
            }
        }
        seen
    }

    #[test]
    fn fill_changes_exactly_the_connected_region() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..40 {
            let (w, h) = (rng.gen_range(1..20), rng.gen_range(1..20));
            let mut buf = PixelBuffer::new(w, h);
            for y in 0..h {
                for x in 0..w {
                    if rng.gen_range(0..3) == 0 {
                        buf.set(x, y, BLACK).unwrap();
                    }
                }
            }
            let (sx, sy) = (rng.gen_range(0..w), rng.gen_range(0..h));
            let region = reachable(&buf, sx, sy);
            let before = buf.snapshot();

            let out = flood_fill(&mut buf, sx, sy, RED).unwrap();
            assert_eq!(out.filled, region.iter().filter(|r| **r).count());

            for y in 0..h {
                for x in 0..w {
                    let now = buf.get(x, y).unwrap();
                    if region[(y * w + x) as usize] {
                        assert_eq!(now, RED);
                    } else {
                        assert_eq!(Some(now), before.get_pixel(x, y));
                    }
                }
            }
        }
    }
}
