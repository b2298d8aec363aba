use image::{Rgba, RgbaImage};
use rand::Rng;

use crate::canvas::PixelBuffer;
use crate::components::colors::opacity_to_alpha;
use crate::components::tools::LineStyle;

/// Dabs scattered per spray move event.
pub const SPRAY_DABS: usize = 30;

/// Outline shapes the shape tools can commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeGeometry {
    Rectangle { from: (f32, f32), to: (f32, f32) },
    Circle { center: (f32, f32), radius: f32 },
    Line { from: (f32, f32), to: (f32, f32) },
}

impl ShapeGeometry {
    /// Circle radius is the Euclidean distance from anchor to release.
    pub fn circle(anchor: (f32, f32), release: (f32, f32)) -> Self {
        let dx = release.0 - anchor.0;
        let dy = release.1 - anchor.1;
        ShapeGeometry::Circle {
            center: anchor,
            radius: (dx * dx + dy * dy).sqrt(),
        }
    }
}

/// How a stroke is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Color with its final (opacity-derived) alpha.
    pub color: Rgba<u8>,
    /// Full stroke width in pixels.
    pub width: f32,
    pub line_style: LineStyle,
}

// ============================================================================
// SDF functions: signed distance, negative inside
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Distance to segment a→b plus the arc-length position of the closest point.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> (f32, f32) {
    let (abx, aby) = (bx - ax, by - ay);
    let len2 = abx * abx + aby * aby;
    let t = if len2 > 0.0 {
        (((px - ax) * abx + (py - ay) * aby) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + abx * t - px;
    let cy = ay + aby * t - py;
    ((cx * cx + cy * cy).sqrt(), t * len2.sqrt())
}

/// Visit every pixel whose sample point lies in the padded bounding box,
/// clipped to the buffer. Pixels are sampled at their integer coordinates so
/// a pointer at (x, y) lands exactly on pixel (x, y).
fn for_each_in_bounds(
    buffer: &PixelBuffer,
    min: (f32, f32),
    max: (f32, f32),
    mut f: impl FnMut(i64, i64),
) {
    let (w, h) = buffer.dimensions();
    let x0 = (min.0.floor() as i64).max(0);
    let y0 = (min.1.floor() as i64).max(0);
    let x1 = (max.0.ceil() as i64).min(w as i64 - 1);
    let y1 = (max.1.ceil() as i64).min(h as i64 - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            f(x, y);
        }
    }
}

fn finite(p: (f32, f32)) -> bool {
    p.0.is_finite() && p.1.is_finite()
}

/// Round-capped segment, the stroke primitive behind pencil, eraser and the
/// line tool. A zero-length segment paints a dot of the brush width.
pub fn stroke_segment(buffer: &mut PixelBuffer, from: (f32, f32), to: (f32, f32), style: StrokeStyle) {
    if !finite(from) || !finite(to) {
        return;
    }
    let hw = (style.width * 0.5).max(0.5);
    let min = (from.0.min(to.0) - hw, from.1.min(to.1) - hw);
    let max = (from.0.max(to.0) + hw, from.1.max(to.1) + hw);

    let mut hits = Vec::new();
    for_each_in_bounds(buffer, min, max, |x, y| {
        let (d, s) = sdf_line_segment(x as f32, y as f32, from.0, from.1, to.0, to.1);
        if d <= hw && style.line_style.is_on(s, style.width) {
            hits.push((x, y));
        }
    });
    for (x, y) in hits {
        buffer.blend_pixel(x, y, style.color);
    }
}

/// Axis-aligned rectangle outline between two corners, stroke centred on the
/// edges. A zero-area drag paints nothing.
pub fn stroke_rect(buffer: &mut PixelBuffer, from: (f32, f32), to: (f32, f32), style: StrokeStyle) {
    if !finite(from) || !finite(to) || (from.0 == to.0 && from.1 == to.1) {
        return;
    }
    let hw = (style.width * 0.5).max(0.5);
    let (min_x, max_x) = (from.0.min(to.0), from.0.max(to.0));
    let (min_y, max_y) = (from.1.min(to.1), from.1.max(to.1));
    let (cx, cy) = ((min_x + max_x) * 0.5, (min_y + max_y) * 0.5);
    let (hx, hy) = ((max_x - min_x) * 0.5, (max_y - min_y) * 0.5);
    let (rw, rh) = (max_x - min_x, max_y - min_y);

    let mut hits = Vec::new();
    for_each_in_bounds(buffer, (min_x - hw, min_y - hw), (max_x + hw, max_y + hw), |x, y| {
        let (px, py) = (x as f32, y as f32);
        if sdf_box(px - cx, py - cy, hx, hy).abs() > hw {
            return;
        }
        // Perimeter position, clockwise from the top-left corner.
        let edges = [
            ((py - min_y).abs(), px - min_x),
            ((px - max_x).abs(), rw + (py - min_y)),
            ((py - max_y).abs(), rw + rh + (max_x - px)),
            ((px - min_x).abs(), 2.0 * rw + rh + (max_y - py)),
        ];
        let s = edges
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map_or(0.0, |e| e.1);
        if style.line_style.is_on(s, style.width) {
            hits.push((x, y));
        }
    });
    for (x, y) in hits {
        buffer.blend_pixel(x, y, style.color);
    }
}

/// Circle outline (never filled). A zero radius paints nothing.
pub fn stroke_circle(buffer: &mut PixelBuffer, center: (f32, f32), radius: f32, style: StrokeStyle) {
    if !finite(center) || !radius.is_finite() || radius <= 0.0 {
        return;
    }
    let hw = (style.width * 0.5).max(0.5);
    let reach = radius + hw;

    let mut hits = Vec::new();
    for_each_in_bounds(
        buffer,
        (center.0 - reach, center.1 - reach),
        (center.0 + reach, center.1 + reach),
        |x, y| {
            let (dx, dy) = (x as f32 - center.0, y as f32 - center.1);
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius).abs() > hw {
                return;
            }
            let angle = dy.atan2(dx).rem_euclid(std::f32::consts::TAU);
            if style.line_style.is_on(angle * radius, style.width) {
                hits.push((x, y));
            }
        },
    );
    for (x, y) in hits {
        buffer.blend_pixel(x, y, style.color);
    }
}

/// Draw a committed shape.
pub fn draw_shape(buffer: &mut PixelBuffer, shape: ShapeGeometry, style: StrokeStyle) {
    match shape {
        ShapeGeometry::Rectangle { from, to } => stroke_rect(buffer, from, to, style),
        ShapeGeometry::Circle { center, radius } => stroke_circle(buffer, center, radius, style),
        ShapeGeometry::Line { from, to } => stroke_segment(buffer, from, to, style),
    }
}

/// Scatter [`SPRAY_DABS`] single-pixel dabs uniformly within a `size`×`size`
/// square centred on `center`.
pub fn spray<R: Rng>(buffer: &mut PixelBuffer, center: (f32, f32), size: u32, color: Rgba<u8>, rng: &mut R) {
    if !finite(center) {
        return;
    }
    let size = size.max(1) as f32;
    let half = size * 0.5;
    for _ in 0..SPRAY_DABS {
        let ox = rng.gen_range(0.0..size) - half;
        let oy = rng.gen_range(0.0..size) - half;
        let x = (center.0 + ox).floor() as i64;
        let y = (center.1 + oy).floor() as i64;
        buffer.blend_pixel(x, y, color);
    }
}

/// Stamp a `size`×`size` swatch of `pattern`, tiled from the canvas origin,
/// centred on `center`. Pattern alpha is scaled by `opacity`.
pub fn stamp_pattern(buffer: &mut PixelBuffer, center: (f32, f32), size: u32, pattern: &RgbaImage, opacity: f32) {
    let (pw, ph) = pattern.dimensions();
    if pw == 0 || ph == 0 || !finite(center) {
        return;
    }
    let size = size.max(1) as i64;
    let x0 = center.0.floor() as i64 - size / 2;
    let y0 = center.1.floor() as i64 - size / 2;
    let scale = opacity_to_alpha(opacity) as u32;

    for y in y0..y0 + size {
        for x in x0..x0 + size {
            if !buffer.contains(x, y) {
                continue;
            }
            let src = pattern.get_pixel(
                x.rem_euclid(pw as i64) as u32,
                y.rem_euclid(ph as i64) as u32,
            );
            let a = (src[3] as u32 * scale / 255) as u8;
            buffer.blend_pixel(x, y, Rgba([src[0], src[1], src[2], a]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::WHITE;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn solid(width: f32) -> StrokeStyle {
        StrokeStyle {
            color: RED,
            width,
            line_style: LineStyle::Solid,
        }
    }

    fn painted(buf: &PixelBuffer) -> usize {
        buf.image().pixels().filter(|p| **p != WHITE).count()
    }

    #[test]
    fn thin_horizontal_segment_covers_its_pixels() {
        let mut buf = PixelBuffer::new(10, 5);
        stroke_segment(&mut buf, (1.0, 2.0), (8.0, 2.0), solid(1.0));
        for x in 1..=8 {
            assert_eq!(buf.get(x, 2).unwrap(), RED);
        }
        assert_eq!(buf.get(0, 2).unwrap(), WHITE);
        assert_eq!(buf.get(4, 1).unwrap(), WHITE);
        assert_eq!(painted(&buf), 8);
    }

    #[test]
    fn zero_length_segment_is_a_round_dot() {
        let mut buf = PixelBuffer::new(9, 9);
        stroke_segment(&mut buf, (4.0, 4.0), (4.0, 4.0), solid(5.0));
        assert_eq!(buf.get(4, 4).unwrap(), RED);
        assert_eq!(buf.get(6, 4).unwrap(), RED);
        // Corners of the 5×5 box fall outside the 2.5 radius.
        assert_eq!(buf.get(2, 2).unwrap(), WHITE);
    }

    #[test]
    fn rect_outline_leaves_interior() {
        let mut buf = PixelBuffer::new(12, 12);
        stroke_rect(&mut buf, (2.0, 2.0), (9.0, 8.0), solid(1.0));
        assert_eq!(buf.get(2, 2).unwrap(), RED);
        assert_eq!(buf.get(9, 8).unwrap(), RED);
        assert_eq!(buf.get(5, 2).unwrap(), RED);
        assert_eq!(buf.get(2, 5).unwrap(), RED);
        assert_eq!(buf.get(5, 5).unwrap(), WHITE);
        assert_eq!(buf.get(10, 5).unwrap(), WHITE);
    }

    #[test]
    fn rect_from_reversed_corners_matches() {
        let mut a = PixelBuffer::new(12, 12);
        let mut b = PixelBuffer::new(12, 12);
        stroke_rect(&mut a, (2.0, 2.0), (9.0, 8.0), solid(3.0));
        stroke_rect(&mut b, (9.0, 8.0), (2.0, 2.0), solid(3.0));
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn circle_is_an_outline() {
        let mut buf = PixelBuffer::new(21, 21);
        let shape = ShapeGeometry::circle((10.0, 10.0), (16.0, 18.0));
        assert_eq!(shape, ShapeGeometry::Circle { center: (10.0, 10.0), radius: 10.0 });
        draw_shape(&mut buf, shape, solid(1.0));
        assert_eq!(buf.get(20, 10).unwrap(), RED);
        assert_eq!(buf.get(10, 0).unwrap(), RED);
        assert_eq!(buf.get(10, 10).unwrap(), WHITE);
        assert_eq!(buf.get(14, 10).unwrap(), WHITE);
    }

    #[test]
    fn degenerate_shapes_paint_nothing() {
        let mut buf = PixelBuffer::new(8, 8);
        stroke_rect(&mut buf, (3.0, 3.0), (3.0, 3.0), solid(4.0));
        stroke_circle(&mut buf, (3.0, 3.0), 0.0, solid(4.0));
        assert_eq!(painted(&buf), 0);
    }

    #[test]
    fn dashed_line_has_gaps() {
        let mut solid_buf = PixelBuffer::new(40, 3);
        let mut dashed_buf = PixelBuffer::new(40, 3);
        stroke_segment(&mut solid_buf, (0.0, 1.0), (39.0, 1.0), solid(1.0));
        let dashed = StrokeStyle { line_style: LineStyle::Dashed, ..solid(1.0) };
        stroke_segment(&mut dashed_buf, (0.0, 1.0), (39.0, 1.0), dashed);
        let (s, d) = (painted(&solid_buf), painted(&dashed_buf));
        assert!(d > 0 && d < s, "dashed {} vs solid {}", d, s);
    }

    #[test]
    fn spray_stays_inside_its_square() {
        let mut buf = PixelBuffer::new(50, 50);
        let mut rng = StdRng::seed_from_u64(1);
        spray(&mut buf, (25.0, 25.0), 10, RED, &mut rng);
        let n = painted(&buf);
        assert!(n > 0 && n <= SPRAY_DABS);
        for (x, y, p) in buf.image().enumerate_pixels() {
            if *p != WHITE {
                assert!((20..30).contains(&x) && (20..30).contains(&y), "dab at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn pattern_tiles_from_canvas_origin() {
        let mut pattern = RgbaImage::from_pixel(2, 1, RED);
        pattern.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let mut buf = PixelBuffer::new(10, 10);
        stamp_pattern(&mut buf, (5.0, 5.0), 4, &pattern, 1.0);
        assert_eq!(buf.get(4, 4).unwrap(), RED);
        assert_eq!(buf.get(5, 4).unwrap(), Rgba([0, 0, 255, 255]));
        assert_eq!(buf.get(2, 5).unwrap(), WHITE);
        assert_eq!(painted(&buf), 16);
    }
}
