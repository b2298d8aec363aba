use image::Rgba;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Map an opacity scalar to an 8-bit alpha: `floor(opacity × 255)`.
pub fn opacity_to_alpha(opacity: f32) -> u8 {
    if opacity.is_nan() {
        return 255;
    }
    (opacity.clamp(0.0, 1.0) * 255.0).floor() as u8
}

/// The tool color with its alpha replaced by the opacity-derived one.
pub fn with_opacity(color: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], opacity_to_alpha(opacity)])
}

/// Source-over compositing of `top` onto `base` (straight alpha).
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let base_a = base[3] as f32 / 255.0;
    let top_a = top[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |i: usize| {
        let b = base[i] as f32 / 255.0;
        let t = top[i] as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Parse a CSS-style sRGB color: `#RGB`, `#RRGGBB`, `#RRGGBBAA`,
/// `rgb(r, g, b)` or `rgba(r, g, b, a)` where `a` is either 0–1 or 0–255.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = s.to_ascii_lowercase();
    let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest.strip_suffix(')')?, true)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest.strip_suffix(')')?, false)
    } else {
        return parse_hex(s);
    };

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    match (parts.as_slice(), has_alpha) {
        ([r, g, b], false) => Some(Rgba([r.parse().ok()?, g.parse().ok()?, b.parse().ok()?, 255])),
        ([r, g, b, a], true) => {
            let a: f32 = a.parse().ok()?;
            let a = if a <= 1.0 { opacity_to_alpha(a) } else { a.clamp(0.0, 255.0) as u8 };
            Some(Rgba([r.parse().ok()?, g.parse().ok()?, b.parse().ok()?, a]))
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Rgba([nib(0)?, nib(1)?, nib(2)?, 255]))
        }
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Uppercase `#RRGGBB` (alpha dropped), as shown by the eyedropper readout.
pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}
