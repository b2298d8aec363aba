use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::canvas::PixelBuffer;
use crate::components::colors::{BLACK, with_opacity};
use crate::error::PaintError;
use crate::ops::fill::flood_fill;
use crate::ops::shapes::{self, ShapeGeometry, StrokeStyle};
use crate::ops::text::{TextRasterizer, rasterize_text};

pub const MAX_BRUSH_SIZE: u32 = 200;

/// Text is rendered at this multiple of the brush size.
pub const TEXT_SIZE_FACTOR: f32 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
    Rectangle,
    Circle,
    Line,
    Text,
    Spray,
    Pattern,
    Eyedropper,
    Fill,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pencil,
            ToolKind::Eraser,
            ToolKind::Rectangle,
            ToolKind::Circle,
            ToolKind::Line,
            ToolKind::Text,
            ToolKind::Spray,
            ToolKind::Pattern,
            ToolKind::Eyedropper,
            ToolKind::Fill,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Pencil => "Pencil",
            ToolKind::Eraser => "Eraser",
            ToolKind::Rectangle => "Rectangle",
            ToolKind::Circle => "Circle",
            ToolKind::Line => "Line",
            ToolKind::Text => "Text",
            ToolKind::Spray => "Spray",
            ToolKind::Pattern => "Pattern",
            ToolKind::Eyedropper => "Eyedropper",
            ToolKind::Fill => "Fill",
        }
    }

    /// Case-insensitive lookup used by replay scripts.
    pub fn from_name(name: &str) -> Option<ToolKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pencil" | "brush" => Some(ToolKind::Pencil),
            "eraser" => Some(ToolKind::Eraser),
            "rectangle" | "rect" => Some(ToolKind::Rectangle),
            "circle" => Some(ToolKind::Circle),
            "line" => Some(ToolKind::Line),
            "text" => Some(ToolKind::Text),
            "spray" => Some(ToolKind::Spray),
            "pattern" => Some(ToolKind::Pattern),
            "eyedropper" | "picker" => Some(ToolKind::Eyedropper),
            "fill" | "bucket" => Some(ToolKind::Fill),
            _ => None,
        }
    }

    pub fn is_freehand(&self) -> bool {
        matches!(
            self,
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Spray | ToolKind::Pattern
        )
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, ToolKind::Rectangle | ToolKind::Circle | ToolKind::Line)
    }
}

/// Stroke pattern for the shape tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    pub fn all() -> &'static [LineStyle] {
        &[LineStyle::Solid, LineStyle::Dashed, LineStyle::Dotted]
    }

    pub fn label(&self) -> &'static str {
        match self {
            LineStyle::Solid => "Solid",
            LineStyle::Dashed => "Dashed",
            LineStyle::Dotted => "Dotted",
        }
    }

    pub fn from_name(name: &str) -> Option<LineStyle> {
        match name.trim().to_ascii_lowercase().as_str() {
            "solid" => Some(LineStyle::Solid),
            "dashed" => Some(LineStyle::Dashed),
            "dotted" => Some(LineStyle::Dotted),
            _ => None,
        }
    }

    /// Whether arc-length position `s` along a stroke of `width` is inked.
    /// Dashes are 3 widths on, 2 off; dots are 1 on, 1 off.
    pub fn is_on(self, s: f32, width: f32) -> bool {
        let w = width.max(1.0);
        match self {
            LineStyle::Solid => true,
            LineStyle::Dashed => s.rem_euclid(w * 5.0) < w * 3.0,
            LineStyle::Dotted => s.rem_euclid(w * 2.0) < w,
        }
    }
}

// ============================================================================
// TOOL STATE
// ============================================================================

/// Current tool configuration. Written by UI controls through the setters,
/// read by [`DrawEngine`].
#[derive(Clone, Debug)]
pub struct ToolState {
    tool: ToolKind,
    color: Rgba<u8>,
    brush_size: u32,
    opacity: f32,
    line_style: LineStyle,
    pattern: Option<Arc<RgbaImage>>,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: ToolKind::Pencil,
            color: BLACK,
            brush_size: 5,
            opacity: 1.0,
            line_style: LineStyle::Solid,
            pattern: None,
        }
    }
}

impl ToolState {
    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn line_style(&self) -> LineStyle {
        self.line_style
    }

    pub fn pattern(&self) -> Option<&Arc<RgbaImage>> {
        self.pattern.as_ref()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    /// Only RGB is kept; alpha always comes from the opacity setting.
    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = Rgba([color[0], color[1], color[2], 255]);
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(1, MAX_BRUSH_SIZE);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn set_line_style(&mut self, style: LineStyle) {
        self.line_style = style;
    }

    pub fn set_pattern(&mut self, pattern: Option<Arc<RgbaImage>>) {
        self.pattern = pattern;
    }

    /// Tool color with the opacity-derived alpha.
    pub fn paint_color(&self) -> Rgba<u8> {
        with_opacity(self.color, self.opacity)
    }

    fn stroke(&self, color: Rgba<u8>, line_style: LineStyle) -> StrokeStyle {
        StrokeStyle {
            color: with_opacity(color, self.opacity),
            width: self.brush_size as f32,
            line_style,
        }
    }
}

// ============================================================================
// DRAW ENGINE
// ============================================================================

/// What a pointer event did, for the session controller to act on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerOutcome {
    /// Nothing happened (no gesture in progress).
    Ignored,
    /// A gesture is in progress; pixels may have changed.
    Drawing,
    /// The gesture finished and its result should be recorded in history.
    Commit,
    /// The text tool needs a string from the UI; answer with
    /// `Session::submit_text`.
    TextRequested { x: f32, y: f32 },
    /// The eyedropper sampled this opaque color.
    ColorPicked(Rgba<u8>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Freehand { tool: ToolKind, last: (f32, f32) },
    Anchored { tool: ToolKind, anchor: (f32, f32), current: (f32, f32) },
}

/// Per-gesture state machine turning pointer events into buffer mutations.
///
/// The tool is captured at pointer-down, so switching tools mid-drag does
/// not change what the running gesture does.
pub struct DrawEngine {
    gesture: Gesture,
    rng: StdRng,
}

impl Default for DrawEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawEngine {
    pub fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic spray jitter.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            gesture: Gesture::Idle,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Tool of the gesture in progress.
    pub fn active_tool(&self) -> Option<ToolKind> {
        match self.gesture {
            Gesture::Idle => None,
            Gesture::Freehand { tool, .. } | Gesture::Anchored { tool, .. } => Some(tool),
        }
    }

    /// Drop any gesture in progress without committing it.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Shape that would be committed if the pointer were released now.
    pub fn preview(&self) -> Option<ShapeGeometry> {
        match self.gesture {
            Gesture::Anchored { tool, anchor, current } => shape_for(tool, anchor, current),
            _ => None,
        }
    }

    /// A pointer-down while a gesture is active abandons the earlier gesture.
    /// Freehand pixels already drawn stay in the buffer; the caller records
    /// them before calling this (see [`DrawEngine::active_tool`]).
    pub fn pointer_down(
        &mut self,
        tools: &ToolState,
        buffer: &mut PixelBuffer,
        x: f32,
        y: f32,
    ) -> Result<PointerOutcome, PaintError> {
        self.gesture = Gesture::Idle;
        let tool = tools.tool();

        match tool {
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Spray | ToolKind::Pattern => {
                self.gesture = Gesture::Freehand { tool, last: (x, y) };
                Ok(PointerOutcome::Drawing)
            }
            ToolKind::Rectangle | ToolKind::Circle | ToolKind::Line => {
                self.gesture = Gesture::Anchored {
                    tool,
                    anchor: (x, y),
                    current: (x, y),
                };
                Ok(PointerOutcome::Drawing)
            }
            ToolKind::Text => Ok(PointerOutcome::TextRequested { x, y }),
            ToolKind::Fill => {
                let (px, py) = buffer.pixel_at(x, y)?;
                let outcome = flood_fill(buffer, px, py, tools.paint_color())?;
                if outcome.filled == 0 {
                    return Ok(PointerOutcome::Ignored);
                }
                Ok(PointerOutcome::Commit)
            }
            ToolKind::Eyedropper => {
                let (px, py) = buffer.pixel_at(x, y)?;
                let c = buffer.get(px, py)?;
                Ok(PointerOutcome::ColorPicked(Rgba([c[0], c[1], c[2], 255])))
            }
        }
    }

    pub fn pointer_move(
        &mut self,
        tools: &ToolState,
        buffer: &mut PixelBuffer,
        x: f32,
        y: f32,
    ) -> PointerOutcome {
        match &mut self.gesture {
            Gesture::Idle => PointerOutcome::Ignored,
            Gesture::Freehand { tool, last } => {
                match tool {
                    ToolKind::Pencil => {
                        let style = tools.stroke(tools.color(), LineStyle::Solid);
                        shapes::stroke_segment(buffer, *last, (x, y), style);
                    }
                    ToolKind::Eraser => {
                        let style = tools.stroke(buffer.background(), LineStyle::Solid);
                        shapes::stroke_segment(buffer, *last, (x, y), style);
                    }
                    ToolKind::Spray => {
                        shapes::spray(buffer, (x, y), tools.brush_size(), tools.paint_color(), &mut self.rng);
                    }
                    ToolKind::Pattern => {
                        if let Some(pattern) = tools.pattern() {
                            shapes::stamp_pattern(buffer, (x, y), tools.brush_size(), pattern, tools.opacity());
                        }
                    }
                    _ => {}
                }
                *last = (x, y);
                PointerOutcome::Drawing
            }
            Gesture::Anchored { current, .. } => {
                *current = (x, y);
                PointerOutcome::Drawing
            }
        }
    }

    pub fn pointer_up(
        &mut self,
        tools: &ToolState,
        buffer: &mut PixelBuffer,
        x: f32,
        y: f32,
    ) -> PointerOutcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => PointerOutcome::Ignored,
            Gesture::Freehand { .. } => PointerOutcome::Commit,
            Gesture::Anchored { tool, anchor, .. } => {
                if let Some(shape) = shape_for(tool, anchor, (x, y)) {
                    let style = tools.stroke(tools.color(), tools.line_style());
                    shapes::draw_shape(buffer, shape, style);
                }
                PointerOutcome::Commit
            }
        }
    }

    /// Render the text tool's answer with its baseline at (x, y).
    pub fn insert_text(
        &mut self,
        tools: &ToolState,
        buffer: &mut PixelBuffer,
        text: &mut TextRasterizer,
        x: f32,
        y: f32,
        input: &str,
    ) -> Result<PointerOutcome, PaintError> {
        if input.trim().is_empty() {
            return Err(PaintError::EmptyInput);
        }
        let font = text.font().ok_or(PaintError::FontUnavailable)?;
        let size = tools.brush_size() as f32 * TEXT_SIZE_FACTOR;
        rasterize_text(buffer, font, input, size, x, y, tools.paint_color());
        Ok(PointerOutcome::Commit)
    }
}

fn shape_for(tool: ToolKind, anchor: (f32, f32), end: (f32, f32)) -> Option<ShapeGeometry> {
    match tool {
        ToolKind::Rectangle => Some(ShapeGeometry::Rectangle { from: anchor, to: end }),
        ToolKind::Circle => Some(ShapeGeometry::circle(anchor, end)),
        ToolKind::Line => Some(ShapeGeometry::Line { from: anchor, to: end }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::WHITE;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn setup(tool: ToolKind) -> (DrawEngine, ToolState, PixelBuffer) {
        let mut tools = ToolState::default();
        tools.set_tool(tool);
        tools.set_color(RED);
        tools.set_brush_size(1);
        (DrawEngine::with_seed(3), tools, PixelBuffer::new(20, 20))
    }

    fn painted(buf: &PixelBuffer) -> usize {
        buf.image().pixels().filter(|p| **p != WHITE).count()
    }

    #[test]
    fn setters_clamp() {
        let mut tools = ToolState::default();
        tools.set_brush_size(0);
        assert_eq!(tools.brush_size(), 1);
        tools.set_brush_size(10_000);
        assert_eq!(tools.brush_size(), MAX_BRUSH_SIZE);
        tools.set_opacity(1.5);
        assert_eq!(tools.opacity(), 1.0);
        tools.set_opacity(f32::NAN);
        assert_eq!(tools.opacity(), 1.0);
        tools.set_color(Rgba([1, 2, 3, 4]));
        assert_eq!(tools.color(), Rgba([1, 2, 3, 255]));
        tools.set_opacity(0.5);
        assert_eq!(tools.paint_color(), Rgba([1, 2, 3, 127]));
    }

    #[test]
    fn tool_names_round_trip_through_labels() {
        for tool in ToolKind::all() {
            assert_eq!(ToolKind::from_name(tool.label()), Some(*tool));
        }
        assert_eq!(ToolKind::from_name("rect"), Some(ToolKind::Rectangle));
        assert_eq!(ToolKind::from_name("gradient"), None);
    }

    #[test]
    fn pencil_draws_between_sparse_moves() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Pencil);
        assert_eq!(engine.pointer_down(&tools, &mut buf, 2.0, 5.0).unwrap(), PointerOutcome::Drawing);
        assert_eq!(painted(&buf), 0);
        engine.pointer_move(&tools, &mut buf, 12.0, 5.0);
        for x in 2..=12 {
            assert_eq!(buf.get(x, 5).unwrap(), RED);
        }
        assert_eq!(engine.pointer_up(&tools, &mut buf, 12.0, 5.0), PointerOutcome::Commit);
        assert!(engine.is_idle());
    }

    #[test]
    fn events_without_a_gesture_are_ignored() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Pencil);
        assert_eq!(engine.pointer_move(&tools, &mut buf, 3.0, 3.0), PointerOutcome::Ignored);
        assert_eq!(engine.pointer_up(&tools, &mut buf, 3.0, 3.0), PointerOutcome::Ignored);
        assert_eq!(painted(&buf), 0);
    }

    #[test]
    fn eraser_paints_background() {
        let (mut engine, mut tools, mut buf) = setup(ToolKind::Eraser);
        buf.fill(RED);
        tools.set_brush_size(3);
        engine.pointer_down(&tools, &mut buf, 5.0, 5.0).unwrap();
        engine.pointer_move(&tools, &mut buf, 10.0, 5.0);
        assert_eq!(buf.get(7, 5).unwrap(), WHITE);
        assert_eq!(buf.get(7, 10).unwrap(), RED);
    }

    #[test]
    fn shape_is_drawn_only_on_release() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Line);
        engine.pointer_down(&tools, &mut buf, 1.0, 1.0).unwrap();
        engine.pointer_move(&tools, &mut buf, 8.0, 1.0);
        assert_eq!(painted(&buf), 0);
        assert_eq!(
            engine.preview(),
            Some(ShapeGeometry::Line { from: (1.0, 1.0), to: (8.0, 1.0) })
        );
        assert_eq!(engine.pointer_up(&tools, &mut buf, 10.0, 1.0), PointerOutcome::Commit);
        assert_eq!(buf.get(10, 1).unwrap(), RED);
        assert_eq!(engine.preview(), None);
    }

    #[test]
    fn tool_switch_mid_gesture_keeps_captured_tool() {
        let (mut engine, mut tools, mut buf) = setup(ToolKind::Rectangle);
        engine.pointer_down(&tools, &mut buf, 2.0, 2.0).unwrap();
        tools.set_tool(ToolKind::Fill);
        assert_eq!(engine.active_tool(), Some(ToolKind::Rectangle));
        assert_eq!(engine.pointer_up(&tools, &mut buf, 8.0, 8.0), PointerOutcome::Commit);
        assert_eq!(buf.get(5, 5).unwrap(), WHITE);
        assert_eq!(buf.get(2, 5).unwrap(), RED);
    }

    #[test]
    fn fill_commits_and_noop_fill_does_not() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Fill);
        assert_eq!(engine.pointer_down(&tools, &mut buf, 4.0, 4.0).unwrap(), PointerOutcome::Commit);
        assert_eq!(painted(&buf), 400);
        assert_eq!(engine.pointer_down(&tools, &mut buf, 4.0, 4.0).unwrap(), PointerOutcome::Ignored);
        assert!(engine.is_idle());
    }

    #[test]
    fn fill_outside_canvas_is_out_of_bounds() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Fill);
        let err = engine.pointer_down(&tools, &mut buf, -1.0, 4.0).unwrap_err();
        assert!(matches!(err, PaintError::OutOfBounds { .. }));
        assert_eq!(painted(&buf), 0);
    }

    #[test]
    fn eyedropper_reports_opaque_sample() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Eyedropper);
        buf.set(3, 4, Rgba([10, 20, 30, 40])).unwrap();
        assert_eq!(
            engine.pointer_down(&tools, &mut buf, 3.5, 4.2).unwrap(),
            PointerOutcome::ColorPicked(Rgba([10, 20, 30, 255]))
        );
        assert!(engine.is_idle());
    }

    #[test]
    fn pattern_without_image_is_noop() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Pattern);
        engine.pointer_down(&tools, &mut buf, 5.0, 5.0).unwrap();
        assert_eq!(engine.pointer_move(&tools, &mut buf, 6.0, 6.0), PointerOutcome::Drawing);
        assert_eq!(painted(&buf), 0);
        assert_eq!(engine.pointer_up(&tools, &mut buf, 6.0, 6.0), PointerOutcome::Commit);
    }

    #[test]
    fn pattern_with_image_stamps() {
        let (mut engine, mut tools, mut buf) = setup(ToolKind::Pattern);
        tools.set_brush_size(4);
        tools.set_pattern(Some(Arc::new(RgbaImage::from_pixel(3, 3, RED))));
        engine.pointer_down(&tools, &mut buf, 5.0, 5.0).unwrap();
        engine.pointer_move(&tools, &mut buf, 5.0, 5.0);
        assert_eq!(painted(&buf), 16);
    }

    #[test]
    fn spray_is_reproducible_with_a_seed() {
        let run = || {
            let (mut engine, mut tools, mut buf) = setup(ToolKind::Spray);
            tools.set_brush_size(12);
            engine.pointer_down(&tools, &mut buf, 10.0, 10.0).unwrap();
            engine.pointer_move(&tools, &mut buf, 10.0, 10.0);
            engine.pointer_up(&tools, &mut buf, 10.0, 10.0);
            buf.snapshot()
        };
        let first = run();
        assert_eq!(first, run());
        assert!(first.as_raw().chunks_exact(4).any(|p| p == RED.0));
    }

    #[test]
    fn blank_text_is_empty_input() {
        let (mut engine, tools, mut buf) = setup(ToolKind::Text);
        assert_eq!(
            engine.pointer_down(&tools, &mut buf, 2.0, 9.0).unwrap(),
            PointerOutcome::TextRequested { x: 2.0, y: 9.0 }
        );
        let mut text = TextRasterizer::new(None);
        let err = engine
            .insert_text(&tools, &mut buf, &mut text, 2.0, 9.0, "   ")
            .unwrap_err();
        assert!(matches!(err, PaintError::EmptyInput));
        assert_eq!(painted(&buf), 0);
    }

    #[test]
    fn dash_pattern_phases() {
        assert!(LineStyle::Dashed.is_on(0.0, 2.0));
        assert!(!LineStyle::Dashed.is_on(7.0, 2.0));
        assert!(LineStyle::Dotted.is_on(0.5, 1.0));
        assert!(!LineStyle::Dotted.is_on(1.5, 1.0));
        assert!(LineStyle::Solid.is_on(123.0, 1.0));
    }
}
