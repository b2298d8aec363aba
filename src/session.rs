use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::canvas::{PixelBuffer, Snapshot};
use crate::components::history::HistoryLog;
use crate::components::tools::{DrawEngine, LineStyle, PointerOutcome, ToolKind, ToolState};
use crate::error::PaintError;
use crate::io::{self, DEFAULT_JPEG_QUALITY};
use crate::ops::shapes::ShapeGeometry;
use crate::ops::text::TextRasterizer;
use crate::settings::PaintSettings;

/// What a loaded image will be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageUse {
    /// Becomes the pattern brush swatch.
    Pattern,
    /// Copied onto the canvas at the origin and committed.
    Paste,
}

/// Issued when an image load starts; handed back with the decoded result.
///
/// A ticket is only honoured while the canvas is still the one it was issued
/// for: any resize or reset in between makes the result stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    dimensions: (u32, u32),
    purpose: ImageUse,
}

impl LoadTicket {
    pub fn purpose(&self) -> ImageUse {
        self.purpose
    }
}

/// One open drawing: the live buffer plus everything that edits it.
pub struct Session {
    id: Uuid,
    buffer: PixelBuffer,
    tools: ToolState,
    engine: DrawEngine,
    history: HistoryLog,
    text: TextRasterizer,
    /// Bumped whenever the buffer is resized or replaced.
    generation: u64,
    /// Bumped on every pixel change; lets a display adapter skip re-uploads.
    revision: u64,
    /// Anchor of a text-tool click still waiting for its string.
    pending_text: Option<(f32, f32)>,
    /// Last export target.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
}

impl Session {
    /// Blank white canvas with default tools.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_settings(&PaintSettings {
            canvas_width: width,
            canvas_height: height,
            ..PaintSettings::default()
        })
    }

    pub fn from_settings(settings: &PaintSettings) -> Self {
        let buffer = PixelBuffer::with_background(
            settings.canvas_width,
            settings.canvas_height,
            settings.background,
        );
        let engine = match settings.rng_seed {
            Some(seed) => DrawEngine::with_seed(seed),
            None => DrawEngine::new(),
        };

        let mut session = Self {
            id: Uuid::new_v4(),
            buffer,
            tools: settings.tool_state(),
            engine,
            history: HistoryLog::with_capacity_limit(settings.max_undo_steps),
            text: TextRasterizer::new(settings.font_path()),
            generation: 0,
            revision: 0,
            pending_text: None,
            path: None,
            is_dirty: false,
        };

        // Entry 0: the blank canvas the first undo returns to.
        session.history.commit(session.buffer.snapshot());
        log_info!(
            "Session {}: started {}x{}",
            session.id,
            session.buffer.width(),
            session.buffer.height()
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Outline of the shape gesture in progress, for a live overlay.
    pub fn preview(&self) -> Option<ShapeGeometry> {
        self.engine.preview()
    }

    pub fn is_drawing(&self) -> bool {
        !self.engine.is_idle()
    }

    pub fn pending_text(&self) -> Option<(f32, f32)> {
        self.pending_text
    }

    pub fn set_text_rasterizer(&mut self, text: TextRasterizer) {
        self.text = text;
    }

    // ------------------------------------------------------------------
    // Tool controls
    // ------------------------------------------------------------------

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.tools.set_color(color);
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.tools.set_brush_size(size);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.tools.set_opacity(opacity);
    }

    pub fn set_line_style(&mut self, style: LineStyle) {
        self.tools.set_line_style(style);
    }

    // ------------------------------------------------------------------
    // Pointer input (buffer-local coordinates)
    // ------------------------------------------------------------------

    pub fn on_pointer_down(&mut self, x: f32, y: f32) -> Result<PointerOutcome, PaintError> {
        self.pending_text = None;
        // A missed pointer-up: keep the freehand pixels already on the canvas.
        if let Some(tool) = self.engine.active_tool()
            && tool.is_freehand()
        {
            self.engine.cancel();
            self.commit(tool.label());
        }
        let outcome = self.engine.pointer_down(&self.tools, &mut self.buffer, x, y)?;
        match outcome {
            PointerOutcome::Commit => self.commit("fill"),
            PointerOutcome::ColorPicked(color) => {
                self.tools.set_color(color);
                self.tools.set_tool(ToolKind::Pencil);
            }
            PointerOutcome::TextRequested { x, y } => self.pending_text = Some((x, y)),
            PointerOutcome::Drawing | PointerOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) -> PointerOutcome {
        let outcome = self.engine.pointer_move(&self.tools, &mut self.buffer, x, y);
        if outcome == PointerOutcome::Drawing {
            self.revision += 1;
        }
        outcome
    }

    pub fn on_pointer_up(&mut self, x: f32, y: f32) -> PointerOutcome {
        let tool = self.engine.active_tool();
        let outcome = self.engine.pointer_up(&self.tools, &mut self.buffer, x, y);
        if outcome == PointerOutcome::Commit {
            self.commit(tool.map_or("gesture", |t| t.label()));
        }
        outcome
    }

    /// Answer a pending text request. `None` means the prompt was cancelled.
    pub fn submit_text(&mut self, input: Option<&str>) -> Result<(), PaintError> {
        let Some((x, y)) = self.pending_text.take() else {
            return Err(PaintError::EmptyInput);
        };
        self.insert_text(x, y, input.unwrap_or_default())
    }

    /// Render `text` with its baseline at (x, y) and commit it.
    pub fn insert_text(&mut self, x: f32, y: f32, text: &str) -> Result<(), PaintError> {
        self.engine
            .insert_text(&self.tools, &mut self.buffer, &mut self.text, x, y, text)?;
        self.commit("text");
        Ok(())
    }

    // ------------------------------------------------------------------
    // History and canvas actions
    // ------------------------------------------------------------------

    fn commit(&mut self, what: &str) {
        self.history.commit(self.buffer.snapshot());
        self.revision += 1;
        self.is_dirty = true;
        log_info!(
            "Session {}: commit {} ({} entries)",
            self.id,
            what,
            self.history.len()
        );
    }

    /// Put `snapshot` on screen, resizing first when its size differs.
    fn show(&mut self, snapshot: &Snapshot) -> Result<(), PaintError> {
        self.engine.cancel();
        if snapshot.dimensions() != self.buffer.dimensions() {
            let (w, h) = snapshot.dimensions();
            self.buffer.resize(w, h);
            self.generation += 1;
        }
        self.buffer.restore(snapshot)?;
        self.revision += 1;
        Ok(())
    }

    pub fn undo(&mut self) -> Result<(), PaintError> {
        let snapshot = self.history.undo()?;
        self.show(&snapshot)?;
        log_info!("Session {}: undo ({} left)", self.id, self.history.undo_count());
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), PaintError> {
        let snapshot = self.history.redo()?;
        self.show(&snapshot)?;
        log_info!("Session {}: redo ({} left)", self.id, self.history.redo_count());
        Ok(())
    }

    /// Fill with the background color and record it.
    pub fn clear(&mut self) {
        self.engine.cancel();
        self.buffer.clear();
        self.commit("clear");
    }

    /// Follow the viewport size. Content is kept at the origin; no history entry.
    pub fn resize(&mut self, width: u32, height: u32) {
        let before = self.buffer.dimensions();
        self.buffer.resize(width, height);
        if self.buffer.dimensions() != before {
            self.generation += 1;
            self.revision += 1;
            log_info!(
                "Session {}: resized {}x{} -> {}x{}",
                self.id,
                before.0,
                before.1,
                self.buffer.width(),
                self.buffer.height()
            );
        }
    }

    /// Start over on a blank canvas with a fresh baseline.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.engine.cancel();
        self.pending_text = None;
        self.buffer = PixelBuffer::with_background(width, height, self.buffer.background());
        self.history.clear();
        self.history.commit(self.buffer.snapshot());
        self.generation += 1;
        self.revision += 1;
        self.is_dirty = false;
        log_info!(
            "Session {}: reset to {}x{}",
            self.id,
            self.buffer.width(),
            self.buffer.height()
        );
    }

    // ------------------------------------------------------------------
    // Image loading (pattern brush, paste)
    // ------------------------------------------------------------------

    pub fn begin_image_load(&self, purpose: ImageUse) -> LoadTicket {
        LoadTicket {
            generation: self.generation,
            dimensions: self.buffer.dimensions(),
            purpose,
        }
    }

    /// Apply a finished load. Stale tickets are rejected without touching
    /// the canvas or the tools.
    pub fn complete_image_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<RgbaImage, PaintError>,
    ) -> Result<(), PaintError> {
        if ticket.generation != self.generation || ticket.dimensions != self.buffer.dimensions() {
            log_warn!(
                "Session {}: discarded {:?} image from generation {} (now {})",
                self.id,
                ticket.purpose,
                ticket.generation,
                self.generation
            );
            return Err(PaintError::StaleImage);
        }

        let image = result.inspect_err(|e| {
            log_err!("Session {}: {:?} image failed: {}", self.id, ticket.purpose, e);
        })?;

        match ticket.purpose {
            ImageUse::Pattern => {
                log_info!(
                    "Session {}: pattern set ({}x{})",
                    self.id,
                    image.width(),
                    image.height()
                );
                self.tools.set_pattern(Some(Arc::new(image)));
            }
            ImageUse::Paste => {
                self.engine.cancel();
                self.buffer.blit(&image, 0, 0);
                self.commit("paste");
            }
        }
        Ok(())
    }

    /// Synchronous load for headless use.
    pub fn load_image_file(&mut self, purpose: ImageUse, path: &Path) -> Result<(), PaintError> {
        let ticket = self.begin_image_load(purpose);
        self.complete_image_load(ticket, io::load_image(path))
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Immutable copy of what is on the canvas now.
    pub fn snapshot(&self) -> Snapshot {
        self.buffer.snapshot()
    }

    pub fn export(&mut self, path: &Path) -> Result<(), PaintError> {
        io::export_snapshot(&self.buffer.snapshot(), path, DEFAULT_JPEG_QUALITY)?;
        self.path = Some(path.to_path_buf());
        self.is_dirty = false;
        Ok(())
    }
}
