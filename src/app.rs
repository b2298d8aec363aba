use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions};
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use std::sync::mpsc;

use crate::canvas::Snapshot;
use crate::components::colors::to_hex;
use crate::components::tools::{LineStyle, MAX_BRUSH_SIZE, PointerOutcome, ToolKind};
use crate::error::PaintError;
use crate::io::{self, DEFAULT_JPEG_QUALITY, SaveFormat};
use crate::ops::shapes::ShapeGeometry;
use crate::session::{ImageUse, LoadTicket, Session};
use crate::settings::PaintSettings;

// ============================================================================
// ASYNC IO PIPELINE: background decode / encode with channel completion
// ============================================================================

/// Result delivered from a background IO worker.
pub enum IoResult {
    /// An image was decoded for the pattern brush or a paste.
    ImageLoaded {
        ticket: LoadTicket,
        result: Result<RgbaImage, PaintError>,
        path: PathBuf,
    },
    SaveComplete { path: PathBuf },
    SaveFailed { path: PathBuf, error: String },
}

pub struct PaintPadApp {
    session: Session,
    settings: PaintSettings,

    canvas_texture: Option<TextureHandle>,
    /// Session revision the texture was last uploaded from.
    uploaded_revision: Option<u64>,
    /// Central panel size the canvas was last fitted to.
    panel_size: Option<(u32, u32)>,
    /// A press started on the canvas and has not been released yet.
    pointer_captured: bool,

    text_input: String,
    status: String,

    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
    pending_io_ops: usize,
}

impl PaintPadApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: PaintSettings) -> Self {
        let (io_sender, io_receiver) = mpsc::channel();
        let session = Session::from_settings(&settings);
        Self {
            session,
            settings,
            canvas_texture: None,
            uploaded_revision: None,
            panel_size: None,
            pointer_captured: false,
            text_input: String::new(),
            status: String::new(),
            io_sender,
            io_receiver,
            pending_io_ops: 0,
        }
    }

    fn report(&mut self, err: &PaintError) {
        // Boundary conditions are shown as disabled buttons, not messages.
        if matches!(err, PaintError::NothingToUndo | PaintError::NothingToRedo) {
            return;
        }
        log_warn!("UI: {}", err);
        self.status = err.to_string();
    }

    // ------------------------------------------------------------------
    // Background IO
    // ------------------------------------------------------------------

    fn spawn_image_load(&mut self, ctx: &egui::Context, purpose: ImageUse) {
        let Some(path) = io::pick_image_file() else { return };
        let ticket = self.session.begin_image_load(purpose);
        let sender = self.io_sender.clone();
        let ctx = ctx.clone();
        self.pending_io_ops += 1;
        self.status = format!("Loading {}…", path.display());
        rayon::spawn(move || {
            let result = io::load_image(&path);
            let _ = sender.send(IoResult::ImageLoaded { ticket, result, path });
            ctx.request_repaint();
        });
    }

    fn spawn_save(&mut self, ctx: &egui::Context) {
        let default_name = format!("paintpad.{}", SaveFormat::default().extension());
        let Some(path) = io::pick_save_file(&default_name) else { return };
        let snapshot: Snapshot = self.session.snapshot();
        let sender = self.io_sender.clone();
        let ctx = ctx.clone();
        self.pending_io_ops += 1;
        rayon::spawn(move || {
            let msg = match io::export_snapshot(&snapshot, &path, DEFAULT_JPEG_QUALITY) {
                Ok(()) => IoResult::SaveComplete { path },
                Err(e) => IoResult::SaveFailed {
                    path,
                    error: e.to_string(),
                },
            };
            let _ = sender.send(msg);
            ctx.request_repaint();
        });
    }

    fn poll_io(&mut self) {
        while let Ok(result) = self.io_receiver.try_recv() {
            self.pending_io_ops = self.pending_io_ops.saturating_sub(1);
            match result {
                IoResult::ImageLoaded { ticket, result, path } => {
                    match self.session.complete_image_load(ticket, result) {
                        Ok(()) => {
                            self.status = match ticket.purpose() {
                                ImageUse::Pattern => format!("Pattern: {}", path.display()),
                                ImageUse::Paste => format!("Pasted {}", path.display()),
                            };
                        }
                        Err(e) => self.report(&e),
                    }
                }
                IoResult::SaveComplete { path } => {
                    self.session.path = Some(path.clone());
                    self.session.is_dirty = false;
                    self.status = format!("Saved {}", path.display());
                }
                IoResult::SaveFailed { path, error } => {
                    log_err!("UI: save to {} failed: {}", path.display(), error);
                    self.status = format!("Save failed: {}", error);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal_wrapped(|ui| {
            let current = self.session.tools().tool();
            for tool in ToolKind::all() {
                if ui.selectable_label(current == *tool, tool.label()).clicked() {
                    self.session.set_tool(*tool);
                }
            }
        });

        ui.horizontal(|ui| {
            let tools = self.session.tools().clone();

            let c = tools.color();
            let mut rgb = [c[0], c[1], c[2]];
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                self.session.set_color(Rgba([rgb[0], rgb[1], rgb[2], 255]));
            }

            let mut size = tools.brush_size();
            if ui
                .add(egui::Slider::new(&mut size, 1..=MAX_BRUSH_SIZE).text("Size"))
                .changed()
            {
                self.session.set_brush_size(size);
            }

            let mut opacity = tools.opacity();
            if ui
                .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
                .changed()
            {
                self.session.set_opacity(opacity);
            }

            let mut style = tools.line_style();
            egui::ComboBox::from_id_source("line_style")
                .selected_text(style.label())
                .show_ui(ui, |ui| {
                    for s in LineStyle::all() {
                        ui.selectable_value(&mut style, *s, s.label());
                    }
                });
            if style != tools.line_style() {
                self.session.set_line_style(style);
            }

            ui.separator();

            let history = self.session.history();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                if let Err(e) = self.session.undo() {
                    self.report(&e);
                }
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                if let Err(e) = self.session.redo() {
                    self.report(&e);
                }
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
            }
            if ui.button("Pattern…").clicked() {
                self.spawn_image_load(ctx, ImageUse::Pattern);
            }
            if ui.button("Paste…").clicked() {
                self.spawn_image_load(ctx, ImageUse::Paste);
            }
            if ui.button("Save…").clicked() {
                self.spawn_save(ctx);
            }
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let buf = self.session.buffer();
            ui.label(format!("{}×{}", buf.width(), buf.height()));
            ui.separator();
            ui.label(format!(
                "{} · {}",
                self.session.tools().tool().label(),
                to_hex(self.session.tools().color())
            ));
            ui.separator();
            ui.label(format!(
                "history {}/{}",
                self.session.history().undo_count() + 1,
                self.session.history().len()
            ));
            if self.pending_io_ops > 0 {
                ui.separator();
                ui.spinner();
            }
            if !self.status.is_empty() {
                ui.separator();
                ui.label(&self.status);
            }
        });
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if self.session.pending_text().is_some() {
            return;
        }
        let (undo, redo) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let undo = cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z);
            let redo = cmd
                && (i.key_pressed(egui::Key::Y) || (i.modifiers.shift && i.key_pressed(egui::Key::Z)));
            (undo, redo)
        });
        let result = if undo {
            self.session.undo()
        } else if redo {
            self.session.redo()
        } else {
            Ok(())
        };
        if let Err(e) = result {
            self.report(&e);
        }
    }

    fn text_prompt(&mut self, ctx: &egui::Context) {
        if self.session.pending_text().is_none() {
            return;
        }
        let mut answer: Option<Option<String>> = None;
        egui::Window::new("Text")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let edit = ui.text_edit_singleline(&mut self.text_input);
                edit.request_focus();
                ui.horizontal(|ui| {
                    let enter = ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("OK").clicked() || enter {
                        answer = Some(Some(self.text_input.clone()));
                    }
                    if ui.button("Cancel").clicked() || ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                        answer = Some(None);
                    }
                });
            });

        if let Some(input) = answer {
            self.text_input.clear();
            if let Err(e) = self.session.submit_text(input.as_deref()) {
                if !matches!(e, PaintError::EmptyInput) {
                    self.report(&e);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Canvas
    // ------------------------------------------------------------------

    fn fit_canvas(&mut self, available: egui::Vec2) {
        let size = (available.x.max(1.0) as u32, available.y.max(1.0) as u32);
        if self.panel_size != Some(size) && !self.session.is_drawing() {
            // The first frame keeps the configured canvas size.
            if self.panel_size.is_some() {
                self.session.resize(size.0, size.1);
            }
            self.panel_size = Some(size);
        }
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        if self.uploaded_revision == Some(self.session.revision()) && self.canvas_texture.is_some() {
            return;
        }
        let buf = self.session.buffer();
        let image = ColorImage::from_rgba_unmultiplied(
            [buf.width() as usize, buf.height() as usize],
            buf.as_raw(),
        );
        match &mut self.canvas_texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.canvas_texture = Some(ctx.load_texture("canvas", image, TextureOptions::NEAREST));
            }
        }
        self.uploaded_revision = Some(self.session.revision());
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        self.fit_canvas(ui.available_size());
        self.upload_texture(ctx);

        let (w, h) = self.session.buffer().dimensions();
        let (response, painter) = ui.allocate_painter(egui::vec2(w as f32, h as f32), Sense::click_and_drag());
        let origin = response.rect.min;

        if let Some(texture) = &self.canvas_texture {
            let uv = Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0));
            painter.image(texture.id(), response.rect, uv, Color32::WHITE);
        }

        if self.session.pending_text().is_none() {
            self.pointer_input(ui, &response, origin);
        }

        if let Some(shape) = self.session.preview() {
            let tools = self.session.tools();
            let c = tools.paint_color();
            let stroke = Stroke::new(
                tools.brush_size() as f32,
                Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]),
            );
            let at = |p: (f32, f32)| origin + egui::vec2(p.0, p.1);
            match shape {
                ShapeGeometry::Rectangle { from, to } => {
                    painter.rect_stroke(Rect::from_two_pos(at(from), at(to)), 0.0, stroke);
                }
                ShapeGeometry::Circle { center, radius } => {
                    painter.circle_stroke(at(center), radius, stroke);
                }
                ShapeGeometry::Line { from, to } => {
                    painter.line_segment([at(from), at(to)], stroke);
                }
            }
        }
    }

    fn pointer_input(&mut self, ui: &egui::Ui, response: &egui::Response, origin: Pos2) {
        let (pressed, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else { return };
        let (x, y) = (pos.x - origin.x, pos.y - origin.y);

        if pressed && response.hovered() {
            self.pointer_captured = true;
            match self.session.on_pointer_down(x, y) {
                Ok(PointerOutcome::ColorPicked(c)) => {
                    self.status = format!("Picked {}", to_hex(c));
                }
                Ok(PointerOutcome::TextRequested { .. }) => self.text_input.clear(),
                Ok(_) => {}
                Err(e) => self.report(&e),
            }
        } else if self.pointer_captured && released {
            self.pointer_captured = false;
            self.session.on_pointer_up(x, y);
        } else if self.pointer_captured && response.dragged() {
            self.session.on_pointer_move(x, y);
        }
    }

    fn persist_settings(&mut self) {
        self.settings.capture_tools(self.session.tools());
        if let Err(e) = self.settings.save() {
            log_err!("Settings: could not save: {}", e);
        }
    }
}

impl eframe::App for PaintPadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_io();
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui, ctx));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::from_gray(60)))
            .show(ctx, |ui| self.canvas(ui, ctx));

        self.text_prompt(ctx);

        if self.session.is_drawing() {
            ctx.request_repaint();
        }
    }
}

impl Drop for PaintPadApp {
    fn drop(&mut self) {
        self.persist_settings();
    }
}
