//! GUI shell — a thin eframe application around the masking engine.
//!
//! The shell owns at most one [`Session`] at a time. Opening an image
//! destroys the previous session (releasing its buffers and firing its
//! destroy observers) and builds a fresh one sized to the current canvas
//! viewport. All drawing goes through the session; the shell only forwards
//! pointer events, uploads the rendered surface to a GPU texture, and draws
//! the brush cursor on top.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use eframe::egui;
use egui::{
    Color32, ColorImage, Pos2, Rect, Stroke as UiStroke, TextureHandle, TextureOptions, Vec2,
};
use image::RgbaImage;

use crate::cursor::BrushCursor;
use crate::mask::MaskFormat;
use crate::remote::RemovalClient;
use crate::session::{Session, SessionError};
use crate::stroke::ToolMode;
use crate::{log_err, log_info};

/// Zoom slider bounds, percent.
const MIN_ZOOM_PERCENT: u32 = 20;
const MAX_ZOOM_PERCENT: u32 = 150;

pub struct MaskApp {
    image: Option<Arc<RgbaImage>>,
    image_name: String,
    session: Option<Session>,
    /// Set when the image changed and a new session must be built against
    /// the next known canvas rect.
    session_stale: bool,
    session_error: Option<SessionError>,

    texture: Option<TextureHandle>,
    frame_dirty: bool,

    cursor: BrushCursor,
    /// Raised by the session's destroy notification; the cursor resets on
    /// the next frame.
    cursor_stale: Rc<Cell<bool>>,

    mode: ToolMode,
    zoom_percent: u32,
    brush_width: f32,

    endpoint: String,
    image_url: String,
    status: Option<String>,
}

impl MaskApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            image: None,
            image_name: String::new(),
            session: None,
            session_stale: false,
            session_error: None,
            texture: None,
            frame_dirty: false,
            cursor: BrushCursor::new(),
            cursor_stale: Rc::new(Cell::new(false)),
            mode: ToolMode::Drawing,
            zoom_percent: 100,
            brush_width: crate::stroke::DEFAULT_BRUSH_WIDTH,
            endpoint: String::new(),
            image_url: String::new(),
            status: None,
        }
    }

    fn open_image(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file()
        else {
            return;
        };
        match image::open(&path) {
            Ok(img) => {
                self.image = Some(Arc::new(img.to_rgba8()));
                self.image_name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                if let Some(session) = self.session.as_mut() {
                    session.destroy();
                }
                self.session = None;
                self.session_stale = true;
                self.session_error = None;
                self.status = Some(format!("Loaded {}", self.image_name));
                log_info!("Opened image {:?}", path);
            }
            Err(e) => {
                self.status = Some(format!("Failed to open image: {}", e));
                log_err!("Failed to open image {:?}: {}", path, e);
            }
        }
    }

    /// Build a session for the freshly loaded image against the current
    /// canvas viewport.
    fn ensure_session(&mut self, rect: Rect, dpr: f32) {
        if !self.session_stale || self.session_error.is_some() {
            return;
        }
        let Some(image) = self.image.clone() else {
            return;
        };

        match Session::new(
            image,
            rect.width().max(1.0) as u32,
            rect.height().max(1.0) as u32,
            dpr,
        ) {
            Ok(mut session) => {
                let flag = self.cursor_stale.clone();
                session.on_destroy(move || flag.set(true));
                session.activate(self.mode);
                session.set_brush_width(self.brush_width);
                session.set_scale(self.zoom_percent as f32 / 100.0);
                self.session = Some(session);
                self.session_stale = false;
                self.texture = None;
                self.frame_dirty = true;
            }
            Err(e) => {
                // Fatal for this session: show the fallback, attempt no draws
                self.status = Some(format!("Canvas unavailable: {}", e));
                log_err!("Session creation failed: {}", e);
                self.session_error = Some(e);
                self.session_stale = false;
            }
        }
    }

    fn export_mask(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(&format!("{}-mask.jpg", self.image_name))
            .add_filter("JPEG", &["jpg", "jpeg"])
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("png") => MaskFormat::Png,
            _ => MaskFormat::Jpeg,
        };
        match session.export_mask(format, 85) {
            Ok(bytes) => match std::fs::write(&path, &bytes) {
                Ok(()) => {
                    self.status = Some(format!("Mask exported to {}", path.display()));
                    log_info!("Exported mask ({} bytes) to {:?}", bytes.len(), path);
                }
                Err(e) => {
                    self.status = Some(format!("Failed to write mask: {}", e));
                    log_err!("Mask write failed {:?}: {}", path, e);
                }
            },
            Err(e) => {
                // Encode failure is local and recoverable; session stays usable
                self.status = Some(format!("Mask export failed: {}", e));
            }
        }
    }

    fn submit_mask(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.mask().coverage() == 0.0 {
            self.status = Some("Nothing to submit: the mask is empty".to_string());
            return;
        }
        let format = MaskFormat::Jpeg;
        let bytes = match session.export_mask(format, 85) {
            Ok(b) => b,
            Err(e) => {
                self.status = Some(format!("Mask export failed: {}", e));
                return;
            }
        };
        let client = RemovalClient::new(self.endpoint.clone());
        match client.submit(&self.image_url, &bytes, format.mime()) {
            Ok(ack) => {
                self.status = Some(format!(
                    "Removal job accepted (event {})",
                    ack.event_id.as_deref().unwrap_or("<none>")
                ));
            }
            Err(e) if e.is_retryable() => {
                // Mask state is untouched; the user can retry as-is
                self.status = Some(format!("{} — try again", e));
            }
            Err(e) => {
                self.status = Some(e.to_string());
            }
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !self.frame_dirty && self.texture.is_some() {
            return;
        }
        let frame = session.surface().frame();
        let size = [frame.width() as usize, frame.height() as usize];
        let color = ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match self.texture.as_mut() {
            Some(tex) => tex.set(color, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("mask-canvas", color, TextureOptions::NEAREST))
            }
        }
        self.frame_dirty = false;
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let rect = ui.available_rect_before_wrap();
        let dpr = ui.ctx().pixels_per_point();
        self.ensure_session(rect, dpr);

        // The surface keeps the logical size it was built with; painting into
        // the live rect would stretch the frame after a window resize and
        // desync pointer math from the session's transform.
        let paint_rect = match self.session.as_ref() {
            Some(session) => session_paint_rect(rect, session.surface().logical_size()),
            None => rect,
        };

        let response = ui.allocate_rect(rect, egui::Sense::drag());

        if let Some(session) = self.session.as_mut() {
            let local = |pos: Pos2| (pos.x - paint_rect.min.x, pos.y - paint_rect.min.y);

            if response.drag_started() {
                if let Some(pos) = response.interact_pointer_pos() {
                    session.pointer_down(local(pos));
                    self.frame_dirty = true;
                }
            } else if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    session.pointer_move(local(pos));
                    self.frame_dirty = true;
                }
            }
            if response.drag_released() {
                session.pointer_up();
            }

            match response.hover_pos().or(response.interact_pointer_pos()) {
                Some(pos) if paint_rect.contains(pos) => self.cursor.set_position(local(pos)),
                _ => self.cursor.hide(),
            }
        }

        self.upload_frame(ui.ctx());

        let painter = ui.painter_at(rect);
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                paint_rect,
                Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // Brush cursor preview on top of everything
        if let Some(session) = self.session.as_ref()
            && let Some(shape) = self.cursor.shape(&session.config())
        {
            let center = Pos2::new(
                paint_rect.min.x + shape.center.0,
                paint_rect.min.y + shape.center.1,
            );
            let color = if shape.erase {
                Color32::from_rgb(230, 90, 90)
            } else {
                Color32::from_rgb(90, 130, 230)
            };
            painter.circle_stroke(center, shape.radius, UiStroke::new(1.5, color));
        }
    }

    fn toolbar_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                self.open_image();
            }

            ui.separator();

            let has_session = self.session.is_some();
            ui.add_enabled_ui(has_session, |ui| {
                let draw = ui
                    .selectable_label(self.mode == ToolMode::Drawing, "Draw")
                    .clicked();
                let erase = ui
                    .selectable_label(self.mode == ToolMode::Erasing, "Erase")
                    .clicked();
                if draw {
                    self.mode = ToolMode::Drawing;
                }
                if erase {
                    self.mode = ToolMode::Erasing;
                }
                if draw || erase {
                    if let Some(session) = self.session.as_mut() {
                        session.activate(self.mode);
                    }
                }

                if ui
                    .add(
                        egui::Slider::new(
                            &mut self.brush_width,
                            crate::stroke::MIN_BRUSH_WIDTH..=crate::stroke::MAX_BRUSH_WIDTH,
                        )
                        .step_by(1.0)
                        .text("Brush"),
                    )
                    .changed()
                {
                    if let Some(session) = self.session.as_mut() {
                        session.set_brush_width(self.brush_width);
                    }
                }

                if ui
                    .add(
                        egui::Slider::new(
                            &mut self.zoom_percent,
                            MIN_ZOOM_PERCENT..=MAX_ZOOM_PERCENT,
                        )
                        .step_by(1.0)
                        .suffix("%")
                        .text("Zoom"),
                    )
                    .changed()
                {
                    if let Some(session) = self.session.as_mut() {
                        session.set_scale(self.zoom_percent as f32 / 100.0);
                        self.frame_dirty = true;
                    }
                }

                ui.separator();

                if ui.button("Clear mask").clicked() {
                    if let Some(session) = self.session.as_mut() {
                        session.clear_mask();
                        self.frame_dirty = true;
                    }
                }
                if ui.button("Export mask…").clicked() {
                    self.export_mask();
                }
            });
        });
    }

    fn submit_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Endpoint:");
            ui.text_edit_singleline(&mut self.endpoint);
            ui.label("Image URL:");
            ui.text_edit_singleline(&mut self.image_url);

            let ready =
                self.session.is_some() && !self.endpoint.is_empty() && !self.image_url.is_empty();
            if ui
                .add_enabled(ready, egui::Button::new("Remove object"))
                .clicked()
            {
                self.submit_mask();
            }
        });
    }
}

/// Rect the rendered surface occupies on screen: the session's logical size
/// anchored at the viewport origin, independent of later viewport resizes.
fn session_paint_rect(avail: Rect, logical: (u32, u32)) -> Rect {
    Rect::from_min_size(avail.min, Vec2::new(logical.0 as f32, logical.1 as f32))
}

impl eframe::App for MaskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.cursor_stale.take() {
            self.cursor.reset();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar_ui(ui);
            self.submit_ui(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                } else if self.image.is_none() {
                    ui.label("Open an image to start masking");
                }
                if !self.image_name.is_empty() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(&self.image_name);
                    });
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session_error.is_some() {
                ui.centered_and_justified(|ui| {
                    ui.label("This environment cannot provide a raster canvas.");
                });
            } else if self.image.is_some() {
                self.canvas_ui(ui);
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label("No image loaded");
                });
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(session) = self.session.as_mut() {
            session.destroy();
        }
    }
}
