//! Session/lifecycle controller — one per loaded image.
//!
//! A session exclusively owns the mask buffer, display surface, and stroke
//! engine for its image. All state lives on this one value object and is
//! passed explicitly to subcomponents; there is no hidden cross-call state.
//! Everything runs on the single event-driven thread: pointer callbacks and
//! explicit API calls, never concurrently.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::geometry::{self, FIT_PADDING_X, FIT_PADDING_Y, ViewTransform};
use crate::log_info;
use crate::mask::{ExportError, MaskBuffer, MaskFormat};
use crate::stroke::{StrokeEngine, ToolMode};
use crate::surface::DisplaySurface;

/// User zoom bounds (the UI exposes these as 20–150 percent).
pub const MIN_USER_SCALE: f32 = 0.2;
pub const MAX_USER_SCALE: f32 = 1.5;

/// Error type for session construction.
#[derive(Debug)]
pub enum SessionError {
    /// The platform cannot provide the raster buffers this session needs
    /// (degenerate viewport, or a surface/mask allocation over the pixel
    /// clamp). Fatal for this session; the caller shows a fallback and must
    /// not attempt draw calls. The mask in particular must exist at the
    /// image's natural resolution or the session cannot honor its export
    /// guarantees.
    RasterContextUnavailable,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::RasterContextUnavailable => {
                write!(f, "Raster drawing context is not available")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Point-in-time configuration snapshot. A copy — consumers re-query rather
/// than assume it tracks live state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub stroke_width: f32,
    pub stroke_color: Rgba<u8>,
    /// User zoom factor (1.0 = 100%).
    pub scale: f32,
    pub fit_scale: f32,
    pub mode: ToolMode,
    pub dpr: f32,
}

/// Handle for cancelling a destroy-notification registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyToken(u64);

/// One interactive masking session over a loaded image.
pub struct Session {
    pub id: Uuid,
    image: Arc<RgbaImage>,
    mask: MaskBuffer,
    surface: DisplaySurface,
    engine: StrokeEngine,
    /// Computed once at construction from image and viewport dimensions;
    /// never mutated by zoom.
    fit_scale: f32,
    user_scale: f32,
    dpr: f32,
    destroyed: bool,
    destroy_observers: Vec<(u64, Box<dyn FnMut()>)>,
    next_token: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("fit_scale", &self.fit_scale)
            .field("user_scale", &self.user_scale)
            .field("dpr", &self.dpr)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session for `image` on a `logical_w × logical_h` viewport.
    ///
    /// The mask buffer is sized to the image's natural dimensions, the
    /// fit-scale is computed exactly once here, and an initial redraw leaves
    /// the surface ready for interaction.
    pub fn new(
        image: Arc<RgbaImage>,
        logical_w: u32,
        logical_h: u32,
        dpr: f32,
    ) -> Result<Self, SessionError> {
        let surface = DisplaySurface::new(logical_w, logical_h, dpr)
            .ok_or(SessionError::RasterContextUnavailable)?;

        // The mask is only useful at the image's natural size; refusing the
        // session beats silently degrading stroke and export fidelity.
        let mask = MaskBuffer::try_new(image.width(), image.height())
            .ok_or(SessionError::RasterContextUnavailable)?;

        let fit_scale = geometry::fit_scale(
            image.width(),
            image.height(),
            surface.device_width(),
            surface.device_height(),
            FIT_PADDING_X,
            FIT_PADDING_Y,
            dpr,
        );

        let mut session = Self {
            id: Uuid::new_v4(),
            mask,
            image,
            surface,
            engine: StrokeEngine::new(),
            fit_scale,
            user_scale: 1.0,
            dpr,
            destroyed: false,
            destroy_observers: Vec::new(),
            next_token: 0,
        };

        log_info!(
            "Session {} created: image {}×{}, viewport {}×{} @ dpr {}, fit {:.4}",
            session.id,
            session.image.width(),
            session.image.height(),
            logical_w,
            logical_h,
            dpr,
            fit_scale
        );

        session.redraw();
        Ok(session)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    pub fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    pub fn surface(&self) -> &DisplaySurface {
        &self.surface
    }

    /// Current effective display transform (fit × user zoom × dpr, centered).
    pub fn transform(&self) -> ViewTransform {
        ViewTransform::compose(
            self.fit_scale,
            self.user_scale,
            self.dpr,
            self.image.width(),
            self.image.height(),
            self.surface.device_width(),
            self.surface.device_height(),
        )
    }

    /// Read-only, point-in-time configuration copy.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            stroke_width: self.engine.width(),
            stroke_color: self.engine.color(),
            scale: self.user_scale,
            fit_scale: self.fit_scale,
            mode: self.engine.mode(),
            dpr: self.dpr,
        }
    }

    /// Switch interaction mode. The previous mode is always deactivated
    /// first; activating the current mode again is harmless.
    pub fn activate(&mut self, mode: ToolMode) {
        if self.destroyed {
            return;
        }
        self.engine.activate(mode);
    }

    /// Update user zoom (clamped to [0.2, 1.5]) and repaint. Fit-scale is
    /// untouched.
    pub fn set_scale(&mut self, user_scale: f32) {
        if self.destroyed {
            return;
        }
        self.user_scale = user_scale.clamp(MIN_USER_SCALE, MAX_USER_SCALE);
        self.redraw();
    }

    pub fn set_brush_width(&mut self, width: f32) {
        self.engine.set_width(width);
    }

    pub fn set_brush_color(&mut self, color: Rgba<u8>) {
        self.engine.set_color(color);
    }

    /// Pointer pressed at a client (logical) position over the canvas.
    pub fn pointer_down(&mut self, client: (f32, f32)) {
        if self.destroyed {
            return;
        }
        let t = self.transform();
        if self.engine.pointer_down(client, &t, &mut self.mask) {
            self.redraw();
        }
    }

    /// Pointer moved; interpolated stroke samples land on the mask.
    pub fn pointer_move(&mut self, client: (f32, f32)) {
        if self.destroyed {
            return;
        }
        let t = self.transform();
        if self.engine.pointer_move(client, &t, &mut self.mask) {
            self.redraw();
        }
    }

    pub fn pointer_up(&mut self) {
        self.engine.pointer_up();
    }

    /// Clear all accumulated strokes and repaint.
    pub fn clear_mask(&mut self) {
        if self.destroyed {
            return;
        }
        self.mask.clear();
        self.redraw();
    }

    /// Encode the mask at full image-natural resolution, regardless of the
    /// current zoom.
    pub fn export_mask(&self, format: MaskFormat, quality: u8) -> Result<Vec<u8>, ExportError> {
        self.mask.export(format, quality)
    }

    /// Register for the one-shot destroyed notification.
    pub fn on_destroy(&mut self, callback: impl FnMut() + 'static) -> DestroyToken {
        let token = DestroyToken(self.next_token);
        self.next_token += 1;
        if !self.destroyed {
            self.destroy_observers.push((token.0, Box::new(callback)));
        }
        token
    }

    /// Cancel a destroy-notification registration.
    pub fn cancel_on_destroy(&mut self, token: DestroyToken) {
        self.destroy_observers.retain(|(id, _)| *id != token.0);
    }

    /// Tear the session down: stop the stroke engine, clear both buffers,
    /// notify observers exactly once. Idempotent — a second call is a no-op,
    /// and observers never fire twice. Must run whenever the owning image or
    /// view changes so no stale handler can draw onto a replaced buffer.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.engine.stop();
        self.mask.clear();
        self.surface.clear();

        let mut observers = std::mem::take(&mut self.destroy_observers);
        for (_, callback) in observers.iter_mut() {
            callback();
        }

        log_info!("Session {} destroyed", self.id);
    }

    fn redraw(&mut self) {
        let t = self.transform();
        self.surface.redraw(&self.image, &self.mask, &t);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn gray_image(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, Rgba([128, 128, 128, 255])))
    }

    #[test]
    fn degenerate_viewport_is_unsupported() {
        let err = Session::new(gray_image(100, 100), 0, 600, 1.0).unwrap_err();
        assert!(matches!(err, SessionError::RasterContextUnavailable));
    }

    #[test]
    fn unallocatable_mask_fails_construction() {
        // An image the mask buffer rejects must refuse the whole session
        // instead of quietly running with a degraded mask.
        let empty = Arc::new(RgbaImage::new(0, 100));
        let err = Session::new(empty, 800, 600, 1.0).unwrap_err();
        assert!(matches!(err, SessionError::RasterContextUnavailable));
    }

    #[test]
    fn fit_scale_matches_reference_scenario() {
        // 1000×800 image, 800×600 viewport, 16/60 padding → fit 0.6
        let session = Session::new(gray_image(1000, 800), 800, 600, 1.0).unwrap();
        assert!((session.config().fit_scale - 0.6).abs() < 1e-6);
    }

    #[test]
    fn reference_screen_point_lands_on_expected_mask_pixel() {
        let mut session = Session::new(gray_image(1000, 800), 800, 600, 1.0).unwrap();
        session.set_scale(1.5);
        session.set_brush_width(2.0);
        session.activate(ToolMode::Drawing);
        session.pointer_down((400.0, 300.0));
        session.pointer_up();

        // (400,300) at fit 0.6 × user 1.5 maps to mask (500,400)
        assert!(session.mask().pixels().get_pixel(500, 400).0[3] > 0);
        // Far-away pixels untouched
        assert_eq!(session.mask().pixels().get_pixel(100, 100).0[3], 0);
    }

    #[test]
    fn zoom_never_mutates_fit_scale_or_mask_resolution() {
        let mut session = Session::new(gray_image(1000, 800), 800, 600, 1.0).unwrap();
        let fit = session.config().fit_scale;

        for scale in [0.2_f32, 0.5, 1.0, 1.37, 1.5] {
            session.set_scale(scale);
            assert_eq!(session.config().fit_scale, fit);
            assert_eq!(session.mask().width(), 1000);
            assert_eq!(session.mask().height(), 800);
        }

        // Out-of-range requests are clamped
        session.set_scale(9.0);
        assert_eq!(session.config().scale, MAX_USER_SCALE);
    }

    #[test]
    fn export_dimensions_ignore_zoom() {
        let mut session = Session::new(gray_image(320, 200), 640, 480, 1.0).unwrap();
        session.activate(ToolMode::Drawing);
        session.pointer_down((320.0, 240.0));
        session.pointer_up();
        session.set_scale(0.3);

        let bytes = session.export_mask(MaskFormat::Png, 85).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 200));
    }

    #[test]
    fn destroy_is_idempotent_and_notifies_once() {
        let mut session = Session::new(gray_image(64, 64), 128, 128, 1.0).unwrap();
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        session.on_destroy(move || counter.set(counter.get() + 1));

        session.destroy();
        session.destroy();
        assert_eq!(fired.get(), 1);
        assert!(session.is_destroyed());
    }

    #[test]
    fn cancelled_observer_never_fires() {
        let mut session = Session::new(gray_image(64, 64), 128, 128, 1.0).unwrap();
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        let token = session.on_destroy(move || counter.set(counter.get() + 1));
        session.cancel_on_destroy(token);

        session.destroy();
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn destroyed_session_ignores_input() {
        let mut session = Session::new(gray_image(64, 64), 128, 128, 1.0).unwrap();
        session.activate(ToolMode::Drawing);
        session.destroy();

        session.pointer_down((64.0, 64.0));
        session.pointer_move((70.0, 70.0));
        assert_eq!(session.mask().coverage(), 0.0);
    }

    #[test]
    fn config_is_a_point_in_time_copy() {
        let mut session = Session::new(gray_image(64, 64), 128, 128, 1.0).unwrap();
        let snapshot = session.config();
        session.set_brush_width(77.0);
        session.activate(ToolMode::Erasing);

        assert_eq!(snapshot.stroke_width, crate::stroke::DEFAULT_BRUSH_WIDTH);
        assert_eq!(snapshot.mode, ToolMode::Idle);
        assert_eq!(session.config().stroke_width, 77.0);
        assert_eq!(session.config().mode, ToolMode::Erasing);
    }

    #[test]
    fn switching_modes_applies_each_move_exactly_once() {
        let mut session = Session::new(gray_image(200, 200), 200, 200, 2.0).unwrap();
        session.set_brush_width(4.0);

        session.activate(ToolMode::Drawing);
        session.activate(ToolMode::Erasing);
        session.activate(ToolMode::Drawing);

        session.pointer_down((100.0, 100.0));
        session.pointer_up();

        // With repeated re-activation the dot must appear once, at the
        // expected footprint — never doubled up by stale handlers.
        let marked = session
            .mask()
            .pixels()
            .pixels()
            .filter(|p| p.0[3] > 0)
            .count();
        assert!(marked > 0);
        let t = session.transform();
        let expected_diameter = t.logical_len_to_mask(4.0);
        let max_area = std::f32::consts::PI * (expected_diameter / 2.0 + 1.0).powi(2);
        assert!((marked as f32) < max_area * 1.5);
    }
}
