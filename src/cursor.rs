//! Brush cursor overlay — purely presentational.
//!
//! Tracks the pointer over the canvas and describes the circle the shell
//! should draw at it. All sizing comes from a [`SessionConfig`] snapshot;
//! this module never touches the mask or the surface.

use crate::session::SessionConfig;
use crate::stroke::ToolMode;

/// What the shell should draw at the pointer, in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorShape {
    pub center: (f32, f32),
    /// Radius in logical pixels — half the brush width, constant across zoom.
    pub radius: f32,
    /// True when the session is in erase mode (drawn hollow/inverted).
    pub erase: bool,
}

/// Transient pointer-tracking state for the overlay.
#[derive(Debug, Default)]
pub struct BrushCursor {
    position: Option<(f32, f32)>,
}

impl BrushCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pointer position (logical, canvas-relative).
    pub fn set_position(&mut self, pos: (f32, f32)) {
        self.position = Some(pos);
    }

    /// Pointer left the canvas.
    pub fn hide(&mut self) {
        self.position = None;
    }

    /// Reset all transient state. Wired to the session's destroy
    /// notification so a stale cursor never outlives its canvas.
    pub fn reset(&mut self) {
        self.position = None;
    }

    /// Shape to draw, or `None` while hidden or while the session is idle.
    pub fn shape(&self, config: &SessionConfig) -> Option<CursorShape> {
        let center = self.position?;
        match config.mode {
            ToolMode::Idle => None,
            ToolMode::Drawing => Some(CursorShape {
                center,
                radius: config.stroke_width / 2.0,
                erase: false,
            }),
            ToolMode::Erasing => Some(CursorShape {
                center,
                radius: config.stroke_width / 2.0,
                erase: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::DEFAULT_BRUSH_COLOR;

    fn config(mode: ToolMode, width: f32) -> SessionConfig {
        SessionConfig {
            stroke_width: width,
            stroke_color: DEFAULT_BRUSH_COLOR,
            scale: 1.0,
            fit_scale: 0.6,
            mode,
            dpr: 1.0,
        }
    }

    #[test]
    fn hidden_until_pointer_arrives() {
        let cursor = BrushCursor::new();
        assert!(cursor.shape(&config(ToolMode::Drawing, 20.0)).is_none());
    }

    #[test]
    fn radius_is_half_brush_width_regardless_of_zoom() {
        let mut cursor = BrushCursor::new();
        cursor.set_position((120.0, 80.0));

        let mut cfg = config(ToolMode::Drawing, 30.0);
        let shape = cursor.shape(&cfg).unwrap();
        assert_eq!(shape.radius, 15.0);
        assert!(!shape.erase);

        // Zoom does not enter the cursor size — brush width is logical px
        cfg.scale = 1.5;
        assert_eq!(cursor.shape(&cfg).unwrap().radius, 15.0);
    }

    #[test]
    fn erase_mode_is_flagged() {
        let mut cursor = BrushCursor::new();
        cursor.set_position((0.0, 0.0));
        assert!(cursor.shape(&config(ToolMode::Erasing, 10.0)).unwrap().erase);
    }

    #[test]
    fn idle_mode_shows_no_cursor_and_reset_clears_position() {
        let mut cursor = BrushCursor::new();
        cursor.set_position((5.0, 5.0));
        assert!(cursor.shape(&config(ToolMode::Idle, 20.0)).is_none());

        cursor.reset();
        assert!(cursor.shape(&config(ToolMode::Drawing, 20.0)).is_none());
    }
}
