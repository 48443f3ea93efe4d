//! Stroke engine — turns pointer-down/move/up sequences into interpolated
//! dot sequences on the mask buffer.
//!
//! Mode switching is declarative: a single [`StrokeEngine::activate`] entry
//! point owns the `Idle -> Drawing -> Idle` / `Idle -> Erasing -> Idle`
//! state machine and always tears down the previous mode first. There is no
//! per-mode handler registration to get out of sync, so re-activating a mode
//! can never double-apply a stroke.

use image::Rgba;

use crate::geometry::ViewTransform;
use crate::mask::{BlendOp, DEFAULT_BRUSH_COLOR, MaskBuffer};

/// Brush width bounds in logical pixels.
pub const MIN_BRUSH_WIDTH: f32 = 2.0;
pub const MAX_BRUSH_WIDTH: f32 = 100.0;
pub const DEFAULT_BRUSH_WIDTH: f32 = 20.0;

/// Distance between interpolated samples, in mask pixels. Small relative to
/// any permitted brush width, so fast pointer movement cannot leave gaps.
const SAMPLE_STEP: f32 = 1.0;

/// Interaction mode. Draw and erase are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Idle,
    Drawing,
    Erasing,
}

impl ToolMode {
    fn blend_op(&self) -> Option<BlendOp> {
        match self {
            ToolMode::Idle => None,
            ToolMode::Drawing => Some(BlendOp::Accumulate),
            ToolMode::Erasing => Some(BlendOp::Subtract),
        }
    }
}

/// Per-session stroke state.
pub struct StrokeEngine {
    mode: ToolMode,
    /// True between pointer-down and pointer-up while a mode is active.
    stroke_active: bool,
    /// Previous sample in mask coordinates; None at stroke start so the
    /// first event paints a lone dot instead of a line from stale state.
    last_point: Option<(f32, f32)>,
    width: f32,
    color: Rgba<u8>,
}

impl Default for StrokeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeEngine {
    pub fn new() -> Self {
        Self {
            mode: ToolMode::Idle,
            stroke_active: false,
            last_point: None,
            width: DEFAULT_BRUSH_WIDTH,
            color: DEFAULT_BRUSH_COLOR,
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn is_stroke_active(&self) -> bool {
        self.stroke_active
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    /// Brush width in logical pixels; takes effect on the next dot.
    pub fn set_width(&mut self, width: f32) {
        self.width = width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
    }

    /// Brush color; takes effect on the next dot.
    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = color;
    }

    /// Switch interaction mode. Any in-flight stroke is aborted and the
    /// last point cleared, whether the mode changes or not — activating the
    /// same mode twice is idempotent.
    pub fn activate(&mut self, mode: ToolMode) {
        self.stroke_active = false;
        self.last_point = None;
        self.mode = mode;
    }

    /// Deactivate everything. Called on session teardown.
    pub fn stop(&mut self) {
        self.activate(ToolMode::Idle);
    }

    /// Pointer pressed at a client (logical) position. Paints a single dot
    /// so clicks without movement still leave a mark. Returns true if the
    /// mask was mutated.
    pub fn pointer_down(
        &mut self,
        client: (f32, f32),
        transform: &ViewTransform,
        mask: &mut MaskBuffer,
    ) -> bool {
        let Some(op) = self.mode.blend_op() else {
            return false;
        };
        self.stroke_active = true;
        self.last_point = None;

        let (x, y) = transform.client_to_mask(client.0, client.1);
        let diameter = transform.logical_len_to_mask(self.width);
        mask.paint_dot(x, y, diameter, self.color, op);
        self.last_point = Some((x, y));
        true
    }

    /// Pointer moved. Interpolates evenly spaced dots between the previous
    /// and current position so fast movement cannot tear the stroke.
    /// Returns true if the mask was mutated.
    pub fn pointer_move(
        &mut self,
        client: (f32, f32),
        transform: &ViewTransform,
        mask: &mut MaskBuffer,
    ) -> bool {
        if !self.stroke_active {
            return false;
        }
        let Some(op) = self.mode.blend_op() else {
            return false;
        };

        let (x, y) = transform.client_to_mask(client.0, client.1);
        let diameter = transform.logical_len_to_mask(self.width);

        match self.last_point {
            Some((lx, ly)) => {
                let dx = x - lx;
                let dy = y - ly;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance < SAMPLE_STEP {
                    mask.paint_dot(x, y, diameter, self.color, op);
                } else {
                    let steps = (distance / SAMPLE_STEP).ceil() as usize;
                    for i in 1..=steps {
                        let t = i as f32 / steps as f32;
                        mask.paint_dot(lx + dx * t, ly + dy * t, diameter, self.color, op);
                    }
                }
            }
            None => {
                mask.paint_dot(x, y, diameter, self.color, op);
            }
        }

        self.last_point = Some((x, y));
        true
    }

    /// Pointer released. The last point is cleared rather than retained —
    /// retaining it would connect two unrelated strokes with a stray line.
    pub fn pointer_up(&mut self) {
        self.stroke_active = false;
        self.last_point = None;
    }
}
