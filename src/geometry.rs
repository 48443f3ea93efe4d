//! Coordinate mapping between screen input, the zoomed/fit display transform,
//! and the full-resolution mask buffer.
//!
//! Three coordinate spaces are in play:
//!
//! * **client** — logical (CSS-style) pixels relative to the canvas origin,
//!   what pointer events report;
//! * **device** — physical backing-store pixels (`client × dpr`);
//! * **mask** — the image's natural pixel grid, where every stroke lives.
//!
//! The display transform is scale-plus-translate only, so instead of a full
//! 6-component affine matrix we carry the reduced form.

/// Horizontal fit padding in logical pixels.
pub const FIT_PADDING_X: f32 = 16.0;
/// Vertical fit padding in logical pixels (leaves room for the toolbar).
pub const FIT_PADDING_Y: f32 = 60.0;

/// Scale-plus-translation transform from mask space to device space.
///
/// Forward: `device = mask * scale + offset`. `scale` already folds in
/// fit-scale, user zoom, and the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Device pixels per mask pixel (`fit_scale * user_scale * dpr`).
    pub scale: f32,
    /// Centering translation, device pixels.
    pub tx: f32,
    pub ty: f32,
    /// Device pixel ratio the surface was built with.
    pub dpr: f32,
}

impl ViewTransform {
    /// Effective transform for an image of `image_w × image_h` natural pixels
    /// shown on a `surface_w × surface_h` device-pixel surface.
    pub fn compose(
        fit_scale: f32,
        user_scale: f32,
        dpr: f32,
        image_w: u32,
        image_h: u32,
        surface_w: u32,
        surface_h: u32,
    ) -> Self {
        let scale = fit_scale * user_scale * dpr;
        let scaled_w = image_w as f32 * scale;
        let scaled_h = image_h as f32 * scale;
        let (tx, ty) = centered_offset(scaled_w, scaled_h, surface_w as f32, surface_h as f32);
        Self { scale, tx, ty, dpr }
    }

    /// Mask coordinates to device coordinates.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.tx, y * self.scale + self.ty)
    }

    /// Device coordinates to mask coordinates (exact inverse of [`apply`]).
    ///
    /// [`apply`]: ViewTransform::apply
    pub fn invert(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.tx) / self.scale, (y - self.ty) / self.scale)
    }

    /// Client (logical) coordinates to mask coordinates.
    ///
    /// Pointer events report logical positions; the backing store is scaled
    /// by dpr, so the point is promoted to device pixels before inverting.
    pub fn client_to_mask(&self, x: f32, y: f32) -> (f32, f32) {
        self.invert(x * self.dpr, y * self.dpr)
    }

    /// Convert a length in logical pixels to mask pixels.
    ///
    /// Used for the brush footprint: a brush of N logical pixels covers the
    /// same on-screen area at any zoom, so its mask-space diameter shrinks as
    /// the view zooms in.
    pub fn logical_len_to_mask(&self, len: f32) -> f32 {
        len * self.dpr / self.scale
    }
}

/// Smallest fit-scale ever produced. A viewport narrower than its own
/// padding would otherwise yield a zero or negative scale, which inverts the
/// transform math.
pub const MIN_FIT_SCALE: f32 = 0.01;

/// Scale that fits the whole image inside the surface with padding margins,
/// never below [`MIN_FIT_SCALE`].
///
/// `surface_w`/`surface_h` are device pixels; padding is logical pixels.
/// Computed exactly once per image load and never mutated by zoom.
pub fn fit_scale(
    image_w: u32,
    image_h: u32,
    surface_w: u32,
    surface_h: u32,
    pad_x: f32,
    pad_y: f32,
    dpr: f32,
) -> f32 {
    let avail_w = surface_w as f32 - 2.0 * pad_x * dpr;
    let avail_h = surface_h as f32 - 2.0 * pad_y * dpr;
    let sx = avail_w / (image_w as f32 * dpr);
    let sy = avail_h / (image_h as f32 * dpr);
    sx.min(sy).max(MIN_FIT_SCALE)
}

/// Translation that centers `scaled_w × scaled_h` content within the surface.
pub fn centered_offset(scaled_w: f32, scaled_h: f32, surface_w: f32, surface_h: f32) -> (f32, f32) {
    ((surface_w - scaled_w) / 2.0, (surface_h - scaled_h) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    #[test]
    fn round_trip_identity_across_zoom_range() {
        // invert(apply(p)) == p for every supported zoom step
        let mut s = 0.2_f32;
        while s <= 1.5 + 1e-6 {
            let t = ViewTransform::compose(0.6, s, 2.0, 1000, 800, 1600, 1200);
            let (dx, dy) = t.apply(123.25, 456.75);
            let (mx, my) = t.invert(dx, dy);
            assert!((mx - 123.25).abs() < EPS, "x drifted at scale {}", s);
            assert!((my - 456.75).abs() < EPS, "y drifted at scale {}", s);
            s += 0.01;
        }
    }

    #[test]
    fn fit_scale_matches_reference_viewport() {
        // 1000×800 image in an 800×600 surface with 16/60 logical padding
        let fit = fit_scale(1000, 800, 800, 600, 16.0, 60.0, 1.0);
        assert!((fit - 0.6).abs() < 1e-6);
    }

    #[test]
    fn fit_scale_is_dpr_invariant() {
        // The same viewport at dpr 2 has twice the device pixels; the image
        // must land on the same logical footprint.
        let at_1 = fit_scale(1000, 800, 800, 600, 16.0, 60.0, 1.0);
        let at_2 = fit_scale(1000, 800, 1600, 1200, 16.0, 60.0, 2.0);
        assert!((at_1 - at_2).abs() < 1e-6);
    }

    #[test]
    fn fit_scale_stays_positive_for_tiny_viewports() {
        // Viewport smaller than twice the padding: available space is
        // negative, but the scale must stay usable.
        let fit = fit_scale(1000, 800, 20, 20, 16.0, 60.0, 1.0);
        assert_eq!(fit, MIN_FIT_SCALE);

        // Same situation amplified by dpr
        let fit = fit_scale(1000, 800, 64, 64, 16.0, 60.0, 2.0);
        assert_eq!(fit, MIN_FIT_SCALE);

        let t = ViewTransform::compose(fit, 1.0, 2.0, 1000, 800, 64, 64);
        let (dx, dy) = t.apply(500.0, 400.0);
        let (mx, my) = t.invert(dx, dy);
        assert!((mx - 500.0).abs() < EPS);
        assert!((my - 400.0).abs() < EPS);
    }

    #[test]
    fn centered_offset_splits_slack_evenly() {
        let (x, y) = centered_offset(900.0, 720.0, 800.0, 600.0);
        assert_eq!(x, -50.0);
        assert_eq!(y, -60.0);
    }

    #[test]
    fn reference_point_maps_to_expected_mask_pixel() {
        // fit 0.6, user zoom 1.5 → scale 0.9; screen (400,300) → mask (500,400)
        let t = ViewTransform::compose(0.6, 1.5, 1.0, 1000, 800, 800, 600);
        let (mx, my) = t.client_to_mask(400.0, 300.0);
        assert!((mx - 500.0).abs() < EPS);
        assert!((my - 400.0).abs() < EPS);
    }

    #[test]
    fn logical_length_scales_with_zoom() {
        let t = ViewTransform::compose(0.5, 2.0, 1.0, 100, 100, 200, 200);
        // 20 logical px at effective scale 1.0 covers 20 mask px
        assert!((t.logical_len_to_mask(20.0) - 20.0).abs() < EPS);

        let t2 = ViewTransform::compose(0.5, 1.0, 2.0, 100, 100, 200, 200);
        // dpr cancels: 20 logical px at fit 0.5 covers 40 mask px
        assert!((t2.logical_len_to_mask(20.0) - 40.0).abs() < EPS);
    }
}
