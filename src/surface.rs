//! Display surface and compositor — the on-screen canvas model.
//!
//! The backing store holds `logical × dpr` device pixels (the logical/backing
//! split that keeps output sharp on high-density displays). Data flows one
//! way: mask buffer → compositor → display. The stroke engine never touches
//! this surface, and every redraw starts from a cleared store, so repeated
//! renders are idempotent — no drift, no ghosting.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::ViewTransform;
use crate::mask::MaskBuffer;

/// Overlay opacity for the mask layer on top of the base image.
pub const MASK_OVERLAY_ALPHA: f32 = 0.5;

/// Same allocation guard the mask buffer applies.
const MAX_PIXELS: u64 = 256_000_000;

/// On-screen canvas: device-pixel backing store plus its logical size.
pub struct DisplaySurface {
    backing: RgbaImage,
    logical_w: u32,
    logical_h: u32,
    dpr: f32,
}

impl DisplaySurface {
    /// Allocate a backing store of `logical × dpr` device pixels. Returns
    /// `None` when the platform viewport is degenerate or the allocation
    /// would exceed the pixel clamp — the caller treats that as an
    /// unsupported environment.
    pub fn new(logical_w: u32, logical_h: u32, dpr: f32) -> Option<Self> {
        if logical_w == 0 || logical_h == 0 || !(dpr.is_finite() && dpr > 0.0) {
            return None;
        }
        let device_w = (logical_w as f32 * dpr).round() as u32;
        let device_h = (logical_h as f32 * dpr).round() as u32;
        if device_w == 0
            || device_h == 0
            || (device_w as u64) * (device_h as u64) > MAX_PIXELS
        {
            return None;
        }
        Some(Self {
            backing: RgbaImage::new(device_w, device_h),
            logical_w,
            logical_h,
            dpr,
        })
    }

    pub fn device_width(&self) -> u32 {
        self.backing.width()
    }

    pub fn device_height(&self) -> u32 {
        self.backing.height()
    }

    pub fn logical_size(&self) -> (u32, u32) {
        (self.logical_w, self.logical_h)
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    /// Rendered frame, for upload to a GPU texture or inspection in tests.
    pub fn frame(&self) -> &RgbaImage {
        &self.backing
    }

    /// Reset the backing store to fully transparent.
    pub fn clear(&mut self) {
        self.backing.as_mut().fill(0);
    }

    /// Full clean redraw: clear, draw the base image through the current
    /// transform (nearest-neighbour), then composite the mask at
    /// [`MASK_OVERLAY_ALPHA`] restricted to image content — mask color never
    /// bleeds outside the image rect, and base alpha is preserved
    /// (source-atop).
    ///
    /// Rows are processed in parallel; each row does O(width) work, so the
    /// cost is bounded by surface size regardless of stroke history.
    pub fn redraw(&mut self, image: &RgbaImage, mask: &MaskBuffer, t: &ViewTransform) {
        let surf_w = self.backing.width() as usize;
        let surf_h = self.backing.height() as usize;
        let img_w = image.width();
        let img_h = image.height();

        // Destination rect of the scaled image, clamped to the surface.
        let dest_x0 = t.tx.floor().max(0.0) as usize;
        let dest_y0 = t.ty.floor().max(0.0) as usize;
        let dest_x1 = ((t.tx + img_w as f32 * t.scale).ceil().max(0.0) as usize).min(surf_w);
        let dest_y1 = ((t.ty + img_h as f32 * t.scale).ceil().max(0.0) as usize).min(surf_h);

        let mask_px = mask.pixels();
        let mask_aligned = mask_px.width() == img_w && mask_px.height() == img_h;
        let stride = surf_w * 4;

        self.backing
            .as_mut()
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                row.fill(0);
                if y < dest_y0 || y >= dest_y1 {
                    return;
                }
                for x in dest_x0..dest_x1 {
                    // Sample at the destination pixel center
                    let (mx, my) = t.invert(x as f32 + 0.5, y as f32 + 0.5);
                    if mx < 0.0 || my < 0.0 {
                        continue;
                    }
                    let sx = mx as u32;
                    let sy = my as u32;
                    if sx >= img_w || sy >= img_h {
                        continue;
                    }

                    let base = *image.get_pixel(sx, sy);
                    let out = if mask_aligned {
                        overlay(base, *mask_px.get_pixel(sx, sy))
                    } else {
                        base
                    };

                    let off = x * 4;
                    row[off..off + 4].copy_from_slice(&out.0);
                }
            });
    }
}

/// Blend one mask pixel over a base pixel at the overlay opacity.
/// Source-atop: output alpha is the base alpha.
fn overlay(base: Rgba<u8>, mask: Rgba<u8>) -> Rgba<u8> {
    if mask.0[3] == 0 {
        return base;
    }
    let a = MASK_OVERLAY_ALPHA * mask.0[3] as f32 / 255.0;
    let blend = |b: u8, m: u8| -> u8 { (b as f32 * (1.0 - a) + m as f32 * a).round() as u8 };
    Rgba([
        blend(base.0[0], mask.0[0]),
        blend(base.0[1], mask.0[1]),
        blend(base.0[2], mask.0[2]),
        base.0[3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{BlendOp, DEFAULT_BRUSH_COLOR};

    fn white_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn rejects_degenerate_viewports() {
        assert!(DisplaySurface::new(0, 600, 1.0).is_none());
        assert!(DisplaySurface::new(800, 0, 1.0).is_none());
        assert!(DisplaySurface::new(800, 600, 0.0).is_none());
        assert!(DisplaySurface::new(800, 600, f32::NAN).is_none());
    }

    #[test]
    fn backing_store_is_logical_times_dpr() {
        let s = DisplaySurface::new(800, 600, 2.0).unwrap();
        assert_eq!((s.device_width(), s.device_height()), (1600, 1200));
        assert_eq!(s.logical_size(), (800, 600));
    }

    #[test]
    fn image_is_centered_and_clipped_to_its_rect() {
        let mut s = DisplaySurface::new(100, 100, 1.0).unwrap();
        let image = white_image(50, 50);
        let mask = MaskBuffer::new(50, 50);
        let t = ViewTransform::compose(1.0, 1.0, 1.0, 50, 50, 100, 100);

        s.redraw(&image, &mask, &t);

        // Inside the centered 50×50 rect: image pixels
        assert_eq!(s.frame().get_pixel(50, 50).0, [255, 255, 255, 255]);
        // Outside: untouched transparent surface
        assert_eq!(s.frame().get_pixel(10, 10).0, [0, 0, 0, 0]);
        assert_eq!(s.frame().get_pixel(90, 90).0, [0, 0, 0, 0]);
    }

    #[test]
    fn mask_overlay_blends_at_half_alpha_within_image_only() {
        let mut s = DisplaySurface::new(64, 64, 1.0).unwrap();
        let image = white_image(64, 64);
        let mut mask = MaskBuffer::new(64, 64);
        mask.paint_dot(32.0, 32.0, 16.0, DEFAULT_BRUSH_COLOR, BlendOp::Accumulate);
        let t = ViewTransform::compose(1.0, 1.0, 1.0, 64, 64, 64, 64);

        s.redraw(&image, &mask, &t);

        // White at 50% blue: (127|128, 127|128, 255)
        let px = s.frame().get_pixel(32, 32).0;
        assert!(px[0] >= 126 && px[0] <= 129);
        assert!(px[1] >= 126 && px[1] <= 129);
        assert_eq!(px[2], 255);
        assert_eq!(px[3], 255);

        // Unmasked image pixels stay pure white
        assert_eq!(s.frame().get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn redraw_is_idempotent() {
        let mut s = DisplaySurface::new(80, 60, 1.0).unwrap();
        let image = white_image(40, 30);
        let mut mask = MaskBuffer::new(40, 30);
        mask.paint_dot(20.0, 15.0, 10.0, DEFAULT_BRUSH_COLOR, BlendOp::Accumulate);
        let t = ViewTransform::compose(1.0, 1.0, 1.0, 40, 30, 80, 60);

        s.redraw(&image, &mask, &t);
        let first = s.frame().clone();
        s.redraw(&image, &mask, &t);
        assert_eq!(s.frame().as_raw(), first.as_raw());
    }

    #[test]
    fn zooming_out_leaves_no_ghost_of_previous_frame() {
        let mut s = DisplaySurface::new(100, 100, 1.0).unwrap();
        let image = white_image(50, 50);
        let mask = MaskBuffer::new(50, 50);

        // Zoomed in: image covers most of the surface
        let t_big = ViewTransform::compose(1.0, 1.5, 1.0, 50, 50, 100, 100);
        s.redraw(&image, &mask, &t_big);
        assert_eq!(s.frame().get_pixel(15, 15).0[3], 255);

        // Zoomed out: the corner must be cleared, not left over
        let t_small = ViewTransform::compose(1.0, 0.5, 1.0, 50, 50, 100, 100);
        s.redraw(&image, &mask, &t_small);
        assert_eq!(s.frame().get_pixel(15, 15).0, [0, 0, 0, 0]);
    }
}
