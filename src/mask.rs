//! Offscreen mask buffer — the full-resolution raster that accumulates
//! strokes.
//!
//! The buffer is always sized to the image's *natural* pixel dimensions,
//! never the device-scaled display surface. Every point written into it is
//! in image-natural coordinates, which is what lets zoom changes repaint
//! correctly without re-deriving past strokes, and keeps exported masks
//! aligned 1:1 with the original image pixels.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageError, Rgba, RgbaImage};

use crate::log_err;

/// Default brush color (strokes are stored as opaque blue).
pub const DEFAULT_BRUSH_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Guard against absurd allocations (max ~256 megapixels, as elsewhere in
/// the raster pipeline).
const MAX_PIXELS: u64 = 256_000_000;

/// How a dot composites onto the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    /// Normal alpha blending — the dot accumulates into the mask.
    Accumulate,
    /// Destination-out — previously accumulated alpha under the dot is
    /// removed. Destructive: erased mask data is gone, not hidden.
    Subtract,
}

/// Export encodings for the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskFormat {
    #[default]
    Jpeg,
    Png,
}

impl MaskFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            MaskFormat::Jpeg => "image/jpeg",
            MaskFormat::Png => "image/png",
        }
    }
}

/// Error type for mask export operations.
#[derive(Debug)]
pub enum ExportError {
    /// The encoder rejected the buffer. Session remains usable.
    Encode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Encode(e) => write!(f, "Mask encode error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        ExportError::Encode(e.to_string())
    }
}

/// Full-resolution stroke accumulation buffer.
pub struct MaskBuffer {
    pixels: RgbaImage,
}

impl MaskBuffer {
    /// Create a fully transparent buffer at the image's natural size, or
    /// `None` for degenerate or oversized dimensions. The mask must live at
    /// natural resolution or not at all — a clamped substitute would break
    /// the 1:1 alignment with the image that export relies on.
    pub fn try_new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || (width as u64) * (height as u64) > MAX_PIXELS {
            log_err!("MaskBuffer::try_new: unsupported dimensions {}×{}", width, height);
            return None;
        }
        Some(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    /// Like [`MaskBuffer::try_new`] but substitutes a 1×1 buffer for
    /// unsupported dimensions. Only for contexts with no error channel;
    /// sessions go through the fallible constructor.
    pub fn new(width: u32, height: u32) -> Self {
        Self::try_new(width, height).unwrap_or_else(|| Self {
            pixels: RgbaImage::new(1, 1),
        })
    }

    /// Wrap an already-decoded mask raster (headless re-encode path).
    /// Rejects the same dimensions [`MaskBuffer::try_new`] does.
    pub fn from_image(pixels: RgbaImage) -> Option<Self> {
        if pixels.width() == 0
            || pixels.height() == 0
            || (pixels.width() as u64) * (pixels.height() as u64) > MAX_PIXELS
        {
            log_err!(
                "MaskBuffer::from_image: unsupported dimensions {}×{}",
                pixels.width(),
                pixels.height()
            );
            return None;
        }
        Some(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Read-only view of the raw buffer, for the compositor.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Reset the entire buffer to fully transparent.
    pub fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Paint a filled circle centered at `(x, y)` (mask coordinates) with
    /// the given diameter.
    ///
    /// Sub-pixel centers are honored: coverage is decided per pixel center,
    /// and the pixel containing the center is always touched so single
    /// clicks leave a visible mark even with a tiny brush.
    pub fn paint_dot(&mut self, x: f32, y: f32, diameter: f32, color: Rgba<u8>, op: BlendOp) {
        let w = self.pixels.width();
        let h = self.pixels.height();
        let radius = (diameter / 2.0).max(0.5);

        // Containing pixel first — guarantees a mark for any radius.
        if x >= 0.0 && y >= 0.0 && (x as u32) < w && (y as u32) < h {
            self.write_pixel(x as u32, y as u32, color, op);
        }

        let min_x = (x - radius).floor().max(0.0) as u32;
        let min_y = (y - radius).floor().max(0.0) as u32;
        let max_x = ((x + radius).ceil() as i64).min(w as i64 - 1);
        let max_y = ((y + radius).ceil() as i64).min(h as i64 - 1);
        if max_x < 0 || max_y < 0 {
            return;
        }

        let r2 = radius * radius;
        for py in min_y..=max_y as u32 {
            let dy = py as f32 + 0.5 - y;
            for px in min_x..=max_x as u32 {
                let dx = px as f32 + 0.5 - x;
                if dx * dx + dy * dy <= r2 {
                    self.write_pixel(px, py, color, op);
                }
            }
        }
    }

    fn write_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>, op: BlendOp) {
        let px = self.pixels.get_pixel_mut(x, y);
        match op {
            BlendOp::Accumulate => {
                // Opaque brush dot: source-over of full-alpha source is a
                // plain replace.
                *px = color;
            }
            BlendOp::Subtract => {
                *px = Rgba([0, 0, 0, 0]);
            }
        }
    }

    /// Fraction of buffer pixels carrying any mask alpha, in [0, 1].
    pub fn coverage(&self) -> f32 {
        let total = (self.pixels.width() as u64 * self.pixels.height() as u64).max(1);
        let marked = self.pixels.pixels().filter(|p| p.0[3] > 0).count() as u64;
        marked as f32 / total as f32
    }

    /// Encode the buffer at full mask resolution.
    ///
    /// PNG keeps the alpha channel; JPEG carries no alpha, so the mask is
    /// flattened onto black first (unmarked pixels come out black, strokes
    /// in the brush color). Encode failures are logged and returned — the
    /// session stays usable.
    pub fn export(&self, format: MaskFormat, quality: u8) -> Result<Vec<u8>, ExportError> {
        let mut out = Vec::new();
        let result: Result<(), ImageError> = match format {
            MaskFormat::Png => {
                let encoder = PngEncoder::new(Cursor::new(&mut out));
                #[allow(deprecated)]
                encoder.encode(
                    self.pixels.as_raw(),
                    self.pixels.width(),
                    self.pixels.height(),
                    image::ColorType::Rgba8,
                )
            }
            MaskFormat::Jpeg => {
                let rgb = self.flatten_onto_black();
                let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
                encoder.encode(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ColorType::Rgb8,
                )
            }
        };

        match result {
            Ok(()) => Ok(out),
            Err(e) => {
                log_err!("Mask export failed ({:?}): {}", format, e);
                Err(e.into())
            }
        }
    }

    fn flatten_onto_black(&self) -> image::RgbImage {
        let mut rgb = image::RgbImage::new(self.pixels.width(), self.pixels.height());
        for (src, dst) in self.pixels.pixels().zip(rgb.pixels_mut()) {
            let a = src.0[3] as u16;
            dst.0 = [
                ((src.0[0] as u16 * a) / 255) as u8,
                ((src.0[1] as u16 * a) / 255) as u8,
                ((src.0[2] as u16 * a) / 255) as u8,
            ];
        }
        rgb
    }
}
