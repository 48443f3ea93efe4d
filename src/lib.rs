//! remask — interactive raster masking engine.
//!
//! Paint and erase a binary-ish mask over a loaded image at arbitrary zoom,
//! then export the mask at full image-natural resolution for downstream
//! object removal. The engine keeps a pixel-accurate mapping between screen
//! input, the zoomed/fit display transform, and an independent
//! full-resolution mask buffer.
//!
//! Data flow is one-directional: pointer events → [`stroke::StrokeEngine`]
//! → [`mask::MaskBuffer`] → [`surface::DisplaySurface`] → screen. The
//! [`session::Session`] owns all of it, one per loaded image.

pub mod app;
pub mod cli;
pub mod cursor;
pub mod geometry;
pub mod logger;
pub mod mask;
pub mod remote;
pub mod session;
pub mod stroke;
pub mod surface;

pub use cursor::{BrushCursor, CursorShape};
pub use geometry::ViewTransform;
pub use mask::{BlendOp, ExportError, MaskBuffer, MaskFormat};
pub use remote::{RemovalAck, RemovalClient, RemoteError};
pub use session::{DestroyToken, Session, SessionConfig, SessionError};
pub use stroke::{StrokeEngine, ToolMode};
pub use surface::DisplaySurface;
