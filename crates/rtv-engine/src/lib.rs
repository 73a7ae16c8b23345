//! Real-time render-to-video engine.
//!
//! Renders a scene offscreen, converts each frame to planar YUV 4:2:0 on the
//! GPU, reads the planes back and streams them to a frame sink (normally an
//! external encoder process). A window is optional and only shows a preview.

pub mod capture;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod sink;
pub mod time;
pub mod window;

pub use error::{CaptureError, CaptureResult};
