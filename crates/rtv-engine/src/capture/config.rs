use std::path::PathBuf;

use crate::error::{CaptureError, CaptureResult};
use crate::render::DEFAULT_ROTATION_RATE;
use crate::sink::EncoderConfig;

use super::planes::PlaneLayout;
use super::ring::RenderRing;

/// Capture run parameters.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Number of offscreen targets; the read lags the write by `ring_depth - 1`.
    pub ring_depth: usize,
    /// Radians per second; zero keeps the scene static.
    pub rotation_rate: f32,
    pub output: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fps: EncoderConfig::DEFAULT_FPS,
            ring_depth: 2,
            rotation_rate: DEFAULT_ROTATION_RATE,
            output: PathBuf::from("output.mp4"),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> CaptureResult<()> {
        PlaneLayout::new(self.width, self.height)?;
        if self.fps == 0 {
            return Err(CaptureError::InvalidConfig("fps must be non-zero".into()));
        }
        if self.ring_depth < RenderRing::<()>::MIN_DEPTH {
            return Err(CaptureError::InvalidConfig(format!(
                "ring depth {} is below {}",
                self.ring_depth,
                RenderRing::<()>::MIN_DEPTH
            )));
        }
        if !self.rotation_rate.is_finite() {
            return Err(CaptureError::InvalidConfig("rotation rate must be finite".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> CaptureResult<PlaneLayout> {
        PlaneLayout::new(self.width, self.height)
    }

    /// Encoder invocation matching this capture.
    pub fn encoder(&self) -> EncoderConfig {
        let mut cfg = EncoderConfig::new(&self.output, self.width, self.height);
        cfg.fps = self.fps;
        cfg
    }
}
