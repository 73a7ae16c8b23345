use std::time::{Duration, Instant};

/// Where scene time comes from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ClockMode {
    /// Wall-clock seconds since the clock started.
    Wall,

    /// `frames * step` seconds, independent of how fast frames are produced.
    ///
    /// Keeps the motion in an offline capture at the encoded frame rate.
    FixedStep(f64),
}

/// Capture clock: scene time source plus frame accounting.
///
/// Throughput is always measured on the wall clock between `new` (or `reset`)
/// and the moment it is queried, whatever the scene time mode.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    start: Instant,
    frames: u64,
    mode: ClockMode,
}

impl CaptureClock {
    /// Wall-clock scene time.
    pub fn new() -> Self {
        Self::with_mode(ClockMode::Wall)
    }

    /// Scene time advances by `1 / fps` per tick.
    pub fn fixed_rate(fps: u32) -> Self {
        Self::with_mode(ClockMode::FixedStep(1.0 / fps.max(1) as f64))
    }

    pub fn with_mode(mode: ClockMode) -> Self {
        Self {
            start: Instant::now(),
            frames: 0,
            mode,
        }
    }

    /// Resets the baseline and the frame counter.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.frames = 0;
    }

    /// Scene time in seconds.
    pub fn now_secs(&self) -> f64 {
        match self.mode {
            ClockMode::Wall => self.elapsed_secs(),
            ClockMode::FixedStep(step) => self.frames as f64 * step,
        }
    }

    /// Wall-clock seconds since start.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Counts one frame and returns its index.
    pub fn tick(&mut self) -> u64 {
        let index = self.frames;
        self.frames = self.frames.wrapping_add(1);
        index
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames per second; zero when no time has passed.
pub fn throughput(frames: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        frames as f64 / elapsed_secs
    } else {
        0.0
    }
}
