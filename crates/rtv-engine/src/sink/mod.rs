//! Frame sinks: where converted planes go.
//!
//! A sink accepts `Y`, `U`, `V` in that order once per frame and writes them
//! verbatim, with no framing. Writes block when the consumer is slow; that is
//! the pipeline's only backpressure.

mod ffmpeg;
mod stream;

pub use ffmpeg::{EncoderConfig, FfmpegSink, is_program_on_path};
pub use stream::{MemorySink, StreamSink};

use crate::error::CaptureResult;

/// Ordered byte-stream consumer of planar frames.
pub trait FrameSink {
    /// Writes one frame: all of `y`, then `u`, then `v`.
    fn write_planes(&mut self, y: &[u8], u: &[u8], v: &[u8]) -> CaptureResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;

    /// Bytes accepted so far.
    fn bytes_written(&self) -> u64;

    /// Flushes and releases the sink. Consuming `self` makes it a one-shot.
    fn finish(self) -> CaptureResult<()>
    where
        Self: Sized;
}
