use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::device::Gpu;
use crate::error::{CaptureError, CaptureResult};
use crate::render::{ColorSpaceConverter, OffscreenTarget, PreviewView, Scene, SceneConfig};
use crate::sink::FrameSink;
use crate::time::{CaptureClock, throughput};

use super::config::CaptureConfig;
use super::planes::{PlaneLayout, PlaneSet};
use super::readback::PlaneReadback;
use super::ring::RenderRing;

/// Cooperative cancellation, polled once per iteration.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// End-of-run summary.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CaptureReport {
    pub frames: u64,
    pub elapsed_secs: f64,
    pub bytes_written: u64,
    /// `frames / elapsed_secs`.
    pub fps: f64,
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames in {:.3}s ({:.2} fps, {} bytes)",
            self.frames, self.elapsed_secs, self.fps, self.bytes_written
        )
    }
}

/// Render -> convert -> read back -> sink, one frame per [`CapturePipeline::step`].
///
/// The converter always reads the ring slot that is *not* being rendered this
/// iteration, so the GPU can draw frame `N` while the host waits for frame
/// `N - 1`'s planes. The first `ring_depth - 1` frames are the zero-initialized
/// targets converted, i.e. black.
pub struct CapturePipeline<S: FrameSink> {
    layout: PlaneLayout,
    scene: Scene,
    ring: RenderRing<OffscreenTarget>,
    converter: ColorSpaceConverter,
    readback: PlaneReadback,
    planes: PlaneSet,
    sink: S,
    frames: u64,
    started: Instant,
}

impl<S: FrameSink> CapturePipeline<S> {
    /// Allocates every GPU resource up front. Any incomplete attachment set
    /// fails here, before a single frame reaches the sink.
    pub fn new(gpu: &Gpu, config: &CaptureConfig, sink: S) -> CaptureResult<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let (width, height) = (config.width, config.height);

        let scene = Scene::new(
            gpu,
            SceneConfig {
                width,
                height,
                rotation_rate: config.rotation_rate,
            },
        )?;

        let ring = RenderRing::new(config.ring_depth, |_| {
            let mut target = OffscreenTarget::new();
            target.init(gpu, width, height)?;
            Ok(target)
        })?;

        let mut converter = ColorSpaceConverter::new();
        converter.init(gpu, width, height)?;

        let readback = PlaneReadback::new(gpu, layout);

        log::info!(
            "capture pipeline ready: {width}x{height}, ring depth {}, {} bytes/frame",
            ring.depth(),
            layout.frame_bytes()
        );

        Ok(Self {
            layout,
            scene,
            ring,
            converter,
            readback,
            planes: PlaneSet::new(layout),
            sink,
            frames: 0,
            started: Instant::now(),
        })
    }

    /// Runs one full iteration. Once started it always completes or fails.
    ///
    /// `preview`, when given, receives the slot that was just converted.
    pub fn step(&mut self, gpu: &Gpu, time: f64, preview: Option<&PreviewView<'_>>) -> CaptureResult<()> {
        let write = self.ring.write_index();
        let read = self.ring.read_index();

        self.scene.update(time);

        let mut encoder = gpu.create_encoder("rtv capture encoder");

        {
            let target = self.ring.write_slot();
            let Some(mut pass) = target.begin(&mut encoder, Scene::CLEAR_COLOR) else {
                return Err(CaptureError::Gpu(format!("ring slot {write} is not initialized")));
            };
            self.scene.render(gpu.queue(), &mut pass);
            pass.end();
        }

        if let Some(preview) = preview {
            if let Some(target) = self.ring.get_mut(read) {
                target.render_texture(gpu, &mut encoder, preview);
            }
        }

        let Some(source) = self.ring.read_slot().color_view() else {
            return Err(CaptureError::Gpu(format!("ring slot {read} is not initialized")));
        };
        self.converter.convert(gpu, &mut encoder, source);
        self.converter.downsample_chroma(&mut encoder);
        self.readback.encode_copies(&mut encoder, &self.converter)?;

        gpu.submit(encoder);

        // Blocks until the GPU has finished this submission.
        self.readback.read_into(gpu, &mut self.planes)?;

        self.sink
            .write_planes(&self.planes.y, &self.planes.u, &self.planes.v)?;

        self.ring.advance();
        self.frames += 1;

        log::debug!("frame {} captured (write slot {write}, read slot {read})", self.frames);
        Ok(())
    }

    /// Steps until `stop` fires or `max_frames` more frames were captured.
    ///
    /// Scene time comes from `clock`; returns the number of frames captured by
    /// this call.
    pub fn run(
        &mut self,
        gpu: &Gpu,
        stop: &dyn StopSignal,
        clock: &mut CaptureClock,
        max_frames: Option<u64>,
    ) -> CaptureResult<u64> {
        let mut captured = 0u64;
        loop {
            if stop.should_stop() {
                log::info!("capture stopped after {captured} frames");
                break;
            }
            if max_frames.is_some_and(|max| captured >= max) {
                break;
            }
            self.step(gpu, clock.now_secs(), None)?;
            clock.tick();
            captured += 1;
        }
        Ok(captured)
    }

    /// Frames written to the sink so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn layout(&self) -> PlaneLayout {
        self.layout
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Planes of the most recently captured frame.
    pub fn last_planes(&self) -> &PlaneSet {
        &self.planes
    }

    pub fn ring_indices(&self) -> (usize, usize) {
        (self.ring.write_index(), self.ring.read_index())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Logs throughput, closes the sink and releases the GPU resources.
    pub fn finish(self) -> CaptureResult<CaptureReport> {
        let elapsed_secs = self.started.elapsed().as_secs_f64();
        let report = CaptureReport {
            frames: self.frames,
            elapsed_secs,
            bytes_written: self.sink.bytes_written(),
            fps: throughput(self.frames, elapsed_secs),
        };
        log::info!("capture finished: {report}");

        let Self { sink, .. } = self;
        sink.finish()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_bool_is_a_stop_signal() {
        let flag = AtomicBool::new(false);
        assert!(!flag.should_stop());
        flag.store(true, Ordering::Release);
        assert!(flag.should_stop());
    }

    #[test]
    fn report_displays_throughput() {
        let r = CaptureReport {
            frames: 10,
            elapsed_secs: 2.0,
            bytes_written: 7_200_000,
            fps: throughput(10, 2.0),
        };
        assert_eq!(r.to_string(), "10 frames in 2.000s (5.00 fps, 7200000 bytes)");
    }
}
