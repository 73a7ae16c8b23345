use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::capture::{CaptureConfig, CapturePipeline, CaptureReport};
use crate::device::{Gpu, GpuInit, PreviewSurface, SurfaceErrorAction};
use crate::error::CaptureResult;
use crate::render::PreviewView;
use crate::sink::FrameSink;
use crate::time::CaptureClock;

/// Preview window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub capture: CaptureConfig,
    /// Stop after this many frames; `None` runs until the window closes.
    pub max_frames: Option<u64>,
}

impl RuntimeConfig {
    pub fn new(capture: CaptureConfig) -> Self {
        Self {
            title: "rtv".to_string(),
            capture,
            max_frames: None,
        }
    }
}

/// Entry point for the windowed capture.
pub struct Runtime;

impl Runtime {
    /// Opens the preview window and captures until it is closed or the frame
    /// limit is reached.
    ///
    /// `make_sink` runs once, after the GPU is up and before the first frame.
    pub fn run<S, F>(config: RuntimeConfig, gpu_init: GpuInit, make_sink: F) -> Result<CaptureReport>
    where
        S: FrameSink,
        F: FnOnce(&CaptureConfig) -> CaptureResult<S>,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = PreviewState::new(config, gpu_init, make_sink);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        if let Some(err) = state.error.take() {
            return Err(err);
        }
        state
            .report
            .take()
            .context("event loop exited before the capture started")
    }
}

/// Window-bound resources. Field order is drop order: GPU objects go before
/// the window they render to.
struct Session<S: FrameSink> {
    pipeline: Option<CapturePipeline<S>>,
    surface: PreviewSurface,
    gpu: Gpu,
    window: Arc<Window>,
}

struct PreviewState<S: FrameSink, F> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    make_sink: Option<F>,

    session: Option<Session<S>>,
    clock: CaptureClock,

    report: Option<CaptureReport>,
    error: Option<anyhow::Error>,
}

impl<S, F> PreviewState<S, F>
where
    S: FrameSink,
    F: FnOnce(&CaptureConfig) -> CaptureResult<S>,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, make_sink: F) -> Self {
        Self {
            config,
            gpu_init,
            make_sink: Some(make_sink),
            session: None,
            clock: CaptureClock::new(),
            report: None,
            error: None,
        }
    }

    fn create_session(&mut self, event_loop: &ActiveEventLoop) -> Result<Session<S>> {
        let capture = &self.config.capture;
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(capture.width, capture.height))
            .with_resizable(false);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let (gpu, surface) = Gpu::with_surface(window.clone(), self.gpu_init.clone())
            .context("GPU initialization failed for window")?;

        let make_sink = self
            .make_sink
            .take()
            .context("capture session was already started")?;
        let sink = make_sink(capture).context("failed to open frame sink")?;
        let pipeline =
            CapturePipeline::new(&gpu, capture, sink).context("failed to build capture pipeline")?;

        Ok(Session {
            pipeline: Some(pipeline),
            surface,
            gpu,
            window,
        })
    }

    /// Finishes the pipeline; later calls are no-ops.
    fn finish_capture(&mut self) {
        if let Some(pipeline) = self.session.as_mut().and_then(|s| s.pipeline.take()) {
            match pipeline.finish() {
                Ok(report) => self.report = Some(report),
                Err(e) => self.fail(anyhow::Error::new(e).context("failed to finish capture")),
            }
        }
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        self.finish_capture();
        event_loop.exit();
    }

    fn fail(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn limit_reached(&self) -> bool {
        let frames = self
            .session
            .as_ref()
            .and_then(|s| s.pipeline.as_ref())
            .map_or(0, |p| p.frames());
        self.config.max_frames.is_some_and(|max| frames >= max)
    }

    /// One capture iteration with the preview blit. Returns `false` when the
    /// loop must stop.
    fn redraw(&mut self) -> bool {
        let time = self.clock.now_secs();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Session {
            pipeline,
            surface,
            gpu,
            ..
        } = session;
        let Some(pipeline) = pipeline.as_mut() else {
            return false;
        };

        let frame = match surface.begin_frame() {
            Ok(frame) => Some(frame),
            Err(err) => {
                let reason = err.to_string();
                match surface.handle_surface_error(gpu, err) {
                    SurfaceErrorAction::Fatal => {
                        self.fail(anyhow::anyhow!("preview surface lost: {reason}"));
                        return false;
                    }
                    action => {
                        log::warn!("preview skipped ({action:?}): {reason}");
                        None
                    }
                }
            }
        };

        let result = match &frame {
            Some(frame) => {
                let size = surface.size();
                let preview = PreviewView::new(&frame.view, surface.format(), size.width, size.height);
                pipeline.step(gpu, time, Some(&preview))
            }
            None => pipeline.step(gpu, time, None),
        };

        if let Some(frame) = frame {
            frame.present();
        }

        match result {
            Ok(()) => {
                self.clock.tick();
                true
            }
            Err(e) => {
                self.fail(anyhow::Error::new(e).context("capture step failed"));
                false
            }
        }
    }
}

impl<S, F> ApplicationHandler for PreviewState<S, F>
where
    S: FrameSink,
    F: FnOnce(&CaptureConfig) -> CaptureResult<S>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.make_sink.is_none() {
            return;
        }

        match self.create_session(event_loop) {
            Ok(session) => {
                session.window.request_redraw();
                self.clock.reset();
                self.session = Some(session);
            }
            Err(e) => {
                self.fail(e.context("failed to start preview capture"));
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        // Continuous capture: one iteration per redraw.
        if let Some(session) = &self.session {
            session.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("preview window closed");
                self.stop(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                if let Some(session) = self.session.as_mut() {
                    session.surface.resize(&session.gpu, new_size);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.limit_reached() || !self.redraw() || self.limit_reached() {
                    self.stop(event_loop);
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Exits that bypass CloseRequested still finalize the sink.
        self.finish_capture();
    }
}
