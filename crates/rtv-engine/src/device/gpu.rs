use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use crate::error::{CaptureError, CaptureResult};

use super::GpuInit;
use super::surface::PreviewSurface;

/// Owns wgpu core objects.
///
/// Capture never needs a window: a `Gpu` created by [`Gpu::headless`] renders
/// purely offscreen. [`Gpu::with_surface`] additionally returns a preview
/// surface bound to a window.
pub struct Gpu {
    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,
}

impl Gpu {
    /// Creates a GPU context with no presentation surface.
    pub fn headless(init: GpuInit) -> Result<Self> {
        let instance = new_instance();
        pollster::block_on(Self::request(instance, &init, None))
    }

    /// Creates a GPU context plus a preview surface for `window`.
    pub fn with_surface(window: Arc<Window>, init: GpuInit) -> Result<(Self, PreviewSurface)> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = new_instance();
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let gpu = pollster::block_on(Self::request(instance, &init, Some(&surface)))?;
        let preview = PreviewSurface::configure(surface, &gpu, &init, size)?;
        Ok((gpu, preview))
    }

    async fn request(
        instance: wgpu::Instance,
        init: &GpuInit,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("rtv device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        // Runtime validation errors are diagnostics only; capture keeps going.
        device.on_uncaptured_error(Arc::new(|err| {
            log::error!("uncaptured gpu error: {err}");
        }));

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Returns a reference to the selected adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Creates a command encoder labelled for the capture loop.
    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Opens a validation error scope around resource creation.
    ///
    /// Errors raised inside the scope are reported by
    /// [`ValidationScope::finish`] instead of the uncaptured-error log.
    pub fn validation_scope(&self, label: &'static str) -> ValidationScope {
        ValidationScope {
            guard: self.device.push_error_scope(wgpu::ErrorFilter::Validation),
            label,
        }
    }

    /// Submits one encoder and returns its submission index.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) -> wgpu::SubmissionIndex {
        self.queue.submit(std::iter::once(encoder.finish()))
    }
}

/// Pending validation error scope. Dropping it unfinished discards whatever
/// it caught.
pub struct ValidationScope {
    guard: wgpu::ErrorScopeGuard,
    label: &'static str,
}

impl ValidationScope {
    /// Pops the scope; any validation error makes the init fail.
    pub fn finish(self) -> CaptureResult<()> {
        match pollster::block_on(self.guard.pop()) {
            Some(err) => {
                log::error!("{}: gpu validation failed: {err}", self.label);
                Err(CaptureError::Gpu(format!("{}: {err}", self.label)))
            }
            None => Ok(()),
        }
    }
}

fn new_instance() -> wgpu::Instance {
    // Use all backends to allow wgpu to select the optimal platform backend.
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}
