use crate::device::Gpu;
use crate::error::{CaptureError, CaptureResult};

use super::blit::TextureBlit;
use super::status::{AttachmentSet, check_framebuffer, ensure_complete};
use super::{COLOR_FORMAT, DEPTH_FORMAT, PreviewView};

/// One offscreen render surface: color texture + depth buffer.
///
/// A default-constructed target owns nothing. [`OffscreenTarget::init`]
/// allocates exactly once; every other operation is a no-op until then.
#[derive(Default)]
pub struct OffscreenTarget {
    resources: Option<TargetResources>,
}

/// Live GPU allocations of an initialized target.
///
/// Field order is teardown order: attachment views, color texture, depth
/// buffer, then the preview blit objects.
struct TargetResources {
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    color: wgpu::Texture,
    depth: wgpu::Texture,
    blit: Option<TextureBlit>,
    width: u32,
    height: u32,
}

impl Drop for TargetResources {
    fn drop(&mut self) {
        self.color.destroy();
        self.depth.destroy();
    }
}

/// Render pass scoped to one target's attachments and viewport.
///
/// Ending the pass (or dropping it) unbinds the target.
pub struct TargetPass<'e> {
    pass: wgpu::RenderPass<'e>,
}

impl<'e> TargetPass<'e> {
    pub fn pass(&mut self) -> &mut wgpu::RenderPass<'e> {
        &mut self.pass
    }

    pub fn end(self) {
        drop(self.pass);
    }
}

impl OffscreenTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the color texture and depth buffer.
    ///
    /// Rejects a second call with [`CaptureError::AlreadyInitialized`] without
    /// touching the existing allocations, and fails with
    /// [`CaptureError::Incomplete`] before allocating if the attachment set is
    /// not renderable on this device.
    pub fn init(&mut self, gpu: &Gpu, width: u32, height: u32) -> CaptureResult<()> {
        if self.resources.is_some() {
            return Err(CaptureError::AlreadyInitialized);
        }

        let device = gpu.device();
        let status = check_framebuffer(
            &device.limits(),
            device.features(),
            &AttachmentSet {
                width,
                height,
                color: &[COLOR_FORMAT],
                depth: Some(DEPTH_FORMAT),
            },
        );
        ensure_complete("offscreen target", status)?;

        let scope = gpu.validation_scope("offscreen target");
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rtv offscreen color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rtv offscreen depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        scope.finish()?;

        self.resources = Some(TargetResources {
            color_view,
            depth_view,
            color,
            depth,
            blit: None,
            width,
            height,
        });

        log::debug!("offscreen target allocated ({width}x{height})");
        Ok(())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Returns `(width, height)`, or `None` before `init`.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.resources.as_ref().map(|r| (r.width, r.height))
    }

    pub fn color_texture(&self) -> Option<&wgpu::Texture> {
        self.resources.as_ref().map(|r| &r.color)
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.resources.as_ref().map(|r| &r.color_view)
    }

    /// Opens a render pass on this target, clearing color to `clear` and depth
    /// to 1.0. Returns `None` if the target was never initialized.
    pub fn begin<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        clear: wgpu::Color,
    ) -> Option<TargetPass<'e>> {
        let r = self.resources.as_ref()?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("rtv offscreen pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &r.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &r.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_viewport(0.0, 0.0, r.width as f32, r.height as f32, 0.0, 1.0);
        Some(TargetPass { pass })
    }

    /// Draws the color texture over the whole preview surface.
    ///
    /// Preview only; the capture path reads the texture directly.
    pub fn render_texture(
        &mut self,
        gpu: &Gpu,
        encoder: &mut wgpu::CommandEncoder,
        dst: &PreviewView<'_>,
    ) {
        let Some(r) = self.resources.as_mut() else { return };
        let blit = r.blit.get_or_insert_with(|| TextureBlit::new(gpu.device()));
        blit.draw(gpu.device(), encoder, &r.color_view, dst);
    }
}
