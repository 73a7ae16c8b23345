use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::device::Gpu;
use crate::error::{CaptureError, CaptureResult};

use super::color_matrix::ColorMatrix;
use super::downsample::ChromaDownsampler;
use super::quad::{
    ClipVertex, QuadBuffers, nearest_sampler, texture_entry, triangle_list,
    uniform_min_binding_size,
};
use super::status::{AttachmentSet, check_framebuffer, ensure_complete};
use super::{DEPTH_FORMAT, PLANE_FORMAT};

/// One output plane of the converter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Plane {
    Y,
    U,
    V,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Y, Plane::U, Plane::V];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Plane::Y => 0,
            Plane::U => 1,
            Plane::V => 2,
        }
    }

    /// Mip level holding the plane at its stream resolution.
    #[inline]
    pub const fn readback_mip(self) -> u32 {
        match self {
            Plane::Y => 0,
            Plane::U | Plane::V => 1,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MatrixUniform {
    to_yuv: [[f32; 4]; 4],
}

/// GPU RGB -> planar YUV converter with three simultaneous outputs.
///
/// Each plane is an `R8Unorm` texture with two mip levels: level 0 at full
/// resolution is written by [`ColorSpaceConverter::convert`]; level 1 of U and
/// V is filled by [`ColorSpaceConverter::downsample_chroma`].
#[derive(Default)]
pub struct ColorSpaceConverter {
    resources: Option<ConverterResources>,
}

/// Field order is teardown order.
struct ConverterResources {
    plane_views: [wgpu::TextureView; 3],
    chroma_mip_views: [wgpu::TextureView; 2],
    depth_view: wgpu::TextureView,
    planes: [wgpu::Texture; 3],
    depth: wgpu::Texture,

    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    matrix_ubo: wgpu::Buffer,
    quad: QuadBuffers,

    downsampler: ChromaDownsampler,
    chroma_sources: [wgpu::BindGroup; 2],

    width: u32,
    height: u32,
}

impl Drop for ConverterResources {
    fn drop(&mut self) {
        for plane in &self.planes {
            plane.destroy();
        }
        self.depth.destroy();
        self.matrix_ubo.destroy();
    }
}

impl ColorSpaceConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the three plane textures, the depth buffer and the conversion
    /// pipeline using [`ColorMatrix::CAPTURE`].
    pub fn init(&mut self, gpu: &Gpu, width: u32, height: u32) -> CaptureResult<()> {
        self.init_with_matrix(gpu, width, height, ColorMatrix::CAPTURE)
    }

    pub fn init_with_matrix(
        &mut self,
        gpu: &Gpu,
        width: u32,
        height: u32,
        matrix: ColorMatrix,
    ) -> CaptureResult<()> {
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
                color: &[PLANE_FORMAT; 3],
                depth: Some(DEPTH_FORMAT),
            },
        );
        ensure_complete("yuv converter", status)?;

        let scope = gpu.validation_scope("yuv converter");
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let planes = Plane::ALL.map(|plane| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(match plane {
                    Plane::Y => "rtv plane y",
                    Plane::U => "rtv plane u",
                    Plane::V => "rtv plane v",
                }),
                size,
                mip_level_count: 2,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: PLANE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        });

        let plane_views = [0, 1, 2].map(|i| mip_view(&planes[i], 0));
        let chroma_mip_views = [1, 2].map(|i| mip_view(&planes[i], 1));

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rtv yuv depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rtv yuv shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/yuv.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rtv yuv bgl"),
            entries: &[
                texture_entry(0, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: uniform_min_binding_size::<MatrixUniform>(),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rtv yuv pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let plane_target = Some(wgpu::ColorTargetState {
            format: PLANE_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rtv yuv pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[ClipVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[plane_target.clone(), plane_target.clone(), plane_target],
            }),
            primitive: triangle_list(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let matrix_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rtv yuv matrix ubo"),
            contents: bytemuck::bytes_of(&MatrixUniform {
                to_yuv: matrix.cols(),
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let downsampler = ChromaDownsampler::new(device);
        let chroma_sources = [1, 2].map(|i| downsampler.bind_source(device, &plane_views[i]));
        let sampler = nearest_sampler(device, "rtv yuv sampler");
        let quad = QuadBuffers::new(device, "rtv yuv");
        scope.finish()?;

        self.resources = Some(ConverterResources {
            plane_views,
            chroma_mip_views,
            depth_view,
            planes,
            depth,
            pipeline,
            bind_group_layout,
            sampler,
            matrix_ubo,
            quad,
            downsampler,
            chroma_sources,
            width,
            height,
        });

        log::debug!("yuv converter allocated ({width}x{height})");
        Ok(())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Returns `(width, height)` of the full-resolution planes.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.resources.as_ref().map(|r| (r.width, r.height))
    }

    pub fn plane_texture(&self, plane: Plane) -> Option<&wgpu::Texture> {
        self.resources.as_ref().map(|r| &r.planes[plane.index()])
    }

    /// Records the conversion of `source` (an RGB color view of the converter's
    /// size) into the three full-resolution planes. No-op before `init`.
    pub fn convert(&self, gpu: &Gpu, encoder: &mut wgpu::CommandEncoder, source: &wgpu::TextureView) {
        let Some(r) = self.resources.as_ref() else { return };

        let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rtv yuv bind group"),
            layout: &r.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&r.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: r.matrix_ubo.as_entire_binding(),
                },
            ],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("rtv yuv pass"),
            color_attachments: &[
                plane_attachment(&r.plane_views[0]),
                plane_attachment(&r.plane_views[1]),
                plane_attachment(&r.plane_views[2]),
            ],
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

        rpass.set_viewport(0.0, 0.0, r.width as f32, r.height as f32, 0.0, 1.0);
        rpass.set_pipeline(&r.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        r.quad.draw(&mut rpass);
    }

    /// Records the 2x2 box filter that fills mip level 1 of U and V.
    pub fn downsample_chroma(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(r) = self.resources.as_ref() else { return };
        for (source, dst) in r.chroma_sources.iter().zip(&r.chroma_mip_views) {
            r.downsampler.encode(encoder, source, dst);
        }
    }
}

fn plane_attachment(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

fn mip_view(texture: &wgpu::Texture, level: u32) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        base_mip_level: level,
        mip_level_count: Some(1),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_indices_are_stream_order() {
        let idx: Vec<usize> = Plane::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn chroma_reads_back_half_resolution_level() {
        assert_eq!(Plane::Y.readback_mip(), 0);
        assert_eq!(Plane::U.readback_mip(), 1);
        assert_eq!(Plane::V.readback_mip(), 1);
    }

    #[test]
    fn uninitialized_converter_reports_nothing() {
        let c = ColorSpaceConverter::new();
        assert!(!c.is_initialized());
        assert!(c.size().is_none());
        assert!(c.plane_texture(Plane::Y).is_none());
    }
}
