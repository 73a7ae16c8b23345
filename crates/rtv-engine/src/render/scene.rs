use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::device::Gpu;
use crate::error::CaptureResult;

use super::mesh::{CUBE_INDICES, CUBE_VERTICES, MeshVertex};
use super::quad::{triangle_list, uniform_min_binding_size};
use super::target::TargetPass;
use super::{COLOR_FORMAT, DEPTH_FORMAT};

/// Default spin: a quarter turn per second.
pub const DEFAULT_ROTATION_RATE: f32 = std::f32::consts::FRAC_PI_2;

/// Camera eye position; the camera looks at the origin with +Y up.
const EYE: Vec3 = Vec3::new(0.0, 0.0, 3.5);
const FOV_Y_DEG: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Scene parameters.
#[derive(Debug, Clone, Copy)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    /// Radians per second of wall-clock time. Zero gives a static scene.
    pub rotation_rate: f32,
}

/// Model transform of the spinning mesh.
///
/// Kept apart from the GPU objects so the time integration can be exercised
/// without a device.
#[derive(Debug, Clone, Copy)]
pub struct SceneState {
    model: Mat4,
    last_time: f64,
    rotation_rate: f32,
    axis: Vec3,
}

impl SceneState {
    pub fn new(rotation_rate: f32) -> Self {
        Self {
            model: Mat4::IDENTITY,
            last_time: 0.0,
            rotation_rate,
            axis: Vec3::new(0.5, 0.75, 0.0).normalize(),
        }
    }

    /// Advances the model by `(time - last_time) * rotation_rate` radians.
    pub fn update(&mut self, time: f64) {
        let dt = (time - self.last_time) as f32;
        self.last_time = time;
        self.model *= Mat4::from_axis_angle(self.axis, dt * self.rotation_rate);
    }

    #[inline]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    #[inline]
    pub fn last_time(&self) -> f64 {
        self.last_time
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SceneUniform {
    mvp: [[f32; 4]; 4],
}

/// Spinning vertex-colored cube rendered into whichever target pass is open.
pub struct Scene {
    state: SceneState,
    projection: Mat4,
    view: Mat4,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform: wgpu::Buffer,
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
}

impl Scene {
    /// Opaque black; the capture background.
    pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;

    /// Builds the cube pipeline and buffers. A shader or pipeline that fails
    /// validation is returned as [`crate::CaptureError::Gpu`].
    pub fn new(gpu: &Gpu, config: SceneConfig) -> CaptureResult<Self> {
        let device = gpu.device();
        let scope = gpu.validation_scope("scene");

        let aspect = config.width.max(1) as f32 / config.height.max(1) as f32;
        let projection = Mat4::perspective_rh(FOV_Y_DEG.to_radians(), aspect, Z_NEAR, Z_FAR);
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rtv scene shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rtv scene bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: uniform_min_binding_size::<SceneUniform>(),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rtv scene pipeline layout"),
            bind_group_layouts: &[&bgl],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rtv scene pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: triangle_list(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rtv scene mvp ubo"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rtv scene bind group"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rtv cube vbo"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rtv cube ibo"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        scope.finish()?;

        Ok(Self {
            state: SceneState::new(config.rotation_rate),
            projection,
            view,
            pipeline,
            bind_group,
            uniform,
            vbo,
            ibo,
        })
    }

    /// Advances the animation to `time` seconds.
    pub fn update(&mut self, time: f64) {
        self.state.update(time);
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    /// `Projection * View * Model`.
    pub fn model_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.state.model()
    }

    /// Uploads the MVP and draws the mesh into `target`.
    ///
    /// The pass was opened with [`Scene::CLEAR_COLOR`], so color and depth are
    /// already cleared.
    pub fn render(&self, queue: &wgpu::Queue, target: &mut TargetPass<'_>) {
        let u = SceneUniform {
            mvp: self.model_view_projection().to_cols_array_2d(),
        };
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));

        let rpass = target.pass();
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vbo.slice(..));
        rpass.set_index_buffer(self.ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..CUBE_INDICES.len() as u32, 0, 0..1);
    }
}
