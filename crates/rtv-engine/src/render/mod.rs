//! GPU rendering subsystem.
//!
//! Every component owns its own GPU resources (pipelines, buffers, textures)
//! and only records commands into a caller-provided encoder; submission and
//! readback belong to the capture driver.
//!
//! Convention:
//! - offscreen color is `Rgba8Unorm`, depth is `Depth24Plus`
//! - YUV planes are `R8Unorm`, one byte per sample

mod blit;
mod color_matrix;
mod ctx;
mod downsample;
mod mesh;
mod quad;
mod scene;
mod status;
mod target;
mod yuv;

pub use color_matrix::{ColorMatrix, unorm8};
pub use ctx::PreviewView;
pub use scene::{DEFAULT_ROTATION_RATE, Scene, SceneConfig, SceneState};
pub use status::{AttachmentSet, FramebufferStatus, check_framebuffer};
pub use target::{OffscreenTarget, TargetPass};
pub use yuv::{ColorSpaceConverter, Plane};

/// Color format of offscreen render targets.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth format shared by offscreen targets and the converter.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Format of each YUV plane.
pub const PLANE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
