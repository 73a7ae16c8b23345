//! GPU device + preview surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue, with or without a window
//! - creating & configuring the optional preview Surface (swapchain)
//! - acquiring preview frames

mod frame;
mod gpu;
mod init;
mod surface;

pub use frame::GpuFrame;
pub use gpu::{Gpu, ValidationScope};
pub use init::GpuInit;
pub use surface::{PreviewSurface, SurfaceErrorAction};
