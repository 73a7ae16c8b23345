//! Capture driver and its host-side pieces.
//!
//! Per iteration, in order: advance the scene, render into the ring's write
//! slot, optionally blit the read slot to the preview, convert the read slot
//! to planar YUV, read the planes back, hand them to the sink, advance the
//! ring. Everything runs on the calling thread.

mod config;
mod driver;
mod planes;
mod readback;
mod ring;

pub use config::CaptureConfig;
pub use driver::{CapturePipeline, CaptureReport, StopSignal};
pub use planes::{PlaneLayout, PlaneSet};
pub use readback::{PlaneReadback, padded_bytes_per_row, unpad_rows};
pub use ring::RenderRing;
