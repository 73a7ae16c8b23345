//! Window + preview runtime loop.
//!
//! Owns the `winit` EventLoop and Window, wires them to the GPU layer and
//! drives one capture iteration per redraw.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
