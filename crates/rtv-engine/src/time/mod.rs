//! Time subsystem.
//!
//! Provides the capture clock without coupling to the runtime:
//! - `now_secs()` is the scene time fed to the pipeline each iteration
//! - `tick()` once per captured frame
//! - `elapsed_secs()` / `throughput()` for the end-of-run report

mod capture_clock;

pub use capture_clock::{CaptureClock, ClockMode, throughput};
