use std::path::PathBuf;

use crate::render::FramebufferStatus;

/// Errors raised by the capture core.
///
/// GPU bring-up and the application shell use `anyhow`; this type covers the
/// failures callers are expected to match on.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// `init` was called on a resource that already owns GPU allocations.
    #[error("render surface is already initialized")]
    AlreadyInitialized,

    /// The attachment set failed the explicit completeness check.
    #[error("framebuffer incomplete: {0}")]
    Incomplete(FramebufferStatus),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn encoder '{program}': {source}")]
    EncoderSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encoder process started but exposed no writable stdin.
    #[error("encoder '{0}' has no stdin pipe")]
    EncoderStdin(PathBuf),

    #[error("encoder exited with {status}: {stderr}")]
    EncoderExit { status: String, stderr: String },

    /// A frame write failed because the encoder stopped reading. Carries the
    /// encoder's exit status and the tail of its stderr.
    #[error("encoder stopped accepting frames ({status}): {stderr}")]
    EncoderWrite {
        #[source]
        source: std::io::Error,
        status: String,
        stderr: String,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("readback failed: {0}")]
    Readback(String),

    #[error("gpu error: {0}")]
    Gpu(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
