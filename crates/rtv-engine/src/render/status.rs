use std::fmt;

use crate::error::{CaptureError, CaptureResult};

/// Outcome of the explicit attachment completeness check.
///
/// wgpu has no framebuffer objects, so completeness is checked up front
/// against device limits and format capabilities before anything is
/// allocated. Names follow the classic framebuffer status enums so logs read
/// the same across backends.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    /// Zero-sized or larger than `max_texture_dimension_2d`.
    IncompleteDimensions { width: u32, height: u32, max: u32 },
    /// A color or depth format cannot be used as a render attachment.
    IncompleteAttachment(wgpu::TextureFormat),
    /// No color attachment at all.
    IncompleteMissingAttachment,
    /// More simultaneous color outputs than the device allows.
    IncompleteDrawBuffer { requested: u32, max: u32 },
}

impl FramebufferStatus {
    #[inline]
    pub fn is_complete(self) -> bool {
        self == FramebufferStatus::Complete
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "FRAMEBUFFER_COMPLETE"),
            Self::IncompleteDimensions { width, height, max } => write!(
                f,
                "FRAMEBUFFER_INCOMPLETE_DIMENSIONS ({width}x{height}, max {max})"
            ),
            Self::IncompleteAttachment(format) => {
                write!(f, "FRAMEBUFFER_INCOMPLETE_ATTACHMENT ({format:?})")
            }
            Self::IncompleteMissingAttachment => {
                write!(f, "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT")
            }
            Self::IncompleteDrawBuffer { requested, max } => write!(
                f,
                "FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER (requested {requested}, max {max})"
            ),
        }
    }
}

/// Attachments a render surface is about to allocate.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSet<'a> {
    pub width: u32,
    pub height: u32,
    pub color: &'a [wgpu::TextureFormat],
    pub depth: Option<wgpu::TextureFormat>,
}

/// Checks whether `set` forms a complete render surface on a device with
/// `limits` and `features`.
pub fn check_framebuffer(
    limits: &wgpu::Limits,
    features: wgpu::Features,
    set: &AttachmentSet<'_>,
) -> FramebufferStatus {
    let max = limits.max_texture_dimension_2d;
    if set.width == 0 || set.height == 0 || set.width > max || set.height > max {
        return FramebufferStatus::IncompleteDimensions {
            width: set.width,
            height: set.height,
            max,
        };
    }

    if set.color.is_empty() {
        return FramebufferStatus::IncompleteMissingAttachment;
    }

    let requested = set.color.len() as u32;
    if requested > limits.max_color_attachments {
        return FramebufferStatus::IncompleteDrawBuffer {
            requested,
            max: limits.max_color_attachments,
        };
    }

    let renderable = |format: wgpu::TextureFormat| {
        format
            .guaranteed_format_features(features)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    };

    if let Some(bad) = set
        .color
        .iter()
        .copied()
        .find(|f| f.is_depth_stencil_format() || !renderable(*f))
    {
        return FramebufferStatus::IncompleteAttachment(bad);
    }

    if let Some(depth) = set.depth {
        if !depth.is_depth_stencil_format() || !renderable(depth) {
            return FramebufferStatus::IncompleteAttachment(depth);
        }
    }

    FramebufferStatus::Complete
}

/// Logs `status` for `label` and turns anything but `Complete` into an error.
pub(crate) fn ensure_complete(label: &str, status: FramebufferStatus) -> CaptureResult<()> {
    if status.is_complete() {
        log::info!("{label}: framebuffer status {status}");
        Ok(())
    } else {
        log::error!("{label}: framebuffer status {status}");
        Err(CaptureError::Incomplete(status))
    }
}
