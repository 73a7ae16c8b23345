use crate::device::Gpu;
use crate::error::{CaptureError, CaptureResult};
use crate::render::{ColorSpaceConverter, Plane};

use super::planes::{PlaneLayout, PlaneSet};

/// Staging buffers that bring converted planes back to the host.
///
/// Each plane gets its own `MAP_READ` buffer with rows padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`; [`PlaneReadback::read_into`] strips the
/// padding.
pub struct PlaneReadback {
    layout: PlaneLayout,
    staging: [StagingPlane; 3],
}

struct StagingPlane {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

impl Drop for PlaneReadback {
    fn drop(&mut self) {
        for s in &self.staging {
            s.buffer.destroy();
        }
    }
}

impl PlaneReadback {
    pub fn new(gpu: &Gpu, layout: PlaneLayout) -> Self {
        let staging = Plane::ALL.map(|plane| {
            let (width, height) = layout.plane_size(plane);
            let padded_bytes_per_row = padded_bytes_per_row(width);
            let buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("rtv plane readback"),
                size: padded_bytes_per_row as u64 * height as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            StagingPlane {
                buffer,
                width,
                height,
                padded_bytes_per_row,
            }
        });

        Self { layout, staging }
    }

    /// Records copies of Y (mip 0) and U/V (mip 1) into the staging buffers.
    pub fn encode_copies(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        converter: &ColorSpaceConverter,
    ) -> CaptureResult<()> {
        if converter.size() != Some((self.layout.width, self.layout.height)) {
            return Err(CaptureError::Readback(format!(
                "converter size {:?} does not match readback {}x{}",
                converter.size(),
                self.layout.width,
                self.layout.height
            )));
        }

        for plane in Plane::ALL {
            let Some(texture) = converter.plane_texture(plane) else {
                return Err(CaptureError::Readback("converter is not initialized".into()));
            };
            let s = &self.staging[plane.index()];
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: plane.readback_mip(),
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &s.buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(s.padded_bytes_per_row),
                        rows_per_image: Some(s.height),
                    },
                },
                wgpu::Extent3d {
                    width: s.width,
                    height: s.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    /// Maps the staging buffers, blocking until the GPU has finished the
    /// submitted copies, and unpads them into `out`.
    pub fn read_into(&self, gpu: &Gpu, out: &mut PlaneSet) -> CaptureResult<()> {
        if out.layout() != self.layout {
            return Err(CaptureError::Readback(format!(
                "plane set layout {:?} does not match readback {:?}",
                out.layout(),
                self.layout
            )));
        }

        let (tx, rx) = std::sync::mpsc::channel();
        for plane in Plane::ALL {
            let tx = tx.clone();
            self.staging[plane.index()]
                .buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |res| {
                    let _ = tx.send((plane, res));
                });
        }
        drop(tx);

        gpu.device()
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| CaptureError::Readback(format!("wgpu poll failed: {e:?}")))?;

        let mut mapped = [false; 3];
        let mut failure = None;
        for (plane, res) in rx.try_iter() {
            match res {
                Ok(()) => mapped[plane.index()] = true,
                Err(e) => {
                    failure.get_or_insert(CaptureError::Readback(format!(
                        "mapping plane {plane:?} failed: {e:?}"
                    )));
                }
            }
        }
        if failure.is_none() && mapped.contains(&false) {
            failure = Some(CaptureError::Readback("map callback never fired".into()));
        }

        for plane in Plane::ALL {
            let s = &self.staging[plane.index()];
            if !mapped[plane.index()] {
                continue;
            }
            if failure.is_none() {
                let view = s.buffer.slice(..).get_mapped_range();
                unpad_rows(
                    &view,
                    s.padded_bytes_per_row as usize,
                    s.width as usize,
                    out.plane_mut(plane),
                );
            }
            s.buffer.unmap();
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Row pitch for a one-byte-per-texel row of `width` texels.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    width.div_ceil(align) * align
}

/// Copies the first `row_bytes` of each `padded_row` stride of `src` into the
/// tightly packed `dst`.
pub fn unpad_rows(src: &[u8], padded_row: usize, row_bytes: usize, dst: &mut [u8]) {
    if row_bytes == 0 {
        return;
    }
    for (row, out) in dst.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * padded_row;
        out.copy_from_slice(&src[start..start + row_bytes]);
    }
}
