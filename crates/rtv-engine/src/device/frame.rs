/// A single acquired preview frame.
///
/// This object is short-lived and must be presented promptly. Holding the surface
/// texture prevents acquisition of subsequent frames.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl GpuFrame {
    /// Presents the frame. Commands drawing into `view` must already be submitted.
    pub fn present(self) {
        drop(self.view);
        self.surface_texture.present();
    }
}
