/// Destination for the on-screen preview blit (a window surface view).
pub struct PreviewView<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl<'a> PreviewView<'a> {
    #[inline]
    pub fn new(view: &'a wgpu::TextureView, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            view,
            format,
            width,
            height,
        }
    }
}
