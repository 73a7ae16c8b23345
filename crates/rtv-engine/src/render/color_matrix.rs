/// Homogeneous RGB -> YUV transform, column-major like the shader uniform.
///
/// `yuv = M * (r, g, b, 1)`; the last column is the bias.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorMatrix {
    cols: [[f32; 4]; 4],
}

impl ColorMatrix {
    /// Capture matrix. The Y blue weight (0.144) and the 0.0625/0.5/0.5 bias
    /// are kept as-is so output stays bit-compatible with earlier captures.
    pub const CAPTURE: Self = Self {
        cols: [
            [0.299, -0.14713, 0.615, 0.0],
            [0.587, -0.28886, -0.51499, 0.0],
            [0.144, 0.436, -0.10001, 0.0],
            [0.0625, 0.5, 0.5, 1.0],
        ],
    };

    #[inline]
    pub fn cols(&self) -> [[f32; 4]; 4] {
        self.cols
    }

    /// Applies the matrix to normalized RGB, returning unclamped normalized YUV.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let input = [rgb[0], rgb[1], rgb[2], 1.0];
        let mut out = [0.0f32; 3];
        for (row, o) in out.iter_mut().enumerate() {
            *o = self
                .cols
                .iter()
                .zip(input)
                .map(|(col, x)| col[row] * x)
                .sum();
        }
        out
    }

    /// 8-bit reference: what a Unorm render target stores for an 8-bit input.
    pub fn apply_unorm8(&self, rgb: [u8; 3]) -> [u8; 3] {
        let n = rgb.map(|c| c as f32 / 255.0);
        self.apply(n).map(unorm8)
    }
}

/// Unorm float -> byte conversion used by render targets.
#[inline]
pub fn unorm8(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}
