use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct MeshVertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // pos
        1 => Float32x3  // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const fn v(pos: [f32; 3], color: [f32; 3]) -> MeshVertex {
    MeshVertex { pos, color }
}

/// Cube of edge 2 centred on the origin (corners at ±1), one color per corner.
pub(crate) const CUBE_VERTICES: [MeshVertex; 8] = [
    v([-1.0, -1.0, -1.0], [0.58, 0.77, 0.01]),
    v([1.0, -1.0, -1.0], [0.61, 0.40, 0.82]),
    v([1.0, 1.0, -1.0], [0.97, 0.51, 0.16]),
    v([-1.0, 1.0, -1.0], [0.05, 0.62, 0.95]),
    v([-1.0, -1.0, 1.0], [0.83, 0.18, 0.30]),
    v([1.0, -1.0, 1.0], [0.20, 0.87, 0.47]),
    v([1.0, 1.0, 1.0], [0.99, 0.93, 0.25]),
    v([-1.0, 1.0, 1.0], [0.36, 0.21, 0.72]),
];

/// Twelve triangles, two per face.
pub(crate) const CUBE_INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2, // -Z
    4, 5, 6, 4, 6, 7, // +Z
    0, 4, 7, 0, 7, 3, // -X
    1, 2, 6, 1, 6, 5, // +X
    0, 1, 5, 0, 5, 4, // -Y
    3, 7, 6, 3, 6, 2, // +Y
];
