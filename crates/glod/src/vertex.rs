//! Vertex formats used by the pipeline's two kinds of geometry.
//!
//! ```text
//! MeshVertex (32 bytes)                      QuadVertex (16 bytes)
//! ┌──────────┬──────────┬──────────┐         ┌──────────┬──────────┐
//! │ position │ normal   │ uv       │         │ position │ uv       │
//! │ [f32; 3] │ [f32; 3] │ [f32; 2] │         │ [f32; 2] │ [f32; 2] │
//! │ offset 0 │ offset 12│ offset 24│         │ offset 0 │ offset 8 │
//! └──────────┴──────────┴──────────┘         └──────────┴──────────┘
//! ```
//!
//! [`MeshVertex`] is what scene drawables upload. [`QuadVertex`] is the
//! fullscreen-quad format used by the lighting and post-process passes.

use bytemuck::{Pod, Zeroable};

/// Per-vertex data for scene meshes: position, surface normal, texture UV.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position: vec3<f32>
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal: vec3<f32>
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv: vec2<f32>
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

/// Per-vertex data for screen-space quads: clip-space position and UV.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position: vec2<f32>
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // uv: vec2<f32>
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

/// The long-lived fullscreen quad: four corners, six indices, created once
/// at pipeline setup and reused by every lighting and post-process pass.
pub fn fullscreen_quad() -> (Vec<QuadVertex>, Vec<u32>) {
    let vertices = vec![
        QuadVertex { position: [-1.0, -1.0], uv: [0.0, 0.0] },
        QuadVertex { position: [1.0, -1.0], uv: [1.0, 0.0] },
        QuadVertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
        QuadVertex { position: [-1.0, 1.0], uv: [0.0, 1.0] },
    ];
    let indices = vec![0, 1, 2, 2, 3, 0];
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_vertex_stride_is_32() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
    }

    #[test]
    fn quad_vertex_stride_is_16() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn fullscreen_quad_has_two_triangles() {
        let (verts, idxs) = fullscreen_quad();
        assert_eq!(verts.len(), 4);
        assert_eq!(idxs.len(), 6);
        for &i in &idxs {
            assert!((i as usize) < verts.len(), "index {i} out of range");
        }
    }
}
