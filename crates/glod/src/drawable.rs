//! Scene-side inputs to the geometry pass: what to draw and with what
//! surface parameters.
//!
//! The orchestrator never inspects raw vertex data. Everything it needs to
//! know about a mesh's contents arrives as [`VertexAttributes`] presence
//! flags supplied by the mesh/material loader, and shader-variant selection
//! and conditional texture bindings are derived from those flags alone.

use glam::{Mat4, Vec4};

use crate::command::{GeometryDraw, GeometryId, ProgramId, TextureId};

/// Which vertex data streams a mesh actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexAttributes {
    pub texcoord: bool,
    pub normal: bool,
    pub tangent: bool,
    pub joints: bool,
    pub morph_targets: bool,
    pub color: bool,
}

/// Metallic-roughness material factors plus optional textures, in the glTF
/// 2.0 shape. Texture-dependent bindings are only pushed when the mesh has
/// texture coordinates; without them the factors alone drive shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub occlusion_strength: f32,
    /// Scales sampled normal-map perturbation; only meaningful when the
    /// mesh carries tangents.
    pub normal_scale: f32,
    pub base_color_texture: Option<TextureId>,
    pub metallic_roughness_texture: Option<TextureId>,
    pub normal_texture: Option<TextureId>,
    pub occlusion_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            occlusion_strength: 1.0,
            normal_scale: 1.0,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
        }
    }
}

/// One thing the geometry pass draws: uploaded geometry, the program
/// variant compiled for its attribute set, material parameters, and a
/// world transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub geometry: GeometryId,
    /// Indexed when the mesh owns an index buffer, non-indexed otherwise.
    pub draw: GeometryDraw,
    pub program: ProgramId,
    pub material: Material,
    pub attributes: VertexAttributes,
    pub flat_shading: bool,
    pub world: Mat4,
}
