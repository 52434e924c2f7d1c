//! # Shaders — Program Specs, Variants, and Uniform Layout
//!
//! A [`ProgramSpec`] is everything the GPU backend needs to build one render
//! pipeline: WGSL source, vertex format, declared uniforms, texture slot
//! count, output formats, blend and depth behavior.
//!
//! ## Variants
//!
//! The geometry shader adapts to what a mesh actually carries (texture
//! coordinates, tangents, flat shading) and the lighting shader bakes in the
//! light array capacities. Both are handled the same way: the builder
//! prepends a block of WGSL `const` declarations to a shared source file and
//! lets the compiler specialize. One source, many programs.
//!
//! ## Uniform Layout
//!
//! Name-keyed parameters are backed by one uniform block per program.
//! [`UniformLayout`] assigns each declared parameter an offset using WGSL's
//! uniform-address-space rules, so a struct declared member-for-member in
//! the shader lines up byte-for-byte with what the backend writes:
//!
//! | Kind             | Align | Size |
//! |------------------|-------|------|
//! | Float, Int, Uint | 4     | 4    |
//! | Vec2             | 8     | 8    |
//! | Vec3             | 16    | 12   |
//! | Vec4             | 16    | 16   |
//! | Mat3             | 16    | 48   |
//! | Mat4             | 16    | 64   |
//!
//! Total size rounds up to 16.

use crate::command::UniformKind;
use crate::drawable::VertexAttributes;
use crate::light::LightCapacity;
use crate::target::{AttachmentFormat, TargetSpec};

const GEOMETRY_WGSL: &str = include_str!("shaders/geometry.wgsl");
const LIGHTING_WGSL: &str = include_str!("shaders/lighting.wgsl");
const POST_PROCESS_WGSL: &str = include_str!("shaders/postprocess.wgsl");

/// Vertex format a program consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// Scene mesh format ([`MeshVertex`](crate::vertex::MeshVertex)).
    Mesh,
    /// Fullscreen quad format ([`QuadVertex`](crate::vertex::QuadVertex)).
    Quad,
}

impl VertexKind {
    pub(crate) fn layout(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            VertexKind::Mesh => crate::vertex::MeshVertex::LAYOUT,
            VertexKind::Quad => crate::vertex::QuadVertex::LAYOUT,
        }
    }
}

/// How a program's output blends into its color targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite. Geometry and post-process passes.
    Replace,
    /// Sum into the existing contents. HDR light accumulation.
    Additive,
}

/// How a program's pass uses the depth/stencil surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// Test against and write depth. The geometry pass.
    TestWrite,
    /// Surface attached but untouched: no write, compare always passes.
    /// Lets the lighting pass run over a target whose depth the geometry
    /// pass owns.
    ReadOnly,
    /// No depth/stencil surface attached.
    Disabled,
}

/// Complete description of one shader program.
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    pub label: String,
    /// WGSL source, variant consts already prepended.
    pub source: String,
    pub vertex: VertexKind,
    /// Declared name-keyed parameters, in uniform block order.
    pub uniforms: Vec<(&'static str, UniformKind)>,
    /// Number of texture inputs (group 1, bindings `0..texture_slots`,
    /// sampler at binding `texture_slots`).
    pub texture_slots: u32,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub blend: BlendMode,
    pub depth: DepthMode,
    pub cull_back: bool,
    /// Whether the program binds the light buffer (group 2).
    pub uses_lights: bool,
}

/// Build the geometry-pass program variant for one attribute set.
///
/// Meshes without texture coordinates shade from material factors alone;
/// normal mapping needs both texcoords and tangents; flat shading derives
/// the normal from screen-space derivatives instead of the vertex stream.
///
/// Every attribute flag selects a distinct variant, including joints,
/// morph targets, and vertex colors; the mesh vertex format carries no
/// streams for those three yet, so their consts gate nothing in the shared
/// source today.
pub fn geometry_program(attributes: &VertexAttributes, flat_shading: bool) -> ProgramSpec {
    let consts = format!(
        "const HAS_TEXCOORD: bool = {};\n\
         const HAS_NORMAL: bool = {};\n\
         const HAS_TANGENT: bool = {};\n\
         const HAS_JOINTS: bool = {};\n\
         const HAS_MORPH_TARGETS: bool = {};\n\
         const HAS_COLOR: bool = {};\n\
         const FLAT_SHADING: bool = {};\n\n",
        attributes.texcoord,
        attributes.normal,
        attributes.tangent,
        attributes.joints,
        attributes.morph_targets,
        attributes.color,
        flat_shading,
    );

    let gbuffer = TargetSpec::gbuffer(1, 1);
    ProgramSpec {
        label: format!(
            "geometry uv={} n={} t={} j={} m={} c={} flat={}",
            attributes.texcoord,
            attributes.normal,
            attributes.tangent,
            attributes.joints,
            attributes.morph_targets,
            attributes.color,
            flat_shading
        ),
        source: consts + GEOMETRY_WGSL,
        vertex: VertexKind::Mesh,
        uniforms: vec![
            ("world", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
            ("proj", UniformKind::Mat4),
            ("normal_matrix", UniformKind::Mat3),
            ("base_color_factor", UniformKind::Vec4),
            ("metallic_factor", UniformKind::Float),
            ("roughness_factor", UniformKind::Float),
            ("occlusion_strength", UniformKind::Float),
            ("normal_scale", UniformKind::Float),
        ],
        texture_slots: 4,
        // The geometry pass writes slots 0..=3; HDR is not among its outputs.
        color_formats: gbuffer.color[..4]
            .iter()
            .map(|a| a.format.texture_format())
            .collect(),
        blend: BlendMode::Replace,
        depth: DepthMode::TestWrite,
        cull_back: true,
        uses_lights: false,
    }
}

/// Build the lighting-pass program for the given light array capacities.
/// The capacities become WGSL array sizes, so the shader and the backend's
/// light buffer agree by construction.
pub fn lighting_program(capacity: &LightCapacity) -> ProgramSpec {
    let consts = format!(
        "const MAX_POINT_LIGHTS: u32 = {}u;\n\
         const MAX_SPOT_LIGHTS: u32 = {}u;\n\
         const MAX_DIRECTIONAL_LIGHTS: u32 = {}u;\n\n",
        capacity.point, capacity.spot, capacity.directional,
    );

    ProgramSpec {
        label: "deferred lighting".to_owned(),
        source: consts + LIGHTING_WGSL,
        vertex: VertexKind::Quad,
        uniforms: vec![
            ("resolution", UniformKind::Vec2),
            ("point_light_count", UniformKind::Uint),
            ("spot_light_count", UniformKind::Uint),
            ("directional_light_count", UniformKind::Uint),
        ],
        texture_slots: 4,
        color_formats: vec![AttachmentFormat::Rgb16f.texture_format()],
        blend: BlendMode::Additive,
        depth: DepthMode::ReadOnly,
        cull_back: false,
        uses_lights: true,
    }
}

/// Build the post-process (tone mapping) program targeting the backbuffer.
pub fn post_process_program(backbuffer_format: wgpu::TextureFormat) -> ProgramSpec {
    ProgramSpec {
        label: "post-process".to_owned(),
        source: POST_PROCESS_WGSL.to_owned(),
        vertex: VertexKind::Quad,
        uniforms: vec![("exposure", UniformKind::Float)],
        texture_slots: 1,
        color_formats: vec![backbuffer_format],
        blend: BlendMode::Replace,
        depth: DepthMode::Disabled,
        cull_back: false,
        uses_lights: false,
    }
}

fn kind_layout(kind: UniformKind) -> (u32, u32) {
    match kind {
        UniformKind::Float | UniformKind::Int | UniformKind::Uint => (4, 4),
        UniformKind::Vec2 => (8, 8),
        UniformKind::Vec3 => (16, 12),
        UniformKind::Vec4 => (16, 16),
        UniformKind::Mat3 => (16, 48),
        UniformKind::Mat4 => (16, 64),
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    value.next_multiple_of(align)
}

/// Byte layout of one program's uniform block, derived from its declared
/// parameters. Matches a WGSL struct with the same members in the same
/// order.
#[derive(Debug, Clone)]
pub struct UniformLayout {
    fields: Vec<(String, UniformKind, u32)>,
    size: u32,
}

impl UniformLayout {
    pub fn new(declarations: &[(&str, UniformKind)]) -> Self {
        let mut fields = Vec::with_capacity(declarations.len());
        let mut cursor = 0u32;
        for &(name, kind) in declarations {
            let (align, size) = kind_layout(kind);
            let offset = align_up(cursor, align);
            fields.push((name.to_owned(), kind, offset));
            cursor = offset + size;
        }
        Self {
            fields,
            size: align_up(cursor, 16),
        }
    }

    /// Total block size in bytes (multiple of 16).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Declared kind and byte offset of a named parameter.
    pub fn field(&self, name: &str) -> Option<(UniformKind, u32)> {
        self.fields
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|&(_, kind, offset)| (kind, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_uniform_block_matches_the_shader_struct() {
        let spec = geometry_program(&VertexAttributes::default(), false);
        let layout = UniformLayout::new(&spec.uniforms);

        assert_eq!(layout.field("world"), Some((UniformKind::Mat4, 0)));
        assert_eq!(layout.field("view"), Some((UniformKind::Mat4, 64)));
        assert_eq!(layout.field("proj"), Some((UniformKind::Mat4, 128)));
        assert_eq!(layout.field("normal_matrix"), Some((UniformKind::Mat3, 192)));
        assert_eq!(
            layout.field("base_color_factor"),
            Some((UniformKind::Vec4, 240))
        );
        assert_eq!(
            layout.field("metallic_factor"),
            Some((UniformKind::Float, 256))
        );
        assert_eq!(
            layout.field("roughness_factor"),
            Some((UniformKind::Float, 260))
        );
        assert_eq!(
            layout.field("occlusion_strength"),
            Some((UniformKind::Float, 264))
        );
        assert_eq!(layout.field("normal_scale"), Some((UniformKind::Float, 268)));
        assert_eq!(layout.size(), 272);
    }

    #[test]
    fn lighting_uniform_block_matches_the_shader_struct() {
        let spec = lighting_program(&LightCapacity::default());
        let layout = UniformLayout::new(&spec.uniforms);

        assert_eq!(layout.field("resolution"), Some((UniformKind::Vec2, 0)));
        assert_eq!(
            layout.field("point_light_count"),
            Some((UniformKind::Uint, 8))
        );
        assert_eq!(
            layout.field("spot_light_count"),
            Some((UniformKind::Uint, 12))
        );
        assert_eq!(
            layout.field("directional_light_count"),
            Some((UniformKind::Uint, 16))
        );
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn vec3_packs_before_a_float_but_not_after() {
        let layout = UniformLayout::new(&[
            ("a", UniformKind::Vec3),
            ("b", UniformKind::Float),
            ("c", UniformKind::Vec3),
        ]);
        // b fits into a's alignment padding; c starts a fresh 16-byte row.
        assert_eq!(layout.field("a"), Some((UniformKind::Vec3, 0)));
        assert_eq!(layout.field("b"), Some((UniformKind::Float, 12)));
        assert_eq!(layout.field("c"), Some((UniformKind::Vec3, 16)));
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn unknown_field_is_none() {
        let layout = UniformLayout::new(&[("exposure", UniformKind::Float)]);
        assert_eq!(layout.field("esposure"), None);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn geometry_variants_differ_only_in_consts() {
        let with_uv = geometry_program(
            &VertexAttributes {
                texcoord: true,
                normal: true,
                ..Default::default()
            },
            false,
        );
        let without_uv = geometry_program(
            &VertexAttributes {
                texcoord: false,
                normal: true,
                ..Default::default()
            },
            false,
        );
        assert!(with_uv.source.contains("const HAS_TEXCOORD: bool = true;"));
        assert!(without_uv.source.contains("const HAS_TEXCOORD: bool = false;"));
        assert_eq!(with_uv.uniforms, without_uv.uniforms);
        assert_eq!(with_uv.color_formats, without_uv.color_formats);
    }

    #[test]
    fn every_attribute_flag_selects_a_distinct_variant() {
        let skinned = geometry_program(
            &VertexAttributes {
                joints: true,
                morph_targets: true,
                color: true,
                ..Default::default()
            },
            false,
        );
        let bare = geometry_program(&VertexAttributes::default(), false);
        assert!(skinned.source.contains("const HAS_JOINTS: bool = true;"));
        assert!(
            skinned
                .source
                .contains("const HAS_MORPH_TARGETS: bool = true;")
        );
        assert!(skinned.source.contains("const HAS_COLOR: bool = true;"));
        assert!(bare.source.contains("const HAS_JOINTS: bool = false;"));
        assert_ne!(skinned.source, bare.source);
        assert_ne!(skinned.label, bare.label);
    }

    #[test]
    fn all_program_sources_parse() {
        let specs = [
            geometry_program(
                &VertexAttributes {
                    texcoord: true,
                    normal: true,
                    tangent: true,
                    ..Default::default()
                },
                false,
            ),
            geometry_program(&VertexAttributes::default(), true),
            lighting_program(&LightCapacity::default()),
            post_process_program(wgpu::TextureFormat::Rgba8Unorm),
        ];
        for spec in specs {
            wgpu::naga::front::wgsl::parse_str(&spec.source)
                .unwrap_or_else(|e| panic!("{}: {e:?}", spec.label));
        }
    }

    /// The light arrays are read as `var<uniform>`, so the WGSL strides have
    /// to land exactly on the CPU block sizes or every light past the first
    /// is read from the wrong bytes. A `vec3` pad would silently stretch a
    /// struct to the next 16-byte boundary.
    #[test]
    fn wgsl_light_structs_match_cpu_block_sizes() {
        use crate::light::{GpuDirectionalLight, GpuPointLight, GpuSpotLight};

        let spec = lighting_program(&LightCapacity::default());
        let module =
            wgpu::naga::front::wgsl::parse_str(&spec.source).expect("lighting source parses");
        let mut layouter = wgpu::naga::proc::Layouter::default();
        layouter.update(module.to_ctx()).expect("layout resolves");

        let expected = [
            ("PointLight", std::mem::size_of::<GpuPointLight>() as u32),
            ("SpotLight", std::mem::size_of::<GpuSpotLight>() as u32),
            (
                "DirectionalLight",
                std::mem::size_of::<GpuDirectionalLight>() as u32,
            ),
        ];
        for (name, cpu_size) in expected {
            let (handle, _) = module
                .types
                .iter()
                .find(|(_, ty)| ty.name.as_deref() == Some(name))
                .unwrap_or_else(|| panic!("{name} not declared in the lighting shader"));
            assert_eq!(layouter[handle].size, cpu_size, "{name} stride");
        }
    }

    #[test]
    fn lighting_capacity_becomes_array_sizes() {
        let spec = lighting_program(&LightCapacity {
            point: 16,
            spot: 8,
            directional: 4,
        });
        assert!(spec.source.contains("const MAX_POINT_LIGHTS: u32 = 16u;"));
        assert!(spec.source.contains("const MAX_SPOT_LIGHTS: u32 = 8u;"));
        assert!(spec.source.contains("const MAX_DIRECTIONAL_LIGHTS: u32 = 4u;"));
        assert!(spec.uses_lights);
        assert_eq!(spec.blend, BlendMode::Additive);
        assert_eq!(spec.depth, DepthMode::ReadOnly);
    }
}
