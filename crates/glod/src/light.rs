//! # Light — Scene Light Records and GPU Light Blocks
//!
//! Two representations of the same lights, kept deliberately separate:
//!
//! - **Scene records** ([`PointLight`], [`SpotLight`], [`DirectionalLight`])
//!   hold the fields a person wants to tweak: cutoff angles in degrees,
//!   near/far planes, shadow bias. They reference an external entity by
//!   index for position and orientation — a weak reference, never ownership.
//! - **GPU blocks** ([`GpuPointLight`], [`GpuSpotLight`],
//!   [`GpuDirectionalLight`]) hold exactly what the shading stage reads,
//!   plus padding to land every instance on a 16-byte boundary.
//!
//! ## Memory Layout Contract
//!
//! The shading stage indexes each light array by `index * size_of::<T>()`,
//! so the byte size of every block must be an exact multiple of 16 and the
//! array stride must equal the struct size with no gaps. This is a binary
//! compatibility contract with the shader, not a style choice; the
//! `const` assertions below fail the build if it drifts.
//!
//! ```text
//! GpuPointLight (48 bytes)            GpuSpotLight (64 bytes)
//! ┌────────────────┬───────────┐      ┌────────────────┬──────────────┐
//! │ color          │ range     │      │ color          │ range        │
//! │ position_vs    │ intensity │      │ position_vs    │ angle_scale  │
//! │ depth_scale, depth_offset, │      │ direction_vs   │ angle_offset │
//! │ shadow_bias,   pad         │      │ intensity, pad, pad, pad      │
//! └────────────────┴───────────┘      └────────────────┴──────────────┘
//!
//! GpuDirectionalLight (32 bytes)
//! ┌────────────────┬────────────────┐
//! │ color          │ intensity      │
//! │ direction_vs   │ max_slope_bias │
//! └────────────────┴────────────────┘
//! ```

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Guard against division blow-up when a spot light's inner and outer
/// cutoff angles coincide.
pub const ANGLE_EPSILON: f32 = 0.0001;

/// A point light in the scene. Position comes from the referenced entity's
/// transform at packing time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Influence radius; the shader attenuates to zero at this distance.
    pub range: f32,
    /// Near plane of the light's depth map projection.
    pub depth_near: f32,
    /// Far plane of the light's depth map projection.
    pub depth_far: f32,
    pub shadow_bias: f32,
    /// Index of the entity whose transform supplies the position.
    pub entity: usize,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            depth_near: 0.001,
            depth_far: 50.0,
            shadow_bias: 0.001,
            entity: 0,
        }
    }
}

/// A spot light in the scene. Position and direction come from the
/// referenced entity's transform; cutoff angles are authored in degrees
/// and converted to the shader's scale/offset form at packing time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub inner_cutoff_degrees: f32,
    pub outer_cutoff_degrees: f32,
    pub entity: usize,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            inner_cutoff_degrees: 0.0,
            outer_cutoff_degrees: 45.0,
            entity: 0,
        }
    }
}

/// A directional light in the scene. Direction comes from the referenced
/// entity's transform (its forward axis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Cap on slope-scaled shadow bias.
    pub max_slope_bias: f32,
    pub entity: usize,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            max_slope_bias: 0.01,
            entity: 0,
        }
    }
}

/// Point light block as the shading stage reads it. 48 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub color: [f32; 3],       // 12 bytes
    pub range: f32,            // 4 bytes → 16
    pub position_vs: [f32; 3], // 12 bytes
    pub intensity: f32,        // 4 bytes → 32
    pub depth_scale: f32,      // 4 bytes
    pub depth_offset: f32,     // 4 bytes
    pub shadow_bias: f32,      // 4 bytes
    pub _pad: f32,             // 4 bytes → 48
}

impl GpuPointLight {
    /// Build a block from an already view-space position. `depth_scale` and
    /// `depth_offset` are the projection normalization terms of the light's
    /// depth map: `(far+near)/(far-near)` and `-(2*far*near)/(far-near)`.
    pub fn new(
        color: Vec3,
        position_vs: Vec3,
        range: f32,
        intensity: f32,
        depth_near: f32,
        depth_far: f32,
        shadow_bias: f32,
    ) -> Self {
        Self {
            color: color.to_array(),
            range,
            position_vs: position_vs.to_array(),
            intensity,
            depth_scale: (depth_far + depth_near) / (depth_far - depth_near),
            depth_offset: -(2.0 * depth_far * depth_near) / (depth_far - depth_near),
            shadow_bias,
            _pad: 0.0,
        }
    }
}

/// Spot light block as the shading stage reads it. 64 bytes.
///
/// The cutoff cone is stored as `angle_scale`/`angle_offset` so the shader
/// evaluates attenuation with a single fused multiply-add; see the glTF
/// `KHR_lights_punctual` extension for the derivation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSpotLight {
    pub color: [f32; 3],        // 12 bytes
    pub range: f32,             // 4 bytes → 16
    pub position_vs: [f32; 3],  // 12 bytes
    pub angle_scale: f32,       // 4 bytes → 32
    pub direction_vs: [f32; 3], // 12 bytes
    pub angle_offset: f32,      // 4 bytes → 48
    pub intensity: f32,         // 4 bytes
    pub _pad: [f32; 3],         // 12 bytes → 64
}

impl GpuSpotLight {
    /// Build a block from view-space position and direction. The direction
    /// is re-normalized here so repeated transforms can't accumulate drift
    /// into a non-unit vector.
    pub fn new(
        color: Vec3,
        position_vs: Vec3,
        direction_vs: Vec3,
        range: f32,
        inner_cutoff_degrees: f32,
        outer_cutoff_degrees: f32,
        intensity: f32,
    ) -> Self {
        let cos_inner = inner_cutoff_degrees.to_radians().cos();
        let cos_outer = outer_cutoff_degrees.to_radians().cos();
        let angle_scale = 1.0 / (cos_inner - cos_outer).max(ANGLE_EPSILON);
        Self {
            color: color.to_array(),
            range,
            position_vs: position_vs.to_array(),
            angle_scale,
            direction_vs: direction_vs.normalize().to_array(),
            angle_offset: -cos_outer * angle_scale,
            intensity,
            _pad: [0.0; 3],
        }
    }
}

/// Directional light block as the shading stage reads it. 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDirectionalLight {
    pub color: [f32; 3],        // 12 bytes
    pub intensity: f32,         // 4 bytes → 16
    pub direction_vs: [f32; 3], // 12 bytes
    pub max_slope_bias: f32,    // 4 bytes → 32
}

impl GpuDirectionalLight {
    /// Build a block from a view-space direction, re-normalized here.
    pub fn new(color: Vec3, direction_vs: Vec3, intensity: f32, max_slope_bias: f32) -> Self {
        Self {
            color: color.to_array(),
            intensity,
            direction_vs: direction_vs.normalize().to_array(),
            max_slope_bias,
        }
    }
}

// Stride contract with the shading stage: exact sizes, multiples of 16.
const _: () = assert!(std::mem::size_of::<GpuPointLight>() == 48);
const _: () = assert!(std::mem::size_of::<GpuSpotLight>() == 64);
const _: () = assert!(std::mem::size_of::<GpuDirectionalLight>() == 32);
const _: () = assert!(std::mem::size_of::<GpuPointLight>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<GpuSpotLight>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<GpuDirectionalLight>() % 16 == 0);

/// Fixed GPU-side light array capacities.
///
/// Passed in at pipeline and device construction rather than living as
/// process-wide constants; the same values size the shader-side arrays and
/// the backend's light buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightCapacity {
    pub point: usize,
    pub spot: usize,
    pub directional: usize,
}

impl Default for LightCapacity {
    fn default() -> Self {
        Self {
            point: 16,
            spot: 8,
            directional: 4,
        }
    }
}

impl LightCapacity {
    /// Byte size of the light buffer holding all three arrays back to back.
    pub fn buffer_size(&self) -> u64 {
        (self.point * std::mem::size_of::<GpuPointLight>()
            + self.spot * std::mem::size_of::<GpuSpotLight>()
            + self.directional * std::mem::size_of::<GpuDirectionalLight>()) as u64
    }

    /// Byte offset of the spot array within the light buffer.
    pub fn spot_offset(&self) -> u64 {
        (self.point * std::mem::size_of::<GpuPointLight>()) as u64
    }

    /// Byte offset of the directional array within the light buffer.
    pub fn directional_offset(&self) -> u64 {
        self.spot_offset() + (self.spot * std::mem::size_of::<GpuSpotLight>()) as u64
    }
}

/// The packed output of one frame's light data: three ordered arrays, ready
/// to copy into the fixed-capacity light buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightBlocks {
    pub point: Vec<GpuPointLight>,
    pub spot: Vec<GpuSpotLight>,
    pub directional: Vec<GpuDirectionalLight>,
}
