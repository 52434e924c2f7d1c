//! # Command — The Device Command Vocabulary
//!
//! Every device operation the pipeline can issue in a frame, as plain data.
//! A frame is recorded as an ordered `Vec<Command>` and handed to the wgpu
//! backend ([`GpuDevice`](crate::gpu::GpuDevice)) for execution; the command
//! stream is strictly ordered, so "recorded before" means "executed before".
//!
//! Recording instead of issuing directly buys two things:
//!
//! - The pass-ordering invariants of the deferred pipeline become assertions
//!   over a value, testable without a GPU.
//! - The GL-flavored contract the pipeline wants (bind target, set named
//!   uniform, draw) maps onto wgpu's pass/bind-group model in exactly one
//!   place, the executor.
//!
//! Resources are referred to by handle ([`TargetId`], [`GeometryId`],
//! [`ProgramId`], [`TextureId`]); the backend owns the actual GPU objects.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::error::SetupError;
use crate::light::LightBlocks;
use crate::target::TargetSpec;
use crate::vertex::{MeshVertex, QuadVertex};

/// Handle to a render target owned by the device backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

/// Handle to uploaded geometry (vertex + optional index buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub(crate) usize);

/// Handle to a built shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) usize);

/// Handle to an uploaded material texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// A value for a name-keyed program parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

/// The declared type of a program parameter, used to lay out the program's
/// uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformValue {
    /// The declared kind this value satisfies.
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Uint(_) => UniformKind::Uint,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// Where a pass writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutput {
    /// The on-screen (or offscreen stand-in) presentation target.
    Backbuffer { width: u32, height: u32 },
    /// A subset of one render target's color attachments, in slot order:
    /// `slots[i]` becomes the pass's output location `i`.
    Attachments { target: TargetId, slots: Vec<usize> },
}

/// How a pass uses the target's depth/stencil surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthAccess {
    /// Clear to the far plane, test, and write. The geometry pass.
    ClearWrite,
    /// Keep the surface attached read-only so earlier results stay usable.
    /// The lighting pass.
    Read,
    /// No depth/stencil surface. Backbuffer passes.
    Disabled,
}

/// Description of one render pass: output surfaces, clear behavior, depth
/// usage. The viewport is implied by the output's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    pub output: PassOutput,
    /// Clear color for every color attachment, or `None` to load existing
    /// contents.
    pub clear_color: Option<[f64; 4]>,
    pub depth: DepthAccess,
}

/// Draw shape of a geometry: meshes that own an index buffer draw indexed,
/// the rest draw their vertices directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryDraw {
    Indexed(u32),
    NonIndexed(u32),
}

/// One device operation, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Make a pass's outputs active and set the viewport to their size.
    BeginPass(PassDesc),
    EndPass,
    /// Activate a program for subsequent draws.
    SetProgram(ProgramId),
    /// Set a name-keyed parameter on the active program. Values persist on
    /// the program across draws until overwritten.
    SetUniform { name: String, value: UniformValue },
    /// Bind a render target's color attachment as texture input `slot`.
    BindAttachment {
        slot: u32,
        target: TargetId,
        attachment: usize,
    },
    /// Bind a material texture as texture input `slot`.
    BindTexture { slot: u32, texture: TextureId },
    /// Copy packed light arrays into the device's light buffer.
    UploadLights(LightBlocks),
    /// Issue one draw with the active program and bindings.
    Draw {
        geometry: GeometryId,
        draw: GeometryDraw,
    },
}

/// CPU-side geometry data handed to the device for upload.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryData {
    /// Scene mesh geometry ([`MeshVertex`] layout).
    Mesh {
        vertices: Vec<MeshVertex>,
        indices: Option<Vec<u32>>,
    },
    /// Screen-space quad geometry ([`QuadVertex`] layout).
    Quad {
        vertices: Vec<QuadVertex>,
        indices: Option<Vec<u32>>,
    },
}

impl GeometryData {
    /// The draw shape this geometry implies: indexed when an index buffer
    /// exists, non-indexed otherwise.
    pub fn draw(&self) -> GeometryDraw {
        let (vertex_count, indices) = match self {
            GeometryData::Mesh { vertices, indices } => (vertices.len(), indices),
            GeometryData::Quad { vertices, indices } => (vertices.len(), indices),
        };
        match indices {
            Some(idx) => GeometryDraw::Indexed(idx.len() as u32),
            None => GeometryDraw::NonIndexed(vertex_count as u32),
        }
    }
}

/// The allocation seam between the pipeline and the device backend.
///
/// [`GpuDevice`](crate::gpu::GpuDevice) is the real implementation; tests
/// substitute a stub that hands out handles without touching a GPU.
pub trait DeviceResources {
    /// Validate a target spec and allocate its surfaces. Attachment order
    /// is preserved: spec index i is attachment slot i for the target's
    /// whole lifetime.
    fn create_target(&mut self, spec: &TargetSpec) -> Result<TargetId, SetupError>;

    /// Upload geometry and return a handle to it.
    fn create_geometry(&mut self, data: &GeometryData) -> GeometryId;
}
