//! Convenience re-exports for typical use.

pub use crate::command::{
    Command, DepthAccess, DeviceResources, GeometryData, GeometryDraw, GeometryId, PassDesc,
    PassOutput, ProgramId, TargetId, TextureId, UniformKind, UniformValue,
};
pub use crate::drawable::{Drawable, Material, VertexAttributes};
pub use crate::error::{CapacityError, LightKind, LinkError, SetupError};
pub use crate::frame::{FrameRecorder, Phase};
pub use crate::gpu::GpuDevice;
pub use crate::light::{
    DirectionalLight, GpuDirectionalLight, GpuPointLight, GpuSpotLight, LightBlocks,
    LightCapacity, PointLight, SpotLight,
};
pub use crate::pipeline::{DeferredPipeline, FrameInput, PipelinePrograms};
pub use crate::shaders::{geometry_program, lighting_program, post_process_program};
pub use crate::target::{AttachmentFormat, ColorAttachmentSpec, FilterMode, TargetSpec, gbuffer};
