//! # Glod — Deferred Rendering Pipeline Core
//!
//! A wgpu-based deferred renderer core: multi-attachment render targets,
//! fixed-layout GPU light packing, and a three-phase pass orchestrator
//! (geometry, lighting, post-process).
//!
//! A frame is recorded as a plain command stream by
//! [`DeferredPipeline`](pipeline::DeferredPipeline) and executed by
//! [`GpuDevice`](gpu::GpuDevice); everything up to execution is pure data
//! and testable without a GPU. Start with `use glod::prelude::*`.

pub mod command;
pub mod drawable;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod light;
pub mod pack;
pub mod pipeline;
pub mod prelude;
pub mod shaders;
pub mod target;
pub mod vertex;
