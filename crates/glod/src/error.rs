//! Error taxonomy for pipeline construction and frame recording.
//!
//! There are only three failure classes in this core, and none of them are
//! retryable: every GPU operation is a one-shot command.
//!
//! - [`SetupError`] — invalid render target configuration. Fatal; aborts
//!   pipeline construction.
//! - [`LinkError`] — a shader program failed validation. Reported and
//!   surfaced to the caller at build time; a pipeline is never left holding
//!   a silently-broken program.
//! - [`CapacityError`] — a scene exceeded the fixed GPU light array
//!   capacity. Surfaced when the frame is recorded, before anything is
//!   packed, so the fixed-size buffers can never be overrun.

use thiserror::Error;

/// Invalid render target configuration. Construction-time, fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// A render target must own at least one color attachment.
    #[error("render target needs at least one color attachment")]
    NoColorAttachments,

    /// All attachments share one size, and that size must be non-zero.
    #[error("render target dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },
}

/// A shader program failed to compile or validate.
#[derive(Debug, Clone, Error)]
#[error("program '{label}' failed to build: {message}")]
pub struct LinkError {
    /// Debug label of the offending program.
    pub label: String,
    /// Validation message from the device.
    pub message: String,
}

/// Which of the three light arrays overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Spot,
    Directional,
}

impl std::fmt::Display for LightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightKind::Point => write!(f, "point"),
            LightKind::Spot => write!(f, "spot"),
            LightKind::Directional => write!(f, "directional"),
        }
    }
}

/// A scene asked for more lights of one kind than the GPU-side array holds.
///
/// The shading stage indexes fixed-capacity arrays, so this is a contract
/// violation by the caller, not something the pipeline can absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} light count {count} exceeds configured capacity {capacity}")]
pub struct CapacityError {
    pub kind: LightKind,
    pub count: usize,
    pub capacity: usize,
}
