//! # Target — Off-Screen Render Target Descriptions
//!
//! A render target is a set of same-sized color surfaces plus one combined
//! depth/stencil surface that draw calls write into instead of the screen.
//! [`TargetSpec`] describes one; the GPU backend turns a validated spec into
//! textures and hands back a [`TargetId`](crate::command::TargetId).
//!
//! ## Fixed Layout
//!
//! The attachment order given at construction is the attachment order
//! forever: color surface `i` is output slot `i` in every pass that writes
//! the target, and input slot `i` in every pass that samples it back. There
//! is no attach/detach or in-place resize — a size change means destroying
//! the target and creating a new one. Partial mutation is exactly how you
//! end up with mismatched surface sizes, so the API simply doesn't offer it.
//!
//! ## G-Buffer Layout
//!
//! The deferred pipeline uses a five-attachment target:
//!
//! | Slot | Contents                       | Format  |
//! |------|--------------------------------|---------|
//! | 0    | base color                     | RGBA8   |
//! | 1    | metallic/roughness/occlusion   | RGB8    |
//! | 2    | view-space normal              | RGB8    |
//! | 3    | view-space position            | RGB16F  |
//! | 4    | HDR light accumulation         | RGB16F  |
//!
//! Slot 4 lives on the same target as the geometry outputs so the lighting
//! pass can keep the geometry pass's depth buffer attached instead of
//! recomputing depth.

use crate::error::SetupError;

/// Color surface storage format.
///
/// wgpu has no three-channel color formats, so the RGB variants allocate an
/// unused alpha lane; the stored data and the shading math are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentFormat {
    /// 8-bit normalized RGBA.
    Rgba8,
    /// 8-bit normalized RGB (alpha lane unused).
    Rgb8,
    /// 16-bit float RGB (alpha lane unused). Used for HDR and position data.
    Rgb16f,
}

impl AttachmentFormat {
    /// The concrete texture format the GPU backend allocates.
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            AttachmentFormat::Rgba8 | AttachmentFormat::Rgb8 => wgpu::TextureFormat::Rgba8Unorm,
            AttachmentFormat::Rgb16f => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// Minification/magnification filter for sampling an attachment back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    pub(crate) fn wgpu_filter(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// One color surface of a render target: storage format plus the filters
/// used when a later pass samples it as a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentSpec {
    pub format: AttachmentFormat,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
}

impl ColorAttachmentSpec {
    /// Linear-filtered attachment with the given format (the common case).
    pub fn linear(format: AttachmentFormat) -> Self {
        Self {
            format,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
        }
    }
}

/// Depth/stencil format shared by every render target: 24-bit depth packed
/// with 8-bit stencil.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Description of a render target: dimensions plus an ordered list of color
/// surfaces. The depth/stencil surface is implied; its format is fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub width: u32,
    pub height: u32,
    pub color: Vec<ColorAttachmentSpec>,
}

impl TargetSpec {
    /// Check the construction invariants: at least one color attachment,
    /// non-zero dimensions.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.color.is_empty() {
            return Err(SetupError::NoColorAttachments);
        }
        if self.width == 0 || self.height == 0 {
            return Err(SetupError::ZeroDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// The five-attachment G-buffer layout used by the deferred pipeline
    /// (see the module docs for the slot table).
    pub fn gbuffer(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: vec![
                ColorAttachmentSpec::linear(AttachmentFormat::Rgba8),
                ColorAttachmentSpec::linear(AttachmentFormat::Rgb8),
                ColorAttachmentSpec::linear(AttachmentFormat::Rgb8),
                ColorAttachmentSpec::linear(AttachmentFormat::Rgb16f),
                ColorAttachmentSpec::linear(AttachmentFormat::Rgb16f),
            ],
        }
    }
}

/// Well-known G-buffer attachment slots.
pub mod gbuffer {
    /// Base color (albedo).
    pub const BASE_COLOR: usize = 0;
    /// Metallic, roughness, occlusion packed into RGB.
    pub const MATERIAL: usize = 1;
    /// View-space normal, remapped into [0, 1].
    pub const NORMAL: usize = 2;
    /// View-space position.
    pub const POSITION: usize = 3;
    /// HDR accumulation written by the lighting pass, read by post-process.
    pub const HDR: usize = 4;
    /// Total color attachment count.
    pub const ATTACHMENT_COUNT: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attachment_list_is_rejected() {
        let spec = TargetSpec {
            width: 64,
            height: 64,
            color: vec![],
        };
        assert_eq!(spec.validate(), Err(SetupError::NoColorAttachments));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let spec = TargetSpec {
            width: 0,
            height: 480,
            color: vec![ColorAttachmentSpec::linear(AttachmentFormat::Rgba8)],
        };
        assert_eq!(
            spec.validate(),
            Err(SetupError::ZeroDimensions {
                width: 0,
                height: 480
            })
        );
    }

    #[test]
    fn valid_spec_passes() {
        let spec = TargetSpec {
            width: 640,
            height: 480,
            color: vec![ColorAttachmentSpec::linear(AttachmentFormat::Rgb16f)],
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn gbuffer_layout_is_stable() {
        let spec = TargetSpec::gbuffer(640, 480);
        assert_eq!(spec.color.len(), gbuffer::ATTACHMENT_COUNT);
        assert_eq!(spec.color[gbuffer::BASE_COLOR].format, AttachmentFormat::Rgba8);
        assert_eq!(spec.color[gbuffer::MATERIAL].format, AttachmentFormat::Rgb8);
        assert_eq!(spec.color[gbuffer::NORMAL].format, AttachmentFormat::Rgb8);
        assert_eq!(spec.color[gbuffer::POSITION].format, AttachmentFormat::Rgb16f);
        assert_eq!(spec.color[gbuffer::HDR].format, AttachmentFormat::Rgb16f);
        assert!(spec.validate().is_ok());
    }
}
