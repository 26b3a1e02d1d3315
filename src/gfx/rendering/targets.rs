//! Off-screen render targets
//!
//! Each group owns a fixed set of attachments. Before anything is allocated
//! the group's attachment list is checked by [`validate_attachments`], and the
//! allocation itself runs inside a validation error scope; either failure is
//! reported as [`RenderError::FramebufferIncomplete`].

use crate::{
    error::{RenderError, Result},
    gfx::resources::TextureResource,
    wgpu_utils::capture_errors,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDesc {
    pub label: &'static str,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl AttachmentDesc {
    pub const fn new(label: &'static str, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label,
            format,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete { attachment: String, reason: String },
}

impl FramebufferStatus {
    fn incomplete(attachment: &str, reason: impl Into<String>) -> Self {
        FramebufferStatus::Incomplete {
            attachment: attachment.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FramebufferStatus::Complete)
    }

    pub fn into_result(self, group: &str) -> Result<()> {
        match self {
            FramebufferStatus::Complete => Ok(()),
            FramebufferStatus::Incomplete { attachment, reason } => Err(RenderError::FramebufferIncomplete {
                label: group.to_owned(),
                reason: format!("{attachment}: {reason}"),
            }),
        }
    }
}

/// Checks that a set of attachments can form one render target.
///
/// All attachments must share one nonzero size within `max_dimension`, and
/// every format must be renderable without optional device features.
pub fn validate_attachments(attachments: &[AttachmentDesc], max_dimension: u32) -> FramebufferStatus {
    let Some(first) = attachments.first() else {
        return FramebufferStatus::incomplete("<none>", "no attachments");
    };

    for attachment in attachments {
        if attachment.width == 0 || attachment.height == 0 {
            return FramebufferStatus::incomplete(
                attachment.label,
                format!("zero size {}x{}", attachment.width, attachment.height),
            );
        }
        if attachment.width > max_dimension || attachment.height > max_dimension {
            return FramebufferStatus::incomplete(
                attachment.label,
                format!(
                    "{}x{} exceeds the {max_dimension} texel limit",
                    attachment.width, attachment.height
                ),
            );
        }
        if (attachment.width, attachment.height) != (first.width, first.height) {
            return FramebufferStatus::incomplete(
                attachment.label,
                format!(
                    "size {}x{} differs from {} ({}x{})",
                    attachment.width, attachment.height, first.label, first.width, first.height
                ),
            );
        }
        let features = attachment
            .format
            .guaranteed_format_features(wgpu::Features::empty());
        if !features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return FramebufferStatus::incomplete(
                attachment.label,
                format!("{:?} is not renderable", attachment.format),
            );
        }
    }

    FramebufferStatus::Complete
}

/// Validates `attachments`, then runs `create` in an error scope.
fn allocate<T>(
    device: &wgpu::Device,
    group: &str,
    attachments: &[AttachmentDesc],
    create: impl FnOnce() -> T,
) -> Result<T> {
    let max_dimension = device.limits().max_texture_dimension_2d;
    validate_attachments(attachments, max_dimension).into_result(group)?;

    let (value, error) = capture_errors(device, create);
    if let Some(error) = error {
        return Err(RenderError::FramebufferIncomplete {
            label: group.to_owned(),
            reason: error.to_string(),
        });
    }
    log::debug!(
        "Allocated {group}: {} attachment(s) at {}x{}",
        attachments.len(),
        attachments[0].width,
        attachments[0].height
    );
    Ok(value)
}

/// Geometry buffer: view-space position and normal, albedo, light term, depth-stencil
pub struct GBuffer {
    pub position: TextureResource,
    pub normal: TextureResource,
    pub albedo: TextureResource,
    pub light: TextureResource,
    pub depth_stencil: TextureResource,
    /// Depth and stencil aspects, for use as the pass attachment
    pub depth_stencil_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GBuffer {
    pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const LIGHT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
    pub const DEPTH_FORMAT: wgpu::TextureFormat = TextureResource::DEPTH_STENCIL_FORMAT;

    pub const COLOR_FORMATS: [wgpu::TextureFormat; 4] = [
        Self::POSITION_FORMAT,
        Self::NORMAL_FORMAT,
        Self::ALBEDO_FORMAT,
        Self::LIGHT_FORMAT,
    ];

    pub fn attachments(width: u32, height: u32) -> Vec<AttachmentDesc> {
        vec![
            AttachmentDesc::new("G-Buffer Position", Self::POSITION_FORMAT, width, height),
            AttachmentDesc::new("G-Buffer Normal", Self::NORMAL_FORMAT, width, height),
            AttachmentDesc::new("G-Buffer Albedo", Self::ALBEDO_FORMAT, width, height),
            AttachmentDesc::new("G-Buffer Light", Self::LIGHT_FORMAT, width, height),
            AttachmentDesc::new("G-Buffer Depth", Self::DEPTH_FORMAT, width, height),
        ]
    }

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        let attachments = Self::attachments(width, height);
        allocate(device, "G-Buffer", &attachments, || {
            let [position, normal, albedo, light, depth_stencil] = [0, 1, 2, 3, 4].map(|i| {
                let desc = &attachments[i];
                TextureResource::create_attachment(device, width, height, desc.format, desc.label)
            });
            let depth_stencil_view = depth_stencil.attachment_view();
            Self {
                position,
                normal,
                albedo,
                light,
                depth_stencil,
                depth_stencil_view,
                width,
                height,
            }
        })
    }
}

/// Depth rendered from the light
pub struct ShadowBuffer {
    pub map: TextureResource,
    pub size: u32,
}

impl ShadowBuffer {
    pub fn attachments(size: u32) -> Vec<AttachmentDesc> {
        vec![AttachmentDesc::new(
            "Shadow Map",
            TextureResource::DEPTH_FORMAT,
            size,
            size,
        )]
    }

    pub fn new(device: &wgpu::Device, size: u32) -> Result<Self> {
        allocate(device, "Shadow Buffer", &Self::attachments(size), || Self {
            map: TextureResource::create_shadow_map(device, size),
            size,
        })
    }
}

/// Single-channel occlusion target, used for both the raw and the blurred SSAO term
pub struct OcclusionBuffer {
    pub target: TextureResource,
    pub width: u32,
    pub height: u32,
}

impl OcclusionBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

    pub fn attachments(label: &'static str, width: u32, height: u32) -> Vec<AttachmentDesc> {
        vec![AttachmentDesc::new(label, Self::FORMAT, width, height)]
    }

    pub fn new(device: &wgpu::Device, label: &'static str, width: u32, height: u32) -> Result<Self> {
        allocate(device, label, &Self::attachments(label, width, height), || Self {
            target: TextureResource::create_attachment(device, width, height, Self::FORMAT, label),
            width,
            height,
        })
    }
}

/// Viewport-sized depth buffer of the forward renderer
pub struct DepthBuffer {
    pub depth: TextureResource,
    pub width: u32,
    pub height: u32,
}

impl DepthBuffer {
    pub fn attachments(width: u32, height: u32) -> Vec<AttachmentDesc> {
        vec![AttachmentDesc::new(
            "Forward Depth",
            TextureResource::DEPTH_FORMAT,
            width,
            height,
        )]
    }

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        allocate(device, "Forward Depth", &Self::attachments(width, height), || Self {
            depth: TextureResource::create_depth_texture(device, width, height, "Forward Depth"),
            width,
            height,
        })
    }
}

/// Cube map faces rendered by the skybox capture
pub(crate) fn cube_face_attachments(size: u32, format: wgpu::TextureFormat) -> Vec<AttachmentDesc> {
    vec![AttachmentDesc::new("Environment Cube Face", format, size, size)]
}

pub(crate) fn allocate_cube_target<T>(
    device: &wgpu::Device,
    size: u32,
    format: wgpu::TextureFormat,
    create: impl FnOnce() -> T,
) -> Result<T> {
    allocate(device, "Environment Cube", &cube_face_attachments(size, format), create)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u32 = 8192;

    fn all_groups(width: u32, height: u32) -> Vec<Vec<AttachmentDesc>> {
        vec![
            GBuffer::attachments(width, height),
            ShadowBuffer::attachments(4096),
            OcclusionBuffer::attachments("SSAO Buffer", width, height),
            OcclusionBuffer::attachments("Blur Buffer", width, height),
            DepthBuffer::attachments(width, height),
            cube_face_attachments(512, wgpu::TextureFormat::Rgba16Float),
        ]
    }

    #[test]
    fn test_groups_complete_at_startup_and_after_resize() {
        for (width, height) in [(1600, 900), (800, 600), (1, 1)] {
            for group in all_groups(width, height) {
                assert_eq!(validate_attachments(&group, MAX), FramebufferStatus::Complete);
            }
        }
    }

    #[test]
    fn test_zero_size_is_incomplete() {
        let status = validate_attachments(&GBuffer::attachments(0, 900), MAX);
        assert!(!status.is_complete());
        assert!(status.into_result("G-Buffer").is_err());
    }

    #[test]
    fn test_mismatched_sizes_are_incomplete() {
        let mut attachments = GBuffer::attachments(1600, 900);
        attachments[2].width = 800;
        match validate_attachments(&attachments, MAX) {
            FramebufferStatus::Incomplete { attachment, .. } => assert_eq!(attachment, "G-Buffer Albedo"),
            FramebufferStatus::Complete => panic!("expected incomplete"),
        }
    }

    #[test]
    fn test_oversized_and_empty_are_incomplete() {
        assert!(!validate_attachments(&ShadowBuffer::attachments(MAX + 1), MAX).is_complete());
        assert!(!validate_attachments(&[], MAX).is_complete());
    }

    #[test]
    fn test_unrenderable_format_is_incomplete() {
        let attachments = [AttachmentDesc::new(
            "Compressed",
            wgpu::TextureFormat::Bc1RgbaUnorm,
            64,
            64,
        )];
        assert!(!validate_attachments(&attachments, MAX).is_complete());
    }
}
