// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Description of the steps of the rendering process, and the images used as input or output.
//!
//! # Render passes and framebuffers
//!
//! There are two concepts in Vulkan:
//!
//! - A *render pass* describes the overall process of drawing a frame. It is subdivided into one
//!   or more subpasses.
//! - A *framebuffer* contains the list of image views that are attached during the drawing of
//!   each subpass.
//!
//! Render passes are typically created at initialization only (for example during a loading
//! screen) because they can be costly, while framebuffers can be created and destroyed either at
//! initialization or during the frame.
//!
//! # Compatibility
//!
//! Pipelines, framebuffers and secondary command buffers are created for a render pass, but can
//! be used with any render pass that is *compatible* with it: one with the same attachments in
//! terms of format and sample count, whose subpasses reference those attachments in the same
//! way and with the same view masks.

pub use self::framebuffer::{Framebuffer, FramebufferCreateInfo};
use crate::{
    device::{Device, DeviceOwned},
    format::{Format, FormatFeatures},
    image::SampleCount,
    macros::vulkan_enum,
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

mod framebuffer;

/// An object representing the discrete steps in which rendering is done.
pub struct RenderPass {
    device: Arc<Device>,
    handle: Handle,

    attachments: Vec<AttachmentDescription>,
    subpasses: Vec<SubpassDescription>,
}

impl RenderPass {
    /// Creates a new `RenderPass`.
    pub fn new(
        device: Arc<Device>,
        create_info: RenderPassCreateInfo,
    ) -> Result<Arc<RenderPass>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &RenderPassCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: RenderPassCreateInfo) -> Arc<RenderPass> {
        let RenderPassCreateInfo {
            attachments,
            subpasses,
            _ne: _,
        } = create_info;

        Arc::new(RenderPass {
            handle: device.registry().register(ObjectType::RenderPass, None),
            device,
            attachments,
            subpasses,
        })
    }

    /// Returns the attachments of the render pass.
    #[inline]
    pub fn attachments(&self) -> &[AttachmentDescription] {
        &self.attachments
    }

    /// Returns the subpasses of the render pass.
    #[inline]
    pub fn subpasses(&self) -> &[SubpassDescription] {
        &self.subpasses
    }

    /// Returns the first subpass of the render pass.
    #[inline]
    pub fn first_subpass(self: Arc<Self>) -> Subpass {
        Subpass {
            render_pass: self,
            subpass_id: 0, // Guaranteed to exist
        }
    }

    /// Returns `true` if this render pass is compatible with the other render pass,
    /// as defined in the "Render Pass Compatibility" section of the Vulkan specs.
    pub fn is_compatible_with(&self, other: &RenderPass) -> bool {
        if self.handle == other.handle {
            return true;
        }

        if self.attachments.len() != other.attachments.len()
            || self.subpasses.len() != other.subpasses.len()
        {
            return false;
        }

        if !self
            .attachments
            .iter()
            .zip(&other.attachments)
            .all(|(a, b)| a.is_compatible_with(b))
        {
            return false;
        }

        self.subpasses.iter().zip(&other.subpasses).all(|(a, b)| {
            a.view_mask == b.view_mask
                && attachment_refs_compatible(
                    &self.attachments,
                    &a.color_attachments,
                    &other.attachments,
                    &b.color_attachments,
                )
                && attachment_refs_compatible(
                    &self.attachments,
                    &a.input_attachments,
                    &other.attachments,
                    &b.input_attachments,
                )
                && attachment_refs_compatible(
                    &self.attachments,
                    std::slice::from_ref(&a.depth_stencil_attachment),
                    &other.attachments,
                    std::slice::from_ref(&b.depth_stencil_attachment),
                )
        })
    }

    /// Returns whether any subpass of the render pass has a non-zero view mask.
    #[inline]
    pub fn is_multiview(&self) -> bool {
        self.subpasses.iter().any(|subpass| subpass.view_mask != 0)
    }
}

// Two arrays of attachment references are compatible if they have the same length, ignoring
// trailing unused references, and corresponding references are both unused or refer to
// compatible attachments.
fn attachment_refs_compatible(
    a_attachments: &[AttachmentDescription],
    a: &[Option<u32>],
    b_attachments: &[AttachmentDescription],
    b: &[Option<u32>],
) -> bool {
    let len = a.len().max(b.len());

    (0..len).all(|index| {
        match (
            a.get(index).copied().flatten(),
            b.get(index).copied().flatten(),
        ) {
            (None, None) => true,
            (Some(a_index), Some(b_index)) => {
                match (
                    a_attachments.get(a_index as usize),
                    b_attachments.get(b_index as usize),
                ) {
                    (Some(a_desc), Some(b_desc)) => a_desc.is_compatible_with(b_desc),
                    _ => false,
                }
            }
            _ => false,
        }
    })
}

impl Drop for RenderPass {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for RenderPass {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for RenderPass {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for RenderPass {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("RenderPass")
            .field("handle", &self.handle)
            .field("attachments", &self.attachments)
            .field("subpasses", &self.subpasses)
            .finish_non_exhaustive()
    }
}

/// Represents a subpass within a `RenderPass` object.
///
/// This struct doesn't correspond to anything in Vulkan. It is simply an equivalent to a
/// tuple of a render pass and subpass index.
#[derive(Clone, Debug)]
pub struct Subpass {
    render_pass: Arc<RenderPass>,
    subpass_id: u32,
}

impl Subpass {
    /// Returns a handle that represents a subpass of a render pass.
    #[inline]
    pub fn from(render_pass: Arc<RenderPass>, id: u32) -> Option<Subpass> {
        if (id as usize) < render_pass.subpasses().len() {
            Some(Subpass {
                render_pass,
                subpass_id: id,
            })
        } else {
            None
        }
    }

    /// Returns the render pass of this subpass.
    #[inline]
    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    /// Returns the index of this subpass within the renderpass.
    #[inline]
    pub fn index(&self) -> u32 {
        self.subpass_id
    }

    /// Returns the subpass description for this subpass.
    #[inline]
    pub fn subpass_desc(&self) -> &SubpassDescription {
        &self.render_pass.subpasses()[self.subpass_id as usize]
    }

    /// Returns whether this subpass is the last one in the render pass.
    #[inline]
    pub fn is_last_subpass(&self) -> bool {
        self.subpass_id as usize == self.render_pass.subpasses().len() - 1
    }

    /// Returns the number of color attachments in this subpass.
    #[inline]
    pub fn num_color_attachments(&self) -> u32 {
        self.subpass_desc().color_attachments.len() as u32
    }

    /// Returns the formats of the color attachments of this subpass, `None` for unused ones.
    pub fn color_attachment_formats(&self) -> Vec<Option<Format>> {
        self.subpass_desc()
            .color_attachments
            .iter()
            .map(|attachment| {
                attachment.and_then(|index| {
                    self.render_pass
                        .attachments()
                        .get(index as usize)
                        .map(|desc| desc.format)
                })
            })
            .collect()
    }

    /// Returns the format of the depth/stencil attachment of this subpass, if there is one.
    pub fn depth_stencil_format(&self) -> Option<Format> {
        self.subpass_desc()
            .depth_stencil_attachment
            .and_then(|index| self.render_pass.attachments().get(index as usize))
            .map(|desc| desc.format)
    }

    /// Returns the number of samples in the color and/or depth/stencil attachments. Returns
    /// `None` if there is no such attachment in this subpass.
    pub fn num_samples(&self) -> Option<SampleCount> {
        let subpass_desc = self.subpass_desc();

        subpass_desc
            .color_attachments
            .iter()
            .flatten()
            .chain(subpass_desc.depth_stencil_attachment.iter())
            .filter_map(|&index| self.render_pass.attachments().get(index as usize))
            .map(|desc| desc.samples)
            .next()
    }

    /// Returns the view mask of this subpass.
    #[inline]
    pub fn view_mask(&self) -> u32 {
        self.subpass_desc().view_mask
    }
}

/// Parameters to create a new `RenderPass`.
#[derive(Clone, Debug)]
pub struct RenderPassCreateInfo {
    /// The attachments available for the render pass.
    ///
    /// The default value is empty.
    pub attachments: Vec<AttachmentDescription>,

    /// The subpasses that make up this render pass.
    ///
    /// A render pass must contain at least one subpass.
    ///
    /// The default value is empty, which must be overridden.
    pub subpasses: Vec<SubpassDescription>,

    pub _ne: crate::NonExhaustive,
}

impl Default for RenderPassCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            subpasses: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl RenderPassCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref attachments,
            ref subpasses,
            _ne: _,
        } = self;

        for (attachment_index, attachment) in attachments.iter().enumerate() {
            attachment
                .validate(device)
                .map_err(|err| err.add_context(format!("attachments[{}]", attachment_index)))?;
        }

        if subpasses.is_empty() {
            return Err(Box::new(ValidationError {
                context: "subpasses".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkRenderPassCreateInfo2-subpassCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let is_multiview = subpasses[0].view_mask != 0;

        for (subpass_index, subpass) in subpasses.iter().enumerate() {
            subpass
                .validate(device, attachments)
                .map_err(|err| err.add_context(format!("subpasses[{}]", subpass_index)))?;

            if (subpass.view_mask != 0) != is_multiview {
                return Err(Box::new(ValidationError {
                    problem: "the `view_mask` of some subpasses is zero, and of others it is not"
                        .into(),
                    vuids: &["VUID-VkRenderPassCreateInfo2-viewMask-03058"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Describes an attachment that will be used in a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentDescription {
    /// The format of the image that is going to be bound.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The number of samples of the image that is going to be bound.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub samples: SampleCount,

    /// What the implementation should do with the attachment at the start of the subpass that
    /// first uses it.
    ///
    /// The default value is [`AttachmentLoadOp::DontCare`].
    pub load_op: AttachmentLoadOp,

    /// What the implementation should do with the attachment at the end of the subpass that last
    /// uses it.
    ///
    /// The default value is [`AttachmentStoreOp::DontCare`].
    pub store_op: AttachmentStoreOp,
}

impl Default for AttachmentDescription {
    #[inline]
    fn default() -> Self {
        Self {
            format: Format::R8G8B8A8_UNORM,
            samples: SampleCount::Sample1,
            load_op: AttachmentLoadOp::DontCare,
            store_op: AttachmentStoreOp::DontCare,
        }
    }
}

impl AttachmentDescription {
    /// Returns whether two attachments are compatible: same format and sample count.
    #[inline]
    pub fn is_compatible_with(&self, other: &AttachmentDescription) -> bool {
        self.format == other.format && self.samples == other.samples
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            format,
            samples,
            load_op,
            store_op,
        } = self;

        format.validate_device(device).map_err(|err| {
            err.add_context("format")
                .set_vuids(&["VUID-VkAttachmentDescription2-format-parameter"])
        })?;
        samples.validate_device(device).map_err(|err| {
            err.add_context("samples")
                .set_vuids(&["VUID-VkAttachmentDescription2-samples-parameter"])
        })?;
        load_op.validate_device(device).map_err(|err| {
            err.add_context("load_op")
                .set_vuids(&["VUID-VkAttachmentDescription2-loadOp-parameter"])
        })?;
        store_op.validate_device(device).map_err(|err| {
            err.add_context("store_op")
                .set_vuids(&["VUID-VkAttachmentDescription2-storeOp-parameter"])
        })?;

        Ok(())
    }
}

/// Describes one of the subpasses of a render pass.
///
/// Attachments are referred to by their index in [`RenderPassCreateInfo::attachments`]. `None`
/// marks an unused slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubpassDescription {
    /// If not `0`, enables multiview rendering, and specifies the view indices that are rendered
    /// to in this subpass. The value is a bitmask, so that that for example `0b11` will draw to
    /// the first two views and `0b101` will draw to the first and third view.
    ///
    /// If set to a nonzero value, it must be nonzero for all subpasses in the render pass, and
    /// the [`multiview`](crate::device::DeviceFeatures::multiview) feature must be enabled on the
    /// device.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The attachments of the render pass that are to be used as input attachments in this
    /// subpass.
    ///
    /// The default value is empty.
    pub input_attachments: Vec<Option<u32>>,

    /// The attachments of the render pass that are to be used as color attachments in this
    /// subpass.
    ///
    /// The number of color attachments must be less than the
    /// [`max_color_attachments`](crate::device::DeviceProperties::max_color_attachments) limit of
    /// the device. All color attachments must have the same `samples` value.
    ///
    /// The default value is empty.
    pub color_attachments: Vec<Option<u32>>,

    /// The attachment of the render pass that is to be used as depth/stencil attachment in this
    /// subpass.
    ///
    /// The default value is `None`.
    pub depth_stencil_attachment: Option<u32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubpassDescription {
    #[inline]
    fn default() -> Self {
        Self {
            view_mask: 0,
            input_attachments: Vec::new(),
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SubpassDescription {
    pub(crate) fn validate(
        &self,
        device: &Device,
        attachments: &[AttachmentDescription],
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            view_mask,
            ref input_attachments,
            ref color_attachments,
            depth_stencil_attachment,
            _ne: _,
        } = self;

        let properties = device.properties();

        if color_attachments.len() > properties.max_color_attachments as usize {
            return Err(Box::new(ValidationError {
                context: "color_attachments".into(),
                problem: "the number of elements is greater than the `max_color_attachments` limit"
                    .into(),
                vuids: &["VUID-VkSubpassDescription2-colorAttachmentCount-03063"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        let get_attachment = |context: String, index: u32| {
            attachments.get(index as usize).ok_or_else(|| {
                Box::new(ValidationError {
                    context: context.into(),
                    problem: "is not less than the number of attachments in the render pass"
                        .into(),
                    vuids: &["VUID-VkRenderPassCreateInfo2-attachment-03051"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                })
            })
        };

        let mut color_samples = None;

        for (ref_index, &attachment) in color_attachments.iter().enumerate() {
            let Some(attachment) = attachment else {
                continue;
            };
            let attachment_desc = get_attachment(format!("color_attachments[{}]", ref_index), attachment)?;

            if !device
                .format_properties(attachment_desc.format)
                .optimal_tiling_features
                .intersects(FormatFeatures::COLOR_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: format!("color_attachments[{}]", ref_index).into(),
                    problem: "the format of the referenced attachment does not support \
                        `FormatFeatures::COLOR_ATTACHMENT`"
                        .into(),
                    vuids: &["VUID-VkSubpassDescription2-pColorAttachments-02898"],
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }

            match color_samples {
                None => color_samples = Some(attachment_desc.samples),
                Some(samples) if samples != attachment_desc.samples => {
                    return Err(Box::new(ValidationError {
                        context: "color_attachments".into(),
                        problem: "the referenced attachments do not all have the same \
                            `samples` value"
                            .into(),
                        vuids: &["VUID-VkSubpassDescription2-pColorAttachments-03069"],
                        kind: Some(ViolationKind::AttachmentMismatch),
                        ..Default::default()
                    }));
                }
                Some(_) => (),
            }
        }

        for (ref_index, &attachment) in input_attachments.iter().enumerate() {
            if let Some(attachment) = attachment {
                get_attachment(format!("input_attachments[{}]", ref_index), attachment)?;
            }
        }

        if let Some(attachment) = depth_stencil_attachment {
            let attachment_desc = get_attachment("depth_stencil_attachment".to_owned(), attachment)?;

            if !device
                .format_properties(attachment_desc.format)
                .optimal_tiling_features
                .intersects(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: "depth_stencil_attachment".into(),
                    problem: "the format of the referenced attachment does not support \
                        `FormatFeatures::DEPTH_STENCIL_ATTACHMENT`"
                        .into(),
                    vuids: &["VUID-VkSubpassDescription2-pDepthStencilAttachment-02900"],
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        if view_mask != 0 {
            if !device.enabled_features().multiview {
                return Err(Box::new(ValidationError {
                    context: "view_mask".into(),
                    problem: "is not 0".into(),
                    requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                        crate::Requires::DeviceFeature("multiview"),
                    ])]),
                    vuids: &["VUID-VkSubpassDescription2-multiview-06558"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                    ..Default::default()
                }));
            }

            let view_count = u32::BITS - view_mask.leading_zeros();

            if view_count > properties.max_multiview_view_count {
                return Err(Box::new(ValidationError {
                    context: "view_mask".into(),
                    problem: "the number of views exceeds the `max_multiview_view_count` limit"
                        .into(),
                    vuids: &["VUID-VkSubpassDescription2-viewMask-06706"],
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_enum! {
    /// Describes what the implementation should do with an attachment at the start of the
    /// subpass.
    AttachmentLoadOp = AttachmentLoadOp(i32);

    /// The content of the attachment will be loaded from memory.
    Load = LOAD,

    /// The content of the attachment will be filled by the implementation with a uniform value
    /// that you must provide when you start drawing.
    Clear = CLEAR,

    /// The attachment will have undefined content.
    DontCare = DONT_CARE,
}

vulkan_enum! {
    /// Describes what the implementation should do with an attachment after all the subpasses
    /// have completed.
    AttachmentStoreOp = AttachmentStoreOp(i32);

    /// The attachment will be stored.
    Store = STORE,

    /// What happens is implementation-specific.
    DontCare = DONT_CARE,
}

#[cfg(test)]
mod tests {
    use super::{
        AttachmentDescription, RenderPass, RenderPassCreateInfo, Subpass, SubpassDescription,
    };
    use crate::{device::DeviceFeatures, format::Format, image::SampleCount};

    #[test]
    fn empty_subpasses() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = RenderPass::new(device, Default::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkRenderPassCreateInfo2-subpassCount-arraylength"));
    }

    #[test]
    fn attachment_out_of_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription::default()],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![Some(1)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkRenderPassCreateInfo2-attachment-03051"));
    }

    #[test]
    fn color_attachment_format_and_samples() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = RenderPass::new(
            device.clone(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::D16_UNORM,
                    ..Default::default()
                }],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![Some(0)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubpassDescription2-pColorAttachments-02898"));

        let errors = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![
                    AttachmentDescription::default(),
                    AttachmentDescription {
                        samples: SampleCount::Sample4,
                        ..Default::default()
                    },
                ],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![Some(0), Some(1)],
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubpassDescription2-pColorAttachments-03069"));
    }

    #[test]
    fn multiview_rules() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let errors = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription::default()],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![Some(0)],
                    view_mask: 0b11,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubpassDescription2-multiview-06558"));

        let (device, _queue) = gfx_dev_and_queue!();
        let errors = RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription::default()],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![Some(0)],
                        view_mask: 0b11,
                        ..Default::default()
                    },
                    SubpassDescription {
                        color_attachments: vec![Some(0)],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkRenderPassCreateInfo2-viewMask-03058"));
    }

    #[test]
    fn compatibility() {
        let (device, _queue) = gfx_dev_and_queue!();
        let a = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let b = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let c = crate::tests::single_color_render_pass(&device, Format::B8G8R8A8_UNORM, 0);
        let d = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0b1);

        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
        assert!(!a.is_compatible_with(&d));
        assert!(d.is_multiview());

        let subpass = Subpass::from(a.clone(), 0).unwrap();
        assert!(subpass.is_last_subpass());
        assert_eq!(subpass.num_samples(), Some(SampleCount::Sample1));
        assert_eq!(
            subpass.color_attachment_formats(),
            vec![Some(Format::R8G8B8A8_UNORM)]
        );
        assert!(Subpass::from(a, 1).is_none());
    }
}
