// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::RenderPass;
use crate::{
    device::{Device, DeviceOwned},
    image::{view::ImageView, ImageUsage},
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// The image views that are attached to a render pass during drawing.
///
/// A framebuffer is a collection of images, and supplies the actual inputs and outputs of each
/// attachment within a render pass. Each attachment point in the render pass must have a matching
/// image in the framebuffer.
pub struct Framebuffer {
    handle: Handle,
    render_pass: Arc<RenderPass>,

    attachments: Vec<Arc<ImageView>>,
    extent: [u32; 2],
    layers: u32,
}

impl Framebuffer {
    /// Creates a new `Framebuffer`.
    pub fn new(
        render_pass: Arc<RenderPass>,
        create_info: FramebufferCreateInfo,
    ) -> Result<Arc<Framebuffer>, ValidationErrors> {
        let mut create_info = create_info;
        create_info.set_auto_extent_layers(&render_pass);

        render_pass
            .device()
            .report_one(Self::validate_new(&render_pass, &create_info))?;

        Ok(Self::new_unchecked(render_pass, create_info))
    }

    fn validate_new(
        render_pass: &RenderPass,
        create_info: &FramebufferCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(render_pass.device(), render_pass)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(
        render_pass: Arc<RenderPass>,
        mut create_info: FramebufferCreateInfo,
    ) -> Arc<Framebuffer> {
        create_info.set_auto_extent_layers(&render_pass);

        let FramebufferCreateInfo {
            attachments,
            extent,
            layers,
            _ne: _,
        } = create_info;

        Arc::new(Framebuffer {
            handle: render_pass
                .device()
                .registry()
                .register(ObjectType::Framebuffer, None),
            render_pass,
            attachments,
            extent,
            layers,
        })
    }

    /// Returns the renderpass that was used to create this framebuffer.
    #[inline]
    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    /// Returns the attachments of the framebuffer.
    #[inline]
    pub fn attachments(&self) -> &[Arc<ImageView>] {
        &self.attachments
    }

    /// Returns the extent (width and height) of the framebuffer.
    #[inline]
    pub fn extent(&self) -> [u32; 2] {
        self.extent
    }

    /// Returns the number of layers of the framebuffer.
    #[inline]
    pub fn layers(&self) -> u32 {
        self.layers
    }
}

impl Drop for Framebuffer {
    #[inline]
    fn drop(&mut self) {
        self.render_pass.device().registry().unregister(self.handle);
    }
}

impl VulkanObject for Framebuffer {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Framebuffer {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.render_pass.device()
    }
}

impl Debug for Framebuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Framebuffer")
            .field("handle", &self.handle)
            .field("render_pass", &self.render_pass.handle())
            .field(
                "attachments",
                &self
                    .attachments
                    .iter()
                    .map(|view| view.handle())
                    .collect::<Vec<_>>(),
            )
            .field("extent", &self.extent)
            .field("layers", &self.layers)
            .finish()
    }
}

/// Parameters to create a new `Framebuffer`.
#[derive(Clone, Debug)]
pub struct FramebufferCreateInfo {
    /// The attachment images that are to be used in the framebuffer.
    ///
    /// Attachments are specified in the same order as they are defined in the render pass, and
    /// there must be exactly as many. This implies that the list must be empty if the render pass
    /// specifies no attachments. Each image must have the correct usages set to be used for the
    /// types of attachment that the render pass will use it as.
    ///
    /// The default value is empty.
    pub attachments: Vec<Arc<ImageView>>,

    /// The extent (width and height) of the framebuffer.
    ///
    /// This must be no larger than the smallest width and height of the images in `attachments`.
    /// If one of the elements is set to 0, the extent will be calculated automatically from the
    /// extents of the attachment images to be the largest allowed. At least one attachment image
    /// must be specified in that case.
    ///
    /// The default value is `[0, 0]`.
    pub extent: [u32; 2],

    /// The number of layers of the framebuffer.
    ///
    /// This must be no larger than the smallest number of array layers of the images in
    /// `attachments`. If set to 0, the number of layers will be calculated automatically from the
    /// layer ranges of the attachment images to be the largest allowed. At least one attachment
    /// image must be specified in that case.
    ///
    /// The number of layers must be 1 if the render pass has multiview enabled.
    ///
    /// The default value is `0`.
    pub layers: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for FramebufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            extent: [0, 0],
            layers: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl FramebufferCreateInfo {
    fn set_auto_extent_layers(&mut self, render_pass: &RenderPass) {
        let Self {
            attachments,
            extent,
            layers,
            _ne: _,
        } = self;

        let is_auto_extent = extent[0] == 0 || extent[1] == 0;
        let is_auto_layers = *layers == 0;

        if (is_auto_extent || is_auto_layers) && !attachments.is_empty() {
            let mut auto_extent = [u32::MAX, u32::MAX];
            let mut auto_layers = if render_pass.is_multiview() { 1 } else { u32::MAX };

            for image_view in attachments.iter() {
                let view_extent = image_view.extent();
                auto_extent[0] = auto_extent[0].min(view_extent[0]);
                auto_extent[1] = auto_extent[1].min(view_extent[1]);

                if !render_pass.is_multiview() {
                    auto_layers = auto_layers.min(image_view.layer_count());
                }
            }

            if is_auto_extent {
                *extent = auto_extent;
            }

            if is_auto_layers {
                *layers = auto_layers;
            }
        }
    }

    pub(crate) fn validate(
        &self,
        device: &Device,
        render_pass: &RenderPass,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref attachments,
            extent,
            layers,
            _ne: _,
        } = self;

        if attachments.len() != render_pass.attachments().len() {
            return Err(Box::new(ValidationError {
                context: "attachments".into(),
                problem: "the length is not equal to the number of attachments in the render pass"
                    .into(),
                vuids: &["VUID-VkFramebufferCreateInfo-attachmentCount-00876"],
                kind: Some(ViolationKind::AttachmentMismatch),
                ..Default::default()
            }));
        }

        // Determine which usages each attachment is put to.
        let mut attachment_usage = vec![ImageUsage::empty(); attachments.len()];
        let mut max_view_count = 0;

        for subpass in render_pass.subpasses() {
            for &index in subpass.color_attachments.iter().flatten() {
                attachment_usage[index as usize] |= ImageUsage::COLOR_ATTACHMENT;
            }

            for &index in subpass.input_attachments.iter().flatten() {
                attachment_usage[index as usize] |= ImageUsage::INPUT_ATTACHMENT;
            }

            if let Some(index) = subpass.depth_stencil_attachment {
                attachment_usage[index as usize] |= ImageUsage::DEPTH_STENCIL_ATTACHMENT;
            }

            max_view_count = max_view_count.max(u32::BITS - subpass.view_mask.leading_zeros());
        }

        for (attachment_index, (image_view, attachment_desc)) in attachments
            .iter()
            .zip(render_pass.attachments())
            .enumerate()
        {
            let context = || format!("attachments[{}]", attachment_index);

            if !image_view.is_alive() {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: "has been destroyed".into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-pAttachments-parameter"],
                    kind: Some(ViolationKind::DestroyedObjectUsed),
                    ..Default::default()
                }));
            }

            if image_view.format() != attachment_desc.format {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attachments[{0}].format()` is not equal to \
                        `render_pass.attachments()[{0}].format`",
                        attachment_index,
                    )
                    .into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-pAttachments-00880"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }

            if image_view.samples() != attachment_desc.samples {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attachments[{0}].samples()` is not equal to \
                        `render_pass.attachments()[{0}].samples`",
                        attachment_index,
                    )
                    .into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-pAttachments-00881"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }

            let required_usage = attachment_usage[attachment_index];

            let usage_vuids: [(ImageUsage, &'static [&'static str]); 3] = [
                (
                    ImageUsage::COLOR_ATTACHMENT,
                    &["VUID-VkFramebufferCreateInfo-pAttachments-00877"],
                ),
                (
                    ImageUsage::DEPTH_STENCIL_ATTACHMENT,
                    &["VUID-VkFramebufferCreateInfo-pAttachments-02633"],
                ),
                (
                    ImageUsage::INPUT_ATTACHMENT,
                    &["VUID-VkFramebufferCreateInfo-pAttachments-00879"],
                ),
            ];

            for (usage, vuids) in usage_vuids {
                if required_usage.intersects(usage) && !image_view.usage().intersects(usage) {
                    return Err(Box::new(ValidationError {
                        context: context().into(),
                        problem: format!(
                            "is used in the render pass as an attachment that requires \
                            `ImageUsage::{:?}`, but the image view does not have this usage",
                            usage,
                        )
                        .into(),
                        vuids,
                        kind: Some(ViolationKind::MissingUsage),
                        ..Default::default()
                    }));
                }
            }

            let mip_levels = &image_view.subresource_range().mip_levels;

            if mip_levels.end - mip_levels.start != 1 {
                return Err(Box::new(ValidationError {
                    context: context().into(),
                    problem: "has more than one mip level".into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-pAttachments-00883"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }

            let view_extent = image_view.extent();

            if view_extent[0] < extent[0] {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attachments[{}]` has a width smaller than `extent[0]`",
                        attachment_index,
                    )
                    .into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-flags-04533"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            if view_extent[1] < extent[1] {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attachments[{}]` has a height smaller than `extent[1]`",
                        attachment_index,
                    )
                    .into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-flags-04534"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            if render_pass.is_multiview() {
                if image_view.layer_count() < max_view_count {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "the render pass has multiview enabled, and `attachments[{}]` has \
                            fewer layers than the highest view index used by a subpass",
                            attachment_index,
                        )
                        .into(),
                        vuids: &["VUID-VkFramebufferCreateInfo-renderPass-04536"],
                        kind: Some(ViolationKind::MultiviewLayerRangeViolation),
                        ..Default::default()
                    }));
                }
            } else if image_view.layer_count() < layers {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attachments[{}]` has fewer layers than `layers`",
                        attachment_index,
                    )
                    .into(),
                    vuids: &["VUID-VkFramebufferCreateInfo-flags-04535"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        }

        let properties = device.properties();

        if extent[0] == 0 {
            return Err(Box::new(ValidationError {
                context: "extent[0]".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-width-00885"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if extent[0] > properties.max_framebuffer_width {
            return Err(Box::new(ValidationError {
                context: "extent[0]".into(),
                problem: "exceeds the `max_framebuffer_width` limit".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-width-00886"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if extent[1] == 0 {
            return Err(Box::new(ValidationError {
                context: "extent[1]".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-height-00887"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if extent[1] > properties.max_framebuffer_height {
            return Err(Box::new(ValidationError {
                context: "extent[1]".into(),
                problem: "exceeds the `max_framebuffer_height` limit".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-height-00888"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if layers == 0 {
            return Err(Box::new(ValidationError {
                context: "layers".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-layers-00889"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if layers > properties.max_framebuffer_layers {
            return Err(Box::new(ValidationError {
                context: "layers".into(),
                problem: "exceeds the `max_framebuffer_layers` limit".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-layers-00890"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if render_pass.is_multiview() && layers != 1 {
            return Err(Box::new(ValidationError {
                problem: "the render pass has multiview enabled, and `layers` is not 1".into(),
                vuids: &["VUID-VkFramebufferCreateInfo-renderPass-02531"],
                kind: Some(ViolationKind::MultiviewLayerRangeViolation),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Framebuffer, FramebufferCreateInfo};
    use crate::{
        format::Format,
        image::{view::ImageView, ImageUsage},
        ViolationKind,
    };

    #[test]
    fn auto_extent_and_layers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [64, 32],
            1,
            ImageUsage::COLOR_ATTACHMENT,
        );
        let framebuffer = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(framebuffer.extent(), [64, 32]);
        assert_eq!(framebuffer.layers(), 1);
    }

    #[test]
    fn attachment_count_and_format() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);

        let errors = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                extent: [16, 16],
                layers: 1,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-attachmentCount-00876"));

        let image = crate::tests::image(
            &device,
            Format::B8G8R8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::COLOR_ATTACHMENT,
        );
        let errors = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-pAttachments-00880"));
    }

    #[test]
    fn missing_usage_and_extent() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);

        let image =
            crate::tests::image(&device, Format::R8G8B8A8_UNORM, [16, 16], 1, ImageUsage::SAMPLED);
        let errors = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-pAttachments-00877"));
        assert!(errors.contains_kind(ViolationKind::MissingUsage));

        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::COLOR_ATTACHMENT,
        );
        let errors = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                extent: [32, 16],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-flags-04533"));
    }

    #[test]
    fn multiview_layers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0b111);

        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            2,
            ImageUsage::COLOR_ATTACHMENT,
        );
        let errors = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-renderPass-04536"));

        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            3,
            ImageUsage::COLOR_ATTACHMENT,
        );
        let errors = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image.clone()).unwrap()],
                layers: 2,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkFramebufferCreateInfo-renderPass-02531"));

        let framebuffer = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: vec![ImageView::new_default(image).unwrap()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(framebuffer.layers(), 1);
    }
}
