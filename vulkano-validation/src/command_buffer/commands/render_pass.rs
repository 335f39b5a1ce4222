// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{clear::ClearColorValue, CommandInfo};
use crate::{
    command_buffer::{
        state::{
            rendering_info_from_subpass, BeginRenderPassState, RenderPassState,
            RenderPassStateType,
        },
        CommandBuffer, CommandBufferInner, CommandBufferLevel, SubpassContents,
    },
    device::{queue::QueueFlags, Device, DeviceOwned},
    format::{Format, NumericType},
    image::{view::ImageView, ImageAspects, ImageUsage, SampleCount},
    pipeline::graphics::PipelineRenderingCreateInfo,
    render_pass::{Framebuffer, RenderPass, Subpass},
    Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors, ViolationKind,
    VulkanObject,
};
use std::{ops::Range, sync::Arc};

const BEGIN_RENDER_PASS: CommandInfo =
    command_info!("vkCmdBeginRenderPass", QueueFlags::GRAPHICS, Outside).primary_only();
const NEXT_SUBPASS: CommandInfo = command_info!("vkCmdNextSubpass", QueueFlags::GRAPHICS, Inside)
    .primary_only()
    .allowed_in_secondary_contents();
const END_RENDER_PASS: CommandInfo =
    command_info!("vkCmdEndRenderPass", QueueFlags::GRAPHICS, Inside)
        .primary_only()
        .allowed_in_secondary_contents();
const BEGIN_RENDERING: CommandInfo =
    command_info!("vkCmdBeginRendering", QueueFlags::GRAPHICS, Outside);
const END_RENDERING: CommandInfo = command_info!("vkCmdEndRendering", QueueFlags::GRAPHICS, Inside)
    .allowed_in_secondary_contents();
const CLEAR_ATTACHMENTS: CommandInfo =
    command_info!("vkCmdClearAttachments", QueueFlags::GRAPHICS, Inside);

/// # Commands for render passes.
///
/// These commands require a graphics queue.
impl CommandBuffer {
    /// Begins a render pass using a render pass object and framebuffer.
    ///
    /// You must call this or `begin_rendering` before you can record draw commands.
    ///
    /// `contents` specifies what kinds of commands will be recorded in the first subpass:
    /// inline commands, or only executions of secondary command buffers.
    pub fn begin_render_pass(
        &self,
        render_pass_begin_info: RenderPassBeginInfo,
        contents: SubpassContents,
    ) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_RENDER_PASS, |inner, errors| {
            if !errors.check(
                render_pass_begin_info
                    .validate(self.device())
                    .map_err(|err| err.add_context("render_pass_begin_info")),
            ) {
                return;
            }

            self.begin_render_pass_unchecked(inner, render_pass_begin_info, contents);
        })
    }

    fn begin_render_pass_unchecked(
        &self,
        inner: &mut CommandBufferInner,
        render_pass_begin_info: RenderPassBeginInfo,
        contents: SubpassContents,
    ) {
        let RenderPassBeginInfo {
            render_pass,
            framebuffer,
            render_area_offset: _,
            render_area_extent: _,
            _ne: _,
        } = render_pass_begin_info;

        inner.add_resource(&render_pass);
        inner.add_resource(&framebuffer);

        for image_view in framebuffer.attachments() {
            inner.add_resource(image_view);
            inner.add_resource(image_view.image());
        }

        let subpass = render_pass.first_subpass();

        inner.builder_state.render_pass = Some(RenderPassState {
            contents,
            rendering_info: rendering_info_from_subpass(&subpass),
            rasterization_samples: subpass.num_samples(),
            render_pass: BeginRenderPassState {
                subpass,
                framebuffer: Some(framebuffer),
            }
            .into(),
        });
    }

    /// Advances to the next subpass of the render pass previously begun with
    /// `begin_render_pass`.
    pub fn next_subpass(&self, contents: SubpassContents) -> Result<(), ValidationErrors> {
        self.record(&NEXT_SUBPASS, |inner, errors| {
            let builder_state = &inner.builder_state;

            let Some(render_pass_state) = builder_state.render_pass.as_ref() else {
                return;
            };

            let RenderPassStateType::BeginRenderPass(begin_render_pass_state) =
                &render_pass_state.render_pass
            else {
                errors.push(Box::new(ValidationError {
                    problem: "the current render pass instance was begun with \
                        `begin_rendering`"
                        .into(),
                    vuids: &["VUID-vkCmdNextSubpass-None-06171"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
                return;
            };

            if builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is active".into(),
                    vuids: &["VUID-vkCmdNextSubpass-None-02349"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));
            }

            let subpass = &begin_render_pass_state.subpass;

            if subpass.is_last_subpass() {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the current subpass {} is the last subpass of the render pass",
                        subpass.index(),
                    )
                    .into(),
                    vuids: &["VUID-vkCmdNextSubpass-None-00909"],
                    kind: Some(ViolationKind::SubpassIndexOutOfRange),
                    ..Default::default()
                }));
                return;
            }

            let Some(next_subpass) =
                Subpass::from(subpass.render_pass().clone(), subpass.index() + 1)
            else {
                return;
            };
            let is_multiview = next_subpass.render_pass().is_multiview();

            let builder_state = &mut inner.builder_state;

            if let Some(render_pass_state) = builder_state.render_pass.as_mut() {
                render_pass_state.contents = contents;
                render_pass_state.rendering_info = rendering_info_from_subpass(&next_subpass);
                render_pass_state.rasterization_samples = next_subpass.num_samples();

                if let RenderPassStateType::BeginRenderPass(state) =
                    &mut render_pass_state.render_pass
                {
                    state.subpass = next_subpass;
                }
            }

            if is_multiview {
                builder_state.reset_non_render_pass_states();
            }
        })
    }

    /// Ends the render pass previously begun with `begin_render_pass`.
    ///
    /// This must be called after you went through all the subpasses.
    pub fn end_render_pass(&self) -> Result<(), ValidationErrors> {
        self.record(&END_RENDER_PASS, |inner, errors| {
            let Some(render_pass_state) = inner.builder_state.render_pass.as_ref() else {
                return;
            };

            let RenderPassStateType::BeginRenderPass(begin_render_pass_state) =
                &render_pass_state.render_pass
            else {
                errors.push(Box::new(ValidationError {
                    problem: "the current render pass instance was begun with \
                        `begin_rendering`"
                        .into(),
                    vuids: &["VUID-vkCmdEndRenderPass-None-06170"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
                return;
            };

            let subpass = &begin_render_pass_state.subpass;

            if !subpass.is_last_subpass() {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the current subpass {} is not the last subpass of the render pass",
                        subpass.index(),
                    )
                    .into(),
                    vuids: &["VUID-vkCmdEndRenderPass-None-00910"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
            }

            let is_multiview = subpass.render_pass().is_multiview();

            validate_end_of_render_pass_scopes(
                inner,
                &["VUID-vkCmdEndRenderPass-None-07004"],
                &["VUID-vkCmdEndRenderPass-None-02351"],
                errors,
            );

            end_render_pass_scope(inner, is_multiview);
        })
    }

    /// Begins a render pass without a render pass object or framebuffer.
    ///
    /// Requires the [`dynamic_rendering`](crate::device::DeviceFeatures::dynamic_rendering)
    /// feature to be enabled on the device.
    pub fn begin_rendering(&self, rendering_info: RenderingInfo) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_RENDERING, |inner, errors| {
            if !self.device().enabled_features().dynamic_rendering {
                errors.push(Box::new(ValidationError {
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "dynamic_rendering",
                    )])]),
                    vuids: &["VUID-vkCmdBeginRendering-dynamicRendering-06446"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                    ..Default::default()
                }));
                return;
            }

            if !errors.check(
                rendering_info
                    .validate(self.device())
                    .map_err(|err| err.add_context("rendering_info")),
            ) {
                return;
            }

            if self.level() == CommandBufferLevel::Secondary
                && rendering_info.contents == SubpassContents::SecondaryCommandBuffers
            {
                errors.push(Box::new(ValidationError {
                    context: "rendering_info.contents".into(),
                    problem: "is `SubpassContents::SecondaryCommandBuffers`, but the command \
                        buffer is a secondary command buffer"
                        .into(),
                    vuids: &["VUID-vkCmdBeginRendering-commandBuffer-06068"],
                    kind: Some(ViolationKind::BadContentsModeViolation),
                    ..Default::default()
                }));
            }

            begin_rendering_unchecked(inner, rendering_info);
        })
    }

    /// Ends the render pass previously begun with `begin_rendering`.
    pub fn end_rendering(&self) -> Result<(), ValidationErrors> {
        self.record(&END_RENDERING, |inner, errors| {
            let Some(render_pass_state) = inner.builder_state.render_pass.as_ref() else {
                return;
            };

            if !matches!(
                render_pass_state.render_pass,
                RenderPassStateType::BeginRendering
            ) {
                errors.push(Box::new(ValidationError {
                    problem: "the current render pass instance was not begun with \
                        `begin_rendering`"
                        .into(),
                    vuids: &["VUID-vkCmdEndRendering-None-06161"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
                return;
            }

            let inherited = self.level() == CommandBufferLevel::Secondary
                && inner
                    .inheritance_info
                    .as_ref()
                    .is_some_and(|info| info.render_pass.is_some());

            if inherited {
                errors.push(Box::new(ValidationError {
                    problem: "the current render pass instance was inherited from the primary \
                        command buffer, and was not begun in this command buffer"
                        .into(),
                    vuids: &["VUID-vkCmdEndRendering-commandBuffer-06162"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
                return;
            }

            let is_multiview = render_pass_state.rendering_info.view_mask != 0;

            validate_end_of_render_pass_scopes(
                inner,
                &["VUID-vkCmdEndRendering-None-06999"],
                &[],
                errors,
            );

            end_render_pass_scope(inner, is_multiview);
        })
    }

    /// Clears specific regions of specific attachments of the framebuffer.
    ///
    /// `attachments` specify the types of attachments and their clear values.
    /// `rects` specify the regions to clear.
    ///
    /// If the render pass uses multiview, each rect must only clear layer 0.
    pub fn clear_attachments(
        &self,
        attachments: &[ClearAttachment],
        rects: &[ClearRect],
    ) -> Result<(), ValidationErrors> {
        self.record(&CLEAR_ATTACHMENTS, |inner, errors| {
            let Some(render_pass_state) = inner.builder_state.render_pass.as_ref() else {
                return;
            };

            if attachments.is_empty() {
                errors.push(Box::new(ValidationError {
                    context: "attachments".into(),
                    problem: "is empty".into(),
                    vuids: &["VUID-vkCmdClearAttachments-attachmentCount-arraylength"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if rects.is_empty() {
                errors.push(Box::new(ValidationError {
                    context: "rects".into(),
                    problem: "is empty".into(),
                    vuids: &["VUID-vkCmdClearAttachments-rectCount-arraylength"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            let rendering_info = &render_pass_state.rendering_info;

            for (attachment_index, &attachment) in attachments.iter().enumerate() {
                errors.check(
                    validate_clear_attachment(attachment, rendering_info)
                        .map_err(|err| err.add_context(format!("attachments[{}]", attachment_index))),
                );
            }

            let is_multiview = rendering_info.view_mask != 0;
            let framebuffer = match &render_pass_state.render_pass {
                RenderPassStateType::BeginRenderPass(state) => state.framebuffer.as_ref(),
                RenderPassStateType::BeginRendering => None,
            };

            for (rect_index, rect) in rects.iter().enumerate() {
                let mut rect_errors = ValidationErrors::new();
                rect.validate(is_multiview, framebuffer.map(|f| &**f), &mut rect_errors);
                rect_errors.add_context(&format!("rects[{}]", rect_index));
                errors.append(rect_errors);
            }
        })
    }
}

fn begin_rendering_unchecked(inner: &mut CommandBufferInner, rendering_info: RenderingInfo) {
    let RenderingInfo {
        render_area_offset: _,
        render_area_extent: _,
        layer_count: _,
        view_mask,
        color_attachments,
        depth_attachment,
        stencil_attachment,
        contents,
        _ne: _,
    } = rendering_info;

    let rasterization_samples = color_attachments
        .iter()
        .flatten()
        .chain(depth_attachment.iter())
        .chain(stencil_attachment.iter())
        .map(|attachment| attachment.image_view.samples())
        .next();

    for attachment in color_attachments
        .iter()
        .flatten()
        .chain(depth_attachment.iter())
        .chain(stencil_attachment.iter())
    {
        inner.add_resource(&attachment.image_view);
        inner.add_resource(attachment.image_view.image());
    }

    inner.builder_state.render_pass = Some(RenderPassState {
        contents,
        rendering_info: PipelineRenderingCreateInfo {
            view_mask,
            color_attachment_formats: color_attachments
                .iter()
                .map(|attachment| attachment.as_ref().map(|a| a.image_view.format()))
                .collect(),
            depth_attachment_format: depth_attachment.map(|a| a.image_view.format()),
            stencil_attachment_format: stencil_attachment.map(|a| a.image_view.format()),
            ..Default::default()
        },
        rasterization_samples,
        render_pass: RenderPassStateType::BeginRendering,
    });
}

/// Reports the queries and transform feedback that were begun inside the render pass instance
/// and are still active at its end.
fn validate_end_of_render_pass_scopes(
    inner: &CommandBufferInner,
    query_vuids: &'static [&'static str],
    transform_feedback_vuids: &'static [&'static str],
    errors: &mut ValidationErrors,
) {
    let builder_state = &inner.builder_state;

    for (query_type, state) in &builder_state.queries {
        if state.in_subpass.is_some() {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "a query of type {:?} was begun inside the render pass instance, and is \
                    still active",
                    query_type,
                )
                .into(),
                vuids: query_vuids,
                kind: Some(ViolationKind::QueryScopeViolation),
                ..Default::default()
            }));
        }
    }

    if builder_state.transform_feedback.is_some() {
        errors.push(Box::new(ValidationError {
            problem: "transform feedback is active".into(),
            vuids: transform_feedback_vuids,
            kind: Some(ViolationKind::TransformFeedbackScopeViolation),
            ..Default::default()
        }));
    }

    if builder_state
        .conditional_rendering
        .as_ref()
        .is_some_and(|state| state.in_subpass.is_some())
    {
        errors.push(Box::new(ValidationError {
            problem: "conditional rendering was begun inside the render pass instance, and is \
                still active"
                .into(),
            vuids: &["VUID-vkCmdEndConditionalRenderingEXT-None-01987"],
            kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
            ..Default::default()
        }));
    }
}

fn end_render_pass_scope(inner: &mut CommandBufferInner, is_multiview: bool) {
    let builder_state = &mut inner.builder_state;
    builder_state.render_pass = None;

    // Scopes that can't outlive the render pass instance end with it.
    builder_state
        .queries
        .retain(|_, state| state.in_subpass.is_none());
    builder_state.transform_feedback = None;

    if builder_state
        .conditional_rendering
        .as_ref()
        .is_some_and(|state| state.in_subpass.is_some())
    {
        builder_state.conditional_rendering = None;
    }

    if is_multiview {
        builder_state.reset_non_render_pass_states();
    }
}

fn validate_clear_attachment(
    attachment: ClearAttachment,
    rendering_info: &PipelineRenderingCreateInfo,
) -> Result<(), Box<ValidationError>> {
    match attachment {
        ClearAttachment::Color {
            color_attachment,
            clear_value,
        } => {
            let Some(&Some(format)) = rendering_info
                .color_attachment_formats
                .get(color_attachment as usize)
            else {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "is a color clear of attachment {}, but the current subpass has no color \
                        attachment with that index",
                        color_attachment,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdClearAttachments-aspectMask-07271"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            };

            if !clear_value.is_compatible_with(format) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the clear value {:?} does not match the numeric type of the attachment \
                        format {:?}",
                        clear_value, format,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdClearAttachments-aspectMask-02501"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }
        }
        ClearAttachment::Depth(_)
        | ClearAttachment::Stencil(_)
        | ClearAttachment::DepthStencil(_) => {
            let clears_depth = matches!(
                attachment,
                ClearAttachment::Depth(_) | ClearAttachment::DepthStencil(_)
            );
            let clears_stencil = matches!(
                attachment,
                ClearAttachment::Stencil(_) | ClearAttachment::DepthStencil(_)
            );

            if clears_depth
                && !rendering_info
                    .depth_attachment_format
                    .is_some_and(|format| format.aspects().intersects(ImageAspects::DEPTH))
            {
                return Err(Box::new(ValidationError {
                    problem: "clears the depth aspect, but the current subpass has no depth \
                        attachment"
                        .into(),
                    vuids: &["VUID-vkCmdClearAttachments-aspectMask-07884"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }

            if clears_stencil
                && !rendering_info
                    .stencil_attachment_format
                    .is_some_and(|format| format.aspects().intersects(ImageAspects::STENCIL))
            {
                return Err(Box::new(ValidationError {
                    problem: "clears the stencil aspect, but the current subpass has no stencil \
                        attachment"
                        .into(),
                    vuids: &["VUID-vkCmdClearAttachments-aspectMask-07885"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }
        }
    }

    Ok(())
}

/// Parameters to begin a new render pass.
#[derive(Clone, Debug)]
pub struct RenderPassBeginInfo {
    /// The render pass to begin.
    ///
    /// If this is not the render pass that `framebuffer` was created with, it must be compatible
    /// with that render pass.
    ///
    /// The default value is the render pass of `framebuffer`.
    pub render_pass: Arc<RenderPass>,

    /// The framebuffer to use for rendering.
    ///
    /// There is no default value.
    pub framebuffer: Arc<Framebuffer>,

    /// The offset from the top left corner of the framebuffer that will be rendered to.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_offset: [u32; 2],

    /// The size of the area that will be rendered to.
    ///
    /// `render_area_offset + render_area_extent` must not be greater than
    /// [`framebuffer.extent()`](Framebuffer::extent).
    ///
    /// The default value is [`framebuffer.extent()`](Framebuffer::extent).
    pub render_area_extent: [u32; 2],

    pub _ne: crate::NonExhaustive,
}

impl RenderPassBeginInfo {
    /// Returns a `RenderPassBeginInfo` that renders to the whole of `framebuffer`, with the
    /// render pass it was created with.
    #[inline]
    pub fn framebuffer(framebuffer: Arc<Framebuffer>) -> Self {
        let render_area_extent = framebuffer.extent();

        Self {
            render_pass: framebuffer.render_pass().clone(),
            framebuffer,
            render_area_offset: [0, 0],
            render_area_extent,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref render_pass,
            ref framebuffer,
            render_area_offset,
            render_area_extent,
            _ne: _,
        } = self;

        let registry = device.registry();

        if !registry.is_alive(render_pass.handle()) {
            return Err(Box::new(ValidationError {
                context: "render_pass".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkRenderPassBeginInfo-renderPass-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !registry.is_alive(framebuffer.handle()) {
            return Err(Box::new(ValidationError {
                context: "framebuffer".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkRenderPassBeginInfo-framebuffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if let Some(attachment_index) = framebuffer
            .attachments()
            .iter()
            .position(|image_view| !image_view.is_alive())
        {
            return Err(Box::new(ValidationError {
                context: format!("framebuffer.attachments()[{}]", attachment_index).into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkRenderPassBeginInfo-framebuffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !render_pass.is_compatible_with(framebuffer.render_pass()) {
            return Err(Box::new(ValidationError {
                problem: "`render_pass` is not compatible with `framebuffer.render_pass()`".into(),
                vuids: &["VUID-VkRenderPassBeginInfo-renderPass-00904"],
                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                ..Default::default()
            }));
        }

        let framebuffer_extent = framebuffer.extent();

        for (dimension, vuids) in [
            (0, &["VUID-VkRenderPassBeginInfo-pNext-02852"] as &'static [_]),
            (1, &["VUID-VkRenderPassBeginInfo-pNext-02853"]),
        ] {
            if render_area_offset[dimension] as u64 + render_area_extent[dimension] as u64
                > framebuffer_extent[dimension] as u64
            {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`render_area_offset[{0}] + render_area_extent[{0}]` is greater than \
                        `framebuffer.extent()[{0}]`",
                        dimension,
                    )
                    .into(),
                    vuids,
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Parameters to begin rendering.
#[derive(Clone, Debug)]
pub struct RenderingInfo {
    /// The offset from the top left corner of the attachments that will be rendered to.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_offset: [u32; 2],

    /// The size of the area that will be rendered to.
    ///
    /// This value plus `render_area_offset` must be no larger than the smallest width and height
    /// of the attachment images.
    ///
    /// The default value is `[0, 0]`.
    pub render_area_extent: [u32; 2],

    /// The number of layers of the attachments that will be rendered to.
    ///
    /// If the render pass uses multiview (`view_mask` is not 0), then this value is ignored.
    /// Otherwise it must not be 0.
    ///
    /// The default value is `1`.
    pub layer_count: u32,

    /// If not `0`, enables multiview rendering, and specifies the view indices that are rendered
    /// to. The value is a bitmask, so that that for example `0b11` will draw to the first two
    /// views and `0b101` will draw to the first and third view.
    ///
    /// If set to a nonzero value, the [`multiview`](crate::device::DeviceFeatures::multiview)
    /// feature must be enabled on the device.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The color attachments to use for rendering.
    ///
    /// All color attachments must have the same `samples` value.
    ///
    /// The default value is empty.
    pub color_attachments: Vec<Option<RenderingAttachmentInfo>>,

    /// The depth attachment to use for rendering.
    ///
    /// The default value is `None`.
    pub depth_attachment: Option<RenderingAttachmentInfo>,

    /// The stencil attachment to use for rendering.
    ///
    /// The default value is `None`.
    pub stencil_attachment: Option<RenderingAttachmentInfo>,

    /// What kinds of commands will be recorded in the render pass: either inline draw commands, or
    /// executions of secondary command buffers.
    ///
    /// If recorded in a secondary command buffer, this must be [`SubpassContents::Inline`].
    ///
    /// The default value is [`SubpassContents::Inline`].
    pub contents: SubpassContents,

    pub _ne: crate::NonExhaustive,
}

impl Default for RenderingInfo {
    #[inline]
    fn default() -> Self {
        Self {
            render_area_offset: [0, 0],
            render_area_extent: [0, 0],
            layer_count: 1,
            view_mask: 0,
            color_attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
            contents: SubpassContents::Inline,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl RenderingInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            render_area_offset,
            render_area_extent,
            layer_count,
            view_mask,
            ref color_attachments,
            ref depth_attachment,
            ref stencil_attachment,
            contents: _,
            _ne: _,
        } = self;

        let properties = device.properties();

        if view_mask != 0 && !device.enabled_features().multiview {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "is not zero".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multiview",
                )])]),
                vuids: &["VUID-VkRenderingInfo-multiview-06127"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        let view_count = u32::BITS - view_mask.leading_zeros();

        if view_count > properties.max_multiview_view_count {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "the number of views exceeds the `max_multiview_view_count` limit".into(),
                vuids: &["VUID-VkRenderingInfo-viewMask-06128"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if view_mask == 0 && layer_count == 0 {
            return Err(Box::new(ValidationError {
                problem: "`view_mask` is zero, and `layer_count` is zero".into(),
                vuids: &["VUID-VkRenderingInfo-viewMask-06069"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if color_attachments.len() as u32 > properties.max_color_attachments {
            return Err(Box::new(ValidationError {
                context: "color_attachments".into(),
                problem: "the length exceeds the `max_color_attachments` limit".into(),
                vuids: &["VUID-VkRenderingInfo-colorAttachmentCount-06106"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        let mut samples: Option<SampleCount> = None;
        let mut check_samples =
            |image_view: &ImageView, context: String| -> Result<(), Box<ValidationError>> {
                match samples {
                    Some(samples) if samples != image_view.samples() => {
                        Err(Box::new(ValidationError {
                            context: context.into(),
                            problem: "the sample count is not equal to the sample count of the \
                                other attachments"
                                .into(),
                            vuids: &["VUID-VkRenderingInfo-multisampledRenderToSingleSampled-06857"],
                            kind: Some(ViolationKind::AttachmentMismatch),
                            ..Default::default()
                        }))
                    }
                    _ => {
                        samples = Some(image_view.samples());
                        Ok(())
                    }
                }
            };

        for (attachment_index, attachment_info) in color_attachments
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.as_ref().map(|a| (i, a)))
        {
            let context = || format!("color_attachments[{}]", attachment_index);
            attachment_info
                .validate(device)
                .map_err(|err| err.add_context(context()))?;

            let image_view = &attachment_info.image_view;

            if !image_view.usage().intersects(ImageUsage::COLOR_ATTACHMENT) {
                return Err(Box::new(ValidationError {
                    context: format!("{}.image_view.usage()", context()).into(),
                    problem: "does not contain `ImageUsage::COLOR_ATTACHMENT`".into(),
                    vuids: &["VUID-VkRenderingInfo-colorAttachmentCount-06087"],
                    kind: Some(ViolationKind::MissingUsage),
                    ..Default::default()
                }));
            }

            check_samples(image_view, context())?;
        }

        for (attachment_info, aspect, context, aspect_vuids, usage_vuids) in [
            (
                depth_attachment,
                ImageAspects::DEPTH,
                "depth_attachment",
                &["VUID-VkRenderingInfo-pDepthAttachment-06547"] as &'static [_],
                &["VUID-VkRenderingInfo-pDepthAttachment-06088"] as &'static [_],
            ),
            (
                stencil_attachment,
                ImageAspects::STENCIL,
                "stencil_attachment",
                &["VUID-VkRenderingInfo-pStencilAttachment-06548"],
                &["VUID-VkRenderingInfo-pStencilAttachment-06089"],
            ),
        ] {
            let Some(attachment_info) = attachment_info else {
                continue;
            };

            attachment_info
                .validate(device)
                .map_err(|err| err.add_context(context))?;

            let image_view = &attachment_info.image_view;

            if !image_view.format().aspects().intersects(aspect) {
                return Err(Box::new(ValidationError {
                    context: format!("{}.image_view.format()", context).into(),
                    problem: format!("does not have a {:?} aspect", aspect).into(),
                    vuids: aspect_vuids,
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            if !image_view
                .usage()
                .intersects(ImageUsage::DEPTH_STENCIL_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: format!("{}.image_view.usage()", context).into(),
                    problem: "does not contain `ImageUsage::DEPTH_STENCIL_ATTACHMENT`".into(),
                    vuids: usage_vuids,
                    kind: Some(ViolationKind::MissingUsage),
                    ..Default::default()
                }));
            }

            check_samples(image_view, context.to_owned())?;
        }

        if let (Some(depth_attachment), Some(stencil_attachment)) =
            (depth_attachment, stencil_attachment)
        {
            if !Arc::ptr_eq(&depth_attachment.image_view, &stencil_attachment.image_view) {
                return Err(Box::new(ValidationError {
                    problem: "`depth_attachment` and `stencil_attachment` are both `Some`, but \
                        have different image views"
                        .into(),
                    vuids: &["VUID-VkRenderingInfo-pDepthAttachment-06085"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }
        }

        for attachment_info in color_attachments
            .iter()
            .flatten()
            .chain(depth_attachment.iter())
            .chain(stencil_attachment.iter())
        {
            let extent = attachment_info.image_view.extent();

            for dimension in 0..2 {
                if render_area_offset[dimension] as u64 + render_area_extent[dimension] as u64
                    > extent[dimension] as u64
                {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "`render_area_offset[{0}] + render_area_extent[{0}]` is greater than \
                            dimension {0} of the extent of an attachment",
                            dimension,
                        )
                        .into(),
                        vuids: match dimension {
                            0 => &["VUID-VkRenderingInfo-pNext-06079"],
                            _ => &["VUID-VkRenderingInfo-pNext-06080"],
                        },
                        kind: Some(ViolationKind::RegionOutOfBounds),
                        ..Default::default()
                    }));
                }
            }
        }

        Ok(())
    }
}

/// Parameters to specify properties of an attachment.
#[derive(Clone, Debug)]
pub struct RenderingAttachmentInfo {
    /// The image view to use as the attachment.
    ///
    /// There is no default value.
    pub image_view: Arc<ImageView>,

    pub _ne: crate::NonExhaustive,
}

impl RenderingAttachmentInfo {
    /// Returns a `RenderingAttachmentInfo` with the specified `image_view`.
    #[inline]
    pub fn image_view(image_view: Arc<ImageView>) -> Self {
        Self {
            image_view,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, _device: &Device) -> Result<(), Box<ValidationError>> {
        if !self.image_view.is_alive() {
            return Err(Box::new(ValidationError {
                context: "image_view".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkRenderingAttachmentInfo-imageView-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Clear attachment type, used in [`clear_attachments`](CommandBuffer::clear_attachments).
#[derive(Clone, Copy, Debug)]
pub enum ClearAttachment {
    /// Clear the color attachment at the specified index, with the specified clear value.
    Color {
        color_attachment: u32,
        clear_value: ClearColorValue,
    },

    /// Clear the depth attachment with the specified depth value.
    Depth(f32),

    /// Clear the stencil attachment with the specified stencil value.
    Stencil(u32),

    /// Clear the depth and stencil attachments with the specified depth and stencil values.
    DepthStencil((f32, u32)),
}

/// Specifies the clear region for [`clear_attachments`](CommandBuffer::clear_attachments).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearRect {
    /// The rectangle offset.
    pub offset: [u32; 2],

    /// The width and height of the rectangle.
    pub extent: [u32; 2],

    /// The range of array layers to be cleared.
    pub array_layers: Range<u32>,
}

impl ClearRect {
    fn validate(
        &self,
        is_multiview: bool,
        framebuffer: Option<&Framebuffer>,
        errors: &mut ValidationErrors,
    ) {
        let &Self {
            offset,
            extent,
            ref array_layers,
        } = self;

        if extent[0] == 0 {
            errors.push(Box::new(ValidationError {
                context: "extent[0]".into(),
                problem: "is zero".into(),
                vuids: &["VUID-vkCmdClearAttachments-rect-02682"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if extent[1] == 0 {
            errors.push(Box::new(ValidationError {
                context: "extent[1]".into(),
                problem: "is zero".into(),
                vuids: &["VUID-vkCmdClearAttachments-rect-02683"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if array_layers.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdClearAttachments-layerCount-01934"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        // Each view of a multiview render pass renders to a single layer.
        if is_multiview && !array_layers.is_empty() && array_layers.end > 1 {
            errors.push(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: format!(
                    "is {:?}, but the current render pass instance uses multiview, so only layer \
                    0 can be cleared",
                    array_layers,
                )
                .into(),
                vuids: &["VUID-vkCmdClearAttachments-baseArrayLayer-00018"],
                kind: Some(ViolationKind::MultiviewLayerRangeViolation),
                ..Default::default()
            }));
        }

        if let Some(framebuffer) = framebuffer {
            let framebuffer_extent = framebuffer.extent();

            if offset[0] as u64 + extent[0] as u64 > framebuffer_extent[0] as u64
                || offset[1] as u64 + extent[1] as u64 > framebuffer_extent[1] as u64
            {
                errors.push(Box::new(ValidationError {
                    problem: "`offset + extent` is outside the render area".into(),
                    vuids: &["VUID-vkCmdClearAttachments-pRects-00016"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            if !array_layers.is_empty() && array_layers.end > framebuffer.layers() {
                errors.push(Box::new(ValidationError {
                    context: "array_layers.end".into(),
                    problem: "is greater than the number of layers of the framebuffer".into(),
                    vuids: &["VUID-vkCmdClearAttachments-pRects-06937"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        }
    }
}

impl ClearColorValue {
    fn is_compatible_with(self, format: Format) -> bool {
        matches!(
            (self, format.numeric_format_color()),
            (
                ClearColorValue::Float(_),
                Some(NumericType::SFLOAT | NumericType::UNORM | NumericType::SRGB)
            ) | (ClearColorValue::Int(_), Some(NumericType::SINT))
                | (ClearColorValue::Uint(_), Some(NumericType::UINT))
        )
    }
}
