// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::CommandInfo;
use crate::{
    command_buffer::{
        state::{RenderPassState, RenderPassStateType},
        CommandBuffer, CommandBufferInheritanceInfo, CommandBufferInheritanceRenderPassType,
        CommandBufferInner, CommandBufferLevel, CommandBufferState, CommandBufferUsage,
        InvalidReason, SubpassContents,
    },
    device::{queue::QueueFlags, DeviceOwned},
    gpu_av::InstrumentedCommand,
    query::QueryType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashSet;
use smallvec::SmallVec;
use std::sync::Arc;

const EXECUTE_COMMANDS: CommandInfo = command_info!(
    "vkCmdExecuteCommands",
    QueueFlags::TRANSFER
        .union(QueueFlags::GRAPHICS)
        .union(QueueFlags::COMPUTE),
    Any
)
.primary_only()
.allowed_in_secondary_contents();

/// What `execute_commands` needs to know about a secondary command buffer. Taken before the
/// primary command buffer is locked.
struct SecondarySnapshot {
    state: CommandBufferState,
    invalid_reason: Option<InvalidReason>,
    usage: CommandBufferUsage,
    inheritance_info: Option<CommandBufferInheritanceInfo>,
    protected: bool,
    instrumented: Vec<InstrumentedCommand>,
    required_queue_flags: Vec<(QueueFlags, &'static [&'static str])>,
}

impl CommandBuffer {
    fn secondary_snapshot(&self) -> SecondarySnapshot {
        let inner = self.lock();

        SecondarySnapshot {
            state: inner.current_state(),
            invalid_reason: inner.invalid_reason,
            usage: inner.usage,
            inheritance_info: inner.inheritance_info.clone(),
            protected: self.pool().is_protected(),
            instrumented: inner.instrumented.clone(),
            required_queue_flags: inner.required_queue_flags.clone(),
        }
    }

    /// Executes secondary command buffers in this primary command buffer.
    ///
    /// Inside a render pass instance, the current subpass must have been begun with
    /// [`SubpassContents::SecondaryCommandBuffers`], and every secondary command buffer must have
    /// been begun with an inheritance info for a compatible render pass and the current subpass.
    /// Outside a render pass instance, the secondary command buffers must not inherit a render
    /// pass.
    ///
    /// The bound state of this command buffer is reset afterwards. The secondary command buffers
    /// become referenced by this command buffer, so recording or resetting one of them makes this
    /// command buffer invalid.
    pub fn execute_commands(
        &self,
        command_buffers: &[Arc<CommandBuffer>],
    ) -> Result<(), ValidationErrors> {
        let snapshots: SmallVec<[_; 4]> = command_buffers
            .iter()
            .map(|command_buffer| command_buffer.secondary_snapshot())
            .collect();
        let protected = self.pool().is_protected();

        self.record(&EXECUTE_COMMANDS, |inner, errors| {
            if command_buffers.is_empty() {
                errors.push(Box::new(ValidationError {
                    context: "command_buffers".into(),
                    problem: "is empty".into(),
                    vuids: &["VUID-vkCmdExecuteCommands-commandBufferCount-arraylength"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));

                return;
            }

            if let Some(render_pass_state) = &inner.builder_state.render_pass {
                if render_pass_state.contents != SubpassContents::SecondaryCommandBuffers {
                    errors.push(Box::new(ValidationError {
                        problem: "a render pass instance is active, but its current subpass was \
                            not begun with `SubpassContents::SecondaryCommandBuffers`"
                            .into(),
                        vuids: match render_pass_state.render_pass {
                            RenderPassStateType::BeginRenderPass(_) => {
                                &["VUID-vkCmdExecuteCommands-contents-06018"]
                            }
                            RenderPassStateType::BeginRendering => {
                                &["VUID-vkCmdExecuteCommands-flags-06024"]
                            }
                        },
                        kind: Some(ViolationKind::BadContentsModeViolation),
                        ..Default::default()
                    }));
                }
            }

            if inner.builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is active".into(),
                    vuids: &["VUID-vkCmdExecuteCommands-None-02286"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));
            }

            let mut seen: HashSet<Handle> = HashSet::default();

            for (index, (command_buffer, snapshot)) in
                command_buffers.iter().zip(&snapshots).enumerate()
            {
                let mut secondary_errors = ValidationErrors::new();
                validate_secondary(
                    inner,
                    protected,
                    command_buffer,
                    snapshot,
                    !seen.insert(command_buffer.handle()),
                    &mut secondary_errors,
                );
                secondary_errors.add_context(&format!("command_buffers[{}]", index));
                errors.append(secondary_errors);
            }

            execute_commands_unchecked(self, inner, command_buffers, &snapshots);
        })
    }
}

fn validate_secondary(
    inner: &CommandBufferInner,
    protected: bool,
    command_buffer: &Arc<CommandBuffer>,
    snapshot: &SecondarySnapshot,
    duplicate: bool,
    errors: &mut ValidationErrors,
) {
    if command_buffer.level() != CommandBufferLevel::Secondary {
        errors.push(Box::new(ValidationError {
            problem: "is not a secondary command buffer".into(),
            vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00088"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));

        return;
    }

    match snapshot.state {
        CommandBufferState::Executable | CommandBufferState::Pending => (),
        CommandBufferState::Invalid => {
            errors.push(Box::new(ValidationError {
                problem: match snapshot.invalid_reason {
                    Some(reason) => format!("is in the invalid state, because {}", reason),
                    None => "is in the invalid state".to_owned(),
                }
                .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00089"],
                kind: Some(ViolationKind::InvalidCommandBufferViolation),
                ..Default::default()
            }));

            return;
        }
        state => {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "is in the {:?} state, but must be in the executable or pending state",
                    state,
                )
                .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00089"],
                kind: Some(ViolationKind::CommandBufferStateViolation),
                ..Default::default()
            }));

            return;
        }
    }

    if snapshot.usage != CommandBufferUsage::SimultaneousUse {
        if snapshot.state == CommandBufferState::Pending {
            errors.push(Box::new(ValidationError {
                problem: "is in the pending state, and was not recorded with \
                    `CommandBufferUsage::SimultaneousUse`"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00090"],
                kind: Some(ViolationKind::SimultaneousUseViolation),
                ..Default::default()
            }));
        }

        if inner.secondaries.iter().any(|s| s.handle() == command_buffer.handle()) {
            errors.push(Box::new(ValidationError {
                problem: "was already executed in this command buffer, and was not recorded \
                    with `CommandBufferUsage::SimultaneousUse`"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00091"],
                kind: Some(ViolationKind::SimultaneousUseViolation),
                ..Default::default()
            }));
        }

        if duplicate {
            errors.push(Box::new(ValidationError {
                problem: "appears more than once in `command_buffers`, and was not recorded \
                    with `CommandBufferUsage::SimultaneousUse`"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00092"],
                kind: Some(ViolationKind::SimultaneousUseViolation),
                ..Default::default()
            }));
        }
    }

    match (protected, snapshot.protected) {
        (true, false) => {
            errors.push(Box::new(ValidationError {
                problem: "is an unprotected command buffer, but the primary command buffer is \
                    protected"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-01820"],
                kind: Some(ViolationKind::ProtectedSubmitMismatch),
                ..Default::default()
            }));
        }
        (false, true) => {
            errors.push(Box::new(ValidationError {
                problem: "is a protected command buffer, but the primary command buffer is \
                    unprotected"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-01821"],
                kind: Some(ViolationKind::ProtectedSubmitMismatch),
                ..Default::default()
            }));
        }
        _ => (),
    }

    let Some(inheritance_info) = &snapshot.inheritance_info else {
        return;
    };

    let builder_state = &inner.builder_state;

    match (&builder_state.render_pass, &inheritance_info.render_pass) {
        (Some(render_pass_state), Some(inherited)) => {
            validate_inherited_render_pass(render_pass_state, inherited, errors);
        }
        (Some(_), None) => {
            errors.push(Box::new(ValidationError {
                problem: "a render pass instance is active, but the command buffer was not \
                    begun with a render pass in its inheritance info"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00096"],
                kind: Some(ViolationKind::ScopeMismatchViolation),
                ..Default::default()
            }));
        }
        (None, Some(_)) => {
            errors.push(Box::new(ValidationError {
                problem: "no render pass instance is active, but the command buffer was begun \
                    with a render pass in its inheritance info"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00100"],
                kind: Some(ViolationKind::ScopeMismatchViolation),
                ..Default::default()
            }));
        }
        (None, None) => (),
    }

    for (&query_type, query_state) in &builder_state.queries {
        match query_type {
            QueryType::Occlusion => match inheritance_info.occlusion_query {
                None => {
                    errors.push(Box::new(ValidationError {
                        problem: "an occlusion query is active, but the inheritance info of the \
                            command buffer has no `occlusion_query`"
                            .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-00102"],
                        kind: Some(ViolationKind::MissingOcclusionQueryInheritance),
                        ..Default::default()
                    }));
                }
                Some(control_flags) if !control_flags.contains(query_state.flags) => {
                    errors.push(Box::new(ValidationError {
                        problem: format!(
                            "an occlusion query is active with flags {:?}, but the \
                            `occlusion_query` of the inheritance info of the command buffer \
                            ({:?}) does not contain all of them",
                            query_state.flags, control_flags,
                        )
                        .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-00103"],
                        kind: Some(ViolationKind::MissingOcclusionQueryInheritance),
                        ..Default::default()
                    }));
                }
                Some(_) => (),
            },
            QueryType::PipelineStatistics => {
                let statistics = query_state.query_pool.pipeline_statistics();

                if !inheritance_info.query_statistics_flags.contains(statistics) {
                    errors.push(Box::new(ValidationError {
                        problem: format!(
                            "a pipeline statistics query is active with statistics {:?}, but \
                            the `query_statistics_flags` of the inheritance info of the command \
                            buffer ({:?}) does not contain all of them",
                            statistics, inheritance_info.query_statistics_flags,
                        )
                        .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-00104"],
                        kind: Some(ViolationKind::QueryScopeViolation),
                        ..Default::default()
                    }));
                }
            }
            _ => {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "a query of type {:?} is active, but only occlusion and pipeline \
                        statistics queries may be active when executing secondary command \
                        buffers",
                        query_type,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdExecuteCommands-commandBuffer-00105"],
                    kind: Some(ViolationKind::QueryScopeViolation),
                    ..Default::default()
                }));
            }
        }
    }

    if builder_state.conditional_rendering.is_some()
        && !inheritance_info.conditional_rendering_enable
    {
        errors.push(Box::new(ValidationError {
            problem: "conditional rendering is active, but the inheritance info of the command \
                buffer has `conditional_rendering_enable` set to `false`"
                .into(),
            vuids: &["UNASSIGNED-vkCmdExecuteCommands-conditionalRenderingEnable"],
            kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
            ..Default::default()
        }));
    }
}

fn validate_inherited_render_pass(
    render_pass_state: &RenderPassState,
    inherited: &CommandBufferInheritanceRenderPassType,
    errors: &mut ValidationErrors,
) {
    match (&render_pass_state.render_pass, inherited) {
        (
            RenderPassStateType::BeginRenderPass(state),
            CommandBufferInheritanceRenderPassType::BeginRenderPass(info),
        ) => {
            if !info
                .subpass
                .render_pass()
                .is_compatible_with(state.subpass.render_pass())
            {
                errors.push(Box::new(ValidationError {
                    problem: "the render pass of the inheritance info is not compatible with \
                        the render pass of the current render pass instance"
                        .into(),
                    vuids: &["VUID-vkCmdExecuteCommands-pBeginInfo-06020"],
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            }

            if info.subpass.index() != state.subpass.index() {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the command buffer was begun for subpass {}, but the current subpass \
                        is {}",
                        info.subpass.index(),
                        state.subpass.index(),
                    )
                    .into(),
                    vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-06019"],
                    kind: Some(ViolationKind::SubpassIndexMismatchViolation),
                    ..Default::default()
                }));
            }

            if let (Some(inherited_framebuffer), Some(framebuffer)) =
                (&info.framebuffer, &state.framebuffer)
            {
                if inherited_framebuffer.handle() != framebuffer.handle() {
                    errors.push(Box::new(ValidationError {
                        problem: "the inheritance info of the command buffer names a framebuffer \
                            that is not the framebuffer of the current render pass instance"
                            .into(),
                        vuids: &["VUID-vkCmdExecuteCommands-pCommandBuffers-00099"],
                        kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                        ..Default::default()
                    }));
                }
            }
        }
        (
            RenderPassStateType::BeginRenderPass(_),
            CommandBufferInheritanceRenderPassType::BeginRendering(_),
        ) => {
            errors.push(Box::new(ValidationError {
                problem: "the current render pass instance was begun with `begin_render_pass`, \
                    but the command buffer inherits dynamic rendering"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pBeginInfo-06020"],
                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                ..Default::default()
            }));
        }
        (
            RenderPassStateType::BeginRendering,
            CommandBufferInheritanceRenderPassType::BeginRenderPass(_),
        ) => {
            errors.push(Box::new(ValidationError {
                problem: "the current render pass instance was begun with `begin_rendering`, \
                    but the command buffer inherits a render pass object"
                    .into(),
                vuids: &["VUID-vkCmdExecuteCommands-pBeginInfo-06025"],
                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                ..Default::default()
            }));
        }
        (
            RenderPassStateType::BeginRendering,
            CommandBufferInheritanceRenderPassType::BeginRendering(info),
        ) => {
            let current = &render_pass_state.rendering_info;
            let mut mismatch = |problem: String, vuids: &'static [&'static str]| {
                errors.push(Box::new(ValidationError {
                    problem: problem.into(),
                    vuids,
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            };

            if info.color_attachment_formats.len() != current.color_attachment_formats.len() {
                mismatch(
                    format!(
                        "the command buffer inherits {} color attachments, but the current \
                        render pass instance has {}",
                        info.color_attachment_formats.len(),
                        current.color_attachment_formats.len(),
                    ),
                    &["VUID-vkCmdExecuteCommands-colorAttachmentCount-06027"],
                );
            } else {
                for (index, (inherited, actual)) in info
                    .color_attachment_formats
                    .iter()
                    .zip(&current.color_attachment_formats)
                    .enumerate()
                {
                    if inherited != actual {
                        mismatch(
                            format!(
                                "the inherited format of color attachment {} ({:?}) is not the \
                                format of the current render pass instance ({:?})",
                                index, inherited, actual,
                            ),
                            &["VUID-vkCmdExecuteCommands-imageView-06028"],
                        );
                    }
                }
            }

            if info.depth_attachment_format != current.depth_attachment_format {
                mismatch(
                    format!(
                        "the inherited depth attachment format ({:?}) is not the format of the \
                        current render pass instance ({:?})",
                        info.depth_attachment_format, current.depth_attachment_format,
                    ),
                    &["VUID-vkCmdExecuteCommands-pDepthAttachment-06029"],
                );
            }

            if info.stencil_attachment_format != current.stencil_attachment_format {
                mismatch(
                    format!(
                        "the inherited stencil attachment format ({:?}) is not the format of \
                        the current render pass instance ({:?})",
                        info.stencil_attachment_format, current.stencil_attachment_format,
                    ),
                    &["VUID-vkCmdExecuteCommands-pStencilAttachment-06030"],
                );
            }

            if info.view_mask != current.view_mask {
                mismatch(
                    format!(
                        "the inherited view mask ({:#b}) is not the view mask of the current \
                        render pass instance ({:#b})",
                        info.view_mask, current.view_mask,
                    ),
                    &["VUID-vkCmdExecuteCommands-viewMask-06031"],
                );
            }

            if let Some(samples) = render_pass_state.rasterization_samples {
                if info.rasterization_samples != samples {
                    mismatch(
                        format!(
                            "the inherited sample count ({:?}) is not the sample count of the \
                            attachments of the current render pass instance ({:?})",
                            info.rasterization_samples, samples,
                        ),
                        &["VUID-vkCmdExecuteCommands-pNext-06035"],
                    );
                }
            }
        }
    }
}

fn execute_commands_unchecked(
    primary: &CommandBuffer,
    inner: &mut CommandBufferInner,
    command_buffers: &[Arc<CommandBuffer>],
    snapshots: &[SecondarySnapshot],
) {
    for (command_buffer, snapshot) in command_buffers.iter().zip(snapshots) {
        if inner.usage == CommandBufferUsage::SimultaneousUse
            && snapshot.usage != CommandBufferUsage::SimultaneousUse
        {
            primary.device().warn_performance(
                "UNASSIGNED-CoreValidation-DrawState-InvalidCommandBufferSimultaneousUse",
                &format!(
                    "command buffer {} was begun with `CommandBufferUsage::SimultaneousUse`, but \
                    executes command buffer {}, which was not; it is treated as if it was begun \
                    without `CommandBufferUsage::SimultaneousUse`",
                    primary.handle(),
                    command_buffer.handle(),
                ),
            );
            inner.usage = CommandBufferUsage::MultipleSubmit;
        }

        inner.add_resource(command_buffer);

        if !inner
            .secondaries
            .iter()
            .any(|secondary| secondary.handle() == command_buffer.handle())
        {
            inner.secondaries.push(command_buffer.clone());
        }

        inner
            .instrumented
            .extend(snapshot.instrumented.iter().cloned());

        for required in &snapshot.required_queue_flags {
            if !inner.required_queue_flags.contains(required) {
                inner.required_queue_flags.push(*required);
            }
        }
    }

    // The bound state of the primary command buffer is undefined after the secondary command
    // buffers have executed.
    inner.builder_state.reset_non_render_pass_states();
}

#[cfg(test)]
mod tests {
    use crate::{
        command_buffer::{
            pool::CommandPoolCreateFlags, CommandBuffer, CommandBufferBeginInfo,
            CommandBufferInheritanceInfo, CommandBufferInheritanceRenderPassInfo,
            CommandBufferLevel, CommandBufferState, CommandBufferUsage, InvalidReason,
            RenderPassBeginInfo, SubpassContents,
        },
        device::Device,
        format::Format,
        query::{QueryControlFlags, QueryPool, QueryPoolCreateInfo, QueryType},
        render_pass::{
            AttachmentDescription, RenderPass, RenderPassCreateInfo, Subpass, SubpassDescription,
        },
        ViolationKind, VulkanObject,
    };
    use std::sync::Arc;

    /// Records an empty secondary command buffer.
    fn secondary(
        device: &Arc<Device>,
        inheritance_info: CommandBufferInheritanceInfo,
        usage: CommandBufferUsage,
    ) -> Arc<CommandBuffer> {
        let pool =
            crate::tests::command_pool(device, 0, CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);
        cb.begin(CommandBufferBeginInfo {
            usage,
            ..CommandBufferBeginInfo::inheritance_info(inheritance_info)
        })
        .unwrap();
        cb.end().unwrap();

        cb
    }

    fn for_subpass(render_pass: &Arc<RenderPass>, index: u32) -> CommandBufferInheritanceInfo {
        CommandBufferInheritanceInfo {
            render_pass: Some(
                CommandBufferInheritanceRenderPassInfo::subpass(
                    Subpass::from(render_pass.clone(), index).unwrap(),
                )
                .into(),
            ),
            ..Default::default()
        }
    }

    fn begin_render_pass(
        device: &Arc<Device>,
        render_pass: &Arc<RenderPass>,
        contents: SubpassContents,
    ) -> Arc<CommandBuffer> {
        let framebuffer = crate::tests::framebuffer(render_pass, 1);
        let cb = crate::tests::primary(device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(RenderPassBeginInfo::framebuffer(framebuffer), contents)
            .unwrap();

        cb
    }

    #[test]
    fn inline_contents() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let secondary = secondary(
            &device,
            for_subpass(&render_pass, 0),
            CommandBufferUsage::MultipleSubmit,
        );
        let cb = begin_render_pass(&device, &render_pass, SubpassContents::Inline);

        let errors = cb.execute_commands(&[secondary]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-contents-06018"));
        assert!(errors.contains_kind(ViolationKind::BadContentsModeViolation));
    }

    #[test]
    fn compatible_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        // A different but compatible render pass object.
        let other_render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let secondary = secondary(
            &device,
            for_subpass(&other_render_pass, 0),
            CommandBufferUsage::MultipleSubmit,
        );
        let cb = begin_render_pass(&device, &render_pass, SubpassContents::SecondaryCommandBuffers);

        cb.execute_commands(&[secondary]).unwrap();
        cb.end_render_pass().unwrap();
        cb.end().unwrap();
    }

    #[test]
    fn incompatible_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let other_render_pass =
            crate::tests::single_color_render_pass(&device, Format::B8G8R8A8_UNORM, 0);
        let secondary = secondary(
            &device,
            for_subpass(&other_render_pass, 0),
            CommandBufferUsage::MultipleSubmit,
        );
        let cb = begin_render_pass(&device, &render_pass, SubpassContents::SecondaryCommandBuffers);

        let errors = cb.execute_commands(&[secondary]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pBeginInfo-06020"));
        assert!(errors.contains_kind(ViolationKind::IncompatibleRenderPassViolation));
    }

    #[test]
    fn subpass_index_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = RenderPass::new(
            device.clone(),
            RenderPassCreateInfo {
                attachments: vec![AttachmentDescription {
                    format: Format::R8G8B8A8_UNORM,
                    ..Default::default()
                }],
                subpasses: vec![
                    SubpassDescription {
                        color_attachments: vec![Some(0)],
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
        .unwrap();
        let first = secondary(
            &device,
            for_subpass(&render_pass, 0),
            CommandBufferUsage::MultipleSubmit,
        );
        let second = secondary(
            &device,
            for_subpass(&render_pass, 1),
            CommandBufferUsage::MultipleSubmit,
        );
        let cb = begin_render_pass(&device, &render_pass, SubpassContents::SecondaryCommandBuffers);

        cb.execute_commands(&[first.clone()]).unwrap();
        cb.next_subpass(SubpassContents::SecondaryCommandBuffers)
            .unwrap();

        let errors = cb.execute_commands(&[first]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-06019"));
        assert!(errors.contains_kind(ViolationKind::SubpassIndexMismatchViolation));

        cb.execute_commands(&[second]).unwrap();
    }

    #[test]
    fn scope_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let inside = secondary(
            &device,
            for_subpass(&render_pass, 0),
            CommandBufferUsage::MultipleSubmit,
        );
        let outside = secondary(&device, Default::default(), CommandBufferUsage::MultipleSubmit);

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        let errors = cb.execute_commands(&[inside]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00100"));
        assert!(errors.contains_kind(ViolationKind::ScopeMismatchViolation));

        let cb = begin_render_pass(&device, &render_pass, SubpassContents::SecondaryCommandBuffers);
        let errors = cb.execute_commands(&[outside]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00096"));
        assert!(errors.contains_kind(ViolationKind::ScopeMismatchViolation));
    }

    #[test]
    fn occlusion_query_inheritance() {
        let (device, _queue) = gfx_dev_and_queue!();
        let query_pool = QueryPool::new(
            device.clone(),
            QueryPoolCreateInfo {
                query_count: 1,
                ..QueryPoolCreateInfo::query_type(QueryType::Occlusion)
            },
        )
        .unwrap();
        let without = secondary(&device, Default::default(), CommandBufferUsage::MultipleSubmit);
        let with = secondary(
            &device,
            CommandBufferInheritanceInfo {
                occlusion_query: Some(QueryControlFlags::empty()),
                ..Default::default()
            },
            CommandBufferUsage::MultipleSubmit,
        );

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_query(&query_pool, 0, QueryControlFlags::empty())
            .unwrap();

        let errors = cb.execute_commands(&[without]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-commandBuffer-00102"));
        assert!(errors.contains_kind(ViolationKind::MissingOcclusionQueryInheritance));

        cb.execute_commands(&[with]).unwrap();
    }

    #[test]
    fn not_executable() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let recording = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);
        recording
            .begin(CommandBufferBeginInfo::inheritance_info(Default::default()))
            .unwrap();

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.execute_commands(&[recording]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00089"));
        assert!(errors.contains_kind(ViolationKind::CommandBufferStateViolation));

        let errors = cb.execute_commands(&[cb.clone()]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00088"));
    }

    #[test]
    fn executed_twice_without_simultaneous_use() {
        let (device, _queue) = gfx_dev_and_queue!();
        let secondary = secondary(&device, Default::default(), CommandBufferUsage::MultipleSubmit);
        let simultaneous = secondary_simultaneous(&device);

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .execute_commands(&[secondary.clone(), secondary.clone()])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00092"));
        assert!(errors.contains_kind(ViolationKind::SimultaneousUseViolation));

        let errors = cb.execute_commands(&[secondary]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdExecuteCommands-pCommandBuffers-00091"));

        cb.execute_commands(&[simultaneous.clone(), simultaneous.clone()])
            .unwrap();
        cb.execute_commands(&[simultaneous]).unwrap();
    }

    fn secondary_simultaneous(device: &Arc<Device>) -> Arc<CommandBuffer> {
        secondary(device, Default::default(), CommandBufferUsage::SimultaneousUse)
    }

    #[test]
    fn simultaneous_use_downgraded() {
        let (device, _queue) = gfx_dev_and_queue!();
        let secondary = secondary(&device, Default::default(), CommandBufferUsage::MultipleSubmit);

        let cb = crate::tests::primary(&device);
        cb.begin(CommandBufferBeginInfo {
            usage: CommandBufferUsage::SimultaneousUse,
            ..Default::default()
        })
        .unwrap();

        // Only a performance warning.
        cb.execute_commands(&[secondary]).unwrap();
        assert_eq!(cb.usage(), CommandBufferUsage::MultipleSubmit);
    }

    #[test]
    fn rerecorded_secondary_invalidates_primary() {
        let (device, _queue) = gfx_dev_and_queue!();
        let secondary = secondary(&device, Default::default(), CommandBufferUsage::MultipleSubmit);

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.execute_commands(&[secondary.clone()]).unwrap();
        cb.end().unwrap();
        assert_eq!(cb.state(), CommandBufferState::Executable);

        secondary
            .begin(CommandBufferBeginInfo::inheritance_info(Default::default()))
            .unwrap();

        assert_eq!(cb.state(), CommandBufferState::Invalid);
        assert_eq!(
            cb.invalid_reason(),
            Some(InvalidReason::SecondaryInvalidated(secondary.handle())),
        );
    }
}
