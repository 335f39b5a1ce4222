// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The commands that can be recorded into a command buffer.
//!
//! Every command goes through [`CommandBuffer::record`], which checks the rules that all
//! commands share, and then runs the checks and state updates of the command itself.

use super::{CommandBuffer, CommandBufferInner, CommandBufferLevel, CommandBufferState};
use crate::{
    device::{queue::QueueFlags, DeviceOwned},
    ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};

/// Builds the [`CommandInfo`] of a command from its Vulkan name.
macro_rules! command_info {
    ($name:literal, $queue_flags:expr, $render_pass:ident) => {
        $crate::command_buffer::commands::CommandInfo {
            name: $name,
            queue_flags: $queue_flags,
            render_pass: $crate::command_buffer::commands::RenderPassScope::$render_pass,
            primary_only: false,
            allowed_in_secondary_contents: false,
            vuids: $crate::command_buffer::commands::CommandVuids {
                parameter: &[concat!("VUID-", $name, "-commandBuffer-parameter")],
                recording: &[concat!("VUID-", $name, "-commandBuffer-recording")],
                cmdpool: &[concat!("VUID-", $name, "-commandBuffer-cmdpool")],
                renderpass: &[concat!("VUID-", $name, "-renderpass")],
                bufferlevel: &[concat!("VUID-", $name, "-bufferlevel")],
                contents: &[concat!("UNASSIGNED-", $name, "-contents")],
            },
        }
    };
}

pub(super) mod bind_push;
pub(super) mod clear;
pub(super) mod conditional_rendering;
pub(super) mod dynamic_state;
pub(super) mod image;
mod pipeline;
mod query;
pub(super) mod render_pass;
mod secondary;
mod sync;
pub(super) mod transfer;
mod transform_feedback;

/// Where a command may be recorded, relative to a render pass instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::command_buffer) enum RenderPassScope {
    Inside,
    Outside,
    Any,
}

/// The rules that every command is checked against before its own checks.
#[derive(Clone, Copy, Debug)]
pub(in crate::command_buffer) struct CommandInfo {
    pub(in crate::command_buffer) name: &'static str,
    // The queue family must support at least one of these.
    pub(in crate::command_buffer) queue_flags: QueueFlags,
    pub(in crate::command_buffer) render_pass: RenderPassScope,
    pub(in crate::command_buffer) primary_only: bool,
    // Whether the command may be recorded in a subpass begun with
    // `SubpassContents::SecondaryCommandBuffers`.
    pub(in crate::command_buffer) allowed_in_secondary_contents: bool,
    pub(in crate::command_buffer) vuids: CommandVuids,
}

impl CommandInfo {
    pub(in crate::command_buffer) const fn primary_only(mut self) -> Self {
        self.primary_only = true;
        self
    }

    pub(in crate::command_buffer) const fn allowed_in_secondary_contents(mut self) -> Self {
        self.allowed_in_secondary_contents = true;
        self
    }
}

#[derive(Clone, Copy, Debug)]
pub(in crate::command_buffer) struct CommandVuids {
    pub(in crate::command_buffer) parameter: &'static [&'static str],
    pub(in crate::command_buffer) recording: &'static [&'static str],
    pub(in crate::command_buffer) cmdpool: &'static [&'static str],
    pub(in crate::command_buffer) renderpass: &'static [&'static str],
    pub(in crate::command_buffer) bufferlevel: &'static [&'static str],
    pub(in crate::command_buffer) contents: &'static [&'static str],
}

impl CommandBuffer {
    /// Validates the rules shared by all commands, then calls `record` to validate and record the
    /// command itself, and reports every error that was found.
    ///
    /// If the command buffer is not recording, nothing is recorded and only that error is
    /// reported.
    pub(in crate::command_buffer) fn record(
        &self,
        info: &CommandInfo,
        record: impl FnOnce(&mut CommandBufferInner, &mut ValidationErrors),
    ) -> Result<(), ValidationErrors> {
        let device = self.device();
        let mut errors = ValidationErrors::new();

        {
            let mut inner = self.lock();

            if let Err(err) = self.validate_recording(&inner, info) {
                drop(inner);
                return Err(device.reported(err));
            }

            self.validate_command_common(&mut inner, info, &mut errors);
            record(&mut inner, &mut errors);
        }

        tracing::trace!(
            command_buffer = %self.handle(),
            command = info.name,
            errors = errors.len(),
            "command recorded",
        );

        device.report(errors)
    }

    fn validate_recording(
        &self,
        inner: &CommandBufferInner,
        info: &CommandInfo,
    ) -> Result<(), Box<ValidationError>> {
        if !self.device().registry().is_alive(self.handle()) {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "has been freed".into(),
                vuids: info.vuids.parameter,
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if inner.state != CommandBufferState::Recording {
            let problem = match (inner.state, inner.invalid_reason) {
                (CommandBufferState::Invalid, Some(reason)) => {
                    format!("is in the invalid state, because {}", reason)
                }
                _ => format!(
                    "is in the {:?} state, but must be in the recording state",
                    inner.current_state(),
                ),
            };

            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: problem.into(),
                vuids: info.vuids.recording,
                kind: Some(ViolationKind::CommandBufferNotRecording),
                ..Default::default()
            }));
        }

        Ok(())
    }

    fn validate_command_common(
        &self,
        inner: &mut CommandBufferInner,
        info: &CommandInfo,
        errors: &mut ValidationErrors,
    ) {
        let queue_flags = self.pool().queue_flags();

        if !queue_flags.intersects(info.queue_flags) {
            errors.push(Box::new(ValidationError {
                context: "self".into(),
                problem: format!(
                    "the queue family of the command buffer supports {:?}, but `{}` requires one \
                    of {:?}",
                    queue_flags, info.name, info.queue_flags,
                )
                .into(),
                vuids: info.vuids.cmdpool,
                kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                ..Default::default()
            }));
        }

        // Checked again when the command buffer is submitted.
        let required = (info.queue_flags, info.vuids.cmdpool);
        if !inner.required_queue_flags.contains(&required) {
            inner.required_queue_flags.push(required);
        }

        if info.primary_only && self.level() == CommandBufferLevel::Secondary {
            errors.push(Box::new(ValidationError {
                context: "self".into(),
                problem: format!(
                    "is a secondary command buffer, but `{}` can only be recorded in primary \
                    command buffers",
                    info.name,
                )
                .into(),
                vuids: info.vuids.bufferlevel,
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let render_pass_state = inner.builder_state.render_pass.as_ref();

        match (info.render_pass, render_pass_state) {
            (RenderPassScope::Inside, None) => {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "`{}` must be recorded inside a render pass instance, but no render pass \
                        instance is active",
                        info.name,
                    )
                    .into(),
                    vuids: info.vuids.renderpass,
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
            }
            (RenderPassScope::Outside, Some(_)) => {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "`{}` must be recorded outside a render pass instance, but a render pass \
                        instance is active",
                        info.name,
                    )
                    .into(),
                    vuids: info.vuids.renderpass,
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
            }
            _ => (),
        }

        if let Some(render_pass_state) = render_pass_state {
            if render_pass_state.contents == super::SubpassContents::SecondaryCommandBuffers
                && !info.allowed_in_secondary_contents
            {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the current subpass was begun with \
                        `SubpassContents::SecondaryCommandBuffers`, so it can only contain \
                        `execute_commands`, but `{}` was recorded",
                        info.name,
                    )
                    .into(),
                    vuids: info.vuids.contents,
                    kind: Some(ViolationKind::BadContentsModeViolation),
                    ..Default::default()
                }));
            }
        }
    }
}

/// Reports using an unprotected resource for writing in a protected command buffer, and using a
/// protected resource in an unprotected command buffer.
pub(in crate::command_buffer) fn validate_protected_access(
    command_buffer_protected: bool,
    resource_protected: bool,
    context: &'static str,
    unprotected_command_buffer_vuids: &'static [&'static str],
    protected_command_buffer_vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    match (command_buffer_protected, resource_protected) {
        (false, true) => Err(Box::new(ValidationError {
            context: context.into(),
            problem: "is a protected resource, but the command buffer is unprotected".into(),
            vuids: unprotected_command_buffer_vuids,
            kind: Some(ViolationKind::ProtectedResourceMismatch),
            ..Default::default()
        })),
        (true, false) if !protected_command_buffer_vuids.is_empty() => {
            Err(Box::new(ValidationError {
                context: context.into(),
                problem: "is an unprotected resource that is written to, but the command buffer \
                    is protected"
                    .into(),
                vuids: protected_command_buffer_vuids,
                kind: Some(ViolationKind::ProtectedResourceMismatch),
                ..Default::default()
            }))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        command_buffer::{
            pool::CommandPoolCreateFlags, CommandBufferLevel, CommandBufferState,
            SubpassContents,
        },
        ViolationKind,
    };

    #[test]
    fn not_recording() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);

        let errors = cb.set_line_width(1.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetLineWidth-commandBuffer-recording"));
        assert!(errors.contains_kind(ViolationKind::CommandBufferNotRecording));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn freed() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();
        pool.free_command_buffers([cb.clone()]).unwrap();

        let errors = cb.set_line_width(1.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetLineWidth-commandBuffer-parameter"));
        assert!(errors.contains_kind(ViolationKind::DestroyedObjectUsed));
    }

    #[test]
    fn queue_family_capability() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 1, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        let errors = cb.set_line_width(1.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetLineWidth-commandBuffer-cmdpool"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));

        // The command is still recorded.
        assert_eq!(cb.state(), CommandBufferState::Recording);
        cb.end().unwrap();
    }

    #[test]
    fn commands_in_secondary_contents() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, crate::format::Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            crate::command_buffer::RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::SecondaryCommandBuffers,
        )
        .unwrap();

        let errors = cb.set_line_width(1.0).unwrap_err();
        assert!(errors.contains_vuid("UNASSIGNED-vkCmdSetLineWidth-contents"));
        assert!(errors.contains_kind(ViolationKind::BadContentsModeViolation));
    }
}
