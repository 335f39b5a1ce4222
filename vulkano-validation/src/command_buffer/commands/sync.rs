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
    command_buffer::CommandBuffer,
    device::{queue::QueueFlags, Device, DeviceOwned},
    sync::{Event, PipelineStages},
    ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::sync::Arc;

const SET_EVENT: CommandInfo = command_info!(
    "vkCmdSetEvent",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Outside
);
const RESET_EVENT: CommandInfo = command_info!(
    "vkCmdResetEvent",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Outside
);
const WAIT_EVENTS: CommandInfo = command_info!(
    "vkCmdWaitEvents",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);

/// The VUIDs of a stage mask parameter of an event command.
struct StageMaskVuids {
    feature: &'static [&'static str],
    host: &'static [&'static str],
    queue: &'static [&'static str],
}

/// # Commands for synchronization.
impl CommandBuffer {
    /// Signals `event` once the `stages` of the previous commands have completed.
    pub fn set_event(
        &self,
        event: &Arc<Event>,
        stages: PipelineStages,
    ) -> Result<(), ValidationErrors> {
        let queue_flags = self.pool().queue_flags();

        self.record(&SET_EVENT, |inner, errors| {
            errors.check(validate_event(
                self.device(),
                event,
                "event",
                &["VUID-vkCmdSetEvent-event-parameter"],
            ));
            errors.check(validate_stage_mask(
                self.device(),
                queue_flags,
                stages,
                "stages",
                &StageMaskVuids {
                    feature: &["VUID-vkCmdSetEvent-stageMask-04090"],
                    host: &["VUID-vkCmdSetEvent-stageMask-01149"],
                    queue: &["VUID-vkCmdSetEvent-stageMask-06457"],
                },
            ));

            inner.add_resource(event);
        })
    }

    /// Unsignals `event` once the `stages` of the previous commands have completed.
    pub fn reset_event(
        &self,
        event: &Arc<Event>,
        stages: PipelineStages,
    ) -> Result<(), ValidationErrors> {
        let queue_flags = self.pool().queue_flags();

        self.record(&RESET_EVENT, |inner, errors| {
            errors.check(validate_event(
                self.device(),
                event,
                "event",
                &["VUID-vkCmdResetEvent-event-parameter"],
            ));
            errors.check(validate_stage_mask(
                self.device(),
                queue_flags,
                stages,
                "stages",
                &StageMaskVuids {
                    feature: &["VUID-vkCmdResetEvent-stageMask-04090"],
                    host: &["VUID-vkCmdResetEvent-stageMask-01153"],
                    queue: &["VUID-vkCmdResetEvent-stageMask-06458"],
                },
            ));

            inner.add_resource(event);
        })
    }

    /// Waits until all of `events` are signaled before executing the `dst_stages` of the
    /// following commands.
    ///
    /// `src_stages` must contain the stages that were used to signal the events. It may contain
    /// [`PipelineStages::HOST`] for events that are signaled from the host.
    pub fn wait_events(
        &self,
        events: &[Arc<Event>],
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
    ) -> Result<(), ValidationErrors> {
        let queue_flags = self.pool().queue_flags();

        self.record(&WAIT_EVENTS, |inner, errors| {
            if events.is_empty() {
                errors.push(Box::new(ValidationError {
                    context: "events".into(),
                    problem: "is empty".into(),
                    vuids: &["VUID-vkCmdWaitEvents-eventCount-arraylength"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            for (index, event) in events.iter().enumerate() {
                errors.check(
                    validate_event(
                        self.device(),
                        event,
                        "",
                        &["VUID-vkCmdWaitEvents-pEvents-parameter"],
                    )
                    .map_err(|err| err.add_context(format!("events[{}]", index))),
                );
            }

            errors.check(validate_stage_mask(
                self.device(),
                queue_flags,
                src_stages,
                "src_stages",
                &StageMaskVuids {
                    feature: &["VUID-vkCmdWaitEvents-srcStageMask-04090"],
                    host: &[],
                    queue: &["VUID-vkCmdWaitEvents-srcStageMask-06459"],
                },
            ));
            errors.check(validate_stage_mask(
                self.device(),
                queue_flags,
                dst_stages,
                "dst_stages",
                &StageMaskVuids {
                    feature: &["VUID-vkCmdWaitEvents-dstStageMask-04090"],
                    host: &[],
                    queue: &["VUID-vkCmdWaitEvents-dstStageMask-06460"],
                },
            ));

            for event in events {
                inner.add_resource(event);
            }
        })
    }
}

fn validate_event(
    device: &Device,
    event: &Event,
    context: &'static str,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if !device.registry().is_alive(event.handle()) {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: "has been destroyed".into(),
            vuids,
            kind: Some(ViolationKind::DestroyedObjectUsed),
            ..Default::default()
        }));
    }

    Ok(())
}

fn validate_stage_mask(
    device: &Device,
    queue_flags: QueueFlags,
    stages: PipelineStages,
    context: &'static str,
    vuids: &StageMaskVuids,
) -> Result<(), Box<ValidationError>> {
    stages.validate_device(device).map_err(|err| {
        err.add_context(context)
            .set_vuids(vuids.feature)
            .set_kind(ViolationKind::FeatureNotEnabled)
    })?;

    if !vuids.host.is_empty() && stages.intersects(PipelineStages::HOST) {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: "contains `PipelineStages::HOST`".into(),
            vuids: vuids.host,
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    let unsupported = stages - PipelineStages::supported_by(queue_flags);

    if !unsupported.is_empty() {
        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: format!(
                "contains {:?}, which the queue family of the command buffer does not support",
                unsupported,
            )
            .into(),
            vuids: vuids.queue,
            kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
            ..Default::default()
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        command_buffer::{
            pool::CommandPoolCreateFlags, CommandBufferLevel, CommandBufferState, InvalidReason,
        },
        sync::{Event, PipelineStages},
        ViolationKind, VulkanObject,
    };

    #[test]
    fn set_and_wait() {
        let (device, _queue) = gfx_dev_and_queue!();
        let event = Event::new(device.clone(), Default::default()).unwrap();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_event(&event, PipelineStages::TRANSFER).unwrap();
        cb.wait_events(
            &[event.clone()],
            PipelineStages::TRANSFER,
            PipelineStages::FRAGMENT_SHADER,
        )
        .unwrap();
        cb.reset_event(&event, PipelineStages::BOTTOM_OF_PIPE)
            .unwrap();

        let errors = cb
            .wait_events(&[], PipelineStages::HOST, PipelineStages::TRANSFER)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdWaitEvents-eventCount-arraylength"));

        cb.end().unwrap();
    }

    #[test]
    fn host_stage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let event = Event::new(device.clone(), Default::default()).unwrap();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.set_event(&event, PipelineStages::HOST).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetEvent-stageMask-01149"));

        // Waiting on an event signaled from the host is allowed.
        cb.wait_events(&[event], PipelineStages::HOST, PipelineStages::TRANSFER)
            .unwrap();
    }

    #[test]
    fn stage_not_supported_by_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let event = Event::new(device.clone(), Default::default()).unwrap();
        let pool = crate::tests::command_pool(&device, 1, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .set_event(&event, PipelineStages::FRAGMENT_SHADER)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetEvent-stageMask-06457"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));

        cb.set_event(&event, PipelineStages::COMPUTE_SHADER).unwrap();
    }

    #[test]
    fn set_event_inside_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let event = Event::new(device.clone(), Default::default()).unwrap();
        let render_pass = crate::tests::single_color_render_pass(
            &device,
            crate::format::Format::R8G8B8A8_UNORM,
            0,
        );
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            crate::command_buffer::RenderPassBeginInfo::framebuffer(framebuffer),
            crate::command_buffer::SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb
            .set_event(&event, PipelineStages::FRAGMENT_SHADER)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetEvent-renderpass"));

        cb.wait_events(
            &[event],
            PipelineStages::FRAGMENT_SHADER,
            PipelineStages::FRAGMENT_SHADER,
        )
        .unwrap();
    }

    #[test]
    fn destroyed_event_invalidates() {
        let (device, _queue) = gfx_dev_and_queue!();
        let event = Event::new(device.clone(), Default::default()).unwrap();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.set_event(&event, PipelineStages::TRANSFER).unwrap();
        cb.end().unwrap();

        device.destroy(&*event).unwrap();
        assert_eq!(cb.state(), CommandBufferState::Invalid);
        assert_eq!(
            cb.invalid_reason(),
            Some(InvalidReason::ObjectDestroyed(event.handle())),
        );

        let other = crate::tests::primary(&device);
        other.begin(Default::default()).unwrap();
        let errors = other
            .wait_events(&[event], PipelineStages::TRANSFER, PipelineStages::TRANSFER)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdWaitEvents-pEvents-parameter"));
        assert!(errors.contains_kind(ViolationKind::DestroyedObjectUsed));
    }
}
