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
    buffer::{Buffer, BufferUsage},
    command_buffer::{
        state::{CommandBufferBuilderState, TransformFeedbackState},
        CommandBuffer, CommandBufferInner,
    },
    device::{queue::QueueFlags, Device, DeviceOwned},
    DeviceSize, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind,
};
use std::sync::Arc;

const BEGIN_TRANSFORM_FEEDBACK: CommandInfo = command_info!(
    "vkCmdBeginTransformFeedbackEXT",
    QueueFlags::GRAPHICS,
    Inside
);
const END_TRANSFORM_FEEDBACK: CommandInfo =
    command_info!("vkCmdEndTransformFeedbackEXT", QueueFlags::GRAPHICS, Inside);

struct TransformFeedbackVuids {
    feature: &'static [&'static str],
    first_counter_buffer: &'static [&'static str],
    counter_buffer_count: &'static [&'static str],
    offsets: &'static [&'static str],
    usage: &'static [&'static str],
    memory: &'static [&'static str],
}

const BEGIN_VUIDS: TransformFeedbackVuids = TransformFeedbackVuids {
    feature: &["VUID-vkCmdBeginTransformFeedbackEXT-transformFeedback-02366"],
    first_counter_buffer: &["VUID-vkCmdBeginTransformFeedbackEXT-firstCounterBuffer-02368"],
    counter_buffer_count: &["VUID-vkCmdBeginTransformFeedbackEXT-firstCounterBuffer-02369"],
    offsets: &["VUID-vkCmdBeginTransformFeedbackEXT-pCounterBufferOffsets-02370"],
    usage: &["VUID-vkCmdBeginTransformFeedbackEXT-pCounterBuffers-02372"],
    memory: &["VUID-vkCmdBeginTransformFeedbackEXT-pCounterBuffers-02371"],
};

const END_VUIDS: TransformFeedbackVuids = TransformFeedbackVuids {
    feature: &["VUID-vkCmdEndTransformFeedbackEXT-transformFeedback-02374"],
    first_counter_buffer: &["VUID-vkCmdEndTransformFeedbackEXT-firstCounterBuffer-02376"],
    counter_buffer_count: &["VUID-vkCmdEndTransformFeedbackEXT-firstCounterBuffer-02377"],
    offsets: &["VUID-vkCmdEndTransformFeedbackEXT-pCounterBufferOffsets-02378"],
    usage: &["VUID-vkCmdEndTransformFeedbackEXT-pCounterBuffers-02380"],
    memory: &["VUID-vkCmdEndTransformFeedbackEXT-pCounterBuffers-02379"],
};

/// # Commands for transform feedback.
impl CommandBuffer {
    /// Begins transform feedback, capturing the vertex data of the following draws into the
    /// bound transform feedback buffers.
    ///
    /// `counter_buffers` holds the counter buffer and offset of each transform feedback buffer,
    /// starting at `first_counter_buffer`. A `None` element means that capturing starts at the
    /// start of the buffer.
    pub fn begin_transform_feedback(
        &self,
        first_counter_buffer: u32,
        counter_buffers: &[Option<(Arc<Buffer>, DeviceSize)>],
    ) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_TRANSFORM_FEEDBACK, |inner, errors| {
            errors.check(validate_counter_buffers(
                self.device(),
                first_counter_buffer,
                counter_buffers,
                &BEGIN_VUIDS,
            ));

            let builder_state = &inner.builder_state;

            if builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is already active".into(),
                    vuids: &["VUID-vkCmdBeginTransformFeedbackEXT-None-02367"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));

                return;
            }

            if view_mask(builder_state) != 0 {
                errors.push(Box::new(ValidationError {
                    problem: "the current render pass instance uses multiview".into(),
                    vuids: &["VUID-vkCmdBeginTransformFeedbackEXT-None-02373"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));
            }

            if builder_state.pipeline_graphics.is_none() {
                errors.push(Box::new(ValidationError {
                    problem: "no graphics pipeline is bound".into(),
                    vuids: &["VUID-vkCmdBeginTransformFeedbackEXT-None-06233"],
                    kind: Some(ViolationKind::PipelineNotBound),
                    ..Default::default()
                }));
            }

            inner.builder_state.transform_feedback = Some(TransformFeedbackState {
                first_counter_buffer,
            });
            add_counter_buffers(inner, counter_buffers);
        })
    }

    /// Ends transform feedback, and writes the capture positions to `counter_buffers`.
    pub fn end_transform_feedback(
        &self,
        first_counter_buffer: u32,
        counter_buffers: &[Option<(Arc<Buffer>, DeviceSize)>],
    ) -> Result<(), ValidationErrors> {
        self.record(&END_TRANSFORM_FEEDBACK, |inner, errors| {
            errors.check(validate_counter_buffers(
                self.device(),
                first_counter_buffer,
                counter_buffers,
                &END_VUIDS,
            ));

            if inner.builder_state.transform_feedback.is_none() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is not active".into(),
                    vuids: &["VUID-vkCmdEndTransformFeedbackEXT-None-02375"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));

                return;
            }

            inner.builder_state.transform_feedback = None;
            add_counter_buffers(inner, counter_buffers);
        })
    }
}

fn view_mask(builder_state: &CommandBufferBuilderState) -> u32 {
    builder_state
        .render_pass
        .as_ref()
        .map_or(0, |state| state.rendering_info.view_mask)
}

fn add_counter_buffers(
    inner: &mut CommandBufferInner,
    counter_buffers: &[Option<(Arc<Buffer>, DeviceSize)>],
) {
    for (buffer, _) in counter_buffers.iter().flatten() {
        inner.add_resource(buffer);
    }
}

fn validate_counter_buffers(
    device: &Device,
    first_counter_buffer: u32,
    counter_buffers: &[Option<(Arc<Buffer>, DeviceSize)>],
    vuids: &TransformFeedbackVuids,
) -> Result<(), Box<ValidationError>> {
    if !device.enabled_features().transform_feedback {
        return Err(Box::new(ValidationError {
            problem: "transform feedback is used".into(),
            requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                "transform_feedback",
            )])]),
            vuids: vuids.feature,
            kind: Some(ViolationKind::FeatureNotEnabled),
            ..Default::default()
        }));
    }

    let max_buffers = device.properties().max_transform_feedback_buffers;

    if first_counter_buffer >= max_buffers {
        return Err(Box::new(ValidationError {
            context: "first_counter_buffer".into(),
            problem: "is not less than the `max_transform_feedback_buffers` limit".into(),
            vuids: vuids.first_counter_buffer,
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    if first_counter_buffer as u64 + counter_buffers.len() as u64 > max_buffers as u64 {
        return Err(Box::new(ValidationError {
            problem: "`first_counter_buffer + counter_buffers.len()` is greater than the \
                `max_transform_feedback_buffers` limit"
                .into(),
            vuids: vuids.counter_buffer_count,
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    for (index, (buffer, offset)) in counter_buffers
        .iter()
        .enumerate()
        .filter_map(|(index, element)| element.as_ref().map(|element| (index, element)))
    {
        buffer
            .validate_use(
                BufferUsage::TRANSFORM_FEEDBACK_COUNTER_BUFFER,
                vuids.usage,
                vuids.memory,
            )
            .map_err(|err| err.add_context(format!("counter_buffers[{}].0", index)))?;

        if offset % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: format!("counter_buffers[{}].1", index).into(),
                problem: "is not a multiple of 4".into(),
                vuids: vuids.offsets,
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if offset.checked_add(4).map_or(true, |end| end > buffer.size()) {
            return Err(Box::new(ValidationError {
                context: format!("counter_buffers[{}]", index).into(),
                problem: "the counter at the offset is outside the buffer".into(),
                vuids: vuids.offsets,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        buffer::BufferUsage,
        command_buffer::{RenderPassBeginInfo, SubpassContents},
        device::DeviceFeatures,
        format::Format,
        ViolationKind,
    };

    #[test]
    fn begin_end() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let counter =
            crate::tests::buffer(&device, 16, BufferUsage::TRANSFORM_FEEDBACK_COUNTER_BUFFER);

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        cb.begin_transform_feedback(0, &[Some((counter.clone(), 0))])
            .unwrap();

        let errors = cb.begin_transform_feedback(0, &[]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-None-02367"));

        let errors = cb.bind_pipeline_graphics(&pipeline).unwrap_err();
        assert!(errors.contains_kind(ViolationKind::PipelineChangeDuringTransformFeedback));

        cb.end_transform_feedback(0, &[Some((counter, 0))]).unwrap();
        cb.end_render_pass().unwrap();
        cb.end().unwrap();
    }

    #[test]
    fn end_not_active() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb.end_transform_feedback(0, &[]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdEndTransformFeedbackEXT-None-02375"));
        assert!(errors.contains_kind(ViolationKind::TransformFeedbackScopeViolation));
    }

    #[test]
    fn begin_requires_pipeline() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb.begin_transform_feedback(0, &[]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-None-06233"));
    }

    #[test]
    fn counter_buffer_checks() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let wrong_usage = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);
        let counter =
            crate::tests::buffer(&device, 16, BufferUsage::TRANSFORM_FEEDBACK_COUNTER_BUFFER);

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        let errors = cb
            .begin_transform_feedback(0, &[Some((wrong_usage, 0))])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-pCounterBuffers-02372"));
        cb.end_transform_feedback(0, &[]).unwrap();

        let errors = cb
            .begin_transform_feedback(0, &[Some((counter.clone(), 2))])
            .unwrap_err();
        assert!(errors
            .contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-pCounterBufferOffsets-02370"));
        cb.end_transform_feedback(0, &[]).unwrap();

        // The test device allows a single transform feedback buffer.
        let errors = cb
            .begin_transform_feedback(0, &[None, Some((counter, 0))])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-firstCounterBuffer-02369"));
    }

    #[test]
    fn requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb.begin_transform_feedback(0, &[]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginTransformFeedbackEXT-transformFeedback-02366"));
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }
}
