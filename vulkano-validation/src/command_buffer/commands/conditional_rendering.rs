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
    command_buffer::{state::ConditionalRenderingState, CommandBuffer},
    device::{queue::QueueFlags, Device, DeviceOwned},
    DeviceSize, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind,
};
use std::sync::Arc;

const BEGIN_CONDITIONAL_RENDERING: CommandInfo = command_info!(
    "vkCmdBeginConditionalRenderingEXT",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const END_CONDITIONAL_RENDERING: CommandInfo = command_info!(
    "vkCmdEndConditionalRenderingEXT",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);

/// # Commands for conditional rendering.
impl CommandBuffer {
    /// Begins a conditional rendering block. Draw and dispatch commands inside the block are
    /// discarded when the 32-bit value in the buffer is zero, or nonzero if `inverted` is set.
    pub fn begin_conditional_rendering(
        &self,
        begin_info: ConditionalRenderingBeginInfo,
    ) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_CONDITIONAL_RENDERING, |inner, errors| {
            errors.check(
                begin_info
                    .validate(self.device())
                    .map_err(|err| err.add_context("begin_info")),
            );

            if inner.builder_state.conditional_rendering.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "conditional rendering is already active".into(),
                    vuids: &["VUID-vkCmdBeginConditionalRenderingEXT-None-01980"],
                    kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
                    ..Default::default()
                }));

                return;
            }

            let in_subpass = inner
                .builder_state
                .render_pass
                .as_ref()
                .map(|state| state.subpass_index());
            inner.builder_state.conditional_rendering = Some(ConditionalRenderingState { in_subpass });
            inner.add_resource(&begin_info.buffer);
        })
    }

    /// Ends the active conditional rendering block.
    pub fn end_conditional_rendering(&self) -> Result<(), ValidationErrors> {
        self.record(&END_CONDITIONAL_RENDERING, |inner, errors| {
            let current_subpass = inner
                .builder_state
                .render_pass
                .as_ref()
                .map(|state| state.subpass_index());

            match &inner.builder_state.conditional_rendering {
                None => {
                    errors.push(Box::new(ValidationError {
                        problem: "conditional rendering is not active".into(),
                        vuids: &["VUID-vkCmdEndConditionalRenderingEXT-None-01985"],
                        kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
                        ..Default::default()
                    }));

                    return;
                }
                Some(state) if state.in_subpass.is_none() && current_subpass.is_some() => {
                    errors.push(Box::new(ValidationError {
                        problem: "conditional rendering was begun outside a render pass \
                            instance, but is ended inside one"
                            .into(),
                        vuids: &["VUID-vkCmdEndConditionalRenderingEXT-None-01986"],
                        kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
                        ..Default::default()
                    }));
                }
                Some(state) if state.in_subpass.is_some() && state.in_subpass != current_subpass => {
                    errors.push(Box::new(ValidationError {
                        problem: "conditional rendering was begun inside a render pass \
                            instance, but is not ended in the same subpass"
                            .into(),
                        vuids: &["VUID-vkCmdEndConditionalRenderingEXT-None-01987"],
                        kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
                        ..Default::default()
                    }));
                }
                Some(_) => (),
            }

            inner.builder_state.conditional_rendering = None;
        })
    }
}

/// Parameters to begin conditional rendering.
#[derive(Clone, Debug)]
pub struct ConditionalRenderingBeginInfo {
    /// The buffer that holds the predicate.
    ///
    /// There is no default value.
    pub buffer: Arc<Buffer>,

    /// The byte offset of the predicate in `buffer`.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// Whether rendering happens when the predicate is zero instead of nonzero.
    ///
    /// The default value is `false`.
    pub inverted: bool,

    pub _ne: crate::NonExhaustive,
}

impl ConditionalRenderingBeginInfo {
    /// Returns a `ConditionalRenderingBeginInfo` that reads the predicate at the start of
    /// `buffer`.
    #[inline]
    pub fn buffer(buffer: Arc<Buffer>) -> Self {
        Self {
            buffer,
            offset: 0,
            inverted: false,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref buffer,
            offset,
            inverted: _,
            _ne: _,
        } = self;

        if !device.enabled_features().conditional_rendering {
            return Err(Box::new(ValidationError {
                problem: "conditional rendering is used".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "conditional_rendering",
                )])]),
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        buffer
            .validate_use(
                BufferUsage::CONDITIONAL_RENDERING,
                &["VUID-VkConditionalRenderingBeginInfoEXT-buffer-01982"],
                &["VUID-VkConditionalRenderingBeginInfoEXT-buffer-01981"],
            )
            .map_err(|err| err.add_context("buffer"))?;

        if offset.checked_add(4).map_or(true, |end| end > buffer.size()) {
            return Err(Box::new(ValidationError {
                problem: "`offset + 4` is greater than `buffer.size()`".into(),
                vuids: &["VUID-VkConditionalRenderingBeginInfoEXT-offset-01983"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if offset % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-VkConditionalRenderingBeginInfoEXT-offset-01984"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}
