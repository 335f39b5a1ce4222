// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Synchronization primitives and pipeline stages.
//!
//! Only the parts that the submission and recording rules look at are modeled: an [`Event`] is
//! an object that commands refer to, and a [`Semaphore`] tracks whether it has a signal operation
//! pending, so that a queue submission can check that every wait has a matching signal.

use crate::{
    device::{queue::QueueFlags, Device, DeviceOwned},
    macros::vulkan_bitflags,
    registry::ObjectType,
    Handle, ValidationErrors, VulkanObject,
};
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Used to block the execution of commands until a signal is given.
pub struct Event {
    device: Arc<Device>,
    handle: Handle,
    signaled: Mutex<bool>,
}

impl Event {
    /// Creates a new `Event`, in the unsignaled state.
    pub fn new(
        device: Arc<Device>,
        create_info: EventCreateInfo,
    ) -> Result<Arc<Event>, ValidationErrors> {
        Ok(Self::new_unchecked(device, create_info))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: EventCreateInfo) -> Arc<Event> {
        let EventCreateInfo { _ne: _ } = create_info;

        Arc::new(Event {
            handle: device.registry().register(ObjectType::Event, None),
            device,
            signaled: Mutex::new(false),
        })
    }

    /// Returns whether the event is signaled, as seen from the host.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Signals the event from the host.
    #[inline]
    pub fn set(&self) {
        *self.signaled.lock() = true;
    }

    /// Unsignals the event from the host.
    #[inline]
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }
}

impl Drop for Event {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for Event {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Event {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Event")
            .field("handle", &self.handle)
            .field("signaled", &self.is_signaled())
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `Event`.
#[derive(Clone, Debug)]
pub struct EventCreateInfo {
    pub _ne: crate::NonExhaustive,
}

impl Default for EventCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Used to provide synchronization between batches of queue submissions.
pub struct Semaphore {
    device: Arc<Device>,
    handle: Handle,
    // Whether a signal operation was submitted that no wait operation has consumed yet.
    signaled: Mutex<bool>,
}

impl Semaphore {
    /// Creates a new `Semaphore`, with no signal operation pending.
    pub fn new(
        device: Arc<Device>,
        create_info: SemaphoreCreateInfo,
    ) -> Result<Arc<Semaphore>, ValidationErrors> {
        Ok(Self::new_unchecked(device, create_info))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: SemaphoreCreateInfo) -> Arc<Semaphore> {
        let SemaphoreCreateInfo { _ne: _ } = create_info;

        Arc::new(Semaphore {
            handle: device.registry().register(ObjectType::Semaphore, None),
            device,
            signaled: Mutex::new(false),
        })
    }

    /// Returns whether a signal operation is pending for the semaphore.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Records a signal operation. Returns `false` if one was already pending.
    pub(crate) fn signal(&self) -> bool {
        let mut signaled = self.signaled.lock();
        !std::mem::replace(&mut *signaled, true)
    }

    /// Consumes the pending signal operation. Returns `false` if there was none.
    pub(crate) fn take_signal(&self) -> bool {
        std::mem::take(&mut *self.signaled.lock())
    }
}

impl Drop for Semaphore {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for Semaphore {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Semaphore {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Semaphore {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Semaphore")
            .field("handle", &self.handle)
            .field("signaled", &self.is_signaled())
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `Semaphore`.
#[derive(Clone, Debug)]
pub struct SemaphoreCreateInfo {
    pub _ne: crate::NonExhaustive,
}

impl Default for SemaphoreCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            _ne: crate::NonExhaustive(()),
        }
    }
}

vulkan_bitflags! {
    /// A set of stages in a graphics or compute pipeline.
    PipelineStages impl {
        /// Returns the queue capabilities of which at least one is needed to execute every stage
        /// in `self`.
        pub(crate) fn required_queue_flags(self) -> QueueFlags {
            let mut result = QueueFlags::empty();

            for stage in self.iter() {
                result |= match stage {
                    PipelineStages::TOP_OF_PIPE
                    | PipelineStages::BOTTOM_OF_PIPE
                    | PipelineStages::HOST
                    | PipelineStages::ALL_COMMANDS => continue,
                    PipelineStages::TRANSFER => {
                        QueueFlags::TRANSFER | QueueFlags::GRAPHICS | QueueFlags::COMPUTE
                    }
                    PipelineStages::DRAW_INDIRECT | PipelineStages::CONDITIONAL_RENDERING => {
                        QueueFlags::GRAPHICS | QueueFlags::COMPUTE
                    }
                    PipelineStages::COMPUTE_SHADER => QueueFlags::COMPUTE,
                    _ => QueueFlags::GRAPHICS,
                };
            }

            result
        }

        /// Returns the stages that a queue with the given capabilities can execute.
        pub(crate) fn supported_by(queue_flags: QueueFlags) -> PipelineStages {
            let mut result = PipelineStages::TOP_OF_PIPE
                | PipelineStages::BOTTOM_OF_PIPE
                | PipelineStages::HOST
                | PipelineStages::ALL_COMMANDS;

            if queue_flags.intersects(QueueFlags::GRAPHICS) {
                result |= PipelineStages::all() - PipelineStages::COMPUTE_SHADER;
            }

            if queue_flags.intersects(QueueFlags::COMPUTE) {
                result |= PipelineStages::DRAW_INDIRECT
                    | PipelineStages::COMPUTE_SHADER
                    | PipelineStages::CONDITIONAL_RENDERING
                    | PipelineStages::TRANSFER;
            }

            if queue_flags.intersects(QueueFlags::TRANSFER) {
                result |= PipelineStages::TRANSFER;
            }

            result
        }
    }
    = PipelineStageFlags(u32);

    TOP_OF_PIPE = TOP_OF_PIPE,
    DRAW_INDIRECT = DRAW_INDIRECT,
    VERTEX_INPUT = VERTEX_INPUT,
    VERTEX_SHADER = VERTEX_SHADER,
    TESSELLATION_CONTROL_SHADER = TESSELLATION_CONTROL_SHADER,
    TESSELLATION_EVALUATION_SHADER = TESSELLATION_EVALUATION_SHADER,
    GEOMETRY_SHADER = GEOMETRY_SHADER,
    FRAGMENT_SHADER = FRAGMENT_SHADER,
    EARLY_FRAGMENT_TESTS = EARLY_FRAGMENT_TESTS,
    LATE_FRAGMENT_TESTS = LATE_FRAGMENT_TESTS,
    COLOR_ATTACHMENT_OUTPUT = COLOR_ATTACHMENT_OUTPUT,
    COMPUTE_SHADER = COMPUTE_SHADER,
    TRANSFER = TRANSFER,
    BOTTOM_OF_PIPE = BOTTOM_OF_PIPE,
    HOST = HOST,
    ALL_GRAPHICS = ALL_GRAPHICS,
    ALL_COMMANDS = ALL_COMMANDS,

    TRANSFORM_FEEDBACK = TRANSFORM_FEEDBACK_EXT
    RequiresFeature(transform_feedback),

    CONDITIONAL_RENDERING = CONDITIONAL_RENDERING_EXT
    RequiresFeature(conditional_rendering),

    FRAGMENT_SHADING_RATE_ATTACHMENT = FRAGMENT_SHADING_RATE_ATTACHMENT_KHR
    RequiresFeature(attachment_fragment_shading_rate),
}

#[cfg(test)]
mod tests {
    use super::{PipelineStages, Semaphore};
    use crate::device::queue::QueueFlags;

    #[test]
    fn semaphore_signal_state() {
        let (device, _queue) = gfx_dev_and_queue!();
        let semaphore = Semaphore::new(device, Default::default()).unwrap();

        assert!(!semaphore.take_signal());
        assert!(semaphore.signal());
        assert!(!semaphore.signal());
        assert!(semaphore.take_signal());
        assert!(!semaphore.is_signaled());
    }

    #[test]
    fn stages_of_queue_flags() {
        let transfer = PipelineStages::supported_by(QueueFlags::TRANSFER);
        assert!(transfer.contains(PipelineStages::TRANSFER));
        assert!(!transfer.intersects(PipelineStages::FRAGMENT_SHADER));

        let compute = PipelineStages::supported_by(QueueFlags::COMPUTE);
        assert!(compute.contains(PipelineStages::COMPUTE_SHADER | PipelineStages::DRAW_INDIRECT));
        assert!(!compute.intersects(PipelineStages::VERTEX_INPUT));

        assert_eq!(
            PipelineStages::FRAGMENT_SHADER.required_queue_flags(),
            QueueFlags::GRAPHICS
        );
        assert!(PipelineStages::HOST.required_queue_flags().is_empty());
    }
}
