// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Queues, and the rules that are checked when work is submitted to them.
//!
//! Submitting is where the rules that span several command buffers are checked: a command buffer
//! that is not [`SimultaneousUse`] can't be pending twice, a [`OneTimeSubmit`] command buffer
//! can't be submitted again, protected and unprotected work can't be mixed, and the queue must
//! support everything that was recorded.
//!
//! The model has no device timeline. Accepted command buffers stay pending until
//! [`Queue::wait_idle`] is called, which completes them and reports what the
//! [GPU-assisted checker](crate::gpu_av) observed while executing them.
//!
//! [`SimultaneousUse`]: crate::command_buffer::CommandBufferUsage::SimultaneousUse
//! [`OneTimeSubmit`]: crate::command_buffer::CommandBufferUsage::OneTimeSubmit

use super::{Device, DeviceOwned};
use crate::{
    command_buffer::{
        CommandBuffer, CommandBufferLevel, CommandBufferState, CommandBufferUsage, InvalidReason,
        SubmitSnapshot,
    },
    gpu_av,
    macros::vulkan_bitflags,
    sync::Semaphore,
    ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashSet;
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// A queue that command buffers are submitted to.
pub struct Queue {
    device: Arc<Device>,
    queue_family_index: u32,
    queue_index: u32,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    // Primary command buffers that were accepted and haven't completed yet.
    pending: Vec<Arc<CommandBuffer>>,
    // Findings of the GPU-assisted checker, in submission order.
    deferred_errors: ValidationErrors,
}

impl Queue {
    pub(super) fn new(device: Arc<Device>, queue_family_index: u32, queue_index: u32) -> Arc<Self> {
        Arc::new(Queue {
            device,
            queue_family_index,
            queue_index,
            state: Mutex::new(QueueState::default()),
        })
    }

    /// Returns the index of the queue family that this queue belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the index of this queue within its queue family.
    #[inline]
    pub fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Returns the properties of the queue family that this queue belongs to.
    #[inline]
    pub fn queue_family_properties(&self) -> &QueueFamilyProperties {
        &self.device.queue_family_properties()[self.queue_family_index as usize]
    }

    /// Returns whether protected work can be submitted to this queue.
    ///
    /// This is the case if the queue family supports [`QueueFlags::PROTECTED`] and the
    /// `protected_memory` feature is enabled.
    #[inline]
    pub fn is_protected_capable(&self) -> bool {
        self.queue_family_properties()
            .queue_flags
            .intersects(QueueFlags::PROTECTED)
            && self.device.enabled_features().protected_memory
    }

    /// Returns the number of primary command buffers that were submitted to this queue and
    /// haven't completed yet.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Submits batches of command buffers to the queue.
    ///
    /// Every command buffer that passes validation becomes pending, and stays pending until
    /// [`wait_idle`](Self::wait_idle) is called. Command buffers that fail validation are not
    /// executed. The errors of every batch are reported together.
    pub fn submit(&self, submit_infos: &[SubmitInfo]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let accepted = self.validate_submit(submit_infos, &mut errors);
        self.submit_unchecked(accepted);

        self.device.report(errors)
    }

    // Checks every batch in order, and applies the semaphore operations of each batch as it
    // goes. Returns the command buffers that can be executed.
    fn validate_submit(
        &self,
        submit_infos: &[SubmitInfo],
        errors: &mut ValidationErrors,
    ) -> Vec<Arc<CommandBuffer>> {
        let mut accepted = Vec::new();
        let mut batch_handles = HashSet::default();

        for (index, submit_info) in submit_infos.iter().enumerate() {
            let &SubmitInfo {
                flags,
                ref wait_semaphores,
                ref command_buffers,
                ref signal_semaphores,
                _ne: _,
            } = submit_info;

            let protected = flags.intersects(SubmitFlags::PROTECTED);

            if protected {
                if let Err(err) = self.validate_protected_submit() {
                    errors.push(err.add_context(format!("submit_infos[{}].flags", index)));
                }
            }

            for (semaphore_index, semaphore_submit_info) in wait_semaphores.iter().enumerate() {
                let semaphore = &semaphore_submit_info.semaphore;

                if !semaphore.take_signal() {
                    errors.push(Box::new(ValidationError {
                        context: format!(
                            "submit_infos[{}].wait_semaphores[{}].semaphore",
                            index, semaphore_index
                        )
                        .into(),
                        problem: "is not signaled, and no signal operation is pending for it"
                            .into(),
                        vuids: &["VUID-vkQueueSubmit2-semaphore-03873"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }
            }

            for (command_buffer_index, command_buffer_submit_info) in
                command_buffers.iter().enumerate()
            {
                let command_buffer = &command_buffer_submit_info.command_buffer;

                let mut command_buffer_errors = ValidationErrors::new();

                if self.validate_command_buffer(
                    command_buffer,
                    protected,
                    &mut batch_handles,
                    &mut command_buffer_errors,
                ) {
                    accepted.push(command_buffer.clone());
                }

                command_buffer_errors.add_context(&format!(
                    "submit_infos[{}].command_buffers[{}]",
                    index, command_buffer_index
                ));
                errors.append(command_buffer_errors);
            }

            for (semaphore_index, semaphore_submit_info) in signal_semaphores.iter().enumerate() {
                let semaphore = &semaphore_submit_info.semaphore;

                if !semaphore.signal() {
                    errors.push(Box::new(ValidationError {
                        context: format!(
                            "submit_infos[{}].signal_semaphores[{}].semaphore",
                            index, semaphore_index
                        )
                        .into(),
                        problem: "is already signaled, and no wait operation is pending for it"
                            .into(),
                        vuids: &["VUID-vkQueueSubmit2-semaphore-03868"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }
            }
        }

        accepted
    }

    fn validate_protected_submit(&self) -> Result<(), Box<ValidationError>> {
        if !self.device.enabled_features().protected_memory {
            return Err(Box::new(ValidationError {
                problem: "contains `SubmitFlags::PROTECTED`".into(),
                requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                    crate::Requires::DeviceFeature("protected_memory"),
                ])]),
                vuids: &["VUID-VkSubmitInfo2-flags-03885"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        if !self.is_protected_capable() {
            return Err(Box::new(ValidationError {
                problem: "contains `SubmitFlags::PROTECTED`, but the queue family of the queue \
                    does not support protected work"
                    .into(),
                vuids: &["VUID-vkQueueSubmit2-queue-06447"],
                kind: Some(ViolationKind::ProtectedSubmitMismatch),
                ..Default::default()
            }));
        }

        Ok(())
    }

    // Checks one command buffer of a batch, and returns whether it can be executed. Every
    // independent violation is pushed to `errors`.
    fn validate_command_buffer(
        &self,
        command_buffer: &Arc<CommandBuffer>,
        protected: bool,
        batch_handles: &mut HashSet<crate::Handle>,
        errors: &mut ValidationErrors,
    ) -> bool {
        assert_eq!(&self.device, command_buffer.device());

        if !self.device.registry().is_alive(command_buffer.handle()) {
            errors.push(Box::new(ValidationError {
                problem: "has been freed".into(),
                vuids: &["VUID-VkCommandBufferSubmitInfo-commandBuffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
            return false;
        }

        if command_buffer.level() != CommandBufferLevel::Primary {
            errors.push(Box::new(ValidationError {
                problem: "is not a primary command buffer".into(),
                vuids: &["VUID-VkCommandBufferSubmitInfo-commandBuffer-03890"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
            return false;
        }

        let errors_before = errors.len();

        if command_buffer.queue_family_index() != self.queue_family_index {
            errors.push(Box::new(ValidationError {
                problem: "was allocated from a command pool of a different queue family than \
                    the queue"
                    .into(),
                vuids: &["VUID-vkQueueSubmit2-commandBuffer-03878"],
                kind: Some(ViolationKind::QueueFamilyMismatch),
                ..Default::default()
            }));
        }

        let snapshot = command_buffer.submit_snapshot();
        validate_submit_state(
            &snapshot,
            batch_handles.contains(&command_buffer.handle()),
            errors,
        );

        for (secondary_index, secondary) in snapshot.secondaries.iter().enumerate() {
            let mut secondary_errors = ValidationErrors::new();
            validate_secondary_submit_state(
                &secondary.submit_snapshot(),
                batch_handles.contains(&secondary.handle()),
                &mut secondary_errors,
            );
            secondary_errors.add_context(&format!(
                "executed secondary command buffer {}",
                secondary_index
            ));
            errors.append(secondary_errors);
        }

        if protected && !snapshot.protected {
            errors.push(Box::new(ValidationError {
                problem: "the batch is protected, but the command buffer was allocated from an \
                    unprotected command pool"
                    .into(),
                vuids: &["VUID-VkSubmitInfo2-flags-03886"],
                kind: Some(ViolationKind::ProtectedSubmitMismatch),
                ..Default::default()
            }));
        }

        if !protected && snapshot.protected {
            errors.push(Box::new(ValidationError {
                problem: "the batch is not protected, but the command buffer was allocated from \
                    a protected command pool"
                    .into(),
                vuids: &["VUID-VkSubmitInfo2-flags-03887"],
                kind: Some(ViolationKind::ProtectedSubmitMismatch),
                ..Default::default()
            }));
        }

        let queue_flags = self.queue_family_properties().queue_flags;

        for &(required_flags, vuids) in snapshot
            .required_queue_flags
            .iter()
            .filter(|(required_flags, _)| !queue_flags.intersects(*required_flags))
        {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "contains a command that requires a queue that supports one of {:?}, but \
                    the queue family of the queue supports only {:?}",
                    required_flags, queue_flags,
                )
                .into(),
                vuids,
                kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                ..Default::default()
            }));
        }

        if errors.len() != errors_before {
            return false;
        }

        batch_handles.insert(command_buffer.handle());
        batch_handles.extend(snapshot.secondaries.iter().map(|secondary| secondary.handle()));

        true
    }

    fn submit_unchecked(&self, accepted: Vec<Arc<CommandBuffer>>) {
        let settings = self.device.settings();
        let mut state = self.state.lock();

        for command_buffer in accepted {
            let instrumented = command_buffer.add_queue_submit();

            tracing::debug!(
                command_buffer = ?command_buffer.handle(),
                queue_family_index = self.queue_family_index,
                queue_index = self.queue_index,
                "command buffer submitted",
            );

            if settings.gpu_assisted {
                state.deferred_errors.append(gpu_av::execute(
                    &instrumented,
                    settings.gpu_assisted_max_errors,
                ));
            }

            state.pending.push(command_buffer);
        }
    }

    /// Waits until all work submitted to the queue has finished.
    ///
    /// Pending command buffers return to the executable state, or become invalid if they were
    /// recorded for [`OneTimeSubmit`](CommandBufferUsage::OneTimeSubmit). Returns the errors
    /// that the GPU-assisted checker found while executing the work.
    pub fn wait_idle(&self) -> Result<(), ValidationErrors> {
        let (pending, deferred_errors) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.deferred_errors),
            )
        };

        let mut completed_one_time = Vec::new();

        for command_buffer in &pending {
            completed_one_time.extend(command_buffer.set_submit_finished());
        }

        // Primaries that executed a one-time secondary can't be executed again either.
        let mut errors = ValidationErrors::new();

        for handle in completed_one_time {
            self.device.registry().set_state(
                handle,
                crate::registry::ObjectState::Invalidated,
            );
            self.device.invalidate_users(
                handle,
                InvalidReason::SecondaryInvalidated(handle),
                None,
                &mut errors,
            );
        }

        debug_assert!(errors.is_empty());

        self.device.report(deferred_errors)
    }
}

fn validate_submit_state(snapshot: &SubmitSnapshot, in_batch: bool, errors: &mut ValidationErrors) {
    match snapshot.state {
        CommandBufferState::Initial | CommandBufferState::Recording => {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "is in the {:?} state, but must be in the executable or pending state",
                    snapshot.state,
                )
                .into(),
                vuids: &["VUID-vkQueueSubmit2-commandBuffer-03874"],
                kind: Some(ViolationKind::CommandBufferStateViolation),
                ..Default::default()
            }));

            // The usage rules only apply to recorded command buffers.
            return;
        }
        CommandBufferState::Invalid => {
            let kind = match snapshot.invalid_reason {
                Some(InvalidReason::OneTimeSubmitCompleted) => {
                    ViolationKind::OneTimeSubmitViolation
                }
                _ => ViolationKind::InvalidCommandBufferViolation,
            };

            errors.push(Box::new(ValidationError {
                problem: match snapshot.invalid_reason {
                    Some(reason) => format!("is in the invalid state, because {}", reason).into(),
                    None => "is in the invalid state".into(),
                },
                vuids: &["VUID-vkQueueSubmit2-commandBuffer-03874"],
                kind: Some(kind),
                ..Default::default()
            }));
        }
        CommandBufferState::Executable | CommandBufferState::Pending => (),
    }

    if in_batch && snapshot.usage != CommandBufferUsage::SimultaneousUse {
        errors.push(Box::new(ValidationError {
            problem: "appears more than once in the submission, but was not recorded with \
                `CommandBufferUsage::SimultaneousUse`"
                .into(),
            vuids: &["VUID-vkQueueSubmit2-commandBuffer-03875"],
            kind: Some(ViolationKind::SimultaneousUseViolation),
            ..Default::default()
        }));
    }

    if snapshot.usage == CommandBufferUsage::OneTimeSubmit
        && snapshot.submit_count > 0
        && snapshot.invalid_reason != Some(InvalidReason::OneTimeSubmitCompleted)
    {
        errors.push(Box::new(ValidationError {
            problem: "was recorded with `CommandBufferUsage::OneTimeSubmit`, but has already \
                been submitted"
                .into(),
            vuids: &["VUID-vkQueueSubmit2-commandBuffer-03874"],
            kind: Some(ViolationKind::OneTimeSubmitViolation),
            ..Default::default()
        }));
    }

    if snapshot.state == CommandBufferState::Pending
        && snapshot.usage != CommandBufferUsage::SimultaneousUse
    {
        errors.push(Box::new(ValidationError {
            problem: "is in the pending state, but was not recorded with \
                `CommandBufferUsage::SimultaneousUse`"
                .into(),
            vuids: &["VUID-vkQueueSubmit2-commandBuffer-03875"],
            kind: Some(ViolationKind::SimultaneousUseViolation),
            ..Default::default()
        }));
    }
}

fn validate_secondary_submit_state(
    snapshot: &SubmitSnapshot,
    in_batch: bool,
    errors: &mut ValidationErrors,
) {
    match snapshot.state {
        CommandBufferState::Executable | CommandBufferState::Pending => (),
        state => {
            errors.push(Box::new(ValidationError {
                problem: match snapshot.invalid_reason {
                    Some(reason) => format!("is in the {:?} state, because {}", state, reason)
                        .into(),
                    None => format!(
                        "is in the {:?} state, but must be in the executable or pending state",
                        state
                    )
                    .into(),
                },
                vuids: &["VUID-vkQueueSubmit2-commandBuffer-03876"],
                kind: Some(if state == CommandBufferState::Invalid {
                    ViolationKind::InvalidCommandBufferViolation
                } else {
                    ViolationKind::CommandBufferStateViolation
                }),
                ..Default::default()
            }));
        }
    }

    if (in_batch || snapshot.state == CommandBufferState::Pending)
        && snapshot.usage != CommandBufferUsage::SimultaneousUse
    {
        errors.push(Box::new(ValidationError {
            problem: "is already pending or appears more than once in the submission, but was \
                not recorded with `CommandBufferUsage::SimultaneousUse`"
                .into(),
            vuids: &["VUID-vkQueueSubmit2-commandBuffer-03877"],
            kind: Some(ViolationKind::SimultaneousUseViolation),
            ..Default::default()
        }));
    }
}

impl DeviceOwned for Queue {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Queue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Queue")
            .field("queue_family_index", &self.queue_family_index)
            .field("queue_index", &self.queue_index)
            .finish_non_exhaustive()
    }
}

/// Parameters to submit command buffers to a queue.
#[derive(Clone, Debug)]
pub struct SubmitInfo {
    /// Additional properties of the batch.
    ///
    /// The default value is empty.
    pub flags: SubmitFlags,

    /// The semaphores to wait for before beginning the execution of this batch.
    ///
    /// The default value is empty.
    pub wait_semaphores: Vec<SemaphoreSubmitInfo>,

    /// The command buffers to execute.
    ///
    /// The default value is empty.
    pub command_buffers: Vec<CommandBufferSubmitInfo>,

    /// The semaphores to signal after the execution of this batch has completed.
    ///
    /// The default value is empty.
    pub signal_semaphores: Vec<SemaphoreSubmitInfo>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubmitInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: SubmitFlags::empty(),
            wait_semaphores: Vec::new(),
            command_buffers: Vec::new(),
            signal_semaphores: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SubmitInfo {
    /// Returns a `SubmitInfo` that executes the given command buffers.
    pub fn command_buffers(command_buffers: impl IntoIterator<Item = Arc<CommandBuffer>>) -> Self {
        Self {
            command_buffers: command_buffers
                .into_iter()
                .map(CommandBufferSubmitInfo::new)
                .collect(),
            ..Default::default()
        }
    }
}

vulkan_bitflags! {
    /// Flags that control the execution of a batch.
    SubmitFlags = SubmitFlags(u32);

    /// The batch is protected. Every command buffer in it must be allocated from a protected
    /// command pool.
    PROTECTED = PROTECTED,
}

/// Parameters for a command buffer in a batch.
#[derive(Clone, Debug)]
pub struct CommandBufferSubmitInfo {
    /// The primary command buffer to execute.
    pub command_buffer: Arc<CommandBuffer>,

    pub _ne: crate::NonExhaustive,
}

impl CommandBufferSubmitInfo {
    /// Returns a `CommandBufferSubmitInfo` with the specified `command_buffer`.
    #[inline]
    pub fn new(command_buffer: Arc<CommandBuffer>) -> Self {
        Self {
            command_buffer,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Parameters for a semaphore signal or wait operation in a batch.
#[derive(Clone, Debug)]
pub struct SemaphoreSubmitInfo {
    /// The semaphore to signal or wait for.
    pub semaphore: Arc<Semaphore>,

    pub _ne: crate::NonExhaustive,
}

impl SemaphoreSubmitInfo {
    /// Returns a `SemaphoreSubmitInfo` with the specified `semaphore`.
    #[inline]
    pub fn semaphore(semaphore: Arc<Semaphore>) -> Self {
        Self {
            semaphore,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Properties of a queue family.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueFamilyProperties {
    /// Attributes of the queue family.
    ///
    /// The default value is empty.
    pub queue_flags: QueueFlags,

    /// The number of queues in this family.
    ///
    /// The default value is `1`.
    pub queue_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for QueueFamilyProperties {
    #[inline]
    fn default() -> Self {
        Self {
            queue_flags: QueueFlags::empty(),
            queue_count: 1,
            _ne: crate::NonExhaustive(()),
        }
    }
}

vulkan_bitflags! {
    /// Attributes of a queue or queue family.
    QueueFlags = QueueFlags(u32);

    /// Queues of this family can execute graphics operations.
    GRAPHICS = GRAPHICS,

    /// Queues of this family can execute compute operations.
    COMPUTE = COMPUTE,

    /// Queues of this family can execute transfer operations.
    TRANSFER = TRANSFER,

    /// Queues of this family can execute sparse memory management operations.
    SPARSE_BINDING = SPARSE_BINDING,

    /// Queues of this family can execute protected work.
    PROTECTED = PROTECTED,
}

#[cfg(test)]
mod tests {
    use super::{SemaphoreSubmitInfo, SubmitFlags, SubmitInfo};
    use crate::{
        buffer::BufferUsage,
        command_buffer::{
            pool::CommandPoolCreateFlags, CommandBufferBeginInfo, CommandBufferLevel,
            CommandBufferState, CommandBufferUsage,
        },
        device::DeviceFeatures,
        sync::Semaphore,
        ViolationKind,
    };

    #[test]
    fn empty_submit() {
        let (_device, queue) = gfx_dev_and_queue!();
        queue.submit(&[Default::default()]).unwrap();
        queue.wait_idle().unwrap();
    }

    #[test]
    fn submit_never_ended() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);

        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03874"));
        assert!(errors.contains_kind(ViolationKind::CommandBufferStateViolation));

        cb.begin(Default::default()).unwrap();
        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03874"));
    }

    #[test]
    fn one_time_submit_twice() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(CommandBufferBeginInfo {
            usage: CommandBufferUsage::OneTimeSubmit,
            ..Default::default()
        })
        .unwrap();
        cb.end().unwrap();

        queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap();
        assert_eq!(cb.state(), CommandBufferState::Pending);
        queue.wait_idle().unwrap();
        assert_eq!(cb.state(), CommandBufferState::Invalid);

        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::OneTimeSubmitViolation));
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03874"));
    }

    #[test]
    fn multiple_submit_after_wait() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        for _ in 0..3 {
            queue
                .submit(&[SubmitInfo::command_buffers([cb.clone()])])
                .unwrap();
            queue.wait_idle().unwrap();
            assert_eq!(cb.state(), CommandBufferState::Executable);
        }
    }

    #[test]
    fn simultaneous_use_in_batch() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone(), cb.clone()])])
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_kind(ViolationKind::SimultaneousUseViolation));
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03875"));

        // The first occurrence was accepted.
        assert_eq!(cb.state(), CommandBufferState::Pending);
        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03875"));
        queue.wait_idle().unwrap();

        let simultaneous = crate::tests::primary(&device);
        simultaneous
            .begin(CommandBufferBeginInfo {
                usage: CommandBufferUsage::SimultaneousUse,
                ..Default::default()
            })
            .unwrap();
        simultaneous.end().unwrap();
        queue
            .submit(&[
                SubmitInfo::command_buffers([simultaneous.clone()]),
                SubmitInfo::command_buffers([simultaneous.clone()]),
            ])
            .unwrap();
    }

    #[test]
    fn wrong_queue_family() {
        let (device, queues) = crate::tests::device_and_queues(Default::default());
        let pool = crate::tests::command_pool(&device, 1, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        let errors = queues[0]
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03878"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyMismatch));

        // `queues[2]` is the only queue of family 1.
        queues[2]
            .submit(&[SubmitInfo::command_buffers([cb])])
            .unwrap();
    }

    #[test]
    fn capability_rechecked_at_submit() {
        let (device, queues) = crate::tests::device_and_queues(Default::default());
        let pool = crate::tests::command_pool(&device, 2, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        let buffer = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_DST);
        cb.begin(Default::default()).unwrap();
        cb.fill_buffer(&buffer, 0, 64, 0).unwrap();

        // Family 2 only supports transfer. The command is reported, and recorded anyway.
        let errors = cb.set_line_width(1.0).unwrap_err();
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));
        cb.end().unwrap();

        let errors = queues[3]
            .submit(&[SubmitInfo::command_buffers([cb])])
            .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));
        assert!(errors.contains_vuid("VUID-vkCmdSetLineWidth-commandBuffer-cmdpool"));
    }

    #[test]
    fn protected_submit_mismatch() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        let errors = queue
            .submit(&[SubmitInfo {
                flags: SubmitFlags::PROTECTED,
                ..SubmitInfo::command_buffers([cb.clone()])
            }])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubmitInfo2-flags-03886"));
        assert!(errors.contains_kind(ViolationKind::ProtectedSubmitMismatch));

        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::PROTECTED);
        let protected = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        protected.begin(Default::default()).unwrap();
        protected.end().unwrap();

        let errors = queue
            .submit(&[SubmitInfo::command_buffers([protected.clone()])])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubmitInfo2-flags-03887"));

        queue
            .submit(&[SubmitInfo {
                flags: SubmitFlags::PROTECTED,
                ..SubmitInfo::command_buffers([protected])
            }])
            .unwrap();
    }

    #[test]
    fn independent_violations_reported_together() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(CommandBufferBeginInfo {
            usage: CommandBufferUsage::OneTimeSubmit,
            ..Default::default()
        })
        .unwrap();
        cb.end().unwrap();
        queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap();

        let protected_resubmit = || {
            queue
                .submit(&[SubmitInfo {
                    flags: SubmitFlags::PROTECTED,
                    ..SubmitInfo::command_buffers([cb.clone()])
                }])
                .unwrap_err()
        };

        // Still pending.
        let errors = protected_resubmit();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_kind(ViolationKind::OneTimeSubmitViolation));
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03875"));
        assert!(errors.contains_vuid("VUID-VkSubmitInfo2-flags-03886"));

        queue.wait_idle().unwrap();

        // Completed, and invalid.
        let errors = protected_resubmit();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_kind(ViolationKind::OneTimeSubmitViolation));
        assert!(errors.contains_kind(ViolationKind::ProtectedSubmitMismatch));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn protected_submit_requires_feature() {
        let (_device, queue) = gfx_dev_and_queue!(DeviceFeatures::empty());

        let errors = queue
            .submit(&[SubmitInfo {
                flags: SubmitFlags::PROTECTED,
                ..Default::default()
            }])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkSubmitInfo2-flags-03885"));
    }

    #[test]
    fn semaphore_signal_and_wait() {
        let (device, queue) = gfx_dev_and_queue!();
        let semaphore = Semaphore::new(device.clone(), Default::default()).unwrap();

        let errors = queue
            .submit(&[SubmitInfo {
                wait_semaphores: vec![SemaphoreSubmitInfo::semaphore(semaphore.clone())],
                ..Default::default()
            }])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-semaphore-03873"));

        queue
            .submit(&[
                SubmitInfo {
                    signal_semaphores: vec![SemaphoreSubmitInfo::semaphore(semaphore.clone())],
                    ..Default::default()
                },
                SubmitInfo {
                    wait_semaphores: vec![SemaphoreSubmitInfo::semaphore(semaphore.clone())],
                    ..Default::default()
                },
            ])
            .unwrap();

        queue
            .submit(&[SubmitInfo {
                signal_semaphores: vec![SemaphoreSubmitInfo::semaphore(semaphore.clone())],
                ..Default::default()
            }])
            .unwrap();
        let errors = queue
            .submit(&[SubmitInfo {
                signal_semaphores: vec![SemaphoreSubmitInfo::semaphore(semaphore)],
                ..Default::default()
            }])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-semaphore-03868"));
    }
}
