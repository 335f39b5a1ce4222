// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pools that command buffers are allocated from.
//!
//! A command pool is tied to a queue family: command buffers allocated from it can only record
//! commands that the family supports, and can only be submitted to queues of that family.
//! Destroying a pool frees every command buffer that was allocated from it.

use super::{CommandBuffer, CommandBufferLevel};
use crate::{
    device::{queue::QueueFlags, Device, DeviceOwned},
    macros::vulkan_bitflags,
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Represents a Vulkan command pool.
///
/// A command pool is always tied to a specific queue family. Command buffers allocated from a pool
/// can only be executed on the corresponding queue family.
pub struct CommandPool {
    device: Arc<Device>,
    handle: Handle,

    flags: CommandPoolCreateFlags,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a new `CommandPool`.
    pub fn new(
        device: Arc<Device>,
        create_info: CommandPoolCreateInfo,
    ) -> Result<Arc<CommandPool>, ValidationErrors> {
        device.report_one(
            create_info
                .validate(&device)
                .map_err(|err| err.add_context("create_info")),
        )?;

        Ok(Self::new_unchecked(device, create_info))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: CommandPoolCreateInfo) -> Arc<Self> {
        let CommandPoolCreateInfo {
            flags,
            queue_family_index,
            _ne: _,
        } = create_info;

        Arc::new(CommandPool {
            handle: device.registry().register(ObjectType::CommandPool, None),
            device,
            flags,
            queue_family_index,
        })
    }

    /// Returns the flags that the command pool was created with.
    #[inline]
    pub fn flags(&self) -> CommandPoolCreateFlags {
        self.flags
    }

    /// Returns the queue family on which command buffers of this pool can be executed.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the capabilities of the queue family of the pool.
    #[inline]
    pub(crate) fn queue_flags(&self) -> QueueFlags {
        self.device.queue_family_properties()[self.queue_family_index as usize].queue_flags
    }

    #[inline]
    pub(crate) fn is_protected(&self) -> bool {
        self.flags.intersects(CommandPoolCreateFlags::PROTECTED)
    }

    /// Allocates command buffers.
    pub fn allocate_command_buffers(
        self: &Arc<Self>,
        allocate_info: CommandBufferAllocateInfo,
    ) -> Result<impl ExactSizeIterator<Item = Arc<CommandBuffer>>, ValidationErrors> {
        self.device.report_one(self.validate_allocate_command_buffers(&allocate_info))?;

        let CommandBufferAllocateInfo {
            level,
            command_buffer_count,
            _ne: _,
        } = allocate_info;

        let command_buffers: Vec<_> = (0..command_buffer_count)
            .map(|_| CommandBuffer::new(self.clone(), level))
            .collect();

        tracing::debug!(
            pool = ?self.handle,
            ?level,
            count = command_buffer_count,
            "command buffers allocated",
        );

        Ok(command_buffers.into_iter())
    }

    fn validate_allocate_command_buffers(
        &self,
        allocate_info: &CommandBufferAllocateInfo,
    ) -> Result<(), Box<ValidationError>> {
        if !self.device.registry().is_alive(self.handle) {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkCommandBufferAllocateInfo-commandPool-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        allocate_info
            .validate()
            .map_err(|err| err.add_context("allocate_info"))
    }

    /// Frees individual command buffers.
    ///
    /// Primary command buffers that executed one of the freed command buffers become invalid.
    /// Like a validation layer, the command buffers are freed even if an error is reported.
    pub fn free_command_buffers(
        &self,
        command_buffers: impl IntoIterator<Item = Arc<CommandBuffer>>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (index, command_buffer) in command_buffers.into_iter().enumerate() {
            if command_buffer.pool().handle() != self.handle {
                errors.push(Box::new(ValidationError {
                    context: format!("command_buffers[{}]", index).into(),
                    problem: "was not allocated from this pool".into(),
                    vuids: &["VUID-vkFreeCommandBuffers-pCommandBuffers-parent"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
                continue;
            }

            self.device.destroy_recursive(
                command_buffer.handle(),
                &["VUID-vkFreeCommandBuffers-pCommandBuffers-00047"],
                &mut errors,
            );
        }

        self.device.report(errors)
    }

    /// Resets the pool, which resets all the command buffers that were allocated from it.
    ///
    /// The command buffers return to the initial state. Nothing is reset if one of them is
    /// pending.
    pub fn reset(&self) -> Result<(), ValidationErrors> {
        let command_buffers: Vec<_> = self
            .device
            .registry()
            .children(self.handle)
            .into_iter()
            .filter_map(|handle| self.device.registry().command_buffer(handle))
            .collect();

        if let Some(pending) = command_buffers.iter().find(|cb| cb.is_pending()) {
            return Err(self.device.reported(Box::new(ValidationError {
                problem: format!(
                    "command buffer {} was allocated from the pool, and is pending",
                    pending.handle(),
                )
                .into(),
                vuids: &["VUID-vkResetCommandPool-commandPool-00040"],
                kind: Some(ViolationKind::ObjectInUse),
                ..Default::default()
            })));
        }

        let mut errors = ValidationErrors::new();

        for command_buffer in command_buffers {
            command_buffer.reset_unchecked(&mut errors);
        }

        tracing::debug!(pool = ?self.handle, "command pool reset");

        self.device.report(errors)
    }
}

impl Drop for CommandPool {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for CommandPool {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for CommandPool {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for CommandPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("CommandPool")
            .field("handle", &self.handle)
            .field("flags", &self.flags)
            .field("queue_family_index", &self.queue_family_index)
            .finish_non_exhaustive()
    }
}

/// Parameters to create an `CommandPool`.
#[derive(Clone, Debug)]
pub struct CommandPoolCreateInfo {
    /// Additional properties of the command pool.
    ///
    /// The default value is empty.
    pub flags: CommandPoolCreateFlags,

    /// The index of the queue family that this pool is created for. All command buffers allocated
    /// from this pool must be submitted on a queue belonging to that family.
    ///
    /// The default value is `u32::MAX`, which must be overridden.
    pub queue_family_index: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: CommandPoolCreateFlags::empty(),
            queue_family_index: u32::MAX,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandPoolCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            queue_family_index,
            _ne: _,
        } = self;

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags")
                .set_vuids(&["VUID-VkCommandPoolCreateInfo-flags-02860"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if queue_family_index >= device.queue_family_properties().len() as u32 {
            return Err(Box::new(ValidationError {
                context: "queue_family_index".into(),
                problem: "is not less than the number of queue families in the device".into(),
                vuids: &["VUID-vkCreateCommandPool-queueFamilyIndex-01937"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

vulkan_bitflags! {
    /// Additional properties of the command pool.
    CommandPoolCreateFlags = CommandPoolCreateFlags(u32);

    /// A hint to the implementation that the command buffers allocated from this pool will be
    /// short-lived.
    TRANSIENT = TRANSIENT,

    /// Command buffers allocated from this pool can be reset individually, and are reset
    /// implicitly when they begin recording again.
    RESET_COMMAND_BUFFER = RESET_COMMAND_BUFFER,

    /// Command buffers allocated from this pool are protected, and can only be submitted in
    /// protected batches.
    PROTECTED = PROTECTED
    RequiresFeature(protected_memory),
}

/// Parameters to allocate command buffers from a `CommandPool`.
#[derive(Clone, Debug)]
pub struct CommandBufferAllocateInfo {
    /// The level of command buffer to allocate.
    ///
    /// The default value is [`CommandBufferLevel::Primary`].
    pub level: CommandBufferLevel,

    /// The number of command buffers to allocate.
    ///
    /// The default value is `1`.
    pub command_buffer_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            level: CommandBufferLevel::Primary,
            command_buffer_count: 1,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandBufferAllocateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        if self.command_buffer_count == 0 {
            return Err(Box::new(ValidationError {
                context: "command_buffer_count".into(),
                problem: "is zero".into(),
                vuids: &["VUID-vkAllocateCommandBuffers-pAllocateInfo::commandBufferCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandBufferAllocateInfo, CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo};
    use crate::{
        command_buffer::{CommandBufferLevel, CommandBufferState},
        device::{
            queue::{CommandBufferSubmitInfo, SubmitInfo},
            DeviceFeatures,
        },
        ViolationKind, VulkanObject,
    };

    #[test]
    fn basic_create() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = CommandPool::new(
            device.clone(),
            CommandPoolCreateInfo {
                queue_family_index: 0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pool.queue_family_index(), 0);
        assert!(device.registry().is_alive(pool.handle()));
    }

    #[test]
    fn queue_family_out_of_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = CommandPool::new(
            device,
            CommandPoolCreateInfo {
                queue_family_index: 3,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCreateCommandPool-queueFamilyIndex-01937"));
    }

    #[test]
    fn protected_requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let errors = CommandPool::new(
            device,
            CommandPoolCreateInfo {
                flags: CommandPoolCreateFlags::PROTECTED,
                queue_family_index: 0,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkCommandPoolCreateInfo-flags-02860"));
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }

    #[test]
    fn allocate_zero() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let errors = pool
            .allocate_command_buffers(CommandBufferAllocateInfo {
                command_buffer_count: 0,
                ..Default::default()
            })
            .map(|_| ())
            .unwrap_err();
        assert!(errors.contains_vuid(
            "VUID-vkAllocateCommandBuffers-pAllocateInfo::commandBufferCount-arraylength"
        ));

        let command_buffers: Vec<_> = pool
            .allocate_command_buffers(CommandBufferAllocateInfo {
                level: CommandBufferLevel::Secondary,
                command_buffer_count: 3,
                ..Default::default()
            })
            .unwrap()
            .collect();
        assert_eq!(command_buffers.len(), 3);
        assert!(command_buffers
            .iter()
            .all(|cb| cb.level() == CommandBufferLevel::Secondary));
    }

    #[test]
    fn destroy_frees_command_buffers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);

        device.destroy(&*pool).unwrap();
        assert!(!device.registry().is_alive(cb.handle()));

        let errors = cb.begin(Default::default()).unwrap_err();
        assert!(errors.contains_kind(ViolationKind::DestroyedObjectUsed));
    }

    #[test]
    fn reset_pending() {
        let (device, queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        queue
            .submit(&[SubmitInfo {
                command_buffers: vec![CommandBufferSubmitInfo::new(cb.clone())],
                ..Default::default()
            }])
            .unwrap();

        let errors = pool.reset().unwrap_err();
        assert!(errors.contains_vuid("VUID-vkResetCommandPool-commandPool-00040"));
        assert_eq!(cb.state(), CommandBufferState::Pending);

        queue.wait_idle().unwrap();
        pool.reset().unwrap();
        assert_eq!(cb.state(), CommandBufferState::Initial);
    }

    #[test]
    fn free_pending() {
        let (device, queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();
        queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap();

        let errors = pool.free_command_buffers([cb.clone()]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkFreeCommandBuffers-pCommandBuffers-00047"));
        assert!(!device.registry().is_alive(cb.handle()));
    }
}
