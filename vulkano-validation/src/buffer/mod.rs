// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Location in memory that contains data.
//!
//! A buffer is created with a size and a set of [usages](BufferUsage), and must have
//! [`DeviceMemory`] bound to it before a command can use it. Every command that accesses a buffer
//! checks that the buffer was created with the usage that the access needs.

pub use self::view::{BufferView, BufferViewCreateInfo};
use crate::{
    device::{Device, DeviceOwned},
    macros::{vulkan_bitflags, vulkan_enum},
    memory::DeviceMemory,
    registry::{ObjectState, ObjectType},
    DeviceSize, Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

pub mod view;

/// A linear array of bytes in device memory.
pub struct Buffer {
    device: Arc<Device>,
    handle: Handle,

    flags: BufferCreateFlags,
    size: DeviceSize,
    usage: BufferUsage,

    memory: Mutex<Option<(Arc<DeviceMemory>, DeviceSize)>>,
}

impl Buffer {
    /// Creates a new `Buffer`. Memory must be bound to it with [`bind_memory`](Self::bind_memory)
    /// before it can be used.
    pub fn new(
        device: Arc<Device>,
        create_info: BufferCreateInfo,
    ) -> Result<Arc<Buffer>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &BufferCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: BufferCreateInfo) -> Arc<Buffer> {
        let BufferCreateInfo {
            flags,
            size,
            usage,
            _ne: _,
        } = create_info;

        Arc::new(Buffer {
            handle: device.registry().register(ObjectType::Buffer, None),
            device,
            flags,
            size,
            usage,
            memory: Mutex::new(None),
        })
    }

    /// Returns the flags the buffer was created with.
    #[inline]
    pub fn flags(&self) -> BufferCreateFlags {
        self.flags
    }

    /// Returns the size of the buffer in bytes.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Returns the usages the buffer was created with.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Returns whether the buffer was created with [`BufferCreateFlags::PROTECTED`].
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.flags.intersects(BufferCreateFlags::PROTECTED)
    }

    /// Returns the memory that is bound to the buffer, and the offset of the buffer in it.
    #[inline]
    pub fn memory(&self) -> Option<(Arc<DeviceMemory>, DeviceSize)> {
        self.memory.lock().clone()
    }

    /// Returns whether memory is bound to the buffer.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.memory.lock().is_some()
    }

    /// Binds device memory to this buffer.
    pub fn bind_memory(
        &self,
        memory: Arc<DeviceMemory>,
        memory_offset: DeviceSize,
    ) -> Result<(), ValidationErrors> {
        self.device
            .report_one(self.validate_bind_memory(&memory, memory_offset))?;

        self.bind_memory_unchecked(memory, memory_offset);

        Ok(())
    }

    fn validate_bind_memory(
        &self,
        memory: &DeviceMemory,
        memory_offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        assert_eq!(self.device(), memory.device());

        if self.is_bound() {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "already has memory bound to it".into(),
                vuids: &["VUID-vkBindBufferMemory-buffer-07459"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if !self.device.registry().is_alive(memory.handle()) {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: "has been freed".into(),
                vuids: &["VUID-vkBindBufferMemory-memory-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if memory_offset >= memory.allocation_size() {
            return Err(Box::new(ValidationError {
                context: "memory_offset".into(),
                problem: "is not less than `memory.allocation_size()`".into(),
                vuids: &["VUID-vkBindBufferMemory-memoryOffset-01031"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if self.size > memory.allocation_size() - memory_offset {
            return Err(Box::new(ValidationError {
                problem: "`self.size()` is greater than `memory.allocation_size()` minus \
                    `memory_offset`"
                    .into(),
                vuids: &["VUID-vkBindBufferMemory-size-01037"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if self.is_protected() && !memory.is_protected() {
            return Err(Box::new(ValidationError {
                problem: "the buffer is protected, but `memory` is not protected memory".into(),
                vuids: &["VUID-vkBindBufferMemory-None-01898"],
                kind: Some(ViolationKind::ProtectedResourceMismatch),
                ..Default::default()
            }));
        }

        if !self.is_protected() && memory.is_protected() {
            return Err(Box::new(ValidationError {
                problem: "the buffer is not protected, but `memory` is protected memory".into(),
                vuids: &["VUID-vkBindBufferMemory-None-01899"],
                kind: Some(ViolationKind::ProtectedResourceMismatch),
                ..Default::default()
            }));
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn bind_memory_unchecked(&self, memory: Arc<DeviceMemory>, memory_offset: DeviceSize) {
        *self.memory.lock() = Some((memory, memory_offset));
        self.device
            .registry()
            .set_state(self.handle, ObjectState::BoundToMemory);
    }

    /// Writes `data` to the buffer at `offset`, through the host-visible memory bound to it.
    pub fn write(&self, offset: DeviceSize, data: &[u8]) -> Result<(), ValidationErrors> {
        if offset + data.len() as DeviceSize > self.size {
            return self.device.report(
                Box::new(ValidationError {
                    problem: "`offset` + `data.len()` is greater than the size of the buffer"
                        .into(),
                    vuids: &["VUID-vkMapMemory-size-00681"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                })
                .into(),
            );
        }

        let Some((memory, memory_offset)) = self.memory() else {
            return self.device.report(self.memory_not_bound_error().into());
        };

        memory.write(memory_offset + offset, data)
    }

    /// Reads a `u32` from the buffer at `offset`, as the device would. Returns `None` if the
    /// buffer has no host-visible memory or the read is out of range.
    pub(crate) fn read_u32(&self, offset: DeviceSize) -> Option<u32> {
        if offset.checked_add(4)? > self.size {
            return None;
        }

        let (memory, memory_offset) = self.memory()?;
        memory.read_u32(memory_offset + offset)
    }

    fn memory_not_bound_error(&self) -> Box<ValidationError> {
        Box::new(ValidationError {
            context: "self".into(),
            problem: "has no memory bound to it".into(),
            kind: Some(ViolationKind::MemoryNotBound),
            ..Default::default()
        })
    }

    /// Checks that the buffer can be used by a command: it must be alive, have memory bound to
    /// it, and have been created with one of `usage`.
    pub(crate) fn validate_use(
        &self,
        usage: BufferUsage,
        usage_vuids: &'static [&'static str],
        memory_vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        if !self.device.registry().is_alive(self.handle) {
            return Err(Box::new(ValidationError {
                problem: "has been destroyed".into(),
                vuids: &["VUID-vkDestroyBuffer-buffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !usage.is_empty() && !self.usage.intersects(usage) {
            return Err(Box::new(ValidationError {
                context: "usage()".into(),
                problem: format!("does not contain {:?}", usage).into(),
                vuids: usage_vuids,
                kind: Some(ViolationKind::MissingUsage),
                ..Default::default()
            }));
        }

        if !self.is_bound() {
            return Err(self.memory_not_bound_error().set_vuids(memory_vuids));
        }

        Ok(())
    }
}

impl Drop for Buffer {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for Buffer {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Buffer {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("flags", &self.flags)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `Buffer`.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    /// Additional properties of the buffer.
    ///
    /// The default value is empty.
    pub flags: BufferCreateFlags,

    /// The size in bytes of the buffer.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    /// How the buffer is going to be used.
    ///
    /// The default value is empty, which must be overridden.
    pub usage: BufferUsage,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: BufferCreateFlags::empty(),
            size: 0,
            usage: BufferUsage::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl BufferCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            size,
            usage,
            _ne: _,
        } = self;

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags")
                .set_vuids(&["VUID-VkBufferCreateInfo-flags-01887"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        usage.validate_device(device).map_err(|err| {
            err.add_context("usage")
                .set_vuids(&["VUID-VkBufferCreateInfo-usage-parameter"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if usage.is_empty() {
            return Err(Box::new(ValidationError {
                context: "usage".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkBufferCreateInfo-usage-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size == 0 {
            return Err(Box::new(ValidationError {
                context: "size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkBufferCreateInfo-size-00912"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

vulkan_bitflags! {
    /// Flags specifying additional properties of a buffer.
    BufferCreateFlags = BufferCreateFlags(u32);

    /// The buffer is backed by protected memory, and can only be accessed by protected command
    /// buffers.
    PROTECTED = PROTECTED
    RequiresFeature(protected_memory),
}

vulkan_bitflags! {
    /// Describes how a buffer is going to be used. This is **not** just an optimization.
    ///
    /// If you try to use a buffer in a way that you didn't declare, an error will be returned.
    BufferUsage = BufferUsageFlags(u32);

    /// The buffer can be used as a source for transfer, blit, resolve and clear commands.
    TRANSFER_SRC = TRANSFER_SRC,

    /// The buffer can be used as a destination for transfer, blit, resolve and clear commands.
    TRANSFER_DST = TRANSFER_DST,

    /// The buffer can be used as a uniform texel buffer in a descriptor set.
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,

    /// The buffer can be used as a storage texel buffer in a descriptor set.
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,

    /// The buffer can be used as a uniform buffer in a descriptor set.
    UNIFORM_BUFFER = UNIFORM_BUFFER,

    /// The buffer can be used as a storage buffer in a descriptor set.
    STORAGE_BUFFER = STORAGE_BUFFER,

    /// The buffer can be used as an index buffer.
    INDEX_BUFFER = INDEX_BUFFER,

    /// The buffer can be used as a vertex or instance buffer.
    VERTEX_BUFFER = VERTEX_BUFFER,

    /// The buffer can be used as an indirect or count buffer.
    INDIRECT_BUFFER = INDIRECT_BUFFER,

    /// The buffer can be used as a transform feedback buffer.
    TRANSFORM_FEEDBACK_BUFFER = TRANSFORM_FEEDBACK_BUFFER_EXT
    RequiresFeature(transform_feedback),

    /// The buffer can be used as a transform feedback counter buffer.
    TRANSFORM_FEEDBACK_COUNTER_BUFFER = TRANSFORM_FEEDBACK_COUNTER_BUFFER_EXT
    RequiresFeature(transform_feedback),

    /// The buffer can be used as a conditional rendering predicate.
    CONDITIONAL_RENDERING = CONDITIONAL_RENDERING_EXT
    RequiresFeature(conditional_rendering),
}

vulkan_enum! {
    /// The type of the indices in an index buffer.
    IndexType = IndexType(i32);

    /// Indices are 8-bit unsigned integers.
    U8 = UINT8_EXT
    RequiresFeature(index_type_uint8),

    /// Indices are 16-bit unsigned integers.
    U16 = UINT16,

    /// Indices are 32-bit unsigned integers.
    U32 = UINT32,
}

impl IndexType {
    /// Returns the size in bytes of indices of this type.
    #[inline]
    pub fn size(self) -> DeviceSize {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
