// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Device memory allocations.
//!
//! Buffers and images must have memory bound to them before they can be used by commands. Memory
//! that is [`HOST_VISIBLE`](MemoryPropertyFlags::HOST_VISIBLE) keeps its contents in the model,
//! so that data-dependent rules (indirect draw counts, texel indices read by shaders) can be
//! evaluated when work is executed.

use crate::{
    device::{Device, DeviceOwned},
    macros::vulkan_bitflags,
    registry::ObjectType,
    DeviceSize, Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use parking_lot::RwLock;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Represents memory that has been allocated from the device.
pub struct DeviceMemory {
    device: Arc<Device>,
    handle: Handle,

    allocation_size: DeviceSize,
    property_flags: MemoryPropertyFlags,

    // Only allocated for host-visible memory.
    data: RwLock<Vec<u8>>,
}

impl DeviceMemory {
    /// Allocates a block of memory from the device.
    pub fn allocate(
        device: Arc<Device>,
        allocate_info: MemoryAllocateInfo,
    ) -> Result<Arc<DeviceMemory>, ValidationErrors> {
        device.report_one(Self::validate_allocate(&device, &allocate_info))?;

        Ok(Self::allocate_unchecked(device, allocate_info))
    }

    fn validate_allocate(
        device: &Device,
        allocate_info: &MemoryAllocateInfo,
    ) -> Result<(), Box<ValidationError>> {
        allocate_info
            .validate(device)
            .map_err(|err| err.add_context("allocate_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn allocate_unchecked(
        device: Arc<Device>,
        allocate_info: MemoryAllocateInfo,
    ) -> Arc<DeviceMemory> {
        let MemoryAllocateInfo {
            allocation_size,
            property_flags,
            _ne: _,
        } = allocate_info;

        let data = if property_flags.intersects(MemoryPropertyFlags::HOST_VISIBLE) {
            vec![0; allocation_size as usize]
        } else {
            Vec::new()
        };

        Arc::new(DeviceMemory {
            handle: device.registry().register(ObjectType::DeviceMemory, None),
            device,
            allocation_size,
            property_flags,
            data: RwLock::new(data),
        })
    }

    /// Returns the size in bytes of the allocation.
    #[inline]
    pub fn allocation_size(&self) -> DeviceSize {
        self.allocation_size
    }

    /// Returns the properties of the memory type that the allocation was made from.
    #[inline]
    pub fn property_flags(&self) -> MemoryPropertyFlags {
        self.property_flags
    }

    /// Returns whether the allocation is protected memory.
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.property_flags.intersects(MemoryPropertyFlags::PROTECTED)
    }

    /// Writes `data` to the memory at `offset`, as if it had been mapped and written by the host.
    pub fn write(&self, offset: DeviceSize, data: &[u8]) -> Result<(), ValidationErrors> {
        self.device
            .report_one(self.validate_host_access(offset, data.len() as DeviceSize))?;

        let offset = offset as usize;
        self.data.write()[offset..offset + data.len()].copy_from_slice(data);

        Ok(())
    }

    /// Reads `len` bytes of the memory at `offset`, as if it had been mapped and read by the
    /// host.
    pub fn read(&self, offset: DeviceSize, len: DeviceSize) -> Result<Vec<u8>, ValidationErrors> {
        self.device
            .report_one(self.validate_host_access(offset, len))?;

        let offset = offset as usize;
        Ok(self.data.read()[offset..offset + len as usize].to_vec())
    }

    fn validate_host_access(
        &self,
        offset: DeviceSize,
        len: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        if !self
            .property_flags
            .intersects(MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(Box::new(ValidationError {
                context: "self.property_flags()".into(),
                problem: "does not contain `MemoryPropertyFlags::HOST_VISIBLE`".into(),
                vuids: &["VUID-vkMapMemory-memory-00682"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if offset >= self.allocation_size {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not less than the size of the allocation".into(),
                vuids: &["VUID-vkMapMemory-offset-00679"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if len > self.allocation_size - offset {
            return Err(Box::new(ValidationError {
                problem: "`offset` + the length of the access is greater than the size of the \
                    allocation"
                    .into(),
                vuids: &["VUID-vkMapMemory-size-00681"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Reads a `u32` at `offset`, without reporting anything. Returns `None` if the memory is not
    /// host-visible or the read is out of range.
    pub(crate) fn read_u32(&self, offset: DeviceSize) -> Option<u32> {
        let offset = usize::try_from(offset).ok()?;
        let data = self.data.read();
        let bytes = data.get(offset..offset.checked_add(4)?)?;

        Some(bytemuck::pod_read_unaligned(bytes))
    }
}

impl Drop for DeviceMemory {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for DeviceMemory {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for DeviceMemory {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for DeviceMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DeviceMemory")
            .field("handle", &self.handle)
            .field("allocation_size", &self.allocation_size)
            .field("property_flags", &self.property_flags)
            .finish_non_exhaustive()
    }
}

/// Parameters to allocate a new `DeviceMemory`.
#[derive(Clone, Debug)]
pub struct MemoryAllocateInfo {
    /// The number of bytes to allocate.
    ///
    /// The default value is `0`, which must be overridden.
    pub allocation_size: DeviceSize,

    /// The properties of the memory type to allocate from.
    ///
    /// The default value is [`MemoryPropertyFlags::DEVICE_LOCAL`].
    pub property_flags: MemoryPropertyFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for MemoryAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            allocation_size: 0,
            property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl MemoryAllocateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            allocation_size,
            property_flags,
            _ne: _,
        } = self;

        if allocation_size == 0 {
            return Err(Box::new(ValidationError {
                context: "allocation_size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkMemoryAllocateInfo-allocationSize-07899"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        property_flags.validate_device(device).map_err(|err| {
            err.add_context("property_flags")
                .set_vuids(&["VUID-VkMemoryAllocateInfo-memoryTypeIndex-01872"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        Ok(())
    }
}

vulkan_bitflags! {
    /// Properties of a memory type.
    MemoryPropertyFlags = MemoryPropertyFlags(u32);

    /// The memory is located on the device, and is allocated from a heap that also has the
    /// `DEVICE_LOCAL` flag set.
    DEVICE_LOCAL = DEVICE_LOCAL,

    /// The memory can be mapped and accessed by the host.
    HOST_VISIBLE = HOST_VISIBLE,

    /// Host writes are automatically made visible to the device, and device writes to the host.
    HOST_COHERENT = HOST_COHERENT,

    /// The memory is cached by the host.
    HOST_CACHED = HOST_CACHED,

    /// Allocations made from the memory type are lazily committed.
    LAZILY_ALLOCATED = LAZILY_ALLOCATED,

    /// The memory can only be accessed by the device, and allows protected queue access.
    PROTECTED = PROTECTED
    RequiresFeature(protected_memory),
}

#[cfg(test)]
mod tests {
    use super::{DeviceMemory, MemoryAllocateInfo, MemoryPropertyFlags};
    use crate::{device::DeviceFeatures, ViolationKind};

    #[test]
    fn zero_size() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = DeviceMemory::allocate(device, MemoryAllocateInfo::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkMemoryAllocateInfo-allocationSize-07899"));
    }

    #[test]
    fn protected_requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());

        let errors = DeviceMemory::allocate(
            device,
            MemoryAllocateInfo {
                allocation_size: 256,
                property_flags: MemoryPropertyFlags::PROTECTED,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }

    #[test]
    fn host_access() {
        let (device, _queue) = gfx_dev_and_queue!();

        let memory = DeviceMemory::allocate(
            device.clone(),
            MemoryAllocateInfo {
                allocation_size: 16,
                property_flags: MemoryPropertyFlags::HOST_VISIBLE,
                ..Default::default()
            },
        )
        .unwrap();

        memory.write(4, &7u32.to_ne_bytes()).unwrap();
        assert_eq!(memory.read_u32(4), Some(7));
        assert_eq!(memory.read_u32(14), None);

        let errors = memory.write(12, &[0; 8]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkMapMemory-size-00681"));

        let device_local = DeviceMemory::allocate(
            device,
            MemoryAllocateInfo {
                allocation_size: 16,
                ..Default::default()
            },
        )
        .unwrap();
        let errors = device_local.read(0, 4).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkMapMemory-memory-00682"));
    }
}
