// Copyright (c) 2021 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A pool from which descriptor sets can be allocated.

use super::{
    layout::{DescriptorSetLayout, DescriptorSetLayoutCreateFlags, DescriptorType},
    DescriptorSet,
};
use crate::{
    device::{Device, DeviceOwned},
    macros::vulkan_bitflags,
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashMap;
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Pool that descriptor sets can be allocated from.
///
/// The capacity of the pool is computed from the sets that are still alive: destroying or
/// freeing a set gives its descriptors back to the pool.
pub struct DescriptorPool {
    device: Arc<Device>,
    handle: Handle,

    flags: DescriptorPoolCreateFlags,
    max_sets: u32,
    pool_sizes: HashMap<DescriptorType, u32>,

    allocations: Mutex<Vec<(Handle, Arc<DescriptorSetLayout>)>>,
}

impl DescriptorPool {
    /// Creates a new `DescriptorPool`.
    pub fn new(
        device: Arc<Device>,
        create_info: DescriptorPoolCreateInfo,
    ) -> Result<Arc<DescriptorPool>, ValidationErrors> {
        device.report_one(
            create_info
                .validate(&device)
                .map_err(|err| err.add_context("create_info")),
        )?;

        Ok(Self::new_unchecked(device, create_info))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(
        device: Arc<Device>,
        create_info: DescriptorPoolCreateInfo,
    ) -> Arc<DescriptorPool> {
        let DescriptorPoolCreateInfo {
            flags,
            max_sets,
            pool_sizes,
            _ne: _,
        } = create_info;

        Arc::new(DescriptorPool {
            handle: device
                .registry()
                .register(ObjectType::DescriptorPool, None),
            device,
            flags,
            max_sets,
            pool_sizes,
            allocations: Mutex::new(Vec::new()),
        })
    }

    /// Returns the flags that the pool was created with.
    #[inline]
    pub fn flags(&self) -> DescriptorPoolCreateFlags {
        self.flags
    }

    /// Returns the maximum number of sets that can be allocated from the pool.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Returns the number of descriptors of each type that the pool was created with.
    #[inline]
    pub fn pool_sizes(&self) -> &HashMap<DescriptorType, u32> {
        &self.pool_sizes
    }

    /// Reserves the descriptors of a set with the given layout, and registers the set.
    pub(crate) fn allocate(
        &self,
        layout: &Arc<DescriptorSetLayout>,
    ) -> Result<Handle, Box<ValidationError>> {
        let registry = self.device.registry();

        if !registry.is_alive(self.handle) {
            return Err(Box::new(ValidationError {
                context: "pool".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkDescriptorSetAllocateInfo-descriptorPool-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if layout
            .flags()
            .intersects(DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            && !self
                .flags
                .intersects(DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
        {
            return Err(Box::new(ValidationError {
                problem: "the layout was created with \
                    `DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL`, but the pool was \
                    not created with `DescriptorPoolCreateFlags::UPDATE_AFTER_BIND`"
                    .into(),
                vuids: &["VUID-VkDescriptorSetAllocateInfo-pSetLayouts-03044"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let mut allocations = self.allocations.lock();
        allocations.retain(|&(handle, _)| registry.is_alive(handle));

        if allocations.len() as u32 >= self.max_sets {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the pool already has {} sets allocated, which is its maximum",
                    self.max_sets,
                )
                .into(),
                vuids: &["VUID-VkDescriptorSetAllocateInfo-descriptorSetCount-00306"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        let mut used: HashMap<DescriptorType, u32> = HashMap::default();

        for (descriptor_type, count) in allocations
            .iter()
            .flat_map(|(_, layout)| layout.descriptor_counts())
        {
            *used.entry(descriptor_type).or_default() += count;
        }

        for (descriptor_type, count) in layout.descriptor_counts() {
            let available = self.pool_sizes.get(&descriptor_type).copied().unwrap_or(0);
            let used = used.entry(descriptor_type).or_default();

            if *used + count > available {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the pool does not have enough `DescriptorType::{:?}` descriptors left \
                        to allocate the set",
                        descriptor_type,
                    )
                    .into(),
                    vuids: &["VUID-VkDescriptorSetAllocateInfo-descriptorPool-00307"],
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }

            *used += count;
        }

        let handle = registry.register(ObjectType::DescriptorSet, Some(self.handle));
        allocations.push((handle, layout.clone()));

        Ok(handle)
    }

    /// Frees a descriptor set, returning its descriptors to the pool.
    ///
    /// Command buffers that recorded a bind of the set become invalid.
    pub fn free(&self, descriptor_set: &DescriptorSet) -> Result<(), ValidationErrors> {
        if !self
            .flags
            .intersects(DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        {
            return self.device.report_one(Err(Box::new(ValidationError {
                context: "self.flags()".into(),
                problem: "does not contain `DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET`".into(),
                vuids: &["VUID-vkFreeDescriptorSets-descriptorPool-00312"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            })));
        }

        let mut errors = ValidationErrors::new();
        self.device.destroy_recursive(
            descriptor_set.handle(),
            &["VUID-vkFreeDescriptorSets-pDescriptorSets-00309"],
            &mut errors,
        );

        self.device.report(errors)
    }

    /// Frees every descriptor set that was allocated from the pool.
    pub fn reset(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for handle in self.device.registry().children(self.handle) {
            self.device.destroy_recursive(
                handle,
                &["VUID-vkResetDescriptorPool-descriptorPool-00313"],
                &mut errors,
            );
        }

        self.allocations.lock().clear();

        self.device.report(errors)
    }
}

impl Drop for DescriptorPool {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for DescriptorPool {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for DescriptorPool {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for DescriptorPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DescriptorPool")
            .field("handle", &self.handle)
            .field("flags", &self.flags)
            .field("max_sets", &self.max_sets)
            .field("pool_sizes", &self.pool_sizes)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `DescriptorPool`.
#[derive(Clone, Debug)]
pub struct DescriptorPoolCreateInfo {
    /// Additional properties of the descriptor pool.
    ///
    /// The default value is empty.
    pub flags: DescriptorPoolCreateFlags,

    /// The maximum number of descriptor sets that can be allocated from the pool.
    ///
    /// The default value is `0`, which must be overridden.
    pub max_sets: u32,

    /// The number of descriptors of each type to allocate for the pool.
    ///
    /// The default value is empty, which must be overridden.
    pub pool_sizes: HashMap<DescriptorType, u32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: DescriptorPoolCreateFlags::empty(),
            max_sets: 0,
            pool_sizes: HashMap::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorPoolCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            max_sets,
            ref pool_sizes,
            _ne: _,
        } = self;

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags")
                .set_vuids(&["VUID-VkDescriptorPoolCreateInfo-flags-parameter"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if max_sets == 0 {
            return Err(Box::new(ValidationError {
                context: "max_sets".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkDescriptorPoolCreateInfo-maxSets-00301"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (&descriptor_type, &pool_size) in pool_sizes.iter() {
            if pool_size == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("pool_sizes[DescriptorType::{:?}]", descriptor_type).into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkDescriptorPoolSize-descriptorCount-00302"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_bitflags! {
    /// Additional properties of a descriptor pool.
    DescriptorPoolCreateFlags = DescriptorPoolCreateFlags(u32);

    /// Individual descriptor sets can be freed from the pool. Otherwise you must reset or
    /// destroy the whole pool at once.
    FREE_DESCRIPTOR_SET = FREE_DESCRIPTOR_SET,

    /// The pool can allocate descriptor sets with a layout whose flags include
    /// [`DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL`].
    UPDATE_AFTER_BIND = UPDATE_AFTER_BIND
    RequiresFeature(descriptor_binding_update_after_bind),
}

#[cfg(test)]
mod tests {
    use super::{DescriptorPool, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo};
    use crate::{
        descriptor_set::{
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateFlags,
                DescriptorSetLayoutCreateInfo, DescriptorType,
            },
            DescriptorSet,
        },
        shader::ShaderStages,
        VulkanObject,
    };
    use std::{collections::BTreeMap, sync::Arc};

    fn uniform_layout(
        device: &Arc<crate::device::Device>,
        flags: DescriptorSetLayoutCreateFlags,
    ) -> Arc<DescriptorSetLayout> {
        DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                flags,
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        stages: ShaderStages::all_graphics(),
                        ..DescriptorSetLayoutBinding::descriptor_type(
                            DescriptorType::UniformBuffer,
                        )
                    },
                )]),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn zero_max_sets() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = DescriptorPool::new(
            device,
            DescriptorPoolCreateInfo {
                pool_sizes: [(DescriptorType::UniformBuffer, 1)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorPoolCreateInfo-maxSets-00301"));
    }

    #[test]
    fn pool_exhaustion() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = uniform_layout(&device, DescriptorSetLayoutCreateFlags::empty());
        let pool = DescriptorPool::new(
            device,
            DescriptorPoolCreateInfo {
                flags: DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
                max_sets: 2,
                pool_sizes: [(DescriptorType::UniformBuffer, 1)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap();

        let first = DescriptorSet::new(pool.clone(), layout.clone(), []).unwrap();
        let errors = DescriptorSet::new(pool.clone(), layout.clone(), []).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorSetAllocateInfo-descriptorPool-00307"));

        // Freeing gives the descriptor back.
        pool.free(&first).unwrap();
        DescriptorSet::new(pool, layout, []).unwrap();
    }

    #[test]
    fn free_needs_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = uniform_layout(&device, DescriptorSetLayoutCreateFlags::empty());
        let pool = DescriptorPool::new(
            device.clone(),
            DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [(DescriptorType::UniformBuffer, 1)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap();

        let set = DescriptorSet::new(pool.clone(), layout, []).unwrap();
        let errors = pool.free(&set).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkFreeDescriptorSets-descriptorPool-00312"));

        pool.reset().unwrap();
        assert!(!device.registry().is_alive(set.handle()));
    }

    #[test]
    fn update_after_bind_layout_needs_pool_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = uniform_layout(&device, DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL);
        let pool = DescriptorPool::new(
            device,
            DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [(DescriptorType::UniformBuffer, 1)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap();

        let errors = DescriptorSet::new(pool, layout, []).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorSetAllocateInfo-pSetLayouts-03044"));
    }
}
