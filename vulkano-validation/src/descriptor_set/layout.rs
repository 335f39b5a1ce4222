// Copyright (c) 2021 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describes the layout of all descriptors within a descriptor set.
//!
//! When creating a new descriptor set, you must provide a *layout* object to create it from.

use crate::{
    device::{Device, DeviceOwned},
    macros::{vulkan_bitflags, vulkan_enum},
    registry::ObjectType,
    shader::{DescriptorBindingRequirements, ShaderStage, ShaderStages},
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    collections::BTreeMap,
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Describes to the Vulkan implementation the layout of all descriptors within a descriptor set.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    handle: Handle,

    flags: DescriptorSetLayoutCreateFlags,
    bindings: BTreeMap<u32, DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Creates a new `DescriptorSetLayout`.
    pub fn new(
        device: Arc<Device>,
        create_info: DescriptorSetLayoutCreateInfo,
    ) -> Result<Arc<DescriptorSetLayout>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &DescriptorSetLayoutCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(
        device: Arc<Device>,
        create_info: DescriptorSetLayoutCreateInfo,
    ) -> Arc<DescriptorSetLayout> {
        let DescriptorSetLayoutCreateInfo {
            flags,
            bindings,
            _ne: _,
        } = create_info;

        Arc::new(DescriptorSetLayout {
            handle: device
                .registry()
                .register(ObjectType::DescriptorSetLayout, None),
            device,
            flags,
            bindings,
        })
    }

    /// Returns the flags that the descriptor set layout was created with.
    #[inline]
    pub fn flags(&self) -> DescriptorSetLayoutCreateFlags {
        self.flags
    }

    /// Returns the bindings of the descriptor set layout.
    #[inline]
    pub fn bindings(&self) -> &BTreeMap<u32, DescriptorSetLayoutBinding> {
        &self.bindings
    }

    /// Returns the number of descriptors of each type, summed over all bindings.
    pub fn descriptor_counts(&self) -> impl Iterator<Item = (DescriptorType, u32)> + '_ {
        self.bindings
            .values()
            .map(|binding| (binding.descriptor_type, binding.descriptor_count))
    }

    /// Returns the number of dynamic buffer descriptors in the layout.
    pub fn num_dynamic_descriptors(&self) -> u32 {
        self.bindings
            .values()
            .filter(|binding| binding.descriptor_type.is_dynamic())
            .map(|binding| binding.descriptor_count)
            .sum()
    }

    /// Returns whether `self` is compatible with `other`.
    ///
    /// "Compatible" in this sense is defined by the Vulkan specification under the section
    /// "Pipeline layout compatibility": either the two are the same descriptor set layout object,
    /// or they must be identically defined to the Vulkan API.
    #[inline]
    pub fn is_compatible_with(&self, other: &DescriptorSetLayout) -> bool {
        self.handle == other.handle || (self.flags == other.flags && self.bindings == other.bindings)
    }
}

impl Drop for DescriptorSetLayout {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for DescriptorSetLayout {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for DescriptorSetLayout {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DescriptorSetLayout")
            .field("handle", &self.handle)
            .field("flags", &self.flags)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `DescriptorSetLayout`.
#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutCreateInfo {
    /// Specifies how to create the descriptor set layout.
    ///
    /// The default value is empty.
    pub flags: DescriptorSetLayoutCreateFlags,

    /// The bindings of the descriptor set layout. These are specified according to binding
    /// number.
    ///
    /// It is generally advisable to keep the binding numbers low. Higher binding numbers may
    /// use more memory inside Vulkan.
    ///
    /// The default value is empty.
    pub bindings: BTreeMap<u32, DescriptorSetLayoutBinding>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorSetLayoutCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: DescriptorSetLayoutCreateFlags::empty(),
            bindings: BTreeMap::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorSetLayoutCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            ref bindings,
            _ne: _,
        } = self;

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags")
                .set_vuids(&["VUID-VkDescriptorSetLayoutCreateInfo-flags-parameter"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        for (&binding_num, binding) in bindings.iter() {
            binding
                .validate(device)
                .map_err(|err| err.add_context(format!("bindings[{}]", binding_num)))?;

            let &DescriptorSetLayoutBinding {
                binding_flags,
                descriptor_type,
                descriptor_count: _,
                stages: _,
                _ne: _,
            } = binding;

            if binding_flags.intersects(DescriptorBindingFlags::UPDATE_AFTER_BIND) {
                if !flags.intersects(DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL) {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "`bindings[{}].binding_flags` contains \
                            `DescriptorBindingFlags::UPDATE_AFTER_BIND`, but `flags` does not \
                            contain `DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL`",
                            binding_num
                        )
                        .into(),
                        vuids: &["VUID-VkDescriptorSetLayoutCreateInfo-flags-03000"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }

                if descriptor_type.is_dynamic() {
                    return Err(Box::new(ValidationError {
                        problem: format!(
                            "`bindings[{}].binding_flags` contains \
                            `DescriptorBindingFlags::UPDATE_AFTER_BIND`, and \
                            `bindings[{0}].descriptor_type` is a dynamic buffer type",
                            binding_num
                        )
                        .into(),
                        vuids: &["VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-None-03015"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }
            }
        }

        Ok(())
    }
}

vulkan_bitflags! {
    /// Flags that control how a descriptor set layout is created.
    DescriptorSetLayoutCreateFlags = DescriptorSetLayoutCreateFlags(u32);

    /// Whether descriptor sets using this descriptor set layout must be allocated from a
    /// descriptor pool whose flags contain [`DescriptorPoolCreateFlags::UPDATE_AFTER_BIND`].
    /// Descriptor set layouts with this flag use alternative (typically higher) limits on
    /// per-stage and total descriptor counts, which have `_update_after_bind` in their names.
    ///
    /// This flag must be specified whenever the layout contains one or more bindings that have
    /// the [`DescriptorBindingFlags::UPDATE_AFTER_BIND`] flag.
    ///
    /// [`DescriptorPoolCreateFlags::UPDATE_AFTER_BIND`]: crate::descriptor_set::pool::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
    UPDATE_AFTER_BIND_POOL = UPDATE_AFTER_BIND_POOL
    RequiresFeature(descriptor_binding_update_after_bind),
}

/// A binding in a descriptor set layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    /// Specifies how to create the binding.
    ///
    /// The default value is empty.
    pub binding_flags: DescriptorBindingFlags,

    /// The content and layout of each array element of a binding.
    ///
    /// There is no default value.
    pub descriptor_type: DescriptorType,

    /// How many descriptors (array elements) this binding is made of.
    ///
    /// If the binding is a single element rather than an array, then you must specify `1`.
    ///
    /// The default value is `1`.
    pub descriptor_count: u32,

    /// Which shader stages are going to access the descriptors in this binding.
    ///
    /// The default value is [`ShaderStages::empty()`], which must be overridden.
    pub stages: ShaderStages,

    pub _ne: crate::NonExhaustive,
}

impl DescriptorSetLayoutBinding {
    /// Returns a `DescriptorSetLayoutBinding` with the given type.
    #[inline]
    pub fn descriptor_type(descriptor_type: DescriptorType) -> Self {
        Self {
            binding_flags: DescriptorBindingFlags::empty(),
            descriptor_type,
            descriptor_count: 1,
            stages: ShaderStages::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }

    /// Returns whether the binding's descriptors may be left unwritten or be updated while a
    /// command buffer that uses them is recorded.
    #[inline]
    pub(crate) fn skips_draw_validation(&self) -> bool {
        self.binding_flags.intersects(
            DescriptorBindingFlags::UPDATE_AFTER_BIND | DescriptorBindingFlags::PARTIALLY_BOUND,
        )
    }

    /// Checks whether the descriptor of a pipeline layout `self` is compatible with the
    /// requirements of a shader stage.
    pub(crate) fn ensure_compatible_with_shader(
        &self,
        binding_requirements: &DescriptorBindingRequirements,
        stage: ShaderStage,
    ) -> Result<(), Box<ValidationError>> {
        let &DescriptorBindingRequirements {
            ref descriptor_types,
            descriptor_count,
            ..
        } = binding_requirements;

        if !descriptor_types.contains(&self.descriptor_type) {
            return Err(Box::new(ValidationError {
                problem: "the descriptor type is not one of the types allowed by the \
                    descriptor binding requirements"
                    .into(),
                kind: Some(ViolationKind::DescriptorTypeMismatch),
                ..Default::default()
            }));
        }

        if let Some(required) = descriptor_count {
            if self.descriptor_count < required {
                return Err(Box::new(ValidationError {
                    problem: "the descriptor count is less than the count required by the \
                        descriptor binding requirements"
                        .into(),
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }
        }

        if !self.stages.contains(stage.into()) {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the stages do not contain `{:?}`, the stage of the shader that uses the \
                    descriptor",
                    stage
                )
                .into(),
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding_flags,
            descriptor_type,
            descriptor_count: _,
            stages,
            _ne: _,
        } = self;

        if binding_flags.intersects(DescriptorBindingFlags::UPDATE_AFTER_BIND)
            && !device.enabled_features().descriptor_binding_update_after_bind
        {
            return Err(Box::new(ValidationError {
                context: "binding_flags".into(),
                problem: "contains `DescriptorBindingFlags::UPDATE_AFTER_BIND`".into(),
                requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                    crate::Requires::DeviceFeature("descriptor_binding_update_after_bind"),
                ])]),
                vuids: match descriptor_type {
                    DescriptorType::UniformBuffer => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingUniformBufferUpdateAfterBind-03005",
                    ],
                    DescriptorType::Sampler
                    | DescriptorType::CombinedImageSampler
                    | DescriptorType::SampledImage => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingSampledImageUpdateAfterBind-03006",
                    ],
                    DescriptorType::StorageImage => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingStorageImageUpdateAfterBind-03007",
                    ],
                    DescriptorType::StorageBuffer => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingStorageBufferUpdateAfterBind-03008",
                    ],
                    DescriptorType::UniformTexelBuffer => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingUniformTexelBufferUpdateAfterBind-03009",
                    ],
                    DescriptorType::StorageTexelBuffer => &[
                        "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingStorageTexelBufferUpdateAfterBind-03010",
                    ],
                    _ => &["VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-None-03015"],
                },
                kind: Some(ViolationKind::FeatureNotEnabled),
            }));
        }

        if binding_flags.intersects(DescriptorBindingFlags::PARTIALLY_BOUND)
            && !device.enabled_features().descriptor_binding_partially_bound
        {
            return Err(Box::new(ValidationError {
                context: "binding_flags".into(),
                problem: "contains `DescriptorBindingFlags::PARTIALLY_BOUND`".into(),
                requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                    crate::Requires::DeviceFeature("descriptor_binding_partially_bound"),
                ])]),
                vuids: &[
                    "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingPartiallyBound-03013",
                ],
                kind: Some(ViolationKind::FeatureNotEnabled),
            }));
        }

        if descriptor_type == DescriptorType::InputAttachment
            && !(stages.is_empty() || stages == ShaderStages::FRAGMENT)
        {
            return Err(Box::new(ValidationError {
                problem: "`descriptor_type` is `DescriptorType::InputAttachment`, but \
                    `stages` is not either empty or equal to `ShaderStages::FRAGMENT`"
                    .into(),
                vuids: &["VUID-VkDescriptorSetLayoutBinding-descriptorType-01510"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

vulkan_bitflags! {
    /// Flags that control how a binding in a descriptor set layout is created.
    DescriptorBindingFlags = DescriptorBindingFlags(u32);

    /// Allows descriptors in this binding to be updated after a command buffer has already
    /// recorded a bind command containing a descriptor set with this layout, as long as the
    /// command buffer is not executing. Each descriptor can also be updated concurrently.
    ///
    /// If a binding has this flag, then the descriptor set layout must be created with the
    /// [`DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL`] flag, and descriptor sets using
    /// it must be allocated from a descriptor pool that has the
    /// [`DescriptorPoolCreateFlags::UPDATE_AFTER_BIND`] flag.
    ///
    /// [`DescriptorPoolCreateFlags::UPDATE_AFTER_BIND`]: crate::descriptor_set::pool::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
    UPDATE_AFTER_BIND = UPDATE_AFTER_BIND,

    /// Allows descriptors in this binding to be updated after a command buffer has already
    /// recorded a bind command containing a descriptor set with this layout, as long as the
    /// command buffer is not executing, and no shader statically uses the descriptor.
    UPDATE_UNUSED_WHILE_PENDING = UPDATE_UNUSED_WHILE_PENDING,

    /// Allows descriptors to be left empty or invalid even if they are statically used by a
    /// shader.
    ///
    /// Draw and dispatch commands don't check that descriptors of such a binding are written.
    PARTIALLY_BOUND = PARTIALLY_BOUND,
}

vulkan_enum! {
    /// Describes what kind of resource may later be bound to a descriptor.
    DescriptorType = DescriptorType(i32);

    /// Describes how a `SampledImage` descriptor should be read.
    Sampler = SAMPLER,

    /// Combines `SampledImage` and `Sampler` in a single descriptor.
    CombinedImageSampler = COMBINED_IMAGE_SAMPLER,

    /// Gives read-only access to an image via a sampler. The image must be combined with a
    /// sampler inside the shader.
    SampledImage = SAMPLED_IMAGE,

    /// Gives read and/or write access to individual pixels in an image. The image cannot be
    /// sampled, so you have exactly specify which pixel to read or write.
    StorageImage = STORAGE_IMAGE,

    /// Gives read-only access to the content of a buffer, interpreted as an array of texels.
    UniformTexelBuffer = UNIFORM_TEXEL_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as an array of
    /// texels.
    StorageTexelBuffer = STORAGE_TEXEL_BUFFER,

    /// Gives read-only access to the content of a buffer, interpreted as a structure.
    UniformBuffer = UNIFORM_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as a structure.
    StorageBuffer = STORAGE_BUFFER,

    /// As `UniformBuffer`, but the offset within the buffer is specified at the time the
    /// descriptor set is bound, rather than when the descriptor set is updated.
    UniformBufferDynamic = UNIFORM_BUFFER_DYNAMIC,

    /// As `StorageBuffer`, but the offset within the buffer is specified at the time the
    /// descriptor set is bound, rather than when the descriptor set is updated.
    StorageBufferDynamic = STORAGE_BUFFER_DYNAMIC,

    /// Gives access to an image inside a fragment shader via a render pass. You can only access
    /// the pixel that is currently being processed by the fragment shader.
    InputAttachment = INPUT_ATTACHMENT,
}

impl DescriptorType {
    /// Returns whether the offset of the descriptor is given when the set is bound.
    #[inline]
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DescriptorBindingFlags, DescriptorSetLayout, DescriptorSetLayoutBinding,
        DescriptorSetLayoutCreateFlags, DescriptorSetLayoutCreateInfo, DescriptorType,
    };
    use crate::{device::DeviceFeatures, shader::ShaderStages};
    use std::collections::BTreeMap;

    #[test]
    fn compatible_layouts() {
        let (device, _queue) = gfx_dev_and_queue!();
        let create_info = DescriptorSetLayoutCreateInfo {
            bindings: [(
                0,
                DescriptorSetLayoutBinding {
                    stages: ShaderStages::all_graphics(),
                    ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::UniformBuffer)
                },
            )]
            .into(),
            ..Default::default()
        };

        let first = DescriptorSetLayout::new(device.clone(), create_info.clone()).unwrap();
        let second = DescriptorSetLayout::new(device.clone(), create_info).unwrap();
        let empty = DescriptorSetLayout::new(device, Default::default()).unwrap();

        assert!(first.is_compatible_with(&second));
        assert!(!first.is_compatible_with(&empty));
    }

    #[test]
    fn update_after_bind_needs_pool_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let binding = DescriptorSetLayoutBinding {
            binding_flags: DescriptorBindingFlags::UPDATE_AFTER_BIND,
            stages: ShaderStages::COMPUTE,
            ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::StorageBuffer)
        };

        let errors = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([(0, binding.clone())]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorSetLayoutCreateInfo-flags-03000"));

        DescriptorSetLayout::new(
            device,
            DescriptorSetLayoutCreateInfo {
                flags: DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL,
                bindings: BTreeMap::from([(0, binding)]),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn partially_bound_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let errors = DescriptorSetLayout::new(
            device,
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        binding_flags: DescriptorBindingFlags::PARTIALLY_BOUND,
                        stages: ShaderStages::FRAGMENT,
                        ..DescriptorSetLayoutBinding::descriptor_type(
                            DescriptorType::SampledImage,
                        )
                    },
                )]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid(
            "VUID-VkDescriptorSetLayoutBindingFlagsCreateInfo-descriptorBindingPartiallyBound-03013"
        ));
    }

    #[test]
    fn input_attachment_stage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = DescriptorSetLayout::new(
            device,
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        stages: ShaderStages::VERTEX,
                        ..DescriptorSetLayoutBinding::descriptor_type(
                            DescriptorType::InputAttachment,
                        )
                    },
                )]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorSetLayoutBinding-descriptorType-01510"));
    }
}
