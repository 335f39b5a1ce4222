// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The layout of descriptor sets and push constants used by a pipeline.
//!
//! # Layout compatibility
//!
//! When binding descriptor sets or setting push constants, you must provide a pipeline layout.
//! This layout is used to decide where in memory Vulkan should write the new data. The
//! descriptor sets and push constants can later be read by dispatch or draw calls, but only if
//! the bound pipeline being used for the command has a layout that is *compatible* with the
//! layout that was used to bind the resources.
//!
//! *Compatible* means that the pipeline layout must be the same object, or a different layout in
//! which the push constant ranges and descriptor set layouts were identically defined.
//! However, Vulkan allows for partial compatibility as well. In the case of descriptor sets,
//! set `n` of layout A is compatible with set `n` of layout B if all sets before it are
//! compatible too, and the push constant ranges are identical.

use crate::{
    descriptor_set::layout::DescriptorSetLayout,
    device::{Device, DeviceOwned},
    registry::ObjectType,
    shader::{DescriptorBindingRequirements, ShaderStage, ShaderStages},
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use smallvec::SmallVec;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Describes the layout of descriptor sets and push constants that are made available to shaders.
pub struct PipelineLayout {
    device: Arc<Device>,
    handle: Handle,

    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    push_constant_ranges: Vec<PushConstantRange>,
}

impl PipelineLayout {
    /// Creates a new `PipelineLayout`.
    pub fn new(
        device: Arc<Device>,
        create_info: PipelineLayoutCreateInfo,
    ) -> Result<Arc<PipelineLayout>, ValidationErrors> {
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
        create_info: PipelineLayoutCreateInfo,
    ) -> Arc<PipelineLayout> {
        let PipelineLayoutCreateInfo {
            set_layouts,
            mut push_constant_ranges,
            _ne: _,
        } = create_info;

        // Sort the ranges so that equally defined layouts compare equal.
        push_constant_ranges.sort_unstable_by_key(|range| {
            (range.offset, range.size, range.stages.as_raw())
        });

        Arc::new(PipelineLayout {
            handle: device
                .registry()
                .register(ObjectType::PipelineLayout, None),
            device,
            set_layouts,
            push_constant_ranges,
        })
    }

    /// Returns the descriptor set layouts this pipeline layout was created from.
    #[inline]
    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    /// Returns a slice containing the push constant ranges this pipeline layout was created from.
    ///
    /// The ranges are guaranteed to be sorted deterministically by offset, size, then stages.
    #[inline]
    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    /// Returns whether `self` is compatible with `other` for the given number of sets.
    pub fn is_compatible_with(&self, other: &PipelineLayout, num_sets: u32) -> bool {
        let num_sets = num_sets as usize;

        if self.handle == other.handle {
            return true;
        }

        if self.push_constant_ranges != other.push_constant_ranges {
            return false;
        }

        let (Some(self_sets), Some(other_sets)) = (
            self.set_layouts.get(0..num_sets),
            other.set_layouts.get(0..num_sets),
        ) else {
            return false;
        };

        self_sets
            .iter()
            .zip(other_sets)
            .all(|(self_set_layout, other_set_layout)| {
                self_set_layout.is_compatible_with(other_set_layout)
            })
    }

    /// Makes sure that `self` is a superset of the descriptor requirements and push constant
    /// range of a shader stage.
    pub(crate) fn ensure_compatible_with_shader<'a>(
        &self,
        stage: ShaderStage,
        descriptor_requirements: impl IntoIterator<
            Item = (&'a (u32, u32), &'a DescriptorBindingRequirements),
        >,
        push_constant_range: Option<&PushConstantRange>,
    ) -> Result<(), Box<ValidationError>> {
        for (&(set_num, binding_num), reqs) in descriptor_requirements {
            let Some(layout_binding) = self
                .set_layouts
                .get(set_num as usize)
                .and_then(|set_layout| set_layout.bindings().get(&binding_num))
            else {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the requirements for descriptor set {} binding {} were not met: \
                        no such binding exists in the pipeline layout",
                        set_num, binding_num,
                    )
                    .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-layout-07988"],
                    kind: Some(ViolationKind::DescriptorSetNotBoundViolation),
                    ..Default::default()
                }));
            };

            if let Err(error) = layout_binding.ensure_compatible_with_shader(reqs, stage) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the requirements for descriptor set {} binding {} were not met: {}",
                        set_num, binding_num, error.problem,
                    )
                    .into(),
                    vuids: match error.kind {
                        Some(ViolationKind::DescriptorTypeMismatch) => {
                            &["VUID-VkGraphicsPipelineCreateInfo-layout-07990"]
                        }
                        Some(ViolationKind::LimitExceeded) => {
                            &["VUID-VkGraphicsPipelineCreateInfo-layout-07991"]
                        }
                        _ => &["VUID-VkGraphicsPipelineCreateInfo-layout-07988"],
                    },
                    kind: error.kind,
                    ..Default::default()
                }));
            }
        }

        if let Some(range) = push_constant_range {
            let covered = self.push_constant_ranges.iter().any(|own_range| {
                own_range.stages.contains(stage.into())
                    && own_range.offset <= range.offset
                    && range.offset + range.size <= own_range.offset + own_range.size
            });

            if !covered {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the push constant range {}..{} used by the `{:?}` stage is not \
                        contained in a push constant range of the pipeline layout for that stage",
                        range.offset,
                        range.offset + range.size,
                        stage,
                    )
                    .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-layout-07987"],
                    kind: Some(ViolationKind::PushConstantRangeNotSetViolation),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    /// Returns the push constant ranges of the layout that include `stage`.
    pub(crate) fn push_constant_ranges_for(
        &self,
        stages: ShaderStages,
    ) -> impl Iterator<Item = &PushConstantRange> {
        self.push_constant_ranges
            .iter()
            .filter(move |range| range.stages.intersects(stages))
    }
}

impl Drop for PipelineLayout {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for PipelineLayout {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for PipelineLayout {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for PipelineLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("PipelineLayout")
            .field("handle", &self.handle)
            .field(
                "set_layouts",
                &self
                    .set_layouts
                    .iter()
                    .map(|layout| layout.handle())
                    .collect::<SmallVec<[_; 4]>>(),
            )
            .field("push_constant_ranges", &self.push_constant_ranges)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `PipelineLayout`.
#[derive(Clone, Debug)]
pub struct PipelineLayoutCreateInfo {
    /// The descriptor set layouts that should be part of the pipeline layout.
    ///
    /// They are provided in order of set number.
    ///
    /// The default value is empty.
    pub set_layouts: Vec<Arc<DescriptorSetLayout>>,

    /// The ranges of push constants that the pipeline will access.
    ///
    /// A shader stage can only appear in one element of the list, but it is possible to combine
    /// ranges for multiple shader stages if they are the same.
    ///
    /// The default value is empty.
    pub push_constant_ranges: Vec<PushConstantRange>,

    pub _ne: crate::NonExhaustive,
}

impl Default for PipelineLayoutCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl PipelineLayoutCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref set_layouts,
            ref push_constant_ranges,
            _ne: _,
        } = self;

        let properties = device.properties();

        if set_layouts.len() > properties.max_bound_descriptor_sets as usize {
            return Err(Box::new(ValidationError {
                context: "set_layouts".into(),
                problem: "the length exceeds the `max_bound_descriptor_sets` limit".into(),
                vuids: &["VUID-VkPipelineLayoutCreateInfo-setLayoutCount-00286"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        for (index, set_layout) in set_layouts.iter().enumerate() {
            if !device.registry().is_alive(set_layout.handle()) {
                return Err(Box::new(ValidationError {
                    context: format!("set_layouts[{}]", index).into(),
                    problem: "has been destroyed".into(),
                    vuids: &["VUID-VkPipelineLayoutCreateInfo-pSetLayouts-parameter"],
                    kind: Some(ViolationKind::DestroyedObjectUsed),
                    ..Default::default()
                }));
            }
        }

        let mut seen_stages = ShaderStages::empty();

        for (range_index, range) in push_constant_ranges.iter().enumerate() {
            range
                .validate(device)
                .map_err(|err| err.add_context(format!("push_constant_ranges[{}]", range_index)))?;

            if seen_stages.intersects(range.stages) {
                return Err(Box::new(ValidationError {
                    context: "push_constant_ranges".into(),
                    problem: "contains more than one range with the same stage".into(),
                    vuids: &["VUID-VkPipelineLayoutCreateInfo-pPushConstantRanges-00292"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            seen_stages |= range.stages;
        }

        Ok(())
    }
}

/// Description of a range of the push constants of a pipeline layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PushConstantRange {
    /// The stages which can access this range. A stage can access at most one push constant range.
    ///
    /// The default value is [`ShaderStages::empty()`], which must be overridden.
    pub stages: ShaderStages,

    /// Offset in bytes from the start of the push constants to this range.
    ///
    /// The value must be a multiple of 4.
    ///
    /// The default value is `0`.
    pub offset: u32,

    /// Size in bytes of the range.
    ///
    /// The value must be a multiple of 4, and not 0.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: u32,
}

impl Default for PushConstantRange {
    #[inline]
    fn default() -> Self {
        Self {
            stages: ShaderStages::empty(),
            offset: 0,
            size: 0,
        }
    }
}

impl PushConstantRange {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            stages,
            offset,
            size,
        } = self;

        if stages.is_empty() {
            return Err(Box::new(ValidationError {
                context: "stages".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkPushConstantRange-stageFlags-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let max_push_constants_size = device.properties().max_push_constants_size;

        if offset >= max_push_constants_size {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not less than the `max_push_constants_size` limit".into(),
                vuids: &["VUID-VkPushConstantRange-offset-00294"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if offset % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-VkPushConstantRange-offset-00295"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size == 0 {
            return Err(Box::new(ValidationError {
                context: "size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkPushConstantRange-size-00296"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: "size".into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-VkPushConstantRange-size-00297"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size > max_push_constants_size - offset {
            return Err(Box::new(ValidationError {
                problem: "`size` is greater than `max_push_constants_size` limit minus `offset`"
                    .into(),
                vuids: &["VUID-VkPushConstantRange-size-00298"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineLayout, PipelineLayoutCreateInfo, PushConstantRange};
    use crate::{
        descriptor_set::layout::{
            DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
            DescriptorType,
        },
        shader::{DescriptorBindingRequirements, ShaderStage, ShaderStages},
    };
    use std::collections::BTreeMap;

    #[test]
    fn invalid_push_constant_ranges() {
        let (device, _queue) = gfx_dev_and_queue!();

        let cases = [
            (
                PushConstantRange {
                    stages: ShaderStages::empty(),
                    offset: 0,
                    size: 4,
                },
                "VUID-VkPushConstantRange-stageFlags-requiredbitmask",
            ),
            (
                PushConstantRange {
                    stages: ShaderStages::VERTEX,
                    offset: 2,
                    size: 4,
                },
                "VUID-VkPushConstantRange-offset-00295",
            ),
            (
                PushConstantRange {
                    stages: ShaderStages::VERTEX,
                    offset: 0,
                    size: 0,
                },
                "VUID-VkPushConstantRange-size-00296",
            ),
            (
                PushConstantRange {
                    stages: ShaderStages::VERTEX,
                    offset: 124,
                    size: 8,
                },
                "VUID-VkPushConstantRange-size-00298",
            ),
        ];

        for (range, vuid) in cases {
            let errors = PipelineLayout::new(
                device.clone(),
                PipelineLayoutCreateInfo {
                    push_constant_ranges: vec![range],
                    ..Default::default()
                },
            )
            .unwrap_err();
            assert!(errors.contains_vuid(vuid), "{}", vuid);
        }
    }

    #[test]
    fn duplicate_push_constant_stage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = PipelineLayout::new(
            device,
            PipelineLayoutCreateInfo {
                push_constant_ranges: vec![
                    PushConstantRange {
                        stages: ShaderStages::VERTEX,
                        offset: 0,
                        size: 16,
                    },
                    PushConstantRange {
                        stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                        offset: 16,
                        size: 16,
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkPipelineLayoutCreateInfo-pPushConstantRanges-00292"));
    }

    #[test]
    fn layout_compatibility() {
        let (device, _queue) = gfx_dev_and_queue!();
        let set_layout = |descriptor_type| {
            DescriptorSetLayout::new(
                device.clone(),
                DescriptorSetLayoutCreateInfo {
                    bindings: BTreeMap::from([(
                        0,
                        DescriptorSetLayoutBinding {
                            stages: ShaderStages::FRAGMENT,
                            ..DescriptorSetLayoutBinding::descriptor_type(descriptor_type)
                        },
                    )]),
                    ..Default::default()
                },
            )
            .unwrap()
        };
        let uniform = set_layout(DescriptorType::UniformBuffer);
        let storage = set_layout(DescriptorType::StorageBuffer);

        let first = PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                set_layouts: vec![uniform.clone(), uniform.clone()],
                ..Default::default()
            },
        )
        .unwrap();
        let second = PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                set_layouts: vec![uniform, storage],
                ..Default::default()
            },
        )
        .unwrap();

        assert!(first.is_compatible_with(&second, 1));
        assert!(!first.is_compatible_with(&second, 2));
        assert!(!first.is_compatible_with(&second, 3));
    }

    #[test]
    fn shader_push_constants_must_be_covered() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = PipelineLayout::new(
            device,
            PipelineLayoutCreateInfo {
                push_constant_ranges: vec![PushConstantRange {
                    stages: ShaderStages::VERTEX,
                    offset: 16,
                    size: 64,
                }],
                ..Default::default()
            },
        )
        .unwrap();

        let inside = PushConstantRange {
            stages: ShaderStages::VERTEX,
            offset: 32,
            size: 48,
        };
        let outside = PushConstantRange {
            stages: ShaderStages::VERTEX,
            offset: 0,
            size: 32,
        };
        let requirements: [((u32, u32), DescriptorBindingRequirements); 0] = [];

        assert!(layout
            .ensure_compatible_with_shader(
                ShaderStage::Vertex,
                requirements.iter().map(|(k, v)| (k, v)),
                Some(&inside),
            )
            .is_ok());
        let err = layout
            .ensure_compatible_with_shader(
                ShaderStage::Vertex,
                requirements.iter().map(|(k, v)| (k, v)),
                Some(&outside),
            )
            .unwrap_err();
        assert_eq!(err.message_id(), "VUID-VkGraphicsPipelineCreateInfo-layout-07987");
    }
}
