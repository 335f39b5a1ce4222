// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A pipeline that runs a compute shader.
//!
//! The compute pipeline is the only pipeline type that can be used with compute operations. It
//! contains a single compute shader and a pipeline layout.

use super::{
    layout::PipelineLayout, merge_descriptor_binding_requirements, Pipeline, PipelineBindPoint,
};
use crate::{
    device::{Device, DeviceOwned},
    registry::ObjectType,
    shader::{DescriptorBindingRequirements, EntryPoint, ShaderStage, TexelAccess},
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashMap;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Range,
    sync::Arc,
};

/// A pipeline object that describes to the Vulkan implementation how it should perform compute
/// operations.
pub struct ComputePipeline {
    handle: Handle,
    device: Arc<Device>,
    layout: Arc<PipelineLayout>,
    local_size: [u32; 3],
    descriptor_binding_requirements: HashMap<(u32, u32), DescriptorBindingRequirements>,
    push_constant_requirements: Vec<(ShaderStage, Range<u32>)>,
    texel_accesses: Vec<(ShaderStage, TexelAccess)>,
    num_used_descriptor_sets: u32,
}

impl ComputePipeline {
    /// Creates a new `ComputePipeline`.
    pub fn new(
        device: Arc<Device>,
        create_info: ComputePipelineCreateInfo,
    ) -> Result<Arc<ComputePipeline>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &ComputePipelineCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(
        device: Arc<Device>,
        create_info: ComputePipelineCreateInfo,
    ) -> Arc<ComputePipeline> {
        let ComputePipelineCreateInfo {
            stage,
            layout,
            _ne: _,
        } = create_info;

        let info = stage.info();
        let descriptor_binding_requirements =
            merge_descriptor_binding_requirements([&info.descriptor_binding_requirements]);
        let num_used_descriptor_sets = descriptor_binding_requirements
            .keys()
            .map(|&(set, _)| set + 1)
            .max()
            .unwrap_or(0);

        let pipeline = Arc::new(ComputePipeline {
            handle: device.registry().register(ObjectType::Pipeline, None),
            device,
            layout,
            local_size: info.local_size,
            descriptor_binding_requirements,
            push_constant_requirements: info
                .push_constant_requirements
                .map(|range| (ShaderStage::Compute, range.offset..range.offset + range.size))
                .into_iter()
                .collect(),
            texel_accesses: info
                .texel_accesses
                .iter()
                .map(|access| (ShaderStage::Compute, access.clone()))
                .collect(),
            num_used_descriptor_sets,
        });

        tracing::trace!(handle = %pipeline.handle, "created compute pipeline");

        pipeline
    }

    /// Returns the local workgroup size of the compute shader.
    #[inline]
    pub fn local_size(&self) -> [u32; 3] {
        self.local_size
    }
}

impl Pipeline for ComputePipeline {
    #[inline]
    fn bind_point(&self) -> PipelineBindPoint {
        PipelineBindPoint::Compute
    }

    #[inline]
    fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    #[inline]
    fn num_used_descriptor_sets(&self) -> u32 {
        self.num_used_descriptor_sets
    }

    #[inline]
    fn descriptor_binding_requirements(
        &self,
    ) -> &HashMap<(u32, u32), DescriptorBindingRequirements> {
        &self.descriptor_binding_requirements
    }

    #[inline]
    fn push_constant_requirements(&self) -> &[(ShaderStage, Range<u32>)] {
        &self.push_constant_requirements
    }

    #[inline]
    fn texel_accesses(&self) -> &[(ShaderStage, TexelAccess)] {
        &self.texel_accesses
    }
}

impl Drop for ComputePipeline {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for ComputePipeline {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for ComputePipeline {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for ComputePipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("ComputePipeline")
            .field("handle", &self.handle)
            .field("layout", &self.layout.handle())
            .field("local_size", &self.local_size)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `ComputePipeline`.
#[derive(Clone, Debug)]
pub struct ComputePipelineCreateInfo {
    /// The compute shader stage to use.
    ///
    /// There is no default value.
    pub stage: EntryPoint,

    /// The pipeline layout to use.
    ///
    /// There is no default value.
    pub layout: Arc<PipelineLayout>,

    pub _ne: crate::NonExhaustive,
}

impl ComputePipelineCreateInfo {
    /// Returns a `ComputePipelineCreateInfo` with the specified `stage` and `layout`.
    #[inline]
    pub fn stage_layout(stage: EntryPoint, layout: Arc<PipelineLayout>) -> Self {
        Self {
            stage,
            layout,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref stage,
            ref layout,
            _ne: _,
        } = self;

        let registry = device.registry();
        let info = stage.info();

        if !registry.is_alive(layout.handle()) {
            return Err(Box::new(ValidationError {
                context: "layout".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkComputePipelineCreateInfo-layout-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !registry.is_alive(stage.module().handle()) {
            return Err(Box::new(ValidationError {
                context: "stage.module".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkPipelineShaderStageCreateInfo-module-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if info.stage != ShaderStage::Compute {
            return Err(Box::new(ValidationError {
                context: "stage".into(),
                problem: "is not a `ShaderStage::Compute` entry point".into(),
                vuids: &["VUID-VkComputePipelineCreateInfo-stage-00701"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        layout
            .ensure_compatible_with_shader(
                info.stage,
                info.descriptor_binding_requirements.iter(),
                info.push_constant_requirements.as_ref(),
            )
            .map_err(|mut err| {
                err.vuids = match err.vuids {
                    ["VUID-VkGraphicsPipelineCreateInfo-layout-07987"] => {
                        &["VUID-VkComputePipelineCreateInfo-layout-07987"]
                    }
                    ["VUID-VkGraphicsPipelineCreateInfo-layout-07990"] => {
                        &["VUID-VkComputePipelineCreateInfo-layout-07990"]
                    }
                    ["VUID-VkGraphicsPipelineCreateInfo-layout-07991"] => {
                        &["VUID-VkComputePipelineCreateInfo-layout-07991"]
                    }
                    _ => &["VUID-VkComputePipelineCreateInfo-layout-07988"],
                };
                err.add_context("stage")
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ComputePipeline, ComputePipelineCreateInfo};
    use crate::{
        descriptor_set::layout::{
            DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
            DescriptorType,
        },
        pipeline::{
            layout::{PipelineLayoutCreateInfo, PushConstantRange},
            Pipeline, PipelineBindPoint, PipelineLayout,
        },
        shader::{
            DescriptorBindingRequirements, EntryPointInfo, ShaderModule, ShaderModuleCreateInfo,
            ShaderStage, ShaderStages,
        },
    };
    use std::sync::Arc;

    fn module(device: &Arc<crate::device::Device>, info: EntryPointInfo) -> Arc<ShaderModule> {
        ShaderModule::new(device.clone(), ShaderModuleCreateInfo::entry_points([info])).unwrap()
    }

    #[test]
    fn create() {
        let (device, _queue) = gfx_dev_and_queue!();

        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: [(
                    0,
                    DescriptorSetLayoutBinding {
                        stages: ShaderStages::COMPUTE,
                        ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::StorageBuffer)
                    },
                )]
                .into(),
                ..Default::default()
            },
        )
        .unwrap();
        let layout = PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                set_layouts: vec![set_layout],
                ..Default::default()
            },
        )
        .unwrap();

        let mut info = EntryPointInfo::new(ShaderStage::Compute);
        info.descriptor_binding_requirements.insert(
            (0, 0),
            DescriptorBindingRequirements::new(DescriptorType::StorageBuffer),
        );
        info.local_size = [64, 1, 1];
        let shader = module(&device, info);

        let pipeline = ComputePipeline::new(
            device.clone(),
            ComputePipelineCreateInfo::stage_layout(
                shader.entry_point("main", None).unwrap(),
                layout,
            ),
        )
        .unwrap();

        assert_eq!(pipeline.bind_point(), PipelineBindPoint::Compute);
        assert_eq!(pipeline.num_used_descriptor_sets(), 1);
        assert_eq!(pipeline.local_size(), [64, 1, 1]);
    }

    #[test]
    fn wrong_stage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout =
            PipelineLayout::new(device.clone(), PipelineLayoutCreateInfo::default()).unwrap();
        let shader = module(&device, EntryPointInfo::new(ShaderStage::Vertex));

        let errors = ComputePipeline::new(
            device.clone(),
            ComputePipelineCreateInfo::stage_layout(
                shader.entry_point("main", None).unwrap(),
                layout,
            ),
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkComputePipelineCreateInfo-stage-00701"));
    }

    #[test]
    fn layout_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();

        let layout =
            PipelineLayout::new(device.clone(), PipelineLayoutCreateInfo::default()).unwrap();
        let mut info = EntryPointInfo::new(ShaderStage::Compute);
        info.descriptor_binding_requirements.insert(
            (0, 0),
            DescriptorBindingRequirements::new(DescriptorType::UniformBuffer),
        );
        let shader = module(&device, info);

        let errors = ComputePipeline::new(
            device.clone(),
            ComputePipelineCreateInfo::stage_layout(
                shader.entry_point("main", None).unwrap(),
                layout,
            ),
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkComputePipelineCreateInfo-layout-07988"));

        let layout = PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                push_constant_ranges: vec![PushConstantRange {
                    stages: ShaderStages::COMPUTE,
                    offset: 0,
                    size: 16,
                }],
                ..Default::default()
            },
        )
        .unwrap();
        let mut info = EntryPointInfo::new(ShaderStage::Compute);
        info.push_constant_requirements = Some(PushConstantRange {
            stages: ShaderStages::COMPUTE,
            offset: 0,
            size: 32,
        });
        let shader = module(&device, info);

        let errors = ComputePipeline::new(
            device.clone(),
            ComputePipelineCreateInfo::stage_layout(
                shader.entry_point("main", None).unwrap(),
                layout,
            ),
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkComputePipelineCreateInfo-layout-07987"));
    }
}
