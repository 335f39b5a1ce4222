// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describes a processing operation that will execute on the Vulkan device.
//!
//! A pipeline bundles shader entry points with the fixed-function state around them, and with a
//! [`PipelineLayout`] that describes the descriptor sets and push constants the shaders read.
//! Command buffers check the state that they have bound against what the bound pipeline requires
//! whenever a draw or dispatch command is recorded.

pub use self::{
    compute::{ComputePipeline, ComputePipelineCreateInfo},
    graphics::{GraphicsPipeline, GraphicsPipelineCreateInfo},
    layout::PipelineLayout,
};
use crate::{
    device::DeviceOwned,
    macros::vulkan_enum,
    shader::{DescriptorBindingRequirements, ShaderStage, TexelAccess},
    VulkanObject,
};
use foldhash::HashMap;
use std::sync::Arc;

pub mod compute;
pub mod graphics;
pub mod layout;
pub mod vertex_input;

/// A trait for operations shared between pipeline types.
pub trait Pipeline: DeviceOwned + VulkanObject + Send + Sync {
    /// Returns the bind point of this pipeline.
    fn bind_point(&self) -> PipelineBindPoint;

    /// Returns the pipeline layout used in this pipeline.
    fn layout(&self) -> &Arc<PipelineLayout>;

    /// Returns the number of descriptor sets actually accessed by this pipeline. This may be less
    /// than the number of sets in the pipeline layout.
    fn num_used_descriptor_sets(&self) -> u32;

    /// Returns a reference to the descriptor binding requirements for this pipeline, merged over
    /// all of its stages.
    fn descriptor_binding_requirements(
        &self,
    ) -> &HashMap<(u32, u32), DescriptorBindingRequirements>;

    /// Returns the push constant bytes that each stage of the pipeline reads.
    fn push_constant_requirements(&self) -> &[(ShaderStage, std::ops::Range<u32>)];

    /// Returns the texel buffer fetches that the stages of the pipeline perform.
    fn texel_accesses(&self) -> &[(ShaderStage, TexelAccess)];
}

vulkan_enum! {
    /// The type of a pipeline.
    ///
    /// When binding a pipeline or descriptor sets in a command buffer, the state for each bind
    /// point is independent from the others. This means that it is possible, for example, to
    /// bind a graphics pipeline without disturbing any bound compute pipeline. Likewise,
    /// binding descriptor sets for the `Compute` bind point does not affect sets that were bound
    /// to the `Graphics` bind point.
    PipelineBindPoint = PipelineBindPoint(i32);

    /// Compute pipelines are bound to this bind point.
    Compute = COMPUTE,

    /// Graphics pipelines are bound to this bind point.
    Graphics = GRAPHICS,
}

vulkan_enum! {
    /// A particular state value within a graphics pipeline that can be dynamically set by a
    /// command buffer.
    DynamicState = DynamicState(i32);

    Viewport = VIEWPORT,
    Scissor = SCISSOR,
    LineWidth = LINE_WIDTH,
    DepthBias = DEPTH_BIAS,
    BlendConstants = BLEND_CONSTANTS,
    DepthBounds = DEPTH_BOUNDS,
    StencilCompareMask = STENCIL_COMPARE_MASK,
    StencilWriteMask = STENCIL_WRITE_MASK,
    StencilReference = STENCIL_REFERENCE,

    ExclusiveScissor = EXCLUSIVE_SCISSOR_NV
    RequiresFeature(exclusive_scissor),

    FragmentShadingRate = FRAGMENT_SHADING_RATE_KHR
    RequiresFeature(pipeline_fragment_shading_rate),
}

/// Merges the descriptor binding requirements of several stages, keyed by `(set, binding)`.
///
/// The allowed descriptor types of a binding are those that every stage allows. The other
/// requirements are combined so that the result is at least as strict as each stage.
pub(crate) fn merge_descriptor_binding_requirements<'a>(
    stages: impl IntoIterator<Item = &'a HashMap<(u32, u32), DescriptorBindingRequirements>>,
) -> HashMap<(u32, u32), DescriptorBindingRequirements> {
    let mut merged: HashMap<(u32, u32), DescriptorBindingRequirements> = HashMap::default();

    for requirements in stages {
        for (&key, reqs) in requirements {
            match merged.get_mut(&key) {
                None => {
                    merged.insert(key, reqs.clone());
                }
                Some(existing) => {
                    existing
                        .descriptor_types
                        .retain(|ty| reqs.descriptor_types.contains(ty));
                    existing.descriptor_count = match (existing.descriptor_count, reqs.descriptor_count)
                    {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    };
                    existing.image_view_type = existing.image_view_type.or(reqs.image_view_type);
                    existing.image_multisampled |= reqs.image_multisampled;
                    existing.image_scalar_type =
                        existing.image_scalar_type.or(reqs.image_scalar_type);
                    existing.storage_image_atomic |= reqs.storage_image_atomic;
                    existing.storage_texel_buffer_atomic |= reqs.storage_texel_buffer_atomic;
                    existing.sampler_no_unnormalized_coordinates |=
                        reqs.sampler_no_unnormalized_coordinates;
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::merge_descriptor_binding_requirements;
    use crate::{descriptor_set::layout::DescriptorType, shader::DescriptorBindingRequirements};
    use foldhash::HashMap;

    #[test]
    fn merge_requirements() {
        let mut vertex = HashMap::default();
        vertex.insert(
            (0, 0),
            DescriptorBindingRequirements {
                descriptor_types: vec![
                    DescriptorType::UniformBuffer,
                    DescriptorType::UniformBufferDynamic,
                ],
                descriptor_count: Some(2),
                ..Default::default()
            },
        );
        let mut fragment = HashMap::default();
        fragment.insert(
            (0, 0),
            DescriptorBindingRequirements {
                descriptor_types: vec![DescriptorType::UniformBuffer],
                descriptor_count: Some(4),
                ..Default::default()
            },
        );
        fragment.insert(
            (1, 0),
            DescriptorBindingRequirements::new(DescriptorType::StorageImage),
        );

        let merged = merge_descriptor_binding_requirements([&vertex, &fragment]);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[&(0, 0)].descriptor_types,
            vec![DescriptorType::UniformBuffer]
        );
        assert_eq!(merged[&(0, 0)].descriptor_count, Some(4));
    }
}
