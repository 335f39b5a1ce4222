// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{CommandBufferInheritanceRenderPassType, SubpassContents};
use crate::{
    buffer::{Buffer, IndexType},
    descriptor_set::DescriptorSet,
    image::SampleCount,
    pipeline::{
        compute::ComputePipeline,
        graphics::{
            fragment_shading_rate::FragmentShadingRateCombinerOp, GraphicsPipeline,
            PipelineRenderingCreateInfo, Scissor, Viewport,
        },
        layout::PipelineLayout,
        DynamicState, PipelineBindPoint,
    },
    query::{QueryControlFlags, QueryPool, QueryType},
    range_set::RangeSet,
    render_pass::{Framebuffer, Subpass},
    shader::ShaderStage,
    DeviceSize,
};
use foldhash::HashMap;
use smallvec::SmallVec;
use std::{collections::hash_map::Entry, mem::take, ops::RangeInclusive, sync::Arc};

/// Holds the current binding and setting state.
#[derive(Default)]
pub(in crate::command_buffer) struct CommandBufferBuilderState {
    // Render pass
    pub(in crate::command_buffer) render_pass: Option<RenderPassState>,

    // Bind/push
    pub(in crate::command_buffer) descriptor_sets: HashMap<PipelineBindPoint, DescriptorSetState>,
    pub(in crate::command_buffer) index_buffer: Option<IndexBufferState>,
    pub(in crate::command_buffer) pipeline_compute: Option<Arc<ComputePipeline>>,
    pub(in crate::command_buffer) pipeline_graphics: Option<Arc<GraphicsPipeline>>,
    pub(in crate::command_buffer) vertex_buffers: HashMap<u32, VertexBufferState>,
    pub(in crate::command_buffer) push_constants: HashMap<ShaderStage, RangeSet<u32>>,
    pub(in crate::command_buffer) push_constants_pipeline_layout: Option<Arc<PipelineLayout>>,
    pub(in crate::command_buffer) transform_feedback_buffers: HashMap<u32, TransformFeedbackBufferState>,

    // Dynamic state
    pub(in crate::command_buffer) blend_constants: Option<[f32; 4]>,
    pub(in crate::command_buffer) depth_bias: Option<DepthBias>,
    pub(in crate::command_buffer) depth_bounds: Option<RangeInclusive<f32>>,
    pub(in crate::command_buffer) exclusive_scissor: HashMap<u32, Scissor>,
    pub(in crate::command_buffer) fragment_shading_rate: Option<FragmentShadingRate>,
    pub(in crate::command_buffer) line_width: Option<f32>,
    pub(in crate::command_buffer) scissor: HashMap<u32, Scissor>,
    pub(in crate::command_buffer) stencil_compare_mask: StencilStateDynamic,
    pub(in crate::command_buffer) stencil_reference: StencilStateDynamic,
    pub(in crate::command_buffer) stencil_write_mask: StencilStateDynamic,
    pub(in crate::command_buffer) viewport: HashMap<u32, Viewport>,

    // Active queries and scopes
    pub(in crate::command_buffer) queries: HashMap<QueryType, QueryState>,
    pub(in crate::command_buffer) transform_feedback: Option<TransformFeedbackState>,
    pub(in crate::command_buffer) conditional_rendering: Option<ConditionalRenderingState>,
}

impl CommandBufferBuilderState {
    /// Resets everything that the bound state of a multiview subpass doesn't carry over to the
    /// next subpass.
    pub(in crate::command_buffer) fn reset_non_render_pass_states(&mut self) {
        *self = Self {
            render_pass: take(&mut self.render_pass),
            queries: take(&mut self.queries),
            transform_feedback: take(&mut self.transform_feedback),
            conditional_rendering: take(&mut self.conditional_rendering),
            ..Default::default()
        }
    }

    pub(in crate::command_buffer) fn reset_dynamic_states(
        &mut self,
        states: impl IntoIterator<Item = DynamicState>,
    ) {
        for state in states {
            match state {
                DynamicState::BlendConstants => self.blend_constants = None,
                DynamicState::DepthBias => self.depth_bias = None,
                DynamicState::DepthBounds => self.depth_bounds = None,
                DynamicState::ExclusiveScissor => self.exclusive_scissor.clear(),
                DynamicState::FragmentShadingRate => self.fragment_shading_rate = None,
                DynamicState::LineWidth => self.line_width = None,
                DynamicState::Scissor => self.scissor.clear(),
                DynamicState::StencilCompareMask => self.stencil_compare_mask = Default::default(),
                DynamicState::StencilReference => self.stencil_reference = Default::default(),
                DynamicState::StencilWriteMask => self.stencil_write_mask = Default::default(),
                DynamicState::Viewport => self.viewport.clear(),
            }
        }
    }

    /// Returns whether `state` has been set since it was last reset.
    pub(in crate::command_buffer) fn is_dynamic_state_set(
        &self,
        state: DynamicState,
        pipeline: &GraphicsPipeline,
    ) -> bool {
        let viewport_state = pipeline.viewport_state();

        match state {
            DynamicState::BlendConstants => self.blend_constants.is_some(),
            DynamicState::DepthBias => self.depth_bias.is_some(),
            DynamicState::DepthBounds => self.depth_bounds.is_some(),
            DynamicState::ExclusiveScissor => (0..viewport_state.exclusive_scissor_count)
                .all(|index| self.exclusive_scissor.contains_key(&index)),
            DynamicState::FragmentShadingRate => self.fragment_shading_rate.is_some(),
            DynamicState::LineWidth => self.line_width.is_some(),
            DynamicState::Scissor => (0..viewport_state.scissor_count)
                .all(|index| self.scissor.contains_key(&index)),
            DynamicState::StencilCompareMask => self.stencil_compare_mask.is_set(),
            DynamicState::StencilReference => self.stencil_reference.is_set(),
            DynamicState::StencilWriteMask => self.stencil_write_mask.is_set(),
            DynamicState::Viewport => (0..viewport_state.viewport_count)
                .all(|index| self.viewport.contains_key(&index)),
        }
    }

    /// Returns the bound pipeline of `pipeline_bind_point`, as its layout.
    pub(in crate::command_buffer) fn pipeline_layout(
        &self,
        pipeline_bind_point: PipelineBindPoint,
    ) -> Option<&Arc<PipelineLayout>> {
        use crate::pipeline::Pipeline;

        match pipeline_bind_point {
            PipelineBindPoint::Compute => self.pipeline_compute.as_ref().map(|p| p.layout()),
            PipelineBindPoint::Graphics => self.pipeline_graphics.as_ref().map(|p| p.layout()),
        }
    }

    /// Removes the descriptor sets that become disturbed when binding sets with
    /// `pipeline_layout`, and returns the state to bind the new sets into.
    pub(in crate::command_buffer) fn invalidate_descriptor_sets(
        &mut self,
        pipeline_bind_point: PipelineBindPoint,
        pipeline_layout: Arc<PipelineLayout>,
        first_set: u32,
        num_descriptor_sets: u32,
    ) -> &mut DescriptorSetState {
        match self.descriptor_sets.entry(pipeline_bind_point) {
            Entry::Vacant(entry) => entry.insert(DescriptorSetState {
                descriptor_sets: Default::default(),
                pipeline_layout,
            }),
            Entry::Occupied(entry) => {
                let state = entry.into_mut();

                let invalidate_from = if Arc::ptr_eq(&state.pipeline_layout, &pipeline_layout) {
                    None
                } else if state.pipeline_layout.push_constant_ranges()
                    != pipeline_layout.push_constant_ranges()
                {
                    // All bound sets are disturbed.
                    Some(0)
                } else {
                    let current_layouts = state.pipeline_layout.set_layouts();
                    let new_layouts = pipeline_layout.set_layouts();
                    let max = (current_layouts.len() as u32)
                        .min(new_layouts.len() as u32)
                        .min(first_set + num_descriptor_sets);

                    (0..max)
                        .find(|&num| {
                            let num = num as usize;
                            !current_layouts[num].is_compatible_with(&new_layouts[num])
                        })
                        .or_else(|| {
                            (new_layouts.len() < current_layouts.len())
                                .then_some(new_layouts.len() as u32)
                        })
                };

                if let Some(invalidate_from) = invalidate_from {
                    state
                        .descriptor_sets
                        .retain(|&num, _| num < invalidate_from);
                    state.pipeline_layout = pipeline_layout;
                } else if (first_set + num_descriptor_sets) as usize
                    >= state.pipeline_layout.set_layouts().len()
                {
                    // The new layout is a superset of the old one.
                    state.pipeline_layout = pipeline_layout;
                }

                state
            }
        }
    }
}

/// Every dynamic state that the model tracks.
pub(in crate::command_buffer) const ALL_DYNAMIC_STATES: [DynamicState; 11] = [
    DynamicState::Viewport,
    DynamicState::Scissor,
    DynamicState::LineWidth,
    DynamicState::DepthBias,
    DynamicState::BlendConstants,
    DynamicState::DepthBounds,
    DynamicState::StencilCompareMask,
    DynamicState::StencilWriteMask,
    DynamicState::StencilReference,
    DynamicState::ExclusiveScissor,
    DynamicState::FragmentShadingRate,
];

pub(in crate::command_buffer) struct DescriptorSetState {
    pub(in crate::command_buffer) descriptor_sets: HashMap<u32, BoundDescriptorSet>,
    pub(in crate::command_buffer) pipeline_layout: Arc<PipelineLayout>,
}

pub(in crate::command_buffer) struct BoundDescriptorSet {
    pub(in crate::command_buffer) set: Arc<DescriptorSet>,
    pub(in crate::command_buffer) dynamic_offsets: SmallVec<[u32; 4]>,
}

pub(in crate::command_buffer) struct IndexBufferState {
    pub(in crate::command_buffer) buffer: Arc<Buffer>,
    pub(in crate::command_buffer) offset: DeviceSize,
    pub(in crate::command_buffer) index_type: IndexType,
}

pub(in crate::command_buffer) struct VertexBufferState {
    pub(in crate::command_buffer) buffer: Arc<Buffer>,
    pub(in crate::command_buffer) offset: DeviceSize,
}

pub(in crate::command_buffer) struct TransformFeedbackBufferState {
    pub(in crate::command_buffer) buffer: Arc<Buffer>,
    pub(in crate::command_buffer) offset: DeviceSize,
}

#[derive(Clone, Copy, Debug)]
pub(in crate::command_buffer) struct DepthBias {
    pub(in crate::command_buffer) constant_factor: f32,
    pub(in crate::command_buffer) clamp: f32,
    pub(in crate::command_buffer) slope_factor: f32,
}

#[derive(Clone, Copy, Debug)]
pub(in crate::command_buffer) struct FragmentShadingRate {
    pub(in crate::command_buffer) fragment_size: [u32; 2],
    pub(in crate::command_buffer) combiner_ops: [FragmentShadingRateCombinerOp; 2],
}

#[derive(Clone, Copy, Debug, Default)]
pub(in crate::command_buffer) struct StencilStateDynamic {
    pub(in crate::command_buffer) front: Option<u32>,
    pub(in crate::command_buffer) back: Option<u32>,
}

impl StencilStateDynamic {
    #[inline]
    fn is_set(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }
}

pub(in crate::command_buffer) struct QueryState {
    pub(in crate::command_buffer) query_pool: Arc<QueryPool>,
    pub(in crate::command_buffer) query: u32,
    pub(in crate::command_buffer) index: u32,
    pub(in crate::command_buffer) flags: QueryControlFlags,
    // The subpass the query was begun in, if it was begun inside a render pass.
    pub(in crate::command_buffer) in_subpass: Option<u32>,
}

pub(in crate::command_buffer) struct TransformFeedbackState {
    pub(in crate::command_buffer) first_counter_buffer: u32,
}

pub(in crate::command_buffer) struct ConditionalRenderingState {
    // The subpass conditional rendering was begun in, if it was begun inside a render pass.
    pub(in crate::command_buffer) in_subpass: Option<u32>,
}

pub(in crate::command_buffer) struct RenderPassState {
    pub(in crate::command_buffer) contents: SubpassContents,
    pub(in crate::command_buffer) rendering_info: PipelineRenderingCreateInfo,
    // `None` if the sample count is not known, or the subpass has no attachments.
    pub(in crate::command_buffer) rasterization_samples: Option<SampleCount>,
    pub(in crate::command_buffer) render_pass: RenderPassStateType,
}

impl RenderPassState {
    pub(in crate::command_buffer) fn from_inheritance(
        render_pass: &CommandBufferInheritanceRenderPassType,
    ) -> Self {
        match render_pass {
            CommandBufferInheritanceRenderPassType::BeginRenderPass(info) => RenderPassState {
                contents: SubpassContents::Inline,
                rendering_info: rendering_info_from_subpass(&info.subpass),
                rasterization_samples: info.subpass.num_samples(),
                render_pass: BeginRenderPassState {
                    subpass: info.subpass.clone(),
                    framebuffer: info.framebuffer.clone(),
                }
                .into(),
            },
            CommandBufferInheritanceRenderPassType::BeginRendering(info) => RenderPassState {
                contents: SubpassContents::Inline,
                rendering_info: PipelineRenderingCreateInfo {
                    view_mask: info.view_mask,
                    color_attachment_formats: info.color_attachment_formats.clone(),
                    depth_attachment_format: info.depth_attachment_format,
                    stencil_attachment_format: info.stencil_attachment_format,
                    ..Default::default()
                },
                rasterization_samples: Some(info.rasterization_samples),
                render_pass: RenderPassStateType::BeginRendering,
            },
        }
    }

    /// Returns the index of the current subpass. Dynamic rendering has a single subpass.
    #[inline]
    pub(in crate::command_buffer) fn subpass_index(&self) -> u32 {
        match &self.render_pass {
            RenderPassStateType::BeginRenderPass(state) => state.subpass.index(),
            RenderPassStateType::BeginRendering => 0,
        }
    }
}

pub(in crate::command_buffer) fn rendering_info_from_subpass(
    subpass: &Subpass,
) -> PipelineRenderingCreateInfo {
    let depth_stencil_format = subpass.depth_stencil_format();

    PipelineRenderingCreateInfo {
        view_mask: subpass.view_mask(),
        color_attachment_formats: subpass.color_attachment_formats(),
        depth_attachment_format: depth_stencil_format.filter(|format| {
            format
                .aspects()
                .intersects(crate::image::ImageAspects::DEPTH)
        }),
        stencil_attachment_format: depth_stencil_format.filter(|format| {
            format
                .aspects()
                .intersects(crate::image::ImageAspects::STENCIL)
        }),
        ..Default::default()
    }
}

pub(in crate::command_buffer) enum RenderPassStateType {
    BeginRenderPass(BeginRenderPassState),
    BeginRendering,
}

impl From<BeginRenderPassState> for RenderPassStateType {
    #[inline]
    fn from(val: BeginRenderPassState) -> Self {
        Self::BeginRenderPass(val)
    }
}

pub(in crate::command_buffer) struct BeginRenderPassState {
    pub(in crate::command_buffer) subpass: Subpass,
    pub(in crate::command_buffer) framebuffer: Option<Arc<Framebuffer>>,
}
