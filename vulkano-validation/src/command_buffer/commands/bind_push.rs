// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::CommandInfo;
use crate::{
    buffer::{Buffer, BufferUsage, IndexType},
    command_buffer::{
        state::{
            BoundDescriptorSet, IndexBufferState, TransformFeedbackBufferState,
            VertexBufferState, ALL_DYNAMIC_STATES,
        },
        CommandBuffer, CommandBufferInner,
    },
    descriptor_set::{layout::DescriptorType, DescriptorBindingResources, DescriptorSet},
    device::{queue::QueueFlags, Device, DeviceOwned},
    pipeline::{
        compute::ComputePipeline, graphics::GraphicsPipeline, layout::PipelineLayout, Pipeline,
        PipelineBindPoint,
    },
    range_set::RangeSet,
    shader::{ShaderStage, ShaderStages},
    DeviceSize, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind, VulkanObject,
};
use std::sync::Arc;

const BIND_PIPELINE_COMPUTE: CommandInfo =
    command_info!("vkCmdBindPipeline", QueueFlags::COMPUTE, Any);
const BIND_PIPELINE_GRAPHICS: CommandInfo =
    command_info!("vkCmdBindPipeline", QueueFlags::GRAPHICS, Any);
const BIND_DESCRIPTOR_SETS: CommandInfo = command_info!(
    "vkCmdBindDescriptorSets",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const BIND_INDEX_BUFFER: CommandInfo =
    command_info!("vkCmdBindIndexBuffer", QueueFlags::GRAPHICS, Any);
const BIND_VERTEX_BUFFERS: CommandInfo =
    command_info!("vkCmdBindVertexBuffers", QueueFlags::GRAPHICS, Any);
const PUSH_CONSTANTS: CommandInfo = command_info!(
    "vkCmdPushConstants",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const BIND_TRANSFORM_FEEDBACK_BUFFERS: CommandInfo = command_info!(
    "vkCmdBindTransformFeedbackBuffersEXT",
    QueueFlags::GRAPHICS,
    Any
);

const ALL_SHADER_STAGES: [ShaderStage; 6] = [
    ShaderStage::Vertex,
    ShaderStage::TessellationControl,
    ShaderStage::TessellationEvaluation,
    ShaderStage::Geometry,
    ShaderStage::Fragment,
    ShaderStage::Compute,
];

/// # Commands to bind or push state for pipeline execution commands.
///
/// These commands require a queue with a pipeline type that uses the given state.
impl CommandBuffer {
    /// Binds a compute pipeline for future dispatch calls.
    pub fn bind_pipeline_compute(
        &self,
        pipeline: &Arc<ComputePipeline>,
    ) -> Result<(), ValidationErrors> {
        self.record(&BIND_PIPELINE_COMPUTE, |inner, errors| {
            errors.check(validate_pipeline_alive(self.device(), &**pipeline));

            inner.builder_state.pipeline_compute = Some(pipeline.clone());
            inner.add_resource(pipeline);
        })
    }

    /// Binds a graphics pipeline for future draw calls.
    ///
    /// State that the new pipeline consumes in a different shape than the previous one becomes
    /// unset: dynamic states that the new pipeline doesn't declare as dynamic, vertex buffers if
    /// the vertex input bindings differ, and push constants if the push constant ranges of the
    /// layouts differ.
    pub fn bind_pipeline_graphics(
        &self,
        pipeline: &Arc<GraphicsPipeline>,
    ) -> Result<(), ValidationErrors> {
        self.record(&BIND_PIPELINE_GRAPHICS, |inner, errors| {
            errors.check(validate_pipeline_alive(self.device(), &**pipeline));

            if inner.builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is active".into(),
                    vuids: &["VUID-vkCmdBindPipeline-None-02323"],
                    kind: Some(ViolationKind::PipelineChangeDuringTransformFeedback),
                    ..Default::default()
                }));
            }

            bind_pipeline_graphics_unchecked(inner, pipeline);
        })
    }

    /// Binds descriptor sets for future dispatch or draw calls.
    ///
    /// `dynamic_offsets` holds one offset for every dynamic buffer descriptor of the sets, in
    /// the order of the sets, then of their bindings, then of the array elements.
    pub fn bind_descriptor_sets(
        &self,
        pipeline_bind_point: PipelineBindPoint,
        pipeline_layout: &Arc<PipelineLayout>,
        first_set: u32,
        descriptor_sets: &[Arc<DescriptorSet>],
        dynamic_offsets: &[u32],
    ) -> Result<(), ValidationErrors> {
        let queue_flags = self.pool().queue_flags();

        self.record(&BIND_DESCRIPTOR_SETS, |inner, errors| {
            errors.check(validate_bind_descriptor_sets(
                self.device(),
                queue_flags,
                pipeline_bind_point,
                pipeline_layout,
                first_set,
                descriptor_sets,
                dynamic_offsets,
            ));

            let state = inner.builder_state.invalidate_descriptor_sets(
                pipeline_bind_point,
                pipeline_layout.clone(),
                first_set,
                descriptor_sets.len() as u32,
            );
            let mut dynamic_offsets = dynamic_offsets.iter().copied();

            for (set_num, set) in (first_set..).zip(descriptor_sets) {
                let num_dynamic = set.layout().num_dynamic_descriptors() as usize;

                state.descriptor_sets.insert(
                    set_num,
                    BoundDescriptorSet {
                        set: set.clone(),
                        dynamic_offsets: dynamic_offsets.by_ref().take(num_dynamic).collect(),
                    },
                );
            }

            inner.add_resource(pipeline_layout);

            for set in descriptor_sets {
                add_descriptor_set(inner, set);
            }
        })
    }

    /// Binds an index buffer for future indexed draw calls.
    pub fn bind_index_buffer(
        &self,
        buffer: &Arc<Buffer>,
        offset: DeviceSize,
        index_type: IndexType,
    ) -> Result<(), ValidationErrors> {
        self.record(&BIND_INDEX_BUFFER, |inner, errors| {
            errors.check(validate_bind_index_buffer(
                self.device(),
                buffer,
                offset,
                index_type,
            ));

            inner.builder_state.index_buffer = Some(IndexBufferState {
                buffer: buffer.clone(),
                offset,
                index_type,
            });
            inner.add_resource(buffer);
        })
    }

    /// Binds vertex buffers for future draw calls.
    ///
    /// Each element of `vertex_buffers` is a buffer and the offset in it, and is bound to the
    /// binding `first_binding` plus its index.
    pub fn bind_vertex_buffers(
        &self,
        first_binding: u32,
        vertex_buffers: &[(Arc<Buffer>, DeviceSize)],
    ) -> Result<(), ValidationErrors> {
        self.record(&BIND_VERTEX_BUFFERS, |inner, errors| {
            errors.check(validate_bind_vertex_buffers(
                self.device(),
                first_binding,
                vertex_buffers,
            ));

            for (binding, (buffer, offset)) in (first_binding..).zip(vertex_buffers) {
                inner.builder_state.vertex_buffers.insert(
                    binding,
                    VertexBufferState {
                        buffer: buffer.clone(),
                        offset: *offset,
                    },
                );
                inner.add_resource(buffer);
            }
        })
    }

    /// Sets push constants for future dispatch or draw calls.
    ///
    /// The bytes `offset..offset + size_of_val(push_constants)` of the push constants of the
    /// stages in `push_constants_info.stages` are written.
    pub fn push_constants<Pc>(
        &self,
        push_constants_info: PushConstantsInfo,
        push_constants: &Pc,
    ) -> Result<(), ValidationErrors>
    where
        Pc: bytemuck::NoUninit,
    {
        let size = bytemuck::bytes_of(push_constants).len() as u32;

        self.record(&PUSH_CONSTANTS, |inner, errors| {
            let mut info_errors = ValidationErrors::new();
            push_constants_info.validate(self.device(), size, &mut info_errors);
            info_errors.add_context("push_constants_info");
            errors.append(info_errors);

            let PushConstantsInfo {
                ref layout,
                stages,
                offset,
                _ne: _,
            } = push_constants_info;
            let builder_state = &mut inner.builder_state;

            if builder_state
                .push_constants_pipeline_layout
                .as_ref()
                .is_some_and(|current| {
                    current.push_constant_ranges() != layout.push_constant_ranges()
                })
            {
                builder_state.push_constants.clear();
            }

            builder_state.push_constants_pipeline_layout = Some(layout.clone());

            for stage in ALL_SHADER_STAGES {
                if stages.intersects(stage.into()) {
                    builder_state
                        .push_constants
                        .entry(stage)
                        .or_insert_with(RangeSet::new)
                        .insert(offset..offset.saturating_add(size));
                }
            }

            inner.add_resource(layout);
        })
    }

    /// Binds transform feedback buffers for future draw calls.
    ///
    /// Each element of `buffers` is a buffer and the offset in it, and is bound to the binding
    /// `first_binding` plus its index.
    pub fn bind_transform_feedback_buffers(
        &self,
        first_binding: u32,
        buffers: &[(Arc<Buffer>, DeviceSize)],
    ) -> Result<(), ValidationErrors> {
        self.record(&BIND_TRANSFORM_FEEDBACK_BUFFERS, |inner, errors| {
            errors.check(validate_bind_transform_feedback_buffers(
                self.device(),
                first_binding,
                buffers,
            ));

            if inner.builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is active".into(),
                    vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-None-02365"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));
            }

            for (binding, (buffer, offset)) in (first_binding..).zip(buffers) {
                inner.builder_state.transform_feedback_buffers.insert(
                    binding,
                    TransformFeedbackBufferState {
                        buffer: buffer.clone(),
                        offset: *offset,
                    },
                );
                inner.add_resource(buffer);
            }
        })
    }
}

fn bind_pipeline_graphics_unchecked(
    inner: &mut CommandBufferInner,
    pipeline: &Arc<GraphicsPipeline>,
) {
    let builder_state = &mut inner.builder_state;

    builder_state.reset_dynamic_states(
        ALL_DYNAMIC_STATES
            .into_iter()
            .filter(|&state| !pipeline.is_dynamic(state)),
    );

    if let Some(previous) = &builder_state.pipeline_graphics {
        if !previous
            .vertex_input_state()
            .has_same_bindings(pipeline.vertex_input_state())
        {
            builder_state.vertex_buffers.clear();
        }
    }

    if builder_state
        .push_constants_pipeline_layout
        .as_ref()
        .is_some_and(|layout| {
            layout.push_constant_ranges() != pipeline.layout().push_constant_ranges()
        })
    {
        builder_state.push_constants.clear();
        builder_state.push_constants_pipeline_layout = None;
    }

    builder_state.pipeline_graphics = Some(pipeline.clone());
    inner.add_resource(pipeline);
}

/// References the set and every resource written to it.
fn add_descriptor_set(inner: &mut CommandBufferInner, set: &Arc<DescriptorSet>) {
    inner.add_resource(set);

    let handles: Vec<_> = {
        let resources = set.resources();

        set.layout()
            .bindings()
            .keys()
            .filter_map(|&binding| resources.binding(binding))
            .flat_map(DescriptorBindingResources::handles)
            .collect()
    };

    inner.add_handles(handles);
}

fn validate_pipeline_alive(
    device: &Device,
    pipeline: &dyn Pipeline,
) -> Result<(), Box<ValidationError>> {
    if !device.registry().is_alive(pipeline.handle()) {
        return Err(Box::new(ValidationError {
            context: "pipeline".into(),
            problem: "has been destroyed".into(),
            vuids: &["VUID-vkCmdBindPipeline-pipeline-parameter"],
            kind: Some(ViolationKind::DestroyedObjectUsed),
            ..Default::default()
        }));
    }

    Ok(())
}

fn validate_bind_descriptor_sets(
    device: &Device,
    queue_flags: QueueFlags,
    pipeline_bind_point: PipelineBindPoint,
    pipeline_layout: &PipelineLayout,
    first_set: u32,
    descriptor_sets: &[Arc<DescriptorSet>],
    dynamic_offsets: &[u32],
) -> Result<(), Box<ValidationError>> {
    let required_queue_flags = match pipeline_bind_point {
        PipelineBindPoint::Compute => QueueFlags::COMPUTE,
        PipelineBindPoint::Graphics => QueueFlags::GRAPHICS,
    };

    if !queue_flags.intersects(required_queue_flags) {
        return Err(Box::new(ValidationError {
            context: "pipeline_bind_point".into(),
            problem: "is not supported by the queue family of the command buffer".into(),
            vuids: &["VUID-vkCmdBindDescriptorSets-pipelineBindPoint-00361"],
            kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
            ..Default::default()
        }));
    }

    let set_layouts = pipeline_layout.set_layouts();

    if first_set as usize + descriptor_sets.len() > set_layouts.len() {
        return Err(Box::new(ValidationError {
            problem: "`first_set + descriptor_sets.len()` is greater than \
                `pipeline_layout.set_layouts().len()`"
                .into(),
            vuids: &["VUID-vkCmdBindDescriptorSets-firstSet-00360"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    let properties = device.properties();
    let mut dynamic_offsets_remaining = dynamic_offsets;

    for (index, set) in descriptor_sets.iter().enumerate() {
        let set_num = first_set as usize + index;

        if !device.registry().is_alive(set.handle()) {
            return Err(Box::new(ValidationError {
                context: format!("descriptor_sets[{}]", index).into(),
                problem: "has been freed".into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !set.layout().is_compatible_with(&set_layouts[set_num]) {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`descriptor_sets[{0}]` is not compatible with \
                    `pipeline_layout.set_layouts()[first_set + {0}]",
                    index,
                )
                .into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-00358"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let resources = set.resources();

        for (&binding_num, binding) in set.layout().bindings() {
            if !binding.descriptor_type.is_dynamic() {
                continue;
            }

            let count = binding.descriptor_count as usize;

            if dynamic_offsets_remaining.len() < count {
                break;
            }

            let (offsets, rest) = dynamic_offsets_remaining.split_at(count);
            dynamic_offsets_remaining = rest;

            let alignment = match binding.descriptor_type {
                DescriptorType::UniformBufferDynamic => {
                    properties.min_uniform_buffer_offset_alignment
                }
                _ => properties.min_storage_buffer_offset_alignment,
            };

            let elements = match resources.binding(binding_num) {
                Some(DescriptorBindingResources::Buffer(elements)) => elements.as_slice(),
                _ => &[],
            };

            for (element, &offset) in offsets.iter().enumerate() {
                if offset as DeviceSize % alignment != 0 {
                    return Err(Box::new(ValidationError {
                        context: "dynamic_offsets".into(),
                        problem: format!(
                            "the offset for binding {} array element {} of \
                            `descriptor_sets[{}]` is not a multiple of the minimum offset \
                            alignment of its descriptor type",
                            binding_num, element, index,
                        )
                        .into(),
                        vuids: match binding.descriptor_type {
                            DescriptorType::UniformBufferDynamic => {
                                &["VUID-vkCmdBindDescriptorSets-pDynamicOffsets-01971"]
                            }
                            _ => &["VUID-vkCmdBindDescriptorSets-pDynamicOffsets-01972"],
                        },
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }

                if let Some(Some(buffer_info)) = elements.get(element) {
                    if buffer_info.range.end + offset as DeviceSize > buffer_info.buffer.size() {
                        return Err(Box::new(ValidationError {
                            context: "dynamic_offsets".into(),
                            problem: format!(
                                "the offset for binding {} array element {} of \
                                `descriptor_sets[{}]`, added to the end of the range of the \
                                descriptor, is greater than the size of the buffer",
                                binding_num, element, index,
                            )
                            .into(),
                            vuids: &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-01979"],
                            kind: Some(ViolationKind::RegionOutOfBounds),
                            ..Default::default()
                        }));
                    }
                }
            }
        }
    }

    let required_count: u32 = descriptor_sets
        .iter()
        .map(|set| set.layout().num_dynamic_descriptors())
        .sum();

    if dynamic_offsets.len() != required_count as usize {
        return Err(Box::new(ValidationError {
            problem: format!(
                "`dynamic_offsets.len()` is {}, but the descriptor sets have {} dynamic \
                descriptors",
                dynamic_offsets.len(),
                required_count,
            )
            .into(),
            vuids: &["VUID-vkCmdBindDescriptorSets-dynamicOffsetCount-00359"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    Ok(())
}

fn validate_bind_index_buffer(
    device: &Device,
    buffer: &Buffer,
    offset: DeviceSize,
    index_type: IndexType,
) -> Result<(), Box<ValidationError>> {
    index_type.validate_device(device).map_err(|err| {
        err.add_context("index_type")
            .set_vuids(&["VUID-vkCmdBindIndexBuffer-indexType-08787"])
            .set_kind(ViolationKind::FeatureNotEnabled)
    })?;

    buffer
        .validate_use(
            BufferUsage::INDEX_BUFFER,
            &["VUID-vkCmdBindIndexBuffer-buffer-08784"],
            &["VUID-vkCmdBindIndexBuffer-buffer-08785"],
        )
        .map_err(|err| err.add_context("buffer"))?;

    if offset >= buffer.size() {
        return Err(Box::new(ValidationError {
            problem: "`offset` is not less than `buffer.size()`".into(),
            vuids: &["VUID-vkCmdBindIndexBuffer-offset-08782"],
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    if offset % index_type.size() != 0 {
        return Err(Box::new(ValidationError {
            context: "offset".into(),
            problem: "is not a multiple of the size of `index_type`".into(),
            vuids: &["VUID-vkCmdBindIndexBuffer-offset-08783"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    Ok(())
}

fn validate_bind_vertex_buffers(
    device: &Device,
    first_binding: u32,
    vertex_buffers: &[(Arc<Buffer>, DeviceSize)],
) -> Result<(), Box<ValidationError>> {
    let max_bindings = device.properties().max_vertex_input_bindings;

    if first_binding >= max_bindings {
        return Err(Box::new(ValidationError {
            context: "first_binding".into(),
            problem: "is not less than the `max_vertex_input_bindings` limit".into(),
            vuids: &["VUID-vkCmdBindVertexBuffers-firstBinding-00624"],
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    if first_binding as u64 + vertex_buffers.len() as u64 > max_bindings as u64 {
        return Err(Box::new(ValidationError {
            problem: "`first_binding + vertex_buffers.len()` is greater than the \
                `max_vertex_input_bindings` limit"
                .into(),
            vuids: &["VUID-vkCmdBindVertexBuffers-firstBinding-00625"],
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    for (index, (buffer, offset)) in vertex_buffers.iter().enumerate() {
        buffer
            .validate_use(
                BufferUsage::VERTEX_BUFFER,
                &["VUID-vkCmdBindVertexBuffers-pBuffers-00627"],
                &["VUID-vkCmdBindVertexBuffers-pBuffers-00628"],
            )
            .map_err(|err| err.add_context(format!("vertex_buffers[{}].0", index)))?;

        if *offset >= buffer.size() {
            return Err(Box::new(ValidationError {
                context: format!("vertex_buffers[{}]", index).into(),
                problem: "the offset is not less than the size of the buffer".into(),
                vuids: &["VUID-vkCmdBindVertexBuffers-pOffsets-00626"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

fn validate_bind_transform_feedback_buffers(
    device: &Device,
    first_binding: u32,
    buffers: &[(Arc<Buffer>, DeviceSize)],
) -> Result<(), Box<ValidationError>> {
    if !device.enabled_features().transform_feedback {
        return Err(Box::new(ValidationError {
            problem: "transform feedback is used".into(),
            requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                "transform_feedback",
            )])]),
            vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-transformFeedback-02355"],
            kind: Some(ViolationKind::FeatureNotEnabled),
            ..Default::default()
        }));
    }

    let max_buffers = device.properties().max_transform_feedback_buffers;

    if first_binding >= max_buffers {
        return Err(Box::new(ValidationError {
            context: "first_binding".into(),
            problem: "is not less than the `max_transform_feedback_buffers` limit".into(),
            vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-firstBinding-02356"],
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    if first_binding as u64 + buffers.len() as u64 > max_buffers as u64 {
        return Err(Box::new(ValidationError {
            problem: "`first_binding + buffers.len()` is greater than the \
                `max_transform_feedback_buffers` limit"
                .into(),
            vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-firstBinding-02357"],
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    for (index, (buffer, offset)) in buffers.iter().enumerate() {
        buffer
            .validate_use(
                BufferUsage::TRANSFORM_FEEDBACK_BUFFER,
                &["VUID-vkCmdBindTransformFeedbackBuffersEXT-pBuffers-02360"],
                &["VUID-vkCmdBindTransformFeedbackBuffersEXT-pBuffers-02364"],
            )
            .map_err(|err| err.add_context(format!("buffers[{}].0", index)))?;

        if *offset >= buffer.size() {
            return Err(Box::new(ValidationError {
                context: format!("buffers[{}]", index).into(),
                problem: "the offset is not less than the size of the buffer".into(),
                vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-pOffsets-02358"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if offset % 4 != 0 {
            return Err(Box::new(ValidationError {
                context: format!("buffers[{}].1", index).into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-vkCmdBindTransformFeedbackBuffersEXT-pOffsets-02359"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

/// Parameters to push constants.
#[derive(Clone, Debug)]
pub struct PushConstantsInfo {
    /// The pipeline layout whose push constant ranges the values are pushed to.
    ///
    /// There is no default value.
    pub layout: Arc<PipelineLayout>,

    /// The shader stages whose push constants are written.
    ///
    /// The default value is [`ShaderStages::empty()`], which must be overridden.
    pub stages: ShaderStages,

    /// The byte offset of the values in the push constants.
    ///
    /// The default value is `0`.
    pub offset: u32,

    pub _ne: crate::NonExhaustive,
}

impl PushConstantsInfo {
    /// Returns a `PushConstantsInfo` with the specified `layout`.
    #[inline]
    pub fn layout(layout: Arc<PipelineLayout>) -> Self {
        Self {
            layout,
            stages: ShaderStages::empty(),
            offset: 0,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device, size: u32, errors: &mut ValidationErrors) {
        let &Self {
            ref layout,
            stages,
            offset,
            _ne: _,
        } = self;

        if stages.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "stages".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdPushConstants-stageFlags-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size == 0 {
            errors.push(Box::new(ValidationError {
                problem: "the size of the values is zero".into(),
                vuids: &["VUID-vkCmdPushConstants-size-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if stages.is_empty() || size == 0 {
            return;
        }

        if offset % 4 != 0 {
            errors.push(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not a multiple of 4".into(),
                vuids: &["VUID-vkCmdPushConstants-offset-00368"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if size % 4 != 0 {
            errors.push(Box::new(ValidationError {
                problem: "the size of the values is not a multiple of 4".into(),
                vuids: &["VUID-vkCmdPushConstants-size-00369"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let max_size = device.properties().max_push_constants_size;

        if offset >= max_size {
            errors.push(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not less than the `max_push_constants_size` limit".into(),
                vuids: &["VUID-vkCmdPushConstants-offset-00370"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        let end = offset as u64 + size as u64;

        if end > max_size as u64 {
            errors.push(Box::new(ValidationError {
                problem: "`offset` plus the size of the values is greater than the \
                    `max_push_constants_size` limit"
                    .into(),
                vuids: &["VUID-vkCmdPushConstants-size-00371"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        // Every range that overlaps the written bytes must be fully covered by `stages`.
        for range in layout.push_constant_ranges() {
            let range_end = range.offset as u64 + range.size as u64;
            let overlaps = (range.offset as u64) < end && (offset as u64) < range_end;

            if overlaps && !stages.contains(range.stages) {
                errors.push(Box::new(ValidationError {
                    context: "stages".into(),
                    problem: format!(
                        "does not contain all stages of the push constant range \
                        {}..{} of `layout`, which overlaps the written bytes",
                        range.offset, range_end,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdPushConstants-offset-01795"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        // Every stage must have a range that contains all written bytes.
        for stage in ALL_SHADER_STAGES {
            let stage_flags = ShaderStages::from(stage);

            if !stages.intersects(stage_flags) {
                continue;
            }

            let covered = layout
                .push_constant_ranges_for(stage_flags)
                .any(|range| {
                    range.offset <= offset && range.offset as u64 + range.size as u64 >= end
                });

            if !covered {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "`layout` has no push constant range for `ShaderStage::{:?}` that \
                        contains the bytes {}..{}",
                        stage, offset, end,
                    )
                    .into(),
                    vuids: &["VUID-vkCmdPushConstants-offset-01796"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

    }
}

#[cfg(test)]
mod tests {
    use super::PushConstantsInfo;
    use crate::{
        buffer::{BufferUsage, IndexType},
        command_buffer::{RenderPassBeginInfo, SubpassContents},
        descriptor_set::{
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
                DescriptorType,
            },
            pool::{DescriptorPool, DescriptorPoolCreateInfo},
            DescriptorBufferInfo, DescriptorSet, WriteDescriptorSet,
        },
        device::DeviceFeatures,
        format::Format,
        pipeline::{
            layout::{PipelineLayoutCreateInfo, PushConstantRange},
            PipelineBindPoint,
        },
        shader::ShaderStages,
        ViolationKind,
    };
    use std::collections::BTreeMap;

    #[test]
    fn push_constants_ranges() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = crate::tests::pipeline_layout(
            &device,
            PipelineLayoutCreateInfo {
                push_constant_ranges: vec![
                    PushConstantRange {
                        stages: ShaderStages::VERTEX,
                        offset: 16,
                        size: 64,
                    },
                    PushConstantRange {
                        stages: ShaderStages::FRAGMENT,
                        offset: 0,
                        size: 32,
                    },
                ],
                ..Default::default()
            },
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.push_constants(
            PushConstantsInfo {
                stages: ShaderStages::VERTEX,
                offset: 32,
                ..PushConstantsInfo::layout(layout.clone())
            },
            &[0u32; 12],
        )
        .unwrap();

        // The vertex range doesn't contain bytes 0..16, and the fragment range overlaps the
        // written bytes without its stage being given.
        let errors = cb
            .push_constants(
                PushConstantsInfo {
                    stages: ShaderStages::VERTEX,
                    ..PushConstantsInfo::layout(layout.clone())
                },
                &[0u32; 8],
            )
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_vuid("VUID-vkCmdPushConstants-offset-01796"));
        assert!(errors.contains_vuid("VUID-vkCmdPushConstants-offset-01795"));

        // Bytes 16..32 are in both ranges, so both stages must be given.
        let errors = cb
            .push_constants(
                PushConstantsInfo {
                    stages: ShaderStages::FRAGMENT,
                    offset: 16,
                    ..PushConstantsInfo::layout(layout.clone())
                },
                &[0u32; 4],
            )
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdPushConstants-offset-01795"));

        let errors = cb
            .push_constants(
                PushConstantsInfo {
                    stages: ShaderStages::FRAGMENT,
                    offset: 2,
                    ..PushConstantsInfo::layout(layout)
                },
                &[0u32; 4],
            )
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdPushConstants-offset-00368"));
    }

    #[test]
    fn bind_index_buffer() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let index_buffer = crate::tests::buffer(&device, 64, BufferUsage::INDEX_BUFFER);
        let vertex_buffer = crate::tests::buffer(&device, 64, BufferUsage::VERTEX_BUFFER);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.bind_index_buffer(&index_buffer, 0, IndexType::U16).unwrap();

        let errors = cb
            .bind_index_buffer(&vertex_buffer, 0, IndexType::U16)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindIndexBuffer-buffer-08784"));
        assert!(errors.contains_kind(ViolationKind::MissingUsage));

        let errors = cb
            .bind_index_buffer(&index_buffer, 2, IndexType::U32)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindIndexBuffer-offset-08783"));

        let errors = cb
            .bind_index_buffer(&index_buffer, 0, IndexType::U8)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindIndexBuffer-indexType-08787"));
    }

    #[test]
    fn bind_vertex_buffers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let vertex_buffer = crate::tests::buffer(&device, 64, BufferUsage::VERTEX_BUFFER);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.bind_vertex_buffers(0, &[(vertex_buffer.clone(), 0)])
            .unwrap();

        let errors = cb
            .bind_vertex_buffers(16, &[(vertex_buffer.clone(), 0)])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindVertexBuffers-firstBinding-00624"));

        let errors = cb
            .bind_vertex_buffers(0, &[(vertex_buffer, 64)])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindVertexBuffers-pOffsets-00626"));
    }

    #[test]
    fn bind_descriptor_sets() {
        let (device, _queue) = gfx_dev_and_queue!();
        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        stages: ShaderStages::COMPUTE,
                        ..DescriptorSetLayoutBinding::descriptor_type(
                            DescriptorType::UniformBufferDynamic,
                        )
                    },
                )]),
                ..Default::default()
            },
        )
        .unwrap();
        let pool = DescriptorPool::new(
            device.clone(),
            DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [(DescriptorType::UniformBufferDynamic, 1)]
                    .into_iter()
                    .collect(),
                ..Default::default()
            },
        )
        .unwrap();
        let uniform = crate::tests::buffer(&device, 1024, BufferUsage::UNIFORM_BUFFER);
        let set = DescriptorSet::new(
            pool,
            set_layout.clone(),
            [WriteDescriptorSet::buffer_with_range(
                0,
                DescriptorBufferInfo {
                    buffer: uniform,
                    range: 0..256,
                },
            )],
        )
        .unwrap();
        let layout = crate::tests::pipeline_layout(
            &device,
            PipelineLayoutCreateInfo {
                set_layouts: vec![set_layout],
                ..Default::default()
            },
        );

        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.bind_descriptor_sets(
            PipelineBindPoint::Compute,
            &layout,
            0,
            &[set.clone()],
            &[256],
        )
        .unwrap();

        let errors = cb
            .bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set.clone()], &[])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindDescriptorSets-dynamicOffsetCount-00359"));

        let errors = cb
            .bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set.clone()], &[4])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindDescriptorSets-pDynamicOffsets-01971"));

        let errors = cb
            .bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 1, &[set], &[0])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindDescriptorSets-firstSet-00360"));
    }

    #[test]
    fn bind_graphics_on_compute_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let pool = crate::tests::command_pool(
            &device,
            1,
            crate::command_buffer::pool::CommandPoolCreateFlags::empty(),
        );
        let cb = crate::tests::command_buffer(
            &pool,
            crate::command_buffer::CommandBufferLevel::Primary,
        );
        cb.begin(Default::default()).unwrap();

        let errors = cb.bind_pipeline_graphics(&pipeline).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindPipeline-commandBuffer-cmdpool"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));
    }

    #[test]
    fn transform_feedback_buffers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let xfb = crate::tests::buffer(&device, 64, BufferUsage::TRANSFORM_FEEDBACK_BUFFER);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.bind_transform_feedback_buffers(0, &[(xfb.clone(), 0)])
            .unwrap();

        let errors = cb
            .bind_transform_feedback_buffers(0, &[(xfb.clone(), 2)])
            .unwrap_err();
        assert!(errors
            .contains_vuid("VUID-vkCmdBindTransformFeedbackBuffersEXT-pOffsets-02359"));

        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();
        cb.bind_pipeline_graphics(&pipeline).unwrap();
        cb.begin_transform_feedback(0, &[]).unwrap();

        let errors = cb
            .bind_transform_feedback_buffers(0, &[(xfb, 0)])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBindTransformFeedbackBuffersEXT-None-02365"));
    }
}
