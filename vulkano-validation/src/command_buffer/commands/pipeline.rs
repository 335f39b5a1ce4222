// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{validate_protected_access, CommandInfo};
use crate::{
    buffer::{Buffer, BufferUsage},
    command_buffer::{
        state::{
            CommandBufferBuilderState, RenderPassState, RenderPassStateType, ALL_DYNAMIC_STATES,
        },
        CommandBuffer, CommandBufferInner,
    },
    descriptor_set::{layout::DescriptorType, DescriptorBindingResources},
    device::{queue::QueueFlags, Device, DeviceOwned},
    format::FormatFeatures,
    gpu_av::{DrawCount, InstrumentedCommand, Workload},
    image::{view::ImageView, SampleCount},
    pipeline::{
        compute::ComputePipeline,
        graphics::{GraphicsPipeline, PipelineSubpassType},
        vertex_input::VertexInputRate,
        Pipeline,
    },
    shader::DescriptorBindingRequirements,
    DeviceSize, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind,
};
use foldhash::HashSet;
use std::sync::Arc;

const DRAW: CommandInfo = command_info!("vkCmdDraw", QueueFlags::GRAPHICS, Inside);
const DRAW_INDEXED: CommandInfo = command_info!("vkCmdDrawIndexed", QueueFlags::GRAPHICS, Inside);
const DRAW_INDIRECT: CommandInfo =
    command_info!("vkCmdDrawIndirect", QueueFlags::GRAPHICS, Inside);
const DRAW_INDEXED_INDIRECT: CommandInfo =
    command_info!("vkCmdDrawIndexedIndirect", QueueFlags::GRAPHICS, Inside);
const DRAW_INDIRECT_COUNT: CommandInfo =
    command_info!("vkCmdDrawIndirectCount", QueueFlags::GRAPHICS, Inside);
const DISPATCH: CommandInfo = command_info!("vkCmdDispatch", QueueFlags::COMPUTE, Outside);
const DISPATCH_INDIRECT: CommandInfo =
    command_info!("vkCmdDispatchIndirect", QueueFlags::COMPUTE, Outside);

/// The VUIDs of the checks shared by all draw and dispatch commands.
struct PipelineCommandVuids {
    pipeline_bound: &'static [&'static str],
    // In the order of `ALL_DYNAMIC_STATES`.
    dynamic_states: [&'static [&'static str]; 11],
    descriptor_set_bound: &'static [&'static str],
    descriptor_written: &'static [&'static str],
    view_type: &'static [&'static str],
    scalar_type: &'static [&'static str],
    multisampled: &'static [&'static str],
    image_atomic: &'static [&'static str],
    texel_buffer_atomic: &'static [&'static str],
    push_constants: &'static [&'static str],
    render_pass: &'static [&'static str],
    subpass: &'static [&'static str],
    dynamic_rendering: &'static [&'static str],
    view_mask: &'static [&'static str],
    color_attachment_count: &'static [&'static str],
    color_attachment_format: &'static [&'static str],
    protected: &'static [&'static str],
    protected_write: &'static [&'static str],
}

macro_rules! pipeline_command_vuids {
    ($name:literal) => {
        PipelineCommandVuids {
            pipeline_bound: &[concat!("VUID-", $name, "-None-08606")],
            dynamic_states: [
                &[concat!("VUID-", $name, "-None-07831")],
                &[concat!("VUID-", $name, "-None-07832")],
                &[concat!("VUID-", $name, "-None-07833")],
                &[concat!("VUID-", $name, "-None-07834")],
                &[concat!("VUID-", $name, "-None-07835")],
                &[concat!("VUID-", $name, "-None-07836")],
                &[concat!("VUID-", $name, "-None-07837")],
                &[concat!("VUID-", $name, "-None-07838")],
                &[concat!("VUID-", $name, "-None-07839")],
                &[concat!("VUID-", $name, "-None-07878")],
                &[concat!("VUID-", $name, "-None-09236")],
            ],
            descriptor_set_bound: &[concat!("VUID-", $name, "-None-08600")],
            descriptor_written: &[concat!("VUID-", $name, "-None-08114")],
            view_type: &[concat!("VUID-", $name, "-viewType-07752")],
            scalar_type: &[concat!("VUID-", $name, "-format-07753")],
            multisampled: &[concat!("UNASSIGNED-", $name, "-multisampled-image")],
            image_atomic: &[concat!("VUID-", $name, "-None-02691")],
            texel_buffer_atomic: &[concat!("VUID-", $name, "-None-07888")],
            push_constants: &[concat!("VUID-", $name, "-maintenance4-08602")],
            render_pass: &[concat!("VUID-", $name, "-renderPass-02684")],
            subpass: &[concat!("VUID-", $name, "-subpass-02685")],
            dynamic_rendering: &[concat!("VUID-", $name, "-renderPass-06198")],
            view_mask: &[concat!("VUID-", $name, "-viewMask-06178")],
            color_attachment_count: &[concat!("VUID-", $name, "-colorAttachmentCount-06179")],
            color_attachment_format: &[concat!("VUID-", $name, "-colorAttachmentCount-06180")],
            protected: &[concat!("VUID-", $name, "-commandBuffer-02707")],
            protected_write: &[concat!("VUID-", $name, "-commandBuffer-02712")],
        }
    };
}

const DRAW_VUIDS: PipelineCommandVuids = pipeline_command_vuids!("vkCmdDraw");
const DRAW_INDEXED_VUIDS: PipelineCommandVuids = pipeline_command_vuids!("vkCmdDrawIndexed");
const DRAW_INDIRECT_VUIDS: PipelineCommandVuids = pipeline_command_vuids!("vkCmdDrawIndirect");
const DRAW_INDEXED_INDIRECT_VUIDS: PipelineCommandVuids =
    pipeline_command_vuids!("vkCmdDrawIndexedIndirect");
const DRAW_INDIRECT_COUNT_VUIDS: PipelineCommandVuids =
    pipeline_command_vuids!("vkCmdDrawIndirectCount");
const DISPATCH_VUIDS: PipelineCommandVuids = pipeline_command_vuids!("vkCmdDispatch");
const DISPATCH_INDIRECT_VUIDS: PipelineCommandVuids =
    pipeline_command_vuids!("vkCmdDispatchIndirect");

/// The VUIDs of the checks on the buffer of an indirect command.
struct IndirectVuids {
    usage: &'static [&'static str],
    memory: &'static [&'static str],
    protected: &'static [&'static str],
    offset: &'static [&'static str],
    multi_draw: &'static [&'static str],
    max_draw_count: &'static [&'static str],
    stride: &'static [&'static str],
    single_range: &'static [&'static str],
    multi_range: &'static [&'static str],
}

const DRAW_INDIRECT_BUFFER_VUIDS: IndirectVuids = IndirectVuids {
    usage: &["VUID-vkCmdDrawIndirect-buffer-02709"],
    memory: &["VUID-vkCmdDrawIndirect-buffer-02708"],
    protected: &["VUID-vkCmdDrawIndirect-commandBuffer-02711"],
    offset: &["VUID-vkCmdDrawIndirect-offset-02710"],
    multi_draw: &["VUID-vkCmdDrawIndirect-drawCount-02718"],
    max_draw_count: &["VUID-vkCmdDrawIndirect-drawCount-02719"],
    stride: &["VUID-vkCmdDrawIndirect-drawCount-00476"],
    single_range: &["VUID-vkCmdDrawIndirect-drawCount-00487"],
    multi_range: &["VUID-vkCmdDrawIndirect-drawCount-00488"],
};

const DRAW_INDEXED_INDIRECT_BUFFER_VUIDS: IndirectVuids = IndirectVuids {
    usage: &["VUID-vkCmdDrawIndexedIndirect-buffer-02709"],
    memory: &["VUID-vkCmdDrawIndexedIndirect-buffer-02708"],
    protected: &["VUID-vkCmdDrawIndexedIndirect-commandBuffer-02711"],
    offset: &["VUID-vkCmdDrawIndexedIndirect-offset-02710"],
    multi_draw: &["VUID-vkCmdDrawIndexedIndirect-drawCount-02718"],
    max_draw_count: &["VUID-vkCmdDrawIndexedIndirect-drawCount-02719"],
    stride: &["VUID-vkCmdDrawIndexedIndirect-drawCount-00528"],
    single_range: &["VUID-vkCmdDrawIndexedIndirect-drawCount-00539"],
    multi_range: &["VUID-vkCmdDrawIndexedIndirect-drawCount-00540"],
};

const DRAW_INDIRECT_COUNT_BUFFER_VUIDS: IndirectVuids = IndirectVuids {
    usage: &["VUID-vkCmdDrawIndirectCount-buffer-02709"],
    memory: &["VUID-vkCmdDrawIndirectCount-buffer-02708"],
    protected: &["VUID-vkCmdDrawIndirectCount-commandBuffer-02711"],
    offset: &["VUID-vkCmdDrawIndirectCount-offset-02710"],
    multi_draw: &[],
    max_draw_count: &[],
    stride: &["VUID-vkCmdDrawIndirectCount-stride-03110"],
    single_range: &["VUID-vkCmdDrawIndirectCount-maxDrawCount-03111"],
    multi_range: &["VUID-vkCmdDrawIndirectCount-maxDrawCount-03111"],
};

const DISPATCH_INDIRECT_BUFFER_VUIDS: IndirectVuids = IndirectVuids {
    usage: &["VUID-vkCmdDispatchIndirect-buffer-02709"],
    memory: &["VUID-vkCmdDispatchIndirect-buffer-02708"],
    protected: &["VUID-vkCmdDispatchIndirect-commandBuffer-02711"],
    offset: &["VUID-vkCmdDispatchIndirect-offset-02710"],
    multi_draw: &[],
    max_draw_count: &[],
    stride: &[],
    single_range: &["VUID-vkCmdDispatchIndirect-offset-00407"],
    multi_range: &["VUID-vkCmdDispatchIndirect-offset-00407"],
};

// Sizes of `VkDrawIndirectCommand`, `VkDrawIndexedIndirectCommand` and
// `VkDispatchIndirectCommand`.
const DRAW_INDIRECT_COMMAND_SIZE: u32 = 16;
const DRAW_INDEXED_INDIRECT_COMMAND_SIZE: u32 = 20;
const DISPATCH_INDIRECT_COMMAND_SIZE: u32 = 12;

/// # Commands to execute a bound pipeline.
///
/// Before recording the command, everything that the bound pipeline consumes is checked: the
/// dynamic states, descriptor sets, push constants and vertex buffers that it uses must have
/// been set since the last pipeline bind that made them stale.
impl CommandBuffer {
    /// Perform a single compute operation using a compute pipeline.
    ///
    /// A compute pipeline must have been bound using
    /// [`bind_pipeline_compute`](Self::bind_pipeline_compute).
    pub fn dispatch(&self, group_counts: [u32; 3]) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DISPATCH, |inner, errors| {
            let max = self.device().properties().max_compute_work_group_count;
            const GROUP_COUNT_VUIDS: [&[&str]; 3] = [
                &["VUID-vkCmdDispatch-groupCountX-00386"],
                &["VUID-vkCmdDispatch-groupCountY-00387"],
                &["VUID-vkCmdDispatch-groupCountZ-00388"],
            ];

            for (dim, ((count, max), vuids)) in group_counts
                .into_iter()
                .zip(max)
                .zip(GROUP_COUNT_VUIDS)
                .enumerate()
            {
                if count > max {
                    errors.push(Box::new(ValidationError {
                        context: format!("group_counts[{}]", dim).into(),
                        problem: "is greater than the `max_compute_work_group_count` limit"
                            .into(),
                        vuids,
                        kind: Some(ViolationKind::LimitExceeded),
                        ..Default::default()
                    }));
                }
            }

            if let Some(pipeline) = validate_compute_state(
                protected,
                inner,
                &DISPATCH_VUIDS,
                errors,
            ) {
                instrument(
                    self.device(),
                    inner,
                    &*pipeline,
                    DISPATCH.name,
                    Workload::Dispatch { group_counts },
                );
            }
        })
    }

    /// Perform a compute operation, reading the group counts from `indirect_buffer` at
    /// `offset`.
    pub fn dispatch_indirect(
        &self,
        indirect_buffer: &Arc<Buffer>,
        offset: DeviceSize,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DISPATCH_INDIRECT, |inner, errors| {
            validate_indirect_buffer(
                self.device(),
                protected,
                indirect_buffer,
                offset,
                1,
                DISPATCH_INDIRECT_COMMAND_SIZE,
                DISPATCH_INDIRECT_COMMAND_SIZE,
                &DISPATCH_INDIRECT_BUFFER_VUIDS,
                errors,
            );

            if let Some(pipeline) = validate_compute_state(
                protected,
                inner,
                &DISPATCH_INDIRECT_VUIDS,
                errors,
            ) {
                instrument(
                    self.device(),
                    inner,
                    &*pipeline,
                    DISPATCH_INDIRECT.name,
                    Workload::DispatchIndirect {
                        buffer: indirect_buffer.clone(),
                        offset,
                    },
                );
            }

            inner.add_resource(indirect_buffer);
        })
    }

    /// Perform a single draw operation using a graphics pipeline.
    ///
    /// The vertex buffers bound with [`bind_vertex_buffers`](Self::bind_vertex_buffers) must be
    /// large enough to hold every vertex and instance that is read.
    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DRAW, |inner, errors| {
            let Some(pipeline) = validate_graphics_state(protected, inner, &DRAW_VUIDS, errors)
            else {
                return;
            };

            let builder_state = &inner.builder_state;
            validate_vertex_input(
                builder_state,
                &pipeline,
                VertexRange {
                    last_vertex: last_index(first_vertex, vertex_count),
                    last_instance: last_index(first_instance, instance_count),
                },
                &["VUID-vkCmdDraw-None-04007"],
                &["VUID-vkCmdDraw-None-02721"],
                errors,
            );
            validate_multiview_instance_index(
                self.device(),
                builder_state,
                first_instance,
                instance_count,
                &["VUID-vkCmdDraw-maxMultiviewInstanceIndex-02688"],
                errors,
            );

            instrument(
                self.device(),
                inner,
                &*pipeline,
                DRAW.name,
                Workload::Draw {
                    vertex_count,
                    instance_count,
                },
            );
        })
    }

    /// Perform a single draw operation using a graphics pipeline, using an index buffer.
    ///
    /// An index buffer must have been bound with
    /// [`bind_index_buffer`](Self::bind_index_buffer), and the indices that are read must be
    /// inside it.
    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        _vertex_offset: i32,
        first_instance: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DRAW_INDEXED, |inner, errors| {
            match &inner.builder_state.index_buffer {
                None => {
                    errors.push(Box::new(ValidationError {
                        problem: "no index buffer is bound".into(),
                        vuids: &["VUID-vkCmdDrawIndexed-None-07312"],
                        kind: Some(ViolationKind::IndexBufferNotBound),
                        ..Default::default()
                    }));
                }
                Some(index_buffer) => {
                    let end = (first_index as DeviceSize + index_count as DeviceSize)
                        * index_buffer.index_type.size()
                        + index_buffer.offset;

                    if end > index_buffer.buffer.size() {
                        errors.push(Box::new(ValidationError {
                            problem: format!(
                                "`(first_index + index_count) * index_type.size() + offset` \
                                ({}) is greater than the size of the bound index buffer ({})",
                                end,
                                index_buffer.buffer.size(),
                            )
                            .into(),
                            vuids: &["VUID-vkCmdDrawIndexed-robustBufferAccess2-08798"],
                            kind: Some(ViolationKind::RegionOutOfBounds),
                            ..Default::default()
                        }));
                    }
                }
            }

            let Some(pipeline) = validate_graphics_state(
                protected,
                inner,
                &DRAW_INDEXED_VUIDS,
                errors,
            ) else {
                return;
            };

            let builder_state = &inner.builder_state;
            validate_vertex_input(
                builder_state,
                &pipeline,
                VertexRange {
                    last_vertex: None,
                    last_instance: last_index(first_instance, instance_count),
                },
                &["VUID-vkCmdDrawIndexed-None-04007"],
                &["VUID-vkCmdDrawIndexed-None-02721"],
                errors,
            );
            validate_multiview_instance_index(
                self.device(),
                builder_state,
                first_instance,
                instance_count,
                &["VUID-vkCmdDrawIndexed-maxMultiviewInstanceIndex-02688"],
                errors,
            );

            instrument(
                self.device(),
                inner,
                &*pipeline,
                DRAW_INDEXED.name,
                Workload::Draw {
                    vertex_count: index_count,
                    instance_count,
                },
            );
        })
    }

    /// Perform `draw_count` draw operations, reading the parameters from `indirect_buffer`
    /// at `offset`, with `stride` bytes between consecutive draws.
    pub fn draw_indirect(
        &self,
        indirect_buffer: &Arc<Buffer>,
        offset: DeviceSize,
        draw_count: u32,
        stride: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DRAW_INDIRECT, |inner, errors| {
            validate_indirect_buffer(
                self.device(),
                protected,
                indirect_buffer,
                offset,
                draw_count,
                stride,
                DRAW_INDIRECT_COMMAND_SIZE,
                &DRAW_INDIRECT_BUFFER_VUIDS,
                errors,
            );

            if let Some(pipeline) = validate_graphics_state(
                protected,
                inner,
                &DRAW_INDIRECT_VUIDS,
                errors,
            ) {
                validate_vertex_input(
                    &inner.builder_state,
                    &pipeline,
                    VertexRange::default(),
                    &["VUID-vkCmdDrawIndirect-None-04007"],
                    &["VUID-vkCmdDrawIndirect-None-02721"],
                    errors,
                );
                instrument(
                    self.device(),
                    inner,
                    &*pipeline,
                    DRAW_INDIRECT.name,
                    Workload::DrawIndirect {
                        buffer: indirect_buffer.clone(),
                        offset,
                        stride,
                        draw_count: DrawCount::Direct(draw_count),
                    },
                );
            }

            inner.add_resource(indirect_buffer);
        })
    }

    /// Perform `draw_count` indexed draw operations, reading the parameters from
    /// `indirect_buffer` at `offset`, with `stride` bytes between consecutive draws.
    pub fn draw_indexed_indirect(
        &self,
        indirect_buffer: &Arc<Buffer>,
        offset: DeviceSize,
        draw_count: u32,
        stride: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DRAW_INDEXED_INDIRECT, |inner, errors| {
            validate_indirect_buffer(
                self.device(),
                protected,
                indirect_buffer,
                offset,
                draw_count,
                stride,
                DRAW_INDEXED_INDIRECT_COMMAND_SIZE,
                &DRAW_INDEXED_INDIRECT_BUFFER_VUIDS,
                errors,
            );

            if inner.builder_state.index_buffer.is_none() {
                errors.push(Box::new(ValidationError {
                    problem: "no index buffer is bound".into(),
                    vuids: &["VUID-vkCmdDrawIndexedIndirect-None-07312"],
                    kind: Some(ViolationKind::IndexBufferNotBound),
                    ..Default::default()
                }));
            }

            if let Some(pipeline) = validate_graphics_state(
                protected,
                inner,
                &DRAW_INDEXED_INDIRECT_VUIDS,
                errors,
            ) {
                validate_vertex_input(
                    &inner.builder_state,
                    &pipeline,
                    VertexRange::default(),
                    &["VUID-vkCmdDrawIndexedIndirect-None-04007"],
                    &["VUID-vkCmdDrawIndexedIndirect-None-02721"],
                    errors,
                );
                instrument(
                    self.device(),
                    inner,
                    &*pipeline,
                    DRAW_INDEXED_INDIRECT.name,
                    Workload::DrawIndirect {
                        buffer: indirect_buffer.clone(),
                        offset,
                        stride,
                        draw_count: DrawCount::Direct(draw_count),
                    },
                );
            }

            inner.add_resource(indirect_buffer);
        })
    }

    /// Perform draw operations whose number is read from `count_buffer` at
    /// `count_buffer_offset`, at most `max_draw_count`, reading the parameters from
    /// `indirect_buffer` at `offset`.
    pub fn draw_indirect_count(
        &self,
        indirect_buffer: &Arc<Buffer>,
        offset: DeviceSize,
        count_buffer: &Arc<Buffer>,
        count_buffer_offset: DeviceSize,
        max_draw_count: u32,
        stride: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&DRAW_INDIRECT_COUNT, |inner, errors| {
            let device = self.device();

            if !device.enabled_features().draw_indirect_count {
                errors.push(Box::new(ValidationError {
                    problem: "`draw_indirect_count` was called".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "draw_indirect_count",
                    )])]),
                    vuids: &["VUID-vkCmdDrawIndirectCount-None-04445"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                    ..Default::default()
                }));
            }

            validate_indirect_buffer(
                device,
                protected,
                indirect_buffer,
                offset,
                max_draw_count.max(1),
                stride,
                DRAW_INDIRECT_COMMAND_SIZE,
                &DRAW_INDIRECT_COUNT_BUFFER_VUIDS,
                errors,
            );

            errors.check(
                count_buffer
                    .validate_use(
                        BufferUsage::INDIRECT_BUFFER,
                        &["VUID-vkCmdDrawIndirectCount-countBuffer-02714"],
                        &["VUID-vkCmdDrawIndirectCount-countBuffer-02715"],
                    )
                    .map_err(|err| indirect_usage_kind(err).add_context("count_buffer")),
            );

            if count_buffer_offset % 4 != 0 {
                errors.push(Box::new(ValidationError {
                    context: "count_buffer_offset".into(),
                    problem: "is not a multiple of 4".into(),
                    vuids: &["VUID-vkCmdDrawIndirectCount-countBufferOffset-02716"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if count_buffer_offset + 4 > count_buffer.size() {
                errors.push(Box::new(ValidationError {
                    problem: "`count_buffer_offset + 4` is greater than the size of \
                        `count_buffer`"
                        .into(),
                    vuids: &["VUID-vkCmdDrawIndirectCount-countBufferOffset-04129"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            if let Some(pipeline) = validate_graphics_state(
                protected,
                inner,
                &DRAW_INDIRECT_COUNT_VUIDS,
                errors,
            ) {
                validate_vertex_input(
                    &inner.builder_state,
                    &pipeline,
                    VertexRange::default(),
                    &["VUID-vkCmdDrawIndirectCount-None-04007"],
                    &["VUID-vkCmdDrawIndirectCount-None-02721"],
                    errors,
                );
                instrument(
                    device,
                    inner,
                    &*pipeline,
                    DRAW_INDIRECT_COUNT.name,
                    Workload::DrawIndirect {
                        buffer: indirect_buffer.clone(),
                        offset,
                        stride,
                        draw_count: DrawCount::Buffer {
                            buffer: count_buffer.clone(),
                            offset: count_buffer_offset,
                            max_draw_count,
                        },
                    },
                );
            }

            inner.add_resource(indirect_buffer);
            inner.add_resource(count_buffer);
        })
    }
}

/// Returns the index of the last vertex or instance, or `None` if there are none.
#[inline]
fn last_index(first: u32, count: u32) -> Option<u32> {
    (count != 0).then(|| first.saturating_add(count - 1))
}

/// The vertices and instances that a draw reads, where known. Unknown indices are checked as
/// if they were 0.
#[derive(Clone, Copy, Debug, Default)]
struct VertexRange {
    last_vertex: Option<u32>,
    last_instance: Option<u32>,
}

fn validate_compute_state(
    command_buffer_protected: bool,
    inner: &CommandBufferInner,
    vuids: &PipelineCommandVuids,
    errors: &mut ValidationErrors,
) -> Option<Arc<ComputePipeline>> {
    let builder_state = &inner.builder_state;

    let Some(pipeline) = builder_state.pipeline_compute.clone() else {
        errors.push(Box::new(ValidationError {
            problem: "no compute pipeline is bound".into(),
            vuids: vuids.pipeline_bound,
            kind: Some(ViolationKind::PipelineNotBound),
            ..Default::default()
        }));

        return None;
    };

    validate_descriptor_sets(
        command_buffer_protected,
        builder_state,
        &*pipeline,
        vuids,
        errors,
    );
    validate_push_constants(builder_state, &*pipeline, vuids, errors);

    Some(pipeline)
}

fn validate_graphics_state(
    command_buffer_protected: bool,
    inner: &CommandBufferInner,
    vuids: &PipelineCommandVuids,
    errors: &mut ValidationErrors,
) -> Option<Arc<GraphicsPipeline>> {
    let builder_state = &inner.builder_state;

    let Some(pipeline) = builder_state.pipeline_graphics.clone() else {
        errors.push(Box::new(ValidationError {
            problem: "no graphics pipeline is bound".into(),
            vuids: vuids.pipeline_bound,
            kind: Some(ViolationKind::PipelineNotBound),
            ..Default::default()
        }));

        return None;
    };

    if let Some(render_pass_state) = &builder_state.render_pass {
        validate_pipeline_render_pass(render_pass_state, &pipeline, vuids, errors);
    }

    for (state, state_vuids) in ALL_DYNAMIC_STATES.into_iter().zip(vuids.dynamic_states) {
        if pipeline.is_dynamic(state) && !builder_state.is_dynamic_state_set(state, &pipeline) {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "the bound pipeline requires `DynamicState::{:?}`, but it has not been set \
                    since the pipeline was bound",
                    state,
                )
                .into(),
                vuids: state_vuids,
                kind: Some(ViolationKind::DynamicStateNotSetViolation),
                ..Default::default()
            }));
        }
    }

    validate_descriptor_sets(
        command_buffer_protected,
        builder_state,
        &*pipeline,
        vuids,
        errors,
    );
    validate_push_constants(builder_state, &*pipeline, vuids, errors);

    Some(pipeline)
}

fn validate_pipeline_render_pass(
    render_pass_state: &RenderPassState,
    pipeline: &GraphicsPipeline,
    vuids: &PipelineCommandVuids,
    errors: &mut ValidationErrors,
) {
    match (&render_pass_state.render_pass, pipeline.subpass()) {
        (
            RenderPassStateType::BeginRenderPass(state),
            PipelineSubpassType::BeginRenderPass(pipeline_subpass),
        ) => {
            if !pipeline_subpass
                .render_pass()
                .is_compatible_with(state.subpass.render_pass())
            {
                errors.push(Box::new(ValidationError {
                    problem: "the render pass of the bound pipeline is not compatible with the \
                        render pass of the current render pass instance"
                        .into(),
                    vuids: vuids.render_pass,
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            }

            if pipeline_subpass.index() != state.subpass.index() {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the bound pipeline was created for subpass {}, but the current \
                        subpass is {}",
                        pipeline_subpass.index(),
                        state.subpass.index(),
                    )
                    .into(),
                    vuids: vuids.subpass,
                    kind: Some(ViolationKind::SubpassIndexMismatchViolation),
                    ..Default::default()
                }));
            }
        }
        (RenderPassStateType::BeginRenderPass(_), PipelineSubpassType::BeginRendering(_)) => {
            errors.push(Box::new(ValidationError {
                problem: "the current render pass instance was begun with `begin_render_pass`, \
                    but the bound pipeline was created for dynamic rendering"
                    .into(),
                vuids: vuids.render_pass,
                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                ..Default::default()
            }));
        }
        (RenderPassStateType::BeginRendering, PipelineSubpassType::BeginRenderPass(_)) => {
            errors.push(Box::new(ValidationError {
                problem: "the current render pass instance was begun with `begin_rendering`, \
                    but the bound pipeline was created with a render pass object"
                    .into(),
                vuids: vuids.dynamic_rendering,
                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                ..Default::default()
            }));
        }
        (RenderPassStateType::BeginRendering, PipelineSubpassType::BeginRendering(info)) => {
            let current = &render_pass_state.rendering_info;

            if info.view_mask != current.view_mask {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the view mask of the bound pipeline ({:#b}) is not equal to the view \
                        mask of the current render pass instance ({:#b})",
                        info.view_mask, current.view_mask,
                    )
                    .into(),
                    vuids: vuids.view_mask,
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            }

            if info.color_attachment_formats.len() != current.color_attachment_formats.len() {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the bound pipeline has {} color attachments, but the current render \
                        pass instance has {}",
                        info.color_attachment_formats.len(),
                        current.color_attachment_formats.len(),
                    )
                    .into(),
                    vuids: vuids.color_attachment_count,
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            } else {
                for (index, (required, actual)) in info
                    .color_attachment_formats
                    .iter()
                    .zip(&current.color_attachment_formats)
                    .enumerate()
                {
                    if let (Some(required), Some(actual)) = (required, actual) {
                        if required != actual {
                            errors.push(Box::new(ValidationError {
                                problem: format!(
                                    "the format of color attachment {} of the current render \
                                    pass instance ({:?}) is not equal to the format the bound \
                                    pipeline was created with ({:?})",
                                    index, actual, required,
                                )
                                .into(),
                                vuids: vuids.color_attachment_format,
                                kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                                ..Default::default()
                            }));
                        }
                    }
                }
            }
        }
    }
}

fn validate_descriptor_sets(
    command_buffer_protected: bool,
    builder_state: &CommandBufferBuilderState,
    pipeline: &dyn Pipeline,
    vuids: &PipelineCommandVuids,
    errors: &mut ValidationErrors,
) {
    let requirements = pipeline.descriptor_binding_requirements();

    if requirements.is_empty() {
        return;
    }

    let Some(state) = builder_state
        .descriptor_sets
        .get(&pipeline.bind_point())
        .filter(|state| {
            state
                .pipeline_layout
                .is_compatible_with(pipeline.layout(), pipeline.num_used_descriptor_sets())
        })
    else {
        errors.push(Box::new(ValidationError {
            problem: "the bound pipeline uses descriptor sets, but no descriptor sets have been \
                bound with a pipeline layout that is compatible with the layout of the pipeline"
                .into(),
            vuids: vuids.descriptor_set_bound,
            kind: Some(ViolationKind::DescriptorSetNotBoundViolation),
            ..Default::default()
        }));

        return;
    };

    let mut requirements: Vec<_> = requirements.iter().collect();
    requirements.sort_unstable_by_key(|&(&key, _)| key);
    let mut missing_sets = HashSet::default();

    for (&(set_num, binding_num), reqs) in requirements {
        let Some(bound) = state.descriptor_sets.get(&set_num) else {
            if missing_sets.insert(set_num) {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the bound pipeline uses descriptor set {}, but no descriptor set is \
                        bound to it",
                        set_num,
                    )
                    .into(),
                    vuids: vuids.descriptor_set_bound,
                    kind: Some(ViolationKind::DescriptorSetNotBoundViolation),
                    ..Default::default()
                }));
            }

            continue;
        };

        let set = &bound.set;
        let Some(layout_binding) = set.layout().bindings().get(&binding_num) else {
            continue;
        };
        let resources = set.resources();
        let Some(binding_resources) = resources.binding(binding_num) else {
            continue;
        };

        let descriptor_type = layout_binding.descriptor_type;
        let writes = matches!(
            descriptor_type,
            DescriptorType::StorageImage
                | DescriptorType::StorageTexelBuffer
                | DescriptorType::StorageBuffer
                | DescriptorType::StorageBufferDynamic
        );
        let count = reqs
            .descriptor_count
            .map_or(layout_binding.descriptor_count, |count| {
                count.min(layout_binding.descriptor_count)
            });

        for index in 0..count as usize {
            if !binding_resources.is_written(index) {
                if !layout_binding.skips_draw_validation() {
                    errors.push(Box::new(ValidationError {
                        problem: format!(
                            "the bound pipeline uses descriptor set {} binding {} array element \
                            {}, but the descriptor has not been written",
                            set_num, binding_num, index,
                        )
                        .into(),
                        vuids: vuids.descriptor_written,
                        kind: Some(ViolationKind::DescriptorNotWritten),
                        ..Default::default()
                    }));
                }

                continue;
            }

            let context = || {
                format!(
                    "descriptor set {} binding {} index {}",
                    set_num, binding_num, index,
                )
            };
            let protected_write_vuids = if writes { vuids.protected_write } else { &[] };

            match binding_resources {
                DescriptorBindingResources::ImageView(elements) => {
                    if let Some(image_view) = elements.get(index).and_then(Option::as_ref) {
                        validate_image_view_descriptor(
                            image_view,
                            descriptor_type,
                            reqs,
                            vuids,
                            &context,
                            errors,
                        );
                        errors.check(
                            validate_protected_access(
                                command_buffer_protected,
                                image_view.image().is_protected(),
                                "image view",
                                vuids.protected,
                                protected_write_vuids,
                            )
                            .map_err(|err| err.add_context(context())),
                        );
                    }
                }
                DescriptorBindingResources::ImageViewSampler(elements) => {
                    if let Some((image_view, _)) = elements.get(index).and_then(Option::as_ref) {
                        validate_image_view_descriptor(
                            image_view,
                            descriptor_type,
                            reqs,
                            vuids,
                            &context,
                            errors,
                        );
                        errors.check(
                            validate_protected_access(
                                command_buffer_protected,
                                image_view.image().is_protected(),
                                "image view",
                                vuids.protected,
                                &[],
                            )
                            .map_err(|err| err.add_context(context())),
                        );
                    }
                }
                DescriptorBindingResources::BufferView(elements) => {
                    if let Some(buffer_view) = elements.get(index).and_then(Option::as_ref) {
                        if reqs.storage_texel_buffer_atomic
                            && descriptor_type == DescriptorType::StorageTexelBuffer
                            && !buffer_view
                                .format_features()
                                .intersects(FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC)
                        {
                            errors.push(Box::new(ValidationError {
                                context: context().into(),
                                problem: format!(
                                    "the bound pipeline performs atomic operations on the \
                                    buffer view, but the format features of its format ({:?}) \
                                    do not include `FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC`",
                                    buffer_view.format(),
                                )
                                .into(),
                                vuids: vuids.texel_buffer_atomic,
                                kind: Some(ViolationKind::MissingAtomicFormatFeatureViolation),
                                ..Default::default()
                            }));
                        }

                        errors.check(
                            validate_protected_access(
                                command_buffer_protected,
                                buffer_view.buffer().is_protected(),
                                "buffer view",
                                vuids.protected,
                                protected_write_vuids,
                            )
                            .map_err(|err| err.add_context(context())),
                        );
                    }
                }
                DescriptorBindingResources::Buffer(elements) => {
                    if let Some(buffer_info) = elements.get(index).and_then(Option::as_ref) {
                        errors.check(
                            validate_protected_access(
                                command_buffer_protected,
                                buffer_info.buffer.is_protected(),
                                "buffer",
                                vuids.protected,
                                protected_write_vuids,
                            )
                            .map_err(|err| err.add_context(context())),
                        );
                    }
                }
                DescriptorBindingResources::Sampler(_) => (),
            }
        }
    }

}

fn validate_image_view_descriptor(
    image_view: &ImageView,
    descriptor_type: DescriptorType,
    reqs: &DescriptorBindingRequirements,
    vuids: &PipelineCommandVuids,
    context: &dyn Fn() -> String,
    errors: &mut ValidationErrors,
) {
    if let Some(required) = reqs.image_view_type {
        if image_view.view_type() != required {
            errors.push(Box::new(ValidationError {
                context: context().into(),
                problem: format!(
                    "the bound pipeline requires an image view of type `{:?}`, but the view type \
                    of the image view is `{:?}`",
                    required,
                    image_view.view_type(),
                )
                .into(),
                vuids: vuids.view_type,
                kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                ..Default::default()
            }));
        }
    }

    let multisampled = image_view.samples() != SampleCount::Sample1;

    if reqs.image_multisampled != multisampled {
        errors.push(Box::new(ValidationError {
            context: context().into(),
            problem: if reqs.image_multisampled {
                "the bound pipeline requires a multisampled image, but the image view has one \
                sample"
            } else {
                "the bound pipeline requires a single-sampled image, but the image view is \
                multisampled"
            }
            .into(),
            vuids: vuids.multisampled,
            kind: Some(ViolationKind::ImageMultisampleMismatchViolation),
            ..Default::default()
        }));
    }

    if let (Some(required), Some(actual)) = (
        reqs.image_scalar_type,
        image_view.format().numeric_format_color(),
    ) {
        if required.shader_type() != actual.shader_type() {
            errors.push(Box::new(ValidationError {
                context: context().into(),
                problem: format!(
                    "the bound pipeline reads the image as `{:?}`, but the numeric type of the \
                    format of the image view is `{:?}`",
                    required, actual,
                )
                .into(),
                vuids: vuids.scalar_type,
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }
    }

    if reqs.storage_image_atomic
        && descriptor_type == DescriptorType::StorageImage
        && !image_view
            .format_features()
            .intersects(FormatFeatures::STORAGE_IMAGE_ATOMIC)
    {
        errors.push(Box::new(ValidationError {
            context: context().into(),
            problem: format!(
                "the bound pipeline performs atomic operations on the image view, but the \
                format features of its format ({:?}) do not include \
                `FormatFeatures::STORAGE_IMAGE_ATOMIC`",
                image_view.format(),
            )
            .into(),
            vuids: vuids.image_atomic,
            kind: Some(ViolationKind::MissingAtomicFormatFeatureViolation),
            ..Default::default()
        }));
    }
}

/// Checks that every push constant byte that the pipeline reads has been written, with a
/// pipeline layout whose push constant ranges are the same as the pipeline's.
fn validate_push_constants(
    builder_state: &CommandBufferBuilderState,
    pipeline: &dyn Pipeline,
    vuids: &PipelineCommandVuids,
    errors: &mut ValidationErrors,
) {
    let requirements = pipeline.push_constant_requirements();

    if requirements.is_empty() {
        return;
    }

    let compatible = builder_state
        .push_constants_pipeline_layout
        .as_ref()
        .is_some_and(|layout| {
            layout.push_constant_ranges() == pipeline.layout().push_constant_ranges()
        });

    for (stage, range) in requirements {
        let is_set = compatible
            && builder_state
                .push_constants
                .get(stage)
                .is_some_and(|set| set.contains(range.clone()));

        if !is_set {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "the `{:?}` stage of the bound pipeline reads push constant bytes {:?}, but \
                    not all of them have been written since the last incompatible pipeline \
                    layout was used",
                    stage, range,
                )
                .into(),
                vuids: vuids.push_constants,
                kind: Some(ViolationKind::PushConstantRangeNotSetViolation),
                ..Default::default()
            }));
        }
    }
}

fn validate_vertex_input(
    builder_state: &CommandBufferBuilderState,
    pipeline: &GraphicsPipeline,
    range: VertexRange,
    binding_vuids: &'static [&'static str],
    bounds_vuids: &'static [&'static str],
    errors: &mut ValidationErrors,
) {
    let vertex_input_state = pipeline.vertex_input_state();
    let mut attributes: Vec<_> = vertex_input_state.attributes.iter().collect();
    attributes.sort_unstable_by_key(|&(&location, _)| location);
    let mut missing_bindings = HashSet::default();

    for (&location, attribute) in attributes {
        let Some(vertex_buffer) = builder_state.vertex_buffers.get(&attribute.binding) else {
            if missing_bindings.insert(attribute.binding) {
                errors.push(Box::new(ValidationError {
                    problem: format!(
                        "the bound pipeline reads vertex input binding {}, but no vertex buffer \
                        is bound to it",
                        attribute.binding,
                    )
                    .into(),
                    vuids: binding_vuids,
                    kind: Some(ViolationKind::VertexBindingNotSetViolation),
                    ..Default::default()
                }));
            }

            continue;
        };

        let Some(binding) = vertex_input_state.bindings.get(&attribute.binding) else {
            continue;
        };

        let alignment = attribute.required_alignment();
        let stride = binding.stride as DeviceSize;
        let attribute_offset = vertex_buffer.offset + attribute.offset as DeviceSize;

        if attribute_offset % alignment != 0 || stride % alignment != 0 {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "the address of vertex attribute {} (offset {} in the buffer, stride {}) is \
                    not aligned to the component size of its format `{:?}` ({} bytes)",
                    location, attribute_offset, stride, attribute.format, alignment,
                )
                .into(),
                vuids: &["UNASSIGNED-CoreValidation-DrawState-InvalidVtxAttributeAlignment"],
                kind: Some(ViolationKind::VertexAttributeAlignmentViolation),
                ..Default::default()
            }));
        }

        let index = match binding.input_rate {
            VertexInputRate::Vertex => range.last_vertex,
            VertexInputRate::Instance => range.last_instance,
        }
        .unwrap_or(0) as DeviceSize;
        let end = attribute_offset + index * stride + attribute.format.block_size();

        if end > vertex_buffer.buffer.size() {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "vertex attribute {} reads up to byte {} of the buffer bound to binding {}, \
                    but the buffer is only {} bytes",
                    location,
                    end,
                    attribute.binding,
                    vertex_buffer.buffer.size(),
                )
                .into(),
                vuids: bounds_vuids,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }
    }
}

fn validate_multiview_instance_index(
    device: &Device,
    builder_state: &CommandBufferBuilderState,
    first_instance: u32,
    instance_count: u32,
    vuids: &'static [&'static str],
    errors: &mut ValidationErrors,
) {
    let Some(render_pass_state) = &builder_state.render_pass else {
        return;
    };

    if render_pass_state.rendering_info.view_mask == 0 {
        return;
    }

    let Some(last_instance) = (instance_count != 0)
        .then(|| first_instance as u64 + instance_count as u64 - 1)
    else {
        return;
    };

    let max = device.properties().max_multiview_instance_index;

    if last_instance > max as u64 {
        errors.push(Box::new(ValidationError {
            problem: format!(
                "multiview is active, and `first_instance + instance_count - 1` ({}) is greater \
                than the `max_multiview_instance_index` limit ({})",
                last_instance, max,
            )
            .into(),
            vuids,
            kind: Some(ViolationKind::MultiviewInstanceIndexViolation),
            ..Default::default()
        }));
    }
}

fn indirect_usage_kind(err: Box<ValidationError>) -> Box<ValidationError> {
    if err.kind == Some(ViolationKind::MissingUsage) {
        err.set_kind(ViolationKind::IndirectBufferUsageViolation)
    } else {
        err
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_indirect_buffer(
    device: &Device,
    command_buffer_protected: bool,
    buffer: &Buffer,
    offset: DeviceSize,
    draw_count: u32,
    stride: u32,
    command_size: u32,
    vuids: &IndirectVuids,
    errors: &mut ValidationErrors,
) {
    errors.check(
        buffer
            .validate_use(BufferUsage::INDIRECT_BUFFER, vuids.usage, vuids.memory)
            .map_err(|err| indirect_usage_kind(err).add_context("indirect_buffer")),
    );

    if command_buffer_protected {
        errors.push(Box::new(ValidationError {
            context: "self".into(),
            problem: "is a protected command buffer, but indirect commands read their \
                parameters from memory"
                .into(),
            vuids: vuids.protected,
            kind: Some(ViolationKind::ProtectedResourceMismatch),
            ..Default::default()
        }));
    }

    if offset % 4 != 0 {
        errors.push(Box::new(ValidationError {
            context: "offset".into(),
            problem: "is not a multiple of 4".into(),
            vuids: vuids.offset,
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if !vuids.multi_draw.is_empty() {
        if draw_count > 1 && !device.enabled_features().multi_draw_indirect {
            errors.push(Box::new(ValidationError {
                context: "draw_count".into(),
                problem: "is greater than 1".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multi_draw_indirect",
                )])]),
                vuids: vuids.multi_draw,
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        if draw_count > device.properties().max_draw_indirect_count {
            errors.push(Box::new(ValidationError {
                context: "draw_count".into(),
                problem: "is greater than the `max_draw_indirect_count` limit".into(),
                vuids: vuids.max_draw_count,
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }
    }

    if !vuids.stride.is_empty() && draw_count > 1 && (stride % 4 != 0 || stride < command_size) {
        errors.push(Box::new(ValidationError {
            context: "stride".into(),
            problem: format!(
                "is not a multiple of 4, or is less than the size of one indirect command ({})",
                command_size,
            )
            .into(),
            vuids: vuids.stride,
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if draw_count == 0 {
        return;
    }

    let end = offset
        + (draw_count as DeviceSize - 1) * stride as DeviceSize
        + command_size as DeviceSize;

    if end > buffer.size() {
        errors.push(Box::new(ValidationError {
            problem: format!(
                "the indirect commands read up to byte {} of `indirect_buffer`, but the buffer is \
                only {} bytes",
                end,
                buffer.size(),
            )
            .into(),
            vuids: if draw_count == 1 {
                vuids.single_range
            } else {
                vuids.multi_range
            },
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }
}

/// Records the texel fetches of the pipeline, with the descriptor sets bound for it, for the
/// GPU-assisted checker.
fn instrument(
    device: &Device,
    inner: &mut CommandBufferInner,
    pipeline: &dyn Pipeline,
    command_name: &'static str,
    workload: Workload,
) {
    if !device.settings().gpu_assisted || pipeline.texel_accesses().is_empty() {
        return;
    }

    let descriptor_sets = inner
        .builder_state
        .descriptor_sets
        .get(&pipeline.bind_point())
        .map(|state| {
            state
                .descriptor_sets
                .iter()
                .map(|(&set_num, bound)| {
                    (set_num, (bound.set.clone(), bound.dynamic_offsets.clone()))
                })
                .collect()
        })
        .unwrap_or_default();

    inner.instrumented.push(InstrumentedCommand {
        command_name,
        accesses: pipeline.texel_accesses().to_vec(),
        descriptor_sets,
        workload,
    });
}

#[cfg(test)]
mod tests {
    use crate::{
        buffer::{BufferUsage, IndexType},
        command_buffer::{PushConstantsInfo, RenderPassBeginInfo, SubpassContents},
        descriptor_set::{
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
                DescriptorType,
            },
            pool::{DescriptorPool, DescriptorPoolCreateInfo},
            DescriptorSet, WriteDescriptorSet,
        },
        device::Device,
        format::Format,
        image::{view::ImageView, Image, ImageCreateInfo, ImageUsage, ImageViewType, SampleCount},
        memory::{DeviceMemory, MemoryAllocateInfo, MemoryPropertyFlags},
        pipeline::{
            graphics::GraphicsPipelineCreateInfo,
            layout::{PipelineLayoutCreateInfo, PushConstantRange},
            vertex_input::{
                VertexInputAttributeDescription, VertexInputBindingDescription, VertexInputRate,
                VertexInputState,
            },
            DynamicState, PipelineBindPoint,
        },
        render_pass::{RenderPass, Subpass},
        shader::{DescriptorBindingRequirements, EntryPointInfo, ShaderStage, ShaderStages},
        ViolationKind,
    };
    use std::{collections::BTreeMap, sync::Arc};

    fn begin_render_pass(
        device: &Arc<Device>,
        render_pass: &Arc<RenderPass>,
        layers: u32,
    ) -> Arc<crate::command_buffer::CommandBuffer> {
        let framebuffer = crate::tests::framebuffer(render_pass, layers);
        let cb = crate::tests::primary(device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();

        cb
    }

    fn subpass_create_info(
        render_pass: &Arc<RenderPass>,
        layout: Arc<crate::pipeline::layout::PipelineLayout>,
    ) -> GraphicsPipelineCreateInfo {
        GraphicsPipelineCreateInfo {
            subpass: Some(Subpass::from(render_pass.clone(), 0).unwrap().into()),
            ..GraphicsPipelineCreateInfo::layout(layout)
        }
    }

    fn vertex_and_fragment() -> Vec<EntryPointInfo> {
        vec![
            EntryPointInfo::new(ShaderStage::Vertex),
            EntryPointInfo::new(ShaderStage::Fragment),
        ]
    }

    #[test]
    fn draw_without_pipeline() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let cb = begin_render_pass(&device, &render_pass, 1);

        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-None-08606"));
        assert!(errors.contains_kind(ViolationKind::PipelineNotBound));
    }

    #[test]
    fn draw_outside_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-renderpass"));
        assert!(errors.contains_kind(ViolationKind::RenderPassScopeViolation));
    }

    #[test]
    fn dynamic_state_not_set() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let layout = crate::tests::pipeline_layout(&device, Default::default());
        let dynamic_pipeline = crate::tests::graphics_pipeline(
            vertex_and_fragment(),
            GraphicsPipelineCreateInfo {
                dynamic_state: [DynamicState::LineWidth].into_iter().collect(),
                ..subpass_create_info(&render_pass, layout)
            },
        );
        let static_pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let cb = begin_render_pass(&device, &render_pass, 1);

        cb.bind_pipeline_graphics(&dynamic_pipeline).unwrap();
        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-None-07833"));
        assert!(errors.contains_kind(ViolationKind::DynamicStateNotSetViolation));

        cb.set_line_width(1.0).unwrap();
        cb.draw(3, 1, 0, 0).unwrap();

        // A pipeline with a static line width makes the dynamic value stale.
        cb.bind_pipeline_graphics(&static_pipeline).unwrap();
        cb.draw(3, 1, 0, 0).unwrap();
        cb.bind_pipeline_graphics(&dynamic_pipeline).unwrap();
        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-None-07833"));
    }

    #[test]
    fn push_constant_bytes() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
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
        let pipeline = crate::tests::graphics_pipeline(
            vec![
                EntryPointInfo {
                    push_constant_requirements: Some(PushConstantRange {
                        stages: ShaderStages::VERTEX,
                        offset: 32,
                        size: 48,
                    }),
                    ..EntryPointInfo::new(ShaderStage::Vertex)
                },
                EntryPointInfo {
                    push_constant_requirements: Some(PushConstantRange {
                        stages: ShaderStages::FRAGMENT,
                        offset: 0,
                        size: 16,
                    }),
                    ..EntryPointInfo::new(ShaderStage::Fragment)
                },
            ],
            subpass_create_info(&render_pass, layout.clone()),
        );
        let cb = begin_render_pass(&device, &render_pass, 1);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        // Bytes 48..80 that the vertex shader reads are not written.
        cb.push_constants(
            PushConstantsInfo {
                stages: ShaderStages::VERTEX,
                offset: 32,
                ..PushConstantsInfo::layout(layout.clone())
            },
            &[0u32; 4],
        )
        .unwrap();
        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert_eq!(errors.count_vuid("VUID-vkCmdDraw-maintenance4-08602"), 2);
        assert!(errors.contains_kind(ViolationKind::PushConstantRangeNotSetViolation));

        cb.push_constants(
            PushConstantsInfo {
                stages: ShaderStages::VERTEX,
                offset: 32,
                ..PushConstantsInfo::layout(layout.clone())
            },
            &[0u32; 12],
        )
        .unwrap();
        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert_eq!(errors.count_vuid("VUID-vkCmdDraw-maintenance4-08602"), 1);

        cb.push_constants(
            PushConstantsInfo {
                stages: ShaderStages::FRAGMENT,
                offset: 0,
                ..PushConstantsInfo::layout(layout)
            },
            &[0u32; 4],
        )
        .unwrap();
        cb.draw(3, 1, 0, 0).unwrap();
    }

    #[test]
    fn vertex_buffers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let layout = crate::tests::pipeline_layout(&device, Default::default());
        let pipeline = crate::tests::graphics_pipeline(
            vec![
                EntryPointInfo {
                    input_locations: vec![0],
                    ..EntryPointInfo::new(ShaderStage::Vertex)
                },
                EntryPointInfo::new(ShaderStage::Fragment),
            ],
            GraphicsPipelineCreateInfo {
                vertex_input_state: VertexInputState::new()
                    .binding(
                        0,
                        VertexInputBindingDescription {
                            stride: 16,
                            input_rate: VertexInputRate::Vertex,
                        },
                    )
                    .attribute(
                        0,
                        VertexInputAttributeDescription {
                            binding: 0,
                            format: Format::R32G32B32A32_SFLOAT,
                            offset: 0,
                        },
                    ),
                ..subpass_create_info(&render_pass, layout)
            },
        );
        let vertex_buffer = crate::tests::buffer(&device, 64, BufferUsage::VERTEX_BUFFER);
        let cb = begin_render_pass(&device, &render_pass, 1);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        let errors = cb.draw(4, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-None-04007"));
        assert!(errors.contains_kind(ViolationKind::VertexBindingNotSetViolation));

        cb.bind_vertex_buffers(0, &[(vertex_buffer.clone(), 0)])
            .unwrap();
        cb.draw(4, 1, 0, 0).unwrap();

        let errors = cb.draw(5, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-None-02721"));

        cb.bind_vertex_buffers(0, &[(vertex_buffer, 2)]).unwrap();
        let errors = cb.draw(1, 1, 0, 0).unwrap_err();
        assert!(errors.contains_kind(ViolationKind::VertexAttributeAlignmentViolation));
    }

    #[test]
    fn index_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let index_buffer = crate::tests::buffer(&device, 64, BufferUsage::INDEX_BUFFER);
        let cb = begin_render_pass(&device, &render_pass, 1);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        let errors = cb.draw_indexed(3, 1, 0, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndexed-None-07312"));
        assert!(errors.contains_kind(ViolationKind::IndexBufferNotBound));

        cb.bind_index_buffer(&index_buffer, 0, IndexType::U16)
            .unwrap();
        cb.draw_indexed(32, 1, 0, 0, 0).unwrap();

        let errors = cb.draw_indexed(32, 1, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndexed-robustBufferAccess2-08798"));
    }

    #[test]
    fn indirect_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let indirect = crate::tests::buffer(&device, 64, BufferUsage::INDIRECT_BUFFER);
        let not_indirect = crate::tests::buffer(&device, 64, BufferUsage::VERTEX_BUFFER);
        let cb = begin_render_pass(&device, &render_pass, 1);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        cb.draw_indirect(&indirect, 0, 4, 16).unwrap();

        let errors = cb.draw_indirect(&not_indirect, 0, 1, 16).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndirect-buffer-02709"));
        assert!(errors.contains_kind(ViolationKind::IndirectBufferUsageViolation));

        let errors = cb.draw_indirect(&indirect, 2, 1, 16).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndirect-offset-02710"));

        let errors = cb.draw_indirect(&indirect, 0, 5, 16).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndirect-drawCount-00488"));

        let errors = cb.draw_indirect(&indirect, 0, 2, 8).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDrawIndirect-drawCount-00476"));
    }

    #[test]
    fn multiview_instance_index() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0b11);
        let pipeline = crate::tests::simple_graphics_pipeline(&render_pass);
        let max = device.properties().max_multiview_instance_index;
        let cb = begin_render_pass(&device, &render_pass, 2);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        cb.draw(3, 1, 0, max).unwrap();

        let errors = cb.draw(3, 2, 0, max).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-maxMultiviewInstanceIndex-02688"));
        assert!(errors.contains_kind(ViolationKind::MultiviewInstanceIndexViolation));
    }

    #[test]
    fn incompatible_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let other_render_pass =
            crate::tests::single_color_render_pass(&device, Format::B8G8R8A8_UNORM, 0);
        let pipeline = crate::tests::simple_graphics_pipeline(&other_render_pass);
        let cb = begin_render_pass(&device, &render_pass, 1);
        cb.bind_pipeline_graphics(&pipeline).unwrap();

        let errors = cb.draw(3, 1, 0, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDraw-renderPass-02684"));
        assert!(errors.contains_kind(ViolationKind::IncompatibleRenderPassViolation));
    }

    #[test]
    fn dispatch_limits() {
        let (device, _queue) = gfx_dev_and_queue!();
        let layout = crate::tests::pipeline_layout(&device, Default::default());
        let pipeline =
            crate::tests::compute_pipeline(layout, EntryPointInfo::new(ShaderStage::Compute));
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.dispatch([1, 1, 1]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-None-08606"));

        cb.bind_pipeline_compute(&pipeline).unwrap();
        cb.dispatch([1, 1, 1]).unwrap();

        let errors = cb.dispatch([65536, 1, 1]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-groupCountX-00386"));
        assert!(errors.contains_kind(ViolationKind::LimitExceeded));
    }

    /// A pipeline layout with one set of a single binding at binding 0, and a set of that layout.
    fn single_binding_set(
        device: &Arc<Device>,
        stages: ShaderStages,
        descriptor_type: DescriptorType,
        writes: Vec<WriteDescriptorSet>,
    ) -> (Arc<crate::pipeline::layout::PipelineLayout>, Arc<DescriptorSet>) {
        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        stages,
                        ..DescriptorSetLayoutBinding::descriptor_type(descriptor_type)
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
                pool_sizes: [(descriptor_type, 1)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap();
        let set = DescriptorSet::new(pool, set_layout.clone(), writes).unwrap();
        let layout = crate::tests::pipeline_layout(
            device,
            PipelineLayoutCreateInfo {
                set_layouts: vec![set_layout],
                ..Default::default()
            },
        );

        (layout, set)
    }

    /// A compute pipeline reading descriptor set 0 binding 0, with a set of that layout.
    fn compute_with_descriptor(
        device: &Arc<Device>,
        requirements: DescriptorBindingRequirements,
        writes: Vec<WriteDescriptorSet>,
    ) -> (
        Arc<crate::pipeline::compute::ComputePipeline>,
        Arc<crate::pipeline::layout::PipelineLayout>,
        Arc<DescriptorSet>,
    ) {
        let (layout, set) = single_binding_set(
            device,
            ShaderStages::COMPUTE,
            requirements.descriptor_types[0],
            writes,
        );
        let pipeline = crate::tests::compute_pipeline(
            layout.clone(),
            EntryPointInfo {
                descriptor_binding_requirements: [((0, 0), requirements)].into_iter().collect(),
                ..EntryPointInfo::new(ShaderStage::Compute)
            },
        );

        (pipeline, layout, set)
    }

    fn sampled_view(device: &Arc<Device>, samples: SampleCount) -> Arc<ImageView> {
        let image = Image::new(
            device.clone(),
            ImageCreateInfo {
                format: Format::R8G8B8A8_UNORM,
                extent: [16, 16, 1],
                samples,
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap();
        let memory = DeviceMemory::allocate(
            device.clone(),
            MemoryAllocateInfo {
                allocation_size: image.memory_size(),
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                ..Default::default()
            },
        )
        .unwrap();
        image.bind_memory(memory, 0).unwrap();

        ImageView::new_default(image).unwrap()
    }

    #[test]
    fn descriptor_sets_bound_and_written() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (pipeline, layout, set) = compute_with_descriptor(
            &device,
            DescriptorBindingRequirements::new(DescriptorType::UniformBuffer),
            Vec::new(),
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.bind_pipeline_compute(&pipeline).unwrap();

        let errors = cb.dispatch([1, 1, 1]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-None-08600"));
        assert!(errors.contains_kind(ViolationKind::DescriptorSetNotBoundViolation));

        cb.bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set], &[])
            .unwrap();
        let errors = cb.dispatch([1, 1, 1]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-None-08114"));
        assert!(errors.contains_kind(ViolationKind::DescriptorNotWritten));
    }

    #[test]
    fn storage_image_view_type_and_atomics() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::STORAGE,
        );
        let view = ImageView::new_default(image).unwrap();
        let (pipeline, layout, set) = compute_with_descriptor(
            &device,
            DescriptorBindingRequirements {
                image_view_type: Some(ImageViewType::Dim2dArray),
                storage_image_atomic: true,
                ..DescriptorBindingRequirements::new(DescriptorType::StorageImage)
            },
            vec![WriteDescriptorSet::image_view(0, view)],
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.bind_pipeline_compute(&pipeline).unwrap();
        cb.bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set], &[])
            .unwrap();

        let errors = cb.dispatch([1, 1, 1]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-viewType-07752"));
        assert!(errors.contains_kind(ViolationKind::ImageViewTypeMismatchViolation));
        assert!(errors.contains_vuid("VUID-vkCmdDispatch-None-02691"));
        assert!(errors.contains_kind(ViolationKind::MissingAtomicFormatFeatureViolation));
    }

    #[test]
    fn dispatch_multisampled_image_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();

        for (image_samples, image_multisampled) in
            [(SampleCount::Sample4, false), (SampleCount::Sample1, true)]
        {
            let view = sampled_view(&device, image_samples);
            let (pipeline, layout, set) = compute_with_descriptor(
                &device,
                DescriptorBindingRequirements {
                    image_multisampled,
                    ..DescriptorBindingRequirements::new(DescriptorType::SampledImage)
                },
                vec![WriteDescriptorSet::image_view(0, view)],
            );
            let cb = crate::tests::primary(&device);
            cb.begin(Default::default()).unwrap();
            cb.bind_pipeline_compute(&pipeline).unwrap();
            cb.bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set], &[])
                .unwrap();

            let errors = cb.dispatch([1, 1, 1]).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert!(errors.contains_vuid("UNASSIGNED-vkCmdDispatch-multisampled-image"));
            assert!(errors.contains_kind(ViolationKind::ImageMultisampleMismatchViolation));
        }

        let view = sampled_view(&device, SampleCount::Sample4);
        let (pipeline, layout, set) = compute_with_descriptor(
            &device,
            DescriptorBindingRequirements {
                image_multisampled: true,
                ..DescriptorBindingRequirements::new(DescriptorType::SampledImage)
            },
            vec![WriteDescriptorSet::image_view(0, view)],
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.bind_pipeline_compute(&pipeline).unwrap();
        cb.bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set], &[])
            .unwrap();
        cb.dispatch([1, 1, 1]).unwrap();
    }

    #[test]
    fn draw_multisampled_image_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);

        for (image_samples, image_multisampled) in
            [(SampleCount::Sample4, false), (SampleCount::Sample1, true)]
        {
            let view = sampled_view(&device, image_samples);
            let (layout, set) = single_binding_set(
                &device,
                ShaderStages::FRAGMENT,
                DescriptorType::SampledImage,
                vec![WriteDescriptorSet::image_view(0, view)],
            );
            let requirements = DescriptorBindingRequirements {
                image_multisampled,
                ..DescriptorBindingRequirements::new(DescriptorType::SampledImage)
            };
            let pipeline = crate::tests::graphics_pipeline(
                vec![
                    EntryPointInfo::new(ShaderStage::Vertex),
                    EntryPointInfo {
                        descriptor_binding_requirements: [((0, 0), requirements)]
                            .into_iter()
                            .collect(),
                        ..EntryPointInfo::new(ShaderStage::Fragment)
                    },
                ],
                subpass_create_info(&render_pass, layout.clone()),
            );
            let cb = begin_render_pass(&device, &render_pass, 1);
            cb.bind_pipeline_graphics(&pipeline).unwrap();
            cb.bind_descriptor_sets(PipelineBindPoint::Graphics, &layout, 0, &[set], &[])
                .unwrap();

            let errors = cb.draw(3, 1, 0, 0).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert!(errors.contains_vuid("UNASSIGNED-vkCmdDraw-multisampled-image"));
            assert!(errors.contains_kind(ViolationKind::ImageMultisampleMismatchViolation));
        }
    }
}
