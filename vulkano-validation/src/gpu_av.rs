// Copyright (c) 2023 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The GPU-assisted checker.
//!
//! Some errors depend on values that only exist when the work executes, such as a texel index
//! that a shader reads from a buffer. When [`ValidationSettings::gpu_assisted`] is enabled, draw
//! and dispatch commands whose pipeline performs [texel fetches](crate::shader::TexelAccess)
//! are recorded together with the descriptor sets bound for them. When the command buffer is
//! submitted, the fetches are evaluated against the resources as they are at that moment, and
//! every out-of-bounds fetch is reported when the queue is waited on with
//! [`Queue::wait_idle`].
//!
//! One error is reported for every invocation that fetches out of bounds, so the number of
//! errors equals the number of invalid fetches that the work performs.
//!
//! [`ValidationSettings::gpu_assisted`]: crate::device::ValidationSettings::gpu_assisted
//! [`Queue::wait_idle`]: crate::device::queue::Queue::wait_idle

use crate::{
    buffer::Buffer,
    descriptor_set::{DescriptorBindingResources, DescriptorSet},
    shader::{ShaderStage, TexelAccess, TexelIndex},
    DeviceSize, ValidationError, ValidationErrors, ViolationKind,
};
use foldhash::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

const TEXEL_OUT_OF_BOUNDS_VUIDS: &[&str] =
    &["UNASSIGNED-Descriptor Texel Buffer texel out of bounds"];

/// A draw or dispatch command whose texel fetches are checked when it executes.
#[derive(Clone, Debug)]
pub(crate) struct InstrumentedCommand {
    pub(crate) command_name: &'static str,
    pub(crate) accesses: Vec<(ShaderStage, TexelAccess)>,
    /// The descriptor sets bound for the pipeline, and their dynamic offsets.
    pub(crate) descriptor_sets: HashMap<u32, (Arc<DescriptorSet>, SmallVec<[u32; 4]>)>,
    pub(crate) workload: Workload,
}

/// The amount of work that a command performs. Parameters of indirect commands are read from
/// their buffers when the command executes.
#[derive(Clone, Debug)]
pub(crate) enum Workload {
    Dispatch {
        group_counts: [u32; 3],
    },
    DispatchIndirect {
        buffer: Arc<Buffer>,
        offset: DeviceSize,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    /// Indexed and non-indexed indirect draws. Both command layouts start with the vertex or
    /// index count, followed by the instance count.
    DrawIndirect {
        buffer: Arc<Buffer>,
        offset: DeviceSize,
        stride: u32,
        draw_count: DrawCount,
    },
}

#[derive(Clone, Debug)]
pub(crate) enum DrawCount {
    Direct(u32),
    Buffer {
        buffer: Arc<Buffer>,
        offset: DeviceSize,
        max_draw_count: u32,
    },
}

/// How many units of work of each kind a command executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Executed {
    workgroups: u64,
    vertices: u64,
    instances: u64,
}

impl Executed {
    fn dispatch(group_counts: [u32; 3]) -> Self {
        Executed {
            workgroups: group_counts
                .into_iter()
                .fold(1u64, |total, count| total.saturating_mul(count as u64)),
            ..Default::default()
        }
    }

    /// Adds `times` draws of `vertex_count` vertices and `instance_count` instances.
    fn add_draws(&mut self, vertex_count: u32, instance_count: u32, times: u64) {
        if vertex_count == 0 || instance_count == 0 {
            return;
        }

        let instances = (instance_count as u64).saturating_mul(times);
        self.instances = self.instances.saturating_add(instances);
        self.vertices = self
            .vertices
            .saturating_add((vertex_count as u64).saturating_mul(instances));
    }

    fn units(&self, stage: ShaderStage) -> u64 {
        match stage {
            ShaderStage::Compute => self.workgroups,
            ShaderStage::Vertex => self.vertices,
            _ => self.instances,
        }
    }
}

impl Workload {
    /// Returns the work that the command performs, or `None` if its parameters could not be
    /// read.
    fn resolve(&self) -> Option<Executed> {
        match *self {
            Workload::Dispatch { group_counts } => Some(Executed::dispatch(group_counts)),
            Workload::DispatchIndirect { ref buffer, offset } => Some(Executed::dispatch([
                buffer.read_u32(offset)?,
                buffer.read_u32(offset + 4)?,
                buffer.read_u32(offset + 8)?,
            ])),
            Workload::Draw {
                vertex_count,
                instance_count,
            } => {
                let mut executed = Executed::default();
                executed.add_draws(vertex_count, instance_count, 1);
                Some(executed)
            }
            Workload::DrawIndirect {
                ref buffer,
                offset,
                stride,
                ref draw_count,
            } => {
                let draw_count = match *draw_count {
                    DrawCount::Direct(count) => count,
                    DrawCount::Buffer {
                        ref buffer,
                        offset,
                        max_draw_count,
                    } => buffer.read_u32(offset)?.min(max_draw_count),
                };
                let mut executed = Executed::default();

                if stride == 0 {
                    if draw_count != 0 {
                        executed.add_draws(
                            buffer.read_u32(offset)?,
                            buffer.read_u32(offset + 4)?,
                            draw_count as u64,
                        );
                    }
                } else {
                    for draw in 0..draw_count as DeviceSize {
                        let base = offset + draw * stride as DeviceSize;
                        executed.add_draws(
                            buffer.read_u32(base)?,
                            buffer.read_u32(base + 4)?,
                            1,
                        );
                    }
                }

                Some(executed)
            }
        }
    }
}

/// The invalid fetches of one texel access. Occurrence `k` fetched texel
/// `first_index + k * step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OutOfBounds {
    first_index: DeviceSize,
    step: DeviceSize,
    count: u64,
}

/// Executes the instrumented commands of one submitted command buffer, in order, and returns
/// an error for every out-of-bounds texel fetch, recording at most `max_errors` errors for each
/// access of each command.
pub(crate) fn execute(commands: &[InstrumentedCommand], max_errors: u32) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for command in commands {
        let Some(executed) = command.workload.resolve() else {
            tracing::trace!(
                command = command.command_name,
                "parameters of an indirect command could not be read, command skipped",
            );
            continue;
        };

        for (stage, access) in &command.accesses {
            let fetches = executed.units(*stage).saturating_mul(access.invocations as u64);

            if fetches == 0 {
                continue;
            }

            let Some(texel_count) = resolve_texel_count(command, access) else {
                tracing::trace!(
                    command = command.command_name,
                    set = access.set,
                    binding = access.binding,
                    "texel fetch from an unwritten descriptor skipped",
                );
                continue;
            };

            let Some(out_of_bounds) = out_of_bounds(command, access, fetches, texel_count) else {
                continue;
            };

            tracing::debug!(
                command = command.command_name,
                set = access.set,
                binding = access.binding,
                texel_count,
                fetches,
                total = out_of_bounds.count,
                "out-of-bounds texel fetches detected",
            );

            for occurrence in 0..out_of_bounds.count.min(max_errors as u64) {
                errors.push(Box::new(ValidationError {
                    context: command.command_name.into(),
                    problem: format!(
                        "the {:?} shader fetched texel {} of descriptor set {} binding {} \
                        array element {}, but the buffer view only has {} texels \
                        (occurrence {} of {})",
                        stage,
                        out_of_bounds.first_index + occurrence * out_of_bounds.step,
                        access.set,
                        access.binding,
                        access.array_element,
                        texel_count,
                        occurrence + 1,
                        out_of_bounds.count,
                    )
                    .into(),
                    vuids: TEXEL_OUT_OF_BOUNDS_VUIDS,
                    kind: Some(ViolationKind::TexelBufferOutOfBounds),
                    ..Default::default()
                }));
            }
        }
    }

    errors
}

/// Returns the number of texels of the buffer view that `access` fetches from.
fn resolve_texel_count(command: &InstrumentedCommand, access: &TexelAccess) -> Option<DeviceSize> {
    let (set, _) = command.descriptor_sets.get(&access.set)?;
    let resources = set.resources();

    match resources.binding(access.binding)? {
        DescriptorBindingResources::BufferView(elements) => elements
            .get(access.array_element as usize)?
            .as_ref()
            .map(|buffer_view| buffer_view.texel_count()),
        _ => None,
    }
}

/// Returns the out-of-bounds fetches among the `fetches` fetches of `access`, or `None` if all
/// of them are in bounds.
fn out_of_bounds(
    command: &InstrumentedCommand,
    access: &TexelAccess,
    fetches: u64,
    texel_count: DeviceSize,
) -> Option<OutOfBounds> {
    let uniform_index = |index: DeviceSize| {
        (index >= texel_count).then_some(OutOfBounds {
            first_index: index,
            step: 0,
            count: fetches,
        })
    };

    match access.index {
        TexelIndex::Constant(index) => uniform_index(index as DeviceSize),
        TexelIndex::InvocationId { base } => {
            let in_bounds = texel_count.saturating_sub(base as DeviceSize).min(fetches);

            (in_bounds < fetches).then_some(OutOfBounds {
                first_index: base as DeviceSize + in_bounds,
                step: 1,
                count: fetches - in_bounds,
            })
        }
        TexelIndex::BufferValue {
            set,
            binding,
            offset,
        } => match read_buffer_value(command, set, binding, offset) {
            Some(index) => uniform_index(index as DeviceSize),
            None => {
                tracing::trace!(
                    command = command.command_name,
                    set,
                    binding,
                    offset,
                    "texel index could not be read from its buffer",
                );
                None
            }
        },
    }
}

/// Reads the `u32` at `offset` bytes in the buffer bound to `(set_num, binding_num)`, taking
/// the dynamic offset of the binding into account.
fn read_buffer_value(
    command: &InstrumentedCommand,
    set_num: u32,
    binding_num: u32,
    offset: u32,
) -> Option<u32> {
    let (set, dynamic_offsets) = command.descriptor_sets.get(&set_num)?;
    let layout = set.layout();
    let layout_binding = layout.bindings().get(&binding_num)?;

    let dynamic_offset = if layout_binding.descriptor_type.is_dynamic() {
        // Dynamic offsets are ordered by binding number, then array element.
        let index: u32 = layout
            .bindings()
            .range(..binding_num)
            .filter(|(_, binding)| binding.descriptor_type.is_dynamic())
            .map(|(_, binding)| binding.descriptor_count)
            .sum();

        *dynamic_offsets.get(index as usize)? as DeviceSize
    } else {
        0
    };

    let resources = set.resources();
    let DescriptorBindingResources::Buffer(elements) = resources.binding(binding_num)? else {
        return None;
    };
    let buffer_info = elements.first()?.as_ref()?;

    buffer_info
        .buffer
        .read_u32(buffer_info.range.start + dynamic_offset + offset as DeviceSize)
}

#[cfg(test)]
mod tests {
    use super::{DrawCount, Executed, Workload};
    use crate::{
        buffer::{
            view::{BufferView, BufferViewCreateInfo},
            BufferUsage,
        },
        command_buffer::CommandBuffer,
        descriptor_set::{
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
                DescriptorType,
            },
            pool::{DescriptorPool, DescriptorPoolCreateInfo},
            DescriptorSet, WriteDescriptorSet,
        },
        device::{
            queue::{Queue, SubmitInfo},
            Device, DeviceCreateInfo, DeviceFeatures, ValidationSettings,
        },
        format::Format,
        pipeline::{layout::PipelineLayoutCreateInfo, PipelineBindPoint},
        shader::{
            DescriptorBindingRequirements, EntryPointInfo, ShaderStage, ShaderStages,
            TexelAccess, TexelIndex,
        },
        ValidationErrors, ViolationKind,
    };
    use std::{collections::BTreeMap, sync::Arc};

    const INVOCATIONS: u32 = 8;
    const OUT_OF_BOUNDS: &str = "UNASSIGNED-Descriptor Texel Buffer texel out of bounds";

    fn gpu_assisted_device() -> (Arc<Device>, Arc<Queue>) {
        gpu_assisted_device_with(ValidationSettings {
            gpu_assisted: true,
            ..Default::default()
        })
    }

    fn gpu_assisted_device_with(settings: ValidationSettings) -> (Arc<Device>, Arc<Queue>) {
        let (device, mut queues) = crate::tests::device_and_queues(DeviceCreateInfo {
            enabled_features: DeviceFeatures::all(),
            settings,
            ..Default::default()
        });

        (device, queues.remove(0))
    }

    /// Records a single-group dispatch with the pipeline of [`record_fetch_with`].
    fn record_fetch(
        device: &Arc<Device>,
        index: TexelIndex,
        buffer_value: u32,
    ) -> Arc<CommandBuffer> {
        record_fetch_with(device, index, buffer_value, |cb| cb.dispatch([1, 1, 1]).unwrap())
    }

    /// Binds a compute pipeline whose shader fetches from a uniform texel buffer of 20
    /// `R32G32B32A32_SFLOAT` texels in `INVOCATIONS` invocations of each workgroup, then calls
    /// `dispatch`. Binding 1 holds a uniform buffer whose first `u32` is `buffer_value`.
    fn record_fetch_with(
        device: &Arc<Device>,
        index: TexelIndex,
        buffer_value: u32,
        dispatch: impl FnOnce(&CommandBuffer),
    ) -> Arc<CommandBuffer> {
        let texel_buffer = crate::tests::buffer(device, 320, BufferUsage::UNIFORM_TEXEL_BUFFER);
        let view = BufferView::new(
            texel_buffer,
            BufferViewCreateInfo {
                format: Format::R32G32B32A32_SFLOAT,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(view.texel_count(), 20);

        let value_buffer = crate::tests::buffer(device, 16, BufferUsage::UNIFORM_BUFFER);
        value_buffer.write(0, &buffer_value.to_ne_bytes()).unwrap();

        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: BTreeMap::from([
                    (
                        0,
                        DescriptorSetLayoutBinding {
                            stages: ShaderStages::COMPUTE,
                            ..DescriptorSetLayoutBinding::descriptor_type(
                                DescriptorType::UniformTexelBuffer,
                            )
                        },
                    ),
                    (
                        1,
                        DescriptorSetLayoutBinding {
                            stages: ShaderStages::COMPUTE,
                            ..DescriptorSetLayoutBinding::descriptor_type(
                                DescriptorType::UniformBuffer,
                            )
                        },
                    ),
                ]),
                ..Default::default()
            },
        )
        .unwrap();
        let pool = DescriptorPool::new(
            device.clone(),
            DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: [
                    (DescriptorType::UniformTexelBuffer, 1),
                    (DescriptorType::UniformBuffer, 1),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            },
        )
        .unwrap();
        let set = DescriptorSet::new(
            pool,
            set_layout.clone(),
            [
                WriteDescriptorSet::buffer_view(0, view),
                WriteDescriptorSet::buffer(1, value_buffer),
            ],
        )
        .unwrap();

        let layout = crate::tests::pipeline_layout(
            device,
            PipelineLayoutCreateInfo {
                set_layouts: vec![set_layout],
                ..Default::default()
            },
        );
        let pipeline = crate::tests::compute_pipeline(
            layout.clone(),
            EntryPointInfo {
                descriptor_binding_requirements: [
                    (
                        (0, 0),
                        DescriptorBindingRequirements::new(DescriptorType::UniformTexelBuffer),
                    ),
                    (
                        (0, 1),
                        DescriptorBindingRequirements::new(DescriptorType::UniformBuffer),
                    ),
                ]
                .into_iter()
                .collect(),
                texel_accesses: vec![TexelAccess {
                    set: 0,
                    binding: 0,
                    array_element: 0,
                    index,
                    invocations: INVOCATIONS,
                }],
                ..EntryPointInfo::new(ShaderStage::Compute)
            },
        );

        let cb = crate::tests::primary(device);
        cb.begin(Default::default()).unwrap();
        cb.bind_pipeline_compute(&pipeline).unwrap();
        cb.bind_descriptor_sets(PipelineBindPoint::Compute, &layout, 0, &[set], &[])
            .unwrap();
        dispatch(&cb);
        cb.end().unwrap();

        cb
    }

    fn submit_and_wait(queue: &Queue, cb: Arc<CommandBuffer>) -> Result<(), ValidationErrors> {
        queue.submit(&[SubmitInfo::command_buffers([cb])]).unwrap();
        queue.wait_idle()
    }

    #[test]
    fn one_past_the_end() {
        let (device, queue) = gpu_assisted_device();
        let cb = record_fetch(&device, TexelIndex::Constant(20), 0);

        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.count_vuid(OUT_OF_BOUNDS), INVOCATIONS as usize);
        assert!(errors.contains_kind(ViolationKind::TexelBufferOutOfBounds));
        assert!(errors[0].to_string().contains(&format!("occurrence 1 of {}", INVOCATIONS)));
    }

    #[test]
    fn last_texel() {
        let (device, queue) = gpu_assisted_device();
        let cb = record_fetch(&device, TexelIndex::Constant(19), 0);

        submit_and_wait(&queue, cb).unwrap();
    }

    #[test]
    fn invocation_indices() {
        let (device, queue) = gpu_assisted_device();
        // Invocations 0..8 fetch 16..24, so 4 of them are past the end.
        let cb = record_fetch(&device, TexelIndex::InvocationId { base: 16 }, 0);

        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn index_read_from_buffer() {
        let (device, queue) = gpu_assisted_device();
        let index = TexelIndex::BufferValue {
            set: 0,
            binding: 1,
            offset: 0,
        };

        let cb = record_fetch(&device, index.clone(), 20);
        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.len(), INVOCATIONS as usize);

        let cb = record_fetch(&device, index, 5);
        submit_and_wait(&queue, cb).unwrap();
    }

    #[test]
    fn evaluated_at_each_submit() {
        let (device, queue) = gpu_assisted_device();
        let cb = record_fetch(&device, TexelIndex::Constant(20), 0);

        assert_eq!(submit_and_wait(&queue, cb.clone()).unwrap_err().len(), 8);
        assert_eq!(submit_and_wait(&queue, cb).unwrap_err().len(), 8);
    }

    #[test]
    fn disabled_by_default() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = record_fetch(&device, TexelIndex::Constant(20), 0);

        submit_and_wait(&queue, cb).unwrap();
    }

    #[test]
    fn scales_with_dispatched_groups() {
        let (device, queue) = gpu_assisted_device();

        let cb = record_fetch_with(&device, TexelIndex::Constant(20), 0, |cb| {
            cb.dispatch([0, 1, 1]).unwrap()
        });
        submit_and_wait(&queue, cb).unwrap();

        let cb = record_fetch_with(&device, TexelIndex::Constant(20), 0, |cb| {
            cb.dispatch([4, 1, 1]).unwrap()
        });
        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.count_vuid(OUT_OF_BOUNDS), 4 * INVOCATIONS as usize);
    }

    #[test]
    fn invocation_indices_across_groups() {
        let (device, queue) = gpu_assisted_device();
        // 2 groups of 8 invocations fetch 10..26, so the last 6 are past the end.
        let cb = record_fetch_with(&device, TexelIndex::InvocationId { base: 10 }, 0, |cb| {
            cb.dispatch([2, 1, 1]).unwrap()
        });

        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors[0].to_string().contains("fetched texel 20 "));
        assert!(errors[5].to_string().contains("fetched texel 25 "));
    }

    #[test]
    fn indirect_dispatch_reads_group_counts_at_submit() {
        let (device, queue) = gpu_assisted_device();
        let indirect = crate::tests::buffer(&device, 12, BufferUsage::INDIRECT_BUFFER);
        indirect.write(0, bytemuck::cast_slice(&[2u32, 3, 1])).unwrap();

        let cb = record_fetch_with(&device, TexelIndex::Constant(20), 0, |cb| {
            cb.dispatch_indirect(&indirect, 0).unwrap()
        });
        let errors = submit_and_wait(&queue, cb.clone()).unwrap_err();
        assert_eq!(errors.len(), 6 * INVOCATIONS as usize);

        indirect.write(0, bytemuck::cast_slice(&[0u32, 1, 1])).unwrap();
        submit_and_wait(&queue, cb).unwrap();
    }

    #[test]
    fn error_limit() {
        let (device, queue) = gpu_assisted_device_with(ValidationSettings {
            gpu_assisted: true,
            gpu_assisted_max_errors: 5,
            ..Default::default()
        });
        let cb = record_fetch_with(&device, TexelIndex::Constant(20), 0, |cb| {
            cb.dispatch([4, 1, 1]).unwrap()
        });

        let errors = submit_and_wait(&queue, cb).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors[4].to_string().contains("occurrence 5 of 32"));
    }

    #[test]
    fn draw_workloads() {
        let (device, _queue) = gfx_dev_and_queue!();

        let draw = |vertex_count, instance_count| {
            Workload::Draw {
                vertex_count,
                instance_count,
            }
            .resolve()
            .unwrap()
        };
        assert_eq!(
            draw(3, 2),
            Executed {
                workgroups: 0,
                vertices: 6,
                instances: 2,
            },
        );
        assert_eq!(draw(0, 5), Executed::default());
        assert_eq!(draw(3, 0), Executed::default());

        // Two draws: 3 vertices and 2 instances, then 4 vertices and 1 instance.
        let indirect = crate::tests::buffer(&device, 32, BufferUsage::INDIRECT_BUFFER);
        indirect
            .write(0, bytemuck::cast_slice(&[3u32, 2, 0, 0, 4, 1, 0, 0]))
            .unwrap();
        let count = crate::tests::buffer(&device, 4, BufferUsage::INDIRECT_BUFFER);
        count.write(0, &1u32.to_ne_bytes()).unwrap();

        let indirect_draw = |draw_count| {
            Workload::DrawIndirect {
                buffer: indirect.clone(),
                offset: 0,
                stride: 16,
                draw_count,
            }
            .resolve()
        };
        assert_eq!(
            indirect_draw(DrawCount::Direct(2)),
            Some(Executed {
                workgroups: 0,
                vertices: 10,
                instances: 3,
            }),
        );
        assert_eq!(
            indirect_draw(DrawCount::Buffer {
                buffer: count.clone(),
                offset: 0,
                max_draw_count: 2,
            }),
            Some(Executed {
                workgroups: 0,
                vertices: 6,
                instances: 2,
            }),
        );
        // The third draw would be read past the end of the buffer.
        assert_eq!(indirect_draw(DrawCount::Direct(3)), None);

        assert_eq!(Executed::dispatch([u32::MAX; 3]).units(ShaderStage::Compute), u64::MAX);
    }
}
