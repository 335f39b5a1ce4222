// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

#![cfg(test)]

use crate::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage},
    command_buffer::{
        pool::{CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo},
        CommandBuffer, CommandBufferAllocateInfo, CommandBufferLevel,
    },
    device::{
        queue::{QueueFamilyProperties, QueueFlags},
        Device, DeviceCreateInfo, DeviceOwned, Queue,
    },
    format::Format,
    image::{view::ImageView, Image, ImageCreateInfo, ImageType, ImageUsage, SampleCount},
    memory::{DeviceMemory, MemoryAllocateInfo, MemoryPropertyFlags},
    pipeline::{
        compute::{ComputePipeline, ComputePipelineCreateInfo},
        graphics::{GraphicsPipeline, GraphicsPipelineCreateInfo},
        layout::{PipelineLayout, PipelineLayoutCreateInfo},
    },
    render_pass::{
        AttachmentDescription, Framebuffer, FramebufferCreateInfo, RenderPass,
        RenderPassCreateInfo, Subpass, SubpassDescription,
    },
    shader::{EntryPointInfo, ShaderModule, ShaderModuleCreateInfo, ShaderStage},
    DeviceSize,
};
use std::sync::{Arc, Once};

/// Installs a `tracing` subscriber once per test binary.
///
/// The filter is read from the `VULKANO_VALIDATION_LOG` environment variable, and nothing is
/// printed if it isn't set.
pub(crate) fn init_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("VULKANO_VALIDATION_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// The queue families of the devices created by the test macros.
///
/// Family 0 supports everything, family 1 only compute and transfer, family 2 only transfer.
pub(crate) fn queue_families() -> Vec<QueueFamilyProperties> {
    vec![
        QueueFamilyProperties {
            queue_flags: QueueFlags::GRAPHICS
                | QueueFlags::COMPUTE
                | QueueFlags::TRANSFER
                | QueueFlags::PROTECTED,
            queue_count: 2,
            ..Default::default()
        },
        QueueFamilyProperties {
            queue_flags: QueueFlags::COMPUTE | QueueFlags::TRANSFER,
            queue_count: 1,
            ..Default::default()
        },
        QueueFamilyProperties {
            queue_flags: QueueFlags::TRANSFER,
            queue_count: 1,
            ..Default::default()
        },
    ]
}

/// Creates a device with the test queue families and returns it with all of its queues.
pub(crate) fn device_and_queues(create_info: DeviceCreateInfo) -> (Arc<Device>, Vec<Arc<Queue>>) {
    init_logging();

    let (device, queues) = Device::new(DeviceCreateInfo {
        queue_families: queue_families(),
        ..create_info
    })
    .unwrap();

    (device, queues.collect())
}

/// Creates a device and a queue for graphics operations.
///
/// Without arguments, every feature is enabled. Otherwise the argument is the `DeviceFeatures`
/// to enable.
macro_rules! gfx_dev_and_queue {
    () => {
        gfx_dev_and_queue!($crate::device::DeviceFeatures::all())
    };
    ($features:expr) => {{
        let (device, mut queues) =
            $crate::tests::device_and_queues($crate::device::DeviceCreateInfo {
                enabled_features: $features,
                ..Default::default()
            });

        (device, queues.remove(0))
    }};
}

/// Creates a command pool on queue family `queue_family_index`.
pub(crate) fn command_pool(
    device: &Arc<Device>,
    queue_family_index: u32,
    flags: CommandPoolCreateFlags,
) -> Arc<CommandPool> {
    CommandPool::new(
        device.clone(),
        CommandPoolCreateInfo {
            flags,
            queue_family_index,
            ..Default::default()
        },
    )
    .unwrap()
}

/// Allocates one command buffer of the given level.
pub(crate) fn command_buffer(pool: &Arc<CommandPool>, level: CommandBufferLevel) -> Arc<CommandBuffer> {
    pool.allocate_command_buffers(CommandBufferAllocateInfo {
        level,
        command_buffer_count: 1,
        ..Default::default()
    })
    .unwrap()
    .next()
    .unwrap()
}

/// Allocates a primary command buffer from a new resettable pool on family 0.
pub(crate) fn primary(device: &Arc<Device>) -> Arc<CommandBuffer> {
    let pool = command_pool(device, 0, CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    command_buffer(&pool, CommandBufferLevel::Primary)
}

/// Creates a buffer of `size` bytes and binds host-visible memory to it.
pub(crate) fn buffer(device: &Arc<Device>, size: DeviceSize, usage: BufferUsage) -> Arc<Buffer> {
    let buffer = Buffer::new(
        device.clone(),
        BufferCreateInfo {
            size,
            usage,
            ..Default::default()
        },
    )
    .unwrap();
    let memory = DeviceMemory::allocate(
        device.clone(),
        MemoryAllocateInfo {
            allocation_size: size,
            property_flags: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        },
    )
    .unwrap();
    buffer.bind_memory(memory, 0).unwrap();

    buffer
}

/// Creates a 2D image and binds memory to it.
pub(crate) fn image(
    device: &Arc<Device>,
    format: Format,
    extent: [u32; 2],
    array_layers: u32,
    usage: ImageUsage,
) -> Arc<Image> {
    let image = Image::new(
        device.clone(),
        ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format,
            extent: [extent[0], extent[1], 1],
            array_layers,
            usage,
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

    image
}

/// Creates a render pass with one subpass that uses a single color attachment.
pub(crate) fn single_color_render_pass(
    device: &Arc<Device>,
    format: Format,
    view_mask: u32,
) -> Arc<RenderPass> {
    RenderPass::new(
        device.clone(),
        RenderPassCreateInfo {
            attachments: vec![AttachmentDescription {
                format,
                samples: SampleCount::Sample1,
                ..Default::default()
            }],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![Some(0)],
                view_mask,
                ..Default::default()
            }],
            ..Default::default()
        },
    )
    .unwrap()
}

/// Creates a 16x16 framebuffer for a render pass with a single color attachment. The image has
/// `array_layers` layers, which must cover the views of a multiview render pass.
pub(crate) fn framebuffer(render_pass: &Arc<RenderPass>, array_layers: u32) -> Arc<Framebuffer> {
    let format = render_pass.attachments()[0].format;
    let image = image(
        render_pass.device(),
        format,
        [16, 16],
        array_layers,
        ImageUsage::COLOR_ATTACHMENT,
    );

    Framebuffer::new(
        render_pass.clone(),
        FramebufferCreateInfo {
            attachments: vec![ImageView::new_default(image).unwrap()],
            ..Default::default()
        },
    )
    .unwrap()
}

/// Creates a pipeline layout.
pub(crate) fn pipeline_layout(
    device: &Arc<Device>,
    create_info: PipelineLayoutCreateInfo,
) -> Arc<PipelineLayout> {
    PipelineLayout::new(device.clone(), create_info).unwrap()
}

/// Creates a graphics pipeline whose stages are `entry_points`. The stages of `create_info` are
/// replaced.
pub(crate) fn graphics_pipeline(
    entry_points: Vec<EntryPointInfo>,
    create_info: GraphicsPipelineCreateInfo,
) -> Arc<GraphicsPipeline> {
    let device = create_info.layout.device().clone();
    let stages: Vec<ShaderStage> = entry_points.iter().map(|info| info.stage).collect();
    let module =
        ShaderModule::new(device.clone(), ShaderModuleCreateInfo::entry_points(entry_points))
            .unwrap();

    GraphicsPipeline::new(
        device,
        GraphicsPipelineCreateInfo {
            stages: stages
                .into_iter()
                .map(|stage| module.entry_point("main", Some(stage)).unwrap())
                .collect(),
            ..create_info
        },
    )
    .unwrap()
}

/// Creates a graphics pipeline with an empty layout, a vertex and a fragment shader, for the
/// first subpass of `render_pass`.
pub(crate) fn simple_graphics_pipeline(render_pass: &Arc<RenderPass>) -> Arc<GraphicsPipeline> {
    let layout = pipeline_layout(render_pass.device(), Default::default());

    graphics_pipeline(
        vec![
            EntryPointInfo::new(ShaderStage::Vertex),
            EntryPointInfo::new(ShaderStage::Fragment),
        ],
        GraphicsPipelineCreateInfo {
            subpass: Some(Subpass::from(render_pass.clone(), 0).unwrap().into()),
            ..GraphicsPipelineCreateInfo::layout(layout)
        },
    )
}

/// Creates a compute pipeline from a single compute entry point.
pub(crate) fn compute_pipeline(
    layout: Arc<PipelineLayout>,
    entry_point: EntryPointInfo,
) -> Arc<ComputePipeline> {
    let device = layout.device().clone();
    let module =
        ShaderModule::new(device.clone(), ShaderModuleCreateInfo::entry_points([entry_point]))
            .unwrap();

    ComputePipeline::new(
        device,
        ComputePipelineCreateInfo::stage_layout(
            module.entry_point("main", Some(ShaderStage::Compute)).unwrap(),
            layout,
        ),
    )
    .unwrap()
}
