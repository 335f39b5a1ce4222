// Copyright (c) 2021 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use crate::DeviceSize;

/// The limits and properties of the device that the validation rules are checked against.
///
/// The default values are the minimum (or maximum, for alignments) values that the Vulkan
/// specification requires every implementation to support.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProperties {
    pub max_image_dimension1_d: u32,
    pub max_image_dimension2_d: u32,
    pub max_image_dimension3_d: u32,
    pub max_image_array_layers: u32,
    pub max_texel_buffer_elements: u32,
    pub max_bound_descriptor_sets: u32,
    pub max_push_constants_size: u32,
    pub max_vertex_input_attributes: u32,
    pub max_vertex_input_bindings: u32,
    pub max_vertex_input_attribute_offset: u32,
    pub max_vertex_input_binding_stride: u32,
    pub max_draw_indirect_count: u32,
    pub max_compute_work_group_count: [u32; 3],
    pub max_viewports: u32,
    pub max_viewport_dimensions: [u32; 2],
    pub min_texel_buffer_offset_alignment: DeviceSize,
    pub min_uniform_buffer_offset_alignment: DeviceSize,
    pub min_storage_buffer_offset_alignment: DeviceSize,
    pub max_framebuffer_width: u32,
    pub max_framebuffer_height: u32,
    pub max_framebuffer_layers: u32,
    pub max_color_attachments: u32,
    pub max_multiview_view_count: u32,
    /// The highest instance index that can be used in a multiview render pass instance.
    pub max_multiview_instance_index: u32,
    pub max_transform_feedback_streams: u32,
    pub max_transform_feedback_buffers: u32,
    pub transform_feedback_queries: bool,
    pub fragment_shading_rate_non_trivial_combiner_ops: bool,
    /// Whether protected resources can be accessed by unprotected command buffers without
    /// faulting.
    pub protected_no_fault: bool,
}

impl Default for DeviceProperties {
    #[inline]
    fn default() -> Self {
        Self {
            max_image_dimension1_d: 4096,
            max_image_dimension2_d: 4096,
            max_image_dimension3_d: 256,
            max_image_array_layers: 256,
            max_texel_buffer_elements: 65536,
            max_bound_descriptor_sets: 4,
            max_push_constants_size: 128,
            max_vertex_input_attributes: 16,
            max_vertex_input_bindings: 16,
            max_vertex_input_attribute_offset: 2047,
            max_vertex_input_binding_stride: 2048,
            max_draw_indirect_count: 1 << 16,
            max_compute_work_group_count: [65535; 3],
            max_viewports: 16,
            max_viewport_dimensions: [4096, 4096],
            min_texel_buffer_offset_alignment: 256,
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
            max_framebuffer_width: 4096,
            max_framebuffer_height: 4096,
            max_framebuffer_layers: 256,
            max_color_attachments: 4,
            max_multiview_view_count: 6,
            max_multiview_instance_index: (1 << 27) - 1,
            max_transform_feedback_streams: 1,
            max_transform_feedback_buffers: 1,
            transform_feedback_queries: false,
            fragment_shading_rate_non_trivial_combiner_ops: false,
            protected_no_fault: false,
        }
    }
}
