// Copyright (c) 2017 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Configures how data from vertex buffers is read into vertex shader input locations.
//!
//! The vertex input stage is the stage where data is read from a buffer and fed into the vertex
//! shader. After each invocation of the vertex shader, the pipeline then proceeds to the next
//! stages.
//!
//! # Bindings and attributes
//!
//! A *binding* is a slot that a vertex buffer is bound to with
//! [`bind_vertex_buffers`](crate::command_buffer::CommandBuffer::bind_vertex_buffers), with a
//! stride and an input rate. An *attribute* maps a shader input location to a format and an
//! offset within the elements of one binding.
//!
//! When a draw command is recorded, every binding that the attributes of the bound pipeline
//! reference must have a buffer bound, and every attribute must be fetched from within that
//! buffer at an address that is aligned to the component size of its format.

use crate::{
    device::Device, format::Format, format::FormatFeatures, DeviceSize, ValidationError,
    ViolationKind,
};
use foldhash::HashMap;

/// The state in a graphics pipeline describing how the vertex input stage should behave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexInputState {
    /// A description of the vertex buffers that the vertex input stage will read from.
    ///
    /// The default value is empty.
    pub bindings: HashMap<u32, VertexInputBindingDescription>,

    /// Describes, for each shader input location, the mapping between elements in a vertex buffer
    /// and the components of that location in the shader.
    ///
    /// The default value is empty.
    pub attributes: HashMap<u32, VertexInputAttributeDescription>,

    pub _ne: crate::NonExhaustive,
}

impl Default for VertexInputState {
    #[inline]
    fn default() -> Self {
        Self {
            bindings: HashMap::default(),
            attributes: HashMap::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl VertexInputState {
    /// Constructs a new `VertexInputState` with no bindings or attributes.
    #[inline]
    pub fn new() -> VertexInputState {
        Self::default()
    }

    /// Adds a single binding.
    #[inline]
    pub fn binding(mut self, binding: u32, description: VertexInputBindingDescription) -> Self {
        self.bindings.insert(binding, description);
        self
    }

    /// Adds a single attribute.
    #[inline]
    pub fn attribute(mut self, location: u32, description: VertexInputAttributeDescription) -> Self {
        self.attributes.insert(location, description);
        self
    }

    /// Returns whether `self` and `other` define the same bindings, so that vertex buffers bound
    /// for one can be consumed by the other.
    #[inline]
    pub(crate) fn has_same_bindings(&self, other: &VertexInputState) -> bool {
        self.bindings == other.bindings
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let Self {
            bindings,
            attributes,
            _ne: _,
        } = self;

        let properties = device.properties();

        if bindings.len() > properties.max_vertex_input_bindings as usize {
            return Err(Box::new(ValidationError {
                context: "bindings".into(),
                problem: "the length exceeds the `max_vertex_input_bindings` limit".into(),
                vuids: &[
                    "VUID-VkPipelineVertexInputStateCreateInfo-vertexBindingDescriptionCount-00613",
                ],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        for (&binding, binding_desc) in bindings {
            binding_desc
                .validate(device)
                .map_err(|err| err.add_context(format!("bindings[{}]", binding)))?;

            if binding >= properties.max_vertex_input_bindings {
                return Err(Box::new(ValidationError {
                    context: "bindings".into(),
                    problem: format!(
                        "the binding number {} is not less than the `max_vertex_input_bindings` \
                        limit",
                        binding
                    )
                    .into(),
                    vuids: &["VUID-VkVertexInputBindingDescription-binding-00618"],
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }
        }

        if attributes.len() > properties.max_vertex_input_attributes as usize {
            return Err(Box::new(ValidationError {
                context: "attributes".into(),
                problem: "the length exceeds the `max_vertex_input_attributes` limit".into(),
                vuids: &[
                    "VUID-VkPipelineVertexInputStateCreateInfo-vertexAttributeDescriptionCount-00614",
                ],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        for (&location, attribute_desc) in attributes {
            attribute_desc
                .validate(device)
                .map_err(|err| err.add_context(format!("attributes[{}]", location)))?;

            if location >= properties.max_vertex_input_attributes {
                return Err(Box::new(ValidationError {
                    context: "attributes".into(),
                    problem: format!(
                        "the location {} is not less than the `max_vertex_input_attributes` limit",
                        location
                    )
                    .into(),
                    vuids: &["VUID-VkVertexInputAttributeDescription-location-00620"],
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }

            if !bindings.contains_key(&attribute_desc.binding) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`attributes[{}].binding` is not present in `bindings`",
                        location
                    )
                    .into(),
                    vuids: &["VUID-VkPipelineVertexInputStateCreateInfo-binding-00615"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }

    /// Checks that every location that the vertex shader consumes is provided by an attribute.
    pub(crate) fn validate_shader_inputs(
        &self,
        input_locations: &[u32],
    ) -> Result<(), Box<ValidationError>> {
        for &location in input_locations {
            if !self.attributes.contains_key(&location) {
                return Err(Box::new(ValidationError {
                    context: "vertex_input_state.attributes".into(),
                    problem: format!(
                        "the vertex shader consumes input location {}, but no attribute is \
                        defined for it",
                        location
                    )
                    .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-Input-07904"],
                    kind: Some(ViolationKind::VertexBindingNotSetViolation),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Describes a single vertex buffer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexInputBindingDescription {
    /// The number of bytes from the start of one element in the vertex buffer to the start of the
    /// next element. This can be simply the size of the data in each element, but larger strides
    /// are possible.
    pub stride: u32,

    /// How often the vertex input should advance to the next element.
    pub input_rate: VertexInputRate,
}

impl VertexInputBindingDescription {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            stride,
            input_rate: _,
        } = self;

        if stride > device.properties().max_vertex_input_binding_stride {
            return Err(Box::new(ValidationError {
                context: "stride".into(),
                problem: "exceeds the `max_vertex_input_binding_stride` limit".into(),
                vuids: &["VUID-VkVertexInputBindingDescription-stride-00619"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Describes a single vertex buffer attribute mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexInputAttributeDescription {
    /// The vertex buffer binding number that this attribute should take its data from.
    pub binding: u32,

    /// The size and type of the vertex data.
    pub format: Format,

    /// Number of bytes between the start of a vertex buffer element and the location of attribute.
    pub offset: u32,
}

impl VertexInputAttributeDescription {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding,
            format,
            offset,
        } = self;

        let properties = device.properties();

        if binding >= properties.max_vertex_input_bindings {
            return Err(Box::new(ValidationError {
                context: "binding".into(),
                problem: "is not less than the `max_vertex_input_bindings` limit".into(),
                vuids: &["VUID-VkVertexInputAttributeDescription-binding-00621"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if offset > properties.max_vertex_input_attribute_offset {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "exceeds the `max_vertex_input_attribute_offset` limit".into(),
                vuids: &["VUID-VkVertexInputAttributeDescription-offset-00622"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if !device
            .format_properties(format)
            .buffer_features
            .intersects(FormatFeatures::VERTEX_BUFFER)
        {
            return Err(Box::new(ValidationError {
                context: "format".into(),
                problem: "the format features do not include `FormatFeatures::VERTEX_BUFFER`"
                    .into(),
                vuids: &["VUID-VkVertexInputAttributeDescription-format-00623"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Returns the alignment that the address of the attribute must have: the size of one
    /// component of its format.
    pub(crate) fn required_alignment(&self) -> DeviceSize {
        let components = self.format.components().max(1) as DeviceSize;

        (self.format.block_size() / components).max(1)
    }
}

/// How the vertex source should be unrolled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    /// Each element of the source corresponds to a vertex.
    #[default]
    Vertex,

    /// Each element of the source corresponds to an instance.
    Instance,
}
