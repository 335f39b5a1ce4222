// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A pipeline that performs graphics processing operations.
//!
//! Unlike a compute pipeline, which performs general-purpose work, a graphics pipeline is geared
//! specifically towards doing graphical processing. To that end, it consists of several shaders,
//! with additional state and glue logic in between.
//!
//! # Pipeline state
//!
//! Only the parts of the fixed-function state that the validation rules look at are modelled:
//! the vertex input, the viewport and scissor counts, the line width, the depth bounds test, the
//! rasterization sample count and the fragment shading rate. Every other piece of state is
//! considered to be valid.
//!
//! # Dynamic state
//!
//! States listed in [`GraphicsPipelineCreateInfo::dynamic_state`] are not fixed at pipeline
//! creation. They must instead be set on the command buffer, after the pipeline is bound and
//! before the next draw command.

use self::fragment_shading_rate::FragmentShadingRateState;
use super::{
    layout::PipelineLayout, merge_descriptor_binding_requirements,
    vertex_input::VertexInputState, DynamicState, Pipeline, PipelineBindPoint,
};
use crate::{
    device::{Device, DeviceOwned},
    format::{Format, FormatFeatures},
    image::{ImageAspects, SampleCount},
    registry::ObjectType,
    render_pass::Subpass,
    shader::{DescriptorBindingRequirements, EntryPoint, ShaderStage, TexelAccess},
    Handle, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind, VulkanObject,
};
use foldhash::{HashMap, HashSet};
use smallvec::SmallVec;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Range,
    sync::Arc,
};

pub mod fragment_shading_rate;

/// Defines how the implementation should perform a draw operation.
///
/// This object contains the shaders and the various fixed states that describe how the
/// implementation should perform the various operations needed by a draw command.
pub struct GraphicsPipeline {
    handle: Handle,
    device: Arc<Device>,
    layout: Arc<PipelineLayout>,

    stages: SmallVec<[ShaderStage; 5]>,
    subpass: PipelineSubpassType,
    vertex_input_state: VertexInputState,
    viewport_state: ViewportState,
    rasterization_state: RasterizationState,
    multisample_state: MultisampleState,
    depth_stencil_state: DepthStencilState,
    fragment_shading_rate_state: Option<FragmentShadingRateState>,
    dynamic_state: HashSet<DynamicState>,

    descriptor_binding_requirements: HashMap<(u32, u32), DescriptorBindingRequirements>,
    push_constant_requirements: Vec<(ShaderStage, Range<u32>)>,
    texel_accesses: Vec<(ShaderStage, TexelAccess)>,
    num_used_descriptor_sets: u32,
}

impl GraphicsPipeline {
    /// Creates a new `GraphicsPipeline`.
    pub fn new(
        device: Arc<Device>,
        create_info: GraphicsPipelineCreateInfo,
    ) -> Result<Arc<Self>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &GraphicsPipelineCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: GraphicsPipelineCreateInfo) -> Arc<Self> {
        let GraphicsPipelineCreateInfo {
            stages,
            vertex_input_state,
            viewport_state,
            rasterization_state,
            multisample_state,
            depth_stencil_state,
            fragment_shading_rate_state,
            dynamic_state,
            subpass,
            layout,
            _ne: _,
        } = create_info;

        let descriptor_binding_requirements = merge_descriptor_binding_requirements(
            stages
                .iter()
                .map(|stage| &stage.info().descriptor_binding_requirements),
        );
        let num_used_descriptor_sets = descriptor_binding_requirements
            .keys()
            .map(|&(set, _)| set + 1)
            .max()
            .unwrap_or(0);
        let push_constant_requirements = stages
            .iter()
            .filter_map(|stage| {
                let info = stage.info();
                info.push_constant_requirements
                    .map(|range| (info.stage, range.offset..range.offset + range.size))
            })
            .collect();
        let texel_accesses = stages
            .iter()
            .flat_map(|stage| {
                let info = stage.info();
                info.texel_accesses
                    .iter()
                    .map(move |access| (info.stage, access.clone()))
            })
            .collect();

        let pipeline = Arc::new(GraphicsPipeline {
            handle: device.registry().register(ObjectType::Pipeline, None),
            device,
            layout,
            stages: stages.iter().map(|stage| stage.info().stage).collect(),
            subpass: subpass.unwrap_or_default(),
            vertex_input_state,
            viewport_state,
            rasterization_state,
            multisample_state,
            depth_stencil_state,
            fragment_shading_rate_state,
            dynamic_state,
            descriptor_binding_requirements,
            push_constant_requirements,
            texel_accesses,
            num_used_descriptor_sets,
        });

        tracing::trace!(handle = %pipeline.handle, "created graphics pipeline");

        pipeline
    }

    /// Returns the shader stages that the pipeline contains.
    #[inline]
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    /// Returns the subpass or dynamic rendering shape this graphics pipeline is rendering to.
    #[inline]
    pub fn subpass(&self) -> &PipelineSubpassType {
        &self.subpass
    }

    /// Returns the vertex input state used to create this pipeline.
    #[inline]
    pub fn vertex_input_state(&self) -> &VertexInputState {
        &self.vertex_input_state
    }

    /// Returns the viewport state used to create this pipeline.
    #[inline]
    pub fn viewport_state(&self) -> &ViewportState {
        &self.viewport_state
    }

    /// Returns the rasterization state used to create this pipeline.
    #[inline]
    pub fn rasterization_state(&self) -> &RasterizationState {
        &self.rasterization_state
    }

    /// Returns the multisample state used to create this pipeline.
    #[inline]
    pub fn multisample_state(&self) -> &MultisampleState {
        &self.multisample_state
    }

    /// Returns the depth/stencil state used to create this pipeline.
    #[inline]
    pub fn depth_stencil_state(&self) -> &DepthStencilState {
        &self.depth_stencil_state
    }

    /// Returns the fragment shading rate state used to create this pipeline.
    #[inline]
    pub fn fragment_shading_rate_state(&self) -> Option<&FragmentShadingRateState> {
        self.fragment_shading_rate_state.as_ref()
    }

    /// Returns the dynamic states of the pipeline.
    #[inline]
    pub fn dynamic_state(&self) -> &HashSet<DynamicState> {
        &self.dynamic_state
    }

    /// Returns whether a particular state is dynamic.
    #[inline]
    pub fn is_dynamic(&self, state: DynamicState) -> bool {
        self.dynamic_state.contains(&state)
    }

    /// Returns the view mask that the pipeline renders with.
    #[inline]
    pub fn view_mask(&self) -> u32 {
        self.subpass.view_mask()
    }
}

impl Pipeline for GraphicsPipeline {
    #[inline]
    fn bind_point(&self) -> PipelineBindPoint {
        PipelineBindPoint::Graphics
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

impl Drop for GraphicsPipeline {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for GraphicsPipeline {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for GraphicsPipeline {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for GraphicsPipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("GraphicsPipeline")
            .field("handle", &self.handle)
            .field("layout", &self.layout.handle())
            .field("stages", &self.stages)
            .field("subpass", &self.subpass)
            .field("dynamic_state", &self.dynamic_state)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `GraphicsPipeline`.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineCreateInfo {
    /// The shader stages to use.
    ///
    /// A vertex shader must always be included. Other stages are optional.
    ///
    /// The default value is empty.
    pub stages: SmallVec<[EntryPoint; 5]>,

    /// The vertex input state.
    ///
    /// The default value is an empty `VertexInputState`.
    pub vertex_input_state: VertexInputState,

    /// The viewport state.
    pub viewport_state: ViewportState,

    /// The rasterization state.
    pub rasterization_state: RasterizationState,

    /// The multisample state.
    pub multisample_state: MultisampleState,

    /// The depth/stencil state.
    pub depth_stencil_state: DepthStencilState,

    /// The fragment shading rate state.
    ///
    /// If this is `Some`, the
    /// [`pipeline_fragment_shading_rate`](crate::device::DeviceFeatures::pipeline_fragment_shading_rate)
    /// feature must be enabled on the device.
    ///
    /// The default value is `None`.
    pub fragment_shading_rate_state: Option<FragmentShadingRateState>,

    /// The state that is set dynamically on the command buffer instead of in the pipeline.
    ///
    /// The default value is empty.
    pub dynamic_state: HashSet<DynamicState>,

    /// The render subpass to use.
    ///
    /// `None` is equivalent to dynamic rendering without any attachments.
    ///
    /// The default value is `None`.
    pub subpass: Option<PipelineSubpassType>,

    /// The pipeline layout to use for the pipeline.
    ///
    /// There is no default value.
    pub layout: Arc<PipelineLayout>,

    pub _ne: crate::NonExhaustive,
}

impl GraphicsPipelineCreateInfo {
    /// Returns a `GraphicsPipelineCreateInfo` with the specified `layout`.
    #[inline]
    pub fn layout(layout: Arc<PipelineLayout>) -> Self {
        Self {
            stages: SmallVec::new(),
            vertex_input_state: VertexInputState::default(),
            viewport_state: ViewportState::default(),
            rasterization_state: RasterizationState::default(),
            multisample_state: MultisampleState::default(),
            depth_stencil_state: DepthStencilState::default(),
            fragment_shading_rate_state: None,
            dynamic_state: HashSet::default(),
            subpass: None,
            layout,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref stages,
            ref vertex_input_state,
            ref viewport_state,
            ref rasterization_state,
            ref multisample_state,
            ref depth_stencil_state,
            ref fragment_shading_rate_state,
            ref dynamic_state,
            ref subpass,
            ref layout,
            _ne: _,
        } = self;

        let features = device.enabled_features();
        let registry = device.registry();

        if !registry.is_alive(layout.handle()) {
            return Err(Box::new(ValidationError {
                context: "layout".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-layout-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        /*
            Shader stages
        */

        let mut stage_flags = HashSet::default();
        let mut vertex_stage = None;

        for (stage_index, stage) in stages.iter().enumerate() {
            let info = stage.info();

            if !registry.is_alive(stage.module().handle()) {
                return Err(Box::new(ValidationError {
                    context: format!("stages[{}].module", stage_index).into(),
                    problem: "has been destroyed".into(),
                    vuids: &["VUID-VkPipelineShaderStageCreateInfo-module-parameter"],
                    kind: Some(ViolationKind::DestroyedObjectUsed),
                    ..Default::default()
                }));
            }

            if info.stage == ShaderStage::Compute {
                return Err(Box::new(ValidationError {
                    context: format!("stages[{}]", stage_index).into(),
                    problem: "is a compute shader".into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-pStages-06896"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if !stage_flags.insert(info.stage) {
                return Err(Box::new(ValidationError {
                    context: "stages".into(),
                    problem: format!("contains more than one element whose stage is `{:?}`", info.stage).into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-stage-06897"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if info.stage == ShaderStage::Vertex {
                vertex_stage = Some(info);
            }

            layout
                .ensure_compatible_with_shader(
                    info.stage,
                    info.descriptor_binding_requirements.iter(),
                    info.push_constant_requirements.as_ref(),
                )
                .map_err(|err| err.add_context(format!("stages[{}]", stage_index)))?;
        }

        let Some(vertex_stage) = vertex_stage else {
            return Err(Box::new(ValidationError {
                context: "stages".into(),
                problem: "does not contain a `ShaderStage::Vertex` stage".into(),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-stage-02096"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        };

        let has_tessellation_control = stage_flags.contains(&ShaderStage::TessellationControl);
        let has_tessellation_evaluation =
            stage_flags.contains(&ShaderStage::TessellationEvaluation);

        if has_tessellation_control && !has_tessellation_evaluation {
            return Err(Box::new(ValidationError {
                context: "stages".into(),
                problem: "contains a `ShaderStage::TessellationControl` stage, but not a \
                    `ShaderStage::TessellationEvaluation` stage"
                    .into(),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-pStages-00729"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if has_tessellation_evaluation && !has_tessellation_control {
            return Err(Box::new(ValidationError {
                context: "stages".into(),
                problem: "contains a `ShaderStage::TessellationEvaluation` stage, but not a \
                    `ShaderStage::TessellationControl` stage"
                    .into(),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-pStages-00730"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        /*
            Fixed-function state
        */

        vertex_input_state
            .validate(device)
            .map_err(|err| err.add_context("vertex_input_state"))?;
        vertex_input_state
            .validate_shader_inputs(&vertex_stage.input_locations)?;

        for &state in dynamic_state {
            state.validate_device(device).map_err(|err| {
                err.add_context("dynamic_state")
                    .set_vuids(&["VUID-VkPipelineDynamicStateCreateInfo-pDynamicStates-parameter"])
                    .set_kind(ViolationKind::FeatureNotEnabled)
            })?;
        }

        viewport_state
            .validate(device)
            .map_err(|err| err.add_context("viewport_state"))?;

        if !dynamic_state.contains(&DynamicState::LineWidth)
            && rasterization_state.line_width != 1.0
            && !features.wide_lines
        {
            return Err(Box::new(ValidationError {
                context: "rasterization_state.line_width".into(),
                problem: "is not 1.0, and `dynamic_state` does not contain \
                    `DynamicState::LineWidth`"
                    .into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "wide_lines",
                )])]),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicStates-00749"],
                kind: Some(ViolationKind::FeatureNotEnabled),
            }));
        }

        if depth_stencil_state.depth_bounds_test && !features.depth_bounds {
            return Err(Box::new(ValidationError {
                context: "depth_stencil_state.depth_bounds_test".into(),
                problem: "is `true`".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "depth_bounds",
                )])]),
                vuids: &["VUID-VkPipelineDepthStencilStateCreateInfo-depthBoundsTestEnable-00598"],
                kind: Some(ViolationKind::FeatureNotEnabled),
            }));
        }

        multisample_state
            .rasterization_samples
            .validate_device(device)
            .map_err(|err| {
                err.add_context("multisample_state.rasterization_samples")
                    .set_vuids(&["VUID-VkPipelineMultisampleStateCreateInfo-rasterizationSamples-parameter"])
            })?;

        if let Some(fragment_shading_rate_state) = fragment_shading_rate_state {
            if !dynamic_state.contains(&DynamicState::FragmentShadingRate) {
                fragment_shading_rate_state
                    .validate(device)
                    .map_err(|err| err.add_context("fragment_shading_rate_state"))?;
            }
        }

        /*
            Render pass
        */

        let has_geometry = stage_flags.contains(&ShaderStage::Geometry);

        match subpass {
            Some(PipelineSubpassType::BeginRenderPass(subpass)) => {
                if !registry.is_alive(subpass.render_pass().handle()) {
                    return Err(Box::new(ValidationError {
                        context: "subpass.render_pass()".into(),
                        problem: "has been destroyed".into(),
                        vuids: &["VUID-VkGraphicsPipelineCreateInfo-renderPass-parameter"],
                        kind: Some(ViolationKind::DestroyedObjectUsed),
                        ..Default::default()
                    }));
                }

                if subpass.view_mask() != 0 && has_geometry && !features.multiview_geometry_shader
                {
                    return Err(Box::new(ValidationError {
                        problem: "`subpass` has a non-zero `view_mask`, and `stages` contains a \
                            `ShaderStage::Geometry` stage"
                            .into(),
                        requires_one_of: RequiresOneOf(&[RequiresAllOf(&[
                            Requires::DeviceFeature("multiview_geometry_shader"),
                        ])]),
                        vuids: &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06048"],
                        kind: Some(ViolationKind::FeatureNotEnabled),
                        ..Default::default()
                    }));
                }

                if let Some(samples) = subpass.num_samples() {
                    if samples != multisample_state.rasterization_samples {
                        return Err(Box::new(ValidationError {
                            problem: "`multisample_state.rasterization_samples` is not equal to \
                                the number of samples of the attachments of `subpass`"
                                .into(),
                            vuids: &["VUID-VkGraphicsPipelineCreateInfo-subpass-00757"],
                            kind: Some(ViolationKind::AttachmentMismatch),
                            ..Default::default()
                        }));
                    }
                }
            }
            Some(PipelineSubpassType::BeginRendering(rendering_info)) => {
                if !features.dynamic_rendering {
                    return Err(Box::new(ValidationError {
                        context: "subpass".into(),
                        problem: "is `PipelineSubpassType::BeginRendering`".into(),
                        requires_one_of: RequiresOneOf(&[RequiresAllOf(&[
                            Requires::DeviceFeature("dynamic_rendering"),
                        ])]),
                        vuids: &["VUID-VkGraphicsPipelineCreateInfo-dynamicRendering-06576"],
                        kind: Some(ViolationKind::FeatureNotEnabled),
                        ..Default::default()
                    }));
                }

                rendering_info
                    .validate(device)
                    .map_err(|err| err.add_context("subpass"))?;

                if rendering_info.view_mask != 0
                    && has_geometry
                    && !features.multiview_geometry_shader
                {
                    return Err(Box::new(ValidationError {
                        problem: "`subpass.view_mask` is not 0, and `stages` contains a \
                            `ShaderStage::Geometry` stage"
                            .into(),
                        requires_one_of: RequiresOneOf(&[RequiresAllOf(&[
                            Requires::DeviceFeature("multiview_geometry_shader"),
                        ])]),
                        vuids: &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06058"],
                        kind: Some(ViolationKind::FeatureNotEnabled),
                        ..Default::default()
                    }));
                }
            }
            None => {
                if !features.dynamic_rendering {
                    return Err(Box::new(ValidationError {
                        context: "subpass".into(),
                        problem: "is `None`".into(),
                        requires_one_of: RequiresOneOf(&[RequiresAllOf(&[
                            Requires::DeviceFeature("dynamic_rendering"),
                        ])]),
                        vuids: &["VUID-VkGraphicsPipelineCreateInfo-dynamicRendering-06576"],
                        kind: Some(ViolationKind::FeatureNotEnabled),
                        ..Default::default()
                    }));
                }
            }
        }

        Ok(())
    }
}

/// Selects the type of subpass that a graphics pipeline is created for.
#[derive(Clone, Debug)]
pub enum PipelineSubpassType {
    BeginRenderPass(Subpass),
    BeginRendering(PipelineRenderingCreateInfo),
}

impl PipelineSubpassType {
    /// Returns the view mask of the subpass or rendering info.
    #[inline]
    pub fn view_mask(&self) -> u32 {
        match self {
            Self::BeginRenderPass(subpass) => subpass.view_mask(),
            Self::BeginRendering(rendering_info) => rendering_info.view_mask,
        }
    }

    /// Returns the number of color attachments.
    #[inline]
    pub fn num_color_attachments(&self) -> u32 {
        match self {
            Self::BeginRenderPass(subpass) => subpass.num_color_attachments(),
            Self::BeginRendering(rendering_info) => {
                rendering_info.color_attachment_formats.len() as u32
            }
        }
    }
}

impl Default for PipelineSubpassType {
    #[inline]
    fn default() -> Self {
        Self::BeginRendering(PipelineRenderingCreateInfo::default())
    }
}

impl From<Subpass> for PipelineSubpassType {
    #[inline]
    fn from(val: Subpass) -> Self {
        Self::BeginRenderPass(val)
    }
}

impl From<PipelineRenderingCreateInfo> for PipelineSubpassType {
    #[inline]
    fn from(val: PipelineRenderingCreateInfo) -> Self {
        Self::BeginRendering(val)
    }
}

/// The dynamic rendering parameters to create a graphics pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineRenderingCreateInfo {
    /// If not `0`, indicates that multiview rendering will be enabled, and specifies the view
    /// indices that are rendered to. The value is a bitmask, so that that for example `0b11` will
    /// draw to the first two views and `0b101` will draw to the first and third view.
    ///
    /// If set to a nonzero value, the [`multiview`](crate::device::DeviceFeatures::multiview)
    /// feature must be enabled on the device.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The formats of the color attachments that will be used during rendering.
    ///
    /// If an element is `None`, it indicates that the attachment will not be used.
    ///
    /// The default value is empty.
    pub color_attachment_formats: Vec<Option<Format>>,

    /// The format of the depth attachment that will be used during rendering.
    ///
    /// If set to `None`, it indicates that no depth attachment will be used.
    ///
    /// The default value is `None`.
    pub depth_attachment_format: Option<Format>,

    /// The format of the stencil attachment that will be used during rendering.
    ///
    /// If set to `None`, it indicates that no stencil attachment will be used.
    ///
    /// The default value is `None`.
    pub stencil_attachment_format: Option<Format>,

    pub _ne: crate::NonExhaustive,
}

impl Default for PipelineRenderingCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            view_mask: 0,
            color_attachment_formats: Vec::new(),
            depth_attachment_format: None,
            stencil_attachment_format: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl PipelineRenderingCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            view_mask,
            ref color_attachment_formats,
            depth_attachment_format,
            stencil_attachment_format,
            _ne: _,
        } = self;

        let properties = device.properties();

        if view_mask != 0 && !device.enabled_features().multiview {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "is not zero".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multiview",
                )])]),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-multiview-06577"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        let view_count = u32::BITS - view_mask.leading_zeros();

        if view_count > properties.max_multiview_view_count {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "the number of views exceeds the `max_multiview_view_count` limit"
                    .into(),
                vuids: &["VUID-VkPipelineRenderingCreateInfo-viewMask-06578"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if color_attachment_formats.len() > properties.max_color_attachments as usize {
            return Err(Box::new(ValidationError {
                context: "color_attachment_formats".into(),
                problem: "the number of elements is greater than the `max_color_attachments` \
                    limit"
                    .into(),
                vuids: &["VUID-VkPipelineRenderingCreateInfo-colorAttachmentCount-09533"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        for (attachment_index, format) in color_attachment_formats
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|f| (i, f)))
        {
            if !device
                .format_properties(format)
                .optimal_tiling_features
                .intersects(FormatFeatures::COLOR_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: format!("color_attachment_formats[{}]", attachment_index).into(),
                    problem: "format features do not contain \
                        `FormatFeature::COLOR_ATTACHMENT`"
                        .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06582"],
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        for (format, aspect, context, aspect_vuids, feature_vuids) in [
            (
                depth_attachment_format,
                ImageAspects::DEPTH,
                "depth_attachment_format",
                &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06587"] as &'static [_],
                &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06585"] as &'static [_],
            ),
            (
                stencil_attachment_format,
                ImageAspects::STENCIL,
                "stencil_attachment_format",
                &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06588"],
                &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06586"],
            ),
        ] {
            let Some(format) = format else {
                continue;
            };

            if !format.aspects().intersects(aspect) {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: format!("does not have a {:?} aspect", aspect).into(),
                    vuids: aspect_vuids,
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            if !device
                .format_properties(format)
                .optimal_tiling_features
                .intersects(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: "format features do not contain \
                        `FormatFeature::DEPTH_STENCIL_ATTACHMENT`"
                        .into(),
                    vuids: feature_vuids,
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        if let (Some(depth_format), Some(stencil_format)) =
            (depth_attachment_format, stencil_attachment_format)
        {
            if depth_format != stencil_format {
                return Err(Box::new(ValidationError {
                    problem: "`depth_attachment_format` and `stencil_attachment_format` are both \
                        `Some`, but are not equal"
                        .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-renderPass-06589"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// The number of viewports and scissors of a graphics pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportState {
    /// The number of viewports.
    ///
    /// The default value is `1`.
    pub viewport_count: u32,

    /// The number of scissors. Must be equal to `viewport_count`.
    ///
    /// The default value is `1`.
    pub scissor_count: u32,

    /// The number of exclusive scissors. If not zero, must be equal to `viewport_count`.
    ///
    /// The default value is `0`.
    pub exclusive_scissor_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for ViewportState {
    #[inline]
    fn default() -> Self {
        Self {
            viewport_count: 1,
            scissor_count: 1,
            exclusive_scissor_count: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ViewportState {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            viewport_count,
            scissor_count,
            exclusive_scissor_count,
            _ne: _,
        } = self;

        let features = device.enabled_features();
        let properties = device.properties();

        for (count, context, feature_vuids, limit_vuids) in [
            (
                viewport_count,
                "viewport_count",
                &["VUID-VkPipelineViewportStateCreateInfo-viewportCount-01216"] as &'static [_],
                &["VUID-VkPipelineViewportStateCreateInfo-viewportCount-01218"] as &'static [_],
            ),
            (
                scissor_count,
                "scissor_count",
                &["VUID-VkPipelineViewportStateCreateInfo-scissorCount-01217"],
                &["VUID-VkPipelineViewportStateCreateInfo-scissorCount-01219"],
            ),
            (
                exclusive_scissor_count,
                "exclusive_scissor_count",
                &["VUID-VkPipelineViewportExclusiveScissorStateCreateInfoNV-exclusiveScissorCount-02027"],
                &["VUID-VkPipelineViewportExclusiveScissorStateCreateInfoNV-exclusiveScissorCount-02028"],
            ),
        ] {
            if count > 1 && !features.multi_viewport {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: "is greater than 1".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "multi_viewport",
                    )])]),
                    vuids: feature_vuids,
                    kind: Some(ViolationKind::FeatureNotEnabled),
                }));
            }

            if count > properties.max_viewports {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: "exceeds the `max_viewports` limit".into(),
                    vuids: limit_vuids,
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }
        }

        if scissor_count != viewport_count {
            return Err(Box::new(ValidationError {
                problem: "`scissor_count` is not equal to `viewport_count`".into(),
                vuids: &["VUID-VkPipelineViewportStateCreateInfo-scissorCount-04134"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if exclusive_scissor_count != 0 {
            if !features.exclusive_scissor {
                return Err(Box::new(ValidationError {
                    context: "exclusive_scissor_count".into(),
                    problem: "is not zero".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "exclusive_scissor",
                    )])]),
                    vuids: &["VUID-VkPipelineViewportExclusiveScissorStateCreateInfoNV-exclusiveScissorCount-02027"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                }));
            }

            if exclusive_scissor_count != viewport_count {
                return Err(Box::new(ValidationError {
                    problem: "`exclusive_scissor_count` is not zero, and is not equal to \
                        `viewport_count`"
                        .into(),
                    vuids: &["VUID-VkPipelineViewportExclusiveScissorStateCreateInfoNV-exclusiveScissorCount-02029"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// The state in a graphics pipeline describing how the rasterization stage should behave.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizationState {
    /// The width of rasterized lines.
    ///
    /// If this is not 1.0, the [`wide_lines`](crate::device::DeviceFeatures::wide_lines) feature
    /// must be enabled on the device, unless the state is dynamic.
    ///
    /// The default value is `1.0`.
    pub line_width: f32,

    /// Whether depth bias is applied. The bias values themselves are dynamic state.
    ///
    /// The default value is `false`.
    pub depth_bias_enable: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for RasterizationState {
    #[inline]
    fn default() -> Self {
        Self {
            line_width: 1.0,
            depth_bias_enable: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// State of the multisampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MultisampleState {
    /// The number of rasterization samples.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub rasterization_samples: SampleCount,

    pub _ne: crate::NonExhaustive,
}

/// The state in a graphics pipeline describing how the depth and stencil tests should behave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthStencilState {
    /// Whether the depth bounds test is enabled. The bounds themselves are dynamic state.
    ///
    /// If this is `true`, the [`depth_bounds`](crate::device::DeviceFeatures::depth_bounds)
    /// feature must be enabled on the device.
    ///
    /// The default value is `false`.
    pub depth_bounds_test: bool,

    pub _ne: crate::NonExhaustive,
}

/// State of a single viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Coordinates in pixels of the top-left hand corner of the viewport.
    pub offset: [f32; 2],

    /// Dimensions in pixels of the viewport.
    pub extent: [f32; 2],

    /// Minimum and maximum values of the depth.
    pub depth_range: Range<f32>,
}

impl Default for Viewport {
    #[inline]
    fn default() -> Self {
        Self {
            offset: [0.0; 2],
            extent: [1.0; 2],
            depth_range: 0.0..1.0,
        }
    }
}

impl From<Viewport> for ash::vk::Viewport {
    #[inline]
    fn from(val: Viewport) -> Self {
        ash::vk::Viewport {
            x: val.offset[0],
            y: val.offset[1],
            width: val.extent[0],
            height: val.extent[1],
            min_depth: val.depth_range.start,
            max_depth: val.depth_range.end,
        }
    }
}

/// State of a single scissor box.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Scissor {
    /// Coordinates in pixels of the top-left hand corner of the box.
    pub offset: [u32; 2],

    /// Dimensions in pixels of the box.
    pub extent: [u32; 2],
}

impl Default for Scissor {
    #[inline]
    fn default() -> Self {
        Self {
            offset: [0, 0],
            extent: [i32::MAX as u32; 2],
        }
    }
}

impl From<Scissor> for ash::vk::Rect2D {
    #[inline]
    fn from(val: Scissor) -> Self {
        ash::vk::Rect2D {
            offset: ash::vk::Offset2D {
                x: val.offset[0] as i32,
                y: val.offset[1] as i32,
            },
            extent: ash::vk::Extent2D {
                width: val.extent[0],
                height: val.extent[1],
            },
        }
    }
}
