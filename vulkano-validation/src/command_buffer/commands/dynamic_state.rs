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
    command_buffer::{
        state::{DepthBias, FragmentShadingRate, StencilStateDynamic},
        CommandBuffer,
    },
    device::{queue::QueueFlags, Device, DeviceOwned},
    macros::vulkan_enum,
    pipeline::graphics::{
        fragment_shading_rate::{
            validate_combiner_ops, validate_fragment_size, FragmentShadingRateCombinerOp,
            COMMAND_COMBINER_OPS_VUIDS, COMMAND_FRAGMENT_SIZE_VUIDS,
        },
        Scissor, Viewport,
    },
    Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors, ViolationKind,
};
use std::ops::RangeInclusive;

const SET_VIEWPORT: CommandInfo = command_info!("vkCmdSetViewport", QueueFlags::GRAPHICS, Any);
const SET_SCISSOR: CommandInfo = command_info!("vkCmdSetScissor", QueueFlags::GRAPHICS, Any);
const SET_LINE_WIDTH: CommandInfo = command_info!("vkCmdSetLineWidth", QueueFlags::GRAPHICS, Any);
const SET_DEPTH_BIAS: CommandInfo = command_info!("vkCmdSetDepthBias", QueueFlags::GRAPHICS, Any);
const SET_BLEND_CONSTANTS: CommandInfo =
    command_info!("vkCmdSetBlendConstants", QueueFlags::GRAPHICS, Any);
const SET_DEPTH_BOUNDS: CommandInfo =
    command_info!("vkCmdSetDepthBounds", QueueFlags::GRAPHICS, Any);
const SET_STENCIL_COMPARE_MASK: CommandInfo =
    command_info!("vkCmdSetStencilCompareMask", QueueFlags::GRAPHICS, Any);
const SET_STENCIL_WRITE_MASK: CommandInfo =
    command_info!("vkCmdSetStencilWriteMask", QueueFlags::GRAPHICS, Any);
const SET_STENCIL_REFERENCE: CommandInfo =
    command_info!("vkCmdSetStencilReference", QueueFlags::GRAPHICS, Any);
const SET_EXCLUSIVE_SCISSOR: CommandInfo =
    command_info!("vkCmdSetExclusiveScissorNV", QueueFlags::GRAPHICS, Any);
const SET_FRAGMENT_SHADING_RATE: CommandInfo =
    command_info!("vkCmdSetFragmentShadingRateKHR", QueueFlags::GRAPHICS, Any);

/// The rules for setting viewports, scissors and exclusive scissors, which are shared.
struct ViewportCountVuids {
    count_zero: &'static [&'static str],
    count_max: &'static [&'static str],
    first_nonzero: &'static [&'static str],
    count_multi: &'static [&'static str],
}

/// # Commands to set dynamic state for pipelines.
///
/// These commands require a queue with a pipeline type that uses the given state.
impl CommandBuffer {
    /// Sets the dynamic viewports for future draw calls.
    pub fn set_viewport(
        &self,
        first_viewport: u32,
        viewports: &[Viewport],
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_VIEWPORT, |inner, errors| {
            errors.check(validate_set_viewport(self.device(), first_viewport, viewports));

            for (index, viewport) in (first_viewport..).zip(viewports) {
                inner.builder_state.viewport.insert(index, viewport.clone());
            }
        })
    }

    /// Sets the dynamic scissors for future draw calls.
    pub fn set_scissor(
        &self,
        first_scissor: u32,
        scissors: &[Scissor],
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_SCISSOR, |inner, errors| {
            errors.check(validate_set_scissor(self.device(), first_scissor, scissors));

            for (index, &scissor) in (first_scissor..).zip(scissors) {
                inner.builder_state.scissor.insert(index, scissor);
            }
        })
    }

    /// Sets the dynamic line width for future draw calls.
    ///
    /// A width other than 1.0 requires the
    /// [`wide_lines`](crate::device::DeviceFeatures::wide_lines) feature.
    pub fn set_line_width(&self, line_width: f32) -> Result<(), ValidationErrors> {
        self.record(&SET_LINE_WIDTH, |inner, errors| {
            if line_width != 1.0 && !self.device().enabled_features().wide_lines {
                errors.push(Box::new(ValidationError {
                    context: "line_width".into(),
                    problem: "is not 1.0".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "wide_lines",
                    )])]),
                    vuids: &["VUID-vkCmdSetLineWidth-lineWidth-00788"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                }));
            }

            inner.builder_state.line_width = Some(line_width);
        })
    }

    /// Sets the dynamic depth bias values for future draw calls.
    pub fn set_depth_bias(
        &self,
        constant_factor: f32,
        clamp: f32,
        slope_factor: f32,
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_DEPTH_BIAS, |inner, errors| {
            if clamp != 0.0 && !self.device().enabled_features().depth_bias_clamp {
                errors.push(Box::new(ValidationError {
                    context: "clamp".into(),
                    problem: "is not 0.0".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "depth_bias_clamp",
                    )])]),
                    vuids: &["VUID-vkCmdSetDepthBias-depthBiasClamp-00790"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                }));
            }

            inner.builder_state.depth_bias = Some(DepthBias {
                constant_factor,
                clamp,
                slope_factor,
            });
        })
    }

    /// Sets the dynamic blend constants for future draw calls.
    pub fn set_blend_constants(&self, constants: [f32; 4]) -> Result<(), ValidationErrors> {
        self.record(&SET_BLEND_CONSTANTS, |inner, _errors| {
            inner.builder_state.blend_constants = Some(constants);
        })
    }

    /// Sets the dynamic depth bounds for future draw calls.
    ///
    /// Both bounds must be between 0.0 and 1.0 inclusive.
    pub fn set_depth_bounds(&self, bounds: RangeInclusive<f32>) -> Result<(), ValidationErrors> {
        self.record(&SET_DEPTH_BOUNDS, |inner, errors| {
            for (value, context, vuids) in [
                (
                    *bounds.start(),
                    "bounds.start()",
                    &["VUID-vkCmdSetDepthBounds-minDepthBounds-00600"] as &'static [_],
                ),
                (
                    *bounds.end(),
                    "bounds.end()",
                    &["VUID-vkCmdSetDepthBounds-maxDepthBounds-00601"],
                ),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    errors.push(Box::new(ValidationError {
                        context: context.into(),
                        problem: "is not between 0.0 and 1.0 inclusive".into(),
                        vuids,
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }
            }

            inner.builder_state.depth_bounds = Some(bounds.clone());
        })
    }

    /// Sets the dynamic stencil compare mask for future draw calls.
    pub fn set_stencil_compare_mask(
        &self,
        faces: StencilFaces,
        compare_mask: u32,
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_STENCIL_COMPARE_MASK, |inner, _errors| {
            set_stencil(&mut inner.builder_state.stencil_compare_mask, faces, compare_mask);
        })
    }

    /// Sets the dynamic stencil write mask for future draw calls.
    pub fn set_stencil_write_mask(
        &self,
        faces: StencilFaces,
        write_mask: u32,
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_STENCIL_WRITE_MASK, |inner, _errors| {
            set_stencil(&mut inner.builder_state.stencil_write_mask, faces, write_mask);
        })
    }

    /// Sets the dynamic stencil reference for future draw calls.
    pub fn set_stencil_reference(
        &self,
        faces: StencilFaces,
        reference: u32,
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_STENCIL_REFERENCE, |inner, _errors| {
            set_stencil(&mut inner.builder_state.stencil_reference, faces, reference);
        })
    }

    /// Sets the dynamic exclusive scissors for future draw calls.
    pub fn set_exclusive_scissor(
        &self,
        first_scissor: u32,
        exclusive_scissors: &[Scissor],
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_EXCLUSIVE_SCISSOR, |inner, errors| {
            errors.check(validate_set_exclusive_scissor(
                self.device(),
                first_scissor,
                exclusive_scissors,
            ));

            for (index, &scissor) in (first_scissor..).zip(exclusive_scissors) {
                inner.builder_state.exclusive_scissor.insert(index, scissor);
            }
        })
    }

    /// Sets the dynamic fragment shading rate for future draw calls.
    pub fn set_fragment_shading_rate(
        &self,
        fragment_size: [u32; 2],
        combiner_ops: [FragmentShadingRateCombinerOp; 2],
    ) -> Result<(), ValidationErrors> {
        self.record(&SET_FRAGMENT_SHADING_RATE, |inner, errors| {
            errors.check(validate_set_fragment_shading_rate(
                self.device(),
                fragment_size,
                combiner_ops,
            ));

            inner.builder_state.fragment_shading_rate = Some(FragmentShadingRate {
                fragment_size,
                combiner_ops,
            });
        })
    }
}

fn set_stencil(state: &mut StencilStateDynamic, faces: StencilFaces, value: u32) {
    match faces {
        StencilFaces::Front => state.front = Some(value),
        StencilFaces::Back => state.back = Some(value),
        StencilFaces::FrontAndBack => {
            state.front = Some(value);
            state.back = Some(value);
        }
    }
}

fn validate_viewport_count(
    device: &Device,
    first: u32,
    count: usize,
    vuids: &ViewportCountVuids,
) -> Result<(), Box<ValidationError>> {
    if count == 0 {
        return Err(Box::new(ValidationError {
            problem: "no elements were given".into(),
            vuids: vuids.count_zero,
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if first as u64 + count as u64 > device.properties().max_viewports as u64 {
        return Err(Box::new(ValidationError {
            problem: "the first index plus the number of elements is greater than the \
                `max_viewports` limit"
                .into(),
            vuids: vuids.count_max,
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    if !device.enabled_features().multi_viewport {
        if first != 0 {
            return Err(Box::new(ValidationError {
                problem: "the first index is not 0".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multi_viewport",
                )])]),
                vuids: vuids.first_nonzero,
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        if count > 1 {
            return Err(Box::new(ValidationError {
                problem: "more than one element was given".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multi_viewport",
                )])]),
                vuids: vuids.count_multi,
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

fn validate_set_viewport(
    device: &Device,
    first_viewport: u32,
    viewports: &[Viewport],
) -> Result<(), Box<ValidationError>> {
    validate_viewport_count(
        device,
        first_viewport,
        viewports.len(),
        &ViewportCountVuids {
            count_zero: &["VUID-vkCmdSetViewport-viewportCount-arraylength"],
            count_max: &["VUID-vkCmdSetViewport-firstViewport-01223"],
            first_nonzero: &["VUID-vkCmdSetViewport-firstViewport-01224"],
            count_multi: &["VUID-vkCmdSetViewport-viewportCount-01225"],
        },
    )?;

    let max_dimensions = device.properties().max_viewport_dimensions;

    for (index, viewport) in viewports.iter().enumerate() {
        let Viewport {
            offset: _,
            extent,
            ref depth_range,
        } = *viewport;

        if extent[0] <= 0.0 {
            return Err(Box::new(ValidationError {
                context: format!("viewports[{}].extent[0]", index).into(),
                problem: "is not greater than zero".into(),
                vuids: &["VUID-VkViewport-width-01770"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if extent[0] > max_dimensions[0] as f32 {
            return Err(Box::new(ValidationError {
                context: format!("viewports[{}].extent[0]", index).into(),
                problem: "exceeds the `max_viewport_dimensions[0]` limit".into(),
                vuids: &["VUID-VkViewport-width-01771"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if extent[1].abs() > max_dimensions[1] as f32 {
            return Err(Box::new(ValidationError {
                context: format!("viewports[{}].extent[1]", index).into(),
                problem: "exceeds the `max_viewport_dimensions[1]` limit".into(),
                vuids: &["VUID-VkViewport-height-01773"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if !(0.0..=1.0).contains(&depth_range.start) {
            return Err(Box::new(ValidationError {
                context: format!("viewports[{}].depth_range.start", index).into(),
                problem: "is not between 0.0 and 1.0 inclusive".into(),
                vuids: &["VUID-VkViewport-minDepth-01234"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if !(0.0..=1.0).contains(&depth_range.end) {
            return Err(Box::new(ValidationError {
                context: format!("viewports[{}].depth_range.end", index).into(),
                problem: "is not between 0.0 and 1.0 inclusive".into(),
                vuids: &["VUID-VkViewport-maxDepth-01235"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

fn validate_set_scissor(
    device: &Device,
    first_scissor: u32,
    scissors: &[Scissor],
) -> Result<(), Box<ValidationError>> {
    validate_viewport_count(
        device,
        first_scissor,
        scissors.len(),
        &ViewportCountVuids {
            count_zero: &["VUID-vkCmdSetScissor-scissorCount-arraylength"],
            count_max: &["VUID-vkCmdSetScissor-firstScissor-00592"],
            first_nonzero: &["VUID-vkCmdSetScissor-firstScissor-00593"],
            count_multi: &["VUID-vkCmdSetScissor-scissorCount-00594"],
        },
    )?;

    for (index, scissor) in scissors.iter().enumerate() {
        for dim in 0..2 {
            if scissor.offset[dim] > i32::MAX as u32 {
                return Err(Box::new(ValidationError {
                    context: format!("scissors[{}].offset[{}]", index, dim).into(),
                    problem: "is greater than `i32::MAX`".into(),
                    vuids: &["VUID-vkCmdSetScissor-x-00595"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if scissor.offset[dim] as u64 + scissor.extent[dim] as u64 > i32::MAX as u64 {
                return Err(Box::new(ValidationError {
                    context: format!("scissors[{}]", index).into(),
                    problem: format!("`offset[{0}] + extent[{0}]` is greater than `i32::MAX`", dim)
                        .into(),
                    vuids: &["VUID-vkCmdSetScissor-offset-00596"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }
    }

    Ok(())
}

fn validate_set_exclusive_scissor(
    device: &Device,
    first_scissor: u32,
    exclusive_scissors: &[Scissor],
) -> Result<(), Box<ValidationError>> {
    if !device.enabled_features().exclusive_scissor {
        return Err(Box::new(ValidationError {
            problem: "exclusive scissors are used".into(),
            requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                "exclusive_scissor",
            )])]),
            vuids: &["VUID-vkCmdSetExclusiveScissorNV-None-02031"],
            kind: Some(ViolationKind::FeatureNotEnabled),
            ..Default::default()
        }));
    }

    validate_viewport_count(
        device,
        first_scissor,
        exclusive_scissors.len(),
        &ViewportCountVuids {
            count_zero: &["VUID-vkCmdSetExclusiveScissorNV-exclusiveScissorCount-arraylength"],
            count_max: &["VUID-vkCmdSetExclusiveScissorNV-firstExclusiveScissor-02034"],
            first_nonzero: &["VUID-vkCmdSetExclusiveScissorNV-firstExclusiveScissor-02035"],
            count_multi: &["VUID-vkCmdSetExclusiveScissorNV-exclusiveScissorCount-02036"],
        },
    )?;

    for (index, scissor) in exclusive_scissors.iter().enumerate() {
        for dim in 0..2 {
            if scissor.offset[dim] as u64 + scissor.extent[dim] as u64 > i32::MAX as u64 {
                return Err(Box::new(ValidationError {
                    context: format!("exclusive_scissors[{}]", index).into(),
                    problem: format!("`offset[{0}] + extent[{0}]` is greater than `i32::MAX`", dim)
                        .into(),
                    vuids: &["VUID-vkCmdSetExclusiveScissorNV-offset-02038"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }
    }

    Ok(())
}

fn validate_set_fragment_shading_rate(
    device: &Device,
    fragment_size: [u32; 2],
    combiner_ops: [FragmentShadingRateCombinerOp; 2],
) -> Result<(), Box<ValidationError>> {
    let features = device.enabled_features();

    if !(features.pipeline_fragment_shading_rate
        || features.primitive_fragment_shading_rate
        || features.attachment_fragment_shading_rate)
    {
        return Err(Box::new(ValidationError {
            problem: "fragment shading rates are used".into(),
            requires_one_of: RequiresOneOf(&[
                RequiresAllOf(&[Requires::DeviceFeature("pipeline_fragment_shading_rate")]),
                RequiresAllOf(&[Requires::DeviceFeature("primitive_fragment_shading_rate")]),
                RequiresAllOf(&[Requires::DeviceFeature("attachment_fragment_shading_rate")]),
            ]),
            vuids: &["VUID-vkCmdSetFragmentShadingRateKHR-pipelineFragmentShadingRate-04509"],
            kind: Some(ViolationKind::FeatureNotEnabled),
            ..Default::default()
        }));
    }

    if !features.pipeline_fragment_shading_rate {
        for (size, context, vuids) in [
            (
                fragment_size[0],
                "fragment_size[0]",
                &["VUID-vkCmdSetFragmentShadingRateKHR-pipelineFragmentShadingRate-04507"]
                    as &'static [_],
            ),
            (
                fragment_size[1],
                "fragment_size[1]",
                &["VUID-vkCmdSetFragmentShadingRateKHR-pipelineFragmentShadingRate-04508"],
            ),
        ] {
            if size != 1 {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: "is not 1".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "pipeline_fragment_shading_rate",
                    )])]),
                    vuids,
                    kind: Some(ViolationKind::FeatureNotEnabled),
                }));
            }
        }
    }

    validate_fragment_size(fragment_size, &COMMAND_FRAGMENT_SIZE_VUIDS)?;
    validate_combiner_ops(device, combiner_ops, &COMMAND_COMBINER_OPS_VUIDS)?;

    Ok(())
}

vulkan_enum! {
    /// Specifies which faces of a primitive the stencil state applies to.
    StencilFaces = StencilFaceFlags(u32);

    /// The stencil state of front faces.
    Front = FRONT,

    /// The stencil state of back faces.
    Back = BACK,

    /// The stencil state of both front and back faces.
    FrontAndBack = FRONT_AND_BACK,
}

#[cfg(test)]
mod tests {
    use super::StencilFaces;
    use crate::{
        device::DeviceFeatures,
        pipeline::graphics::{
            fragment_shading_rate::FragmentShadingRateCombinerOp, Scissor, Viewport,
        },
        ViolationKind,
    };

    #[test]
    fn line_width_needs_wide_lines() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_line_width(1.0).unwrap();

        let errors = cb.set_line_width(2.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetLineWidth-lineWidth-00788"));
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }

    #[test]
    fn viewports() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_viewport(0, &[Viewport::default()]).unwrap();

        let errors = cb.set_viewport(1, &[Viewport::default()]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetViewport-firstViewport-01224"));

        let errors = cb
            .set_viewport(0, &[Viewport::default(), Viewport::default()])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetViewport-viewportCount-01225"));

        let errors = cb
            .set_viewport(
                0,
                &[Viewport {
                    depth_range: 0.0..2.0,
                    ..Default::default()
                }],
            )
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkViewport-maxDepth-01235"));
    }

    #[test]
    fn scissors() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_scissor(0, &[Scissor::default(), Scissor::default()])
            .unwrap();

        let errors = cb
            .set_scissor(
                0,
                &[Scissor {
                    offset: [16, 0],
                    extent: [i32::MAX as u32, 16],
                }],
            )
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetScissor-offset-00596"));

        let errors = cb.set_scissor(15, &[Scissor::default(); 2]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetScissor-firstScissor-00592"));
    }

    #[test]
    fn depth_bias_clamp() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_depth_bias(1.0, 0.0, 1.0).unwrap();

        let errors = cb.set_depth_bias(1.0, 0.5, 1.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetDepthBias-depthBiasClamp-00790"));
    }

    #[test]
    fn depth_bounds_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_depth_bounds(0.0..=1.0).unwrap();

        let errors = cb.set_depth_bounds(-0.5..=1.0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetDepthBounds-minDepthBounds-00600"));
    }

    #[test]
    fn stencil_masks() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_stencil_compare_mask(StencilFaces::FrontAndBack, 0xff)
            .unwrap();
        cb.set_stencil_write_mask(StencilFaces::Front, 0x0f).unwrap();
        cb.set_stencil_reference(StencilFaces::Back, 1).unwrap();
        cb.set_blend_constants([0.0; 4]).unwrap();
        cb.end().unwrap();
    }

    #[test]
    fn exclusive_scissor_needs_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .set_exclusive_scissor(0, &[Scissor::default()])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetExclusiveScissorNV-None-02031"));
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }

    #[test]
    fn fragment_shading_rate() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.set_fragment_shading_rate(
            [2, 2],
            [
                FragmentShadingRateCombinerOp::Keep,
                FragmentShadingRateCombinerOp::Replace,
            ],
        )
        .unwrap();

        let errors = cb
            .set_fragment_shading_rate([3, 1], [FragmentShadingRateCombinerOp::Keep; 2])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04515"));

        // The default properties don't allow non-trivial combiner operations.
        let errors = cb
            .set_fragment_shading_rate(
                [1, 1],
                [
                    FragmentShadingRateCombinerOp::Max,
                    FragmentShadingRateCombinerOp::Keep,
                ],
            )
            .unwrap_err();
        assert!(errors.contains_vuid(
            "VUID-vkCmdSetFragmentShadingRateKHR-fragmentSizeNonTrivialCombinerOps-04512"
        ));
    }

    #[test]
    fn fragment_shading_rate_needs_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .set_fragment_shading_rate([1, 1], [FragmentShadingRateCombinerOp::Keep; 2])
            .unwrap_err();
        assert!(errors.contains_vuid(
            "VUID-vkCmdSetFragmentShadingRateKHR-pipelineFragmentShadingRate-04509"
        ));
    }
}
