// Copyright (c) 2023 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Fragment shading rate introduces the ability to change the rate at which fragments are shaded.
//!
//! The rate can be specified per pipeline, per primitive, or per attachment region, and the
//! combiner operations decide how the three rates are combined.

use crate::{
    device::Device, macros::vulkan_enum, Requires, RequiresAllOf, RequiresOneOf,
    ValidationError, ViolationKind,
};

/// The state in a graphics pipeline describing the fragment shading rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentShadingRateState {
    /// The pipeline fragment shading rate.
    ///
    /// The default value is `[1, 1]`.
    pub fragment_size: [u32; 2],

    /// Determines how the pipeline, primitive, and attachment shading rates are combined for
    /// fragments generated.
    ///
    /// The default value is `[FragmentShadingRateCombinerOp::Keep; 2]`.
    pub combiner_ops: [FragmentShadingRateCombinerOp; 2],

    pub _ne: crate::NonExhaustive,
}

impl Default for FragmentShadingRateState {
    #[inline]
    fn default() -> Self {
        Self {
            fragment_size: [1, 1],
            combiner_ops: [FragmentShadingRateCombinerOp::Keep; 2],
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl FragmentShadingRateState {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            fragment_size,
            combiner_ops,
            _ne: _,
        } = self;

        validate_fragment_size(fragment_size, &PIPELINE_FRAGMENT_SIZE_VUIDS)?;

        if !device.enabled_features().pipeline_fragment_shading_rate {
            return Err(Box::new(ValidationError {
                context: "fragment_size".into(),
                problem: "a fragment shading rate state is provided".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "pipeline_fragment_shading_rate",
                )])]),
                vuids: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04500"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        validate_combiner_ops(device, combiner_ops, &PIPELINE_COMBINER_OPS_VUIDS)
    }
}

/// The VUIDs that differ between the pipeline state and the dynamic command.
pub(crate) struct FragmentSizeVuids {
    pub(crate) width_zero: &'static [&'static str],
    pub(crate) height_zero: &'static [&'static str],
    pub(crate) width_power_of_two: &'static [&'static str],
    pub(crate) height_power_of_two: &'static [&'static str],
    pub(crate) width_max: &'static [&'static str],
    pub(crate) height_max: &'static [&'static str],
}

pub(crate) struct CombinerOpsVuids {
    pub(crate) parameter: [&'static [&'static str]; 2],
    pub(crate) primitive: &'static [&'static str],
    pub(crate) attachment: &'static [&'static str],
    pub(crate) non_trivial: &'static [&'static str],
}

const PIPELINE_FRAGMENT_SIZE_VUIDS: FragmentSizeVuids = FragmentSizeVuids {
    width_zero: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04494"],
    height_zero: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04495"],
    width_power_of_two: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04496"],
    height_power_of_two: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04497"],
    width_max: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04498"],
    height_max: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04499"],
};

const PIPELINE_COMBINER_OPS_VUIDS: CombinerOpsVuids = CombinerOpsVuids {
    parameter: [
        &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-06567"],
        &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-06568"],
    ],
    primitive: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04501"],
    attachment: &["VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04502"],
    non_trivial: &["VUID-VkGraphicsPipelineCreateInfo-fragmentShadingRateNonTrivialCombinerOps-04506"],
};

pub(crate) const COMMAND_FRAGMENT_SIZE_VUIDS: FragmentSizeVuids = FragmentSizeVuids {
    width_zero: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04513"],
    height_zero: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04514"],
    width_power_of_two: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04515"],
    height_power_of_two: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04516"],
    width_max: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04517"],
    height_max: &["VUID-vkCmdSetFragmentShadingRateKHR-pFragmentSize-04518"],
};

pub(crate) const COMMAND_COMBINER_OPS_VUIDS: CombinerOpsVuids = CombinerOpsVuids {
    parameter: [
        &["VUID-vkCmdSetFragmentShadingRateKHR-combinerOps-parameter"],
        &["VUID-vkCmdSetFragmentShadingRateKHR-combinerOps-parameter"],
    ],
    primitive: &["VUID-vkCmdSetFragmentShadingRateKHR-primitiveFragmentShadingRate-04510"],
    attachment: &["VUID-vkCmdSetFragmentShadingRateKHR-attachmentFragmentShadingRate-04511"],
    non_trivial: &["VUID-vkCmdSetFragmentShadingRateKHR-fragmentSizeNonTrivialCombinerOps-04512"],
};

/// Each dimension must be 1, 2 or 4.
pub(crate) fn validate_fragment_size(
    fragment_size: [u32; 2],
    vuids: &FragmentSizeVuids,
) -> Result<(), Box<ValidationError>> {
    let dimensions = [
        (
            fragment_size[0],
            "fragment_size[0]",
            vuids.width_zero,
            vuids.width_power_of_two,
            vuids.width_max,
        ),
        (
            fragment_size[1],
            "fragment_size[1]",
            vuids.height_zero,
            vuids.height_power_of_two,
            vuids.height_max,
        ),
    ];

    for (size, context, zero_vuids, power_of_two_vuids, max_vuids) in dimensions {
        let (problem, vuids) = if size == 0 {
            ("is zero", zero_vuids)
        } else if !size.is_power_of_two() {
            ("is not a power of two", power_of_two_vuids)
        } else if size > 4 {
            ("is greater than 4", max_vuids)
        } else {
            continue;
        };

        return Err(Box::new(ValidationError {
            context: context.into(),
            problem: problem.into(),
            vuids,
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    Ok(())
}

pub(crate) fn validate_combiner_ops(
    device: &Device,
    combiner_ops: [FragmentShadingRateCombinerOp; 2],
    vuids: &CombinerOpsVuids,
) -> Result<(), Box<ValidationError>> {
    let features = device.enabled_features();

    for (index, combiner_op) in combiner_ops.into_iter().enumerate() {
        combiner_op.validate_device(device).map_err(|err| {
            err.add_context(format!("combiner_ops[{}]", index))
                .set_vuids(vuids.parameter[index])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;
    }

    if combiner_ops[0] != FragmentShadingRateCombinerOp::Keep
        && !features.primitive_fragment_shading_rate
    {
        return Err(Box::new(ValidationError {
            context: "combiner_ops[0]".into(),
            problem: "is not `FragmentShadingRateCombinerOp::Keep`".into(),
            requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                "primitive_fragment_shading_rate",
            )])]),
            vuids: vuids.primitive,
            kind: Some(ViolationKind::FeatureNotEnabled),
        }));
    }

    if combiner_ops[1] != FragmentShadingRateCombinerOp::Keep
        && !features.attachment_fragment_shading_rate
    {
        return Err(Box::new(ValidationError {
            context: "combiner_ops[1]".into(),
            problem: "is not `FragmentShadingRateCombinerOp::Keep`".into(),
            requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                "attachment_fragment_shading_rate",
            )])]),
            vuids: vuids.attachment,
            kind: Some(ViolationKind::FeatureNotEnabled),
        }));
    }

    if !device
        .properties()
        .fragment_shading_rate_non_trivial_combiner_ops
    {
        for (index, combiner_op) in combiner_ops.into_iter().enumerate() {
            if !matches!(
                combiner_op,
                FragmentShadingRateCombinerOp::Keep | FragmentShadingRateCombinerOp::Replace
            ) {
                return Err(Box::new(ValidationError {
                    context: format!("combiner_ops[{}]", index).into(),
                    problem: "is not `FragmentShadingRateCombinerOp::Keep` or \
                        `FragmentShadingRateCombinerOp::Replace`, but the \
                        `fragment_shading_rate_non_trivial_combiner_ops` property is `false`"
                        .into(),
                    vuids: vuids.non_trivial,
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }
        }
    }

    Ok(())
}

vulkan_enum! {
    /// Control how fragment shading rates are combined.
    FragmentShadingRateCombinerOp = FragmentShadingRateCombinerOpKHR(i32);

    /// Specifies a combiner operation of combine(Axy,Bxy) = Axy.
    Keep = KEEP,

    /// Specifies a combiner operation of combine(Axy,Bxy) = Bxy.
    Replace = REPLACE,

    /// Specifies a combiner operation of combine(Axy,Bxy) = min(Axy,Bxy).
    Min = MIN,

    /// Specifies a combiner operation of combine(Axy,Bxy) = max(Axy,Bxy).
    Max = MAX,

    /// Specifies a combiner operation of combine(Axy,Bxy) = Axy*Bxy.
    Mul = MUL,
}

#[cfg(test)]
mod tests {
    use super::{FragmentShadingRateCombinerOp, FragmentShadingRateState};
    use crate::device::DeviceFeatures;

    #[test]
    fn fragment_size() {
        let (device, _queue) = gfx_dev_and_queue!();

        for (fragment_size, vuid) in [
            ([0, 1], "VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04494"),
            ([1, 3], "VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04497"),
            ([8, 1], "VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04498"),
        ] {
            let state = FragmentShadingRateState {
                fragment_size,
                ..Default::default()
            };
            assert_eq!(state.validate(&device).unwrap_err().message_id(), vuid);
        }

        let state = FragmentShadingRateState {
            fragment_size: [2, 4],
            ..Default::default()
        };
        assert!(state.validate(&device).is_ok());
    }

    #[test]
    fn combiner_ops_need_features() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures {
            pipeline_fragment_shading_rate: true,
            ..DeviceFeatures::empty()
        });

        let state = FragmentShadingRateState {
            combiner_ops: [
                FragmentShadingRateCombinerOp::Replace,
                FragmentShadingRateCombinerOp::Keep,
            ],
            ..Default::default()
        };
        assert_eq!(
            state.validate(&device).unwrap_err().message_id(),
            "VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04501"
        );

        let state = FragmentShadingRateState {
            combiner_ops: [
                FragmentShadingRateCombinerOp::Keep,
                FragmentShadingRateCombinerOp::Min,
            ],
            ..Default::default()
        };
        assert_eq!(
            state.validate(&device).unwrap_err().message_id(),
            "VUID-VkGraphicsPipelineCreateInfo-pDynamicState-04502"
        );
    }

    #[test]
    fn non_trivial_combiner_ops() {
        let (device, _queue) = gfx_dev_and_queue!();
        let state = FragmentShadingRateState {
            combiner_ops: [
                FragmentShadingRateCombinerOp::Max,
                FragmentShadingRateCombinerOp::Keep,
            ],
            ..Default::default()
        };
        assert_eq!(
            state.validate(&device).unwrap_err().message_id(),
            "VUID-VkGraphicsPipelineCreateInfo-fragmentShadingRateNonTrivialCombinerOps-04506"
        );
    }
}
