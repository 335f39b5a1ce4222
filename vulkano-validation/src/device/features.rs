// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

macro_rules! features {
    {
        $($member:ident => $vk:ident,)*
    } => {
        /// Represents the features that are enabled on a device.
        ///
        /// Every rule that depends on a feature consults this struct. A device created with
        /// `DeviceFeatures::empty()` enables nothing beyond Vulkan 1.0 core functionality.
        ///
        /// # Example
        ///
        /// ```
        /// use vulkano_validation::device::DeviceFeatures;
        ///
        /// let features = DeviceFeatures {
        ///     multiview: true,
        ///     dynamic_rendering: true,
        ///     ..DeviceFeatures::empty()
        /// };
        ///
        /// assert!(DeviceFeatures::all().contains(&features));
        /// ```
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct DeviceFeatures {
            $(
                #[doc = concat!("Vulkan feature `", stringify!($vk), "`.")]
                pub $member: bool,
            )*
        }

        impl DeviceFeatures {
            /// Returns a `DeviceFeatures` with none of the members set.
            #[inline]
            pub const fn empty() -> Self {
                Self {
                    $($member: false,)*
                }
            }

            /// Returns a `DeviceFeatures` with all of the members set.
            #[inline]
            pub const fn all() -> Self {
                Self {
                    $($member: true,)*
                }
            }

            /// Returns whether any members are set in both `self` and `other`.
            #[inline]
            pub const fn intersects(&self, other: &Self) -> bool {
                $((self.$member && other.$member))||*
            }

            /// Returns whether all members in `other` are set in `self`.
            #[inline]
            pub const fn contains(&self, other: &Self) -> bool {
                $((self.$member || !other.$member))&&*
            }

            /// Returns the union of `self` and `other`.
            #[inline]
            pub const fn union(&self, other: &Self) -> Self {
                Self {
                    $($member: self.$member || other.$member,)*
                }
            }

            /// Returns the intersection of `self` and `other`.
            #[inline]
            pub const fn intersection(&self, other: &Self) -> Self {
                Self {
                    $($member: self.$member && other.$member,)*
                }
            }

            /// Returns `self` without the members set in `other`.
            #[inline]
            pub const fn difference(&self, other: &Self) -> Self {
                Self {
                    $($member: self.$member && !other.$member,)*
                }
            }

            /// Returns the names of the members that are set.
            pub fn iter_enabled(&self) -> impl Iterator<Item = &'static str> {
                [$((stringify!($member), self.$member),)*]
                    .into_iter()
                    .filter_map(|(name, enabled)| enabled.then_some(name))
            }
        }
    };
}

features! {
    robust_buffer_access => robustBufferAccess,
    multi_viewport => multiViewport,
    wide_lines => wideLines,
    depth_bias_clamp => depthBiasClamp,
    depth_bounds => depthBounds,
    multi_draw_indirect => multiDrawIndirect,
    draw_indirect_first_instance => drawIndirectFirstInstance,
    occlusion_query_precise => occlusionQueryPrecise,
    pipeline_statistics_query => pipelineStatisticsQuery,
    inherited_queries => inheritedQueries,
    shader_storage_image_multisample => shaderStorageImageMultisample,
    multiview => multiview,
    multiview_geometry_shader => multiviewGeometryShader,
    protected_memory => protectedMemory,
    draw_indirect_count => drawIndirectCount,
    descriptor_binding_update_after_bind => descriptorBindingUniformTexelBufferUpdateAfterBind,
    descriptor_binding_partially_bound => descriptorBindingPartiallyBound,
    dynamic_rendering => dynamicRendering,
    transform_feedback => transformFeedback,
    geometry_streams => geometryStreams,
    conditional_rendering => conditionalRendering,
    inherited_conditional_rendering => inheritedConditionalRendering,
    pipeline_fragment_shading_rate => pipelineFragmentShadingRate,
    primitive_fragment_shading_rate => primitiveFragmentShadingRate,
    attachment_fragment_shading_rate => attachmentFragmentShadingRate,
    exclusive_scissor => exclusiveScissor,
    index_type_uint8 => indexTypeUint8,
}

#[cfg(test)]
mod tests {
    use super::DeviceFeatures;

    #[test]
    fn set_operations() {
        let a = DeviceFeatures {
            multiview: true,
            wide_lines: true,
            ..DeviceFeatures::empty()
        };
        let b = DeviceFeatures {
            multiview: true,
            dynamic_rendering: true,
            ..DeviceFeatures::empty()
        };

        assert!(a.intersects(&b));
        assert!(!a.contains(&b));
        assert!(a.union(&b).contains(&b));
        assert_eq!(
            a.difference(&b),
            DeviceFeatures {
                wide_lines: true,
                ..DeviceFeatures::empty()
            }
        );
        assert_eq!(
            a.intersection(&b).iter_enabled().collect::<Vec<_>>(),
            ["multiview"]
        );
    }
}
