// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! How to retrieve data from a sampled image within a shader.
//!
//! A sampler is bound to a descriptor together with an image view. When the sampler uses
//! unnormalized coordinates, the shader may only perform a restricted set of sampling
//! operations with it; this is checked when a draw or dispatch consumes the descriptor.

use crate::{
    device::{Device, DeviceOwned},
    macros::vulkan_enum,
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Describes how to retrieve data from a sampled image within a shader.
pub struct Sampler {
    device: Arc<Device>,
    handle: Handle,

    mag_filter: Filter,
    min_filter: Filter,
    mipmap_mode: SamplerMipmapMode,
    address_mode: [SamplerAddressMode; 3],
    lod: [f32; 2],
    unnormalized_coordinates: bool,
}

impl Sampler {
    /// Creates a new `Sampler`.
    pub fn new(
        device: Arc<Device>,
        create_info: SamplerCreateInfo,
    ) -> Result<Arc<Sampler>, ValidationErrors> {
        device.report_one(
            create_info
                .validate(&device)
                .map_err(|err| err.add_context("create_info")),
        )?;

        Ok(Self::new_unchecked(device, create_info))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: SamplerCreateInfo) -> Arc<Sampler> {
        let SamplerCreateInfo {
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            lod,
            unnormalized_coordinates,
            _ne: _,
        } = create_info;

        Arc::new(Sampler {
            handle: device.registry().register(ObjectType::Sampler, None),
            device,
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            lod,
            unnormalized_coordinates,
        })
    }

    /// Returns the magnification filter.
    #[inline]
    pub fn mag_filter(&self) -> Filter {
        self.mag_filter
    }

    /// Returns the minification filter.
    #[inline]
    pub fn min_filter(&self) -> Filter {
        self.min_filter
    }

    /// Returns the mipmap mode.
    #[inline]
    pub fn mipmap_mode(&self) -> SamplerMipmapMode {
        self.mipmap_mode
    }

    /// Returns the address modes for the u, v and w coordinates.
    #[inline]
    pub fn address_mode(&self) -> [SamplerAddressMode; 3] {
        self.address_mode
    }

    /// Returns the range of level of detail that mipmaps are taken from.
    #[inline]
    pub fn lod(&self) -> [f32; 2] {
        self.lod
    }

    /// Returns whether the sampler uses unnormalized coordinates.
    #[inline]
    pub fn unnormalized_coordinates(&self) -> bool {
        self.unnormalized_coordinates
    }

    /// Returns whether the sampler uses linear filtering in any way.
    #[inline]
    pub(crate) fn uses_linear_filter(&self) -> bool {
        self.mag_filter == Filter::Linear
            || self.min_filter == Filter::Linear
            || self.mipmap_mode == SamplerMipmapMode::Linear
    }
}

impl Drop for Sampler {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for Sampler {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Sampler {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Sampler {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Sampler")
            .field("handle", &self.handle)
            .field("mag_filter", &self.mag_filter)
            .field("min_filter", &self.min_filter)
            .field("unnormalized_coordinates", &self.unnormalized_coordinates)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `Sampler`.
#[derive(Clone, Debug)]
pub struct SamplerCreateInfo {
    /// How the sampled value of a single mipmap should be calculated when magnification is
    /// applied (LOD <= 0.0).
    ///
    /// The default value is [`Filter::Nearest`].
    pub mag_filter: Filter,

    /// How the sampled value of a single mipmap should be calculated when minification is
    /// applied (LOD > 0.0).
    ///
    /// The default value is [`Filter::Nearest`].
    pub min_filter: Filter,

    /// How the final sampled value should be calculated from the samples of individual
    /// mipmaps.
    ///
    /// The default value is [`SamplerMipmapMode::Nearest`].
    pub mipmap_mode: SamplerMipmapMode,

    /// How out-of-range texture coordinates should be treated, for the `u`, `v` and `w`
    /// texture coordinate indices respectively.
    ///
    /// The default value is [`SamplerAddressMode::ClampToEdge`].
    pub address_mode: [SamplerAddressMode; 3],

    /// The minimum and maximum LOD value to use.
    ///
    /// The default value is `[0.0, 0.0]`.
    pub lod: [f32; 2],

    /// Whether the sampler uses texel coordinates in the range `[0, size)` instead of
    /// normalized coordinates in the range `[0.0, 1.0)`.
    ///
    /// The default value is `false`.
    pub unnormalized_coordinates: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for SamplerCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: SamplerMipmapMode::Nearest,
            address_mode: [SamplerAddressMode::ClampToEdge; 3],
            lod: [0.0; 2],
            unnormalized_coordinates: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SamplerCreateInfo {
    /// Shortcut for creating a sampler with linear sampling, linear mipmaps, and with the
    /// repeat mode for borders.
    #[inline]
    pub fn simple_repeat_linear() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: SamplerMipmapMode::Linear,
            address_mode: [SamplerAddressMode::Repeat; 3],
            lod: [0.0, 1000.0],
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, _device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            lod,
            unnormalized_coordinates,
            _ne: _,
        } = self;

        if lod[0] > lod[1] {
            return Err(Box::new(ValidationError {
                context: "lod".into(),
                problem: "the minimum is greater than the maximum".into(),
                vuids: &["VUID-VkSamplerCreateInfo-maxLod-01973"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if unnormalized_coordinates {
            if min_filter != mag_filter {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `min_filter` and \
                        `mag_filter` are not equal"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01072"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if mipmap_mode != SamplerMipmapMode::Nearest {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `mipmap_mode` is not \
                        `SamplerMipmapMode::Nearest`"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01073"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if lod != [0.0; 2] {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `lod` is not `[0.0; 2]`"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01074"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if address_mode[0..2].iter().any(|mode| {
                !matches!(
                    mode,
                    SamplerAddressMode::ClampToEdge | SamplerAddressMode::ClampToBorder
                )
            }) {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `address_mode[0]` or \
                        `address_mode[1]` are not `SamplerAddressMode::ClampToEdge` or \
                        `SamplerAddressMode::ClampToBorder`"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01075"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_enum! {
    /// Describes how the color of each pixel should be determined.
    Filter = Filter(i32);

    /// The pixel whose center is nearest to the requested coordinates is taken from the source
    /// and its value is returned as-is.
    Nearest = NEAREST,

    /// The 8/4/2 pixels (depending on view dimensionality) whose center surround the requested
    /// coordinates are taken, then their values are combined according to the chosen
    /// `reduction_mode`.
    Linear = LINEAR,
}

vulkan_enum! {
    /// Describes which mipmap from the source to use.
    SamplerMipmapMode = SamplerMipmapMode(i32);

    /// Use the mipmap whose dimensions are the nearest to the dimensions of the destination.
    Nearest = NEAREST,

    /// Take the mipmap whose dimensions are no greater than that of the destination together
    /// with the next higher level mipmap, calculate the value for both, and interpolate them.
    Linear = LINEAR,
}

vulkan_enum! {
    /// How the sampler should behave when it needs to access a pixel that is out of range of the
    /// texture.
    SamplerAddressMode = SamplerAddressMode(i32);

    /// Repeat the texture. In other words, the pixel at coordinate `x + 1.0` is the same as the
    /// one at coordinate `x`.
    Repeat = REPEAT,

    /// Repeat the texture but mirror it at every repetition.
    MirroredRepeat = MIRRORED_REPEAT,

    /// The coordinates are clamped to the valid range. Coordinates below 0.0 have the same value
    /// as coordinate 0.0. Coordinates over 1.0 have the same value as coordinate 1.0.
    ClampToEdge = CLAMP_TO_EDGE,

    /// Any pixel out of range is colored using the colour selected with the `border_color` on the
    /// `SamplerBuilder`.
    ClampToBorder = CLAMP_TO_BORDER,
}
