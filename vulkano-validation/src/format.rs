// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! All the formats supported by the validation model.
//!
//! The format table describes the size of a texel block, the aspects and planes of each format,
//! and the format features that a device supports for it by default. A device can override the
//! features of individual formats through
//! [`DeviceCreateInfo::format_properties`](crate::device::DeviceCreateInfo::format_properties),
//! to model implementations that support more (or less) than the defaults.

use crate::{
    image::ImageAspects,
    macros::{vulkan_bitflags, vulkan_enum},
    DeviceSize,
};

vulkan_enum! {
    /// A format that describes how texels are laid out in memory.
    Format = Format(i32);

    R8_UNORM = R8_UNORM,
    R8_UINT = R8_UINT,
    R8G8_UNORM = R8G8_UNORM,
    R8G8B8A8_UNORM = R8G8B8A8_UNORM,
    R8G8B8A8_SRGB = R8G8B8A8_SRGB,
    R8G8B8A8_UINT = R8G8B8A8_UINT,
    B8G8R8A8_UNORM = B8G8R8A8_UNORM,
    R16_UINT = R16_UINT,
    R16G16B16A16_SFLOAT = R16G16B16A16_SFLOAT,
    R32_UINT = R32_UINT,
    R32_SINT = R32_SINT,
    R32_SFLOAT = R32_SFLOAT,
    R32G32_SFLOAT = R32G32_SFLOAT,
    R32G32B32_SFLOAT = R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT = R32G32B32A32_SFLOAT,
    R32G32B32A32_UINT = R32G32B32A32_UINT,
    D16_UNORM = D16_UNORM,
    D32_SFLOAT = D32_SFLOAT,
    S8_UINT = S8_UINT,
    D24_UNORM_S8_UINT = D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT = D32_SFLOAT_S8_UINT,
    G8_B8R8_2PLANE_420_UNORM = G8_B8R8_2PLANE_420_UNORM,
    G8_B8_R8_3PLANE_420_UNORM = G8_B8_R8_3PLANE_420_UNORM,
}

impl Format {
    /// Returns the size in bytes of a single texel block of the format.
    ///
    /// Multi-planar formats have no texel block of their own; `0` is returned for them, and the
    /// formats of the individual [planes](Self::planes) must be used instead.
    pub const fn block_size(self) -> DeviceSize {
        match self {
            Format::R8_UNORM | Format::R8_UINT | Format::S8_UINT => 1,
            Format::R8G8_UNORM | Format::R16_UINT | Format::D16_UNORM => 2,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::R8G8B8A8_UINT
            | Format::B8G8R8A8_UNORM
            | Format::R32_UINT
            | Format::R32_SINT
            | Format::R32_SFLOAT
            | Format::D32_SFLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::R16G16B16A16_SFLOAT | Format::R32G32_SFLOAT | Format::D32_SFLOAT_S8_UINT => 8,
            Format::R32G32B32_SFLOAT => 12,
            Format::R32G32B32A32_SFLOAT | Format::R32G32B32A32_UINT => 16,
            Format::G8_B8R8_2PLANE_420_UNORM | Format::G8_B8_R8_3PLANE_420_UNORM => 0,
        }
    }

    /// Returns the aspects that images of this format have.
    pub const fn aspects(self) -> ImageAspects {
        match self {
            Format::D16_UNORM | Format::D32_SFLOAT => ImageAspects::DEPTH,
            Format::S8_UINT => ImageAspects::STENCIL,
            Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT => {
                ImageAspects::DEPTH.union(ImageAspects::STENCIL)
            }
            Format::G8_B8R8_2PLANE_420_UNORM => ImageAspects::COLOR
                .union(ImageAspects::PLANE_0)
                .union(ImageAspects::PLANE_1),
            Format::G8_B8_R8_3PLANE_420_UNORM => ImageAspects::COLOR
                .union(ImageAspects::PLANE_0)
                .union(ImageAspects::PLANE_1)
                .union(ImageAspects::PLANE_2),
            _ => ImageAspects::COLOR,
        }
    }

    /// For multi-planar formats, returns the formats that each plane is compatible with.
    /// Returns an empty slice for other formats.
    pub const fn planes(self) -> &'static [Format] {
        match self {
            Format::G8_B8R8_2PLANE_420_UNORM => &[Format::R8_UNORM, Format::R8G8_UNORM],
            Format::G8_B8_R8_3PLANE_420_UNORM => {
                &[Format::R8_UNORM, Format::R8_UNORM, Format::R8_UNORM]
            }
            _ => &[],
        }
    }

    /// For YCbCr formats, returns the chroma subsampling of the format.
    pub const fn ycbcr_chroma_sampling(self) -> Option<ChromaSampling> {
        match self {
            Format::G8_B8R8_2PLANE_420_UNORM | Format::G8_B8_R8_3PLANE_420_UNORM => {
                Some(ChromaSampling::Mode420)
            }
            _ => None,
        }
    }

    /// Returns the numeric type of the color aspect of the format, if it has one.
    pub const fn numeric_format_color(self) -> Option<NumericType> {
        match self {
            Format::R8_UNORM
            | Format::R8G8_UNORM
            | Format::R8G8B8A8_UNORM
            | Format::B8G8R8A8_UNORM
            | Format::G8_B8R8_2PLANE_420_UNORM
            | Format::G8_B8_R8_3PLANE_420_UNORM => Some(NumericType::UNORM),
            Format::R8G8B8A8_SRGB => Some(NumericType::SRGB),
            Format::R8_UINT | Format::R8G8B8A8_UINT | Format::R16_UINT | Format::R32_UINT => {
                Some(NumericType::UINT)
            }
            Format::R32G32B32A32_UINT => Some(NumericType::UINT),
            Format::R32_SINT => Some(NumericType::SINT),
            Format::R16G16B16A16_SFLOAT
            | Format::R32_SFLOAT
            | Format::R32G32_SFLOAT
            | Format::R32G32B32_SFLOAT
            | Format::R32G32B32A32_SFLOAT => Some(NumericType::SFLOAT),
            Format::D16_UNORM
            | Format::D32_SFLOAT
            | Format::S8_UINT
            | Format::D24_UNORM_S8_UINT
            | Format::D32_SFLOAT_S8_UINT => None,
        }
    }

    /// Returns the number of components of the color aspect of the format.
    pub const fn components(self) -> u32 {
        match self {
            Format::R8G8_UNORM | Format::R32G32_SFLOAT => 2,
            Format::R32G32B32_SFLOAT
            | Format::G8_B8R8_2PLANE_420_UNORM
            | Format::G8_B8_R8_3PLANE_420_UNORM => 3,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::R8G8B8A8_UINT
            | Format::B8G8R8A8_UNORM
            | Format::R16G16B16A16_SFLOAT
            | Format::R32G32B32A32_SFLOAT
            | Format::R32G32B32A32_UINT => 4,
            _ => 1,
        }
    }

    /// Returns whether the format is a depth and/or stencil format.
    #[inline]
    pub const fn is_depth_stencil(self) -> bool {
        self.aspects()
            .intersects(ImageAspects::DEPTH.union(ImageAspects::STENCIL))
    }

    /// Returns whether the format has more than one plane.
    #[inline]
    pub const fn is_multi_planar(self) -> bool {
        !self.planes().is_empty()
    }

    /// Returns the extent of plane `plane` of an image with the format and extent `extent`.
    pub(crate) fn plane_extent(self, plane: usize, extent: [u32; 3]) -> [u32; 3] {
        match (plane, self.ycbcr_chroma_sampling()) {
            (1.., Some(ChromaSampling::Mode420)) => {
                [(extent[0] + 1) / 2, (extent[1] + 1) / 2, extent[2]]
            }
            (1.., Some(ChromaSampling::Mode422)) => [(extent[0] + 1) / 2, extent[1], extent[2]],
            _ => extent,
        }
    }

    /// Returns the format features that a device supports for the format unless it overrides
    /// them.
    pub fn default_properties(self) -> FormatProperties {
        const COLOR: FormatFeatures = FormatFeatures::SAMPLED_IMAGE
            .union(FormatFeatures::COLOR_ATTACHMENT)
            .union(FormatFeatures::BLIT_SRC)
            .union(FormatFeatures::BLIT_DST)
            .union(FormatFeatures::TRANSFER_SRC)
            .union(FormatFeatures::TRANSFER_DST);
        const FILTERABLE: FormatFeatures = FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
            .union(FormatFeatures::COLOR_ATTACHMENT_BLEND);
        const DEPTH_STENCIL: FormatFeatures = FormatFeatures::SAMPLED_IMAGE
            .union(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
            .union(FormatFeatures::BLIT_SRC)
            .union(FormatFeatures::TRANSFER_SRC)
            .union(FormatFeatures::TRANSFER_DST);
        const TEXEL_BUFFER: FormatFeatures = FormatFeatures::UNIFORM_TEXEL_BUFFER
            .union(FormatFeatures::STORAGE_TEXEL_BUFFER)
            .union(FormatFeatures::VERTEX_BUFFER);
        const ATOMIC: FormatFeatures = FormatFeatures::STORAGE_IMAGE_ATOMIC
            .union(FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC);

        let (optimal_tiling_features, buffer_features) = match self {
            Format::R8_UNORM | Format::R8G8_UNORM => (
                COLOR.union(FILTERABLE),
                FormatFeatures::UNIFORM_TEXEL_BUFFER.union(FormatFeatures::VERTEX_BUFFER),
            ),
            Format::R8G8B8A8_UNORM => (
                COLOR
                    .union(FILTERABLE)
                    .union(FormatFeatures::STORAGE_IMAGE),
                TEXEL_BUFFER,
            ),
            Format::B8G8R8A8_UNORM => (
                COLOR.union(FILTERABLE),
                FormatFeatures::UNIFORM_TEXEL_BUFFER.union(FormatFeatures::VERTEX_BUFFER),
            ),
            Format::R8G8B8A8_SRGB => (COLOR.union(FILTERABLE), FormatFeatures::empty()),
            Format::R16G16B16A16_SFLOAT => (
                COLOR
                    .union(FILTERABLE)
                    .union(FormatFeatures::STORAGE_IMAGE),
                TEXEL_BUFFER,
            ),
            Format::R8_UINT | Format::R16_UINT => (
                COLOR,
                FormatFeatures::UNIFORM_TEXEL_BUFFER.union(FormatFeatures::VERTEX_BUFFER),
            ),
            Format::R8G8B8A8_UINT | Format::R32G32B32A32_UINT => {
                (COLOR.union(FormatFeatures::STORAGE_IMAGE), TEXEL_BUFFER)
            }
            Format::R32_UINT | Format::R32_SINT => (
                COLOR.union(FormatFeatures::STORAGE_IMAGE).union(ATOMIC),
                TEXEL_BUFFER.union(FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC),
            ),
            Format::R32_SFLOAT | Format::R32G32_SFLOAT | Format::R32G32B32A32_SFLOAT => {
                (COLOR.union(FormatFeatures::STORAGE_IMAGE), TEXEL_BUFFER)
            }
            Format::R32G32B32_SFLOAT => (FormatFeatures::empty(), FormatFeatures::VERTEX_BUFFER),
            Format::D16_UNORM
            | Format::D32_SFLOAT
            | Format::S8_UINT
            | Format::D24_UNORM_S8_UINT
            | Format::D32_SFLOAT_S8_UINT => (DEPTH_STENCIL, FormatFeatures::empty()),
            Format::G8_B8R8_2PLANE_420_UNORM | Format::G8_B8_R8_3PLANE_420_UNORM => (
                FormatFeatures::SAMPLED_IMAGE
                    .union(FormatFeatures::TRANSFER_SRC)
                    .union(FormatFeatures::TRANSFER_DST),
                FormatFeatures::empty(),
            ),
        };

        FormatProperties {
            linear_tiling_features: optimal_tiling_features.intersection(
                FormatFeatures::TRANSFER_SRC
                    .union(FormatFeatures::TRANSFER_DST)
                    .union(FormatFeatures::SAMPLED_IMAGE)
                    .union(FormatFeatures::BLIT_SRC),
            ),
            optimal_tiling_features,
            buffer_features,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// For YCbCr formats, the type of chroma sampling used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChromaSampling {
    /// The chroma components are represented at the same resolution as the luma component.
    Mode444,
    /// The chroma components have half the horizontal resolution as the luma component.
    Mode422,
    /// The chroma components have half the horizontal and vertical resolution as the luma
    /// component.
    Mode420,
}

/// The numeric type that represents data of a format in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericType {
    /// Signed floating-point number.
    SFLOAT,
    /// Signed integer.
    SINT,
    /// Unsigned integer.
    UINT,
    /// Unsigned integer that represents a normalized floating-point value in the range \[0,1].
    UNORM,
    /// Unsigned integer where R, G, B components represent a normalized floating-point value in the
    /// sRGB color space, while the A component is a simple normalized value as in `UNORM`.
    SRGB,
}

impl NumericType {
    /// Returns the type that shaders see when they read data of this numeric type.
    #[inline]
    pub const fn shader_type(self) -> NumericType {
        match self {
            NumericType::SINT => NumericType::SINT,
            NumericType::UINT => NumericType::UINT,
            NumericType::SFLOAT | NumericType::UNORM | NumericType::SRGB => NumericType::SFLOAT,
        }
    }
}

/// The features supported by a device for an image or buffer with a particular format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatProperties {
    /// Features available for images with linear tiling.
    pub linear_tiling_features: FormatFeatures,

    /// Features available for images with optimal tiling.
    pub optimal_tiling_features: FormatFeatures,

    /// Features available for buffers.
    pub buffer_features: FormatFeatures,

    pub _ne: crate::NonExhaustive,
}

vulkan_bitflags! {
    /// The features supported by a device for a particular format.
    FormatFeatures = FormatFeatureFlags(u32);

    /// Can be used with a sampled image descriptor.
    SAMPLED_IMAGE = SAMPLED_IMAGE,

    /// Can be used with a storage image descriptor.
    STORAGE_IMAGE = STORAGE_IMAGE,

    /// Can be used with a storage image descriptor with atomic operations in a shader.
    STORAGE_IMAGE_ATOMIC = STORAGE_IMAGE_ATOMIC,

    /// Can be used with a uniform texel buffer descriptor.
    UNIFORM_TEXEL_BUFFER = UNIFORM_TEXEL_BUFFER,

    /// Can be used with a storage texel buffer descriptor.
    STORAGE_TEXEL_BUFFER = STORAGE_TEXEL_BUFFER,

    /// Can be used with a storage texel buffer descriptor with atomic operations in a shader.
    STORAGE_TEXEL_BUFFER_ATOMIC = STORAGE_TEXEL_BUFFER_ATOMIC,

    /// Can be used as the format of a vertex attribute.
    VERTEX_BUFFER = VERTEX_BUFFER,

    /// Can be used with a color attachment in a framebuffer.
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,

    /// Can be used with a color attachment in a framebuffer with blending.
    COLOR_ATTACHMENT_BLEND = COLOR_ATTACHMENT_BLEND,

    /// Can be used with a depth/stencil attachment in a framebuffer.
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,

    /// Can be used as the source image of a blit operation.
    BLIT_SRC = BLIT_SRC,

    /// Can be used as the destination image of a blit operation.
    BLIT_DST = BLIT_DST,

    /// Can be sampled with a linear filter, and used as the source of a blit with a linear
    /// filter.
    SAMPLED_IMAGE_FILTER_LINEAR = SAMPLED_IMAGE_FILTER_LINEAR,

    /// Can be used as the source image of a copy command.
    TRANSFER_SRC = TRANSFER_SRC,

    /// Can be used as the destination image of a copy or clear command.
    TRANSFER_DST = TRANSFER_DST,
}

#[cfg(test)]
mod tests {
    use super::{Format, FormatFeatures, NumericType};
    use crate::image::ImageAspects;

    #[test]
    fn atomics_only_on_32_bit_integers() {
        for format in [
            Format::R8G8B8A8_UNORM,
            Format::R32_SFLOAT,
            Format::R32G32B32A32_UINT,
        ] {
            let properties = format.default_properties();
            assert!(!properties
                .optimal_tiling_features
                .intersects(FormatFeatures::STORAGE_IMAGE_ATOMIC));
            assert!(!properties
                .buffer_features
                .intersects(FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC));
        }

        for format in [Format::R32_UINT, Format::R32_SINT] {
            let properties = format.default_properties();
            assert!(properties
                .optimal_tiling_features
                .contains(FormatFeatures::STORAGE_IMAGE | FormatFeatures::STORAGE_IMAGE_ATOMIC));
            assert!(properties
                .buffer_features
                .contains(FormatFeatures::STORAGE_TEXEL_BUFFER_ATOMIC));
        }
    }

    #[test]
    fn multi_planar_layout() {
        let format = Format::G8_B8R8_2PLANE_420_UNORM;
        assert!(format.is_multi_planar());
        assert_eq!(format.planes(), &[Format::R8_UNORM, Format::R8G8_UNORM]);
        assert!(format.aspects().contains(ImageAspects::PLANE_1));
        assert!(!format.aspects().intersects(ImageAspects::PLANE_2));
        assert_eq!(format.plane_extent(0, [65, 33, 1]), [65, 33, 1]);
        assert_eq!(format.plane_extent(1, [65, 33, 1]), [33, 17, 1]);
        assert_eq!(format.block_size(), 0);
    }

    #[test]
    fn numeric_types() {
        assert_eq!(
            Format::R8G8B8A8_SRGB.numeric_format_color().map(NumericType::shader_type),
            Some(NumericType::SFLOAT)
        );
        assert_eq!(Format::D32_SFLOAT.numeric_format_color(), None);
        assert!(Format::D24_UNORM_S8_UINT.is_depth_stencil());
    }
}
