// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{transfer::subresource_extent, validate_protected_access, CommandInfo};
use crate::{
    command_buffer::CommandBuffer,
    device::queue::QueueFlags,
    format::{FormatFeatures, NumericType},
    image::{
        Image, ImageAspects, ImageSubresourceLayers, ImageUsage, SampleCount,
        SubresourceLayersVuids,
    },
    sampler::Filter,
    ValidationError, ValidationErrors, ViolationKind,
};
use smallvec::{smallvec, SmallVec};
use std::{cmp::min, sync::Arc};

const BLIT_IMAGE: CommandInfo = command_info!("vkCmdBlitImage", QueueFlags::GRAPHICS, Outside);

impl CommandBuffer {
    /// Blits an image to another.
    ///
    /// A *blit* is similar to an image copy operation, except that the portion of the image that
    /// is transferred can be resized. You choose an area of the source and an area of the
    /// destination, and the implementation will resize the area of the source so that it matches
    /// the size of the area of the destination before writing it.
    ///
    /// Blit operations have several restrictions:
    ///
    /// - Blit operations are only allowed on queue families that support graphics operations.
    /// - The format of the source and destination images must support blit operations, which
    ///   depends on the Vulkan implementation. Multi-planar formats never do.
    /// - Only single-sampled images are allowed.
    /// - You can only blit between two images whose formats belong to the same type. The types
    ///   are: floating-point, signed integers, unsigned integers, depth-stencil.
    /// - If you blit between depth, stencil or depth-stencil images, the format of both images
    ///   must match exactly.
    /// - If you blit between depth, stencil or depth-stencil images, only the `Nearest` filter is
    ///   allowed.
    pub fn blit_image(&self, blit_image_info: BlitImageInfo) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&BLIT_IMAGE, |inner, errors| {
            blit_image_info.validate(protected, errors);

            inner.add_resource(&blit_image_info.src_image);
            inner.add_resource(&blit_image_info.dst_image);
        })
    }
}

/// Parameters to blit image data.
#[derive(Clone, Debug)]
pub struct BlitImageInfo {
    /// The image to blit from.
    ///
    /// There is no default value.
    pub src_image: Arc<Image>,

    /// The image to blit to.
    ///
    /// There is no default value.
    pub dst_image: Arc<Image>,

    /// The regions of both images to blit between.
    ///
    /// The default value is a single region, covering the first mip level, and the smallest of
    /// the array layers of the two images. The whole extent of each image is covered, scaling if
    /// necessary.
    pub regions: SmallVec<[ImageBlit; 1]>,

    /// The filter to use for sampling `src_image` when the `src_extent` and
    /// `dst_extent` of a region are not the same size.
    ///
    /// The default value is [`Filter::Nearest`].
    pub filter: Filter,

    pub _ne: crate::NonExhaustive,
}

impl BlitImageInfo {
    /// Returns a `BlitImageInfo` with the specified `src_image` and `dst_image`.
    #[inline]
    pub fn images(src_image: Arc<Image>, dst_image: Arc<Image>) -> Self {
        let array_layers = min(src_image.array_layers(), dst_image.array_layers());
        let region = ImageBlit {
            src_subresource: ImageSubresourceLayers::from_parameters(
                src_image.format(),
                array_layers,
            ),
            src_offsets: [[0; 3], src_image.extent()],
            dst_subresource: ImageSubresourceLayers::from_parameters(
                dst_image.format(),
                array_layers,
            ),
            dst_offsets: [[0; 3], dst_image.extent()],
            ..Default::default()
        };

        Self {
            src_image,
            dst_image,
            regions: smallvec![region],
            filter: Filter::Nearest,
            _ne: crate::NonExhaustive(()),
        }
    }

    fn validate(&self, protected: bool, errors: &mut ValidationErrors) {
        let &Self {
            ref src_image,
            ref dst_image,
            ref regions,
            filter,
            _ne: _,
        } = self;

        errors.check(
            src_image
                .validate_use(
                    ImageUsage::TRANSFER_SRC,
                    &["VUID-vkCmdBlitImage-srcImage-00219"],
                    &["VUID-vkCmdBlitImage-srcImage-00220"],
                )
                .map_err(|err| err.add_context("src_image")),
        );
        errors.check(
            dst_image
                .validate_use(
                    ImageUsage::TRANSFER_DST,
                    &["VUID-vkCmdBlitImage-dstImage-00224"],
                    &["VUID-vkCmdBlitImage-dstImage-00225"],
                )
                .map_err(|err| err.add_context("dst_image")),
        );
        errors.check(validate_protected_access(
            protected,
            src_image.is_protected(),
            "src_image",
            &["VUID-vkCmdBlitImage-commandBuffer-01834"],
            &[],
        ));
        errors.check(validate_protected_access(
            protected,
            dst_image.is_protected(),
            "dst_image",
            &["VUID-vkCmdBlitImage-commandBuffer-01835"],
            &["VUID-vkCmdBlitImage-commandBuffer-01836"],
        ));

        let src_format = src_image.format();
        let dst_format = dst_image.format();

        if !src_image
            .format_features()
            .intersects(FormatFeatures::BLIT_SRC)
        {
            errors.push(Box::new(ValidationError {
                context: "src_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::BLIT_SRC`".into(),
                vuids: &["VUID-vkCmdBlitImage-srcImage-01999"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if !dst_image
            .format_features()
            .intersects(FormatFeatures::BLIT_DST)
        {
            errors.push(Box::new(ValidationError {
                context: "dst_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::BLIT_DST`".into(),
                vuids: &["VUID-vkCmdBlitImage-dstImage-02000"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if src_image.samples() != SampleCount::Sample1 {
            errors.push(Box::new(ValidationError {
                context: "src_image.samples()".into(),
                problem: "is not `SampleCount::Sample1`".into(),
                vuids: &["VUID-vkCmdBlitImage-srcImage-00233"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if dst_image.samples() != SampleCount::Sample1 {
            errors.push(Box::new(ValidationError {
                context: "dst_image.samples()".into(),
                problem: "is not `SampleCount::Sample1`".into(),
                vuids: &["VUID-vkCmdBlitImage-dstImage-00234"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if src_format.is_depth_stencil() || dst_format.is_depth_stencil() {
            if src_format != dst_format {
                errors.push(Box::new(ValidationError {
                    problem: "one of the images has a depth/stencil format, but the formats of \
                        the images are not equal"
                        .into(),
                    vuids: &["VUID-vkCmdBlitImage-srcImage-00231"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if filter != Filter::Nearest {
                errors.push(Box::new(ValidationError {
                    context: "filter".into(),
                    problem: "is not `Filter::Nearest`, but the images have a depth/stencil \
                        format"
                        .into(),
                    vuids: &["VUID-vkCmdBlitImage-srcImage-00232"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        } else {
            let src_numeric = src_format.numeric_format_color();
            let dst_numeric = dst_format.numeric_format_color();

            let integer_types: [(NumericType, &'static [&'static str]); 2] = [
                (NumericType::SINT, &["VUID-vkCmdBlitImage-srcImage-00229"]),
                (NumericType::UINT, &["VUID-vkCmdBlitImage-srcImage-00230"]),
            ];

            for (numeric_type, vuids) in integer_types {
                if (src_numeric == Some(numeric_type)) != (dst_numeric == Some(numeric_type)) {
                    errors.push(Box::new(ValidationError {
                        problem: format!(
                            "one of the images has a {:?} format, but the other does not",
                            numeric_type,
                        )
                        .into(),
                        vuids,
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }
            }
        }

        if filter == Filter::Linear
            && !src_image
                .format_features()
                .intersects(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            errors.push(Box::new(ValidationError {
                problem: "`filter` is `Filter::Linear`, but \
                    `src_image.format_features()` does not contain \
                    `FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR`"
                    .into(),
                vuids: &["VUID-vkCmdBlitImage-filter-02001"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if regions.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdBlitImage-regionCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (region_index, region) in regions.iter().enumerate() {
            errors.check(
                region
                    .validate(src_image, dst_image)
                    .map_err(|err| err.add_context(format!("regions[{}]", region_index))),
            );
        }
    }
}

/// A region of data to blit between images.
#[derive(Clone, Debug)]
pub struct ImageBlit {
    /// The subresource of `src_image` to blit from.
    ///
    /// The default value is empty, which must be overridden.
    pub src_subresource: ImageSubresourceLayers,

    /// The offsets from the zero coordinate of `src_image`, defining two corners of the region
    /// to blit from.
    /// If the ordering of the two offsets differs between source and destination, the image will
    /// be flipped.
    ///
    /// The default value is `[[0; 3]; 2]`, which must be overridden.
    pub src_offsets: [[u32; 3]; 2],

    /// The subresource of `dst_image` to blit to.
    ///
    /// The default value is empty, which must be overridden.
    pub dst_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `dst_image` defining two corners of the
    /// region to blit to.
    ///
    /// The default value is `[[0; 3]; 2]`, which must be overridden.
    pub dst_offsets: [[u32; 3]; 2],

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageBlit {
    #[inline]
    fn default() -> Self {
        Self {
            src_subresource: ImageSubresourceLayers {
                aspects: ImageAspects::empty(),
                mip_level: 0,
                array_layers: 0..0,
            },
            src_offsets: [[0; 3]; 2],
            dst_subresource: ImageSubresourceLayers {
                aspects: ImageAspects::empty(),
                mip_level: 0,
                array_layers: 0..0,
            },
            dst_offsets: [[0; 3]; 2],
            _ne: crate::NonExhaustive(()),
        }
    }
}

const BLIT_SRC_VUIDS: SubresourceLayersVuids = SubresourceLayersVuids {
    aspects: &["VUID-vkCmdBlitImage-aspectMask-00241"],
    plane: &["VUID-vkCmdBlitImage-srcImage-06421"],
    mip_level: &["VUID-vkCmdBlitImage-srcSubresource-01705"],
    array_layers: &["VUID-vkCmdBlitImage-srcSubresource-01707"],
};
const BLIT_DST_VUIDS: SubresourceLayersVuids = SubresourceLayersVuids {
    aspects: &["VUID-vkCmdBlitImage-aspectMask-00242"],
    plane: &["VUID-vkCmdBlitImage-dstImage-06422"],
    mip_level: &["VUID-vkCmdBlitImage-dstSubresource-01706"],
    array_layers: &["VUID-vkCmdBlitImage-dstSubresource-01708"],
};

impl ImageBlit {
    fn validate(&self, src_image: &Image, dst_image: &Image) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref src_subresource,
            src_offsets,
            ref dst_subresource,
            dst_offsets,
            _ne: _,
        } = self;

        src_image
            .validate_subresource_layers(src_subresource, &BLIT_SRC_VUIDS)
            .map_err(|err| err.add_context("src_subresource"))?;
        dst_image
            .validate_subresource_layers(dst_subresource, &BLIT_DST_VUIDS)
            .map_err(|err| err.add_context("dst_subresource"))?;

        if src_subresource.aspects != dst_subresource.aspects {
            return Err(Box::new(ValidationError {
                problem: "`src_subresource.aspects` is not equal to `dst_subresource.aspects`"
                    .into(),
                vuids: &["VUID-VkImageBlit-aspectMask-00238"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if src_subresource.array_layers.len() != dst_subresource.array_layers.len() {
            return Err(Box::new(ValidationError {
                problem: "`src_subresource` and `dst_subresource` do not span the same number \
                    of array layers"
                    .into(),
                vuids: &["VUID-VkImageBlit-layerCount-08800"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        validate_offsets(
            subresource_extent(src_image, src_subresource),
            src_offsets,
            "src_offsets",
            [
                &["VUID-vkCmdBlitImage-srcOffset-00243"],
                &["VUID-vkCmdBlitImage-srcOffset-00244"],
                &["VUID-vkCmdBlitImage-srcOffset-00246"],
            ],
        )?;
        validate_offsets(
            subresource_extent(dst_image, dst_subresource),
            dst_offsets,
            "dst_offsets",
            [
                &["VUID-vkCmdBlitImage-dstOffset-00248"],
                &["VUID-vkCmdBlitImage-dstOffset-00249"],
                &["VUID-vkCmdBlitImage-dstOffset-00251"],
            ],
        )?;

        Ok(())
    }
}

fn validate_offsets(
    extent: [u32; 3],
    offsets: [[u32; 3]; 2],
    context: &'static str,
    vuids: [&'static [&'static str]; 3],
) -> Result<(), Box<ValidationError>> {
    for i in 0..3 {
        for (corner, offset) in offsets.iter().enumerate() {
            if offset[i] > extent[i] {
                return Err(Box::new(ValidationError {
                    context: format!("{}[{}][{}]", context, corner, i).into(),
                    problem: format!(
                        "is greater than the extent of the subresource in dimension {} ({})",
                        i, extent[i],
                    )
                    .into(),
                    vuids: vuids[i],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BlitImageInfo, ImageBlit};
    use crate::{
        format::Format,
        image::{ImageSubresourceLayers, ImageUsage},
        sampler::Filter,
        ViolationKind,
    };

    #[test]
    fn blit_scaled() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [32, 32],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::B8G8R8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.blit_image(BlitImageInfo {
            filter: Filter::Linear,
            ..BlitImageInfo::images(src.clone(), dst.clone())
        })
        .unwrap();

        let errors = cb
            .blit_image(BlitImageInfo {
                regions: [ImageBlit {
                    src_subresource: ImageSubresourceLayers::from_parameters(src.format(), 1),
                    src_offsets: [[0; 3], [32, 32, 1]],
                    dst_subresource: ImageSubresourceLayers::from_parameters(dst.format(), 1),
                    dst_offsets: [[0; 3], [32, 32, 1]],
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..BlitImageInfo::images(src, dst)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-dstOffset-00248"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));
    }

    #[test]
    fn blit_integer_to_float() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::R8G8B8A8_UINT,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .blit_image(BlitImageInfo::images(src, dst))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-srcImage-00230"));
    }

    #[test]
    fn blit_depth_with_linear_filter() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::D32_SFLOAT,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::D32_SFLOAT,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .blit_image(BlitImageInfo {
                filter: Filter::Linear,
                ..BlitImageInfo::images(src, dst)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-srcImage-00232"));
        // Depth formats have no `BLIT_DST` feature by default.
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-dstImage-02000"));
    }

    #[test]
    fn blit_multi_planar() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::G8_B8R8_2PLANE_420_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .blit_image(BlitImageInfo {
                regions: [ImageBlit {
                    src_subresource: ImageSubresourceLayers {
                        aspects: crate::image::ImageAspects::COLOR,
                        mip_level: 0,
                        array_layers: 0..1,
                    },
                    src_offsets: [[0; 3], [16, 16, 1]],
                    dst_subresource: ImageSubresourceLayers::from_parameters(dst.format(), 1),
                    dst_offsets: [[0; 3], [16, 16, 1]],
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..BlitImageInfo::images(src, dst)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-srcImage-01999"));
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-srcImage-06421"));
        assert!(errors.contains_kind(ViolationKind::InvalidPlaneAspectViolation));
    }

    #[test]
    fn blit_on_compute_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST,
        );
        let pool = crate::tests::command_pool(
            &device,
            1,
            crate::command_buffer::pool::CommandPoolCreateFlags::empty(),
        );
        let cb = crate::tests::command_buffer(
            &pool,
            crate::command_buffer::CommandBufferLevel::Primary,
        );
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .blit_image(BlitImageInfo::images(image.clone(), image))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBlitImage-commandBuffer-cmdpool"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));
    }
}
