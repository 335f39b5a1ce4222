// Copyright (c) 2021 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image views.
//!
//! This module contains types related to image views. An image view wraps around an image and
//! describes how the GPU should interpret the data. It is needed when an image is to be used in a
//! shader descriptor or as a framebuffer attachment.

use super::{Image, ImageAspects, ImageCreateFlags, ImageSubresourceRange, ImageType, ImageUsage};
use crate::{
    device::{Device, DeviceOwned},
    format::{Format, FormatFeatures},
    image::{ImageTiling, SampleCount},
    macros::vulkan_enum,
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// A wrapper around an image that makes it available to shaders or framebuffers.
pub struct ImageView {
    handle: Handle,
    image: Arc<Image>,

    view_type: ImageViewType,
    format: Format,
    subresource_range: ImageSubresourceRange,
    usage: ImageUsage,
    format_features: FormatFeatures,
}

impl ImageView {
    /// Creates a new `ImageView`.
    pub fn new(
        image: Arc<Image>,
        create_info: ImageViewCreateInfo,
    ) -> Result<Arc<ImageView>, ValidationErrors> {
        image
            .device()
            .report_one(Self::validate_new(&image, &create_info))?;

        Ok(Self::new_unchecked(image, create_info))
    }

    /// Creates a default `ImageView`. Equivalent to
    /// `ImageView::new(image, ImageViewCreateInfo::from_image(image))`.
    #[inline]
    pub fn new_default(image: Arc<Image>) -> Result<Arc<ImageView>, ValidationErrors> {
        let create_info = ImageViewCreateInfo::from_image(&image);
        Self::new(image, create_info)
    }

    fn validate_new(
        image: &Image,
        create_info: &ImageViewCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let device = image.device();

        if !device.registry().is_alive(image.handle()) {
            return Err(Box::new(ValidationError {
                context: "image".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        create_info
            .validate(device, image)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(image: Arc<Image>, create_info: ImageViewCreateInfo) -> Arc<ImageView> {
        let ImageViewCreateInfo {
            view_type,
            format,
            subresource_range,
            usage,
            _ne: _,
        } = create_info;

        let usage = if usage.is_empty() {
            image.usage()
        } else {
            usage
        };
        let format_features =
            view_format_features(image.device(), &image, format, &subresource_range);

        Arc::new(ImageView {
            handle: image.device().registry().register(ObjectType::ImageView, None),
            image,
            view_type,
            format,
            subresource_range,
            usage,
            format_features,
        })
    }

    /// Returns the wrapped image that this image view was created from.
    #[inline]
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    /// Returns the [`ImageViewType`] of this image view.
    #[inline]
    pub fn view_type(&self) -> ImageViewType {
        self.view_type
    }

    /// Returns the format of this view. This can be different from the parent's format.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the subresource range of the wrapped image that this view exposes.
    #[inline]
    pub fn subresource_range(&self) -> &ImageSubresourceRange {
        &self.subresource_range
    }

    /// Returns the usage of the image view.
    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    /// Returns the features supported by the image view's format.
    #[inline]
    pub fn format_features(&self) -> FormatFeatures {
        self.format_features
    }

    /// Returns the number of samples per texel of the wrapped image.
    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.image.samples()
    }

    /// Returns the extent of the first mip level of the view.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        super::mip_level_extent(self.image.extent(), self.subresource_range.mip_levels.start)
    }

    /// Returns the number of array layers that the view exposes.
    #[inline]
    pub fn layer_count(&self) -> u32 {
        self.subresource_range.array_layers.end - self.subresource_range.array_layers.start
    }

    /// Returns whether both the view and the image it wraps are alive.
    pub(crate) fn is_alive(&self) -> bool {
        let registry = self.device().registry();
        registry.is_alive(self.handle) && registry.is_alive(self.image.handle())
    }
}

fn view_format_features(
    device: &Device,
    image: &Image,
    format: Format,
    subresource_range: &ImageSubresourceRange,
) -> FormatFeatures {
    // A color view of a multi-planar image uses the features of the image itself.
    if format == image.format()
        || (image.format().is_multi_planar()
            && subresource_range.aspects.intersects(ImageAspects::COLOR))
    {
        return image.format_features();
    }

    let properties = device.format_properties(format);

    match image.tiling() {
        ImageTiling::Optimal => properties.optimal_tiling_features,
        ImageTiling::Linear => properties.linear_tiling_features,
    }
}

impl Drop for ImageView {
    #[inline]
    fn drop(&mut self) {
        self.image.device().registry().unregister(self.handle);
    }
}

impl VulkanObject for ImageView {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for ImageView {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.image.device()
    }
}

impl Debug for ImageView {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("ImageView")
            .field("handle", &self.handle)
            .field("image", &self.image.handle())
            .field("view_type", &self.view_type)
            .field("format", &self.format)
            .field("subresource_range", &self.subresource_range)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `ImageView`.
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    /// The image view type.
    ///
    /// The view type must be compatible with the dimensions of the image and the selected array
    /// layers.
    ///
    /// The default value is [`ImageViewType::Dim2d`].
    pub view_type: ImageViewType,

    /// The format of the image view.
    ///
    /// If this is not the format of the image, the image must have been created with
    /// [`ImageCreateFlags::MUTABLE_FORMAT`], or the view must select a single plane of a
    /// multi-planar image and have the format of that plane.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The subresource range of the image that the view should cover.
    ///
    /// The default value is empty, which must be overridden.
    pub subresource_range: ImageSubresourceRange,

    /// How the image view is going to be used.
    ///
    /// If `usage` is empty, then the usage of the image is used. Otherwise, it must be a subset
    /// of the usage of the image.
    ///
    /// The default value is empty.
    pub usage: ImageUsage,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            view_type: ImageViewType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            subresource_range: ImageSubresourceRange {
                aspects: ImageAspects::empty(),
                mip_levels: 0..0,
                array_layers: 0..0,
            },
            usage: ImageUsage::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ImageViewCreateInfo {
    /// Returns an `ImageViewCreateInfo` with the `view_type` determined from the image type and
    /// array layers, and `subresource_range` determined from the image format and covering the
    /// whole image.
    pub fn from_image(image: &Image) -> Self {
        Self {
            view_type: match image.image_type() {
                ImageType::Dim1d if image.array_layers() == 1 => ImageViewType::Dim1d,
                ImageType::Dim1d => ImageViewType::Dim1dArray,
                ImageType::Dim2d if image.array_layers() == 1 => ImageViewType::Dim2d,
                ImageType::Dim2d => ImageViewType::Dim2dArray,
                ImageType::Dim3d => ImageViewType::Dim3d,
            },
            format: image.format(),
            subresource_range: image.subresource_range(),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, device: &Device, image: &Image) -> Result<(), Box<ValidationError>> {
        let &Self {
            view_type,
            format,
            ref subresource_range,
            usage,
            _ne: _,
        } = self;

        subresource_range
            .validate()
            .map_err(|err| err.add_context("subresource_range"))?;

        let image_format = image.format();
        let aspects = subresource_range.aspects;
        let planes = image_format.planes();
        let plane_aspects = [ImageAspects::PLANE_0, ImageAspects::PLANE_1, ImageAspects::PLANE_2];

        let selected_plane = if planes.is_empty() {
            if !image_format.aspects().contains(aspects) {
                return Err(Box::new(ValidationError {
                    context: "subresource_range.aspects".into(),
                    problem: "is not a subset of the aspects of the format of the image".into(),
                    vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-09594"],
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            None
        } else if aspects == ImageAspects::COLOR {
            None
        } else {
            match plane_aspects[..planes.len()]
                .iter()
                .position(|&plane| plane == aspects)
            {
                Some(plane) => Some(plane),
                None => {
                    return Err(Box::new(ValidationError {
                        context: "subresource_range.aspects".into(),
                        problem: format!(
                            "the image has a multi-planar format with {} planes, but the aspects \
                            are neither `ImageAspects::COLOR` nor a single valid plane",
                            planes.len(),
                        )
                        .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-09594"],
                        kind: Some(ViolationKind::InvalidPlaneAspectViolation),
                        ..Default::default()
                    }));
                }
            }
        };

        if subresource_range.mip_levels.end > image.mip_levels() {
            return Err(Box::new(ValidationError {
                context: "subresource_range.mip_levels.end".into(),
                problem: "is greater than the number of mip levels of the image".into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-01718"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if subresource_range.array_layers.end > image.array_layers() {
            return Err(Box::new(ValidationError {
                context: "subresource_range.array_layers.end".into(),
                problem: "is greater than the number of array layers of the image".into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-06724"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        let layer_count = subresource_range.array_layers.end - subresource_range.array_layers.start;

        match (view_type, image.image_type()) {
            (ImageViewType::Dim1d | ImageViewType::Dim1dArray, ImageType::Dim1d)
            | (ImageViewType::Dim2d | ImageViewType::Dim2dArray, ImageType::Dim2d)
            | (ImageViewType::Dim3d, ImageType::Dim3d) => (),
            (ImageViewType::Cube | ImageViewType::CubeArray, ImageType::Dim2d) => {
                if !image.flags().intersects(ImageCreateFlags::CUBE_COMPATIBLE) {
                    return Err(Box::new(ValidationError {
                        problem: "`view_type` is `ImageViewType::Cube` or \
                            `ImageViewType::CubeArray`, but the image was not created with \
                            `ImageCreateFlags::CUBE_COMPATIBLE`"
                            .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-image-01003"],
                        kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                        ..Default::default()
                    }));
                }
            }
            (ImageViewType::Dim2d | ImageViewType::Dim2dArray, ImageType::Dim3d) => {
                if !image
                    .flags()
                    .intersects(ImageCreateFlags::ARRAY_2D_COMPATIBLE)
                {
                    return Err(Box::new(ValidationError {
                        problem: "`view_type` is `ImageViewType::Dim2d` or \
                            `ImageViewType::Dim2dArray`, and the image is a 3D image, but it was \
                            not created with `ImageCreateFlags::ARRAY_2D_COMPATIBLE`"
                            .into(),
                        vuids: &["VUID-VkImageViewCreateInfo-image-06723"],
                        kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                        ..Default::default()
                    }));
                }
            }
            _ => {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`view_type` is `ImageViewType::{:?}`, which is not compatible with an \
                        image of type `ImageType::{:?}`",
                        view_type,
                        image.image_type(),
                    )
                    .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-subResourceRange-01021"],
                    kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                    ..Default::default()
                }));
            }
        }

        match view_type {
            ImageViewType::Dim1d | ImageViewType::Dim2d | ImageViewType::Dim3d
                if layer_count != 1 =>
            {
                return Err(Box::new(ValidationError {
                    problem: "`view_type` is not an arrayed type, but \
                        `subresource_range.array_layers` does not contain exactly one layer"
                        .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-imageViewType-04973"],
                    kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                    ..Default::default()
                }));
            }
            ImageViewType::Cube if layer_count != 6 => {
                return Err(Box::new(ValidationError {
                    problem: "`view_type` is `ImageViewType::Cube`, but \
                        `subresource_range.array_layers` does not contain exactly 6 layers"
                        .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-viewType-02960"],
                    kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                    ..Default::default()
                }));
            }
            ImageViewType::CubeArray if layer_count % 6 != 0 => {
                return Err(Box::new(ValidationError {
                    problem: "`view_type` is `ImageViewType::CubeArray`, but the number of \
                        layers in `subresource_range.array_layers` is not a multiple of 6"
                        .into(),
                    vuids: &["VUID-VkImageViewCreateInfo-viewType-02961"],
                    kind: Some(ViolationKind::ImageViewTypeMismatchViolation),
                    ..Default::default()
                }));
            }
            _ => (),
        }

        if image.samples() != SampleCount::Sample1
            && !matches!(view_type, ImageViewType::Dim2d | ImageViewType::Dim2dArray)
        {
            return Err(Box::new(ValidationError {
                problem: "the image has multiple samples per texel, but `view_type` is not \
                    `ImageViewType::Dim2d` or `ImageViewType::Dim2dArray`"
                    .into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-04972"],
                kind: Some(ViolationKind::ImageMultisampleMismatchViolation),
                ..Default::default()
            }));
        }

        if format != image_format {
            match selected_plane {
                Some(plane) => {
                    if format != planes[plane] {
                        return Err(Box::new(ValidationError {
                            problem: format!(
                                "`subresource_range.aspects` selects plane {} of the image, but \
                                `format` is not the format of that plane ({:?})",
                                plane, planes[plane],
                            )
                            .into(),
                            vuids: &["VUID-VkImageViewCreateInfo-image-01586"],
                            kind: Some(ViolationKind::InvalidPlaneAspectViolation),
                            ..Default::default()
                        }));
                    }
                }
                None => {
                    if !image.flags().intersects(ImageCreateFlags::MUTABLE_FORMAT) {
                        return Err(Box::new(ValidationError {
                            problem: "`format` is not the format of the image, but the image was \
                                not created with `ImageCreateFlags::MUTABLE_FORMAT`"
                                .into(),
                            vuids: &["VUID-VkImageViewCreateInfo-image-01762"],
                            kind: Some(ViolationKind::InvalidParameter),
                            ..Default::default()
                        }));
                    }

                    if format.block_size() != image_format.block_size()
                        || format.aspects() != image_format.aspects()
                    {
                        return Err(Box::new(ValidationError {
                            problem: "`format` is not compatible with the format of the image"
                                .into(),
                            vuids: &["VUID-VkImageViewCreateInfo-image-01761"],
                            kind: Some(ViolationKind::InvalidParameter),
                            ..Default::default()
                        }));
                    }
                }
            }
        }

        if !image.usage().contains(usage) {
            return Err(Box::new(ValidationError {
                context: "usage".into(),
                problem: "is not a subset of the usage of the image".into(),
                vuids: &["VUID-VkImageViewCreateInfo-pNext-02662"],
                kind: Some(ViolationKind::MissingUsage),
                ..Default::default()
            }));
        }

        let usage = if usage.is_empty() { image.usage() } else { usage };
        let format_features = view_format_features(device, image, format, subresource_range);

        for (usage_flag, feature, vuids) in [
            (
                ImageUsage::SAMPLED,
                FormatFeatures::SAMPLED_IMAGE,
                &["VUID-VkImageViewCreateInfo-usage-02274"],
            ),
            (
                ImageUsage::STORAGE,
                FormatFeatures::STORAGE_IMAGE,
                &["VUID-VkImageViewCreateInfo-usage-02275"],
            ),
            (
                ImageUsage::COLOR_ATTACHMENT,
                FormatFeatures::COLOR_ATTACHMENT,
                &["VUID-VkImageViewCreateInfo-usage-02276"],
            ),
            (
                ImageUsage::DEPTH_STENCIL_ATTACHMENT,
                FormatFeatures::DEPTH_STENCIL_ATTACHMENT,
                &["VUID-VkImageViewCreateInfo-usage-02277"],
            ),
        ] {
            if usage.intersects(usage_flag) && !format_features.intersects(feature) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "the usage of the view contains `ImageUsage::{:?}`, but the format \
                        features of `format` do not contain `FormatFeatures::{:?}`",
                        usage_flag, feature,
                    )
                    .into(),
                    vuids,
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_enum! {
    /// The geometry type of an image view.
    ImageViewType = ImageViewType(i32);

    /// A one-dimensional view.
    Dim1d = TYPE_1D,

    /// A two-dimensional view.
    Dim2d = TYPE_2D,

    /// A three-dimensional view.
    Dim3d = TYPE_3D,

    /// A view of six two-dimensional layers, forming a cube.
    Cube = CUBE,

    /// An array of one-dimensional views.
    Dim1dArray = TYPE_1D_ARRAY,

    /// An array of two-dimensional views.
    Dim2dArray = TYPE_2D_ARRAY,

    /// An array of cube views.
    CubeArray = CUBE_ARRAY,
}

impl ImageViewType {
    /// Returns whether the type is arrayed.
    #[inline]
    pub fn is_arrayed(self) -> bool {
        match self {
            Self::Dim1d | Self::Dim2d | Self::Dim3d | Self::Cube => false,
            Self::Dim1dArray | Self::Dim2dArray | Self::CubeArray => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageView, ImageViewCreateInfo, ImageViewType};
    use crate::{
        format::Format,
        image::{Image, ImageAspects, ImageCreateFlags, ImageCreateInfo, ImageUsage},
        ViolationKind,
    };

    #[test]
    fn default_view() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            4,
            ImageUsage::SAMPLED | ImageUsage::COLOR_ATTACHMENT,
        );

        let view = ImageView::new_default(image).unwrap();
        assert_eq!(view.view_type(), ImageViewType::Dim2dArray);
        assert_eq!(view.layer_count(), 4);
        assert_eq!(view.usage(), ImageUsage::SAMPLED | ImageUsage::COLOR_ATTACHMENT);
    }

    #[test]
    fn non_arrayed_type_with_layers() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            2,
            ImageUsage::SAMPLED,
        );

        let errors = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                view_type: ImageViewType::Dim2d,
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageViewCreateInfo-imageViewType-04973"));
    }

    #[test]
    fn cube_requires_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            6,
            ImageUsage::SAMPLED,
        );

        let errors = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                view_type: ImageViewType::Cube,
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageViewCreateInfo-image-01003"));
        assert!(errors.contains_kind(ViolationKind::ImageViewTypeMismatchViolation));
    }

    #[test]
    fn multi_planar_aspects() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::G8_B8R8_2PLANE_420_UNORM,
            [16, 16],
            1,
            ImageUsage::SAMPLED,
        );

        let mut create_info = ImageViewCreateInfo::from_image(&image);
        assert_eq!(create_info.subresource_range.aspects, ImageAspects::COLOR);
        ImageView::new(image.clone(), create_info.clone()).unwrap();

        create_info.subresource_range.aspects = ImageAspects::PLANE_1;
        create_info.format = Format::R8G8_UNORM;
        ImageView::new(image.clone(), create_info.clone()).unwrap();

        create_info.subresource_range.aspects = ImageAspects::PLANE_2;
        let errors = ImageView::new(image.clone(), create_info.clone()).unwrap_err();
        assert!(errors.contains_kind(ViolationKind::InvalidPlaneAspectViolation));

        create_info.subresource_range.aspects = ImageAspects::PLANE_0;
        create_info.format = Format::R8G8_UNORM;
        let errors = ImageView::new(image, create_info).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageViewCreateInfo-image-01586"));
    }

    #[test]
    fn mutable_format() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::SAMPLED,
        );

        let errors = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                format: Format::R32_UINT,
                ..ImageViewCreateInfo::from_image(&image)
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageViewCreateInfo-image-01762"));

        let mutable = Image::new(
            device,
            ImageCreateInfo {
                flags: ImageCreateFlags::MUTABLE_FORMAT,
                extent: [16, 16, 1],
                usage: ImageUsage::STORAGE,
                ..Default::default()
            },
        )
        .unwrap();
        let view = ImageView::new(
            mutable.clone(),
            ImageViewCreateInfo {
                format: Format::R32_UINT,
                ..ImageViewCreateInfo::from_image(&mutable)
            },
        )
        .unwrap();
        assert_eq!(view.format(), Format::R32_UINT);
    }
}
