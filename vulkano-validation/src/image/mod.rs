// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image storage (1D, 2D, 3D, arrays, etc.) and image views.
//!
//! An image is a region of memory whose purpose is to store texels. The layout of the texels is
//! described by a [`Format`]; some formats (the multi-planar YCbCr formats) store each color
//! component in a separate *plane*, and commands that address a single plane must name it with
//! one of the `PLANE_*` aspects.
//!
//! Images must have [`DeviceMemory`] bound to them before they can be used, exactly like buffers.
//! Shaders and attachments don't access images directly, but through an [`ImageView`].

pub use self::view::{ImageView, ImageViewCreateInfo, ImageViewType};
use crate::{
    device::{Device, DeviceOwned},
    format::{Format, FormatFeatures},
    macros::{vulkan_bitflags, vulkan_enum},
    memory::DeviceMemory,
    registry::{ObjectState, ObjectType},
    DeviceSize, Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use parking_lot::Mutex;
use std::{
    cmp::max,
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Range,
    sync::Arc,
};

pub mod view;

/// A multidimensional array of texels in device memory.
pub struct Image {
    device: Arc<Device>,
    handle: Handle,

    flags: ImageCreateFlags,
    image_type: ImageType,
    format: Format,
    extent: [u32; 3],
    mip_levels: u32,
    array_layers: u32,
    samples: SampleCount,
    tiling: ImageTiling,
    usage: ImageUsage,
    format_features: FormatFeatures,

    memory: Mutex<Option<(Arc<DeviceMemory>, DeviceSize)>>,
}

impl Image {
    /// Creates a new `Image`. Memory must be bound to it with [`bind_memory`](Self::bind_memory)
    /// before it can be used.
    pub fn new(
        device: Arc<Device>,
        create_info: ImageCreateInfo,
    ) -> Result<Arc<Image>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &ImageCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: ImageCreateInfo) -> Arc<Image> {
        let ImageCreateInfo {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            _ne: _,
        } = create_info;

        let format_features = tiling_features(&device, format, tiling);

        Arc::new(Image {
            handle: device.registry().register(ObjectType::Image, None),
            device,
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            format_features,
            memory: Mutex::new(None),
        })
    }

    /// Returns the flags the image was created with.
    #[inline]
    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    /// Returns the image type of the image.
    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// Returns the format of the image.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the extent of the first mip level of the image.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    /// Returns the number of mip levels of the image.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Returns the number of array layers of the image.
    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    /// Returns the number of samples per texel of the image.
    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    /// Returns the tiling of the image.
    #[inline]
    pub fn tiling(&self) -> ImageTiling {
        self.tiling
    }

    /// Returns the usages the image was created with.
    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    /// Returns the features that the device supports for the format and tiling of the image.
    #[inline]
    pub fn format_features(&self) -> FormatFeatures {
        self.format_features
    }

    /// Returns whether the image was created with [`ImageCreateFlags::PROTECTED`].
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.flags.intersects(ImageCreateFlags::PROTECTED)
    }

    /// Returns whether memory is bound to the image.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.memory.lock().is_some()
    }

    /// Returns the extent of mip level `level`, or `None` if the image has no such level.
    #[inline]
    pub fn mip_level_extent(&self, level: u32) -> Option<[u32; 3]> {
        (level < self.mip_levels).then(|| mip_level_extent(self.extent, level))
    }

    /// Returns a subresource range that covers the whole image.
    #[inline]
    pub fn subresource_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange::from_parameters(self.format, self.mip_levels, self.array_layers)
    }

    /// Returns the number of bytes of memory that must be bound to the image.
    pub fn memory_size(&self) -> DeviceSize {
        let planes = self.format.planes();
        let plane_formats: &[Format] = if planes.is_empty() {
            std::slice::from_ref(&self.format)
        } else {
            planes
        };

        let mut size = 0;

        for level in 0..self.mip_levels {
            let extent = mip_level_extent(self.extent, level);

            for (plane, plane_format) in plane_formats.iter().enumerate() {
                let [width, height, depth] = self.format.plane_extent(plane, extent);
                size += width as DeviceSize
                    * height as DeviceSize
                    * depth as DeviceSize
                    * plane_format.block_size();
            }
        }

        size * self.array_layers as DeviceSize * self.samples as DeviceSize
    }

    /// Binds device memory to this image.
    pub fn bind_memory(
        &self,
        memory: Arc<DeviceMemory>,
        memory_offset: DeviceSize,
    ) -> Result<(), ValidationErrors> {
        self.device
            .report_one(self.validate_bind_memory(&memory, memory_offset))?;

        self.bind_memory_unchecked(memory, memory_offset);

        Ok(())
    }

    fn validate_bind_memory(
        &self,
        memory: &DeviceMemory,
        memory_offset: DeviceSize,
    ) -> Result<(), Box<ValidationError>> {
        assert_eq!(self.device(), memory.device());

        if self.is_bound() {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "already has memory bound to it".into(),
                vuids: &["VUID-vkBindImageMemory-image-07460"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if !self.device.registry().is_alive(memory.handle()) {
            return Err(Box::new(ValidationError {
                context: "memory".into(),
                problem: "has been freed".into(),
                vuids: &["VUID-vkBindImageMemory-memory-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if memory_offset >= memory.allocation_size() {
            return Err(Box::new(ValidationError {
                context: "memory_offset".into(),
                problem: "is not less than `memory.allocation_size()`".into(),
                vuids: &["VUID-vkBindImageMemory-memoryOffset-01046"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if self.memory_size() > memory.allocation_size() - memory_offset {
            return Err(Box::new(ValidationError {
                problem: "`self.memory_size()` is greater than `memory.allocation_size()` minus \
                    `memory_offset`"
                    .into(),
                vuids: &["VUID-vkBindImageMemory-size-01049"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if self.is_protected() && !memory.is_protected() {
            return Err(Box::new(ValidationError {
                problem: "the image is protected, but `memory` is not protected memory".into(),
                vuids: &["VUID-vkBindImageMemory-None-01901"],
                kind: Some(ViolationKind::ProtectedResourceMismatch),
                ..Default::default()
            }));
        }

        if !self.is_protected() && memory.is_protected() {
            return Err(Box::new(ValidationError {
                problem: "the image is not protected, but `memory` is protected memory".into(),
                vuids: &["VUID-vkBindImageMemory-None-01902"],
                kind: Some(ViolationKind::ProtectedResourceMismatch),
                ..Default::default()
            }));
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn bind_memory_unchecked(&self, memory: Arc<DeviceMemory>, memory_offset: DeviceSize) {
        *self.memory.lock() = Some((memory, memory_offset));
        self.device
            .registry()
            .set_state(self.handle, ObjectState::BoundToMemory);
    }

    /// Checks that the image can be used by a command: it must be alive, have memory bound to it,
    /// and have been created with one of `usage`.
    pub(crate) fn validate_use(
        &self,
        usage: ImageUsage,
        usage_vuids: &'static [&'static str],
        memory_vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        if !self.device.registry().is_alive(self.handle) {
            return Err(Box::new(ValidationError {
                problem: "has been destroyed".into(),
                vuids: &["VUID-vkDestroyImage-image-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if !usage.is_empty() && !self.usage.intersects(usage) {
            return Err(Box::new(ValidationError {
                context: "usage()".into(),
                problem: format!("does not contain {:?}", usage).into(),
                vuids: usage_vuids,
                kind: Some(ViolationKind::MissingUsage),
                ..Default::default()
            }));
        }

        if !self.is_bound() {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "has no memory bound to it".into(),
                vuids: memory_vuids,
                kind: Some(ViolationKind::MemoryNotBound),
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Checks that `subresource` names a valid set of subresources of the image, for a command
    /// that accesses it.
    pub(crate) fn validate_subresource_layers(
        &self,
        subresource: &ImageSubresourceLayers,
        vuids: &SubresourceLayersVuids,
    ) -> Result<(), Box<ValidationError>> {
        subresource.validate()?;

        let &ImageSubresourceLayers {
            aspects,
            mip_level,
            ref array_layers,
        } = subresource;

        let plane_count = self.format.planes().len();

        if plane_count > 0 {
            let valid_planes = match plane_count {
                2 => ImageAspects::PLANE_0 | ImageAspects::PLANE_1,
                _ => ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2,
            };

            if aspects.count() != 1 || !valid_planes.contains(aspects) {
                return Err(Box::new(ValidationError {
                    context: "aspects".into(),
                    problem: format!(
                        "the image has a multi-planar format with {} planes, but the aspects are \
                        not a single one of {:?}",
                        plane_count, valid_planes,
                    )
                    .into(),
                    vuids: vuids.plane,
                    kind: Some(ViolationKind::InvalidPlaneAspectViolation),
                    ..Default::default()
                }));
            }
        } else if !self.format.aspects().contains(aspects) {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "is not a subset of the aspects of the format of the image".into(),
                vuids: vuids.aspects,
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if mip_level >= self.mip_levels {
            return Err(Box::new(ValidationError {
                context: "mip_level".into(),
                problem: "is not less than the number of mip levels of the image".into(),
                vuids: vuids.mip_level,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if array_layers.end > self.array_layers {
            return Err(Box::new(ValidationError {
                context: "array_layers.end".into(),
                problem: "is greater than the number of array layers of the image".into(),
                vuids: vuids.array_layers,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// The VUIDs reported by [`Image::validate_subresource_layers`], which depend on the command.
pub(crate) struct SubresourceLayersVuids {
    pub(crate) aspects: &'static [&'static str],
    pub(crate) plane: &'static [&'static str],
    pub(crate) mip_level: &'static [&'static str],
    pub(crate) array_layers: &'static [&'static str],
}

fn tiling_features(device: &Device, format: Format, tiling: ImageTiling) -> FormatFeatures {
    let properties = device.format_properties(format);

    match tiling {
        ImageTiling::Optimal => properties.optimal_tiling_features,
        ImageTiling::Linear => properties.linear_tiling_features,
    }
}

pub(crate) fn mip_level_extent(extent: [u32; 3], level: u32) -> [u32; 3] {
    extent.map(|x| max(1, x.checked_shr(level).unwrap_or(0)))
}

impl Drop for Image {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for Image {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for Image {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for Image {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Image")
            .field("handle", &self.handle)
            .field("image_type", &self.image_type)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("array_layers", &self.array_layers)
            .field("samples", &self.samples)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `Image`.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// Additional properties of the image.
    ///
    /// The default value is empty.
    pub flags: ImageCreateFlags,

    /// The basic image dimensionality to create the image with.
    ///
    /// The default value is `ImageType::Dim2d`.
    pub image_type: ImageType,

    /// The format used to store the image data.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The width, height and depth of the image.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub extent: [u32; 3],

    /// The number of mip levels to create.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of array layers to create.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The number of samples per texel that the image should use.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub samples: SampleCount,

    /// The memory arrangement of the texel blocks.
    ///
    /// The default value is [`ImageTiling::Optimal`].
    pub tiling: ImageTiling,

    /// How the image is going to be used.
    ///
    /// The default value is empty, which must be overridden.
    pub usage: ImageUsage,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ImageCreateFlags::empty(),
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [0; 3],
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Sample1,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ImageCreateInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            flags,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            tiling,
            usage,
            _ne: _,
        } = self;

        let properties = device.properties();

        flags.validate_device(device).map_err(|err| {
            err.add_context("flags")
                .set_vuids(&["VUID-VkImageCreateInfo-flags-01890"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        usage.validate_device(device).map_err(|err| {
            err.add_context("usage")
                .set_vuids(&["VUID-VkImageCreateInfo-usage-parameter"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if usage.is_empty() {
            return Err(Box::new(ValidationError {
                context: "usage".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageCreateInfo-usage-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (index, vuids) in [
            &["VUID-VkImageCreateInfo-extent-00944"],
            &["VUID-VkImageCreateInfo-extent-00945"],
            &["VUID-VkImageCreateInfo-extent-00946"],
        ]
        .into_iter()
        .enumerate()
        {
            if extent[index] == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("extent[{}]", index).into(),
                    problem: "is zero".into(),
                    vuids,
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        let max_dimension = match image_type {
            ImageType::Dim1d => {
                if extent[1] != 1 || extent[2] != 1 {
                    return Err(Box::new(ValidationError {
                        problem: "`image_type` is `ImageType::Dim1d`, but `extent[1]` and \
                            `extent[2]` are not both 1"
                            .into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00956"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }

                properties.max_image_dimension1_d
            }
            ImageType::Dim2d => {
                if extent[2] != 1 {
                    return Err(Box::new(ValidationError {
                        problem: "`image_type` is `ImageType::Dim2d`, but `extent[2]` is not 1"
                            .into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00957"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }

                properties.max_image_dimension2_d
            }
            ImageType::Dim3d => {
                if array_layers != 1 {
                    return Err(Box::new(ValidationError {
                        problem: "`image_type` is `ImageType::Dim3d`, but `array_layers` is not 1"
                            .into(),
                        vuids: &["VUID-VkImageCreateInfo-imageType-00961"],
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    }));
                }

                properties.max_image_dimension3_d
            }
        };

        if extent.iter().any(|&x| x > max_dimension) {
            return Err(Box::new(ValidationError {
                context: "extent".into(),
                problem: "exceeds the maximum image dimension of the device for `image_type`"
                    .into(),
                vuids: match image_type {
                    ImageType::Dim1d => &["VUID-VkImageCreateInfo-extent-02252"],
                    ImageType::Dim2d => &["VUID-VkImageCreateInfo-extent-02253"],
                    ImageType::Dim3d => &["VUID-VkImageCreateInfo-extent-02254"],
                },
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if mip_levels == 0 {
            return Err(Box::new(ValidationError {
                context: "mip_levels".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkImageCreateInfo-mipLevels-00947"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let max_mip_levels = max_mip_levels(extent);

        if mip_levels > max_mip_levels {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`mip_levels` is greater than the maximum allowed number of mip levels for \
                    `extent` ({})",
                    max_mip_levels,
                )
                .into(),
                vuids: &["VUID-VkImageCreateInfo-mipLevels-00958"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if array_layers == 0 {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkImageCreateInfo-arrayLayers-00948"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if array_layers > properties.max_image_array_layers {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "exceeds the `max_image_array_layers` limit".into(),
                vuids: &["VUID-VkImageCreateInfo-arrayLayers-02256"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        if flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE) {
            if image_type != ImageType::Dim2d {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::CUBE_COMPATIBLE`, but \
                        `image_type` is not `ImageType::Dim2d`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-flags-00949"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if extent[0] != extent[1] || array_layers < 6 {
                return Err(Box::new(ValidationError {
                    problem: "`flags` contains `ImageCreateFlags::CUBE_COMPATIBLE`, but \
                        `extent` is not square, or `array_layers` is less than 6"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageType-00954"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        if flags.intersects(ImageCreateFlags::ARRAY_2D_COMPATIBLE) && image_type != ImageType::Dim3d
        {
            return Err(Box::new(ValidationError {
                problem: "`flags` contains `ImageCreateFlags::ARRAY_2D_COMPATIBLE`, but \
                    `image_type` is not `ImageType::Dim3d`"
                    .into(),
                vuids: &["VUID-VkImageCreateInfo-flags-00950"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if samples != SampleCount::Sample1 {
            if image_type != ImageType::Dim2d
                || flags.intersects(ImageCreateFlags::CUBE_COMPATIBLE)
                || mip_levels != 1
                || tiling != ImageTiling::Optimal
            {
                return Err(Box::new(ValidationError {
                    problem: "`samples` is not `SampleCount::Sample1`, but `image_type` is not \
                        `ImageType::Dim2d`, `flags` contains \
                        `ImageCreateFlags::CUBE_COMPATIBLE`, `mip_levels` is not 1, or `tiling` \
                        is not `ImageTiling::Optimal`"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-samples-02257"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if usage.intersects(ImageUsage::STORAGE)
                && !device.enabled_features().shader_storage_image_multisample
            {
                return Err(Box::new(ValidationError {
                    problem: "`usage` contains `ImageUsage::STORAGE`, and `samples` is not \
                        `SampleCount::Sample1`"
                        .into(),
                    requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                        crate::Requires::DeviceFeature("shader_storage_image_multisample"),
                    ])]),
                    vuids: &["VUID-VkImageCreateInfo-usage-00968"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                    ..Default::default()
                }));
            }
        }

        let format_features = tiling_features(device, format, tiling);

        for usage_flag in usage.iter() {
            let required = usage_flag.required_format_features();

            if !required.is_empty() && !format_features.intersects(required) {
                return Err(Box::new(ValidationError {
                    problem: format!(
                        "`usage` contains `ImageUsage::{:?}`, but the format features of \
                        `format` for `tiling` do not contain {:?}",
                        usage_flag, required,
                    )
                    .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageCreateMaxMipLevels-02251"],
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// Returns the number of mip levels that a full mip chain of an image with `extent` has.
fn max_mip_levels(extent: [u32; 3]) -> u32 {
    32 - (extent[0] | extent[1] | extent[2]).leading_zeros()
}

vulkan_bitflags! {
    /// Flags specifying additional properties of an image.
    ImageCreateFlags = ImageCreateFlags(u32);

    /// For non-multi-planar formats, whether an image view wrapping the image can have a
    /// different format.
    MUTABLE_FORMAT = MUTABLE_FORMAT,

    /// For 2D images, whether an image view of type [`ImageViewType::Cube`] or
    /// [`ImageViewType::CubeArray`] can be created from the image.
    CUBE_COMPATIBLE = CUBE_COMPATIBLE,

    /// For 3D images, whether an image view of type [`ImageViewType::Dim2d`] or
    /// [`ImageViewType::Dim2dArray`] can be created from the image.
    ARRAY_2D_COMPATIBLE = TYPE_2D_ARRAY_COMPATIBLE,

    /// The image is backed by protected memory, and can only be accessed by protected command
    /// buffers.
    PROTECTED = PROTECTED
    RequiresFeature(protected_memory),
}

vulkan_enum! {
    /// The basic dimensionality of an image.
    ImageType = ImageType(i32);

    /// A one-dimensional image, consisting of only a width, with a height and depth of 1.
    Dim1d = TYPE_1D,

    /// A two-dimensional image, consisting of a width and height, with a depth of 1.
    Dim2d = TYPE_2D,

    /// A three-dimensional image, consisting of a width, height and depth.
    Dim3d = TYPE_3D,
}

vulkan_enum! {
    /// The arrangement of texels or texel blocks in an image.
    ImageTiling = ImageTiling(i32);

    /// The arrangement is optimized for access in an implementation-defined way.
    Optimal = OPTIMAL,

    /// The texels are laid out in row-major order.
    Linear = LINEAR,
}

vulkan_enum! {
    /// The number of samples per texel of an image.
    SampleCount = SampleCountFlags(u32);

    /// 1 sample per texel.
    Sample1 = TYPE_1,

    /// 2 samples per texel.
    Sample2 = TYPE_2,

    /// 4 samples per texel.
    Sample4 = TYPE_4,

    /// 8 samples per texel.
    Sample8 = TYPE_8,

    /// 16 samples per texel.
    Sample16 = TYPE_16,

    /// 32 samples per texel.
    Sample32 = TYPE_32,

    /// 64 samples per texel.
    Sample64 = TYPE_64,
}

impl Default for SampleCount {
    #[inline]
    fn default() -> Self {
        SampleCount::Sample1
    }
}

vulkan_bitflags! {
    /// An individual data type within an image.
    ///
    /// Most images have only the [`COLOR`] aspect, but some may have others.
    ///
    /// [`COLOR`]: ImageAspects::COLOR
    ImageAspects = ImageAspectFlags(u32);

    /// The single aspect of images with a color format.
    COLOR = COLOR,

    /// The depth component of an image with a depth or depth/stencil format.
    DEPTH = DEPTH,

    /// The stencil component of an image with a stencil or depth/stencil format.
    STENCIL = STENCIL,

    /// An aspect used with sparse memory on some implementations.
    METADATA = METADATA,

    /// The first plane of an image with a multi-planar format.
    PLANE_0 = PLANE_0,

    /// The second plane of an image with a multi-planar format.
    PLANE_1 = PLANE_1,

    /// The third plane of an image with a multi-planar format.
    PLANE_2 = PLANE_2,
}

vulkan_bitflags! {
    /// Describes how an image is going to be used. This is **not** just an optimization.
    ///
    /// If you try to use an image in a way that you didn't declare, an error will be returned.
    ImageUsage = ImageUsageFlags(u32);

    /// The image can be used as a source for transfer, blit, resolve and clear commands.
    TRANSFER_SRC = TRANSFER_SRC,

    /// The image can be used as a destination for transfer, blit, resolve and clear commands.
    TRANSFER_DST = TRANSFER_DST,

    /// The image can be used as a sampled image in a shader.
    SAMPLED = SAMPLED,

    /// The image can be used as a storage image in a shader.
    STORAGE = STORAGE,

    /// The image can be used as a color attachment in a render pass/framebuffer.
    COLOR_ATTACHMENT = COLOR_ATTACHMENT,

    /// The image can be used as a depth/stencil attachment in a render pass/framebuffer.
    DEPTH_STENCIL_ATTACHMENT = DEPTH_STENCIL_ATTACHMENT,

    /// The image will be used as an attachment, and will only ever be used temporarily.
    TRANSIENT_ATTACHMENT = TRANSIENT_ATTACHMENT,

    /// The image can be used as an input attachment in a render pass/framebuffer.
    INPUT_ATTACHMENT = INPUT_ATTACHMENT,

    /// The image can be used as a fragment shading rate attachment.
    FRAGMENT_SHADING_RATE_ATTACHMENT = FRAGMENT_SHADING_RATE_ATTACHMENT_KHR
    RequiresFeature(attachment_fragment_shading_rate),
}

impl ImageUsage {
    /// Returns the format features of which at least one must be supported by the format of an
    /// image with this usage.
    pub(crate) const fn required_format_features(self) -> FormatFeatures {
        let mut features = FormatFeatures::empty();

        if self.intersects(ImageUsage::TRANSFER_SRC) {
            features = features.union(FormatFeatures::TRANSFER_SRC);
        }

        if self.intersects(ImageUsage::TRANSFER_DST) {
            features = features.union(FormatFeatures::TRANSFER_DST);
        }

        if self.intersects(ImageUsage::SAMPLED) {
            features = features.union(FormatFeatures::SAMPLED_IMAGE);
        }

        if self.intersects(ImageUsage::STORAGE) {
            features = features.union(FormatFeatures::STORAGE_IMAGE);
        }

        if self.intersects(ImageUsage::COLOR_ATTACHMENT) {
            features = features.union(FormatFeatures::COLOR_ATTACHMENT);
        }

        if self.intersects(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
            features = features.union(FormatFeatures::DEPTH_STENCIL_ATTACHMENT);
        }

        if self.intersects(ImageUsage::INPUT_ATTACHMENT) {
            features = features
                .union(FormatFeatures::COLOR_ATTACHMENT)
                .union(FormatFeatures::DEPTH_STENCIL_ATTACHMENT);
        }

        features
    }
}

/// One or more subresources of an image, spanning a single mip level, that should be accessed by a
/// command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresourceLayers {
    /// Selects the aspects that will be included.
    ///
    /// The value must not be empty. The `COLOR` aspect cannot be selected together with any of
    /// the `PLANE_*` aspects.
    pub aspects: ImageAspects,

    /// Selects mip level that will be included.
    pub mip_level: u32,

    /// Selects the range of array layers that will be included.
    ///
    /// The range must not be empty.
    pub array_layers: Range<u32>,
}

impl ImageSubresourceLayers {
    /// Returns an `ImageSubresourceLayers` covering the first mip level of an image with the
    /// given parameters. All aspects of the format are selected, or `PLANE_0` if it is
    /// multi-planar.
    #[inline]
    pub fn from_parameters(format: Format, array_layers: u32) -> Self {
        Self {
            aspects: {
                let aspects = format.aspects();

                if aspects.intersects(ImageAspects::PLANE_0) {
                    ImageAspects::PLANE_0
                } else {
                    aspects
                }
            },
            mip_level: 0,
            array_layers: 0..array_layers,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            aspects,
            mip_level: _,
            ref array_layers,
        } = self;

        if aspects.is_empty() {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceLayers-aspectMask-requiredbitmask"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if aspects.intersects(ImageAspects::COLOR)
            && aspects.intersects(ImageAspects::DEPTH | ImageAspects::STENCIL)
        {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "contains both `ImageAspects::COLOR`, and either `ImageAspects::DEPTH` \
                    or `ImageAspects::STENCIL`"
                    .into(),
                vuids: &["VUID-VkImageSubresourceLayers-aspectMask-00167"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if aspects.intersects(ImageAspects::METADATA) {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "contains `ImageAspects::METADATA`".into(),
                vuids: &["VUID-VkImageSubresourceLayers-aspectMask-00168"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if array_layers.is_empty() {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceLayers-layerCount-01700"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// One or more subresources of an image that should be accessed by a command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    /// Selects the aspects that will be included.
    ///
    /// The value must not be empty. The `COLOR` aspect cannot be selected together with any of
    /// the `PLANE_*` aspects.
    pub aspects: ImageAspects,

    /// Selects the range of the mip levels that will be included.
    ///
    /// The range must not be empty.
    pub mip_levels: Range<u32>,

    /// Selects the range of array layers that will be included.
    ///
    /// The range must not be empty.
    pub array_layers: Range<u32>,
}

impl ImageSubresourceRange {
    /// Returns an `ImageSubresourceRange` covering a whole image with the given parameters. If
    /// the format is multi-planar, only the `COLOR` aspect is selected.
    #[inline]
    pub fn from_parameters(format: Format, mip_levels: u32, array_layers: u32) -> Self {
        Self {
            aspects: format.aspects()
                - (ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2),
            mip_levels: 0..mip_levels,
            array_layers: 0..array_layers,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            aspects,
            ref mip_levels,
            ref array_layers,
        } = self;

        if aspects.is_empty() {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-aspectMask-requiredbitmask"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        if mip_levels.is_empty() {
            return Err(Box::new(ValidationError {
                context: "mip_levels".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-levelCount-01720"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if array_layers.is_empty() {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkImageSubresourceRange-layerCount-01721"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if aspects.intersects(ImageAspects::COLOR)
            && aspects
                .intersects(ImageAspects::PLANE_0 | ImageAspects::PLANE_1 | ImageAspects::PLANE_2)
        {
            return Err(Box::new(ValidationError {
                context: "aspects".into(),
                problem: "contains both `ImageAspects::COLOR`, and one of \
                    `ImageAspects::PLANE_0`, `ImageAspects::PLANE_1` or `ImageAspects::PLANE_2`"
                    .into(),
                vuids: &["VUID-VkImageSubresourceRange-aspectMask-01670"],
                kind: Some(ViolationKind::InvalidPlaneAspectViolation),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Image, ImageAspects, ImageCreateFlags, ImageCreateInfo, ImageSubresourceLayers,
        ImageType, ImageUsage, SampleCount, SubresourceLayersVuids,
    };
    use crate::{
        device::DeviceFeatures,
        format::Format,
        memory::{DeviceMemory, MemoryAllocateInfo},
        ViolationKind,
    };

    const COPY_VUIDS: SubresourceLayersVuids = SubresourceLayersVuids {
        aspects: &["aspects"],
        plane: &["plane"],
        mip_level: &["mip_level"],
        array_layers: &["array_layers"],
    };

    #[test]
    fn create_default_usage() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = Image::new(
            device,
            ImageCreateInfo {
                extent: [16, 16, 1],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-usage-requiredbitmask"));
    }

    #[test]
    fn zero_extent() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = Image::new(
            device,
            ImageCreateInfo {
                extent: [16, 0, 1],
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-extent-00945"));
    }

    #[test]
    fn too_many_mip_levels() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = Image::new(
            device.clone(),
            ImageCreateInfo {
                extent: [16, 16, 1],
                mip_levels: 6,
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-mipLevels-00958"));

        Image::new(
            device,
            ImageCreateInfo {
                extent: [16, 16, 1],
                mip_levels: 5,
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn multisample_storage_requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());

        let errors = Image::new(
            device,
            ImageCreateInfo {
                extent: [16, 16, 1],
                samples: SampleCount::Sample4,
                usage: ImageUsage::STORAGE,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-usage-00968"));
    }

    #[test]
    fn usage_unsupported_by_format() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = Image::new(
            device,
            ImageCreateInfo {
                format: Format::G8_B8R8_2PLANE_420_UNORM,
                extent: [16, 16, 1],
                usage: ImageUsage::COLOR_ATTACHMENT,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::MissingFormatFeature));
    }

    #[test]
    fn protected_requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());

        let errors = Image::new(
            device,
            ImageCreateInfo {
                flags: ImageCreateFlags::PROTECTED,
                extent: [16, 16, 1],
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-flags-01890"));
    }

    #[test]
    fn memory_size() {
        let (device, _queue) = gfx_dev_and_queue!();

        let image = Image::new(
            device.clone(),
            ImageCreateInfo {
                extent: [4, 4, 1],
                mip_levels: 3,
                array_layers: 2,
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap();
        // (16 + 4 + 1) texels * 4 bytes * 2 layers
        assert_eq!(image.memory_size(), 168);

        let planar = Image::new(
            device.clone(),
            ImageCreateInfo {
                format: Format::G8_B8R8_2PLANE_420_UNORM,
                extent: [4, 4, 1],
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap();
        // 16 luma bytes + 4 chroma texels of 2 bytes
        assert_eq!(planar.memory_size(), 24);

        let memory = DeviceMemory::allocate(
            device,
            MemoryAllocateInfo {
                allocation_size: 16,
                ..Default::default()
            },
        )
        .unwrap();
        let errors = planar.bind_memory(memory, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkBindImageMemory-size-01049"));
    }

    #[test]
    fn plane_aspects() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::G8_B8R8_2PLANE_420_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );

        let subresource = |aspects| ImageSubresourceLayers {
            aspects,
            mip_level: 0,
            array_layers: 0..1,
        };

        image
            .validate_subresource_layers(&subresource(ImageAspects::PLANE_1), &COPY_VUIDS)
            .unwrap();

        for aspects in [
            ImageAspects::PLANE_2,
            ImageAspects::COLOR,
            ImageAspects::PLANE_0 | ImageAspects::PLANE_1,
        ] {
            let err = image
                .validate_subresource_layers(&subresource(aspects), &COPY_VUIDS)
                .unwrap_err();
            assert_eq!(err.kind, Some(ViolationKind::InvalidPlaneAspectViolation));
            assert_eq!(err.vuids, &["plane"]);
        }
    }

    #[test]
    fn subresource_out_of_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            2,
            ImageUsage::TRANSFER_SRC,
        );

        let err = image
            .validate_subresource_layers(
                &ImageSubresourceLayers {
                    aspects: ImageAspects::COLOR,
                    mip_level: 0,
                    array_layers: 1..3,
                },
                &COPY_VUIDS,
            )
            .unwrap_err();
        assert_eq!(err.vuids, &["array_layers"]);

        let err = image
            .validate_subresource_layers(
                &ImageSubresourceLayers {
                    aspects: ImageAspects::DEPTH,
                    mip_level: 0,
                    array_layers: 0..1,
                },
                &COPY_VUIDS,
            )
            .unwrap_err();
        assert_eq!(err.kind, Some(ViolationKind::InvalidAspectMask));
    }

    #[test]
    fn image_type_extent_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();

        let errors = Image::new(
            device,
            ImageCreateInfo {
                image_type: ImageType::Dim1d,
                extent: [16, 16, 1],
                usage: ImageUsage::SAMPLED,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkImageCreateInfo-imageType-00956"));
    }
}
