// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{validate_protected_access, CommandInfo};
use crate::{
    buffer::{Buffer, BufferUsage},
    command_buffer::CommandBuffer,
    device::queue::QueueFlags,
    format::{Format, FormatFeatures},
    image::{
        Image, ImageAspects, ImageSubresourceLayers, ImageUsage, SampleCount,
        SubresourceLayersVuids,
    },
    DeviceSize, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use smallvec::{smallvec, SmallVec};
use std::{cmp::min, sync::Arc};

const TRANSFER_QUEUES: QueueFlags = QueueFlags::TRANSFER
    .union(QueueFlags::GRAPHICS)
    .union(QueueFlags::COMPUTE);

const COPY_BUFFER: CommandInfo = command_info!("vkCmdCopyBuffer", TRANSFER_QUEUES, Outside);
const COPY_IMAGE: CommandInfo = command_info!("vkCmdCopyImage", TRANSFER_QUEUES, Outside);
const COPY_BUFFER_TO_IMAGE: CommandInfo =
    command_info!("vkCmdCopyBufferToImage", TRANSFER_QUEUES, Outside);
const COPY_IMAGE_TO_BUFFER: CommandInfo =
    command_info!("vkCmdCopyImageToBuffer", TRANSFER_QUEUES, Outside);

/// # Commands to transfer data between resources.
impl CommandBuffer {
    /// Copies data from a buffer to another buffer.
    pub fn copy_buffer(&self, copy_buffer_info: CopyBufferInfo) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&COPY_BUFFER, |inner, errors| {
            copy_buffer_info.validate(protected, errors);

            inner.add_resource(&copy_buffer_info.src_buffer);
            inner.add_resource(&copy_buffer_info.dst_buffer);
        })
    }

    /// Copies data from an image to another image.
    ///
    /// The images may be the same image, but the regions must not overlap.
    pub fn copy_image(&self, copy_image_info: CopyImageInfo) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&COPY_IMAGE, |inner, errors| {
            copy_image_info.validate(protected, errors);

            inner.add_resource(&copy_image_info.src_image);
            inner.add_resource(&copy_image_info.dst_image);
        })
    }

    /// Copies data from a buffer to an image.
    pub fn copy_buffer_to_image(
        &self,
        copy_buffer_to_image_info: CopyBufferToImageInfo,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&COPY_BUFFER_TO_IMAGE, |inner, errors| {
            copy_buffer_to_image_info.validate(protected, errors);

            inner.add_resource(&copy_buffer_to_image_info.src_buffer);
            inner.add_resource(&copy_buffer_to_image_info.dst_image);
        })
    }

    /// Copies data from an image to a buffer.
    pub fn copy_image_to_buffer(
        &self,
        copy_image_to_buffer_info: CopyImageToBufferInfo,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&COPY_IMAGE_TO_BUFFER, |inner, errors| {
            copy_image_to_buffer_info.validate(protected, errors);

            inner.add_resource(&copy_image_to_buffer_info.src_image);
            inner.add_resource(&copy_image_to_buffer_info.dst_buffer);
        })
    }
}

/// Parameters to copy data from a buffer to another buffer.
#[derive(Clone, Debug)]
pub struct CopyBufferInfo {
    /// The buffer to copy from.
    ///
    /// There is no default value.
    pub src_buffer: Arc<Buffer>,

    /// The buffer to copy to.
    ///
    /// There is no default value.
    pub dst_buffer: Arc<Buffer>,

    /// The regions of both buffers to copy between, specified in bytes.
    ///
    /// The default value is a single region, with zero offsets and a `size` equal to the smallest
    /// of the two buffers.
    pub regions: SmallVec<[BufferCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyBufferInfo {
    /// Returns a `CopyBufferInfo` with the specified `src_buffer` and `dst_buffer`.
    #[inline]
    pub fn buffers(src_buffer: Arc<Buffer>, dst_buffer: Arc<Buffer>) -> Self {
        let region = BufferCopy {
            size: min(src_buffer.size(), dst_buffer.size()),
            ..Default::default()
        };

        Self {
            src_buffer,
            dst_buffer,
            regions: smallvec![region],
            _ne: crate::NonExhaustive(()),
        }
    }

    fn validate(&self, protected: bool, errors: &mut ValidationErrors) {
        let &Self {
            ref src_buffer,
            ref dst_buffer,
            ref regions,
            _ne: _,
        } = self;

        errors.check(
            src_buffer
                .validate_use(
                    BufferUsage::TRANSFER_SRC,
                    &["VUID-vkCmdCopyBuffer-srcBuffer-00118"],
                    &["VUID-vkCmdCopyBuffer-srcBuffer-00119"],
                )
                .map_err(|err| err.add_context("src_buffer")),
        );
        errors.check(
            dst_buffer
                .validate_use(
                    BufferUsage::TRANSFER_DST,
                    &["VUID-vkCmdCopyBuffer-dstBuffer-00120"],
                    &["VUID-vkCmdCopyBuffer-dstBuffer-00121"],
                )
                .map_err(|err| err.add_context("dst_buffer")),
        );
        errors.check(validate_protected_access(
            protected,
            src_buffer.is_protected(),
            "src_buffer",
            &["VUID-vkCmdCopyBuffer-commandBuffer-01822"],
            &[],
        ));
        errors.check(validate_protected_access(
            protected,
            dst_buffer.is_protected(),
            "dst_buffer",
            &["VUID-vkCmdCopyBuffer-commandBuffer-01823"],
            &["VUID-vkCmdCopyBuffer-commandBuffer-01824"],
        ));

        if regions.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdCopyBuffer-regionCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let same_buffer = src_buffer.handle() == dst_buffer.handle();

        for (region_index, region) in regions.iter().enumerate() {
            errors.check(
                region
                    .validate(src_buffer, dst_buffer, same_buffer)
                    .map_err(|err| err.add_context(format!("regions[{}]", region_index))),
            );
        }
    }
}

/// A region of data to copy between buffers.
#[derive(Clone, Debug)]
pub struct BufferCopy {
    /// The offset in bytes from the start of `src_buffer` that copying will start from.
    ///
    /// The default value is `0`.
    pub src_offset: DeviceSize,

    /// The offset in bytes from the start of `dst_buffer` that copying will start from.
    ///
    /// The default value is `0`.
    pub dst_offset: DeviceSize,

    /// The number of bytes to copy.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCopy {
    #[inline]
    fn default() -> Self {
        Self {
            src_offset: 0,
            dst_offset: 0,
            size: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl BufferCopy {
    fn validate(
        &self,
        src_buffer: &Buffer,
        dst_buffer: &Buffer,
        same_buffer: bool,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            src_offset,
            dst_offset,
            size,
            _ne: _,
        } = self;

        if size == 0 {
            return Err(Box::new(ValidationError {
                context: "size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkBufferCopy-size-01988"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if src_offset >= src_buffer.size() {
            return Err(Box::new(ValidationError {
                context: "src_offset".into(),
                problem: "is not less than `src_buffer.size()`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-srcOffset-00113"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if dst_offset >= dst_buffer.size() {
            return Err(Box::new(ValidationError {
                context: "dst_offset".into(),
                problem: "is not less than `dst_buffer.size()`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-dstOffset-00114"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if size > src_buffer.size() - src_offset {
            return Err(Box::new(ValidationError {
                problem: "`src_offset + size` is greater than `src_buffer.size()`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-size-00115"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if size > dst_buffer.size() - dst_offset {
            return Err(Box::new(ValidationError {
                problem: "`dst_offset + size` is greater than `dst_buffer.size()`".into(),
                vuids: &["VUID-vkCmdCopyBuffer-size-00116"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if same_buffer && src_offset < dst_offset + size && dst_offset < src_offset + size {
            return Err(Box::new(ValidationError {
                problem: "`src_buffer` and `dst_buffer` are the same buffer, and the source and \
                    destination ranges overlap"
                    .into(),
                vuids: &["VUID-vkCmdCopyBuffer-pRegions-00117"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Parameters to copy data from an image to another image.
#[derive(Clone, Debug)]
pub struct CopyImageInfo {
    /// The image to copy from.
    ///
    /// There is no default value.
    pub src_image: Arc<Image>,

    /// The image to copy to.
    ///
    /// There is no default value.
    pub dst_image: Arc<Image>,

    /// The regions of both images to copy between.
    ///
    /// The default value is a single region, covering the first mip level and the layers that
    /// both images have in common, with the smallest extent of the two images.
    pub regions: SmallVec<[ImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyImageInfo {
    /// Returns a `CopyImageInfo` with the specified `src_image` and `dst_image`.
    #[inline]
    pub fn images(src_image: Arc<Image>, dst_image: Arc<Image>) -> Self {
        let array_layers = min(src_image.array_layers(), dst_image.array_layers());
        let [src_extent, dst_extent] = [src_image.extent(), dst_image.extent()];
        let region = ImageCopy {
            src_subresource: ImageSubresourceLayers::from_parameters(
                src_image.format(),
                array_layers,
            ),
            dst_subresource: ImageSubresourceLayers::from_parameters(
                dst_image.format(),
                array_layers,
            ),
            extent: [0, 1, 2].map(|i| min(src_extent[i], dst_extent[i])),
            ..Default::default()
        };

        Self {
            src_image,
            dst_image,
            regions: smallvec![region],
            _ne: crate::NonExhaustive(()),
        }
    }

    fn validate(&self, protected: bool, errors: &mut ValidationErrors) {
        let &Self {
            ref src_image,
            ref dst_image,
            ref regions,
            _ne: _,
        } = self;

        errors.check(
            src_image
                .validate_use(
                    ImageUsage::TRANSFER_SRC,
                    &["VUID-vkCmdCopyImage-srcImage-00126"],
                    &["VUID-vkCmdCopyImage-srcImage-00127"],
                )
                .map_err(|err| err.add_context("src_image")),
        );
        errors.check(
            dst_image
                .validate_use(
                    ImageUsage::TRANSFER_DST,
                    &["VUID-vkCmdCopyImage-dstImage-00131"],
                    &["VUID-vkCmdCopyImage-dstImage-00132"],
                )
                .map_err(|err| err.add_context("dst_image")),
        );
        errors.check(validate_protected_access(
            protected,
            src_image.is_protected(),
            "src_image",
            &["VUID-vkCmdCopyImage-commandBuffer-01825"],
            &[],
        ));
        errors.check(validate_protected_access(
            protected,
            dst_image.is_protected(),
            "dst_image",
            &["VUID-vkCmdCopyImage-commandBuffer-01826"],
            &["VUID-vkCmdCopyImage-commandBuffer-01827"],
        ));

        if !src_image
            .format_features()
            .intersects(FormatFeatures::TRANSFER_SRC)
        {
            errors.push(Box::new(ValidationError {
                context: "src_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::TRANSFER_SRC`".into(),
                vuids: &["VUID-vkCmdCopyImage-srcImage-01995"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if !dst_image
            .format_features()
            .intersects(FormatFeatures::TRANSFER_DST)
        {
            errors.push(Box::new(ValidationError {
                context: "dst_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdCopyImage-dstImage-01996"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if src_image.samples() != dst_image.samples() {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "`src_image.samples()` ({:?}) is not equal to `dst_image.samples()` ({:?})",
                    src_image.samples(),
                    dst_image.samples(),
                )
                .into(),
                vuids: &["VUID-vkCmdCopyImage-srcImage-00136"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if regions.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdCopyImage-regionCount-arraylength"],
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

/// A region of data to copy between images.
#[derive(Clone, Debug)]
pub struct ImageCopy {
    /// The subresource of `src_image` to copy from.
    ///
    /// The default value is empty, which must be overridden.
    pub src_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `src_image` that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub src_offset: [u32; 3],

    /// The subresource of `dst_image` to copy to.
    ///
    /// The default value is empty, which must be overridden.
    pub dst_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `dst_image` that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub dst_offset: [u32; 3],

    /// The extent of texels to copy.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub extent: [u32; 3],

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCopy {
    #[inline]
    fn default() -> Self {
        Self {
            src_subresource: empty_subresource(),
            src_offset: [0; 3],
            dst_subresource: empty_subresource(),
            dst_offset: [0; 3],
            extent: [0; 3],
            _ne: crate::NonExhaustive(()),
        }
    }
}

const COPY_IMAGE_SRC_VUIDS: SubresourceLayersVuids = SubresourceLayersVuids {
    aspects: &["VUID-vkCmdCopyImage-aspectMask-00142"],
    plane: &["VUID-vkCmdCopyImage-srcImage-08713"],
    mip_level: &["VUID-vkCmdCopyImage-srcSubresource-07967"],
    array_layers: &["VUID-vkCmdCopyImage-srcSubresource-07968"],
};
const COPY_IMAGE_DST_VUIDS: SubresourceLayersVuids = SubresourceLayersVuids {
    aspects: &["VUID-vkCmdCopyImage-aspectMask-00143"],
    plane: &["VUID-vkCmdCopyImage-dstImage-08714"],
    mip_level: &["VUID-vkCmdCopyImage-dstSubresource-07967"],
    array_layers: &["VUID-vkCmdCopyImage-dstSubresource-07968"],
};

impl ImageCopy {
    fn validate(&self, src_image: &Image, dst_image: &Image) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref src_subresource,
            src_offset,
            ref dst_subresource,
            dst_offset,
            extent,
            _ne: _,
        } = self;

        src_image
            .validate_subresource_layers(src_subresource, &COPY_IMAGE_SRC_VUIDS)
            .map_err(|err| err.add_context("src_subresource"))?;
        dst_image
            .validate_subresource_layers(dst_subresource, &COPY_IMAGE_DST_VUIDS)
            .map_err(|err| err.add_context("dst_subresource"))?;

        if extent.contains(&0) {
            return Err(Box::new(ValidationError {
                context: "extent".into(),
                problem: "contains a zero element".into(),
                vuids: &[
                    "VUID-VkImageCopy-extent-06668",
                    "VUID-VkImageCopy-extent-06669",
                    "VUID-VkImageCopy-extent-06670",
                ],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if !src_image.format().is_multi_planar()
            && !dst_image.format().is_multi_planar()
            && src_subresource.aspects != dst_subresource.aspects
        {
            return Err(Box::new(ValidationError {
                problem: "neither image has a multi-planar format, but \
                    `src_subresource.aspects` is not equal to `dst_subresource.aspects`"
                    .into(),
                vuids: &["VUID-vkCmdCopyImage-srcImage-01551"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        let src_layer_count = src_subresource.array_layers.len();
        let dst_layer_count = dst_subresource.array_layers.len();

        if src_layer_count != dst_layer_count {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`src_subresource` spans {} array layers, but `dst_subresource` spans {}",
                    src_layer_count, dst_layer_count,
                )
                .into(),
                vuids: &["VUID-vkCmdCopyImage-srcImage-08793"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let src_block_size = texel_block_size(src_image.format(), src_subresource.aspects);
        let dst_block_size = texel_block_size(dst_image.format(), dst_subresource.aspects);

        if src_block_size != dst_block_size {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the texel block size of the copied aspect of `src_image` ({}) is not equal \
                    to that of `dst_image` ({})",
                    src_block_size, dst_block_size,
                )
                .into(),
                vuids: &["VUID-vkCmdCopyImage-srcImage-01548"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        validate_image_region_bounds(
            src_image,
            src_subresource,
            src_offset,
            extent,
            "src_offset",
            [
                &["VUID-vkCmdCopyImage-srcOffset-00144"],
                &["VUID-vkCmdCopyImage-srcOffset-00145"],
                &["VUID-vkCmdCopyImage-srcOffset-00147"],
            ],
        )?;
        validate_image_region_bounds(
            dst_image,
            dst_subresource,
            dst_offset,
            extent,
            "dst_offset",
            [
                &["VUID-vkCmdCopyImage-dstOffset-00150"],
                &["VUID-vkCmdCopyImage-dstOffset-00151"],
                &["VUID-vkCmdCopyImage-dstOffset-00153"],
            ],
        )?;

        if src_image.handle() == dst_image.handle()
            && src_subresource.mip_level == dst_subresource.mip_level
            && src_subresource.array_layers.start < dst_subresource.array_layers.end
            && dst_subresource.array_layers.start < src_subresource.array_layers.end
            && (0..3).all(|i| {
                src_offset[i] < dst_offset[i] + extent[i]
                    && dst_offset[i] < src_offset[i] + extent[i]
            })
        {
            return Err(Box::new(ValidationError {
                problem: "`src_image` and `dst_image` are the same image, and the source and \
                    destination regions overlap"
                    .into(),
                vuids: &["VUID-vkCmdCopyImage-pRegions-00124"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Parameters to copy data from a buffer to an image.
#[derive(Clone, Debug)]
pub struct CopyBufferToImageInfo {
    /// The buffer to copy from.
    ///
    /// There is no default value.
    pub src_buffer: Arc<Buffer>,

    /// The image to copy to.
    ///
    /// There is no default value.
    pub dst_image: Arc<Image>,

    /// The regions of the buffer and image to copy between.
    ///
    /// The default value is a single region, covering all of the first mip level of the image,
    /// and the start of the buffer.
    pub regions: SmallVec<[BufferImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyBufferToImageInfo {
    /// Returns a `CopyBufferToImageInfo` with the specified `src_buffer` and `dst_image`.
    #[inline]
    pub fn buffer_image(src_buffer: Arc<Buffer>, dst_image: Arc<Image>) -> Self {
        let region = BufferImageCopy::whole_image(&dst_image);

        Self {
            src_buffer,
            dst_image,
            regions: smallvec![region],
            _ne: crate::NonExhaustive(()),
        }
    }

    fn validate(&self, protected: bool, errors: &mut ValidationErrors) {
        let &Self {
            ref src_buffer,
            ref dst_image,
            ref regions,
            _ne: _,
        } = self;

        errors.check(
            src_buffer
                .validate_use(
                    BufferUsage::TRANSFER_SRC,
                    &["VUID-vkCmdCopyBufferToImage-srcBuffer-00174"],
                    &["VUID-vkCmdCopyBufferToImage-srcBuffer-00176"],
                )
                .map_err(|err| err.add_context("src_buffer")),
        );
        errors.check(
            dst_image
                .validate_use(
                    ImageUsage::TRANSFER_DST,
                    &["VUID-vkCmdCopyBufferToImage-dstImage-00177"],
                    &["VUID-vkCmdCopyBufferToImage-dstImage-00178"],
                )
                .map_err(|err| err.add_context("dst_image")),
        );
        errors.check(validate_protected_access(
            protected,
            src_buffer.is_protected(),
            "src_buffer",
            &["VUID-vkCmdCopyBufferToImage-commandBuffer-01828"],
            &[],
        ));
        errors.check(validate_protected_access(
            protected,
            dst_image.is_protected(),
            "dst_image",
            &["VUID-vkCmdCopyBufferToImage-commandBuffer-01829"],
            &["VUID-vkCmdCopyBufferToImage-commandBuffer-01830"],
        ));

        if !dst_image
            .format_features()
            .intersects(FormatFeatures::TRANSFER_DST)
        {
            errors.push(Box::new(ValidationError {
                context: "dst_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdCopyBufferToImage-dstImage-01997"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if dst_image.samples() != SampleCount::Sample1 {
            errors.push(Box::new(ValidationError {
                context: "dst_image.samples()".into(),
                problem: "is not `SampleCount::Sample1`".into(),
                vuids: &["VUID-vkCmdCopyBufferToImage-dstImage-07973"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if regions.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdCopyBufferToImage-regionCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (region_index, region) in regions.iter().enumerate() {
            errors.check(
                region
                    .validate(src_buffer, dst_image, &BUFFER_TO_IMAGE_VUIDS)
                    .map_err(|err| err.add_context(format!("regions[{}]", region_index))),
            );
        }
    }
}

/// Parameters to copy data from an image to a buffer.
#[derive(Clone, Debug)]
pub struct CopyImageToBufferInfo {
    /// The image to copy from.
    ///
    /// There is no default value.
    pub src_image: Arc<Image>,

    /// The buffer to copy to.
    ///
    /// There is no default value.
    pub dst_buffer: Arc<Buffer>,

    /// The regions of the image and buffer to copy between.
    ///
    /// The default value is a single region, covering all of the first mip level of the image,
    /// and the start of the buffer.
    pub regions: SmallVec<[BufferImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyImageToBufferInfo {
    /// Returns a `CopyImageToBufferInfo` with the specified `src_image` and `dst_buffer`.
    #[inline]
    pub fn image_buffer(src_image: Arc<Image>, dst_buffer: Arc<Buffer>) -> Self {
        let region = BufferImageCopy::whole_image(&src_image);

        Self {
            src_image,
            dst_buffer,
            regions: smallvec![region],
            _ne: crate::NonExhaustive(()),
        }
    }

    fn validate(&self, protected: bool, errors: &mut ValidationErrors) {
        let &Self {
            ref src_image,
            ref dst_buffer,
            ref regions,
            _ne: _,
        } = self;

        errors.check(
            src_image
                .validate_use(
                    ImageUsage::TRANSFER_SRC,
                    &["VUID-vkCmdCopyImageToBuffer-srcImage-00186"],
                    &["VUID-vkCmdCopyImageToBuffer-srcImage-00187"],
                )
                .map_err(|err| err.add_context("src_image")),
        );
        errors.check(
            dst_buffer
                .validate_use(
                    BufferUsage::TRANSFER_DST,
                    &["VUID-vkCmdCopyImageToBuffer-dstBuffer-00191"],
                    &["VUID-vkCmdCopyImageToBuffer-dstBuffer-00192"],
                )
                .map_err(|err| err.add_context("dst_buffer")),
        );
        errors.check(validate_protected_access(
            protected,
            src_image.is_protected(),
            "src_image",
            &["VUID-vkCmdCopyImageToBuffer-commandBuffer-01831"],
            &[],
        ));
        errors.check(validate_protected_access(
            protected,
            dst_buffer.is_protected(),
            "dst_buffer",
            &["VUID-vkCmdCopyImageToBuffer-commandBuffer-01832"],
            &["VUID-vkCmdCopyImageToBuffer-commandBuffer-01833"],
        ));

        if !src_image
            .format_features()
            .intersects(FormatFeatures::TRANSFER_SRC)
        {
            errors.push(Box::new(ValidationError {
                context: "src_image.format_features()".into(),
                problem: "does not contain `FormatFeatures::TRANSFER_SRC`".into(),
                vuids: &["VUID-vkCmdCopyImageToBuffer-srcImage-01998"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if src_image.samples() != SampleCount::Sample1 {
            errors.push(Box::new(ValidationError {
                context: "src_image.samples()".into(),
                problem: "is not `SampleCount::Sample1`".into(),
                vuids: &["VUID-vkCmdCopyImageToBuffer-srcImage-07973"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if regions.is_empty() {
            errors.push(Box::new(ValidationError {
                context: "regions".into(),
                problem: "is empty".into(),
                vuids: &["VUID-vkCmdCopyImageToBuffer-regionCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (region_index, region) in regions.iter().enumerate() {
            errors.check(
                region
                    .validate(dst_buffer, src_image, &IMAGE_TO_BUFFER_VUIDS)
                    .map_err(|err| err.add_context(format!("regions[{}]", region_index))),
            );
        }
    }
}

/// A region of data to copy between a buffer and an image.
#[derive(Clone, Debug)]
pub struct BufferImageCopy {
    /// The offset in bytes from the start of the buffer that copying will start from.
    ///
    /// The default value is `0`.
    pub buffer_offset: DeviceSize,

    /// The number of texels between successive rows of image data in the buffer.
    ///
    /// If set to `0`, the width of the image is used.
    ///
    /// The default value is `0`.
    pub buffer_row_length: u32,

    /// The number of rows between successive depth slices of image data in the buffer.
    ///
    /// If set to `0`, the height of the image is used.
    ///
    /// The default value is `0`.
    pub buffer_image_height: u32,

    /// The subresource of the image to copy from/to.
    ///
    /// The default value is empty, which must be overridden.
    pub image_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of the image that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub image_offset: [u32; 3],

    /// The extent of texels in the image to copy.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub image_extent: [u32; 3],

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferImageCopy {
    #[inline]
    fn default() -> Self {
        Self {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: empty_subresource(),
            image_offset: [0; 3],
            image_extent: [0; 3],
            _ne: crate::NonExhaustive(()),
        }
    }
}

struct BufferImageCopyVuids {
    subresource: SubresourceLayersVuids,
    offset: [&'static [&'static str]; 3],
    buffer_offset: &'static [&'static str],
    buffer_size: &'static [&'static str],
}

const BUFFER_TO_IMAGE_VUIDS: BufferImageCopyVuids = BufferImageCopyVuids {
    subresource: SubresourceLayersVuids {
        aspects: &["VUID-vkCmdCopyBufferToImage-aspectMask-00211"],
        plane: &["VUID-vkCmdCopyBufferToImage-dstImage-07981"],
        mip_level: &["VUID-vkCmdCopyBufferToImage-imageSubresource-07967"],
        array_layers: &["VUID-vkCmdCopyBufferToImage-imageSubresource-07968"],
    },
    offset: [
        &["VUID-vkCmdCopyBufferToImage-imageOffset-00197"],
        &["VUID-vkCmdCopyBufferToImage-imageOffset-00198"],
        &["VUID-vkCmdCopyBufferToImage-imageOffset-00200"],
    ],
    buffer_offset: &["VUID-vkCmdCopyBufferToImage-bufferOffset-07737"],
    buffer_size: &["VUID-vkCmdCopyBufferToImage-pRegions-00171"],
};

const IMAGE_TO_BUFFER_VUIDS: BufferImageCopyVuids = BufferImageCopyVuids {
    subresource: SubresourceLayersVuids {
        aspects: &["VUID-vkCmdCopyImageToBuffer-aspectMask-00211"],
        plane: &["VUID-vkCmdCopyImageToBuffer-srcImage-07981"],
        mip_level: &["VUID-vkCmdCopyImageToBuffer-imageSubresource-07967"],
        array_layers: &["VUID-vkCmdCopyImageToBuffer-imageSubresource-07968"],
    },
    offset: [
        &["VUID-vkCmdCopyImageToBuffer-imageOffset-00197"],
        &["VUID-vkCmdCopyImageToBuffer-imageOffset-00198"],
        &["VUID-vkCmdCopyImageToBuffer-imageOffset-00200"],
    ],
    buffer_offset: &["VUID-vkCmdCopyImageToBuffer-bufferOffset-07737"],
    buffer_size: &["VUID-vkCmdCopyImageToBuffer-pRegions-00183"],
};

impl BufferImageCopy {
    fn whole_image(image: &Image) -> Self {
        Self {
            image_subresource: ImageSubresourceLayers::from_parameters(
                image.format(),
                image.array_layers(),
            ),
            image_extent: image.extent(),
            ..Default::default()
        }
    }

    fn validate(
        &self,
        buffer: &Buffer,
        image: &Image,
        vuids: &BufferImageCopyVuids,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            buffer_offset,
            buffer_row_length,
            buffer_image_height,
            ref image_subresource,
            image_offset,
            image_extent,
            _ne: _,
        } = self;

        image
            .validate_subresource_layers(image_subresource, &vuids.subresource)
            .map_err(|err| err.add_context("image_subresource"))?;

        if image_extent.contains(&0) {
            return Err(Box::new(ValidationError {
                context: "image_extent".into(),
                problem: "contains a zero element".into(),
                vuids: &[
                    "VUID-VkBufferImageCopy-imageExtent-06659",
                    "VUID-VkBufferImageCopy-imageExtent-06660",
                    "VUID-VkBufferImageCopy-imageExtent-06661",
                ],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if buffer_row_length != 0 && buffer_row_length < image_extent[0] {
            return Err(Box::new(ValidationError {
                problem: "`buffer_row_length` is not zero, and is less than `image_extent[0]`"
                    .into(),
                vuids: &["VUID-VkBufferImageCopy-bufferRowLength-00195"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if buffer_image_height != 0 && buffer_image_height < image_extent[1] {
            return Err(Box::new(ValidationError {
                problem: "`buffer_image_height` is not zero, and is less than `image_extent[1]`"
                    .into(),
                vuids: &["VUID-VkBufferImageCopy-bufferImageHeight-00196"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        validate_image_region_bounds(
            image,
            image_subresource,
            image_offset,
            image_extent,
            "image_offset",
            vuids.offset,
        )?;

        let block_size = texel_block_size(image.format(), image_subresource.aspects);

        if buffer_offset % block_size != 0 {
            return Err(Box::new(ValidationError {
                context: "buffer_offset".into(),
                problem: format!(
                    "is not a multiple of the texel block size of the copied aspect ({})",
                    block_size,
                )
                .into(),
                vuids: vuids.buffer_offset,
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let copy_size = self.buffer_copy_size(block_size);

        if buffer_offset + copy_size > buffer.size() {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "the region accesses {} bytes of the buffer starting at `buffer_offset`, \
                    which exceeds the size of the buffer ({})",
                    copy_size,
                    buffer.size(),
                )
                .into(),
                vuids: vuids.buffer_size,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Returns the number of bytes of the buffer that the region accesses, starting from
    /// `buffer_offset`.
    fn buffer_copy_size(&self, block_size: DeviceSize) -> DeviceSize {
        let row_length = if self.buffer_row_length == 0 {
            self.image_extent[0]
        } else {
            self.buffer_row_length
        } as DeviceSize;
        let image_height = if self.buffer_image_height == 0 {
            self.image_extent[1]
        } else {
            self.buffer_image_height
        } as DeviceSize;

        // Only one of these is greater than 1.
        let slices = (self.image_extent[2] as DeviceSize)
            .max(self.image_subresource.array_layers.len() as DeviceSize);
        let rows = self.image_extent[1] as DeviceSize;

        let texels = (slices - 1) * image_height * row_length
            + (rows - 1) * row_length
            + self.image_extent[0] as DeviceSize;

        texels * block_size
    }
}

fn empty_subresource() -> ImageSubresourceLayers {
    ImageSubresourceLayers {
        aspects: ImageAspects::empty(),
        mip_level: 0,
        array_layers: 0..0,
    }
}

/// Returns the index of the plane that `aspects` selects, if it selects one.
pub(super) fn plane_index(aspects: ImageAspects) -> Option<usize> {
    [
        ImageAspects::PLANE_0,
        ImageAspects::PLANE_1,
        ImageAspects::PLANE_2,
    ]
    .into_iter()
    .position(|plane| aspects == plane)
}

/// Returns the size in bytes of a texel block of the `aspects` of an image with `format`, as
/// laid out in a buffer.
fn texel_block_size(format: Format, aspects: ImageAspects) -> DeviceSize {
    if aspects == ImageAspects::STENCIL {
        1
    } else if aspects == ImageAspects::DEPTH {
        match format {
            Format::D16_UNORM => 2,
            _ => 4,
        }
    } else if let Some(plane) = plane_index(aspects) {
        format
            .planes()
            .get(plane)
            .map_or(0, |plane_format| plane_format.block_size())
    } else {
        format.block_size()
    }
}

/// Returns the extent of the mip level and plane of `image` that `subresource` selects.
pub(super) fn subresource_extent(image: &Image, subresource: &ImageSubresourceLayers) -> [u32; 3] {
    let extent = image
        .mip_level_extent(subresource.mip_level)
        .unwrap_or([0; 3]);

    match plane_index(subresource.aspects) {
        Some(plane) if image.format().is_multi_planar() => {
            image.format().plane_extent(plane, extent)
        }
        _ => extent,
    }
}

fn validate_image_region_bounds(
    image: &Image,
    subresource: &ImageSubresourceLayers,
    offset: [u32; 3],
    extent: [u32; 3],
    context: &'static str,
    vuids: [&'static [&'static str]; 3],
) -> Result<(), Box<ValidationError>> {
    let subresource_extent = subresource_extent(image, subresource);

    for i in 0..3 {
        if offset[i] as u64 + extent[i] as u64 > subresource_extent[i] as u64 {
            return Err(Box::new(ValidationError {
                context: context.into(),
                problem: format!(
                    "`{0}[{1}]` plus the extent in dimension {1} ({2}) is greater than the \
                    extent of the subresource in that dimension ({3})",
                    context, i, offset[i] as u64 + extent[i] as u64, subresource_extent[i],
                )
                .into(),
                vuids: vuids[i],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        BufferCopy, BufferImageCopy, CopyBufferInfo, CopyBufferToImageInfo, CopyImageInfo,
        CopyImageToBufferInfo, ImageCopy,
    };
    use crate::{
        buffer::{Buffer, BufferCreateFlags, BufferCreateInfo, BufferUsage},
        device::Device,
        format::Format,
        image::{ImageAspects, ImageSubresourceLayers, ImageUsage},
        memory::{DeviceMemory, MemoryAllocateInfo, MemoryPropertyFlags},
        ViolationKind,
    };
    use std::sync::Arc;

    fn protected_buffer(device: &Arc<Device>, usage: BufferUsage) -> Arc<Buffer> {
        let buffer = Buffer::new(
            device.clone(),
            BufferCreateInfo {
                flags: BufferCreateFlags::PROTECTED,
                size: 64,
                usage,
                ..Default::default()
            },
        )
        .unwrap();
        let memory = DeviceMemory::allocate(
            device.clone(),
            MemoryAllocateInfo {
                allocation_size: 64,
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::PROTECTED,
                ..Default::default()
            },
        )
        .unwrap();
        buffer.bind_memory(memory, 0).unwrap();

        buffer
    }

    #[test]
    fn copy_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_SRC);
        let dst = crate::tests::buffer(&device, 32, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.copy_buffer(CopyBufferInfo::buffers(src.clone(), dst.clone()))
            .unwrap();

        let errors = cb
            .copy_buffer(CopyBufferInfo {
                regions: [BufferCopy {
                    src_offset: 0,
                    dst_offset: 16,
                    size: 32,
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..CopyBufferInfo::buffers(src.clone(), dst.clone())
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-size-00116"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));

        // Usage is checked on both buffers independently.
        let errors = cb
            .copy_buffer(CopyBufferInfo::buffers(dst, src))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-srcBuffer-00118"));
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-dstBuffer-00120"));
    }

    #[test]
    fn copy_buffer_overlap() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(
            &device,
            64,
            BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let region = |dst_offset| BufferCopy {
            src_offset: 0,
            dst_offset,
            size: 32,
            ..Default::default()
        };

        cb.copy_buffer(CopyBufferInfo {
            regions: [region(32)].into_iter().collect(),
            ..CopyBufferInfo::buffers(buffer.clone(), buffer.clone())
        })
        .unwrap();

        let errors = cb
            .copy_buffer(CopyBufferInfo {
                regions: [region(16)].into_iter().collect(),
                ..CopyBufferInfo::buffers(buffer.clone(), buffer)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-pRegions-00117"));
    }

    #[test]
    fn copy_protected_buffer_in_unprotected_command_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = protected_buffer(&device, BufferUsage::TRANSFER_SRC);
        let dst = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .copy_buffer(CopyBufferInfo::buffers(src, dst))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-commandBuffer-01822"));
        assert!(errors.contains_kind(ViolationKind::ProtectedResourceMismatch));
    }

    #[test]
    fn copy_image() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [8, 8],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.copy_image(CopyImageInfo::images(src.clone(), dst.clone()))
            .unwrap();

        let errors = cb
            .copy_image(CopyImageInfo {
                regions: [ImageCopy {
                    src_subresource: ImageSubresourceLayers::from_parameters(src.format(), 1),
                    dst_subresource: ImageSubresourceLayers::from_parameters(dst.format(), 1),
                    dst_offset: [4, 0, 0],
                    extent: [8, 8, 1],
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..CopyImageInfo::images(src, dst)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyImage-dstOffset-00150"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));
    }

    #[test]
    fn copy_image_incompatible_formats() {
        let (device, _queue) = gfx_dev_and_queue!();
        let src = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let dst = crate::tests::image(
            &device,
            Format::R8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .copy_image(CopyImageInfo::images(src, dst))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyImage-srcImage-01548"));
    }

    #[test]
    fn copy_multi_planar_image() {
        let (device, _queue) = gfx_dev_and_queue!();
        let planar = crate::tests::image(
            &device,
            Format::G8_B8R8_2PLANE_420_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_SRC,
        );
        let chroma = crate::tests::image(
            &device,
            Format::R8G8_UNORM,
            [8, 8],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let region = |src_aspects| ImageCopy {
            src_subresource: ImageSubresourceLayers {
                aspects: src_aspects,
                mip_level: 0,
                array_layers: 0..1,
            },
            dst_subresource: ImageSubresourceLayers::from_parameters(Format::R8G8_UNORM, 1),
            extent: [8, 8, 1],
            ..Default::default()
        };

        // Plane 1 of a 4:2:0 image is half the size, with two components per texel.
        cb.copy_image(CopyImageInfo {
            regions: [region(ImageAspects::PLANE_1)].into_iter().collect(),
            ..CopyImageInfo::images(planar.clone(), chroma.clone())
        })
        .unwrap();

        let errors = cb
            .copy_image(CopyImageInfo {
                regions: [region(ImageAspects::PLANE_2)].into_iter().collect(),
                ..CopyImageInfo::images(planar, chroma)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyImage-srcImage-08713"));
        assert!(errors.contains_kind(ViolationKind::InvalidPlaneAspectViolation));
    }

    #[test]
    fn copy_buffer_to_image() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let large = crate::tests::buffer(&device, 16 * 16 * 4, BufferUsage::TRANSFER_SRC);
        let small = crate::tests::buffer(&device, 16 * 16 * 4 - 4, BufferUsage::TRANSFER_SRC);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(large, image.clone()))
            .unwrap();

        let errors = cb
            .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(small, image))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBufferToImage-pRegions-00171"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));
    }

    #[test]
    fn copy_buffer_to_multi_planar_image() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::G8_B8_R8_3PLANE_420_UNORM,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let buffer = crate::tests::buffer(&device, 256, BufferUsage::TRANSFER_SRC);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let region = |aspects, extent| BufferImageCopy {
            image_subresource: ImageSubresourceLayers {
                aspects,
                mip_level: 0,
                array_layers: 0..1,
            },
            image_extent: extent,
            ..Default::default()
        };

        cb.copy_buffer_to_image(CopyBufferToImageInfo {
            regions: [region(ImageAspects::PLANE_2, [8, 8, 1])]
                .into_iter()
                .collect(),
            ..CopyBufferToImageInfo::buffer_image(buffer.clone(), image.clone())
        })
        .unwrap();

        let errors = cb
            .copy_buffer_to_image(CopyBufferToImageInfo {
                regions: [region(ImageAspects::COLOR, [8, 8, 1])]
                    .into_iter()
                    .collect(),
                ..CopyBufferToImageInfo::buffer_image(buffer.clone(), image.clone())
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBufferToImage-dstImage-07981"));
        assert!(errors.contains_kind(ViolationKind::InvalidPlaneAspectViolation));

        // Chroma planes are half the size of the image.
        let errors = cb
            .copy_buffer_to_image(CopyBufferToImageInfo {
                regions: [region(ImageAspects::PLANE_1, [16, 16, 1])]
                    .into_iter()
                    .collect(),
                ..CopyBufferToImageInfo::buffer_image(buffer, image)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBufferToImage-imageOffset-00197"));
    }

    #[test]
    fn copy_image_to_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [4, 4],
            2,
            ImageUsage::TRANSFER_SRC,
        );
        let buffer = crate::tests::buffer(&device, 4 * 4 * 4 * 2, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(
            image.clone(),
            buffer.clone(),
        ))
        .unwrap();

        let errors = cb
            .copy_image_to_buffer(CopyImageToBufferInfo {
                regions: [BufferImageCopy {
                    buffer_offset: 2,
                    image_subresource: ImageSubresourceLayers::from_parameters(image.format(), 1),
                    image_extent: [4, 4, 1],
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..CopyImageToBufferInfo::image_buffer(image.clone(), buffer.clone())
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyImageToBuffer-bufferOffset-07737"));

        let errors = cb
            .copy_image_to_buffer(CopyImageToBufferInfo {
                regions: [BufferImageCopy {
                    image_subresource: ImageSubresourceLayers {
                        aspects: ImageAspects::COLOR,
                        mip_level: 1,
                        array_layers: 0..1,
                    },
                    image_extent: [4, 4, 1],
                    ..Default::default()
                }]
                .into_iter()
                .collect(),
                ..CopyImageToBufferInfo::image_buffer(image, buffer)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyImageToBuffer-imageSubresource-07967"));
    }

    #[test]
    fn copy_inside_render_pass() {
        let (device, _queue) = gfx_dev_and_queue!();
        let render_pass =
            crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let src = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_SRC);
        let dst = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();
        cb.begin_render_pass(
            crate::command_buffer::RenderPassBeginInfo::framebuffer(framebuffer),
            crate::command_buffer::SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb
            .copy_buffer(CopyBufferInfo::buffers(src, dst))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdCopyBuffer-renderpass"));
        assert!(errors.contains_kind(ViolationKind::RenderPassScopeViolation));
    }
}
