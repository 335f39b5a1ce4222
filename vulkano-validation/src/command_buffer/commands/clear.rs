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
    device::{queue::QueueFlags, Device, DeviceOwned},
    format::FormatFeatures,
    image::{Image, ImageAspects, ImageSubresourceRange, ImageUsage},
    DeviceSize, ValidationError, ValidationErrors, ViolationKind,
};
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

const FILL_BUFFER: CommandInfo = command_info!(
    "vkCmdFillBuffer",
    QueueFlags::TRANSFER
        .union(QueueFlags::GRAPHICS)
        .union(QueueFlags::COMPUTE),
    Outside
);
const UPDATE_BUFFER: CommandInfo = command_info!(
    "vkCmdUpdateBuffer",
    QueueFlags::TRANSFER
        .union(QueueFlags::GRAPHICS)
        .union(QueueFlags::COMPUTE),
    Outside
);
const CLEAR_COLOR_IMAGE: CommandInfo = command_info!(
    "vkCmdClearColorImage",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Outside
);

/// # Commands to fill resources with new data.
impl CommandBuffer {
    /// Fills a region of a buffer with repeated copies of a value.
    ///
    /// `dst_offset` and `size` must be multiples of 4.
    pub fn fill_buffer(
        &self,
        dst_buffer: &Arc<Buffer>,
        dst_offset: DeviceSize,
        size: DeviceSize,
        _data: u32,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&FILL_BUFFER, |inner, errors| {
            errors.check(
                validate_fill_buffer(dst_buffer, dst_offset, size, protected)
                    .map_err(|err| err.add_context("dst_buffer")),
            );

            inner.add_resource(dst_buffer);
        })
    }

    /// Writes data to a region of a buffer.
    ///
    /// `dst_offset` and the size of `data` must be multiples of 4, and `data` can be at most
    /// 65536 bytes.
    pub fn update_buffer<D>(
        &self,
        dst_buffer: &Arc<Buffer>,
        dst_offset: DeviceSize,
        data: &D,
    ) -> Result<(), ValidationErrors>
    where
        D: bytemuck::NoUninit,
    {
        let protected = self.pool().is_protected();
        let data_size = bytemuck::bytes_of(data).len() as DeviceSize;

        self.record(&UPDATE_BUFFER, |inner, errors| {
            errors.check(validate_update_buffer(
                dst_buffer, dst_offset, data_size, protected,
            ));

            inner.add_resource(dst_buffer);
        })
    }

    /// Clears a color image with a specific value.
    pub fn clear_color_image(
        &self,
        clear_info: ClearColorImageInfo,
    ) -> Result<(), ValidationErrors> {
        let protected = self.pool().is_protected();

        self.record(&CLEAR_COLOR_IMAGE, |inner, errors| {
            errors.check(
                clear_info
                    .validate(self.device(), protected)
                    .map_err(|err| err.add_context("clear_info")),
            );

            inner.add_resource(&clear_info.image);
        })
    }
}

fn validate_fill_buffer(
    dst_buffer: &Buffer,
    dst_offset: DeviceSize,
    size: DeviceSize,
    protected: bool,
) -> Result<(), Box<ValidationError>> {
    dst_buffer.validate_use(
        BufferUsage::TRANSFER_DST,
        &["VUID-vkCmdFillBuffer-dstBuffer-00029"],
        &["VUID-vkCmdFillBuffer-dstBuffer-00031"],
    )?;

    validate_protected_access(
        protected,
        dst_buffer.is_protected(),
        "dst_buffer",
        &["VUID-vkCmdFillBuffer-commandBuffer-01811"],
        &["VUID-vkCmdFillBuffer-commandBuffer-01812"],
    )?;

    if dst_offset >= dst_buffer.size() {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset` is not less than `dst_buffer.size()`".into(),
            vuids: &["VUID-vkCmdFillBuffer-dstOffset-00024"],
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    if dst_offset % 4 != 0 {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset` is not a multiple of 4".into(),
            vuids: &["VUID-vkCmdFillBuffer-dstOffset-00025"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if size == 0 {
        return Err(Box::new(ValidationError {
            problem: "`size` is zero".into(),
            vuids: &["VUID-vkCmdFillBuffer-size-00026"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if size > dst_buffer.size() - dst_offset {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset + size` is greater than `dst_buffer.size()`".into(),
            vuids: &["VUID-vkCmdFillBuffer-size-00027"],
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    if size % 4 != 0 {
        return Err(Box::new(ValidationError {
            problem: "`size` is not a multiple of 4".into(),
            vuids: &["VUID-vkCmdFillBuffer-size-00028"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    Ok(())
}

fn validate_update_buffer(
    dst_buffer: &Buffer,
    dst_offset: DeviceSize,
    data_size: DeviceSize,
    protected: bool,
) -> Result<(), Box<ValidationError>> {
    dst_buffer
        .validate_use(
            BufferUsage::TRANSFER_DST,
            &["VUID-vkCmdUpdateBuffer-dstBuffer-00034"],
            &["VUID-vkCmdUpdateBuffer-dstBuffer-00035"],
        )
        .map_err(|err| err.add_context("dst_buffer"))?;

    validate_protected_access(
        protected,
        dst_buffer.is_protected(),
        "dst_buffer",
        &["VUID-vkCmdUpdateBuffer-commandBuffer-01813"],
        &["VUID-vkCmdUpdateBuffer-commandBuffer-01814"],
    )?;

    if dst_offset >= dst_buffer.size() {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset` is not less than `dst_buffer.size()`".into(),
            vuids: &["VUID-vkCmdUpdateBuffer-dstOffset-00032"],
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    if data_size > dst_buffer.size() - dst_offset {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset` plus the size of `data` is greater than `dst_buffer.size()`"
                .into(),
            vuids: &["VUID-vkCmdUpdateBuffer-dataSize-00033"],
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    if dst_offset % 4 != 0 {
        return Err(Box::new(ValidationError {
            problem: "`dst_offset` is not a multiple of 4".into(),
            vuids: &["VUID-vkCmdUpdateBuffer-dstOffset-00036"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    if data_size == 0 || data_size > 65536 {
        return Err(Box::new(ValidationError {
            context: "data".into(),
            problem: "the size is zero or greater than 65536 bytes".into(),
            vuids: &["VUID-vkCmdUpdateBuffer-dataSize-00037"],
            kind: Some(ViolationKind::LimitExceeded),
            ..Default::default()
        }));
    }

    if data_size % 4 != 0 {
        return Err(Box::new(ValidationError {
            context: "data".into(),
            problem: "the size is not a multiple of 4".into(),
            vuids: &["VUID-vkCmdUpdateBuffer-dataSize-00038"],
            kind: Some(ViolationKind::InvalidParameter),
            ..Default::default()
        }));
    }

    Ok(())
}

/// A value that a color image or attachment is cleared to.
///
/// The variant must match the numeric type of the format: `Float` for floating-point and
/// normalized formats, `Int` for signed integer formats and `Uint` for unsigned integer formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearColorValue {
    /// Value for formats with a numeric type that is not `SINT` or `UINT`.
    Float([f32; 4]),
    /// Value for formats with a numeric type of `SINT`.
    Int([i32; 4]),
    /// Value for formats with a numeric type of `UINT`.
    Uint([u32; 4]),
}

impl Default for ClearColorValue {
    #[inline]
    fn default() -> Self {
        ClearColorValue::Float([0.0; 4])
    }
}

/// Parameters to clear a color image.
#[derive(Clone, Debug)]
pub struct ClearColorImageInfo {
    /// The image to clear.
    ///
    /// There is no default value.
    pub image: Arc<Image>,

    /// The color value to clear the image to.
    ///
    /// The default value is `ClearColorValue::Float([0.0; 4])`.
    pub clear_value: ClearColorValue,

    /// The subresource ranges of `image` to clear.
    ///
    /// The default value is a single region, covering the whole image.
    pub regions: SmallVec<[ImageSubresourceRange; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl ClearColorImageInfo {
    /// Returns a `ClearColorImageInfo` that clears all of `image`.
    #[inline]
    pub fn image(image: Arc<Image>) -> Self {
        let range = image.subresource_range();

        Self {
            image,
            clear_value: ClearColorValue::default(),
            regions: smallvec![range],
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(
        &self,
        _device: &Device,
        protected: bool,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref image,
            clear_value: _,
            ref regions,
            _ne: _,
        } = self;

        image
            .validate_use(
                ImageUsage::TRANSFER_DST,
                &["VUID-vkCmdClearColorImage-image-00002"],
                &["VUID-vkCmdClearColorImage-image-00003"],
            )
            .map_err(|err| err.add_context("image"))?;

        validate_protected_access(
            protected,
            image.is_protected(),
            "image",
            &["VUID-vkCmdClearColorImage-commandBuffer-01805"],
            &["VUID-vkCmdClearColorImage-commandBuffer-01806"],
        )?;

        if !image
            .format_features()
            .intersects(FormatFeatures::TRANSFER_DST)
        {
            return Err(Box::new(ValidationError {
                context: "image.format_features()".into(),
                problem: "does not contain `FormatFeatures::TRANSFER_DST`".into(),
                vuids: &["VUID-vkCmdClearColorImage-image-01993"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if image.format().is_depth_stencil() {
            return Err(Box::new(ValidationError {
                context: "image.format()".into(),
                problem: "is a depth/stencil format".into(),
                vuids: &["VUID-vkCmdClearColorImage-image-00007"],
                kind: Some(ViolationKind::InvalidAspectMask),
                ..Default::default()
            }));
        }

        for (region_index, range) in regions.iter().enumerate() {
            range
                .validate()
                .map_err(|err| err.add_context(format!("regions[{}]", region_index)))?;

            if range.aspects != ImageAspects::COLOR {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].aspects", region_index).into(),
                    problem: "contains aspects other than `ImageAspects::COLOR`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-aspectMask-02498"],
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            if range.mip_levels.end > image.mip_levels() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].mip_levels.end", region_index).into(),
                    problem: "is greater than `image.mip_levels()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-pRanges-01692"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            if range.array_layers.end > image.array_layers() {
                return Err(Box::new(ValidationError {
                    context: format!("regions[{}].array_layers.end", region_index).into(),
                    problem: "is greater than `image.array_layers()`".into(),
                    vuids: &["VUID-vkCmdClearColorImage-pRanges-01693"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ClearColorImageInfo;
    use crate::{
        buffer::BufferUsage,
        command_buffer::pool::CommandPoolCreateFlags,
        command_buffer::CommandBufferLevel,
        format::Format,
        image::{ImageSubresourceRange, ImageUsage},
        ViolationKind,
    };

    #[test]
    fn fill_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.fill_buffer(&buffer, 0, 64, 0xdeadbeef).unwrap();

        let errors = cb.fill_buffer(&buffer, 32, 64, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdFillBuffer-size-00027"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));

        let errors = cb.fill_buffer(&buffer, 2, 4, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdFillBuffer-dstOffset-00025"));
    }

    #[test]
    fn fill_buffer_usage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 64, BufferUsage::UNIFORM_BUFFER);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.fill_buffer(&buffer, 0, 64, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdFillBuffer-dstBuffer-00029"));
        assert!(errors.contains_kind(ViolationKind::MissingUsage));
    }

    #[test]
    fn fill_buffer_on_transfer_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_DST);
        let pool = crate::tests::command_pool(&device, 2, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        cb.fill_buffer(&buffer, 0, 64, 0).unwrap();
    }

    #[test]
    fn update_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.update_buffer(&buffer, 0, &[1u32, 2, 3, 4]).unwrap();

        let errors = cb.update_buffer(&buffer, 8, &[1u32, 2, 3, 4]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdUpdateBuffer-dataSize-00033"));

        let errors = cb.update_buffer(&buffer, 0, &[1u16]).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdUpdateBuffer-dataSize-00038"));
    }

    #[test]
    fn clear_color_image() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::R8G8B8A8_UNORM,
            [16, 16],
            2,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.clear_color_image(ClearColorImageInfo::image(image.clone()))
            .unwrap();

        let errors = cb
            .clear_color_image(ClearColorImageInfo {
                regions: [ImageSubresourceRange {
                    array_layers: 1..3,
                    ..image.subresource_range()
                }]
                .into_iter()
                .collect(),
                ..ClearColorImageInfo::image(image)
            })
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdClearColorImage-pRanges-01693"));
    }

    #[test]
    fn clear_depth_image_as_color() {
        let (device, _queue) = gfx_dev_and_queue!();
        let image = crate::tests::image(
            &device,
            Format::D32_SFLOAT,
            [16, 16],
            1,
            ImageUsage::TRANSFER_DST,
        );
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .clear_color_image(ClearColorImageInfo::image(image))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdClearColorImage-image-00007"));
    }
}
