// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! View of a buffer, in order to use it as a uniform texel buffer or storage texel buffer.
//!
//! In order to create a view from a buffer, the buffer must have been created with either the
//! `UNIFORM_TEXEL_BUFFER` or the `STORAGE_TEXEL_BUFFER` usage, and the format of the view must
//! support the matching format feature.
//!
//! Shaders address a texel buffer by texel index. Only indices less than
//! [`texel_count`](BufferView::texel_count) are in bounds; the GPU-assisted checker reports every
//! access past the end.

use super::{Buffer, BufferUsage};
use crate::{
    device::{Device, DeviceOwned},
    format::{Format, FormatFeatures},
    registry::ObjectType,
    DeviceSize, Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Represents a way for the GPU to interpret buffer data.
pub struct BufferView {
    handle: Handle,
    buffer: Arc<Buffer>,

    format: Format,
    offset: DeviceSize,
    range: DeviceSize,
    format_features: FormatFeatures,
}

impl BufferView {
    /// Creates a new `BufferView`.
    pub fn new(
        buffer: Arc<Buffer>,
        create_info: BufferViewCreateInfo,
    ) -> Result<Arc<BufferView>, ValidationErrors> {
        buffer
            .device()
            .report_one(Self::validate_new(&buffer, &create_info))?;

        Ok(Self::new_unchecked(buffer, create_info))
    }

    fn validate_new(
        buffer: &Buffer,
        create_info: &BufferViewCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        let device = buffer.device();

        if !device.registry().is_alive(buffer.handle()) {
            return Err(Box::new(ValidationError {
                context: "buffer".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        create_info
            .validate(device, buffer)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(buffer: Arc<Buffer>, create_info: BufferViewCreateInfo) -> Arc<BufferView> {
        let BufferViewCreateInfo {
            format,
            offset,
            range,
            _ne: _,
        } = create_info;

        let range = range.unwrap_or(buffer.size() - offset);
        let format_features = buffer.device().format_properties(format).buffer_features;

        Arc::new(BufferView {
            handle: buffer
                .device()
                .registry()
                .register(ObjectType::BufferView, None),
            buffer,
            format,
            offset,
            range,
            format_features,
        })
    }

    /// Returns the buffer associated to this view.
    #[inline]
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Returns the format of this view.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the byte offset of the view in the buffer.
    #[inline]
    pub fn offset(&self) -> DeviceSize {
        self.offset
    }

    /// Returns the number of bytes of the buffer that the view covers.
    #[inline]
    pub fn range(&self) -> DeviceSize {
        self.range
    }

    /// Returns the features supported by the view's format for buffers.
    #[inline]
    pub fn format_features(&self) -> FormatFeatures {
        self.format_features
    }

    /// Returns the number of texels that shaders can access through the view.
    #[inline]
    pub fn texel_count(&self) -> DeviceSize {
        self.range / self.format.block_size()
    }

    /// Returns whether both the view and the buffer it wraps are alive.
    pub(crate) fn is_alive(&self) -> bool {
        let registry = self.device().registry();
        registry.is_alive(self.handle) && registry.is_alive(self.buffer.handle())
    }
}

impl Drop for BufferView {
    #[inline]
    fn drop(&mut self) {
        self.buffer.device().registry().unregister(self.handle);
    }
}

impl VulkanObject for BufferView {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for BufferView {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.buffer.device()
    }
}

impl Debug for BufferView {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("BufferView")
            .field("handle", &self.handle)
            .field("buffer", &self.buffer.handle())
            .field("format", &self.format)
            .field("offset", &self.offset)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `BufferView`.
#[derive(Clone, Debug)]
pub struct BufferViewCreateInfo {
    /// The format of the buffer view.
    ///
    /// The default value is `Format::R8G8B8A8_UNORM`.
    pub format: Format,

    /// The byte offset of the view in the buffer.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// The number of bytes that the view covers, or `None` to cover the buffer from `offset` to
    /// its end.
    ///
    /// The default value is `None`.
    pub range: Option<DeviceSize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            format: Format::R8G8B8A8_UNORM,
            offset: 0,
            range: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl BufferViewCreateInfo {
    pub(crate) fn validate(
        &self,
        device: &Device,
        buffer: &Buffer,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            format,
            offset,
            range,
            _ne: _,
        } = self;

        let properties = device.properties();
        let buffer_usage = buffer.usage();

        if !buffer_usage
            .intersects(BufferUsage::UNIFORM_TEXEL_BUFFER | BufferUsage::STORAGE_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                context: "buffer.usage()".into(),
                problem: "does not contain `BufferUsage::UNIFORM_TEXEL_BUFFER` or \
                    `BufferUsage::STORAGE_TEXEL_BUFFER`"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00932"],
                kind: Some(ViolationKind::MissingUsage),
                ..Default::default()
            }));
        }

        if !buffer.is_bound() {
            return Err(Box::new(ValidationError {
                context: "buffer".into(),
                problem: "has no memory bound to it".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00935"],
                kind: Some(ViolationKind::MemoryNotBound),
                ..Default::default()
            }));
        }

        if offset >= buffer.size() {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not less than the size of the buffer".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-offset-00925"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        if offset % properties.min_texel_buffer_offset_alignment != 0 {
            return Err(Box::new(ValidationError {
                context: "offset".into(),
                problem: "is not a multiple of the `min_texel_buffer_offset_alignment` limit"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-offset-02749"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        let block_size = format.block_size();

        if block_size == 0 {
            return Err(Box::new(ValidationError {
                context: "format".into(),
                problem: "is a multi-planar format".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-format-parameter"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if let Some(range) = range {
            if range == 0 {
                return Err(Box::new(ValidationError {
                    context: "range".into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-range-00928"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if range % block_size != 0 {
                return Err(Box::new(ValidationError {
                    context: "range".into(),
                    problem: "is not a multiple of the block size of `format`".into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-range-00929"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            if range / block_size > properties.max_texel_buffer_elements as DeviceSize {
                return Err(Box::new(ValidationError {
                    context: "range".into(),
                    problem: "divided by the block size of `format` exceeds the \
                        `max_texel_buffer_elements` limit"
                        .into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-range-00930"],
                    kind: Some(ViolationKind::LimitExceeded),
                    ..Default::default()
                }));
            }

            if offset + range > buffer.size() {
                return Err(Box::new(ValidationError {
                    problem: "`offset` + `range` is greater than the size of the buffer".into(),
                    vuids: &["VUID-VkBufferViewCreateInfo-offset-00931"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }
        } else if (buffer.size() - offset) / block_size
            > properties.max_texel_buffer_elements as DeviceSize
        {
            return Err(Box::new(ValidationError {
                problem: "the size of the buffer minus `offset`, divided by the block size of \
                    `format`, exceeds the `max_texel_buffer_elements` limit"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-range-04059"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        let format_features = device.format_properties(format).buffer_features;

        if buffer_usage.intersects(BufferUsage::UNIFORM_TEXEL_BUFFER)
            && !format_features.intersects(FormatFeatures::UNIFORM_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                problem: "`buffer` was created with `BufferUsage::UNIFORM_TEXEL_BUFFER`, but the \
                    format features of `format` do not include \
                    `FormatFeatures::UNIFORM_TEXEL_BUFFER`"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00933"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        if buffer_usage.intersects(BufferUsage::STORAGE_TEXEL_BUFFER)
            && !format_features.intersects(FormatFeatures::STORAGE_TEXEL_BUFFER)
        {
            return Err(Box::new(ValidationError {
                problem: "`buffer` was created with `BufferUsage::STORAGE_TEXEL_BUFFER`, but the \
                    format features of `format` do not include \
                    `FormatFeatures::STORAGE_TEXEL_BUFFER`"
                    .into(),
                vuids: &["VUID-VkBufferViewCreateInfo-buffer-00934"],
                kind: Some(ViolationKind::MissingFormatFeature),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferView, BufferViewCreateInfo};
    use crate::{buffer::BufferUsage, format::Format, ViolationKind};

    #[test]
    fn texel_count() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 1024, BufferUsage::UNIFORM_TEXEL_BUFFER);

        let view = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                format: Format::R32G32B32A32_SFLOAT,
                offset: 256,
                range: Some(320),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(view.range(), 320);
        assert_eq!(view.texel_count(), 20);
    }

    #[test]
    fn whole_size() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 1024, BufferUsage::STORAGE_TEXEL_BUFFER);

        let view = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                format: Format::R32_UINT,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(view.texel_count(), 256);
    }

    #[test]
    fn missing_usage() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 128, BufferUsage::UNIFORM_BUFFER);

        let errors = BufferView::new(buffer, BufferViewCreateInfo::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkBufferViewCreateInfo-buffer-00932"));
    }

    #[test]
    fn unaligned_offset() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 1024, BufferUsage::UNIFORM_TEXEL_BUFFER);

        let errors = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                offset: 4,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkBufferViewCreateInfo-offset-02749"));
    }

    #[test]
    fn range_past_end() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 512, BufferUsage::UNIFORM_TEXEL_BUFFER);

        let errors = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                offset: 256,
                range: Some(512),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkBufferViewCreateInfo-offset-00931"));
        assert!(errors.contains_kind(ViolationKind::RegionOutOfBounds));
    }

    #[test]
    fn storage_texel_format_feature() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 256, BufferUsage::STORAGE_TEXEL_BUFFER);

        let errors = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                format: Format::R8_UNORM,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkBufferViewCreateInfo-buffer-00934"));
    }
}
