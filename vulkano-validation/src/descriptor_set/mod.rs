// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Bindings between shaders and the resources they access.
//!
//! # Overview
//!
//! In order to access a buffer or an image from a shader, that buffer or image must be put in a
//! *descriptor*. Each descriptor contains one buffer or one image alongside with the way that it
//! can be accessed. A descriptor can also be an array, in which case it contains multiple buffers
//! or images that all have the same layout.
//!
//! Descriptors are grouped in what is called *descriptor sets*. In Vulkan you don't bind
//! individual descriptors one by one, but you create then bind descriptor sets one by one. As
//! binding a descriptor set has (small but non-null) a cost, you are encouraged to put
//! descriptors that are often used together in the same set so that you can keep the same set
//! binding through multiple draws.
//!
//! # Validation
//!
//! - A [`DescriptorSetLayout`](layout::DescriptorSetLayout) describes the type, count and stages
//!   of every binding.
//! - A [`DescriptorPool`](pool::DescriptorPool) hands out sets, and keeps track of how many
//!   descriptors are left.
//! - A [`DescriptorSet`] holds the resources that were written to it. Every write is checked
//!   against the layout. Writing to a set that a command buffer has recorded a bind of
//!   invalidates that command buffer, unless the binding was created with
//!   [`DescriptorBindingFlags::UPDATE_AFTER_BIND`](layout::DescriptorBindingFlags::UPDATE_AFTER_BIND).

use self::{
    layout::{DescriptorBindingFlags, DescriptorSetLayout, DescriptorType},
    pool::DescriptorPool,
};
use crate::{
    buffer::{view::BufferView, Buffer, BufferUsage},
    command_buffer::InvalidReason,
    device::{Device, DeviceOwned},
    image::{view::ImageView, ImageAspects, ImageUsage},
    sampler::Sampler,
    DeviceSize, Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use smallvec::SmallVec;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Range,
    sync::Arc,
};

pub mod layout;
pub mod pool;

/// A descriptor set allocated from a pool.
pub struct DescriptorSet {
    handle: Handle,
    pool: Arc<DescriptorPool>,
    layout: Arc<DescriptorSetLayout>,
    resources: RwLock<DescriptorSetResources>,
}

impl DescriptorSet {
    /// Allocates a new descriptor set from `pool`, and writes `descriptor_writes` to it.
    pub fn new(
        pool: Arc<DescriptorPool>,
        layout: Arc<DescriptorSetLayout>,
        descriptor_writes: impl IntoIterator<Item = WriteDescriptorSet>,
    ) -> Result<Arc<DescriptorSet>, ValidationErrors> {
        let descriptor_writes: SmallVec<[_; 8]> = descriptor_writes.into_iter().collect();
        let device = pool.device().clone();
        let mut errors = ValidationErrors::new();

        for (index, write) in descriptor_writes.iter().enumerate() {
            errors.check(
                write
                    .validate(&layout)
                    .map_err(|err| err.add_context(format!("descriptor_writes[{}]", index))),
            );
        }

        device.report(errors)?;

        let handle = pool
            .allocate(&layout)
            .map_err(|err| device.reported(err))?;

        let mut resources = DescriptorSetResources::new(&layout);

        for write in &descriptor_writes {
            resources.write(write);
        }

        Ok(Arc::new(DescriptorSet {
            handle,
            pool,
            layout,
            resources: RwLock::new(resources),
        }))
    }

    /// Returns the pool that the set was allocated from.
    #[inline]
    pub fn pool(&self) -> &Arc<DescriptorPool> {
        &self.pool
    }

    /// Returns the layout of the set.
    #[inline]
    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    /// Returns the resources that are currently written to the set.
    #[inline]
    pub fn resources(&self) -> RwLockReadGuard<'_, DescriptorSetResources> {
        self.resources.read()
    }

    /// Updates the set with new values.
    ///
    /// Every valid write is applied, even if some others are not. Command buffers that recorded
    /// a bind of the set become invalid, unless all written bindings are update-after-bind.
    pub fn update(
        &self,
        descriptor_writes: impl IntoIterator<Item = WriteDescriptorSet>,
    ) -> Result<(), ValidationErrors> {
        let device = self.device();
        let mut errors = ValidationErrors::new();

        if !device.registry().is_alive(self.handle) {
            errors.push(Box::new(ValidationError {
                context: "self".into(),
                problem: "has been freed".into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstSet-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));

            return device.report(errors);
        }

        let mut invalidates_users = false;

        {
            let mut resources = self.resources.write();

            for (index, write) in descriptor_writes.into_iter().enumerate() {
                let result = write
                    .validate(&self.layout)
                    .map_err(|err| err.add_context(format!("descriptor_writes[{}]", index)));

                if !errors.check(result) {
                    continue;
                }

                resources.write(&write);

                let update_after_bind = self
                    .layout
                    .bindings()
                    .get(&write.binding)
                    .is_some_and(|binding| {
                        binding
                            .binding_flags
                            .intersects(DescriptorBindingFlags::UPDATE_AFTER_BIND)
                    });
                invalidates_users |= !update_after_bind;
            }
        }

        if invalidates_users {
            device.invalidate_users(
                self.handle,
                InvalidReason::DescriptorSetUpdated(self.handle),
                Some(&["VUID-vkUpdateDescriptorSets-None-03047"]),
                &mut errors,
            );
        }

        device.report(errors)
    }
}

impl Drop for DescriptorSet {
    #[inline]
    fn drop(&mut self) {
        self.pool.device().registry().unregister(self.handle);
    }
}

impl VulkanObject for DescriptorSet {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for DescriptorSet {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.pool.device()
    }
}

impl Debug for DescriptorSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DescriptorSet")
            .field("handle", &self.handle)
            .field("pool", &self.pool.handle())
            .field("layout", &self.layout.handle())
            .finish_non_exhaustive()
    }
}

/// The resources that are bound to a descriptor set.
#[derive(Clone, Debug)]
pub struct DescriptorSetResources {
    binding_resources: HashMap<u32, DescriptorBindingResources>,
}

impl DescriptorSetResources {
    /// Creates a new `DescriptorSetResources` matching the provided descriptor set layout, and
    /// all descriptors set to `None`.
    pub fn new(layout: &DescriptorSetLayout) -> Self {
        let binding_resources = layout
            .bindings()
            .iter()
            .map(|(&binding_num, binding)| {
                let count = binding.descriptor_count as usize;

                let resources = match binding.descriptor_type {
                    DescriptorType::UniformBuffer
                    | DescriptorType::StorageBuffer
                    | DescriptorType::UniformBufferDynamic
                    | DescriptorType::StorageBufferDynamic => {
                        DescriptorBindingResources::Buffer(smallvec::smallvec![None; count])
                    }
                    DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer => {
                        DescriptorBindingResources::BufferView(smallvec::smallvec![None; count])
                    }
                    DescriptorType::SampledImage
                    | DescriptorType::StorageImage
                    | DescriptorType::InputAttachment => {
                        DescriptorBindingResources::ImageView(smallvec::smallvec![None; count])
                    }
                    DescriptorType::CombinedImageSampler => {
                        DescriptorBindingResources::ImageViewSampler(smallvec::smallvec![
                            None;
                            count
                        ])
                    }
                    DescriptorType::Sampler => {
                        DescriptorBindingResources::Sampler(smallvec::smallvec![None; count])
                    }
                };

                (binding_num, resources)
            })
            .collect();

        Self { binding_resources }
    }

    /// Returns a reference to the bound resources for `binding`. Returns `None` if the binding
    /// doesn't exist.
    #[inline]
    pub fn binding(&self, binding: u32) -> Option<&DescriptorBindingResources> {
        self.binding_resources.get(&binding)
    }

    /// Applies a descriptor write to the resources. The write must have been validated.
    fn write(&mut self, write: &WriteDescriptorSet) {
        let Some(resources) = self.binding_resources.get_mut(&write.binding) else {
            return;
        };

        let first = write.first_array_element as usize;

        fn write_resources<T: Clone>(resources: &mut [Option<T>], first: usize, elements: &[T]) {
            for (slot, element) in resources.iter_mut().skip(first).zip(elements) {
                *slot = Some(element.clone());
            }
        }

        match (resources, &write.elements) {
            (DescriptorBindingResources::Buffer(resources), WriteDescriptorSetElements::Buffer(elements)) => {
                write_resources(resources, first, elements)
            }
            (
                DescriptorBindingResources::BufferView(resources),
                WriteDescriptorSetElements::BufferView(elements),
            ) => write_resources(resources, first, elements),
            (
                DescriptorBindingResources::ImageView(resources),
                WriteDescriptorSetElements::ImageView(elements),
            ) => write_resources(resources, first, elements),
            (
                DescriptorBindingResources::ImageViewSampler(resources),
                WriteDescriptorSetElements::ImageViewSampler(elements),
            ) => write_resources(resources, first, elements),
            (
                DescriptorBindingResources::Sampler(resources),
                WriteDescriptorSetElements::Sampler(elements),
            ) => write_resources(resources, first, elements),
            _ => (),
        }
    }
}

/// The resources that are bound to a single descriptor set binding.
#[derive(Clone, Debug)]
pub enum DescriptorBindingResources {
    Buffer(Elements<DescriptorBufferInfo>),
    BufferView(Elements<Arc<BufferView>>),
    ImageView(Elements<Arc<ImageView>>),
    ImageViewSampler(Elements<(Arc<ImageView>, Arc<Sampler>)>),
    Sampler(Elements<Arc<Sampler>>),
}

type Elements<T> = SmallVec<[Option<T>; 1]>;

impl DescriptorBindingResources {
    /// Returns the number of array elements of the binding.
    pub fn len(&self) -> usize {
        match self {
            Self::Buffer(elements) => elements.len(),
            Self::BufferView(elements) => elements.len(),
            Self::ImageView(elements) => elements.len(),
            Self::ImageViewSampler(elements) => elements.len(),
            Self::Sampler(elements) => elements.len(),
        }
    }

    /// Returns whether the binding has no array elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether array element `index` has been written.
    pub fn is_written(&self, index: usize) -> bool {
        match self {
            Self::Buffer(elements) => elements.get(index).is_some_and(Option::is_some),
            Self::BufferView(elements) => elements.get(index).is_some_and(Option::is_some),
            Self::ImageView(elements) => elements.get(index).is_some_and(Option::is_some),
            Self::ImageViewSampler(elements) => elements.get(index).is_some_and(Option::is_some),
            Self::Sampler(elements) => elements.get(index).is_some_and(Option::is_some),
        }
    }

    /// Returns the handles of all resources written to the binding.
    pub(crate) fn handles(&self) -> Vec<Handle> {
        let mut handles = Vec::new();

        match self {
            Self::Buffer(elements) => {
                handles.extend(elements.iter().flatten().map(|info| info.buffer.handle()))
            }
            Self::BufferView(elements) => handles.extend(
                elements
                    .iter()
                    .flatten()
                    .flat_map(|view| [view.handle(), view.buffer().handle()]),
            ),
            Self::ImageView(elements) => handles.extend(
                elements
                    .iter()
                    .flatten()
                    .flat_map(|view| [view.handle(), view.image().handle()]),
            ),
            Self::ImageViewSampler(elements) => {
                handles.extend(elements.iter().flatten().flat_map(|(view, sampler)| {
                    [view.handle(), view.image().handle(), sampler.handle()]
                }))
            }
            Self::Sampler(elements) => {
                handles.extend(elements.iter().flatten().map(|sampler| sampler.handle()))
            }
        }

        handles
    }
}

/// Represents a single write operation to the binding of a descriptor set.
#[derive(Clone, Debug)]
pub struct WriteDescriptorSet {
    binding: u32,
    first_array_element: u32,
    descriptor_type: Option<DescriptorType>,
    elements: WriteDescriptorSetElements,
}

impl WriteDescriptorSet {
    /// Write a single buffer to array element 0, with the bound range covering the whole buffer.
    #[inline]
    pub fn buffer(binding: u32, buffer: Arc<Buffer>) -> Self {
        let range = 0..buffer.size();
        Self::buffer_with_range_array(binding, 0, [DescriptorBufferInfo { buffer, range }])
    }

    /// Write a number of consecutive buffer elements.
    pub fn buffer_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<Buffer>>,
    ) -> Self {
        Self::buffer_with_range_array(
            binding,
            first_array_element,
            elements.into_iter().map(|buffer| {
                let range = 0..buffer.size();
                DescriptorBufferInfo { buffer, range }
            }),
        )
    }

    /// Write a single buffer to array element 0, specifying the range of the buffer to be bound.
    #[inline]
    pub fn buffer_with_range(binding: u32, buffer_info: DescriptorBufferInfo) -> Self {
        Self::buffer_with_range_array(binding, 0, [buffer_info])
    }

    /// Write a number of consecutive buffer elements, specifying the ranges of the buffers to be
    /// bound.
    pub fn buffer_with_range_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = DescriptorBufferInfo>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            descriptor_type: None,
            elements: WriteDescriptorSetElements::Buffer(elements.into_iter().collect()),
        }
    }

    /// Write a single buffer view to array element 0.
    #[inline]
    pub fn buffer_view(binding: u32, buffer_view: Arc<BufferView>) -> Self {
        Self::buffer_view_array(binding, 0, [buffer_view])
    }

    /// Write a number of consecutive buffer view elements.
    pub fn buffer_view_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<BufferView>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            descriptor_type: None,
            elements: WriteDescriptorSetElements::BufferView(elements.into_iter().collect()),
        }
    }

    /// Write a single image view to array element 0.
    #[inline]
    pub fn image_view(binding: u32, image_view: Arc<ImageView>) -> Self {
        Self::image_view_array(binding, 0, [image_view])
    }

    /// Write a number of consecutive image view elements.
    pub fn image_view_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<ImageView>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            descriptor_type: None,
            elements: WriteDescriptorSetElements::ImageView(elements.into_iter().collect()),
        }
    }

    /// Write a single image view and sampler to array element 0.
    #[inline]
    pub fn image_view_sampler(
        binding: u32,
        image_view: Arc<ImageView>,
        sampler: Arc<Sampler>,
    ) -> Self {
        Self::image_view_sampler_array(binding, 0, [(image_view, sampler)])
    }

    /// Write a number of consecutive image view and sampler elements.
    pub fn image_view_sampler_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = (Arc<ImageView>, Arc<Sampler>)>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            descriptor_type: None,
            elements: WriteDescriptorSetElements::ImageViewSampler(elements.into_iter().collect()),
        }
    }

    /// Write a single sampler to array element 0.
    #[inline]
    pub fn sampler(binding: u32, sampler: Arc<Sampler>) -> Self {
        Self::sampler_array(binding, 0, [sampler])
    }

    /// Write a number of consecutive sampler elements.
    pub fn sampler_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<Sampler>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            descriptor_type: None,
            elements: WriteDescriptorSetElements::Sampler(elements.into_iter().collect()),
        }
    }

    /// Sets the descriptor type that the write declares. By default, the type of the binding in
    /// the layout is used.
    #[inline]
    pub fn with_descriptor_type(mut self, descriptor_type: DescriptorType) -> Self {
        self.descriptor_type = Some(descriptor_type);
        self
    }

    /// Returns the binding number that is updated by this descriptor write.
    #[inline]
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Returns the first array element in the binding that is updated by this descriptor write.
    #[inline]
    pub fn first_array_element(&self) -> u32 {
        self.first_array_element
    }

    /// Returns a reference to the elements held by this descriptor write.
    #[inline]
    pub fn elements(&self) -> &WriteDescriptorSetElements {
        &self.elements
    }

    pub(crate) fn validate(&self, layout: &DescriptorSetLayout) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding,
            first_array_element,
            descriptor_type,
            ref elements,
        } = self;

        let device = layout.device();
        let properties = device.properties();

        let Some(layout_binding) = layout.bindings().get(&binding) else {
            return Err(Box::new(ValidationError {
                context: "binding".into(),
                problem: "does not exist in the descriptor set layout".into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstBinding-00315"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        };

        let layout_type = layout_binding.descriptor_type;

        if let Some(descriptor_type) = descriptor_type {
            if descriptor_type != layout_type {
                return Err(Box::new(ValidationError {
                    context: "descriptor_type".into(),
                    problem: format!(
                        "is `DescriptorType::{:?}`, but descriptor set binding {} has type \
                        `DescriptorType::{:?}`",
                        descriptor_type, binding, layout_type,
                    )
                    .into(),
                    vuids: &["VUID-VkWriteDescriptorSet-descriptorType-00319"],
                    kind: Some(ViolationKind::DescriptorTypeMismatch),
                    ..Default::default()
                }));
            }
        }

        let element_count = elements.len();

        if element_count == 0 {
            return Err(Box::new(ValidationError {
                context: "elements".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkWriteDescriptorSet-descriptorCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if first_array_element as u64 + element_count as u64
            > layout_binding.descriptor_count as u64
        {
            return Err(Box::new(ValidationError {
                problem: format!(
                    "`first_array_element` + the number of elements ({}) is greater than the \
                    number of descriptors in descriptor set binding {} ({})",
                    first_array_element as u64 + element_count as u64,
                    binding,
                    layout_binding.descriptor_count,
                )
                .into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstArrayElement-00321"],
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        let type_mismatch = || {
            Box::new(ValidationError {
                context: "elements".into(),
                problem: format!(
                    "contains `{}` elements, but descriptor set binding {} has type \
                    `DescriptorType::{:?}`",
                    elements.type_name(),
                    binding,
                    layout_type,
                )
                .into(),
                vuids: &["VUID-VkWriteDescriptorSet-descriptorType-00319"],
                kind: Some(ViolationKind::DescriptorTypeMismatch),
                ..Default::default()
            })
        };

        let validate_image_view = |image_view: &ImageView,
                                   index: usize|
         -> Result<(), Box<ValidationError>> {
            if !image_view.is_alive() {
                return Err(Box::new(ValidationError {
                    context: format!("elements[{}]", index).into(),
                    problem: "the image view or its image has been destroyed".into(),
                    vuids: &["VUID-VkDescriptorImageInfo-imageView-parameter"],
                    kind: Some(ViolationKind::DestroyedObjectUsed),
                    ..Default::default()
                }));
            }

            let (usage, vuids): (ImageUsage, &'static [&'static str]) = match layout_type {
                DescriptorType::StorageImage => (
                    ImageUsage::STORAGE,
                    &["VUID-VkWriteDescriptorSet-descriptorType-00339"],
                ),
                DescriptorType::InputAttachment => (
                    ImageUsage::INPUT_ATTACHMENT,
                    &["VUID-VkWriteDescriptorSet-descriptorType-00338"],
                ),
                _ => (
                    ImageUsage::SAMPLED,
                    &["VUID-VkWriteDescriptorSet-descriptorType-00337"],
                ),
            };

            if !image_view.usage().intersects(usage) {
                return Err(Box::new(ValidationError {
                    context: format!("elements[{}]", index).into(),
                    problem: format!(
                        "the descriptor type is `DescriptorType::{:?}`, but the image view's \
                        usage does not contain `ImageUsage::{:?}`",
                        layout_type, usage,
                    )
                    .into(),
                    vuids,
                    kind: Some(ViolationKind::MissingUsage),
                    ..Default::default()
                }));
            }

            if image_view
                .subresource_range()
                .aspects
                .contains(ImageAspects::DEPTH | ImageAspects::STENCIL)
            {
                return Err(Box::new(ValidationError {
                    context: format!("elements[{}]", index).into(),
                    problem: "the image view's aspects include both a depth and a stencil \
                        component"
                        .into(),
                    vuids: &["VUID-VkDescriptorImageInfo-imageView-01976"],
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            Ok(())
        };

        match layout_type {
            DescriptorType::UniformBuffer
            | DescriptorType::StorageBuffer
            | DescriptorType::UniformBufferDynamic
            | DescriptorType::StorageBufferDynamic => {
                let WriteDescriptorSetElements::Buffer(elements) = elements else {
                    return Err(type_mismatch());
                };

                let (usage, usage_vuids, alignment, alignment_vuids): (
                    BufferUsage,
                    &'static [&'static str],
                    DeviceSize,
                    &'static [&'static str],
                ) = match layout_type {
                    DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic => (
                        BufferUsage::UNIFORM_BUFFER,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00330"],
                        properties.min_uniform_buffer_offset_alignment,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00327"],
                    ),
                    _ => (
                        BufferUsage::STORAGE_BUFFER,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00331"],
                        properties.min_storage_buffer_offset_alignment,
                        &["VUID-VkWriteDescriptorSet-descriptorType-00328"],
                    ),
                };

                for (index, buffer_info) in elements.iter().enumerate() {
                    let DescriptorBufferInfo { buffer, range } = buffer_info;

                    buffer
                        .validate_use(
                            usage,
                            usage_vuids,
                            &["VUID-VkWriteDescriptorSet-descriptorType-00329"],
                        )
                        .map_err(|err| err.add_context(format!("elements[{}].buffer", index)))?;

                    if range.start >= buffer.size() {
                        return Err(Box::new(ValidationError {
                            context: format!("elements[{}].range.start", index).into(),
                            problem: "is not less than the size of the buffer".into(),
                            vuids: &["VUID-VkDescriptorBufferInfo-offset-00340"],
                            kind: Some(ViolationKind::RegionOutOfBounds),
                            ..Default::default()
                        }));
                    }

                    if range.is_empty() {
                        return Err(Box::new(ValidationError {
                            context: format!("elements[{}].range", index).into(),
                            problem: "is empty".into(),
                            vuids: &["VUID-VkDescriptorBufferInfo-range-00341"],
                            kind: Some(ViolationKind::InvalidParameter),
                            ..Default::default()
                        }));
                    }

                    if range.end > buffer.size() {
                        return Err(Box::new(ValidationError {
                            context: format!("elements[{}].range.end", index).into(),
                            problem: "is greater than the size of the buffer".into(),
                            vuids: &["VUID-VkDescriptorBufferInfo-range-00342"],
                            kind: Some(ViolationKind::RegionOutOfBounds),
                            ..Default::default()
                        }));
                    }

                    if !layout_type.is_dynamic() && range.start % alignment != 0 {
                        return Err(Box::new(ValidationError {
                            context: format!("elements[{}].range.start", index).into(),
                            problem: format!(
                                "is not a multiple of the minimum offset alignment ({})",
                                alignment,
                            )
                            .into(),
                            vuids: alignment_vuids,
                            kind: Some(ViolationKind::InvalidParameter),
                            ..Default::default()
                        }));
                    }
                }
            }
            DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer => {
                let WriteDescriptorSetElements::BufferView(elements) = elements else {
                    return Err(type_mismatch());
                };

                let (usage, usage_vuids): (BufferUsage, &'static [&'static str]) =
                    if layout_type == DescriptorType::UniformTexelBuffer {
                        (
                            BufferUsage::UNIFORM_TEXEL_BUFFER,
                            &["VUID-VkWriteDescriptorSet-descriptorType-08765"],
                        )
                    } else {
                        (
                            BufferUsage::STORAGE_TEXEL_BUFFER,
                            &["VUID-VkWriteDescriptorSet-descriptorType-08766"],
                        )
                    };

                for (index, buffer_view) in elements.iter().enumerate() {
                    if !buffer_view.is_alive() {
                        return Err(Box::new(ValidationError {
                            context: format!("elements[{}]", index).into(),
                            problem: "the buffer view or its buffer has been destroyed".into(),
                            vuids: &["VUID-VkWriteDescriptorSet-descriptorType-02994"],
                            kind: Some(ViolationKind::DestroyedObjectUsed),
                            ..Default::default()
                        }));
                    }

                    buffer_view
                        .buffer()
                        .validate_use(
                            usage,
                            usage_vuids,
                            &["VUID-VkWriteDescriptorSet-descriptorType-00329"],
                        )
                        .map_err(|err| {
                            err.add_context(format!("elements[{}].buffer()", index))
                        })?;
                }
            }
            DescriptorType::SampledImage
            | DescriptorType::StorageImage
            | DescriptorType::InputAttachment => {
                let WriteDescriptorSetElements::ImageView(elements) = elements else {
                    return Err(type_mismatch());
                };

                for (index, image_view) in elements.iter().enumerate() {
                    validate_image_view(image_view, index)?;
                }
            }
            DescriptorType::CombinedImageSampler => {
                let WriteDescriptorSetElements::ImageViewSampler(elements) = elements else {
                    return Err(type_mismatch());
                };

                for (index, (image_view, _sampler)) in elements.iter().enumerate() {
                    validate_image_view(image_view, index)?;
                }
            }
            DescriptorType::Sampler => {
                if !matches!(elements, WriteDescriptorSetElements::Sampler(_)) {
                    return Err(type_mismatch());
                }
            }
        }

        Ok(())
    }
}

/// The elements held by a `WriteDescriptorSet`.
#[derive(Clone, Debug)]
pub enum WriteDescriptorSetElements {
    Buffer(SmallVec<[DescriptorBufferInfo; 1]>),
    BufferView(SmallVec<[Arc<BufferView>; 1]>),
    ImageView(SmallVec<[Arc<ImageView>; 1]>),
    ImageViewSampler(SmallVec<[(Arc<ImageView>, Arc<Sampler>); 1]>),
    Sampler(SmallVec<[Arc<Sampler>; 1]>),
}

impl WriteDescriptorSetElements {
    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> u32 {
        match self {
            Self::Buffer(elements) => elements.len() as u32,
            Self::BufferView(elements) => elements.len() as u32,
            Self::ImageView(elements) => elements.len() as u32,
            Self::ImageViewSampler(elements) => elements.len() as u32,
            Self::Sampler(elements) => elements.len() as u32,
        }
    }

    /// Returns whether there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::BufferView(_) => "buffer_view",
            Self::ImageView(_) => "image_view",
            Self::ImageViewSampler(_) => "image_view_sampler",
            Self::Sampler(_) => "sampler",
        }
    }
}

/// Parameters to write a buffer reference to a descriptor.
#[derive(Clone, Debug)]
pub struct DescriptorBufferInfo {
    /// The buffer to write to the descriptor.
    pub buffer: Arc<Buffer>,

    /// The slice of bytes in `buffer` that will be made available to the shader.
    ///
    /// For dynamic buffer bindings, `range.start` is the base offset that the dynamic offset is
    /// added to when the set is bound.
    pub range: Range<DeviceSize>,
}

#[cfg(test)]
mod tests {
    use super::{
        layout::{
            DescriptorBindingFlags, DescriptorSetLayout, DescriptorSetLayoutBinding,
            DescriptorSetLayoutCreateFlags, DescriptorSetLayoutCreateInfo, DescriptorType,
        },
        pool::{DescriptorPool, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo},
        DescriptorBufferInfo, DescriptorSet, WriteDescriptorSet,
    };
    use crate::{
        buffer::BufferUsage,
        device::Device,
        shader::ShaderStages,
        tests::buffer,
        ViolationKind,
    };
    use std::{collections::BTreeMap, sync::Arc};

    fn layout_and_pool(
        device: &Arc<Device>,
        descriptor_type: DescriptorType,
        descriptor_count: u32,
        binding_flags: DescriptorBindingFlags,
    ) -> (Arc<DescriptorSetLayout>, Arc<DescriptorPool>) {
        let update_after_bind = binding_flags.intersects(DescriptorBindingFlags::UPDATE_AFTER_BIND);
        let layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                flags: if update_after_bind {
                    DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
                } else {
                    DescriptorSetLayoutCreateFlags::empty()
                },
                bindings: BTreeMap::from([(
                    0,
                    DescriptorSetLayoutBinding {
                        binding_flags,
                        descriptor_count,
                        stages: ShaderStages::all_graphics() | ShaderStages::COMPUTE,
                        ..DescriptorSetLayoutBinding::descriptor_type(descriptor_type)
                    },
                )]),
                ..Default::default()
            },
        )
        .unwrap();
        let pool = DescriptorPool::new(
            device.clone(),
            DescriptorPoolCreateInfo {
                flags: if update_after_bind {
                    DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
                } else {
                    DescriptorPoolCreateFlags::empty()
                },
                max_sets: 4,
                pool_sizes: [(descriptor_type, 16)].into_iter().collect(),
                ..Default::default()
            },
        )
        .unwrap();

        (layout, pool)
    }

    #[test]
    fn write_and_read_back() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (layout, pool) = layout_and_pool(
            &device,
            DescriptorType::UniformBuffer,
            2,
            DescriptorBindingFlags::empty(),
        );
        let uniform = buffer(&device, 256, BufferUsage::UNIFORM_BUFFER);

        let set = DescriptorSet::new(
            pool,
            layout,
            [WriteDescriptorSet::buffer_array(0, 1, [uniform])],
        )
        .unwrap();

        let resources = set.resources();
        let binding = resources.binding(0).unwrap();
        assert!(!binding.is_written(0));
        assert!(binding.is_written(1));
    }

    #[test]
    fn descriptor_type_mismatch() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (layout, pool) = layout_and_pool(
            &device,
            DescriptorType::UniformBuffer,
            1,
            DescriptorBindingFlags::empty(),
        );
        let uniform = buffer(&device, 256, BufferUsage::UNIFORM_BUFFER);
        let set = DescriptorSet::new(pool, layout, []).unwrap();

        let errors = set
            .update([WriteDescriptorSet::buffer(0, uniform)
                .with_descriptor_type(DescriptorType::StorageBuffer)])
            .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::DescriptorTypeMismatch));
        assert!(errors.contains_vuid("VUID-VkWriteDescriptorSet-descriptorType-00319"));
    }

    #[test]
    fn array_element_out_of_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (layout, pool) = layout_and_pool(
            &device,
            DescriptorType::StorageBuffer,
            1,
            DescriptorBindingFlags::empty(),
        );
        let storage = buffer(&device, 256, BufferUsage::STORAGE_BUFFER);

        let errors = DescriptorSet::new(
            pool,
            layout,
            [WriteDescriptorSet::buffer_array(0, 1, [storage])],
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkWriteDescriptorSet-dstArrayElement-00321"));
    }

    #[test]
    fn buffer_usage_and_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (layout, pool) = layout_and_pool(
            &device,
            DescriptorType::UniformBuffer,
            1,
            DescriptorBindingFlags::empty(),
        );
        let set = DescriptorSet::new(pool, layout, []).unwrap();

        let storage = buffer(&device, 256, BufferUsage::STORAGE_BUFFER);
        let errors = set
            .update([WriteDescriptorSet::buffer(0, storage)])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkWriteDescriptorSet-descriptorType-00330"));

        let uniform = buffer(&device, 256, BufferUsage::UNIFORM_BUFFER);
        let errors = set
            .update([WriteDescriptorSet::buffer_with_range(
                0,
                DescriptorBufferInfo {
                    buffer: uniform.clone(),
                    range: 0..512,
                },
            )])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkDescriptorBufferInfo-range-00342"));

        let errors = set
            .update([WriteDescriptorSet::buffer_with_range(
                0,
                DescriptorBufferInfo {
                    buffer: uniform,
                    range: 4..64,
                },
            )])
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkWriteDescriptorSet-descriptorType-00327"));
    }

    #[test]
    fn wrong_element_kind() {
        let (device, _queue) = gfx_dev_and_queue!();
        let (layout, pool) = layout_and_pool(
            &device,
            DescriptorType::UniformTexelBuffer,
            1,
            DescriptorBindingFlags::empty(),
        );
        let uniform = buffer(&device, 256, BufferUsage::UNIFORM_BUFFER);

        let errors = DescriptorSet::new(pool, layout, [WriteDescriptorSet::buffer(0, uniform)])
            .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::DescriptorTypeMismatch));
    }
}
