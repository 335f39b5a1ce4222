// Copyright (c) 2023 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Tracks every live object of a device.
//!
//! Objects are stored in a generational arena. A [`Handle`] packs the object type, the index of
//! its slot and the generation of the slot at the time the object was created. Destroying an
//! object bumps the generation of its slot, so a stale handle can never be confused with a new
//! object that reuses the same slot, even though the slot index is the same.
//!
//! The registry also keeps a directory of the live command buffers. When an object is destroyed,
//! the device walks this directory to invalidate every command buffer that recorded a reference
//! to it.

use crate::{command_buffer::CommandBuffer, VulkanObject};
use foldhash::HashMap;
use parking_lot::RwLock;
use std::{
    fmt::{Debug, Display, Error as FmtError, Formatter},
    sync::{Arc, Weak},
};

const INDEX_BITS: u32 = 32;
const GENERATION_BITS: u32 = 24;
const GENERATION_MASK: u64 = (1 << GENERATION_BITS) - 1;

/// The type of object that a [`Handle`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    DeviceMemory = 1,
    Buffer,
    BufferView,
    Image,
    ImageView,
    Sampler,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    RenderPass,
    Framebuffer,
    CommandPool,
    CommandBuffer,
    QueryPool,
    Event,
    Semaphore,
}

impl ObjectType {
    const ALL: [ObjectType; 19] = [
        ObjectType::DeviceMemory,
        ObjectType::Buffer,
        ObjectType::BufferView,
        ObjectType::Image,
        ObjectType::ImageView,
        ObjectType::Sampler,
        ObjectType::DescriptorSetLayout,
        ObjectType::DescriptorPool,
        ObjectType::DescriptorSet,
        ObjectType::ShaderModule,
        ObjectType::PipelineLayout,
        ObjectType::Pipeline,
        ObjectType::RenderPass,
        ObjectType::Framebuffer,
        ObjectType::CommandPool,
        ObjectType::CommandBuffer,
        ObjectType::QueryPool,
        ObjectType::Event,
        ObjectType::Semaphore,
    ];

    fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| *ty as u8 == raw)
    }

    /// Returns the VUID that is violated when an object of this type is destroyed while a
    /// pending command buffer still uses it.
    pub(crate) fn destroy_in_use_vuids(self) -> &'static [&'static str] {
        match self {
            ObjectType::DeviceMemory => &["VUID-vkFreeMemory-memory-00677"],
            ObjectType::Buffer => &["VUID-vkDestroyBuffer-buffer-00922"],
            ObjectType::BufferView => &["VUID-vkDestroyBufferView-bufferView-00936"],
            ObjectType::Image => &["VUID-vkDestroyImage-image-01000"],
            ObjectType::ImageView => &["VUID-vkDestroyImageView-imageView-01026"],
            ObjectType::Sampler => &["VUID-vkDestroySampler-sampler-01082"],
            ObjectType::DescriptorSetLayout => {
                &["VUID-vkDestroyDescriptorSetLayout-descriptorSetLayout-parameter"]
            }
            ObjectType::DescriptorPool => &["VUID-vkDestroyDescriptorPool-descriptorPool-00303"],
            ObjectType::DescriptorSet => &["VUID-vkFreeDescriptorSets-pDescriptorSets-00309"],
            ObjectType::ShaderModule => &["VUID-vkDestroyShaderModule-shaderModule-parameter"],
            ObjectType::PipelineLayout => &["VUID-vkDestroyPipelineLayout-pipelineLayout-parameter"],
            ObjectType::Pipeline => &["VUID-vkDestroyPipeline-pipeline-00765"],
            ObjectType::RenderPass => &["VUID-vkDestroyRenderPass-renderPass-00873"],
            ObjectType::Framebuffer => &["VUID-vkDestroyFramebuffer-framebuffer-00892"],
            ObjectType::CommandPool => &["VUID-vkDestroyCommandPool-commandPool-00041"],
            ObjectType::CommandBuffer => &["VUID-vkFreeCommandBuffers-pCommandBuffers-00047"],
            ObjectType::QueryPool => &["VUID-vkDestroyQueryPool-queryPool-00793"],
            ObjectType::Event => &["VUID-vkDestroyEvent-event-01145"],
            ObjectType::Semaphore => &["VUID-vkDestroySemaphore-semaphore-05149"],
        }
    }

    /// Returns the VUID that is violated when a handle of this type no longer refers to a live
    /// object.
    pub(crate) fn parameter_vuids(self) -> &'static [&'static str] {
        match self {
            ObjectType::DeviceMemory => &["VUID-vkFreeMemory-memory-parameter"],
            ObjectType::Buffer => &["VUID-vkDestroyBuffer-buffer-parameter"],
            ObjectType::BufferView => &["VUID-vkDestroyBufferView-bufferView-parameter"],
            ObjectType::Image => &["VUID-vkDestroyImage-image-parameter"],
            ObjectType::ImageView => &["VUID-vkDestroyImageView-imageView-parameter"],
            ObjectType::Sampler => &["VUID-vkDestroySampler-sampler-parameter"],
            ObjectType::DescriptorSetLayout => {
                &["VUID-vkDestroyDescriptorSetLayout-descriptorSetLayout-parameter"]
            }
            ObjectType::DescriptorPool => &["VUID-vkDestroyDescriptorPool-descriptorPool-parameter"],
            ObjectType::DescriptorSet => &["VUID-vkFreeDescriptorSets-pDescriptorSets-00310"],
            ObjectType::ShaderModule => &["VUID-vkDestroyShaderModule-shaderModule-parameter"],
            ObjectType::PipelineLayout => &["VUID-vkDestroyPipelineLayout-pipelineLayout-parameter"],
            ObjectType::Pipeline => &["VUID-vkDestroyPipeline-pipeline-parameter"],
            ObjectType::RenderPass => &["VUID-vkDestroyRenderPass-renderPass-parameter"],
            ObjectType::Framebuffer => &["VUID-vkDestroyFramebuffer-framebuffer-parameter"],
            ObjectType::CommandPool => &["VUID-vkDestroyCommandPool-commandPool-parameter"],
            ObjectType::CommandBuffer => &["VUID-vkFreeCommandBuffers-pCommandBuffers-00048"],
            ObjectType::QueryPool => &["VUID-vkDestroyQueryPool-queryPool-parameter"],
            ObjectType::Event => &["VUID-vkDestroyEvent-event-parameter"],
            ObjectType::Semaphore => &["VUID-vkDestroySemaphore-semaphore-parameter"],
        }
    }
}

/// The lifecycle state of a registered object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// The object was created, and has no memory bound to it (if it needs any).
    Created,
    /// Memory has been bound to the buffer or image.
    BoundToMemory,
    /// The object was destroyed, or the handle never referred to a live object.
    Destroyed,
    /// The object is alive, but can't be used anymore until it's reset. Only command buffers
    /// enter this state.
    Invalidated,
}

/// Identifies an object in the registry of a device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handle(u64);

impl Handle {
    /// The null handle. It never refers to a live object.
    pub const NULL: Handle = Handle(0);

    fn new(object_type: ObjectType, index: u32, generation: u32) -> Self {
        Handle(
            (object_type as u64) << (INDEX_BITS + GENERATION_BITS)
                | (generation as u64 & GENERATION_MASK) << INDEX_BITS
                | index as u64,
        )
    }

    /// Returns the raw value of the handle.
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Creates a handle from a raw value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    /// Returns the type of object that the handle refers to, or `None` for the null handle.
    #[inline]
    pub fn object_type(self) -> Option<ObjectType> {
        ObjectType::from_raw((self.0 >> (INDEX_BITS + GENERATION_BITS)) as u8)
    }

    /// Returns the index of the slot in the registry.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation of the slot at the time the object was created.
    #[inline]
    pub const fn generation(self) -> u32 {
        ((self.0 >> INDEX_BITS) & GENERATION_MASK) as u32
    }
}

impl VulkanObject for Handle {
    #[inline]
    fn handle(&self) -> Handle {
        *self
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self.object_type() {
            Some(ty) => write!(f, "{:?}#{}v{}", ty, self.index(), self.generation()),
            None => write!(f, "VK_NULL_HANDLE"),
        }
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        Debug::fmt(self, f)
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct Entry {
    state: ObjectState,
    parent: Option<Handle>,
    children: Vec<Handle>,
}

#[derive(Default)]
struct RegistryInner {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    command_buffers: HashMap<Handle, Weak<CommandBuffer>>,
}

impl RegistryInner {
    fn entry(&self, handle: Handle) -> Option<&Entry> {
        let slot = self.slots.get(handle.index() as usize)?;

        if slot.generation != handle.generation() {
            return None;
        }

        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(handle.index() as usize)?;

        if slot.generation != handle.generation() {
            return None;
        }

        slot.entry.as_mut()
    }
}

/// The table of live objects of a device.
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Registers a new object and returns its handle.
    ///
    /// If `parent` is given, the object is freed when its parent is destroyed.
    pub(crate) fn register(&self, object_type: ObjectType, parent: Option<Handle>) -> Handle {
        let mut inner = self.inner.write();

        let entry = Entry {
            state: ObjectState::Created,
            parent,
            children: Vec::new(),
        };

        let handle = if let Some(index) = inner.free_list.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.entry = Some(entry);
            Handle::new(object_type, index, slot.generation)
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 1,
                entry: Some(entry),
            });
            Handle::new(object_type, index, 1)
        };

        if let Some(parent) = parent {
            if let Some(parent_entry) = inner.entry_mut(parent) {
                parent_entry.children.push(handle);
            }
        }

        tracing::trace!(?handle, ?parent, "object created");

        handle
    }

    /// Adds a command buffer to the directory of live command buffers.
    pub(crate) fn register_command_buffer(&self, command_buffer: &Arc<CommandBuffer>) {
        self.inner
            .write()
            .command_buffers
            .insert(command_buffer.handle(), Arc::downgrade(command_buffer));
    }

    /// Removes an object from the registry, and returns the handles of its children, which are
    /// now orphans that the caller must destroy as well.
    ///
    /// Returns `None` if the handle doesn't refer to a live object.
    pub(crate) fn unregister(&self, handle: Handle) -> Option<Vec<Handle>> {
        let mut inner = self.inner.write();
        inner.entry(handle)?;

        let slot = &mut inner.slots[handle.index() as usize];
        let entry = slot.entry.take()?;

        // Generation 0 is never used, so that the null handle can't match a live slot.
        slot.generation = match (slot.generation + 1) & GENERATION_MASK as u32 {
            0 => 1,
            generation => generation,
        };
        inner.free_list.push(handle.index());
        inner.command_buffers.remove(&handle);

        if let Some(parent) = entry.parent {
            if let Some(parent_entry) = inner.entry_mut(parent) {
                parent_entry.children.retain(|&child| child != handle);
            }
        }

        tracing::trace!(?handle, "object destroyed");

        Some(entry.children)
    }

    /// Returns the lifecycle state of the object. Stale handles are reported as `Destroyed`.
    pub fn state(&self, handle: Handle) -> ObjectState {
        self.inner
            .read()
            .entry(handle)
            .map_or(ObjectState::Destroyed, |entry| entry.state)
    }

    /// Returns whether `handle` refers to a live object.
    #[inline]
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.state(handle) != ObjectState::Destroyed
    }

    /// Sets the lifecycle state of a live object. Returns `false` if the object is not alive.
    pub(crate) fn set_state(&self, handle: Handle, state: ObjectState) -> bool {
        debug_assert_ne!(state, ObjectState::Destroyed);

        match self.inner.write().entry_mut(handle) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    /// Returns the objects that will be freed together with `handle`.
    pub(crate) fn children(&self, handle: Handle) -> Vec<Handle> {
        self.inner
            .read()
            .entry(handle)
            .map_or_else(Vec::new, |entry| entry.children.clone())
    }

    /// Returns the command buffer with the given handle, if it's alive.
    pub(crate) fn command_buffer(&self, handle: Handle) -> Option<Arc<CommandBuffer>> {
        self.inner
            .read()
            .command_buffers
            .get(&handle)
            .and_then(Weak::upgrade)
    }

    /// Returns all live command buffers.
    ///
    /// The registry lock is released before returning, so the caller is free to lock the command
    /// buffers.
    pub(crate) fn live_command_buffers(&self) -> Vec<Arc<CommandBuffer>> {
        self.inner
            .read()
            .command_buffers
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Returns the number of live objects.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .slots
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    /// Returns whether the registry has no live objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Registry")
            .field("live_objects", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Handle, ObjectState, ObjectType, Registry};

    #[test]
    fn handle_packing() {
        let handle = Handle::new(ObjectType::ImageView, 42, 7);
        assert_eq!(handle.object_type(), Some(ObjectType::ImageView));
        assert_eq!(handle.index(), 42);
        assert_eq!(handle.generation(), 7);
        assert_eq!(Handle::from_raw(handle.as_raw()), handle);
        assert_eq!(Handle::NULL.object_type(), None);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let registry = Registry::new();
        let first = registry.register(ObjectType::Event, None);
        assert_eq!(registry.state(first), ObjectState::Created);

        registry.unregister(first).unwrap();
        assert!(!registry.is_alive(first));

        let second = registry.register(ObjectType::Event, None);
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(registry.is_alive(second));
        assert!(!registry.is_alive(first));
        assert!(!registry.set_state(first, ObjectState::BoundToMemory));
    }

    #[test]
    fn children_are_detached() {
        let registry = Registry::new();
        let pool = registry.register(ObjectType::DescriptorPool, None);
        let a = registry.register(ObjectType::DescriptorSet, Some(pool));
        let b = registry.register(ObjectType::DescriptorSet, Some(pool));
        assert_eq!(registry.children(pool), vec![a, b]);

        registry.unregister(a).unwrap();
        assert_eq!(registry.children(pool), vec![b]);

        assert_eq!(registry.unregister(pool), Some(vec![b]));
        assert_eq!(registry.unregister(pool), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn null_handle_is_never_alive() {
        let registry = Registry::new();
        registry.register(ObjectType::Buffer, None);
        assert!(!registry.is_alive(Handle::NULL));
    }
}
