// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The validation context, and the queues that work is submitted to.
//!
//! The [`Device`] plays the role that a `VkDevice` plays for a validation layer: it knows which
//! features are enabled and what the limits of the implementation are, it owns the
//! [registry](crate::registry) of every live object, and it is where every diagnostic is
//! delivered to the registered [debug messengers](crate::debug).
//!
//! # Example
//!
//! ```
//! use vulkano_validation::device::{Device, DeviceCreateInfo, DeviceFeatures};
//!
//! let (device, mut queues) = Device::new(DeviceCreateInfo {
//!     enabled_features: DeviceFeatures {
//!         multiview: true,
//!         ..DeviceFeatures::empty()
//!     },
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let queue = queues.next().unwrap();
//! assert_eq!(queue.queue_family_index(), 0);
//! ```

pub use self::{
    features::DeviceFeatures,
    properties::DeviceProperties,
    queue::{
        CommandBufferSubmitInfo, Queue, QueueFamilyProperties, QueueFlags, SemaphoreSubmitInfo,
        SubmitFlags, SubmitInfo,
    },
};
use crate::{
    command_buffer::InvalidReason,
    debug::{DebugUtilsMessageSeverity, DebugUtilsMessageType, DebugUtilsMessengerCreateInfo, Message},
    format::{Format, FormatProperties},
    registry::{ObjectType, Registry},
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashMap;
use parking_lot::{Mutex, RwLock};
use std::{
    borrow::Cow,
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Deref,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

mod features;
mod properties;
pub mod queue;

/// The validation context that every object belongs to.
pub struct Device {
    enabled_features: DeviceFeatures,
    properties: DeviceProperties,
    queue_family_properties: Vec<QueueFamilyProperties>,
    format_properties: HashMap<Format, FormatProperties>,
    settings: ValidationSettings,

    registry: Registry,
    queues: Mutex<Vec<Weak<Queue>>>,

    messengers: RwLock<Vec<(u64, DebugUtilsMessengerCreateInfo)>>,
    next_messenger_id: AtomicU64,
    message_counts: Mutex<MessageCounts>,
}

#[derive(Default)]
struct MessageCounts {
    total: u32,
    per_id: HashMap<String, u32>,
}

impl Device {
    /// Creates a new `Device`.
    ///
    /// Returns the device and an iterator over the queues of every queue family, ordered by
    /// queue family index and then by queue index.
    pub fn new(
        create_info: DeviceCreateInfo,
    ) -> Result<(Arc<Device>, impl ExactSizeIterator<Item = Arc<Queue>>), ValidationErrors> {
        Self::validate_new(&create_info)?;

        Ok(Self::new_unchecked(create_info))
    }

    fn validate_new(create_info: &DeviceCreateInfo) -> Result<(), ValidationErrors> {
        create_info
            .validate()
            .map_err(|err| ValidationErrors::from(err.add_context("create_info")))
    }

    fn new_unchecked(
        create_info: DeviceCreateInfo,
    ) -> (Arc<Device>, impl ExactSizeIterator<Item = Arc<Queue>>) {
        let DeviceCreateInfo {
            enabled_features,
            properties,
            queue_families,
            format_properties,
            settings,
            _ne: _,
        } = create_info;

        let device = Arc::new(Device {
            enabled_features,
            properties,
            queue_family_properties: queue_families,
            format_properties: format_properties.into_iter().collect(),
            settings,
            registry: Registry::new(),
            queues: Mutex::new(Vec::new()),
            messengers: RwLock::new(Vec::new()),
            next_messenger_id: AtomicU64::new(1),
            message_counts: Mutex::new(MessageCounts::default()),
        });

        let queues: Vec<_> = device
            .queue_family_properties
            .iter()
            .enumerate()
            .flat_map(|(queue_family_index, properties)| {
                (0..properties.queue_count)
                    .map(move |queue_index| (queue_family_index as u32, queue_index))
            })
            .map(|(queue_family_index, queue_index)| {
                Queue::new(device.clone(), queue_family_index, queue_index)
            })
            .collect();

        *device.queues.lock() = queues.iter().map(Arc::downgrade).collect();

        tracing::debug!(
            features = ?device.enabled_features.iter_enabled().collect::<Vec<_>>(),
            queue_families = device.queue_family_properties.len(),
            gpu_assisted = device.settings.gpu_assisted,
            "device created",
        );

        (device, queues.into_iter())
    }

    /// Returns the features that are enabled on the device.
    #[inline]
    pub fn enabled_features(&self) -> &DeviceFeatures {
        &self.enabled_features
    }

    /// Returns the limits and properties of the device.
    #[inline]
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Returns the properties of the queue families of the device.
    #[inline]
    pub fn queue_family_properties(&self) -> &[QueueFamilyProperties] {
        &self.queue_family_properties
    }

    /// Returns the settings of the validation model.
    #[inline]
    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Returns the features that the device supports for `format`.
    pub fn format_properties(&self, format: Format) -> FormatProperties {
        self.format_properties
            .get(&format)
            .copied()
            .unwrap_or_else(|| format.default_properties())
    }

    /// Returns the registry of live objects.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the queue with the given family and index, if it exists.
    pub fn queue(&self, queue_family_index: u32, queue_index: u32) -> Option<Arc<Queue>> {
        self.queues
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|queue| {
                queue.queue_family_index() == queue_family_index
                    && queue.queue_index() == queue_index
            })
    }

    /// Destroys an object.
    ///
    /// Objects that are owned by `object` (command buffers of a command pool, descriptor sets of
    /// a descriptor pool) are destroyed with it. Every command buffer that recorded a reference to
    /// a destroyed object becomes invalid.
    ///
    /// Like a validation layer, the object is destroyed even if an error is reported.
    pub fn destroy(&self, object: &dyn VulkanObject) -> Result<(), ValidationErrors> {
        let handle = object.handle();
        let mut errors = ValidationErrors::new();

        match handle.object_type() {
            Some(object_type) if self.registry.is_alive(handle) => {
                self.destroy_recursive(handle, object_type.destroy_in_use_vuids(), &mut errors);
            }
            object_type => {
                errors.push(Box::new(ValidationError {
                    problem: format!("{} does not refer to a live object", handle).into(),
                    vuids: match object_type {
                        Some(object_type) => object_type.parameter_vuids(),
                        None => &[],
                    },
                    kind: Some(ViolationKind::DestroyedObjectUsed),
                    ..Default::default()
                }));
            }
        }

        self.report(errors)
    }

    pub(crate) fn destroy_recursive(
        &self,
        handle: Handle,
        in_use_vuids: &'static [&'static str],
        errors: &mut ValidationErrors,
    ) {
        let mut worklist = vec![handle];

        while let Some(handle) = worklist.pop() {
            if handle.object_type() == Some(ObjectType::CommandBuffer) {
                if let Some(command_buffer) = self.registry.command_buffer(handle) {
                    if command_buffer.is_pending() {
                        errors.push(in_use_error(handle, in_use_vuids));
                    }
                }
            }

            let Some(children) = self.registry.unregister(handle) else {
                continue;
            };

            worklist.extend(children);
            self.invalidate_users(
                handle,
                InvalidReason::ObjectDestroyed(handle),
                Some(in_use_vuids),
                errors,
            );
        }
    }

    /// Invalidates every command buffer that recorded a reference to `handle`, and every primary
    /// command buffer that executed one of those.
    ///
    /// If `in_use_vuids` is given, an error is pushed when one of those command buffers is
    /// pending.
    ///
    /// Must not be called while a command buffer is locked.
    pub(crate) fn invalidate_users(
        &self,
        handle: Handle,
        reason: InvalidReason,
        in_use_vuids: Option<&'static [&'static str]>,
        errors: &mut ValidationErrors,
    ) {
        let mut worklist = vec![(handle, reason)];
        let mut reported_in_use = false;

        while let Some((handle, reason)) = worklist.pop() {
            for command_buffer in self.registry.live_command_buffers() {
                if command_buffer.handle() == handle {
                    continue;
                }

                let Some(invalidation) = command_buffer.invalidate_if_uses(handle, reason) else {
                    continue;
                };

                if invalidation.was_pending && !reported_in_use {
                    if let Some(vuids) = in_use_vuids {
                        errors.push(in_use_error(handle, vuids));
                        reported_in_use = true;
                    }
                }

                if invalidation.newly_invalid {
                    tracing::debug!(
                        command_buffer = ?command_buffer.handle(),
                        ?reason,
                        "command buffer invalidated",
                    );
                    self.registry.set_state(
                        command_buffer.handle(),
                        crate::registry::ObjectState::Invalidated,
                    );
                    worklist.push((
                        command_buffer.handle(),
                        InvalidReason::SecondaryInvalidated(command_buffer.handle()),
                    ));
                }
            }
        }
    }

    /// Waits until all work on all queues has finished, and returns the errors found by the
    /// GPU-assisted checker while executing it.
    pub fn wait_idle(&self) -> Result<(), ValidationErrors> {
        let queues: Vec<_> = self.queues.lock().iter().filter_map(Weak::upgrade).collect();
        let mut errors = ValidationErrors::new();

        for queue in queues {
            if let Err(queue_errors) = queue.wait_idle() {
                errors.append(queue_errors);
            }
        }

        errors.into_result()
    }

    /// Delivers `errors` to the debug messengers, and returns them.
    pub(crate) fn report(&self, errors: ValidationErrors) -> Result<(), ValidationErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(self.reported(errors))
        }
    }

    /// Delivers `errors` to the debug messengers, and returns them for use as an error value.
    pub(crate) fn reported(&self, errors: impl Into<ValidationErrors>) -> ValidationErrors {
        let errors = errors.into();

        for error in errors.iter() {
            self.emit(
                DebugUtilsMessageSeverity::ERROR,
                DebugUtilsMessageType::VALIDATION,
                error.message_id(),
                &error.to_string(),
            );
        }

        errors
    }

    /// Delivers the error of `result`, if any, to the debug messengers.
    pub(crate) fn report_one(
        &self,
        result: Result<(), Box<ValidationError>>,
    ) -> Result<(), ValidationErrors> {
        match result {
            Ok(()) => Ok(()),
            Err(err) => self.report(err.into()),
        }
    }

    /// Delivers a performance warning to the debug messengers.
    pub(crate) fn warn_performance(&self, message_id: &str, description: &str) {
        self.emit(
            DebugUtilsMessageSeverity::WARNING,
            DebugUtilsMessageType::PERFORMANCE,
            message_id,
            description,
        );
    }

    /// Delivers a message to the debug messengers, subject to the message filters of the
    /// settings.
    pub(crate) fn emit(
        &self,
        severity: DebugUtilsMessageSeverity,
        ty: DebugUtilsMessageType,
        message_id: &str,
        description: &str,
    ) {
        if self
            .settings
            .message_id_filter
            .iter()
            .any(|filtered| filtered == message_id)
        {
            return;
        }

        {
            let mut counts = self.message_counts.lock();

            if let Some(limit) = self.settings.message_limit {
                if counts.total >= limit {
                    return;
                }
            }

            let count = counts.per_id.entry(message_id.to_owned()).or_insert(0);

            if let Some(limit) = self.settings.duplicate_message_limit {
                if *count >= limit {
                    return;
                }
            }

            *count += 1;
            counts.total += 1;
        }

        tracing::debug!(?severity, ?ty, message_id, "{}", description);

        let message = Message {
            severity,
            ty,
            message_id,
            description,
        };

        for (_, create_info) in self.messengers.read().iter() {
            create_info.dispatch(&message);
        }
    }

    pub(crate) fn register_messenger(&self, create_info: DebugUtilsMessengerCreateInfo) -> u64 {
        let id = self.next_messenger_id.fetch_add(1, Ordering::Relaxed);
        self.messengers.write().push((id, create_info));

        id
    }

    pub(crate) fn unregister_messenger(&self, id: u64) {
        self.messengers.write().retain(|(other, _)| *other != id);
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Device")
            .field("enabled_features", &self.enabled_features)
            .field("queue_family_properties", &self.queue_family_properties)
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Device {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Device {}

fn in_use_error(handle: Handle, vuids: &'static [&'static str]) -> Box<ValidationError> {
    Box::new(ValidationError {
        problem: format!(
            "{} is in use by a command buffer that is in the pending state",
            handle,
        )
        .into(),
        vuids,
        kind: Some(ViolationKind::ObjectInUse),
        ..Default::default()
    })
}

/// Parameters to create a new `Device`.
#[derive(Clone, Debug)]
pub struct DeviceCreateInfo {
    /// The features to enable on the device.
    ///
    /// The default value is [`DeviceFeatures::empty()`].
    pub enabled_features: DeviceFeatures,

    /// The limits of the device.
    ///
    /// The default value is [`DeviceProperties::default()`], the minimum limits that every
    /// implementation supports.
    pub properties: DeviceProperties,

    /// The queue families of the device. One queue is created for every `queue_count` of each
    /// family.
    ///
    /// The default value is a single family with one queue that supports graphics, compute and
    /// transfer operations.
    pub queue_families: Vec<QueueFamilyProperties>,

    /// Overrides of the format features that the device supports.
    ///
    /// Formats that aren't listed support the features of [`Format::default_properties`].
    ///
    /// The default value is empty.
    pub format_properties: Vec<(Format, FormatProperties)>,

    /// Settings of the validation model.
    ///
    /// The default value is [`ValidationSettings::default()`].
    pub settings: ValidationSettings,

    pub _ne: crate::NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            enabled_features: DeviceFeatures::empty(),
            properties: DeviceProperties::default(),
            queue_families: vec![QueueFamilyProperties {
                queue_flags: QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            format_properties: Vec::new(),
            settings: ValidationSettings::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DeviceCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref enabled_features,
            properties: _,
            ref queue_families,
            format_properties: _,
            settings: _,
            _ne: _,
        } = self;

        if queue_families.is_empty() {
            return Err(Box::new(ValidationError {
                context: "queue_families".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDeviceCreateInfo-queueCreateInfoCount-arraylength"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (index, queue_family) in queue_families.iter().enumerate() {
            if queue_family.queue_count == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("queue_families[{}].queue_count", index).into(),
                    problem: "is 0".into(),
                    vuids: &["VUID-VkDeviceQueueCreateInfo-queueCount-arraylength"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        if enabled_features.multiview_geometry_shader && !enabled_features.multiview {
            return Err(Box::new(ValidationError {
                context: "enabled_features".into(),
                problem: "contains `multiview_geometry_shader`, but does not contain \
                    `multiview`"
                    .into(),
                vuids: &["VUID-VkPhysicalDeviceMultiviewFeatures-multiviewGeometryShader-00580"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        if (enabled_features.primitive_fragment_shading_rate
            || enabled_features.attachment_fragment_shading_rate)
            && !enabled_features.pipeline_fragment_shading_rate
        {
            return Err(Box::new(ValidationError {
                context: "enabled_features".into(),
                problem: "contains `primitive_fragment_shading_rate` or \
                    `attachment_fragment_shading_rate`, but does not contain \
                    `pipeline_fragment_shading_rate`"
                    .into(),
                vuids: &["VUID-VkPhysicalDeviceFragmentShadingRateFeaturesKHR-pipelineFragmentShadingRate-04484"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Settings of the validation model.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationSettings {
    /// Enables the GPU-assisted checker, which evaluates the data-dependent rules when work is
    /// submitted, and reports its findings when the queue is waited on.
    ///
    /// The default value is `false`.
    pub gpu_assisted: bool,

    /// The maximum number of errors that the GPU-assisted checker records for one texel fetch
    /// of one command. Each error still states the total number of invalid fetches.
    ///
    /// The default value is `1024`.
    pub gpu_assisted_max_errors: u32,

    /// The maximum number of messages delivered to the debug messengers in total.
    ///
    /// The default value is `None`, which means there is no limit.
    pub message_limit: Option<u32>,

    /// The maximum number of messages with the same message id delivered to the debug
    /// messengers.
    ///
    /// The default value is `None`, which means there is no limit.
    pub duplicate_message_limit: Option<u32>,

    /// Message ids that are never delivered to the debug messengers. The errors are still
    /// returned to the caller.
    ///
    /// The default value is empty.
    pub message_id_filter: Vec<Cow<'static, str>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for ValidationSettings {
    #[inline]
    fn default() -> Self {
        Self {
            gpu_assisted: false,
            gpu_assisted_max_errors: 1024,
            message_limit: None,
            duplicate_message_limit: None,
            message_id_filter: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Implemented on objects that belong to a device.
pub trait DeviceOwned {
    /// Returns the device that owns `Self`.
    fn device(&self) -> &Arc<Device>;
}

impl<T> DeviceOwned for T
where
    T: Deref,
    T::Target: DeviceOwned,
{
    #[inline]
    fn device(&self) -> &Arc<Device> {
        (**self).device()
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, DeviceCreateInfo, DeviceFeatures, ValidationSettings};
    use crate::{
        buffer::BufferUsage,
        debug::{DebugUtilsMessageSeverity, DebugUtilsMessageType, ErrorMonitor},
        device::{QueueFamilyProperties, QueueFlags},
        registry::ObjectState,
        VulkanObject,
    };

    #[test]
    fn one_queue_per_count() {
        let (device, queues) = crate::tests::device_and_queues(DeviceCreateInfo::default());
        assert_eq!(queues.len(), 4);
        assert_eq!(
            queues
                .iter()
                .map(|queue| (queue.queue_family_index(), queue.queue_index()))
                .collect::<Vec<_>>(),
            [(0, 0), (0, 1), (1, 0), (2, 0)]
        );
        assert!(device.queue(0, 1).is_some());
        assert!(device.queue(2, 1).is_none());
    }

    #[test]
    fn empty_queue_count() {
        let result = Device::new(DeviceCreateInfo {
            queue_families: vec![QueueFamilyProperties {
                queue_flags: QueueFlags::GRAPHICS,
                queue_count: 0,
                ..Default::default()
            }],
            ..Default::default()
        });

        assert!(result
            .err()
            .unwrap()
            .contains_vuid("VUID-VkDeviceQueueCreateInfo-queueCount-arraylength"));
    }

    #[test]
    fn feature_dependencies() {
        let result = Device::new(DeviceCreateInfo {
            enabled_features: DeviceFeatures {
                multiview_geometry_shader: true,
                ..DeviceFeatures::empty()
            },
            ..Default::default()
        });

        assert!(result.err().unwrap().contains_vuid(
            "VUID-VkPhysicalDeviceMultiviewFeatures-multiviewGeometryShader-00580"
        ));
    }

    #[test]
    fn destroy_twice() {
        let (device, _queue) = gfx_dev_and_queue!();
        let buffer = crate::tests::buffer(&device, 64, BufferUsage::TRANSFER_SRC);

        device.destroy(&*buffer).unwrap();
        assert_eq!(device.registry().state(buffer.handle()), ObjectState::Destroyed);

        let errors = device.destroy(&*buffer).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkDestroyBuffer-buffer-parameter"));
    }

    #[test]
    fn duplicate_message_limit() {
        let (device, _queues) = crate::tests::device_and_queues(DeviceCreateInfo {
            enabled_features: DeviceFeatures::all(),
            settings: ValidationSettings {
                duplicate_message_limit: Some(2),
                message_id_filter: vec!["VUID-filtered".into()],
                ..Default::default()
            },
            ..Default::default()
        });
        let monitor = ErrorMonitor::new(&device);

        for message_id in ["VUID-limited"; 5].into_iter().chain(["VUID-filtered"]) {
            device.emit(
                DebugUtilsMessageSeverity::ERROR,
                DebugUtilsMessageType::VALIDATION,
                message_id,
                "",
            );
        }

        assert_eq!(monitor.count("VUID-limited"), 2);
        assert_eq!(monitor.count("VUID-filtered"), 0);
    }
}
