// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Debug messengers that receive the diagnostics of the validation model.
//!
//! Every violation that an operation detects is delivered to the registered messengers as a
//! [`Message`], with the VUID of the violated rule as its message id. The same violations are
//! also returned to the caller of the operation as [`ValidationErrors`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vulkano_validation::{
//!     debug::{DebugUtilsMessenger, DebugUtilsMessengerCreateInfo},
//!     device::{Device, DeviceCreateInfo},
//! };
//!
//! let (device, _queues) = Device::new(DeviceCreateInfo::default()).unwrap();
//!
//! let _messenger = DebugUtilsMessenger::new(
//!     device.clone(),
//!     DebugUtilsMessengerCreateInfo::user_callback(Arc::new(|msg| {
//!         println!("{}: {}", msg.message_id, msg.description);
//!     })),
//! )
//! .unwrap();
//! ```
//!
//! Note that you must keep the `_messenger` object alive for as long as you want your callback to
//! be called.
//!
//! For tests, the [`ErrorMonitor`] records the message stream and checks it against armed
//! expectations.

use crate::{
    device::Device, macros::vulkan_bitflags, ValidationError, ValidationErrors, ViolationKind,
};
use parking_lot::Mutex;
use std::{
    error::Error,
    fmt::{Debug, Display, Error as FmtError, Formatter},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

pub(crate) type UserCallback = Arc<dyn Fn(&Message<'_>) + Send + Sync>;

/// Registration of a callback called by the validation model.
///
/// The callback can be called as long as this object is alive.
#[must_use = "The DebugUtilsMessenger object must be kept alive for as long as you want your callback to be called"]
pub struct DebugUtilsMessenger {
    device: Arc<Device>,
    id: u64,
}

impl DebugUtilsMessenger {
    /// Registers a debug callback on `device`.
    ///
    /// `create_info.user_callback` must not make calls into the validation model. If it panics,
    /// the panic is caught and ignored.
    pub fn new(
        device: Arc<Device>,
        create_info: DebugUtilsMessengerCreateInfo,
    ) -> Result<Self, ValidationErrors> {
        Self::validate_new(&create_info)?;

        let id = device.register_messenger(create_info);

        Ok(DebugUtilsMessenger { device, id })
    }

    fn validate_new(create_info: &DebugUtilsMessengerCreateInfo) -> Result<(), ValidationErrors> {
        create_info
            .validate()
            .map_err(|err| ValidationErrors::from(err.add_context("create_info")))
    }
}

impl Drop for DebugUtilsMessenger {
    #[inline]
    fn drop(&mut self) {
        self.device.unregister_messenger(self.id);
    }
}

impl Debug for DebugUtilsMessenger {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DebugUtilsMessenger")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a `DebugUtilsMessenger`.
#[derive(Clone)]
pub struct DebugUtilsMessengerCreateInfo {
    /// The message severity types that the callback should be called for.
    ///
    /// The value must not be empty.
    ///
    /// The default value is `ERROR | WARNING`.
    pub message_severity: DebugUtilsMessageSeverity,

    /// The message types that the callback should be called for.
    ///
    /// The value must not be empty.
    ///
    /// The default value is `GENERAL | VALIDATION | PERFORMANCE`.
    pub message_type: DebugUtilsMessageType,

    /// The closure that should be called.
    ///
    /// The callback is provided inside an `Arc` so that it can be shared across multiple
    /// messengers.
    pub user_callback: UserCallback,

    pub _ne: crate::NonExhaustive,
}

impl DebugUtilsMessengerCreateInfo {
    /// Returns a `DebugUtilsMessengerCreateInfo` with the specified `user_callback`.
    #[inline]
    pub fn user_callback(user_callback: UserCallback) -> Self {
        Self {
            message_severity: DebugUtilsMessageSeverity::ERROR
                | DebugUtilsMessageSeverity::WARNING,
            message_type: DebugUtilsMessageType::GENERAL
                | DebugUtilsMessageType::VALIDATION
                | DebugUtilsMessageType::PERFORMANCE,
            user_callback,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        if self.message_severity.is_empty() {
            return Err(Box::new(ValidationError {
                context: "message_severity".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDebugUtilsMessengerCreateInfoEXT-messageSeverity-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if self.message_type.is_empty() {
            return Err(Box::new(ValidationError {
                context: "message_type".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDebugUtilsMessengerCreateInfoEXT-messageType-requiredbitmask"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Calls the user callback if the message passes the severity and type filters.
    pub(crate) fn dispatch(&self, message: &Message<'_>) {
        if !self.message_severity.intersects(message.severity)
            || !self.message_type.intersects(message.ty)
        {
            return;
        }

        // A panicking callback must not poison the state of the caller.
        let _ = catch_unwind(AssertUnwindSafe(|| (self.user_callback)(message)));
    }
}

impl Debug for DebugUtilsMessengerCreateInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let Self {
            message_severity,
            message_type,
            user_callback: _,
            _ne: _,
        } = self;

        f.debug_struct("DebugUtilsMessengerCreateInfo")
            .field("message_severity", message_severity)
            .field("message_type", message_type)
            .finish_non_exhaustive()
    }
}

/// A message received by the callback.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    /// Severity of message.
    pub severity: DebugUtilsMessageSeverity,
    /// Type of message.
    pub ty: DebugUtilsMessageType,
    /// The identifier of the message. For validation errors, this is the VUID of the violated
    /// rule.
    pub message_id: &'a str,
    /// Description of the message.
    pub description: &'a str,
}

vulkan_bitflags! {
    /// Severity of message.
    DebugUtilsMessageSeverity = DebugUtilsMessageSeverityFlagsEXT(u32);

    /// An error that may cause undefined results, including an application crash.
    ERROR = ERROR,

    /// An unexpected use.
    WARNING = WARNING,

    /// An informational message that may be handy when debugging an application.
    INFO = INFO,

    /// Diagnostic information from the loader and layers.
    VERBOSE = VERBOSE,
}

vulkan_bitflags! {
    /// Type of message.
    DebugUtilsMessageType = DebugUtilsMessageTypeFlagsEXT(u32);

    /// Specifies that some general event has occurred.
    GENERAL = GENERAL,

    /// Specifies that something has occurred during validation against the Vulkan specification.
    VALIDATION = VALIDATION,

    /// Specifies a potentially non-optimal use of Vulkan.
    PERFORMANCE = PERFORMANCE,
}

/// An owned copy of a [`Message`], as recorded by an [`ErrorMonitor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedMessage {
    pub severity: DebugUtilsMessageSeverity,
    pub ty: DebugUtilsMessageType,
    pub message_id: String,
    pub description: String,
}

impl RecordedMessage {
    fn matches(&self, text: &str) -> bool {
        self.message_id == text || self.description.contains(text)
    }
}

impl From<&Message<'_>> for RecordedMessage {
    #[inline]
    fn from(message: &Message<'_>) -> Self {
        RecordedMessage {
            severity: message.severity,
            ty: message.ty,
            message_id: message.message_id.to_owned(),
            description: message.description.to_owned(),
        }
    }
}

#[derive(Debug)]
struct DesiredMessage {
    severity: DebugUtilsMessageSeverity,
    text: String,
    found: bool,
}

#[derive(Debug)]
struct MonitorState {
    monitored_severity: DebugUtilsMessageSeverity,
    desired: Vec<DesiredMessage>,
    allowed: Vec<String>,
    unexpected: Vec<RecordedMessage>,
    received: Vec<RecordedMessage>,
}

impl MonitorState {
    fn new() -> Self {
        MonitorState {
            monitored_severity: DebugUtilsMessageSeverity::ERROR,
            desired: Vec::new(),
            allowed: Vec::new(),
            unexpected: Vec::new(),
            received: Vec::new(),
        }
    }

    fn receive(&mut self, message: RecordedMessage) {
        self.received.push(message.clone());

        if self.allowed.iter().any(|text| message.matches(text)) {
            return;
        }

        if let Some(desired) = self.desired.iter_mut().find(|desired| {
            !desired.found
                && desired.severity.intersects(message.severity)
                && message.matches(&desired.text)
        }) {
            desired.found = true;
            return;
        }

        // Either a message nobody asked for, or one more occurrence than was asked for.
        let exceeds_desired = self.desired.iter().any(|desired| {
            desired.severity.intersects(message.severity) && message.matches(&desired.text)
        });

        if exceeds_desired || self.monitored_severity.intersects(message.severity) {
            self.unexpected.push(message);
        }
    }

    fn clear(&mut self) {
        self.desired.clear();
        self.allowed.clear();
        self.unexpected.clear();
        self.received.clear();
    }
}

/// Records the messages of a device, and checks them against armed expectations.
///
/// The monitor works in two steps: arm expectations with
/// [`set_desired_failure_msg`](Self::set_desired_failure_msg), run the operations under test,
/// then check the outcome with [`verify_found`](Self::verify_found) or
/// [`verify_not_found`](Self::verify_not_found).
///
/// A message matches an expectation if its message id equals the expected text, or if its
/// description contains it.
pub struct ErrorMonitor {
    state: Arc<Mutex<MonitorState>>,
    _messenger: DebugUtilsMessenger,
}

impl ErrorMonitor {
    /// Creates a monitor that records every message of `device`.
    pub fn new(device: &Arc<Device>) -> Self {
        let state = Arc::new(Mutex::new(MonitorState::new()));
        let callback_state = state.clone();

        let messenger = DebugUtilsMessenger {
            id: device.register_messenger(DebugUtilsMessengerCreateInfo {
                message_severity: DebugUtilsMessageSeverity::all(),
                message_type: DebugUtilsMessageType::all(),
                ..DebugUtilsMessengerCreateInfo::user_callback(Arc::new(move |message: &Message<'_>| {
                    callback_state.lock().receive(message.into());
                }))
            }),
            device: device.clone(),
        };

        ErrorMonitor {
            state,
            _messenger: messenger,
        }
    }

    /// Expects one message with the given severity that matches `text`.
    #[inline]
    pub fn set_desired_failure_msg(
        &self,
        severity: DebugUtilsMessageSeverity,
        text: impl Into<String>,
    ) {
        self.set_desired_failure_msg_count(severity, text, 1);
    }

    /// Expects exactly `count` messages with the given severity that match `text`.
    pub fn set_desired_failure_msg_count(
        &self,
        severity: DebugUtilsMessageSeverity,
        text: impl Into<String>,
        count: u32,
    ) {
        let text = text.into();
        let mut state = self.state.lock();

        for _ in 0..count {
            state.desired.push(DesiredMessage {
                severity,
                text: text.clone(),
                found: false,
            });
        }
    }

    /// Ignores messages that match `text`, whether or not they occur.
    pub fn set_allowed_failure_msg(&self, text: impl Into<String>) {
        self.state.lock().allowed.push(text.into());
    }

    /// Clears all expectations and recorded messages, and checks for errors from now on.
    ///
    /// Follow the operations under test with [`verify_not_found`](Self::verify_not_found).
    pub fn expect_success(&self) {
        self.expect_success_with_severity(DebugUtilsMessageSeverity::ERROR);
    }

    /// Like [`expect_success`](Self::expect_success), but checks for messages of the given
    /// severities.
    pub fn expect_success_with_severity(&self, severity: DebugUtilsMessageSeverity) {
        let mut state = self.state.lock();
        state.clear();
        state.monitored_severity = severity;
    }

    /// Checks that every expected message was received, and that no other message of a
    /// monitored severity was received.
    ///
    /// The expectations and recorded messages are cleared afterwards.
    pub fn verify_found(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock();

        let error = MonitorError {
            missing: state
                .desired
                .iter()
                .filter(|desired| !desired.found)
                .map(|desired| desired.text.clone())
                .collect(),
            found: Vec::new(),
            unexpected: state.unexpected.clone(),
        };

        state.clear();
        state.monitored_severity = DebugUtilsMessageSeverity::ERROR;

        error.into_result()
    }

    /// Checks that none of the expected messages and no other message of a monitored severity
    /// were received.
    ///
    /// Nothing is cleared, so calling this twice in a row gives the same answer.
    pub fn verify_not_found(&self) -> Result<(), MonitorError> {
        let state = self.state.lock();

        MonitorError {
            missing: Vec::new(),
            found: state
                .desired
                .iter()
                .filter(|desired| desired.found)
                .map(|desired| desired.text.clone())
                .collect(),
            unexpected: state.unexpected.clone(),
        }
        .into_result()
    }

    /// Clears all expectations and recorded messages.
    #[inline]
    pub fn reset(&self) {
        self.expect_success();
    }

    /// Returns every message received since the monitor was last cleared.
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.state.lock().received.clone()
    }

    /// Returns the number of received messages whose message id is `message_id`.
    pub fn count(&self, message_id: &str) -> usize {
        self.state
            .lock()
            .received
            .iter()
            .filter(|message| message.message_id == message_id)
            .count()
    }
}

impl Debug for ErrorMonitor {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("ErrorMonitor")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// The outcome of a failed [`ErrorMonitor`] check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorError {
    /// Expected messages that were not received.
    pub missing: Vec<String>,
    /// Messages that were received although they were expected not to occur.
    pub found: Vec<String>,
    /// Messages that no expectation accounted for.
    pub unexpected: Vec<RecordedMessage>,
}

impl MonitorError {
    fn into_result(self) -> Result<(), Self> {
        if self.missing.is_empty() && self.found.is_empty() && self.unexpected.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let mut first = true;
        let mut separator = |f: &mut Formatter<'_>| {
            let result = if first { Ok(()) } else { write!(f, "; ") };
            first = false;
            result
        };

        for text in &self.missing {
            separator(f)?;
            write!(f, "did not receive expected message `{}`", text)?;
        }

        for text in &self.found {
            separator(f)?;
            write!(f, "received message `{}` that was expected not to occur", text)?;
        }

        for message in &self.unexpected {
            separator(f)?;
            write!(
                f,
                "received unexpected message `{}`: {}",
                message.message_id, message.description,
            )?;
        }

        Ok(())
    }
}

impl Error for MonitorError {}

#[cfg(test)]
mod tests {
    use super::{
        DebugUtilsMessageSeverity, DebugUtilsMessageType, DebugUtilsMessenger,
        DebugUtilsMessengerCreateInfo, ErrorMonitor,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn empty_severity_is_rejected() {
        let (device, _queue) = gfx_dev_and_queue!();

        let result = DebugUtilsMessenger::new(
            device,
            DebugUtilsMessengerCreateInfo {
                message_severity: DebugUtilsMessageSeverity::empty(),
                ..DebugUtilsMessengerCreateInfo::user_callback(Arc::new(|_| ()))
            },
        );

        assert!(result.unwrap_err().contains_vuid(
            "VUID-VkDebugUtilsMessengerCreateInfoEXT-messageSeverity-requiredbitmask"
        ));
    }

    #[test]
    fn messages_are_filtered_and_unregistered() {
        let (device, _queue) = gfx_dev_and_queue!();
        let counter = Arc::new(AtomicUsize::new(0));
        let callback_counter = counter.clone();

        let messenger = DebugUtilsMessenger::new(
            device.clone(),
            DebugUtilsMessengerCreateInfo {
                message_type: DebugUtilsMessageType::PERFORMANCE,
                ..DebugUtilsMessengerCreateInfo::user_callback(Arc::new(move |_| {
                    callback_counter.fetch_add(1, Ordering::SeqCst);
                }))
            },
        )
        .unwrap();

        device.emit(
            DebugUtilsMessageSeverity::ERROR,
            DebugUtilsMessageType::VALIDATION,
            "VUID-test-validation",
            "filtered out",
        );
        device.emit(
            DebugUtilsMessageSeverity::WARNING,
            DebugUtilsMessageType::PERFORMANCE,
            "UNASSIGNED-test-performance",
            "delivered",
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(messenger);
        device.emit(
            DebugUtilsMessageSeverity::WARNING,
            DebugUtilsMessageType::PERFORMANCE,
            "UNASSIGNED-test-performance",
            "not delivered",
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn monitor_counts_occurrences() {
        let (device, _queue) = gfx_dev_and_queue!();
        let monitor = ErrorMonitor::new(&device);

        monitor.set_desired_failure_msg_count(DebugUtilsMessageSeverity::ERROR, "VUID-a", 2);
        device.emit(
            DebugUtilsMessageSeverity::ERROR,
            DebugUtilsMessageType::VALIDATION,
            "VUID-a",
            "first",
        );
        assert!(monitor.verify_found().is_err());

        monitor.set_desired_failure_msg_count(DebugUtilsMessageSeverity::ERROR, "VUID-a", 2);
        for _ in 0..3 {
            device.emit(
                DebugUtilsMessageSeverity::ERROR,
                DebugUtilsMessageType::VALIDATION,
                "VUID-a",
                "again",
            );
        }
        let error = monitor.verify_found().unwrap_err();
        assert!(error.missing.is_empty());
        assert_eq!(error.unexpected.len(), 1);
    }

    #[test]
    fn monitor_matches_description_substring() {
        let (device, _queue) = gfx_dev_and_queue!();
        let monitor = ErrorMonitor::new(&device);

        monitor.set_desired_failure_msg(DebugUtilsMessageSeverity::ERROR, "out of range");
        monitor.set_allowed_failure_msg("VUID-noise");
        device.emit(
            DebugUtilsMessageSeverity::ERROR,
            DebugUtilsMessageType::VALIDATION,
            "VUID-noise",
            "ignored",
        );
        device.emit(
            DebugUtilsMessageSeverity::ERROR,
            DebugUtilsMessageType::VALIDATION,
            "VUID-b",
            "the index is out of range",
        );
        monitor.verify_found().unwrap();
    }

    #[test]
    fn verify_not_found_is_idempotent() {
        let (device, _queue) = gfx_dev_and_queue!();
        let monitor = ErrorMonitor::new(&device);

        monitor.expect_success();
        device.emit(
            DebugUtilsMessageSeverity::WARNING,
            DebugUtilsMessageType::PERFORMANCE,
            "UNASSIGNED-warning",
            "warnings are not monitored by default",
        );
        assert!(monitor.verify_not_found().is_ok());
        assert!(monitor.verify_not_found().is_ok());

        device.emit(
            DebugUtilsMessageSeverity::ERROR,
            DebugUtilsMessageType::VALIDATION,
            "VUID-c",
            "an error",
        );
        let first = monitor.verify_not_found().unwrap_err();
        let second = monitor.verify_not_found().unwrap_err();
        assert_eq!(first, second);
    }
}
