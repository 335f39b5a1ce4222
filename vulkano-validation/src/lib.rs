// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A model of the Vulkan validation layer.
//!
//! This crate does not talk to a driver. It implements the state machines that a validation layer
//! runs beside the driver, and reports every misuse it detects as a [`ValidationError`] carrying
//! the identifier of the Valid Usage rule that was broken (a "VUID").
//!
//! # Brief summary
//!
//! - The [`Device`](crate::device::Device) is the validation context. It is created from a
//!   [`DeviceCreateInfo`](crate::device::DeviceCreateInfo) that describes the enabled features,
//!   the device limits, the queue families and the [`ValidationSettings`] of the layer.
//!
//! - Every object (buffers, images, pipelines, command buffers...) is created from its
//!   `*CreateInfo` struct and is registered in the device's [registry](crate::registry). Objects
//!   are destroyed explicitly with [`Device::destroy`](crate::device::Device::destroy), which
//!   invalidates any command buffer that recorded a reference to them.
//!
//! - [Command buffers](crate::command_buffer) are recorded by calling the command methods on
//!   [`CommandBuffer`](crate::command_buffer::CommandBuffer). Each method validates the command
//!   against everything that was recorded and bound so far, reports what it found, and then
//!   records the command anyway, like a layer forwarding the call to the driver.
//!
//! - Command buffers are submitted to a [`Queue`](crate::device::Queue), where submission-time
//!   rules are checked. Waiting on the queue completes the work and surfaces the verdicts of the
//!   [GPU-assisted checker](crate::gpu_av).
//!
//! - Every violation is delivered to the registered [debug messengers](crate::debug), and is also
//!   returned to the caller as part of [`ValidationErrors`]. The
//!   [`ErrorMonitor`](crate::debug::ErrorMonitor) turns the message stream into
//!   "expect this VUID" / "expect nothing" assertions for tests.

pub use crate::{
    device::ValidationSettings,
    registry::{Handle, ObjectType},
};
use smallvec::SmallVec;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    ops::Deref,
};

#[macro_use]
mod tests;
mod macros;

pub mod buffer;
pub mod command_buffer;
pub mod debug;
pub mod descriptor_set;
pub mod device;
pub mod format;
pub mod gpu_av;
pub mod image;
pub mod memory;
pub mod pipeline;
pub mod query;
mod range_set;
pub mod registry;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod sync;

/// Represents memory size and offset values on a Vulkan device.
pub type DeviceSize = u64;

/// Gives access to the registry handle of an object.
pub trait VulkanObject {
    /// Returns the handle that identifies the object in the registry of its device.
    fn handle(&self) -> Handle;
}

/// The category of a violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationClass {
    /// A command buffer or object is in the wrong lifecycle state for the operation.
    State,
    /// The operation was issued inside or outside a required render pass, query, conditional
    /// rendering or transform feedback scope.
    Scope,
    /// Missing or incompatible bound state at the time a state-consuming command is issued.
    Binding,
    /// Mismatched formats, view types, sample counts or aspects.
    Format,
    /// Offsets, extents or counts exceed what a resource or limit allows.
    Bounds,
    /// The queue family of the command pool lacks a capability the operation needs.
    QueueCapability,
    /// Protected and unprotected objects were mixed.
    ProtectedMemory,
    /// Anything that does not fit the categories above: invalid parameters, missing features.
    Usage,
}

/// Identifies which rule a [`ValidationError`] violates, independently of its VUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    CommandBufferAlreadyRecording,
    CommandBufferNotRecording,
    CommandBufferStateViolation,
    OneTimeSubmitViolation,
    SimultaneousUseViolation,
    InvalidCommandBufferViolation,
    ObjectInUse,
    DestroyedObjectUsed,

    SubpassIndexOutOfRange,
    IncompatibleRenderPassViolation,
    BadContentsModeViolation,
    SubpassIndexMismatchViolation,
    ScopeMismatchViolation,
    MissingOcclusionQueryInheritance,
    RenderPassScopeViolation,
    QueryScopeViolation,
    TransformFeedbackScopeViolation,
    ConditionalRenderingScopeViolation,

    PipelineChangeDuringTransformFeedback,
    PipelineNotBound,
    DynamicStateNotSetViolation,
    DescriptorSetNotBoundViolation,
    DescriptorNotWritten,
    PushConstantRangeNotSetViolation,
    VertexBindingNotSetViolation,
    IndexBufferNotBound,

    DescriptorTypeMismatch,
    ImageViewTypeMismatchViolation,
    ImageMultisampleMismatchViolation,
    MissingAtomicFormatFeatureViolation,
    MissingFormatFeature,
    InvalidPlaneAspectViolation,
    InvalidAspectMask,
    AttachmentMismatch,

    MultiviewLayerRangeViolation,
    MultiviewInstanceIndexViolation,
    VertexAttributeAlignmentViolation,
    RegionOutOfBounds,
    LimitExceeded,
    TexelBufferOutOfBounds,

    IndirectBufferUsageViolation,
    MissingUsage,
    MemoryNotBound,

    QueueFamilyCapabilityViolation,
    QueueFamilyMismatch,

    ProtectedSubmitMismatch,
    ProtectedResourceMismatch,

    FeatureNotEnabled,
    InvalidParameter,
}

impl ViolationKind {
    /// Returns the category that the violation belongs to.
    pub const fn class(self) -> ViolationClass {
        match self {
            Self::CommandBufferAlreadyRecording
            | Self::CommandBufferNotRecording
            | Self::CommandBufferStateViolation
            | Self::OneTimeSubmitViolation
            | Self::SimultaneousUseViolation
            | Self::InvalidCommandBufferViolation
            | Self::ObjectInUse
            | Self::DestroyedObjectUsed => ViolationClass::State,
            Self::SubpassIndexOutOfRange
            | Self::IncompatibleRenderPassViolation
            | Self::BadContentsModeViolation
            | Self::SubpassIndexMismatchViolation
            | Self::ScopeMismatchViolation
            | Self::MissingOcclusionQueryInheritance
            | Self::RenderPassScopeViolation
            | Self::QueryScopeViolation
            | Self::TransformFeedbackScopeViolation
            | Self::ConditionalRenderingScopeViolation => ViolationClass::Scope,
            Self::PipelineChangeDuringTransformFeedback
            | Self::PipelineNotBound
            | Self::DynamicStateNotSetViolation
            | Self::DescriptorSetNotBoundViolation
            | Self::DescriptorNotWritten
            | Self::PushConstantRangeNotSetViolation
            | Self::VertexBindingNotSetViolation
            | Self::IndexBufferNotBound
            | Self::IndirectBufferUsageViolation
            | Self::MissingUsage
            | Self::MemoryNotBound => ViolationClass::Binding,
            Self::DescriptorTypeMismatch
            | Self::ImageViewTypeMismatchViolation
            | Self::ImageMultisampleMismatchViolation
            | Self::MissingAtomicFormatFeatureViolation
            | Self::MissingFormatFeature
            | Self::InvalidPlaneAspectViolation
            | Self::InvalidAspectMask
            | Self::AttachmentMismatch => ViolationClass::Format,
            Self::MultiviewLayerRangeViolation
            | Self::MultiviewInstanceIndexViolation
            | Self::VertexAttributeAlignmentViolation
            | Self::RegionOutOfBounds
            | Self::LimitExceeded
            | Self::TexelBufferOutOfBounds => ViolationClass::Bounds,
            Self::QueueFamilyCapabilityViolation | Self::QueueFamilyMismatch => {
                ViolationClass::QueueCapability
            }
            Self::ProtectedSubmitMismatch | Self::ProtectedResourceMismatch => {
                ViolationClass::ProtectedMemory
            }
            Self::FeatureNotEnabled | Self::InvalidParameter => ViolationClass::Usage,
        }
    }
}

/// A single violation of a Valid Usage rule.
#[derive(Clone, Debug, Default)]
pub struct ValidationError {
    /// The context in which the problem exists (e.g. a specific parameter).
    pub context: Cow<'static, str>,

    /// A description of the problem.
    pub problem: Cow<'static, str>,

    /// If applicable, settings that the user could enable to avoid the problem in the future.
    pub requires_one_of: RequiresOneOf,

    /// *Valid Usage IDs* (VUIDs) in the Vulkan specification that relate to the problem.
    ///
    /// The first one is the identifier that the error is reported with.
    pub vuids: &'static [&'static str],

    /// The rule that was violated, if it has a name of its own.
    pub kind: Option<ViolationKind>,
}

impl ValidationError {
    /// Identifier reported for errors that don't name a VUID.
    pub const UNASSIGNED: &'static str = "UNASSIGNED-vulkano-validation";

    pub(crate) fn from_error<E: Error>(error: E) -> Self {
        Self {
            context: "".into(),
            problem: error.to_string().into(),
            requires_one_of: RequiresOneOf::default(),
            vuids: &[],
            kind: None,
        }
    }

    pub(crate) fn add_context(mut self: Box<Self>, context: impl Into<Cow<'static, str>>) -> Box<Self> {
        if self.context.is_empty() {
            self.context = context.into();
        } else {
            self.context = format!("{}.{}", context.into(), self.context).into();
        }

        self
    }

    pub(crate) fn set_vuids(mut self: Box<Self>, vuids: &'static [&'static str]) -> Box<Self> {
        self.vuids = vuids;
        self
    }

    pub(crate) fn set_kind(mut self: Box<Self>, kind: ViolationKind) -> Box<Self> {
        self.kind = Some(kind);
        self
    }

    /// Returns the identifier that the error is reported with.
    #[inline]
    pub fn message_id(&self) -> &'static str {
        self.vuids.first().copied().unwrap_or(Self::UNASSIGNED)
    }

    /// Returns the category of the error.
    #[inline]
    pub fn class(&self) -> ViolationClass {
        self.kind
            .map_or(ViolationClass::Usage, ViolationKind::class)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)?;
        } else {
            write!(f, "{}: {}", self.context, self.problem)?;
        }

        if !self.requires_one_of.is_empty() {
            if self.context.is_empty() && self.problem.is_empty() {
                write!(f, "{}", self.requires_one_of)?;
            } else {
                write!(f, " -- {}", self.requires_one_of)?;
            }
        }

        if !self.vuids.is_empty() {
            write!(f, " (Vulkan VUIDs: {}", self.vuids[0])?;

            for vuid in &self.vuids[1..] {
                write!(f, ", {}", vuid)?;
            }

            write!(f, ")")?;
        }

        Ok(())
    }
}

impl Error for ValidationError {}

/// All violations that one operation produced, in the order they were found.
#[derive(Clone, Debug, Default)]
pub struct ValidationErrors(SmallVec<[Box<ValidationError>; 1]>);

impl ValidationErrors {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, error: Box<ValidationError>) {
        self.0.push(error);
    }

    /// Pushes the error of `result`, if any. Returns whether `result` was `Ok`.
    #[inline]
    pub(crate) fn check(&mut self, result: Result<(), Box<ValidationError>>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.push(err);
                false
            }
        }
    }

    pub(crate) fn add_context(&mut self, context: &str) {
        for error in &mut self.0 {
            let taken = std::mem::take(error);
            *error = taken.add_context(context.to_owned());
        }
    }

    #[inline]
    pub fn append(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether any of the errors is reported with `vuid`.
    pub fn contains_vuid(&self, vuid: &str) -> bool {
        self.0.iter().any(|err| err.vuids.contains(&vuid))
    }

    /// Returns whether any of the errors is of kind `kind`.
    pub fn contains_kind(&self, kind: ViolationKind) -> bool {
        self.0.iter().any(|err| err.kind == Some(kind))
    }

    /// Returns the number of errors reported with `vuid`.
    pub fn count_vuid(&self, vuid: &str) -> usize {
        self.0.iter().filter(|err| err.vuids.contains(&vuid)).count()
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Deref for ValidationErrors {
    type Target = [Box<ValidationError>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ValidationErrors {
    type Item = Box<ValidationError>;
    type IntoIter = smallvec::IntoIter<[Box<ValidationError>; 1]>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Box<ValidationError>> for ValidationErrors {
    #[inline]
    fn from(err: Box<ValidationError>) -> Self {
        let mut errors = Self::new();
        errors.push(err);
        errors
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self.0.as_slice() {
            [] => write!(f, "no validation errors"),
            [single] => write!(f, "{}", single),
            errors => {
                write!(f, "{} validation errors:", errors.len())?;

                for err in errors {
                    write!(f, "\n- {}", err)?;
                }

                Ok(())
            }
        }
    }
}

impl Error for ValidationErrors {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.first().map(|err| err.as_ref() as _)
    }
}

/// A wrapper for error types of functions that can return validation errors.
#[derive(Clone, Debug)]
pub enum Validated<E> {
    /// A non-validation error occurred.
    Error(E),

    /// A validation error occurred.
    ValidationError(ValidationErrors),
}

impl<E> Validated<E> {
    /// Returns the validation errors, if any.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Error(_) => None,
            Self::ValidationError(errors) => Some(errors),
        }
    }

    /// Returns the inner `Error` value, or panics if it contains a validation error.
    #[track_caller]
    pub fn unwrap(self) -> E {
        match self {
            Self::Error(err) => err,
            Self::ValidationError(errors) => panic!(
                "called `Validated::unwrap` on a `ValidationError` value: {}",
                errors
            ),
        }
    }
}

impl<E> Display for Validated<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(_) => write!(f, "a non-validation error occurred"),
            Self::ValidationError(_) => write!(f, "a validation error occurred"),
        }
    }
}

impl<E> Error for Validated<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Error(err) => Some(err),
            Self::ValidationError(errors) => Some(errors),
        }
    }
}

impl<E> From<ValidationErrors> for Validated<E> {
    #[inline]
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationError(errors)
    }
}

/// Used in errors to indicate a set of alternatives that needs to be available/enabled to allow
/// a given operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequiresOneOf(pub &'static [RequiresAllOf]);

impl RequiresOneOf {
    /// Returns whether there are any requirements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for RequiresOneOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "requires one of: ")?;

        if let Some((first, rest)) = self.0.split_first() {
            if first.0.len() > 1 {
                write!(f, "({})", first)?;
            } else {
                write!(f, "{}", first)?;
            }

            for rest in rest {
                if first.0.len() > 1 {
                    write!(f, " or ({})", rest)?;
                } else {
                    write!(f, " or {}", rest)?;
                }
            }
        }

        Ok(())
    }
}

/// Used in errors to indicate a set of requirements that all need to be available/enabled to
/// allow a given operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequiresAllOf(pub &'static [Requires]);

impl Display for RequiresAllOf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if let Some((first, rest)) = self.0.split_first() {
            write!(f, "{}", first)?;

            for rest in rest {
                write!(f, " + {}", rest)?;
            }
        }

        Ok(())
    }
}

/// Something that needs to be supported or enabled to allow a particular operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requires {
    DeviceFeature(&'static str),
    QueueFlag(&'static str),
}

impl Display for Requires {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Requires::DeviceFeature(device_feature) => {
                write!(f, "device feature `{}`", device_feature)
            }
            Requires::QueueFlag(queue_flag) => write!(f, "queue flag `{}`", queue_flag),
        }
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NonExhaustive(pub(crate) ());
