// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Command buffers, and the rules checked while recording them.
//!
//! A command buffer goes through the following states:
//!
//! - **Initial**: after allocation, or after a reset.
//! - **Recording**: between [`begin`] and [`end`]. Every command method validates the command
//!   against the state that was recorded and bound so far, reports what it found, and then
//!   records the command.
//! - **Executable**: after [`end`]. The command buffer can be submitted to a queue, or executed
//!   by a primary command buffer if it's a secondary command buffer.
//! - **Pending**: after submission, until the queue is waited on.
//! - **Invalid**: an object that the command buffer referenced was destroyed or modified, a
//!   secondary command buffer it executed was re-recorded, or a [`OneTimeSubmit`] command buffer
//!   completed its execution.
//!
//! # Primary and secondary command buffers.
//!
//! Primary command buffers can be submitted to a queue, and can execute secondary command buffers
//! with [`execute_commands`]. Secondary command buffers are begun with a
//! [`CommandBufferInheritanceInfo`] describing the context they will be executed in. If that
//! context includes a render pass, the secondary command buffer can only be executed inside a
//! compatible render pass instance.
//!
//! Command buffers are allocated from a [`CommandPool`](pool::CommandPool), which ties them to a
//! queue family. Commands that the queue family doesn't support are reported both when they are
//! recorded and when the command buffer is submitted.
//!
//! [`begin`]: CommandBuffer::begin
//! [`end`]: CommandBuffer::end
//! [`execute_commands`]: CommandBuffer::execute_commands
//! [`OneTimeSubmit`]: CommandBufferUsage::OneTimeSubmit

pub use self::{
    commands::{
        bind_push::PushConstantsInfo,
        clear::{ClearColorImageInfo, ClearColorValue},
        conditional_rendering::ConditionalRenderingBeginInfo,
        dynamic_state::StencilFaces,
        image::{BlitImageInfo, ImageBlit},
        render_pass::{
            ClearAttachment, ClearRect, RenderPassBeginInfo, RenderingAttachmentInfo,
            RenderingInfo,
        },
        transfer::{
            BufferCopy, BufferImageCopy, CopyBufferInfo, CopyBufferToImageInfo, CopyImageInfo,
            CopyImageToBufferInfo, ImageCopy,
        },
    },
    pool::CommandBufferAllocateInfo,
};
use self::{
    pool::{CommandPool, CommandPoolCreateFlags},
    state::{CommandBufferBuilderState, RenderPassState},
};
use crate::{
    device::{queue::QueueFlags, Device, DeviceOwned},
    format::{Format, FormatFeatures},
    gpu_av::InstrumentedCommand,
    image::{ImageAspects, SampleCount},
    macros::vulkan_enum,
    query::{QueryControlFlags, QueryPipelineStatisticFlags},
    registry::{ObjectState, ObjectType},
    render_pass::{Framebuffer, Subpass},
    Handle, Requires, RequiresAllOf, RequiresOneOf, ValidationError, ValidationErrors,
    ViolationKind, VulkanObject,
};
use foldhash::HashSet;
use parking_lot::{Mutex, MutexGuard};
use std::{
    fmt::{Debug, Display, Error as FmtError, Formatter},
    mem::take,
    sync::Arc,
};

mod commands;
pub mod pool;
mod state;

/// A command buffer allocated from a [`CommandPool`].
///
/// All recording methods take `&self`. Recording into one command buffer from several threads
/// at once is serialized by an internal lock, but the order of the commands is then unspecified.
pub struct CommandBuffer {
    handle: Handle,
    pool: Arc<CommandPool>,
    level: CommandBufferLevel,

    inner: Mutex<CommandBufferInner>,
}

/// Everything that is reset when the command buffer is reset or begins recording.
#[derive(Default)]
pub(in crate::command_buffer) struct CommandBufferInner {
    pub(in crate::command_buffer) state: CommandBufferState,
    pub(in crate::command_buffer) invalid_reason: Option<InvalidReason>,
    pub(in crate::command_buffer) usage: CommandBufferUsage,
    pub(in crate::command_buffer) inheritance_info: Option<CommandBufferInheritanceInfo>,

    // Number of submissions since the last begin, and how many of them haven't completed.
    pub(in crate::command_buffer) submit_count: u32,
    pub(in crate::command_buffer) pending_count: u32,

    pub(in crate::command_buffer) builder_state: CommandBufferBuilderState,

    // Objects that recorded commands refer to. Destroying one of them invalidates the command
    // buffer. The `Arc`s keep the objects from being dropped while they are recorded.
    pub(in crate::command_buffer) referenced: HashSet<Handle>,
    pub(in crate::command_buffer) resources: Vec<Arc<dyn VulkanObject + Send + Sync>>,

    pub(in crate::command_buffer) secondaries: Vec<Arc<CommandBuffer>>,
    pub(in crate::command_buffer) required_queue_flags: Vec<(QueueFlags, &'static [&'static str])>,
    pub(in crate::command_buffer) instrumented: Vec<InstrumentedCommand>,
}

impl CommandBufferInner {
    /// Returns the state as seen from the outside.
    #[inline]
    pub(in crate::command_buffer) fn current_state(&self) -> CommandBufferState {
        match self.state {
            CommandBufferState::Invalid => CommandBufferState::Invalid,
            _ if self.pending_count > 0 => CommandBufferState::Pending,
            state => state,
        }
    }

    /// Keeps `resource` alive, and makes the command buffer a user of it.
    pub(in crate::command_buffer) fn add_resource<T>(&mut self, resource: &Arc<T>)
    where
        T: VulkanObject + Send + Sync + 'static,
    {
        if self.referenced.insert(resource.handle()) {
            self.resources.push(resource.clone());
        }
    }

    /// Makes the command buffer a user of objects that another object keeps alive.
    pub(in crate::command_buffer) fn add_handles(&mut self, handles: impl IntoIterator<Item = Handle>) {
        self.referenced.extend(handles);
    }

    fn finish_submit(&mut self, handle: Handle, completed_one_time: &mut Vec<Handle>) {
        debug_assert!(self.pending_count > 0);
        self.pending_count = self.pending_count.saturating_sub(1);

        if self.pending_count == 0
            && self.usage == CommandBufferUsage::OneTimeSubmit
            && self.state == CommandBufferState::Executable
        {
            self.state = CommandBufferState::Invalid;
            self.invalid_reason = Some(InvalidReason::OneTimeSubmitCompleted);
            completed_one_time.push(handle);
        }
    }
}

impl CommandBuffer {
    pub(super) fn new(pool: Arc<CommandPool>, level: CommandBufferLevel) -> Arc<Self> {
        let registry = pool.device().registry();
        let handle = registry.register(ObjectType::CommandBuffer, Some(pool.handle()));

        let command_buffer = Arc::new(CommandBuffer {
            handle,
            pool,
            level,
            inner: Mutex::new(CommandBufferInner::default()),
        });
        command_buffer
            .pool
            .device()
            .registry()
            .register_command_buffer(&command_buffer);

        command_buffer
    }

    /// Returns the level of the command buffer.
    #[inline]
    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    /// Returns the pool that the command buffer was allocated from.
    #[inline]
    pub fn pool(&self) -> &Arc<CommandPool> {
        &self.pool
    }

    /// Returns the queue family of the pool that the command buffer was allocated from.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.pool.queue_family_index()
    }

    /// Returns the current state of the command buffer.
    #[inline]
    pub fn state(&self) -> CommandBufferState {
        self.inner.lock().current_state()
    }

    /// If the command buffer is invalid, returns why it became invalid.
    #[inline]
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        let inner = self.inner.lock();

        match inner.state {
            CommandBufferState::Invalid => inner.invalid_reason,
            _ => None,
        }
    }

    /// Returns the usage that the command buffer was last begun with.
    ///
    /// This can be different from what was given to `begin`, if a secondary command buffer that
    /// doesn't allow simultaneous use was executed in it.
    #[inline]
    pub fn usage(&self) -> CommandBufferUsage {
        self.inner.lock().usage
    }

    /// Returns whether the command buffer was submitted and the work hasn't completed yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending_count > 0
    }

    #[inline]
    pub(in crate::command_buffer) fn lock(&self) -> MutexGuard<'_, CommandBufferInner> {
        self.inner.lock()
    }

    /// Begins recording the command buffer.
    ///
    /// If the command buffer was recorded before, it is implicitly reset, which requires its pool
    /// to have been created with [`CommandPoolCreateFlags::RESET_COMMAND_BUFFER`]. Primary command
    /// buffers that executed it become invalid.
    pub fn begin(&self, begin_info: CommandBufferBeginInfo) -> Result<(), ValidationErrors> {
        let device = self.device();
        let mut errors = ValidationErrors::new();

        let was_recorded = {
            let mut inner = self.inner.lock();

            if let Err(err) = self.validate_begin_state(&inner) {
                drop(inner);
                return Err(device.reported(err));
            }

            errors.check(
                begin_info
                    .validate(device, self.level)
                    .map_err(|err| err.add_context("begin_info")),
            );

            let was_recorded = inner.state != CommandBufferState::Initial;
            let old = take(&mut *inner);
            self.begin_unchecked(&mut inner, begin_info);
            drop(inner);
            drop(old);

            was_recorded
        };

        device.registry().set_state(self.handle, ObjectState::Created);

        if was_recorded {
            tracing::debug!(command_buffer = ?self.handle, "command buffer implicitly reset");
            device.invalidate_users(
                self.handle,
                InvalidReason::SecondaryInvalidated(self.handle),
                None,
                &mut errors,
            );
        }

        tracing::debug!(command_buffer = ?self.handle, level = ?self.level, "recording begun");

        device.report(errors)
    }

    fn validate_begin_state(&self, inner: &CommandBufferInner) -> Result<(), Box<ValidationError>> {
        if !self.device().registry().is_alive(self.handle) {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: "has been freed".into(),
                vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if inner.pending_count > 0 || inner.state == CommandBufferState::Recording {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: format!(
                    "is in the {:?} state, but must not be in the recording or pending state",
                    inner.current_state(),
                )
                .into(),
                vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-00049"],
                kind: Some(ViolationKind::CommandBufferAlreadyRecording),
                ..Default::default()
            }));
        }

        if inner.state != CommandBufferState::Initial
            && !self
                .pool
                .flags()
                .intersects(CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        {
            return Err(Box::new(ValidationError {
                context: "self".into(),
                problem: format!(
                    "is in the {:?} state, and the pool it was allocated from was not created \
                    with `CommandPoolCreateFlags::RESET_COMMAND_BUFFER`",
                    inner.state,
                )
                .into(),
                vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-00050"],
                kind: Some(ViolationKind::CommandBufferAlreadyRecording),
                ..Default::default()
            }));
        }

        Ok(())
    }

    fn begin_unchecked(&self, inner: &mut CommandBufferInner, begin_info: CommandBufferBeginInfo) {
        let CommandBufferBeginInfo {
            usage,
            inheritance_info,
            _ne: _,
        } = begin_info;

        inner.state = CommandBufferState::Recording;
        inner.usage = usage;

        if self.level == CommandBufferLevel::Secondary {
            if let Some(inheritance_info) = inheritance_info {
                if let Some(render_pass) = &inheritance_info.render_pass {
                    if let CommandBufferInheritanceRenderPassType::BeginRenderPass(info) =
                        render_pass
                    {
                        inner.add_resource(info.subpass.render_pass());

                        if let Some(framebuffer) = &info.framebuffer {
                            inner.add_resource(framebuffer);
                        }
                    }

                    inner.builder_state.render_pass =
                        Some(RenderPassState::from_inheritance(render_pass));
                }

                inner.inheritance_info = Some(inheritance_info);
            }
        }
    }

    /// Ends recording the command buffer.
    ///
    /// The command buffer becomes executable even if an error is reported, unless it wasn't
    /// recording.
    pub fn end(&self) -> Result<(), ValidationErrors> {
        let device = self.device();
        let mut errors = ValidationErrors::new();

        {
            let mut inner = self.inner.lock();

            if inner.state != CommandBufferState::Recording {
                let problem = match (inner.state, inner.invalid_reason) {
                    (CommandBufferState::Invalid, Some(reason)) => {
                        format!("is in the invalid state, because {}", reason)
                    }
                    _ => format!(
                        "is in the {:?} state, but must be in the recording state",
                        inner.current_state(),
                    ),
                };
                drop(inner);

                return Err(device.reported(Box::new(ValidationError {
                    context: "self".into(),
                    problem: problem.into(),
                    vuids: &["VUID-vkEndCommandBuffer-commandBuffer-00059"],
                    kind: Some(ViolationKind::CommandBufferNotRecording),
                    ..Default::default()
                })));
            }

            let builder_state = &inner.builder_state;

            if self.level == CommandBufferLevel::Primary && builder_state.render_pass.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "a render pass instance is active".into(),
                    vuids: &["VUID-vkEndCommandBuffer-commandBuffer-00060"],
                    kind: Some(ViolationKind::RenderPassScopeViolation),
                    ..Default::default()
                }));
            }

            for query_type in builder_state.queries.keys() {
                errors.push(Box::new(ValidationError {
                    problem: format!("a query of type {:?} is active", query_type).into(),
                    vuids: &["VUID-vkEndCommandBuffer-commandBuffer-00061"],
                    kind: Some(ViolationKind::QueryScopeViolation),
                    ..Default::default()
                }));
            }

            if builder_state.conditional_rendering.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "conditional rendering is active".into(),
                    vuids: &["VUID-vkEndCommandBuffer-None-01978"],
                    kind: Some(ViolationKind::ConditionalRenderingScopeViolation),
                    ..Default::default()
                }));
            }

            if builder_state.transform_feedback.is_some() {
                errors.push(Box::new(ValidationError {
                    problem: "transform feedback is active".into(),
                    vuids: &["VUID-vkEndCommandBuffer-commandBuffer-01815"],
                    kind: Some(ViolationKind::TransformFeedbackScopeViolation),
                    ..Default::default()
                }));
            }

            inner.state = CommandBufferState::Executable;
        }

        tracing::debug!(command_buffer = ?self.handle, "recording ended");

        device.report(errors)
    }

    /// Resets the command buffer to the initial state.
    ///
    /// The pool must have been created with [`CommandPoolCreateFlags::RESET_COMMAND_BUFFER`].
    /// Primary command buffers that executed this command buffer become invalid.
    pub fn reset(&self) -> Result<(), ValidationErrors> {
        let device = self.device();
        let mut errors = ValidationErrors::new();

        if !device.registry().is_alive(self.handle) {
            return Err(device.reported(Box::new(ValidationError {
                context: "self".into(),
                problem: "has been freed".into(),
                vuids: &["VUID-vkResetCommandBuffer-commandBuffer-parameter"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            })));
        }

        if self.is_pending() {
            return Err(device.reported(Box::new(ValidationError {
                context: "self".into(),
                problem: "is in the pending state".into(),
                vuids: &["VUID-vkResetCommandBuffer-commandBuffer-00045"],
                kind: Some(ViolationKind::ObjectInUse),
                ..Default::default()
            })));
        }

        if !self
            .pool
            .flags()
            .intersects(CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        {
            errors.push(Box::new(ValidationError {
                context: "self.pool().flags()".into(),
                problem: "does not contain `CommandPoolCreateFlags::RESET_COMMAND_BUFFER`".into(),
                vuids: &["VUID-vkResetCommandBuffer-commandBuffer-00046"],
                kind: Some(ViolationKind::CommandBufferStateViolation),
                ..Default::default()
            }));
        }

        self.reset_unchecked(&mut errors);

        device.report(errors)
    }

    pub(super) fn reset_unchecked(&self, errors: &mut ValidationErrors) {
        let old = take(&mut *self.inner.lock());
        let was_recorded = old.state != CommandBufferState::Initial;
        drop(old);

        let device = self.device();
        device.registry().set_state(self.handle, ObjectState::Created);

        if was_recorded {
            tracing::debug!(command_buffer = ?self.handle, "command buffer reset");
            device.invalidate_users(
                self.handle,
                InvalidReason::SecondaryInvalidated(self.handle),
                None,
                errors,
            );
        }
    }

    /// Returns what the queue needs to know to validate a submission of this command buffer.
    pub(crate) fn submit_snapshot(&self) -> SubmitSnapshot {
        let inner = self.inner.lock();

        SubmitSnapshot {
            state: inner.current_state(),
            invalid_reason: inner.invalid_reason,
            usage: inner.usage,
            submit_count: inner.submit_count,
            secondaries: inner.secondaries.clone(),
            protected: self.pool.is_protected(),
            required_queue_flags: inner.required_queue_flags.clone(),
        }
    }

    /// Marks the command buffer and the secondary command buffers it executes as pending, and
    /// returns the instrumented commands to run on the GPU-assisted checker.
    pub(crate) fn add_queue_submit(&self) -> Vec<InstrumentedCommand> {
        let (secondaries, instrumented) = {
            let mut inner = self.inner.lock();
            inner.submit_count += 1;
            inner.pending_count += 1;

            (inner.secondaries.clone(), inner.instrumented.clone())
        };

        for secondary in secondaries {
            let mut inner = secondary.inner.lock();
            inner.submit_count += 1;
            inner.pending_count += 1;
        }

        instrumented
    }

    /// Completes one submission of the command buffer. Returns the one-time-submit command
    /// buffers (this one or its secondaries) that became invalid.
    pub(crate) fn set_submit_finished(&self) -> Vec<Handle> {
        let mut completed_one_time = Vec::new();

        let secondaries = {
            let mut inner = self.inner.lock();
            inner.finish_submit(self.handle, &mut completed_one_time);
            inner.secondaries.clone()
        };

        for secondary in secondaries {
            secondary
                .inner
                .lock()
                .finish_submit(secondary.handle, &mut completed_one_time);
        }

        completed_one_time
    }

    /// Makes the command buffer invalid if it refers to `handle`.
    ///
    /// Returns `None` if the command buffer doesn't refer to `handle`.
    pub(crate) fn invalidate_if_uses(
        &self,
        handle: Handle,
        reason: InvalidReason,
    ) -> Option<Invalidation> {
        let mut inner = self.inner.lock();

        if !inner.referenced.contains(&handle) {
            return None;
        }

        let was_pending = inner.pending_count > 0;
        let newly_invalid = matches!(
            inner.state,
            CommandBufferState::Recording | CommandBufferState::Executable
        );

        if newly_invalid {
            inner.state = CommandBufferState::Invalid;
            inner.invalid_reason = Some(reason);
        }

        Some(Invalidation {
            was_pending,
            newly_invalid,
        })
    }
}

impl Drop for CommandBuffer {
    #[inline]
    fn drop(&mut self) {
        self.pool.device().registry().unregister(self.handle);
    }
}

impl VulkanObject for CommandBuffer {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for CommandBuffer {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.pool.device()
    }
}

impl Debug for CommandBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("level", &self.level)
            .field("queue_family_index", &self.queue_family_index())
            .finish_non_exhaustive()
    }
}

impl PartialEq for CommandBuffer {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for CommandBuffer {}

/// What the queue sees of a command buffer when it is submitted.
pub(crate) struct SubmitSnapshot {
    pub(crate) state: CommandBufferState,
    pub(crate) invalid_reason: Option<InvalidReason>,
    pub(crate) usage: CommandBufferUsage,
    pub(crate) submit_count: u32,
    pub(crate) secondaries: Vec<Arc<CommandBuffer>>,
    pub(crate) protected: bool,
    pub(crate) required_queue_flags: Vec<(QueueFlags, &'static [&'static str])>,
}

/// The outcome of [`CommandBuffer::invalidate_if_uses`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Invalidation {
    pub(crate) was_pending: bool,
    pub(crate) newly_invalid: bool,
}

/// The lifecycle state of a command buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    /// Allocated or reset, and not recording.
    #[default]
    Initial,
    /// Between `begin` and `end`.
    Recording,
    /// Ended, and ready to be submitted or executed.
    Executable,
    /// Submitted, and the work hasn't completed yet.
    Pending,
    /// Can't be submitted or executed until it's reset or recorded again.
    Invalid,
}

/// Why a command buffer became invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// An object that the command buffer recorded a reference to was destroyed.
    ObjectDestroyed(Handle),
    /// A descriptor set that was bound in the command buffer was updated.
    DescriptorSetUpdated(Handle),
    /// A command buffer that was executed in this command buffer was re-recorded, reset or
    /// became invalid.
    SecondaryInvalidated(Handle),
    /// The command buffer was recorded with [`CommandBufferUsage::OneTimeSubmit`], and its
    /// execution completed.
    OneTimeSubmitCompleted,
}

impl Display for InvalidReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::ObjectDestroyed(handle) => write!(f, "{} was destroyed", handle),
            Self::DescriptorSetUpdated(handle) => {
                write!(f, "descriptor set {} was updated after being bound", handle)
            }
            Self::SecondaryInvalidated(handle) => {
                write!(f, "command buffer {} was reset, re-recorded or invalidated", handle)
            }
            Self::OneTimeSubmitCompleted => write!(
                f,
                "it was recorded with `CommandBufferUsage::OneTimeSubmit`, and was already \
                executed",
            ),
        }
    }
}

vulkan_enum! {
    /// Determines the kind of command buffer to create.
    CommandBufferLevel = CommandBufferLevel(i32);

    /// Primary command buffers can be executed on a queue, and can call secondary command buffers.
    /// Render passes must begin and end within the same primary command buffer.
    Primary = PRIMARY,

    /// Secondary command buffers cannot be executed on a queue, but can be executed by a primary
    /// command buffer. If created for a render pass, they must fit within a single render subpass.
    Secondary = SECONDARY,
}

vulkan_enum! {
    /// Describes what a subpass in a command buffer will contain.
    SubpassContents = SubpassContents(i32);

    /// The subpass will only directly contain commands.
    Inline = INLINE,

    /// The subpass will only contain secondary command buffers invocations.
    SecondaryCommandBuffers = SECONDARY_COMMAND_BUFFERS,
}

/// Usage flags to pass when beginning a command buffer.
///
/// The safest option is `SimultaneousUse`, but it may be slower than the other two.
// NOTE: The ordering is important: the variants are listed from least to most permissive!
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum CommandBufferUsage {
    /// The command buffer can only be submitted once. After its execution has completed, it
    /// becomes invalid.
    OneTimeSubmit = ash::vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT.as_raw(),

    /// The command buffer can be used multiple times, but must not be pending more than once at a
    /// time.
    #[default]
    MultipleSubmit = 0,

    /// The command buffer can be pending several times at once. If it's a secondary command
    /// buffer, it can be recorded into multiple primary command buffers at once.
    SimultaneousUse = ash::vk::CommandBufferUsageFlags::SIMULTANEOUS_USE.as_raw(),
}

impl From<CommandBufferUsage> for ash::vk::CommandBufferUsageFlags {
    #[inline]
    fn from(val: CommandBufferUsage) -> Self {
        Self::from_raw(val as u32)
    }
}

/// Parameters to begin recording a command buffer.
#[derive(Clone, Debug)]
pub struct CommandBufferBeginInfo {
    /// How the command buffer will be used.
    ///
    /// The default value is [`CommandBufferUsage::MultipleSubmit`].
    pub usage: CommandBufferUsage,

    /// The context that a secondary command buffer inherits from the primary command buffer it
    /// is executed in. Must be `Some` for secondary command buffers, and is ignored for primary
    /// command buffers.
    ///
    /// The default value is `None`.
    pub inheritance_info: Option<CommandBufferInheritanceInfo>,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferBeginInfo {
    #[inline]
    fn default() -> Self {
        Self {
            usage: CommandBufferUsage::MultipleSubmit,
            inheritance_info: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandBufferBeginInfo {
    /// Returns a `CommandBufferBeginInfo` for a secondary command buffer with the given
    /// inheritance info.
    #[inline]
    pub fn inheritance_info(inheritance_info: CommandBufferInheritanceInfo) -> Self {
        Self {
            inheritance_info: Some(inheritance_info),
            ..Default::default()
        }
    }

    pub(crate) fn validate(
        &self,
        device: &Device,
        level: CommandBufferLevel,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            usage: _,
            ref inheritance_info,
            _ne: _,
        } = self;

        if level == CommandBufferLevel::Secondary {
            let Some(inheritance_info) = inheritance_info else {
                return Err(Box::new(ValidationError {
                    context: "inheritance_info".into(),
                    problem: "is `None`, but the command buffer is a secondary command buffer"
                        .into(),
                    vuids: &["VUID-vkBeginCommandBuffer-commandBuffer-00051"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            };

            inheritance_info
                .validate(device)
                .map_err(|err| err.add_context("inheritance_info"))?;
        }

        Ok(())
    }
}

/// The context that a secondary command buffer can inherit from the primary command
/// buffer it's executed in.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceInfo {
    /// If `Some`, the secondary command buffer is required to be executed within a render pass
    /// instance, and can only call draw operations.
    /// If `None`, it must be executed outside a render pass instance, and can execute dispatch and
    /// transfer operations, but not drawing operations.
    ///
    /// The default value is `None`.
    pub render_pass: Option<CommandBufferInheritanceRenderPassType>,

    /// If `Some`, the secondary command buffer is allowed to be executed within a primary that has
    /// an occlusion query active. The inner `QueryControlFlags` specifies which flags the
    /// active occlusion is allowed to have enabled.
    /// If `None`, the primary command buffer cannot have an occlusion query active when this
    /// secondary command buffer is executed.
    ///
    /// The `inherited_queries` feature must be enabled if this is `Some`.
    ///
    /// The default value is `None`.
    pub occlusion_query: Option<QueryControlFlags>,

    /// Which pipeline statistics queries are allowed to be active on the primary command buffer
    /// when this secondary command buffer is executed.
    ///
    /// If this value is not empty, the `pipeline_statistics_query` feature must be enabled on
    /// the device.
    ///
    /// The default value is [`QueryPipelineStatisticFlags::empty()`].
    pub query_statistics_flags: QueryPipelineStatisticFlags,

    /// Whether the secondary command buffer can be executed while conditional rendering is
    /// active in the primary command buffer.
    ///
    /// If set to `true`, the `inherited_conditional_rendering` feature must be enabled on the
    /// device.
    ///
    /// The default value is `false`.
    pub conditional_rendering_enable: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferInheritanceInfo {
    #[inline]
    fn default() -> Self {
        Self {
            render_pass: None,
            occlusion_query: None,
            query_statistics_flags: QueryPipelineStatisticFlags::empty(),
            conditional_rendering_enable: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandBufferInheritanceInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref render_pass,
            occlusion_query,
            query_statistics_flags,
            conditional_rendering_enable,
            _ne: _,
        } = self;

        let features = device.enabled_features();

        if let Some(render_pass) = render_pass {
            match render_pass {
                CommandBufferInheritanceRenderPassType::BeginRenderPass(render_pass_info) => {
                    render_pass_info
                        .validate(device)
                        .map_err(|err| err.add_context("render_pass"))?;
                }
                CommandBufferInheritanceRenderPassType::BeginRendering(rendering_info) => {
                    rendering_info
                        .validate(device)
                        .map_err(|err| err.add_context("render_pass"))?;
                }
            }
        }

        if let Some(control_flags) = occlusion_query {
            if !features.inherited_queries {
                return Err(Box::new(ValidationError {
                    context: "occlusion_query".into(),
                    problem: "is `Some`".into(),
                    requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                        "inherited_queries",
                    )])]),
                    vuids: &["VUID-VkCommandBufferInheritanceInfo-occlusionQueryEnable-00056"],
                    kind: Some(ViolationKind::FeatureNotEnabled),
                    ..Default::default()
                }));
            }

            control_flags.validate_device(device).map_err(|err| {
                err.add_context("occlusion_query")
                    .set_vuids(&["VUID-VkCommandBufferInheritanceInfo-queryFlags-00057"])
                    .set_kind(ViolationKind::FeatureNotEnabled)
            })?;
        }

        if !query_statistics_flags.is_empty() && !features.pipeline_statistics_query {
            return Err(Box::new(ValidationError {
                context: "query_statistics_flags".into(),
                problem: "is not empty".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "pipeline_statistics_query",
                )])]),
                vuids: &["VUID-VkCommandBufferInheritanceInfo-pipelineStatistics-00058"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        if conditional_rendering_enable && !features.inherited_conditional_rendering {
            return Err(Box::new(ValidationError {
                context: "conditional_rendering_enable".into(),
                problem: "is `true`".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "inherited_conditional_rendering",
                )])]),
                vuids: &[
                    "VUID-VkCommandBufferInheritanceConditionalRenderingInfoEXT-conditionalRenderingEnable-01977",
                ],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Selects the type of render pass for command buffer inheritance.
#[derive(Clone, Debug)]
pub enum CommandBufferInheritanceRenderPassType {
    /// The secondary command buffer will be executed within a render pass begun with
    /// `begin_render_pass`, using a `RenderPass` object and `Framebuffer`.
    BeginRenderPass(CommandBufferInheritanceRenderPassInfo),

    /// The secondary command buffer will be executed within a render pass begun with
    /// `begin_rendering`, using dynamic rendering.
    BeginRendering(CommandBufferInheritanceRenderingInfo),
}

impl From<Subpass> for CommandBufferInheritanceRenderPassType {
    #[inline]
    fn from(val: Subpass) -> Self {
        Self::BeginRenderPass(val.into())
    }
}

impl From<CommandBufferInheritanceRenderPassInfo> for CommandBufferInheritanceRenderPassType {
    #[inline]
    fn from(val: CommandBufferInheritanceRenderPassInfo) -> Self {
        Self::BeginRenderPass(val)
    }
}

impl From<CommandBufferInheritanceRenderingInfo> for CommandBufferInheritanceRenderPassType {
    #[inline]
    fn from(val: CommandBufferInheritanceRenderingInfo) -> Self {
        Self::BeginRendering(val)
    }
}

/// The render pass context that a secondary command buffer is created for.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceRenderPassInfo {
    /// The render subpass that this secondary command buffer must be executed within.
    ///
    /// There is no default value.
    pub subpass: Subpass,

    /// The framebuffer object that will be used when calling the command buffer.
    /// This parameter is optional. If it is `Some`, the command buffer can only be executed in a
    /// render pass instance that uses this framebuffer.
    ///
    /// The default value is `None`.
    pub framebuffer: Option<Arc<Framebuffer>>,
}

impl CommandBufferInheritanceRenderPassInfo {
    /// Returns a `CommandBufferInheritanceRenderPassInfo` with the specified `subpass`.
    #[inline]
    pub fn subpass(subpass: Subpass) -> Self {
        Self {
            subpass,
            framebuffer: None,
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref subpass,
            ref framebuffer,
        } = self;

        if !device.registry().is_alive(subpass.render_pass().handle()) {
            return Err(Box::new(ValidationError {
                context: "subpass.render_pass()".into(),
                problem: "has been destroyed".into(),
                vuids: &["VUID-VkCommandBufferBeginInfo-flags-06000"],
                kind: Some(ViolationKind::DestroyedObjectUsed),
                ..Default::default()
            }));
        }

        if let Some(framebuffer) = framebuffer {
            if !framebuffer
                .render_pass()
                .is_compatible_with(subpass.render_pass())
            {
                return Err(Box::new(ValidationError {
                    problem: "`framebuffer` was created with a render pass that is not \
                        compatible with `subpass.render_pass()`"
                        .into(),
                    vuids: &["VUID-VkCommandBufferBeginInfo-flags-00055"],
                    kind: Some(ViolationKind::IncompatibleRenderPassViolation),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

impl From<Subpass> for CommandBufferInheritanceRenderPassInfo {
    #[inline]
    fn from(subpass: Subpass) -> Self {
        Self {
            subpass,
            framebuffer: None,
        }
    }
}

/// The dynamic rendering context that a secondary command buffer is created for.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceRenderingInfo {
    /// If not `0`, indicates that multiview rendering will be enabled, and specifies the view
    /// indices that are rendered to. The value is a bitmask, so that that for example `0b11` will
    /// draw to the first two views and `0b101` will draw to the first and third view.
    ///
    /// If set to a nonzero value, then the `multiview` feature must be enabled on the device.
    ///
    /// The default value is `0`.
    pub view_mask: u32,

    /// The formats of the color attachments that will be used during rendering.
    ///
    /// If an element is `None`, it indicates that the attachment will not be used.
    ///
    /// The default value is empty.
    pub color_attachment_formats: Vec<Option<Format>>,

    /// The format of the depth attachment that will be used during rendering.
    ///
    /// If set to `None`, it indicates that no depth attachment will be used.
    ///
    /// The default value is `None`.
    pub depth_attachment_format: Option<Format>,

    /// The format of the stencil attachment that will be used during rendering.
    ///
    /// If set to `None`, it indicates that no stencil attachment will be used.
    ///
    /// The default value is `None`.
    pub stencil_attachment_format: Option<Format>,

    /// The number of samples that the color, depth and stencil attachments will have.
    ///
    /// The default value is [`SampleCount::Sample1`]
    pub rasterization_samples: SampleCount,

    pub _ne: crate::NonExhaustive,
}

impl Default for CommandBufferInheritanceRenderingInfo {
    #[inline]
    fn default() -> Self {
        Self {
            view_mask: 0,
            color_attachment_formats: Vec::new(),
            depth_attachment_format: None,
            stencil_attachment_format: None,
            rasterization_samples: SampleCount::Sample1,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl CommandBufferInheritanceRenderingInfo {
    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            view_mask,
            ref color_attachment_formats,
            depth_attachment_format,
            stencil_attachment_format,
            rasterization_samples: _,
            _ne: _,
        } = self;

        let properties = device.properties();

        if view_mask != 0 && !device.enabled_features().multiview {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "is not zero".into(),
                requires_one_of: RequiresOneOf(&[RequiresAllOf(&[Requires::DeviceFeature(
                    "multiview",
                )])]),
                vuids: &["VUID-VkCommandBufferInheritanceRenderingInfo-multiview-06008"],
                kind: Some(ViolationKind::FeatureNotEnabled),
                ..Default::default()
            }));
        }

        let view_count = u32::BITS - view_mask.leading_zeros();

        if view_count > properties.max_multiview_view_count {
            return Err(Box::new(ValidationError {
                context: "view_mask".into(),
                problem: "the number of views exceeds the `max_multiview_view_count` limit"
                    .into(),
                vuids: &["VUID-VkCommandBufferInheritanceRenderingInfo-viewMask-06009"],
                kind: Some(ViolationKind::LimitExceeded),
                ..Default::default()
            }));
        }

        for (attachment_index, format) in color_attachment_formats
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|f| (i, f)))
        {
            if !device
                .format_properties(format)
                .optimal_tiling_features
                .intersects(FormatFeatures::COLOR_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: format!("color_attachment_formats[{}]", attachment_index).into(),
                    problem: "format features do not contain \
                        `FormatFeature::COLOR_ATTACHMENT`"
                        .into(),
                    vuids: &["VUID-VkCommandBufferInheritanceRenderingInfo-pColorAttachmentFormats-06006"],
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        for (format, aspect, context, aspect_vuids, feature_vuids) in [
            (
                depth_attachment_format,
                ImageAspects::DEPTH,
                "depth_attachment_format",
                &["VUID-VkCommandBufferInheritanceRenderingInfo-depthAttachmentFormat-06540"]
                    as &'static [_],
                &["VUID-VkCommandBufferInheritanceRenderingInfo-depthAttachmentFormat-06007"]
                    as &'static [_],
            ),
            (
                stencil_attachment_format,
                ImageAspects::STENCIL,
                "stencil_attachment_format",
                &["VUID-VkCommandBufferInheritanceRenderingInfo-stencilAttachmentFormat-06541"],
                &["VUID-VkCommandBufferInheritanceRenderingInfo-stencilAttachmentFormat-06199"],
            ),
        ] {
            let Some(format) = format else {
                continue;
            };

            if !format.aspects().intersects(aspect) {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: format!("does not have a {:?} aspect", aspect).into(),
                    vuids: aspect_vuids,
                    kind: Some(ViolationKind::InvalidAspectMask),
                    ..Default::default()
                }));
            }

            if !device
                .format_properties(format)
                .optimal_tiling_features
                .intersects(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
            {
                return Err(Box::new(ValidationError {
                    context: context.into(),
                    problem: "format features do not contain \
                        `FormatFeature::DEPTH_STENCIL_ATTACHMENT`"
                        .into(),
                    vuids: feature_vuids,
                    kind: Some(ViolationKind::MissingFormatFeature),
                    ..Default::default()
                }));
            }
        }

        if let (Some(depth_format), Some(stencil_format)) =
            (depth_attachment_format, stencil_attachment_format)
        {
            if depth_format != stencil_format {
                return Err(Box::new(ValidationError {
                    problem: "`depth_attachment_format` and `stencil_attachment_format` are both \
                        `Some`, but are not equal"
                        .into(),
                    vuids: &["VUID-VkCommandBufferInheritanceRenderingInfo-depthAttachmentFormat-06200"],
                    kind: Some(ViolationKind::AttachmentMismatch),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        pool::CommandPoolCreateFlags, CommandBufferBeginInfo, CommandBufferInheritanceInfo,
        CommandBufferInheritanceRenderingInfo, CommandBufferLevel, CommandBufferState,
        CommandBufferUsage, InvalidReason,
    };
    use crate::{
        buffer::BufferUsage,
        device::{queue::SubmitInfo, DeviceFeatures},
        format::Format,
        query::QueryControlFlags,
        ViolationKind, VulkanObject,
    };

    #[test]
    fn begin_then_end() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        assert_eq!(cb.state(), CommandBufferState::Initial);

        cb.begin(Default::default()).unwrap();
        assert_eq!(cb.state(), CommandBufferState::Recording);
        cb.end().unwrap();
        assert_eq!(cb.state(), CommandBufferState::Executable);
    }

    #[test]
    fn begin_while_recording() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.begin(Default::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkBeginCommandBuffer-commandBuffer-00049"));
        assert!(errors.contains_kind(ViolationKind::CommandBufferAlreadyRecording));
        assert_eq!(cb.state(), CommandBufferState::Recording);
    }

    #[test]
    fn end_without_begin() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);

        let errors = cb.end().unwrap_err();
        assert!(errors.contains_vuid("VUID-vkEndCommandBuffer-commandBuffer-00059"));
        assert!(errors.contains_kind(ViolationKind::CommandBufferNotRecording));
    }

    #[test]
    fn implicit_reset_requires_pool_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        let errors = cb.begin(Default::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkBeginCommandBuffer-commandBuffer-00050"));
        assert_eq!(cb.state(), CommandBufferState::Executable);

        // The whole pool can still be reset.
        pool.reset().unwrap();
        cb.begin(Default::default()).unwrap();
    }

    #[test]
    fn implicit_reset() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        let buffer = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);
        cb.begin(Default::default()).unwrap();
        cb.fill_buffer(&buffer, 0, 16, 0).unwrap();
        cb.end().unwrap();

        cb.begin(Default::default()).unwrap();
        cb.end().unwrap();

        // The re-recorded command buffer no longer uses the buffer.
        device.destroy(&*buffer).unwrap();
        assert_eq!(cb.state(), CommandBufferState::Executable);
    }

    #[test]
    fn reset_requires_pool_flag() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        let errors = cb.reset().unwrap_err();
        assert!(errors.contains_vuid("VUID-vkResetCommandBuffer-commandBuffer-00046"));
    }

    #[test]
    fn destroyed_resource_invalidates() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        let buffer = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);
        cb.begin(Default::default()).unwrap();
        cb.fill_buffer(&buffer, 0, 16, 0).unwrap();
        cb.end().unwrap();

        let handle = buffer.handle();
        device.destroy(&*buffer).unwrap();
        assert_eq!(cb.state(), CommandBufferState::Invalid);
        assert_eq!(cb.invalid_reason(), Some(InvalidReason::ObjectDestroyed(handle)));

        // A new buffer may get the same slot, but not the same handle.
        let _replacement = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);

        let errors = queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap_err();
        assert!(errors.contains_kind(ViolationKind::InvalidCommandBufferViolation));
        assert!(errors.contains_vuid("VUID-vkQueueSubmit2-commandBuffer-03874"));
    }

    #[test]
    fn destroy_while_pending() {
        let (device, queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        let buffer = crate::tests::buffer(&device, 16, BufferUsage::TRANSFER_DST);
        cb.begin(Default::default()).unwrap();
        cb.fill_buffer(&buffer, 0, 16, 0).unwrap();
        cb.end().unwrap();
        queue
            .submit(&[SubmitInfo::command_buffers([cb.clone()])])
            .unwrap();

        let errors = device.destroy(&*buffer).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkDestroyBuffer-buffer-00922"));
        assert!(errors.contains_kind(ViolationKind::ObjectInUse));
    }

    #[test]
    fn end_with_active_query() {
        let (device, _queue) = gfx_dev_and_queue!();
        let cb = crate::tests::primary(&device);
        let query_pool = crate::query::QueryPool::new(
            device.clone(),
            crate::query::QueryPoolCreateInfo {
                query_count: 1,
                ..crate::query::QueryPoolCreateInfo::query_type(crate::query::QueryType::Occlusion)
            },
        )
        .unwrap();
        cb.begin(Default::default()).unwrap();
        cb.begin_query(&query_pool, 0, QueryControlFlags::empty())
            .unwrap();

        let errors = cb.end().unwrap_err();
        assert!(errors.contains_vuid("VUID-vkEndCommandBuffer-commandBuffer-00061"));
        assert_eq!(cb.state(), CommandBufferState::Executable);
    }

    #[test]
    fn secondary_requires_inheritance() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);

        let errors = cb.begin(Default::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkBeginCommandBuffer-commandBuffer-00051"));
    }

    #[test]
    fn inheritance_features() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());

        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);
        let errors = cb
            .begin(CommandBufferBeginInfo::inheritance_info(
                CommandBufferInheritanceInfo {
                    occlusion_query: Some(QueryControlFlags::empty()),
                    ..Default::default()
                },
            ))
            .unwrap_err();
        assert!(errors
            .contains_vuid("VUID-VkCommandBufferInheritanceInfo-occlusionQueryEnable-00056"));

        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);
        let errors = cb
            .begin(CommandBufferBeginInfo::inheritance_info(
                CommandBufferInheritanceInfo {
                    render_pass: Some(
                        CommandBufferInheritanceRenderingInfo {
                            view_mask: 0b11,
                            ..Default::default()
                        }
                        .into(),
                    ),
                    ..Default::default()
                },
            ))
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkCommandBufferInheritanceRenderingInfo-multiview-06008"));
    }

    #[test]
    fn inheritance_rendering_formats() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);

        let errors = cb
            .begin(CommandBufferBeginInfo::inheritance_info(
                CommandBufferInheritanceInfo {
                    render_pass: Some(
                        CommandBufferInheritanceRenderingInfo {
                            depth_attachment_format: Some(Format::R8G8B8A8_UNORM),
                            ..Default::default()
                        }
                        .into(),
                    ),
                    ..Default::default()
                },
            ))
            .unwrap_err();
        assert!(errors.contains_vuid(
            "VUID-VkCommandBufferInheritanceRenderingInfo-depthAttachmentFormat-06540"
        ));
    }

    #[test]
    fn one_time_submit_secondary_invalidates_primary() {
        let (device, queue) = gfx_dev_and_queue!();
        let pool = crate::tests::command_pool(&device, 0, CommandPoolCreateFlags::empty());
        let secondary = crate::tests::command_buffer(&pool, CommandBufferLevel::Secondary);
        secondary
            .begin(CommandBufferBeginInfo {
                usage: CommandBufferUsage::OneTimeSubmit,
                ..CommandBufferBeginInfo::inheritance_info(Default::default())
            })
            .unwrap();
        secondary.end().unwrap();

        let primary = crate::tests::primary(&device);
        primary.begin(Default::default()).unwrap();
        primary.execute_commands(&[secondary.clone()]).unwrap();
        primary.end().unwrap();

        queue
            .submit(&[SubmitInfo::command_buffers([primary.clone()])])
            .unwrap();
        assert_eq!(secondary.state(), CommandBufferState::Pending);
        queue.wait_idle().unwrap();

        assert_eq!(secondary.state(), CommandBufferState::Invalid);
        assert_eq!(primary.state(), CommandBufferState::Invalid);
        assert_eq!(
            primary.invalid_reason(),
            Some(InvalidReason::SecondaryInvalidated(secondary.handle())),
        );
    }
}
