// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Shader modules, and what their entry points require from the pipeline state.
//!
//! The model does not parse SPIR-V. A [`ShaderModule`] is created from a description of its entry
//! points, as a reflection pass would produce it: which descriptors each entry point statically
//! uses and how, which push constant bytes it reads, which vertex input locations it consumes,
//! and, for the [GPU-assisted checker](crate::gpu_av), which texel fetches it performs.
//!
//! Pipelines check these requirements against their layout when they are created, and draw and
//! dispatch commands check them against the bound state.

use crate::{
    descriptor_set::layout::DescriptorType,
    device::{Device, DeviceOwned},
    format::NumericType,
    image::ImageViewType,
    macros::{vulkan_bitflags, vulkan_enum},
    pipeline::layout::PushConstantRange,
    registry::ObjectType,
    sync::PipelineStages,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use foldhash::HashMap;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// Contains the reflected description of a shader module.
pub struct ShaderModule {
    device: Arc<Device>,
    handle: Handle,
    entry_points: Vec<EntryPointInfo>,
}

impl ShaderModule {
    /// Creates a new `ShaderModule` from the description of its entry points.
    pub fn new(
        device: Arc<Device>,
        create_info: ShaderModuleCreateInfo,
    ) -> Result<Arc<ShaderModule>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &ShaderModuleCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: ShaderModuleCreateInfo) -> Arc<ShaderModule> {
        let ShaderModuleCreateInfo {
            entry_points,
            _ne: _,
        } = create_info;

        Arc::new(ShaderModule {
            handle: device.registry().register(ObjectType::ShaderModule, None),
            device,
            entry_points,
        })
    }

    /// Returns the entry point with the given name and stage, if there is one.
    ///
    /// If `stage` is `None`, the first entry point with the given name is returned.
    pub fn entry_point(
        self: &Arc<Self>,
        name: &str,
        stage: Option<ShaderStage>,
    ) -> Option<EntryPoint> {
        self.entry_points
            .iter()
            .position(|info| info.name == name && stage.map_or(true, |stage| info.stage == stage))
            .map(|index| EntryPoint {
                module: self.clone(),
                index,
            })
    }

    /// Returns the descriptions of the entry points.
    #[inline]
    pub fn entry_points(&self) -> &[EntryPointInfo] {
        &self.entry_points
    }
}

impl Drop for ShaderModule {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for ShaderModule {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for ShaderModule {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for ShaderModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("ShaderModule")
            .field("handle", &self.handle)
            .field("entry_points", &self.entry_points)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `ShaderModule`.
#[derive(Clone, Debug)]
pub struct ShaderModuleCreateInfo {
    /// The entry points of the module.
    ///
    /// The default value is empty, which must be overridden.
    pub entry_points: Vec<EntryPointInfo>,

    pub _ne: crate::NonExhaustive,
}

impl Default for ShaderModuleCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ShaderModuleCreateInfo {
    /// Returns a `ShaderModuleCreateInfo` with the specified `entry_points`.
    #[inline]
    pub fn entry_points(entry_points: impl IntoIterator<Item = EntryPointInfo>) -> Self {
        Self {
            entry_points: entry_points.into_iter().collect(),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let Self {
            entry_points,
            _ne: _,
        } = self;

        if entry_points.is_empty() {
            return Err(Box::new(ValidationError {
                context: "entry_points".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkShaderModuleCreateInfo-pCode-08737"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        for (index, entry_point) in entry_points.iter().enumerate() {
            entry_point
                .validate(device)
                .map_err(|err| err.add_context(format!("entry_points[{}]", index)))?;

            if entry_points[..index]
                .iter()
                .any(|other| other.name == entry_point.name && other.stage == entry_point.stage)
            {
                return Err(Box::new(ValidationError {
                    context: format!("entry_points[{}]", index).into(),
                    problem: "has the same name and stage as an earlier entry point".into(),
                    vuids: &["VUID-VkShaderModuleCreateInfo-pCode-08737"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// An entry point of a shader module.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    module: Arc<ShaderModule>,
    index: usize,
}

impl EntryPoint {
    /// Returns the module that the entry point belongs to.
    #[inline]
    pub fn module(&self) -> &Arc<ShaderModule> {
        &self.module
    }

    /// Returns the description of the entry point.
    #[inline]
    pub fn info(&self) -> &EntryPointInfo {
        &self.module.entry_points[self.index]
    }
}

/// The reflected description of an entry point.
#[derive(Clone, Debug)]
pub struct EntryPointInfo {
    /// The name of the entry point.
    pub name: String,

    /// The stage that the entry point executes in.
    pub stage: ShaderStage,

    /// The descriptors that the entry point statically uses, keyed by `(set, binding)`.
    pub descriptor_binding_requirements: HashMap<(u32, u32), DescriptorBindingRequirements>,

    /// The range of push constant bytes that the entry point statically reads, if any.
    ///
    /// The `stages` member of the range is ignored; it is always `stage`.
    pub push_constant_requirements: Option<PushConstantRange>,

    /// The vertex input locations that the entry point consumes. Only meaningful for the vertex
    /// stage.
    pub input_locations: Vec<u32>,

    /// The local workgroup size. Only meaningful for the compute stage.
    pub local_size: [u32; 3],

    /// The texel buffer fetches that the entry point performs, for the GPU-assisted checker.
    pub texel_accesses: Vec<TexelAccess>,

    pub _ne: crate::NonExhaustive,
}

impl EntryPointInfo {
    /// Returns an `EntryPointInfo` named `main` with the specified `stage`, and no requirements.
    #[inline]
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            name: "main".to_owned(),
            stage,
            descriptor_binding_requirements: HashMap::default(),
            push_constant_requirements: None,
            input_locations: Vec::new(),
            local_size: [1, 1, 1],
            texel_accesses: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref name,
            stage,
            ref descriptor_binding_requirements,
            ref push_constant_requirements,
            input_locations: _,
            local_size,
            ref texel_accesses,
            _ne: _,
        } = self;

        if name.is_empty() {
            return Err(Box::new(ValidationError {
                context: "name".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkPipelineShaderStageCreateInfo-pName-00707"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        stage.validate_device(device).map_err(|err| {
            err.add_context("stage")
                .set_vuids(&["VUID-VkPipelineShaderStageCreateInfo-stage-parameter"])
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if stage == ShaderStage::Compute && local_size.contains(&0) {
            return Err(Box::new(ValidationError {
                context: "local_size".into(),
                problem: "contains zero".into(),
                vuids: &["VUID-RuntimeSpirv-x-06429"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if let Some(range) = push_constant_requirements {
            if range.offset % 4 != 0 || range.size % 4 != 0 || range.size == 0 {
                return Err(Box::new(ValidationError {
                    context: "push_constant_requirements".into(),
                    problem: "`offset` and `size` are not multiples of 4, or `size` is zero"
                        .into(),
                    vuids: &["VUID-VkPushConstantRange-size-00297"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        for (access_index, access) in texel_accesses.iter().enumerate() {
            let requirements = descriptor_binding_requirements
                .get(&(access.set, access.binding))
                .ok_or_else(|| {
                    Box::new(ValidationError {
                        context: format!("texel_accesses[{}]", access_index).into(),
                        problem: "refers to a descriptor that is not in \
                            `descriptor_binding_requirements`"
                            .into(),
                        kind: Some(ViolationKind::InvalidParameter),
                        ..Default::default()
                    })
                })?;

            if !requirements.descriptor_types.iter().all(|ty| {
                matches!(
                    ty,
                    DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer
                )
            }) {
                return Err(Box::new(ValidationError {
                    context: format!("texel_accesses[{}]", access_index).into(),
                    problem: "refers to a descriptor that is not a texel buffer".into(),
                    kind: Some(ViolationKind::DescriptorTypeMismatch),
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

/// The requirements that an entry point imposes on a single descriptor binding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptorBindingRequirements {
    /// The descriptor types that are allowed.
    pub descriptor_types: Vec<DescriptorType>,

    /// The number of descriptors (array elements) that the shader requires. `None` means that the
    /// shader indexes the array at runtime, and the whole binding must be written.
    pub descriptor_count: Option<u32>,

    /// The image view type that the shader expects, if the descriptor is an image.
    pub image_view_type: Option<ImageViewType>,

    /// Whether the shader expects a multisampled image.
    pub image_multisampled: bool,

    /// The numeric type that the shader reads the image as, if any.
    pub image_scalar_type: Option<NumericType>,

    /// Whether the shader performs atomic operations on a storage image.
    pub storage_image_atomic: bool,

    /// Whether the shader performs atomic operations on a storage texel buffer.
    pub storage_texel_buffer_atomic: bool,

    /// Whether the sampler must not use unnormalized coordinates, because the shader samples with
    /// an instruction that doesn't allow them.
    pub sampler_no_unnormalized_coordinates: bool,
}

impl DescriptorBindingRequirements {
    /// Returns requirements that allow a single descriptor of type `descriptor_type`.
    #[inline]
    pub fn new(descriptor_type: DescriptorType) -> Self {
        Self {
            descriptor_types: vec![descriptor_type],
            descriptor_count: Some(1),
            ..Default::default()
        }
    }
}

/// A texel fetch from a texel buffer descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexelAccess {
    pub set: u32,
    pub binding: u32,

    /// The descriptor array element that is fetched from.
    pub array_element: u32,

    /// Which texel each invocation fetches.
    pub index: TexelIndex,

    /// The number of invocations that perform the fetch in each unit of work: each workgroup of
    /// a dispatch for the compute stage, each vertex of each instance for the vertex stage, and
    /// each instance of a draw for the other graphics stages.
    pub invocations: u32,
}

/// How the index of a texel fetch is computed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TexelIndex {
    /// Every invocation fetches the same texel.
    Constant(u32),

    /// The `i`th invocation of the command that performs the fetch fetches texel `base + i`,
    /// counting across all units of work.
    InvocationId { base: u32 },

    /// Every invocation fetches the texel whose index is the `u32` stored at `offset` bytes in
    /// the buffer that is bound to the descriptor `(set, binding)`.
    ///
    /// The value is read when the command executes.
    BufferValue { set: u32, binding: u32, offset: u32 },
}

vulkan_bitflags! {
    /// A set of shader stages.
    ShaderStages impl {
        /// Returns a `ShaderStages` with all graphics stages set.
        #[inline]
        pub const fn all_graphics() -> ShaderStages {
            ShaderStages::VERTEX
                .union(ShaderStages::TESSELLATION_CONTROL)
                .union(ShaderStages::TESSELLATION_EVALUATION)
                .union(ShaderStages::GEOMETRY)
                .union(ShaderStages::FRAGMENT)
        }
    }
    = ShaderStageFlags(u32);

    VERTEX = VERTEX,
    TESSELLATION_CONTROL = TESSELLATION_CONTROL,
    TESSELLATION_EVALUATION = TESSELLATION_EVALUATION,
    GEOMETRY = GEOMETRY,
    FRAGMENT = FRAGMENT,
    COMPUTE = COMPUTE,
}

vulkan_enum! {
    /// A single shader stage.
    ShaderStage = ShaderStageFlags(u32);

    Vertex = VERTEX,
    TessellationControl = TESSELLATION_CONTROL,
    TessellationEvaluation = TESSELLATION_EVALUATION,
    Geometry = GEOMETRY,
    Fragment = FRAGMENT,
    Compute = COMPUTE,
}

impl From<ShaderStage> for ShaderStages {
    #[inline]
    fn from(val: ShaderStage) -> Self {
        Self(val as u32)
    }
}

impl From<ShaderStages> for PipelineStages {
    #[inline]
    fn from(stages: ShaderStages) -> PipelineStages {
        let mut result = PipelineStages::empty();

        if stages.intersects(ShaderStages::VERTEX) {
            result |= PipelineStages::VERTEX_SHADER
        }

        if stages.intersects(ShaderStages::TESSELLATION_CONTROL) {
            result |= PipelineStages::TESSELLATION_CONTROL_SHADER
        }

        if stages.intersects(ShaderStages::TESSELLATION_EVALUATION) {
            result |= PipelineStages::TESSELLATION_EVALUATION_SHADER
        }

        if stages.intersects(ShaderStages::GEOMETRY) {
            result |= PipelineStages::GEOMETRY_SHADER
        }

        if stages.intersects(ShaderStages::FRAGMENT) {
            result |= PipelineStages::FRAGMENT_SHADER
        }

        if stages.intersects(ShaderStages::COMPUTE) {
            result |= PipelineStages::COMPUTE_SHADER
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DescriptorBindingRequirements, EntryPointInfo, ShaderModule, ShaderModuleCreateInfo,
        ShaderStage, ShaderStages, TexelAccess, TexelIndex,
    };
    use crate::{descriptor_set::layout::DescriptorType, sync::PipelineStages};

    #[test]
    fn entry_point_lookup() {
        let (device, _queue) = gfx_dev_and_queue!();
        let module = ShaderModule::new(
            device,
            ShaderModuleCreateInfo::entry_points([
                EntryPointInfo::new(ShaderStage::Vertex),
                EntryPointInfo::new(ShaderStage::Fragment),
            ]),
        )
        .unwrap();

        let fragment = module
            .entry_point("main", Some(ShaderStage::Fragment))
            .unwrap();
        assert_eq!(fragment.info().stage, ShaderStage::Fragment);
        assert_eq!(
            module.entry_point("main", None).unwrap().info().stage,
            ShaderStage::Vertex
        );
        assert!(module.entry_point("other", None).is_none());
    }

    #[test]
    fn empty_module() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = ShaderModule::new(device, Default::default()).unwrap_err();
        assert!(errors.contains_vuid("VUID-VkShaderModuleCreateInfo-pCode-08737"));
    }

    #[test]
    fn zero_local_size() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = ShaderModule::new(
            device,
            ShaderModuleCreateInfo::entry_points([EntryPointInfo {
                local_size: [64, 0, 1],
                ..EntryPointInfo::new(ShaderStage::Compute)
            }]),
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-RuntimeSpirv-x-06429"));
    }

    #[test]
    fn texel_access_needs_texel_buffer() {
        let (device, _queue) = gfx_dev_and_queue!();
        let mut info = EntryPointInfo::new(ShaderStage::Compute);
        info.descriptor_binding_requirements.insert(
            (0, 0),
            DescriptorBindingRequirements::new(DescriptorType::UniformBuffer),
        );
        info.texel_accesses.push(TexelAccess {
            set: 0,
            binding: 0,
            array_element: 0,
            index: TexelIndex::Constant(0),
            invocations: 1,
        });

        assert!(ShaderModule::new(device, ShaderModuleCreateInfo::entry_points([info])).is_err());
    }

    #[test]
    fn stage_conversions() {
        assert_eq!(
            ShaderStages::from(ShaderStage::Fragment),
            ShaderStages::FRAGMENT
        );
        assert!(ShaderStages::all_graphics().contains(ShaderStages::GEOMETRY));
        assert!(!ShaderStages::all_graphics().intersects(ShaderStages::COMPUTE));
        assert_eq!(
            PipelineStages::from(ShaderStages::VERTEX | ShaderStages::COMPUTE),
            PipelineStages::VERTEX_SHADER | PipelineStages::COMPUTE_SHADER
        );
    }
}
