// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Gather information about rendering, held in query pools.
//!
//! In Vulkan, queries are not created individually. Instead you manipulate **query pools**, which
//! represent a collection of queries. Whenever you use a query, you have to specify both the query
//! pool and the slot id within that query pool.
//!
//! Queries are begun and ended with commands of a command buffer. A query that is begun must be
//! ended in the same command buffer, and in the same subpass if it was begun inside a render pass
//! instance.

use crate::{
    device::{queue::QueueFlags, Device, DeviceOwned},
    macros::{vulkan_bitflags, vulkan_enum},
    registry::ObjectType,
    Handle, ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::Arc,
};

/// A collection of one or more queries of a particular type.
pub struct QueryPool {
    device: Arc<Device>,
    handle: Handle,

    query_type: QueryType,
    query_count: u32,
    pipeline_statistics: QueryPipelineStatisticFlags,
}

impl QueryPool {
    /// Creates a new `QueryPool`.
    pub fn new(
        device: Arc<Device>,
        create_info: QueryPoolCreateInfo,
    ) -> Result<Arc<QueryPool>, ValidationErrors> {
        device.report_one(Self::validate_new(&device, &create_info))?;

        Ok(Self::new_unchecked(device, create_info))
    }

    fn validate_new(
        device: &Device,
        create_info: &QueryPoolCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(device)
            .map_err(|err| err.add_context("create_info"))
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub fn new_unchecked(device: Arc<Device>, create_info: QueryPoolCreateInfo) -> Arc<QueryPool> {
        let QueryPoolCreateInfo {
            query_type,
            query_count,
            pipeline_statistics,
            _ne: _,
        } = create_info;

        Arc::new(QueryPool {
            handle: device.registry().register(ObjectType::QueryPool, None),
            device,
            query_type,
            query_count,
            pipeline_statistics,
        })
    }

    /// Returns the query type of the pool.
    #[inline]
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Returns the number of query slots of this query pool.
    #[inline]
    pub fn query_count(&self) -> u32 {
        self.query_count
    }

    /// Returns the pipeline statistics that queries of the pool count, if the query type is
    /// `PipelineStatistics`.
    #[inline]
    pub fn pipeline_statistics(&self) -> QueryPipelineStatisticFlags {
        self.pipeline_statistics
    }
}

impl Drop for QueryPool {
    #[inline]
    fn drop(&mut self) {
        self.device.registry().unregister(self.handle);
    }
}

impl VulkanObject for QueryPool {
    #[inline]
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl DeviceOwned for QueryPool {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Debug for QueryPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("QueryPool")
            .field("handle", &self.handle)
            .field("query_type", &self.query_type)
            .field("query_count", &self.query_count)
            .field("pipeline_statistics", &self.pipeline_statistics)
            .finish()
    }
}

/// Parameters to create a new `QueryPool`.
#[derive(Clone, Debug)]
pub struct QueryPoolCreateInfo {
    /// The type of query that the pool should be for.
    ///
    /// There is no default value.
    pub query_type: QueryType,

    /// The number of queries to create in the pool.
    ///
    /// The default value is `0`, which must be overridden.
    pub query_count: u32,

    /// If `query_type` is [`QueryType::PipelineStatistics`], the statistics to query.
    ///
    /// For any other value of `query_type`, this must be empty.
    ///
    /// The default value is empty.
    pub pipeline_statistics: QueryPipelineStatisticFlags,

    pub _ne: crate::NonExhaustive,
}

impl QueryPoolCreateInfo {
    /// Returns a `QueryPoolCreateInfo` with the specified `query_type`.
    #[inline]
    pub fn query_type(query_type: QueryType) -> Self {
        Self {
            query_type,
            query_count: 0,
            pipeline_statistics: QueryPipelineStatisticFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            query_type,
            query_count,
            pipeline_statistics,
            _ne: _,
        } = self;

        query_type.validate_device(device).map_err(|err| {
            err.add_context("query_type")
                .set_vuids(match query_type {
                    QueryType::PipelineStatistics => {
                        &["VUID-VkQueryPoolCreateInfo-queryType-00791"]
                    }
                    _ => &["VUID-VkQueryPoolCreateInfo-queryType-02800"],
                })
                .set_kind(ViolationKind::FeatureNotEnabled)
        })?;

        if query_count == 0 {
            return Err(Box::new(ValidationError {
                context: "query_count".into(),
                problem: "is 0".into(),
                vuids: &["VUID-VkQueryPoolCreateInfo-queryCount-02763"],
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        if query_type == QueryType::PipelineStatistics {
            if pipeline_statistics.is_empty() {
                return Err(Box::new(ValidationError {
                    problem: "`query_type` is `QueryType::PipelineStatistics`, but \
                        `pipeline_statistics` is empty"
                        .into(),
                    vuids: &["VUID-VkQueryPoolCreateInfo-queryType-09534"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        } else if !pipeline_statistics.is_empty() {
            return Err(Box::new(ValidationError {
                problem: "`query_type` is not `QueryType::PipelineStatistics`, but \
                    `pipeline_statistics` is not empty"
                    .into(),
                kind: Some(ViolationKind::InvalidParameter),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

vulkan_enum! {
    /// The type of query that a query pool should perform.
    QueryType = QueryType(i32);

    /// Tracks the number of samples that pass per-fragment tests (e.g. the depth test).
    Occlusion = OCCLUSION,

    /// Tracks statistics on pipeline invocations and their input data.
    PipelineStatistics = PIPELINE_STATISTICS
    RequiresFeature(pipeline_statistics_query),

    /// Writes timestamps at chosen points in a command buffer.
    Timestamp = TIMESTAMP,

    /// Queries the number of primitives written to, and needed by, a transform feedback stream.
    TransformFeedbackStream = TRANSFORM_FEEDBACK_STREAM_EXT
    RequiresFeature(transform_feedback),
}

vulkan_bitflags! {
    /// Flags that control how a query is executed.
    QueryControlFlags = QueryControlFlags(u32);

    /// For occlusion queries, specifies that the result must reflect the exact number of
    /// tests passed. If not enabled, the query may return a result of 1 even if more fragments
    /// passed the test.
    PRECISE = PRECISE
    RequiresFeature(occlusion_query_precise),
}

vulkan_bitflags! {
    /// For pipeline statistics queries, the statistics that should be gathered.
    QueryPipelineStatisticFlags impl {
        /// Returns the queue capabilities that at least one of are needed to count the
        /// statistics in `self`.
        pub(crate) fn required_queue_flags(self) -> QueryPipelineStatisticQueueFlags {
            QueryPipelineStatisticQueueFlags {
                graphics: self.intersects(
                    QueryPipelineStatisticFlags::all()
                        - QueryPipelineStatisticFlags::COMPUTE_SHADER_INVOCATIONS,
                ),
                compute: self.intersects(QueryPipelineStatisticFlags::COMPUTE_SHADER_INVOCATIONS),
            }
        }
    }
    = QueryPipelineStatisticFlags(u32);

    INPUT_ASSEMBLY_VERTICES = INPUT_ASSEMBLY_VERTICES,
    INPUT_ASSEMBLY_PRIMITIVES = INPUT_ASSEMBLY_PRIMITIVES,
    VERTEX_SHADER_INVOCATIONS = VERTEX_SHADER_INVOCATIONS,
    GEOMETRY_SHADER_INVOCATIONS = GEOMETRY_SHADER_INVOCATIONS,
    GEOMETRY_SHADER_PRIMITIVES = GEOMETRY_SHADER_PRIMITIVES,
    CLIPPING_INVOCATIONS = CLIPPING_INVOCATIONS,
    CLIPPING_PRIMITIVES = CLIPPING_PRIMITIVES,
    FRAGMENT_SHADER_INVOCATIONS = FRAGMENT_SHADER_INVOCATIONS,
    TESSELLATION_CONTROL_SHADER_PATCHES = TESSELLATION_CONTROL_SHADER_PATCHES,
    TESSELLATION_EVALUATION_SHADER_INVOCATIONS = TESSELLATION_EVALUATION_SHADER_INVOCATIONS,
    COMPUTE_SHADER_INVOCATIONS = COMPUTE_SHADER_INVOCATIONS,
}

/// Which queue capabilities the statistics of a pipeline statistics query need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct QueryPipelineStatisticQueueFlags {
    pub(crate) graphics: bool,
    pub(crate) compute: bool,
}

impl QueryPipelineStatisticQueueFlags {
    pub(crate) fn is_supported_by(self, queue_flags: QueueFlags) -> bool {
        (!self.graphics || queue_flags.intersects(QueueFlags::GRAPHICS))
            && (!self.compute || queue_flags.intersects(QueueFlags::COMPUTE))
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryPipelineStatisticFlags, QueryPool, QueryPoolCreateInfo, QueryType};
    use crate::device::{queue::QueueFlags, DeviceFeatures};

    #[test]
    fn query_pool_create() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = QueryPool::new(
            device,
            QueryPoolCreateInfo {
                query_count: 256,
                ..QueryPoolCreateInfo::query_type(QueryType::Occlusion)
            },
        )
        .unwrap();
        assert_eq!(pool.query_count(), 256);
    }

    #[test]
    fn zero_query_count() {
        let (device, _queue) = gfx_dev_and_queue!();
        let errors = QueryPool::new(
            device,
            QueryPoolCreateInfo::query_type(QueryType::Occlusion),
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkQueryPoolCreateInfo-queryCount-02763"));
    }

    #[test]
    fn pipeline_statistics_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let errors = QueryPool::new(
            device,
            QueryPoolCreateInfo {
                query_count: 1,
                pipeline_statistics: QueryPipelineStatisticFlags::CLIPPING_INVOCATIONS,
                ..QueryPoolCreateInfo::query_type(QueryType::PipelineStatistics)
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkQueryPoolCreateInfo-queryType-00791"));
    }

    #[test]
    fn transform_feedback_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let errors = QueryPool::new(
            device,
            QueryPoolCreateInfo {
                query_count: 1,
                ..QueryPoolCreateInfo::query_type(QueryType::TransformFeedbackStream)
            },
        )
        .unwrap_err();
        assert!(errors.contains_vuid("VUID-VkQueryPoolCreateInfo-queryType-02800"));
    }

    #[test]
    fn statistic_queue_flags() {
        let flags = QueryPipelineStatisticFlags::COMPUTE_SHADER_INVOCATIONS.required_queue_flags();
        assert!(flags.is_supported_by(QueueFlags::COMPUTE));
        assert!(!flags.is_supported_by(QueueFlags::GRAPHICS));

        let flags = QueryPipelineStatisticFlags::CLIPPING_PRIMITIVES.required_queue_flags();
        assert!(flags.is_supported_by(QueueFlags::GRAPHICS));
        assert!(!flags.is_supported_by(QueueFlags::COMPUTE | QueueFlags::TRANSFER));
    }
}
