// Copyright (c) 2022 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::CommandInfo;
use crate::{
    command_buffer::{state::QueryState, CommandBuffer, CommandBufferInner},
    device::{queue::QueueFlags, DeviceOwned},
    query::{QueryControlFlags, QueryPool, QueryType},
    sync::PipelineStages,
    ValidationError, ValidationErrors, ViolationKind, VulkanObject,
};
use std::{ops::Range, sync::Arc};

const BEGIN_QUERY: CommandInfo = command_info!(
    "vkCmdBeginQuery",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const BEGIN_QUERY_INDEXED: CommandInfo = command_info!(
    "vkCmdBeginQueryIndexedEXT",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const END_QUERY: CommandInfo = command_info!(
    "vkCmdEndQuery",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const END_QUERY_INDEXED: CommandInfo = command_info!(
    "vkCmdEndQueryIndexedEXT",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Any
);
const RESET_QUERY_POOL: CommandInfo = command_info!(
    "vkCmdResetQueryPool",
    QueueFlags::GRAPHICS.union(QueueFlags::COMPUTE),
    Outside
);
const WRITE_TIMESTAMP: CommandInfo = command_info!(
    "vkCmdWriteTimestamp",
    QueueFlags::TRANSFER
        .union(QueueFlags::GRAPHICS)
        .union(QueueFlags::COMPUTE),
    Any
);

struct BeginQueryVuids {
    query_pool: &'static [&'static str],
    query: &'static [&'static str],
    query_type: &'static [&'static str],
    occlusion_queue: &'static [&'static str],
    statistics_queue: &'static [&'static str],
    transform_feedback_queue: &'static [&'static str],
    transform_feedback_queries: &'static [&'static str],
    precise: &'static [&'static str],
    active: &'static [&'static str],
    multiview: &'static [&'static str],
}

const BEGIN_QUERY_VUIDS: BeginQueryVuids = BeginQueryVuids {
    query_pool: &["VUID-vkCmdBeginQuery-queryPool-parameter"],
    query: &["VUID-vkCmdBeginQuery-query-00802"],
    query_type: &["VUID-vkCmdBeginQuery-queryType-02804"],
    occlusion_queue: &["VUID-vkCmdBeginQuery-queryType-00803"],
    statistics_queue: &["VUID-vkCmdBeginQuery-queryType-00804"],
    transform_feedback_queue: &["VUID-vkCmdBeginQuery-queryType-02327"],
    transform_feedback_queries: &["VUID-vkCmdBeginQuery-queryType-02328"],
    precise: &["VUID-vkCmdBeginQuery-queryType-00800"],
    active: &["VUID-vkCmdBeginQuery-queryPool-01922"],
    multiview: &["VUID-vkCmdBeginQuery-query-00808"],
};

const BEGIN_QUERY_INDEXED_VUIDS: BeginQueryVuids = BeginQueryVuids {
    query_pool: &["VUID-vkCmdBeginQueryIndexedEXT-queryPool-parameter"],
    query: &["VUID-vkCmdBeginQueryIndexedEXT-query-00802"],
    query_type: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-02804"],
    occlusion_queue: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-00803"],
    statistics_queue: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-00804"],
    transform_feedback_queue: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-02338"],
    transform_feedback_queries: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-02341"],
    precise: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-00800"],
    active: &["VUID-vkCmdBeginQueryIndexedEXT-queryPool-04753"],
    multiview: &["VUID-vkCmdBeginQueryIndexedEXT-query-00808"],
};

struct EndQueryVuids {
    query_pool: &'static [&'static str],
    query: &'static [&'static str],
    active: &'static [&'static str],
    subpass: &'static [&'static str],
}

const END_QUERY_VUIDS: EndQueryVuids = EndQueryVuids {
    query_pool: &["VUID-vkCmdEndQuery-queryPool-parameter"],
    query: &["VUID-vkCmdEndQuery-query-00810"],
    active: &["VUID-vkCmdEndQuery-None-01923"],
    subpass: &["VUID-vkCmdEndQuery-None-07007"],
};

const END_QUERY_INDEXED_VUIDS: EndQueryVuids = EndQueryVuids {
    query_pool: &["VUID-vkCmdEndQueryIndexedEXT-queryPool-parameter"],
    query: &["VUID-vkCmdEndQueryIndexedEXT-query-02343"],
    active: &["VUID-vkCmdEndQueryIndexedEXT-None-02342"],
    subpass: &["VUID-vkCmdEndQueryIndexedEXT-None-07007"],
};

/// # Commands related to queries.
impl CommandBuffer {
    /// Begins a query.
    ///
    /// The query is active until [`end_query`](Self::end_query) is called for the same query.
    /// Only one query of each query type can be active at a time. A query begun inside a render
    /// pass instance must be ended inside the same subpass.
    pub fn begin_query(
        &self,
        query_pool: &Arc<QueryPool>,
        query: u32,
        flags: QueryControlFlags,
    ) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_QUERY, |inner, errors| {
            self.begin_query_common(inner, errors, query_pool, query, 0, flags, &BEGIN_QUERY_VUIDS);
        })
    }

    /// Begins a query on the vertex stream `index`.
    ///
    /// `index` can only be nonzero for transform feedback stream queries.
    pub fn begin_query_indexed(
        &self,
        query_pool: &Arc<QueryPool>,
        query: u32,
        index: u32,
        flags: QueryControlFlags,
    ) -> Result<(), ValidationErrors> {
        self.record(&BEGIN_QUERY_INDEXED, |inner, errors| {
            if query_pool.query_type() == QueryType::TransformFeedbackStream {
                let max_streams = self.device().properties().max_transform_feedback_streams;

                if index >= max_streams {
                    errors.push(Box::new(ValidationError {
                        context: "index".into(),
                        problem: format!(
                            "is not less than the `max_transform_feedback_streams` limit ({})",
                            max_streams,
                        )
                        .into(),
                        vuids: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-02339"],
                        kind: Some(ViolationKind::LimitExceeded),
                        ..Default::default()
                    }));
                }
            } else if index != 0 {
                errors.push(Box::new(ValidationError {
                    problem: "`query_pool.query_type()` is not \
                        `QueryType::TransformFeedbackStream`, but `index` is not 0"
                        .into(),
                    vuids: &["VUID-vkCmdBeginQueryIndexedEXT-queryType-06692"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            self.begin_query_common(
                inner,
                errors,
                query_pool,
                query,
                index,
                flags,
                &BEGIN_QUERY_INDEXED_VUIDS,
            );
        })
    }

    /// Ends an active query.
    pub fn end_query(&self, query_pool: &Arc<QueryPool>, query: u32) -> Result<(), ValidationErrors> {
        self.record(&END_QUERY, |inner, errors| {
            end_query_common(inner, errors, query_pool, query, None, &END_QUERY_VUIDS);
        })
    }

    /// Ends an active query that was begun with
    /// [`begin_query_indexed`](Self::begin_query_indexed).
    pub fn end_query_indexed(
        &self,
        query_pool: &Arc<QueryPool>,
        query: u32,
        index: u32,
    ) -> Result<(), ValidationErrors> {
        self.record(&END_QUERY_INDEXED, |inner, errors| {
            end_query_common(
                inner,
                errors,
                query_pool,
                query,
                Some(index),
                &END_QUERY_INDEXED_VUIDS,
            );
        })
    }

    /// Resets a range of queries of a query pool, so that they can be begun again.
    pub fn reset_query_pool(
        &self,
        query_pool: &Arc<QueryPool>,
        queries: Range<u32>,
    ) -> Result<(), ValidationErrors> {
        self.record(&RESET_QUERY_POOL, |inner, errors| {
            if !errors.check(validate_query_pool_alive(
                self,
                query_pool,
                &["VUID-vkCmdResetQueryPool-queryPool-parameter"],
            )) {
                return;
            }

            if queries.start >= query_pool.query_count() {
                errors.push(Box::new(ValidationError {
                    context: "queries.start".into(),
                    problem: "is not less than `query_pool.query_count()`".into(),
                    vuids: &["VUID-vkCmdResetQueryPool-firstQuery-09436"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            } else if queries.end > query_pool.query_count() || queries.end < queries.start {
                errors.push(Box::new(ValidationError {
                    context: "queries.end".into(),
                    problem: "is greater than `query_pool.query_count()`, or less than \
                        `queries.start`"
                        .into(),
                    vuids: &["VUID-vkCmdResetQueryPool-firstQuery-09437"],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            let active = inner.builder_state.queries.values().find(|state| {
                Arc::ptr_eq(&state.query_pool, query_pool) && queries.contains(&state.query)
            });

            if let Some(state) = active {
                errors.push(Box::new(ValidationError {
                    context: "queries".into(),
                    problem: format!("contains query {}, which is currently active", state.query)
                        .into(),
                    vuids: &["VUID-vkCmdResetQueryPool-None-02841"],
                    kind: Some(ViolationKind::QueryScopeViolation),
                    ..Default::default()
                }));
            }

            inner.add_resource(query_pool);
        })
    }

    /// Writes a timestamp to a timestamp query, once all previous commands have completed
    /// `stage`.
    pub fn write_timestamp(
        &self,
        query_pool: &Arc<QueryPool>,
        query: u32,
        stage: PipelineStages,
    ) -> Result<(), ValidationErrors> {
        let queue_flags = self.pool().queue_flags();

        self.record(&WRITE_TIMESTAMP, |inner, errors| {
            if !errors.check(validate_query_pool_alive(
                self,
                query_pool,
                &["VUID-vkCmdWriteTimestamp-queryPool-parameter"],
            )) {
                return;
            }

            if stage.count() != 1 {
                errors.push(Box::new(ValidationError {
                    context: "stage".into(),
                    problem: "does not contain exactly one stage".into(),
                    vuids: &["VUID-vkCmdWriteTimestamp-pipelineStage-parameter"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            } else if !PipelineStages::supported_by(queue_flags).contains(stage) {
                errors.push(Box::new(ValidationError {
                    context: "stage".into(),
                    problem: "is not supported by the queue family of the command buffer".into(),
                    vuids: &["VUID-vkCmdWriteTimestamp-pipelineStage-04074"],
                    kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                    ..Default::default()
                }));
            }

            if query_pool.query_type() != QueryType::Timestamp {
                errors.push(Box::new(ValidationError {
                    context: "query_pool.query_type()".into(),
                    problem: "is not `QueryType::Timestamp`".into(),
                    vuids: &["VUID-vkCmdWriteTimestamp-queryPool-01416"],
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }

            let view_count = multiview_view_count(inner);

            if query + view_count.max(1) > query_pool.query_count() {
                errors.push(Box::new(ValidationError {
                    problem: "`query` plus the number of views of the current subpass is \
                        greater than `query_pool.query_count()`"
                        .into(),
                    vuids: &[
                        "VUID-vkCmdWriteTimestamp-query-04904",
                        "VUID-vkCmdWriteTimestamp-query-00831",
                    ],
                    kind: Some(ViolationKind::RegionOutOfBounds),
                    ..Default::default()
                }));
            }

            inner.add_resource(query_pool);
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn begin_query_common(
        &self,
        inner: &mut CommandBufferInner,
        errors: &mut ValidationErrors,
        query_pool: &Arc<QueryPool>,
        query: u32,
        index: u32,
        flags: QueryControlFlags,
        vuids: &BeginQueryVuids,
    ) {
        if !errors.check(validate_query_pool_alive(self, query_pool, vuids.query_pool)) {
            return;
        }

        let device = self.device();
        let queue_flags = self.pool().queue_flags();
        let query_type = query_pool.query_type();

        if query >= query_pool.query_count() {
            errors.push(Box::new(ValidationError {
                context: "query".into(),
                problem: "is not less than `query_pool.query_count()`".into(),
                vuids: vuids.query,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        match query_type {
            QueryType::Occlusion => {
                if !queue_flags.intersects(QueueFlags::GRAPHICS) {
                    errors.push(Box::new(ValidationError {
                        problem: "`query_pool.query_type()` is `QueryType::Occlusion`, but the \
                            queue family of the command buffer does not support graphics \
                            operations"
                            .into(),
                        vuids: vuids.occlusion_queue,
                        kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                        ..Default::default()
                    }));
                }
            }
            QueryType::PipelineStatistics => {
                if !query_pool
                    .pipeline_statistics()
                    .required_queue_flags()
                    .is_supported_by(queue_flags)
                {
                    errors.push(Box::new(ValidationError {
                        problem: "`query_pool.pipeline_statistics()` contains statistics that \
                            the queue family of the command buffer does not support"
                            .into(),
                        vuids: vuids.statistics_queue,
                        kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                        ..Default::default()
                    }));
                }
            }
            QueryType::TransformFeedbackStream => {
                if !queue_flags.intersects(QueueFlags::GRAPHICS) {
                    errors.push(Box::new(ValidationError {
                        problem: "`query_pool.query_type()` is \
                            `QueryType::TransformFeedbackStream`, but the queue family of the \
                            command buffer does not support graphics operations"
                            .into(),
                        vuids: vuids.transform_feedback_queue,
                        kind: Some(ViolationKind::QueueFamilyCapabilityViolation),
                        ..Default::default()
                    }));
                }

                if !device.properties().transform_feedback_queries {
                    errors.push(Box::new(ValidationError {
                        problem: "`query_pool.query_type()` is \
                            `QueryType::TransformFeedbackStream`, but the \
                            `transform_feedback_queries` property is `false`"
                            .into(),
                        vuids: vuids.transform_feedback_queries,
                        kind: Some(ViolationKind::FeatureNotEnabled),
                        ..Default::default()
                    }));
                }
            }
            QueryType::Timestamp => {
                errors.push(Box::new(ValidationError {
                    context: "query_pool.query_type()".into(),
                    problem: "is `QueryType::Timestamp`, which cannot be begun".into(),
                    vuids: vuids.query_type,
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        if flags.intersects(QueryControlFlags::PRECISE) {
            errors.check(flags.validate_device(device).map_err(|err| {
                err.add_context("flags")
                    .set_vuids(vuids.precise)
                    .set_kind(ViolationKind::FeatureNotEnabled)
            }));

            if query_type != QueryType::Occlusion {
                errors.push(Box::new(ValidationError {
                    problem: "`flags` contains `QueryControlFlags::PRECISE`, but \
                        `query_pool.query_type()` is not `QueryType::Occlusion`"
                        .into(),
                    vuids: vuids.precise,
                    kind: Some(ViolationKind::InvalidParameter),
                    ..Default::default()
                }));
            }
        }

        if inner.builder_state.queries.contains_key(&query_type) {
            errors.push(Box::new(ValidationError {
                problem: format!(
                    "a query of type {:?} is already active in the command buffer",
                    query_type,
                )
                .into(),
                vuids: vuids.active,
                kind: Some(ViolationKind::QueryScopeViolation),
                ..Default::default()
            }));

            return;
        }

        let view_count = multiview_view_count(inner);

        if view_count != 0 && query + view_count > query_pool.query_count() {
            errors.push(Box::new(ValidationError {
                problem: "a multiview render pass instance is active, and `query` plus the \
                    number of views in the current subpass is greater than \
                    `query_pool.query_count()`"
                    .into(),
                vuids: vuids.multiview,
                kind: Some(ViolationKind::RegionOutOfBounds),
                ..Default::default()
            }));
        }

        let in_subpass = inner
            .builder_state
            .render_pass
            .as_ref()
            .map(|state| state.subpass_index());

        inner.builder_state.queries.insert(
            query_type,
            QueryState {
                query_pool: query_pool.clone(),
                query,
                index,
                flags,
                in_subpass,
            },
        );
        inner.add_resource(query_pool);

        tracing::trace!(
            command_buffer = %self.handle(),
            query_pool = %query_pool.handle(),
            query,
            ?query_type,
            "query begun",
        );
    }
}

fn end_query_common(
    inner: &mut CommandBufferInner,
    errors: &mut ValidationErrors,
    query_pool: &Arc<QueryPool>,
    query: u32,
    index: Option<u32>,
    vuids: &EndQueryVuids,
) {
    if !query_pool.device().registry().is_alive(query_pool.handle()) {
        errors.push(Box::new(ValidationError {
            context: "query_pool".into(),
            problem: "has been destroyed".into(),
            vuids: vuids.query_pool,
            kind: Some(ViolationKind::DestroyedObjectUsed),
            ..Default::default()
        }));

        return;
    }

    if query >= query_pool.query_count() {
        errors.push(Box::new(ValidationError {
            context: "query".into(),
            problem: "is not less than `query_pool.query_count()`".into(),
            vuids: vuids.query,
            kind: Some(ViolationKind::RegionOutOfBounds),
            ..Default::default()
        }));
    }

    let query_type = query_pool.query_type();
    let is_active = inner
        .builder_state
        .queries
        .get(&query_type)
        .is_some_and(|state| {
            Arc::ptr_eq(&state.query_pool, query_pool)
                && state.query == query
                && index.map_or(true, |index| state.index == index)
        });

    if !is_active {
        errors.push(Box::new(ValidationError {
            problem: "the query identified by `query_pool` and `query` is not active".into(),
            vuids: vuids.active,
            kind: Some(ViolationKind::QueryScopeViolation),
            ..Default::default()
        }));

        return;
    }

    let current_subpass = inner
        .builder_state
        .render_pass
        .as_ref()
        .map(|state| state.subpass_index());

    if let Some(state) = inner.builder_state.queries.get(&query_type) {
        if state.in_subpass != current_subpass {
            errors.push(Box::new(ValidationError {
                problem: match state.in_subpass {
                    Some(subpass) => format!(
                        "the query was begun in subpass {} of a render pass instance, but is \
                        not ended in the same subpass",
                        subpass,
                    )
                    .into(),
                    None => "the query was begun outside a render pass instance, but is ended \
                        inside one"
                        .into(),
                },
                vuids: vuids.subpass,
                kind: Some(ViolationKind::QueryScopeViolation),
                ..Default::default()
            }));
        }
    }

    // The query is ended regardless, so that a misplaced end doesn't cascade.
    inner.builder_state.queries.remove(&query_type);
}

fn validate_query_pool_alive(
    command_buffer: &CommandBuffer,
    query_pool: &QueryPool,
    vuids: &'static [&'static str],
) -> Result<(), Box<ValidationError>> {
    if !command_buffer
        .device()
        .registry()
        .is_alive(query_pool.handle())
    {
        return Err(Box::new(ValidationError {
            context: "query_pool".into(),
            problem: "has been destroyed".into(),
            vuids,
            kind: Some(ViolationKind::DestroyedObjectUsed),
            ..Default::default()
        }));
    }

    Ok(())
}

/// Returns the number of views of the current subpass, or 0 if no multiview render pass instance
/// is active.
fn multiview_view_count(inner: &CommandBufferInner) -> u32 {
    inner
        .builder_state
        .render_pass
        .as_ref()
        .map_or(0, |state| state.rendering_info.view_mask.count_ones())
}

#[cfg(test)]
mod tests {
    use crate::{
        command_buffer::{
            pool::CommandPoolCreateFlags, CommandBufferLevel, RenderPassBeginInfo,
            SubpassContents,
        },
        device::DeviceFeatures,
        format::Format,
        query::{QueryControlFlags, QueryPool, QueryPoolCreateInfo, QueryType},
        sync::PipelineStages,
        ViolationKind,
    };

    fn query_pool(
        device: &std::sync::Arc<crate::device::Device>,
        query_type: QueryType,
    ) -> std::sync::Arc<QueryPool> {
        QueryPool::new(
            device.clone(),
            QueryPoolCreateInfo {
                query_count: 4,
                ..QueryPoolCreateInfo::query_type(query_type)
            },
        )
        .unwrap()
    }

    #[test]
    fn begin_end() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.begin_query(&pool, 0, QueryControlFlags::PRECISE).unwrap();
        cb.end_query(&pool, 0).unwrap();
        cb.reset_query_pool(&pool, 0..4).unwrap();
        cb.end().unwrap();
    }

    #[test]
    fn already_active() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.begin_query(&pool, 0, QueryControlFlags::empty()).unwrap();
        let errors = cb
            .begin_query(&pool, 1, QueryControlFlags::empty())
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginQuery-queryPool-01922"));
        assert!(errors.contains_kind(ViolationKind::QueryScopeViolation));

        let errors = cb.reset_query_pool(&pool, 0..2).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdResetQueryPool-None-02841"));
    }

    #[test]
    fn end_not_active() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb.end_query(&pool, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdEndQuery-None-01923"));
    }

    #[test]
    fn precise_requires_feature() {
        let (device, _queue) = gfx_dev_and_queue!(DeviceFeatures::empty());
        let pool = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .begin_query(&pool, 0, QueryControlFlags::PRECISE)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginQuery-queryType-00800"));
        assert!(errors.contains_kind(ViolationKind::FeatureNotEnabled));
    }

    #[test]
    fn query_out_of_range() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .begin_query(&pool, 4, QueryControlFlags::empty())
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginQuery-query-00802"));
    }

    #[test]
    fn occlusion_on_compute_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let command_pool = crate::tests::command_pool(&device, 1, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&command_pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        let errors = cb
            .begin_query(&pool, 0, QueryControlFlags::empty())
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginQuery-queryType-00803"));
        assert!(errors.contains_kind(ViolationKind::QueueFamilyCapabilityViolation));
    }

    #[test]
    fn end_in_other_subpass_scope() {
        let (device, _queue) = gfx_dev_and_queue!();
        let pool = query_pool(&device, QueryType::Occlusion);
        let render_pass = crate::tests::single_color_render_pass(&device, Format::R8G8B8A8_UNORM, 0);
        let framebuffer = crate::tests::framebuffer(&render_pass, 1);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.begin_query(&pool, 0, QueryControlFlags::empty()).unwrap();
        cb.begin_render_pass(
            RenderPassBeginInfo::framebuffer(framebuffer),
            SubpassContents::Inline,
        )
        .unwrap();

        let errors = cb.end_query(&pool, 0).unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdEndQuery-None-07007"));
    }

    #[test]
    fn write_timestamp() {
        let (device, _queue) = gfx_dev_and_queue!();
        let timestamps = query_pool(&device, QueryType::Timestamp);
        let occlusion = query_pool(&device, QueryType::Occlusion);
        let cb = crate::tests::primary(&device);
        cb.begin(Default::default()).unwrap();

        cb.write_timestamp(&timestamps, 0, PipelineStages::BOTTOM_OF_PIPE)
            .unwrap();

        let errors = cb
            .write_timestamp(&occlusion, 0, PipelineStages::BOTTOM_OF_PIPE)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdWriteTimestamp-queryPool-01416"));

        let errors = cb
            .begin_query(&timestamps, 0, QueryControlFlags::empty())
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdBeginQuery-queryType-02804"));
    }

    #[test]
    fn timestamp_stage_on_transfer_queue() {
        let (device, _queue) = gfx_dev_and_queue!();
        let timestamps = query_pool(&device, QueryType::Timestamp);
        let command_pool = crate::tests::command_pool(&device, 2, CommandPoolCreateFlags::empty());
        let cb = crate::tests::command_buffer(&command_pool, CommandBufferLevel::Primary);
        cb.begin(Default::default()).unwrap();

        cb.write_timestamp(&timestamps, 0, PipelineStages::TRANSFER)
            .unwrap();

        let errors = cb
            .write_timestamp(&timestamps, 1, PipelineStages::FRAGMENT_SHADER)
            .unwrap_err();
        assert!(errors.contains_vuid("VUID-vkCmdWriteTimestamp-pipelineStage-04074"));
    }
}
