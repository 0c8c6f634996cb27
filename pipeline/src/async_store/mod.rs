//! Asynchronous store pipelining for a single loop.
//!
//! Every `descriptor_store`, `descriptor_reduce` and `descriptor_scatter`
//! directly in the loop body (not in nested loops) becomes
//!
//! ```text
//! async_store_wait {pendings = 0}    // previous copy out of the buffer is done
//! local_store %src, %buffer          // stage the tile in shared memory
//! fence_async_shared {cluster = false}
//! async_copy_local_to_global ...     // copy engine takes it from here
//! ```
//!
//! Stores with the same tile shape and element type share a buffer. After
//! the loop everything is drained and the buffers are freed.
//!
//! # Phases
//!
//! - [`collect`] - find the stores
//! - [`alloc`] - one staging buffer per tile type, allocated before the loop
//! - [`rewrite`] - replace each store with the staged protocol
//! - [`epilogue`] - drain and dealloc after the loop
//! - [`descriptor`] - request descriptor multi-buffering for device-side descriptors

pub mod alloc;
pub mod collect;
pub mod descriptor;
pub mod epilogue;
pub mod rewrite;

pub use alloc::{BufferKey, BufferPlan, allocate_buffers};
pub use collect::{StoreKind, StoreRecord, collect_stores};
pub use descriptor::{CoarseSchedule, DescriptorLowering, needs_descriptor_lowering, trigger_descriptor_lowering};
pub use epilogue::emit_epilogue;
pub use rewrite::rewrite_store;

use stowage_ir::prelude::*;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{NotALoopSnafu, Result};

/// Pipeline the stores of `for_op`. Returns `false`, leaving the function
/// untouched, if the loop body has no store to pipeline.
#[tracing::instrument(skip_all, fields(loop_op = %for_op))]
pub fn pipeline_async_stores(
    func: &mut Function,
    for_op: OpId,
    config: &PipelineConfig,
    lowering: &mut dyn DescriptorLowering,
) -> Result<bool> {
    let Op::For { body, .. } = *func.op(for_op) else {
        return NotALoopSnafu { op: for_op }.fail();
    };

    let records = collect_stores(func, body);
    if records.is_empty() {
        return Ok(false);
    }

    let device_side = needs_descriptor_lowering(func, &records);
    let stores = records.len();
    let (assignments, plan) = allocate_buffers(func, for_op, records)?;
    debug!(stores, buffers = plan.len(), device_side, "assigned staging buffers");

    for (record, buffer) in assignments {
        rewrite_store(func, record, buffer)?;
    }
    emit_epilogue(func, for_op, plan)?;

    if device_side {
        trigger_descriptor_lowering(func, for_op, config.descriptor_stages, lowering)?;
    }
    Ok(true)
}
