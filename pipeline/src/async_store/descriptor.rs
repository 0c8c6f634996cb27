//! Hand-off to descriptor multi-buffering.
//!
//! A descriptor built on the device is rewritten in place every iteration.
//! Once its stores are asynchronous, a copy from iteration `i` may still be
//! reading the descriptor when iteration `i + 1` rebuilds it, so loops with
//! device-side descriptors get a ring of descriptor slots.

use snafu::ResultExt;
use stowage_ir::prelude::*;

use super::collect::StoreRecord;
use crate::error::{DescriptorLoweringSnafu, Result};

/// Stage assignment covering the whole loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarseSchedule {
    num_stages: usize,
}

impl CoarseSchedule {
    pub fn new(num_stages: usize) -> Self {
        Self { num_stages }
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }
}

/// Multi-buffers the device-side descriptors of a loop.
pub trait DescriptorLowering {
    /// Lower the descriptors created in `for_op` so that `schedule.num_stages()`
    /// of them can be live at once. Returns how many were lowered.
    fn lower(&mut self, func: &mut Function, for_op: OpId, schedule: &CoarseSchedule) -> Result<usize>;
}

/// Whether any store writes through a descriptor the device built.
pub fn needs_descriptor_lowering(func: &Function, records: &[StoreRecord]) -> bool {
    records.iter().any(|record| !func.is_host_side_descriptor(record.desc))
}

/// Run `lowering` on `for_op` with a coarse schedule of `stages` stages.
pub fn trigger_descriptor_lowering(
    func: &mut Function,
    for_op: OpId,
    stages: usize,
    lowering: &mut dyn DescriptorLowering,
) -> Result<usize> {
    let schedule = CoarseSchedule::new(stages);
    let lowered = lowering
        .lower(func, for_op, &schedule)
        .map_err(Box::new)
        .context(DescriptorLoweringSnafu { op: for_op })?;
    tracing::debug!(loop_op = %for_op, stages, lowered, "multi-buffered device-side descriptors");
    Ok(lowered)
}
