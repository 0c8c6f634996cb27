//! Ring-buffered device-side descriptors.
//!
//! Each `make_descriptor` in a loop body gets a global scratch area holding
//! `stages` descriptor slots. Iteration `i` writes slot `i % stages`, so a
//! copy still in flight from an earlier iteration keeps reading an intact
//! descriptor as long as at most `stages - 1` iterations overlap.

use stowage_ir::op::Operands;
use stowage_ir::prelude::*;

use crate::async_store::{CoarseSchedule, DescriptorLowering};
use crate::error::{NotALoopSnafu, Result};

/// Bytes of one encoded descriptor.
pub const DESCRIPTOR_BYTES: usize = 128;
/// Required alignment of a descriptor in global memory.
pub const DESCRIPTOR_ALIGN: usize = 128;

/// Default [`DescriptorLowering`]: scratch ring plus in-loop re-encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingDescriptorLowering;

struct Candidate {
    op: OpId,
    result: ValueId,
    base: ValueId,
    shape: Operands,
    strides: Operands,
}

fn candidates(func: &Function, body: BlockId) -> Vec<Candidate> {
    let mut found = Vec::new();
    func.walk(body, &mut |id, op| match op {
        Op::For { .. } => WalkResult::Skip,
        Op::MakeDescriptor { base, shape, strides } => {
            if let Some(result) = func.result(id) {
                found.push(Candidate { op: id, result, base: *base, shape: shape.clone(), strides: strides.clone() });
            }
            WalkResult::Advance
        }
        _ => WalkResult::Advance,
    });
    found
}

impl DescriptorLowering for RingDescriptorLowering {
    #[tracing::instrument(skip_all, fields(loop_op = %for_op, stages = schedule.num_stages()))]
    fn lower(&mut self, func: &mut Function, for_op: OpId, schedule: &CoarseSchedule) -> Result<usize> {
        let Op::For { lower, step, body, .. } = *func.op(for_op) else {
            return NotALoopSnafu { op: for_op }.fail();
        };
        let Some(&iv) = func.block_args(body).first() else {
            return NotALoopSnafu { op: for_op }.fail();
        };
        let stages = schedule.num_stages().max(1);

        let found = candidates(func, body);
        for candidate in &found {
            let scratch =
                Builder::before(func, for_op).global_scratch_alloc(stages * DESCRIPTOR_BYTES, DESCRIPTOR_ALIGN)?;

            let ty = func.value_type(candidate.result).as_descriptor().cloned().ok_or_else(|| {
                stowage_ir::Error::UnexpectedType {
                    op: "reinterpret_descriptor",
                    value: candidate.result,
                    expected: "descriptor",
                    found: func.value_type(candidate.result).kind(),
                }
            })?;

            let mut b = Builder::before(func, candidate.op);
            let offset = b.binary(BinaryOp::Sub, iv, lower)?;
            let iteration = b.binary(BinaryOp::Div, offset, step)?;
            let depth = b.const_index(stages as i64)?;
            let slot = b.binary(BinaryOp::Rem, iteration, depth)?;
            b.tensormap_create(scratch, slot, candidate.base, &candidate.shape, &candidate.strides)?;
            b.tensormap_fence_acquire(scratch, slot)?;
            let desc = b.reinterpret_descriptor(scratch, slot, ty)?;

            let uses = func.replace_all_uses_with(candidate.result, desc);
            func.erase_op(candidate.op)?;
            tracing::debug!(descriptor = %candidate.result, %desc, %scratch, uses, "moved descriptor into ring");
        }
        Ok(found.len())
    }
}
