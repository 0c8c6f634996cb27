//! Drain and release after the loop.

use stowage_ir::prelude::*;

use super::alloc::BufferPlan;
use crate::error::Result;

/// Emit, right after `for_op`, a full drain followed by one dealloc per
/// buffer in allocation order.
pub fn emit_epilogue(func: &mut Function, for_op: OpId, plan: BufferPlan) -> Result<()> {
    let mut b = Builder::after(func, for_op);
    b.async_store_wait(0)?;
    for buffer in plan.buffers() {
        b.local_dealloc(buffer)?;
    }
    tracing::debug!(loop_op = %for_op, buffers = plan.len(), "emitted drain and deallocs");
    Ok(())
}
