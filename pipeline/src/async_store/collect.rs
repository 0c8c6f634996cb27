//! Discovery of store-like ops in a loop body.

use stowage_ir::op::Operands;
use stowage_ir::prelude::*;

/// Variant-specific operands of a store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreKind {
    /// `descriptor_store`: overwrite the block at `indices`.
    Plain { indices: Operands },
    /// `descriptor_reduce`: combine into the block at `indices`.
    Reduce { kind: ReduceKind, indices: Operands },
    /// `descriptor_scatter`: write row `i` to row `x_offsets[i]`, column `y_offset`.
    Scatter { x_offsets: ValueId, y_offset: ValueId },
}

/// One store found in a loop body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub op: OpId,
    pub desc: ValueId,
    pub src: ValueId,
    pub kind: StoreKind,
}

impl StoreRecord {
    /// # Panics
    ///
    /// If `op` is not store-like.
    pub fn from_op(id: OpId, op: &Op) -> Self {
        match op {
            Op::DescriptorStore { desc, src, indices } => {
                Self { op: id, desc: *desc, src: *src, kind: StoreKind::Plain { indices: indices.clone() } }
            }
            Op::DescriptorReduce { kind, desc, src, indices } => Self {
                op: id,
                desc: *desc,
                src: *src,
                kind: StoreKind::Reduce { kind: *kind, indices: indices.clone() },
            },
            Op::DescriptorScatter { desc, src, x_offsets, y_offset } => Self {
                op: id,
                desc: *desc,
                src: *src,
                kind: StoreKind::Scatter { x_offsets: *x_offsets, y_offset: *y_offset },
            },
            other => unreachable!("{} is not a descriptor store", other.as_ref()),
        }
    }
}

/// Store-like ops of `body` in program order.
///
/// Nested loops are skipped entirely, their stores belong to the nested
/// loop's own pipeline. Other regions (`if`) are searched.
pub fn collect_stores(func: &Function, body: BlockId) -> Vec<StoreRecord> {
    let mut records = Vec::new();
    func.walk(body, &mut |id, op| {
        if op.is_loop() {
            return WalkResult::Skip;
        }
        if op.is_descriptor_store_like() {
            records.push(StoreRecord::from_op(id, op));
        }
        WalkResult::Advance
    });
    tracing::debug!(body = %body, stores = records.len(), "collected stores");
    records
}
