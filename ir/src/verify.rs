//! Structural verifier.
//!
//! Checks that every reachable op is live and listed once, and that every
//! operand is a live value that dominates its use: defined earlier in the same
//! block or in an enclosing block.

use std::collections::HashSet;

use snafu::ensure;

use crate::error::*;
use crate::func::{BlockId, Function, OpId, ValueDef, ValueId};

pub fn verify(func: &Function) -> Result<()> {
    let mut seen = HashSet::new();
    let mut visible = HashSet::new();
    visible.extend(func.params().iter().copied());
    verify_block(func, func.entry(), &mut visible, &mut seen)
}

fn verify_block(
    func: &Function,
    block: BlockId,
    visible: &mut HashSet<ValueId>,
    seen: &mut HashSet<OpId>,
) -> Result<()> {
    // Values defined in this block are popped again on exit.
    let mut scoped: Vec<ValueId> = func.block_args(block).to_vec();
    visible.extend(scoped.iter().copied());

    for &op in func.block_ops(block) {
        ensure!(seen.insert(op), DuplicateOpSnafu { op });
        ensure!(func.is_live(op), ErasedOpSnafu { op });
        ensure!(func.parent_block(op) == Some(block), DetachedOpSnafu { op });

        for value in func.op(op).operands() {
            check_operand(func, op, value, visible)?;
        }
        for region in func.op(op).regions() {
            verify_block(func, region, visible, seen)?;
        }

        let results = func.results(op);
        visible.extend(results.iter().copied());
        scoped.extend(results.iter().copied());
    }

    for value in scoped {
        visible.remove(&value);
    }
    Ok(())
}

fn check_operand(func: &Function, op: OpId, value: ValueId, visible: &HashSet<ValueId>) -> Result<()> {
    if visible.contains(&value) {
        return Ok(());
    }
    if let ValueDef::OpResult { op: def, .. } = func.value_def(value) {
        ensure!(func.is_live(def), ErasedValueSnafu { value });
        if func.parent_block(def) == func.parent_block(op) {
            return UseBeforeDefSnafu { op, value }.fail();
        }
    }
    NotDominatingSnafu { op, value }.fail()
}
