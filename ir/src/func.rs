//! Function arena: ops, values and blocks addressed by stable ids.
//!
//! Ids are never reused. Erasing an op detaches it from its block and marks
//! it dead; the id stays valid for lookups that check [`Function::is_live`],
//! which is what lets passes hold ids across a rewrite without dangling.

use std::fmt;

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::*;
use crate::op::Op;
use crate::types::Type;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                debug_assert!(index <= u32::MAX as usize, concat!(stringify!($name), " arena overflow"));
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Operation handle.
    OpId,
    "op#"
);
arena_id!(
    /// SSA value handle.
    ValueId,
    "%"
);
arena_id!(
    /// Block handle.
    BlockId,
    "^bb"
);

/// Where an SSA value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// Kernel parameter, supplied by the host.
    Param(usize),
    /// Block argument (loop induction variable).
    BlockArg { block: BlockId, index: usize },
    /// Result of an op.
    OpResult { op: OpId, index: usize },
}

#[derive(Debug, Clone)]
struct ValueData {
    ty: Type,
    def: ValueDef,
}

#[derive(Debug, Clone)]
struct OpData {
    op: Op,
    results: SmallVec<[ValueId; 1]>,
    parent: Option<BlockId>,
    erased: bool,
}

#[derive(Debug, Clone, Default)]
struct BlockData {
    args: SmallVec<[ValueId; 1]>,
    ops: Vec<OpId>,
    parent_op: Option<OpId>,
}

/// Control for [`Function::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    /// Continue into the op's regions, then to its next sibling.
    Advance,
    /// Do not visit the op's regions.
    Skip,
}

/// Where a new op goes relative to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    Before(OpId),
    After(OpId),
    Start(BlockId),
    End(BlockId),
}

/// A kernel: parameters plus a tree of blocks.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    ops: Vec<OpData>,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    params: Vec<ValueId>,
    entry: BlockId,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut func = Self {
            name: name.into(),
            ops: Vec::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            params: Vec::new(),
            entry: BlockId(0),
        };
        func.entry = func.new_block();
        func
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    /// Append a kernel parameter.
    pub fn add_param(&mut self, ty: Type) -> ValueId {
        let value = self.new_value(ty, ValueDef::Param(self.params.len()));
        self.params.push(value);
        value
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn op(&self, op: OpId) -> &Op {
        &self.ops[op.index()].op
    }

    pub fn results(&self, op: OpId) -> &[ValueId] {
        &self.ops[op.index()].results
    }

    /// First result, for single-result ops.
    pub fn result(&self, op: OpId) -> Option<ValueId> {
        self.results(op).first().copied()
    }

    pub fn is_live(&self, op: OpId) -> bool {
        !self.ops[op.index()].erased
    }

    pub fn parent_block(&self, op: OpId) -> Option<BlockId> {
        self.ops[op.index()].parent
    }

    pub fn parent_op(&self, block: BlockId) -> Option<OpId> {
        self.blocks[block.index()].parent_op
    }

    pub fn block_ops(&self, block: BlockId) -> &[OpId] {
        &self.blocks[block.index()].ops
    }

    pub fn block_args(&self, block: BlockId) -> &[ValueId] {
        &self.blocks[block.index()].args
    }

    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.values[value.index()].ty
    }

    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.values[value.index()].def
    }

    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.value_def(value) {
            ValueDef::OpResult { op, .. } => Some(op),
            _ => None,
        }
    }

    /// Block in which a value becomes visible.
    pub fn value_block(&self, value: ValueId) -> Option<BlockId> {
        match self.value_def(value) {
            ValueDef::Param(_) => Some(self.entry),
            ValueDef::BlockArg { block, .. } => Some(block),
            ValueDef::OpResult { op, .. } => self.parent_block(op),
        }
    }

    /// A descriptor passed in as a kernel parameter was encoded by the host.
    /// Anything built by an op was materialized on the device.
    pub fn is_host_side_descriptor(&self, value: ValueId) -> bool {
        matches!(self.value_def(value), ValueDef::Param(_))
    }

    /// Number of live ops, over all blocks.
    pub fn num_live_ops(&self) -> usize {
        self.ops.iter().filter(|data| !data.erased).count()
    }

    /// Whether `op` sits (transitively) inside one of `ancestor`'s regions.
    pub fn is_proper_ancestor(&self, ancestor: OpId, op: OpId) -> bool {
        let mut current = op;
        while let Some(parent) = self.parent_block(current).and_then(|block| self.parent_op(block)) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Whether `value` is defined inside one of `ancestor`'s regions.
    pub fn is_defined_inside(&self, value: ValueId, ancestor: OpId) -> bool {
        match self.value_def(value) {
            ValueDef::Param(_) => false,
            ValueDef::BlockArg { block, .. } => {
                self.parent_op(block).is_some_and(|op| op == ancestor || self.is_proper_ancestor(ancestor, op))
            }
            ValueDef::OpResult { op, .. } => self.is_proper_ancestor(ancestor, op),
        }
    }

    /// Live ops that read `value`.
    pub fn users(&self, value: ValueId) -> Vec<OpId> {
        self.live_ops().filter(|&op| self.op(op).operands().contains(&value)).collect()
    }

    fn live_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops.iter().enumerate().filter(|(_, data)| !data.erased).map(|(index, _)| OpId::from_index(index))
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Pre-order walk of `block`. Returning [`WalkResult::Skip`] for an op
    /// prevents descending into its regions.
    pub fn walk(&self, block: BlockId, f: &mut impl FnMut(OpId, &Op) -> WalkResult) {
        for &op in self.block_ops(block) {
            if f(op, self.op(op)) == WalkResult::Skip {
                continue;
            }
            for region in self.op(op).regions() {
                self.walk(region, f);
            }
        }
    }

    /// All `for` ops under `block`, innermost before their parents.
    pub fn loops_post_order(&self, block: BlockId) -> Vec<OpId> {
        fn visit(func: &Function, block: BlockId, out: &mut Vec<OpId>) {
            for &op in func.block_ops(block) {
                for region in func.op(op).regions() {
                    visit(func, region, out);
                }
                if func.op(op).is_loop() {
                    out.push(op);
                }
            }
        }

        let mut out = Vec::new();
        visit(self, block, &mut out);
        out
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub(crate) fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(BlockData::default());
        id
    }

    pub(crate) fn add_block_arg(&mut self, block: BlockId, ty: Type) -> ValueId {
        let index = self.blocks[block.index()].args.len();
        let value = self.new_value(ty, ValueDef::BlockArg { block, index });
        self.blocks[block.index()].args.push(value);
        value
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(ValueData { ty, def });
        id
    }

    /// Create `op` with the given result types and link it at `position`.
    pub(crate) fn insert(&mut self, position: InsertPoint, op: Op, result_types: Vec<Type>) -> Result<OpId> {
        let (block, index) = self.resolve(position)?;
        let id = OpId::from_index(self.ops.len());
        for region in op.regions() {
            self.blocks[region.index()].parent_op = Some(id);
        }
        self.ops.push(OpData { op, results: SmallVec::new(), parent: Some(block), erased: false });
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::OpResult { op: id, index }))
            .collect();
        self.ops[id.index()].results = results;
        self.blocks[block.index()].ops.insert(index, id);
        Ok(id)
    }

    fn resolve(&self, position: InsertPoint) -> Result<(BlockId, usize)> {
        let anchor_slot = |anchor: OpId| -> Result<(BlockId, usize)> {
            ensure!(self.is_live(anchor), ErasedOpSnafu { op: anchor });
            let block = self.parent_block(anchor).ok_or(Error::DetachedOp { op: anchor })?;
            let index =
                self.block_ops(block).iter().position(|&op| op == anchor).ok_or(Error::DetachedOp { op: anchor })?;
            Ok((block, index))
        };

        match position {
            InsertPoint::Before(anchor) => anchor_slot(anchor),
            InsertPoint::After(anchor) => anchor_slot(anchor).map(|(block, index)| (block, index + 1)),
            InsertPoint::Start(block) => Ok((block, 0)),
            InsertPoint::End(block) => Ok((block, self.block_ops(block).len())),
        }
    }

    /// Physically remove an op (and everything nested in it).
    ///
    /// Fails if any result is still read by a live op outside the erased subtree.
    pub fn erase_op(&mut self, op: OpId) -> Result<()> {
        ensure!(self.is_live(op), ErasedOpSnafu { op });
        let uses: usize = self
            .results(op)
            .iter()
            .map(|&value| self.users(value).into_iter().filter(|&user| !self.is_proper_ancestor(op, user)).count())
            .sum();
        ensure!(uses == 0, OpHasUsesSnafu { op, uses });

        if let Some(block) = self.parent_block(op) {
            self.blocks[block.index()].ops.retain(|&other| other != op);
        }
        self.mark_erased(op);
        tracing::trace!(%op, "erased op");
        Ok(())
    }

    fn mark_erased(&mut self, op: OpId) {
        for region in self.op(op).regions() {
            for nested in std::mem::take(&mut self.blocks[region.index()].ops) {
                self.mark_erased(nested);
            }
        }
        let data = &mut self.ops[op.index()];
        data.erased = true;
        data.parent = None;
    }

    /// Redirect every live use of `old` to `new`. Returns the number of
    /// operands rewritten.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) -> usize {
        let mut replaced = 0;
        for data in self.ops.iter_mut().filter(|data| !data.erased) {
            data.op.for_each_operand_mut(|operand| {
                if *operand == old {
                    *operand = new;
                    replaced += 1;
                }
            });
        }
        replaced
    }
}
