//! Operation enum and implementation.
//!
//! The [`Op`] enum defines every operation of the tile IR. Operands are
//! [`ValueId`]s into the owning [`Function`](crate::Function); region-carrying
//! ops reference their blocks by [`BlockId`]. Result types live on the values,
//! not on the op.

use smallvec::SmallVec;

use crate::func::{BlockId, ValueId};
use crate::types::{BinaryOp, ConstValue, ReduceKind};

pub type Operands = SmallVec<[ValueId; 4]>;

/// Operation type with typed operands.
///
/// - Descriptor ops move tiles between registers and global memory
///   synchronously (`DescriptorStore`, `DescriptorReduce`, `DescriptorScatter`
///   are the store-like ones).
/// - Local ops manage shared-memory buffers.
/// - Async ops are executed by the copy engine and tracked by
///   `AsyncStoreWait`.
#[derive(Debug, Clone, PartialEq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Op {
    // Scalars and tiles
    Const(ConstValue),
    Binary(BinaryOp, ValueId, ValueId),
    Splat {
        value: ValueId,
    },

    // Control flow
    For {
        lower: ValueId,
        upper: ValueId,
        step: ValueId,
        body: BlockId,
    },
    If {
        condition: ValueId,
        then_block: BlockId,
    },

    // Descriptors and synchronous global memory access
    MakeDescriptor {
        base: ValueId,
        shape: Operands,
        strides: Operands,
    },
    DescriptorLoad {
        desc: ValueId,
        indices: Operands,
    },
    DescriptorStore {
        desc: ValueId,
        src: ValueId,
        indices: Operands,
    },
    DescriptorReduce {
        kind: ReduceKind,
        desc: ValueId,
        src: ValueId,
        indices: Operands,
    },
    DescriptorScatter {
        desc: ValueId,
        src: ValueId,
        x_offsets: ValueId,
        y_offset: ValueId,
    },

    // Shared memory
    LocalAlloc,
    LocalStore {
        src: ValueId,
        dst: ValueId,
    },
    LocalDealloc {
        buffer: ValueId,
    },
    FenceAsyncShared {
        cluster: bool,
    },

    // Copy engine
    AsyncCopyLocalToGlobal {
        desc: ValueId,
        indices: Operands,
        src: ValueId,
    },
    AsyncReduce {
        kind: ReduceKind,
        desc: ValueId,
        indices: Operands,
        src: ValueId,
    },
    AsyncScatter {
        desc: ValueId,
        x_offsets: ValueId,
        y_offset: ValueId,
        src: ValueId,
    },
    AsyncStoreWait {
        pendings: u32,
    },

    // Device-side descriptor materialization
    GlobalScratchAlloc {
        nbytes: usize,
        alignment: usize,
    },
    TensormapCreate {
        scratch: ValueId,
        slot: ValueId,
        base: ValueId,
        shape: Operands,
        strides: Operands,
    },
    TensormapFenceAcquire {
        scratch: ValueId,
        slot: ValueId,
    },
    ReinterpretDescriptor {
        scratch: ValueId,
        slot: ValueId,
    },
}

impl Op {
    /// All value operands in a stable order.
    pub fn operands(&self) -> Operands {
        let mut out = Operands::new();
        match self {
            Op::Const(_) | Op::LocalAlloc | Op::FenceAsyncShared { .. } | Op::AsyncStoreWait { .. } => {}
            Op::GlobalScratchAlloc { .. } => {}
            Op::Binary(_, lhs, rhs) => out.extend([*lhs, *rhs]),
            Op::Splat { value } => out.push(*value),
            Op::For { lower, upper, step, .. } => out.extend([*lower, *upper, *step]),
            Op::If { condition, .. } => out.push(*condition),
            Op::MakeDescriptor { base, shape, strides } => {
                out.push(*base);
                out.extend(shape.iter().copied());
                out.extend(strides.iter().copied());
            }
            Op::DescriptorLoad { desc, indices } => {
                out.push(*desc);
                out.extend(indices.iter().copied());
            }
            Op::DescriptorStore { desc, src, indices } | Op::DescriptorReduce { desc, src, indices, .. } => {
                out.extend([*desc, *src]);
                out.extend(indices.iter().copied());
            }
            Op::DescriptorScatter { desc, src, x_offsets, y_offset } => {
                out.extend([*desc, *src, *x_offsets, *y_offset]);
            }
            Op::LocalStore { src, dst } => out.extend([*src, *dst]),
            Op::LocalDealloc { buffer } => out.push(*buffer),
            Op::AsyncCopyLocalToGlobal { desc, indices, src } | Op::AsyncReduce { desc, indices, src, .. } => {
                out.push(*desc);
                out.extend(indices.iter().copied());
                out.push(*src);
            }
            Op::AsyncScatter { desc, x_offsets, y_offset, src } => {
                out.extend([*desc, *x_offsets, *y_offset, *src]);
            }
            Op::TensormapCreate { scratch, slot, base, shape, strides } => {
                out.extend([*scratch, *slot, *base]);
                out.extend(shape.iter().copied());
                out.extend(strides.iter().copied());
            }
            Op::TensormapFenceAcquire { scratch, slot } | Op::ReinterpretDescriptor { scratch, slot } => {
                out.extend([*scratch, *slot]);
            }
        }
        out
    }

    /// Visit every operand mutably, in the same order as [`Op::operands`].
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Op::Const(_) | Op::LocalAlloc | Op::FenceAsyncShared { .. } | Op::AsyncStoreWait { .. } => {}
            Op::GlobalScratchAlloc { .. } => {}
            Op::Binary(_, lhs, rhs) => {
                f(lhs);
                f(rhs);
            }
            Op::Splat { value } => f(value),
            Op::For { lower, upper, step, .. } => {
                f(lower);
                f(upper);
                f(step);
            }
            Op::If { condition, .. } => f(condition),
            Op::MakeDescriptor { base, shape, strides } => {
                f(base);
                shape.iter_mut().for_each(&mut f);
                strides.iter_mut().for_each(&mut f);
            }
            Op::DescriptorLoad { desc, indices } => {
                f(desc);
                indices.iter_mut().for_each(&mut f);
            }
            Op::DescriptorStore { desc, src, indices } | Op::DescriptorReduce { desc, src, indices, .. } => {
                f(desc);
                f(src);
                indices.iter_mut().for_each(&mut f);
            }
            Op::DescriptorScatter { desc, src, x_offsets, y_offset } => {
                f(desc);
                f(src);
                f(x_offsets);
                f(y_offset);
            }
            Op::LocalStore { src, dst } => {
                f(src);
                f(dst);
            }
            Op::LocalDealloc { buffer } => f(buffer),
            Op::AsyncCopyLocalToGlobal { desc, indices, src } | Op::AsyncReduce { desc, indices, src, .. } => {
                f(desc);
                indices.iter_mut().for_each(&mut f);
                f(src);
            }
            Op::AsyncScatter { desc, x_offsets, y_offset, src } => {
                f(desc);
                f(x_offsets);
                f(y_offset);
                f(src);
            }
            Op::TensormapCreate { scratch, slot, base, shape, strides } => {
                f(scratch);
                f(slot);
                f(base);
                shape.iter_mut().for_each(&mut f);
                strides.iter_mut().for_each(&mut f);
            }
            Op::TensormapFenceAcquire { scratch, slot } | Op::ReinterpretDescriptor { scratch, slot } => {
                f(scratch);
                f(slot);
            }
        }
    }

    /// Blocks owned by this op, outermost first.
    pub fn regions(&self) -> SmallVec<[BlockId; 1]> {
        match self {
            Op::For { body, .. } => SmallVec::from_elem(*body, 1),
            Op::If { then_block, .. } => SmallVec::from_elem(*then_block, 1),
            _ => SmallVec::new(),
        }
    }

    /// Synchronous writes of a register tile to global memory through a descriptor.
    pub fn is_descriptor_store_like(&self) -> bool {
        matches!(self, Op::DescriptorStore { .. } | Op::DescriptorReduce { .. } | Op::DescriptorScatter { .. })
    }

    /// Transfers issued to the copy engine.
    pub fn is_async_store(&self) -> bool {
        matches!(self, Op::AsyncCopyLocalToGlobal { .. } | Op::AsyncReduce { .. } | Op::AsyncScatter { .. })
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Op::For { .. })
    }
}
