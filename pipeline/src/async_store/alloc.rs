//! Staging buffer allocation.
//!
//! Stores that write tiles of the same shape and element type share one
//! shared-memory buffer. The wait at the head of every rewritten store makes
//! the reuse safe: no store stages into a buffer while a copy out of it may
//! still be running.

use std::collections::HashMap;

use stowage_ir::prelude::*;
use stowage_ir::types::Shape;

use super::collect::StoreRecord;
use crate::encoding::encoding_from_descriptor;
use crate::error::Result;

/// Structural identity of a staging buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferKey {
    pub shape: Shape,
    pub dtype: DType,
}

impl BufferKey {
    pub fn of(ty: &TensorType) -> Self {
        Self { shape: ty.shape.clone(), dtype: ty.dtype.clone() }
    }
}

/// Buffers created for one loop, in creation order.
#[derive(Debug, Default)]
pub struct BufferPlan {
    buffers: Vec<(BufferKey, ValueId)>,
    by_key: HashMap<BufferKey, usize>,
}

impl BufferPlan {
    pub fn get(&self, key: &BufferKey) -> Option<ValueId> {
        self.by_key.get(key).map(|&slot| self.buffers[slot].1)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffers in the order they were allocated.
    pub fn buffers(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.buffers.iter().map(|(_, buffer)| *buffer)
    }

    fn insert(&mut self, key: BufferKey, buffer: ValueId) {
        self.by_key.insert(key.clone(), self.buffers.len());
        self.buffers.push((key, buffer));
    }
}

/// Assign every record a staging buffer, allocating missing ones right
/// before `for_op`.
pub fn allocate_buffers(
    func: &mut Function,
    for_op: OpId,
    records: Vec<StoreRecord>,
) -> Result<(Vec<(StoreRecord, ValueId)>, BufferPlan)> {
    let mut plan = BufferPlan::default();
    let mut assignments = Vec::with_capacity(records.len());

    for record in records {
        let src_ty = tensor_type(func, record.src)?;
        let key = BufferKey::of(&src_ty);
        let buffer = match plan.get(&key) {
            Some(buffer) => {
                tracing::debug!(store = %record.op, %buffer, "reusing staging buffer");
                buffer
            }
            None => {
                let desc_ty = descriptor_type(func, record.desc)?;
                let ty = MemDescType {
                    shape: src_ty.shape.clone(),
                    dtype: src_ty.dtype.clone(),
                    encoding: encoding_from_descriptor(&src_ty, &desc_ty),
                    space: AddrSpace::Shared,
                    mutable: true,
                };
                let buffer = Builder::before(func, for_op).local_alloc(ty)?;
                tracing::debug!(store = %record.op, %buffer, ty = %func.value_type(buffer), "allocated staging buffer");
                plan.insert(key, buffer);
                buffer
            }
        };
        assignments.push((record, buffer));
    }

    Ok((assignments, plan))
}

pub(super) fn tensor_type(func: &Function, value: ValueId) -> stowage_ir::Result<TensorType> {
    let ty = func.value_type(value);
    ty.as_tensor().cloned().ok_or_else(|| stowage_ir::Error::UnexpectedType {
        op: "local_alloc",
        value,
        expected: "tensor",
        found: ty.kind(),
    })
}

pub(super) fn descriptor_type(func: &Function, value: ValueId) -> stowage_ir::Result<DescriptorType> {
    let ty = func.value_type(value);
    ty.as_descriptor().cloned().ok_or_else(|| stowage_ir::Error::UnexpectedType {
        op: "local_alloc",
        value,
        expected: "descriptor",
        found: ty.kind(),
    })
}
