//! Op construction at an insertion point.
//!
//! Every constructor validates operand types before inserting anything, so a
//! failed build leaves no op behind. Consecutive inserts through one
//! builder land in program order.

use snafu::ensure;
use stowage_dtype::{AddrSpace, DType};

use crate::error::*;
use crate::func::{BlockId, Function, OpId, ValueId};
use crate::op::{Op, Operands};
use crate::types::{BinaryOp, ConstValue, DescriptorType, MemDescType, ReduceKind, TensorType, Type};

pub use crate::func::InsertPoint;

pub struct Builder<'f> {
    func: &'f mut Function,
    point: InsertPoint,
}

impl<'f> Builder<'f> {
    pub fn new(func: &'f mut Function, point: InsertPoint) -> Self {
        Self { func, point }
    }

    pub fn at_end(func: &'f mut Function, block: BlockId) -> Self {
        Self::new(func, InsertPoint::End(block))
    }

    pub fn before(func: &'f mut Function, op: OpId) -> Self {
        Self::new(func, InsertPoint::Before(op))
    }

    pub fn after(func: &'f mut Function, op: OpId) -> Self {
        Self::new(func, InsertPoint::After(op))
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn point(&self) -> InsertPoint {
        self.point
    }

    pub fn set_point(&mut self, point: InsertPoint) {
        self.point = point;
    }

    fn insert(&mut self, op: Op, result_types: Vec<Type>) -> Result<OpId> {
        tracing::trace!(op = op.as_ref(), point = ?self.point, "insert");
        let id = self.func.insert(self.point, op, result_types)?;
        if matches!(self.point, InsertPoint::After(_) | InsertPoint::Start(_)) {
            self.point = InsertPoint::After(id);
        }
        Ok(id)
    }

    fn insert_value(&mut self, op: Op, ty: Type) -> Result<ValueId> {
        let id = self.insert(op, vec![ty])?;
        Ok(self.func.results(id)[0])
    }

    // =========================================================================
    // Operand checks
    // =========================================================================

    fn ty(&self, value: ValueId) -> Result<&Type> {
        if let Some(op) = self.func.defining_op(value) {
            ensure!(self.func.is_live(op), ErasedValueSnafu { value });
        }
        Ok(self.func.value_type(value))
    }

    fn tensor(&self, op: &'static str, value: ValueId) -> Result<TensorType> {
        let ty = self.ty(value)?;
        ty.as_tensor()
            .cloned()
            .ok_or(Error::UnexpectedType { op, value, expected: "tensor", found: ty.kind() })
    }

    fn descriptor(&self, op: &'static str, value: ValueId) -> Result<DescriptorType> {
        let ty = self.ty(value)?;
        ty.as_descriptor()
            .cloned()
            .ok_or(Error::UnexpectedType { op, value, expected: "descriptor", found: ty.kind() })
    }

    fn memdesc(&self, op: &'static str, value: ValueId) -> Result<MemDescType> {
        let ty = self.ty(value)?;
        ty.as_memdesc()
            .cloned()
            .ok_or(Error::UnexpectedType { op, value, expected: "memdesc", found: ty.kind() })
    }

    fn scalar(&self, op: &'static str, value: ValueId) -> Result<DType> {
        let ty = self.ty(value)?;
        ty.as_scalar()
            .cloned()
            .ok_or(Error::UnexpectedType { op, value, expected: "scalar", found: ty.kind() })
    }

    fn index(&self, op: &'static str, value: ValueId) -> Result<()> {
        ensure!(self.ty(value)?.is_index_like(), ExpectedIndexSnafu { op, value });
        Ok(())
    }

    fn coordinates(&self, op: &'static str, desc: &DescriptorType, indices: &[ValueId]) -> Result<Operands> {
        ensure!(
            indices.len() == desc.block.rank(),
            CoordinateCountSnafu { op, expected: desc.block.rank(), actual: indices.len() }
        );
        for &index in indices {
            self.index(op, index)?;
        }
        Ok(indices.iter().copied().collect())
    }

    fn same_tile(op: &'static str, lhs: &TensorType, rhs: &TensorType) -> Result<()> {
        ensure!(lhs.dtype == rhs.dtype, DTypeMismatchSnafu { op, lhs: lhs.dtype.clone(), rhs: rhs.dtype.clone() });
        ensure!(lhs.shape == rhs.shape, ShapeMismatchSnafu { op, lhs: lhs.shape.clone(), rhs: rhs.shape.clone() });
        Ok(())
    }

    // =========================================================================
    // Scalars and tiles
    // =========================================================================

    pub fn constant(&mut self, value: ConstValue, dtype: DType) -> Result<ValueId> {
        self.insert_value(Op::Const(value), Type::Scalar(dtype))
    }

    pub fn const_index(&mut self, value: i64) -> Result<ValueId> {
        self.constant(ConstValue::Int(value), DType::Index)
    }

    pub fn const_i32(&mut self, value: i32) -> Result<ValueId> {
        self.constant(ConstValue::Int(value.into()), DType::Int32)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        let lhs_ty = self.scalar("binary", lhs)?;
        let rhs_ty = self.scalar("binary", rhs)?;
        ensure!(lhs_ty == rhs_ty, DTypeMismatchSnafu { op: "binary", lhs: lhs_ty, rhs: rhs_ty });
        self.insert_value(Op::Binary(op, lhs, rhs), Type::Scalar(lhs_ty))
    }

    pub fn splat(&mut self, value: ValueId, ty: TensorType) -> Result<ValueId> {
        let dtype = self.scalar("splat", value)?;
        ensure!(dtype == ty.dtype, DTypeMismatchSnafu { op: "splat", lhs: dtype, rhs: ty.dtype.clone() });
        self.insert_value(Op::Splat { value }, Type::Tensor(ty))
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    /// Build `for iv = lower to upper step step`. Returns the loop op, its
    /// body block and the induction variable.
    pub fn for_loop(&mut self, lower: ValueId, upper: ValueId, step: ValueId) -> Result<(OpId, BlockId, ValueId)> {
        for bound in [lower, upper, step] {
            self.index("for", bound)?;
        }
        let body = self.func.new_block();
        let iv = self.func.add_block_arg(body, Type::INDEX);
        let op = self.insert(Op::For { lower, upper, step, body }, Vec::new())?;
        Ok((op, body, iv))
    }

    pub fn if_then(&mut self, condition: ValueId) -> Result<(OpId, BlockId)> {
        let dtype = self.scalar("if", condition)?;
        ensure!(
            dtype == DType::Bool,
            UnexpectedTypeSnafu { op: "if", value: condition, expected: "i1", found: "scalar" }
        );
        let then_block = self.func.new_block();
        let op = self.insert(Op::If { condition, then_block }, Vec::new())?;
        Ok((op, then_block))
    }

    // =========================================================================
    // Descriptors
    // =========================================================================

    /// Encode a descriptor on the device from a base pointer, global shape and strides.
    pub fn make_descriptor(
        &mut self,
        base: ValueId,
        shape: &[ValueId],
        strides: &[ValueId],
        ty: DescriptorType,
    ) -> Result<ValueId> {
        let base_ty = self.scalar("make_descriptor", base)?;
        ensure!(
            base_ty.is_ptr(),
            UnexpectedTypeSnafu { op: "make_descriptor", value: base, expected: "pointer", found: "scalar" }
        );
        let shape = self.coordinates("make_descriptor", &ty, shape)?;
        let strides = self.coordinates("make_descriptor", &ty, strides)?;
        self.insert_value(Op::MakeDescriptor { base, shape, strides }, Type::Descriptor(ty))
    }

    pub fn descriptor_load(&mut self, desc: ValueId, indices: &[ValueId]) -> Result<ValueId> {
        let desc_ty = self.descriptor("descriptor_load", desc)?;
        let indices = self.coordinates("descriptor_load", &desc_ty, indices)?;
        self.insert_value(Op::DescriptorLoad { desc, indices }, Type::Tensor(desc_ty.block))
    }

    pub fn descriptor_store(&mut self, desc: ValueId, src: ValueId, indices: &[ValueId]) -> Result<OpId> {
        let (desc_ty, src_ty) = (self.descriptor("descriptor_store", desc)?, self.tensor("descriptor_store", src)?);
        Self::same_tile("descriptor_store", &src_ty, &desc_ty.block)?;
        let indices = self.coordinates("descriptor_store", &desc_ty, indices)?;
        self.insert(Op::DescriptorStore { desc, src, indices }, Vec::new())
    }

    pub fn descriptor_reduce(
        &mut self,
        kind: ReduceKind,
        desc: ValueId,
        src: ValueId,
        indices: &[ValueId],
    ) -> Result<OpId> {
        let (desc_ty, src_ty) = (self.descriptor("descriptor_reduce", desc)?, self.tensor("descriptor_reduce", src)?);
        Self::same_tile("descriptor_reduce", &src_ty, &desc_ty.block)?;
        let indices = self.coordinates("descriptor_reduce", &desc_ty, indices)?;
        self.insert(Op::DescriptorReduce { kind, desc, src, indices }, Vec::new())
    }

    /// Scatter the rows of `src` to rows `x_offsets[i]`, starting at column `y_offset`.
    pub fn descriptor_scatter(
        &mut self,
        desc: ValueId,
        src: ValueId,
        x_offsets: ValueId,
        y_offset: ValueId,
    ) -> Result<OpId> {
        self.scatter_operands("descriptor_scatter", desc, x_offsets, y_offset)?;
        let (desc_ty, src_ty) = (self.descriptor("descriptor_scatter", desc)?, self.tensor("descriptor_scatter", src)?);
        ensure!(
            src_ty.dtype == desc_ty.block.dtype,
            DTypeMismatchSnafu { op: "descriptor_scatter", lhs: src_ty.dtype.clone(), rhs: desc_ty.block.dtype }
        );
        self.insert(Op::DescriptorScatter { desc, src, x_offsets, y_offset }, Vec::new())
    }

    fn scatter_operands(&self, op: &'static str, desc: ValueId, x_offsets: ValueId, y_offset: ValueId) -> Result<()> {
        self.descriptor(op, desc)?;
        let offsets = self.tensor(op, x_offsets)?;
        ensure!(offsets.dtype.is_int(), ExpectedIndexSnafu { op, value: x_offsets });
        ensure!(offsets.rank() == 1, CoordinateCountSnafu { op, expected: 1usize, actual: offsets.rank() });
        self.index(op, y_offset)
    }

    // =========================================================================
    // Shared memory
    // =========================================================================

    pub fn local_alloc(&mut self, ty: MemDescType) -> Result<ValueId> {
        self.insert_value(Op::LocalAlloc, Type::MemDesc(ty))
    }

    pub fn local_store(&mut self, src: ValueId, dst: ValueId) -> Result<OpId> {
        let src_ty = self.tensor("local_store", src)?;
        let dst_ty = self.memdesc("local_store", dst)?;
        ensure!(dst_ty.mutable, ImmutableBufferSnafu { op: "local_store", value: dst });
        let staged = TensorType { shape: dst_ty.shape.clone(), dtype: dst_ty.dtype.clone() };
        Self::same_tile("local_store", &src_ty, &staged)?;
        self.insert(Op::LocalStore { src, dst }, Vec::new())
    }

    pub fn local_dealloc(&mut self, buffer: ValueId) -> Result<OpId> {
        self.memdesc("local_dealloc", buffer)?;
        self.insert(Op::LocalDealloc { buffer }, Vec::new())
    }

    /// Make prior generic-proxy shared memory writes visible to the async proxy.
    pub fn fence_async_shared(&mut self, cluster: bool) -> Result<OpId> {
        self.insert(Op::FenceAsyncShared { cluster }, Vec::new())
    }

    // =========================================================================
    // Copy engine
    // =========================================================================

    fn async_source(&self, op: &'static str, desc: &DescriptorType, src: ValueId) -> Result<()> {
        let src_ty = self.memdesc(op, src)?;
        ensure!(
            src_ty.space == AddrSpace::Shared,
            UnexpectedTypeSnafu { op, value: src, expected: "shared memdesc", found: "memdesc" }
        );
        ensure!(
            src_ty.dtype == desc.block.dtype,
            DTypeMismatchSnafu { op, lhs: src_ty.dtype.clone(), rhs: desc.block.dtype.clone() }
        );
        Ok(())
    }

    pub fn async_copy_local_to_global(&mut self, desc: ValueId, indices: &[ValueId], src: ValueId) -> Result<OpId> {
        let desc_ty = self.descriptor("async_copy_local_to_global", desc)?;
        self.async_source("async_copy_local_to_global", &desc_ty, src)?;
        let indices = self.coordinates("async_copy_local_to_global", &desc_ty, indices)?;
        self.insert(Op::AsyncCopyLocalToGlobal { desc, indices, src }, Vec::new())
    }

    pub fn async_reduce(&mut self, kind: ReduceKind, desc: ValueId, indices: &[ValueId], src: ValueId) -> Result<OpId> {
        let desc_ty = self.descriptor("async_reduce", desc)?;
        self.async_source("async_reduce", &desc_ty, src)?;
        let indices = self.coordinates("async_reduce", &desc_ty, indices)?;
        self.insert(Op::AsyncReduce { kind, desc, indices, src }, Vec::new())
    }

    pub fn async_scatter(
        &mut self,
        desc: ValueId,
        x_offsets: ValueId,
        y_offset: ValueId,
        src: ValueId,
    ) -> Result<OpId> {
        self.scatter_operands("async_scatter", desc, x_offsets, y_offset)?;
        let desc_ty = self.descriptor("async_scatter", desc)?;
        self.async_source("async_scatter", &desc_ty, src)?;
        self.insert(Op::AsyncScatter { desc, x_offsets, y_offset, src }, Vec::new())
    }

    /// Block until at most `pendings` async stores issued by this thread are in flight.
    pub fn async_store_wait(&mut self, pendings: u32) -> Result<OpId> {
        self.insert(Op::AsyncStoreWait { pendings }, Vec::new())
    }

    // =========================================================================
    // Device-side descriptors
    // =========================================================================

    pub fn global_scratch_alloc(&mut self, nbytes: usize, alignment: usize) -> Result<ValueId> {
        let ty = Type::Scalar(DType::Int8.ptr(AddrSpace::Global));
        self.insert_value(Op::GlobalScratchAlloc { nbytes, alignment }, ty)
    }

    pub fn tensormap_create(
        &mut self,
        scratch: ValueId,
        slot: ValueId,
        base: ValueId,
        shape: &[ValueId],
        strides: &[ValueId],
    ) -> Result<OpId> {
        self.index("tensormap_create", slot)?;
        for &value in shape.iter().chain(strides) {
            self.index("tensormap_create", value)?;
        }
        let shape: Operands = shape.iter().copied().collect();
        let strides: Operands = strides.iter().copied().collect();
        self.insert(Op::TensormapCreate { scratch, slot, base, shape, strides }, Vec::new())
    }

    pub fn tensormap_fence_acquire(&mut self, scratch: ValueId, slot: ValueId) -> Result<OpId> {
        self.index("tensormap_fence_acquire", slot)?;
        self.insert(Op::TensormapFenceAcquire { scratch, slot }, Vec::new())
    }

    pub fn reinterpret_descriptor(&mut self, scratch: ValueId, slot: ValueId, ty: DescriptorType) -> Result<ValueId> {
        self.index("reinterpret_descriptor", slot)?;
        self.insert_value(Op::ReinterpretDescriptor { scratch, slot }, Type::Descriptor(ty))
    }
}
