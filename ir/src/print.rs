//! Textual form of a function.
//!
//! ```text
//! func @kernel(%0: !desc<tensor<64x64xf16>>) {
//!   %1 = const 0 : index
//!   for %5 = %1 to %2 step %3 {
//!     descriptor_store %0[%5, %1], %6
//!   }
//! }
//! ```

use std::fmt::{self, Write};

use crate::func::{BlockId, Function, OpId, ValueId};
use crate::op::Op;

/// Display adapter for a single op, without its regions.
pub struct OpDisplay<'a> {
    func: &'a Function,
    op: OpId,
}

impl Function {
    pub fn display_op(&self, op: OpId) -> OpDisplay<'_> {
        OpDisplay { func: self, op }
    }
}

fn list(values: &[ValueId]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{value}");
    }
    out
}

impl fmt::Display for OpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        let op = func.op(self.op);
        let results = func.results(self.op);
        if !results.is_empty() {
            write!(f, "{} = ", list(results))?;
        }

        match op {
            Op::Const(value) => write!(f, "const {value}")?,
            Op::Binary(kind, lhs, rhs) => write!(f, "{} {lhs}, {rhs}", kind.as_ref())?,
            Op::Splat { value } => write!(f, "splat {value}")?,
            Op::For { lower, upper, step, body } => {
                let iv = func.block_args(*body).first().map(|v| v.to_string()).unwrap_or_default();
                write!(f, "for {iv} = {lower} to {upper} step {step}")?
            }
            Op::If { condition, .. } => write!(f, "if {condition}")?,
            Op::MakeDescriptor { base, shape, strides } => {
                write!(f, "make_descriptor {base}, [{}], [{}]", list(shape), list(strides))?
            }
            Op::DescriptorLoad { desc, indices } => write!(f, "descriptor_load {desc}[{}]", list(indices))?,
            Op::DescriptorStore { desc, src, indices } => {
                write!(f, "descriptor_store {desc}[{}], {src}", list(indices))?
            }
            Op::DescriptorReduce { kind, desc, src, indices } => {
                write!(f, "descriptor_reduce {}, {desc}[{}], {src}", kind.as_ref(), list(indices))?
            }
            Op::DescriptorScatter { desc, src, x_offsets, y_offset } => {
                write!(f, "descriptor_scatter {desc}[{x_offsets}, {y_offset}], {src}")?
            }
            Op::LocalAlloc => f.write_str("local_alloc")?,
            Op::LocalStore { src, dst } => write!(f, "local_store {src}, {dst}")?,
            Op::LocalDealloc { buffer } => write!(f, "local_dealloc {buffer}")?,
            Op::FenceAsyncShared { cluster } => write!(f, "fence_async_shared {{cluster = {cluster}}}")?,
            Op::AsyncCopyLocalToGlobal { desc, indices, src } => {
                write!(f, "async_copy_local_to_global {desc}[{}] {src}", list(indices))?
            }
            Op::AsyncReduce { kind, desc, indices, src } => {
                write!(f, "async_reduce {}, {desc}[{}] {src}", kind.as_ref(), list(indices))?
            }
            Op::AsyncScatter { desc, x_offsets, y_offset, src } => {
                write!(f, "async_scatter {desc}[{x_offsets}, {y_offset}] {src}")?
            }
            Op::AsyncStoreWait { pendings } => write!(f, "async_store_wait {{pendings = {pendings}}}")?,
            Op::GlobalScratchAlloc { nbytes, alignment } => {
                write!(f, "global_scratch_alloc {{nbytes = {nbytes}, alignment = {alignment}}}")?
            }
            Op::TensormapCreate { scratch, slot, base, shape, strides } => write!(
                f,
                "tensormap_create {scratch}[{slot}], {base}, [{}], [{}]",
                list(shape),
                list(strides)
            )?,
            Op::TensormapFenceAcquire { scratch, slot } => write!(f, "tensormap_fence_acquire {scratch}[{slot}]")?,
            Op::ReinterpretDescriptor { scratch, slot } => write!(f, "reinterpret_descriptor {scratch}[{slot}]")?,
        }

        if let [result] = results {
            write!(f, " : {}", func.value_type(*result))?;
        }
        Ok(())
    }
}

fn write_block(func: &Function, block: BlockId, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for &op in func.block_ops(block) {
        let indent = "  ".repeat(depth);
        let regions = func.op(op).regions();
        if regions.is_empty() {
            writeln!(f, "{indent}{}", func.display_op(op))?;
            continue;
        }
        writeln!(f, "{indent}{} {{", func.display_op(op))?;
        for region in regions {
            write_block(func, region, depth + 1, f)?;
        }
        writeln!(f, "{indent}}}")?;
    }
    Ok(())
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func @{}(", self.name())?;
        for (i, &param) in self.params().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}: {}", self.value_type(param))?;
        }
        writeln!(f, ") {{")?;
        write_block(self, self.entry(), 1, f)?;
        f.write_str("}\n")
    }
}
