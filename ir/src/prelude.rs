//! Common imports for building and rewriting functions.
//!
//! ```rust,ignore
//! use stowage_ir::prelude::*;
//! ```

pub use crate::builder::{Builder, InsertPoint};
pub use crate::func::{BlockId, Function, OpId, ValueId, WalkResult};
pub use crate::op::Op;
pub use crate::types::{
    BinaryOp, ConstValue, DescriptorType, MemDescType, ReduceKind, SharedEncoding, TensorType, Type,
};

pub use stowage_dtype::{AddrSpace, DType};
