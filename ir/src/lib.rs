//! Intermediate Representation (IR) for stowage tile kernels.
//!
//! Unlike an expression DAG, passes over this IR insert and erase
//! instructions in place, so everything lives in a per-function arena and is
//! addressed by small copyable ids.
//!
//! # Module Organization
//!
//! - [`types`] - Constant values, value types, shared-memory encodings
//! - [`op`] - Operation enum defining all IR operations
//! - [`func`] - Function arena: ops, values, blocks, walking, erasure
//! - [`builder`] - Insertion-point based op construction with type checks
//! - [`print`] - Textual form of a function
//! - [`verify`] - Structural verifier
//! - [`error`] - Error types and result handling

pub mod builder;
pub mod error;
pub mod func;
pub mod op;
pub mod prelude;
pub mod print;
pub mod types;
pub mod verify;


pub use builder::{Builder, InsertPoint};
pub use error::{Error, Result};
pub use func::{BlockId, Function, OpId, ValueDef, ValueId, WalkResult};
pub use op::Op;
pub use types::{
    BinaryOp, ConstValue, DescriptorType, MemDescType, ReduceKind, SharedEncoding, TensorType, Type,
};
pub use verify::verify;

pub use stowage_dtype::{AddrSpace, DType, ScalarDType};
