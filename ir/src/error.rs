use snafu::Snafu;
use stowage_dtype::DType;

use crate::func::{OpId, ValueId};
use crate::types::Shape;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Operand has the wrong kind of type for the op being built.
    #[snafu(display("{op}: operand {value} must be a {expected}, got {found}"))]
    UnexpectedType { op: &'static str, value: ValueId, expected: &'static str, found: &'static str },

    /// Operand must be an integer/index scalar.
    #[snafu(display("{op}: operand {value} must be an integer scalar"))]
    ExpectedIndex { op: &'static str, value: ValueId },

    /// DType mismatch between two operands.
    #[snafu(display("{op}: dtype mismatch {lhs} vs {rhs}"))]
    DTypeMismatch { op: &'static str, lhs: DType, rhs: DType },

    /// Shape mismatch between two operands.
    #[snafu(display("{op}: shape mismatch {lhs:?} vs {rhs:?}"))]
    ShapeMismatch { op: &'static str, lhs: Shape, rhs: Shape },

    /// Coordinate count does not match descriptor rank.
    #[snafu(display("{op}: expected {expected} coordinates, got {actual}"))]
    CoordinateCount { op: &'static str, expected: usize, actual: usize },

    /// Write into an immutable shared-memory buffer.
    #[snafu(display("{op}: buffer {value} is immutable"))]
    ImmutableBuffer { op: &'static str, value: ValueId },

    /// Referenced op was already erased.
    #[snafu(display("{op} was erased"))]
    ErasedOp { op: OpId },

    /// Referenced value belongs to an erased op.
    #[snafu(display("{value} is defined by an erased op"))]
    ErasedValue { value: ValueId },

    /// Erasing an op whose results are still used.
    #[snafu(display("cannot erase {op}: results still have {uses} use(s)"))]
    OpHasUses { op: OpId, uses: usize },

    /// Op is not attached to any block.
    #[snafu(display("{op} is not attached to a block"))]
    DetachedOp { op: OpId },

    /// Operand used before it is defined in the same block.
    #[snafu(display("{op} uses {value} before its definition"))]
    UseBeforeDef { op: OpId, value: ValueId },

    /// Operand is not visible from the using op.
    #[snafu(display("{op} uses {value}, which does not dominate it"))]
    NotDominating { op: OpId, value: ValueId },

    /// Op appears in a block more than once or in several blocks.
    #[snafu(display("{op} is listed in more than one block position"))]
    DuplicateOp { op: OpId },
}
