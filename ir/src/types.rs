//! Type definitions for IR values and operations.
//!
//! Value types ([`Type`]) distinguish plain scalars, distributed register
//! tiles ([`TensorType`]), TMA descriptors ([`DescriptorType`]) and
//! shared-memory buffers ([`MemDescType`]).

use std::fmt;

use smallvec::SmallVec;
use stowage_dtype::{AddrSpace, DType};

/// Constant value that can be stored in a `const` op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Binary arithmetic on scalars (mostly index math).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floor division.
    Div,
    Rem,
}

/// Reduction applied by the copy engine when writing to global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ReduceKind {
    Add,
    Min,
    Max,
    Inc,
    Dec,
    And,
    Or,
    Xor,
}

/// Swizzled shared-memory layout understood by the copy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedEncoding {
    /// Swizzle width in bytes (0, 32, 64 or 128).
    pub swizzle_bytes: u32,
    pub element_bits: u32,
    pub transposed: bool,
    /// Packed 4-bit rows padded to byte granularity; the innermost
    /// coordinate is expressed in bytes rather than elements.
    pub fp4_padded: bool,
}

impl SharedEncoding {
    pub const fn new(swizzle_bytes: u32, element_bits: u32) -> Self {
        Self { swizzle_bytes, element_bits, transposed: false, fp4_padded: false }
    }
}

impl fmt::Display for SharedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#shared<swizzle = {}, bits = {}", self.swizzle_bytes, self.element_bits)?;
        if self.transposed {
            f.write_str(", transposed")?;
        }
        if self.fp4_padded {
            f.write_str(", fp4_padded")?;
        }
        f.write_str(">")
    }
}

pub type Shape = SmallVec<[i64; 4]>;

/// Tile held in registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorType {
    pub fn new(shape: impl IntoIterator<Item = i64>, dtype: DType) -> Self {
        Self { shape: shape.into_iter().collect(), dtype }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> i64 {
        self.shape.iter().product()
    }
}

/// Handle to a tensor-shaped region in global memory.
///
/// `block` is the tile moved by a single transfer through this descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorType {
    pub block: TensorType,
    pub encoding: Option<SharedEncoding>,
}

impl DescriptorType {
    pub fn new(block: TensorType) -> Self {
        Self { block, encoding: None }
    }

    pub fn with_encoding(mut self, encoding: SharedEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// Memory descriptor for a buffer living outside registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemDescType {
    pub shape: Shape,
    pub dtype: DType,
    pub encoding: SharedEncoding,
    pub space: AddrSpace,
    pub mutable: bool,
}

/// Type of an SSA value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(DType),
    Tensor(TensorType),
    Descriptor(DescriptorType),
    MemDesc(MemDescType),
}

impl Type {
    pub const INDEX: Type = Type::Scalar(DType::Index);

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_descriptor(&self) -> Option<&DescriptorType> {
        match self {
            Self::Descriptor(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_memdesc(&self) -> Option<&MemDescType> {
        match self {
            Self::MemDesc(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&DType> {
        match self {
            Self::Scalar(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_index_like(&self) -> bool {
        matches!(self, Self::Scalar(d) if d.is_int())
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Tensor(_) => "tensor",
            Self::Descriptor(_) => "descriptor",
            Self::MemDesc(_) => "memdesc",
        }
    }
}

fn write_shape(f: &mut fmt::Formatter<'_>, shape: &[i64], dtype: &DType) -> fmt::Result {
    for dim in shape {
        write!(f, "{dim}x")?;
    }
    write!(f, "{dtype}")
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("tensor<")?;
        write_shape(f, &self.shape, &self.dtype)?;
        f.write_str(">")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(d) => write!(f, "{d}"),
            Self::Tensor(t) => write!(f, "{t}"),
            Self::Descriptor(d) => {
                write!(f, "!desc<{}", d.block)?;
                if let Some(enc) = &d.encoding {
                    write!(f, ", {enc}")?;
                }
                f.write_str(">")
            }
            Self::MemDesc(m) => {
                f.write_str("!memdesc<")?;
                write_shape(f, &m.shape, &m.dtype)?;
                let space = match m.space {
                    AddrSpace::Global => "#global",
                    AddrSpace::Shared => "#smem",
                    AddrSpace::Reg => "#reg",
                };
                write!(f, ", {}, {space}", m.encoding)?;
                if m.mutable {
                    f.write_str(", mutable")?;
                }
                f.write_str(">")
            }
        }
    }
}
