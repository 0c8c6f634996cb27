//! Element data types for the stowage tile IR.
//!
//! [`ScalarDType`] enumerates the element types a tile can hold, [`DType`]
//! adds vectors and pointers on top. Bit widths are exposed separately from
//! byte sizes because sub-byte formats (fp4) matter for shared memory layout.

use std::fmt;


/// Address space for pointer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrSpace {
    /// Global/device memory.
    Global,
    /// Shared (on-chip) memory.
    Shared,
    /// Register memory.
    Reg,
}

/// Scalar data types (base numeric types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
pub enum ScalarDType {
    Bool = 0,

    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,

    /// Packed 4-bit float (two values per byte).
    FP4E2M1 = 9,
    FP8E4M3 = 10,
    FP8E5M2 = 11,
    Float16 = 12,
    BFloat16 = 13,
    Float32 = 14,
    Float64 = 15,

    /// Void type for operations without a result.
    Void = 16,

    /// Index type for loop induction variables and coordinates.
    Index = 17,
}

impl ScalarDType {
    pub const fn bits(&self) -> usize {
        match self {
            Self::Bool => 8,
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 => 32,
            Self::Int64 | Self::UInt64 => 64,
            Self::FP4E2M1 => 4,
            Self::FP8E4M3 | Self::FP8E5M2 => 8,
            Self::Float16 | Self::BFloat16 => 16,
            Self::Float32 => 32,
            Self::Float64 => 64,
            Self::Void => 0,
            Self::Index => 64,
        }
    }

    /// Storage size in bytes, rounded up for sub-byte types.
    pub const fn bytes(&self) -> usize {
        self.bits().div_ceil(8)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned() || matches!(self, Self::Index)
    }

    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            Self::FP4E2M1
                | Self::FP8E4M3
                | Self::FP8E5M2
                | Self::Float16
                | Self::BFloat16
                | Self::Float32
                | Self::Float64
        )
    }

    /// Element types narrower than a byte are stored packed.
    pub const fn is_packed(&self) -> bool {
        self.bits() > 0 && self.bits() < 8
    }

    /// Short textual name used by the IR printer.
    pub const fn ir_name(&self) -> &'static str {
        match self {
            Self::Bool => "i1",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::FP4E2M1 => "f4E2M1",
            Self::FP8E4M3 => "f8E4M3",
            Self::FP8E5M2 => "f8E5M2",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Void => "void",
            Self::Index => "index",
        }
    }
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::Scalar(scalar)
    }
}

/// Data type including scalars, vectors and pointers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    /// Scalar type (single value).
    Scalar(ScalarDType),

    /// Vector type (SIMD).
    Vector { scalar: ScalarDType, count: usize },

    /// Pointer type.
    Ptr { base: Box<DType>, addrspace: AddrSpace },
}

impl DType {
    /// Create a vector type from this dtype.
    pub fn vec(&self, count: usize) -> Self {
        if count == 1 {
            return self.clone();
        }

        match self {
            Self::Scalar(s) if !matches!(s, ScalarDType::Void) => Self::Vector { scalar: *s, count },
            Self::Vector { .. } => panic!("Cannot vectorize an already vectorized type"),
            _ => self.clone(),
        }
    }

    /// Create a pointer type from this dtype.
    pub fn ptr(self, addrspace: AddrSpace) -> Self {
        match self {
            Self::Ptr { .. } => panic!("Cannot make a pointer from a pointer"),
            _ => Self::Ptr { base: Box::new(self), addrspace },
        }
    }

    pub fn scalar(&self) -> Option<ScalarDType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Get the base scalar type (works for scalars, vectors and pointees).
    pub fn base(&self) -> ScalarDType {
        match self {
            Self::Scalar(s) => *s,
            Self::Vector { scalar, .. } => *scalar,
            Self::Ptr { base, .. } => base.base(),
        }
    }

    /// Get the vector count (1 for scalars).
    pub fn count(&self) -> usize {
        match self {
            Self::Vector { count, .. } => *count,
            _ => 1,
        }
    }

    pub fn bits(&self) -> usize {
        match self {
            Self::Scalar(s) => s.bits(),
            Self::Vector { scalar, count } => scalar.bits() * count,
            Self::Ptr { .. } => 64,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bits().div_ceil(8)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr { .. })
    }

    pub fn is_int(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_int())
    }

    pub fn is_float(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_float())
    }

    pub fn is_packed(&self) -> bool {
        self.scalar().is_some_and(|s| s.is_packed())
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s.ir_name()),
            Self::Vector { scalar, count } => write!(f, "vector<{count}x{}>", scalar.ir_name()),
            Self::Ptr { base, addrspace } => {
                let space = match addrspace {
                    AddrSpace::Global => 1,
                    AddrSpace::Shared => 3,
                    AddrSpace::Reg => 5,
                };
                write!(f, "!ptr<{base}, {space}>")
            }
        }
    }
}

// Legacy-style aliases so call sites read like `DType::Float16`.
#[allow(non_upper_case_globals)]
impl DType {
    pub const Bool: Self = Self::Scalar(ScalarDType::Bool);
    pub const Int8: Self = Self::Scalar(ScalarDType::Int8);
    pub const Int16: Self = Self::Scalar(ScalarDType::Int16);
    pub const Int32: Self = Self::Scalar(ScalarDType::Int32);
    pub const Int64: Self = Self::Scalar(ScalarDType::Int64);
    pub const UInt8: Self = Self::Scalar(ScalarDType::UInt8);
    pub const UInt16: Self = Self::Scalar(ScalarDType::UInt16);
    pub const UInt32: Self = Self::Scalar(ScalarDType::UInt32);
    pub const UInt64: Self = Self::Scalar(ScalarDType::UInt64);
    pub const FP4E2M1: Self = Self::Scalar(ScalarDType::FP4E2M1);
    pub const FP8E4M3: Self = Self::Scalar(ScalarDType::FP8E4M3);
    pub const FP8E5M2: Self = Self::Scalar(ScalarDType::FP8E5M2);
    pub const Float16: Self = Self::Scalar(ScalarDType::Float16);
    pub const BFloat16: Self = Self::Scalar(ScalarDType::BFloat16);
    pub const Float32: Self = Self::Scalar(ScalarDType::Float32);
    pub const Float64: Self = Self::Scalar(ScalarDType::Float64);
    pub const Void: Self = Self::Scalar(ScalarDType::Void);
    pub const Index: Self = Self::Scalar(ScalarDType::Index);
}
