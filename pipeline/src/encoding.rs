//! Shared-memory layout of staging buffers and the matching copy coordinates.

use smallvec::SmallVec;
use stowage_dtype::ScalarDType;
use stowage_ir::prelude::*;
use stowage_ir::Result;

/// Layout for a staging buffer that the copy engine reads through `desc_ty`.
///
/// A descriptor whose block already carries a shared encoding dictates it.
/// Otherwise the swizzle is the widest of 128/64/32 bytes that fits in one
/// row of the tile, and packed fp4 rows are padded to whole bytes.
pub fn encoding_from_descriptor(src_ty: &TensorType, desc_ty: &DescriptorType) -> SharedEncoding {
    if let Some(encoding) = desc_ty.encoding {
        return encoding;
    }

    let element_bits = src_ty.dtype.bits() as u32;
    let inner = src_ty.shape.last().copied().unwrap_or(1).max(1) as u64;
    let row_bytes = (inner * u64::from(element_bits)).div_ceil(8);
    let swizzle_bytes = match row_bytes {
        128.. => 128,
        64..=127 => 64,
        32..=63 => 32,
        _ => 0,
    };

    SharedEncoding {
        swizzle_bytes,
        element_bits,
        transposed: false,
        fp4_padded: src_ty.dtype.scalar() == Some(ScalarDType::FP4E2M1),
    }
}

/// Map tile coordinates to the coordinate space of the copy engine.
///
/// Padded fp4 buffers address the innermost dimension in bytes, which holds
/// two elements each, so that coordinate is doubled. Every other layout is
/// passed through without emitting anything.
pub fn translate_indices(
    b: &mut Builder<'_>,
    encoding: &SharedEncoding,
    indices: &[ValueId],
) -> Result<SmallVec<[ValueId; 4]>> {
    let mut translated: SmallVec<[ValueId; 4]> = indices.iter().copied().collect();
    if !encoding.fp4_padded {
        return Ok(translated);
    }

    if let Some(inner) = translated.last_mut() {
        let dtype = b.func().value_type(*inner).as_scalar().cloned().unwrap_or(DType::Index);
        let two = b.constant(ConstValue::Int(2), dtype)?;
        *inner = b.binary(BinaryOp::Mul, *inner, two)?;
        tracing::trace!(%inner, "scaled fp4 coordinate");
    }
    Ok(translated)
}
