//! Store to async copy rewriting.

use stowage_ir::prelude::*;

use super::alloc::{descriptor_type, tensor_type};
use super::collect::{StoreKind, StoreRecord};
use crate::encoding::{encoding_from_descriptor, translate_indices};
use crate::error::Result;

/// Replace one store with the staged async protocol and erase it.
///
/// Right before the store the sequence is
///
/// ```text
/// async_store_wait {pendings = 0}
/// local_store %src, %buffer
/// fence_async_shared {cluster = false}
/// async_{copy_local_to_global,reduce,scatter} ..., %buffer
/// ```
///
/// with nothing interleaved; coordinate translation, if any, is emitted
/// ahead of the wait. Coordinates follow the store's own descriptor
/// encoding, which may differ from that of the shared buffer. Returns the
/// issue op.
pub fn rewrite_store(func: &mut Function, record: StoreRecord, buffer: ValueId) -> Result<OpId> {
    let StoreRecord { op, desc, src, kind } = record;
    let encoding = encoding_from_descriptor(&tensor_type(func, src)?, &descriptor_type(func, desc)?);

    let mut b = Builder::before(func, op);
    let kind = match kind {
        StoreKind::Plain { indices } => StoreKind::Plain { indices: translate_indices(&mut b, &encoding, &indices)? },
        StoreKind::Reduce { kind, indices } => {
            StoreKind::Reduce { kind, indices: translate_indices(&mut b, &encoding, &indices)? }
        }
        scatter @ StoreKind::Scatter { .. } => scatter,
    };

    b.async_store_wait(0)?;
    b.local_store(src, buffer)?;
    b.fence_async_shared(false)?;
    let issue = match kind {
        StoreKind::Plain { indices } => b.async_copy_local_to_global(desc, &indices, buffer)?,
        StoreKind::Reduce { kind, indices } => b.async_reduce(kind, desc, &indices, buffer)?,
        StoreKind::Scatter { x_offsets, y_offset } => b.async_scatter(desc, x_offsets, y_offset, buffer)?,
    };

    func.erase_op(op)?;
    tracing::trace!(store = %op, %issue, "rewrote store");
    Ok(issue)
}
