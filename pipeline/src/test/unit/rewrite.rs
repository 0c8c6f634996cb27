//! Per-store rewriting: protocol order, variant mapping, coordinate translation.

use test_case::test_case;

use stowage_ir::prelude::*;

use crate::async_store::{allocate_buffers, collect_stores, rewrite_store};
use crate::test::helpers::*;

/// Collect, allocate, and rewrite the first store of the loop.
fn rewrite_first(k: &mut Kernel) -> (OpId, ValueId) {
    let records = collect_stores(&k.func, k.body);
    let (mut assignments, _) = allocate_buffers(&mut k.func, k.for_op, records).unwrap();
    let (record, buffer) = assignments.remove(0);
    (rewrite_store(&mut k.func, record, buffer).unwrap(), buffer)
}

#[test]
fn test_plain_store_becomes_staged_copy() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[64, 64], DType::Float16);
    let src = k.tile(&[64, 64], DType::Float16);
    let store = k.store(desc, src);

    let (issue, buffer) = rewrite_first(&mut k);

    assert!(!k.func.is_live(store));
    assert_eq!(
        op_names(&k.func, k.body),
        vec!["const", "splat", "async_store_wait", "local_store", "fence_async_shared", "async_copy_local_to_global"]
    );
    assert_eq!(
        k.func.op(issue),
        &Op::AsyncCopyLocalToGlobal { desc, indices: [k.iv, k.iv].into_iter().collect(), src: buffer }
    );
}

#[test]
fn test_protocol_ops_carry_expected_operands() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[64, 64], DType::Float16);
    let src = k.tile(&[64, 64], DType::Float16);
    k.store(desc, src);

    let (issue, buffer) = rewrite_first(&mut k);
    let ops = k.func.block_ops(k.body);
    let at = position(&k.func, issue);

    assert_eq!(k.func.op(ops[at - 3]), &Op::AsyncStoreWait { pendings: 0 });
    assert_eq!(k.func.op(ops[at - 2]), &Op::LocalStore { src, dst: buffer });
    assert_eq!(k.func.op(ops[at - 1]), &Op::FenceAsyncShared { cluster: false });
}

#[test_case(ReduceKind::Add)]
#[test_case(ReduceKind::Max)]
#[test_case(ReduceKind::Xor)]
fn test_reduce_keeps_kind(kind: ReduceKind) {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[32, 32], DType::Float32);
    let src = k.tile(&[32, 32], DType::Float32);
    k.reduce(kind, desc, src);

    let (issue, buffer) = rewrite_first(&mut k);
    assert_eq!(
        k.func.op(issue),
        &Op::AsyncReduce { kind, desc, indices: [k.iv, k.iv].into_iter().collect(), src: buffer }
    );
}

#[test]
fn test_scatter_keeps_offsets() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[1, 64], DType::BFloat16);
    let src = k.tile(&[8, 64], DType::BFloat16);
    let (store, x_offsets, y_offset) = k.scatter(desc, src);

    let (issue, buffer) = rewrite_first(&mut k);
    assert!(!k.func.is_live(store));
    assert_eq!(k.func.op(issue), &Op::AsyncScatter { desc, x_offsets, y_offset, src: buffer });
}

#[test]
fn test_fp4_coordinates_translated_before_wait() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[64, 64], DType::FP4E2M1);
    let src = k.tile(&[64, 64], DType::FP4E2M1);
    k.store(desc, src);

    let (issue, _) = rewrite_first(&mut k);

    let names = op_names(&k.func, k.body);
    let wait = names.iter().position(|&name| name == "async_store_wait").unwrap();
    assert_eq!(&names[wait - 2..wait], &["const", "binary"]);

    let Op::AsyncCopyLocalToGlobal { indices, .. } = k.func.op(issue) else { panic!("expected a copy") };
    assert_eq!(indices[0], k.iv);
    let scaled = k.func.defining_op(indices[1]).unwrap();
    let Op::Binary(BinaryOp::Mul, lhs, two) = *k.func.op(scaled) else { panic!("expected a multiply") };
    assert_eq!(lhs, k.iv);
    assert_eq!(k.func.op(k.func.defining_op(two).unwrap()), &Op::Const(ConstValue::Int(2)));
}

#[test]
fn test_scatter_coordinates_never_translated() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[1, 64], DType::FP4E2M1);
    let src = k.tile(&[8, 64], DType::FP4E2M1);
    k.scatter(desc, src);

    rewrite_first(&mut k);
    assert!(!op_names(&k.func, k.body).contains(&"binary"));
}

/// Whether the issue's innermost coordinate is the loop index doubled.
fn inner_coordinate_doubled(k: &Kernel, issue: OpId) -> bool {
    let Op::AsyncCopyLocalToGlobal { indices, .. } = k.func.op(issue) else { panic!("expected a copy") };
    let inner = *indices.last().unwrap();
    match k.func.defining_op(inner).map(|op| k.func.op(op)) {
        Some(&Op::Binary(BinaryOp::Mul, lhs, _)) => lhs == k.iv,
        _ => {
            assert_eq!(inner, k.iv);
            false
        }
    }
}

#[test_case(true ; "unpadded descriptor allocates")]
#[test_case(false ; "padded descriptor allocates")]
fn test_shared_buffer_coordinates_follow_own_descriptor(unpadded_first: bool) {
    let mut k = Kernel::new();
    let unpadded = k.host_desc_with(&[64, 64], DType::FP4E2M1, SharedEncoding::new(32, 4));
    let padded = k.host_desc(&[64, 64], DType::FP4E2M1);
    let src = k.tile(&[64, 64], DType::FP4E2M1);
    let order = if unpadded_first { [unpadded, padded] } else { [padded, unpadded] };
    for desc in order {
        k.store(desc, src);
    }

    k.run();

    assert_eq!(ops_named(&k.func, "local_alloc").len(), 1);
    let issues = ops_named(&k.func, "async_copy_local_to_global");
    assert_eq!(issues.len(), 2);
    for (desc, issue) in order.into_iter().zip(issues) {
        assert_eq!(inner_coordinate_doubled(&k, issue), desc == padded, "store through {desc}");
    }
}
