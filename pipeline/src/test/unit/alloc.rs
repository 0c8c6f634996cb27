use test_case::test_case;

use stowage_ir::prelude::*;

use crate::async_store::{BufferKey, allocate_buffers, collect_stores};
use crate::test::helpers::*;

#[test]
fn test_same_tile_type_shares_buffer() {
    let mut k = Kernel::new();
    let a = k.host_desc(&[64, 64], DType::Float16);
    let b = k.host_desc(&[128, 32], DType::Float32);
    let src_a = k.tile(&[64, 64], DType::Float16);
    let src_b = k.tile(&[128, 32], DType::Float32);
    k.store(a, src_a);
    k.store(a, src_a);
    k.store(b, src_b);

    let records = collect_stores(&k.func, k.body);
    let (assignments, plan) = allocate_buffers(&mut k.func, k.for_op, records).unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(assignments[0].1, assignments[1].1);
    assert_ne!(assignments[0].1, assignments[2].1);
    assert_eq!(plan.get(&BufferKey::of(&tile(&[64, 64], DType::Float16))), Some(assignments[0].1));
    assert_eq!(plan.get(&BufferKey::of(&tile(&[128, 32], DType::Float32))), Some(assignments[2].1));
}

#[test]
fn test_buffers_allocated_before_loop_in_creation_order() {
    let mut k = Kernel::new();
    let a = k.host_desc(&[16, 16], DType::BFloat16);
    let b = k.host_desc(&[16, 32], DType::BFloat16);
    let src_a = k.tile(&[16, 16], DType::BFloat16);
    let src_b = k.tile(&[16, 32], DType::BFloat16);
    k.store(b, src_b);
    k.store(a, src_a);

    let records = collect_stores(&k.func, k.body);
    let (_, plan) = allocate_buffers(&mut k.func, k.for_op, records).unwrap();
    let buffers: Vec<_> = plan.buffers().collect();

    let entry = k.func.entry();
    let allocs: Vec<_> = buffers.iter().map(|&buffer| k.func.defining_op(buffer).unwrap()).collect();
    for &alloc in &allocs {
        assert_eq!(k.func.parent_block(alloc), Some(entry));
        assert!(position(&k.func, alloc) < position(&k.func, k.for_op));
    }
    assert!(position(&k.func, allocs[0]) < position(&k.func, allocs[1]));
    assert_eq!(k.func.value_type(buffers[0]).as_memdesc().unwrap().shape.as_slice(), &[16, 32]);
}

#[test]
fn test_buffer_type_is_mutable_shared_memdesc() {
    let mut k = Kernel::new();
    let desc = k.host_desc(&[128, 64], DType::BFloat16);
    let src = k.tile(&[128, 64], DType::BFloat16);
    k.store(desc, src);

    let records = collect_stores(&k.func, k.body);
    let (assignments, _) = allocate_buffers(&mut k.func, k.for_op, records).unwrap();

    let ty = k.func.value_type(assignments[0].1);
    assert_eq!(
        ty,
        &Type::MemDesc(MemDescType {
            shape: [128, 64].into_iter().collect(),
            dtype: DType::BFloat16,
            encoding: SharedEncoding::new(128, 16),
            space: AddrSpace::Shared,
            mutable: true,
        })
    );
}

#[test_case(&[64, 64], DType::Float16, &[64, 64], DType::Float32, 2; "dtype_differs")]
#[test_case(&[64, 64], DType::Float16, &[32, 128], DType::Float16, 2; "shape_differs")]
#[test_case(&[64, 64], DType::Float16, &[64, 64], DType::Float16, 1; "identical")]
fn test_buffer_key_is_structural(
    shape_a: &[i64],
    dtype_a: DType,
    shape_b: &[i64],
    dtype_b: DType,
    expected: usize,
) {
    let mut k = Kernel::new();
    let a = k.host_desc(shape_a, dtype_a.clone());
    let b = k.host_desc(shape_b, dtype_b.clone());
    let src_a = k.tile(shape_a, dtype_a);
    let src_b = k.tile(shape_b, dtype_b);
    k.store(a, src_a);
    k.store(b, src_b);

    let records = collect_stores(&k.func, k.body);
    let (_, plan) = allocate_buffers(&mut k.func, k.for_op, records).unwrap();
    assert_eq!(plan.len(), expected);
}

#[test]
fn test_no_records_allocates_nothing() {
    let mut k = Kernel::new();
    let before = k.func.num_live_ops();
    let (assignments, plan) = allocate_buffers(&mut k.func, k.for_op, Vec::new()).unwrap();
    assert!(assignments.is_empty());
    assert!(plan.is_empty());
    assert_eq!(k.func.num_live_ops(), before);
}
