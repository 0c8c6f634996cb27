//! Ring lowering of device-side descriptors.

use stowage_ir::prelude::*;

use crate::async_store::{CoarseSchedule, DescriptorLowering};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::multibuffer::{DESCRIPTOR_BYTES, RingDescriptorLowering};
use crate::pipeline_async_stores;
use crate::test::helpers::*;

#[test]
fn test_ring_replaces_make_descriptor() {
    let mut k = Kernel::new();
    let device = k.device_desc(&[64, 64], DType::Float16);
    let make = k.func.defining_op(device).unwrap();
    let src = k.tile(&[64, 64], DType::Float16);
    k.store(device, src);

    let lowered = RingDescriptorLowering.lower(&mut k.func, k.for_op, &CoarseSchedule::new(3)).unwrap();

    assert_eq!(lowered, 1);
    assert!(!k.func.is_live(make));
    assert!(ops_named(&k.func, "make_descriptor").is_empty());

    let scratch = ops_named(&k.func, "global_scratch_alloc");
    assert_eq!(scratch.len(), 1);
    assert_eq!(k.func.op(scratch[0]), &Op::GlobalScratchAlloc { nbytes: 3 * DESCRIPTOR_BYTES, alignment: 128 });
    assert_eq!(k.func.parent_block(scratch[0]), Some(k.func.entry()));
    assert!(position(&k.func, scratch[0]) < position(&k.func, k.for_op));

    let names = op_names(&k.func, k.body);
    let create = names.iter().position(|&name| name == "tensormap_create").unwrap();
    assert_eq!(&names[create..create + 3], &["tensormap_create", "tensormap_fence_acquire", "reinterpret_descriptor"]);
    assert_eq!(stowage_ir::verify(&k.func), Ok(()));
}

#[test]
fn test_ring_slot_cycles_with_iteration() {
    let mut k = Kernel::new();
    let device = k.device_desc(&[16, 16], DType::Float32);
    let src = k.tile(&[16, 16], DType::Float32);
    k.store(device, src);

    RingDescriptorLowering.lower(&mut k.func, k.for_op, &CoarseSchedule::new(4)).unwrap();

    let reinterpret = ops_named(&k.func, "reinterpret_descriptor")[0];
    let Op::ReinterpretDescriptor { slot, .. } = *k.func.op(reinterpret) else { panic!("expected reinterpret") };
    let Op::Binary(BinaryOp::Rem, iteration, depth) = *k.func.op(k.func.defining_op(slot).unwrap()) else {
        panic!("slot is not a remainder")
    };
    assert_eq!(k.func.op(k.func.defining_op(depth).unwrap()), &Op::Const(ConstValue::Int(4)));
    let Op::Binary(BinaryOp::Div, offset, _) = *k.func.op(k.func.defining_op(iteration).unwrap()) else {
        panic!("iteration is not a division")
    };
    let Op::Binary(BinaryOp::Sub, iv, _) = *k.func.op(k.func.defining_op(offset).unwrap()) else {
        panic!("offset is not a subtraction")
    };
    assert_eq!(iv, k.iv);
}

#[test]
fn test_pipelined_copy_reads_ring_descriptor() {
    let mut k = Kernel::new();
    let device = k.device_desc(&[64, 64], DType::Float16);
    let src = k.tile(&[64, 64], DType::Float16);
    k.store(device, src);

    let config = PipelineConfig::default();
    assert!(pipeline_async_stores(&mut k.func, k.for_op, &config, &mut RingDescriptorLowering).unwrap());

    let copy = ops_named(&k.func, "async_copy_local_to_global")[0];
    let Op::AsyncCopyLocalToGlobal { desc, .. } = *k.func.op(copy) else { panic!("expected copy") };
    let def = k.func.defining_op(desc).unwrap();
    assert!(matches!(k.func.op(def), Op::ReinterpretDescriptor { .. }));
    assert!(position(&k.func, def) < position(&k.func, copy));
    assert_eq!(stowage_ir::verify(&k.func), Ok(()));
}

#[test]
fn test_one_scratch_per_descriptor() {
    let mut k = Kernel::new();
    let first = k.device_desc(&[16, 16], DType::Float16);
    let second = k.device_desc(&[16, 16], DType::Float16);
    let src = k.tile(&[16, 16], DType::Float16);
    k.store(first, src);
    k.store(second, src);

    let lowered = RingDescriptorLowering.lower(&mut k.func, k.for_op, &CoarseSchedule::new(2)).unwrap();
    assert_eq!(lowered, 2);
    assert_eq!(ops_named(&k.func, "global_scratch_alloc").len(), 2);
}

#[test]
fn test_ring_ignores_nested_loops() {
    let mut k = Kernel::new();
    let mut b = Builder::at_end(&mut k.func, k.body);
    let lo = b.const_index(0).unwrap();
    let hi = b.const_index(2).unwrap();
    let one = b.const_index(1).unwrap();
    let (inner, inner_body, _) = b.for_loop(lo, hi, one).unwrap();
    let outer_body = k.body;
    k.body = inner_body;
    k.device_desc(&[16, 16], DType::Float16);
    k.body = outer_body;

    let lowered = RingDescriptorLowering.lower(&mut k.func, k.for_op, &CoarseSchedule::new(3)).unwrap();
    assert_eq!(lowered, 0);
    assert_eq!(ops_named(&k.func, "make_descriptor").len(), 1);
    assert!(k.func.is_live(inner));
}

#[test]
fn test_ring_rejects_non_loop() {
    let mut k = Kernel::new();
    let src = k.tile(&[4, 4], DType::Float32);
    let splat = k.func.defining_op(src).unwrap();

    let err = RingDescriptorLowering.lower(&mut k.func, splat, &CoarseSchedule::new(3)).unwrap_err();
    assert!(matches!(err, PipelineError::NotALoop { op } if op == splat));
}
