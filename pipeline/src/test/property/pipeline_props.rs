//! Invariants of the rewritten loop over random store mixes.

use std::collections::HashSet;

use proptest::prelude::*;

use stowage_dtype::test::generators::element_dtype;
use stowage_ir::prelude::*;

use crate::async_store::BufferKey;
use crate::test::helpers::*;

#[derive(Debug, Clone, Copy)]
enum Variant {
    Plain,
    Reduce(ReduceKind),
    Scatter,
}

fn arb_variant() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Variant::Plain),
        prop_oneof![Just(ReduceKind::Add), Just(ReduceKind::Min), Just(ReduceKind::Max)].prop_map(Variant::Reduce),
        Just(Variant::Scatter),
    ]
}

fn arb_shape() -> impl Strategy<Value = Vec<i64>> {
    prop_oneof![Just(vec![64, 64]), Just(vec![32, 128]), Just(vec![16, 16])]
}

/// (tile shape, element type, variant, device-side descriptor)
type StoreSpec = (Vec<i64>, DType, Variant, bool);

fn arb_stores() -> impl Strategy<Value = Vec<StoreSpec>> {
    prop::collection::vec((arb_shape(), element_dtype(), arb_variant(), any::<bool>()), 1..8)
}

fn build(specs: &[StoreSpec]) -> Kernel {
    let mut k = Kernel::new();
    for (shape, dtype, variant, device) in specs {
        let desc_shape = match variant {
            Variant::Scatter => vec![1, shape[1]],
            _ => shape.clone(),
        };
        let desc = if *device {
            k.device_desc(&desc_shape, dtype.clone())
        } else {
            k.host_desc(&desc_shape, dtype.clone())
        };
        let src = k.tile(shape, dtype.clone());
        match variant {
            Variant::Plain => {
                k.store(desc, src);
            }
            Variant::Reduce(kind) => {
                k.reduce(*kind, desc, src);
            }
            Variant::Scatter => {
                k.scatter(desc, src);
            }
        }
    }
    k
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_store_becomes_one_issue(specs in arb_stores()) {
        let mut k = build(&specs);
        let (changed, _) = k.run();
        prop_assert!(changed);

        let mut leftover = 0;
        let mut issues = 0;
        k.func.walk(k.func.entry(), &mut |_, op| {
            leftover += usize::from(op.is_descriptor_store_like());
            issues += usize::from(op.is_async_store());
            WalkResult::Advance
        });
        prop_assert_eq!(leftover, 0);
        prop_assert_eq!(issues, specs.len());
        prop_assert_eq!(stowage_ir::verify(&k.func), Ok(()));
    }

    #[test]
    fn one_buffer_per_tile_type(specs in arb_stores()) {
        let mut k = build(&specs);
        k.run();

        let keys: HashSet<_> = specs
            .iter()
            .map(|(shape, dtype, _, _)| BufferKey::of(&tile(shape, dtype.clone())))
            .collect();
        prop_assert_eq!(ops_named(&k.func, "local_alloc").len(), keys.len());
        prop_assert_eq!(ops_named(&k.func, "local_dealloc").len(), keys.len());
    }

    #[test]
    fn issue_preceded_by_wait_stage_fence(specs in arb_stores()) {
        let mut k = build(&specs);
        k.run();

        let ops = k.func.block_ops(k.body);
        for (at, &op) in ops.iter().enumerate() {
            if !k.func.op(op).is_async_store() {
                continue;
            }
            prop_assert!(at >= 3);
            prop_assert!(
                matches!(k.func.op(ops[at - 3]), Op::AsyncStoreWait { pendings: 0 }),
                "expected a drained wait"
            );
            prop_assert!(matches!(k.func.op(ops[at - 2]), Op::LocalStore { .. }), "expected a staging store");
            prop_assert!(matches!(k.func.op(ops[at - 1]), Op::FenceAsyncShared { cluster: false }), "expected a fence");
        }
    }

    #[test]
    fn drain_precedes_deallocs(specs in arb_stores()) {
        let mut k = build(&specs);
        k.run();

        let entry = k.func.entry();
        let ops = k.func.block_ops(entry);
        let after: Vec<_> = ops[position(&k.func, k.for_op) + 1..].iter().map(|&op| k.func.op(op)).collect();
        prop_assert!(matches!(after[0], Op::AsyncStoreWait { pendings: 0 }), "expected a drain after the loop");
        let only_deallocs = after[1..].iter().all(|op| matches!(op, Op::LocalDealloc { .. }));
        prop_assert!(only_deallocs, "expected only deallocs after the drain");

        let freed: HashSet<_> = after[1..]
            .iter()
            .filter_map(|op| match op {
                Op::LocalDealloc { buffer } => Some(*buffer),
                _ => None,
            })
            .collect();
        prop_assert_eq!(freed.len(), after.len() - 1);
    }

    #[test]
    fn trigger_iff_device_side(specs in arb_stores()) {
        let mut k = build(&specs);
        let (_, lowering) = k.run();

        let device = specs.iter().any(|(_, _, _, device)| *device);
        prop_assert_eq!(lowering.calls.len(), usize::from(device));
    }
}
