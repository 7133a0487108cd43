mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;
use tern_check::{check_invoke, CheckerOptions, TypeEnvironment, VarInfo};
use tern_mir::RegisterId;
use tern_types::{Assembly, Binds, ResolvedType};

use common::*;

fn pool(asm: &Assembly) -> Vec<ResolvedType> {
    vec![
        asm.int_type(),
        asm.nat_type(),
        asm.bool_type(),
        asm.string_type(),
        asm.none_type(),
        asm.nothing_type(),
    ]
}

fn union_from(asm: &Assembly, sel: &BTreeSet<usize>) -> ResolvedType {
    let pool = pool(asm);
    ResolvedType::union_of(sel.iter().map(|&i| pool[i].clone()))
}

fn env_with(asm: &mut Assembly, decl_ty: ResolvedType, flow: ResolvedType) -> TypeEnvironment {
    let x = asm.intern("x");
    let mut env = TypeEnvironment::new(Binds::new());
    env.declare(
        x,
        VarInfo {
            decl: decl_ty,
            flow,
            reg: RegisterId(0),
            is_const: false,
            must_defined: true,
        },
    );
    env
}

proptest! {
    /// Joining a flow with itself changes nothing.
    #[test]
    fn join_is_idempotent(sel in prop::collection::btree_set(0usize..6, 1..=4)) {
        let mut asm = Assembly::new();
        let t = union_from(&asm, &sel);
        let x = asm.intern("x");
        let env = env_with(&mut asm, t.clone(), t.clone());

        let joined =
            TypeEnvironment::join(&asm, sp(), vec![env.clone(), env]).unwrap();
        prop_assert_eq!(&joined.lookup(x).unwrap().flow, &t);
        prop_assert!(joined.lookup(x).unwrap().must_defined);
    }

    /// Every input flow is a subtype of the join.
    #[test]
    fn join_is_an_upper_bound(
        sel1 in prop::collection::btree_set(0usize..6, 1..=4),
        sel2 in prop::collection::btree_set(0usize..6, 1..=4),
    ) {
        let mut asm = Assembly::new();
        let t1 = union_from(&asm, &sel1);
        let t2 = union_from(&asm, &sel2);
        let decl = ResolvedType::union_of([t1.clone(), t2.clone()]);
        let x = asm.intern("x");

        let a = env_with(&mut asm, decl.clone(), t1.clone());
        let b = env_with(&mut asm, decl, t2.clone());
        let joined = TypeEnvironment::join(&asm, sp(), vec![a, b]).unwrap();
        let j = &joined.lookup(x).unwrap().flow;
        prop_assert!(asm.subtype_of(&t1, j));
        prop_assert!(asm.subtype_of(&t2, j));
    }

    /// Join order does not matter.
    #[test]
    fn join_is_commutative(
        sel1 in prop::collection::btree_set(0usize..6, 1..=4),
        sel2 in prop::collection::btree_set(0usize..6, 1..=4),
    ) {
        let mut asm = Assembly::new();
        let t1 = union_from(&asm, &sel1);
        let t2 = union_from(&asm, &sel2);
        let decl = ResolvedType::union_of([t1.clone(), t2.clone()]);
        let x = asm.intern("x");

        let a = env_with(&mut asm, decl.clone(), t1);
        let b = env_with(&mut asm, decl, t2);
        let ab = TypeEnvironment::join(&asm, sp(), vec![a.clone(), b.clone()]).unwrap();
        let ba = TypeEnvironment::join(&asm, sp(), vec![b, a]).unwrap();
        prop_assert_eq!(
            &ab.lookup(x).unwrap().flow,
            &ba.lookup(x).unwrap().flow
        );
    }

    /// A type test over disjoint nominal options partitions the union: each
    /// option lands in exactly one part, nothing is lost or invented.
    #[test]
    fn split_partitions_disjoint_unions(
        sel in prop::collection::btree_set(0usize..6, 1..=4),
        target_idx in 0usize..6,
    ) {
        let asm = Assembly::new();
        let t = union_from(&asm, &sel);
        let target = pool(&asm)[target_idx].clone();

        let (tp, fp) = asm.split_on(&t, &target);
        let mut rebuilt = Vec::new();
        if let Some(p) = &tp {
            prop_assert!(asm.subtype_of(p, &target));
            rebuilt.extend(p.options().iter().cloned());
        }
        if let Some(p) = &fp {
            rebuilt.extend(p.options().iter().cloned());
        }
        prop_assert_eq!(ResolvedType::new(rebuilt), t);
    }

    /// The binder is total: any mix of positional arguments against any
    /// required/optional split either binds or reports an error, and a
    /// matching count always binds.
    #[test]
    fn binder_is_total_over_positional_shapes(
        required in 0usize..4,
        optional in 0usize..3,
        supplied in 0usize..8,
    ) {
        let mut asm = Assembly::new();
        let int_ty = asm.int_type();

        let mut params = Vec::new();
        for i in 0..required {
            params.push(param(&mut asm, &format!("r{i}"), int_ty.clone()));
        }
        for i in 0..optional {
            params.push(param_opt(&mut asm, &format!("o{i}"), int_ty.clone(), int("0")));
        }
        declare_fn(&mut asm, "g", params, int_ty.clone());
        declare_fn(&mut asm, "f", Vec::new(), int_ty);

        let args = (0..supplied).map(|_| pos(int("1"))).collect();
        let body = blk(vec![ret(call("g", args))]);
        let outcome = check_invoke(&mut asm, &decl("f", body), &CheckerOptions::default());

        let fits = supplied >= required && supplied <= required + optional;
        prop_assert_eq!(outcome.is_ok(), fits);
    }
}
