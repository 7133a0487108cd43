mod common;

use common::*;
use tern_ast::Stmt;
use tern_mir::InstKind;
use tern_types::{Assembly, InvokeDef, LiteralTag, RefKind, ResolvedType, RestParam};
use tern_check::{check_invoke, CheckerOptions};

fn check_ok(asm: &mut Assembly, d: tern_ast::InvokeDecl) -> Vec<tern_mir::MirBody> {
    let bodies =
        check_invoke(asm, &d, &CheckerOptions::default()).expect("declaration should check");
    for b in &bodies {
        tern_mir::validate_body(b).expect("emitted body should be well formed");
    }
    bodies
}

fn check_err(asm: &mut Assembly, d: tern_ast::InvokeDecl) -> String {
    check_invoke(asm, &d, &CheckerOptions::default())
        .err()
        .expect("declaration should fail")
        .message
}

fn insts(body: &tern_mir::MirBody) -> Vec<&InstKind> {
    body.blocks
        .iter()
        .flat_map(|b| b.insts.iter().map(|i| &i.kind))
        .collect()
}

#[test]
fn missing_required_argument_is_an_error() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "x", int_ty.clone())];
    declare_fn(&mut asm, "g", params, int_ty.clone());
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let msg = check_err(&mut asm, decl("f", blk(vec![ret(call("g", vec![]))])));
    assert!(msg.contains("missing required argument 'x'"), "{msg}");
}

#[test]
fn named_arguments_fill_slots_in_any_order() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![
        param(&mut asm, "x", int_ty.clone()),
        param(&mut asm, "y", int_ty.clone()),
    ];
    declare_fn(&mut asm, "g", params, int_ty.clone());
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let body = blk(vec![ret(call(
        "g",
        vec![named("y", int("1")), named("x", int("2"))],
    ))]);
    check_ok(&mut asm, decl("f", body));
}

#[test]
fn omitted_optional_rides_a_placeholder_and_a_cleared_mask_bit() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![
        param(&mut asm, "x", int_ty.clone()),
        param_opt(&mut asm, "y", int_ty.clone(), int("7")),
    ];
    declare_fn(&mut asm, "g", params, int_ty.clone());
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let body = blk(vec![ret(call("g", vec![pos(int("1"))]))]);
    let bodies = check_ok(&mut asm, decl("f", body));
    let kinds = insts(&bodies[0]);

    let mask = kinds.iter().find_map(|k| match k {
        InstKind::LoadMask { bits, slots } => Some((*bits, *slots)),
        _ => None,
    });
    assert_eq!(mask, Some((0, 1)));
    assert!(kinds.iter().any(|k| matches!(
        k,
        InstKind::Invoke { mask: Some(_), args, .. } if args.len() == 2
    )));
}

#[test]
fn callee_declares_the_mask_first_and_tests_each_slot() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![
        param(&mut asm, "x", int_ty.clone()),
        param_opt(&mut asm, "y", int_ty.clone(), int("7")),
    ];
    declare_fn(&mut asm, "g", params, int_ty);

    let bodies = check_ok(&mut asm, decl("g", blk(vec![ret(add(v("x"), v("y")))])));
    let body = &bodies[0];
    assert_eq!(asm.name_of(body.params[0].name), "$mask");
    assert_eq!(body.params.len(), 3);
    assert!(insts(body)
        .iter()
        .any(|k| matches!(k, InstKind::MaskTest { .. })));
}

#[test]
fn parameter_defaults_run_after_the_parameters_they_read() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    // g(a: Int = b + 1, b: Int = 1): b's guard must run before a's default
    // reads b's home register.
    let params = vec![
        param_opt(&mut asm, "a", int_ty.clone(), add(v("b"), int("1"))),
        param_opt(&mut asm, "b", int_ty.clone(), int("1")),
    ];
    declare_fn(&mut asm, "g", params, int_ty);

    let bodies = check_ok(&mut asm, decl("g", blk(vec![ret(v("a"))])));
    let body = &bodies[0];
    // params: $mask, a, b.
    let b_home = body.params[2].reg;
    let flat: Vec<&tern_mir::Inst> = body.blocks.iter().flat_map(|b| &b.insts).collect();
    let write = flat
        .iter()
        .position(|i| i.dest == Some(b_home))
        .expect("b's default writes its home register");
    let read = flat
        .iter()
        .position(|i| matches!(&i.kind, InstKind::Move { src } if *src == b_home))
        .expect("a's default reads b");
    assert!(write < read, "write at {write}, read at {read}");
}

#[test]
fn circular_parameter_defaults_are_an_error() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![
        param_opt(&mut asm, "a", int_ty.clone(), v("b")),
        param_opt(&mut asm, "b", int_ty.clone(), v("a")),
    ];
    declare_fn(&mut asm, "g", params, int_ty);

    let msg = check_err(&mut asm, decl("g", blk(vec![ret(v("a"))])));
    assert!(msg.contains("circular dependency in parameter defaults"), "{msg}");
}

#[test]
fn leftover_positionals_pack_into_the_rest_collection() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let list = asm.declare_entity("IntList", &[], Vec::new());
    let list_ty = ResolvedType::entity(list);
    let name = asm.intern("g");
    let xs = asm.intern("xs");
    asm.declare_invoke(InvokeDef {
        span: sp(),
        name,
        terms: Vec::new(),
        params: Vec::new(),
        rest: Some(RestParam {
            name: xs,
            ty: list_ty.clone(),
            elem: int_ty.clone(),
        }),
        result: int_ty.clone(),
    });
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let body = blk(vec![ret(call(
        "g",
        vec![pos(int("1")), pos(int("2")), pos(int("3"))],
    ))]);
    let bodies = check_ok(&mut asm, decl("f", body));
    let kinds = insts(&bodies[0]);
    assert!(kinds.iter().any(|k| matches!(
        k,
        InstKind::ConstructCollection { args, .. } if args.len() == 3
    )));
    assert!(kinds.iter().any(|k| matches!(
        k,
        InstKind::Invoke { args, .. } if args.len() == 1
    )));
}

#[test]
fn out_opt_forks_definedness_at_the_callsite() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let bool_ty = asm.bool_type();
    let params = vec![param_ref(&mut asm, "y", int_ty.clone(), RefKind::OutOpt)];
    declare_fn(&mut asm, "try_get", params, bool_ty);
    declare_fn(&mut asm, "f", Vec::new(), int_ty.clone());
    declare_fn(&mut asm, "f2", Vec::new(), int_ty);

    // The callee may not have assigned y; reading it afterwards is an error.
    let body = blk(vec![
        let_var("y", Some(sig("Int")), None),
        Stmt::Expr(call("try_get", vec![by_ref("y")])),
        ret(v("y")),
    ]);
    let msg = check_err(&mut asm, decl("f", body));
    assert!(msg.contains("possibly unassigned"), "{msg}");

    // Reassigning on the way out collapses the fork.
    let body = blk(vec![
        let_var("y", Some(sig("Int")), None),
        Stmt::Expr(call("try_get", vec![by_ref("y")])),
        assign("y", int("0")),
        ret(v("y")),
    ]);
    check_ok(&mut asm, decl("f2", body));
}

#[test]
fn ref_arguments_must_be_assigned_and_exactly_typed() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let none_ty = asm.none_type();
    let params = vec![param_ref(&mut asm, "y", int_ty.clone(), RefKind::Ref)];
    declare_fn(&mut asm, "bump", params, none_ty);
    declare_fn(&mut asm, "f", Vec::new(), int_ty.clone());
    declare_fn(&mut asm, "f2", Vec::new(), int_ty.clone());
    declare_fn(&mut asm, "f3", Vec::new(), int_ty);

    let body = blk(vec![
        let_var("y", Some(sig("Int")), None),
        Stmt::Expr(call("bump", vec![by_ref("y")])),
        ret(v("y")),
    ]);
    let msg = check_err(&mut asm, decl("f", body));
    assert!(msg.contains("may be unassigned"), "{msg}");

    let body = blk(vec![
        let_var("y", Some(sig_union(vec![sig("Int"), sig("None")])), Some(int("1"))),
        Stmt::Expr(call("bump", vec![by_ref("y")])),
        ret(int("0")),
    ]);
    let msg = check_err(&mut asm, decl("f2", body));
    assert!(msg.contains("match the parameter type exactly"), "{msg}");

    let body = blk(vec![
        let_var("y", Some(sig("Int")), Some(int("1"))),
        Stmt::Expr(call("bump", vec![by_ref("y")])),
        ret(v("y")),
    ]);
    check_ok(&mut asm, decl("f3", body));
}

#[test]
fn literal_tagged_overloads_win_on_matching_literals() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let nat_ty = asm.nat_type();

    // plus(0, y) -> Nat; plus(x, y) -> Int.
    let tagged_params = vec![
        param_lit(&mut asm, "x", int_ty.clone(), LiteralTag::Int(0)),
        param(&mut asm, "y", int_ty.clone()),
    ];
    let tagged = declare_fn(&mut asm, "plus", tagged_params, nat_ty.clone());
    let plain_params = vec![
        param(&mut asm, "x", int_ty.clone()),
        param(&mut asm, "y", int_ty.clone()),
    ];
    let plain = declare_fn(&mut asm, "plus", plain_params, int_ty.clone());
    asm.declare_operator("plus", tagged);
    asm.declare_operator("plus", plain);

    declare_fn(&mut asm, "zero_case", Vec::new(), nat_ty);
    let body = blk(vec![ret(call("plus", vec![pos(int("0")), pos(int("1"))]))]);
    let bodies = check_ok(&mut asm, decl("zero_case", body));
    assert!(insts(&bodies[0]).iter().any(|k| matches!(
        k,
        InstKind::Invoke { invoke, .. } if *invoke == tagged
    )));

    declare_fn(&mut asm, "general_case", Vec::new(), int_ty);
    let body = blk(vec![ret(call("plus", vec![pos(int("2")), pos(int("3"))]))]);
    let bodies = check_ok(&mut asm, decl("general_case", body));
    assert!(insts(&bodies[0]).iter().any(|k| matches!(
        k,
        InstKind::Invoke { invoke, .. } if *invoke == plain
    )));
}
