mod common;

use common::*;
use tern_ast::{
    ExprKind, IfStmt, MatchGuard, MatchStmt, MatchStmtArm, NumKind, Program, Stmt, YieldStmt,
};
use tern_mir::{InstKind, Terminator};
use tern_types::{Assembly, FieldDef, ResolvedType};
use tern_check::{check_invoke, check_program, CheckerOptions};

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

#[test]
fn simple_return_checks_and_emits() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "one", Vec::new(), int_ty);

    let bodies = check_ok(&mut asm, decl("one", blk(vec![ret(int("1"))])));
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    let entry = body.block(body.entry).unwrap();
    assert!(matches!(entry.term, Some(Terminator::Return(Some(_)))));
}

#[test]
fn falling_off_a_value_returning_body_is_an_error() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let msg = check_err(&mut asm, decl("f", blk(vec![])));
    assert!(msg.contains("without returning"), "{msg}");
}

#[test]
fn is_test_narrows_a_union_parameter() {
    let mut asm = Assembly::new();
    let int_or_none = ResolvedType::union_of([asm.int_type(), asm.none_type()]);
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "x", int_or_none)];
    declare_fn(&mut asm, "f", params, int_ty);

    // if (x is Int) { return x; } return 0;
    let body = blk(vec![
        Stmt::If(IfStmt {
            span: sp(),
            branches: vec![(is_test(v("x"), sig("Int")), blk(vec![ret(v("x"))]))],
            else_block: None,
        }),
        ret(int("0")),
    ]);
    check_ok(&mut asm, decl("f", body));
}

#[test]
fn returning_an_unnarrowed_union_is_an_error() {
    let mut asm = Assembly::new();
    let int_or_none = ResolvedType::union_of([asm.int_type(), asm.none_type()]);
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "x", int_or_none)];
    declare_fn(&mut asm, "f", params, int_ty);

    let msg = check_err(&mut asm, decl("f", blk(vec![ret(v("x"))])));
    assert!(msg.contains("not a subtype"), "{msg}");
}

#[test]
fn literal_range_depends_on_numeric_kind() {
    // One past i64::MAX: out of range for Int, fine for Nat and BigInt.
    let big = "9223372036854775808";

    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "f", Vec::new(), int_ty);
    let msg = check_err(&mut asm, decl("f", blk(vec![ret(lit(big, NumKind::Int))])));
    assert!(msg.contains("out of range for Int"), "{msg}");

    let mut asm = Assembly::new();
    let nat_ty = asm.nat_type();
    declare_fn(&mut asm, "g", Vec::new(), nat_ty);
    check_ok(&mut asm, decl("g", blk(vec![ret(lit(big, NumKind::Nat))])));

    let mut asm = Assembly::new();
    let bi_ty = asm.big_int_type();
    declare_fn(&mut asm, "h", Vec::new(), bi_ty);
    check_ok(
        &mut asm,
        decl("h", blk(vec![ret(lit(big, NumKind::BigInt))])),
    );
}

#[test]
fn non_exhaustive_match_gets_an_implicit_abort_arm() {
    let mut asm = Assembly::new();
    let int_or_none = ResolvedType::union_of([asm.int_type(), asm.none_type()]);
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "x", int_or_none)];
    declare_fn(&mut asm, "f", params, int_ty);

    // match (x) { Int => { return x; } }  -- the None case aborts.
    let body = blk(vec![Stmt::Match(MatchStmt {
        span: sp(),
        scrutinee: v("x"),
        arms: vec![MatchStmtArm {
            span: sp(),
            guard: MatchGuard::Type(sig("Int")),
            body: blk(vec![ret(v("x"))]),
        }],
    })]);
    let bodies = check_ok(&mut asm, decl("f", body));
    let aborts: Vec<&str> = bodies[0]
        .blocks
        .iter()
        .filter_map(|b| match &b.term {
            Some(Terminator::Abort { msg }) => Some(msg.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(aborts, vec!["non-exhaustive match"]);
}

#[test]
fn reading_a_possibly_unassigned_variable_is_an_error() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let body = blk(vec![
        let_var("y", Some(sig("Int")), None),
        ret(v("y")),
    ]);
    let msg = check_err(&mut asm, decl("f", body));
    assert!(msg.contains("possibly unassigned"), "{msg}");
}

#[test]
fn assignment_defines_on_both_branches_before_use() {
    let mut asm = Assembly::new();
    let bool_ty = asm.bool_type();
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "c", bool_ty)];
    declare_fn(&mut asm, "f", params, int_ty);

    let body = blk(vec![
        let_var("y", Some(sig("Int")), None),
        Stmt::If(IfStmt {
            span: sp(),
            branches: vec![(v("c"), blk(vec![assign("y", int("1"))]))],
            else_block: Some(blk(vec![assign("y", int("2"))])),
        }),
        ret(v("y")),
    ]);
    check_ok(&mut asm, decl("f", body));
}

#[test]
fn default_initializers_run_in_dependency_order() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    // Declared c, b, a; the dependencies force evaluation a, b, c.
    let c = asm.intern("c");
    let b = asm.intern("b");
    let a = asm.intern("a");
    let entity = asm.declare_entity(
        "P",
        &[],
        vec![
            FieldDef {
                span: sp(),
                name: c,
                ty: int_ty.clone(),
                default: Some(add(v("b"), int("1"))),
            },
            FieldDef {
                span: sp(),
                name: b,
                ty: int_ty.clone(),
                default: Some(add(v("a"), int("1"))),
            },
            FieldDef {
                span: sp(),
                name: a,
                ty: int_ty.clone(),
                default: Some(int("1")),
            },
        ],
    );
    let p_ty = ResolvedType::entity(entity);
    declare_fn(&mut asm, "f", Vec::new(), p_ty);

    let body = blk(vec![ret(ex(ExprKind::Construct {
        ty: sig("P"),
        args: Vec::new(),
    }))]);
    let bodies = check_ok(&mut asm, decl("f", body));

    // Registers are allocated in evaluation order, so the argument registers
    // (declaration order c, b, a) must be strictly descending.
    let ctor_args = bodies[0]
        .blocks
        .iter()
        .flat_map(|blk| &blk.insts)
        .find_map(|i| match &i.kind {
            InstKind::ConstructEntity { args, .. } => Some(args.clone()),
            _ => None,
        })
        .expect("constructor emitted");
    assert_eq!(ctor_args.len(), 3);
    assert!(ctor_args[0].0 > ctor_args[1].0);
    assert!(ctor_args[1].0 > ctor_args[2].0);
}

#[test]
fn circular_default_initializers_are_an_error() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let a = asm.intern("a");
    let b = asm.intern("b");
    let entity = asm.declare_entity(
        "Q",
        &[],
        vec![
            FieldDef {
                span: sp(),
                name: a,
                ty: int_ty.clone(),
                default: Some(v("b")),
            },
            FieldDef {
                span: sp(),
                name: b,
                ty: int_ty.clone(),
                default: Some(v("a")),
            },
        ],
    );
    let q_ty = ResolvedType::entity(entity);
    declare_fn(&mut asm, "f", Vec::new(), q_ty);

    let body = blk(vec![ret(ex(ExprKind::Construct {
        ty: sig("Q"),
        args: Vec::new(),
    }))]);
    let msg = check_err(&mut asm, decl("f", body));
    assert!(msg.contains("circular dependency"), "{msg}");
}

#[test]
fn invariants_emit_a_guarded_abort() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let a = asm.intern("a");
    let entity = asm.declare_entity(
        "R",
        &[],
        vec![FieldDef {
            span: sp(),
            name: a,
            ty: int_ty.clone(),
            default: None,
        }],
    );
    asm.set_invariants(entity, vec![gt(v("a"), int("0"))]);
    let r_ty = ResolvedType::entity(entity);
    declare_fn(&mut asm, "f", Vec::new(), r_ty);

    let body = blk(vec![ret(ex(ExprKind::Construct {
        ty: sig("R"),
        args: vec![named("a", int("5"))],
    }))]);
    let bodies = check_ok(&mut asm, decl("f", body));
    assert!(bodies[0].blocks.iter().any(|b| matches!(
        &b.term,
        Some(Terminator::Abort { msg }) if msg == "invariant violated"
    )));
}

#[test]
fn expression_blocks_yield_their_value() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let block_expr = ex(ExprKind::BlockExpr(blk(vec![Stmt::Yield(YieldStmt {
        span: sp(),
        expr: int("3"),
    })])));
    let body = blk(vec![
        let_var("z", Some(sig("Int")), Some(block_expr)),
        ret(v("z")),
    ]);
    check_ok(&mut asm, decl("f", body));
}

#[test]
fn one_bad_declaration_does_not_stop_its_neighbours() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "bad", Vec::new(), int_ty.clone());
    declare_fn(&mut asm, "good", Vec::new(), int_ty);

    let program = Program {
        invokes: vec![
            decl("bad", blk(vec![ret(v("no_such_var"))])),
            decl("good", blk(vec![ret(int("1"))])),
        ],
    };
    let out = check_program(&mut asm, &program, None, CheckerOptions::default());
    assert_eq!(out.bodies.len(), 1);
    assert_eq!(out.diagnostics.len(), 1);
    assert!(out.diagnostics.rows()[0].message.contains("no_such_var"));
}

#[test]
fn rendered_bodies_name_their_blocks_and_registers() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    let params = vec![param(&mut asm, "x", int_ty.clone())];
    declare_fn(&mut asm, "f", params, int_ty);

    let bodies = check_ok(&mut asm, decl("f", blk(vec![ret(add(v("x"), int("1")))])));
    let text = tern_mir::render_body(&bodies[0], &asm);
    assert!(text.starts_with("fn f {"), "{text}");
    assert!(text.contains("param x: Int"), "{text}");
    assert!(text.contains("bb0:"), "{text}");
    assert!(text.contains("return r"), "{text}");
}

#[test]
fn lambdas_emit_auxiliary_bodies() {
    let mut asm = Assembly::new();
    let int_ty = asm.int_type();
    declare_fn(&mut asm, "f", Vec::new(), int_ty);

    let lambda = ex(ExprKind::Lambda {
        params: vec![tern_ast::LambdaParam {
            span: sp(),
            name: ident("a"),
            ty: Some(sig("Int")),
        }],
        body: Box::new(add(v("a"), int("1"))),
    });
    let call_g = ex(ExprKind::CallValue {
        callee: ident("g"),
        args: vec![pos(int("5"))],
    });
    let body = blk(vec![
        let_var("g", None, Some(lambda)),
        ret(call_g),
    ]);
    let bodies = check_ok(&mut asm, decl("f", body));
    assert_eq!(bodies.len(), 2);
    let aux_name = asm.name_of(bodies[0].name);
    assert!(aux_name.contains("$lambda$"), "{aux_name}");
}
