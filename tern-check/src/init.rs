#![forbid(unsafe_code)]

//! Constructor checking: argument-to-field binding, topological default
//! scheduling, invariant enforcement, and guarded parameter defaults in
//! callee prologues.

use std::collections::BTreeSet;

use tern_ast::{Block, CallArg, Expr, ExprKind, PackTarget, Span, Stmt};
use tern_mir::{InstKind, MaskSlot, RegisterId, Terminator};
use tern_types::{Binds, EntityDef, EntityId, InvokeDef, ResolvedType, TypeAtom, ValueType};

use crate::env::{TypeEnvironment, VarInfo};
use crate::error::CheckError;
use crate::{Checker, Truth};

impl<'a> Checker<'a> {
    /// Check an entity construction: bind arguments to fields, evaluate
    /// unbound defaults in dependency order, enforce invariants, construct.
    pub(crate) fn check_construct(
        &mut self,
        mut env: TypeEnvironment,
        span: Span,
        id: EntityId,
        binds: Binds,
        args: &[CallArg],
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let def = self.asm.entity(id).clone();
        let entity_name = self.asm.name_of(def.name).to_string();
        let field_tys: Vec<ResolvedType> = def
            .fields
            .iter()
            .map(|f| self.asm.substitute(&f.ty, &binds))
            .collect();

        let mut field_regs: Vec<Option<RegisterId>> = vec![None; def.fields.len()];
        let mut pos_i = 0usize;
        for arg in args {
            let (slot, expr) = match arg {
                CallArg::Positional { expr, .. } => {
                    if pos_i >= def.fields.len() {
                        return Err(CheckError::new(
                            arg.span(),
                            format!("too many arguments in construction of '{entity_name}'"),
                        ));
                    }
                    let slot = pos_i;
                    pos_i += 1;
                    (slot, expr)
                }
                CallArg::Named { name, expr, .. } => {
                    let Some(slot) = def.fields.iter().position(|f| {
                        self.asm.name_of(f.name) == name.node
                    }) else {
                        return Err(CheckError::new(
                            name.span,
                            format!("entity '{}' has no field '{}'", entity_name, name.node),
                        ));
                    };
                    (slot, expr)
                }
                CallArg::Spread { span, .. } => {
                    return Err(CheckError::new(
                        *span,
                        "spread arguments are not legal in construction",
                    ));
                }
                CallArg::Ref { span, .. } => {
                    return Err(CheckError::new(
                        *span,
                        "by-reference arguments are not legal in construction",
                    ));
                }
            };
            if field_regs[slot].is_some() {
                return Err(CheckError::new(
                    arg.span(),
                    format!(
                        "field '{}' is bound more than once",
                        self.asm.name_of(def.fields[slot].name)
                    ),
                ));
            }
            let expected = field_tys[slot].clone();
            let r = self.emit.fresh_register();
            env = self.check_expr_single(env, expr, r, Some(&expected))?;
            let flow = env.expr_result().vtype.flow.clone();
            env.clear_result();
            if !self.asm.subtype_of(&flow, &expected) {
                return Err(CheckError::new(
                    expr.span,
                    format!(
                        "field '{}' of '{}' expects {}, got {}",
                        self.asm.name_of(def.fields[slot].name),
                        entity_name,
                        self.asm.type_display(&expected),
                        self.asm.type_display(&flow)
                    ),
                ));
            }
            field_regs[slot] = Some(r);
        }

        // Required fields with no argument and no default are a hard error.
        for (i, f) in def.fields.iter().enumerate() {
            if field_regs[i].is_none() && f.default.is_none() {
                return Err(CheckError::new(
                    span,
                    format!(
                        "construction of '{}' is missing field '{}'",
                        entity_name,
                        self.asm.name_of(f.name)
                    ),
                ));
            }
        }

        let schedule = self.schedule_slots(&def, &field_regs, span)?;

        // Defaults and invariants see the fields as const bindings.
        env.push_scope();
        for (i, f) in def.fields.iter().enumerate() {
            if let Some(reg) = field_regs[i] {
                env.declare(
                    f.name,
                    VarInfo {
                        decl: field_tys[i].clone(),
                        flow: field_tys[i].clone(),
                        reg,
                        is_const: true,
                        must_defined: true,
                    },
                );
            }
        }
        for i in schedule {
            let f = &def.fields[i];
            let default = f.default.as_ref().expect("scheduled slots carry defaults");
            let expected = field_tys[i].clone();
            let r = self.emit.fresh_register();
            env = self.check_expr_single(env, default, r, Some(&expected))?;
            let flow = env.expr_result().vtype.flow.clone();
            env.clear_result();
            if !self.asm.subtype_of(&flow, &expected) {
                return Err(CheckError::new(
                    default.span,
                    format!(
                        "default initializer of field '{}' has type {}, expected {}",
                        self.asm.name_of(f.name),
                        self.asm.type_display(&flow),
                        self.asm.type_display(&expected)
                    ),
                ));
            }
            field_regs[i] = Some(r);
            env.declare(
                f.name,
                VarInfo {
                    decl: expected.clone(),
                    flow,
                    reg: r,
                    is_const: true,
                    must_defined: true,
                },
            );
        }

        for inv in &def.invariants {
            let cond = self.emit.fresh_register();
            let (tenvs, fenvs) = self.check_condition(env, inv, cond)?;
            if tenvs.is_empty() {
                return Err(CheckError::new(inv.span, "invariant can never hold"));
            }
            if !fenvs.is_empty() {
                let ok_bb = self.emit.fresh_block();
                let fail_bb = self.emit.fresh_block();
                self.emit.set_terminator(Terminator::Branch {
                    cond,
                    then_bb: ok_bb,
                    else_bb: fail_bb,
                });
                self.emit.start_block(fail_bb, inv.span);
                self.emit.set_terminator(Terminator::Abort {
                    msg: "invariant violated".to_string(),
                });
                self.emit.start_block(ok_bb, inv.span);
            }
            env = TypeEnvironment::join(self.asm, inv.span, tenvs)?;
            env.clear_result();
        }
        env.pop_scope();

        let result_ty = ResolvedType::single(TypeAtom::Entity { id, binds });
        let key = self.emit.register_type(&result_ty);
        let regs: Vec<RegisterId> = field_regs
            .into_iter()
            .map(|r| r.expect("every field is bound by now"))
            .collect();
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::ConstructEntity {
                ty: key,
                entity: id,
                args: regs,
            },
        );
        env.set_result(ValueType::of(result_ty), Truth::Unknown, None, trgt);
        Ok(vec![env])
    }

    /// Order the unbound defaulted fields so every default runs after the
    /// fields it reads. Deterministic: within a wave, declaration order.
    fn schedule_slots(
        &self,
        def: &EntityDef,
        field_regs: &[Option<RegisterId>],
        span: Span,
    ) -> Result<Vec<usize>, CheckError> {
        let field_names: Vec<String> = def
            .fields
            .iter()
            .map(|f| self.asm.name_of(f.name).to_string())
            .collect();

        let mut pending: Vec<(usize, BTreeSet<String>)> = Vec::new();
        let mut done: BTreeSet<String> = BTreeSet::new();
        for (i, f) in def.fields.iter().enumerate() {
            if field_regs[i].is_some() {
                done.insert(field_names[i].clone());
                continue;
            }
            let default = f.default.as_ref().expect("missing fields were rejected");
            let deps: BTreeSet<String> = free_expr_names(default, &[])
                .into_iter()
                .filter(|n| field_names.contains(n))
                .collect();
            pending.push((i, deps));
        }

        schedule_waves(&field_names, done, pending).ok_or_else(|| {
            CheckError::new(span, "circular dependency in default initializers")
        })
    }

    /// Callee prologue for optional parameters: each default runs only when
    /// the caller's guard mask says the slot was left unfilled. Defaults are
    /// emitted in dependency order so a default never reads another
    /// parameter's home register before that parameter's own guard ran.
    pub(crate) fn emit_param_defaults(
        &mut self,
        mut env: TypeEnvironment,
        def: &InvokeDef,
        mask: Option<RegisterId>,
    ) -> Result<TypeEnvironment, CheckError> {
        let Some(mask_reg) = mask else {
            return Ok(env);
        };

        let param_names: Vec<String> = def
            .params
            .iter()
            .map(|p| self.asm.name_of(p.name).to_string())
            .collect();

        // Required parameters are always caller-supplied; a defaulted one
        // may not be, so its readers wait for its guard. Mask slots keep
        // their declaration-order numbering.
        let mut slots: Vec<MaskSlot> = vec![MaskSlot(0); def.params.len()];
        let mut next_slot: u8 = 0;
        let mut pending: Vec<(usize, BTreeSet<String>)> = Vec::new();
        let mut done: BTreeSet<String> = BTreeSet::new();
        for (i, p) in def.params.iter().enumerate() {
            let Some(default) = &p.default else {
                done.insert(param_names[i].clone());
                continue;
            };
            slots[i] = MaskSlot(next_slot);
            next_slot += 1;
            let deps: BTreeSet<String> = free_expr_names(default, &[])
                .into_iter()
                .filter(|n| param_names.contains(n))
                .collect();
            pending.push((i, deps));
        }

        let schedule = schedule_waves(&param_names, done, pending).ok_or_else(|| {
            CheckError::new(def.span, "circular dependency in parameter defaults")
        })?;

        for i in schedule {
            let p = &def.params[i];
            let default = p.default.as_ref().expect("scheduled slots carry defaults");
            let this_slot = slots[i];

            let cond = self.emit.fresh_register();
            self.emit.emit(
                p.span,
                Some(cond),
                InstKind::MaskTest {
                    mask: mask_reg,
                    slot: this_slot,
                },
            );
            let skip_bb = self.emit.fresh_block();
            let eval_bb = self.emit.fresh_block();
            self.emit.set_terminator(Terminator::Branch {
                cond,
                then_bb: skip_bb,
                else_bb: eval_bb,
            });
            self.emit.start_block(eval_bb, p.span);

            let home = env
                .lookup(p.name)
                .expect("parameters are declared before defaults run")
                .reg;
            env = self.check_expr_single(env, default, home, Some(&p.ty))?;
            let flow = env.expr_result().vtype.flow.clone();
            env.clear_result();
            if !self.asm.subtype_of(&flow, &p.ty) {
                return Err(CheckError::new(
                    default.span,
                    format!(
                        "default value of type {} is not a subtype of parameter '{}' of type {}",
                        self.asm.type_display(&flow),
                        self.asm.name_of(p.name),
                        self.asm.type_display(&p.ty)
                    ),
                ));
            }
            self.emit.set_terminator(Terminator::Jump(skip_bb));
            self.emit.start_block(skip_bb, p.span);
        }
        Ok(env)
    }
}

/// Wave-based topological order over `(slot index, dependency names)`:
/// each wave takes every pending slot whose dependencies are satisfied,
/// in declaration order. An empty wave means a cycle; `None` is returned.
fn schedule_waves(
    names: &[String],
    mut done: BTreeSet<String>,
    mut pending: Vec<(usize, BTreeSet<String>)>,
) -> Option<Vec<usize>> {
    let mut schedule = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready: Vec<usize> = pending
            .iter()
            .filter(|(_, deps)| deps.is_subset(&done))
            .map(|(i, _)| *i)
            .collect();
        if ready.is_empty() {
            return None;
        }
        for i in &ready {
            done.insert(names[*i].clone());
            schedule.push(*i);
        }
        pending.retain(|(i, _)| !ready.contains(i));
    }
    Some(schedule)
}

/// Names an expression reads that are not bound inside it (or in `bound`).
/// Drives both lambda capture discovery and default-initializer scheduling.
pub(crate) fn free_expr_names(expr: &Expr, bound: &[String]) -> BTreeSet<String> {
    let mut free = BTreeSet::new();
    let mut bound: Vec<String> = bound.to_vec();
    walk_expr(expr, &mut bound, &mut free);
    free
}

fn use_of(name: &str, bound: &[String], free: &mut BTreeSet<String>) {
    if !bound.iter().any(|b| b == name) {
        free.insert(name.to_string());
    }
}

fn walk_expr(expr: &Expr, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::LitNone
        | ExprKind::LitNothing
        | ExprKind::LitBool(_)
        | ExprKind::LitNumber { .. }
        | ExprKind::LitString(_) => {}

        ExprKind::Var(id) => use_of(&id.node, bound, free),

        ExprKind::TupleCtor(elems) | ExprKind::EphemeralCtor(elems) => {
            for e in elems {
                walk_expr(e, bound, free);
            }
        }
        ExprKind::RecordCtor(fields) => {
            for (_, e) in fields {
                walk_expr(e, bound, free);
            }
        }

        ExprKind::Construct { args, .. } => walk_args(args, bound, free),
        ExprKind::Call { callee, args } | ExprKind::CallValue { callee, args } => {
            use_of(&callee.node, bound, free);
            walk_args(args, bound, free);
        }

        ExprKind::Member { base, .. }
        | ExprKind::TryMember { base, .. }
        | ExprKind::Index { base, .. } => walk_expr(base, bound, free),

        ExprKind::Prefix { expr, .. } => walk_expr(expr, bound, free),
        ExprKind::Bin { lhs, rhs, .. }
        | ExprKind::Eq { lhs, rhs, .. }
        | ExprKind::Logic { lhs, rhs, .. } => {
            walk_expr(lhs, bound, free);
            walk_expr(rhs, bound, free);
        }

        ExprKind::IsTest { expr, .. } | ExprKind::AsCast { expr, .. } => {
            walk_expr(expr, bound, free)
        }

        ExprKind::If {
            branches,
            else_expr,
        } => {
            for (c, e) in branches {
                walk_expr(c, bound, free);
                walk_expr(e, bound, free);
            }
            walk_expr(else_expr, bound, free);
        }

        ExprKind::Switch { scrutinee, arms } => {
            walk_expr(scrutinee, bound, free);
            for arm in arms {
                if let tern_ast::SwitchGuard::Lit(g) = &arm.guard {
                    walk_expr(g, bound, free);
                }
                walk_expr(&arm.body, bound, free);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            walk_expr(scrutinee, bound, free);
            for arm in arms {
                walk_expr(&arm.body, bound, free);
            }
        }

        ExprKind::Lambda { params, body } => {
            let depth = bound.len();
            for p in params {
                bound.push(p.name.node.clone());
            }
            walk_expr(body, bound, free);
            bound.truncate(depth);
        }

        ExprKind::BlockExpr(block) => walk_block(block, bound, free),
    }
}

fn walk_args(args: &[CallArg], bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    for arg in args {
        match arg {
            CallArg::Positional { expr, .. }
            | CallArg::Named { expr, .. }
            | CallArg::Spread { expr, .. } => walk_expr(expr, bound, free),
            CallArg::Ref { var, .. } => use_of(&var.node, bound, free),
        }
    }
}

fn walk_block(block: &Block, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    let depth = bound.len();
    for stmt in &block.stmts {
        walk_stmt(stmt, bound, free);
    }
    bound.truncate(depth);
}

fn walk_stmt(stmt: &Stmt, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    match stmt {
        Stmt::VarDecl(s) => {
            if let Some(init) = &s.init {
                walk_expr(init, bound, free);
            }
            bound.push(s.name.node.clone());
        }
        Stmt::VarPack(s) => {
            walk_expr(&s.expr, bound, free);
            for t in &s.names {
                if let PackTarget::Var { name, .. } = t {
                    bound.push(name.node.clone());
                }
            }
        }
        Stmt::Assign(s) => {
            walk_expr(&s.expr, bound, free);
            use_of(&s.target.node, bound, free);
        }
        Stmt::StructuredAssign(s) => {
            walk_expr(&s.expr, bound, free);
            for t in &s.targets {
                if let PackTarget::Var { name, .. } = t {
                    use_of(&name.node, bound, free);
                }
            }
        }
        Stmt::If(s) => {
            for (c, b) in &s.branches {
                walk_expr(c, bound, free);
                walk_block(b, bound, free);
            }
            if let Some(b) = &s.else_block {
                walk_block(b, bound, free);
            }
        }
        Stmt::Switch(s) => {
            walk_expr(&s.scrutinee, bound, free);
            for arm in &s.arms {
                if let tern_ast::SwitchGuard::Lit(g) = &arm.guard {
                    walk_expr(g, bound, free);
                }
                walk_block(&arm.body, bound, free);
            }
        }
        Stmt::Match(s) => {
            walk_expr(&s.scrutinee, bound, free);
            for arm in &s.arms {
                walk_block(&arm.body, bound, free);
            }
        }
        Stmt::Return(s) => {
            if let Some(e) = &s.expr {
                walk_expr(e, bound, free);
            }
        }
        Stmt::Yield(s) => walk_expr(&s.expr, bound, free),
        Stmt::Abort(_) => {}
        Stmt::Assert(s) => walk_expr(&s.cond, bound, free),
        Stmt::Validate(s) => {
            walk_expr(&s.cond, bound, free);
            walk_expr(&s.err, bound, free);
        }
        Stmt::Block(b) => walk_block(b, bound, free),
        Stmt::Expr(e) => walk_expr(e, bound, free),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::span;

    fn var(name: &str) -> Expr {
        Expr {
            span: span(0, 0),
            kind: ExprKind::Var(tern_ast::Ident {
                span: span(0, 0),
                node: name.to_string(),
            }),
        }
    }

    #[test]
    fn lambda_params_are_not_free() {
        let body = Expr {
            span: span(0, 0),
            kind: ExprKind::Bin {
                op: tern_ast::BinOp::Add,
                lhs: Box::new(var("x")),
                rhs: Box::new(var("y")),
            },
        };
        let free = free_expr_names(&body, &["x".to_string()]);
        assert_eq!(free.into_iter().collect::<Vec<_>>(), vec!["y".to_string()]);
    }

    #[test]
    fn block_locals_are_not_free() {
        let block = Block {
            span: span(0, 0),
            stmts: vec![
                Stmt::VarDecl(tern_ast::VarDeclStmt {
                    span: span(0, 0),
                    name: tern_ast::Ident {
                        span: span(0, 0),
                        node: "a".to_string(),
                    },
                    is_const: false,
                    ty: None,
                    init: Some(var("b")),
                }),
                Stmt::Expr(var("a")),
            ],
        };
        let e = Expr {
            span: span(0, 0),
            kind: ExprKind::BlockExpr(block),
        };
        let free = free_expr_names(&e, &[]);
        assert_eq!(free.into_iter().collect::<Vec<_>>(), vec!["b".to_string()]);
    }
}
