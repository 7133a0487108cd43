#![forbid(unsafe_code)]

use tern_ast::{EqOp, Expr, ExprKind, LogicOp, NumKind, Span};
use tern_mir::{Const, InstKind, RegisterId, Terminator};
use tern_types::{
    FunctionParam, FunctionType, RefKind, ResolvedType, Symbol, TypeAtom, ValueType,
};

use crate::env::{Truth, TypeEnvironment, VarInfo};
use crate::error::CheckError;
use crate::init::free_expr_names;
use crate::{Checker, YieldFrame};

/// Presence of a property/index on one type option.
enum Presence {
    Present(ResolvedType),
    Absent,
}

impl<'a> Checker<'a> {
    /// Check one expression into `trgt`, returning the resulting flows.
    /// Boolean expressions may return several flows (one per truth
    /// outcome, each carrying its narrowings); everything else returns one.
    pub(crate) fn check_expr(
        &mut self,
        mut env: TypeEnvironment,
        expr: &Expr,
        trgt: RegisterId,
        infer: Option<&ResolvedType>,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::LitNone => {
                self.emit
                    .emit(span, Some(trgt), InstKind::LoadConst { value: Const::None });
                let ty = self.asm.none_type();
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::LitNothing => {
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::LoadConst {
                        value: Const::Nothing,
                    },
                );
                let ty = self.asm.nothing_type();
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::LitBool(b) => {
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::LoadConst {
                        value: Const::Bool(*b),
                    },
                );
                let ty = self.asm.bool_type();
                env.set_result(ValueType::of(ty), Truth::of_bool(*b), None, trgt);
                Ok(vec![env])
            }

            ExprKind::LitNumber { digits, tag } => {
                let kind = match tag {
                    Some(k) => *k,
                    None => self.num_kind_of_hint(infer).ok_or_else(|| {
                        CheckError::new(
                            span,
                            "untagged numeric literal requires a typed context",
                        )
                    })?,
                };
                let (value, ty) = self.parse_number(span, digits, kind)?;
                self.emit
                    .emit(span, Some(trgt), InstKind::LoadConst { value });
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::LitString(s) => {
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::LoadConst {
                        value: Const::Str(s.clone()),
                    },
                );
                let ty = self.asm.string_type();
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::Var(name) => {
                let sym = self.asm.lookup_symbol(&name.node);
                if let Some(sym) = sym {
                    if let Some(info) = env.lookup(sym) {
                        if !info.must_defined {
                            return Err(CheckError::new(
                                span,
                                format!("use of possibly unassigned variable '{}'", name.node),
                            ));
                        }
                        let vtype = ValueType::new(info.decl.clone(), info.flow.clone());
                        let src = info.reg;
                        self.emit.emit(span, Some(trgt), InstKind::Move { src });
                        env.set_result(vtype, Truth::Unknown, Some(sym), trgt);
                        return Ok(vec![env]);
                    }
                    if let Some((id, def)) = self.asm.const_by_name(sym) {
                        let ty = def.ty.clone();
                        self.emit
                            .emit(span, Some(trgt), InstKind::LoadGlobal { konst: id });
                        self.set_plain_result(&mut env, ty, trgt);
                        return Ok(vec![env]);
                    }
                }
                Err(CheckError::new(
                    span,
                    format!("unknown variable '{}'", name.node),
                ))
            }

            ExprKind::TupleCtor(elems) => {
                let hints = match infer.and_then(|t| t.as_unique()) {
                    Some(TypeAtom::Tuple { members, complete })
                        if *complete && members.len() == elems.len() =>
                    {
                        members.clone()
                    }
                    _ => Vec::new(),
                };
                let mut regs = Vec::with_capacity(elems.len());
                let mut members = Vec::with_capacity(elems.len());
                for (i, e) in elems.iter().enumerate() {
                    let hint = hints.get(i);
                    let r = self.emit.fresh_register();
                    env = self.check_expr_single(env, e, r, hint)?;
                    let flow = env.expr_result().vtype.flow.clone();
                    members.push(self.structural_member_type(e.span, flow, hint)?);
                    regs.push(r);
                }
                let ty = ResolvedType::single(TypeAtom::Tuple {
                    members,
                    complete: true,
                });
                let key = self.emit.register_type(&ty);
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::ConstructTuple { ty: key, args: regs },
                );
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::RecordCtor(fields) => {
                let hint_props: Vec<(Symbol, ResolvedType)> =
                    match infer.and_then(|t| t.as_unique()) {
                        Some(TypeAtom::Record { props }) => props.clone(),
                        _ => Vec::new(),
                    };
                let mut regs = Vec::with_capacity(fields.len());
                let mut props = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    let sym = self.asm.intern(&name.node);
                    if props.iter().any(|(s, _)| *s == sym) {
                        return Err(CheckError::new(
                            name.span,
                            format!("duplicate record property '{}'", name.node),
                        ));
                    }
                    let hint = hint_props.iter().find(|(s, _)| *s == sym).map(|(_, t)| t);
                    let hint = hint.cloned();
                    let r = self.emit.fresh_register();
                    env = self.check_expr_single(env, e, r, hint.as_ref())?;
                    let flow = env.expr_result().vtype.flow.clone();
                    props.push((sym, self.structural_member_type(e.span, flow, hint.as_ref())?));
                    regs.push((sym, r));
                }
                props.sort_by_key(|(s, _)| *s);
                let ty = ResolvedType::single(TypeAtom::Record { props });
                let key = self.emit.register_type(&ty);
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::ConstructRecord {
                        ty: key,
                        props: regs,
                    },
                );
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::EphemeralCtor(elems) => {
                let hints = match infer.and_then(|t| t.as_unique()) {
                    Some(TypeAtom::EphemeralList { members })
                        if members.len() == elems.len() =>
                    {
                        members.clone()
                    }
                    _ => Vec::new(),
                };
                let mut regs = Vec::with_capacity(elems.len());
                let mut members = Vec::with_capacity(elems.len());
                for (i, e) in elems.iter().enumerate() {
                    let hint = hints.get(i);
                    let r = self.emit.fresh_register();
                    env = self.check_expr_single(env, e, r, hint)?;
                    let flow = env.expr_result().vtype.flow.clone();
                    members.push(self.structural_member_type(e.span, flow, hint)?);
                    regs.push(r);
                }
                let ty = ResolvedType::single(TypeAtom::EphemeralList { members });
                let key = self.emit.register_type(&ty);
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::ConstructEphemeral { ty: key, args: regs },
                );
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }

            ExprKind::Construct { ty, args } => {
                let target = self.asm.normalize_type(ty, &env.term_binds)?;
                let Some(TypeAtom::Entity { id, binds }) = target.as_unique().cloned() else {
                    return Err(CheckError::new(
                        ty.span,
                        format!(
                            "construction requires a unique entity type, got {}",
                            self.asm.type_display(&target)
                        ),
                    ));
                };
                self.check_construct(env, span, id, binds, args, trgt)
            }

            ExprKind::Call { callee, args } => self.check_call(env, span, callee, args, trgt),

            ExprKind::CallValue { callee, args } => {
                self.check_value_call(env, span, callee, args, trgt)
            }

            ExprKind::Member { base, name } => {
                self.check_member(env, span, base, name, trgt, false)
            }

            ExprKind::TryMember { base, name } => {
                self.check_member(env, span, base, name, trgt, true)
            }

            ExprKind::Index { base, index } => {
                let base_reg = self.emit.fresh_register();
                env = self.check_expr_single(env, base, base_reg, None)?;
                let flow = env.expr_result().vtype.flow.clone();

                let mut kinds = Vec::new();
                for o in flow.options() {
                    kinds.push(match o {
                        TypeAtom::Tuple { members, complete } => {
                            if (*index as usize) < members.len() {
                                Presence::Present(members[*index as usize].clone())
                            } else if *complete {
                                Presence::Absent
                            } else {
                                return Err(CheckError::new(
                                    span,
                                    format!(
                                        "index {} is outside the known prefix of {}",
                                        index,
                                        self.asm.type_display(&flow)
                                    ),
                                ));
                            }
                        }
                        TypeAtom::EphemeralList { members } => {
                            if (*index as usize) < members.len() {
                                Presence::Present(members[*index as usize].clone())
                            } else {
                                Presence::Absent
                            }
                        }
                        _ => Presence::Absent,
                    });
                }
                self.finish_access(
                    env,
                    span,
                    kinds,
                    &flow,
                    InstKind::LoadIndex {
                        src: base_reg,
                        index: *index,
                    },
                    InstKind::HasIndex {
                        src: base_reg,
                        index: *index,
                    },
                    trgt,
                    false,
                    &format!(".{index}"),
                )
            }

            ExprKind::Prefix { op, expr: inner } => {
                let r = self.emit.fresh_register();
                match op {
                    tern_ast::PrefixOp::Not => {
                        let flows = self.check_expr(env, inner, r, None)?;
                        let bool_ty = self.asm.bool_type();
                        for f in &flows {
                            let res = f.expr_result();
                            if !self.asm.subtype_of(&res.vtype.flow, &bool_ty) {
                                return Err(CheckError::new(
                                    inner.span,
                                    "'!' requires a Bool operand",
                                ));
                            }
                        }
                        self.emit.emit(
                            span,
                            Some(trgt),
                            InstKind::Prefix {
                                op: tern_mir::PrefixOp::Not,
                                src: r,
                            },
                        );
                        let flows = flows
                            .into_iter()
                            .map(|mut f| {
                                let truth = f.expr_result().truth.negate();
                                f.set_result(ValueType::of(bool_ty.clone()), truth, None, trgt);
                                f
                            })
                            .collect();
                        Ok(flows)
                    }
                    tern_ast::PrefixOp::Neg => {
                        env = self.check_expr_single(env, inner, r, infer)?;
                        let flow = env.expr_result().vtype.flow.clone();
                        let kind = self.num_kind_of(&flow);
                        match kind {
                            Some(NumKind::Int) | Some(NumKind::BigInt) | Some(NumKind::Float) => {}
                            _ => {
                                return Err(CheckError::new(
                                    span,
                                    format!(
                                        "cannot negate a value of type {}",
                                        self.asm.type_display(&flow)
                                    ),
                                ));
                            }
                        }
                        self.emit.emit(
                            span,
                            Some(trgt),
                            InstKind::Prefix {
                                op: tern_mir::PrefixOp::Neg,
                                src: r,
                            },
                        );
                        self.set_plain_result(&mut env, flow, trgt);
                        Ok(vec![env])
                    }
                }
            }

            ExprKind::Bin { op, lhs, rhs } => {
                let l = self.emit.fresh_register();
                env = self.check_expr_single(env, lhs, l, infer)?;
                let lflow = env.expr_result().vtype.flow.clone();
                let r = self.emit.fresh_register();
                env = self.check_expr_single(env, rhs, r, Some(&lflow))?;
                let rflow = env.expr_result().vtype.flow.clone();

                let lk = self.num_kind_of(&lflow);
                let rk = self.num_kind_of(&rflow);
                if lk.is_none() || lk != rk {
                    return Err(CheckError::new(
                        span,
                        format!(
                            "operator requires matching numeric operands, got {} and {}",
                            self.asm.type_display(&lflow),
                            self.asm.type_display(&rflow)
                        ),
                    ));
                }

                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::Bin {
                        op: lower_bin(*op),
                        lhs: l,
                        rhs: r,
                    },
                );
                let result = match op {
                    tern_ast::BinOp::Add
                    | tern_ast::BinOp::Sub
                    | tern_ast::BinOp::Mul
                    | tern_ast::BinOp::Div => lflow,
                    _ => self.asm.bool_type(),
                };
                self.set_plain_result(&mut env, result, trgt);
                Ok(vec![env])
            }

            ExprKind::Eq { op, lhs, rhs } => self.check_equality(env, span, *op, lhs, rhs, trgt),

            ExprKind::Logic { op, lhs, rhs } => self.check_logic(env, span, *op, lhs, rhs, trgt),

            ExprKind::IsTest { expr: inner, ty } => {
                let val = self.emit.fresh_register();
                env = self.check_expr_single(env, inner, val, None)?;
                let res = env.expr_result().clone();
                let target = self.asm.normalize_type(ty, &env.term_binds)?;
                let (tpart, fpart) = self.asm.split_on(&res.vtype.flow, &target);
                let bool_ty = self.asm.bool_type();

                match (tpart, fpart) {
                    (Some(_), None) => {
                        self.emit.emit(
                            span,
                            Some(trgt),
                            InstKind::LoadConst {
                                value: Const::Bool(true),
                            },
                        );
                        env.set_result(ValueType::of(bool_ty), Truth::True, None, trgt);
                        Ok(vec![env])
                    }
                    (None, Some(_)) => {
                        self.emit.emit(
                            span,
                            Some(trgt),
                            InstKind::LoadConst {
                                value: Const::Bool(false),
                            },
                        );
                        env.set_result(ValueType::of(bool_ty), Truth::False, None, trgt);
                        Ok(vec![env])
                    }
                    (Some(tp), Some(fp)) => {
                        self.emit_shape_test(span, val, &target, trgt);
                        let mut env_t = env.clone();
                        env_t.set_result(
                            ValueType::of(bool_ty.clone()),
                            Truth::True,
                            None,
                            trgt,
                        );
                        let mut env_f = env;
                        env_f.set_result(ValueType::of(bool_ty), Truth::False, None, trgt);
                        if let Some(v) = res.from_var {
                            env_t.set_flow(v, tp);
                            env_f.set_flow(v, fp);
                        }
                        Ok(vec![env_t, env_f])
                    }
                    (None, None) => unreachable!("split of a nonempty type"),
                }
            }

            ExprKind::AsCast { expr: inner, ty } => {
                let val = self.emit.fresh_register();
                env = self.check_expr_single(env, inner, val, None)?;
                let res = env.expr_result().clone();
                let target = self.asm.normalize_type(ty, &env.term_binds)?;
                let (tpart, _fpart) = self.asm.split_on(&res.vtype.flow, &target);
                let Some(tp) = tpart else {
                    return Err(CheckError::new(
                        span,
                        format!(
                            "cast from {} to {} can never succeed",
                            self.asm.type_display(&res.vtype.flow),
                            self.asm.type_display(&target)
                        ),
                    ));
                };

                let from = self.emit.register_type(&res.vtype.flow);
                let to = self.emit.register_type(&target);
                if !self.asm.subtype_of(&res.vtype.flow, &target) {
                    // Runtime-checked narrowing; failure aborts.
                    let cond = self.emit.fresh_register();
                    self.emit_shape_test(span, val, &target, cond);
                    let ok_bb = self.emit.fresh_block();
                    let fail_bb = self.emit.fresh_block();
                    self.emit.set_terminator(Terminator::Branch {
                        cond,
                        then_bb: ok_bb,
                        else_bb: fail_bb,
                    });
                    self.emit.start_block(fail_bb, span);
                    self.emit.set_terminator(Terminator::Abort {
                        msg: "invalid cast".to_string(),
                    });
                    self.emit.start_block(ok_bb, span);
                }
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::Convert { src: val, from, to },
                );
                if let Some(v) = res.from_var {
                    env.set_flow(v, tp.clone());
                }
                env.set_result(ValueType::new(target, tp), Truth::Unknown, None, trgt);
                Ok(vec![env])
            }

            ExprKind::If {
                branches,
                else_expr,
            } => {
                let join_bb = self.emit.fresh_block();
                let mut used_join = false;
                let mut arm_envs: Vec<TypeEnvironment> = Vec::new();
                let mut cur = vec![env];

                for (cond, body) in branches {
                    if cur.is_empty() {
                        break;
                    }
                    let cenv = TypeEnvironment::join(self.asm, cond.span, cur)?;
                    let cond_reg = self.emit.fresh_register();
                    let (tenvs, fenvs) = self.check_condition(cenv, cond, cond_reg)?;

                    if tenvs.is_empty() {
                        // Guard statically false; the arm is dropped.
                        cur = fenvs;
                        continue;
                    }
                    if fenvs.is_empty() {
                        // Guard statically true; later arms are unreachable.
                        let aenv = TypeEnvironment::join(self.asm, body.span, tenvs)?;
                        let flows = self.check_expr(aenv, body, trgt, infer)?;
                        arm_envs.extend(flows);
                        cur = Vec::new();
                        break;
                    }

                    let then_bb = self.emit.fresh_block();
                    let else_bb = self.emit.fresh_block();
                    self.emit.set_terminator(Terminator::Branch {
                        cond: cond_reg,
                        then_bb,
                        else_bb,
                    });
                    self.emit.start_block(then_bb, body.span);
                    let aenv = TypeEnvironment::join(self.asm, body.span, tenvs)?;
                    let flows = self.check_expr(aenv, body, trgt, infer)?;
                    arm_envs.extend(flows);
                    self.emit.set_terminator(Terminator::Jump(join_bb));
                    used_join = true;
                    self.emit.start_block(else_bb, span);
                    cur = fenvs;
                }

                if !cur.is_empty() {
                    let eenv = TypeEnvironment::join(self.asm, else_expr.span, cur)?;
                    let flows = self.check_expr(eenv, else_expr, trgt, infer)?;
                    arm_envs.extend(flows);
                }

                if used_join {
                    if !self.emit.has_terminator() {
                        self.emit.set_terminator(Terminator::Jump(join_bb));
                    }
                    self.emit.start_block(join_bb, span);
                }
                Ok(arm_envs)
            }

            ExprKind::Switch { scrutinee, arms } => {
                let s_reg = self.emit.fresh_register();
                env = self.check_expr_single(env, scrutinee, s_reg, None)?;
                let s_res = env.expr_result().clone();

                let join_bb = self.emit.fresh_block();
                let mut used_join = false;
                let mut arm_envs = Vec::new();
                let mut matched = false;
                let mut cur_flow = s_res.vtype.flow.clone();

                for arm in arms {
                    match &arm.guard {
                        tern_ast::SwitchGuard::Wildcard { .. } => {
                            let flows = self.check_expr(env.clone(), &arm.body, trgt, infer)?;
                            arm_envs.extend(flows);
                            if used_join && !self.emit.has_terminator() {
                                self.emit.set_terminator(Terminator::Jump(join_bb));
                            }
                            matched = true;
                            break;
                        }
                        tern_ast::SwitchGuard::Lit(lit)
                            if matches!(lit.kind, ExprKind::LitNone | ExprKind::LitNothing) =>
                        {
                            let special = if matches!(lit.kind, ExprKind::LitNone) {
                                self.asm.none_type()
                            } else {
                                self.asm.nothing_type()
                            };
                            let (tp, fp) = self.asm.split_on(&cur_flow, &special);
                            match (tp, fp) {
                                (None, Some(_)) => continue, // never matches
                                (Some(tp), None) => {
                                    // Always matches.
                                    let mut aenv = env.clone();
                                    if let Some(v) = s_res.from_var {
                                        aenv.set_flow(v, tp);
                                    }
                                    let flows =
                                        self.check_expr(aenv, &arm.body, trgt, infer)?;
                                    arm_envs.extend(flows);
                                    if used_join && !self.emit.has_terminator() {
                                        self.emit.set_terminator(Terminator::Jump(join_bb));
                                    }
                                    matched = true;
                                    break;
                                }
                                (Some(tp), Some(fp)) => {
                                    let cond = self.emit.fresh_register();
                                    self.emit_shape_test(arm.span, s_reg, &special, cond);
                                    let arm_bb = self.emit.fresh_block();
                                    let next_bb = self.emit.fresh_block();
                                    self.emit.set_terminator(Terminator::Branch {
                                        cond,
                                        then_bb: arm_bb,
                                        else_bb: next_bb,
                                    });
                                    self.emit.start_block(arm_bb, arm.span);
                                    let mut aenv = env.clone();
                                    if let Some(v) = s_res.from_var {
                                        aenv.set_flow(v, tp);
                                    }
                                    let flows =
                                        self.check_expr(aenv, &arm.body, trgt, infer)?;
                                    arm_envs.extend(flows);
                                    self.emit.set_terminator(Terminator::Jump(join_bb));
                                    used_join = true;
                                    self.emit.start_block(next_bb, arm.span);
                                    if let Some(v) = s_res.from_var {
                                        env.set_flow(v, fp.clone());
                                    }
                                    cur_flow = fp;
                                }
                                (None, None) => unreachable!("split of a nonempty type"),
                            }
                        }
                        tern_ast::SwitchGuard::Lit(lit) => {
                            let g = self.emit.fresh_register();
                            env = self.check_expr_single(env, lit, g, Some(&cur_flow))?;
                            let g_flow = env.expr_result().vtype.flow.clone();
                            if !self.equality_legal(&g_flow, &cur_flow) {
                                return Err(CheckError::new(
                                    lit.span,
                                    format!(
                                        "guard of type {} cannot match scrutinee of type {}",
                                        self.asm.type_display(&g_flow),
                                        self.asm.type_display(&cur_flow)
                                    ),
                                ));
                            }
                            let cond = self.emit.fresh_register();
                            self.emit.emit(
                                arm.span,
                                Some(cond),
                                InstKind::EqValue {
                                    negated: false,
                                    lhs: s_reg,
                                    rhs: g,
                                },
                            );
                            let arm_bb = self.emit.fresh_block();
                            let next_bb = self.emit.fresh_block();
                            self.emit.set_terminator(Terminator::Branch {
                                cond,
                                then_bb: arm_bb,
                                else_bb: next_bb,
                            });
                            self.emit.start_block(arm_bb, arm.span);
                            let flows = self.check_expr(env.clone(), &arm.body, trgt, infer)?;
                            arm_envs.extend(flows);
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                            used_join = true;
                            self.emit.start_block(next_bb, arm.span);
                        }
                    }
                }

                if !matched {
                    self.emit.set_terminator(Terminator::Abort {
                        msg: "non-exhaustive switch".to_string(),
                    });
                }
                if used_join {
                    self.emit.start_block(join_bb, span);
                }
                if arm_envs.is_empty() {
                    return Err(CheckError::new(span, "switch expression has no live arm"));
                }
                Ok(arm_envs)
            }

            ExprKind::Match { scrutinee, arms } => {
                let s_reg = self.emit.fresh_register();
                env = self.check_expr_single(env, scrutinee, s_reg, None)?;
                let s_res = env.expr_result().clone();

                let join_bb = self.emit.fresh_block();
                let mut used_join = false;
                let mut arm_envs = Vec::new();
                let mut matched = false;
                let mut cur_flow = s_res.vtype.flow.clone();

                for arm in arms {
                    let target = match &arm.guard {
                        tern_ast::MatchGuard::Wildcard { .. } => {
                            let flows = self.check_expr(env.clone(), &arm.body, trgt, infer)?;
                            arm_envs.extend(flows);
                            if used_join && !self.emit.has_terminator() {
                                self.emit.set_terminator(Terminator::Jump(join_bb));
                            }
                            matched = true;
                            break;
                        }
                        tern_ast::MatchGuard::Type(sig) => {
                            self.asm.normalize_type(sig, &env.term_binds)?
                        }
                    };
                    let (tp, fp) = self.asm.split_on(&cur_flow, &target);
                    match (tp, fp) {
                        (None, Some(_)) => continue,
                        (Some(tp), None) => {
                            let mut aenv = env.clone();
                            if let Some(v) = s_res.from_var {
                                aenv.set_flow(v, tp);
                            }
                            let flows = self.check_expr(aenv, &arm.body, trgt, infer)?;
                            arm_envs.extend(flows);
                            if used_join && !self.emit.has_terminator() {
                                self.emit.set_terminator(Terminator::Jump(join_bb));
                            }
                            matched = true;
                            break;
                        }
                        (Some(tp), Some(fp)) => {
                            let cond = self.emit.fresh_register();
                            self.emit_shape_test(arm.span, s_reg, &target, cond);
                            let arm_bb = self.emit.fresh_block();
                            let next_bb = self.emit.fresh_block();
                            self.emit.set_terminator(Terminator::Branch {
                                cond,
                                then_bb: arm_bb,
                                else_bb: next_bb,
                            });
                            self.emit.start_block(arm_bb, arm.span);
                            let mut aenv = env.clone();
                            if let Some(v) = s_res.from_var {
                                aenv.set_flow(v, tp);
                            }
                            let flows = self.check_expr(aenv, &arm.body, trgt, infer)?;
                            arm_envs.extend(flows);
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                            used_join = true;
                            self.emit.start_block(next_bb, arm.span);
                            if let Some(v) = s_res.from_var {
                                env.set_flow(v, fp.clone());
                            }
                            cur_flow = fp;
                        }
                        (None, None) => unreachable!("split of a nonempty type"),
                    }
                }

                if !matched {
                    self.emit.set_terminator(Terminator::Abort {
                        msg: "non-exhaustive match".to_string(),
                    });
                }
                if used_join {
                    self.emit.start_block(join_bb, span);
                }
                if arm_envs.is_empty() {
                    return Err(CheckError::new(span, "match expression has no live arm"));
                }
                Ok(arm_envs)
            }

            ExprKind::Lambda { params, body } => {
                self.check_lambda(env, span, params, body, trgt, infer)
            }

            ExprKind::BlockExpr(block) => {
                let join_bb = self.emit.fresh_block();
                self.yield_frames.push(YieldFrame {
                    types: Vec::new(),
                    trgt,
                    join_bb,
                });
                let benv = self.check_block(env.clone(), block)?;
                let frame = self.yield_frames.pop().expect("frame pushed above");
                if benv.normal_flow {
                    return Err(CheckError::new(
                        span,
                        "every path through an expression block must yield",
                    ));
                }
                if frame.types.is_empty() {
                    return Err(CheckError::new(span, "expression block never yields"));
                }
                self.emit.start_block(join_bb, span);
                let ty = self.asm.type_upper_bound(&frame.types);
                self.set_plain_result(&mut env, ty, trgt);
                Ok(vec![env])
            }
        }
    }

    fn check_lambda(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        params: &[tern_ast::LambdaParam],
        body: &Expr,
        trgt: RegisterId,
        infer: Option<&ResolvedType>,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let hint_fn = match infer.and_then(|t| t.as_unique()) {
            Some(TypeAtom::Fn(f)) => Some(f.clone()),
            _ => None,
        };
        if let Some(f) = &hint_fn {
            if f.params.len() != params.len() {
                return Err(CheckError::new(
                    span,
                    format!(
                        "function literal has {} parameters, context expects {}",
                        params.len(),
                        f.params.len()
                    ),
                ));
            }
        }

        let mut param_tys = Vec::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            let ty = match &p.ty {
                Some(sig) => self.asm.normalize_type(sig, &env.term_binds)?,
                None => hint_fn
                    .as_ref()
                    .and_then(|f| f.params.get(i))
                    .map(|fp| fp.ty.clone())
                    .ok_or_else(|| {
                        CheckError::new(
                            p.span,
                            "function literal parameter needs a type annotation or a typed context",
                        )
                    })?,
            };
            param_tys.push(ty);
        }

        // Free names of the body, minus the parameters, resolved against
        // the enclosing bindings, become the flattened capture list.
        let bound: Vec<String> = params.iter().map(|p| p.name.node.clone()).collect();
        let free = free_expr_names(body, &bound);
        let mut captures: Vec<(Symbol, VarInfo)> = Vec::new();
        for name in &free {
            if let Some(sym) = self.asm.lookup_symbol(name) {
                if let Some(info) = env.lookup(sym) {
                    if !info.must_defined {
                        return Err(CheckError::new(
                            span,
                            format!("capture of possibly unassigned variable '{name}'"),
                        ));
                    }
                    captures.push((sym, info.clone()));
                }
            }
        }

        let lambda_name = self.fresh_lambda_name();
        let hint_result = hint_fn.as_ref().map(|f| (*f.result).clone());

        let saved_emit = std::mem::replace(&mut self.emit, tern_mir::MirEmitter::new(lambda_name, span));
        let saved_result = std::mem::replace(&mut self.declared_result, hint_result.clone());
        let saved_returns = std::mem::take(&mut self.returns);
        let saved_frames = std::mem::take(&mut self.yield_frames);

        let inner_result = (|| -> Result<ResolvedType, CheckError> {
            let entry = self.emit.fresh_block();
            self.emit.start_block(entry, span);
            let mut inner = TypeEnvironment::new(env.term_binds.clone());
            for (p, ty) in params.iter().zip(&param_tys) {
                let sym = self.asm.intern(&p.name.node);
                let key = self.emit.register_type(ty);
                let reg = self.emit.declare_param(sym, key);
                inner.declare(
                    sym,
                    VarInfo {
                        decl: ty.clone(),
                        flow: ty.clone(),
                        reg,
                        is_const: false,
                        must_defined: true,
                    },
                );
            }
            for (sym, info) in &captures {
                let key = self.emit.register_type(&info.decl);
                let reg = self.emit.declare_param(*sym, key);
                inner.declare(
                    *sym,
                    VarInfo {
                        decl: info.decl.clone(),
                        flow: info.flow.clone(),
                        reg,
                        is_const: true,
                        must_defined: true,
                    },
                );
            }

            let r = self.emit.fresh_register();
            let benv = self.check_expr_single(inner, body, r, hint_result.as_ref())?;
            let body_flow = benv.expr_result().vtype.flow.clone();
            if let Some(dr) = &hint_result {
                if !self.asm.subtype_of(&body_flow, dr) {
                    return Err(CheckError::new(
                        body.span,
                        format!(
                            "function literal returns {}, context expects {}",
                            self.asm.type_display(&body_flow),
                            self.asm.type_display(dr)
                        ),
                    ));
                }
            }
            self.emit.set_terminator(Terminator::Return(Some(r)));
            let result_ty = hint_result.clone().unwrap_or(body_flow);
            let result_key = self.emit.register_type(&result_ty);
            let entry_id = entry;
            let inner_emit = std::mem::replace(&mut self.emit, tern_mir::MirEmitter::new(lambda_name, span));
            self.aux.push(inner_emit.finish(result_key, entry_id));
            Ok(result_ty)
        })();

        self.emit = saved_emit;
        self.declared_result = saved_result;
        self.returns = saved_returns;
        self.yield_frames = saved_frames;
        let result_ty = inner_result?;

        let capture_regs: Vec<RegisterId> = captures.iter().map(|(_, i)| i.reg).collect();
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::LoadLambda {
                body: lambda_name,
                captures: capture_regs,
            },
        );

        let fn_ty = FunctionType {
            params: params
                .iter()
                .zip(&param_tys)
                .map(|(p, ty)| FunctionParam {
                    name: self.asm.intern(&p.name.node),
                    ty: ty.clone(),
                    optional: false,
                    ref_kind: RefKind::ByValue,
                    literal_tag: None,
                })
                .collect(),
            rest: None,
            result: Box::new(result_ty),
        };
        let mut env = env;
        self.set_plain_result(
            &mut env,
            ResolvedType::single(TypeAtom::Fn(fn_ty)),
            trgt,
        );
        Ok(vec![env])
    }

    fn check_member(
        &mut self,
        mut env: TypeEnvironment,
        span: Span,
        base: &Expr,
        name: &tern_ast::Ident,
        trgt: RegisterId,
        optional: bool,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let base_reg = self.emit.fresh_register();
        env = self.check_expr_single(env, base, base_reg, None)?;
        let flow = env.expr_result().vtype.flow.clone();

        let Some(sym) = self.asm.lookup_symbol(&name.node) else {
            return Err(CheckError::new(
                name.span,
                format!(
                    "property '{}' does not exist on type {}",
                    name.node,
                    self.asm.type_display(&flow)
                ),
            ));
        };

        let mut kinds = Vec::with_capacity(flow.options().len());
        for o in flow.options() {
            kinds.push(match o {
                TypeAtom::Entity { id, binds } => {
                    let def = self.asm.entity(*id);
                    match def.fields.iter().find(|f| f.name == sym) {
                        Some(f) => Presence::Present(self.asm.substitute(&f.ty, binds)),
                        None => Presence::Absent,
                    }
                }
                TypeAtom::Record { props } => match props.iter().find(|(s, _)| *s == sym) {
                    Some((_, t)) => Presence::Present(t.clone()),
                    None => Presence::Absent,
                },
                _ => Presence::Absent,
            });
        }

        self.finish_access(
            env,
            span,
            kinds,
            &flow,
            InstKind::LoadField {
                src: base_reg,
                field: sym,
            },
            InstKind::HasField {
                src: base_reg,
                field: sym,
            },
            trgt,
            optional,
            &name.node,
        )
    }

    /// Shared tail for property/index access: all-present loads directly,
    /// all-absent is an error (or constant `none` for optional access),
    /// mixed presence emits a guarded load producing `T | None`.
    #[allow(clippy::too_many_arguments)]
    fn finish_access(
        &mut self,
        mut env: TypeEnvironment,
        span: Span,
        kinds: Vec<Presence>,
        flow: &ResolvedType,
        load: InstKind,
        has: InstKind,
        trgt: RegisterId,
        optional: bool,
        what: &str,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let present: Vec<ResolvedType> = kinds
            .iter()
            .filter_map(|k| match k {
                Presence::Present(t) => Some(t.clone()),
                Presence::Absent => None,
            })
            .collect();
        let absent = kinds.len() - present.len();

        if present.is_empty() {
            if optional {
                self.emit
                    .emit(span, Some(trgt), InstKind::LoadConst { value: Const::None });
                let ty = self.asm.none_type();
                self.set_plain_result(&mut env, ty, trgt);
                return Ok(vec![env]);
            }
            return Err(CheckError::new(
                span,
                format!(
                    "property '{}' does not exist on type {}",
                    what,
                    self.asm.type_display(flow)
                ),
            ));
        }

        let member_ty = self.asm.type_upper_bound(&present);
        if absent == 0 {
            self.emit.emit(span, Some(trgt), load);
            self.set_plain_result(&mut env, member_ty, trgt);
            return Ok(vec![env]);
        }

        // Mixed presence: runtime check, absent path yields none.
        let cond = self.emit.fresh_register();
        self.emit.emit(span, Some(cond), has);
        let have_bb = self.emit.fresh_block();
        let miss_bb = self.emit.fresh_block();
        let join_bb = self.emit.fresh_block();
        self.emit.set_terminator(Terminator::Branch {
            cond,
            then_bb: have_bb,
            else_bb: miss_bb,
        });
        self.emit.start_block(have_bb, span);
        self.emit.emit(span, Some(trgt), load);
        self.emit.set_terminator(Terminator::Jump(join_bb));
        self.emit.start_block(miss_bb, span);
        self.emit
            .emit(span, Some(trgt), InstKind::LoadConst { value: Const::None });
        self.emit.set_terminator(Terminator::Jump(join_bb));
        self.emit.start_block(join_bb, span);

        let ty = ResolvedType::union_of([member_ty, self.asm.none_type()]);
        self.set_plain_result(&mut env, ty, trgt);
        Ok(vec![env])
    }

    fn check_equality(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        op: EqOp,
        lhs: &Expr,
        rhs: &Expr,
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let negated = op == EqOp::StrictNeq;
        let l_reg = self.emit.fresh_register();
        let mut env = self.check_expr_single(env, lhs, l_reg, None)?;
        let l_res = env.expr_result().clone();
        let r_reg = self.emit.fresh_register();
        env = self.check_expr_single(env, rhs, r_reg, Some(&l_res.vtype.flow))?;
        let r_res = env.expr_result().clone();

        let none = self.asm.none_type();
        let nothing = self.asm.nothing_type();
        for special in [&none, &nothing] {
            let l_special = l_res.vtype.flow == *special;
            let r_special = r_res.vtype.flow == *special;
            if !(l_special || r_special) {
                continue;
            }
            if l_special && r_special {
                return self.constant_bool(env, span, !negated, trgt);
            }
            let (other, other_reg) = if l_special {
                (&r_res, r_reg)
            } else {
                (&l_res, l_reg)
            };
            let (tp, fp) = self.asm.split_on(&other.vtype.flow, special);
            return match (tp, fp) {
                (None, Some(_)) => self.constant_bool(env, span, negated, trgt),
                (Some(_), None) => self.constant_bool(env, span, !negated, trgt),
                (Some(tp), Some(fp)) => {
                    if negated {
                        let raw = self.emit.fresh_register();
                        self.emit_shape_test(span, other_reg, special, raw);
                        self.emit.emit(
                            span,
                            Some(trgt),
                            InstKind::Prefix {
                                op: tern_mir::PrefixOp::Not,
                                src: raw,
                            },
                        );
                    } else {
                        self.emit_shape_test(span, other_reg, special, trgt);
                    }
                    let bool_ty = self.asm.bool_type();
                    let mut env_t = env.clone();
                    env_t.set_result(ValueType::of(bool_ty.clone()), Truth::True, None, trgt);
                    let mut env_f = env;
                    env_f.set_result(ValueType::of(bool_ty), Truth::False, None, trgt);
                    if let Some(v) = other.from_var {
                        // Expression-true means "is the special value" for
                        // ===, "is not" for !==.
                        if negated {
                            env_t.set_flow(v, fp);
                            env_f.set_flow(v, tp);
                        } else {
                            env_t.set_flow(v, tp);
                            env_f.set_flow(v, fp);
                        }
                    }
                    Ok(vec![env_t, env_f])
                }
                (None, None) => unreachable!("split of a nonempty type"),
            };
        }

        if !self.equality_legal(&l_res.vtype.flow, &r_res.vtype.flow) {
            return Err(CheckError::new(
                span,
                format!(
                    "values of types {} and {} cannot be compared for equality",
                    self.asm.type_display(&l_res.vtype.flow),
                    self.asm.type_display(&r_res.vtype.flow)
                ),
            ));
        }
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::EqValue {
                negated,
                lhs: l_reg,
                rhs: r_reg,
            },
        );
        let ty = self.asm.bool_type();
        self.set_plain_result(&mut env, ty, trgt);
        Ok(vec![env])
    }

    fn check_logic(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        op: LogicOp,
        lhs: &Expr,
        rhs: &Expr,
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let (tenvs, fenvs) = self.check_condition(env, lhs, trgt)?;

        match op {
            LogicOp::And => {
                if tenvs.is_empty() {
                    // Statically false; `trgt` already holds false.
                    return Ok(self.stamp_truth(fenvs, Truth::False, trgt));
                }
                if fenvs.is_empty() {
                    let benv = TypeEnvironment::join(self.asm, rhs.span, tenvs)?;
                    let flows = self.check_expr(benv, rhs, trgt, None)?;
                    self.verify_bool_flows(&flows, rhs.span)?;
                    return Ok(flows);
                }
                let rhs_bb = self.emit.fresh_block();
                let join_bb = self.emit.fresh_block();
                self.emit.set_terminator(Terminator::Branch {
                    cond: trgt,
                    then_bb: rhs_bb,
                    else_bb: join_bb,
                });
                self.emit.start_block(rhs_bb, rhs.span);
                let benv = TypeEnvironment::join(self.asm, rhs.span, tenvs)?;
                let flows = self.check_expr(benv, rhs, trgt, None)?;
                self.verify_bool_flows(&flows, rhs.span)?;
                self.emit.set_terminator(Terminator::Jump(join_bb));
                self.emit.start_block(join_bb, span);
                let mut out = flows;
                out.extend(self.stamp_truth(fenvs, Truth::False, trgt));
                Ok(out)
            }

            LogicOp::Or => {
                if fenvs.is_empty() {
                    return Ok(self.stamp_truth(tenvs, Truth::True, trgt));
                }
                if tenvs.is_empty() {
                    let benv = TypeEnvironment::join(self.asm, rhs.span, fenvs)?;
                    let flows = self.check_expr(benv, rhs, trgt, None)?;
                    self.verify_bool_flows(&flows, rhs.span)?;
                    return Ok(flows);
                }
                let rhs_bb = self.emit.fresh_block();
                let join_bb = self.emit.fresh_block();
                self.emit.set_terminator(Terminator::Branch {
                    cond: trgt,
                    then_bb: join_bb,
                    else_bb: rhs_bb,
                });
                self.emit.start_block(rhs_bb, rhs.span);
                let benv = TypeEnvironment::join(self.asm, rhs.span, fenvs)?;
                let flows = self.check_expr(benv, rhs, trgt, None)?;
                self.verify_bool_flows(&flows, rhs.span)?;
                self.emit.set_terminator(Terminator::Jump(join_bb));
                self.emit.start_block(join_bb, span);
                let mut out = flows;
                out.extend(self.stamp_truth(tenvs, Truth::True, trgt));
                Ok(out)
            }

            LogicOp::Implies => {
                if tenvs.is_empty() {
                    // Antecedent statically false: the implication is true.
                    self.emit.emit(
                        span,
                        Some(trgt),
                        InstKind::LoadConst {
                            value: Const::Bool(true),
                        },
                    );
                    return Ok(self.stamp_truth(fenvs, Truth::True, trgt));
                }
                if fenvs.is_empty() {
                    let benv = TypeEnvironment::join(self.asm, rhs.span, tenvs)?;
                    let flows = self.check_expr(benv, rhs, trgt, None)?;
                    self.verify_bool_flows(&flows, rhs.span)?;
                    return Ok(flows);
                }
                let rhs_bb = self.emit.fresh_block();
                let vac_bb = self.emit.fresh_block();
                let join_bb = self.emit.fresh_block();
                self.emit.set_terminator(Terminator::Branch {
                    cond: trgt,
                    then_bb: rhs_bb,
                    else_bb: vac_bb,
                });
                self.emit.start_block(vac_bb, span);
                self.emit.emit(
                    span,
                    Some(trgt),
                    InstKind::LoadConst {
                        value: Const::Bool(true),
                    },
                );
                self.emit.set_terminator(Terminator::Jump(join_bb));
                self.emit.start_block(rhs_bb, rhs.span);
                let benv = TypeEnvironment::join(self.asm, rhs.span, tenvs)?;
                let flows = self.check_expr(benv, rhs, trgt, None)?;
                self.verify_bool_flows(&flows, rhs.span)?;
                self.emit.set_terminator(Terminator::Jump(join_bb));
                self.emit.start_block(join_bb, span);
                let mut out = flows;
                out.extend(self.stamp_truth(fenvs, Truth::True, trgt));
                Ok(out)
            }
        }
    }

    fn stamp_truth(
        &self,
        envs: Vec<TypeEnvironment>,
        truth: Truth,
        trgt: RegisterId,
    ) -> Vec<TypeEnvironment> {
        let bool_ty = self.asm.bool_type();
        envs.into_iter()
            .map(|mut e| {
                e.set_result(ValueType::of(bool_ty.clone()), truth, None, trgt);
                e
            })
            .collect()
    }

    fn verify_bool_flows(
        &self,
        flows: &[TypeEnvironment],
        span: Span,
    ) -> Result<(), CheckError> {
        let bool_ty = self.asm.bool_type();
        for f in flows {
            let res = f.expr_result();
            if !self.asm.subtype_of(&res.vtype.flow, &bool_ty) {
                return Err(CheckError::new(
                    span,
                    format!(
                        "logical operand has type {}, expected Bool",
                        self.asm.type_display(&res.vtype.flow)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn constant_bool(
        &mut self,
        mut env: TypeEnvironment,
        span: Span,
        value: bool,
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::LoadConst {
                value: Const::Bool(value),
            },
        );
        let ty = self.asm.bool_type();
        env.set_result(ValueType::of(ty), Truth::of_bool(value), None, trgt);
        Ok(vec![env])
    }

    /// None/Nothing compare by shape; everything else by a registered
    /// type test.
    pub(crate) fn emit_shape_test(
        &mut self,
        span: Span,
        src: RegisterId,
        target: &ResolvedType,
        dest: RegisterId,
    ) {
        let kind = if *target == self.asm.none_type() {
            InstKind::NoneTest { src }
        } else if *target == self.asm.nothing_type() {
            InstKind::NothingTest { src }
        } else {
            let key = self.emit.register_type(target);
            InstKind::TypeTest { src, ty: key }
        };
        self.emit.emit(span, Some(dest), kind);
    }

    pub(crate) fn equality_legal(&self, l: &ResolvedType, r: &ResolvedType) -> bool {
        let specials = [
            TypeAtom::Entity {
                id: self.asm.well_known().none,
                binds: Default::default(),
            },
            TypeAtom::Entity {
                id: self.asm.well_known().nothing,
                binds: Default::default(),
            },
        ];
        match (l.without(&specials), r.without(&specials)) {
            (Some(lc), Some(rc)) => {
                self.asm.subtype_of(&lc, &rc)
                    || self.asm.subtype_of(&rc, &lc)
                    || (self.asm.grounded_key(l) && self.asm.grounded_key(r))
            }
            // One side is entirely None/Nothing; shape comparison is
            // always legal.
            _ => true,
        }
    }

    /// A structural constructor member takes the hint type when the
    /// element fits under it, otherwise its own inferred flow type.
    fn structural_member_type(
        &self,
        span: Span,
        flow: ResolvedType,
        hint: Option<&ResolvedType>,
    ) -> Result<ResolvedType, CheckError> {
        if flow.is_ephemeral() {
            return Err(CheckError::new(
                span,
                "ephemeral values cannot be stored in a structural value",
            ));
        }
        match hint {
            Some(h) if self.asm.subtype_of(&flow, h) => Ok(h.clone()),
            _ => Ok(flow),
        }
    }

    pub(crate) fn num_kind_of(&self, t: &ResolvedType) -> Option<NumKind> {
        let TypeAtom::Entity { id, .. } = t.as_unique()? else {
            return None;
        };
        let wk = self.asm.well_known();
        if *id == wk.int {
            Some(NumKind::Int)
        } else if *id == wk.nat {
            Some(NumKind::Nat)
        } else if *id == wk.big_int {
            Some(NumKind::BigInt)
        } else if *id == wk.float {
            Some(NumKind::Float)
        } else {
            None
        }
    }

    fn num_kind_of_hint(&self, infer: Option<&ResolvedType>) -> Option<NumKind> {
        self.num_kind_of(infer?)
    }

    /// Range-check a literal against its resolved numeric kind.
    fn parse_number(
        &self,
        span: Span,
        digits: &str,
        kind: NumKind,
    ) -> Result<(Const, ResolvedType), CheckError> {
        match kind {
            NumKind::Int => digits
                .parse::<i64>()
                .map(|v| (Const::Int(v), self.asm.int_type()))
                .map_err(|_| {
                    CheckError::new(
                        span,
                        format!("numeric literal '{digits}' is out of range for Int"),
                    )
                }),
            NumKind::Nat => digits
                .parse::<u64>()
                .map(|v| (Const::Nat(v), self.asm.nat_type()))
                .map_err(|_| {
                    CheckError::new(
                        span,
                        format!("numeric literal '{digits}' is out of range for Nat"),
                    )
                }),
            NumKind::BigInt => {
                let body = digits.strip_prefix('-').unwrap_or(digits);
                if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(CheckError::new(
                        span,
                        format!("invalid BigInt literal '{digits}'"),
                    ));
                }
                Ok((Const::BigInt(digits.to_string()), self.asm.big_int_type()))
            }
            NumKind::Float => digits
                .parse::<f64>()
                .map(|v| (Const::Float(v), self.asm.float_type()))
                .map_err(|_| {
                    CheckError::new(span, format!("invalid Float literal '{digits}'"))
                }),
        }
    }
}

fn lower_bin(op: tern_ast::BinOp) -> tern_mir::BinOp {
    match op {
        tern_ast::BinOp::Add => tern_mir::BinOp::Add,
        tern_ast::BinOp::Sub => tern_mir::BinOp::Sub,
        tern_ast::BinOp::Mul => tern_mir::BinOp::Mul,
        tern_ast::BinOp::Div => tern_mir::BinOp::Div,
        tern_ast::BinOp::Lt => tern_mir::BinOp::Lt,
        tern_ast::BinOp::Le => tern_mir::BinOp::Le,
        tern_ast::BinOp::Gt => tern_mir::BinOp::Gt,
        tern_ast::BinOp::Ge => tern_mir::BinOp::Ge,
    }
}
