#![forbid(unsafe_code)]

use tern_ast::{
    AssignStmt, Block, ExprKind, IfStmt, MatchStmt, PackTarget, ReturnStmt, Stmt,
    StructuredAssignStmt, SwitchStmt, TypeSigKind, ValidateStmt, VarDeclStmt, VarPackStmt,
    YieldStmt,
};
use tern_mir::{InstKind, Terminator};
use tern_types::{ResolvedType, TypeAtom};

use crate::env::{TypeEnvironment, VarInfo};
use crate::error::CheckError;
use crate::Checker;

impl<'a> Checker<'a> {
    /// Check a block in a fresh scope. Locals get lifetime-end events on
    /// the still-normal exit path, in declaration order.
    pub(crate) fn check_block(
        &mut self,
        mut env: TypeEnvironment,
        block: &Block,
    ) -> Result<TypeEnvironment, CheckError> {
        env.push_scope();
        for stmt in &block.stmts {
            if !env.normal_flow {
                return Err(CheckError::new(stmt.span(), "unreachable statement"));
            }
            env = self.check_stmt(env, stmt)?;
        }
        let order = env.pop_scope();
        if env.normal_flow {
            self.emit_lifetime_ends(block.span, &order);
        }
        Ok(env)
    }

    fn check_stmt(
        &mut self,
        env: TypeEnvironment,
        stmt: &Stmt,
    ) -> Result<TypeEnvironment, CheckError> {
        match stmt {
            Stmt::VarDecl(s) => self.check_var_decl(env, s),
            Stmt::VarPack(s) => self.check_var_pack(env, s),
            Stmt::Assign(s) => self.check_assign(env, s),
            Stmt::StructuredAssign(s) => self.check_structured_assign(env, s),
            Stmt::If(s) => self.check_if_stmt(env, s),
            Stmt::Switch(s) => self.check_switch_stmt(env, s),
            Stmt::Match(s) => self.check_match_stmt(env, s),
            Stmt::Return(s) => self.check_return(env, s),
            Stmt::Yield(s) => self.check_yield(env, s),
            Stmt::Abort(s) => {
                self.emit.set_terminator(Terminator::Abort {
                    msg: s.msg.clone().unwrap_or_else(|| "abort".to_string()),
                });
                let mut env = env;
                env.kill();
                Ok(env)
            }
            Stmt::Assert(s) => {
                let cond_reg = self.emit.fresh_register();
                let (tenvs, fenvs) = self.check_condition(env, &s.cond, cond_reg)?;
                if fenvs.is_empty() {
                    let mut out = TypeEnvironment::join(self.asm, s.span, tenvs)?;
                    out.clear_result();
                    return Ok(out);
                }
                if tenvs.is_empty() {
                    self.emit.set_terminator(Terminator::Abort {
                        msg: "assertion failed".to_string(),
                    });
                    let mut out = TypeEnvironment::join(self.asm, s.span, fenvs)?;
                    out.kill();
                    return Ok(out);
                }
                let ok_bb = self.emit.fresh_block();
                let fail_bb = self.emit.fresh_block();
                self.emit.set_terminator(Terminator::Branch {
                    cond: cond_reg,
                    then_bb: ok_bb,
                    else_bb: fail_bb,
                });
                self.emit.start_block(fail_bb, s.span);
                self.emit.set_terminator(Terminator::Abort {
                    msg: "assertion failed".to_string(),
                });
                self.emit.start_block(ok_bb, s.span);
                let mut out = TypeEnvironment::join(self.asm, s.span, tenvs)?;
                out.clear_result();
                Ok(out)
            }
            Stmt::Validate(s) => self.check_validate(env, s),
            Stmt::Block(b) => self.check_block(env, b),
            Stmt::Expr(e) => {
                let r = self.emit.fresh_register();
                let mut env = self.check_expr_single(env, e, r, None)?;
                env.clear_result();
                Ok(env)
            }
        }
    }

    fn check_var_decl(
        &mut self,
        mut env: TypeEnvironment,
        s: &VarDeclStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let sym = self.asm.intern(&s.name.node);
        let declared: Option<ResolvedType> = match &s.ty {
            Some(sig) if !matches!(sig.kind, TypeSigKind::Auto) => {
                Some(self.asm.normalize_type(sig, &env.term_binds)?)
            }
            _ => None,
        };

        let reg = self.emit.fresh_register();
        let (decl, flow, defined) = match &s.init {
            Some(init) => {
                env = self.check_expr_single(env, init, reg, declared.as_ref())?;
                let flow = env.expr_result().vtype.flow.clone();
                if let Some(d) = &declared {
                    if !self.asm.subtype_of(&flow, d) {
                        return Err(CheckError::new(
                            init.span,
                            format!(
                                "initializer of type {} is not a subtype of the declared {}",
                                self.asm.type_display(&flow),
                                self.asm.type_display(d)
                            ),
                        ));
                    }
                }
                let decl = declared.unwrap_or_else(|| flow.clone());
                (decl, flow, true)
            }
            None => {
                if s.is_const {
                    return Err(CheckError::new(
                        s.span,
                        "a const binding requires an initializer",
                    ));
                }
                let decl = declared.ok_or_else(|| {
                    CheckError::new(s.span, "an uninitialized variable requires a declared type")
                })?;
                (decl.clone(), decl, false)
            }
        };

        if decl.is_ephemeral() {
            return Err(CheckError::new(
                s.span,
                "ephemeral values cannot be stored in a variable",
            ));
        }

        if !env.declare(
            sym,
            VarInfo {
                decl,
                flow,
                reg,
                is_const: s.is_const,
                must_defined: defined,
            },
        ) {
            return Err(CheckError::new(
                s.name.span,
                format!("variable '{}' is already declared in this scope", s.name.node),
            ));
        }
        env.clear_result();
        Ok(env)
    }

    fn check_var_pack(
        &mut self,
        mut env: TypeEnvironment,
        s: &VarPackStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let tmp = self.emit.fresh_register();
        env = self.check_expr_single(env, &s.expr, tmp, None)?;
        let flow = env.expr_result().vtype.flow.clone();
        let members = self.packable_members(&flow, s.expr.span)?;
        if members.len() != s.names.len() {
            return Err(CheckError::new(
                s.span,
                format!(
                    "pattern has {} targets but the value has {} members",
                    s.names.len(),
                    members.len()
                ),
            ));
        }

        for (i, target) in s.names.iter().enumerate() {
            let PackTarget::Var { name, ty } = target else {
                continue;
            };
            let member = members[i].clone();
            let declared = match ty {
                Some(sig) if !matches!(sig.kind, TypeSigKind::Auto) => {
                    Some(self.asm.normalize_type(sig, &env.term_binds)?)
                }
                _ => None,
            };
            if let Some(d) = &declared {
                if !self.asm.subtype_of(&member, d) {
                    return Err(CheckError::new(
                        name.span,
                        format!(
                            "member {} of type {} is not a subtype of the declared {}",
                            i,
                            self.asm.type_display(&member),
                            self.asm.type_display(d)
                        ),
                    ));
                }
            }
            let decl = declared.unwrap_or_else(|| member.clone());
            if decl.is_ephemeral() {
                return Err(CheckError::new(
                    name.span,
                    "ephemeral values cannot be stored in a variable",
                ));
            }
            let sym = self.asm.intern(&name.node);
            let reg = self.emit.fresh_register();
            self.emit.emit(
                name.span,
                Some(reg),
                InstKind::LoadIndex {
                    src: tmp,
                    index: i as u64,
                },
            );
            if !env.declare(
                sym,
                VarInfo {
                    decl,
                    flow: member,
                    reg,
                    is_const: s.is_const,
                    must_defined: true,
                },
            ) {
                return Err(CheckError::new(
                    name.span,
                    format!("variable '{}' is already declared in this scope", name.node),
                ));
            }
        }
        env.clear_result();
        Ok(env)
    }

    fn check_assign(
        &mut self,
        env: TypeEnvironment,
        s: &AssignStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let info = self
            .asm
            .lookup_symbol(&s.target.node)
            .and_then(|sym| env.lookup(sym).map(|i| (sym, i.clone())));
        let Some((sym, info)) = info else {
            return Err(CheckError::new(
                s.target.span,
                format!("assignment to undeclared variable '{}'", s.target.node),
            ));
        };
        if info.is_const {
            return Err(CheckError::new(
                s.target.span,
                format!("cannot assign to const binding '{}'", s.target.node),
            ));
        }

        let r = self.emit.fresh_register();
        let mut env = self.check_expr_single(env, &s.expr, r, Some(&info.decl))?;
        let flow = env.expr_result().vtype.flow.clone();
        if !self.asm.subtype_of(&flow, &info.decl) {
            return Err(CheckError::new(
                s.expr.span,
                format!(
                    "value of type {} cannot be assigned to '{}' of type {}",
                    self.asm.type_display(&flow),
                    s.target.node,
                    self.asm.type_display(&info.decl)
                ),
            ));
        }
        self.emit
            .emit(s.span, Some(info.reg), InstKind::Move { src: r });
        let slot = env.lookup_mut(sym).expect("binding looked up above");
        slot.flow = flow;
        slot.must_defined = true;
        env.clear_result();
        Ok(env)
    }

    fn check_structured_assign(
        &mut self,
        mut env: TypeEnvironment,
        s: &StructuredAssignStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let tmp = self.emit.fresh_register();
        env = self.check_expr_single(env, &s.expr, tmp, None)?;
        let flow = env.expr_result().vtype.flow.clone();
        let members = self.packable_members(&flow, s.expr.span)?;
        if members.len() != s.targets.len() {
            return Err(CheckError::new(
                s.span,
                format!(
                    "pattern has {} targets but the value has {} members",
                    s.targets.len(),
                    members.len()
                ),
            ));
        }

        for (i, target) in s.targets.iter().enumerate() {
            let PackTarget::Var { name, ty } = target else {
                continue;
            };
            if ty.is_some() {
                return Err(CheckError::new(
                    name.span,
                    "an assignment target cannot carry a type annotation",
                ));
            }
            let info = self
                .asm
                .lookup_symbol(&name.node)
                .and_then(|sym| env.lookup(sym).map(|i| (sym, i.clone())));
            let Some((sym, info)) = info else {
                return Err(CheckError::new(
                    name.span,
                    format!("assignment to undeclared variable '{}'", name.node),
                ));
            };
            if info.is_const {
                return Err(CheckError::new(
                    name.span,
                    format!("cannot assign to const binding '{}'", name.node),
                ));
            }
            let member = members[i].clone();
            if !self.asm.subtype_of(&member, &info.decl) {
                return Err(CheckError::new(
                    name.span,
                    format!(
                        "member {} of type {} cannot be assigned to '{}' of type {}",
                        i,
                        self.asm.type_display(&member),
                        name.node,
                        self.asm.type_display(&info.decl)
                    ),
                ));
            }
            self.emit.emit(
                name.span,
                Some(info.reg),
                InstKind::LoadIndex {
                    src: tmp,
                    index: i as u64,
                },
            );
            let slot = env.lookup_mut(sym).expect("binding looked up above");
            slot.flow = member;
            slot.must_defined = true;
        }
        env.clear_result();
        Ok(env)
    }

    fn packable_members(
        &self,
        flow: &ResolvedType,
        span: tern_ast::Span,
    ) -> Result<Vec<ResolvedType>, CheckError> {
        match flow.as_unique() {
            Some(TypeAtom::EphemeralList { members }) => Ok(members.clone()),
            Some(TypeAtom::Tuple {
                members,
                complete: true,
            }) => Ok(members.clone()),
            _ => Err(CheckError::new(
                span,
                format!(
                    "destructuring requires a unique tuple or ephemeral list, got {}",
                    self.asm.type_display(flow)
                ),
            )),
        }
    }

    fn check_if_stmt(
        &mut self,
        env: TypeEnvironment,
        s: &IfStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let join_bb = self.emit.fresh_block();
        let mut used_join = false;
        let mut out_envs: Vec<TypeEnvironment> = Vec::new();
        let mut dead: Option<TypeEnvironment> = None;
        let mut cur = vec![env];

        for (cond, blk) in &s.branches {
            if cur.is_empty() {
                break;
            }
            let cenv = TypeEnvironment::join(self.asm, cond.span, cur)?;
            let cond_reg = self.emit.fresh_register();
            let (tenvs, fenvs) = self.check_condition(cenv, cond, cond_reg)?;

            if tenvs.is_empty() {
                cur = fenvs;
                continue;
            }
            if fenvs.is_empty() {
                let aenv = TypeEnvironment::join(self.asm, blk.span, tenvs)?;
                let e2 = self.check_block(aenv, blk)?;
                if e2.normal_flow {
                    if used_join && !self.emit.has_terminator() {
                        self.emit.set_terminator(Terminator::Jump(join_bb));
                    }
                    out_envs.push(e2);
                } else {
                    dead = Some(e2);
                }
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
            self.emit.start_block(then_bb, blk.span);
            let aenv = TypeEnvironment::join(self.asm, blk.span, tenvs)?;
            let e2 = self.check_block(aenv, blk)?;
            if e2.normal_flow {
                self.emit.set_terminator(Terminator::Jump(join_bb));
                used_join = true;
                out_envs.push(e2);
            } else {
                dead = Some(e2);
            }
            self.emit.start_block(else_bb, s.span);
            cur = fenvs;
        }

        if !cur.is_empty() {
            let eenv = TypeEnvironment::join(self.asm, s.span, cur)?;
            match &s.else_block {
                Some(blk) => {
                    let e2 = self.check_block(eenv, blk)?;
                    if e2.normal_flow {
                        if used_join && !self.emit.has_terminator() {
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                        }
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
                    }
                }
                None => {
                    if used_join && !self.emit.has_terminator() {
                        self.emit.set_terminator(Terminator::Jump(join_bb));
                    }
                    out_envs.push(eenv);
                }
            }
        }

        if used_join {
            self.emit.start_block(join_bb, s.span);
        }
        self.finish_stmt_arms(s.span, out_envs, dead)
    }

    fn check_switch_stmt(
        &mut self,
        mut env: TypeEnvironment,
        s: &SwitchStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let s_reg = self.emit.fresh_register();
        env = self.check_expr_single(env, &s.scrutinee, s_reg, None)?;
        let s_res = env.expr_result().clone();
        env.clear_result();

        let join_bb = self.emit.fresh_block();
        let mut used_join = false;
        let mut out_envs: Vec<TypeEnvironment> = Vec::new();
        let mut dead: Option<TypeEnvironment> = None;
        let mut matched = false;
        let mut cur_flow = s_res.vtype.flow.clone();

        for arm in &s.arms {
            match &arm.guard {
                tern_ast::SwitchGuard::Wildcard { .. } => {
                    let e2 = self.check_block(env.clone(), &arm.body)?;
                    if e2.normal_flow {
                        if used_join && !self.emit.has_terminator() {
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                        }
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
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
                        (None, Some(_)) => continue,
                        (Some(tp), None) => {
                            let mut aenv = env.clone();
                            if let Some(v) = s_res.from_var {
                                aenv.set_flow(v, tp);
                            }
                            let e2 = self.check_block(aenv, &arm.body)?;
                            if e2.normal_flow {
                                if used_join && !self.emit.has_terminator() {
                                    self.emit.set_terminator(Terminator::Jump(join_bb));
                                }
                                out_envs.push(e2);
                            } else {
                                dead = Some(e2);
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
                            let e2 = self.check_block(aenv, &arm.body)?;
                            if e2.normal_flow {
                                self.emit.set_terminator(Terminator::Jump(join_bb));
                                used_join = true;
                                out_envs.push(e2);
                            } else {
                                dead = Some(e2);
                            }
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
                    env.clear_result();
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
                    let e2 = self.check_block(env.clone(), &arm.body)?;
                    if e2.normal_flow {
                        self.emit.set_terminator(Terminator::Jump(join_bb));
                        used_join = true;
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
                    }
                    self.emit.start_block(next_bb, arm.span);
                }
            }
        }

        if !matched {
            // Implicit abort arm; the statement stays exhaustive.
            self.emit.set_terminator(Terminator::Abort {
                msg: "non-exhaustive switch".to_string(),
            });
            let mut fallthrough = env;
            fallthrough.kill();
            dead = dead.or(Some(fallthrough));
        }
        if used_join {
            self.emit.start_block(join_bb, s.span);
        }
        self.finish_stmt_arms(s.span, out_envs, dead)
    }

    fn check_match_stmt(
        &mut self,
        mut env: TypeEnvironment,
        s: &MatchStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let s_reg = self.emit.fresh_register();
        env = self.check_expr_single(env, &s.scrutinee, s_reg, None)?;
        let s_res = env.expr_result().clone();
        env.clear_result();

        let join_bb = self.emit.fresh_block();
        let mut used_join = false;
        let mut out_envs: Vec<TypeEnvironment> = Vec::new();
        let mut dead: Option<TypeEnvironment> = None;
        let mut matched = false;
        let mut cur_flow = s_res.vtype.flow.clone();

        for arm in &s.arms {
            let target = match &arm.guard {
                tern_ast::MatchGuard::Wildcard { .. } => {
                    let e2 = self.check_block(env.clone(), &arm.body)?;
                    if e2.normal_flow {
                        if used_join && !self.emit.has_terminator() {
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                        }
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
                    }
                    matched = true;
                    break;
                }
                tern_ast::MatchGuard::Type(sig) => self.asm.normalize_type(sig, &env.term_binds)?,
            };
            let (tp, fp) = self.asm.split_on(&cur_flow, &target);
            match (tp, fp) {
                (None, Some(_)) => continue,
                (Some(tp), None) => {
                    let mut aenv = env.clone();
                    if let Some(v) = s_res.from_var {
                        aenv.set_flow(v, tp);
                    }
                    let e2 = self.check_block(aenv, &arm.body)?;
                    if e2.normal_flow {
                        if used_join && !self.emit.has_terminator() {
                            self.emit.set_terminator(Terminator::Jump(join_bb));
                        }
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
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
                    let e2 = self.check_block(aenv, &arm.body)?;
                    if e2.normal_flow {
                        self.emit.set_terminator(Terminator::Jump(join_bb));
                        used_join = true;
                        out_envs.push(e2);
                    } else {
                        dead = Some(e2);
                    }
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
            let mut fallthrough = env;
            fallthrough.kill();
            dead = dead.or(Some(fallthrough));
        }
        if used_join {
            self.emit.start_block(join_bb, s.span);
        }
        self.finish_stmt_arms(s.span, out_envs, dead)
    }

    /// Join the still-normal arm endings; if no arm ends normally the
    /// statement kills the flow.
    fn finish_stmt_arms(
        &mut self,
        span: tern_ast::Span,
        out_envs: Vec<TypeEnvironment>,
        dead: Option<TypeEnvironment>,
    ) -> Result<TypeEnvironment, CheckError> {
        if out_envs.is_empty() {
            let mut d = dead.expect("at least one arm was checked");
            d.kill();
            return Ok(d);
        }
        let mut joined = TypeEnvironment::join(self.asm, span, out_envs)?;
        joined.clear_result();
        Ok(joined)
    }

    fn check_return(
        &mut self,
        env: TypeEnvironment,
        s: &ReturnStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let declared = self.declared_result.clone();
        let mut env = env;
        match &s.expr {
            Some(e) => {
                let r = self.emit.fresh_register();
                env = self.check_expr_single(env, e, r, declared.as_ref())?;
                let flow = env.expr_result().vtype.flow.clone();
                if let Some(d) = &declared {
                    if !self.asm.subtype_of(&flow, d) {
                        return Err(CheckError::new(
                            e.span,
                            format!(
                                "returned value of type {} is not a subtype of the declared result {}",
                                self.asm.type_display(&flow),
                                self.asm.type_display(d)
                            ),
                        ));
                    }
                }
                self.returns.push(flow);
                self.emit.set_terminator(Terminator::Return(Some(r)));
            }
            None => {
                let none = self.asm.none_type();
                if let Some(d) = &declared {
                    if !self.asm.subtype_of(&none, d) {
                        return Err(CheckError::new(s.span, "this function must return a value"));
                    }
                }
                self.returns.push(none);
                self.emit.set_terminator(Terminator::Return(None));
            }
        }
        env.kill();
        Ok(env)
    }

    fn check_yield(
        &mut self,
        env: TypeEnvironment,
        s: &YieldStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let Some(frame) = self.yield_frames.last() else {
            return Err(CheckError::new(
                s.span,
                "yield is only legal inside an expression block",
            ));
        };
        let trgt = frame.trgt;
        let join_bb = frame.join_bb;
        let mut env = self.check_expr_single(env, &s.expr, trgt, None)?;
        let flow = env.expr_result().vtype.flow.clone();
        self.yield_frames
            .last_mut()
            .expect("frame checked above")
            .types
            .push(flow);
        self.emit.set_terminator(Terminator::Jump(join_bb));
        env.kill();
        Ok(env)
    }

    fn check_validate(
        &mut self,
        env: TypeEnvironment,
        s: &ValidateStmt,
    ) -> Result<TypeEnvironment, CheckError> {
        let declared = self.declared_result.clone();
        let cond_reg = self.emit.fresh_register();
        let (tenvs, fenvs) = self.check_condition(env, &s.cond, cond_reg)?;

        if fenvs.is_empty() {
            let mut out = TypeEnvironment::join(self.asm, s.span, tenvs)?;
            out.clear_result();
            return Ok(out);
        }

        let always_fails = tenvs.is_empty();
        let ok_bb = self.emit.fresh_block();
        let err_bb = self.emit.fresh_block();
        if !always_fails {
            self.emit.set_terminator(Terminator::Branch {
                cond: cond_reg,
                then_bb: ok_bb,
                else_bb: err_bb,
            });
            self.emit.start_block(err_bb, s.err.span);
        }

        let eenv = TypeEnvironment::join(self.asm, s.err.span, fenvs)?;
        let r = self.emit.fresh_register();
        let eenv = self.check_expr_single(eenv, &s.err, r, declared.as_ref())?;
        let flow = eenv.expr_result().vtype.flow.clone();
        if let Some(d) = &declared {
            if !self.asm.subtype_of(&flow, d) {
                return Err(CheckError::new(
                    s.err.span,
                    format!(
                        "validation error value of type {} is not a subtype of the declared result {}",
                        self.asm.type_display(&flow),
                        self.asm.type_display(d)
                    ),
                ));
            }
        }
        self.returns.push(flow);
        self.emit.set_terminator(Terminator::Return(Some(r)));

        if always_fails {
            let mut out = eenv;
            out.kill();
            return Ok(out);
        }
        self.emit.start_block(ok_bb, s.span);
        let mut out = TypeEnvironment::join(self.asm, s.span, tenvs)?;
        out.clear_result();
        Ok(out)
    }
}
