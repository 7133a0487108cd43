#![forbid(unsafe_code)]

//! Call checking: the argument binder (named/positional/spread/ref/rest,
//! guard masks for optional slots) and dispatch for direct calls, operator
//! overloads, and calls through function values.

use tern_ast::{CallArg, Expr, ExprKind, Ident, NumKind, Span};
use tern_mir::{Const, InstKind, RegisterId};
use tern_types::{FunctionType, InvokeId, LiteralTag, RefKind, Symbol, TypeAtom};

use crate::env::TypeEnvironment;
use crate::error::CheckError;
use crate::Checker;

/// Outcome of binding a call's arguments against a signature.
pub(crate) struct BoundCall {
    /// One register per formal, in declaration order, then the packed rest.
    pub(crate) args: Vec<RegisterId>,
    /// Guard mask register when the signature has optional slots.
    pub(crate) mask: Option<RegisterId>,
    /// Caller bindings passed with `ref`; widened after the call.
    pub(crate) ref_vars: Vec<Symbol>,
    /// Caller bindings passed to `out?` slots; forked after the call.
    pub(crate) out_vars: Vec<Symbol>,
}

impl<'a> Checker<'a> {
    pub(crate) fn check_call(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        callee: &Ident,
        args: &[CallArg],
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let Some(sym) = self.asm.lookup_symbol(&callee.node) else {
            return Err(CheckError::new(
                callee.span,
                format!("unknown function '{}'", callee.node),
            ));
        };
        if self
            .asm
            .operator_overloads(sym)
            .is_some_and(|o| !o.is_empty())
        {
            return self.check_operator_call(env, span, sym, &callee.node, args, trgt);
        }
        if let Some(id) = self.asm.invoke_by_name(sym) {
            return self.check_invoke_call(env, span, id, &callee.node, args, trgt);
        }
        if env.lookup(sym).is_some() {
            return self.check_value_call(env, span, callee, args, trgt);
        }
        Err(CheckError::new(
            callee.span,
            format!("unknown function '{}'", callee.node),
        ))
    }

    /// Direct call to a registered signature: bind generics from context,
    /// bind arguments, invoke, then settle ref/out? effects on the caller.
    pub(crate) fn check_invoke_call(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        id: InvokeId,
        name: &str,
        args: &[CallArg],
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let def = self.asm.invoke(id).clone();
        let Some(binds) = self
            .asm
            .resolve_binds_for_call(&def.terms, &[], &env.term_binds)
        else {
            return Err(CheckError::new(
                span,
                format!("cannot bind the generic terms of '{name}' at this call site"),
            ));
        };
        let f = self.asm.substitute_fn(&def.fn_type(), &binds);

        let (mut env, bound) = self.bind_arguments(env, span, name, &f, args)?;
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::Invoke {
                invoke: id,
                args: bound.args,
                mask: bound.mask,
            },
        );

        // The callee may have reassigned a ref binding to anything of its
        // declared type; prior narrowings no longer hold.
        for sym in &bound.ref_vars {
            env.widen(*sym);
        }
        let result = (*f.result).clone();
        self.set_plain_result(&mut env, result, trgt);

        // Every out? binding forks the continuation: one flow where the
        // callee assigned it, one where it did not.
        let mut flows = vec![env];
        for sym in &bound.out_vars {
            let mut forked = Vec::with_capacity(flows.len() * 2);
            for f_env in flows {
                let mut assigned = f_env.clone();
                assigned.widen(*sym);
                let mut unassigned = f_env;
                if let Some(info) = unassigned.lookup_mut(*sym) {
                    info.must_defined = false;
                }
                forked.push(assigned);
                forked.push(unassigned);
            }
            flows = forked;
        }
        Ok(flows)
    }

    /// Operator call: prefer the overload whose literal-tagged slots match
    /// the written literals exactly, then fall back on arity.
    fn check_operator_call(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        sym: Symbol,
        name: &str,
        args: &[CallArg],
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let overloads: Vec<InvokeId> = self
            .asm
            .operator_overloads(sym)
            .map(|o| o.to_vec())
            .unwrap_or_default();

        if self.opts.literal_dispatch {
            let tagged: Vec<InvokeId> = overloads
                .iter()
                .copied()
                .filter(|&id| {
                    let def = self.asm.invoke(id);
                    def.params.iter().any(|p| p.literal_tag.is_some())
                        && self.literal_tags_match(id, args)
                })
                .collect();
            match tagged.len() {
                1 => return self.check_invoke_call(env, span, tagged[0], name, args, trgt),
                0 => {}
                _ => {
                    return Err(CheckError::new(
                        span,
                        format!("ambiguous operator overload for '{name}'"),
                    ));
                }
            }
        }

        let plain: Vec<InvokeId> = overloads
            .iter()
            .copied()
            .filter(|&id| {
                let def = self.asm.invoke(id);
                def.params.iter().all(|p| p.literal_tag.is_none()) && self.arity_fits(id, args)
            })
            .collect();
        match plain.len() {
            1 => self.check_invoke_call(env, span, plain[0], name, args, trgt),
            0 => Err(CheckError::new(
                span,
                format!("no matching operator overload for '{name}'"),
            )),
            _ => Err(CheckError::new(
                span,
                format!("ambiguous operator overload for '{name}'"),
            )),
        }
    }

    fn literal_tags_match(&self, id: InvokeId, args: &[CallArg]) -> bool {
        let def = self.asm.invoke(id);
        if !self.arity_fits(id, args) {
            return false;
        }
        for (i, p) in def.params.iter().enumerate() {
            let Some(tag) = &p.literal_tag else { continue };
            let Some(CallArg::Positional { expr, .. }) = args.get(i) else {
                return false;
            };
            if literal_tag_of(expr).as_ref() != Some(tag) {
                return false;
            }
        }
        true
    }

    fn arity_fits(&self, id: InvokeId, args: &[CallArg]) -> bool {
        // Spreads widen the count unpredictably; let the binder decide.
        if args.iter().any(|a| matches!(a, CallArg::Spread { .. })) {
            return true;
        }
        let def = self.asm.invoke(id);
        let required = def.params.iter().filter(|p| p.default.is_none()).count();
        args.len() >= required && (args.len() <= def.params.len() || def.rest.is_some())
    }

    /// Call through a function-typed binding (lambda or captured callable).
    pub(crate) fn check_value_call(
        &mut self,
        env: TypeEnvironment,
        span: Span,
        callee: &Ident,
        args: &[CallArg],
        trgt: RegisterId,
    ) -> Result<Vec<TypeEnvironment>, CheckError> {
        let info = self
            .asm
            .lookup_symbol(&callee.node)
            .and_then(|sym| env.lookup(sym).cloned());
        let Some(info) = info else {
            return Err(CheckError::new(
                callee.span,
                format!("unknown callable '{}'", callee.node),
            ));
        };
        if !info.must_defined {
            return Err(CheckError::new(
                callee.span,
                format!("'{}' may be unassigned here", callee.node),
            ));
        }
        let Some(TypeAtom::Fn(f)) = info.flow.as_unique().cloned() else {
            return Err(CheckError::new(
                callee.span,
                format!(
                    "'{}' of type {} is not callable",
                    callee.node,
                    self.asm.type_display(&info.flow)
                ),
            ));
        };
        if f.params.iter().any(|p| p.optional) {
            return Err(CheckError::new(
                span,
                "optional parameters require a direct call, not a function value",
            ));
        }
        if f.params.iter().any(|p| p.ref_kind != RefKind::ByValue) {
            return Err(CheckError::new(
                span,
                "by-reference parameters require a direct call, not a function value",
            ));
        }

        let (mut env, bound) = self.bind_arguments(env, span, &callee.node, &f, args)?;
        self.emit.emit(
            span,
            Some(trgt),
            InstKind::InvokeValue {
                callee: info.reg,
                args: bound.args,
            },
        );
        let result = (*f.result).clone();
        self.set_plain_result(&mut env, result, trgt);
        Ok(vec![env])
    }

    /// Bind the written arguments against a (fully substituted) signature.
    /// Arguments evaluate in source order; positionals and tuple-spread
    /// members queue into the slots no named argument claims.
    pub(crate) fn bind_arguments(
        &mut self,
        mut env: TypeEnvironment,
        span: Span,
        name: &str,
        f: &FunctionType,
        args: &[CallArg],
    ) -> Result<(TypeEnvironment, BoundCall), CheckError> {
        let optional_count = f.params.iter().filter(|p| p.optional).count();
        if optional_count > 64 {
            return Err(CheckError::new(
                span,
                "a signature supports at most 64 optional parameters",
            ));
        }

        let named_claims: Vec<Option<usize>> = args
            .iter()
            .map(|a| match a {
                CallArg::Named { name: n, .. } => f
                    .params
                    .iter()
                    .position(|p| self.asm.name_of(p.name) == n.node),
                _ => None,
            })
            .collect();
        let mut open: Vec<usize> = (0..f.params.len())
            .filter(|i| !named_claims.contains(&Some(*i)))
            .collect();
        open.reverse(); // pop() walks it front to back

        let mut slots: Vec<Option<RegisterId>> = vec![None; f.params.len()];
        let mut rest_regs: Vec<RegisterId> = Vec::new();
        let mut ref_vars: Vec<Symbol> = Vec::new();
        let mut out_vars: Vec<Symbol> = Vec::new();

        for arg in args {
            match arg {
                CallArg::Named { name: n, expr, .. } => {
                    let Some(i) = f
                        .params
                        .iter()
                        .position(|p| self.asm.name_of(p.name) == n.node)
                    else {
                        return Err(CheckError::new(
                            n.span,
                            format!("'{}' has no parameter '{}'", name, n.node),
                        ));
                    };
                    if slots[i].is_some() {
                        return Err(CheckError::new(
                            n.span,
                            format!("parameter '{}' is bound more than once", n.node),
                        ));
                    }
                    env = self.bind_value_slot(env, f, i, expr, &mut slots)?;
                }
                CallArg::Positional { expr, .. } => match open.pop() {
                    Some(i) => env = self.bind_value_slot(env, f, i, expr, &mut slots)?,
                    None => env = self.bind_rest_value(env, f, name, expr, &mut rest_regs)?,
                },
                CallArg::Spread { span: sp, expr } => {
                    env = self.bind_spread(
                        env, f, name, *sp, expr, &mut open, &mut slots, &mut rest_regs,
                    )?;
                }
                CallArg::Ref { span: sp, var } => {
                    let Some(i) = open.pop() else {
                        return Err(CheckError::new(
                            *sp,
                            format!("too many arguments in call to '{name}'"),
                        ));
                    };
                    env = self.bind_ref_slot(
                        env, f, i, var, &mut slots, &mut ref_vars, &mut out_vars,
                    )?;
                }
            }
        }

        // Unfilled slots: optionals ride a placeholder plus a cleared mask
        // bit; anything else is missing.
        let mut mask_bits: u64 = 0;
        let mut opt_slot = 0u8;
        for (i, p) in f.params.iter().enumerate() {
            if p.optional {
                if slots[i].is_some() {
                    mask_bits |= 1 << opt_slot;
                } else {
                    let r = self.emit.fresh_register();
                    self.emit
                        .emit(span, Some(r), InstKind::LoadConst { value: Const::None });
                    slots[i] = Some(r);
                }
                opt_slot += 1;
            } else if slots[i].is_none() {
                return Err(CheckError::new(
                    span,
                    format!(
                        "missing required argument '{}' in call to '{}'",
                        self.asm.name_of(p.name),
                        name
                    ),
                ));
            }
        }
        let mask = if optional_count > 0 {
            let r = self.emit.fresh_register();
            self.emit.emit(
                span,
                Some(r),
                InstKind::LoadMask {
                    bits: mask_bits,
                    slots: optional_count as u8,
                },
            );
            Some(r)
        } else {
            None
        };

        let mut out_args: Vec<RegisterId> = slots
            .into_iter()
            .map(|r| r.expect("every slot is filled or reported"))
            .collect();
        if let Some(rest) = &f.rest {
            let key = self.emit.register_type(&rest.ty);
            let r = self.emit.fresh_register();
            self.emit.emit(
                span,
                Some(r),
                InstKind::ConstructCollection {
                    ty: key,
                    args: rest_regs,
                },
            );
            out_args.push(r);
        }

        env.clear_result();
        Ok((
            env,
            BoundCall {
                args: out_args,
                mask,
                ref_vars,
                out_vars,
            },
        ))
    }

    fn bind_value_slot(
        &mut self,
        mut env: TypeEnvironment,
        f: &FunctionType,
        i: usize,
        expr: &Expr,
        slots: &mut [Option<RegisterId>],
    ) -> Result<TypeEnvironment, CheckError> {
        let p = &f.params[i];
        if p.ref_kind != RefKind::ByValue {
            return Err(CheckError::new(
                expr.span,
                format!(
                    "parameter '{}' must be passed a variable with 'ref'",
                    self.asm.name_of(p.name)
                ),
            ));
        }
        if let Some(tag) = &p.literal_tag {
            if literal_tag_of(expr).as_ref() != Some(tag) {
                return Err(CheckError::new(
                    expr.span,
                    format!(
                        "parameter '{}' only accepts a fixed literal",
                        self.asm.name_of(p.name)
                    ),
                ));
            }
        }
        let r = self.emit.fresh_register();
        env = self.check_expr_single(env, expr, r, Some(&p.ty))?;
        let flow = env.expr_result().vtype.flow.clone();
        env.clear_result();
        if !self.asm.subtype_of(&flow, &p.ty) {
            return Err(CheckError::new(
                expr.span,
                format!(
                    "argument of type {} is not a subtype of parameter '{}' of type {}",
                    self.asm.type_display(&flow),
                    self.asm.name_of(p.name),
                    self.asm.type_display(&p.ty)
                ),
            ));
        }
        slots[i] = Some(r);
        Ok(env)
    }

    fn bind_rest_value(
        &mut self,
        mut env: TypeEnvironment,
        f: &FunctionType,
        name: &str,
        expr: &Expr,
        rest_regs: &mut Vec<RegisterId>,
    ) -> Result<TypeEnvironment, CheckError> {
        let Some(rest) = &f.rest else {
            return Err(CheckError::new(
                expr.span,
                format!("too many arguments in call to '{name}'"),
            ));
        };
        let r = self.emit.fresh_register();
        env = self.check_expr_single(env, expr, r, Some(&rest.elem))?;
        let flow = env.expr_result().vtype.flow.clone();
        env.clear_result();
        if !self.asm.subtype_of(&flow, &rest.elem) {
            return Err(CheckError::new(
                expr.span,
                format!(
                    "rest argument of type {} is not a subtype of element type {}",
                    self.asm.type_display(&flow),
                    self.asm.type_display(&rest.elem)
                ),
            ));
        }
        rest_regs.push(r);
        Ok(env)
    }

    fn bind_ref_slot(
        &mut self,
        mut env: TypeEnvironment,
        f: &FunctionType,
        i: usize,
        var: &Ident,
        slots: &mut [Option<RegisterId>],
        ref_vars: &mut Vec<Symbol>,
        out_vars: &mut Vec<Symbol>,
    ) -> Result<TypeEnvironment, CheckError> {
        let p = &f.params[i];
        if p.ref_kind == RefKind::ByValue {
            return Err(CheckError::new(
                var.span,
                format!(
                    "parameter '{}' is not a by-reference parameter",
                    self.asm.name_of(p.name)
                ),
            ));
        }
        let info = self
            .asm
            .lookup_symbol(&var.node)
            .and_then(|sym| env.lookup(sym).map(|i| (sym, i.clone())));
        let Some((sym, info)) = info else {
            return Err(CheckError::new(
                var.span,
                format!("'{}' is not a variable in scope", var.node),
            ));
        };
        if info.is_const {
            return Err(CheckError::new(
                var.span,
                "a const binding cannot be passed by reference",
            ));
        }
        // The callee stores through this slot; the types must agree exactly,
        // not merely by subtyping.
        if info.decl != p.ty {
            return Err(CheckError::new(
                var.span,
                format!(
                    "a by-reference argument must match the parameter type exactly: '{}' is {}, parameter '{}' is {}",
                    var.node,
                    self.asm.type_display(&info.decl),
                    self.asm.name_of(p.name),
                    self.asm.type_display(&p.ty)
                ),
            ));
        }
        match p.ref_kind {
            RefKind::Ref => {
                if !info.must_defined {
                    return Err(CheckError::new(
                        var.span,
                        format!("'{}' may be unassigned here", var.node),
                    ));
                }
                ref_vars.push(sym);
            }
            RefKind::OutOpt => out_vars.push(sym),
            RefKind::ByValue => unreachable!("rejected above"),
        }
        env.clear_result();
        slots[i] = Some(info.reg);
        Ok(env)
    }

    /// A spread argument: a unique complete tuple feeds the positional
    /// queue, a unique record fills parameters by name.
    #[allow(clippy::too_many_arguments)]
    fn bind_spread(
        &mut self,
        mut env: TypeEnvironment,
        f: &FunctionType,
        name: &str,
        span: Span,
        expr: &Expr,
        open: &mut Vec<usize>,
        slots: &mut [Option<RegisterId>],
        rest_regs: &mut Vec<RegisterId>,
    ) -> Result<TypeEnvironment, CheckError> {
        let tmp = self.emit.fresh_register();
        env = self.check_expr_single(env, expr, tmp, None)?;
        let flow = env.expr_result().vtype.flow.clone();
        env.clear_result();

        match flow.as_unique().cloned() {
            Some(TypeAtom::Tuple {
                members,
                complete: true,
            })
            | Some(TypeAtom::EphemeralList { members }) => {
                for (idx, member) in members.iter().enumerate() {
                    let r = self.emit.fresh_register();
                    self.emit.emit(
                        span,
                        Some(r),
                        InstKind::LoadIndex {
                            src: tmp,
                            index: idx as u64,
                        },
                    );
                    match open.pop() {
                        Some(i) => {
                            let p = &f.params[i];
                            if p.ref_kind != RefKind::ByValue {
                                return Err(CheckError::new(
                                    span,
                                    format!(
                                        "parameter '{}' must be passed a variable with 'ref'",
                                        self.asm.name_of(p.name)
                                    ),
                                ));
                            }
                            if !self.asm.subtype_of(member, &p.ty) {
                                return Err(CheckError::new(
                                    span,
                                    format!(
                                        "spread member of type {} is not a subtype of parameter '{}' of type {}",
                                        self.asm.type_display(member),
                                        self.asm.name_of(p.name),
                                        self.asm.type_display(&p.ty)
                                    ),
                                ));
                            }
                            slots[i] = Some(r);
                        }
                        None => {
                            let Some(rest) = &f.rest else {
                                return Err(CheckError::new(
                                    span,
                                    format!("too many arguments in call to '{name}'"),
                                ));
                            };
                            if !self.asm.subtype_of(member, &rest.elem) {
                                return Err(CheckError::new(
                                    span,
                                    format!(
                                        "rest argument of type {} is not a subtype of element type {}",
                                        self.asm.type_display(member),
                                        self.asm.type_display(&rest.elem)
                                    ),
                                ));
                            }
                            rest_regs.push(r);
                        }
                    }
                }
                Ok(env)
            }
            Some(TypeAtom::Record { props }) => {
                for (prop, ty) in &props {
                    let Some(i) = f.params.iter().position(|p| p.name == *prop) else {
                        return Err(CheckError::new(
                            span,
                            format!(
                                "spread property '{}' matches no parameter of '{}'",
                                self.asm.name_of(*prop),
                                name
                            ),
                        ));
                    };
                    if slots[i].is_some() {
                        return Err(CheckError::new(
                            span,
                            format!(
                                "parameter '{}' is bound more than once",
                                self.asm.name_of(*prop)
                            ),
                        ));
                    }
                    let p = &f.params[i];
                    if p.ref_kind != RefKind::ByValue {
                        return Err(CheckError::new(
                            span,
                            format!(
                                "parameter '{}' must be passed a variable with 'ref'",
                                self.asm.name_of(p.name)
                            ),
                        ));
                    }
                    if !self.asm.subtype_of(ty, &p.ty) {
                        return Err(CheckError::new(
                            span,
                            format!(
                                "spread property of type {} is not a subtype of parameter '{}' of type {}",
                                self.asm.type_display(ty),
                                self.asm.name_of(p.name),
                                self.asm.type_display(&p.ty)
                            ),
                        ));
                    }
                    let r = self.emit.fresh_register();
                    self.emit.emit(
                        span,
                        Some(r),
                        InstKind::LoadField {
                            src: tmp,
                            field: *prop,
                        },
                    );
                    slots[i] = Some(r);
                    open.retain(|&o| o != i);
                }
                Ok(env)
            }
            _ => Err(CheckError::new(
                span,
                format!(
                    "a spread argument must be a unique tuple, record, or ephemeral list, got {}",
                    self.asm.type_display(&flow)
                ),
            )),
        }
    }
}

/// The literal tag an argument expression carries syntactically, if any.
/// Drives operator-overload dispatch and fixed-literal parameters.
fn literal_tag_of(expr: &Expr) -> Option<LiteralTag> {
    match &expr.kind {
        ExprKind::LitBool(b) => Some(LiteralTag::Bool(*b)),
        ExprKind::LitString(s) => Some(LiteralTag::Str(s.clone())),
        ExprKind::LitNumber { digits, tag } => match tag {
            Some(NumKind::Int) | None => digits.parse::<i64>().ok().map(LiteralTag::Int),
            Some(NumKind::Nat) => digits.parse::<u64>().ok().map(LiteralTag::Nat),
            Some(NumKind::BigInt) | Some(NumKind::Float) => None,
        },
        _ => None,
    }
}
