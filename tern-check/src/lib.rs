#![forbid(unsafe_code)]

//! Flow-sensitive checker: validates every invoke body against the
//! signatures registered in the assembly and emits mid-level IR for the
//! declarations that check cleanly. Checking is per-declaration; a
//! declaration with a terminal error produces no code but never stops its
//! neighbours from being checked.

mod args;
mod expr;
mod init;
mod stmt;

pub mod env;
pub mod error;

use tern_ast::{InvokeDecl, Program, Span};
use tern_mir::{BlockId, DebugSource, InstKind, MirBody, MirEmitter, RegisterId, Terminator};
use tern_types::{Assembly, InvokeDef, RefKind, ResolvedType, ValueType};

pub use env::{ExprResult, Truth, TypeEnvironment, VarInfo};
pub use error::{CheckError, CheckerOptions, DiagRow, Diagnostics};

pub struct CheckOutput {
    pub bodies: Vec<MirBody>,
    pub diagnostics: Diagnostics,
}

/// Check every invoke body in the program. Emitted bodies cover exactly
/// the declarations that checked without a terminal error.
pub fn check_program(
    asm: &mut Assembly,
    program: &Program,
    source: Option<DebugSource>,
    opts: CheckerOptions,
) -> CheckOutput {
    let mut diagnostics = Diagnostics::new(source, opts.error_limit);
    let mut bodies = Vec::new();

    for decl in &program.invokes {
        if diagnostics.tripped() {
            diagnostics.record(&CheckError::new(decl.span, "too many errors, giving up"));
            break;
        }
        match check_invoke(asm, decl, &opts) {
            Ok(mut emitted) => bodies.append(&mut emitted),
            Err(e) => diagnostics.record(&e),
        }
    }

    CheckOutput {
        bodies,
        diagnostics,
    }
}

/// Check one declaration. On success the final body is last; auxiliary
/// bodies generated for lambdas precede it.
pub fn check_invoke(
    asm: &mut Assembly,
    decl: &InvokeDecl,
    opts: &CheckerOptions,
) -> Result<Vec<MirBody>, CheckError> {
    let sym = asm
        .lookup_symbol(&decl.name.node)
        .and_then(|s| asm.invoke_by_name(s).map(|id| (s, id)));
    let Some((name_sym, id)) = sym else {
        return Err(CheckError::new(
            decl.name.span,
            format!("no signature registered for '{}'", decl.name.node),
        ));
    };
    let def = asm.invoke(id).clone();
    let term_binds = asm.term_var_binds(&def.terms);

    let mut ck = Checker {
        asm,
        opts: opts.clone(),
        emit: MirEmitter::new(name_sym, decl.span),
        declared_result: Some(def.result.clone()),
        returns: Vec::new(),
        yield_frames: Vec::new(),
        aux: Vec::new(),
        next_lambda: 0,
        base_name: decl.name.node.clone(),
    };

    let entry = ck.emit.fresh_block();
    ck.emit.start_block(entry, decl.span);

    let mut env = TypeEnvironment::new(term_binds.clone());
    let mask = ck.declare_params(&mut env, &def, decl.span)?;
    env = ck.emit_param_defaults(env, &def, mask)?;

    env = ck.check_block(env, &decl.body)?;

    if env.normal_flow {
        let none = ck.asm.none_type();
        if !ck.asm.subtype_of(&none, &def.result) {
            return Err(CheckError::new(
                decl.span,
                format!(
                    "control reaches the end of '{}' without returning a value",
                    decl.name.node
                ),
            ));
        }
        ck.emit.set_terminator(Terminator::Return(None));
    }

    let result_key = ck.emit.register_type(&def.result);
    let body = ck.emit.finish(result_key, entry);
    let mut out = ck.aux;
    out.push(body);
    Ok(out)
}

pub(crate) struct YieldFrame {
    pub(crate) types: Vec<ResolvedType>,
    pub(crate) trgt: RegisterId,
    pub(crate) join_bb: BlockId,
}

pub(crate) struct Checker<'a> {
    pub(crate) asm: &'a mut Assembly,
    pub(crate) opts: CheckerOptions,
    pub(crate) emit: MirEmitter,
    /// Declared result type of the body being checked; `None` while a
    /// lambda without a result hint is inferred from its returns.
    pub(crate) declared_result: Option<ResolvedType>,
    pub(crate) returns: Vec<ResolvedType>,
    pub(crate) yield_frames: Vec<YieldFrame>,
    pub(crate) aux: Vec<MirBody>,
    pub(crate) next_lambda: u32,
    pub(crate) base_name: String,
}

impl<'a> Checker<'a> {
    /// Declare the formal parameters into the entry environment. Returns
    /// the guard-mask register when the signature has optional slots.
    fn declare_params(
        &mut self,
        env: &mut TypeEnvironment,
        def: &InvokeDef,
        span: Span,
    ) -> Result<Option<RegisterId>, CheckError> {
        let optional_count = def.params.iter().filter(|p| p.default.is_some()).count();
        if optional_count > 64 {
            return Err(CheckError::new(
                span,
                "a signature supports at most 64 optional parameters",
            ));
        }

        let mask = if optional_count > 0 {
            let mask_sym = self.asm.intern("$mask");
            let bool_ty = self.asm.bool_type();
            let key = self.emit.register_type(&bool_ty);
            Some(self.emit.declare_param(mask_sym, key))
        } else {
            None
        };

        for p in &def.params {
            if p.ty.is_ephemeral() {
                return Err(CheckError::new(
                    p.span,
                    "ephemeral values cannot flow through a parameter",
                ));
            }
            let key = self.emit.register_type(&p.ty);
            let reg = self.emit.declare_param(p.name, key);
            // An out? parameter starts unassigned in the callee.
            let defined = p.ref_kind != RefKind::OutOpt;
            env.declare(
                p.name,
                VarInfo {
                    decl: p.ty.clone(),
                    flow: p.ty.clone(),
                    reg,
                    is_const: false,
                    must_defined: defined,
                },
            );
        }
        Ok(mask)
    }

    /// Check an expression and collapse its flows back into one. Most
    /// non-branching contexts want this form.
    pub(crate) fn check_expr_single(
        &mut self,
        env: TypeEnvironment,
        expr: &tern_ast::Expr,
        trgt: RegisterId,
        infer: Option<&ResolvedType>,
    ) -> Result<TypeEnvironment, CheckError> {
        let span = expr.span;
        let flows = self.check_expr(env, expr, trgt, infer)?;
        TypeEnvironment::join(self.asm, span, flows)
    }

    /// Split an already-checked boolean's flows by their truth. Unknown
    /// flows feed both sides.
    pub(crate) fn split_flows(
        flows: Vec<TypeEnvironment>,
    ) -> (Vec<TypeEnvironment>, Vec<TypeEnvironment>) {
        let mut tenvs = Vec::new();
        let mut fenvs = Vec::new();
        for env in flows {
            match env.expr_result().truth {
                Truth::True => tenvs.push(env),
                Truth::False => fenvs.push(env),
                Truth::Unknown => {
                    tenvs.push(env.clone());
                    fenvs.push(env);
                }
            }
        }
        (tenvs, fenvs)
    }

    /// Check a boolean condition into `trgt` and return (true-flows,
    /// false-flows), with narrowings applied on each side.
    pub(crate) fn check_condition(
        &mut self,
        env: TypeEnvironment,
        cond: &tern_ast::Expr,
        trgt: RegisterId,
    ) -> Result<(Vec<TypeEnvironment>, Vec<TypeEnvironment>), CheckError> {
        let flows = self.check_expr(env, cond, trgt, None)?;
        let bool_ty = self.asm.bool_type();
        for f in &flows {
            let res = f.expr_result();
            if !self.asm.subtype_of(&res.vtype.flow, &bool_ty) {
                return Err(CheckError::new(
                    cond.span,
                    format!(
                        "condition has type {}, expected Bool",
                        self.asm.type_display(&res.vtype.flow)
                    ),
                ));
            }
        }
        Ok(Self::split_flows(flows))
    }

    pub(crate) fn fresh_lambda_name(&mut self) -> tern_types::Symbol {
        let name = format!("{}$lambda${}", self.base_name, self.next_lambda);
        self.next_lambda += 1;
        self.asm.intern(&name)
    }

    pub(crate) fn set_plain_result(
        &self,
        env: &mut TypeEnvironment,
        ty: ResolvedType,
        trgt: RegisterId,
    ) {
        env.set_result(ValueType::of(ty), Truth::Unknown, None, trgt);
    }

    pub(crate) fn emit_lifetime_ends(&mut self, span: Span, order: &[tern_types::Symbol]) {
        for &name in order {
            self.emit.emit(span, None, InstKind::VarLifetimeEnd { name });
        }
    }
}
