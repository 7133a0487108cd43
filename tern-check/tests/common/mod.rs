#![allow(dead_code)]

use tern_ast::{
    Block, CallArg, Expr, ExprKind, Ident, InvokeDecl, NumKind, ReturnStmt, Span, Spanned, Stmt,
    TypeSig, TypeSigKind, VarDeclStmt,
};
use tern_types::{Assembly, InvokeDef, InvokeId, LiteralTag, ParamDef, RefKind, ResolvedType};

pub fn sp() -> Span {
    tern_ast::span(0, 0)
}

pub fn ident(name: &str) -> Ident {
    Spanned::new(sp(), name.to_string())
}

pub fn ex(kind: ExprKind) -> Expr {
    Expr { span: sp(), kind }
}

pub fn v(name: &str) -> Expr {
    ex(ExprKind::Var(ident(name)))
}

pub fn lit(digits: &str, tag: NumKind) -> Expr {
    ex(ExprKind::LitNumber {
        digits: digits.to_string(),
        tag: Some(tag),
    })
}

pub fn int(digits: &str) -> Expr {
    lit(digits, NumKind::Int)
}

pub fn lit_bool(b: bool) -> Expr {
    ex(ExprKind::LitBool(b))
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    ex(ExprKind::Bin {
        op: tern_ast::BinOp::Add,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    ex(ExprKind::Bin {
        op: tern_ast::BinOp::Gt,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn is_test(e: Expr, ty: TypeSig) -> Expr {
    ex(ExprKind::IsTest {
        expr: Box::new(e),
        ty,
    })
}

pub fn call(name: &str, args: Vec<CallArg>) -> Expr {
    ex(ExprKind::Call {
        callee: ident(name),
        args,
    })
}

pub fn pos(e: Expr) -> CallArg {
    CallArg::Positional { span: sp(), expr: e }
}

pub fn named(name: &str, e: Expr) -> CallArg {
    CallArg::Named {
        span: sp(),
        name: ident(name),
        expr: e,
    }
}

pub fn by_ref(name: &str) -> CallArg {
    CallArg::Ref {
        span: sp(),
        var: ident(name),
    }
}

pub fn blk(stmts: Vec<Stmt>) -> Block {
    Block { span: sp(), stmts }
}

pub fn ret(e: Expr) -> Stmt {
    Stmt::Return(ReturnStmt {
        span: sp(),
        expr: Some(e),
    })
}

pub fn let_var(name: &str, ty: Option<TypeSig>, init: Option<Expr>) -> Stmt {
    Stmt::VarDecl(VarDeclStmt {
        span: sp(),
        name: ident(name),
        is_const: false,
        ty,
        init,
    })
}

pub fn assign(name: &str, e: Expr) -> Stmt {
    Stmt::Assign(tern_ast::AssignStmt {
        span: sp(),
        target: ident(name),
        expr: e,
    })
}

pub fn sig(name: &str) -> TypeSig {
    TypeSig {
        span: sp(),
        kind: TypeSigKind::Nominal {
            name: ident(name),
            args: Vec::new(),
        },
    }
}

pub fn sig_union(options: Vec<TypeSig>) -> TypeSig {
    TypeSig {
        span: sp(),
        kind: TypeSigKind::Union { options },
    }
}

pub fn decl(name: &str, body: Block) -> InvokeDecl {
    InvokeDecl {
        span: sp(),
        name: ident(name),
        body,
    }
}

pub fn param(asm: &mut Assembly, name: &str, ty: ResolvedType) -> ParamDef {
    ParamDef {
        span: sp(),
        name: asm.intern(name),
        ty,
        ref_kind: RefKind::ByValue,
        default: None,
        literal_tag: None,
    }
}

pub fn param_opt(asm: &mut Assembly, name: &str, ty: ResolvedType, default: Expr) -> ParamDef {
    ParamDef {
        span: sp(),
        name: asm.intern(name),
        ty,
        ref_kind: RefKind::ByValue,
        default: Some(default),
        literal_tag: None,
    }
}

pub fn param_ref(asm: &mut Assembly, name: &str, ty: ResolvedType, kind: RefKind) -> ParamDef {
    ParamDef {
        span: sp(),
        name: asm.intern(name),
        ty,
        ref_kind: kind,
        default: None,
        literal_tag: None,
    }
}

pub fn param_lit(
    asm: &mut Assembly,
    name: &str,
    ty: ResolvedType,
    tag: LiteralTag,
) -> ParamDef {
    ParamDef {
        span: sp(),
        name: asm.intern(name),
        ty,
        ref_kind: RefKind::ByValue,
        default: None,
        literal_tag: Some(tag),
    }
}

pub fn declare_fn(
    asm: &mut Assembly,
    name: &str,
    params: Vec<ParamDef>,
    result: ResolvedType,
) -> InvokeId {
    let name = asm.intern(name);
    asm.declare_invoke(InvokeDef {
        span: sp(),
        name,
        terms: Vec::new(),
        params,
        rest: None,
        result,
    })
}
