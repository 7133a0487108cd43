#![forbid(unsafe_code)]

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

/// One checkable compilation unit: every invoke body is checked
/// independently against the signatures registered in the assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub invokes: Vec<InvokeDecl>,
}

/// The body of a function/method/constructor. Its signature (parameters,
/// declared result, defaults) lives in the resolved-type database and is
/// looked up by name.
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeDecl {
    pub span: Span,
    pub name: Ident,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Type signatures (surface syntax, resolved by the assembly)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct TypeSig {
    pub span: Span,
    pub kind: TypeSigKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeSigKind {
    /// Nominal entity/concept reference with optional generic arguments,
    /// e.g. `List<Int>`. Also covers generic term names in scope.
    Nominal { name: Ident, args: Vec<TypeSig> },

    /// `[T, U]` — known-length tuple; `complete = false` marks a
    /// possibly-longer tuple signature `[T, U, ...]`.
    Tuple { members: Vec<TypeSig>, complete: bool },

    /// `{ f: T, g: U }` — record with named unique properties.
    Record { props: Vec<(Ident, TypeSig)> },

    /// `(| T, U |)` — ephemeral value list, multi-return only.
    EphemeralList { members: Vec<TypeSig> },

    /// `fn(T, U) -> R`.
    Fn {
        params: Vec<TypeSig>,
        rest: Option<Box<TypeSig>>,
        result: Box<TypeSig>,
    },

    /// `T | U | None`.
    Union { options: Vec<TypeSig> },

    /// `auto` — inferred from context; legal only where the checker has an
    /// inference hint.
    Auto,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

/// Numeric literal tag written in the source (`5n`, `5i`, `5I`, `5f`).
/// Untagged literals take their kind from the inference hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumKind {
    Int,
    Nat,
    BigInt,
    Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EqOp {
    /// `===`
    StrictEq,
    /// `!==`
    StrictNeq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Implies,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    LitNone,
    LitNothing,
    LitBool(bool),
    /// Digits kept verbatim so range checking happens against the resolved
    /// numeric kind, not a premature machine integer.
    LitNumber { digits: String, tag: Option<NumKind> },
    LitString(String),

    Var(Ident),

    TupleCtor(Vec<Expr>),
    RecordCtor(Vec<(Ident, Expr)>),
    /// `(| a, b |)` multi-value result constructor.
    EphemeralCtor(Vec<Expr>),
    /// Nominal entity construction `T{...}` / `T(...)`; arguments are bound
    /// against the entity's field list like a call.
    Construct { ty: TypeSig, args: Vec<CallArg> },

    Call { callee: Ident, args: Vec<CallArg> },
    /// Call through a captured function value or lambda parameter.
    CallValue { callee: Ident, args: Vec<CallArg> },

    Member { base: Box<Expr>, name: Ident },
    /// Tuple index access `e.0`.
    Index { base: Box<Expr>, index: u64 },
    /// Options-returning access `e.name?` — yields `T | None`, and an
    /// always-absent property is a constant `none`, not an error.
    TryMember { base: Box<Expr>, name: Ident },

    Prefix { op: PrefixOp, expr: Box<Expr> },
    Bin { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Eq { op: EqOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Logic { op: LogicOp, lhs: Box<Expr>, rhs: Box<Expr> },

    /// `e is T` type test.
    IsTest { expr: Box<Expr>, ty: TypeSig },
    /// `e as T` checked narrowing cast.
    AsCast { expr: Box<Expr>, ty: TypeSig },

    If {
        branches: Vec<(Expr, Expr)>,
        else_expr: Box<Expr>,
    },
    /// Literal-equality dispatch over the scrutinee.
    Switch {
        scrutinee: Box<Expr>,
        arms: Vec<SwitchExprArm>,
    },
    /// Type dispatch over the scrutinee.
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchExprArm>,
    },

    Lambda {
        params: Vec<LambdaParam>,
        body: Box<Expr>,
    },

    /// Expression block: statements terminated by `yield`s; the block's
    /// value type is the join of every yield.
    BlockExpr(Block),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LambdaParam {
    pub span: Span,
    pub name: Ident,
    pub ty: Option<TypeSig>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchExprArm {
    pub span: Span,
    pub guard: SwitchGuard,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchExprArm {
    pub span: Span,
    pub guard: MatchGuard,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SwitchGuard {
    Lit(Expr),
    Wildcard { span: Span },
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatchGuard {
    Type(TypeSig),
    Wildcard { span: Span },
}

/// A call-site argument. Spreads are classified by the checker: a tuple
/// expands into positional slots, a record into named slots.
#[derive(Clone, Debug, PartialEq)]
pub enum CallArg {
    Positional { span: Span, expr: Expr },
    Named { span: Span, name: Ident, expr: Expr },
    Spread { span: Span, expr: Expr },
    /// `ref x` — a bare mutable variable passed by reference.
    Ref { span: Span, var: Ident },
}

impl CallArg {
    pub fn span(&self) -> Span {
        match self {
            CallArg::Positional { span, .. }
            | CallArg::Named { span, .. }
            | CallArg::Spread { span, .. }
            | CallArg::Ref { span, .. } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    VarDecl(VarDeclStmt),
    VarPack(VarPackStmt),
    Assign(AssignStmt),
    StructuredAssign(StructuredAssignStmt),
    If(IfStmt),
    Switch(SwitchStmt),
    Match(MatchStmt),
    Return(ReturnStmt),
    Yield(YieldStmt),
    Abort(AbortStmt),
    Assert(AssertStmt),
    Validate(ValidateStmt),
    Block(Block),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclStmt {
    pub span: Span,
    pub name: Ident,
    pub is_const: bool,
    pub ty: Option<TypeSig>,
    /// A declaration without an initializer is legal for mutable bindings;
    /// the variable is "possibly unassigned" until a definite assignment.
    pub init: Option<Expr>,
}

/// `var (a, b, c) = e` — unpack an ephemeral list / tuple into fresh
/// bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct VarPackStmt {
    pub span: Span,
    pub names: Vec<PackTarget>,
    pub is_const: bool,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PackTarget {
    Var { name: Ident, ty: Option<TypeSig> },
    Ignore { span: Span },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Ident,
    pub expr: Expr,
}

/// `(a, _, b) = e` — destructure into existing mutable bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredAssignStmt {
    pub span: Span,
    pub targets: Vec<PackTarget>,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub branches: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchStmt {
    pub span: Span,
    pub scrutinee: Expr,
    pub arms: Vec<SwitchStmtArm>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchStmtArm {
    pub span: Span,
    pub guard: SwitchGuard,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchStmt {
    pub span: Span,
    pub scrutinee: Expr,
    pub arms: Vec<MatchStmtArm>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchStmtArm {
    pub span: Span,
    pub guard: MatchGuard,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub expr: Option<Expr>,
}

/// Yield terminates an expression-block with a value; it accumulates into
/// the block's result type the way return accumulates into the function's.
#[derive(Clone, Debug, PartialEq)]
pub struct YieldStmt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AbortStmt {
    pub span: Span,
    pub msg: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssertStmt {
    pub span: Span,
    pub cond: Expr,
}

/// Like assert, but the failure path constructs and returns an error value
/// instead of aborting.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidateStmt {
    pub span: Span,
    pub cond: Expr,
    pub err: Expr,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(s) => s.span,
            Stmt::VarPack(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::StructuredAssign(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Match(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Yield(s) => s.span,
            Stmt::Abort(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Validate(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::Expr(e) => e.span,
        }
    }
}
