#![forbid(unsafe_code)]

use tern_ast::Span;
use tern_types::{ConstId, EntityId, InvokeId, ResolvedType, Symbol};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

/// Canonical identifier for a resolved type registered with the emitter.
/// Instructions reference types only through keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(pub u32);

/// Index of one optional parameter/field slot in a guard mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaskSlot(pub u8);

#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    None,
    Nothing,
    Bool(bool),
    Int(i64),
    Nat(u64),
    /// Digits kept as written; the runtime owns big-integer representation.
    BigInt(String),
    Float(f64),
    Str(String),
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
pub enum InstKind {
    LoadConst {
        value: Const,
    },
    LoadGlobal {
        konst: ConstId,
    },
    Move {
        src: RegisterId,
    },
    /// Explicit representation change between a flow type and a layout
    /// type (or back). Never implicit.
    Convert {
        src: RegisterId,
        from: TypeKey,
        to: TypeKey,
    },

    ConstructEntity {
        ty: TypeKey,
        entity: EntityId,
        args: Vec<RegisterId>,
    },
    ConstructTuple {
        ty: TypeKey,
        args: Vec<RegisterId>,
    },
    ConstructRecord {
        ty: TypeKey,
        props: Vec<(Symbol, RegisterId)>,
    },
    ConstructEphemeral {
        ty: TypeKey,
        args: Vec<RegisterId>,
    },
    /// Fresh collection holding leftover rest arguments.
    ConstructCollection {
        ty: TypeKey,
        args: Vec<RegisterId>,
    },

    LoadField {
        src: RegisterId,
        field: Symbol,
    },
    LoadIndex {
        src: RegisterId,
        index: u64,
    },
    /// Runtime presence checks backing "maybe"-classified access.
    HasField {
        src: RegisterId,
        field: Symbol,
    },
    HasIndex {
        src: RegisterId,
        index: u64,
    },
    StoreField {
        dst: RegisterId,
        field: Symbol,
        src: RegisterId,
    },

    /// Runtime type test against a registered type.
    TypeTest {
        src: RegisterId,
        ty: TypeKey,
    },
    /// None/Nothing compare by shape, not by a nominal identity field.
    NoneTest {
        src: RegisterId,
    },
    NothingTest {
        src: RegisterId,
    },

    EqValue {
        negated: bool,
        lhs: RegisterId,
        rhs: RegisterId,
    },
    Prefix {
        op: PrefixOp,
        src: RegisterId,
    },
    Bin {
        op: BinOp,
        lhs: RegisterId,
        rhs: RegisterId,
    },

    Invoke {
        invoke: InvokeId,
        args: Vec<RegisterId>,
        /// Guard mask register when the callee has optional slots.
        mask: Option<RegisterId>,
    },
    /// Call through a function value (lambda or captured callable); the
    /// flattened captures ride as trailing arguments.
    InvokeValue {
        callee: RegisterId,
        args: Vec<RegisterId>,
    },
    /// Materialize a function value. `body` names an auxiliary emitted
    /// body; the captured registers are snapshotted at creation.
    LoadLambda {
        body: Symbol,
        captures: Vec<RegisterId>,
    },

    /// Compile-time-known guard mask bits for a call site.
    LoadMask {
        bits: u64,
        slots: u8,
    },
    /// Test one slot bit of a guard mask.
    MaskTest {
        mask: RegisterId,
        slot: MaskSlot,
    },

    /// Scope-exit event for codegen; emitted in declaration order on every
    /// still-normal path out of a block.
    VarLifetimeEnd {
        name: Symbol,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Inst {
    pub span: Span,
    pub dest: Option<RegisterId>,
    pub kind: InstKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: RegisterId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Return(Option<RegisterId>),
    Abort {
        msg: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub span: Span,
    pub insts: Vec<Inst>,
    pub term: Option<Terminator>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MirParam {
    pub name: Symbol,
    pub ty: TypeKey,
    pub reg: RegisterId,
}

/// One checked declaration's emitted code.
#[derive(Clone, Debug, PartialEq)]
pub struct MirBody {
    pub name: Symbol,
    pub span: Span,
    pub params: Vec<MirParam>,
    pub result: TypeKey,
    /// Count of virtual registers; registers are untyped temporaries.
    pub registers: u32,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    /// Type table; `TypeKey` indexes into it.
    pub types: Vec<ResolvedType>,
}

impl MirBody {
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn type_of(&self, key: TypeKey) -> &ResolvedType {
        &self.types[key.0 as usize]
    }
}
