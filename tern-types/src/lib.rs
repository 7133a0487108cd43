#![forbid(unsafe_code)]

mod assembly;
mod intern;
mod types;

pub use assembly::{
    Assembly, ConceptDef, ConstDef, EntityDef, FieldDef, InvokeDef, ParamDef, ResolveError,
    WellKnown,
};
pub use intern::{Interner, Symbol};
pub use types::{
    Binds, ConceptId, ConstId, EntityId, FunctionParam, FunctionType, InvokeId, LiteralTag,
    RefKind, ResolvedType, RestParam, TypeAtom, ValueType,
};
