#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::intern::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConceptId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvokeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstId(pub u32);

/// Generic-term bindings, term name to bound type. BTreeMap keeps the
/// binding order canonical so structural equality is order-insensitive.
pub type Binds = BTreeMap<Symbol, ResolvedType>;

/// How an argument flows into a formal parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    ByValue,
    /// `ref` — the callee may reassign; the caller's binding widens back
    /// to its declared type after the call.
    Ref,
    /// `out?` — the callee may or may not assign; the caller's
    /// continuation forks into assigned/unassigned flows.
    OutOpt,
}

/// Compile-time literal tag used for operator-overload dispatch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiteralTag {
    Bool(bool),
    Int(i64),
    Nat(u64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionParam {
    pub name: Symbol,
    pub ty: ResolvedType,
    /// True when the declaration carries a default initializer.
    pub optional: bool,
    pub ref_kind: RefKind,
    pub literal_tag: Option<LiteralTag>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RestParam {
    pub name: Symbol,
    /// The collection type the leftover positionals are packed into.
    pub ty: ResolvedType,
    /// Element type of that collection.
    pub elem: ResolvedType,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionType {
    pub params: Vec<FunctionParam>,
    pub rest: Option<RestParam>,
    pub result: Box<ResolvedType>,
}

/// One alternative of a union type. The derived `Ord` gives every atom a
/// canonical position inside a `ResolvedType`, making option order
/// irrelevant to equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeAtom {
    /// An unbound generic term inside a declaration's signature; replaced
    /// by `Assembly::substitute` once the call binds it.
    TermVar(Symbol),
    Entity {
        id: EntityId,
        binds: Binds,
    },
    /// Conjunction of concepts; an entity satisfies the atom only if it
    /// provides every entry.
    Concept {
        entries: Vec<(ConceptId, Binds)>,
    },
    Tuple {
        members: Vec<ResolvedType>,
        /// False marks a possibly-longer tuple (`[T, U, ...]`).
        complete: bool,
    },
    Record {
        /// Sorted by property symbol; property names are unique.
        props: Vec<(Symbol, ResolvedType)>,
    },
    /// Multi-value return carrier. Never storable in a variable or field.
    EphemeralList {
        members: Vec<ResolvedType>,
    },
    Fn(FunctionType),
}

/// A deduplicated, canonically ordered set of type options.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedType {
    options: Vec<TypeAtom>,
}

impl ResolvedType {
    pub fn new(mut options: Vec<TypeAtom>) -> Self {
        debug_assert!(!options.is_empty(), "a resolved type has at least one option");
        options.sort();
        options.dedup();
        Self { options }
    }

    pub fn single(atom: TypeAtom) -> Self {
        Self { options: vec![atom] }
    }

    pub fn entity(id: EntityId) -> Self {
        Self::single(TypeAtom::Entity {
            id,
            binds: Binds::new(),
        })
    }

    pub fn union_of(parts: impl IntoIterator<Item = ResolvedType>) -> Self {
        let mut options = Vec::new();
        for p in parts {
            options.extend(p.options);
        }
        Self::new(options)
    }

    pub fn options(&self) -> &[TypeAtom] {
        &self.options
    }

    /// True for exactly one option. Only unique types have a single
    /// concrete runtime representation, which construction and field
    /// storage require.
    pub fn is_unique(&self) -> bool {
        self.options.len() == 1
    }

    pub fn as_unique(&self) -> Option<&TypeAtom> {
        match self.options.as_slice() {
            [one] => Some(one),
            _ => None,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.options
            .iter()
            .any(|o| matches!(o, TypeAtom::EphemeralList { .. }))
    }

    /// Remove the given options, if any remain. Returns `None` when every
    /// option was removed.
    pub fn without(&self, drop: &[TypeAtom]) -> Option<ResolvedType> {
        let kept: Vec<TypeAtom> = self
            .options
            .iter()
            .filter(|o| !drop.contains(o))
            .cloned()
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(ResolvedType::new(kept))
        }
    }

    pub fn contains_atom(&self, atom: &TypeAtom) -> bool {
        self.options.contains(atom)
    }
}

/// The declared (layout) type of a binding site paired with the narrowed
/// flow type at the current program point. `flow` is always a subtype of
/// `layout`; conversions between the two are explicit in the emitted code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueType {
    pub layout: ResolvedType,
    pub flow: ResolvedType,
}

impl ValueType {
    pub fn of(ty: ResolvedType) -> Self {
        Self {
            layout: ty.clone(),
            flow: ty,
        }
    }

    pub fn new(layout: ResolvedType, flow: ResolvedType) -> Self {
        Self { layout, flow }
    }

    /// Narrow the flow type, keeping the layout.
    pub fn narrowed(&self, flow: ResolvedType) -> Self {
        Self {
            layout: self.layout.clone(),
            flow,
        }
    }

    /// Reset the flow type back to the declared layout.
    pub fn widened(&self) -> Self {
        Self::of(self.layout.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ent(n: u32) -> TypeAtom {
        TypeAtom::Entity {
            id: EntityId(n),
            binds: Binds::new(),
        }
    }

    #[test]
    fn options_are_deduplicated_and_order_insensitive() {
        let a = ResolvedType::new(vec![ent(1), ent(2), ent(1)]);
        let b = ResolvedType::new(vec![ent(2), ent(1)]);
        assert_eq!(a, b);
        assert_eq!(a.options().len(), 2);
    }

    #[test]
    fn unique_detection() {
        assert!(ResolvedType::new(vec![ent(1)]).is_unique());
        assert!(!ResolvedType::new(vec![ent(1), ent(2)]).is_unique());
    }

    #[test]
    fn without_removes_options() {
        let t = ResolvedType::new(vec![ent(1), ent(2)]);
        let narrowed = t.without(&[ent(1)]).unwrap();
        assert_eq!(narrowed, ResolvedType::new(vec![ent(2)]));
        assert!(narrowed.without(&[ent(2)]).is_none());
    }
}
