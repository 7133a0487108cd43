#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashMap};

use miette::Diagnostic;
use tern_ast::{Expr, Span, TypeSig, TypeSigKind};
use thiserror::Error;

use crate::intern::{Interner, Symbol};
use crate::types::{
    Binds, ConceptId, ConstId, EntityId, FunctionParam, FunctionType, InvokeId, LiteralTag,
    RefKind, ResolvedType, RestParam, TypeAtom,
};

#[derive(Debug, Error, Diagnostic)]
#[error("resolution error: {message}")]
#[diagnostic(code(tern::resolve))]
pub struct ResolveError {
    pub message: String,
    #[label]
    pub span: Span,
}

/// A field declaration on an entity. A field with a default initializer is
/// optional at construction; the initializer expression may reference other
/// fields by name.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub span: Span,
    pub name: Symbol,
    pub ty: ResolvedType,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct EntityDef {
    pub span: Span,
    pub name: Symbol,
    pub terms: Vec<Symbol>,
    pub provides: Vec<ConceptId>,
    pub fields: Vec<FieldDef>,
    /// Invariant clauses, kept in declaration order; checked only after
    /// every field is finalized.
    pub invariants: Vec<Expr>,
    /// True when values of this entity have a fully determined, finite
    /// runtime representation and may serve as equality keys.
    pub grounded_key: bool,
}

#[derive(Clone, Debug)]
pub struct ConceptDef {
    pub span: Span,
    pub name: Symbol,
    pub terms: Vec<Symbol>,
    pub provides: Vec<ConceptId>,
}

/// A formal parameter of a declared invoke. Unlike `FunctionParam` this
/// carries the default initializer expression, which is declaration
/// metadata rather than part of the function type.
#[derive(Clone, Debug)]
pub struct ParamDef {
    pub span: Span,
    pub name: Symbol,
    pub ty: ResolvedType,
    pub ref_kind: RefKind,
    pub default: Option<Expr>,
    pub literal_tag: Option<LiteralTag>,
}

#[derive(Clone, Debug)]
pub struct InvokeDef {
    pub span: Span,
    pub name: Symbol,
    pub terms: Vec<Symbol>,
    pub params: Vec<ParamDef>,
    pub rest: Option<RestParam>,
    pub result: ResolvedType,
}

impl InvokeDef {
    pub fn fn_type(&self) -> FunctionType {
        FunctionType {
            params: self
                .params
                .iter()
                .map(|p| FunctionParam {
                    name: p.name,
                    ty: p.ty.clone(),
                    optional: p.default.is_some(),
                    ref_kind: p.ref_kind,
                    literal_tag: p.literal_tag.clone(),
                })
                .collect(),
            rest: self.rest.clone(),
            result: Box::new(self.result.clone()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstDef {
    pub span: Span,
    pub name: Symbol,
    pub ty: ResolvedType,
}

/// Entity ids for the primitive types every assembly carries.
#[derive(Clone, Copy, Debug)]
pub struct WellKnown {
    pub none: EntityId,
    pub nothing: EntityId,
    pub bool_: EntityId,
    pub int: EntityId,
    pub nat: EntityId,
    pub big_int: EntityId,
    pub float: EntityId,
    pub string: EntityId,
}

/// The resolved-type database: nominal definitions, invoke signatures,
/// global constants, and the subtype/normalization/upper-bound oracle the
/// checker queries. The checker never infers subtyping itself; it fails
/// closed when these queries report no valid resolution.
#[derive(Debug)]
pub struct Assembly {
    interner: Interner,
    entities: Vec<EntityDef>,
    entities_by_name: HashMap<Symbol, EntityId>,
    concepts: Vec<ConceptDef>,
    concepts_by_name: HashMap<Symbol, ConceptId>,
    invokes: Vec<InvokeDef>,
    invokes_by_name: HashMap<Symbol, InvokeId>,
    consts: Vec<ConstDef>,
    consts_by_name: HashMap<Symbol, ConstId>,
    /// Operator overload sets, resolved at call sites by literal tags and
    /// argument flow types.
    operators: HashMap<Symbol, Vec<InvokeId>>,
    well_known: WellKnown,
}

fn zero_span() -> Span {
    tern_ast::span(0, 0)
}

impl Assembly {
    pub fn new() -> Self {
        let mut asm = Self {
            interner: Interner::new(),
            entities: Vec::new(),
            entities_by_name: HashMap::new(),
            concepts: Vec::new(),
            concepts_by_name: HashMap::new(),
            invokes: Vec::new(),
            invokes_by_name: HashMap::new(),
            consts: Vec::new(),
            consts_by_name: HashMap::new(),
            operators: HashMap::new(),
            well_known: WellKnown {
                none: EntityId(0),
                nothing: EntityId(0),
                bool_: EntityId(0),
                int: EntityId(0),
                nat: EntityId(0),
                big_int: EntityId(0),
                float: EntityId(0),
                string: EntityId(0),
            },
        };

        let none = asm.declare_keyed_entity("None");
        let nothing = asm.declare_keyed_entity("Nothing");
        let bool_ = asm.declare_keyed_entity("Bool");
        let int = asm.declare_keyed_entity("Int");
        let nat = asm.declare_keyed_entity("Nat");
        let big_int = asm.declare_keyed_entity("BigInt");
        // Floats have no total equality; they are not grounded keys.
        let float = asm.declare_entity("Float", &[], Vec::new());
        let string = asm.declare_keyed_entity("String");

        asm.well_known = WellKnown {
            none,
            nothing,
            bool_,
            int,
            nat,
            big_int,
            float,
            string,
        };
        asm
    }

    // -- registration ------------------------------------------------------

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    pub fn name_of(&self, s: Symbol) -> &str {
        self.interner.resolve(s)
    }

    pub fn declare_entity(
        &mut self,
        name: &str,
        provides: &[ConceptId],
        fields: Vec<FieldDef>,
    ) -> EntityId {
        let name = self.interner.intern(name);
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(EntityDef {
            span: zero_span(),
            name,
            terms: Vec::new(),
            provides: provides.to_vec(),
            fields,
            invariants: Vec::new(),
            grounded_key: false,
        });
        self.entities_by_name.insert(name, id);
        id
    }

    fn declare_keyed_entity(&mut self, name: &str) -> EntityId {
        let id = self.declare_entity(name, &[], Vec::new());
        self.entities[id.0 as usize].grounded_key = true;
        id
    }

    pub fn declare_generic_entity(
        &mut self,
        name: &str,
        terms: &[&str],
        provides: &[ConceptId],
        fields: Vec<FieldDef>,
    ) -> EntityId {
        let id = self.declare_entity(name, provides, fields);
        let terms: Vec<Symbol> = terms.iter().map(|t| self.interner.intern(t)).collect();
        self.entities[id.0 as usize].terms = terms;
        id
    }

    pub fn set_invariants(&mut self, id: EntityId, invariants: Vec<Expr>) {
        self.entities[id.0 as usize].invariants = invariants;
    }

    pub fn set_grounded_key(&mut self, id: EntityId, grounded: bool) {
        self.entities[id.0 as usize].grounded_key = grounded;
    }

    pub fn declare_concept(&mut self, name: &str, provides: &[ConceptId]) -> ConceptId {
        let name = self.interner.intern(name);
        let id = ConceptId(self.concepts.len() as u32);
        self.concepts.push(ConceptDef {
            span: zero_span(),
            name,
            terms: Vec::new(),
            provides: provides.to_vec(),
        });
        self.concepts_by_name.insert(name, id);
        id
    }

    pub fn declare_invoke(&mut self, def: InvokeDef) -> InvokeId {
        let id = InvokeId(self.invokes.len() as u32);
        self.invokes_by_name.insert(def.name, id);
        self.invokes.push(def);
        id
    }

    /// Register one overload of a named operator. Overloads are kept in
    /// declaration order; resolution prefers literal-tag matches.
    pub fn declare_operator(&mut self, name: &str, invoke: InvokeId) {
        let name = self.interner.intern(name);
        self.operators.entry(name).or_default().push(invoke);
    }

    pub fn operator_overloads(&self, name: Symbol) -> Option<&[InvokeId]> {
        self.operators.get(&name).map(|v| v.as_slice())
    }

    pub fn declare_const(&mut self, name: &str, ty: ResolvedType) -> ConstId {
        let name = self.interner.intern(name);
        let id = ConstId(self.consts.len() as u32);
        self.consts.push(ConstDef {
            span: zero_span(),
            name,
            ty,
        });
        self.consts_by_name.insert(name, id);
        id
    }

    // -- lookups -----------------------------------------------------------

    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    pub fn entity(&self, id: EntityId) -> &EntityDef {
        &self.entities[id.0 as usize]
    }

    pub fn concept(&self, id: ConceptId) -> &ConceptDef {
        &self.concepts[id.0 as usize]
    }

    pub fn invoke(&self, id: InvokeId) -> &InvokeDef {
        &self.invokes[id.0 as usize]
    }

    pub fn entity_by_name(&self, name: Symbol) -> Option<EntityId> {
        self.entities_by_name.get(&name).copied()
    }

    pub fn concept_by_name(&self, name: Symbol) -> Option<ConceptId> {
        self.concepts_by_name.get(&name).copied()
    }

    pub fn invoke_by_name(&self, name: Symbol) -> Option<InvokeId> {
        self.invokes_by_name.get(&name).copied()
    }

    pub fn const_by_name(&self, name: Symbol) -> Option<(ConstId, &ConstDef)> {
        self.consts_by_name
            .get(&name)
            .map(|&id| (id, &self.consts[id.0 as usize]))
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        self.interner.lookup(name)
    }

    // -- primitive type shorthands ------------------------------------------

    pub fn none_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.none)
    }

    pub fn nothing_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.nothing)
    }

    pub fn bool_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.bool_)
    }

    pub fn int_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.int)
    }

    pub fn nat_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.nat)
    }

    pub fn big_int_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.big_int)
    }

    pub fn float_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.float)
    }

    pub fn string_type(&self) -> ResolvedType {
        ResolvedType::entity(self.well_known.string)
    }

    fn is_special_shape_entity(&self, id: EntityId) -> bool {
        id == self.well_known.none || id == self.well_known.nothing
    }

    pub fn is_none_atom(&self, atom: &TypeAtom) -> bool {
        matches!(atom, TypeAtom::Entity { id, .. } if *id == self.well_known.none)
    }

    pub fn is_nothing_atom(&self, atom: &TypeAtom) -> bool {
        matches!(atom, TypeAtom::Entity { id, .. } if *id == self.well_known.nothing)
    }

    /// True when no option of `t` is `None` or `Nothing`.
    pub fn special_shape_free(&self, t: &ResolvedType) -> bool {
        t.options().iter().all(|o| match o {
            TypeAtom::Entity { id, .. } => !self.is_special_shape_entity(*id),
            _ => true,
        })
    }

    // -- normalization -------------------------------------------------------

    /// Resolve a surface type signature against the in-scope generic-term
    /// bindings. Fails closed on unknown names, arity mismatches, and
    /// `auto` (the checker substitutes its inference hint before asking).
    pub fn normalize_type(
        &self,
        sig: &TypeSig,
        binds: &Binds,
    ) -> Result<ResolvedType, ResolveError> {
        match &sig.kind {
            TypeSigKind::Nominal { name, args } => {
                let sym = self.interner.lookup(&name.node).ok_or_else(|| ResolveError {
                    message: format!("unknown type name '{}'", name.node),
                    span: name.span,
                })?;

                if let Some(bound) = binds.get(&sym) {
                    if !args.is_empty() {
                        return Err(ResolveError {
                            message: format!(
                                "generic term '{}' does not take type arguments",
                                name.node
                            ),
                            span: sig.span,
                        });
                    }
                    return Ok(bound.clone());
                }

                let resolved_args: Vec<ResolvedType> = args
                    .iter()
                    .map(|a| self.normalize_type(a, binds))
                    .collect::<Result<_, _>>()?;

                if let Some(id) = self.entities_by_name.get(&sym) {
                    let def = self.entity(*id);
                    if def.terms.len() != resolved_args.len() {
                        return Err(ResolveError {
                            message: format!(
                                "entity '{}' expects {} type arguments, got {}",
                                name.node,
                                def.terms.len(),
                                resolved_args.len()
                            ),
                            span: sig.span,
                        });
                    }
                    let entity_binds: Binds =
                        def.terms.iter().copied().zip(resolved_args).collect();
                    return Ok(ResolvedType::single(TypeAtom::Entity {
                        id: *id,
                        binds: entity_binds,
                    }));
                }

                if let Some(id) = self.concepts_by_name.get(&sym) {
                    let def = self.concept(*id);
                    if def.terms.len() != resolved_args.len() {
                        return Err(ResolveError {
                            message: format!(
                                "concept '{}' expects {} type arguments, got {}",
                                name.node,
                                def.terms.len(),
                                resolved_args.len()
                            ),
                            span: sig.span,
                        });
                    }
                    let concept_binds: Binds =
                        def.terms.iter().copied().zip(resolved_args).collect();
                    return Ok(ResolvedType::single(TypeAtom::Concept {
                        entries: vec![(*id, concept_binds)],
                    }));
                }

                Err(ResolveError {
                    message: format!("unknown type name '{}'", name.node),
                    span: name.span,
                })
            }

            TypeSigKind::Tuple { members, complete } => {
                let members: Vec<ResolvedType> = members
                    .iter()
                    .map(|m| self.normalize_type(m, binds))
                    .collect::<Result<_, _>>()?;
                Ok(ResolvedType::single(TypeAtom::Tuple {
                    members,
                    complete: *complete,
                }))
            }

            TypeSigKind::Record { props } => {
                let mut seen = BTreeSet::new();
                let mut resolved = Vec::with_capacity(props.len());
                for (name, ty) in props {
                    let sym = self.interner.lookup(&name.node).ok_or_else(|| ResolveError {
                        message: format!("unknown property name '{}'", name.node),
                        span: name.span,
                    })?;
                    if !seen.insert(sym) {
                        return Err(ResolveError {
                            message: format!("duplicate record property '{}'", name.node),
                            span: name.span,
                        });
                    }
                    resolved.push((sym, self.normalize_type(ty, binds)?));
                }
                resolved.sort_by_key(|(s, _)| *s);
                Ok(ResolvedType::single(TypeAtom::Record { props: resolved }))
            }

            TypeSigKind::EphemeralList { members } => {
                let members: Vec<ResolvedType> = members
                    .iter()
                    .map(|m| self.normalize_type(m, binds))
                    .collect::<Result<_, _>>()?;
                Ok(ResolvedType::single(TypeAtom::EphemeralList { members }))
            }

            TypeSigKind::Fn {
                params,
                rest,
                result,
            } => {
                let params: Vec<FunctionParam> = params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        Ok(FunctionParam {
                            name: Symbol(i as u32),
                            ty: self.normalize_type(p, binds)?,
                            optional: false,
                            ref_kind: RefKind::ByValue,
                            literal_tag: None,
                        })
                    })
                    .collect::<Result<_, ResolveError>>()?;
                let rest = match rest {
                    None => None,
                    Some(r) => {
                        let elem = self.normalize_type(r, binds)?;
                        Some(RestParam {
                            name: Symbol(params.len() as u32),
                            ty: elem.clone(),
                            elem,
                        })
                    }
                };
                Ok(ResolvedType::single(TypeAtom::Fn(FunctionType {
                    params,
                    rest,
                    result: Box::new(self.normalize_type(result, binds)?),
                })))
            }

            TypeSigKind::Union { options } => {
                let parts: Vec<ResolvedType> = options
                    .iter()
                    .map(|o| self.normalize_type(o, binds))
                    .collect::<Result<_, _>>()?;
                Ok(ResolvedType::union_of(parts))
            }

            TypeSigKind::Auto => Err(ResolveError {
                message: "cannot resolve 'auto' without an inference context".to_string(),
                span: sig.span,
            }),
        }
    }

    // -- subtyping -----------------------------------------------------------

    fn entity_provides(&self, id: EntityId, target: ConceptId) -> bool {
        self.entity(id)
            .provides
            .iter()
            .any(|&c| c == target || self.concept_provides(c, target))
    }

    fn concept_provides(&self, id: ConceptId, target: ConceptId) -> bool {
        if id == target {
            return true;
        }
        self.concept(id)
            .provides
            .iter()
            .any(|&c| self.concept_provides(c, target))
    }

    fn binds_satisfy(required: &Binds, available: &Binds) -> bool {
        required
            .iter()
            .all(|(k, v)| available.get(k) == Some(v))
    }

    fn atom_subtype(&self, a: &TypeAtom, b: &TypeAtom) -> bool {
        match (a, b) {
            // Unbound terms compare nominally; substitution happens before
            // any call-site subtype query.
            (TypeAtom::TermVar(x), TypeAtom::TermVar(y)) => x == y,

            (
                TypeAtom::Entity { id: ai, binds: ab },
                TypeAtom::Entity { id: bi, binds: bb },
            ) => ai == bi && ab == bb,

            (TypeAtom::Entity { id, binds }, TypeAtom::Concept { entries }) => entries
                .iter()
                .all(|(c, cb)| self.entity_provides(*id, *c) && Self::binds_satisfy(cb, binds)),

            (TypeAtom::Concept { entries: ae }, TypeAtom::Concept { entries: be }) => {
                be.iter().all(|(bc, bb)| {
                    ae.iter().any(|(ac, ab)| {
                        self.concept_provides(*ac, *bc) && Self::binds_satisfy(bb, ab)
                    })
                })
            }

            (
                TypeAtom::Tuple {
                    members: am,
                    complete: ac,
                },
                TypeAtom::Tuple {
                    members: bm,
                    complete: bc,
                },
            ) => {
                if *bc {
                    *ac && am.len() == bm.len()
                        && am.iter().zip(bm).all(|(x, y)| self.subtype_of(x, y))
                } else {
                    // Target is possibly-longer: a known prefix suffices,
                    // but an open tuple shorter than the prefix does not.
                    am.len() >= bm.len()
                        && am.iter().zip(bm).all(|(x, y)| self.subtype_of(x, y))
                }
            }

            (TypeAtom::Record { props: ap }, TypeAtom::Record { props: bp }) => {
                bp.iter().all(|(name, bt)| {
                    ap.iter()
                        .find(|(n, _)| n == name)
                        .is_some_and(|(_, at)| self.subtype_of(at, bt))
                })
            }

            (
                TypeAtom::EphemeralList { members: am },
                TypeAtom::EphemeralList { members: bm },
            ) => {
                am.len() == bm.len()
                    && am.iter().zip(bm).all(|(x, y)| self.subtype_of(x, y))
            }

            (TypeAtom::Fn(af), TypeAtom::Fn(bf)) => {
                if af.params.len() != bf.params.len() {
                    return false;
                }
                let params_ok = af.params.iter().zip(&bf.params).all(|(ap, bp)| {
                    ap.optional == bp.optional
                        && ap.ref_kind == bp.ref_kind
                        && self.subtype_of(&bp.ty, &ap.ty)
                });
                let rest_ok = match (&af.rest, &bf.rest) {
                    (None, None) => true,
                    (Some(ar), Some(br)) => self.subtype_of(&br.elem, &ar.elem),
                    _ => false,
                };
                params_ok && rest_ok && self.subtype_of(&af.result, &bf.result)
            }

            _ => false,
        }
    }

    /// Union subtyping: every option of `a` fits under some option of `b`.
    pub fn subtype_of(&self, a: &ResolvedType, b: &ResolvedType) -> bool {
        a.options()
            .iter()
            .all(|ao| b.options().iter().any(|bo| self.atom_subtype(ao, bo)))
    }

    /// Least upper bound the checker uses at join points: the union of all
    /// options with subsumed options dropped.
    pub fn type_upper_bound(&self, types: &[ResolvedType]) -> ResolvedType {
        debug_assert!(!types.is_empty(), "upper bound of no types");
        let merged = ResolvedType::union_of(types.iter().cloned());
        let opts = merged.options();
        let kept: Vec<TypeAtom> = opts
            .iter()
            .filter(|x| {
                !opts
                    .iter()
                    .any(|y| y != *x && self.atom_subtype(x, y))
            })
            .cloned()
            .collect();
        ResolvedType::new(kept)
    }

    /// Bind generic terms for a call: explicit arguments first, the
    /// enclosing context second. Any term left unbound is a failure.
    pub fn resolve_binds_for_call(
        &self,
        terms: &[Symbol],
        explicit: &[ResolvedType],
        context: &Binds,
    ) -> Option<Binds> {
        if explicit.len() > terms.len() {
            return None;
        }
        let mut out = Binds::new();
        for (i, term) in terms.iter().enumerate() {
            if let Some(ty) = explicit.get(i) {
                out.insert(*term, ty.clone());
            } else if let Some(ty) = context.get(term) {
                out.insert(*term, ty.clone());
            } else {
                return None;
            }
        }
        Some(out)
    }

    // -- narrowing support ----------------------------------------------------

    /// Partition `t` by a type test against `target`: the options that flow
    /// into the true branch and the options left for the false branch. An
    /// option that overlaps the target without being separable stays in
    /// both parts.
    pub fn split_on(
        &self,
        t: &ResolvedType,
        target: &ResolvedType,
    ) -> (Option<ResolvedType>, Option<ResolvedType>) {
        let mut tpart: Vec<TypeAtom> = Vec::new();
        let mut fpart: Vec<TypeAtom> = Vec::new();

        for o in t.options() {
            let single = ResolvedType::single(o.clone());
            if self.subtype_of(&single, target) {
                tpart.push(o.clone());
            } else if self.subtype_of(target, &single) {
                // The test may pass for some values of this option; the
                // option is not separably removable from the false branch.
                tpart.extend(target.options().iter().cloned());
                fpart.push(o.clone());
            } else {
                fpart.push(o.clone());
            }
        }

        let tpart = if tpart.is_empty() {
            None
        } else {
            Some(ResolvedType::new(tpart))
        };
        let fpart = if fpart.is_empty() {
            None
        } else {
            Some(ResolvedType::new(fpart))
        };
        (tpart, fpart)
    }

    /// True when the type can serve as an equality/ordering key: every part
    /// of its runtime representation is finite and totally comparable.
    pub fn grounded_key(&self, t: &ResolvedType) -> bool {
        t.options().iter().all(|o| self.atom_grounded(o))
    }

    fn atom_grounded(&self, atom: &TypeAtom) -> bool {
        match atom {
            TypeAtom::Entity { id, binds } => {
                self.entity(*id).grounded_key
                    && binds.values().all(|b| self.grounded_key(b))
            }
            TypeAtom::Tuple { members, complete } => {
                *complete && members.iter().all(|m| self.grounded_key(m))
            }
            TypeAtom::Record { props } => props.iter().all(|(_, t)| self.grounded_key(t)),
            TypeAtom::TermVar(_)
            | TypeAtom::Concept { .. }
            | TypeAtom::EphemeralList { .. }
            | TypeAtom::Fn(_) => false,
        }
    }

    // -- generic substitution ---------------------------------------------------

    /// Binds that map each declared term to itself, used when normalizing a
    /// generic declaration's own signatures.
    pub fn term_var_binds(&self, terms: &[Symbol]) -> Binds {
        terms
            .iter()
            .map(|&t| (t, ResolvedType::single(TypeAtom::TermVar(t))))
            .collect()
    }

    /// Replace bound term variables throughout a type. Terms missing from
    /// `binds` are left in place.
    pub fn substitute(&self, t: &ResolvedType, binds: &Binds) -> ResolvedType {
        if binds.is_empty() {
            return t.clone();
        }
        let mut options: Vec<TypeAtom> = Vec::with_capacity(t.options().len());
        for o in t.options() {
            match o {
                TypeAtom::TermVar(sym) => match binds.get(sym) {
                    Some(bound) => options.extend(bound.options().iter().cloned()),
                    None => options.push(o.clone()),
                },
                TypeAtom::Entity { id, binds: eb } => options.push(TypeAtom::Entity {
                    id: *id,
                    binds: eb
                        .iter()
                        .map(|(k, v)| (*k, self.substitute(v, binds)))
                        .collect(),
                }),
                TypeAtom::Concept { entries } => options.push(TypeAtom::Concept {
                    entries: entries
                        .iter()
                        .map(|(c, cb)| {
                            (
                                *c,
                                cb.iter()
                                    .map(|(k, v)| (*k, self.substitute(v, binds)))
                                    .collect(),
                            )
                        })
                        .collect(),
                }),
                TypeAtom::Tuple { members, complete } => options.push(TypeAtom::Tuple {
                    members: members.iter().map(|m| self.substitute(m, binds)).collect(),
                    complete: *complete,
                }),
                TypeAtom::Record { props } => options.push(TypeAtom::Record {
                    props: props
                        .iter()
                        .map(|(n, p)| (*n, self.substitute(p, binds)))
                        .collect(),
                }),
                TypeAtom::EphemeralList { members } => options.push(TypeAtom::EphemeralList {
                    members: members.iter().map(|m| self.substitute(m, binds)).collect(),
                }),
                TypeAtom::Fn(f) => options.push(TypeAtom::Fn(self.substitute_fn(f, binds))),
            }
        }
        ResolvedType::new(options)
    }

    pub fn substitute_fn(&self, f: &FunctionType, binds: &Binds) -> FunctionType {
        FunctionType {
            params: f
                .params
                .iter()
                .map(|p| FunctionParam {
                    name: p.name,
                    ty: self.substitute(&p.ty, binds),
                    optional: p.optional,
                    ref_kind: p.ref_kind,
                    literal_tag: p.literal_tag.clone(),
                })
                .collect(),
            rest: f.rest.as_ref().map(|r| RestParam {
                name: r.name,
                ty: self.substitute(&r.ty, binds),
                elem: self.substitute(&r.elem, binds),
            }),
            result: Box::new(self.substitute(&f.result, binds)),
        }
    }

    // -- display ----------------------------------------------------------------

    pub fn type_display(&self, t: &ResolvedType) -> String {
        let parts: Vec<String> = t.options().iter().map(|o| self.atom_display(o)).collect();
        parts.join(" | ")
    }

    fn atom_display(&self, atom: &TypeAtom) -> String {
        match atom {
            TypeAtom::TermVar(sym) => self.name_of(*sym).to_string(),
            TypeAtom::Entity { id, binds } => {
                let name = self.name_of(self.entity(*id).name);
                if binds.is_empty() {
                    name.to_string()
                } else {
                    let args: Vec<String> =
                        binds.values().map(|b| self.type_display(b)).collect();
                    format!("{}<{}>", name, args.join(", "))
                }
            }
            TypeAtom::Concept { entries } => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(c, binds)| {
                        let name = self.name_of(self.concept(*c).name);
                        if binds.is_empty() {
                            name.to_string()
                        } else {
                            let args: Vec<String> =
                                binds.values().map(|b| self.type_display(b)).collect();
                            format!("{}<{}>", name, args.join(", "))
                        }
                    })
                    .collect();
                parts.join(" & ")
            }
            TypeAtom::Tuple { members, complete } => {
                let mut parts: Vec<String> =
                    members.iter().map(|m| self.type_display(m)).collect();
                if !complete {
                    parts.push("...".to_string());
                }
                format!("[{}]", parts.join(", "))
            }
            TypeAtom::Record { props } => {
                let parts: Vec<String> = props
                    .iter()
                    .map(|(n, t)| format!("{}: {}", self.name_of(*n), self.type_display(t)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            TypeAtom::EphemeralList { members } => {
                let parts: Vec<String> =
                    members.iter().map(|m| self.type_display(m)).collect();
                format!("(|{}|)", parts.join(", "))
            }
            TypeAtom::Fn(f) => {
                let mut parts: Vec<String> =
                    f.params.iter().map(|p| self.type_display(&p.ty)).collect();
                if let Some(r) = &f.rest {
                    parts.push(format!("...{}", self.type_display(&r.elem)));
                }
                format!("fn({}) -> {}", parts.join(", "), self.type_display(&f.result))
            }
        }
    }
}

impl Default for Assembly {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig_nominal(name: &str) -> TypeSig {
        TypeSig {
            span: zero_span(),
            kind: TypeSigKind::Nominal {
                name: tern_ast::Spanned::new(zero_span(), name.to_string()),
                args: Vec::new(),
            },
        }
    }

    #[test]
    fn primitives_resolve_by_name() {
        let asm = Assembly::new();
        let t = asm.normalize_type(&sig_nominal("Int"), &Binds::new()).unwrap();
        assert_eq!(t, asm.int_type());
    }

    #[test]
    fn entity_subtypes_provided_concept() {
        let mut asm = Assembly::new();
        let animal = asm.declare_concept("Animal", &[]);
        let kea = asm.declare_entity("Kea", &[animal], Vec::new());
        let kea_t = ResolvedType::entity(kea);
        let animal_t = ResolvedType::single(TypeAtom::Concept {
            entries: vec![(animal, Binds::new())],
        });
        assert!(asm.subtype_of(&kea_t, &animal_t));
        assert!(!asm.subtype_of(&animal_t, &kea_t));
    }

    #[test]
    fn concept_provides_is_transitive() {
        let mut asm = Assembly::new();
        let a = asm.declare_concept("A", &[]);
        let b = asm.declare_concept("B", &[a]);
        let e = asm.declare_entity("E", &[b], Vec::new());
        let e_t = ResolvedType::entity(e);
        let a_t = ResolvedType::single(TypeAtom::Concept {
            entries: vec![(a, Binds::new())],
        });
        assert!(asm.subtype_of(&e_t, &a_t));
    }

    #[test]
    fn union_subtyping_covers_each_option() {
        let mut asm = Assembly::new();
        let animal = asm.declare_concept("Animal", &[]);
        let kea = asm.declare_entity("Kea", &[animal], Vec::new());
        let tui = asm.declare_entity("Tui", &[animal], Vec::new());
        let union = ResolvedType::union_of([ResolvedType::entity(kea), ResolvedType::entity(tui)]);
        let animal_t = ResolvedType::single(TypeAtom::Concept {
            entries: vec![(animal, Binds::new())],
        });
        assert!(asm.subtype_of(&union, &animal_t));
        assert!(asm.subtype_of(&ResolvedType::entity(kea), &union));
    }

    #[test]
    fn tuple_prefix_subtyping_respects_open_flag() {
        let asm = Assembly::new();
        let int = asm.int_type();
        let closed2 = ResolvedType::single(TypeAtom::Tuple {
            members: vec![int.clone(), int.clone()],
            complete: true,
        });
        let open1 = ResolvedType::single(TypeAtom::Tuple {
            members: vec![int.clone()],
            complete: false,
        });
        assert!(asm.subtype_of(&closed2, &open1));
        assert!(!asm.subtype_of(&open1, &closed2));
    }

    #[test]
    fn upper_bound_drops_subsumed_options() {
        let mut asm = Assembly::new();
        let animal = asm.declare_concept("Animal", &[]);
        let kea = asm.declare_entity("Kea", &[animal], Vec::new());
        let animal_t = ResolvedType::single(TypeAtom::Concept {
            entries: vec![(animal, Binds::new())],
        });
        let ub = asm.type_upper_bound(&[ResolvedType::entity(kea), animal_t.clone()]);
        assert_eq!(ub, animal_t);
    }

    #[test]
    fn split_on_separable_union() {
        let mut asm = Assembly::new();
        let kea = asm.declare_entity("Kea", &[], Vec::new());
        let union =
            ResolvedType::union_of([ResolvedType::entity(kea), asm.none_type()]);
        let (t, f) = asm.split_on(&union, &ResolvedType::entity(kea));
        assert_eq!(t, Some(ResolvedType::entity(kea)));
        assert_eq!(f, Some(asm.none_type()));
    }

    #[test]
    fn split_on_inseparable_concept() {
        let mut asm = Assembly::new();
        let animal = asm.declare_concept("Animal", &[]);
        let kea = asm.declare_entity("Kea", &[animal], Vec::new());
        let animal_t = ResolvedType::single(TypeAtom::Concept {
            entries: vec![(animal, Binds::new())],
        });
        // Testing `animal is Kea`: true side narrows to Kea, false side
        // keeps the concept since other animals remain possible.
        let (t, f) = asm.split_on(&animal_t, &ResolvedType::entity(kea));
        assert_eq!(t, Some(ResolvedType::entity(kea)));
        assert_eq!(f, Some(animal_t));
    }

    #[test]
    fn grounded_key_primitives_and_tuples() {
        let asm = Assembly::new();
        assert!(asm.grounded_key(&asm.int_type()));
        assert!(!asm.grounded_key(&asm.float_type()));
        let pair = ResolvedType::single(TypeAtom::Tuple {
            members: vec![asm.int_type(), asm.string_type()],
            complete: true,
        });
        assert!(asm.grounded_key(&pair));
        let open = ResolvedType::single(TypeAtom::Tuple {
            members: vec![asm.int_type()],
            complete: false,
        });
        assert!(!asm.grounded_key(&open));
    }

    #[test]
    fn binds_resolution_prefers_explicit() {
        let mut asm = Assembly::new();
        let t = asm.intern("T");
        let mut ctx = Binds::new();
        ctx.insert(t, asm.string_type());
        let binds = asm
            .resolve_binds_for_call(&[t], &[asm.int_type()], &ctx)
            .unwrap();
        assert_eq!(binds.get(&t), Some(&asm.int_type()));
        let from_ctx = asm.resolve_binds_for_call(&[t], &[], &ctx).unwrap();
        assert_eq!(from_ctx.get(&t), Some(&asm.string_type()));
        assert!(asm.resolve_binds_for_call(&[t], &[], &Binds::new()).is_none());
    }
}
