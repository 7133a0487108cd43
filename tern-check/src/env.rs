#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use tern_ast::Span;
use tern_mir::RegisterId;
use tern_types::{Assembly, Binds, ResolvedType, Symbol, ValueType};

use crate::error::CheckError;

/// Compile-time knowledge about a boolean value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn of_bool(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }

    pub fn negate(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VarInfo {
    /// Declared (layout) type; never changes after declaration.
    pub decl: ResolvedType,
    /// Current narrowed flow type, always a subtype of `decl`.
    pub flow: ResolvedType,
    /// Home register of the binding.
    pub reg: RegisterId,
    pub is_const: bool,
    /// False until a definite assignment on every path reaching here.
    pub must_defined: bool,
}

/// What the last checked expression produced: its value type, any
/// compile-time truth knowledge, and the variable it was loaded from (the
/// narrowing anchor for type tests).
#[derive(Clone, Debug)]
pub struct ExprResult {
    pub vtype: ValueType,
    pub truth: Truth,
    pub from_var: Option<Symbol>,
    pub reg: RegisterId,
}

#[derive(Clone, Debug, Default)]
struct Scope {
    vars: BTreeMap<Symbol, VarInfo>,
    /// Declaration order, for lifetime-end events.
    order: Vec<Symbol>,
}

/// One flow of the multi-flow environment. Conditions fork it, joins merge
/// it back; forks are plain clones, so each flow is an independent fact.
#[derive(Clone, Debug)]
pub struct TypeEnvironment {
    scopes: Vec<Scope>,
    pub term_binds: Binds,
    /// False once control definitely left this flow (return/yield/abort).
    pub normal_flow: bool,
    pub result: Option<ExprResult>,
}

impl TypeEnvironment {
    pub fn new(term_binds: Binds) -> Self {
        Self {
            scopes: vec![Scope::default()],
            term_binds,
            normal_flow: true,
            result: None,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope, returning its bindings in declaration order.
    pub fn pop_scope(&mut self) -> Vec<Symbol> {
        let scope = self.scopes.pop().expect("scope stack underflow");
        scope.order
    }

    /// Declare in the innermost scope. False when the name is already
    /// declared there.
    pub fn declare(&mut self, name: Symbol, info: VarInfo) -> bool {
        let scope = self.scopes.last_mut().expect("no open scope");
        if scope.vars.contains_key(&name) {
            return false;
        }
        scope.vars.insert(name, info);
        scope.order.push(name);
        true
    }

    pub fn lookup(&self, name: Symbol) -> Option<&VarInfo> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(&name))
    }

    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut VarInfo> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|s| s.vars.get_mut(&name))
    }

    pub fn set_flow(&mut self, name: Symbol, flow: ResolvedType) {
        if let Some(info) = self.lookup_mut(name) {
            info.flow = flow;
        }
    }

    /// Reset a binding's flow type to its declared type (after a `ref`
    /// argument the callee may have reassigned it).
    pub fn widen(&mut self, name: Symbol) {
        if let Some(info) = self.lookup_mut(name) {
            info.flow = info.decl.clone();
            info.must_defined = true;
        }
    }

    pub fn set_result(
        &mut self,
        vtype: ValueType,
        truth: Truth,
        from_var: Option<Symbol>,
        reg: RegisterId,
    ) {
        self.result = Some(ExprResult {
            vtype,
            truth,
            from_var,
            reg,
        });
    }

    pub fn clear_result(&mut self) {
        self.result = None;
    }

    pub fn expr_result(&self) -> &ExprResult {
        self.result
            .as_ref()
            .expect("expression produced no result")
    }

    pub fn kill(&mut self) {
        self.normal_flow = false;
        self.result = None;
    }

    /// Merge flows at a control join. Bindings take the upper bound of
    /// their flow types across the still-normal inputs; definedness holds
    /// only when every input agrees. Flows that already left (returned,
    /// yielded, aborted) contribute nothing. Joining zero flows is an
    /// error: some flow must reach every join the checker builds.
    pub fn join(
        asm: &Assembly,
        span: Span,
        envs: Vec<TypeEnvironment>,
    ) -> Result<TypeEnvironment, CheckError> {
        if envs.is_empty() {
            return Err(CheckError::new(span, "join of no reachable flows"));
        }

        let normal: Vec<&TypeEnvironment> = envs.iter().filter(|e| e.normal_flow).collect();
        if normal.is_empty() {
            let mut out = envs.into_iter().next().expect("at least one flow");
            out.kill();
            return Ok(out);
        }

        let mut out = (*normal[0]).clone();
        for depth in 0..out.scopes.len() {
            let names: Vec<Symbol> = out.scopes[depth].order.clone();
            for name in names {
                let mut flows: Vec<ResolvedType> = Vec::with_capacity(normal.len());
                let mut defined = true;
                for e in &normal {
                    match e.scopes.get(depth).and_then(|s| s.vars.get(&name)) {
                        Some(info) => {
                            flows.push(info.flow.clone());
                            defined &= info.must_defined;
                        }
                        None => {}
                    }
                }
                let joined = asm.type_upper_bound(&flows);
                let info = out.scopes[depth]
                    .vars
                    .get_mut(&name)
                    .expect("binding present in base flow");
                info.flow = joined;
                info.must_defined = defined;
            }
        }

        out.result = Self::join_results(asm, &normal);
        Ok(out)
    }

    fn join_results(asm: &Assembly, normal: &[&TypeEnvironment]) -> Option<ExprResult> {
        let first = normal[0].result.as_ref()?;
        if normal.iter().any(|e| e.result.is_none()) {
            return None;
        }
        let mut layouts = Vec::with_capacity(normal.len());
        let mut flows = Vec::with_capacity(normal.len());
        let mut truth = first.truth;
        let mut from_var = first.from_var;
        for e in normal {
            let r = e.result.as_ref().expect("checked above");
            layouts.push(r.vtype.layout.clone());
            flows.push(r.vtype.flow.clone());
            if r.truth != truth {
                truth = Truth::Unknown;
            }
            if r.from_var != from_var {
                from_var = None;
            }
        }
        Some(ExprResult {
            vtype: ValueType::new(asm.type_upper_bound(&layouts), asm.type_upper_bound(&flows)),
            truth,
            from_var,
            reg: first.reg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(asm: &Assembly, ty: ResolvedType, reg: u32) -> VarInfo {
        let _ = asm;
        VarInfo {
            decl: ty.clone(),
            flow: ty,
            reg: RegisterId(reg),
            is_const: false,
            must_defined: true,
        }
    }

    #[test]
    fn join_takes_flow_upper_bound() {
        let mut asm = Assembly::new();
        let x = asm.intern("x");
        let both = ResolvedType::union_of([asm.int_type(), asm.none_type()]);

        let mut base = TypeEnvironment::new(Binds::new());
        base.declare(
            x,
            VarInfo {
                decl: both.clone(),
                flow: both.clone(),
                reg: RegisterId(0),
                is_const: false,
                must_defined: true,
            },
        );

        let mut t = base.clone();
        t.set_flow(x, asm.int_type());
        let mut f = base.clone();
        f.set_flow(x, asm.none_type());

        let joined = TypeEnvironment::join(&asm, tern_ast::span(0, 0), vec![t, f]).unwrap();
        assert_eq!(joined.lookup(x).unwrap().flow, both);
    }

    #[test]
    fn join_skips_dead_flows() {
        let mut asm = Assembly::new();
        let x = asm.intern("x");
        let both = ResolvedType::union_of([asm.int_type(), asm.none_type()]);

        let mut live = TypeEnvironment::new(Binds::new());
        live.declare(x, var(&asm, both.clone(), 0));
        live.set_flow(x, asm.int_type());

        let mut dead = live.clone();
        dead.set_flow(x, asm.none_type());
        dead.kill();

        let joined =
            TypeEnvironment::join(&asm, tern_ast::span(0, 0), vec![live, dead]).unwrap();
        assert!(joined.normal_flow);
        assert_eq!(joined.lookup(x).unwrap().flow, asm.int_type());
    }

    #[test]
    fn join_of_nothing_is_an_error() {
        let asm = Assembly::new();
        assert!(TypeEnvironment::join(&asm, tern_ast::span(0, 0), Vec::new()).is_err());
    }

    #[test]
    fn definedness_requires_all_inputs() {
        let mut asm = Assembly::new();
        let x = asm.intern("x");
        let mut a = TypeEnvironment::new(Binds::new());
        a.declare(x, var(&asm, asm.int_type(), 0));
        let mut b = a.clone();
        b.lookup_mut(x).unwrap().must_defined = false;

        let joined = TypeEnvironment::join(&asm, tern_ast::span(0, 0), vec![a, b]).unwrap();
        assert!(!joined.lookup(x).unwrap().must_defined);
    }
}
