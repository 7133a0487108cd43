#![forbid(unsafe_code)]

use std::collections::HashMap;

use tern_ast::Span;
use tern_types::{ResolvedType, Symbol};

use crate::ir::{
    BasicBlock, BlockId, Inst, InstKind, MirBody, MirParam, RegisterId, Terminator, TypeKey,
};

/// Append-only instruction sink for one declaration. The checker owns one
/// emitter per top-level declaration and drives it in lock-step with its
/// traversal; no type re-validation happens here.
#[derive(Debug)]
pub struct MirEmitter {
    name: Symbol,
    span: Span,
    params: Vec<MirParam>,
    next_register: u32,
    blocks: Vec<BasicBlock>,
    current: Option<usize>,
    next_block: u32,
    types: Vec<ResolvedType>,
    type_keys: HashMap<ResolvedType, TypeKey>,
    /// Cleared on the first terminal error; all later emission is dropped.
    enabled: bool,
}

impl MirEmitter {
    pub fn new(name: Symbol, span: Span) -> Self {
        Self {
            name,
            span,
            params: Vec::new(),
            next_register: 0,
            blocks: Vec::new(),
            current: None,
            next_block: 0,
            types: Vec::new(),
            type_keys: HashMap::new(),
            enabled: true,
        }
    }

    /// Canonical type identifier; registering the same resolved type twice
    /// returns the same key.
    pub fn register_type(&mut self, ty: &ResolvedType) -> TypeKey {
        if let Some(&key) = self.type_keys.get(ty) {
            return key;
        }
        let key = TypeKey(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_keys.insert(ty.clone(), key);
        key
    }

    pub fn type_of(&self, key: TypeKey) -> &ResolvedType {
        &self.types[key.0 as usize]
    }

    pub fn fresh_register(&mut self) -> RegisterId {
        let id = RegisterId(self.next_register);
        self.next_register += 1;
        id
    }

    pub fn declare_param(&mut self, name: Symbol, ty: TypeKey) -> RegisterId {
        let reg = self.fresh_register();
        self.params.push(MirParam { name, ty, reg });
        reg
    }

    pub fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    /// Open a new block and move the cursor to it.
    pub fn start_block(&mut self, id: BlockId, span: Span) {
        if !self.enabled {
            return;
        }
        self.blocks.push(BasicBlock {
            id,
            span,
            insts: Vec::new(),
            term: None,
        });
        self.current = Some(self.blocks.len() - 1);
    }

    pub fn current_block_id(&self) -> Option<BlockId> {
        self.current.map(|idx| self.blocks[idx].id)
    }

    pub fn emit(&mut self, span: Span, dest: Option<RegisterId>, kind: InstKind) {
        if !self.enabled {
            return;
        }
        let idx = self.current.expect("emit requires an open block");
        self.blocks[idx].insts.push(Inst { span, dest, kind });
    }

    pub fn set_terminator(&mut self, term: Terminator) {
        if !self.enabled {
            return;
        }
        let idx = self.current.expect("terminator requires an open block");
        self.blocks[idx].term = Some(term);
    }

    pub fn has_terminator(&self) -> bool {
        match self.current {
            Some(idx) => self.blocks[idx].term.is_some(),
            None => false,
        }
    }

    /// Terminal type error: stop producing code for this declaration. A
    /// declaration with any terminal error produces no emitted code.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn finish(mut self, result: TypeKey, entry: BlockId) -> MirBody {
        // Fall-through blocks left open by a still-normal tail become
        // empty returns; the statement checker seals real returns itself.
        for bb in &mut self.blocks {
            if bb.term.is_none() {
                bb.term = Some(Terminator::Return(None));
            }
        }
        MirBody {
            name: self.name,
            span: self.span,
            params: self.params,
            result,
            registers: self.next_register,
            blocks: self.blocks,
            entry,
            types: self.types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_types::Assembly;

    #[test]
    fn type_keys_are_canonical() {
        let asm = Assembly::new();
        let mut em = MirEmitter::new(Symbol(0), tern_ast::span(0, 0));
        let a = em.register_type(&asm.int_type());
        let b = em.register_type(&asm.int_type());
        let c = em.register_type(&asm.bool_type());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(em.type_of(a), &asm.int_type());
    }

    #[test]
    fn disabled_emitter_drops_everything() {
        let asm = Assembly::new();
        let mut em = MirEmitter::new(Symbol(0), tern_ast::span(0, 0));
        let key = em.register_type(&asm.int_type());
        let entry = em.fresh_block();
        em.start_block(entry, tern_ast::span(0, 0));
        em.disable();
        let r = em.fresh_register();
        em.emit(
            tern_ast::span(0, 0),
            Some(r),
            InstKind::LoadConst {
                value: crate::ir::Const::Int(1),
            },
        );
        let body = em.finish(key, entry);
        assert_eq!(body.blocks[0].insts.len(), 0);
    }
}
