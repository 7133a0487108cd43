#![forbid(unsafe_code)]

use tern_ast::Span;
use tern_types::Assembly;

use crate::ir::{Const, InstKind, MirBody, Terminator};

#[derive(Clone, Debug)]
pub struct DebugSource {
    pub file_name: String,
    line_starts: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCol {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub col: u32,
}

impl DebugSource {
    pub fn new(file_name: String, text: &str) -> Self {
        let mut line_starts: Vec<usize> = Vec::new();
        line_starts.push(0);
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            file_name,
            line_starts,
        }
    }

    pub fn line_col(&self, span: Span) -> LineCol {
        let off: usize = span.offset();

        // Find the last line start <= off.
        let line_idx = match self.line_starts.binary_search(&off) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };

        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        let col0 = off.saturating_sub(line_start);

        LineCol {
            line: (line_idx as u32) + 1,
            col: (col0 as u32) + 1,
        }
    }
}

/// Plain-text rendering for golden assertions and debugging.
pub fn render_body(body: &MirBody, asm: &Assembly) -> String {
    let mut out = String::new();
    out.push_str(&format!("fn {} {{\n", asm.name_of(body.name)));
    for p in &body.params {
        out.push_str(&format!(
            "  param {}: {}\n",
            asm.name_of(p.name),
            asm.type_display(body.type_of(p.ty))
        ));
    }
    for bb in &body.blocks {
        out.push_str(&format!("bb{}:\n", bb.id.0));
        for inst in &bb.insts {
            let dest = match inst.dest {
                Some(d) => format!("r{} = ", d.0),
                None => String::new(),
            };
            out.push_str(&format!("  {}{}\n", dest, render_inst(&inst.kind, asm, body)));
        }
        match &bb.term {
            Some(t) => out.push_str(&format!("  {}\n", render_term(t))),
            None => out.push_str("  <unterminated>\n"),
        }
    }
    out.push_str("}\n");
    out
}

fn render_const(c: &Const) -> String {
    match c {
        Const::None => "none".to_string(),
        Const::Nothing => "nothing".to_string(),
        Const::Bool(b) => b.to_string(),
        Const::Int(n) => format!("{n}i"),
        Const::Nat(n) => format!("{n}n"),
        Const::BigInt(s) => format!("{s}I"),
        Const::Float(f) => format!("{f}f"),
        Const::Str(s) => format!("{s:?}"),
    }
}

fn render_inst(kind: &InstKind, asm: &Assembly, body: &MirBody) -> String {
    let regs = |rs: &[crate::ir::RegisterId]| -> String {
        rs.iter()
            .map(|r| format!("r{}", r.0))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match kind {
        InstKind::LoadConst { value } => format!("const {}", render_const(value)),
        InstKind::LoadGlobal { konst } => format!("global #{}", konst.0),
        InstKind::Move { src } => format!("move r{}", src.0),
        InstKind::Convert { src, from, to } => format!(
            "convert r{} : {} -> {}",
            src.0,
            asm.type_display(body.type_of(*from)),
            asm.type_display(body.type_of(*to))
        ),
        InstKind::ConstructEntity { entity, args, .. } => format!(
            "new {}({})",
            asm.name_of(asm.entity(*entity).name),
            regs(args)
        ),
        InstKind::ConstructTuple { args, .. } => format!("tuple({})", regs(args)),
        InstKind::ConstructRecord { props, .. } => {
            let parts: Vec<String> = props
                .iter()
                .map(|(n, r)| format!("{}: r{}", asm.name_of(*n), r.0))
                .collect();
            format!("record({})", parts.join(", "))
        }
        InstKind::ConstructEphemeral { args, .. } => format!("ephemeral({})", regs(args)),
        InstKind::ConstructCollection { args, .. } => format!("collection({})", regs(args)),
        InstKind::LoadField { src, field } => {
            format!("r{}.{}", src.0, asm.name_of(*field))
        }
        InstKind::LoadIndex { src, index } => format!("r{}.{}", src.0, index),
        InstKind::HasField { src, field } => {
            format!("has r{}.{}", src.0, asm.name_of(*field))
        }
        InstKind::HasIndex { src, index } => format!("has r{}.{}", src.0, index),
        InstKind::StoreField { dst, field, src } => {
            format!("r{}.{} <- r{}", dst.0, asm.name_of(*field), src.0)
        }
        InstKind::TypeTest { src, ty } => format!(
            "r{} is {}",
            src.0,
            asm.type_display(body.type_of(*ty))
        ),
        InstKind::NoneTest { src } => format!("r{} is none", src.0),
        InstKind::NothingTest { src } => format!("r{} is nothing", src.0),
        InstKind::EqValue { negated, lhs, rhs } => {
            let op = if *negated { "!==" } else { "===" };
            format!("r{} {} r{}", lhs.0, op, rhs.0)
        }
        InstKind::Prefix { op, src } => format!("{op:?} r{}", src.0),
        InstKind::Bin { op, lhs, rhs } => format!("r{} {op:?} r{}", lhs.0, rhs.0),
        InstKind::Invoke { invoke, args, mask } => {
            let name = asm.name_of(asm.invoke(*invoke).name);
            match mask {
                Some(m) => format!("call {}({}) mask r{}", name, regs(args), m.0),
                None => format!("call {}({})", name, regs(args)),
            }
        }
        InstKind::InvokeValue { callee, args } => {
            format!("call r{}({})", callee.0, regs(args))
        }
        InstKind::LoadLambda { body: b, captures } => {
            format!("lambda {}[{}]", asm.name_of(*b), regs(captures))
        }
        InstKind::LoadMask { bits, slots } => format!("mask {bits:#b}/{slots}"),
        InstKind::MaskTest { mask, slot } => format!("r{}[{}]", mask.0, slot.0),
        InstKind::VarLifetimeEnd { name } => format!("end {}", asm.name_of(*name)),
    }
}

fn render_term(term: &Terminator) -> String {
    match term {
        Terminator::Jump(b) => format!("jump bb{}", b.0),
        Terminator::Branch {
            cond,
            then_bb,
            else_bb,
        } => format!("branch r{} ? bb{} : bb{}", cond.0, then_bb.0, else_bb.0),
        Terminator::Return(None) => "return".to_string(),
        Terminator::Return(Some(r)) => format!("return r{}", r.0),
        Terminator::Abort { msg } => format!("abort {msg:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_mapping() {
        let src = DebugSource::new("t.tern".to_string(), "ab\ncd\nef");
        assert_eq!(src.line_col(tern_ast::span(0, 1)), LineCol { line: 1, col: 1 });
        assert_eq!(src.line_col(tern_ast::span(3, 1)), LineCol { line: 2, col: 1 });
        assert_eq!(src.line_col(tern_ast::span(7, 1)), LineCol { line: 3, col: 2 });
    }
}
