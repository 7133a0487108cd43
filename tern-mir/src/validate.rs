#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::ir::{BlockId, InstKind, MirBody, RegisterId, Terminator, TypeKey};

#[derive(Clone, Debug)]
pub struct ValidateError {
    pub message: String,
}

impl std::fmt::Display for ValidateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidateError {}

/// Structural sanity check used by tests as a per-declaration invariant
/// gate: block ids unique, entry present, branch targets resolvable,
/// register/type keys in range, every block sealed.
pub fn validate_body(body: &MirBody) -> Result<(), ValidateError> {
    if body.blocks.is_empty() {
        return Err(ValidateError {
            message: "body has no blocks".to_string(),
        });
    }

    let mut blocks_by_id: BTreeMap<BlockId, usize> = BTreeMap::new();
    for (i, bb) in body.blocks.iter().enumerate() {
        if blocks_by_id.insert(bb.id, i).is_some() {
            return Err(ValidateError {
                message: format!("duplicate block id {:?}", bb.id),
            });
        }
    }

    if !blocks_by_id.contains_key(&body.entry) {
        return Err(ValidateError {
            message: format!("entry block {:?} missing", body.entry),
        });
    }

    let check_reg = |r: RegisterId| -> Result<(), ValidateError> {
        if r.0 < body.registers {
            Ok(())
        } else {
            Err(ValidateError {
                message: format!("register {:?} out of range", r),
            })
        }
    };
    let check_key = |k: TypeKey| -> Result<(), ValidateError> {
        if (k.0 as usize) < body.types.len() {
            Ok(())
        } else {
            Err(ValidateError {
                message: format!("type key {:?} out of range", k),
            })
        }
    };
    let check_block = |b: BlockId| -> Result<(), ValidateError> {
        if blocks_by_id.contains_key(&b) {
            Ok(())
        } else {
            Err(ValidateError {
                message: format!("branch to missing block {:?}", b),
            })
        }
    };

    check_key(body.result)?;
    for p in &body.params {
        check_key(p.ty)?;
        check_reg(p.reg)?;
    }

    for bb in &body.blocks {
        for inst in &bb.insts {
            if let Some(d) = inst.dest {
                check_reg(d)?;
            }
            for r in inst_sources(&inst.kind) {
                check_reg(r)?;
            }
            for k in inst_type_keys(&inst.kind) {
                check_key(k)?;
            }
        }

        match &bb.term {
            None => {
                return Err(ValidateError {
                    message: format!("block {:?} has no terminator", bb.id),
                });
            }
            Some(Terminator::Jump(b)) => check_block(*b)?,
            Some(Terminator::Branch {
                cond,
                then_bb,
                else_bb,
            }) => {
                check_reg(*cond)?;
                check_block(*then_bb)?;
                check_block(*else_bb)?;
            }
            Some(Terminator::Return(r)) => {
                if let Some(r) = r {
                    check_reg(*r)?;
                }
            }
            Some(Terminator::Abort { .. }) => {}
        }
    }

    Ok(())
}

fn inst_sources(kind: &InstKind) -> Vec<RegisterId> {
    match kind {
        InstKind::LoadConst { .. }
        | InstKind::LoadGlobal { .. }
        | InstKind::LoadMask { .. }
        | InstKind::VarLifetimeEnd { .. } => Vec::new(),
        InstKind::Move { src }
        | InstKind::Convert { src, .. }
        | InstKind::LoadField { src, .. }
        | InstKind::LoadIndex { src, .. }
        | InstKind::HasField { src, .. }
        | InstKind::HasIndex { src, .. }
        | InstKind::TypeTest { src, .. }
        | InstKind::NoneTest { src }
        | InstKind::NothingTest { src }
        | InstKind::Prefix { src, .. } => vec![*src],
        InstKind::StoreField { dst, src, .. } => vec![*dst, *src],
        InstKind::EqValue { lhs, rhs, .. } | InstKind::Bin { lhs, rhs, .. } => vec![*lhs, *rhs],
        InstKind::ConstructEntity { args, .. }
        | InstKind::ConstructTuple { args, .. }
        | InstKind::ConstructEphemeral { args, .. }
        | InstKind::ConstructCollection { args, .. } => args.clone(),
        InstKind::ConstructRecord { props, .. } => props.iter().map(|(_, r)| *r).collect(),
        InstKind::LoadLambda { captures, .. } => captures.clone(),
        InstKind::Invoke { args, mask, .. } => {
            let mut v = args.clone();
            if let Some(m) = mask {
                v.push(*m);
            }
            v
        }
        InstKind::InvokeValue { callee, args } => {
            let mut v = vec![*callee];
            v.extend(args.iter().copied());
            v
        }
        InstKind::MaskTest { mask, .. } => vec![*mask],
    }
}

fn inst_type_keys(kind: &InstKind) -> Vec<TypeKey> {
    match kind {
        InstKind::Convert { from, to, .. } => vec![*from, *to],
        InstKind::ConstructEntity { ty, .. }
        | InstKind::ConstructTuple { ty, .. }
        | InstKind::ConstructRecord { ty, .. }
        | InstKind::ConstructEphemeral { ty, .. }
        | InstKind::ConstructCollection { ty, .. }
        | InstKind::TypeTest { ty, .. } => vec![*ty],
        _ => Vec::new(),
    }
}
