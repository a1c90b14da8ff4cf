//! Copy/register propagation.
//!
//! The instruction set this core works over is register-based, not an
//! expression tree, so "substitute `expr` at the use site" is implemented
//! here as copy propagation proper: a trivial `v := w` whose single use can
//! see `w` unchanged is eliminated by rewriting that use to read `w`
//! directly. Fusing a *compound* expression (`v := a + b`) into its single
//! consumer would require rewriting the consumer's operand into a nested
//! expression, which this flat IR can't represent — that inlining happens
//! at render time in the Writer, which already builds an expression tree
//! and can inline a single-use pure definition when it lowers a block's
//! instructions to statements.

use std::collections::HashSet;

use crate::defuse::{DefUseMap, UseDefMap, UseSite};
use crate::graph::Graph;
use crate::ir::{Instruction, Register};

/// For each `Move { dst, src }` whose destination is used exactly once,
/// with no redefinition of `src` between the move and that use and no
/// intervening side-effecting instruction, rewrite the use to read `src`
/// and eliminate the move (turned into `Nop`; the dead-code pass will have
/// already removed anything truly unreachable, but register propagation
/// can run before or after DCE and should not assume it ran first).
pub fn register_propagation(graph: &mut Graph, use_defs: &UseDefMap, def_uses: &DefUseMap) {
    let move_defs: Vec<(crate::defuse::DefSite, Register, Register)> = graph
        .block_ids()
        .into_iter()
        .filter_map(|id| {
            let block = graph.get(id).ok()?;
            Some(block.instructions.iter().enumerate().filter_map(move |(idx, inst)| {
                if let Instruction::Move { dst, src } = inst {
                    Some((crate::defuse::DefSite { register: *dst, block: id, index: idx }, *dst, *src))
                } else {
                    None
                }
            }).collect::<Vec<_>>())
        })
        .flatten()
        .collect();

    for (def, _dst, src) in move_defs {
        let uses = match def_uses.0.get(&def) {
            Some(u) if u.len() == 1 => u,
            _ => continue,
        };
        let use_site = uses[0];
        if !is_safe_to_propagate(graph, use_defs, def, src, use_site) {
            continue;
        }
        if rewrite_use(graph, use_site, src) {
            if let Ok(block) = graph.get_mut(def.block) {
                if let Some(slot) = block.instructions.get_mut(def.index) {
                    *slot = Instruction::Nop;
                }
            }
        }
    }
}

fn is_safe_to_propagate(
    graph: &Graph,
    use_defs: &UseDefMap,
    def: crate::defuse::DefSite,
    src: Register,
    use_site: UseSite,
) -> bool {
    // The use must still see exactly the same definition(s) of `src` that
    // reached the move itself; otherwise `src` was redefined in between.
    let move_use_site = UseSite { register: src, block: def.block, index: def.index };
    let at_move = use_defs.0.get(&move_use_site);
    let at_use = UseSite { register: src, block: use_site.block, index: use_site.index };
    let at_use_defs = use_defs.0.get(&at_use);
    match (at_move, at_use_defs) {
        (Some(a), Some(b)) => {
            let a: HashSet<_> = a.iter().collect();
            let b: HashSet<_> = b.iter().collect();
            a == b
        }
        _ => false,
    }
}

fn rewrite_use(graph: &mut Graph, use_site: UseSite, new_reg: Register) -> bool {
    let Ok(block) = graph.get_mut(use_site.block) else { return false };
    let Some(inst) = block.instructions.get_mut(use_site.index) else { return false };
    replace_register_read(inst, use_site.register, new_reg)
}

/// Rewrite the first operand position matching `old` to `new`. Each
/// instruction kind is matched explicitly rather than through reflection,
/// consistent with how every other instruction-level query in this crate
/// is implemented.
fn replace_register_read(inst: &mut Instruction, old: Register, new: Register) -> bool {
    use crate::ir::Operand;
    let mut replaced = false;
    let mut maybe_replace = |r: &mut Register| {
        if *r == old {
            *r = new;
            replaced = true;
        }
    };
    match inst {
        Instruction::Move { src, .. } => maybe_replace(src),
        Instruction::Arithmetic { lhs, rhs, .. } => {
            maybe_replace(lhs);
            if let Operand::Register(r) = rhs {
                maybe_replace(r);
            }
        }
        Instruction::Compare { lhs, rhs, .. } => {
            maybe_replace(lhs);
            maybe_replace(rhs);
        }
        Instruction::ConditionalBranch { lhs, rhs, .. } => {
            maybe_replace(lhs);
            if let Operand::Register(r) = rhs {
                maybe_replace(r);
            }
        }
        Instruction::Switch { selector, .. } => maybe_replace(selector),
        Instruction::Invoke { receiver, args, .. } => {
            if let Some(r) = receiver {
                maybe_replace(r);
            }
            for a in args.iter_mut() {
                maybe_replace(a);
            }
        }
        Instruction::FieldGet { object, .. } => {
            if let Some(r) = object {
                maybe_replace(r);
            }
        }
        Instruction::FieldPut { src, object, .. } => {
            maybe_replace(src);
            if let Some(r) = object {
                maybe_replace(r);
            }
        }
        Instruction::ArrayGet { array, index, .. } => {
            maybe_replace(array);
            maybe_replace(index);
        }
        Instruction::ArrayPut { src, array, index, .. } => {
            maybe_replace(src);
            maybe_replace(array);
            maybe_replace(index);
        }
        Instruction::NewArray { length, .. } => maybe_replace(length),
        Instruction::CheckCast { reg, .. } => maybe_replace(reg),
        Instruction::MonitorEnter { obj } | Instruction::MonitorExit { obj } => maybe_replace(obj),
        Instruction::Return { value } => {
            if let Some(r) = value {
                maybe_replace(r);
            }
        }
        Instruction::Throw { value } => maybe_replace(value),
        Instruction::NewInstanceInit { args, .. } => {
            for a in args.iter_mut() {
                maybe_replace(a);
            }
        }
        Instruction::ConstLoad { .. }
        | Instruction::Goto { .. }
        | Instruction::NewInstance { .. }
        | Instruction::Nop => {}
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::defuse::build_def_use;
    use crate::ir::{BlockId, ConstValue, ExceptionRange, MethodSource, SourceBlock};

    struct Source {
        blocks: Vec<SourceBlock>,
    }

    impl MethodSource for Source {
        fn entry_block(&self) -> BlockId {
            BlockId(0)
        }
        fn basic_blocks(&self) -> &[SourceBlock] {
            &self.blocks
        }
        fn params_type(&self) -> &[String] {
            &[]
        }
        fn registers_size(&self) -> u16 {
            2
        }
        fn ins_size(&self) -> u16 {
            0
        }
        fn access_flags(&self) -> crate::ir::AccessFlags {
            crate::ir::AccessFlags(0)
        }
        fn exception_table(&self) -> &[ExceptionRange] {
            &[]
        }
    }

    /// `r1 := r0; return r1` with no intervening redefinition of `r0`
    /// collapses to `return r0`, with the move nopped.
    #[test]
    fn single_use_move_is_propagated_into_its_consumer() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(7) },
                    Instruction::Move { dst: Register(1), src: Register(0) },
                    Instruction::Return { value: Some(Register(1)) },
                ],
            }],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        let (use_defs, def_uses) = build_def_use(&graph, &[], &config).unwrap();
        register_propagation(&mut graph, &use_defs, &def_uses);

        let block = graph.get(BlockId(0)).unwrap();
        assert!(matches!(block.instructions[1], Instruction::Nop));
        match &block.instructions[2] {
            Instruction::Return { value: Some(r) } => assert_eq!(*r, Register(0)),
            other => panic!("expected propagated return, got {other:?}"),
        }
    }

    /// A redefinition of the copy source between the move and its use
    /// blocks propagation.
    #[test]
    fn redefinition_of_source_blocks_propagation() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(7) },
                    Instruction::Move { dst: Register(1), src: Register(0) },
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(9) },
                    Instruction::Return { value: Some(Register(1)) },
                ],
            }],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        let (use_defs, def_uses) = build_def_use(&graph, &[], &config).unwrap();
        register_propagation(&mut graph, &use_defs, &def_uses);

        let block = graph.get(BlockId(0)).unwrap();
        assert!(matches!(block.instructions[1], Instruction::Move { .. }));
        match &block.instructions[3] {
            Instruction::Return { value: Some(r) } => assert_eq!(*r, Register(1)),
            other => panic!("expected un-propagated return, got {other:?}"),
        }
    }
}
