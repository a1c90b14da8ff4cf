//! Dead-code elimination.

use std::collections::{HashSet, VecDeque};

use crate::config::Config;
use crate::defuse::{DefSite, DefUseMap, UseDefMap, UseSite};
use crate::graph::Graph;
use crate::ir::Instruction;

/// Remove instructions whose destination has no remaining uses and whose
/// execution has no observable side effect. Removing an instruction can
/// kill the uses of its operands, which is why this runs as a worklist
/// rather than a single pass: killing one definition may make its
/// producers dead in turn.
///
/// Dead instructions are rewritten to `Instruction::Nop` in place rather
/// than physically removed, so def/use site indices recorded earlier in
/// the pipeline stay valid for the remaining passes; the Writer skips
/// `Nop` when it renders a block's statements.
pub fn dead_code_elimination(
    graph: &mut Graph,
    use_defs: &UseDefMap,
    def_uses: &mut DefUseMap,
    config: &Config,
) {
    let mut remaining_uses: std::collections::HashMap<DefSite, HashSet<UseSite>> = def_uses
        .0
        .iter()
        .map(|(d, uses)| (*d, uses.iter().copied().collect()))
        .collect();

    let mut worklist: VecDeque<DefSite> = remaining_uses
        .iter()
        .filter(|(_, uses)| uses.is_empty())
        .map(|(d, _)| *d)
        .collect();

    let mut nopped: HashSet<DefSite> = HashSet::new();

    while let Some(def) = worklist.pop_front() {
        if nopped.contains(&def) {
            continue;
        }
        if def.index == usize::MAX {
            continue; // synthetic parameter definition, never removable
        }
        if !remaining_uses.get(&def).map(|u| u.is_empty()).unwrap_or(true) {
            continue;
        }
        let Ok(block) = graph.get(def.block) else { continue };
        let Some(inst) = block.instructions.get(def.index) else { continue };
        if matches!(inst, Instruction::Nop) {
            continue;
        }
        if inst.has_side_effects(config.conservative_side_effects) {
            continue;
        }

        let reads = inst.reads();
        let Ok(block_mut) = graph.get_mut(def.block) else { continue };
        block_mut.instructions[def.index] = Instruction::Nop;
        nopped.insert(def);

        for reg in reads {
            let use_site = UseSite { register: reg, block: def.block, index: def.index };
            if let Some(reaching) = use_defs.0.get(&use_site) {
                for reaching_def in reaching {
                    if let Some(uses) = remaining_uses.get_mut(reaching_def) {
                        uses.remove(&use_site);
                        if uses.is_empty() {
                            worklist.push_back(*reaching_def);
                        }
                    }
                }
            }
        }
    }

    for (def, uses) in remaining_uses {
        def_uses.0.insert(def, uses.into_iter().collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defuse::build_def_use;
    use crate::ir::{BlockId, ConstValue, ExceptionRange, MethodSource, Register, SourceBlock};

    fn make_graph(instructions: Vec<Instruction>) -> (Graph, Vec<Register>) {
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
        let source = Source { blocks: vec![SourceBlock { id: BlockId(0), instructions }] };
        let config = Config::default();
        let graph = Graph::construct(&source, &config).unwrap();
        (graph, vec![])
    }

    /// A dead store (no remaining uses, no side effect) is nopped; a store
    /// that is later read is kept.
    #[test]
    fn dead_store_is_nopped_live_store_survives() {
        let (mut graph, params) = make_graph(vec![
            Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(1) }, // dead
            Instruction::ConstLoad { dst: Register(1), value: ConstValue::Int(2) }, // live
            Instruction::Return { value: Some(Register(1)) },
        ]);
        let config = Config::default();
        let (use_defs, mut def_uses) = build_def_use(&graph, &params, &config).unwrap();
        dead_code_elimination(&mut graph, &use_defs, &mut def_uses, &config);

        let block = graph.get(BlockId(0)).unwrap();
        assert!(matches!(block.instructions[0], Instruction::Nop));
        assert!(matches!(block.instructions[1], Instruction::ConstLoad { .. }));
    }

    /// A side-effecting instruction is never nopped even with no uses of
    /// its (absent) destination.
    #[test]
    fn side_effecting_instruction_is_conserved() {
        let (mut graph, params) = make_graph(vec![
            Instruction::Invoke {
                kind: crate::ir::InvokeKind::Static,
                method: crate::ir::MethodRef {
                    owner: "Test".to_string(),
                    name: "sideEffect".to_string(),
                    param_types: vec![],
                    return_type: "V".to_string(),
                },
                receiver: None,
                args: Default::default(),
                dst: None,
            },
            Instruction::Return { value: None },
        ]);
        let config = Config::default();
        let (use_defs, mut def_uses) = build_def_use(&graph, &params, &config).unwrap();
        dead_code_elimination(&mut graph, &use_defs, &mut def_uses, &config);

        let block = graph.get(BlockId(0)).unwrap();
        assert!(matches!(block.instructions[0], Instruction::Invoke { .. }));
    }
}
