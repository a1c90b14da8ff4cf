//! Declaration placement.
//!
//! For each variable, compute the lowest block in the dominator tree that
//! dominates every one of its uses, and place the declaration there. A
//! declaration may not float past a use, and a variable whose only uses
//! sit inside a loop is hoisted to the loop's enclosing block rather than
//! re-declared on every iteration.

use std::collections::HashMap;

use crate::graph::Graph;
use crate::ir::BlockId;

use super::VariableEnv;

/// Compute and record `declaration_block` for every variable in `env`.
///
/// Variables with no uses at all (dead code the DCE pass left as a
/// singleton, or a write-only def surviving because it is side-effecting)
/// are declared at their defining block, since there are no uses to take a
/// lowest-common-dominator over.
pub fn place_declarations(graph: &Graph, idom: &HashMap<BlockId, BlockId>, env: &mut VariableEnv) {
    let mut use_blocks: HashMap<super::VarId, Vec<BlockId>> = HashMap::new();
    for (use_site, var_id) in &env.use_var {
        use_blocks.entry(*var_id).or_default().push(use_site.block);
    }

    let mut def_blocks: HashMap<super::VarId, Vec<BlockId>> = HashMap::new();
    for (def_site, var_id) in &env.def_var {
        def_blocks.entry(*var_id).or_default().push(def_site.block);
    }

    let var_ids: Vec<super::VarId> = env.variables.keys().copied().collect();
    for var_id in var_ids {
        let mut blocks = use_blocks.get(&var_id).cloned().unwrap_or_default();
        if blocks.is_empty() {
            // No uses survived (or none were ever recorded): fall back to
            // the defining block(s), lowest-common-dominator of those.
            blocks = def_blocks.get(&var_id).cloned().unwrap_or_default();
        }
        let Some(&first) = blocks.first() else { continue };
        let mut site = first;
        for &block in &blocks[1..] {
            site = graph.lowest_common_dominator(idom, site, block);
        }

        site = hoist_out_of_loop(graph, idom, site, &blocks);

        if let Some(meta) = env.variables.get_mut(&var_id) {
            meta.declaration_block = Some(site);
        }
    }
}

/// If `candidate` sits inside a loop but none of `uses` does (the variable
/// is only read once per entry into the loop and does not need to be
/// re-declared on every iteration), walk up the dominator tree to the
/// nearest enclosing block outside every loop `candidate` is inside. A
/// declaration must still dominate every use, so this only ever walks
/// toward the root — never past a use's own block.
fn hoist_out_of_loop(
    graph: &Graph,
    idom: &HashMap<BlockId, BlockId>,
    candidate: BlockId,
    uses: &[BlockId],
) -> BlockId {
    let enclosing = graph.enclosing_loop_headers(idom, candidate);
    if enclosing.is_empty() {
        return candidate;
    }
    // If any use is itself inside one of those loops, hoisting further
    // would place the declaration somewhere that does not dominate that
    // use once the loop re-enters, so leave it where it is.
    let back_edges = graph.back_edges(idom);
    for header in &enclosing {
        let body: std::collections::HashSet<BlockId> = back_edges
            .iter()
            .filter(|(_, h)| h == header)
            .flat_map(|(latch, h)| graph.loop_body(*h, *latch))
            .collect();
        if uses.iter().any(|u| body.contains(u)) {
            return candidate;
        }
    }
    // Walk to the dominator-tree parent of the outermost enclosing loop
    // header; that block dominates the loop entirely and is reached only
    // once per enclosing execution, not once per iteration.
    let outermost = *enclosing.last().unwrap();
    idom.get(&outermost).copied().unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::defuse::{DefSite, UseSite};
    use crate::ir::{CompareOp, ExceptionRange, Instruction, MethodSource, Operand, Register, SourceBlock};
    use crate::transforms::{VarMeta, VariableEnv};

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
            1
        }
        fn ins_size(&self) -> u16 {
            1
        }
        fn access_flags(&self) -> crate::ir::AccessFlags {
            crate::ir::AccessFlags(0)
        }
        fn exception_table(&self) -> &[ExceptionRange] {
            &[]
        }
    }

    fn diamond() -> Source {
        Source {
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::ConditionalBranch {
                        op: CompareOp::Eq,
                        lhs: Register(0),
                        rhs: Operand::Immediate(0),
                        target_true: BlockId(1),
                        target_false: BlockId(2),
                    }],
                },
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Goto { target: BlockId(3) }] },
                SourceBlock { id: BlockId(2), instructions: vec![Instruction::Goto { target: BlockId(3) }] },
                SourceBlock {
                    id: BlockId(3),
                    instructions: vec![Instruction::Return { value: Some(Register(0)) }],
                },
            ],
        }
    }

    /// A variable used in both arms of a diamond is declared at the head,
    /// the lowest block that dominates both uses.
    #[test]
    fn variable_used_in_both_arms_is_declared_at_the_head() {
        let source = diamond();
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        let mut env = VariableEnv::default();
        let var_id = env.fresh_id();
        env.variables.insert(
            var_id,
            VarMeta {
                id: var_id,
                source_register: Register(0),
                synthetic_name: None,
                ty: crate::ir::JavaType::Unknown,
                declaration_block: None,
            },
        );
        env.def_var.insert(DefSite { register: Register(0), block: BlockId(0), index: usize::MAX }, var_id);
        env.use_var.insert(UseSite { register: Register(0), block: BlockId(1), index: 0 }, var_id);
        env.use_var.insert(UseSite { register: Register(0), block: BlockId(2), index: 0 }, var_id);

        place_declarations(&graph, &idom, &mut env);

        assert_eq!(env.variables[&var_id].declaration_block, Some(BlockId(0)));
    }
}
