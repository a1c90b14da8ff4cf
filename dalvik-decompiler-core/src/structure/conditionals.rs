//! Conditional (if/else) identification.

use std::collections::HashMap;

use crate::ir::BlockId;

use super::Graph;

/// The `then`/`else` arms of a conditional block, as the sets of blocks
/// reachable from each branch before reaching the immediate
/// post-dominator. Either arm may be empty (an `if` with no `else`, or a
/// branch that jumps straight to the join point).
pub struct IfArms {
    pub then_entry: BlockId,
    pub then_set: std::collections::HashSet<BlockId>,
    pub else_entry: Option<BlockId>,
    pub else_set: std::collections::HashSet<BlockId>,
}

/// Compute the `then`/`else` block sets for a conditional block `cond`
/// given its immediate post-dominator `join` (the point execution
/// converges at regardless of which branch was taken).
///
/// A branch's block set is every block dominated by its branch target that
/// is not also dominated by `join` — i.e. every block on that side of the
/// split before control merges back.
pub fn compute_if_arms(
    graph: &Graph,
    idom: &HashMap<BlockId, BlockId>,
    cond: BlockId,
    true_target: BlockId,
    false_target: BlockId,
    join: Option<BlockId>,
) -> IfArms {
    let then_set = branch_block_set(graph, idom, true_target, join);
    let else_set = if Some(false_target) == join {
        std::collections::HashSet::new()
    } else {
        branch_block_set(graph, idom, false_target, join)
    };
    IfArms {
        then_entry: true_target,
        then_set,
        else_entry: if else_set.is_empty() { None } else { Some(false_target) },
        else_set,
    }
}

fn branch_block_set(
    graph: &Graph,
    idom: &HashMap<BlockId, BlockId>,
    branch_target: BlockId,
    join: Option<BlockId>,
) -> std::collections::HashSet<BlockId> {
    graph
        .block_ids()
        .into_iter()
        .filter(|&b| {
            if Some(b) == join {
                return false;
            }
            graph.dominates(idom, branch_target, b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{CompareOp, ExceptionRange, Instruction, MethodSource, Operand, Register, SourceBlock};

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

    /// A diamond's branch target sets are disjoint singletons, neither
    /// containing the join block.
    #[test]
    fn diamond_arms_are_disjoint_and_exclude_the_join() {
        let source = Source {
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
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        let arms = compute_if_arms(&graph, &idom, BlockId(0), BlockId(1), BlockId(2), Some(BlockId(3)));
        assert_eq!(arms.then_set, [BlockId(1)].into_iter().collect());
        assert_eq!(arms.else_set, [BlockId(2)].into_iter().collect());
        assert_eq!(arms.else_entry, Some(BlockId(2)));
        assert!(!arms.then_set.contains(&BlockId(3)));
    }

    /// When the `false` branch target is itself the join block, there is
    /// no `else` arm.
    #[test]
    fn false_target_equal_to_join_yields_no_else_arm() {
        let source = Source {
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
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Goto { target: BlockId(2) }] },
                SourceBlock {
                    id: BlockId(2),
                    instructions: vec![Instruction::Return { value: Some(Register(0)) }],
                },
            ],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        let arms = compute_if_arms(&graph, &idom, BlockId(0), BlockId(1), BlockId(2), Some(BlockId(2)));
        assert_eq!(arms.else_entry, None);
        assert!(arms.else_set.is_empty());
    }
}
