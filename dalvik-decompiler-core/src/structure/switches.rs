//! Switch identification.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::ir::BlockId;

use super::Graph;

/// One case target's block set, grouped by every key that falls through to
/// the same target (Dalvik's `packed-switch`/`sparse-switch` both allow
/// several keys to share a target block).
pub struct CaseArm {
    pub keys: Vec<i32>,
    pub entry: BlockId,
    pub blocks: HashSet<BlockId>,
}

/// Group a switch's `(key, target)` table by target, then compute each
/// target's block set the same way an if-arm's is computed: everything
/// dominated by the target that isn't also dominated by the common
/// post-dominator `join`.
pub fn compute_switch_arms(
    graph: &Graph,
    idom: &HashMap<BlockId, BlockId>,
    cases: &SmallVec<[(i32, BlockId); 4]>,
    default: BlockId,
    join: Option<BlockId>,
) -> (Vec<CaseArm>, CaseArm) {
    let mut by_target: HashMap<BlockId, Vec<i32>> = HashMap::new();
    for (key, target) in cases {
        by_target.entry(*target).or_default().push(*key);
    }
    by_target.remove(&default);

    let mut arms: Vec<CaseArm> = by_target
        .into_iter()
        .map(|(target, mut keys)| {
            keys.sort_unstable();
            CaseArm { keys, entry: target, blocks: block_set(graph, idom, target, join) }
        })
        .collect();
    arms.sort_by_key(|a| a.keys.first().copied().unwrap_or(i32::MAX));

    let default_arm = CaseArm { keys: Vec::new(), entry: default, blocks: block_set(graph, idom, default, join) };
    (arms, default_arm)
}

fn block_set(graph: &Graph, idom: &HashMap<BlockId, BlockId>, target: BlockId, join: Option<BlockId>) -> HashSet<BlockId> {
    graph
        .block_ids()
        .into_iter()
        .filter(|&b| Some(b) != join && graph.dominates(idom, target, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{ExceptionRange, Instruction, MethodSource, Register, SourceBlock};

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

    /// Two keys sharing the same target block are grouped into one arm;
    /// the default arm is reported separately from the keyed arms.
    #[test]
    fn keys_sharing_a_target_group_into_one_arm() {
        let source = Source {
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::Switch {
                        selector: Register(0),
                        cases: smallvec::smallvec![(1, BlockId(1)), (2, BlockId(1)), (3, BlockId(2))],
                        default: BlockId(3),
                    }],
                },
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Goto { target: BlockId(4) }] },
                SourceBlock { id: BlockId(2), instructions: vec![Instruction::Goto { target: BlockId(4) }] },
                SourceBlock { id: BlockId(3), instructions: vec![Instruction::Goto { target: BlockId(4) }] },
                SourceBlock {
                    id: BlockId(4),
                    instructions: vec![Instruction::Return { value: Some(Register(0)) }],
                },
            ],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        let cases: SmallVec<[(i32, BlockId); 4]> = smallvec::smallvec![(1, BlockId(1)), (2, BlockId(1)), (3, BlockId(2))];
        let (arms, default_arm) = compute_switch_arms(&graph, &idom, &cases, BlockId(3), Some(BlockId(4)));

        assert_eq!(arms.len(), 2);
        let shared = arms.iter().find(|a| a.entry == BlockId(1)).unwrap();
        assert_eq!(shared.keys, vec![1, 2]);
        assert_eq!(default_arm.entry, BlockId(3));
        assert!(!default_arm.blocks.contains(&BlockId(4)));
    }
}
