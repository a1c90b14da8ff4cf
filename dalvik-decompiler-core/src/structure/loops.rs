//! Loop identification: classify each back-edge header as `while`,
//! `do-while`, or `endless`, and merge back-edges that share a header into
//! one loop body.

use std::collections::{HashMap, HashSet};

use crate::graph::BlockKind;
use crate::ir::BlockId;

use super::{Graph, LoopKind};

/// A loop discovered from one or more back-edges into the same header.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub kind: LoopKind,
    pub header: BlockId,
    /// Every block in the loop, including the header and every latch.
    pub body: HashSet<BlockId>,
    /// Blocks outside `body` reached directly from a block inside it —
    /// the loop's exit targets.
    pub exits: Vec<BlockId>,
}

/// Find every loop in `graph`, keyed by header. A header with multiple
/// back-edges (multiple latches feeding the same loop, e.g. a loop with
/// several `continue`-like paths) gets one `LoopInfo` whose body is the
/// union of all of them.
pub fn find_loops(graph: &Graph, idom: &HashMap<BlockId, BlockId>) -> HashMap<BlockId, LoopInfo> {
    let back_edges = graph.back_edges(idom);
    let mut bodies: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
    let mut latches: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for (latch, header) in back_edges {
        let body = bodies.entry(header).or_default();
        body.extend(graph.loop_body(header, latch));
        latches.entry(header).or_default().push(latch);
    }

    let mut loops = HashMap::new();
    for (header, body) in bodies {
        let exits: Vec<BlockId> = body
            .iter()
            .filter_map(|b| graph.get(*b).ok())
            .flat_map(|b| b.successors.iter().copied())
            .filter(|s| !body.contains(s))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let header_block = graph.get(header).ok();
        let header_is_conditional = header_block.map(|b| b.kind == BlockKind::Conditional).unwrap_or(false);
        let header_exits = header_block
            .map(|b| b.successors.iter().any(|s| !body.contains(s)))
            .unwrap_or(false);

        let latch_ids = &latches[&header];
        let latch_is_conditional = latch_ids
            .iter()
            .any(|l| graph.get(*l).map(|b| b.kind == BlockKind::Conditional).unwrap_or(false));

        let kind = if header_is_conditional && header_exits {
            LoopKind::While
        } else if latch_is_conditional {
            LoopKind::DoWhile
        } else {
            LoopKind::Endless
        };

        loops.insert(header, LoopInfo { kind, header, body, exits });
    }
    loops
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

    /// A header that tests its exit condition before the body ever runs,
    /// with a conditional latch feeding the back-edge, classifies as
    /// `while`.
    #[test]
    fn header_testing_before_body_classifies_as_while() {
        let source = Source {
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::ConditionalBranch {
                        op: CompareOp::Lt,
                        lhs: Register(0),
                        rhs: Operand::Immediate(10),
                        target_true: BlockId(1),
                        target_false: BlockId(2),
                    }],
                },
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Goto { target: BlockId(0) }] },
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

        let loops = find_loops(&graph, &idom);
        let loop_info = &loops[&BlockId(0)];
        assert_eq!(loop_info.kind, LoopKind::While);
        assert_eq!(loop_info.exits, vec![BlockId(2)]);
        assert!(loop_info.body.contains(&BlockId(0)));
        assert!(loop_info.body.contains(&BlockId(1)));
    }
}
