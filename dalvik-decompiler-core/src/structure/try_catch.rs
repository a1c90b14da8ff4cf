//! Try/catch identification.
//!
//! `Graph::construct` already dedupes identical handler stacks into shared
//! synthetic catch-entry chains (see [`crate::graph::cfg::Graph::construct`]);
//! this module groups the raising blocks that share a chain back into a
//! `Try` region, widens the raiser set to the dominance-bounded block range
//! it actually sits in (so the non-raising statements leading up to a
//! `try`'s guarded call are included, not just the instruction that can
//! throw), and resolves each chain link to its `(catch_type,
//! handler_block)` pair.

use std::collections::{HashMap, HashSet};

use crate::graph::{BlockKind, EdgeType};
use crate::ir::BlockId;

use super::Graph;

/// One try region: its dominance-bounded entry block, the protected block
/// set, and the handler chain in try order (first matching catch type
/// wins, mirroring Java's multi-catch evaluation order).
#[derive(Debug, Clone)]
pub struct TryGroup {
    pub entry: BlockId,
    pub exit: Option<BlockId>,
    pub protected: HashSet<BlockId>,
    pub handlers: Vec<(Option<String>, BlockId)>,
}

/// Find every distinct try region by grouping raising blocks that share an
/// identical ordered chain of catch-entry synthetic blocks.
pub fn find_try_groups(
    graph: &Graph,
    idom: &HashMap<BlockId, BlockId>,
    ipdom: &HashMap<BlockId, BlockId>,
) -> Vec<TryGroup> {
    let mut chain_of_raiser: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for edge in &graph.edges {
        if let EdgeType::Exception(_) = &edge.edge_type {
            chain_of_raiser.entry(edge.from).or_default().push(edge.to);
        }
    }

    let mut groups_by_chain: HashMap<Vec<BlockId>, HashSet<BlockId>> = HashMap::new();
    for (raiser, mut chain) in chain_of_raiser {
        chain.sort_by_key(|b| b.0);
        chain.dedup();
        groups_by_chain.entry(chain).or_default().insert(raiser);
    }

    let mut groups = Vec::new();
    for (chain, raisers) in groups_by_chain {
        let handlers = resolve_chain(graph, &chain);
        if handlers.is_empty() {
            continue;
        }
        let handler_blocks: HashSet<BlockId> = handlers.iter().map(|(_, h)| *h).collect();

        let mut raisers_iter = raisers.iter().copied();
        let Some(first) = raisers_iter.next() else { continue };
        let entry = raisers_iter.fold(first, |acc, r| graph.lowest_common_dominator(idom, acc, r));
        let exit = ipdom.get(&entry).copied();

        let protected: HashSet<BlockId> = graph
            .block_ids()
            .into_iter()
            .filter(|&b| {
                if handler_blocks.contains(&b) || chain.contains(&b) {
                    return false;
                }
                if !graph.dominates(idom, entry, b) {
                    return false;
                }
                if let Some(exit) = exit {
                    if b != exit && graph.dominates(idom, exit, b) {
                        return false;
                    }
                    if b == exit {
                        return false;
                    }
                }
                true
            })
            .collect();

        groups.push(TryGroup { entry, exit, protected, handlers });
    }
    groups.sort_by_key(|g| g.entry.0);
    groups
}

/// Resolve each catch-entry synthetic block in a chain to its
/// `(catch_type, handler_block)`: the catch type comes from any inbound
/// exception edge naming it, the handler block from the synthetic block's
/// single fall-through successor.
fn resolve_chain(graph: &Graph, chain: &[BlockId]) -> Vec<(Option<String>, BlockId)> {
    let mut out = Vec::with_capacity(chain.len());
    for &synth in chain {
        let Ok(block) = graph.get(synth) else { continue };
        if block.kind != BlockKind::CatchEntry {
            continue;
        }
        let catch_type = graph
            .edges
            .iter()
            .find_map(|e| match &e.edge_type {
                EdgeType::Exception(ty) if e.to == synth => Some(ty.clone()),
                _ => None,
            })
            .flatten();
        let Some(&handler) = block.successors.first() else { continue };
        out.push((catch_type, handler));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{Instruction, InvokeKind, MethodRef, MethodSource, Register, SourceBlock};
    use crate::structure::postdom;

    struct Source {
        blocks: Vec<SourceBlock>,
        exceptions: Vec<crate::ir::ExceptionRange>,
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
        fn exception_table(&self) -> &[crate::ir::ExceptionRange] {
            &self.exceptions
        }
    }

    /// A block covered by an exception range whose only raising
    /// instruction can throw produces a try group whose handler resolves
    /// to the declared catch block.
    #[test]
    fn covered_raiser_produces_a_try_group_with_its_handler() {
        let source = Source {
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![
                        Instruction::Invoke {
                            kind: InvokeKind::Static,
                            method: MethodRef {
                                owner: "Test".to_string(),
                                name: "risky".to_string(),
                                param_types: vec![],
                                return_type: "V".to_string(),
                            },
                            receiver: None,
                            args: Default::default(),
                            dst: None,
                        },
                        Instruction::Goto { target: BlockId(2) },
                    ],
                },
                SourceBlock {
                    id: BlockId(1),
                    instructions: vec![Instruction::Return { value: Some(Register(0)) }],
                },
                SourceBlock {
                    id: BlockId(2),
                    instructions: vec![Instruction::Return { value: Some(Register(0)) }],
                },
            ],
            exceptions: vec![crate::ir::ExceptionRange {
                start: BlockId(0),
                end: BlockId(0),
                handlers: vec![(Some("java.lang.Exception".to_string()), BlockId(1))],
            }],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();
        let ipdom = postdom::immediate_post_dominators(&graph);

        let groups = find_try_groups(&graph, &idom, &ipdom);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.entry, BlockId(0));
        assert_eq!(group.handlers, vec![(Some("java.lang.Exception".to_string()), BlockId(1))]);
        assert!(group.protected.contains(&BlockId(0)));
    }
}
