//! Reverse-postorder numbering and the Cooper-Harvey-Kennedy iterative
//! dominator algorithm.

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{DecompileError, Result};
use crate::ir::BlockId;

use super::cfg::Graph;

impl Graph {
    /// Assign reverse-postorder numbers via DFS from the entry block.
    /// Required before dominator computation. Unreachable blocks (none if
    /// construction succeeded from a well-formed method) keep `rpo = None`.
    ///
    /// Uses an explicit work-stack rather than recursion, per the
    /// recursion-bound policy the rest of this crate follows.
    pub fn compute_rpo(&mut self, config: &Config) -> Result<Vec<BlockId>> {
        let mut visited: HashMap<BlockId, bool> =
            self.block_ids().into_iter().map(|id| (id, false)).collect();
        let mut postorder = Vec::with_capacity(visited.len());

        // (node, next successor index to visit) — explicit stack instead of
        // recursive DFS.
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry, 0)];
        visited.insert(self.entry, true);

        while let Some(&mut (node, ref mut next_idx)) = stack.last_mut() {
            if stack.len() > config.max_recursion_depth {
                return Err(DecompileError::RecursionLimitExceeded(
                    config.max_recursion_depth,
                    "compute_rpo".into(),
                ));
            }
            let successors = self.get(node)?.successors.clone();
            if *next_idx < successors.len() {
                let succ = successors[*next_idx];
                *next_idx += 1;
                if !*visited.get(&succ).unwrap_or(&true) {
                    visited.insert(succ, true);
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(node);
                stack.pop();
            }
        }

        let n = postorder.len();
        let mut order = postorder.clone();
        order.reverse();
        for (i, id) in order.iter().enumerate() {
            self.get_mut(*id)?.rpo = Some(i as u32);
        }
        let _ = n;
        Ok(order)
    }

    /// Cooper-Harvey-Kennedy iterative dominator algorithm. Requires
    /// `compute_rpo` to have been run first (reachable blocks must carry an
    /// RPO number); returns immediate-dominator map `block -> idom`. The
    /// entry block is its own dominator and is omitted from the map's
    /// values (callers treat `idom(entry) == entry`).
    pub fn immediate_dominators(&self) -> Result<HashMap<BlockId, BlockId>> {
        let rpo_order: Vec<BlockId> = {
            let mut with_rpo: Vec<(u32, BlockId)> = self
                .blocks()
                .filter_map(|b| b.rpo.map(|r| (r, b.id)))
                .collect();
            with_rpo.sort_by_key(|(r, _)| *r);
            with_rpo.into_iter().map(|(_, id)| id).collect()
        };
        if rpo_order.is_empty() || rpo_order[0] != self.entry {
            return Err(DecompileError::InternalInvariantViolation(
                "immediate_dominators called before compute_rpo, or entry unreachable".into(),
            ));
        }

        let rpo_index: HashMap<BlockId, usize> = rpo_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut idom: HashMap<BlockId, Option<BlockId>> =
            rpo_order.iter().map(|id| (*id, None)).collect();
        idom.insert(self.entry, Some(self.entry));

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo_order.iter().skip(1) {
                let preds = self.get(node)?.predecessors.clone();
                let mut new_idom: Option<BlockId> = None;
                for pred in preds {
                    if !rpo_index.contains_key(&pred) {
                        continue; // unreachable predecessor, ignore
                    }
                    if idom.get(&pred).copied().flatten().is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => self.intersect(cur, pred, &idom, &rpo_index),
                    });
                }
                if idom.get(&node).copied().flatten() != new_idom {
                    idom.insert(node, new_idom);
                    changed = true;
                }
            }
        }

        let mut result = HashMap::new();
        for (node, d) in idom {
            if let Some(d) = d {
                if d != node {
                    result.insert(node, d);
                }
            }
        }
        Ok(result)
    }

    fn intersect(
        &self,
        mut a: BlockId,
        mut b: BlockId,
        idom: &HashMap<BlockId, Option<BlockId>>,
        rpo_index: &HashMap<BlockId, usize>,
    ) -> BlockId {
        while a != b {
            while rpo_index[&a] > rpo_index[&b] {
                a = idom[&a].unwrap_or(a);
                if idom[&a] == Some(a) {
                    break;
                }
            }
            while rpo_index[&b] > rpo_index[&a] {
                b = idom[&b].unwrap_or(b);
                if idom[&b] == Some(b) {
                    break;
                }
            }
            if a == b {
                break;
            }
            if idom[&a] == Some(a) && idom[&b] == Some(b) && a != b {
                // both reached distinct roots with no further progress
                // possible; defensive break to guarantee termination.
                break;
            }
        }
        a
    }

    /// Dominator tree as children-of-idom adjacency, derived from
    /// `immediate_dominators`. Convenience used by the structurer and by
    /// declaration placement.
    pub fn dominator_children(&self, idom: &HashMap<BlockId, BlockId>) -> HashMap<BlockId, Vec<BlockId>> {
        let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for (node, dominator) in idom {
            children.entry(*dominator).or_default().push(*node);
        }
        children
    }

    /// True if `dominator` dominates `node` (reflexive: a block dominates
    /// itself).
    pub fn dominates(&self, idom: &HashMap<BlockId, BlockId>, dominator: BlockId, mut node: BlockId) -> bool {
        if dominator == node {
            return true;
        }
        let mut guard = 0usize;
        while let Some(&next) = idom.get(&node) {
            guard += 1;
            if guard > idom.len() + 1 {
                return false;
            }
            if next == dominator {
                return true;
            }
            if next == node {
                break;
            }
            node = next;
        }
        false
    }

    /// Lowest common dominator of two blocks, i.e. their nearest common
    /// ancestor in the dominator tree. Used by declaration placement.
    pub fn lowest_common_dominator(
        &self,
        idom: &HashMap<BlockId, BlockId>,
        a: BlockId,
        b: BlockId,
    ) -> BlockId {
        let ancestors_of = |mut node: BlockId| -> Vec<BlockId> {
            let mut chain = vec![node];
            let mut guard = 0usize;
            while let Some(&next) = idom.get(&node) {
                guard += 1;
                if guard > idom.len() + 1 || next == node {
                    break;
                }
                chain.push(next);
                node = next;
            }
            chain
        };
        let chain_a = ancestors_of(a);
        let chain_b: std::collections::HashSet<BlockId> = ancestors_of(b).into_iter().collect();
        chain_a
            .into_iter()
            .find(|n| chain_b.contains(n))
            .unwrap_or(self.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    /// A diamond `b0 -> {b1, b2} -> b3`: the join block's immediate
    /// dominator is the diamond's head, not either arm.
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

    #[test]
    fn diamond_join_is_dominated_by_the_head() {
        let source = diamond();
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        assert_eq!(idom[&BlockId(1)], BlockId(0));
        assert_eq!(idom[&BlockId(2)], BlockId(0));
        assert_eq!(idom[&BlockId(3)], BlockId(0));
        assert!(graph.dominates(&idom, BlockId(0), BlockId(3)));
        assert!(!graph.dominates(&idom, BlockId(1), BlockId(3)));
    }

    #[test]
    fn lowest_common_dominator_of_both_arms_is_the_head() {
        let source = diamond();
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        graph.compute_rpo(&config).unwrap();
        let idom = graph.immediate_dominators().unwrap();

        assert_eq!(graph.lowest_common_dominator(&idom, BlockId(1), BlockId(2)), BlockId(0));
    }

    #[test]
    fn rpo_of_entry_is_always_zero() {
        let source = diamond();
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        let order = graph.compute_rpo(&config).unwrap();
        assert_eq!(order[0], BlockId(0));
    }
}
