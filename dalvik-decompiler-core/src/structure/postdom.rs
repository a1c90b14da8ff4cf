//! Post-dominator computation.
//!
//! Conditional and switch identification both need the immediate
//! post-dominator of a branch block: the nearest block every path from the
//! branch eventually passes through on its way out of the method. This is
//! the mirror image of [`crate::graph::Graph::immediate_dominators`] — same
//! Cooper-Harvey-Kennedy fixpoint, run over the graph with edges reversed
//! and a virtual exit node feeding in from every block with no successors.

use std::collections::HashMap;

use crate::ir::BlockId;

use super::Graph;

/// A synthetic id guaranteed not to collide with any real or
/// exception-synthesized block: one past the highest id `Graph` could have
/// allocated, which callers never see since it only lives inside this
/// function's local maps.
fn virtual_exit_id(graph: &Graph) -> BlockId {
    let max = graph.block_ids().iter().map(|b| b.0).max().unwrap_or(0);
    BlockId(max + 1)
}

/// Reverse-postorder of the reversed graph (successors become
/// predecessors), rooted at a virtual exit connected from every block with
/// no real successors. Needed before `post_idom` can run its fixpoint.
fn reverse_rpo(graph: &Graph, exit: BlockId) -> Vec<BlockId> {
    let exits: Vec<BlockId> = graph
        .blocks()
        .filter(|b| b.successors.is_empty())
        .map(|b| b.id)
        .collect();

    let mut visited: std::collections::HashSet<BlockId> = std::collections::HashSet::new();
    let mut postorder = Vec::new();
    // (node, next predecessor index) — reversed graph, so "successors" here
    // are the original block's real predecessors.
    let mut stack: Vec<(BlockId, usize)> = vec![(exit, 0)];
    visited.insert(exit);

    while let Some(&mut (node, ref mut next_idx)) = stack.last_mut() {
        let preds: Vec<BlockId> = if node == exit {
            exits.clone()
        } else {
            graph.get(node).map(|b| b.predecessors.to_vec()).unwrap_or_default()
        };
        if *next_idx < preds.len() {
            let p = preds[*next_idx];
            *next_idx += 1;
            if visited.insert(p) {
                stack.push((p, 0));
            }
        } else {
            postorder.push(node);
            stack.pop();
        }
    }
    postorder.reverse();
    postorder
}

/// Immediate post-dominators for every block reachable backward from some
/// exit. The virtual exit block is never a key or value in the result.
pub fn immediate_post_dominators(graph: &Graph) -> HashMap<BlockId, BlockId> {
    let exit = virtual_exit_id(graph);
    let rpo_order = reverse_rpo(graph, exit);
    if rpo_order.is_empty() || rpo_order[0] != exit {
        return HashMap::new();
    }
    let rpo_index: HashMap<BlockId, usize> =
        rpo_order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut idom: HashMap<BlockId, Option<BlockId>> =
        rpo_order.iter().map(|id| (*id, None)).collect();
    idom.insert(exit, Some(exit));

    let intersect = |mut a: BlockId,
                     mut b: BlockId,
                     idom: &HashMap<BlockId, Option<BlockId>>,
                     rpo_index: &HashMap<BlockId, usize>|
     -> BlockId {
        loop {
            while rpo_index.get(&a).copied().unwrap_or(usize::MAX)
                > rpo_index.get(&b).copied().unwrap_or(usize::MAX)
            {
                match idom.get(&a).copied().flatten() {
                    Some(next) if next != a => a = next,
                    _ => break,
                }
            }
            while rpo_index.get(&b).copied().unwrap_or(usize::MAX)
                > rpo_index.get(&a).copied().unwrap_or(usize::MAX)
            {
                match idom.get(&b).copied().flatten() {
                    Some(next) if next != b => b = next,
                    _ => break,
                }
            }
            if a == b {
                return a;
            }
            if idom.get(&a).copied().flatten() == Some(a) && idom.get(&b).copied().flatten() == Some(b) {
                return a;
            }
        }
    };

    let mut changed = true;
    while changed {
        changed = false;
        for &node in rpo_order.iter().skip(1) {
            // "Predecessors" of `node` in the reversed graph are the
            // original block's real successors (who come before it on the
            // way out of the method).
            let preds: Vec<BlockId> = if node == exit {
                Vec::new()
            } else {
                graph.get(node).map(|b| b.successors.to_vec()).unwrap_or_default()
            };
            let mut new_idom: Option<BlockId> = None;
            for pred in preds {
                if !rpo_index.contains_key(&pred) {
                    continue;
                }
                if idom.get(&pred).copied().flatten().is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(cur) => intersect(cur, pred, &idom, &rpo_index),
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
        if node == exit {
            continue;
        }
        if let Some(d) = d {
            if d != node && d != exit {
                result.insert(node, d);
            }
        }
    }
    result
}
