//! CFG simplification: branch-node splitting and empty/linear-chain
//! coalescing.
//!
//! The structurer wants conditional blocks that are pure decision points
//! and no redundant linear chains; these two passes produce that shape and
//! are run to a fixpoint before structuring.

use crate::config::Config;
use crate::error::Result;
use crate::ir::BlockId;

use super::cfg::{BasicBlock, BlockKind, Edge, EdgeType, Graph};

impl Graph {
    /// For any conditional block whose body contains statements other than
    /// the branch, split it into a pre-header (those statements) and a
    /// header (the bare branch). The pre-header keeps the original block's
    /// id and inbound edges; the header is a fresh block carrying the
    /// conditional's outgoing `true`/`false` edges.
    ///
    /// Returns whether any block was split.
    pub fn split_if_nodes(&mut self) -> Result<bool> {
        let candidates: Vec<BlockId> = self
            .blocks()
            .filter(|b| b.kind == BlockKind::Conditional && b.instructions.len() > 1)
            .map(|b| b.id)
            .collect();

        if candidates.is_empty() {
            return Ok(false);
        }

        for old_id in candidates {
            let (body, tail, out_edges) = {
                let block = self.get(old_id)?;
                let mut instructions = block.instructions.clone();
                let tail = instructions.pop().expect("checked len > 1 above");
                let out_edges: Vec<Edge> = self
                    .edges
                    .iter()
                    .filter(|e| e.from == old_id)
                    .cloned()
                    .collect();
                (instructions, tail, out_edges)
            };

            let header_id = self.fresh_block_id();
            self.insert_block(BasicBlock {
                id: header_id,
                instructions: vec![tail],
                successors: Default::default(),
                predecessors: Default::default(),
                kind: BlockKind::Conditional,
                rpo: None,
                comments: Vec::new(),
            });

            self.remove_edges_from(old_id);
            for mut edge in out_edges {
                edge.from = header_id;
                self.add_edge(edge);
            }
            self.add_edge(Edge {
                from: old_id,
                to: header_id,
                edge_type: EdgeType::FallThrough,
            });

            let preheader = self.get_mut(old_id)?;
            preheader.instructions = body;
            preheader.kind = BlockKind::Normal;
        }
        Ok(true)
    }

    /// Coalesce a block with its unique successor when that successor has
    /// this block as its unique predecessor and the block ends with
    /// fall-through; delete blocks that are empty (after DCE) and whose
    /// single predecessor/successor can be wired directly. Iterates to a
    /// fixpoint: running this twice in a row is a no-op (invariant 7).
    pub fn simplify(&mut self, config: &Config) -> Result<()> {
        loop {
            if self.coalesce_one_linear_chain(config)? {
                continue;
            }
            if self.drop_one_empty_passthrough()? {
                continue;
            }
            break;
        }
        Ok(())
    }

    fn coalesce_one_linear_chain(&mut self, config: &Config) -> Result<bool> {
        // Recomputed on every call: the previous call's merge changes block
        // identity, so a stale dominator tree could misclassify a back-edge.
        self.compute_rpo(config)?;
        let idom = self.immediate_dominators()?;

        let ids = self.block_ids();
        for id in ids {
            let block = self.get(id)?;
            if block.successors.len() != 1 {
                continue;
            }
            let succ_id = block.successors[0];
            if succ_id == id {
                continue; // self-loop, not a linear chain
            }
            if succ_id == self.entry {
                continue; // never merge into the entry block
            }
            if self.dominates(&idom, succ_id, id) {
                continue; // back-edge: succ_id is a loop header dominating id
            }
            let is_fallthrough = self
                .edges
                .iter()
                .any(|e| e.from == id && e.to == succ_id && e.edge_type == EdgeType::FallThrough);
            if !is_fallthrough {
                continue;
            }
            let succ = self.get(succ_id)?;
            if succ.predecessors.len() != 1 || succ.predecessors[0] != id {
                continue;
            }
            if succ.kind == BlockKind::Conditional && block.kind != BlockKind::Conditional {
                // Keep conditional headers pure decision points (the shape
                // split_if_nodes establishes): don't fold a predecessor's
                // statements back into one.
                continue;
            }

            let succ_instructions = succ.instructions.clone();
            let succ_comments = succ.comments.clone();
            let succ_out: Vec<Edge> = self.edges.iter().filter(|e| e.from == succ_id).cloned().collect();
            let succ_kind = succ.kind;

            self.remove_edges_from(id);
            self.remove_edges_from(succ_id);
            for mut edge in succ_out {
                edge.from = id;
                self.add_edge(edge);
            }
            {
                let merged = self.get_mut(id)?;
                merged.instructions.extend(succ_instructions);
                merged.comments.extend(succ_comments);
                if merged.kind == BlockKind::Normal {
                    merged.kind = succ_kind;
                }
            }
            self.remove_block(succ_id);
            return Ok(true);
        }
        Ok(false)
    }

    fn drop_one_empty_passthrough(&mut self) -> Result<bool> {
        let ids = self.block_ids();
        for id in ids {
            if id == self.entry {
                continue;
            }
            let block = self.get(id)?;
            if !block.is_empty_of_code() || block.predecessors.len() != 1 || block.successors.len() != 1 {
                continue;
            }
            let pred_id = block.predecessors[0];
            let succ_id = block.successors[0];
            if pred_id == id || succ_id == id {
                continue;
            }
            let incoming_type = self
                .edges
                .iter()
                .find(|e| e.from == pred_id && e.to == id)
                .map(|e| e.edge_type.clone());
            let Some(incoming_type) = incoming_type else {
                continue;
            };

            // Replace only the single `pred -> id` edge, leaving the
            // predecessor's other outgoing edges (e.g. the other arm of a
            // conditional) untouched.
            let pred_other_edges: Vec<Edge> = self
                .edges
                .iter()
                .filter(|e| e.from == pred_id && e.to != id)
                .cloned()
                .collect();
            self.remove_edges_from(pred_id);
            for e in pred_other_edges {
                self.add_edge(e);
            }
            self.remove_edges_from(id);
            self.add_edge(Edge { from: pred_id, to: succ_id, edge_type: incoming_type });
            self.remove_block(id);
            return Ok(true);
        }
        Ok(false)
    }
}
