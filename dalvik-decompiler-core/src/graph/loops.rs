//! Back-edge detection and loop-body computation, shared by declaration
//! placement (which needs to know if a candidate declaration site sits
//! inside a loop) and the structurer's loop-identification step.

use std::collections::{HashMap, HashSet};

use crate::ir::BlockId;

use super::cfg::Graph;

impl Graph {
    /// Every edge `b -> h` where `h` dominates `b`. These are exactly the
    /// back-edges of the graph; each marks `h` as a loop header.
    pub fn back_edges(&self, idom: &HashMap<BlockId, BlockId>) -> Vec<(BlockId, BlockId)> {
        let mut edges = Vec::new();
        for edge in &self.edges {
            if self.dominates(idom, edge.to, edge.from) {
                edges.push((edge.from, edge.to));
            }
        }
        edges
    }

    /// The body of the loop headed by `header` with back-edge source
    /// `latch`: every node that can reach `latch` by walking predecessors
    /// without passing back through `header`, plus `header` and `latch`
    /// themselves.
    pub fn loop_body(&self, header: BlockId, latch: BlockId) -> HashSet<BlockId> {
        let mut body = HashSet::new();
        body.insert(header);
        body.insert(latch);
        let mut stack = vec![latch];
        while let Some(node) = stack.pop() {
            if let Ok(block) = self.get(node) {
                for pred in &block.predecessors {
                    if body.insert(*pred) {
                        stack.push(*pred);
                    }
                }
            }
        }
        body
    }

    /// Every block that is the header of some loop containing `block`,
    /// nearest header first. Empty if `block` is not inside any loop.
    pub fn enclosing_loop_headers(
        &self,
        idom: &HashMap<BlockId, BlockId>,
        block: BlockId,
    ) -> Vec<BlockId> {
        let mut headers = Vec::new();
        for (latch, header) in self.back_edges(idom) {
            let body = self.loop_body(header, latch);
            if body.contains(&block) {
                headers.push(header);
            }
        }
        headers
    }
}
