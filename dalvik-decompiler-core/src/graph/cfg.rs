//! The control-flow graph.
//!
//! Blocks and edges live in an arena owned by `Graph`; every other
//! component refers to blocks by [`BlockId`]. This is what lets the graph
//! contain cycles (loops, back-edges) without reference cycles in the
//! ownership model — the same trick the arena-plus-integer-id design this
//! module was generalized from uses for its own (acyclic-by-construction)
//! call graph.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::config::Config;
use crate::error::{DecompileError, Result};
use crate::ir::{BlockId, ExceptionRange, Instruction, MethodSource};

/// What role a block plays, assigned during construction and updated as
/// structuring proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Entry,
    Normal,
    Conditional,
    Switch,
    /// A synthetic block marking the start of an exception handler; the
    /// block itself holds no instructions, only a fall-through edge into
    /// the real handler body.
    CatchEntry,
    Return,
    Throw,
    LoopHeader,
    LoopLatch,
}

/// A directed edge between two blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    pub edge_type: EdgeType,
}

/// The reason an edge exists.
#[derive(Debug, Clone, PartialEq)]
#[repr(u8)]
pub enum EdgeType {
    FallThrough = 0,
    True = 1,
    False = 2,
    Switch(i32) = 3,
    /// `None` is a catch-all / finally handler.
    Exception(Option<String>) = 4,
}

/// A basic block owned by the graph's arena.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub successors: SmallVec<[BlockId; 2]>,
    pub predecessors: SmallVec<[BlockId; 2]>,
    pub kind: BlockKind,
    /// Reverse-postorder number, assigned by `compute_rpo`. `None` before
    /// the first call.
    pub rpo: Option<u32>,
    /// Comments attached by later passes (type-resolution ambiguity notes,
    /// unstructurable-region markers); surfaced verbatim by the Writer.
    pub comments: Vec<String>,
}

impl BasicBlock {
    /// The branch-determining tail instruction, if the block is
    /// non-empty.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    pub fn is_empty_of_code(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// The control-flow graph for a single method.
#[derive(Debug, Clone)]
pub struct Graph {
    blocks: Vec<BasicBlock>,
    index_of: HashMap<BlockId, usize>,
    pub edges: Vec<Edge>,
    pub entry: BlockId,
    next_synthetic_id: u32,
}

impl Graph {
    /// Build the CFG from a method's basic blocks and exception ranges:
    /// wires successor/predecessor edges from each block's terminator,
    /// creates synthetic catch-entry blocks for every exception range, and
    /// attaches exception edges from every instruction that can raise
    /// within a covering range to the correct handler chain, deduplicating
    /// identical handler stacks so two raising blocks under the same
    /// `try` share one synthetic chain.
    pub fn construct(source: &dyn MethodSource, _config: &Config) -> Result<Graph> {
        let source_blocks = source.basic_blocks();
        if source_blocks.is_empty() {
            return Err(DecompileError::MalformedInput(
                "method has no basic blocks".into(),
            ));
        }

        let mut blocks: Vec<BasicBlock> = Vec::with_capacity(source_blocks.len());
        let mut index_of = HashMap::with_capacity(source_blocks.len());
        let mut max_id = 0u32;
        for sb in source_blocks {
            index_of.insert(sb.id, blocks.len());
            max_id = max_id.max(sb.id.0);
            blocks.push(BasicBlock {
                id: sb.id,
                instructions: sb.instructions.clone(),
                successors: SmallVec::new(),
                predecessors: SmallVec::new(),
                kind: if sb.id == source.entry_block() {
                    BlockKind::Entry
                } else {
                    BlockKind::Normal
                },
                rpo: None,
                comments: Vec::new(),
            });
        }

        let mut graph = Graph {
            blocks,
            index_of,
            edges: Vec::new(),
            entry: source.entry_block(),
            next_synthetic_id: max_id + 1,
        };

        graph.wire_normal_edges(source)?;
        graph.wire_exception_edges(source.exception_table())?;
        Ok(graph)
    }

    fn wire_normal_edges(&mut self, source: &dyn MethodSource) -> Result<()> {
        use crate::ir::BranchKind;

        let ids: Vec<BlockId> = self.blocks.iter().map(|b| b.id).collect();
        let mut new_edges = Vec::new();
        for id in &ids {
            let block = self.get(*id)?;
            let branch = block.terminator().map(|i| i.branch_kind()).unwrap_or(BranchKind::None);
            match branch {
                BranchKind::None => {
                    // Falls through to the next block in program order, as
                    // given by the upstream partition.
                    if let Some(next) = self.fallthrough_target(*id, source) {
                        new_edges.push(Edge { from: *id, to: next, edge_type: EdgeType::FallThrough });
                    }
                }
                BranchKind::Goto(target) => {
                    self.check_target(target)?;
                    new_edges.push(Edge { from: *id, to: target, edge_type: EdgeType::FallThrough });
                }
                BranchKind::Conditional { if_true, if_false } => {
                    self.check_target(if_true)?;
                    self.check_target(if_false)?;
                    self.set_kind(*id, BlockKind::Conditional);
                    new_edges.push(Edge { from: *id, to: if_true, edge_type: EdgeType::True });
                    new_edges.push(Edge { from: *id, to: if_false, edge_type: EdgeType::False });
                }
                BranchKind::Switch { cases, default } => {
                    self.check_target(default)?;
                    self.set_kind(*id, BlockKind::Switch);
                    for (key, target) in cases {
                        self.check_target(target)?;
                        new_edges.push(Edge { from: *id, to: target, edge_type: EdgeType::Switch(key) });
                    }
                    new_edges.push(Edge { from: *id, to: default, edge_type: EdgeType::FallThrough });
                }
                BranchKind::Return => self.set_kind(*id, BlockKind::Return),
                BranchKind::Throw => self.set_kind(*id, BlockKind::Throw),
            }
        }
        for edge in new_edges {
            self.add_edge(edge);
        }
        Ok(())
    }

    /// The upstream partition is given as a flat list; in the absence of an
    /// explicit successor id on a non-branching block, fall through to the
    /// block whose id is numerically next. This mirrors how the upstream
    /// frontend lays out blocks in program order.
    fn fallthrough_target(&self, id: BlockId, source: &dyn MethodSource) -> Option<BlockId> {
        let mut candidates: Vec<BlockId> = source.basic_blocks().iter().map(|b| b.id).collect();
        candidates.sort_by_key(|b| b.0);
        let pos = candidates.iter().position(|c| *c == id)?;
        candidates.get(pos + 1).copied()
    }

    fn wire_exception_edges(&mut self, ranges: &[ExceptionRange]) -> Result<()> {
        let mut chain_cache: HashMap<Vec<(Option<String>, BlockId)>, Vec<BlockId>> = HashMap::new();

        for range in ranges {
            let chain = chain_cache
                .entry(range.handlers.clone())
                .or_insert_with(Vec::new);
            if chain.is_empty() {
                for (catch_type, handler_block) in &range.handlers {
                    self.check_target(*handler_block)?;
                    let synth_id = self.alloc_synthetic_id();
                    self.blocks.push(BasicBlock {
                        id: synth_id,
                        instructions: Vec::new(),
                        successors: SmallVec::new(),
                        predecessors: SmallVec::new(),
                        kind: BlockKind::CatchEntry,
                        rpo: None,
                        comments: vec![format!(
                            "catch entry for {}",
                            catch_type.clone().unwrap_or_else(|| "<any>".to_string())
                        )],
                    });
                    self.index_of.insert(synth_id, self.blocks.len() - 1);
                    self.add_edge(Edge {
                        from: synth_id,
                        to: *handler_block,
                        edge_type: EdgeType::FallThrough,
                    });
                    chain.push(synth_id);
                }
            }
            let chain = chain.clone();

            let covered: Vec<BlockId> = self
                .blocks
                .iter()
                .filter(|b| range.covers(b.id) && b.instructions.iter().any(|i| i.can_raise()))
                .map(|b| b.id)
                .collect();

            for raiser in covered {
                for (idx, (catch_type, _)) in range.handlers.iter().enumerate() {
                    self.add_edge(Edge {
                        from: raiser,
                        to: chain[idx],
                        edge_type: EdgeType::Exception(catch_type.clone()),
                    });
                }
            }
        }
        Ok(())
    }

    fn alloc_synthetic_id(&mut self) -> BlockId {
        let id = BlockId(self.next_synthetic_id);
        self.next_synthetic_id += 1;
        id
    }

    fn check_target(&self, target: BlockId) -> Result<()> {
        if self.index_of.contains_key(&target) {
            Ok(())
        } else {
            Err(DecompileError::MalformedInput(format!(
                "branch target {} does not exist in method",
                target
            )))
        }
    }

    fn set_kind(&mut self, id: BlockId, kind: BlockKind) {
        if let Some(&idx) = self.index_of.get(&id) {
            self.blocks[idx].kind = kind;
        }
    }

    pub fn add_edge(&mut self, edge: Edge) {
        if let Some(&from_idx) = self.index_of.get(&edge.from) {
            if !self.blocks[from_idx].successors.contains(&edge.to) {
                self.blocks[from_idx].successors.push(edge.to);
            }
        }
        if let Some(&to_idx) = self.index_of.get(&edge.to) {
            if !self.blocks[to_idx].predecessors.contains(&edge.from) {
                self.blocks[to_idx].predecessors.push(edge.from);
            }
        }
        self.edges.push(edge);
    }

    pub fn remove_edges_from(&mut self, id: BlockId) {
        let targets: Vec<BlockId> = self
            .edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect();
        self.edges.retain(|e| e.from != id);
        if let Some(&idx) = self.index_of.get(&id) {
            self.blocks[idx].successors.clear();
        }
        for t in targets {
            if let Some(&idx) = self.index_of.get(&t) {
                self.blocks[idx].predecessors.retain(|p| *p != id);
            }
        }
    }

    pub fn get(&self, id: BlockId) -> Result<&BasicBlock> {
        self.index_of
            .get(&id)
            .map(|&idx| &self.blocks[idx])
            .ok_or_else(|| DecompileError::InternalInvariantViolation(format!("unknown block {}", id)))
    }

    pub fn get_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock> {
        let idx = *self
            .index_of
            .get(&id)
            .ok_or_else(|| DecompileError::InternalInvariantViolation(format!("unknown block {}", id)))?;
        Ok(&mut self.blocks[idx])
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Remove a block entirely: drops it from the arena and clears any
    /// edges touching it. Callers are responsible for rewiring around it
    /// first; used by `simplify` once a block has no remaining references.
    pub fn remove_block(&mut self, id: BlockId) {
        self.edges.retain(|e| e.from != id && e.to != id);
        if let Some(idx) = self.index_of.remove(&id) {
            self.blocks.remove(idx);
            for (_, v) in self.index_of.iter_mut() {
                if *v > idx {
                    *v -= 1;
                }
            }
        }
        for b in &mut self.blocks {
            b.successors.retain(|s| *s != id);
            b.predecessors.retain(|p| *p != id);
        }
    }

    pub fn insert_block(&mut self, block: BasicBlock) {
        self.index_of.insert(block.id, self.blocks.len());
        self.blocks.push(block);
    }

    pub fn fresh_block_id(&mut self) -> BlockId {
        self.alloc_synthetic_id()
    }
}
