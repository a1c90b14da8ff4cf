//! Block identifiers and the upstream-provided basic block shape.
//!
//! Blocks are identified by id everywhere past this point; the arena that
//! owns the actual `BasicBlock` values lives on `Graph` (see
//! [`crate::graph`]), not here. This module only defines the id type and
//! the block shape the upstream frontend hands in before `Graph::construct`
//! runs.

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;

/// Identifies a basic block. Blocks are addressed by id rather than by
/// reference everywhere in this crate, which is what lets the CFG contain
/// cycles without any reference cycles in the ownership model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A basic block as handed in by the upstream frontend: already
/// partitioned at branch targets and fall-through points, but not yet
/// wired into a `Graph` (no exception edges, no dominator/RPO numbering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

/// An exception-handler range covering a span of blocks: `(start, end,
/// handlers)`, where `handlers` is tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRange {
    pub start: BlockId,
    pub end: BlockId,
    /// `None` catch type means a catch-all (`catch-all` / `finally`).
    pub handlers: Vec<(Option<String>, BlockId)>,
}

impl ExceptionRange {
    /// True if `block` falls within `[start, end]` by block id ordering.
    /// The upstream frontend numbers blocks in program order, so a
    /// contiguous id range is equivalent to an address range.
    pub fn covers(&self, block: BlockId) -> bool {
        self.start.0 <= block.0 && block.0 <= self.end.0
    }
}
