//! The control-flow graph: construction, reverse-postorder numbering,
//! dominators, and simplification.

pub mod cfg;
pub mod dominators;
pub mod loops;
pub mod simplify;

pub use cfg::{BasicBlock, BlockKind, Edge, EdgeType, Graph};
