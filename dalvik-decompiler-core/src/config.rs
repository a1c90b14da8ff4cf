//! Pipeline configuration.
//!
//! Plain data, threaded explicitly through the pass context rather than
//! read from globals or thread-locals. Deserializable so a CLI flag or a
//! config file can override the defaults.

use serde::{Deserialize, Serialize};

/// Knobs for the decompilation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Bound on explicit work-stack depth for dominator walks, structuring,
    /// and declaration placement. Exceeding this is an
    /// `InternalInvariantViolation`, not a panic.
    pub max_recursion_depth: usize,

    /// Bound on structurer node-splitting attempts for a single irreducible
    /// region before it is rendered `Unstructured`.
    pub max_node_split_fanout: usize,

    /// When true, every `invoke` instruction is treated as side-effecting
    /// for dead-code elimination regardless of the callee. This is
    /// currently the only supported mode: whole-program side-effect
    /// analysis is out of scope.
    pub conservative_side_effects: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_recursion_depth: 4096,
            max_node_split_fanout: 32,
            conservative_side_effects: true,
        }
    }
}
