//! Error types for the decompilation core.
//!
//! One enum covers every failure mode the pipeline can report. Variants map
//! directly onto the four error kinds the orchestrator distinguishes:
//! malformed input, unstructurable regions, type-resolution ambiguity, and
//! internal invariant violations.

use thiserror::Error;

/// Errors produced by the decompilation core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompileError {
    /// The upstream frontend handed us a CFG that does not parse: a branch
    /// target outside the method, a missing entry block, or code missing
    /// for a method that should have it.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The structurer could not reduce a region to while/if/switch/try
    /// form even after bounded node-splitting. Not fatal: the region is
    /// rendered with synthetic labels instead.
    #[error("unstructurable region at block {0}: {1}")]
    UnstructurableRegion(u32, String),

    /// Type unification failed to produce a single type for a variable.
    /// Not fatal: the variable falls back to `Object`/widest primitive.
    #[error("type resolution ambiguity for variable {0}: {1}")]
    TypeResolutionAmbiguity(String, String),

    /// An internal invariant (reaching-def non-emptiness, dominance,
    /// simplify fixpoint, …) failed. The method is skipped.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// Recursion bound exceeded in a work-stack-driven pass.
    #[error("recursion depth exceeded (limit {0}) in {1}")]
    RecursionLimitExceeded(usize, String),
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, DecompileError>;

impl DecompileError {
    /// True for the error kinds the orchestrator treats as best-effort
    /// (log and continue with degraded output) rather than fatal for the
    /// method.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecompileError::UnstructurableRegion(_, _)
                | DecompileError::TypeResolutionAmbiguity(_, _)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstructurable_region_and_type_ambiguity_are_recoverable() {
        assert!(DecompileError::UnstructurableRegion(0, "x".into()).is_recoverable());
        assert!(DecompileError::TypeResolutionAmbiguity("v0".into(), "x".into()).is_recoverable());
    }

    #[test]
    fn malformed_input_and_invariant_violations_are_fatal() {
        assert!(!DecompileError::MalformedInput("x".into()).is_recoverable());
        assert!(!DecompileError::InternalInvariantViolation("x".into()).is_recoverable());
        assert!(!DecompileError::RecursionLimitExceeded(10, "x".into()).is_recoverable());
    }
}
