//! Dalvik-to-Java method decompilation core.
//!
//! Given a parsed Dalvik method — a basic-block graph of typed,
//! register-based instructions plus exception-handler metadata, provided
//! by an upstream frontend via [`ir::MethodSource`] — this crate
//! reconstructs structured, readable Java-like source (or an equivalent
//! AST) for the method body, then assembles methods into a class
//! rendering.
//!
//! The pipeline, leaves first:
//!
//! - [`ir`]: typed instructions, registers, basic blocks, the upstream
//!   method contract.
//! - [`graph`]: the CFG — construction, reverse-postorder numbering,
//!   dominators, simplification.
//! - [`defuse`]: def-use / use-def maps from reaching-definitions
//!   dataflow.
//! - [`transforms`]: variable splitting, dead-code elimination,
//!   propagation, type resolution, declaration placement.
//! - [`structure`]: loop/conditional/switch/try region recovery from the
//!   simplified CFG via dominator analysis.
//! - [`orchestrator`]: drives the above in the fixed per-method order,
//!   plus per-class/per-container failure isolation.
//! - [`writer`]: the `Writer` boundary — turns a structured region tree
//!   into Java-like text or a serializable AST.
//!
//! [`class`] holds the thin class/container data model the orchestrator
//! operates over; [`config`] carries the pipeline's tunable knobs;
//! [`error`] defines the four error kinds named in the design's error
//! handling policy.

pub mod class;
pub mod config;
pub mod defuse;
pub mod error;
pub mod graph;
pub mod ir;
pub mod orchestrator;
pub mod structure;
pub mod transforms;
pub mod writer;

pub use config::Config;
pub use error::{DecompileError, Result};
pub use orchestrator::{
    decompile_method, ClassDecompiler, ClassResult, ContainerDriver, MethodContext, MethodOutcome,
    MethodPipeline, MethodRenderResult, MethodResult,
};
