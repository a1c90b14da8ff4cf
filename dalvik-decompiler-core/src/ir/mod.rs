//! Intermediate representation: typed instructions, registers, basic
//! blocks, and the upstream method contract.
//!
//! This module exposes factories for instructions and a read-only view of
//! a method; instruction-level semantics (registers read/written,
//! side-effecting, branching) are queryable in O(1) via
//! [`instruction::Instruction`]'s inherent methods rather than a v-table.

pub mod block;
pub mod instruction;
pub mod method;
pub mod register;

pub use block::{BlockId, ExceptionRange, SourceBlock};
pub use instruction::{
    ArithOp, BranchKind, CompareOp, ConstValue, DescriptorString, FieldRef, Instruction,
    InvokeKind, MethodRef, Operand,
};
pub use method::{AccessFlags, MethodSource};
pub use register::{JavaType, Primitive, Register};
