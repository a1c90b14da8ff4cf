//! Dalvik instructions, abstracted into a tagged variant with inline
//! payload fields.
//!
//! # Design
//! Instructions are dispatched by exhaustive pattern match, not a class
//! hierarchy: the capability set every pass needs (`reads`, `writes`,
//! `side_effects`, `branches`) is computed per-variant in O(1) rather than
//! looked up through a v-table.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::block::BlockId;
use super::register::{JavaType, Register};

/// A decoded constant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// `null` or a string/class literal resolved from the constant pool;
    /// carried as its already-resolved Java source spelling since constant
    /// pool resolution is an upstream concern.
    String(String),
    Class(String),
    Null,
}

/// A reference to a field, already resolved by the upstream frontend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub field_type: DescriptorString,
}

/// A reference to a method, already resolved by the upstream frontend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub param_types: Vec<DescriptorString>,
    pub return_type: DescriptorString,
}

/// A raw Dalvik type descriptor string (`Ljava/lang/String;`, `I`, `[B`).
/// Kept as a newtype rather than an eagerly-parsed `JavaType` so invoke
/// signatures can be compared cheaply before type resolution runs.
pub type DescriptorString = String;

/// Arithmetic operators covering Dalvik's binary-op family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Rem = 4,
    And = 5,
    Or = 6,
    Xor = 7,
    Shl = 8,
    Shr = 9,
    UShr = 10,
    Neg = 11,
}

impl ArithOp {
    /// Integer division/remainder can raise `ArithmeticException` at
    /// runtime and therefore needs an implicit exception edge.
    pub fn can_throw(&self) -> bool {
        matches!(self, ArithOp::Div | ArithOp::Rem)
    }

    pub fn java_symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
            ArithOp::And => "&",
            ArithOp::Or => "|",
            ArithOp::Xor => "^",
            ArithOp::Shl => "<<",
            ArithOp::Shr => ">>",
            ArithOp::UShr => ">>>",
            ArithOp::Neg => "-",
        }
    }
}

/// Comparison operators for conditional branches and `cmp*` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Ge = 3,
    Gt = 4,
    Le = 5,
}

impl CompareOp {
    pub fn negate(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    pub fn java_symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
        }
    }
}

/// Whether an operand is a register or an immediate; many Dalvik opcodes
/// have a `-lit` variant that takes a constant second operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Register(Register),
    Immediate(i32),
}

/// The kind of method dispatch an `invoke` instruction performs. Affects
/// only how the Writer renders the call; the core treats every kind as
/// equally side-effecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InvokeKind {
    Virtual = 0,
    Super = 1,
    Direct = 2,
    Static = 3,
    Interface = 4,
}

/// What a block's terminating instruction does to control flow. Used by
/// `Graph::construct` to decide how to wire outgoing edges; carried
/// separately from the raw `Instruction` so the graph layer does not need
/// to re-match on instruction payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchKind {
    /// Falls through to the block's sole successor; no branch instruction.
    None,
    Goto(BlockId),
    Conditional { if_true: BlockId, if_false: BlockId },
    Switch {
        cases: SmallVec<[(i32, BlockId); 4]>,
        default: BlockId,
    },
    Return,
    Throw,
}

/// A single Dalvik instruction, abstracted to the level this pipeline
/// needs: enough to compute def/use facts and to drive CFG construction.
///
/// Uses `#[repr(u8)]` so the discriminant costs one byte rather than the
/// default enum size, matching the instruction representation this
/// project's IR layer was generalized from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Instruction {
    Move { dst: Register, src: Register } = 0,
    ConstLoad { dst: Register, value: ConstValue } = 1,
    Arithmetic { op: ArithOp, dst: Register, lhs: Register, rhs: Operand } = 2,
    Compare { op: CompareOp, dst: Register, lhs: Register, rhs: Register } = 3,
    Goto { target: BlockId } = 4,
    ConditionalBranch {
        op: CompareOp,
        lhs: Register,
        rhs: Operand,
        target_true: BlockId,
        target_false: BlockId,
    } = 5,
    Switch {
        selector: Register,
        cases: SmallVec<[(i32, BlockId); 4]>,
        default: BlockId,
    } = 6,
    Invoke {
        kind: InvokeKind,
        method: MethodRef,
        receiver: Option<Register>,
        args: SmallVec<[Register; 4]>,
        dst: Option<Register>,
    } = 7,
    FieldGet { dst: Register, object: Option<Register>, field: FieldRef } = 8,
    FieldPut { src: Register, object: Option<Register>, field: FieldRef } = 9,
    ArrayGet { dst: Register, array: Register, index: Register, elem_type: JavaType } = 10,
    ArrayPut { src: Register, array: Register, index: Register, elem_type: JavaType } = 11,
    NewInstance { dst: Register, class: String } = 12,
    NewArray { dst: Register, length: Register, elem_type: JavaType } = 13,
    CheckCast { reg: Register, target_type: JavaType } = 14,
    MonitorEnter { obj: Register } = 15,
    MonitorExit { obj: Register } = 16,
    Return { value: Option<Register> } = 17,
    Throw { value: Register } = 18,
    Nop = 19,
    /// `new-instance` fused with its subsequent `<init>` invocation by
    /// `new_instance_propagation`: `dst = new class(args)`. Dalvik encodes
    /// allocation and construction as two separate instructions; this
    /// variant is never produced by the upstream frontend, only by that
    /// transform.
    NewInstanceInit {
        dst: Register,
        class: String,
        args: SmallVec<[Register; 4]>,
    } = 20,
}

impl Instruction {
    /// Registers read by this instruction, in operand order.
    pub fn reads(&self) -> SmallVec<[Register; 4]> {
        let mut out = SmallVec::new();
        match self {
            Instruction::Move { src, .. } => out.push(*src),
            Instruction::ConstLoad { .. } => {}
            Instruction::Arithmetic { lhs, rhs, .. } => {
                out.push(*lhs);
                if let Operand::Register(r) = rhs {
                    out.push(*r);
                }
            }
            Instruction::Compare { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            Instruction::Goto { .. } => {}
            Instruction::ConditionalBranch { lhs, rhs, .. } => {
                out.push(*lhs);
                if let Operand::Register(r) = rhs {
                    out.push(*r);
                }
            }
            Instruction::Switch { selector, .. } => out.push(*selector),
            Instruction::Invoke { receiver, args, .. } => {
                if let Some(r) = receiver {
                    out.push(*r);
                }
                out.extend(args.iter().copied());
            }
            Instruction::FieldGet { object, .. } => {
                if let Some(r) = object {
                    out.push(*r);
                }
            }
            Instruction::FieldPut { src, object, .. } => {
                out.push(*src);
                if let Some(r) = object {
                    out.push(*r);
                }
            }
            Instruction::ArrayGet { array, index, .. } => {
                out.push(*array);
                out.push(*index);
            }
            Instruction::ArrayPut { src, array, index, .. } => {
                out.push(*src);
                out.push(*array);
                out.push(*index);
            }
            Instruction::NewInstance { .. } => {}
            Instruction::NewArray { length, .. } => out.push(*length),
            Instruction::CheckCast { reg, .. } => out.push(*reg),
            Instruction::MonitorEnter { obj } | Instruction::MonitorExit { obj } => out.push(*obj),
            Instruction::Return { value } => {
                if let Some(r) = value {
                    out.push(*r);
                }
            }
            Instruction::Throw { value } => out.push(*value),
            Instruction::Nop => {}
            Instruction::NewInstanceInit { args, .. } => out.extend(args.iter().copied()),
        }
        out
    }

    /// Register written by this instruction, if any. Dalvik instructions
    /// write at most one destination register.
    pub fn writes(&self) -> Option<Register> {
        match self {
            Instruction::Move { dst, .. }
            | Instruction::ConstLoad { dst, .. }
            | Instruction::Arithmetic { dst, .. }
            | Instruction::Compare { dst, .. }
            | Instruction::FieldGet { dst, .. }
            | Instruction::ArrayGet { dst, .. }
            | Instruction::NewInstance { dst, .. }
            | Instruction::NewArray { dst, .. }
            | Instruction::NewInstanceInit { dst, .. } => Some(*dst),
            Instruction::Invoke { dst, .. } => *dst,
            Instruction::CheckCast { reg, .. } => Some(*reg),
            _ => None,
        }
    }

    /// Whether this instruction has an externally-observable effect beyond
    /// writing its destination register, per the conservative side-effect
    /// classification table dead-code elimination relies on.
    pub fn has_side_effects(&self, conservative: bool) -> bool {
        match self {
            // Any invoke is assumed side-effecting: the callee's body is not
            // visible here to prove otherwise.
            Instruction::Invoke { .. } => true,
            Instruction::FieldPut { .. }
            | Instruction::ArrayPut { .. }
            | Instruction::MonitorEnter { .. }
            | Instruction::MonitorExit { .. }
            | Instruction::Throw { .. }
            | Instruction::Return { .. } => true,
            Instruction::CheckCast { .. } => true, // may throw ClassCastException
            Instruction::NewInstanceInit { .. } => true, // constructor call
            Instruction::Arithmetic { op, .. } => op.can_throw(),
            Instruction::ArrayGet { .. } | Instruction::FieldGet { .. } => false,
            _ => false,
        }
    }

    /// Whether this instruction can raise an exception that a covering
    /// exception range would catch, independent of whether it also has an
    /// observable side effect.
    pub fn can_raise(&self) -> bool {
        matches!(
            self,
            Instruction::Invoke { .. }
                | Instruction::ArrayGet { .. }
                | Instruction::ArrayPut { .. }
                | Instruction::CheckCast { .. }
                | Instruction::MonitorEnter { .. }
                | Instruction::FieldGet { .. }
                | Instruction::FieldPut { .. }
                | Instruction::NewArray { .. }
                | Instruction::Throw { .. }
        ) || matches!(self, Instruction::Arithmetic { op, .. } if op.can_throw())
    }

    /// How this instruction affects control flow at the end of its block.
    /// Returns `BranchKind::None` for non-terminating instructions; callers
    /// only invoke this on a block's tail instruction.
    pub fn branch_kind(&self) -> BranchKind {
        match self {
            Instruction::Goto { target } => BranchKind::Goto(*target),
            Instruction::ConditionalBranch { target_true, target_false, .. } => {
                BranchKind::Conditional { if_true: *target_true, if_false: *target_false }
            }
            Instruction::Switch { cases, default, .. } => {
                BranchKind::Switch { cases: cases.clone(), default: *default }
            }
            Instruction::Return { .. } => BranchKind::Return,
            Instruction::Throw { .. } => BranchKind::Throw,
            _ => BranchKind::None,
        }
    }

    /// True if this instruction terminates its basic block.
    pub fn is_terminator(&self) -> bool {
        !matches!(self.branch_kind(), BranchKind::None)
    }
}
