//! Shared rendering helpers used by both `JavaTextWriter` and `AstBuilder`:
//! turning one instruction into its Java source spelling, and the
//! field-literal / annotation decoding rules.

use crate::class::{FieldDecl, FieldLiteral};
use crate::defuse::{DefSite, UseSite};
use crate::ir::{ArithOp, BlockId, ConstValue, Instruction, InvokeKind, Operand};

use super::NamingEnv;

/// Render one register read at `(block, index)` to its variable name.
pub(crate) fn read_name(env: &NamingEnv, reg: crate::ir::Register, block: BlockId, index: usize) -> String {
    let site = UseSite { register: reg, block, index };
    match env.var_for_use(site) {
        Some(id) => env.name_of(id),
        None => format!("v{}", reg.0),
    }
}

/// Render the register written at `(block, index)` to its variable name.
fn write_name(env: &NamingEnv, reg: crate::ir::Register, block: BlockId, index: usize) -> String {
    let site = DefSite { register: reg, block, index };
    match env.var_for_def(site) {
        Some(id) => env.name_of(id),
        None => format!("v{}", reg.0),
    }
}

fn operand_text(env: &NamingEnv, op: &Operand, block: BlockId, index: usize) -> String {
    match op {
        Operand::Register(r) => read_name(env, *r, block, index),
        Operand::Immediate(n) => n.to_string(),
    }
}

/// Java source spelling of a resolved constant.
pub fn const_literal(value: &ConstValue) -> String {
    match value {
        ConstValue::Int(i) => i.to_string(),
        ConstValue::Long(l) => format!("{l}L"),
        ConstValue::Float(f) => format!("{f}f"),
        ConstValue::Double(d) => {
            if d.fract() == 0.0 {
                format!("{d}.0")
            } else {
                d.to_string()
            }
        }
        ConstValue::String(s) => format!("\"{}\"", escape_java_string(s)),
        ConstValue::Class(c) => format!("{c}.class"),
        ConstValue::Null => "null".to_string(),
    }
}

fn escape_java_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn invoke_prefix(kind: InvokeKind) -> &'static str {
    match kind {
        InvokeKind::Super => "super.",
        _ => "",
    }
}

/// Render one instruction to its Java statement text, without a trailing
/// semicolon. Returns `None` for instructions that carry no standalone
/// statement of their own (branch/terminator instructions, whose control
/// flow is already expressed by the enclosing `Region` shape; `Nop`).
pub fn instruction_stmt(env: &NamingEnv, block: BlockId, index: usize, instr: &Instruction) -> Option<String> {
    let text = match instr {
        Instruction::Move { dst, src } => {
            format!("{} = {}", write_name(env, *dst, block, index), read_name(env, *src, block, index))
        }
        Instruction::ConstLoad { dst, value } => {
            format!("{} = {}", write_name(env, *dst, block, index), const_literal(value))
        }
        Instruction::Arithmetic { op, dst, lhs, rhs } => {
            if *op == ArithOp::Neg {
                format!("{} = -{}", write_name(env, *dst, block, index), read_name(env, *lhs, block, index))
            } else {
                format!(
                    "{} = {} {} {}",
                    write_name(env, *dst, block, index),
                    read_name(env, *lhs, block, index),
                    op.java_symbol(),
                    operand_text(env, rhs, block, index)
                )
            }
        }
        Instruction::Compare { op, dst, lhs, rhs } => format!(
            "{} = ({} {} {}) ? 1 : 0",
            write_name(env, *dst, block, index),
            read_name(env, *lhs, block, index),
            op.java_symbol(),
            read_name(env, *rhs, block, index)
        ),
        Instruction::Goto { .. } | Instruction::ConditionalBranch { .. } | Instruction::Switch { .. } => return None,
        Instruction::Invoke { kind, method, receiver, args, dst } => {
            let call_args: Vec<String> = args.iter().map(|r| read_name(env, *r, block, index)).collect();
            let callee = match receiver {
                Some(r) => format!("{}{}", invoke_prefix(*kind), read_name(env, *r, block, index)),
                None => method.owner.clone(),
            };
            let call = format!("{}.{}({})", callee, method.name, call_args.join(", "));
            match dst {
                Some(d) => format!("{} = {}", write_name(env, *d, block, index), call),
                None => call,
            }
        }
        Instruction::FieldGet { dst, object, field } => {
            let owner = match object {
                Some(r) => read_name(env, *r, block, index),
                None => field.owner.clone(),
            };
            format!("{} = {}.{}", write_name(env, *dst, block, index), owner, field.name)
        }
        Instruction::FieldPut { src, object, field } => {
            let owner = match object {
                Some(r) => read_name(env, *r, block, index),
                None => field.owner.clone(),
            };
            format!("{}.{} = {}", owner, field.name, read_name(env, *src, block, index))
        }
        Instruction::ArrayGet { dst, array, index: idx_reg, .. } => format!(
            "{} = {}[{}]",
            write_name(env, *dst, block, index),
            read_name(env, *array, block, index),
            read_name(env, *idx_reg, block, index)
        ),
        Instruction::ArrayPut { src, array, index: idx_reg, .. } => format!(
            "{}[{}] = {}",
            read_name(env, *array, block, index),
            read_name(env, *idx_reg, block, index),
            read_name(env, *src, block, index)
        ),
        Instruction::NewInstance { dst, class } => {
            format!("{} = new {}()", write_name(env, *dst, block, index), class)
        }
        Instruction::NewArray { dst, length, elem_type } => format!(
            "{} = new {}[{}]",
            write_name(env, *dst, block, index),
            elem_type.java_name(),
            read_name(env, *length, block, index)
        ),
        Instruction::CheckCast { reg, target_type } => format!(
            "{} = ({}) {}",
            write_name(env, *reg, block, index),
            target_type.java_name(),
            read_name(env, *reg, block, index)
        ),
        Instruction::MonitorEnter { obj } => format!("synchronized_enter({})", read_name(env, *obj, block, index)),
        Instruction::MonitorExit { obj } => format!("synchronized_exit({})", read_name(env, *obj, block, index)),
        Instruction::Return { value } => match value {
            Some(r) => format!("return {}", read_name(env, *r, block, index)),
            None => "return".to_string(),
        },
        Instruction::Throw { value } => format!("throw {}", read_name(env, *value, block, index)),
        Instruction::Nop => return None,
        Instruction::NewInstanceInit { dst, class, args } => {
            let call_args: Vec<String> = args.iter().map(|r| read_name(env, *r, block, index)).collect();
            format!("{} = new {}({})", write_name(env, *dst, block, index), class, call_args.join(", "))
        }
    };
    Some(text)
}

/// Decode a field's raw literal into its Java source spelling, per the
/// type-keyed decoding table: string/class/primitive widths each have their
/// own rule, with `B` requiring two's-complement sign extension from the
/// stored unsigned byte and `Z` decoding from the semantic stored value
/// rather than a textual comparison.
pub fn render_field_literal(field: &FieldDecl) -> Option<String> {
    let literal = field.literal.as_ref()?;
    let text = match (field.type_descriptor.as_str(), literal) {
        ("Ljava/lang/String;", FieldLiteral::Str(s)) => format!("\"{}\"", escape_java_string(s)),
        ("Ljava/lang/String;", FieldLiteral::Null) => "\"\"".to_string(),
        ("Z", FieldLiteral::Integer(v)) => (*v != 0).to_string(),
        ("B", FieldLiteral::Integer(v)) => ((*v as u8) as i8).to_string(),
        ("S", FieldLiteral::Integer(v)) => (*v as i16).to_string(),
        ("C", FieldLiteral::Integer(v)) => format!("'{}'", char::from_u32(*v as u32).unwrap_or('\0')),
        ("I", FieldLiteral::Integer(v)) => (*v as i32).to_string(),
        ("J", FieldLiteral::Integer(v)) => format!("{v}L"),
        ("F", FieldLiteral::Float(f)) => format!("{f}f"),
        ("D", FieldLiteral::Double(d)) => d.to_string(),
        ("Ljava/lang/Class;", FieldLiteral::ClassRef(c)) => format!("{c}.class"),
        (_, FieldLiteral::Str(s)) => format!("\"{}\"", escape_java_string(s)),
        (_, FieldLiteral::Integer(v)) => v.to_string(),
        (_, FieldLiteral::Float(f)) => f.to_string(),
        (_, FieldLiteral::Double(d)) => d.to_string(),
        (_, FieldLiteral::ClassRef(c)) => c.clone(),
        (_, FieldLiteral::Null) => "null".to_string(),
    };
    Some(text)
}

/// See [`super::zip_annotation_params`].
pub fn zip_annotation_params(names: &[String], values: &[String]) -> Vec<(String, String)> {
    let adjusted;
    let names: &[String] = if values.len() == names.len() + 1 {
        adjusted = std::iter::once(String::new()).chain(names.iter().cloned()).collect::<Vec<_>>();
        &adjusted[..]
    } else {
        names
    };
    names.iter().cloned().zip(values.iter().cloned()).collect()
}
