//! Java-like text rendering: `get_source`/`get_source_ext` equivalent.

use crate::class::MethodDecl;
use crate::ir::AccessFlags;
use crate::structure::{LoopKind, Region, RegionItem};

use super::render;
use super::render::instruction_stmt;
use super::{ast_builder, MethodAst, MethodRenderer, NamingEnv};

pub struct JavaTextWriter;

impl MethodRenderer for JavaTextWriter {
    fn render_source(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> String {
        let mut out = String::new();
        out.push_str(&prototype(method));
        out.push_str(" {\n");
        render_region(region, env, 1, &mut out);
        out.push_str("}\n");
        out
    }

    fn render_ast(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> MethodAst {
        ast_builder::AstBuilder.render_ast(method, region, env)
    }
}

pub(crate) fn prototype(method: &MethodDecl) -> String {
    let mut modifiers = Vec::new();
    if method.access_flags.contains(AccessFlags::STATIC) {
        modifiers.push("static");
    }
    if method.access_flags.contains(AccessFlags::NATIVE) {
        modifiers.push("native");
    }
    if method.access_flags.contains(AccessFlags::ABSTRACT) {
        modifiers.push("abstract");
    }
    let params: Vec<String> = method
        .param_types
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} p{i}", t.java_name()))
        .collect();
    let prefix = if modifiers.is_empty() { String::new() } else { format!("{} ", modifiers.join(" ")) };
    format!("{prefix}{} {}({})", method.return_type.java_name(), method.name, params.join(", "))
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

pub(crate) fn render_region(region: &Region, env: &NamingEnv, level: usize, out: &mut String) {
    match region {
        Region::Linear(items) => {
            for item in items {
                render_item(item, env, level, out);
            }
        }
        Region::If { cond, then_branch, else_branch } => {
            render_block_statements(*cond, env, level, out, false);
            indent(level, out);
            out.push_str(&format!("if ({}) {{\n", condition_text(*cond, env)));
            render_region(then_branch, env, level + 1, out);
            indent(level, out);
            out.push_str("}\n");
            if let Some(else_branch) = else_branch {
                indent(level, out);
                out.push_str("else {\n");
                render_region(else_branch, env, level + 1, out);
                indent(level, out);
                out.push_str("}\n");
            }
        }
        Region::Loop { kind, header, body, .. } => match kind {
            LoopKind::While => {
                indent(level, out);
                out.push_str(&format!("while ({}) {{\n", condition_text(*header, env)));
                render_region(body, env, level + 1, out);
                indent(level, out);
                out.push_str("}\n");
            }
            LoopKind::DoWhile => {
                indent(level, out);
                out.push_str("do {\n");
                render_region(body, env, level + 1, out);
                indent(level, out);
                out.push_str(&format!("}} while ({});\n", condition_text(*header, env)));
            }
            LoopKind::Endless => {
                indent(level, out);
                out.push_str("while (true) {\n");
                render_region(body, env, level + 1, out);
                indent(level, out);
                out.push_str("}\n");
            }
        },
        Region::Switch { selector, cases, default } => {
            indent(level, out);
            out.push_str(&format!("switch ({}) {{\n", switch_selector_text(*selector, env)));
            for case in cases {
                for key in &case.keys {
                    indent(level + 1, out);
                    out.push_str(&format!("case {key}:\n"));
                }
                render_region(&case.region, env, level + 2, out);
                indent(level + 2, out);
                out.push_str("break;\n");
            }
            indent(level + 1, out);
            out.push_str("default:\n");
            render_region(default, env, level + 2, out);
            indent(level, out);
            out.push_str("}\n");
        }
        Region::Try { body, handlers } => {
            indent(level, out);
            out.push_str("try {\n");
            render_region(body, env, level + 1, out);
            indent(level, out);
            out.push_str("}\n");
            for (catch_type, handler) in handlers {
                indent(level, out);
                let ty = catch_type.clone().unwrap_or_else(|| "java.lang.Throwable".to_string());
                out.push_str(&format!("catch ({ty} e) {{\n"));
                render_region(handler, env, level + 1, out);
                indent(level, out);
                out.push_str("}\n");
            }
        }
        Region::Unstructured(blocks) => {
            for b in blocks {
                indent(level, out);
                out.push_str(&format!("// unstructured block {b}\n"));
                render_block_statements(*b, env, level, out, true);
            }
        }
    }
}

fn render_item(item: &RegionItem, env: &NamingEnv, level: usize, out: &mut String) {
    match item {
        RegionItem::Block(id) => render_block_statements(*id, env, level, out, false),
        RegionItem::Nested(region) => render_region(region, env, level, out),
    }
}

/// Render a block's non-terminator instructions as statements. When
/// `include_terminator` is true (the `Unstructured` fallback path) the
/// terminator is rendered too, since there is no enclosing `Region` shape
/// left to express its control flow instead.
fn render_block_statements(id: crate::ir::BlockId, env: &NamingEnv, level: usize, out: &mut String, include_terminator: bool) {
    let Ok(block) = env.graph.get(id) else { return };
    let last = block.instructions.len().saturating_sub(1);
    for (idx, instr) in block.instructions.iter().enumerate() {
        if idx == last && instr.is_terminator() && !include_terminator {
            continue;
        }
        if let Some(stmt) = instruction_stmt(env, id, idx, instr) {
            indent(level, out);
            out.push_str(&stmt);
            out.push_str(";\n");
        }
    }
}

/// The boolean expression guarding a conditional block, derived from its
/// terminating `ConditionalBranch`.
pub(crate) fn condition_text(id: crate::ir::BlockId, env: &NamingEnv) -> String {
    let Ok(block) = env.graph.get(id) else { return "true".to_string() };
    match block.terminator() {
        Some(crate::ir::Instruction::ConditionalBranch { op, lhs, rhs, .. }) => {
            let lhs_name = render::read_name(env, *lhs, id, block.instructions.len() - 1);
            let rhs_text = match rhs {
                crate::ir::Operand::Register(r) => {
                    render::read_name(env, *r, id, block.instructions.len() - 1)
                }
                crate::ir::Operand::Immediate(n) => n.to_string(),
            };
            format!("{lhs_name} {} {rhs_text}", op.java_symbol())
        }
        _ => "true".to_string(),
    }
}

fn switch_selector_text(id: crate::ir::BlockId, env: &NamingEnv) -> String {
    let Ok(block) = env.graph.get(id) else { return "0".to_string() };
    match block.terminator() {
        Some(crate::ir::Instruction::Switch { selector, .. }) => {
            render::read_name(env, *selector, id, block.instructions.len() - 1)
        }
        _ => "0".to_string(),
    }
}
