//! `get_ast` equivalent: build a `serde_json`-backed method/class AST.

use serde_json::{json, Value};

use crate::class::{ClassDecl, MethodDecl};
use crate::structure::{LoopKind, Region, RegionItem};

use super::render::instruction_stmt;
use super::{java_text, render, ClassAst, FieldAst, MethodAst, MethodRenderer, NamingEnv};

pub struct AstBuilder;

impl MethodRenderer for AstBuilder {
    fn render_source(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> String {
        java_text::JavaTextWriter.render_source(method, region, env)
    }

    fn render_ast(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> MethodAst {
        MethodAst {
            // Filled in by `build_class_ast` with the owning class's dotted
            // name; a lone method has no class context of its own.
            triple: (String::new(), method.name.clone(), method.descriptor.clone()),
            flags: method.access_flags.0,
            ret: method.return_type.java_name(),
            params: method.param_types.iter().map(|t| t.java_name()).collect(),
            comments: method_comments(env),
            body: region_to_json(region, env),
        }
    }
}

fn method_comments(env: &NamingEnv) -> Vec<String> {
    env.graph.blocks().flat_map(|b| b.comments.clone()).collect()
}

/// Render a whole class to its AST: each method is rendered independently
/// (one `Region`/`NamingEnv` pair per method, produced by the
/// orchestrator), then stitched together with the class's own header
/// fields and `triple.0` filled in with the owning class's dotted name.
pub fn build_class_ast(class: &ClassDecl, method_asts: Vec<MethodAst>) -> ClassAst {
    let methods = method_asts
        .into_iter()
        .map(|mut ast| {
            ast.triple.0 = class.dotted_name.clone();
            ast
        })
        .collect();
    ClassAst {
        rawname: class.rawname.clone(),
        name: class.dotted_name.clone(),
        super_name: class.super_name.clone(),
        flags: class.access_flags.0,
        is_interface: class.is_interface,
        interfaces: class.interfaces.clone(),
        annotations: Vec::new(),
        fields: class
            .fields
            .iter()
            .map(|f| FieldAst {
                name: f.name.clone(),
                type_name: f.type_descriptor.clone(),
                flags: f.access_flags.0,
                literal: render::render_field_literal(f),
            })
            .collect(),
        methods,
    }
}

fn region_to_json(region: &Region, env: &NamingEnv) -> Value {
    match region {
        Region::Linear(items) => json!({
            "kind": "linear",
            "body": items.iter().map(|item| item_to_json(item, env)).collect::<Vec<_>>(),
        }),
        Region::If { cond, then_branch, else_branch } => json!({
            "kind": "if",
            "cond": java_text::condition_text(*cond, env),
            "then": region_to_json(then_branch, env),
            "else": else_branch.as_ref().map(|r| region_to_json(r, env)),
        }),
        Region::Loop { kind, header, body, .. } => json!({
            "kind": "loop",
            "loop_kind": match kind {
                LoopKind::While => "while",
                LoopKind::DoWhile => "do_while",
                LoopKind::Endless => "endless",
            },
            "header": header.0,
            "body": region_to_json(body, env),
        }),
        Region::Switch { selector, cases, default } => json!({
            "kind": "switch",
            "selector": selector.0,
            "cases": cases.iter().map(|c| json!({
                "keys": c.keys,
                "body": region_to_json(&c.region, env),
            })).collect::<Vec<_>>(),
            "default": region_to_json(default, env),
        }),
        Region::Try { body, handlers } => json!({
            "kind": "try",
            "body": region_to_json(body, env),
            "handlers": handlers.iter().map(|(ty, region)| json!({
                "catch_type": ty,
                "body": region_to_json(region, env),
            })).collect::<Vec<_>>(),
        }),
        Region::Unstructured(blocks) => json!({
            "kind": "unstructured",
            "blocks": blocks.iter().map(|b| b.0).collect::<Vec<_>>(),
        }),
    }
}

fn item_to_json(item: &RegionItem, env: &NamingEnv) -> Value {
    match item {
        RegionItem::Block(id) => json!({
            "kind": "block",
            "id": id.0,
            "statements": block_statements_json(*id, env),
        }),
        RegionItem::Nested(region) => region_to_json(region, env),
    }
}

fn block_statements_json(id: crate::ir::BlockId, env: &NamingEnv) -> Vec<Value> {
    let Ok(block) = env.graph.get(id) else { return Vec::new() };
    block
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(idx, instr)| instruction_stmt(env, id, idx, instr).map(Value::String))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::graph::Graph;
    use crate::ir::{BlockId, ConstValue, ExceptionRange, Instruction, MethodSource, Register, SourceBlock};
    use crate::transforms::VariableEnv;

    struct Source {
        blocks: Vec<SourceBlock>,
    }

    impl MethodSource for Source {
        fn entry_block(&self) -> BlockId {
            BlockId(0)
        }
        fn basic_blocks(&self) -> &[SourceBlock] {
            &self.blocks
        }
        fn params_type(&self) -> &[String] {
            &[]
        }
        fn registers_size(&self) -> u16 {
            1
        }
        fn ins_size(&self) -> u16 {
            0
        }
        fn access_flags(&self) -> crate::ir::AccessFlags {
            crate::ir::AccessFlags(0)
        }
        fn exception_table(&self) -> &[ExceptionRange] {
            &[]
        }
    }

    /// A single linear block's AST body is a JSON object tagging its kind
    /// and carrying one rendered statement per non-`Nop` instruction.
    #[test]
    fn linear_region_renders_to_a_tagged_json_body() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(1) },
                    Instruction::Return { value: Some(Register(0)) },
                ],
            }],
        };
        let config = Config::default();
        let graph = Graph::construct(&source, &config).unwrap();
        let env = VariableEnv::default();
        let naming = NamingEnv::new(&graph, &env);

        let region = Region::Linear(vec![RegionItem::Block(BlockId(0))]);
        let body = region_to_json(&region, &naming);

        assert_eq!(body["kind"], "linear");
        let statements = body["body"][0]["statements"].as_array().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].as_str().unwrap().starts_with("return"));
    }
}
