//! Writer / AST-builder boundary.
//!
//! The core stops at a structured [`crate::structure::Region`] tree; this
//! module is the thin, swappable adapter that turns that tree plus a
//! variable-naming environment into either Java-like text or a
//! `serde`-serializable AST, mirroring the two output contracts the
//! original tool exposes (`get_source`/`get_source_ext` and `get_ast`).

pub mod ast_builder;
pub mod java_text;
mod render;

use serde::{Deserialize, Serialize};

use crate::class::{ClassDecl, MethodDecl};
use crate::defuse::{DefSite, UseSite};
use crate::graph::Graph;
use crate::ir::JavaType;
use crate::structure::Region;
use crate::transforms::{VarId, VariableEnv};

pub use ast_builder::{build_class_ast, AstBuilder};
pub use java_text::JavaTextWriter;

/// Everything a renderer needs to turn block ids and registers back into
/// named, typed source: the graph the region's block ids index into, and
/// the variable environment naming/typing those blocks' registers.
pub struct NamingEnv<'a> {
    pub graph: &'a Graph,
    pub variables: &'a VariableEnv,
}

impl<'a> NamingEnv<'a> {
    pub fn new(graph: &'a Graph, variables: &'a VariableEnv) -> NamingEnv<'a> {
        NamingEnv { graph, variables }
    }

    pub fn var_for_use(&self, site: UseSite) -> Option<VarId> {
        self.variables.variable_of_use(site)
    }

    pub fn var_for_def(&self, site: DefSite) -> Option<VarId> {
        self.variables.variable_of_def(site)
    }

    pub fn name_of(&self, id: VarId) -> String {
        self.variables
            .variables
            .get(&id)
            .map(|m| m.display_name())
            .unwrap_or_else(|| format!("$v{id}"))
    }

    pub fn type_of(&self, id: VarId) -> JavaType {
        self.variables
            .variables
            .get(&id)
            .map(|m| m.ty.clone())
            .unwrap_or(JavaType::Unknown)
    }
}

/// A method's recovered AST, shaped to match the original tool's `get_ast`
/// contract: typed header fields plus a loosely-structured JSON body — the
/// original itself emits a nested dict tree with no fixed schema, so `body`
/// is `serde_json::Value` rather than a hand-enumerated statement enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodAst {
    /// `(class, name, descriptor)`, matching the original's method triple.
    pub triple: (String, String, String),
    pub flags: u32,
    pub ret: String,
    pub params: Vec<String>,
    pub comments: Vec<String>,
    pub body: serde_json::Value,
}

/// A class's recovered AST: header fields plus each member's `MethodAst`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAst {
    pub rawname: String,
    pub name: String,
    pub super_name: Option<String>,
    pub flags: u32,
    pub is_interface: bool,
    pub interfaces: Vec<String>,
    /// Raw annotation values, passed through opaquely: the core has no
    /// `AnnotationSource` upstream contract to decode these from, only the
    /// parameter-name/value zipping heuristic of [`render::zip_annotation_params`]
    /// for callers that do have raw annotation data to hand it.
    pub annotations: Vec<serde_json::Value>,
    pub fields: Vec<FieldAst>,
    pub methods: Vec<MethodAst>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAst {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub flags: u32,
    pub literal: Option<String>,
}

/// The Writer boundary: one implementation renders Java-like text, another
/// builds the `serde`-serializable AST. Both consume the same `Region` +
/// `NamingEnv` pair so a caller can pick either output without re-running
/// structuring.
pub trait MethodRenderer {
    fn render_source(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> String;
    fn render_ast(&self, method: &MethodDecl, region: &Region, env: &NamingEnv) -> MethodAst;
}

/// Render an entire class's prototype + field header in Java-like text;
/// shared by both writers' class-level framing (`JavaTextWriter` uses it
/// directly, `AstBuilder` mirrors the same field-literal decoding rules
/// when building `FieldAst`).
pub fn render_field_literal(field: &crate::class::FieldDecl) -> Option<String> {
    render::render_field_literal(field)
}

/// Zip an annotation's declared parameter names against its argument
/// values, applying the documented off-by-one heuristic: when `names` is
/// exactly one element short of `values`, an empty-string name is inserted
/// at position 0 before zipping, compensating for an implicit receiver slot
/// some annotation encodings omit. Preserved exactly as observed upstream,
/// not generalized to other length mismatches.
pub fn zip_annotation_params(names: &[String], values: &[String]) -> Vec<(String, String)> {
    render::zip_annotation_params(names, values)
}

/// The Java-like text for a method with no body at all: its prototype
/// followed by an empty block. Used both for methods the upstream
/// frontend never attaches code to (native/abstract) and for methods the
/// orchestrator skipped after an internal failure — both render
/// identically, per end-to-end scenario 1.
pub fn render_stub_source(method: &MethodDecl) -> String {
    format!("{} {{\n}}\n", java_text::prototype(method))
}

/// The AST equivalent of [`render_stub_source`]: same header fields, an
/// empty statement list for `body`.
pub fn render_stub_ast(class: &ClassDecl, method: &MethodDecl) -> MethodAst {
    MethodAst {
        triple: (class.dotted_name.clone(), method.name.clone(), method.descriptor.clone()),
        flags: method.access_flags.0,
        ret: method.return_type.java_name(),
        params: method.param_types.iter().map(|t| t.java_name()).collect(),
        comments: Vec::new(),
        body: serde_json::json!([]),
    }
}

/// Assemble a whole class's Java-like text: optional `package` line, the
/// class header (modifiers, name, `extends`, `implements`), each field
/// declaration, then each method's already-rendered source text, closed
/// with `}`. This is the "thin glue" class-level assembly named out of
/// the core's algorithmic scope — no structuring or dataflow happens
/// here, just string concatenation of parts the rest of the pipeline
/// already produced.
pub fn render_class_source(class: &ClassDecl, method_sources: &[String]) -> String {
    let mut out = String::new();
    if !class.package.is_empty() {
        out.push_str(&format!("package {};\n\n", class.package));
    }

    let mut modifiers = Vec::new();
    if class.access_flags.contains(crate::ir::AccessFlags::PUBLIC) {
        modifiers.push("public");
    }
    if class.access_flags.contains(crate::ir::AccessFlags::FINAL) {
        modifiers.push("final");
    }
    if class.access_flags.contains(crate::ir::AccessFlags::ABSTRACT) && !class.is_interface {
        modifiers.push("abstract");
    }
    let kind = if class.is_interface { "interface" } else { "class" };
    let prefix = if modifiers.is_empty() { String::new() } else { format!("{} ", modifiers.join(" ")) };

    let simple_name = class.dotted_name.rsplit('.').next().unwrap_or(&class.dotted_name);
    out.push_str(&format!("{prefix}{kind} {simple_name}"));
    if let Some(super_name) = &class.super_name {
        if super_name != "java.lang.Object" {
            out.push_str(&format!(" extends {super_name}"));
        }
    }
    if !class.interfaces.is_empty() {
        out.push_str(&format!(" implements {}", class.interfaces.join(", ")));
    }
    out.push_str(" {\n");

    for field in &class.fields {
        out.push_str("    ");
        let mut fmods = Vec::new();
        if field.access_flags.contains(crate::ir::AccessFlags::PUBLIC) {
            fmods.push("public");
        }
        if field.access_flags.contains(crate::ir::AccessFlags::PRIVATE) {
            fmods.push("private");
        }
        if field.access_flags.contains(crate::ir::AccessFlags::PROTECTED) {
            fmods.push("protected");
        }
        if field.access_flags.contains(crate::ir::AccessFlags::STATIC) {
            fmods.push("static");
        }
        if field.access_flags.contains(crate::ir::AccessFlags::FINAL) {
            fmods.push("final");
        }
        if !fmods.is_empty() {
            out.push_str(&fmods.join(" "));
            out.push(' ');
        }
        let ty = JavaType::parse_descriptor(&field.type_descriptor).java_name();
        out.push_str(&format!("{ty} {}", field.name));
        if let Some(literal) = render_field_literal(field) {
            out.push_str(&format!(" = {literal}"));
        }
        out.push_str(";\n");
    }
    if !class.fields.is_empty() && !method_sources.is_empty() {
        out.push('\n');
    }

    for (i, method_source) in method_sources.iter().enumerate() {
        for line in method_source.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        if i + 1 < method_sources.len() {
            out.push('\n');
        }
    }

    out.push_str("}\n");
    out
}
