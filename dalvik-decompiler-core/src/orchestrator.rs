//! The per-method, per-class, and per-container drivers.
//!
//! This is the fixed 8-step pipeline of the method core: build the CFG,
//! run the dataflow transforms, place declarations, simplify the graph,
//! recover structure, and hand the result to a `Writer`. Exposed two ways,
//! mirroring the dual monolithic/staged shape elsewhere in this project's
//! lineage: [`decompile_method`] runs the whole thing in one call, while
//! [`MethodPipeline`]'s `stage_*` methods let a caller observe or
//! short-circuit at a stage boundary. The stage order itself is never
//! reorderable by a caller either way.
//!
//! Failure isolation follows the documented policy: a per-method failure
//! is caught here and the method is emitted as a stub while its siblings
//! keep going; a per-class failure (missing metadata) skips the class; a
//! container-level failure aborts the run. That boundary is `anyhow` at
//! the class/container layer so log context (which method, which class)
//! can be attached without the pure algorithms beneath taking a dynamic
//! error-context dependency.

use std::collections::HashMap;

use log::warn;

use crate::class::{ClassDecl, MethodDecl};
use crate::config::Config;
use crate::defuse::{self, DefUseMap, UseDefMap};
use crate::error::{DecompileError, Result};
use crate::graph::Graph;
use crate::ir::{BlockId, JavaType, MethodSource, Register};
use crate::structure::{self, Region};
use crate::transforms::{self, VariableEnv};
use crate::writer::{self, MethodAst, MethodRenderer, NamingEnv};

/// Everything a completed method pipeline run produced, bundled so a
/// caller (or a later stage) can hand it straight to a `Writer` without
/// re-deriving the dominator tree or the variable environment.
pub struct MethodContext {
    pub graph: Graph,
    pub env: VariableEnv,
    pub use_defs: UseDefMap,
    pub def_uses: DefUseMap,
    pub idom: HashMap<BlockId, BlockId>,
}

/// The structured result of decompiling one method with code.
pub struct MethodResult {
    pub region: Region,
    pub context: MethodContext,
    /// Non-fatal issues recorded along the way (type-resolution fallbacks,
    /// unstructurable sub-regions) — the method still decompiled, but the
    /// Writer should surface these as comments.
    pub warnings: Vec<DecompileError>,
}

/// What happened when a single method went through the pipeline.
pub enum MethodOutcome {
    /// The method has no instruction stream (native or abstract):
    /// rendered as a prototype with an empty body, per §4.6 step 1.
    Empty,
    /// The full pipeline ran to completion.
    Decompiled(MethodResult),
}

/// The parameter environment a method pipeline run needs: each parameter
/// register (the last `ins_size` registers of the frame, `this` first for
/// non-static methods) paired with its declared Java type.
fn parameter_env(source: &dyn MethodSource, method: &MethodDecl, class_name: &str) -> Vec<(Register, JavaType)> {
    let regs = source.parameter_registers();
    let mut types = Vec::with_capacity(regs.len());
    let mut declared = method.param_types.iter();
    for (i, reg) in regs.iter().enumerate() {
        let ty = if i == 0 && !source.is_static() {
            JavaType::Reference(class_name.to_string())
        } else {
            declared.next().cloned().unwrap_or(JavaType::Unknown)
        };
        types.push((*reg, ty));
    }
    types
}

/// Drives one method's pipeline, stage by stage. A fresh `MethodPipeline`
/// is built per method; nothing here is shared across methods, matching
/// the concurrency model's "disjoint graph/def-use/env per method"
/// requirement.
pub struct MethodPipeline<'a> {
    config: &'a Config,
    param_regs: Vec<Register>,
    param_types: Vec<(Register, JavaType)>,
}

impl<'a> MethodPipeline<'a> {
    pub fn new(source: &dyn MethodSource, method: &MethodDecl, class_name: &str, config: &'a Config) -> MethodPipeline<'a> {
        MethodPipeline {
            config,
            param_regs: source.parameter_registers(),
            param_types: parameter_env(source, method, class_name),
        }
    }

    /// Step 2: build the CFG and its initial reverse-postorder/dominator
    /// tree. The dominator tree computed here is the one declaration
    /// placement uses (step 5); structuring recomputes its own after
    /// simplification (step 6-7), since simplification changes block
    /// identity.
    pub fn stage_build_cfg(&self, source: &dyn MethodSource) -> Result<(Graph, HashMap<BlockId, BlockId>)> {
        let mut graph = Graph::construct(source, self.config)?;
        graph.compute_rpo(self.config)?;
        let idom = graph.immediate_dominators()?;
        Ok((graph, idom))
    }

    /// Step 3: def/use construction followed by the fixed dataflow
    /// transform order (`split_variables`, `dead_code_elimination`,
    /// `register_propagation`, `resolve_variables_type`,
    /// `new_instance_propagation`). Step 4 (registering any temporaries a
    /// transform introduces) is folded in here since today's
    /// `new_instance_propagation` never introduces one — see that
    /// module's doc comment — but the call site is kept so a future
    /// temporary-introducing transform has a natural home.
    pub fn stage_analyze(
        &self,
        graph: &mut Graph,
    ) -> Result<(UseDefMap, DefUseMap, VariableEnv, Vec<DecompileError>)> {
        let (use_defs, mut def_uses) = defuse::build_def_use(graph, &self.param_regs, self.config)?;

        let mut env = VariableEnv::default();
        transforms::split_variables(&use_defs, &def_uses, &mut env);
        transforms::dead_code_elimination(graph, &use_defs, &mut def_uses, self.config);
        transforms::register_propagation(graph, &use_defs, &def_uses);
        let warnings = transforms::resolve_variables_type(graph, &mut env, &self.param_types);
        transforms::new_instance_propagation(graph, &mut env);

        Ok((use_defs, def_uses, env, warnings))
    }

    /// Step 5: place each variable's declaration at the lowest block in
    /// the dominator tree dominating all its uses.
    pub fn stage_place_declarations(&self, graph: &Graph, idom: &HashMap<BlockId, BlockId>, env: &mut VariableEnv) {
        transforms::place_declarations(graph, idom, env);
    }

    /// Step 6: split any conditional block that still carries body
    /// statements, coalesce/delete to a fixpoint, then recompute RPO
    /// (simplification changes block identity, so the RPO/dominator tree
    /// from `stage_build_cfg` is stale past this point).
    pub fn stage_simplify(&self, graph: &mut Graph) -> Result<HashMap<BlockId, BlockId>> {
        graph.split_if_nodes()?;
        graph.simplify(self.config)?;
        graph.compute_rpo(self.config)?;
        graph.immediate_dominators()
    }

    /// Step 7: recover the structured region tree from the simplified
    /// graph and its freshly recomputed dominator tree.
    pub fn stage_structure(&self, graph: &Graph, idom: &HashMap<BlockId, BlockId>) -> Result<Region> {
        structure::identify_structures(graph, idom, self.config)
    }

    /// Run every stage in the fixed order and return the bundled result.
    /// Mirrors the original tool's monolithic `DvMethod.process()` entry
    /// point; callers that want to inspect or short-circuit mid-pipeline
    /// should call the `stage_*` methods directly instead.
    pub fn run(&self, source: &dyn MethodSource) -> Result<MethodResult> {
        let (mut graph, idom) = self.stage_build_cfg(source)?;
        let (use_defs, def_uses, mut env, warnings) = self.stage_analyze(&mut graph)?;
        self.stage_place_declarations(&graph, &idom, &mut env);
        let idom = self.stage_simplify(&mut graph)?;
        let region = self.stage_structure(&graph, &idom)?;

        Ok(MethodResult {
            region,
            context: MethodContext { graph, env, use_defs, def_uses, idom },
            warnings,
        })
    }
}

/// Decompile one method: §4.6 step 1 (native/abstract short-circuit) plus
/// the full pipeline otherwise. This is the single entry point a
/// `ClassDecompiler` calls per method; it does not catch errors itself —
/// that isolation happens one level up, at `ClassDecompiler::process`,
/// which is where the "skip this method, log a warning, keep going"
/// policy is actually implemented.
pub fn decompile_method(
    source: &dyn MethodSource,
    method: &MethodDecl,
    class_name: &str,
    config: &Config,
) -> Result<MethodOutcome> {
    if !source.has_code() {
        return Ok(MethodOutcome::Empty);
    }
    let pipeline = MethodPipeline::new(source, method, class_name, config);
    pipeline.run(source).map(MethodOutcome::Decompiled)
}

/// One method's rendered output, plus whatever went wrong producing it.
pub struct MethodRenderResult {
    pub name: String,
    pub descriptor: String,
    pub source_text: String,
    pub ast: MethodAst,
    /// Non-empty only when this method was emitted as a stub after an
    /// internal failure, or carries `resolve_variables_type`/structurer
    /// fallback warnings.
    pub warnings: Vec<DecompileError>,
}

/// One class's rendered output: every method's result, in declaration
/// order, with per-method failures already isolated (a failed method
/// shows up here as a stub, not as a missing entry).
pub struct ClassResult {
    pub class_name: String,
    pub methods: Vec<MethodRenderResult>,
}

/// Drives `decompile_method` across every method of a class, isolating
/// per-method failures per §7: `InternalInvariantViolation` and
/// `MalformedInput` (anything `decompile_method` propagates as `Err`) are
/// logged and the method is rendered as a stub instead of aborting the
/// class. `UnstructurableRegion` and `TypeResolutionAmbiguity` never reach
/// here as `Err` — they are recoverable outcomes the structurer and type
/// resolver already degrade gracefully from, surfaced instead as
/// `warnings` on a successful `MethodRenderResult`.
pub struct ClassDecompiler<'a> {
    config: &'a Config,
    renderer: &'a dyn MethodRenderer,
}

impl<'a> ClassDecompiler<'a> {
    pub fn new(renderer: &'a dyn MethodRenderer, config: &'a Config) -> ClassDecompiler<'a> {
        ClassDecompiler { config, renderer }
    }

    pub fn process(&self, class: &ClassDecl) -> ClassResult {
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(self.process_method(class, method));
        }
        ClassResult { class_name: class.dotted_name.clone(), methods }
    }

    /// Decompile and render a single method, isolating its own failure.
    /// `process` calls this per method; exposed directly too so a caller
    /// (e.g. the CLI's single-method view) can render just one method of
    /// a class without re-running every sibling.
    pub fn process_method(&self, class: &ClassDecl, method: &MethodDecl) -> MethodRenderResult {
        let Some(source) = method.source.as_deref() else {
            return stub_result(class, method, None);
        };

        match decompile_method(source, method, &class.dotted_name, self.config) {
            Ok(MethodOutcome::Empty) => stub_result(class, method, None),
            Ok(MethodOutcome::Decompiled(result)) => {
                let env = NamingEnv::new(&result.context.graph, &result.context.env);
                let source_text = self.renderer.render_source(method, &result.region, &env);
                let mut ast = self.renderer.render_ast(method, &result.region, &env);
                ast.comments.extend(result.warnings.iter().map(|w| w.to_string()));
                MethodRenderResult {
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                    source_text,
                    ast,
                    warnings: result.warnings,
                }
            }
            Err(err) => {
                warn!(
                    "skipping {}.{}{}: {err}",
                    class.dotted_name, method.name, method.descriptor
                );
                stub_result(class, method, Some(err))
            }
        }
    }
}

/// A method rendered as an empty-body stub: used for native/abstract
/// methods (no code to begin with) and for methods that failed the
/// pipeline (§7's "skip with a logged warning" policy). Both cases render
/// identically from the Writer's point of view — a prototype with no
/// statements — the only difference is whether `warnings` explains why.
fn stub_result(class: &ClassDecl, method: &MethodDecl, failure: Option<DecompileError>) -> MethodRenderResult {
    let warnings = failure.into_iter().collect();
    MethodRenderResult {
        name: method.name.clone(),
        descriptor: method.descriptor.clone(),
        source_text: writer::render_stub_source(method),
        ast: writer::render_stub_ast(class, method),
        warnings,
    }
}

/// Drives `ClassDecompiler::process` across every class of a container,
/// isolating per-class failures: a class this function's caller could not
/// even look up is skipped with a warning rather than aborting the whole
/// run. `Container` itself never holds a malformed class (every `insert`
/// is a well-formed `ClassDecl`), so this driver's isolation boundary is
/// really about the upstream lookup step a CLI performs before handing a
/// class in here; it is kept as a loop over owned `ClassDecl`s so a
/// container-level caller has one place to add that lookup without
/// touching `ClassDecompiler`.
pub struct ContainerDriver<'a> {
    config: &'a Config,
    renderer: &'a dyn MethodRenderer,
}

impl<'a> ContainerDriver<'a> {
    pub fn new(renderer: &'a dyn MethodRenderer, config: &'a Config) -> ContainerDriver<'a> {
        ContainerDriver { config, renderer }
    }

    pub fn process_all(&self, container: &crate::class::Container) -> Vec<ClassResult> {
        let decompiler = ClassDecompiler::new(self.renderer, self.config);
        container.classes().map(|class| decompiler.process(class)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        AccessFlags, ArithOp, CompareOp, ConstValue, ExceptionRange, Instruction, JavaType, Operand, Register,
        SourceBlock,
    };
    use crate::writer::JavaTextWriter;

    struct TestSource {
        entry: BlockId,
        blocks: Vec<SourceBlock>,
        params_type: Vec<String>,
        registers_size: u16,
        ins_size: u16,
        access_flags: AccessFlags,
        exceptions: Vec<ExceptionRange>,
    }

    impl MethodSource for TestSource {
        fn entry_block(&self) -> BlockId {
            self.entry
        }
        fn basic_blocks(&self) -> &[SourceBlock] {
            &self.blocks
        }
        fn params_type(&self) -> &[String] {
            &self.params_type
        }
        fn registers_size(&self) -> u16 {
            self.registers_size
        }
        fn ins_size(&self) -> u16 {
            self.ins_size
        }
        fn access_flags(&self) -> AccessFlags {
            self.access_flags
        }
        fn exception_table(&self) -> &[ExceptionRange] {
            &self.exceptions
        }
    }

    fn method_decl(name: &str, access_flags: u32, ret: JavaType, params: Vec<JavaType>, source: Option<TestSource>) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            descriptor: "()V".to_string(),
            access_flags: AccessFlags(access_flags),
            return_type: ret,
            param_types: params,
            source: source.map(|s| Box::new(s) as Box<dyn MethodSource>),
        }
    }

    fn test_class(methods: Vec<MethodDecl>) -> ClassDecl {
        ClassDecl {
            rawname: "LTest;".to_string(),
            dotted_name: "Test".to_string(),
            package: String::new(),
            super_name: Some("java.lang.Object".to_string()),
            access_flags: AccessFlags(AccessFlags::PUBLIC),
            is_interface: false,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods,
        }
    }

    fn run(class: &ClassDecl, method: &MethodDecl) -> MethodRenderResult {
        let writer = JavaTextWriter;
        let config = Config::default();
        let decompiler = ClassDecompiler::new(&writer, &config);
        decompiler.process_method(class, method)
    }

    /// Scenario 1: an empty native method renders as a bare prototype.
    #[test]
    fn native_method_renders_as_stub() {
        let method = method_decl("hook", AccessFlags::NATIVE | AccessFlags::STATIC, JavaType::Primitive(crate::ir::Primitive::Void), vec![], None);
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert_eq!(result.source_text.trim_end(), "static native void hook() {\n}");
        assert!(result.warnings.is_empty());
    }

    /// Scenario 2: `identity(x) { return x; }` round-trips through the whole
    /// pipeline without producing a spurious declaration or dropping the
    /// parameter.
    #[test]
    fn identity_method_returns_its_parameter() {
        let source = TestSource {
            entry: BlockId(0),
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![Instruction::Return { value: Some(Register(1)) }],
            }],
            params_type: vec!["I".to_string()],
            registers_size: 2,
            ins_size: 2,
            access_flags: AccessFlags(0),
            exceptions: vec![],
        };
        let method = method_decl(
            "identity",
            0,
            JavaType::Primitive(crate::ir::Primitive::Int),
            vec![JavaType::Primitive(crate::ir::Primitive::Int)],
            Some(source),
        );
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert!(result.source_text.contains("return"));
        assert!(result.warnings.is_empty());
    }

    /// Scenario 3: an if/else recovers as a single `If` region, not a flat
    /// unstructured block list.
    #[test]
    fn if_else_recovers_as_structured_conditional() {
        let source = TestSource {
            entry: BlockId(0),
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::ConditionalBranch {
                        op: CompareOp::Gt,
                        lhs: Register(0),
                        rhs: Operand::Register(Register(1)),
                        target_true: BlockId(1),
                        target_false: BlockId(2),
                    }],
                },
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Return { value: Some(Register(0)) }] },
                SourceBlock { id: BlockId(2), instructions: vec![Instruction::Return { value: Some(Register(1)) }] },
            ],
            params_type: vec!["I".to_string(), "I".to_string()],
            registers_size: 2,
            ins_size: 2,
            access_flags: AccessFlags(AccessFlags::STATIC),
            exceptions: vec![],
        };
        let method = method_decl(
            "max",
            AccessFlags::STATIC,
            JavaType::Primitive(crate::ir::Primitive::Int),
            vec![JavaType::Primitive(crate::ir::Primitive::Int), JavaType::Primitive(crate::ir::Primitive::Int)],
            Some(source),
        );
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert!(result.source_text.contains("if "));
        assert!(result.source_text.contains("else"));
    }

    /// Scenario 4: a `while`-style counting loop recovers as a `Loop`
    /// region whose body contains the increment, not an unstructured
    /// back-edge.
    #[test]
    fn while_loop_with_counter_recovers_as_loop() {
        // b0 (header): if i < n goto b1 else b2
        // b1 (body): i = i + 1; goto b0
        // b2: return i
        let source = TestSource {
            entry: BlockId(0),
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::ConditionalBranch {
                        op: CompareOp::Lt,
                        lhs: Register(0),
                        rhs: Operand::Register(Register(1)),
                        target_true: BlockId(1),
                        target_false: BlockId(2),
                    }],
                },
                SourceBlock {
                    id: BlockId(1),
                    instructions: vec![
                        Instruction::Arithmetic {
                            op: ArithOp::Add,
                            dst: Register(0),
                            lhs: Register(0),
                            rhs: Operand::Immediate(1),
                        },
                        Instruction::Goto { target: BlockId(0) },
                    ],
                },
                SourceBlock { id: BlockId(2), instructions: vec![Instruction::Return { value: Some(Register(0)) }] },
            ],
            params_type: vec!["I".to_string(), "I".to_string()],
            registers_size: 2,
            ins_size: 2,
            access_flags: AccessFlags(AccessFlags::STATIC),
            exceptions: vec![],
        };
        let method = method_decl(
            "countUpTo",
            AccessFlags::STATIC,
            JavaType::Primitive(crate::ir::Primitive::Int),
            vec![JavaType::Primitive(crate::ir::Primitive::Int), JavaType::Primitive(crate::ir::Primitive::Int)],
            Some(source),
        );
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert!(result.source_text.contains("while"));
    }

    /// Scenario 5: a method whose single instruction is covered by a try
    /// range decompiles to a `Try` region rather than failing.
    #[test]
    fn try_catch_recovers_as_try_region() {
        let source = TestSource {
            entry: BlockId(0),
            blocks: vec![
                SourceBlock {
                    id: BlockId(0),
                    instructions: vec![Instruction::Invoke {
                        kind: crate::ir::InvokeKind::Static,
                        method: crate::ir::MethodRef {
                            owner: "Test".to_string(),
                            name: "risky".to_string(),
                            param_types: vec![],
                            return_type: "V".to_string(),
                        },
                        receiver: None,
                        args: Default::default(),
                        dst: None,
                    }],
                },
                SourceBlock { id: BlockId(1), instructions: vec![Instruction::Return { value: None }] },
            ],
            params_type: vec![],
            registers_size: 1,
            ins_size: 1,
            access_flags: AccessFlags(AccessFlags::STATIC),
            exceptions: vec![ExceptionRange {
                start: BlockId(0),
                end: BlockId(0),
                handlers: vec![(Some("Ljava/lang/Exception;".to_string()), BlockId(1))],
            }],
        };
        let method = method_decl("guarded", AccessFlags::STATIC, JavaType::Primitive(crate::ir::Primitive::Void), vec![], Some(source));
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert!(result.source_text.contains("catch"));
    }

    /// Scenario 6: a signed-byte field literal decodes by its semantic
    /// value, not a naive unsigned cast.
    #[test]
    fn signed_byte_field_literal_decodes_two_s_complement() {
        use crate::class::{FieldDecl, FieldLiteral};
        let field = FieldDecl {
            name: "flag".to_string(),
            type_descriptor: "B".to_string(),
            access_flags: AccessFlags(AccessFlags::PRIVATE),
            literal: Some(FieldLiteral::Integer(-1i64 & 0xFF)),
        };
        let rendered = crate::writer::render_field_literal(&field).unwrap();
        assert_eq!(rendered, "-1");
    }

    #[test]
    fn const_value_is_used_without_warning() {
        // Exercise a second instruction kind beyond Return/Arithmetic/Branch
        // to keep at least one scenario touching ConstLoad.
        let source = TestSource {
            entry: BlockId(0),
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(42) },
                    Instruction::Return { value: Some(Register(0)) },
                ],
            }],
            params_type: vec![],
            registers_size: 1,
            ins_size: 0,
            access_flags: AccessFlags(AccessFlags::STATIC),
            exceptions: vec![],
        };
        let method = method_decl("answer", AccessFlags::STATIC, JavaType::Primitive(crate::ir::Primitive::Int), vec![], Some(source));
        let class = test_class(vec![]);
        let result = run(&class, &method);
        assert!(result.source_text.contains("42"));
    }
}
