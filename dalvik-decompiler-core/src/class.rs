//! Class and container data model.
//!
//! The core's algorithms operate one method at a time; this module is the
//! thin shape above that, grouping methods into classes and classes into a
//! container the way the upstream frontend's class/machine model does. The
//! pipeline that drives these (`ClassDecompiler`, `ContainerDriver`) lives
//! in [`crate::orchestrator`]; this module only holds data.

use std::collections::HashMap;

use crate::ir::{AccessFlags, JavaType, MethodSource};

/// A field initializer's raw stored constant, before the per-`type_descriptor`
/// decoding table is applied. One `Integer` variant covers every integer
/// width (`Z B S C I J`); decoding narrows it correctly (e.g. two's-complement
/// sign extension for `B`) using the low bits actually stored, the same way
/// the upstream tool decodes from a single raw encoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLiteral {
    Integer(i64),
    Float(f32),
    Double(f64),
    Str(String),
    ClassRef(String),
    Null,
}

/// A field declaration.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_descriptor: String,
    pub access_flags: AccessFlags,
    pub literal: Option<FieldLiteral>,
}

/// A method declaration: its signature plus, when present, the upstream
/// code the orchestrator can decompile. `source` is `None` for methods the
/// frontend never attaches code to in the first place (pure prototypes);
/// `source.has_code()` distinguishes native/abstract methods that do have a
/// `MethodSource` value but no instruction stream.
pub struct MethodDecl {
    pub name: String,
    pub descriptor: String,
    pub access_flags: AccessFlags,
    pub return_type: JavaType,
    pub param_types: Vec<JavaType>,
    pub source: Option<Box<dyn MethodSource>>,
}

impl std::fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("access_flags", &self.access_flags)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// A class declaration, the unit `ClassDecompiler` processes.
#[derive(Debug)]
pub struct ClassDecl {
    /// Raw internal name (`Lcom/example/Foo;`).
    pub rawname: String,
    /// Dotted source name (`com.example.Foo`).
    pub dotted_name: String,
    pub package: String,
    pub super_name: Option<String>,
    pub access_flags: AccessFlags,
    pub is_interface: bool,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

impl ClassDecl {
    /// A method's effective access flags: for interfaces, the upstream
    /// frontend redundantly sets `ABSTRACT` on every method even ones with a
    /// default body, so that bit is cleared here rather than rendered.
    /// Preserved as documented behavior, not silently special-cased only in
    /// the Writer, so every consumer of `ClassDecl` sees the same flags.
    pub fn method_access_flags(&self, method: &MethodDecl) -> AccessFlags {
        if self.is_interface {
            method.access_flags.without(AccessFlags::ABSTRACT)
        } else {
            method.access_flags
        }
    }
}

/// A set of class declarations, keyed by dotted name, as handed to a single
/// decompilation run.
#[derive(Debug, Default)]
pub struct Container {
    classes: HashMap<String, ClassDecl>,
}

impl Container {
    pub fn new() -> Container {
        Container { classes: HashMap::new() }
    }

    pub fn insert(&mut self, class: ClassDecl) {
        self.classes.insert(class.dotted_name.clone(), class);
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Substring, first-hit lookup — preserved from the upstream tool's
    /// `get_class`, which walks its class map in insertion order and
    /// returns the first name containing `needle`. `HashMap` iteration
    /// order isn't insertion order, so results for a needle matching
    /// multiple classes are not guaranteed to reproduce the original tool's
    /// choice exactly; callers that need a single class should pass a
    /// needle precise enough to match only one.
    pub fn find_class(&self, needle: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|(name, _)| name.contains(needle)).map(|(_, c)| c)
    }

    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
