//! The CLI's own upstream frontend: a small JSON container format that
//! fills in [`dalvik_decompiler_core::ir::MethodSource`] directly.
//!
//! Parsing an actual `.dex`/`.apk` container (the real Dalvik binary
//! format: constant pool, class/field/method tables, annotation tables)
//! is explicitly out of the core's scope — §1 of the design assumes a
//! parsed method is simply handed in. This module is the thin collaborator
//! that stands in for that frontend for the CLI: a JSON file whose shape
//! mirrors the core's own IR types closely enough that deserializing it
//! *is* building a [`SourceBlock`]/[`ExceptionRange`] list, not translating
//! one.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use dalvik_decompiler_core::class::{ClassDecl, Container, FieldDecl, FieldLiteral, MethodDecl};
use dalvik_decompiler_core::ir::{AccessFlags, BlockId, ExceptionRange, JavaType, MethodSource, SourceBlock};

#[derive(Debug, Deserialize)]
struct ContainerFile {
    classes: Vec<ClassFile>,
}

#[derive(Debug, Deserialize)]
struct ClassFile {
    /// Raw internal name, `Lcom/example/Foo;` form.
    rawname: String,
    #[serde(default)]
    package: String,
    super_name: Option<String>,
    #[serde(default)]
    access_flags: u32,
    #[serde(default)]
    is_interface: bool,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldFile>,
    #[serde(default)]
    methods: Vec<MethodFile>,
}

#[derive(Debug, Deserialize)]
struct FieldFile {
    name: String,
    type_descriptor: String,
    #[serde(default)]
    access_flags: u32,
    #[serde(default)]
    literal: Option<FieldLiteralFile>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
enum FieldLiteralFile {
    Integer(i64),
    Float(f32),
    Double(f64),
    Str(String),
    ClassRef(String),
    Null,
}

impl From<FieldLiteralFile> for FieldLiteral {
    fn from(f: FieldLiteralFile) -> FieldLiteral {
        match f {
            FieldLiteralFile::Integer(v) => FieldLiteral::Integer(v),
            FieldLiteralFile::Float(v) => FieldLiteral::Float(v),
            FieldLiteralFile::Double(v) => FieldLiteral::Double(v),
            FieldLiteralFile::Str(v) => FieldLiteral::Str(v),
            FieldLiteralFile::ClassRef(v) => FieldLiteral::ClassRef(v),
            FieldLiteralFile::Null => FieldLiteral::Null,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MethodFile {
    name: String,
    descriptor: String,
    #[serde(default)]
    access_flags: u32,
    return_type: String,
    #[serde(default)]
    param_types: Vec<String>,
    #[serde(default)]
    registers_size: u16,
    #[serde(default)]
    ins_size: u16,
    #[serde(default)]
    entry_block: u32,
    #[serde(default)]
    blocks: Vec<SourceBlock>,
    #[serde(default)]
    exceptions: Vec<ExceptionRange>,
}

/// The `MethodSource` implementation backing a method parsed from the
/// JSON container: the deserialized fields already match the trait's
/// shape one-for-one, so this is pure storage plus the trait's accessors.
struct JsonMethodSource {
    entry_block: BlockId,
    blocks: Vec<SourceBlock>,
    params_type: Vec<String>,
    registers_size: u16,
    ins_size: u16,
    access_flags: AccessFlags,
    exception_table: Vec<ExceptionRange>,
}

impl MethodSource for JsonMethodSource {
    fn entry_block(&self) -> BlockId {
        self.entry_block
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
        &self.exception_table
    }
}

/// `Lcom/example/Foo;` → `com.example.Foo`.
fn dotted_from_raw(rawname: &str) -> String {
    rawname
        .trim_start_matches('L')
        .trim_end_matches(';')
        .replace('/', ".")
}

fn build_method(file: MethodFile) -> MethodDecl {
    let access_flags = AccessFlags(file.access_flags);
    let has_blocks = !file.blocks.is_empty();
    let source: Option<Box<dyn MethodSource>> = if has_blocks {
        Some(Box::new(JsonMethodSource {
            entry_block: BlockId(file.entry_block),
            blocks: file.blocks,
            params_type: file.param_types.clone(),
            registers_size: file.registers_size,
            ins_size: file.ins_size,
            access_flags,
            exception_table: file.exceptions,
        }))
    } else {
        None
    };
    MethodDecl {
        name: file.name,
        descriptor: file.descriptor,
        access_flags,
        return_type: JavaType::parse_descriptor(&file.return_type),
        param_types: file.param_types.iter().map(|d| JavaType::parse_descriptor(d)).collect(),
        source,
    }
}

fn build_class(file: ClassFile) -> ClassDecl {
    let dotted_name = dotted_from_raw(&file.rawname);
    ClassDecl {
        rawname: file.rawname,
        dotted_name,
        package: file.package,
        super_name: file.super_name.map(|s| dotted_from_raw(&s)),
        access_flags: AccessFlags(file.access_flags),
        is_interface: file.is_interface,
        interfaces: file.interfaces.iter().map(|s| dotted_from_raw(s)).collect(),
        fields: file
            .fields
            .into_iter()
            .map(|f| FieldDecl {
                name: f.name,
                type_descriptor: f.type_descriptor,
                access_flags: AccessFlags(f.access_flags),
                literal: f.literal.map(FieldLiteral::from),
            })
            .collect(),
        methods: file.methods.into_iter().map(build_method).collect(),
    }
}

/// Load a container from a JSON file at `path`, matching §6.3's "accepts a
/// container path" CLI contract.
pub fn load_container(path: &Path) -> Result<Container> {
    let file = File::open(path)
        .with_context(|| format!("failed to open container file {}", path.display()))?;
    let parsed: ContainerFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse container file {}", path.display()))?;

    let mut container = Container::new();
    for class_file in parsed.classes {
        container.insert(build_class(class_file));
    }
    Ok(container)
}
