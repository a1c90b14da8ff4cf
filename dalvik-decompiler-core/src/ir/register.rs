//! Registers and Java-level types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Dalvik register, identified by a small non-negative integer.
///
/// Method parameters occupy the last `ins_size` registers of the frame; if
/// the method is non-static, the first parameter slot holds `this`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Register(pub u16);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A primitive Java type, at the width Dalvik tracks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Primitive {
    Boolean = 0,
    Byte = 1,
    Short = 2,
    Char = 3,
    Int = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    Void = 8,
}

impl Primitive {
    /// Parse a Dalvik primitive descriptor character (`B S C I J F D Z V`).
    pub fn from_descriptor_char(c: char) -> Option<Primitive> {
        match c {
            'Z' => Some(Primitive::Boolean),
            'B' => Some(Primitive::Byte),
            'S' => Some(Primitive::Short),
            'C' => Some(Primitive::Char),
            'I' => Some(Primitive::Int),
            'J' => Some(Primitive::Long),
            'F' => Some(Primitive::Float),
            'D' => Some(Primitive::Double),
            'V' => Some(Primitive::Void),
            _ => None,
        }
    }

    /// Java source spelling of this primitive type.
    pub fn java_name(&self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Char => "char",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    /// Storage width class, widest-wins ordering used by type unification.
    pub fn width_rank(&self) -> u8 {
        match self {
            Primitive::Boolean => 0,
            Primitive::Byte => 1,
            Primitive::Char => 2,
            Primitive::Short => 2,
            Primitive::Int => 3,
            Primitive::Float => 4,
            Primitive::Long => 5,
            Primitive::Double => 6,
            Primitive::Void => 0,
        }
    }
}

/// A Java type in Dalvik descriptor form: a primitive, a reference type
/// (`Lpkg/Name;`), or an array of some element type (`[T`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JavaType {
    Primitive(Primitive),
    /// Fully-qualified reference type, stored as the dotted Java name
    /// (`java.lang.String`), not the raw descriptor.
    Reference(String),
    Array(Box<JavaType>),
    /// Type could not be resolved; last-resort fallback per the type
    /// resolution transform.
    Unknown,
}

impl JavaType {
    pub const OBJECT: &'static str = "java.lang.Object";

    /// Parse a single Dalvik type descriptor (`I`, `Ljava/lang/String;`,
    /// `[I`, `[[Ljava/lang/Object;`, …).
    pub fn parse_descriptor(descriptor: &str) -> JavaType {
        let mut chars = descriptor.chars().peekable();
        Self::parse_descriptor_chars(&mut chars)
    }

    fn parse_descriptor_chars(chars: &mut std::iter::Peekable<std::str::Chars>) -> JavaType {
        match chars.next() {
            Some('[') => JavaType::Array(Box::new(Self::parse_descriptor_chars(chars))),
            Some('L') => {
                let rest: String = chars.by_ref().take_while(|&c| c != ';').collect();
                JavaType::Reference(rest.replace('/', "."))
            }
            Some(c) => Primitive::from_descriptor_char(c)
                .map(JavaType::Primitive)
                .unwrap_or(JavaType::Unknown),
            None => JavaType::Unknown,
        }
    }

    /// Java source spelling, used by the Writer.
    pub fn java_name(&self) -> String {
        match self {
            JavaType::Primitive(p) => p.java_name().to_string(),
            JavaType::Reference(name) => name.clone(),
            JavaType::Array(elem) => format!("{}[]", elem.java_name()),
            JavaType::Unknown => Self::OBJECT.to_string(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Reference(_) | JavaType::Array(_))
    }
}
