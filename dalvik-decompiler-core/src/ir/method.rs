//! The upstream contract: a read-only view of a parsed Dalvik method.

use serde::{Deserialize, Serialize};

use super::block::{BlockId, ExceptionRange, SourceBlock};
use super::register::Register;

/// Dalvik method access flags this core cares about. Only the bits that
/// change pipeline behavior are named as constants; the rest pass through
/// opaquely to the Writer via the raw bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessFlags(pub u32);

impl AccessFlags {
    pub const PUBLIC: u32 = 0x0001;
    pub const PRIVATE: u32 = 0x0002;
    pub const PROTECTED: u32 = 0x0004;
    pub const STATIC: u32 = 0x0008;
    pub const FINAL: u32 = 0x0010;
    pub const SYNCHRONIZED: u32 = 0x0020;
    pub const NATIVE: u32 = 0x0100;
    pub const INTERFACE: u32 = 0x0200;
    pub const ABSTRACT: u32 = 0x0400;

    pub fn contains(&self, bit: u32) -> bool {
        self.0 & bit == bit
    }

    /// Returns a copy with `bit` cleared. Used to drop the redundant
    /// `ABSTRACT` bit the upstream frontend sets on every method of an
    /// interface.
    pub fn without(&self, bit: u32) -> AccessFlags {
        AccessFlags(self.0 & !bit)
    }
}

/// A read-only view of a parsed Dalvik method, provided by the upstream
/// frontend. The core never mutates this; `Graph::construct` reads it once
/// to build the CFG.
pub trait MethodSource {
    /// The block execution begins at.
    fn entry_block(&self) -> BlockId;

    /// Every basic block in the method, in any order (block ids, not
    /// position, define control flow).
    fn basic_blocks(&self) -> &[SourceBlock];

    /// Declared parameter types, in declaration order, `this` excluded.
    fn params_type(&self) -> &[String];

    /// Total register frame size (`.registers` in Dalvik smali).
    fn registers_size(&self) -> u16;

    /// Number of registers occupied by incoming arguments, including
    /// `this` for non-static methods. Parameters occupy the *last*
    /// `ins_size` registers of the frame.
    fn ins_size(&self) -> u16;

    fn access_flags(&self) -> AccessFlags;

    fn exception_table(&self) -> &[ExceptionRange];

    /// `code = None` in the upstream model: native or abstract methods
    /// carry no instruction stream at all.
    fn has_code(&self) -> bool {
        !self.access_flags().contains(AccessFlags::NATIVE)
            && !self.access_flags().contains(AccessFlags::ABSTRACT)
    }

    /// Registers holding the method parameters, `this` first if the method
    /// is non-static. Derived from `registers_size`/`ins_size` the same way
    /// the original frontend derives `var_to_name` for a method's locals.
    fn parameter_registers(&self) -> Vec<Register> {
        let first = self.registers_size().saturating_sub(self.ins_size());
        (first..self.registers_size()).map(Register).collect()
    }

    fn is_static(&self) -> bool {
        self.access_flags().contains(AccessFlags::STATIC)
    }
}
