//! Object modules exchanged between the assembler, linker and loader.

mod reloc;
mod text;

use indexmap::IndexSet;
use thiserror::Error;

use crate::symbol::SymbolTable;

pub use reloc::apply;
pub use text::{ADDRESS_SPACE, MAX_TEXT_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjError {
    #[error("Field at offset 0x{offset:06X} ({len} bytes) is outside the {size}-byte module")]
    FieldOutOfRange { offset: u32, len: u32, size: usize },

    #[error("Address of `{symbol}` does not fit the field at offset 0x{offset:06X}")]
    FieldOverflow { symbol: String, offset: u32 },

    #[error("`{symbol}` is {disp} bytes from the instruction at offset 0x{offset:06X}, beyond a 12-bit displacement")]
    DisplacementRange { symbol: String, offset: u32, disp: i64 },

    #[error("Malformed object record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Text record on line {line} holds {len} bytes, the limit is 30")]
    TextTooLong { line: usize, len: usize },
}

/// Deferred fix-up of one field in a module's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRecord {
    /// Offset of the first byte of the field in the module's code.
    pub offset: u32,
    pub symbol: String,
    /// Bytes spanned by the field, 1 to 4.
    pub length: u8,
    /// Nibbles modified, counted from the least significant end of the field.
    pub half_bytes: u8,
    /// The field is a displacement from the end of its instruction.
    pub pc_relative: bool,
}

impl RelocationRecord {
    /// Length of the instruction a PC-relative field belongs to.
    pub const PC_RELATIVE_INST_LEN: u32 = 3;

    /// 20-bit address of a format 4 instruction starting at `inst`.
    pub fn address20(inst: u32, symbol: impl Into<String>) -> Self {
        RelocationRecord {
            offset: inst + 1,
            symbol: symbol.into(),
            length: 3,
            half_bytes: 5,
            pc_relative: false,
        }
    }

    /// 12-bit displacement of a format 3 instruction starting at `inst`.
    pub fn displacement(inst: u32, symbol: impl Into<String>) -> Self {
        RelocationRecord {
            offset: inst + 1,
            symbol: symbol.into(),
            length: 2,
            half_bytes: 3,
            pc_relative: true,
        }
    }

    /// Full 24-bit word at `offset`.
    pub fn word(offset: u32, symbol: impl Into<String>) -> Self {
        RelocationRecord {
            offset,
            symbol: symbol.into(),
            length: 3,
            half_bytes: 6,
            pc_relative: false,
        }
    }

    /// Offset of the instruction a PC-relative field belongs to.
    pub fn instruction(&self) -> u32 {
        self.offset.saturating_sub(1)
    }

    pub fn shifted(&self, by: u32) -> Self {
        RelocationRecord {
            offset: self.offset + by,
            ..self.clone()
        }
    }

    pub fn mask(&self) -> u64 {
        (1u64 << (4 * self.half_bytes as u32)) - 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFile {
    pub name: String,
    pub start: u32,
    /// Address execution begins at, `start` unless `END` names a symbol.
    pub entry: u32,
    pub code: Vec<u8>,
    pub symbols: SymbolTable,
    pub imports: IndexSet<String>,
    pub relocations: Vec<RelocationRecord>,
    pub fully_relocated: bool,
    pub source: Option<Vec<String>>,
}

impl ObjectFile {
    pub fn len(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// First address past the module.
    pub fn end(&self) -> u32 {
        self.start + self.len()
    }
}
