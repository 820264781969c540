use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::alu::ALU;
use crate::reg::Reg;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Mnemonic {
    ADD,
    ADDF,
    ADDR,
    AND,
    CLEAR,
    COMP,
    COMPF,
    COMPR,
    DIV,
    DIVF,
    DIVR,
    FIX,
    FLOAT,
    HIO,
    J,
    JEQ,
    JGT,
    JLT,
    JSUB,
    LDA,
    LDB,
    LDCH,
    LDF,
    LDL,
    LDS,
    LDT,
    LDX,
    LPS,
    MUL,
    MULF,
    MULR,
    NORM,
    OR,
    RD,
    RMO,
    RSUB,
    SHIFTL,
    SHIFTR,
    SIO,
    SSK,
    STA,
    STB,
    STCH,
    STF,
    STI,
    STL,
    STS,
    STSW,
    STT,
    STX,
    SUB,
    SUBF,
    SUBR,
    SVC,
    TD,
    TIO,
    TIX,
    TIXR,
    WD,
}

/// Encoding family. `F3` instructions may be written in format 4 with `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    F1,
    F2,
    F3,
}

/// Operand shape expected by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    Mem,
    Reg,
    RegReg,
    RegN,
    N,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    Eq,
    Gt,
    Lt,
}

/// What the execution engine does for an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exec {
    Load(Reg),
    LoadChar,
    Store(Reg),
    StoreChar,
    Arith(ALU),
    Comp,
    Tix,
    Jump(Cond),
    Jsub,
    Rsub,
    ArithR(ALU),
    CompR,
    Clear,
    Rmo,
    ShiftL,
    ShiftR,
    TixR,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub mnemonic: Mnemonic,
    pub opcode: u8,
    pub format: Format,
    pub operands: Operands,
    pub exec: Exec,
}

macro_rules! op {
    ($m:ident, $opcode:expr, $format:ident, $operands:ident, $exec:expr) => {
        OpInfo {
            mnemonic: Mnemonic::$m,
            opcode: $opcode,
            format: Format::$format,
            operands: Operands::$operands,
            exec: $exec,
        }
    };
}

pub static OPS: &[OpInfo] = &[
    op!(ADD, 0x18, F3, Mem, Exec::Arith(ALU::ADD)),
    op!(ADDF, 0x58, F3, Mem, Exec::Unsupported),
    op!(ADDR, 0x90, F2, RegReg, Exec::ArithR(ALU::ADD)),
    op!(AND, 0x40, F3, Mem, Exec::Arith(ALU::AND)),
    op!(CLEAR, 0xB4, F2, Reg, Exec::Clear),
    op!(COMP, 0x28, F3, Mem, Exec::Comp),
    op!(COMPF, 0x88, F3, Mem, Exec::Unsupported),
    op!(COMPR, 0xA0, F2, RegReg, Exec::CompR),
    op!(DIV, 0x24, F3, Mem, Exec::Arith(ALU::DIV)),
    op!(DIVF, 0x64, F3, Mem, Exec::Unsupported),
    op!(DIVR, 0x9C, F2, RegReg, Exec::ArithR(ALU::DIV)),
    op!(FIX, 0xC4, F1, None, Exec::Unsupported),
    op!(FLOAT, 0xC0, F1, None, Exec::Unsupported),
    op!(HIO, 0xF4, F1, None, Exec::Unsupported),
    op!(J, 0x3C, F3, Mem, Exec::Jump(Cond::Always)),
    op!(JEQ, 0x30, F3, Mem, Exec::Jump(Cond::Eq)),
    op!(JGT, 0x34, F3, Mem, Exec::Jump(Cond::Gt)),
    op!(JLT, 0x38, F3, Mem, Exec::Jump(Cond::Lt)),
    op!(JSUB, 0x48, F3, Mem, Exec::Jsub),
    op!(LDA, 0x00, F3, Mem, Exec::Load(Reg::A)),
    op!(LDB, 0x68, F3, Mem, Exec::Load(Reg::B)),
    op!(LDCH, 0x50, F3, Mem, Exec::LoadChar),
    op!(LDF, 0x70, F3, Mem, Exec::Load(Reg::F)),
    op!(LDL, 0x08, F3, Mem, Exec::Load(Reg::L)),
    op!(LDS, 0x6C, F3, Mem, Exec::Load(Reg::S)),
    op!(LDT, 0x74, F3, Mem, Exec::Load(Reg::T)),
    op!(LDX, 0x04, F3, Mem, Exec::Load(Reg::X)),
    op!(LPS, 0xD0, F3, Mem, Exec::Unsupported),
    op!(MUL, 0x20, F3, Mem, Exec::Arith(ALU::MUL)),
    op!(MULF, 0x60, F3, Mem, Exec::Unsupported),
    op!(MULR, 0x98, F2, RegReg, Exec::ArithR(ALU::MUL)),
    op!(NORM, 0xC8, F1, None, Exec::Unsupported),
    op!(OR, 0x44, F3, Mem, Exec::Arith(ALU::OR)),
    op!(RD, 0xD8, F3, Mem, Exec::Unsupported),
    op!(RMO, 0xAC, F2, RegReg, Exec::Rmo),
    op!(RSUB, 0x4C, F3, None, Exec::Rsub),
    op!(SHIFTL, 0xA4, F2, RegN, Exec::ShiftL),
    op!(SHIFTR, 0xA8, F2, RegN, Exec::ShiftR),
    op!(SIO, 0xF0, F1, None, Exec::Unsupported),
    op!(SSK, 0xEC, F3, Mem, Exec::Unsupported),
    op!(STA, 0x0C, F3, Mem, Exec::Store(Reg::A)),
    op!(STB, 0x78, F3, Mem, Exec::Store(Reg::B)),
    op!(STCH, 0x54, F3, Mem, Exec::StoreChar),
    op!(STF, 0x80, F3, Mem, Exec::Store(Reg::F)),
    op!(STI, 0xD4, F3, Mem, Exec::Unsupported),
    op!(STL, 0x14, F3, Mem, Exec::Store(Reg::L)),
    op!(STS, 0x7C, F3, Mem, Exec::Store(Reg::S)),
    op!(STSW, 0xE8, F3, Mem, Exec::Store(Reg::SW)),
    op!(STT, 0x84, F3, Mem, Exec::Store(Reg::T)),
    op!(STX, 0x10, F3, Mem, Exec::Store(Reg::X)),
    op!(SUB, 0x1C, F3, Mem, Exec::Arith(ALU::SUB)),
    op!(SUBF, 0x5C, F3, Mem, Exec::Unsupported),
    op!(SUBR, 0x94, F2, RegReg, Exec::ArithR(ALU::SUB)),
    op!(SVC, 0xB0, F2, N, Exec::Unsupported),
    op!(TD, 0xE0, F3, Mem, Exec::Unsupported),
    op!(TIO, 0xF8, F1, None, Exec::Unsupported),
    op!(TIX, 0x2C, F3, Mem, Exec::Tix),
    op!(TIXR, 0xB8, F2, Reg, Exec::TixR),
    op!(WD, 0xDC, F3, Mem, Exec::Unsupported),
];

static BY_OPCODE: Lazy<[Option<&'static OpInfo>; 256]> = Lazy::new(|| {
    let mut table = [None; 256];
    for info in OPS {
        table[info.opcode as usize] = Some(info);
    }
    table
});

static BY_MNEMONIC: Lazy<HashMap<Mnemonic, &'static OpInfo>> =
    Lazy::new(|| OPS.iter().map(|info| (info.mnemonic, info)).collect());

/// Looks up an opcode with the `n`/`i` bits already masked off.
pub fn by_opcode(opcode: u8) -> Option<&'static OpInfo> {
    BY_OPCODE[opcode as usize]
}

impl Mnemonic {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(m) => Ok(m),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }

    pub fn info(self) -> &'static OpInfo {
        BY_MNEMONIC[&self]
    }
}

impl OpInfo {
    /// Byte length of the instruction as written.
    pub fn len(&self, extended: bool) -> u32 {
        match (self.format, extended) {
            (Format::F1, _) => 1,
            (Format::F2, _) => 2,
            (Format::F3, false) => 3,
            (Format::F3, true) => 4,
        }
    }
}
