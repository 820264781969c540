use arch::obj::ObjError;
use arch::op::Mnemonic;
use arch::reg::Reg;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Memory access at 0x{addr:06X} ({len} bytes) is outside {size} bytes of memory")]
    OutOfBounds { addr: u32, len: u32, size: usize },

    #[error("Memory of {0} bytes is below the minimum of 1024")]
    MemorySize(usize),

    #[error("Register {reg} is {actual} bits wide, accessed as {requested} bits")]
    RegisterWidth {
        reg: Reg,
        actual: u32,
        requested: u32,
    },

    #[error("Invalid register number {0}")]
    InvalidRegister(u8),

    #[error("Invalid opcode byte 0x{opcode:02X} at 0x{pc:06X}")]
    InvalidOpcode { opcode: u8, pc: u32 },

    #[error("Unsupported instruction {mnemonic} at 0x{pc:06X}")]
    Unsupported { mnemonic: Mnemonic, pc: u32 },

    #[error("Division by zero at 0x{0:06X}")]
    DivisionByZero(u32),

    #[error("Cannot store to an immediate operand at 0x{0:06X}")]
    StoreImmediate(u32),

    #[error("Machine has halted")]
    Halted,

    #[error("Symbol not found: `{0}`")]
    UnresolvedSymbol(String),

    #[error(transparent)]
    Object(#[from] ObjError),

    #[error("Failed to open file: {0}: {1}")]
    FileOpen(String, String),

    #[error("Failed to read dump config {0}: {1}")]
    DumpConfig(String, String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
