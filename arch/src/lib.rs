//! SIC/XE architecture: registers, opcode table, instruction encoding and the
//! object file model shared by the assembler, linker and emulator.

pub mod alu;
pub mod inst;
pub mod obj;
pub mod op;
pub mod reg;
pub mod symbol;
