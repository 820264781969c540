//! SIC/XE machine: memory, registers, the fetch/decode/execute engine and
//! the object loader.

pub mod error;
pub mod hooks;
pub mod loader;
pub mod memory;
pub mod model;
pub mod register;

pub use error::{Error, Result};
pub use loader::LoadReport;
pub use memory::Memory;
pub use model::{Machine, Outcome, RunOptions, Snapshot, Step, HALT_ADDRESS};
pub use register::Registers;
