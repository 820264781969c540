//! Two-pass SIC/XE assembler producing relocatable object modules.

pub mod error;
pub mod expr;
pub mod literal;
pub mod parser;
pub mod pass1;
pub mod pass2;
pub mod util;

use arch::obj::ObjectFile;

pub use error::{Diag, Error};
pub use pass1::Ir;

/// Assembles one program.
pub fn assemble(source: &str) -> Result<ObjectFile, Diag> {
    assemble_with_ir(source).map(|(_, obj)| obj)
}

/// Assembles one program, also returning the first pass's placement of each
/// line for listings.
pub fn assemble_with_ir(source: &str) -> Result<(Ir, ObjectFile), Diag> {
    let ir = pass1::run(source)?;
    let obj = pass2::run(&ir)?;
    Ok((ir, obj))
}
