use arch::symbol::SymbolError;
use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown operation: `{0}`")]
    UnknownOperation(String),

    #[error("Label `{0}` without operation")]
    MissingOperation(String),

    #[error("`{0}` needs an operand")]
    MissingArgument(String),

    #[error("Cannot parse `{0}` as {1}")]
    ParseArgument(String, String),

    #[error("`+` is only allowed on format 3 instructions: `{0}`")]
    NotExtendable(String),

    #[error("Invalid symbol name: `{0}`")]
    InvalidSymbol(String),

    #[error("Undefined symbol: `{0}`")]
    UndefinedSymbol(String),

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("`{0}` is imported with EXTREF and also defined here")]
    ImportConflict(String),

    #[error("Expression `{0}` must be absolute or relative to this program")]
    BadExpression(String),

    #[error("START must be the first statement")]
    MisplacedStart,

    #[error("Missing END")]
    MissingEnd,

    #[error("{0} needs a label")]
    MissingLabel(String),

    #[error("Target 0x{target:06X} is out of PC-relative range from 0x{pc:06X}")]
    DisplacementRange { target: i64, pc: u32 },

    #[error("Value {value} does not fit in {bits} bits")]
    ValueRange { value: i64, bits: u32 },

    #[error("Indexed addressing needs simple addressing")]
    IndexedIndirect,

    #[error("Location counter 0x{0:X} is past the end of memory")]
    AddressOverflow(u32),

    #[error("Offset 0x{offset:06X} is outside the {size}-byte program")]
    OutsideProgram { offset: u32, size: usize },

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

/// An [`Error`] tied to the 1-based source line it was raised on.
#[derive(Error, Debug)]
#[error("line {line}: {error}")]
pub struct Diag {
    pub line: usize,
    #[source]
    pub error: Error,
}

impl Error {
    pub fn at(self, line: usize) -> Diag {
        Diag { line, error: self }
    }
}

impl Diag {
    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, file: &str, source: &[String]) {
        cprintln!("<red,bold>error</>: {}", self.error);
        cprintln!("     <blue>--></> <underline>{}:{}</>", file, self.line);
        cprintln!("      <blue>|</>");

        let line_content = self
            .line
            .checked_sub(1)
            .and_then(|idx| source.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", self.line, line_content);
        cprintln!("      <blue>|</>");
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
