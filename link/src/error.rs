use arch::obj::ObjError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No input modules")]
    NoModules,

    #[error("Address conflict: `{0}` and `{1}` overlap at 0x{2:06X}")]
    Overlap(String, String, u32),

    #[error("Symbol `{symbol}` is exported twice, again by `{module}`")]
    DuplicateExport { symbol: String, module: String },

    #[error("Symbol not found: `{symbol}` referenced by `{module}`")]
    Unresolved { symbol: String, module: String },

    #[error("In module `{module}`")]
    Object {
        module: String,
        #[source]
        source: ObjError,
    },

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
