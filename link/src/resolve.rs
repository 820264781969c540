use arch::obj::ObjectFile;
use arch::symbol::{SymbolError, SymbolTable, SymbolTableBuilder};

use crate::error::{Error, Result};
use crate::layout::Section;

/// Merges every module's exported symbols, moved to the module's section.
pub fn globals(modules: &[ObjectFile], sections: &[Section]) -> Result<SymbolTable> {
    let mut builder = SymbolTableBuilder::new();
    for (m, section) in modules.iter().zip(sections) {
        let placed = m.symbols.rebased(m.start, section.begin);
        for sym in placed.public() {
            builder
                .insert(sym.clone())
                .map_err(|SymbolError::Duplicate(symbol)| Error::DuplicateExport {
                    symbol,
                    module: section.name.clone(),
                })?;
        }
    }
    Ok(builder.build())
}

/// Every import and every relocation target must be exported by some module.
pub fn check_resolved(
    modules: &[ObjectFile],
    sections: &[Section],
    globals: &SymbolTable,
) -> Result<()> {
    for (m, section) in modules.iter().zip(sections) {
        let names = m
            .imports
            .iter()
            .chain(m.relocations.iter().map(|rec| &rec.symbol));
        for name in names {
            if !globals.contains(name) {
                return Err(Error::Unresolved {
                    symbol: name.clone(),
                    module: section.name.clone(),
                });
            }
        }
    }
    Ok(())
}
