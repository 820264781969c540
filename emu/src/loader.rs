use std::path::Path;

use arch::obj::{self, ObjectFile};
use arch::reg::Reg;
use arch::symbol::SymbolTable;
use log::debug;

use crate::error::{Error, Result};
use crate::model::{Machine, HALT_ADDRESS};

/// Where an object ended up in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub base: u32,
    pub length: u32,
    pub entry: u32,
    /// Symbols of the object at their loaded addresses.
    pub symbols: SymbolTable,
}

impl Machine {
    /// Places `obj` at `base` (its own start if it is fully relocated or no
    /// base is given), applies the pending relocation records and points PC
    /// at the entry. L is set so that a final `RSUB` halts.
    pub fn load(&mut self, obj: &ObjectFile, base: Option<u32>) -> Result<LoadReport> {
        let base = match base {
            Some(base) if !obj.fully_relocated => base,
            _ => obj.start,
        };
        let symbols = obj.symbols.rebased(obj.start, base);

        let mut code = obj.code.clone();
        for rec in &obj.relocations {
            let address = symbols
                .address(&rec.symbol)
                .ok_or_else(|| Error::UnresolvedSymbol(rec.symbol.clone()))?;
            obj::apply(&mut code, rec, address, base)?;
        }
        if let Some(name) = obj.imports.iter().find(|name| !symbols.contains(name)) {
            return Err(Error::UnresolvedSymbol(name.clone()));
        }
        self.memory_mut().write_slice(base, &code)?;

        let entry = base.wrapping_add(obj.entry.wrapping_sub(obj.start));
        self.reset();
        self.registers_mut().set_value(Reg::L, HALT_ADDRESS as i64);
        self.registers_mut().set_pc(entry);
        debug!(
            "loaded `{}`: 0x{:06X} bytes at 0x{:06X}, entry 0x{:06X}, {} records",
            obj.name,
            obj.len(),
            base,
            entry,
            obj.relocations.len()
        );
        Ok(LoadReport {
            base,
            length: obj.len(),
            entry,
            symbols,
        })
    }

    /// Reads an H/D/R/T/M/E object file and loads it.
    pub fn load_file(&mut self, path: impl AsRef<Path>, base: Option<u32>) -> Result<LoadReport> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::FileOpen(path.display().to_string(), e.to_string()))?;
        let obj = ObjectFile::from_text(&text)?;
        self.load(&obj, base)
    }
}
