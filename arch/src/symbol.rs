use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("Re-defined symbol: `{0}`")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    pub address: u32,
    pub public: bool,
    /// Constant defined with `EQU`; never moved by relocation.
    pub absolute: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, address: u32, public: bool) -> Self {
        Symbol {
            name: name.into(),
            address,
            public,
            absolute: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Frozen name → symbol mapping. Built with [`SymbolTableBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn address(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).map(|sym| sym.address)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn public(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|sym| sym.public)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Copy of the table with every relative address moved from
    /// `from`-based to `to`-based.
    pub fn rebased(&self, from: u32, to: u32) -> SymbolTable {
        let symbols = self
            .symbols
            .iter()
            .map(|(name, sym)| {
                let mut sym = sym.clone();
                if !sym.absolute {
                    sym.address = to.wrapping_add(sym.address.wrapping_sub(from));
                }
                (name.clone(), sym)
            })
            .collect();
        SymbolTable { symbols }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    symbols: IndexMap<String, (Symbol, bool)>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` at `address`. An export placeholder created earlier is
    /// filled in; a second definition is an error.
    pub fn define(&mut self, name: &str, address: u32) -> Result<(), SymbolError> {
        match self.symbols.get_mut(name) {
            Some((_, true)) => Err(SymbolError::Duplicate(name.to_string())),
            Some((sym, defined)) => {
                sym.address = address;
                *defined = true;
                Ok(())
            }
            None => {
                self.symbols
                    .insert(name.to_string(), (Symbol::new(name, address, false), true));
                Ok(())
            }
        }
    }

    /// Defines a constant that relocation leaves untouched.
    pub fn define_absolute(&mut self, name: &str, value: u32) -> Result<(), SymbolError> {
        self.define(name, value)?;
        if let Some((sym, _)) = self.symbols.get_mut(name) {
            sym.absolute = true;
        }
        Ok(())
    }

    /// Inserts a fully formed symbol, keeping its flags.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), SymbolError> {
        if self.is_defined(symbol.name()) {
            return Err(SymbolError::Duplicate(symbol.name.clone()));
        }
        self.symbols.insert(symbol.name.clone(), (symbol, true));
        Ok(())
    }

    /// Defines an exported symbol in one step.
    pub fn define_public(&mut self, name: &str, address: u32) -> Result<(), SymbolError> {
        self.define(name, address)?;
        self.export(name);
        Ok(())
    }

    /// Marks `name` public, creating it at address 0 if it is not defined yet.
    pub fn export(&mut self, name: &str) {
        self.symbols
            .entry(name.to_string())
            .or_insert_with(|| (Symbol::new(name, 0, false), false))
            .0
            .public = true;
    }

    pub fn is_defined(&self, name: &str) -> bool {
        matches!(self.symbols.get(name), Some((_, true)))
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        match self.symbols.get(name) {
            Some((sym, true)) => Some(sym),
            _ => None,
        }
    }

    pub fn build(self) -> SymbolTable {
        let symbols = self
            .symbols
            .into_iter()
            .map(|(name, (sym, defined))| {
                if !defined {
                    warn!("exported symbol `{}` is never defined, using address 0", name);
                }
                (name, sym)
            })
            .collect();
        SymbolTable { symbols }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut builder = SymbolTableBuilder::new();
        builder.define("LOOP", 3).unwrap();
        assert_eq!(
            builder.define("LOOP", 9),
            Err(SymbolError::Duplicate("LOOP".to_string()))
        );
    }

    #[test]
    fn export_before_definition() {
        let mut builder = SymbolTableBuilder::new();
        builder.export("BUFFER");
        assert!(!builder.is_defined("BUFFER"));
        builder.define("BUFFER", 0x36).unwrap();
        builder.define("LOCAL", 0x40).unwrap();
        let table = builder.build();
        assert_eq!(table.address("BUFFER"), Some(0x36));
        let public: Vec<_> = table.public().map(|s| s.name()).collect();
        assert_eq!(public, vec!["BUFFER"]);
        assert!(table.contains("LOCAL"));
        assert!(!table.contains("MISSING"));
    }

    #[test]
    fn undefined_export_stays_at_zero() {
        let mut builder = SymbolTableBuilder::new();
        builder.export("GHOST");
        let table = builder.build();
        assert_eq!(table.address("GHOST"), Some(0));
    }

    #[test]
    fn rebase_moves_every_symbol() {
        let mut builder = SymbolTableBuilder::new();
        builder.define_public("PROG", 0x1000).unwrap();
        builder.define("DATA", 0x1010).unwrap();
        builder.define_absolute("MAXLEN", 4096).unwrap();
        let table = builder.build().rebased(0x1000, 0x4000);
        assert_eq!(table.address("PROG"), Some(0x4000));
        assert_eq!(table.address("DATA"), Some(0x4010));
        assert_eq!(table.address("MAXLEN"), Some(4096));
    }
}
