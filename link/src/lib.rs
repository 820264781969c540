//! Links SIC/XE object modules into one, either at their own start
//! addresses with every reference resolved, or concatenated and still
//! relocatable.

pub mod error;
pub mod layout;
pub mod resolve;

use arch::obj::{self, ObjectFile};
use indexmap::IndexSet;
use log::debug;
use strum::Display;

pub use error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Keep each module at its START and apply every relocation
    #[default]
    Absolute,
    /// Concatenate from address 0 and keep relocation records
    Relocatable,
}

/// A linked object and its H/D/R/T/M/E text.
#[derive(Debug, Clone)]
pub struct Linked {
    pub object: ObjectFile,
    pub text: String,
}

pub(crate) fn module_name(m: &ObjectFile, idx: usize) -> String {
    if m.name.is_empty() {
        format!("#{}", idx)
    } else {
        m.name.clone()
    }
}

pub fn link(modules: &[ObjectFile], mode: Mode) -> Result<Linked> {
    if modules.is_empty() {
        return Err(Error::NoModules);
    }
    let object = match mode {
        Mode::Absolute => absolute(modules)?,
        Mode::Relocatable => relocatable(modules)?,
    };
    debug!(
        "linked {} modules ({}): 0x{:06X} bytes at 0x{:06X}, {} relocation records",
        modules.len(),
        mode,
        object.len(),
        object.start,
        object.relocations.len()
    );
    let text = object.to_text();
    Ok(Linked { object, text })
}

fn absolute(modules: &[ObjectFile]) -> Result<ObjectFile> {
    let sections = layout::absolute(modules)?;
    let (start, end) = layout::span(&sections);
    let symbols = resolve::globals(modules, &sections)?;
    resolve::check_resolved(modules, &sections, &symbols)?;

    let mut code = vec![0u8; (end - start) as usize];
    for (m, section) in modules.iter().zip(&sections) {
        let base = section.begin - start;
        debug!("placing `{}` at 0x{:06X}", section.name, section.begin);
        code[base as usize..(base + m.len()) as usize].copy_from_slice(&m.code);
        for rec in &m.relocations {
            let address = symbols
                .address(&rec.symbol)
                .ok_or_else(|| Error::Unresolved {
                    symbol: rec.symbol.clone(),
                    module: section.name.clone(),
                })?;
            obj::apply(&mut code, &rec.shifted(base), address, start).map_err(|source| {
                Error::Object {
                    module: section.name.clone(),
                    source,
                }
            })?;
        }
    }

    let first = &modules[0];
    Ok(ObjectFile {
        name: first.name.clone(),
        start,
        entry: first.entry,
        code,
        symbols,
        imports: IndexSet::new(),
        relocations: vec![],
        fully_relocated: true,
        source: None,
    })
}

fn relocatable(modules: &[ObjectFile]) -> Result<ObjectFile> {
    let sections = layout::concatenated(modules);
    let symbols = resolve::globals(modules, &sections)?;

    let mut code = Vec::new();
    let mut relocations = vec![];
    let mut imports = IndexSet::new();
    for (m, section) in modules.iter().zip(&sections) {
        debug!("appending `{}` at 0x{:06X}", section.name, section.begin);
        relocations.extend(m.relocations.iter().map(|rec| rec.shifted(section.begin)));
        code.extend_from_slice(&m.code);
        imports.extend(
            m.imports
                .iter()
                .filter(|name| !symbols.contains(name))
                .cloned(),
        );
    }

    let first = &modules[0];
    Ok(ObjectFile {
        name: first.name.clone(),
        start: 0,
        entry: sections[0].begin + first.entry.wrapping_sub(first.start),
        code,
        symbols,
        imports,
        relocations,
        fully_relocated: false,
        source: None,
    })
}
