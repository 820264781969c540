use std::fmt;

use indexmap::IndexSet;

use super::{ObjError, ObjectFile, RelocationRecord};
use crate::symbol::{Symbol, SymbolTableBuilder};

/// Bytes carried by one `T` record.
/// Size of the 20-bit SIC/XE address space.
pub const ADDRESS_SPACE: u32 = 0x10_0000;

pub const MAX_TEXT_LEN: usize = 30;

impl fmt::Display for ObjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "H^{:<6}^{:06X}^{:06X}", self.name, self.start, self.len())?;
        for sym in self.symbols.public() {
            writeln!(f, "D^{}^{:06X}", sym.name(), sym.address)?;
        }
        for name in &self.imports {
            writeln!(f, "R^{}", name)?;
        }
        for (idx, chunk) in self.code.chunks(MAX_TEXT_LEN).enumerate() {
            let addr = self.start as usize + idx * MAX_TEXT_LEN;
            write!(f, "T^{:06X}^{:02X}^", addr, chunk.len())?;
            for b in chunk {
                write!(f, "{:02X}", b)?;
            }
            writeln!(f)?;
        }
        if !self.fully_relocated {
            for rec in &self.relocations {
                writeln!(
                    f,
                    "M^{:06X}^{:02X}^+{}",
                    self.start + rec.offset,
                    rec.half_bytes,
                    rec.symbol
                )?;
            }
        }
        writeln!(f, "E^{:06X}", self.entry)
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> ObjError {
    ObjError::Malformed {
        line,
        reason: reason.into(),
    }
}

fn hex(line: usize, field: &str, what: &str) -> Result<u32, ObjError> {
    u32::from_str_radix(field, 16).map_err(|_| malformed(line, format!("bad {}: `{}`", what, field)))
}

fn expect_fields(line: usize, fields: &[&str], n: usize) -> Result<(), ObjError> {
    if fields.len() == n {
        Ok(())
    } else {
        Err(malformed(
            line,
            format!("`{}` record needs {} fields, found {}", fields[0], n, fields.len()),
        ))
    }
}

impl ObjectFile {
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Parses the H/D/R/T/M/E text produced by [`ObjectFile::to_text`].
    /// The result is fully relocated when it has neither `M` nor `R` records.
    pub fn from_text(text: &str) -> Result<ObjectFile, ObjError> {
        let mut obj = ObjectFile::default();
        let mut header = false;
        let mut next_text = 0u32;
        let mut symbols = SymbolTableBuilder::new();
        let mut imports = IndexSet::new();
        let mut entry = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim_end();
            if raw.is_empty() {
                continue;
            }
            let fields: Vec<&str> = raw.split('^').collect();
            if !header && fields[0] != "H" {
                return Err(malformed(line, "object must begin with an `H` record"));
            }
            match fields[0] {
                "H" => {
                    if header {
                        return Err(malformed(line, "second `H` record"));
                    }
                    expect_fields(line, &fields, 4)?;
                    header = true;
                    obj.name = fields[1].trim().to_string();
                    obj.start = hex(line, fields[2], "start address")?;
                    let len = hex(line, fields[3], "length")?;
                    if obj.start as u64 + len as u64 > ADDRESS_SPACE as u64 {
                        return Err(malformed(
                            line,
                            format!("{:X} bytes at {:06X} exceed the address space", len, obj.start),
                        ));
                    }
                    obj.code = vec![0; len as usize];
                    next_text = obj.start;
                }
                "D" => {
                    expect_fields(line, &fields, 3)?;
                    let address = hex(line, fields[2], "symbol address")?;
                    symbols
                        .insert(Symbol::new(fields[1], address, true))
                        .map_err(|e| malformed(line, e.to_string()))?;
                }
                "R" => {
                    expect_fields(line, &fields, 2)?;
                    imports.insert(fields[1].to_string());
                }
                "T" => {
                    expect_fields(line, &fields, 4)?;
                    let addr = hex(line, fields[1], "text address")?;
                    let len = hex(line, fields[2], "text length")? as usize;
                    if len > MAX_TEXT_LEN {
                        return Err(ObjError::TextTooLong { line, len });
                    }
                    if addr != next_text {
                        return Err(malformed(
                            line,
                            format!("text at {:06X}, expected {:06X}", addr, next_text),
                        ));
                    }
                    let payload = fields[3];
                    if payload.len() != 2 * len {
                        return Err(malformed(
                            line,
                            format!("length {:02X} but {} hex digits", len, payload.len()),
                        ));
                    }
                    let offset = (addr - obj.start) as usize;
                    if offset + len > obj.code.len() {
                        return Err(malformed(line, "text past the end of the module"));
                    }
                    for i in 0..len {
                        let digits = payload
                            .get(2 * i..2 * i + 2)
                            .ok_or_else(|| malformed(line, "bad text payload"))?;
                        obj.code[offset + i] = hex(line, digits, "text byte")? as u8;
                    }
                    next_text = addr + len as u32;
                }
                "M" => {
                    expect_fields(line, &fields, 4)?;
                    let addr = hex(line, fields[1], "modification address")?;
                    let half_bytes = hex(line, fields[2], "half-byte count")? as u8;
                    if !(1..=8).contains(&half_bytes) {
                        return Err(malformed(line, "half-byte count must be 1 to 8"));
                    }
                    let symbol = fields[3]
                        .strip_prefix('+')
                        .ok_or_else(|| malformed(line, "modification symbol needs `+`"))?;
                    if addr < obj.start {
                        return Err(malformed(line, "modification before the module start"));
                    }
                    obj.relocations.push(RelocationRecord {
                        offset: addr - obj.start,
                        symbol: symbol.to_string(),
                        length: (half_bytes + 1) / 2,
                        half_bytes,
                        pc_relative: half_bytes == 3,
                    });
                }
                "E" => {
                    expect_fields(line, &fields, 2)?;
                    entry = Some(hex(line, fields[1], "entry address")?);
                }
                other => return Err(malformed(line, format!("unknown record `{}`", other))),
            }
        }

        if !header {
            return Err(malformed(0, "missing `H` record"));
        }
        if next_text != obj.end() {
            return Err(malformed(
                0,
                format!(
                    "text covers {:06X}..{:06X}, header declares {:06X}..{:06X}",
                    obj.start,
                    next_text,
                    obj.start,
                    obj.end()
                ),
            ));
        }
        obj.entry = entry.unwrap_or(obj.start);
        obj.symbols = symbols.build();
        obj.fully_relocated = obj.relocations.is_empty() && imports.is_empty();
        obj.imports = imports;
        Ok(obj)
    }
}
