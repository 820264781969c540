use std::ops::Range;

use crate::alu::sext;

use super::{ObjError, RelocationRecord};

fn field(code: &[u8], rec: &RelocationRecord) -> Result<Range<usize>, ObjError> {
    let start = rec.offset as usize;
    let end = start + rec.length as usize;
    if !(1..=4).contains(&rec.length) || end > code.len() {
        return Err(ObjError::FieldOutOfRange {
            offset: rec.offset,
            len: rec.length as u32,
            size: code.len(),
        });
    }
    Ok(start..end)
}

fn read(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | b as u64)
}

fn write(bytes: &mut [u8], mut value: u64) {
    for b in bytes.iter_mut().rev() {
        *b = value as u8;
        value >>= 8;
    }
}

fn update(
    code: &mut [u8],
    rec: &RelocationRecord,
    f: impl FnOnce(u64) -> Result<u64, ObjError>,
) -> Result<(), ObjError> {
    let range = field(code, rec)?;
    let raw = read(&code[range.clone()]);
    let mask = rec.mask();
    let value = f(raw & mask)? & mask;
    write(&mut code[range], (raw & !mask) | value);
    Ok(())
}

/// Resolves the record's field against the symbol's `address`, with the
/// module code placed at `origin`. Absolute fields get the address added.
/// A PC-relative field holds a signed 12-bit addend and becomes
/// `addend + address - (instruction + 3)`, which must stay in -2048..=2047.
/// Bits outside the record's half-bytes are preserved; on error the code is
/// left untouched.
pub fn apply(
    code: &mut [u8],
    rec: &RelocationRecord,
    address: u32,
    origin: u32,
) -> Result<(), ObjError> {
    update(code, rec, |field| {
        if rec.pc_relative {
            let addend = sext(field as i64, rec.half_bytes as u32 * 4);
            let pc = origin as i64 + rec.instruction() as i64
                + RelocationRecord::PC_RELATIVE_INST_LEN as i64;
            let disp = addend + address as i64 - pc;
            if !(-2048..=2047).contains(&disp) {
                return Err(ObjError::DisplacementRange {
                    symbol: rec.symbol.clone(),
                    offset: rec.offset,
                    disp,
                });
            }
            Ok(disp as u64)
        } else {
            let sum = field + address as u64;
            if sum > rec.mask() {
                return Err(ObjError::FieldOverflow {
                    symbol: rec.symbol.clone(),
                    offset: rec.offset,
                });
            }
            Ok(sum)
        }
    })
}
