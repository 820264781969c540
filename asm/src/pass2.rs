//! Second pass: encodes every placed line and records the fields the linker
//! or loader has to fix up.

use arch::inst::{Flags, Inst};
use arch::obj::{ObjectFile, RelocationRecord};
use arch::op::{Format, OpInfo};
use log::debug;

use crate::error::{Diag, Error, Result};
use crate::expr::{Expr, Value};
use crate::parser::{
    parse_bytes, parse_registers, Addressing, AssemblyLine, Code, Directive, MemOperand, Target,
};
use crate::pass1::Ir;

struct Pass2<'a> {
    ir: &'a Ir,
    base: Option<u32>,
    entry: u32,
    code: Vec<u8>,
    relocations: Vec<RelocationRecord>,
}

pub fn run(ir: &Ir) -> Result<ObjectFile, Diag> {
    let mut pass = Pass2 {
        ir,
        base: None,
        entry: ir.start,
        code: vec![0; ir.length as usize],
        relocations: vec![],
    };
    for line in &ir.lines {
        pass.line(line).map_err(|e| e.at(line.line))?;
    }
    debug!(
        "pass 2: `{}` {} bytes, {} relocation records",
        ir.name,
        pass.code.len(),
        pass.relocations.len()
    );
    Ok(ObjectFile {
        name: ir.name.clone(),
        start: ir.start,
        entry: pass.entry,
        code: pass.code,
        symbols: ir.symbols.clone(),
        imports: ir.imports.clone(),
        relocations: pass.relocations,
        fully_relocated: false,
        source: Some(ir.source.clone()),
    })
}

fn operand(line: &AssemblyLine) -> Result<&str> {
    line.operand
        .as_deref()
        .ok_or_else(|| Error::MissingArgument(line.code.to_string()))
}

impl Pass2<'_> {
    fn line(&mut self, line: &AssemblyLine) -> Result<()> {
        let bytes = match line.code {
            Code::Op { info, extended } => self.instruction(line, info, extended)?,
            Code::Dir(Directive::BYTE) => parse_bytes(operand(line)?)?,
            Code::Dir(Directive::WORD) => self.word(line)?,
            Code::Dir(Directive::BASE) => {
                let value = self.eval(operand(line)?, line.address)?;
                if value.external.is_some() || !(0..=1).contains(&value.relative) {
                    return Err(Error::BadExpression(operand(line)?.to_string()));
                }
                self.base = Some(value.constant as u32);
                vec![]
            }
            Code::Dir(Directive::NOBASE) => {
                self.base = None;
                vec![]
            }
            Code::Dir(Directive::END) => {
                if let Some(text) = &line.operand {
                    let value = self.eval(text, line.address)?;
                    if value.external.is_some() || !(0..=1).contains(&value.relative) {
                        return Err(Error::BadExpression(text.clone()));
                    }
                    self.entry = value.constant as u32;
                }
                vec![]
            }
            Code::Dir(_) => vec![],
        };
        if bytes.is_empty() {
            return Ok(());
        }
        let offset = line.address - self.ir.start;
        let end = offset as usize + bytes.len();
        if end > self.code.len() {
            return Err(Error::OutsideProgram {
                offset,
                size: self.code.len(),
            });
        }
        self.code[offset as usize..end].copy_from_slice(&bytes);
        Ok(())
    }

    fn instruction(
        &mut self,
        line: &AssemblyLine,
        info: &'static OpInfo,
        extended: bool,
    ) -> Result<Vec<u8>> {
        let opcode = info.opcode;
        let inst = match info.format {
            Format::F1 => Inst::F1 { opcode },
            Format::F2 => {
                let (r1, r2) = parse_registers(info.operands, operand(line)?)?;
                Inst::F2 { opcode, r1, r2 }
            }
            Format::F3 => match &line.operand {
                // RSUB and friends keep the SIC encoding.
                None => Inst::Sic {
                    opcode,
                    x: false,
                    addr: 0,
                },
                Some(text) => self.memory(line, opcode, extended, text)?,
            },
        };
        Ok(inst.encode())
    }

    fn memory(&mut self, line: &AssemblyLine, opcode: u8, extended: bool, text: &str) -> Result<Inst> {
        let op = MemOperand::parse(text)?;
        let mut flags = Flags {
            n: op.mode != Addressing::Immediate,
            i: op.mode != Addressing::Indirect,
            x: op.indexed,
            b: false,
            p: false,
            e: extended,
        };
        let value = match &op.target {
            Target::Literal(lit) => match self.ir.literals.get(lit) {
                Some(address) => Value::relative(*address),
                None => return Err(Error::UndefinedSymbol(lit.clone())),
            },
            Target::Expr(expr) => self.eval_expr(expr, line.address)?,
        };
        let offset = line.address - self.ir.start;

        if extended {
            let addr = self.absolute_field(text, &value, |sym| {
                RelocationRecord::address20(offset, sym)
            })?;
            if !(0..=0xF_FFFF).contains(&addr) {
                return Err(Error::ValueRange {
                    value: addr,
                    bits: 20,
                });
            }
            return Ok(Inst::F4 {
                opcode,
                flags,
                addr: addr as u32,
            });
        }

        if let Some(sym) = &value.external {
            // The field keeps the addend; the displacement is computed once
            // the import is placed.
            if !(-2048..=2047).contains(&value.constant) {
                return Err(Error::ValueRange {
                    value: value.constant,
                    bits: 12,
                });
            }
            flags.p = true;
            self.relocations
                .push(RelocationRecord::displacement(offset, sym.clone()));
            return Ok(Inst::F3 {
                opcode,
                flags,
                disp: (value.constant & 0xFFF) as u16,
            });
        }

        let target = value.constant;
        match value.relative {
            0 if (0..=4095).contains(&target) => {
                return Ok(Inst::F3 {
                    opcode,
                    flags,
                    disp: target as u16,
                })
            }
            // Constants never move with the program; larger ones need `+`.
            0 => {
                return Err(Error::ValueRange {
                    value: target,
                    bits: 12,
                })
            }
            1 => {}
            _ => return Err(Error::BadExpression(text.to_string())),
        }

        let pc = line.address + 3;
        let base = self
            .base
            .filter(|base| (0..=4095).contains(&(target - *base as i64)));
        let disp = if let Some(base) = base {
            flags.b = true;
            target - base as i64
        } else {
            let disp = target - pc as i64;
            if !(-2048..=2047).contains(&disp) {
                return Err(Error::DisplacementRange { target, pc });
            }
            flags.p = true;
            disp & 0xFFF
        };
        Ok(Inst::F3 {
            opcode,
            flags,
            disp: disp as u16,
        })
    }

    fn word(&mut self, line: &AssemblyLine) -> Result<Vec<u8>> {
        let text = operand(line)?;
        let value = self.eval(text, line.address)?;
        let offset = line.address - self.ir.start;
        let field = self.absolute_field(text, &value, |sym| RelocationRecord::word(offset, sym))?;
        if !(-0x80_0000..=0xFF_FFFF).contains(&field) {
            return Err(Error::ValueRange {
                value: field,
                bits: 24,
            });
        }
        let w = (field & 0xFF_FFFF) as u32;
        Ok(vec![(w >> 16) as u8, (w >> 8) as u8, w as u8])
    }

    /// Value of an absolute address field. Imports and, in a named program,
    /// local addresses get a relocation record; the local field then holds
    /// the offset from the program start.
    fn absolute_field(
        &mut self,
        text: &str,
        value: &Value,
        record: impl Fn(String) -> RelocationRecord,
    ) -> Result<i64> {
        match (&value.external, value.relative) {
            (Some(sym), _) => {
                self.relocations.push(record(sym.clone()));
                Ok(value.constant)
            }
            (None, 1) if !self.ir.name.is_empty() => {
                self.relocations.push(record(self.ir.name.clone()));
                Ok(value.constant - self.ir.start as i64)
            }
            (None, 0) | (None, 1) => Ok(value.constant),
            (None, _) => Err(Error::BadExpression(text.to_string())),
        }
    }

    fn eval(&self, text: &str, here: u32) -> Result<Value> {
        self.eval_expr(&Expr::parse(text)?, here)
    }

    fn eval_expr(&self, expr: &Expr, here: u32) -> Result<Value> {
        expr.eval(here, |name| match self.ir.symbols.get(name) {
            Some(sym) if sym.absolute => Some(Value::absolute(sym.address as i64)),
            Some(sym) => Some(Value::relative(sym.address)),
            None if self.ir.imports.contains(name) => Some(Value::external(name)),
            None => None,
        })
    }
}
