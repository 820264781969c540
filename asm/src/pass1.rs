//! First pass: places every statement at its address and builds the
//! symbol table.

use arch::symbol::{SymbolTable, SymbolTableBuilder};
use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::error::{Diag, Error, Result};
use crate::expr::{is_symbol, parse_with_prefix, Expr, Value};
use crate::literal::LiteralPool;
use crate::parser::{parse_bytes, AssemblyLine, Code, Directive, MemOperand, Stmt, Target};

/// Highest location counter, the end of a 20-bit address space.
const MAX_ADDRESS: u32 = 0x10_0000;

/// Intermediate representation handed from the first pass to the second.
#[derive(Debug, Clone)]
pub struct Ir {
    /// Label of `START`, empty when the program has none.
    pub name: String,
    pub start: u32,
    pub length: u32,
    pub lines: Vec<AssemblyLine>,
    pub symbols: SymbolTable,
    pub imports: IndexSet<String>,
    pub literals: IndexMap<String, u32>,
    pub source: Vec<String>,
}

struct Pass1 {
    name: String,
    start: u32,
    lc: u32,
    builder: SymbolTableBuilder,
    imports: IndexSet<String>,
    pool: LiteralPool,
    lines: Vec<AssemblyLine>,
}

pub fn run(source: &str) -> Result<Ir, Diag> {
    let source: Vec<String> = source.lines().map(str::to_string).collect();
    let mut pass = Pass1 {
        name: String::new(),
        start: 0,
        lc: 0,
        builder: SymbolTableBuilder::new(),
        imports: IndexSet::new(),
        pool: LiteralPool::new(),
        lines: vec![],
    };

    let mut first = true;
    let mut ended = false;
    for (idx, raw) in source.iter().enumerate() {
        let line = idx + 1;
        let Some(stmt) = Stmt::parse(raw).map_err(|e| e.at(line))? else {
            continue;
        };
        ended = pass.statement(line, stmt, first).map_err(|e| e.at(line))?;
        first = false;
        if ended {
            break;
        }
    }
    if !ended {
        return Err(Error::MissingEnd.at(source.len()));
    }

    let length = pass.lc - pass.start;
    debug!(
        "pass 1: `{}` at 0x{:06X}, 0x{:06X} bytes, {} lines",
        pass.name,
        pass.start,
        length,
        pass.lines.len()
    );
    Ok(Ir {
        name: pass.name,
        start: pass.start,
        length,
        lines: pass.lines,
        symbols: pass.builder.build(),
        imports: pass.imports,
        literals: pass.pool.into_addresses(),
        source,
    })
}

impl Pass1 {
    /// Returns true once `END` is reached.
    fn statement(&mut self, line: usize, stmt: Stmt, first: bool) -> Result<bool> {
        let operand = stmt.operand.as_deref().unwrap_or("");
        let mut size = 0;
        match stmt.code {
            Code::Dir(Directive::START) => {
                if !first {
                    return Err(Error::MisplacedStart);
                }
                let start = parse_with_prefix(operand)?;
                if !(0..MAX_ADDRESS as i64).contains(&start) {
                    return Err(Error::ValueRange {
                        value: start,
                        bits: 20,
                    });
                }
                self.start = start as u32;
                self.lc = self.start;
                if let Some(label) = &stmt.label {
                    self.name = label.clone();
                    self.builder.define_public(label, self.start)?;
                }
            }
            Code::Dir(Directive::END) => {
                self.push(line, stmt, 0);
                let literals = self.pool.flush(&mut self.lc)?;
                self.lines.extend(literals);
                self.check_lc()?;
                return Ok(true);
            }
            Code::Dir(Directive::EXTDEF) => {
                for name in operand.split(',') {
                    if !is_symbol(name) {
                        return Err(Error::InvalidSymbol(name.to_string()));
                    }
                    self.builder.export(name);
                }
            }
            Code::Dir(Directive::EXTREF) => {
                for name in operand.split(',') {
                    if !is_symbol(name) {
                        return Err(Error::InvalidSymbol(name.to_string()));
                    }
                    if self.builder.is_defined(name) {
                        return Err(Error::ImportConflict(name.to_string()));
                    }
                    self.imports.insert(name.to_string());
                }
            }
            Code::Dir(Directive::EQU) => {
                let label = stmt
                    .label
                    .as_deref()
                    .ok_or_else(|| Error::MissingLabel("EQU".to_string()))?;
                let value = self.eval(operand)?;
                if self.imports.contains(label) {
                    return Err(Error::ImportConflict(label.to_string()));
                }
                if value.is_absolute() {
                    if !(0..=0xFF_FFFF).contains(&value.constant) {
                        return Err(Error::ValueRange {
                            value: value.constant,
                            bits: 24,
                        });
                    }
                    self.builder.define_absolute(label, value.constant as u32)?;
                } else if value.relative == 1 && value.external.is_none() {
                    self.builder.define(label, value.constant as u32)?;
                } else {
                    return Err(Error::BadExpression(operand.to_string()));
                }
                self.push(line, stmt, 0);
                return Ok(false);
            }
            Code::Dir(Directive::LTORG) => {
                self.define_label(&stmt)?;
                self.push(line, stmt, 0);
                let literals = self.pool.flush(&mut self.lc)?;
                self.lines.extend(literals);
                self.check_lc()?;
                return Ok(false);
            }
            Code::Dir(Directive::BASE) | Code::Dir(Directive::NOBASE) => {
                self.define_label(&stmt)?;
            }
            Code::Dir(Directive::WORD) => {
                self.define_label(&stmt)?;
                size = 3;
            }
            Code::Dir(Directive::BYTE) => {
                self.define_label(&stmt)?;
                size = parse_bytes(operand)?.len() as u32;
            }
            Code::Dir(Directive::RESB) | Code::Dir(Directive::RESW) => {
                self.define_label(&stmt)?;
                let count = self.eval(operand)?;
                if !count.is_absolute() {
                    return Err(Error::BadExpression(operand.to_string()));
                }
                if !(0..MAX_ADDRESS as i64).contains(&count.constant) {
                    return Err(Error::ValueRange {
                        value: count.constant,
                        bits: 20,
                    });
                }
                let unit = if stmt.code == Code::Dir(Directive::RESW) { 3 } else { 1 };
                size = count.constant as u32 * unit;
            }
            Code::Op { info, extended } => {
                self.define_label(&stmt)?;
                if let Some(text) = &stmt.operand {
                    if info.operands == arch::op::Operands::Mem {
                        if let Target::Literal(lit) = MemOperand::parse(text)?.target {
                            self.pool.add(&lit);
                        }
                    }
                }
                size = info.len(extended);
            }
        }
        self.push(line, stmt, size);
        self.lc += size;
        self.check_lc()?;
        Ok(false)
    }

    fn push(&mut self, line: usize, stmt: Stmt, size: u32) {
        self.lines.push(AssemblyLine {
            line,
            label: stmt.label,
            code: stmt.code,
            operand: stmt.operand,
            address: self.lc,
            size,
        });
    }

    fn define_label(&mut self, stmt: &Stmt) -> Result<()> {
        if let Some(label) = &stmt.label {
            if self.imports.contains(label) {
                return Err(Error::ImportConflict(label.clone()));
            }
            self.builder.define(label, self.lc)?;
        }
        Ok(())
    }

    fn check_lc(&self) -> Result<()> {
        if self.lc > MAX_ADDRESS {
            return Err(Error::AddressOverflow(self.lc));
        }
        Ok(())
    }

    fn eval(&self, text: &str) -> Result<Value> {
        Expr::parse(text)?.eval(self.lc, |name| {
            if let Some(sym) = self.builder.get(name) {
                Some(if sym.absolute {
                    Value::absolute(sym.address as i64)
                } else {
                    Value::relative(sym.address)
                })
            } else if self.imports.contains(name) {
                Some(Value::external(name))
            } else {
                None
            }
        })
    }
}
