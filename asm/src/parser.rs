use std::fmt;
use std::str::FromStr;

use arch::op::{Format, Mnemonic, OpInfo, Operands};
use arch::reg::Reg;
use color_print::cformat;
use strum::{Display, EnumString};

use crate::error::{Error, Result};
use crate::expr::{is_symbol, parse_with_prefix, Expr};

// ----------------------------------------------------------------------------
// Directive

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum Directive {
    START,
    END,
    BYTE,
    WORD,
    RESB,
    RESW,
    BASE,
    NOBASE,
    EQU,
    LTORG,
    EXTDEF,
    EXTREF,
}

// ----------------------------------------------------------------------------
// Code

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Op {
        info: &'static OpInfo,
        /// Written with `+`, format 4.
        extended: bool,
    },
    Dir(Directive),
}

impl Code {
    pub fn parse(s: &str) -> Result<Code> {
        let (extended, name) = match s.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if let Ok(dir) = Directive::from_str(name) {
            if extended {
                return Err(Error::NotExtendable(s.to_string()));
            }
            return Ok(Code::Dir(dir));
        }
        let info = Mnemonic::parse(name)
            .map_err(|_| Error::UnknownOperation(s.to_string()))?
            .info();
        if extended && info.format != Format::F3 {
            return Err(Error::NotExtendable(s.to_string()));
        }
        Ok(Code::Op { info, extended })
    }

    /// True when `s` names an operation or directive, with or without `+`.
    pub fn is_keyword(s: &str) -> bool {
        let name = s.strip_prefix('+').unwrap_or(s);
        Directive::from_str(name).is_ok() || Mnemonic::parse(name).is_ok()
    }

    fn takes_operand(&self) -> bool {
        match self {
            Code::Op { info, .. } => info.operands != Operands::None,
            Code::Dir(Directive::NOBASE) | Code::Dir(Directive::LTORG) => false,
            Code::Dir(_) => true,
        }
    }

    fn requires_operand(&self) -> bool {
        self.takes_operand() && *self != Code::Dir(Directive::END)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Op { info, extended } => {
                write!(f, "{}{}", if *extended { "+" } else { "" }, info.mnemonic)
            }
            Code::Dir(dir) => write!(f, "{}", dir),
        }
    }
}

// ----------------------------------------------------------------------------
// Statement

/// One parsed source statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub label: Option<String>,
    pub code: Code,
    pub operand: Option<String>,
}

/// Splits a line into words. Quoted text stays in one word, words around a
/// comma are joined, and everything from a word starting with `.` is dropped.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut words = vec![];
    let mut cur = String::new();
    let mut quoted = false;
    for c in line.chars() {
        if c == '\'' {
            quoted = !quoted;
            cur.push(c);
        } else if c.is_whitespace() && !quoted {
            if !cur.is_empty() {
                words.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push(c);
        }
    }
    if !cur.is_empty() {
        words.push(cur);
    }

    if let Some(pos) = words.iter().position(|w| w.starts_with('.')) {
        words.truncate(pos);
    }

    let mut merged: Vec<String> = vec![];
    for word in words {
        match merged.last_mut() {
            Some(prev) if prev.ends_with(',') || word.starts_with(',') => prev.push_str(&word),
            _ => merged.push(word),
        }
    }
    merged
}

impl Stmt {
    /// Parses one source line. Blank and comment lines give `None`.
    pub fn parse(line: &str) -> Result<Option<Stmt>> {
        let mut words = tokenize(line).into_iter();
        let Some(first) = words.next() else {
            return Ok(None);
        };
        let (label, code) = if Code::is_keyword(&first) {
            (None, first)
        } else {
            if !is_symbol(&first) {
                return Err(Error::InvalidSymbol(first));
            }
            let code = words
                .next()
                .ok_or_else(|| Error::MissingOperation(first.clone()))?;
            (Some(first), code)
        };
        let code = Code::parse(&code)?;
        // Anything after the operand is a comment.
        let operand = if code.takes_operand() {
            words.next()
        } else {
            None
        };
        if code.requires_operand() && operand.is_none() {
            return Err(Error::MissingArgument(code.to_string()));
        }
        Ok(Some(Stmt {
            label,
            code,
            operand,
        }))
    }
}

/// A statement placed at its byte address by the first pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyLine {
    /// 1-based line in the source, 0 for generated literal lines.
    pub line: usize,
    pub label: Option<String>,
    pub code: Code,
    pub operand: Option<String>,
    pub address: u32,
    pub size: u32,
}

impl AssemblyLine {
    pub fn cformat(&self) -> String {
        cformat!(
            "<g>{:<8}</><r>{:<7}</><b>{}</>",
            self.label.as_deref().unwrap_or(""),
            self.code.to_string(),
            self.operand.as_deref().unwrap_or("")
        )
    }
}

// ----------------------------------------------------------------------------
// Operands

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    Simple,
    Immediate,
    Indirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Expr(Expr),
    /// Pooled constant, including the leading `=`.
    Literal(String),
}

/// Operand of a format 3/4 instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemOperand {
    pub mode: Addressing,
    pub target: Target,
    pub indexed: bool,
}

impl MemOperand {
    pub fn parse(s: &str) -> Result<MemOperand> {
        let (mode, rest) = if let Some(rest) = s.strip_prefix('#') {
            (Addressing::Immediate, rest)
        } else if let Some(rest) = s.strip_prefix('@') {
            (Addressing::Indirect, rest)
        } else {
            (Addressing::Simple, s)
        };
        let (rest, indexed) = match rest.strip_suffix(",X").or(rest.strip_suffix(",x")) {
            Some(rest) => (rest, true),
            None => (rest, false),
        };
        if indexed && mode != Addressing::Simple {
            return Err(Error::IndexedIndirect);
        }
        let target = if rest.starts_with('=') {
            if mode != Addressing::Simple {
                return Err(Error::ParseArgument(s.to_string(), "literal".to_string()));
            }
            Literal::parse(rest)?;
            Target::Literal(rest.to_string())
        } else {
            Target::Expr(Expr::parse(rest)?)
        };
        Ok(MemOperand {
            mode,
            target,
            indexed,
        })
    }
}

/// Register nibbles of a format 2 instruction.
pub fn parse_registers(operands: Operands, s: &str) -> Result<(u8, u8)> {
    fn reg(s: &str) -> Result<u8> {
        Reg::parse(s)
            .map(u8::from)
            .map_err(|_| Error::ParseArgument(s.to_string(), "register".to_string()))
    }
    fn number(s: &str, range: std::ops::RangeInclusive<i64>) -> Result<u8> {
        let n = parse_with_prefix(s)?;
        if range.contains(&n) {
            Ok(n as u8)
        } else {
            Err(Error::ValueRange { value: n, bits: 4 })
        }
    }
    fn pair(s: &str) -> Result<(&str, &str)> {
        s.split_once(',')
            .ok_or_else(|| Error::ParseArgument(s.to_string(), "register pair".to_string()))
    }
    match operands {
        Operands::Reg => Ok((reg(s)?, 0)),
        Operands::RegReg => {
            let (r1, r2) = pair(s)?;
            Ok((reg(r1)?, reg(r2)?))
        }
        Operands::RegN => {
            let (r1, n) = pair(s)?;
            Ok((reg(r1)?, number(n, 1..=16)? - 1))
        }
        Operands::N => Ok((number(s, 0..=15)?, 0)),
        Operands::None | Operands::Mem => {
            Err(Error::ParseArgument(s.to_string(), "register".to_string()))
        }
    }
}

// ----------------------------------------------------------------------------
// Data

/// Constant of a `BYTE` directive or a `=` literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bytes(Vec<u8>),
    Word(i64),
}

impl Literal {
    /// Parses `=C'..'`, `=X'..'` or `=<number>`.
    pub fn parse(s: &str) -> Result<Literal> {
        let body = s.strip_prefix('=').unwrap_or(s);
        if body.starts_with(|c: char| c == 'C' || c == 'c' || c == 'X' || c == 'x') {
            Ok(Literal::Bytes(parse_bytes(body)?))
        } else {
            Ok(Literal::Word(parse_with_prefix(body)?))
        }
    }

    /// Directive and operand that emit the literal's bytes.
    pub fn data(s: &str) -> (Directive, String) {
        let body = s.strip_prefix('=').unwrap_or(s);
        match Literal::parse(s) {
            Ok(Literal::Word(_)) => (Directive::WORD, body.to_string()),
            _ => (Directive::BYTE, body.to_string()),
        }
    }
}

/// Parses a `BYTE` operand: `C'text'` or `X'hex'`. An odd number of hex digits
/// is padded with a leading zero.
pub fn parse_bytes(s: &str) -> Result<Vec<u8>> {
    let err = || Error::ParseArgument(s.to_string(), "byte constant".to_string());
    let kind = s.chars().next().ok_or_else(err)?;
    let body = s
        .get(1..)
        .and_then(|rest| rest.strip_prefix('\''))
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(err)?;
    match kind {
        'C' | 'c' => Ok(body.bytes().collect()),
        'X' | 'x' => {
            if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(err());
            }
            let padded = if body.len() % 2 == 1 {
                format!("0{}", body)
            } else {
                body.to_string()
            };
            (0..padded.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&padded[i..i + 2], 16).map_err(|_| err()))
                .collect()
        }
        _ => Err(err()),
    }
}
