//! Operand expressions: `*`, numbers and symbols joined by `+` and `-`.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// `*`, the location counter of the current line.
    Here,
    Num(i64),
    Sym(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    text: String,
    terms: Vec<(bool, Term)>,
}

/// Result of evaluating an [`Expr`].
///
/// `relative` counts program-relative terms (`+1` per added address, `-1` per
/// subtracted one): 0 is an absolute constant, 1 an address in this program.
/// `external` names the imported symbol the value is an offset from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value {
    pub constant: i64,
    pub relative: i32,
    pub external: Option<String>,
}

impl Value {
    pub fn absolute(constant: i64) -> Self {
        Value {
            constant,
            ..Default::default()
        }
    }

    pub fn relative(address: u32) -> Self {
        Value {
            constant: address as i64,
            relative: 1,
            external: None,
        }
    }

    pub fn external(name: &str) -> Self {
        Value {
            external: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.relative == 0 && self.external.is_none()
    }
}

pub fn is_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parses `0x`/`0o`/`0b` prefixed or decimal integers, with an optional `-`.
pub fn parse_with_prefix(s: &str) -> Result<i64> {
    let err = || Error::ParseArgument(s.to_string(), "number".to_string());
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (radix, digits) = match body.get(..2) {
        Some("0x") | Some("0X") => (16, &body[2..]),
        Some("0o") | Some("0O") => (8, &body[2..]),
        Some("0b") | Some("0B") => (2, &body[2..]),
        _ => (10, body),
    };
    let value = i64::from_str_radix(digits, radix).map_err(|_| err())?;
    Ok(if neg { -value } else { value })
}

impl Term {
    fn parse(s: &str) -> Result<Term> {
        if s == "*" {
            Ok(Term::Here)
        } else if s.starts_with(|c: char| c.is_ascii_digit()) {
            Ok(Term::Num(parse_with_prefix(s)?))
        } else if is_symbol(s) {
            Ok(Term::Sym(s.to_string()))
        } else {
            Err(Error::ParseArgument(s.to_string(), "expression".to_string()))
        }
    }
}

impl Expr {
    pub fn parse(s: &str) -> Result<Expr> {
        let mut terms = vec![];
        let mut neg = false;
        let mut start = 0;
        // A leading sign belongs to the first term.
        let body = match s.strip_prefix('-') {
            Some(rest) => {
                neg = true;
                rest
            }
            None => s.strip_prefix('+').unwrap_or(s),
        };
        for (idx, c) in body.char_indices() {
            if c == '+' || c == '-' {
                terms.push((neg, Term::parse(&body[start..idx])?));
                neg = c == '-';
                start = idx + 1;
            }
        }
        terms.push((neg, Term::parse(&body[start..])?));
        Ok(Expr {
            text: s.to_string(),
            terms,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Symbols referenced by the expression.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|(_, t)| match t {
            Term::Sym(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn eval(&self, here: u32, lookup: impl Fn(&str) -> Option<Value>) -> Result<Value> {
        let mut acc = Value::default();
        for (neg, term) in &self.terms {
            let value = match term {
                Term::Here => Value::relative(here),
                Term::Num(n) => Value::absolute(*n),
                Term::Sym(s) => lookup(s).ok_or_else(|| Error::UndefinedSymbol(s.clone()))?,
            };
            if let Some(ext) = value.external {
                if *neg || acc.external.is_some() {
                    return Err(Error::BadExpression(self.text.clone()));
                }
                acc.external = Some(ext);
            }
            let constant = if *neg {
                acc.constant.checked_sub(value.constant)
            } else {
                acc.constant.checked_add(value.constant)
            };
            acc.constant = constant.ok_or(Error::ValueRange {
                value: value.constant,
                bits: 64,
            })?;
            if *neg {
                acc.relative -= value.relative;
            } else {
                acc.relative += value.relative;
            }
        }
        if acc.external.is_some() && acc.relative != 0 {
            return Err(Error::BadExpression(self.text.clone()));
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<Value> {
        match name {
            "BUFFER" => Some(Value::relative(0x36)),
            "BUFEND" => Some(Value::relative(0x1036)),
            "MAXLEN" => Some(Value::absolute(4096)),
            "RDREC" => Some(Value::external("RDREC")),
            _ => None,
        }
    }

    macro_rules! case {
        ($src:expr, $constant:expr, $relative:expr) => {
            let v = Expr::parse($src).unwrap().eval(0x100, lookup).unwrap();
            assert_eq!((v.constant, v.relative), ($constant, $relative), "{}", $src);
        };
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_with_prefix("4096").unwrap(), 4096);
        assert_eq!(parse_with_prefix("0x1000").unwrap(), 4096);
        assert_eq!(parse_with_prefix("0b101").unwrap(), 5);
        assert_eq!(parse_with_prefix("-12").unwrap(), -12);
        assert!(parse_with_prefix("12AB").is_err());
    }

    #[test]
    fn arithmetic() {
        case!("*", 0x100, 1);
        case!("*-3", 0xFD, 1);
        case!("BUFEND-BUFFER", 0x1000, 0);
        case!("BUFFER+MAXLEN", 0x1036, 1);
        case!("-5", -5, 0);
        case!("0x10+0x20", 0x30, 0);
    }

    #[test]
    fn external_offsets() {
        let v = Expr::parse("RDREC+3").unwrap().eval(0, lookup).unwrap();
        assert_eq!(v.external.as_deref(), Some("RDREC"));
        assert_eq!(v.constant, 3);
        assert!(matches!(
            Expr::parse("BUFFER-RDREC").unwrap().eval(0, lookup),
            Err(Error::BadExpression(_))
        ));
        assert!(matches!(
            Expr::parse("RDREC+BUFFER").unwrap().eval(0, lookup),
            Err(Error::BadExpression(_))
        ));
    }

    #[test]
    fn undefined() {
        assert!(matches!(
            Expr::parse("NOPE+1").unwrap().eval(0, lookup),
            Err(Error::UndefinedSymbol(s)) if s == "NOPE"
        ));
        assert!(Expr::parse("A++B").is_err());
        assert!(Expr::parse("").is_err());
    }

    #[test]
    fn overflow_is_a_range_error() {
        assert!(matches!(
            Expr::parse("9223372036854775807+1").unwrap().eval(0, lookup),
            Err(Error::ValueRange { bits: 64, .. })
        ));
        assert!(matches!(
            Expr::parse("-9223372036854775807-2").unwrap().eval(0, lookup),
            Err(Error::ValueRange { bits: 64, .. })
        ));
    }
}
