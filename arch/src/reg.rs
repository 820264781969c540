use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Architectural registers. The discriminant is the register number used in
/// format 2 instructions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Reg {
    A = 0,
    X = 1,
    L = 2,
    B = 3,
    S = 4,
    T = 5,
    F = 6,
    PC = 8,
    SW = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Word,
    Long,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::Word => 24,
            Width::Long => 48,
        }
    }
}

impl Reg {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown reg name: {s}")),
        }
    }

    pub fn width(self) -> Width {
        match self {
            Reg::F => Width::Long,
            _ => Width::Word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Reg::parse("sw"), Ok(Reg::SW));
        assert_eq!(Reg::parse("Pc"), Ok(Reg::PC));
        assert!(Reg::parse("R7").is_err());
    }

    #[test]
    fn numbers_follow_format2_encoding() {
        assert_eq!(u8::from(Reg::T), 5);
        assert_eq!(Reg::try_from(8u8).ok(), Some(Reg::PC));
        assert!(Reg::try_from(7u8).is_err());
    }

    #[test]
    fn only_f_is_long() {
        assert_eq!(Reg::F.width().bits(), 48);
        assert_eq!(Reg::SW.width(), Width::Word);
    }
}
