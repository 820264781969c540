use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

pub const WORD_MASK: u32 = 0xFF_FFFF;
pub const WORD_BITS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ALU {
    ADD,
    SUB,
    MUL,
    DIV,
    AND,
    OR,
}

impl ALU {
    /// Arithmetic results update the condition code, logic results do not.
    pub fn sets_cc(self) -> bool {
        matches!(self, ALU::ADD | ALU::SUB | ALU::MUL | ALU::DIV)
    }
}

/// Condition code, kept in the low two bits of SW.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum Cc {
    #[default]
    Eq = 0,
    Lt = 1,
    Gt = 2,
}

/// Sign-extends the low `bits` of `value`.
pub fn sext(value: i64, bits: u32) -> i64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Wraps `value` into a signed 24-bit word.
pub fn word(value: i64) -> i32 {
    sext(value, WORD_BITS) as i32
}

/// Returns `None` on division by zero.
pub fn valu(op: ALU, a: i32, b: i32) -> Option<i32> {
    use ALU::*;
    let (a, b) = (a as i64, b as i64);
    let result = match op {
        ADD => a + b,
        SUB => a - b,
        MUL => a * b,
        DIV => a.checked_div(b)?,
        AND => a & b,
        OR => a | b,
    };
    Some(word(result))
}

pub fn compare(a: i32, b: i32) -> Cc {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Cc::Lt,
        std::cmp::Ordering::Equal => Cc::Eq,
        std::cmp::Ordering::Greater => Cc::Gt,
    }
}

/// Circular shift within 24 bits.
pub fn shift_left(value: i32, n: u32) -> i32 {
    let v = value as u32 & WORD_MASK;
    let n = n % WORD_BITS;
    let rotated = ((v << n) | (v >> (WORD_BITS - n))) & WORD_MASK;
    word(rotated as i64)
}

/// Arithmetic shift; vacated bits take the sign bit.
pub fn shift_right(value: i32, n: u32) -> i32 {
    word(value as i64 >> n.min(WORD_BITS - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_alu {
        ($($name:ident: $op:expr, $a:expr, $b:expr => $want:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(valu($op, $a, $b), $want);
                }
            )*
        }
    }

    test_alu! {
        add: ALU::ADD, 5, 4 => Some(9),
        add_wraps: ALU::ADD, 0x7F_FFFF, 1 => Some(-0x80_0000),
        sub_negative: ALU::SUB, 4, 5 => Some(-1),
        mul: ALU::MUL, -3, 7 => Some(-21),
        div_truncates: ALU::DIV, 7, 2 => Some(3),
        div_zero: ALU::DIV, 7, 0 => None,
        and: ALU::AND, 0b1100, 0b1010 => Some(0b1000),
        or: ALU::OR, 0b1100, 0b1010 => Some(0b1110),
    }

    #[test]
    fn compare_orders() {
        assert_eq!(compare(1, 2), Cc::Lt);
        assert_eq!(compare(2, 2), Cc::Eq);
        assert_eq!(compare(-1, -2), Cc::Gt);
    }

    #[test]
    fn shifts() {
        assert_eq!(shift_left(0x80_0001, 1), 0x03);
        assert_eq!(shift_left(0x12_3456, 0), 0x12_3456);
        assert_eq!(shift_right(-8, 2), -2);
        assert_eq!(shift_right(8, 2), 2);
    }

    #[test]
    fn sext_24() {
        assert_eq!(word(0xFF_FFFF), -1);
        assert_eq!(word(0x1_000_005), 5);
        assert_eq!(sext(0x800, 12), -2048);
    }
}
