use arch::alu::{sext, Cc, WORD_MASK};
use arch::reg::{Reg, Width};

use crate::error::{Error, Result};

/// The nine architectural registers. F holds 48 bits, the rest 24; every
/// value is kept sign-extended from its width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    values: [i64; 10],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.values = [0; 10];
    }

    fn check(reg: Reg, requested: Width) -> Result<()> {
        if reg.width() == requested {
            Ok(())
        } else {
            Err(Error::RegisterWidth {
                reg,
                actual: reg.width().bits(),
                requested: requested.bits(),
            })
        }
    }

    pub fn get_int_value(&self, reg: Reg) -> Result<i32> {
        Self::check(reg, Width::Word)?;
        Ok(self.values[u8::from(reg) as usize] as i32)
    }

    pub fn get_long_value(&self, reg: Reg) -> Result<i64> {
        Self::check(reg, Width::Long)?;
        Ok(self.values[u8::from(reg) as usize])
    }

    pub fn set_value(&mut self, reg: Reg, value: i64) {
        self.values[u8::from(reg) as usize] = sext(value, reg.width().bits());
    }

    /// Raw value regardless of width, for snapshots.
    pub fn raw(&self, reg: Reg) -> i64 {
        self.values[u8::from(reg) as usize]
    }

    /// Register named by a format 2 nibble.
    pub fn by_number(n: u8) -> Result<Reg> {
        Reg::try_from(n).map_err(|_| Error::InvalidRegister(n))
    }

    pub fn pc(&self) -> u32 {
        self.raw(Reg::PC) as u32 & WORD_MASK
    }

    pub fn set_pc(&mut self, addr: u32) {
        self.set_value(Reg::PC, (addr & WORD_MASK) as i64);
    }

    pub fn cc(&self) -> Cc {
        Cc::try_from((self.raw(Reg::SW) & 0b11) as u8).unwrap_or_default()
    }

    pub fn set_cc(&mut self, cc: Cc) {
        let sw = self.raw(Reg::SW) & !0b11 | u8::from(cc) as i64;
        self.set_value(Reg::SW, sw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_are_enforced() {
        let regs = Registers::new();
        assert!(regs.get_int_value(Reg::A).is_ok());
        assert_eq!(
            regs.get_int_value(Reg::F),
            Err(Error::RegisterWidth {
                reg: Reg::F,
                actual: 48,
                requested: 24
            })
        );
        assert!(regs.get_long_value(Reg::X).is_err());
        assert!(regs.get_long_value(Reg::F).is_ok());
    }

    #[test]
    fn values_wrap_to_width() {
        let mut regs = Registers::new();
        regs.set_value(Reg::A, 0xFF_FFFF);
        assert_eq!(regs.get_int_value(Reg::A), Ok(-1));
        regs.set_value(Reg::T, 0x100_0005);
        assert_eq!(regs.get_int_value(Reg::T), Ok(5));
        regs.set_value(Reg::F, 0xFFFF_FFFF_FFFF);
        assert_eq!(regs.get_long_value(Reg::F), Ok(-1));
        regs.set_value(Reg::F, 1 << 40);
        assert_eq!(regs.get_long_value(Reg::F), Ok(1 << 40));
    }

    #[test]
    fn pc_and_condition_code() {
        let mut regs = Registers::new();
        regs.set_pc(0xFF_FFFF);
        assert_eq!(regs.pc(), 0xFF_FFFF);
        regs.set_value(Reg::SW, 0x40);
        regs.set_cc(Cc::Gt);
        assert_eq!(regs.cc(), Cc::Gt);
        assert_eq!(regs.get_int_value(Reg::SW), Ok(0x42));
        regs.set_cc(Cc::Eq);
        assert_eq!(regs.get_int_value(Reg::SW), Ok(0x40));
    }

    #[test]
    fn register_numbers() {
        assert_eq!(Registers::by_number(8), Ok(Reg::PC));
        assert_eq!(Registers::by_number(7), Err(Error::InvalidRegister(7)));
    }
}
