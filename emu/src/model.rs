use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arch::alu::{self, Cc, WORD_MASK};
use arch::inst::{DecodeError, Inst};
use arch::op::{Cond, Exec, OpInfo};
use arch::reg::{Reg, Width};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::register::Registers;

/// Return address the loader puts in L; `RSUB` to it halts the machine.
pub const HALT_ADDRESS: u32 = 0xFF_FFFF;

/// One executed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub pc: u32,
    pub inst: Inst,
    pub halted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Pause after every instruction.
    pub delay: Option<Duration>,
    pub max_steps: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    Stopped,
    StepLimit,
}

/// Read-only copy of the machine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub a: i32,
    pub x: i32,
    pub l: i32,
    pub b: i32,
    pub s: i32,
    pub t: i32,
    pub f: i64,
    pub pc: u32,
    pub sw: i32,
    pub cc: Cc,
    pub steps: u64,
    pub halted: bool,
    pub fault: Option<String>,
}

/// Where an operand lives after address calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Immediate(i32),
    Address(u32),
}

#[derive(Debug, Clone)]
pub struct Machine {
    memory: Memory,
    registers: Registers,
    fault: Option<Error>,
    halted: bool,
    steps: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Machine::with_memory(Memory::default())
    }
}

impl Machine {
    pub fn new(memory_size: usize) -> Result<Self> {
        Ok(Machine::with_memory(Memory::new(memory_size)?))
    }

    pub fn with_memory(memory: Memory) -> Self {
        Machine {
            memory,
            registers: Registers::new(),
            fault: None,
            halted: false,
            steps: 0,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    /// Makes a faulted machine runnable again from the failing instruction.
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Clears registers, status and counters; memory is kept.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.fault = None;
        self.halted = false;
        self.steps = 0;
    }

    pub fn snapshot(&self) -> Snapshot {
        let r = |reg| self.registers.raw(reg) as i32;
        Snapshot {
            a: r(Reg::A),
            x: r(Reg::X),
            l: r(Reg::L),
            b: r(Reg::B),
            s: r(Reg::S),
            t: r(Reg::T),
            f: self.registers.raw(Reg::F),
            pc: self.registers.pc(),
            sw: r(Reg::SW),
            cc: self.registers.cc(),
            steps: self.steps,
            halted: self.halted,
            fault: self.fault.as_ref().map(|e| e.to_string()),
        }
    }
}

// Run loop
impl Machine {
    /// Executes one instruction. On error the PC is put back on the failing
    /// instruction and the machine stays faulted until [`Machine::clear_fault`].
    pub fn step(&mut self) -> Result<Step> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if self.halted {
            return Err(Error::Halted);
        }
        let pc = self.registers.pc();
        match self.exec(pc) {
            Ok(step) => {
                self.steps += 1;
                self.halted = step.halted;
                Ok(step)
            }
            Err(err) => {
                warn!("fault at 0x{:06X}: {}", pc, err);
                self.registers.set_pc(pc);
                self.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn run(&mut self, opts: RunOptions, stop: &AtomicBool) -> Result<Outcome> {
        self.run_with(opts, stop, |_, _| {})
    }

    /// Steps until halt, `stop` is raised, or the step limit is reached.
    /// `on_step` sees the machine after every instruction.
    pub fn run_with(
        &mut self,
        opts: RunOptions,
        stop: &AtomicBool,
        mut on_step: impl FnMut(&Machine, &Step),
    ) -> Result<Outcome> {
        let mut count = 0;
        loop {
            if self.halted {
                return Ok(Outcome::Halted);
            }
            if stop.load(Ordering::Relaxed) {
                return Ok(Outcome::Stopped);
            }
            if opts.max_steps.is_some_and(|max| count >= max) {
                return Ok(Outcome::StepLimit);
            }
            let step = self.step()?;
            on_step(self, &step);
            count += 1;
            if let Some(delay) = opts.delay {
                std::thread::sleep(delay);
            }
        }
    }
}

// Instruction execution
impl Machine {
    fn exec(&mut self, pc: u32) -> Result<Step> {
        let window = self.memory.fetch_window(pc)?;
        let inst = Inst::decode(window).map_err(|e| match e {
            DecodeError::UnknownOpcode(opcode) => Error::InvalidOpcode { opcode, pc },
            DecodeError::Truncated(len) => Error::OutOfBounds {
                addr: pc,
                len: len as u32,
                size: self.memory.size(),
            },
        })?;
        let info = inst.info().ok_or(Error::InvalidOpcode {
            opcode: inst.opcode(),
            pc,
        })?;
        let next = (pc + inst.len()) & WORD_MASK;
        self.registers.set_pc(next);
        trace!("0x{:06X}: {:?}", pc, inst);

        let halted = self.dispatch(pc, next, &inst, info)?;
        Ok(Step { pc, inst, halted })
    }

    fn dispatch(&mut self, pc: u32, next: u32, inst: &Inst, info: &OpInfo) -> Result<bool> {
        match info.exec {
            Exec::Load(reg) => {
                let op = self.operand(inst, pc, next)?;
                let value = match reg.width() {
                    Width::Long => self.read_long(op)?,
                    Width::Word => self.read_word(op)? as i64,
                };
                self.registers.set_value(reg, value);
            }
            Exec::LoadChar => {
                let byte = match self.operand(inst, pc, next)? {
                    Operand::Immediate(v) => v as u8,
                    Operand::Address(addr) => self.memory.read_byte(addr)?,
                };
                let a = self.registers.get_int_value(Reg::A)?;
                self.registers.set_value(Reg::A, (a & !0xFF | byte as i32) as i64);
            }
            Exec::Store(reg) => {
                let addr = self.store_address(inst, pc, next)?;
                match reg.width() {
                    Width::Long => {
                        let value = self.registers.get_long_value(reg)?;
                        self.memory.store_long(addr, value)?;
                    }
                    Width::Word => {
                        let value = self.registers.get_int_value(reg)?;
                        self.memory.store_word(addr, value)?;
                    }
                }
            }
            Exec::StoreChar => {
                let addr = self.store_address(inst, pc, next)?;
                let a = self.registers.get_int_value(Reg::A)?;
                self.memory.write_byte(addr, a as u8)?;
            }
            Exec::Arith(op) => {
                let m = self.operand(inst, pc, next)?;
                let m = self.read_word(m)?;
                let a = self.registers.get_int_value(Reg::A)?;
                let result = alu::valu(op, a, m).ok_or(Error::DivisionByZero(pc))?;
                self.registers.set_value(Reg::A, result as i64);
                if op.sets_cc() {
                    self.registers.set_cc(alu::compare(result, 0));
                }
            }
            Exec::Comp => {
                let m = self.operand(inst, pc, next)?;
                let m = self.read_word(m)?;
                let a = self.registers.get_int_value(Reg::A)?;
                self.registers.set_cc(alu::compare(a, m));
            }
            Exec::Tix => {
                let m = self.operand(inst, pc, next)?;
                let m = self.read_word(m)?;
                let x = self.increment_x()?;
                self.registers.set_cc(alu::compare(x, m));
            }
            Exec::Jump(cond) => {
                let target = self.jump_target(inst, pc, next)?;
                let taken = match cond {
                    Cond::Always => true,
                    Cond::Eq => self.registers.cc() == Cc::Eq,
                    Cond::Gt => self.registers.cc() == Cc::Gt,
                    Cond::Lt => self.registers.cc() == Cc::Lt,
                };
                if taken {
                    self.registers.set_pc(target);
                    return Ok(target == pc);
                }
            }
            Exec::Jsub => {
                let target = self.jump_target(inst, pc, next)?;
                self.registers.set_value(Reg::L, next as i64);
                self.registers.set_pc(target);
            }
            Exec::Rsub => {
                let ret = self.registers.get_int_value(Reg::L)? as u32 & WORD_MASK;
                self.registers.set_pc(ret);
                return Ok(ret == HALT_ADDRESS);
            }
            Exec::ArithR(op) => {
                let (r1, r2) = registers(inst, pc)?;
                let v1 = self.registers.get_int_value(r1)?;
                let v2 = self.registers.get_int_value(r2)?;
                let result = alu::valu(op, v2, v1).ok_or(Error::DivisionByZero(pc))?;
                self.registers.set_value(r2, result as i64);
                if op.sets_cc() {
                    self.registers.set_cc(alu::compare(result, 0));
                }
            }
            Exec::CompR => {
                let (r1, r2) = registers(inst, pc)?;
                let v1 = self.registers.get_int_value(r1)?;
                let v2 = self.registers.get_int_value(r2)?;
                self.registers.set_cc(alu::compare(v1, v2));
            }
            Exec::Clear => {
                let (r1, _) = registers(inst, pc)?;
                self.registers.set_value(r1, 0);
            }
            Exec::Rmo => {
                let (r1, r2) = registers(inst, pc)?;
                let value = match r1.width() {
                    Width::Word => self.registers.get_int_value(r1)? as i64,
                    Width::Long => self.registers.get_long_value(r1)?,
                };
                if r2.width() != r1.width() {
                    return Err(Error::RegisterWidth {
                        reg: r2,
                        actual: r2.width().bits(),
                        requested: r1.width().bits(),
                    });
                }
                self.registers.set_value(r2, value);
            }
            Exec::ShiftL | Exec::ShiftR => {
                let (r1, n) = raw_nibbles(inst, pc)?;
                let r1 = Registers::by_number(r1)?;
                let value = self.registers.get_int_value(r1)?;
                let shifted = if info.exec == Exec::ShiftL {
                    alu::shift_left(value, n as u32 + 1)
                } else {
                    alu::shift_right(value, n as u32 + 1)
                };
                self.registers.set_value(r1, shifted as i64);
            }
            Exec::TixR => {
                let (r1, _) = registers(inst, pc)?;
                let v1 = self.registers.get_int_value(r1)?;
                let x = self.increment_x()?;
                self.registers.set_cc(alu::compare(x, v1));
            }
            Exec::Unsupported => {
                return Err(Error::Unsupported {
                    mnemonic: info.mnemonic,
                    pc,
                })
            }
        }
        Ok(false)
    }

    /// Applies base/PC-relative, indexed, immediate and indirect addressing.
    fn operand(&self, inst: &Inst, pc: u32, next: u32) -> Result<Operand> {
        let (n, i, x, addr) = match *inst {
            Inst::F3 { flags, disp, .. } => {
                let addr = if flags.b {
                    self.registers.get_int_value(Reg::B)? as i64 + disp as i64
                } else if flags.p {
                    next as i64 + alu::sext(disp as i64, 12)
                } else {
                    disp as i64
                };
                (flags.n, flags.i, flags.x, addr)
            }
            Inst::F4 { flags, addr, .. } => (flags.n, flags.i, flags.x, addr as i64),
            Inst::Sic { x, addr, .. } => (true, true, x, addr as i64),
            Inst::F1 { opcode } | Inst::F2 { opcode, .. } => {
                return Err(Error::InvalidOpcode { opcode, pc })
            }
        };
        let addr = if x {
            addr + self.registers.get_int_value(Reg::X)? as i64
        } else {
            addr
        };
        let addr = (addr as u32) & WORD_MASK;
        match (n, i) {
            (false, true) => Ok(Operand::Immediate(alu::word(addr as i64))),
            (true, false) => {
                let pointer = self.memory.load_word(addr)? as u32 & WORD_MASK;
                Ok(Operand::Address(pointer))
            }
            _ => Ok(Operand::Address(addr)),
        }
    }

    fn read_word(&self, op: Operand) -> Result<i32> {
        match op {
            Operand::Immediate(v) => Ok(v),
            Operand::Address(addr) => self.memory.load_word(addr),
        }
    }

    fn read_long(&self, op: Operand) -> Result<i64> {
        match op {
            Operand::Immediate(v) => Ok(v as i64),
            Operand::Address(addr) => self.memory.load_long(addr),
        }
    }

    fn store_address(&self, inst: &Inst, pc: u32, next: u32) -> Result<u32> {
        match self.operand(inst, pc, next)? {
            Operand::Address(addr) => Ok(addr),
            Operand::Immediate(_) => Err(Error::StoreImmediate(pc)),
        }
    }

    /// `J #addr` jumps to `addr`, `J addr` too; `J @ptr` follows the pointer.
    fn jump_target(&self, inst: &Inst, pc: u32, next: u32) -> Result<u32> {
        Ok(match self.operand(inst, pc, next)? {
            Operand::Immediate(v) => v as u32 & WORD_MASK,
            Operand::Address(addr) => addr,
        })
    }

    fn increment_x(&mut self) -> Result<i32> {
        let x = alu::word(self.registers.get_int_value(Reg::X)? as i64 + 1);
        self.registers.set_value(Reg::X, x as i64);
        Ok(x)
    }
}

fn raw_nibbles(inst: &Inst, pc: u32) -> Result<(u8, u8)> {
    match *inst {
        Inst::F2 { r1, r2, .. } => Ok((r1, r2)),
        _ => Err(Error::InvalidOpcode {
            opcode: inst.opcode(),
            pc,
        }),
    }
}

fn registers(inst: &Inst, pc: u32) -> Result<(Reg, Reg)> {
    let (r1, r2) = raw_nibbles(inst, pc)?;
    Ok((Registers::by_number(r1)?, Registers::by_number(r2)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::op::Mnemonic;

    fn machine(code: &[u8]) -> Machine {
        let mut m = Machine::new(4096).unwrap();
        m.memory_mut().write_slice(0, code).unwrap();
        m
    }

    // LDA #5 / ADD #4 / STA 0x100 / HALT J HALT
    const ADD_PROGRAM: [u8; 12] = [
        0x01, 0x00, 0x05, 0x19, 0x00, 0x04, 0x0F, 0x01, 0x00, 0x3F, 0x2F, 0xFD,
    ];

    #[test]
    fn runs_until_self_jump() {
        let mut m = machine(&ADD_PROGRAM);
        let stop = AtomicBool::new(false);
        let mut pcs = vec![];
        let outcome = m
            .run_with(RunOptions::default(), &stop, |_, step| pcs.push(step.pc))
            .unwrap();
        assert_eq!(outcome, Outcome::Halted);
        assert_eq!(pcs, vec![0, 3, 6, 9]);
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(9));
        assert_eq!(m.memory().load_word(0x100), Ok(9));
        assert_eq!(m.registers().cc(), Cc::Gt);
        assert_eq!(m.step(), Err(Error::Halted));
    }

    #[test]
    fn step_limit_and_stop_flag() {
        let mut m = machine(&ADD_PROGRAM);
        let opts = RunOptions {
            max_steps: Some(2),
            ..Default::default()
        };
        let stop = AtomicBool::new(false);
        assert_eq!(m.run(opts, &stop), Ok(Outcome::StepLimit));
        assert_eq!(m.steps(), 2);
        assert_eq!(m.registers().pc(), 6);

        stop.store(true, Ordering::Relaxed);
        assert_eq!(m.run(RunOptions::default(), &stop), Ok(Outcome::Stopped));
        assert_eq!(m.steps(), 2);
    }

    #[test]
    fn fault_keeps_state_until_cleared() {
        // LDA #1 / DIV #0
        let mut m = machine(&[0x01, 0x00, 0x01, 0x25, 0x00, 0x00]);
        m.step().unwrap();
        assert_eq!(m.step(), Err(Error::DivisionByZero(3)));
        assert_eq!(m.registers().pc(), 3);
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(1));
        assert_eq!(m.step(), Err(Error::DivisionByZero(3)));
        assert_eq!(m.snapshot().fault.as_deref(), Some("Division by zero at 0x000003"));

        m.memory_mut().write_byte(5, 1).unwrap();
        m.clear_fault();
        let step = m.step().unwrap();
        assert_eq!(step.pc, 3);
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(1));
    }

    #[test]
    fn unsupported_instruction() {
        let mut m = machine(&[0x5B, 0x00, 0x00]);
        assert_eq!(
            m.step(),
            Err(Error::Unsupported {
                mnemonic: Mnemonic::ADDF,
                pc: 0
            })
        );
    }

    #[test]
    fn invalid_opcode() {
        let mut m = machine(&[0xFF]);
        assert_eq!(
            m.step(),
            Err(Error::InvalidOpcode {
                opcode: 0xFF,
                pc: 0
            })
        );
    }

    #[test]
    fn rsub_to_sentinel_halts() {
        let mut m = machine(&[0x4C, 0x00, 0x00]);
        m.registers_mut().set_value(Reg::L, HALT_ADDRESS as i64);
        let step = m.step().unwrap();
        assert!(step.halted);
        assert!(m.is_halted());
    }

    #[test]
    fn indirect_and_indexed() {
        // LDA @0x200 / LDX #3 / LDA 0x300,X
        let mut m = machine(&[0x02, 0x02, 0x00, 0x05, 0x00, 0x03, 0x03, 0x83, 0x00]);
        m.memory_mut().store_word(0x200, 0x300).unwrap();
        m.memory_mut().store_word(0x300, 0x2A).unwrap();
        m.memory_mut().store_word(0x303, 7).unwrap();
        m.step().unwrap();
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(0x2A));
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(7));
    }

    #[test]
    fn register_ops() {
        // LDS #6 / LDT #2 / SUBR S,T / RMO T,F
        let mut m = machine(&[0x6D, 0x00, 0x06, 0x75, 0x00, 0x02, 0x94, 0x45, 0xAC, 0x56]);
        m.step().unwrap();
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.registers().get_int_value(Reg::T), Ok(-4));
        assert_eq!(m.registers().cc(), Cc::Lt);
        assert_eq!(
            m.step(),
            Err(Error::RegisterWidth {
                reg: Reg::F,
                actual: 48,
                requested: 24
            })
        );
        assert_eq!(m.registers().pc(), 8);
    }

    #[test]
    fn shift_encodes_count_minus_one() {
        // LDA #1 / SHIFTL A,4
        let mut m = machine(&[0x01, 0x00, 0x01, 0xA4, 0x03]);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.registers().get_int_value(Reg::A), Ok(16));
    }

    #[test]
    fn store_to_immediate_is_rejected() {
        // STA #0x10
        let mut m = machine(&[0x0D, 0x00, 0x10]);
        assert_eq!(m.step(), Err(Error::StoreImmediate(0)));
    }

    #[test]
    fn snapshot_serializes() {
        let mut m = machine(&ADD_PROGRAM);
        m.run(RunOptions::default(), &AtomicBool::new(false)).unwrap();
        let yaml = serde_yaml::to_string(&m.snapshot()).unwrap();
        assert!(yaml.contains("a: 9"));
        assert!(yaml.contains("halted: true"));
    }
}
