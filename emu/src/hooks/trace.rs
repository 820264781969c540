use color_print::cprintln;

use super::Hook;
use crate::model::{Machine, Step};

/// Prints every executed instruction.
pub struct Trace {
    enabled: bool,
}

impl Trace {
    pub fn arg(enabled: bool) -> Self {
        Trace { enabled }
    }
}

impl Hook for Trace {
    fn init(&mut self, _machine: &Machine) {
        if self.enabled {
            println!(" * Trace");
        }
    }

    fn exec(&mut self, machine: &Machine, step: &Step) {
        if !self.enabled {
            return;
        }
        let halt = if step.halted { " HALT" } else { "" };
        cprintln!(
            "<s>{:>8}</> <y>{:06X}</> {}<r,s>{}</>",
            machine.steps(),
            step.pc,
            step.inst.cformat(),
            halt
        );
    }
}
