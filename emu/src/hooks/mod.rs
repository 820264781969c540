pub mod dump;
pub mod trace;

use crate::model::{Machine, Step};

/// Side effects run by the `sicemu` binary around the execution loop.
pub trait Hook {
    fn init(&mut self, machine: &Machine);
    fn exec(&mut self, machine: &Machine, step: &Step);
}
