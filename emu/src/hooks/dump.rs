use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use arch::reg::Reg;
use serde::{Deserialize, Serialize};

use super::Hook;
use crate::error::{Error, Result};
use crate::model::{Machine, Step};

/// Prints registers and memory words when execution passes the configured
/// addresses.
#[derive(Debug)]
pub struct Dump {
    file: Option<String>,
    all: bool,
    list: List,
}

/// Instruction address to what gets printed after it runs.
#[derive(Debug, Default, Serialize, Deserialize)]
struct List(HashMap<u32, Config>);

#[derive(Debug, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    registers: bool,
    #[serde(default)]
    words: Vec<u32>,
}

impl Dump {
    pub fn arg(file: Option<String>, all: bool) -> Result<Self> {
        let list = match &file {
            Some(fname) => {
                let f = File::open(fname)
                    .map_err(|e| Error::FileOpen(fname.clone(), e.to_string()))?;
                serde_yaml::from_reader(BufReader::new(f))
                    .map_err(|e| Error::DumpConfig(fname.clone(), e.to_string()))?
            }
            None => List::default(),
        };
        Ok(Self { file, all, list })
    }

    fn get(&self, pc: u32) -> Option<&Config> {
        self.list.0.get(&pc)
    }
}

impl Hook for Dump {
    fn init(&mut self, _machine: &Machine) {
        if self.all {
            println!(" * Dump all");
        }
        if let Some(fname) = &self.file {
            println!(" * Dump[{}] {:?}", self.list.0.len(), fname);
        }
    }

    fn exec(&mut self, machine: &Machine, step: &Step) {
        if let Some(cfg) = self.get(step.pc) {
            if cfg.registers || self.all {
                print_reg(machine);
            }
            print_words(machine, &cfg.words);
        } else if self.all {
            print_reg(machine);
        }
    }
}

fn print_reg(machine: &Machine) {
    let r = |reg| machine.registers().raw(reg) as u32 & 0xFF_FFFF;
    println!(" +-------------+-------------+-------------+");
    println!(
        " |  A: {:06X} |  X: {:06X} |  L: {:06X} |",
        r(Reg::A),
        r(Reg::X),
        r(Reg::L)
    );
    println!(
        " |  B: {:06X} |  S: {:06X} |  T: {:06X} |",
        r(Reg::B),
        r(Reg::S),
        r(Reg::T)
    );
    println!(
        " | PC: {:06X} | SW: {:06X} |  F: {:012X}",
        r(Reg::PC),
        r(Reg::SW),
        machine.registers().raw(Reg::F) as u64 & 0xFFFF_FFFF_FFFF
    );
    println!(" +-------------+-------------+-------------+");
}

fn print_words(machine: &Machine, addrs: &[u32]) {
    for &addr in addrs {
        match machine.memory().load_word(addr) {
            Ok(value) => println!(
                " | {:06X} : {:06X}                          |",
                addr,
                value as u32 & 0xFF_FFFF
            ),
            Err(e) => println!(" | {:06X} : {}", addr, e),
        }
    }
    if !addrs.is_empty() {
        println!(" +-----------------------------------------+");
    }
}
