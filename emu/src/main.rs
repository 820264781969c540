use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_print::cprintln;

use sicemu::hooks::{dump::Dump, trace::Trace, Hook};
use sicemu::{Error, Machine, Outcome, RunOptions};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Parser, Debug)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Object file (H/D/R/T/M/E text)
    input: String,

    /// Load address for relocatable objects, decimal or 0x hex
    #[arg(short, long, value_parser = parse_addr)]
    base: Option<u32>,

    /// Memory size in bytes
    #[arg(short, long, default_value_t = sicemu::memory::DEFAULT_SIZE)]
    memory: usize,

    /// Stop after this many instructions
    #[arg(short = 't', long)]
    tmax: Option<u64>,

    /// Pause between instructions
    #[arg(long)]
    delay_ms: Option<u64>,

    /// YAML file of addresses to dump at
    #[arg(short, long)]
    dump_cfg: Option<String>,

    /// Dump registers after every instruction
    #[arg(short = 'a', long)]
    dump_all: bool,

    /// Print every executed instruction
    #[arg(long)]
    trace: bool,
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("Invalid address `{}`: {}", s, e))
}

fn report(err: &Error) {
    cprintln!("<red,bold>error</>: {}", err);
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    println!("SIC/XE Emulator");

    println!("+-----------------------------------------------+");
    println!("| {:<45} |", args.input);
    println!("+-----------------------------------------------+");

    let mut machine = match Machine::new(args.memory) {
        Ok(machine) => machine,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };
    let loaded = match machine.load_file(&args.input, args.base) {
        Ok(loaded) => loaded,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "[LOAD] 0x{:06X} bytes at 0x{:06X}, entry 0x{:06X}",
        loaded.length, loaded.base, loaded.entry
    );

    println!("[INIT]");
    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(Trace::arg(args.trace))];
    match Dump::arg(args.dump_cfg, args.dump_all) {
        Ok(dump) => hooks.push(Box::new(dump)),
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    }
    for hook in hooks.iter_mut() {
        hook.init(&machine);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            log::warn!("no Ctrl-C handler: {}", e);
        }
    }

    let opts = RunOptions {
        delay: args.delay_ms.map(Duration::from_millis),
        max_steps: args.tmax,
    };
    let outcome = machine.run_with(opts, &stop, |machine, step| {
        for hook in hooks.iter_mut() {
            hook.exec(machine, step);
        }
    });

    println!("=================================================");
    let code = match outcome {
        Ok(Outcome::Halted) => {
            println!("[HALT] after {} steps", machine.steps());
            ExitCode::SUCCESS
        }
        Ok(Outcome::Stopped) => {
            println!("[STOP] interrupted after {} steps", machine.steps());
            ExitCode::SUCCESS
        }
        Ok(Outcome::StepLimit) => {
            println!("[STOP] step limit reached");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    };
    match serde_yaml::to_string(&machine.snapshot()) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => log::warn!("snapshot: {}", e),
    }
    code
}
