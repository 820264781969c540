use std::process::ExitCode;

use arch::obj::ObjectFile;
use color_print::cprintln;
use siclink::{link, Error, Mode};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input object files
    #[clap(required = true)]
    input: Vec<String>,

    /// Output file
    #[clap(short, long, default_value = "a.obj")]
    output: String,

    /// Link mode
    #[clap(short, long, value_enum, default_value_t = Mode::Absolute)]
    mode: Mode,
}

fn report(err: &Error) {
    match std::error::Error::source(err) {
        Some(source) => cprintln!("<red,bold>error</>: {}: {}", err, source),
        None => cprintln!("<red,bold>error</>: {}", err),
    }
}

fn read_module(path: &str) -> Result<ObjectFile, Error> {
    let text =
        std::fs::read_to_string(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
    ObjectFile::from_text(&text).map_err(|source| Error::Object {
        module: path.to_string(),
        source,
    })
}

fn run(args: &Args) -> Result<(), Error> {
    let mut modules = vec![];
    for path in &args.input {
        println!("  < {}", path);
        modules.push(read_module(path)?);
    }

    let linked = link(&modules, args.mode)?;

    println!("  > {}", args.output);
    std::fs::write(&args.output, &linked.text)
        .map_err(|e| Error::FileWrite(args.output.clone(), e))?;

    for sym in linked.object.symbols.public() {
        cprintln!("<g>0x{:06X}</> {}", sym.address, sym.name());
    }
    for name in &linked.object.imports {
        cprintln!("<r>????????</> {}", name);
    }
    Ok(())
}

fn main() -> ExitCode {
    use clap::Parser;

    env_logger::init();
    let args: Args = Args::parse();
    println!("SIC/XE Linker ({} mode)", args.mode);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}
