use std::path::Path;
use std::process::ExitCode;

use color_print::cprintln;
use sicasm::error::Error;
use sicasm::util::print_dump;

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
    /// Input files
    #[clap(required = true)]
    input: Vec<String>,

    /// Output file, only with a single input [default: <input>.obj]
    #[clap(short, long)]
    output: Option<String>,

    /// Dump assembly listing
    #[clap(short, long)]
    dump: bool,
}

fn report(err: &Error) {
    match std::error::Error::source(err) {
        Some(source) => cprintln!("<red,bold>error</>: {}: {}", err, source),
        None => cprintln!("<red,bold>error</>: {}", err),
    }
}

fn assemble_file(path: &str, output: &str, dump: bool) -> bool {
    println!("  < {}", path);
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            report(&Error::FileOpen(path.to_string(), e));
            return false;
        }
    };
    let (ir, obj) = match sicasm::assemble_with_ir(&source) {
        Ok(ok) => ok,
        Err(diag) => {
            let lines: Vec<String> = source.lines().map(str::to_string).collect();
            diag.print_diag(path, &lines);
            return false;
        }
    };
    if dump {
        print_dump(path, &ir, &obj);
    }
    println!("  > {}", output);
    if let Err(e) = std::fs::write(output, obj.to_text()) {
        report(&Error::FileWrite(output.to_string(), e));
        return false;
    }
    true
}

fn main() -> ExitCode {
    use clap::Parser;

    env_logger::init();
    let args: Args = Args::parse();
    println!("SIC/XE Assembler");

    if args.output.is_some() && args.input.len() > 1 {
        cprintln!("<red,bold>error</>: --output needs a single input file");
        return ExitCode::FAILURE;
    }

    let mut ok = true;
    for path in &args.input {
        let output = match &args.output {
            Some(output) => output.clone(),
            None => Path::new(path)
                .with_extension("obj")
                .to_string_lossy()
                .into_owned(),
        };
        ok &= assemble_file(path, &output, args.dump);
    }
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
