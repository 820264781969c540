use arch::inst::Inst;
use arch::obj::ObjectFile;
use color_print::cformat;

use crate::parser::{Code, Directive};
use crate::pass1::Ir;

fn hex(bytes: &[u8]) -> String {
    let shown: Vec<String> = bytes.iter().take(4).map(|b| format!("{:02X}", b)).collect();
    let more = if bytes.len() > 4 { ".." } else { "" };
    format!("{}{}", shown.join(" "), more)
}

/// Prints the assembled program as a listing: address, bytes, source line
/// and the decoded instruction.
pub fn print_dump(path: &str, ir: &Ir, obj: &ObjectFile) {
    println!(
        "{}+------[{}]{}",
        "-".repeat(19),
        path,
        "-".repeat(45usize.saturating_sub(path.len()))
    );
    for line in &ir.lines {
        let offset = (line.address - ir.start) as usize;
        let bytes = obj
            .code
            .get(offset..offset + line.size as usize)
            .unwrap_or(&[]);

        let (bin_str, decoded) = match line.code {
            Code::Op { .. } => match Inst::decode(bytes) {
                Ok(inst) => (hex(bytes), inst.cformat()),
                Err(_) => (cformat!("<r,s>!! !! !!</>"), String::new()),
            },
            Code::Dir(Directive::BYTE) | Code::Dir(Directive::WORD) => (hex(bytes), String::new()),
            Code::Dir(_) => (String::new(), String::new()),
        };
        let line_num = if line.line == 0 {
            "   *".to_string()
        } else {
            format!("{:>4}", line.line)
        };
        println!(
            "[{:06X}] {:<11} | {}: {} {}",
            line.address,
            bin_str,
            line_num,
            line.cformat(),
            decoded
        );
    }
    println!("-------------------+-----------------------------------------------------");
    for sym in obj.symbols.iter() {
        let kind = match (sym.public, sym.absolute) {
            (_, true) => cformat!("<y>#</>"),
            (true, false) => cformat!("<g>@</>"),
            (false, false) => " ".to_string(),
        };
        println!("{} 0x{:06X} {}", kind, sym.address, sym.name());
    }
    for name in &obj.imports {
        println!("{} ???????? {}", cformat!("<c>&</>"), name);
    }
}
