use indexmap::IndexMap;
use log::debug;

use crate::error::Result;
use crate::parser::{AssemblyLine, Code, Literal};

/// Literals waiting for the next `LTORG` or `END`, and the ones already
/// placed. A literal is placed once; later uses share the first address.
#[derive(Debug, Default)]
pub struct LiteralPool {
    entries: IndexMap<String, Option<u32>>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, literal: &str) {
        self.entries.entry(literal.to_string()).or_insert(None);
    }

    /// Places every pending literal at `lc`, advancing it, and returns the
    /// generated data lines.
    pub fn flush(&mut self, lc: &mut u32) -> Result<Vec<AssemblyLine>> {
        let mut lines = vec![];
        for (text, address) in self.entries.iter_mut() {
            if address.is_some() {
                continue;
            }
            let size = match Literal::parse(text)? {
                Literal::Bytes(bytes) => bytes.len() as u32,
                Literal::Word(_) => 3,
            };
            let (dir, operand) = Literal::data(text);
            debug!("literal {} at 0x{:06X}", text, lc);
            *address = Some(*lc);
            lines.push(AssemblyLine {
                line: 0,
                label: None,
                code: Code::Dir(dir),
                operand: Some(operand),
                address: *lc,
                size,
            });
            *lc += size;
        }
        Ok(lines)
    }

    /// Placed literals and their addresses.
    pub fn into_addresses(self) -> IndexMap<String, u32> {
        self.entries
            .into_iter()
            .filter_map(|(text, address)| address.map(|a| (text, a)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Directive;

    #[test]
    fn placed_once() {
        let mut pool = LiteralPool::new();
        pool.add("=C'EOF'");
        pool.add("=X'05'");
        pool.add("=C'EOF'");
        let mut lc = 0x100;
        let lines = pool.flush(&mut lc).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].code, Code::Dir(Directive::BYTE));
        assert_eq!(lines[0].operand.as_deref(), Some("C'EOF'"));
        assert_eq!(lines[1].address, 0x103);
        assert_eq!(lc, 0x104);

        pool.add("=C'EOF'");
        pool.add("=5");
        let lines = pool.flush(&mut lc).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].code, Code::Dir(Directive::WORD));
        assert_eq!(lc, 0x107);

        let addresses = pool.into_addresses();
        assert_eq!(addresses["=C'EOF'"], 0x100);
        assert_eq!(addresses["=5"], 0x104);
    }
}
