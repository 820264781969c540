use arch::obj::ObjectFile;

use crate::error::{Error, Result};
use crate::module_name;

/// Address range a module occupies in the linked image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub begin: u32,
    /// Exclusive.
    pub end: u32,
    pub name: String,
}

impl Section {
    fn new(begin: u32, len: u32, name: String) -> Self {
        Self {
            begin,
            end: begin + len,
            name,
        }
    }

    fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    fn overlaps(&self, other: &Section) -> bool {
        self.begin < other.end && other.begin < self.end
    }
}

/// Keeps every module at its own start address.
pub fn absolute(modules: &[ObjectFile]) -> Result<Vec<Section>> {
    let sections: Vec<Section> = modules
        .iter()
        .enumerate()
        .map(|(idx, m)| Section::new(m.start, m.len(), module_name(m, idx)))
        .collect();

    let mut sorted: Vec<&Section> = sections.iter().filter(|s| !s.is_empty()).collect();
    sorted.sort_by_key(|s| s.begin);
    for pair in sorted.windows(2) {
        if pair[0].overlaps(pair[1]) {
            return Err(Error::Overlap(
                pair[0].name.clone(),
                pair[1].name.clone(),
                pair[1].begin,
            ));
        }
    }
    Ok(sections)
}

/// Lays modules end to end from address 0, in input order.
pub fn concatenated(modules: &[ObjectFile]) -> Vec<Section> {
    let mut cum = 0;
    modules
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            let section = Section::new(cum, m.len(), module_name(m, idx));
            cum = section.end;
            section
        })
        .collect()
}

/// Lowest begin and highest end over all sections.
pub fn span(sections: &[Section]) -> (u32, u32) {
    let begin = sections.iter().map(|s| s.begin).min().unwrap_or(0);
    let end = sections.iter().map(|s| s.end).max().unwrap_or(begin);
    (begin, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, start: u32, len: usize) -> ObjectFile {
        ObjectFile {
            name: name.to_string(),
            start,
            code: vec![0; len],
            ..Default::default()
        }
    }

    #[test]
    fn disjoint_modules() {
        let modules = [module("B", 0x2000, 0x10), module("A", 0x1000, 0x1000)];
        let sections = absolute(&modules).unwrap();
        assert_eq!(span(&sections), (0x1000, 0x2010));
    }

    #[test]
    fn overlapping_modules() {
        let modules = [module("A", 0x1000, 0x20), module("B", 0x101F, 4)];
        assert!(matches!(
            absolute(&modules),
            Err(Error::Overlap(a, b, 0x101F)) if a == "A" && b == "B"
        ));
    }

    #[test]
    fn empty_module_never_overlaps() {
        let modules = [module("A", 0x1000, 0x20), module("", 0x1010, 0)];
        assert!(absolute(&modules).is_ok());
    }

    #[test]
    fn concatenation() {
        let modules = [module("A", 0x1000, 5), module("", 0x1000, 7), module("C", 0, 1)];
        let sections = concatenated(&modules);
        let begins: Vec<u32> = sections.iter().map(|s| s.begin).collect();
        assert_eq!(begins, vec![0, 5, 12]);
        assert_eq!(sections[1].name, "#1");
        assert_eq!(span(&sections), (0, 13));
    }
}
