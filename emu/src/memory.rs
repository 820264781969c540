use std::ops::Range;

use arch::alu::{sext, word};

use crate::error::{Error, Result};

pub const MIN_SIZE: usize = 1024;
pub const DEFAULT_SIZE: usize = 1 << 20;

/// Byte-addressed main memory. Accesses outside it fail, never wrap.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Result<Self> {
        if size < MIN_SIZE {
            return Err(Error::MemorySize(size));
        }
        Ok(Memory {
            bytes: vec![0; size],
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn range(&self, addr: u32, len: u32) -> Result<Range<usize>> {
        let begin = addr as usize;
        match begin.checked_add(len as usize) {
            Some(end) if end <= self.bytes.len() => Ok(begin..end),
            _ => Err(Error::OutOfBounds {
                addr,
                len,
                size: self.bytes.len(),
            }),
        }
    }

    pub fn read_byte(&self, addr: u32) -> Result<u8> {
        Ok(self.bytes[self.range(addr, 1)?][0])
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        let range = self.range(addr, 1)?;
        self.bytes[range][0] = value;
        Ok(())
    }

    fn word_range(&self, word_addr: u32) -> Result<Range<usize>> {
        let addr = word_addr.checked_mul(3).ok_or(Error::OutOfBounds {
            addr: u32::MAX,
            len: 3,
            size: self.bytes.len(),
        })?;
        self.range(addr, 3)
    }

    /// Word `word_addr`, at byte `word_addr * 3`.
    pub fn read_word(&self, word_addr: u32) -> Result<[u8; 3]> {
        let range = self.word_range(word_addr)?;
        let b = &self.bytes[range];
        Ok([b[0], b[1], b[2]])
    }

    pub fn write_word(&mut self, word_addr: u32, bytes: [u8; 3]) -> Result<()> {
        let range = self.word_range(word_addr)?;
        self.bytes[range].copy_from_slice(&bytes);
        Ok(())
    }

    pub fn read_slice(&self, addr: u32, len: u32) -> Result<&[u8]> {
        Ok(&self.bytes[self.range(addr, len)?])
    }

    pub fn write_slice(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let range = self.range(addr, data.len() as u32)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Signed 24-bit value at byte `addr`.
    pub fn load_word(&self, addr: u32) -> Result<i32> {
        let raw = self
            .read_slice(addr, 3)?
            .iter()
            .fold(0i64, |acc, &b| acc << 8 | b as i64);
        Ok(word(raw))
    }

    pub fn store_word(&mut self, addr: u32, value: i32) -> Result<()> {
        let v = value as u32;
        self.write_slice(addr, &[(v >> 16) as u8, (v >> 8) as u8, v as u8])
    }

    /// Signed 48-bit value at byte `addr`.
    pub fn load_long(&self, addr: u32) -> Result<i64> {
        let raw = self
            .read_slice(addr, 6)?
            .iter()
            .fold(0i64, |acc, &b| acc << 8 | b as i64);
        Ok(sext(raw, 48))
    }

    pub fn store_long(&mut self, addr: u32, value: i64) -> Result<()> {
        let bytes = value.to_be_bytes();
        self.write_slice(addr, &bytes[2..])
    }

    /// Up to four bytes from `addr`, fewer at the end of memory.
    pub fn fetch_window(&self, addr: u32) -> Result<&[u8]> {
        let range = self.range(addr, 1)?;
        let end = (range.start + 4).min(self.bytes.len());
        Ok(&self.bytes[range.start..end])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory {
            bytes: vec![0; DEFAULT_SIZE],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_size() {
        assert_eq!(Memory::new(1023).unwrap_err(), Error::MemorySize(1023));
        assert_eq!(Memory::new(1024).unwrap().size(), 1024);
        assert_eq!(Memory::default().size(), DEFAULT_SIZE);
    }

    #[test]
    fn bytes_and_words() {
        let mut mem = Memory::new(1024).unwrap();
        mem.write_word(2, [0x12, 0x34, 0x56]).unwrap();
        assert_eq!(mem.read_byte(6).unwrap(), 0x12);
        assert_eq!(mem.read_byte(8).unwrap(), 0x56);
        assert_eq!(mem.read_word(2).unwrap(), [0x12, 0x34, 0x56]);
        mem.write_byte(7, 0xFF).unwrap();
        assert_eq!(mem.load_word(6).unwrap(), 0x12FF56);
    }

    #[test]
    fn signed_values() {
        let mut mem = Memory::new(1024).unwrap();
        mem.store_word(10, -2).unwrap();
        assert_eq!(mem.read_slice(10, 3).unwrap(), &[0xFF, 0xFF, 0xFE]);
        assert_eq!(mem.load_word(10).unwrap(), -2);
        mem.store_long(20, -3).unwrap();
        assert_eq!(mem.load_long(20).unwrap(), -3);
        mem.store_long(20, 0x1234_5678_9ABC).unwrap();
        assert_eq!(mem.read_byte(20).unwrap(), 0x12);
        assert_eq!(mem.load_long(20).unwrap(), 0x1234_5678_9ABC);
    }

    #[test]
    fn out_of_bounds() {
        let mut mem = Memory::new(1024).unwrap();
        assert!(matches!(mem.read_byte(1024), Err(Error::OutOfBounds { addr: 1024, .. })));
        assert!(mem.write_byte(1023, 1).is_ok());
        assert!(mem.read_word(340).is_ok());
        assert!(mem.read_word(341).is_err());
        assert!(mem.load_word(1022).is_err());
        assert!(mem.write_slice(1020, &[0; 5]).is_err());
        assert!(mem.read_word(u32::MAX).is_err());
    }

    #[test]
    fn window_shrinks_at_the_end() {
        let mem = Memory::new(1024).unwrap();
        assert_eq!(mem.fetch_window(0).unwrap().len(), 4);
        assert_eq!(mem.fetch_window(1022).unwrap().len(), 2);
        assert!(mem.fetch_window(1024).is_err());
    }
}
