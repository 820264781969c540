use color_print::cformat;
use thiserror::Error;

use crate::op::{self, Format, OpInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub n: bool,
    pub i: bool,
    pub x: bool,
    pub b: bool,
    pub p: bool,
    pub e: bool,
}

impl Flags {
    pub const SIMPLE: Flags = Flags {
        n: true,
        i: true,
        x: false,
        b: false,
        p: false,
        e: false,
    };

    fn ni(&self) -> u8 {
        (self.n as u8) << 1 | self.i as u8
    }

    fn xbpe(&self) -> u8 {
        (self.x as u8) << 3 | (self.b as u8) << 2 | (self.p as u8) << 1 | self.e as u8
    }

    fn from_bytes(b0: u8, b1: u8) -> Flags {
        Flags {
            n: b0 & 0x02 != 0,
            i: b0 & 0x01 != 0,
            x: b1 & 0x80 != 0,
            b: b1 & 0x40 != 0,
            p: b1 & 0x20 != 0,
            e: b1 & 0x10 != 0,
        }
    }
}

/// One machine instruction in any of the encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    F1 { opcode: u8 },
    F2 { opcode: u8, r1: u8, r2: u8 },
    /// 12-bit displacement.
    F3 { opcode: u8, flags: Flags, disp: u16 },
    /// 20-bit address.
    F4 { opcode: u8, flags: Flags, addr: u32 },
    /// Plain SIC encoding (`n = i = 0`), 15-bit address.
    Sic { opcode: u8, x: bool, addr: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unknown opcode byte 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("Instruction needs {0} bytes")]
    Truncated(usize),
}

impl Inst {
    pub fn opcode(&self) -> u8 {
        match self {
            Inst::F1 { opcode }
            | Inst::F2 { opcode, .. }
            | Inst::F3 { opcode, .. }
            | Inst::F4 { opcode, .. }
            | Inst::Sic { opcode, .. } => *opcode,
        }
    }

    pub fn info(&self) -> Option<&'static OpInfo> {
        op::by_opcode(self.opcode())
    }

    pub fn len(&self) -> u32 {
        match self {
            Inst::F1 { .. } => 1,
            Inst::F2 { .. } => 2,
            Inst::F3 { .. } | Inst::Sic { .. } => 3,
            Inst::F4 { .. } => 4,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Inst::F1 { opcode } => vec![opcode],
            Inst::F2 { opcode, r1, r2 } => vec![opcode, (r1 & 0xF) << 4 | (r2 & 0xF)],
            Inst::F3 { opcode, flags, disp } => vec![
                opcode | flags.ni(),
                flags.xbpe() << 4 | ((disp >> 8) & 0xF) as u8,
                disp as u8,
            ],
            Inst::F4 { opcode, flags, addr } => vec![
                opcode | flags.ni(),
                flags.xbpe() << 4 | ((addr >> 16) & 0xF) as u8,
                (addr >> 8) as u8,
                addr as u8,
            ],
            Inst::Sic { opcode, x, addr } => vec![
                opcode,
                (x as u8) << 7 | ((addr >> 8) & 0x7F) as u8,
                addr as u8,
            ],
        }
    }

    /// Decodes the instruction at the start of `bytes`; trailing bytes are
    /// ignored.
    pub fn decode(bytes: &[u8]) -> Result<Inst, DecodeError> {
        let need = |n: usize| {
            if bytes.len() < n {
                Err(DecodeError::Truncated(n))
            } else {
                Ok(())
            }
        };
        need(1)?;
        let b0 = bytes[0];
        let opcode = b0 & 0xFC;
        let info = op::by_opcode(opcode).ok_or(DecodeError::UnknownOpcode(b0))?;
        match info.format {
            Format::F1 => Ok(Inst::F1 { opcode }),
            Format::F2 => {
                need(2)?;
                Ok(Inst::F2 {
                    opcode,
                    r1: bytes[1] >> 4,
                    r2: bytes[1] & 0xF,
                })
            }
            Format::F3 => {
                need(3)?;
                let (b1, b2) = (bytes[1], bytes[2]);
                if b0 & 0x03 == 0 {
                    return Ok(Inst::Sic {
                        opcode,
                        x: b1 & 0x80 != 0,
                        addr: ((b1 & 0x7F) as u16) << 8 | b2 as u16,
                    });
                }
                let flags = Flags::from_bytes(b0, b1);
                if flags.e {
                    need(4)?;
                    let addr = ((b1 & 0xF) as u32) << 16 | (b2 as u32) << 8 | bytes[3] as u32;
                    Ok(Inst::F4 {
                        opcode,
                        flags,
                        addr,
                    })
                } else {
                    let disp = ((b1 & 0xF) as u16) << 8 | b2 as u16;
                    Ok(Inst::F3 {
                        opcode,
                        flags,
                        disp,
                    })
                }
            }
        }
    }
}

impl Inst {
    pub fn cformat(&self) -> String {
        let name = match self.info() {
            Some(info) => info.mnemonic.to_string(),
            None => format!("?{:02X}", self.opcode()),
        };

        fn addressing(flags: &Flags) -> &'static str {
            match (flags.n, flags.i) {
                (false, true) => "#",
                (true, false) => "@",
                _ => "",
            }
        }

        match self {
            Inst::F1 { .. } => cformat!("<r>{:<7}</>", name),
            Inst::F2 { r1, r2, .. } => cformat!("<r>{:<7}</><b>{},{}</>", name, r1, r2),
            Inst::F3 { flags, disp, .. } => {
                let rel = match (flags.b, flags.p) {
                    (true, _) => "(B)",
                    (_, true) => "(PC)",
                    _ => "",
                };
                let idx = if flags.x { ",X" } else { "" };
                cformat!(
                    "<r>{:<7}</><b>{}<y>0x{:03X}</>{}{}</>",
                    name,
                    addressing(flags),
                    disp,
                    rel,
                    idx
                )
            }
            Inst::F4 { flags, addr, .. } => {
                let idx = if flags.x { ",X" } else { "" };
                cformat!(
                    "<r>+{:<6}</><b>{}<y>0x{:05X}</>{}</>",
                    name,
                    addressing(flags),
                    addr,
                    idx
                )
            }
            Inst::Sic { x, addr, .. } => {
                let idx = if *x { ",X" } else { "" };
                cformat!("<r>{:<7}</><b><y>0x{:04X}</>{}</>", name, addr, idx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lda_pc_relative() {
        let inst = Inst::F3 {
            opcode: 0x00,
            flags: Flags {
                p: true,
                ..Flags::SIMPLE
            },
            disp: 0x009,
        };
        assert_eq!(inst.encode(), vec![0x03, 0x20, 0x09]);
        assert_eq!(Inst::decode(&[0x03, 0x20, 0x09, 0xFF]), Ok(inst));
    }

    #[test]
    fn extended_jsub() {
        let bytes = [0x4B, 0x10, 0x10, 0x36];
        let inst = Inst::decode(&bytes).unwrap();
        assert_eq!(
            inst,
            Inst::F4 {
                opcode: 0x48,
                flags: Flags {
                    e: true,
                    ..Flags::SIMPLE
                },
                addr: 0x01036,
            }
        );
        assert_eq!(inst.encode(), bytes.to_vec());
        assert_eq!(inst.len(), 4);
    }

    #[test]
    fn rsub_is_plain_sic() {
        let inst = Inst::decode(&[0x4C, 0x00, 0x00]).unwrap();
        assert_eq!(
            inst,
            Inst::Sic {
                opcode: 0x4C,
                x: false,
                addr: 0
            }
        );
    }

    #[test]
    fn register_pairs() {
        let inst = Inst::decode(&[0x90, 0x45]).unwrap();
        assert_eq!(
            inst,
            Inst::F2 {
                opcode: 0x90,
                r1: 4,
                r2: 5
            }
        );
    }

    #[test]
    fn errors() {
        assert_eq!(Inst::decode(&[0xFF]), Err(DecodeError::UnknownOpcode(0xFF)));
        assert_eq!(Inst::decode(&[0x03, 0x10, 0x00]), Err(DecodeError::Truncated(4)));
        assert_eq!(Inst::decode(&[]), Err(DecodeError::Truncated(1)));
    }
}
