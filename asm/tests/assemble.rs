use arch::obj::{ObjectFile, RelocationRecord};
use pretty_assertions::assert_eq;
use sicasm::{assemble, Error};

const SAMP01: &str = "\
SAMP01  START   0
        LDA     FIVE
        ADD     FOUR
        STA     RESULT
        RSUB
FIVE    WORD    5
FOUR    WORD    4
RESULT  WORD    0
        END
";

fn bytes(hex: &str) -> Vec<u8> {
    let hex: String = hex.split_whitespace().collect();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn samp01() {
    let obj = assemble(SAMP01).unwrap();
    assert_eq!(
        obj.code,
        bytes("032009 1B2009 0F2009 4C0000 000005 000004 000000")
    );
    assert_eq!(obj.symbols.address("FIVE"), Some(0x0C));
    assert_eq!(obj.symbols.address("FOUR"), Some(0x0F));
    assert_eq!(obj.symbols.address("RESULT"), Some(0x12));
    assert!(obj.relocations.is_empty());
    assert!(!obj.fully_relocated);
    assert_eq!(obj.entry, 0);
    assert_eq!(obj.source.as_ref().map(|s| s.len()), Some(9));
}

#[test]
fn samp01_with_entry_label() {
    let src = "\
SAMP01  START   0
FIRST   LDA     FIVE
        ADD     FOUR
        STA     RESULT
        RSUB
FIVE    WORD    5
FOUR    WORD    4
RESULT  RESW    1
        END     FIRST
";
    let obj = assemble(src).unwrap();
    assert_eq!(
        obj.code,
        bytes("032009 1B2009 0F2009 4C0000 000005 000004 000000")
    );
    assert_eq!(obj.symbols.address("FIRST"), Some(0));
    assert_eq!(obj.symbols.address("RESULT"), Some(0x12));
    assert_eq!(obj.entry, 0);
    assert!(obj.relocations.is_empty());
}

#[test]
fn samp01_object_text() {
    let obj = assemble(SAMP01).unwrap();
    assert_eq!(
        obj.to_text(),
        "H^SAMP01^000000^000015\n\
         D^SAMP01^000000\n\
         T^000000^15^0320091B20090F20094C0000000005000004000000\n\
         E^000000\n"
    );
}

#[test]
fn pc_relative_limits() {
    let forward = |gap: u32| format!("P START 0\n LDA FAR\n RESB {}\nFAR WORD 0\n END\n", gap);
    let obj = assemble(&forward(2047)).unwrap();
    assert_eq!(obj.code[..3], bytes("0327FF")[..]);
    let diag = assemble(&forward(2048)).unwrap_err();
    assert_eq!(diag.line, 2);
    assert!(matches!(diag.error, Error::DisplacementRange { .. }));

    let backward = |gap: u32| format!("BACK RESB {}\n LDA BACK\n END\n", gap);
    let obj = assemble(&backward(2045)).unwrap();
    assert_eq!(obj.code[2045..], bytes("032800")[..]);
    let diag = assemble(&backward(2046)).unwrap_err();
    assert_eq!(diag.line, 2);
    assert!(matches!(diag.error, Error::DisplacementRange { .. }));
}

#[test]
fn base_relative() {
    let src = "\
P       START   0
        +LDB    #TABLE
        BASE    TABLE
        LDA     TABLE+6
        NOBASE
        RESB    3000
TABLE   WORD    1
        END
";
    let obj = assemble(src).unwrap();
    assert_eq!(obj.code[..7], bytes("69100BBF 034006")[..]);
    assert_eq!(obj.relocations, vec![RelocationRecord::address20(0, "P")]);

    let far = src.replace("        NOBASE\n", "").replace("        BASE    TABLE\n", "        NOBASE\n");
    let diag = assemble(&far).unwrap_err();
    assert_eq!(diag.line, 4);
}

#[test]
fn addressing_modes() {
    let src = "\
        LDA     #5
        LDT     #BUF
        STCH    BUF,X
        J       @PTR
        CLEAR   X
        SHIFTL  A,4
        COMPR   A,S
        FIX
BUF     RESB    2
PTR     WORD    BUF
        END
";
    let obj = assemble(src).unwrap();
    assert_eq!(
        obj.code[..19],
        bytes("010005 75200D 57A00A 3E2009 B410 A403 A004 C4")[..]
    );
    // No program name: addresses stay absolute.
    assert!(obj.relocations.is_empty());
    assert_eq!(obj.code[21..], bytes("000013")[..]);
}

#[test]
fn external_references() {
    let src = "\
PROG    START   0x1000
        EXTDEF  DATA
        EXTREF  EXT
        +JSUB   EXT
        LDA     EXT
        +LDA    DATA
DATA    WORD    EXT+3
        WORD    DATA
        END     PROG
";
    let obj = assemble(src).unwrap();
    assert_eq!(
        obj.code,
        bytes("4B100000 032000 0310000B 000003 00000B")
    );
    assert_eq!(
        obj.relocations,
        vec![
            RelocationRecord::address20(0, "EXT"),
            RelocationRecord::displacement(4, "EXT"),
            RelocationRecord::address20(7, "PROG"),
            RelocationRecord::word(0xB, "EXT"),
            RelocationRecord::word(0xE, "PROG"),
        ]
    );
    assert_eq!(obj.entry, 0x1000);
    assert!(obj.imports.contains("EXT"));
    assert!(obj.symbols.get("DATA").unwrap().public);

    let text = obj.to_text();
    assert!(text.contains("R^EXT\n"));
    assert!(text.contains("M^001005^03^+EXT\n"));
    assert!(text.contains("M^00100E^06^+PROG\n"));
    let back = ObjectFile::from_text(&text).unwrap();
    assert_eq!(back.code, obj.code);
    assert_eq!(back.relocations, obj.relocations);
}

#[test]
fn literals() {
    let src = "\
P       START   0
        LDA     =X'05'
        LDCH    =C'Z'
        LTORG
        COMP    =3
        LDA     =X'05'
        END
";
    let obj = assemble(src).unwrap();
    // pool one at 6..8, =3 at 14..17
    assert_eq!(obj.code[6..8], bytes("055A")[..]);
    assert_eq!(obj.code[14..17], bytes("000003")[..]);
    assert_eq!(obj.code[..3], bytes("032003")[..]);
    // reuses the first placement at 6
    assert_eq!(obj.code[11..14], bytes("032FF8")[..]);
    assert_eq!(obj.len(), 17);
}

#[test]
fn text_records_cover_code() {
    let src = "\
BIG     START   0x2000
        LDA     #1
        RESB    40
        WORD    7
        BYTE    C'HELLO WORLD'
        END
";
    let obj = assemble(src).unwrap();
    let text = obj.to_text();
    let header_len = text
        .lines()
        .next()
        .and_then(|h| h.split('^').nth(3))
        .map(|l| u32::from_str_radix(l, 16).unwrap())
        .unwrap();
    let mut payload = vec![];
    let mut total = 0;
    for t in text.lines().filter(|l| l.starts_with("T^")) {
        let fields: Vec<&str> = t.split('^').collect();
        let len = usize::from_str_radix(fields[2], 16).unwrap();
        assert!(len <= 30);
        total += len as u32;
        payload.extend(bytes(fields[3]));
    }
    assert_eq!(payload, obj.code);
    assert_eq!(total, header_len);
    assert_eq!(header_len, 3 + 40 + 3 + 11);
}

#[test]
fn pass_two_errors_carry_lines() {
    let diag = assemble("P START 0\n LDA NOWHERE\n END\n").unwrap_err();
    assert_eq!(diag.line, 2);
    assert!(matches!(diag.error, Error::UndefinedSymbol(ref s) if s == "NOWHERE"));

    let diag = assemble(" +LDA #0x100000\n END\n").unwrap_err();
    assert!(matches!(diag.error, Error::ValueRange { bits: 20, .. }));

    let diag = assemble(" WORD 9223372036854775807+1\n END\n").unwrap_err();
    assert_eq!(diag.line, 1);
    assert!(matches!(diag.error, Error::ValueRange { .. }));
}

#[test]
fn large_constants_need_format_four() {
    let src = |op: &str| format!("P START 0x1000\n {}\n RSUB\n END\n", op);
    for op in ["LDA #5000", "LDA 5000", "LDA #4096"] {
        let diag = assemble(&src(op)).unwrap_err();
        assert_eq!(diag.line, 2, "{}", op);
        assert!(
            matches!(diag.error, Error::ValueRange { bits: 12, .. }),
            "{}: {}",
            op,
            diag
        );
    }
    let obj = assemble(&src("LDA #4095")).unwrap();
    assert_eq!(obj.code[..3], bytes("010FFF")[..]);
    let obj = assemble(&src("+LDA #5000")).unwrap();
    assert_eq!(obj.code[..4], bytes("01101388")[..]);
    assert!(obj.relocations.is_empty());
}

#[test]
fn external_displacement_keeps_addend() {
    let src = "P START 0x2000\n EXTREF EXT\n LDA EXT+6\n STA EXT-1\n END\n";
    let obj = assemble(src).unwrap();
    assert_eq!(obj.code, bytes("032006 0F2FFF"));
    assert_eq!(
        obj.relocations,
        vec![
            RelocationRecord::displacement(0, "EXT"),
            RelocationRecord::displacement(3, "EXT"),
        ]
    );

    let far = "P START 0\n EXTREF EXT\n LDA EXT+2048\n END\n";
    let diag = assemble(far).unwrap_err();
    assert!(matches!(diag.error, Error::ValueRange { bits: 12, .. }));
}
