//! Bidirectional codec between 16-bit big-endian instruction words and the
//! fields they carry.
//!
//! Every instruction family (the top nibble) stores its operands in one of six
//! bit layouts. The letters name what each nibble holds: `I` selects the
//! instruction, `X`/`Y` are register indices, `KK` is an 8-bit immediate,
//! `N` a 4-bit immediate and `NNN` a 12-bit address.
//!
//! ```text
//! IIII  00E0 00EE
//! INNN  1nnn 2nnn Annn Bnnn
//! IXII  Ex9E ExA1 Fx07 Fx0A Fx15 Fx18 Fx1E Fx29 Fx33 Fx55 Fx65
//! IXKK  3xkk 4xkk 6xkk 7xkk Cxkk
//! IXYI  5xy0 8xy0..8xyE 9xy0
//! IXYN  Dxyn
//! ```
use std::fmt;

use crate::error::{Chip8Error, Result};

/// length of one instruction in memory
pub const INSTRUCTION_LENGTH: u16 = 2;

/// Which bit layout an instruction word uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    Iiii,
    Innn,
    Ixii,
    Ixkk,
    Ixyi,
    Ixyn,
}

impl Pattern {
    /// the layout registered for an instruction family, if any
    pub fn for_type_nibble(type_nibble: u8) -> Option<Pattern> {
        match type_nibble {
            0x0 => Some(Pattern::Iiii),
            0x1 | 0x2 | 0xA | 0xB => Some(Pattern::Innn),
            0xE | 0xF => Some(Pattern::Ixii),
            0x3 | 0x4 | 0x6 | 0x7 | 0xC => Some(Pattern::Ixkk),
            0x5 | 0x8 | 0x9 => Some(Pattern::Ixyi),
            0xD => Some(Pattern::Ixyn),
            _ => None,
        }
    }

    /// whether instructions of this layout carry `field`
    pub fn uses(self, field: Field) -> bool {
        use Field::*;
        match self {
            Pattern::Iiii => false,
            Pattern::Innn => field == Nnn,
            Pattern::Ixii => field == X,
            Pattern::Ixkk => matches!(field, X | Kk),
            Pattern::Ixyi => matches!(field, X | Y),
            Pattern::Ixyn => matches!(field, X | Y | N),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::Iiii => "IIII",
            Pattern::Innn => "INNN",
            Pattern::Ixii => "IXII",
            Pattern::Ixkk => "IXKK",
            Pattern::Ixyi => "IXYI",
            Pattern::Ixyn => "IXYN",
        };
        f.write_str(name)
    }
}

/// An operand slot inside an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Nnn,
    X,
    Y,
    Kk,
    N,
}

impl Field {
    /// largest value the field's bit width can hold
    pub fn max(self) -> u16 {
        match self {
            Field::Nnn => 0xFFF,
            Field::Kk => 0xFF,
            Field::X | Field::Y | Field::N => 0xF,
        }
    }

    /// range-check a value about to be written into this field
    pub fn check(self, value: u16) -> Result<u16> {
        if value > self.max() {
            return Err(Chip8Error::OutOfRange {
                field: self,
                value,
                max: self.max(),
            });
        }
        Ok(value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Nnn => "NNN",
            Field::X => "X",
            Field::Y => "Y",
            Field::Kk => "KK",
            Field::N => "N",
        };
        f.write_str(name)
    }
}

/// A decoded instruction. Each variant only holds the operands its layout
/// defines; `selector` is whatever part of the word picks the exact operation
/// within the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Iiii { selector: u16 },
    Innn { type_nibble: u8, nnn: u16 },
    Ixii { type_nibble: u8, x: u8, selector: u8 },
    Ixkk { type_nibble: u8, x: u8, kk: u8 },
    Ixyi { type_nibble: u8, x: u8, y: u8, selector: u8 },
    Ixyn { type_nibble: u8, x: u8, y: u8, n: u8 },
}

impl Instruction {
    /// decode a big-endian word
    pub fn from_word(word: u16) -> Result<Instruction> {
        let type_nibble = (word >> 12) as u8;
        let pattern = Pattern::for_type_nibble(type_nibble)
            .ok_or(Chip8Error::InvalidInstruction { word })?;

        let x = ((word >> 8) & 0xF) as u8;
        let y = ((word >> 4) & 0xF) as u8;
        let n = (word & 0xF) as u8;
        let lo = (word & 0xFF) as u8;

        Ok(match pattern {
            Pattern::Iiii => Instruction::Iiii {
                selector: word & 0xFFF,
            },
            Pattern::Innn => Instruction::Innn {
                type_nibble,
                nnn: word & 0xFFF,
            },
            Pattern::Ixii => Instruction::Ixii {
                type_nibble,
                x,
                selector: lo,
            },
            Pattern::Ixkk => Instruction::Ixkk { type_nibble, x, kk: lo },
            Pattern::Ixyi => Instruction::Ixyi {
                type_nibble,
                x,
                y,
                selector: n,
            },
            Pattern::Ixyn => Instruction::Ixyn { type_nibble, x, y, n },
        })
    }

    /// decode the two bytes at `offset` in `source`
    pub fn decode(source: &[u8], offset: usize) -> Result<Instruction> {
        match source.get(offset..offset.saturating_add(2)) {
            Some(&[hi, lo]) => Instruction::from_word(u16::from_be_bytes([hi, lo])),
            _ => Err(Chip8Error::MemoryBoundsViolation {
                address: offset,
                len: 2,
                size: source.len(),
            }),
        }
    }

    /// an all-zero-operand instruction of the given family, handy as a
    /// template for the setters
    pub fn blank(type_nibble: u8) -> Result<Instruction> {
        if type_nibble > 0xF {
            return Err(Chip8Error::InvalidInstruction {
                word: (type_nibble as u16) << 12,
            });
        }
        Instruction::from_word((type_nibble as u16) << 12)
    }

    pub fn pattern(&self) -> Pattern {
        match self {
            Instruction::Iiii { .. } => Pattern::Iiii,
            Instruction::Innn { .. } => Pattern::Innn,
            Instruction::Ixii { .. } => Pattern::Ixii,
            Instruction::Ixkk { .. } => Pattern::Ixkk,
            Instruction::Ixyi { .. } => Pattern::Ixyi,
            Instruction::Ixyn { .. } => Pattern::Ixyn,
        }
    }

    pub fn type_nibble(&self) -> u8 {
        match *self {
            Instruction::Iiii { .. } => 0x0,
            Instruction::Innn { type_nibble, .. }
            | Instruction::Ixii { type_nibble, .. }
            | Instruction::Ixkk { type_nibble, .. }
            | Instruction::Ixyi { type_nibble, .. }
            | Instruction::Ixyn { type_nibble, .. } => type_nibble,
        }
    }

    /// re-encode into a big-endian word
    pub fn word(&self) -> u16 {
        let t = (self.type_nibble() as u16) << 12;
        match *self {
            Instruction::Iiii { selector } => selector,
            Instruction::Innn { nnn, .. } => t | nnn,
            Instruction::Ixii { x, selector, .. } => t | (x as u16) << 8 | selector as u16,
            Instruction::Ixkk { x, kk, .. } => t | (x as u16) << 8 | kk as u16,
            Instruction::Ixyi { x, y, selector, .. } => {
                t | (x as u16) << 8 | (y as u16) << 4 | selector as u16
            }
            Instruction::Ixyn { x, y, n, .. } => t | (x as u16) << 8 | (y as u16) << 4 | n as u16,
        }
    }

    pub fn hi_byte(&self) -> u8 {
        (self.word() >> 8) as u8
    }

    pub fn lo_byte(&self) -> u8 {
        self.word() as u8
    }

    /// write the encoded bytes into `buffer` at `offset`
    pub fn pack_into(&self, buffer: &mut [u8], offset: usize) -> Result<()> {
        let size = buffer.len();
        match buffer.get_mut(offset..offset.saturating_add(2)) {
            Some(dst) => {
                dst.copy_from_slice(&self.word().to_be_bytes());
                Ok(())
            }
            None => Err(Chip8Error::MemoryBoundsViolation {
                address: offset,
                len: 2,
                size,
            }),
        }
    }

    fn violation(&self, field: Field) -> Chip8Error {
        Chip8Error::FieldAccessViolation {
            field,
            pattern: self.pattern(),
            word: self.word(),
        }
    }

    pub fn nnn(&self) -> Result<u16> {
        match *self {
            Instruction::Innn { nnn, .. } => Ok(nnn),
            _ => Err(self.violation(Field::Nnn)),
        }
    }

    pub fn x(&self) -> Result<u8> {
        match *self {
            Instruction::Ixii { x, .. }
            | Instruction::Ixkk { x, .. }
            | Instruction::Ixyi { x, .. }
            | Instruction::Ixyn { x, .. } => Ok(x),
            _ => Err(self.violation(Field::X)),
        }
    }

    pub fn y(&self) -> Result<u8> {
        match *self {
            Instruction::Ixyi { y, .. } | Instruction::Ixyn { y, .. } => Ok(y),
            _ => Err(self.violation(Field::Y)),
        }
    }

    pub fn kk(&self) -> Result<u8> {
        match *self {
            Instruction::Ixkk { kk, .. } => Ok(kk),
            _ => Err(self.violation(Field::Kk)),
        }
    }

    pub fn n(&self) -> Result<u8> {
        match *self {
            Instruction::Ixyn { n, .. } => Ok(n),
            _ => Err(self.violation(Field::N)),
        }
    }

    pub fn set_nnn(&mut self, value: u16) -> Result<()> {
        let value = Field::Nnn.check(value)?;
        let err = self.violation(Field::Nnn);
        match self {
            Instruction::Innn { nnn, .. } => *nnn = value,
            _ => return Err(err),
        }
        Ok(())
    }

    pub fn set_x(&mut self, value: u16) -> Result<()> {
        let value = Field::X.check(value)? as u8;
        let err = self.violation(Field::X);
        match self {
            Instruction::Ixii { x, .. }
            | Instruction::Ixkk { x, .. }
            | Instruction::Ixyi { x, .. }
            | Instruction::Ixyn { x, .. } => *x = value,
            _ => return Err(err),
        }
        Ok(())
    }

    pub fn set_y(&mut self, value: u16) -> Result<()> {
        let value = Field::Y.check(value)? as u8;
        let err = self.violation(Field::Y);
        match self {
            Instruction::Ixyi { y, .. } | Instruction::Ixyn { y, .. } => *y = value,
            _ => return Err(err),
        }
        Ok(())
    }

    pub fn set_kk(&mut self, value: u16) -> Result<()> {
        let value = Field::Kk.check(value)? as u8;
        let err = self.violation(Field::Kk);
        match self {
            Instruction::Ixkk { kk, .. } => *kk = value,
            _ => return Err(err),
        }
        Ok(())
    }

    pub fn set_n(&mut self, value: u16) -> Result<()> {
        let value = Field::N.check(value)? as u8;
        let err = self.violation(Field::N);
        match self {
            Instruction::Ixyn { n, .. } => *n = value,
            _ => return Err(err),
        }
        Ok(())
    }

    /// read any field by name
    pub fn field(&self, field: Field) -> Result<u16> {
        match field {
            Field::Nnn => self.nnn(),
            Field::X => self.x().map(u16::from),
            Field::Y => self.y().map(u16::from),
            Field::Kk => self.kk().map(u16::from),
            Field::N => self.n().map(u16::from),
        }
    }

    /// write any field by name
    pub fn set_field(&mut self, field: Field, value: u16) -> Result<()> {
        match field {
            Field::Nnn => self.set_nnn(value),
            Field::X => self.set_x(value),
            Field::Y => self.set_y(value),
            Field::Kk => self.set_kk(value),
            Field::N => self.set_n(value),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.word())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_FIELDS: [Field; 5] = [Field::Nnn, Field::X, Field::Y, Field::Kk, Field::N];

    #[test]
    fn test_every_type_nibble_has_a_pattern() {
        for t in 0..=0xF {
            assert!(Pattern::for_type_nibble(t).is_some());
        }
        assert_eq!(Pattern::for_type_nibble(0x10), None);
    }

    #[test]
    fn test_decode_fields() -> Result<()> {
        let i = Instruction::from_word(0x1ABC)?;
        assert_eq!((i.type_nibble(), i.nnn()?), (0x1, 0xABC));

        let i = Instruction::from_word(0x3F05)?;
        assert_eq!((i.x()?, i.kk()?), (0xF, 0x05));

        let i = Instruction::from_word(0x51A0)?;
        assert_eq!((i.x()?, i.y()?), (0x1, 0xA));

        let i = Instruction::from_word(0xD4E7)?;
        assert_eq!((i.x()?, i.y()?, i.n()?), (0x4, 0xE, 0x7));

        let i = Instruction::from_word(0xEF9E)?;
        assert_eq!((i.pattern(), i.x()?, i.lo_byte()), (Pattern::Ixii, 0xF, 0x9E));

        let i = Instruction::from_word(0x00EE)?;
        assert_eq!((i.pattern(), i.type_nibble()), (Pattern::Iiii, 0));
        Ok(())
    }

    #[test]
    fn test_decode_at_offset() -> Result<()> {
        let i = Instruction::decode(&[0x00, 0x6A, 0x14], 1)?;
        assert_eq!(i.word(), 0x6A14);
        assert!(matches!(
            Instruction::decode(&[0x6A], 0),
            Err(Chip8Error::MemoryBoundsViolation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_fields_match_pattern_usage() -> Result<()> {
        for word in [0x00E0, 0x1234, 0xF155, 0x7122, 0x8124, 0xD125] {
            let i = Instruction::from_word(word)?;
            for field in ALL_FIELDS {
                let res = i.field(field);
                if i.pattern().uses(field) {
                    assert!(res.is_ok(), "{} should have {}", i, field);
                } else {
                    assert!(
                        matches!(res, Err(Chip8Error::FieldAccessViolation { .. })),
                        "{} should not have {}",
                        i,
                        field
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_setters_reject_too_big() -> Result<()> {
        let cases = [
            (Field::Nnn, 0x1000, 0xFFFF),
            (Field::N, 0xD000, 0x10),
            (Field::X, 0xE09E, 0xF0),
            (Field::Y, 0x8006, 0x10),
            (Field::Kk, 0x3000, 0x100),
        ];
        for (field, template, too_big) in cases {
            let mut i = Instruction::from_word(template)?;
            assert!(matches!(
                i.set_field(field, too_big),
                Err(Chip8Error::OutOfRange { .. })
            ));
            assert_eq!(i.word(), template);
        }
        Ok(())
    }

    #[test]
    fn test_setters_write_valid_values() -> Result<()> {
        let cases = [
            (Field::X, 0xE09E, 0xF),
            (Field::Y, 0x8006, 0x1),
            (Field::N, 0xD000, 0xF),
            (Field::Kk, 0x3000, 0xFF),
            (Field::Nnn, 0x1000, 0xAAA),
        ];
        for (field, template, value) in cases {
            let mut i = Instruction::from_word(template)?;
            assert_eq!(i.field(field)?, 0);
            i.set_field(field, value)?;
            assert_eq!(i.field(field)?, value);
        }

        let mut i = Instruction::from_word(0xE09E)?;
        i.set_x(0x7)?;
        assert_eq!(i.word(), 0xE79E);
        Ok(())
    }

    #[test]
    fn test_setter_on_missing_field_fails() -> Result<()> {
        let mut i = Instruction::from_word(0x6000)?;
        assert!(matches!(
            i.set_y(1),
            Err(Chip8Error::FieldAccessViolation { field: Field::Y, .. })
        ));
        assert!(matches!(
            i.set_n(1),
            Err(Chip8Error::FieldAccessViolation { field: Field::N, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_blank_template() -> Result<()> {
        let mut i = Instruction::blank(0xD)?;
        i.set_x(1)?;
        i.set_y(2)?;
        i.set_n(3)?;
        assert_eq!(i.word(), 0xD123);
        assert!(matches!(
            Instruction::blank(0x10),
            Err(Chip8Error::InvalidInstruction { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_pack_into() -> Result<()> {
        let mut buf = [0u8; 4];
        Instruction::from_word(0xA2F0)?.pack_into(&mut buf, 1)?;
        assert_eq!(buf, [0x00, 0xA2, 0xF0, 0x00]);
        assert!(Instruction::from_word(0xA2F0)?.pack_into(&mut buf, 3).is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_decode_then_pack_round_trips(word: u16) {
            let mut buf = [0u8; 2];
            Instruction::from_word(word).unwrap().pack_into(&mut buf, 0).unwrap();
            prop_assert_eq!(u16::from_be_bytes(buf), word);
        }

        #[test]
        fn prop_ixkk_has_kk_but_no_y_or_n(
            t in prop::sample::select(vec![0x3u16, 0x4, 0x6, 0x7, 0xC]),
            rest in 0u16..0x1000,
        ) {
            let i = Instruction::from_word(t << 12 | rest).unwrap();
            prop_assert_eq!(i.kk().unwrap() as u16, rest & 0xFF);
            let y_is_violation = matches!(i.y(), Err(Chip8Error::FieldAccessViolation { .. }));
            let n_is_violation = matches!(i.n(), Err(Chip8Error::FieldAccessViolation { .. }));
            prop_assert!(y_is_violation);
            prop_assert!(n_is_violation);
        }
    }
}
