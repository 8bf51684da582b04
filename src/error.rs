use std::io;
use thiserror::Error;

use crate::instruction::{Field, Pattern};

/// Everything that can go wrong inside the machine. Errors are reported to the
/// caller of the operation that detected them; nothing is retried internally.
#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("illegal instruction header in {word:04X}")]
    InvalidInstruction { word: u16 },

    #[error("unrecognized instruction {word:04X} @ 0x{address:03X}")]
    UnhandledInstruction { word: u16, address: u16 },

    #[error("invalid access attempt on {field} in {pattern} on instruction {word:04X}")]
    FieldAccessViolation {
        field: Field,
        pattern: Pattern,
        word: u16,
    },

    #[error("{field} must be between 0 and {max:#X} inclusive, not {value:#X}")]
    OutOfRange { field: Field, value: u16, max: u16 },

    #[error("access of {len} byte(s) at {address:#06X} is outside {size} bytes of memory")]
    MemoryBoundsViolation {
        address: usize,
        len: usize,
        size: usize,
    },

    #[error("framebuffer dimensions must be positive, not {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("return @ 0x{address:03X} with an empty call stack")]
    StackUnderflow { address: u16 },

    #[error("no such key {0:#X}, keys run from 0x0 to 0xF")]
    InvalidKey(u8),

    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Chip8Error>;
