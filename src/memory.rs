use crate::error::{Chip8Error, Result};

// NB. addresses and lengths are usize here; the interpreter converts from its
//     16-bit registers at the call site

/// Represents byte-addressable machine memory.
pub trait MemoryMap {
    /// how many bytes are addressable
    fn size(&self) -> usize;

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: usize, len: usize) -> Result<&mut [u8]>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: usize, len: usize) -> Result<&[u8]>;

    /// write a chunk of bytes into memory
    fn write(&mut self, data: &[u8], addr: usize) -> Result<()> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// get a big-endian two-byte word
    fn get_word(&self, addr: usize) -> Result<u16> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }
}

/// fixed-size RAM, zeroed on creation and never resized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Memory {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn bounds(&self, addr: usize, len: usize) -> Result<std::ops::Range<usize>> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(addr..end),
            _ => Err(Chip8Error::MemoryBoundsViolation {
                address: addr,
                len,
                size: self.bytes.len(),
            }),
        }
    }
}

impl MemoryMap for Memory {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn get_rw_slice(&mut self, addr: usize, len: usize) -> Result<&mut [u8]> {
        let range = self.bounds(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    fn get_ro_slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        let range = self.bounds(addr, len)?;
        Ok(&self.bytes[range])
    }
}

/// how much RAM a standard machine has
pub const DEFAULT_MEMORY_SIZE: usize = 4096;

/// where programs are conventionally loaded
pub const DEFAULT_EXECUTION_START: u16 = 0x200;

/// hex digit sprites 0-F, one 4x5 glyph per entry
pub const DEFAULT_DIGITS: [&[u8]; 16] = [
    &[0xF0, 0x90, 0x90, 0x90, 0xF0], // 0
    &[0x20, 0x60, 0x20, 0x20, 0x70], // 1
    &[0xF0, 0x10, 0xF0, 0x80, 0xF0], // 2
    &[0xF0, 0x10, 0xF0, 0x10, 0xF0], // 3
    &[0x90, 0x90, 0xF0, 0x10, 0x10], // 4
    &[0xF0, 0x80, 0xF0, 0x10, 0xF0], // 5
    &[0xF0, 0x80, 0xF0, 0x90, 0xF0], // 6
    &[0xF0, 0x10, 0x20, 0x40, 0x40], // 7
    &[0xF0, 0x90, 0xF0, 0x90, 0xF0], // 8
    &[0xF0, 0x90, 0xF0, 0x10, 0xF0], // 9
    &[0xF0, 0x90, 0xF0, 0x90, 0x90], // A
    &[0xE0, 0x90, 0xE0, 0x90, 0xE0], // B
    &[0xF0, 0x80, 0x80, 0x80, 0xF0], // C
    &[0xE0, 0x90, 0x90, 0x90, 0xE0], // D
    &[0xF0, 0x80, 0xF0, 0x80, 0xF0], // E
    &[0xF0, 0x80, 0xF0, 0x80, 0x80], // F
];

/// Copy digit sprites into memory at `location`, each one starting a fixed
/// stride after the last. The stride is the height of the tallest digit and is
/// returned so digit addresses can be computed later. Nothing is written
/// unless the whole font fits.
pub fn load_digits(memory: &mut impl MemoryMap, digits: &[&[u8]], location: usize) -> Result<usize> {
    let stride = digits.iter().map(|d| d.len()).max().unwrap_or(0);
    let span = digits
        .len()
        .checked_mul(stride)
        .ok_or(Chip8Error::MemoryBoundsViolation {
            address: location,
            len: usize::MAX,
            size: memory.size(),
        })?;
    let font = memory.get_rw_slice(location, span)?;
    for (glyph, digit) in font.chunks_mut(stride.max(1)).zip(digits) {
        glyph[..digit.len()].copy_from_slice(digit);
    }
    Ok(stride)
}
