//! Bounds-checked reads over a code buffer.

use ia32_core::{Immediate, OperandSize};

/// Why a decode step stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The input ended. `needed` counts bytes from the instruction start.
    Truncated { needed: usize },
    /// The bytes do not name a supported instruction.
    Unknown,
}

/// Little-endian reader over the bytes of one instruction.
///
/// Positions are relative to the start of the slice, which is the first
/// prefix byte of the instruction being decoded.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// The bytes consumed so far.
    pub fn consumed(&self) -> &'a [u8] {
        &self.bytes[..self.pos]
    }

    /// Returns the next byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, Fault> {
        let [b] = self.take::<1>()?;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, Fault> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, Fault> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Fault> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Reads an immediate of the given width.
    pub fn read_immediate(&mut self, size: OperandSize) -> Result<Immediate, Fault> {
        Ok(match size {
            OperandSize::Byte => Immediate::byte(self.read_u8()?),
            OperandSize::SignedByte => Immediate::signed_byte(self.read_i8()?),
            OperandSize::Word => Immediate::word(self.read_u16()?),
            OperandSize::Dword => Immediate::dword(self.read_u32()?),
            _ => return Err(Fault::Unknown),
        })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], Fault> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(Fault::Truncated { needed: end })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }
}
