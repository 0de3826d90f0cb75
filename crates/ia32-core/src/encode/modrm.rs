//! ModR/M and SIB bytes.
//!
//! The encoder builds these from operands; the decoder parses them back with
//! [`ModRm::from_byte`] and [`Sib::from_byte`].

use crate::error::OperandError;
use crate::{Immediate, Memory, Operand, OperandSize};

/// ModR/M byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Mod field (2 bits)
    pub mod_: u8,
    /// Reg field (3 bits)
    pub reg: u8,
    /// R/M field (3 bits)
    pub rm: u8,
}

impl ModRm {
    /// Builds a ModR/M from its three fields; each is masked to width.
    pub fn new(mod_: u8, reg: u8, rm: u8) -> Self {
        Self {
            mod_: mod_ & 0x3,
            reg: reg & 0x7,
            rm: rm & 0x7,
        }
    }

    /// Splits a raw ModR/M byte into its fields.
    pub fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 6, byte >> 3, byte)
    }

    pub fn to_byte(&self) -> u8 {
        (self.mod_ << 6) | (self.reg << 3) | self.rm
    }

    /// Returns true if this ModR/M encodes a register operand (mod=11).
    pub fn is_register(&self) -> bool {
        self.mod_ == 0b11
    }

    /// Returns true if this ModR/M requires a SIB byte.
    pub fn needs_sib(&self) -> bool {
        self.mod_ != 0b11 && self.rm == 0b100
    }

    /// Returns true if this ModR/M has a 32-bit displacement (before any SIB
    /// adjustment).
    pub fn has_disp32(&self) -> bool {
        self.mod_ == 0b10 || (self.mod_ == 0b00 && self.rm == 0b101)
    }

    /// Returns true if this ModR/M has an 8-bit displacement.
    pub fn has_disp8(&self) -> bool {
        self.mod_ == 0b01
    }
}

/// SIB byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib {
    /// Scale (2 bits) - actual scale is 1 << scale
    pub scale: u8,
    /// Index register code, 4 means no index
    pub index: u8,
    /// Base register code, 5 with mod=00 means no base
    pub base: u8,
}

impl Sib {
    pub const NO_INDEX: u8 = 0b100;
    pub const NO_BASE: u8 = 0b101;

    /// Builds a SIB from a scale factor (1, 2, 4, 8).
    pub fn new(scale_factor: u8, index: u8, base: u8) -> Self {
        let scale = match scale_factor {
            2 => 1,
            4 => 2,
            8 => 3,
            _ => 0,
        };
        Self {
            scale,
            index: index & 0x7,
            base: base & 0x7,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        Self {
            scale: (byte >> 6) & 0x3,
            index: (byte >> 3) & 0x7,
            base: byte & 0x7,
        }
    }

    pub fn to_byte(&self) -> u8 {
        (self.scale << 6) | (self.index << 3) | self.base
    }

    /// Returns the actual scale factor (1, 2, 4, or 8).
    pub fn scale_factor(&self) -> u8 {
        1 << self.scale
    }
}

/// The addressing bytes of one instruction: ModR/M, optional SIB, optional
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRmBytes {
    pub modrm: ModRm,
    pub sib: Option<Sib>,
    pub displacement: Option<Immediate>,
}

impl ModRmBytes {
    /// Appends ModR/M, SIB and displacement to `buf`, in that order.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.modrm.to_byte());
        if let Some(sib) = self.sib {
            buf.push(sib.to_byte());
        }
        if let Some(disp) = self.displacement {
            disp.write_to(buf);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        self.write_to(&mut buf);
        buf
    }
}

/// Computes the addressing bytes for `rm` with `reg_field` in the reg slot.
///
/// `reg_field` is either the other operand's register code or a group
/// selector. The displacement width stored on a memory operand is kept, so
/// an operand read back from a disp8 form encodes as a disp8 form again.
pub fn encode_modrm(reg_field: u8, rm: &Operand) -> Result<ModRmBytes, OperandError> {
    match rm {
        Operand::Register(reg) => Ok(ModRmBytes {
            modrm: ModRm::new(0b11, reg_field, reg.code()),
            sib: None,
            displacement: None,
        }),
        Operand::Memory(mem) => encode_memory(reg_field, mem),
        other => Err(OperandError::NotAddressable(*other)),
    }
}

fn encode_memory(reg_field: u8, mem: &Memory) -> Result<ModRmBytes, OperandError> {
    mem.validate()?;

    let base = match mem.base {
        Some(base) => base,
        None => {
            // No base: disp32 always follows, with or without an index.
            let disp = Some(Immediate::dword(mem.disp() as u32));
            let (modrm, sib) = match mem.index {
                Some(index) => (
                    ModRm::new(0b00, reg_field, 0b100),
                    Some(Sib::new(mem.scale, index.code(), Sib::NO_BASE)),
                ),
                None => (ModRm::new(0b00, reg_field, 0b101), None),
            };
            return Ok(ModRmBytes {
                modrm,
                sib,
                displacement: disp,
            });
        }
    };

    let (mod_, displacement) = match mem.displacement {
        // [ebp] has no mod=00 form; it becomes [ebp+0].
        None if base.code() == 5 => (0b01, Some(Immediate::signed_byte(0))),
        None => (0b00, None),
        Some(disp) if disp.size() == OperandSize::SignedByte => (0b01, Some(disp)),
        Some(disp) => (0b10, Some(disp)),
    };

    let needs_sib = mem.index.is_some() || base.code() == 4;
    let (rm, sib) = if needs_sib {
        let index = mem.index.map_or(Sib::NO_INDEX, |r| r.code());
        (0b100, Some(Sib::new(mem.scale, index, base.code())))
    } else {
        (base.code(), None)
    };

    Ok(ModRmBytes {
        modrm: ModRm::new(mod_, reg_field, rm),
        sib,
        displacement,
    })
}
