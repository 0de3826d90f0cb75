//! Instruction representation.

use crate::error::EncodeError;
use crate::{Mnemonic, Operand};
use std::sync::OnceLock;

/// An IA-32 instruction: a catalog variant plus its operands.
///
/// Decoded instructions keep the exact bytes that were read. Instructions
/// built for assembly encode lazily on the first call to [`bytes`].
///
/// [`bytes`]: Instruction::bytes
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Catalog variant with its opcode-specific flags.
    pub mnemonic: Mnemonic,
    /// Operands (destination first, then sources). At most three.
    pub operands: Vec<Operand>,
    /// LOCK prefix present.
    pub lock: bool,
    /// Virtual address of this instruction.
    pub address: u32,
    #[cfg_attr(feature = "serde", serde(with = "pinned_bytes"))]
    bytes: OnceLock<Vec<u8>>,
}

impl Instruction {
    /// Creates an instruction for assembly at address 0.
    pub fn new(mnemonic: Mnemonic, operands: Vec<Operand>) -> Self {
        Self {
            mnemonic,
            operands,
            lock: false,
            address: 0,
            bytes: OnceLock::new(),
        }
    }

    /// Creates an instruction whose bytes are the exact bytes it was read
    /// from.
    pub fn decoded(
        mnemonic: Mnemonic,
        operands: Vec<Operand>,
        lock: bool,
        address: u32,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            mnemonic,
            operands,
            lock,
            address,
            bytes: OnceLock::from(bytes),
        }
    }

    /// Sets the address. Any cached encoding is dropped, since relative
    /// offsets depend on it.
    pub fn at(mut self, address: u32) -> Self {
        self.address = address;
        self.bytes = OnceLock::new();
        self
    }

    /// Sets the LOCK prefix.
    pub fn locked(mut self) -> Self {
        self.lock = true;
        self.bytes = OnceLock::new();
        self
    }

    /// Adds an operand.
    pub fn with_operand(mut self, op: Operand) -> Self {
        self.operands.push(op);
        self.bytes = OnceLock::new();
        self
    }

    /// Returns true if the bytes came from decoding or were already encoded.
    pub fn has_bytes(&self) -> bool {
        self.bytes.get().is_some()
    }

    /// Returns the instruction bytes.
    ///
    /// Decoded instructions return the bytes that were read. Otherwise the
    /// instruction is encoded once and the result cached.
    pub fn bytes(&self) -> Result<&[u8], EncodeError> {
        if let Some(bytes) = self.bytes.get() {
            return Ok(bytes);
        }
        let encoded = self.encode()?;
        Ok(self.bytes.get_or_init(|| encoded))
    }

    /// Encodes the instruction from its catalog rule, ignoring any pinned
    /// bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        crate::encode::encode(self)
    }

    /// Returns the size in bytes.
    pub fn len(&self) -> Result<usize, EncodeError> {
        self.bytes().map(<[u8]>::len)
    }

    /// Returns the address following this instruction.
    pub fn end_address(&self) -> Result<u32, EncodeError> {
        Ok(self.address.wrapping_add(self.len()? as u32))
    }

    /// Returns true for the unknown-instruction marker.
    pub fn is_unknown(&self) -> bool {
        self.mnemonic == Mnemonic::Unknown
    }

    /// Returns true if this instruction transfers control.
    pub fn is_branch(&self) -> bool {
        matches!(
            self.mnemonic,
            Mnemonic::Jmp
                | Mnemonic::Jcc(_)
                | Mnemonic::Jecxz
                | Mnemonic::Loop(_)
                | Mnemonic::Call
                | Mnemonic::Ret { .. }
                | Mnemonic::Iret
        )
    }

    /// Returns true if this instruction is a call.
    pub fn is_call(&self) -> bool {
        self.mnemonic == Mnemonic::Call
    }

    /// Returns true if this instruction is a return.
    pub fn is_return(&self) -> bool {
        matches!(self.mnemonic, Mnemonic::Ret { .. } | Mnemonic::Iret)
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.mnemonic == other.mnemonic
            && self.operands == other.operands
            && self.lock == other.lock
            && self.address == other.address
    }
}

impl Eq for Instruction {}

#[cfg(feature = "serde")]
mod pinned_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::sync::OnceLock;

    pub fn serialize<S: Serializer>(bytes: &OnceLock<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        bytes.get().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OnceLock<Vec<u8>>, D::Error> {
        let bytes: Option<Vec<u8>> = Option::deserialize(d)?;
        Ok(bytes.map(OnceLock::from).unwrap_or_default())
    }
}

/// Condition code, in encoding order (the low nibble of `7x`, `0F 8x`,
/// `0F 9x` and `0F 4x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    Overflow,       // OF=1
    NotOverflow,    // OF=0
    Below,          // CF=1
    AboveOrEqual,   // CF=0
    Equal,          // ZF=1
    NotEqual,       // ZF=0
    BelowOrEqual,   // CF=1 or ZF=1
    Above,          // CF=0 and ZF=0
    Sign,           // SF=1
    NotSign,        // SF=0
    Parity,         // PF=1
    NotParity,      // PF=0
    Less,           // SF!=OF
    GreaterOrEqual, // SF=OF
    LessOrEqual,    // ZF=1 or SF!=OF
    Greater,        // ZF=0 and SF=OF
}

impl Condition {
    const ALL: [Condition; 16] = [
        Self::Overflow,
        Self::NotOverflow,
        Self::Below,
        Self::AboveOrEqual,
        Self::Equal,
        Self::NotEqual,
        Self::BelowOrEqual,
        Self::Above,
        Self::Sign,
        Self::NotSign,
        Self::Parity,
        Self::NotParity,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::Greater,
    ];

    /// Returns the 4-bit condition code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Returns the condition for the low nibble of `code`.
    pub fn from_code(code: u8) -> Self {
        Self::ALL[(code & 0xF) as usize]
    }

    /// Returns the inverse condition. Conditions come in pairs that differ
    /// only in bit 0.
    pub fn inverse(&self) -> Self {
        Self::from_code(self.code() ^ 1)
    }

    /// Returns the mnemonic suffix for this condition.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Overflow => "o",
            Self::NotOverflow => "no",
            Self::Below => "b",
            Self::AboveOrEqual => "ae",
            Self::Equal => "e",
            Self::NotEqual => "ne",
            Self::BelowOrEqual => "be",
            Self::Above => "a",
            Self::Sign => "s",
            Self::NotSign => "ns",
            Self::Parity => "p",
            Self::NotParity => "np",
            Self::Less => "l",
            Self::GreaterOrEqual => "ge",
            Self::LessOrEqual => "le",
            Self::Greater => "g",
        }
    }
}
