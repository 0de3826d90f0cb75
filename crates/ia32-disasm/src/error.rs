//! Disassembly error types.

use thiserror::Error;

/// Error type for instruction decoding.
///
/// Unrecognized opcodes are not errors: they decode to
/// [`Mnemonic::Unknown`](ia32_core::Mnemonic::Unknown). The only failure is
/// running out of input in the middle of an instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Instruction was truncated (not enough bytes).
    #[error("truncated instruction at {address:#x}: need {needed} bytes, have {available}")]
    Truncated {
        address: u32,
        needed: usize,
        available: usize,
    },
}

impl DecodeError {
    /// Creates a new Truncated error.
    pub fn truncated(address: u32, needed: usize, available: usize) -> Self {
        Self::Truncated {
            address,
            needed,
            available,
        }
    }

    /// Returns the address of the instruction that failed.
    pub fn address(&self) -> u32 {
        match self {
            Self::Truncated { address, .. } => *address,
        }
    }
}
