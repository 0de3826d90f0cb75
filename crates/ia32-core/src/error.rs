//! Error types for ia32-core.

use crate::{Mnemonic, Operand, OperandSize, Register};
use thiserror::Error;

/// Invalid operand construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperandError {
    /// Register codes are three bits wide.
    #[error("register code {0} out of range 0..=7")]
    InvalidRegisterCode(u8),

    /// Immediate value does not fit its declared width.
    #[error("immediate {value:#x} does not fit in {size:?}")]
    ImmediateOutOfRange { value: i64, size: OperandSize },

    /// Size cannot be used for an immediate or displacement.
    #[error("{0:?} is not a valid immediate size")]
    InvalidImmediateSize(OperandSize),

    /// Memory reference with no base, index or displacement.
    #[error("memory reference needs a base, an index or a displacement")]
    EmptyMemory,

    /// Scale factor other than 1, 2, 4 or 8.
    #[error("invalid scale factor {0}")]
    InvalidScale(u8),

    /// Register that cannot be used for 32-bit addressing.
    #[error("{0} cannot be used in a 32-bit address")]
    InvalidAddressRegister(Register),

    /// Only registers and memory can sit in a ModR/M rm field.
    #[error("{0:?} cannot be encoded in a ModR/M rm field")]
    NotAddressable(Operand),
}

/// Error type for instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// No encoding rule for this operand combination.
    #[error("no encoding for {mnemonic} with operands {operands:?}")]
    UnsupportedOperands {
        mnemonic: Mnemonic,
        operands: Vec<Operand>,
    },

    /// Branch target does not fit the requested offset width.
    #[error("branch target {target:#x} out of range for {size:?} offset (offset {offset})")]
    BranchOutOfRange {
        target: u32,
        offset: i64,
        size: OperandSize,
    },

    /// Operand failed its own invariants.
    #[error("invalid operand: {0}")]
    InvalidOperand(#[from] OperandError),

    /// The unknown-instruction marker has no encoding of its own.
    #[error("unknown instruction has no encoding")]
    UnknownInstruction,
}

impl EncodeError {
    /// Creates a new UnsupportedOperands error.
    pub fn unsupported(mnemonic: Mnemonic, operands: &[Operand]) -> Self {
        log::debug!("rejecting {} with operands {:?}", mnemonic, operands);
        Self::UnsupportedOperands {
            mnemonic,
            operands: operands.to_vec(),
        }
    }
}
