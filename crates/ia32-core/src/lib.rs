//! # ia32-core
//!
//! Core types for the IA-32 codec: operands, registers, the instruction
//! catalog, per-family encode rules and the Intel-syntax formatter.
//!
//! ```
//! use ia32_core::{Instruction, Mnemonic, Operand, Register};
//!
//! let insn = Instruction::new(
//!     Mnemonic::Mov,
//!     vec![Operand::reg(Register::EAX), Operand::imm32(0x12345678)],
//! );
//! assert_eq!(insn.bytes().unwrap(), &[0xB8, 0x78, 0x56, 0x34, 0x12]);
//! assert_eq!(insn.to_string(), "mov eax,0x12345678");
//! ```

pub mod encode;
pub mod error;
pub mod format;
pub mod instruction;
pub mod mnemonic;
pub mod operand;
pub mod register;

pub use encode::modrm::{encode_modrm, ModRm, Sib};
pub use error::{EncodeError, OperandError};
pub use format::{format_instruction, format_listing_line, format_operand, ListingOptions};
pub use instruction::{Condition, Instruction};
pub use mnemonic::{
    BitOp, CvtType, FcmovCondition, FenceKind, FpuConstant, FpuPop, Lane, LoopKind, Mnemonic,
    MovntKind, PmulKind, PrefetchHint, PshufKind, RepPrefix, Saturation, ShiftOp, SseArithOp,
    SseLogicOp,
};
pub use operand::{
    decode_immediate, encode_immediate, Absolute, Immediate, Memory, Operand, OperandSize,
    Relative, Segment,
};
pub use register::{Register, RegisterClass};
