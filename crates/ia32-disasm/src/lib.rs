//! # ia32-disasm
//!
//! IA-32 (32-bit protected mode) instruction decoder.
//!
//! Decoding produces [`ia32_core::Instruction`] values that carry the exact
//! bytes they were read from, so re-encoding a decoded instruction is
//! byte-identical. Unrecognized opcodes decode to
//! [`Mnemonic::Unknown`](ia32_core::Mnemonic::Unknown) rather than failing;
//! the only error is running out of input.
//!
//! ```
//! use ia32_disasm::{Disassembler, Ia32Disassembler};
//!
//! let decoded = Ia32Disassembler::new()
//!     .decode_instruction(&[0x8B, 0x45, 0xFC], 0x401000)
//!     .unwrap();
//! assert_eq!(decoded.size, 3);
//! assert_eq!(decoded.instruction.to_string(), "mov eax,dword ptr [ebp-0x4]");
//! ```

pub mod cursor;
mod decoder;
pub mod error;
mod modrm;
mod opcodes;
mod opcodes_0f;
pub mod prefix;
mod simd;
pub mod traits;
mod x87;

pub use cursor::{ByteCursor, Fault};
pub use decoder::{Disassembly, Ia32Disassembler, MAX_INSTRUCTION_LEN};
pub use error::DecodeError;
pub use prefix::Prefixes;
pub use traits::{DecodedInstruction, Disassembler};
