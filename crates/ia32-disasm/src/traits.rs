//! Disassembler traits.

use crate::DecodeError;
use ia32_core::Instruction;

/// Result of decoding an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstruction {
    /// The decoded instruction, with its bytes pinned.
    pub instruction: Instruction,
    /// Number of bytes consumed.
    pub size: usize,
}

/// Trait for instruction decoders.
pub trait Disassembler {
    /// Decode a single instruction starting at the given address.
    ///
    /// # Arguments
    /// * `bytes` - The raw bytes to decode
    /// * `address` - The virtual address of the first byte
    ///
    /// # Returns
    /// The decoded instruction and the number of bytes consumed.
    fn decode_instruction(&self, bytes: &[u8], address: u32) -> Result<DecodedInstruction, DecodeError>;

    /// Returns the minimum instruction size.
    fn min_instruction_size(&self) -> usize;

    /// Returns the maximum instruction size.
    fn max_instruction_size(&self) -> usize;

    /// Disassemble a block of code into instructions.
    fn disassemble_block(&self, bytes: &[u8], start_address: u32) -> Vec<Result<Instruction, DecodeError>> {
        let mut instructions = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let remaining = &bytes[offset..];
            let address = start_address.wrapping_add(offset as u32);

            match self.decode_instruction(remaining, address) {
                Ok(decoded) => {
                    log::trace!("{:#010x}: {}", address, decoded.instruction);
                    offset += decoded.size;
                    instructions.push(Ok(decoded.instruction));
                }
                Err(e) => {
                    // On error, skip one byte and continue
                    offset += 1;
                    instructions.push(Err(e));
                }
            }
        }

        instructions
    }
}
