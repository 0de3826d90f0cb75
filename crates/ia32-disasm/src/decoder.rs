//! IA-32 instruction decoder.

use crate::cursor::{ByteCursor, Fault};
use crate::error::DecodeError;
use crate::modrm::decode_memory;
use crate::prefix::Prefixes;
use crate::traits::{DecodedInstruction, Disassembler};
use crate::{opcodes, opcodes_0f};
use ia32_core::{
    Instruction, Memory, Mnemonic, ModRm, Operand, OperandSize, Register, RegisterClass, Relative,
};

/// Mnemonic and operands of one decoded instruction.
pub(crate) type Decoded = (Mnemonic, Vec<Operand>);

/// Longest legal IA-32 instruction.
pub const MAX_INSTRUCTION_LEN: usize = 15;

/// IA-32 instruction decoder.
///
/// Holds no state: every call parses its own prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ia32Disassembler;

/// Output of [`Ia32Disassembler::disassemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct Disassembly {
    pub instructions: Vec<Instruction>,
    /// Offset just past the last decoded instruction. Less than the input
    /// length when the final instruction was truncated.
    pub end_offset: usize,
}

impl Ia32Disassembler {
    /// Creates a new IA-32 disassembler.
    pub fn new() -> Self {
        Self
    }

    /// Decodes `bytes` back to back from `base_address` until the input is
    /// exhausted or an instruction runs off the end.
    pub fn disassemble(&self, bytes: &[u8], base_address: u32) -> Disassembly {
        let mut instructions = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let address = base_address.wrapping_add(offset as u32);
            match self.decode_instruction(&bytes[offset..], address) {
                Ok(decoded) => {
                    log::trace!("{:#010x}: {}", address, decoded.instruction);
                    offset += decoded.size;
                    instructions.push(decoded.instruction);
                }
                Err(e) => {
                    log::debug!("stopping: {}", e);
                    break;
                }
            }
        }

        Disassembly {
            instructions,
            end_offset: offset,
        }
    }
}

impl Disassembler for Ia32Disassembler {
    fn decode_instruction(&self, bytes: &[u8], address: u32) -> Result<DecodedInstruction, DecodeError> {
        let mut cursor = ByteCursor::new(bytes);
        let prefixes = Prefixes::parse(&mut cursor);
        let mut reader = Reader {
            cursor,
            prefixes,
            address,
        };

        let (mnemonic, operands) = match reader.dispatch() {
            Ok(decoded) => decoded,
            Err(Fault::Unknown) => {
                log::debug!(
                    "unknown instruction at {:#x}: {:02x?}",
                    address,
                    reader.cursor.consumed()
                );
                (Mnemonic::Unknown, Vec::new())
            }
            Err(Fault::Truncated { needed }) => {
                return Err(DecodeError::truncated(address, needed, bytes.len()));
            }
        };

        let size = reader.cursor.position();
        let instruction = Instruction::decoded(
            mnemonic,
            operands,
            prefixes.lock,
            address,
            bytes[..size].to_vec(),
        );

        Ok(DecodedInstruction { instruction, size })
    }

    fn min_instruction_size(&self) -> usize {
        1
    }

    fn max_instruction_size(&self) -> usize {
        MAX_INSTRUCTION_LEN
    }
}

/// Per-call decode state: the cursor, the prefixes seen and the address of
/// the first prefix byte.
pub(crate) struct Reader<'a> {
    pub cursor: ByteCursor<'a>,
    pub prefixes: Prefixes,
    pub address: u32,
}

impl Reader<'_> {
    fn dispatch(&mut self) -> Result<Decoded, Fault> {
        match self.cursor.read_u8()? {
            0x0F => {
                let opcode = self.cursor.read_u8()?;
                opcodes_0f::decode(self, opcode)
            }
            opcode => opcodes::decode(self, opcode),
        }
    }

    /// Word or dword, following the `66` prefix.
    pub fn op_size(&self) -> OperandSize {
        self.prefixes.operand_size()
    }

    pub fn modrm(&mut self) -> Result<ModRm, Fault> {
        Ok(ModRm::from_byte(self.cursor.read_u8()?))
    }

    /// The r/m operand as a general register or memory of `size`.
    pub fn rm(&mut self, modrm: ModRm, size: OperandSize) -> Result<Operand, Fault> {
        if modrm.is_register() {
            Ok(Operand::Register(gpr(modrm.rm, size)?))
        } else {
            Ok(Operand::Memory(self.memory(modrm, size)?))
        }
    }

    /// The r/m operand as a register of `class` or memory of `mem_size`.
    pub fn rm_class(
        &mut self,
        modrm: ModRm,
        class: RegisterClass,
        mem_size: OperandSize,
    ) -> Result<Operand, Fault> {
        if modrm.is_register() {
            Ok(Operand::Register(Register::from_field(class, modrm.rm)))
        } else {
            Ok(Operand::Memory(self.memory(modrm, mem_size)?))
        }
    }

    /// A memory-only r/m operand. Register forms are not valid here.
    pub fn memory(&mut self, modrm: ModRm, size: OperandSize) -> Result<Memory, Fault> {
        if modrm.is_register() {
            return Err(Fault::Unknown);
        }
        decode_memory(&mut self.cursor, modrm, size, &self.prefixes)
    }

    /// Fails under `66` for forms whose 16-bit variant has no distinct
    /// mnemonic or operand: segment push/pop, returns, ENTER/LEAVE and
    /// indirect branches.
    pub fn no_operand_size(&self) -> Result<(), Fault> {
        if self.prefixes.operand_size {
            Err(Fault::Unknown)
        } else {
            Ok(())
        }
    }

    /// Fails under a segment override or `67` for string forms, whose
    /// implicit `esi`/`edi` operands cannot carry either.
    pub fn plain_string(&self) -> Result<(), Fault> {
        if self.prefixes.segment.is_some() || self.prefixes.address_size {
            Err(Fault::Unknown)
        } else {
            Ok(())
        }
    }

    pub fn imm(&mut self, size: OperandSize) -> Result<Operand, Fault> {
        Ok(Operand::Immediate(self.cursor.read_immediate(size)?))
    }

    /// A relative branch target. The offset is the last field of the
    /// instruction, so the cursor sits at the next instruction afterwards.
    ///
    /// Under `66` the target would be truncated to 16 bits, which has no
    /// operand form, so those branches are unknown.
    pub fn rel(&mut self, size: OperandSize) -> Result<Operand, Fault> {
        self.no_operand_size()?;
        let offset = match size {
            OperandSize::SignedByte => self.cursor.read_i8()? as i32,
            OperandSize::Dword => self.cursor.read_u32()? as i32,
            _ => return Err(Fault::Unknown),
        };
        let next = self.address.wrapping_add(self.cursor.position() as u32);
        Ok(Operand::Relative(Relative::from_offset(next, offset, size)))
    }
}

/// General register `code` of the given width.
pub(crate) fn gpr(code: u8, size: OperandSize) -> Result<Register, Fault> {
    let class = match size {
        OperandSize::Byte | OperandSize::SignedByte => RegisterClass::Gpr8,
        OperandSize::Word => RegisterClass::Gpr16,
        OperandSize::Dword => RegisterClass::Gpr32,
        _ => return Err(Fault::Unknown),
    };
    Ok(Register::from_field(class, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ia32_core::{Condition, Segment};

    fn decode(bytes: &[u8]) -> DecodedInstruction {
        Ia32Disassembler::new().decode_instruction(bytes, 0x1000).unwrap()
    }

    #[test]
    fn test_nop() {
        let result = decode(&[0x90]);
        assert_eq!(result.instruction.mnemonic, Mnemonic::Nop);
        assert_eq!(result.size, 1);
    }

    #[test]
    fn test_mov_eax_imm32() {
        let result = decode(&[0xB8, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(result.instruction.to_string(), "mov eax,0x12345678");
        assert_eq!(result.size, 5);
    }

    #[test]
    fn test_jne_rel8() {
        let result = decode(&[0x75, 0x10]);
        assert_eq!(result.instruction.mnemonic, Mnemonic::Jcc(Condition::NotEqual));
        assert_eq!(result.instruction.operands, vec![Relative::short(0x1012).into()]);
    }

    #[test]
    fn test_call_rel32() {
        let result = decode(&[0xE8, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(result.instruction.mnemonic, Mnemonic::Call);
        assert_eq!(result.instruction.operands, vec![Relative::near(0x1105).into()]);
    }

    #[test]
    fn test_prefixed_memory() {
        let result = decode(&[0xF0, 0x64, 0x66, 0x01, 0x08]);
        let insn = &result.instruction;
        assert!(insn.lock);
        assert_eq!(insn.to_string(), "lock add word ptr fs:[eax],cx");
        let mem = insn.operands[0].as_memory().unwrap();
        assert_eq!(mem.segment, Some(Segment::FS));
    }

    #[test]
    fn test_pinned_bytes() {
        // add eax, 1 in its long form stays long.
        let result = decode(&[0x81, 0xC0, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(result.instruction.bytes().unwrap(), &[0x81, 0xC0, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_truncated() {
        let err = Ia32Disassembler::new()
            .decode_instruction(&[0xB8, 0x01], 0x1000)
            .unwrap_err();
        assert_eq!(err, DecodeError::truncated(0x1000, 5, 2));

        let err = Ia32Disassembler::new().decode_instruction(&[], 0x1000).unwrap_err();
        assert_eq!(err, DecodeError::truncated(0x1000, 1, 0));

        // Prefixes alone are not an instruction.
        let err = Ia32Disassembler::new()
            .decode_instruction(&[0x66, 0xF3], 0x1000)
            .unwrap_err();
        assert_eq!(err, DecodeError::truncated(0x1000, 3, 2));
    }

    #[test]
    fn test_unknown_consumes_opcode() {
        let result = decode(&[0xD6, 0x90]);
        assert!(result.instruction.is_unknown());
        assert_eq!(result.size, 1);

        let result = decode(&[0x0F, 0x38, 0x00, 0xC1]);
        assert!(result.instruction.is_unknown());
        assert_eq!(result.size, 2);
        assert_eq!(result.instruction.to_string(), "(bad)");
    }

    #[test]
    fn test_address_size_memory_is_unknown() {
        let result = decode(&[0x67, 0x8B, 0x07]);
        assert!(result.instruction.is_unknown());
        // Register forms are unaffected by 67.
        let result = decode(&[0x67, 0x8B, 0xC1]);
        assert_eq!(result.instruction.to_string(), "mov eax,ecx");
    }

    #[test]
    fn test_disassemble_stops_at_truncation() {
        let code = [0x55, 0x89, 0xE5, 0xC3, 0xE8, 0x00];
        let listing = Ia32Disassembler::new().disassemble(&code, 0x401000);
        assert_eq!(listing.instructions.len(), 3);
        assert_eq!(listing.end_offset, 4);
        assert_eq!(listing.instructions[1].address, 0x401001);
        assert_eq!(listing.instructions[2].mnemonic, Mnemonic::Ret { far: false });
    }

    #[test]
    fn test_disassemble_block_skips_errors() {
        let code = [0x90, 0xB8];
        let block = Ia32Disassembler::new().disassemble_block(&code, 0);
        assert_eq!(block.len(), 2);
        assert!(block[0].is_ok());
        assert!(block[1].is_err());
    }
}
