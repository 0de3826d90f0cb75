//! Per-family encode rules.
//!
//! Every rule fills one [`Encoder`], which lays the bytes out in a fixed
//! order: LOCK, REP/REPNE, segment override, operand-size override,
//! mandatory SIMD prefix, then opcode, addressing bytes, immediates and any
//! relative offset.

mod general;
pub mod modrm;
pub mod simd;
mod system;
pub mod x87;

use crate::error::EncodeError;
use crate::{Immediate, Instruction, Mnemonic, Operand, OperandSize, Register, Relative};

/// Encodes an instruction from its catalog rule.
pub fn encode(insn: &Instruction) -> Result<Vec<u8>, EncodeError> {
    use Mnemonic::*;

    let mut enc = Encoder::new(insn);
    match insn.mnemonic {
        Unknown => return Err(EncodeError::UnknownInstruction),

        Hlt | Sldt | Str | Lldt | Ltr | Verr | Verw | Sgdt | Sidt | Lgdt | Lidt | Smsw | Lmsw
        | Invlpg | Lar | Lsl | Clts | Invd | Wbinvd | Ud2 | Cpuid | Rdtsc | Rdmsr | Wrmsr
        | Rdpmc | Sysenter | Sysexit | Rsm => system::encode(&mut enc)?,

        m if m.is_x87() => x87::encode(&mut enc)?,

        Emms | Movd | Movq | Movdq { .. } | Punpckl(_) | Punpckh(_) | Packss(_) | Packuswb
        | Pcmpeq(_) | Pcmpgt(_) | Padd { .. } | Psub { .. } | Pmul(_) | Pmaddwd | Psadbw
        | Pavg(_) | Pmin { .. } | Pmax { .. } | Pand | Pandn | Por | Pxor | Psll(_) | Psrl(_)
        | Psra(_) | PshiftDq { .. } | Pshuf(_) | Pinsrw | Pextrw | Pmovmskb | Maskmovq
        | SseArith { .. } | SseLogic { .. } | MovAligned { .. } | MovUnaligned { .. }
        | MovScalar { .. } | MovLow { .. } | MovHigh { .. } | Movhlps | Movlhps
        | Unpck { .. } | Movmsk { .. } | Comis { .. } | SseCmp { .. } | Shufp { .. }
        | Cvt { .. } | Movnt(_) | Ldmxcsr | Stmxcsr | Fxsave | Fxrstor | Fence(_)
        | Clflush | Prefetch(_) => simd::encode(&mut enc)?,

        _ => general::encode(&mut enc)?,
    }
    enc.finish()
}

/// Byte buffer for one instruction.
pub(crate) struct Encoder<'a> {
    insn: &'a Instruction,
    rep: Option<u8>,
    operand_size: bool,
    mandatory: Option<u8>,
    body: Vec<u8>,
    relative: Option<Relative>,
}

impl<'a> Encoder<'a> {
    fn new(insn: &'a Instruction) -> Self {
        Self {
            insn,
            rep: None,
            operand_size: false,
            mandatory: None,
            body: Vec::with_capacity(8),
            relative: None,
        }
    }

    pub(crate) fn mnemonic(&self) -> Mnemonic {
        self.insn.mnemonic
    }

    pub(crate) fn operands(&self) -> &'a [Operand] {
        &self.insn.operands
    }

    /// Error for an operand combination no rule covers.
    pub(crate) fn unsupported(&self) -> EncodeError {
        EncodeError::unsupported(self.insn.mnemonic, &self.insn.operands)
    }

    /// REP (`F3`) or REPNE (`F2`).
    pub(crate) fn rep(&mut self, byte: Option<u8>) {
        self.rep = byte;
    }

    /// Emits `66` when `size` is a word.
    pub(crate) fn size(&mut self, size: OperandSize) {
        if size == OperandSize::Word {
            self.operand_size = true;
        }
    }

    /// Mandatory SIMD prefix, placed right before the opcode.
    pub(crate) fn mandatory(&mut self, prefix: Option<u8>) {
        self.mandatory = prefix;
    }

    pub(crate) fn opcode(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub(crate) fn byte(&mut self, byte: u8) {
        self.body.push(byte);
    }

    /// ModR/M (+ SIB + displacement) with `reg` in the reg field.
    pub(crate) fn modrm(&mut self, reg: u8, rm: &Operand) -> Result<(), EncodeError> {
        modrm::encode_modrm(reg, rm)?.write_to(&mut self.body);
        Ok(())
    }

    /// ModR/M for a register pair, `reg` in the reg field.
    pub(crate) fn modrm_reg(&mut self, reg: Register, rm: &Operand) -> Result<(), EncodeError> {
        self.modrm(reg.code(), rm)
    }

    pub(crate) fn imm(&mut self, imm: &Immediate) {
        imm.write_to(&mut self.body);
    }

    /// Trailing relative offset, resolved once the length is known.
    pub(crate) fn relative(&mut self, rel: &Relative) {
        self.relative = Some(*rel);
    }

    fn finish(self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(self.body.len() + 8);
        if self.insn.lock {
            out.push(0xF0);
        }
        if let Some(rep) = self.rep {
            out.push(rep);
        }
        let segment = self
            .insn
            .operands
            .iter()
            .find_map(|op| op.as_memory().and_then(|m| m.segment));
        if let Some(seg) = segment {
            out.push(seg.prefix());
        }
        if self.operand_size && self.mandatory != Some(0x66) {
            out.push(0x66);
        }
        if let Some(prefix) = self.mandatory {
            out.push(prefix);
        }
        out.extend_from_slice(&self.body);

        if let Some(rel) = self.relative {
            let width = rel.size.bytes();
            let next = self
                .insn
                .address
                .wrapping_add((out.len() + width) as u32);
            let offset = rel.offset(next) as i64;
            let fits = match rel.size {
                OperandSize::SignedByte | OperandSize::Byte => i8::try_from(offset).is_ok(),
                OperandSize::Word => i16::try_from(offset).is_ok(),
                _ => true,
            };
            if !fits {
                return Err(EncodeError::BranchOutOfRange {
                    target: rel.target,
                    offset,
                    size: rel.size,
                });
            }
            out.extend_from_slice(&(offset as u32).to_le_bytes()[..width]);
        }
        log::trace!("encoded {} as {:02x?}", self.insn.mnemonic, out);
        Ok(out)
    }
}

/// Returns the width of a general register or memory operand.
pub(crate) fn rm_size(op: &Operand) -> Option<OperandSize> {
    match op {
        Operand::Register(reg) if reg.is_general() => Some(reg.size()),
        Operand::Memory(mem) => Some(mem.size),
        _ => None,
    }
}

/// Bit 0 of the classic opcode pairs: 0 for byte, 1 for word/dword.
pub(crate) fn width_bit(size: OperandSize) -> Option<u8> {
    match size {
        OperandSize::Byte => Some(0),
        OperandSize::Word | OperandSize::Dword => Some(1),
        _ => None,
    }
}

/// True for a general register or a memory operand.
pub(crate) fn is_rm(op: &Operand) -> bool {
    matches!(op, Operand::Memory(_)) || matches!(op, Operand::Register(r) if r.is_general())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Memory, Segment};

    fn enc(mnemonic: Mnemonic, operands: Vec<Operand>) -> Vec<u8> {
        Instruction::new(mnemonic, operands).encode().unwrap()
    }

    #[test]
    fn test_prefix_order() {
        let mem = Memory::base(Register::EAX, OperandSize::Word).with_segment(Segment::FS);
        let insn = Instruction::new(
            Mnemonic::Add { carry: false },
            vec![Operand::mem(mem), Operand::reg(Register::CX)],
        )
        .locked();
        assert_eq!(insn.encode().unwrap(), vec![0xF0, 0x64, 0x66, 0x01, 0x08]);
    }

    #[test]
    fn test_unknown_has_no_encoding() {
        let insn = Instruction::new(Mnemonic::Unknown, vec![]);
        assert_eq!(insn.encode(), Err(EncodeError::UnknownInstruction));
    }

    #[test]
    fn test_relative_resolved_from_end_address() {
        let bytes = Instruction::new(Mnemonic::Jmp, vec![Relative::short(0x1004).into()])
            .at(0x1000)
            .encode()
            .unwrap();
        assert_eq!(bytes, vec![0xEB, 0x02]);
    }

    #[test]
    fn test_rel8_out_of_range() {
        let insn = Instruction::new(Mnemonic::Jmp, vec![Relative::short(0x2000).into()]).at(0x1000);
        assert!(matches!(
            insn.encode(),
            Err(EncodeError::BranchOutOfRange { target: 0x2000, .. })
        ));
    }

    #[test]
    fn test_mnemonic_mismatch_is_an_error() {
        let insn = Instruction::new(Mnemonic::Push, vec![Operand::reg(Register::xmm(0))]);
        assert!(matches!(
            insn.encode(),
            Err(EncodeError::UnsupportedOperands { .. })
        ));
        assert_eq!(enc(Mnemonic::Nop, vec![]), vec![0x90]);
    }
}
