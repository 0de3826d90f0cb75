//! Two-byte (`0F xx`) opcode map: system, general-purpose and the MMX/SSE
//! rows, which are forwarded to [`crate::simd`].

use crate::cursor::Fault;
use crate::decoder::{gpr, Decoded, Reader};
use crate::opcodes::load_far_pointer;
use crate::simd;
use ia32_core::{
    BitOp, Condition, Mnemonic, ModRm, OperandSize, Register, RegisterClass, Segment,
};

use Mnemonic::*;
use OperandSize::{Byte, Word};

pub(crate) fn decode(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode >> 4 {
        0x0 => row_0(r, opcode),
        0x2 if opcode <= 0x23 => control_move(r, opcode),
        0x3 => row_3(opcode),
        0x4 => {
            let size = r.op_size();
            let modrm = r.modrm()?;
            let src = r.rm(modrm, size)?;
            let dst = gpr(modrm.reg, size)?.into();
            Ok((Cmovcc(Condition::from_code(opcode)), vec![dst, src]))
        }
        0x8 => Ok((Jcc(Condition::from_code(opcode)), vec![r.rel(OperandSize::Dword)?])),
        0x9 => {
            let modrm = r.modrm()?;
            Ok((Setcc(Condition::from_code(opcode)), vec![r.rm(modrm, Byte)?]))
        }
        0xA => row_a(r, opcode),
        0xB => row_b(r, opcode),
        0xC if opcode <= 0xC1 || opcode >= 0xC7 => row_c(r, opcode),
        _ => simd::decode(r, opcode),
    }
}

fn row_0(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0x00 => {
            let modrm = r.modrm()?;
            let m = match modrm.reg {
                0 => Sldt,
                1 => Str,
                2 => Lldt,
                3 => Ltr,
                4 => Verr,
                5 => Verw,
                _ => return Err(Fault::Unknown),
            };
            Ok((m, vec![r.rm(modrm, Word)?]))
        }
        0x01 => {
            let modrm = r.modrm()?;
            match modrm.reg {
                sel @ 0..=3 => {
                    let m = [Sgdt, Sidt, Lgdt, Lidt][sel as usize];
                    Ok((m, vec![r.memory(modrm, OperandSize::Fword)?.into()]))
                }
                4 => Ok((Smsw, vec![r.rm(modrm, Word)?])),
                6 => Ok((Lmsw, vec![r.rm(modrm, Word)?])),
                7 => Ok((Invlpg, vec![r.memory(modrm, Byte)?.into()])),
                _ => Err(Fault::Unknown),
            }
        }
        0x02 | 0x03 => {
            let m = if opcode == 0x02 { Lar } else { Lsl };
            let modrm = r.modrm()?;
            let src = r.rm(modrm, Word)?;
            Ok((m, vec![gpr(modrm.reg, r.op_size())?.into(), src]))
        }
        0x06 => Ok((Clts, vec![])),
        0x08 => Ok((Invd, vec![])),
        0x09 => Ok((Wbinvd, vec![])),
        0x0B => Ok((Ud2, vec![])),
        _ => Err(Fault::Unknown),
    }
}

/// `0F 20`-`23`: moves to and from control and debug registers. The mod
/// field is ignored; the r/m field always names a 32-bit register.
fn control_move(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let modrm: ModRm = r.modrm()?;
    let general = Register::from_field(RegisterClass::Gpr32, modrm.rm).into();
    let system = if opcode & 1 == 0 {
        Register::cr(modrm.reg)
    } else {
        Register::dr(modrm.reg)
    }
    .into();
    if opcode < 0x22 {
        Ok((Mov, vec![general, system]))
    } else {
        Ok((Mov, vec![system, general]))
    }
}

fn row_3(opcode: u8) -> Result<Decoded, Fault> {
    let m = match opcode {
        0x30 => Wrmsr,
        0x31 => Rdtsc,
        0x32 => Rdmsr,
        0x33 => Rdpmc,
        0x34 => Sysenter,
        0x35 => Sysexit,
        _ => return Err(Fault::Unknown),
    };
    Ok((m, vec![]))
}

/// `r/m, reg` with a wide register.
fn rm_reg(r: &mut Reader<'_>, m: Mnemonic) -> Result<Decoded, Fault> {
    let size = r.op_size();
    let modrm = r.modrm()?;
    let dst = r.rm(modrm, size)?;
    Ok((m, vec![dst, gpr(modrm.reg, size)?.into()]))
}

/// SHLD/SHRD: `r/m, reg, imm8` or `r/m, reg, cl`.
fn double_shift(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let (m, mut operands) = rm_reg(r, DoubleShift { right: opcode >= 0xAC })?;
    if opcode & 1 == 0 {
        operands.push(r.imm(Byte)?);
    } else {
        operands.push(Register::CL.into());
    }
    Ok((m, operands))
}

fn row_a(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xA0 | 0xA1 | 0xA8 | 0xA9 if r.prefixes.operand_size => Err(Fault::Unknown),
        0xA0 => Ok((Push, vec![Segment::FS.into()])),
        0xA1 => Ok((Pop, vec![Segment::FS.into()])),
        0xA2 => Ok((Cpuid, vec![])),
        0xA3 => rm_reg(r, BitTest(BitOp::Bt)),
        0xA4 | 0xA5 | 0xAC | 0xAD => double_shift(r, opcode),
        0xA8 => Ok((Push, vec![Segment::GS.into()])),
        0xA9 => Ok((Pop, vec![Segment::GS.into()])),
        0xAA => Ok((Rsm, vec![])),
        0xAB => rm_reg(r, BitTest(BitOp::Bts)),
        0xAE => simd::decode(r, opcode),
        0xAF => {
            let size = r.op_size();
            let modrm = r.modrm()?;
            let src = r.rm(modrm, size)?;
            Ok((Imul, vec![gpr(modrm.reg, size)?.into(), src]))
        }
        _ => Err(Fault::Unknown),
    }
}

fn row_b(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xB0 | 0xB1 => exchange(r, Cmpxchg, opcode),
        0xB2 => load_far_pointer(r, Segment::SS),
        0xB3 => rm_reg(r, BitTest(BitOp::Btr)),
        0xB4 => load_far_pointer(r, Segment::FS),
        0xB5 => load_far_pointer(r, Segment::GS),
        // A word source into a word register is a plain move.
        0xB7 | 0xBF if r.prefixes.operand_size => Err(Fault::Unknown),
        0xB6 | 0xB7 | 0xBE | 0xBF => {
            let size = r.op_size();
            let src_size = if opcode & 1 == 0 { Byte } else { Word };
            let modrm = r.modrm()?;
            let src = r.rm(modrm, src_size)?;
            let m = MovExtend { signed: opcode >= 0xBE };
            Ok((m, vec![gpr(modrm.reg, size)?.into(), src]))
        }
        0xBA => {
            let size = r.op_size();
            let modrm = r.modrm()?;
            let op = BitOp::from_selector(modrm.reg).ok_or(Fault::Unknown)?;
            let dst = r.rm(modrm, size)?;
            Ok((BitTest(op), vec![dst, r.imm(Byte)?]))
        }
        0xBB => rm_reg(r, BitTest(BitOp::Btc)),
        0xBC | 0xBD => {
            let size = r.op_size();
            let modrm = r.modrm()?;
            let src = r.rm(modrm, size)?;
            let m = BitScan { reverse: opcode == 0xBD };
            Ok((m, vec![gpr(modrm.reg, size)?.into(), src]))
        }
        // B8 (JMPE/POPCNT) and B9 (UD1) are not part of this instruction set.
        _ => Err(Fault::Unknown),
    }
}

/// CMPXCHG/XADD: byte form at the even opcode, wide form at the odd one.
fn exchange(r: &mut Reader<'_>, m: Mnemonic, opcode: u8) -> Result<Decoded, Fault> {
    let size = if opcode & 1 == 0 { Byte } else { r.op_size() };
    let modrm = r.modrm()?;
    let dst = r.rm(modrm, size)?;
    Ok((m, vec![dst, gpr(modrm.reg, size)?.into()]))
}

fn row_c(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xC0 | 0xC1 => exchange(r, Xadd, opcode),
        0xC7 => {
            let modrm = r.modrm()?;
            if modrm.reg != 1 {
                return Err(Fault::Unknown);
            }
            Ok((Cmpxchg8b, vec![r.memory(modrm, OperandSize::Qword)?.into()]))
        }
        _ => Ok((Bswap, vec![gpr(opcode, OperandSize::Dword)?.into()])),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Disassembler, Ia32Disassembler};
    use ia32_core::Instruction;

    fn decode(bytes: &[u8]) -> Instruction {
        let decoded = Ia32Disassembler::new().decode_instruction(bytes, 0x1000).unwrap();
        assert_eq!(decoded.size, bytes.len(), "size of {:02x?}", bytes);
        decoded.instruction
    }

    fn text(bytes: &[u8]) -> String {
        decode(bytes).to_string()
    }

    #[test]
    fn test_system_forms() {
        assert_eq!(text(&[0x0F, 0x01, 0x15, 0x00, 0x20, 0x00, 0x00]), "lgdt fword ptr [0x2000]");
        assert_eq!(text(&[0x0F, 0x00, 0xD8]), "ltr ax");
        assert_eq!(text(&[0x0F, 0x01, 0x38]), "invlpg byte ptr [eax]");
        assert_eq!(text(&[0x0F, 0x20, 0xC0]), "mov eax,cr0");
        assert_eq!(text(&[0x0F, 0x23, 0xF8]), "mov dr7,eax");
        assert_eq!(text(&[0x0F, 0xA2]), "cpuid");
        assert_eq!(text(&[0x0F, 0x31]), "rdtsc");
        assert_eq!(text(&[0x0F, 0x0B]), "ud2");
        assert_eq!(text(&[0x0F, 0x02, 0xC1]), "lar eax,cx");
    }

    #[test]
    fn test_general_forms() {
        assert_eq!(text(&[0x0F, 0xB6, 0xC1]), "movzx eax,cl");
        assert_eq!(text(&[0x0F, 0xBF, 0x06]), "movsx eax,word ptr [esi]");
        assert_eq!(text(&[0x0F, 0xAF, 0xC1]), "imul eax,ecx");
        assert_eq!(text(&[0x0F, 0x44, 0xC1]), "cmove eax,ecx");
        assert_eq!(text(&[0x0F, 0x94, 0xC0]), "sete al");
        assert_eq!(text(&[0x0F, 0xA3, 0xC8]), "bt eax,ecx");
        assert_eq!(text(&[0x0F, 0xBA, 0xE8, 0x03]), "bts eax,0x3");
        assert_eq!(text(&[0x0F, 0xA4, 0xC8, 0x04]), "shld eax,ecx,0x4");
        assert_eq!(text(&[0x0F, 0xAD, 0xC8]), "shrd eax,ecx,cl");
        assert_eq!(text(&[0x0F, 0xBC, 0xC1]), "bsf eax,ecx");
        assert_eq!(text(&[0x0F, 0xC8]), "bswap eax");
        assert_eq!(text(&[0x0F, 0xA0]), "push fs");
        assert_eq!(text(&[0x0F, 0xB4, 0x06]), "lfs eax,fword ptr [esi]");
        assert_eq!(text(&[0x66, 0x0F, 0xB5, 0x06]), "lgs ax,dword ptr [esi]");
        assert_eq!(text(&[0x66, 0x0F, 0xB6, 0xC1]), "movzx ax,cl");
        assert!(decode(&[0x66, 0x0F, 0xB7]).is_unknown());
        assert!(decode(&[0x66, 0x0F, 0xBF]).is_unknown());
        assert!(decode(&[0x66, 0x0F, 0xA8]).is_unknown());
    }

    #[test]
    fn test_atomic_forms() {
        assert_eq!(text(&[0xF0, 0x0F, 0xB1, 0x0A]), "lock cmpxchg dword ptr [edx],ecx");
        assert_eq!(text(&[0x0F, 0xC0, 0xC8]), "xadd al,cl");
        assert_eq!(text(&[0xF0, 0x0F, 0xC7, 0x0E]), "lock cmpxchg8b qword ptr [esi]");
        assert!(decode(&[0x0F, 0xC7, 0xC8]).is_unknown());
    }

    #[test]
    fn test_near_jcc() {
        assert_eq!(text(&[0x0F, 0x84, 0x00, 0x01, 0x00, 0x00]), "je 0x1106");
    }

    #[test]
    fn test_unsupported_rows() {
        for second in [0x38u8, 0x3A, 0x0D, 0x19, 0x24, 0x36, 0x78, 0xA6, 0xB8, 0xB9, 0xFF] {
            let insn = decode(&[0x0F, second]);
            assert!(insn.is_unknown(), "0f {:02x}", second);
        }
    }
}
