//! One-byte opcode map, dispatched on the high nibble.

use crate::cursor::Fault;
use crate::decoder::{gpr, Decoded, Reader};
use crate::x87;
use ia32_core::{
    Absolute, Condition, Immediate, LoopKind, Memory, Mnemonic, Operand, OperandSize, Register,
    RepPrefix, Segment, ShiftOp,
};

use Mnemonic::*;
use OperandSize::{Byte, SignedByte, Word};

pub(crate) fn decode(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode >> 4 {
        0x0..=0x3 => arithmetic_row(r, opcode),
        0x4 => {
            let m = if opcode < 0x48 { Inc } else { Dec };
            Ok((m, vec![gpr(opcode, r.op_size())?.into()]))
        }
        0x5 => {
            let m = if opcode < 0x58 { Push } else { Pop };
            Ok((m, vec![gpr(opcode, r.op_size())?.into()]))
        }
        0x6 => row_6(r, opcode),
        0x7 => Ok((Jcc(Condition::from_code(opcode)), vec![r.rel(SignedByte)?])),
        0x8 => row_8(r, opcode),
        0x9 => row_9(r, opcode),
        0xA => row_a(r, opcode),
        0xB => {
            let size = if opcode < 0xB8 { Byte } else { r.op_size() };
            Ok((Mov, vec![gpr(opcode, size)?.into(), r.imm(size)?]))
        }
        0xC => row_c(r, opcode),
        0xD => row_d(r, opcode),
        0xE => row_e(r, opcode),
        _ => row_f(r, opcode),
    }
}

/// Byte or word/dword, from bit 0 of the opcode.
fn width(r: &Reader<'_>, opcode: u8) -> OperandSize {
    if opcode & 1 == 0 {
        Byte
    } else {
        r.op_size()
    }
}

/// AL, AX or EAX.
fn accumulator(size: OperandSize) -> Result<Operand, Fault> {
    Ok(gpr(0, size)?.into())
}

/// The four-opcode family at `low` 0..=3: `r/m8,r8`, `r/m,r`, `r8,r/m8`,
/// `r,r/m`.
fn rm_reg(r: &mut Reader<'_>, m: Mnemonic, low: u8) -> Result<Decoded, Fault> {
    let size = width(r, low);
    let modrm = r.modrm()?;
    let rm = r.rm(modrm, size)?;
    let reg = gpr(modrm.reg, size)?.into();
    let operands = if low & 2 == 0 { vec![rm, reg] } else { vec![reg, rm] };
    Ok((m, operands))
}

/// `00`-`3F`: the eight ALU families plus segment push/pop and the decimal
/// adjusts.
fn arithmetic_row(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let sel = opcode >> 3;
    match opcode & 0x7 {
        low @ 0..=3 => rm_reg(r, Mnemonic::from_alu_selector(sel), low),
        4 => Ok((
            Mnemonic::from_alu_selector(sel),
            vec![accumulator(Byte)?, r.imm(Byte)?],
        )),
        5 => {
            let size = r.op_size();
            Ok((
                Mnemonic::from_alu_selector(sel),
                vec![accumulator(size)?, r.imm(size)?],
            ))
        }
        _ => match opcode {
            0x06 | 0x0E | 0x16 | 0x1E => {
                r.no_operand_size()?;
                let seg = Segment::from_code(sel).ok_or(Fault::Unknown)?;
                Ok((Push, vec![seg.into()]))
            }
            0x07 | 0x17 | 0x1F => {
                r.no_operand_size()?;
                let seg = Segment::from_code(sel).ok_or(Fault::Unknown)?;
                Ok((Pop, vec![seg.into()]))
            }
            0x27 => Ok((Daa, vec![])),
            0x2F => Ok((Das, vec![])),
            0x37 => Ok((Aaa, vec![])),
            0x3F => Ok((Aas, vec![])),
            _ => Err(Fault::Unknown),
        },
    }
}

fn row_6(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let size = r.op_size();
    let rep = r.prefixes.rep;
    match opcode {
        0x60 => Ok((Pusha { size }, vec![])),
        0x61 => Ok((Popa { size }, vec![])),
        0x62 => {
            // A pair of bounds, each as wide as the register.
            let bounds = if size == Word { OperandSize::Dword } else { OperandSize::Qword };
            let modrm = r.modrm()?;
            let mem = r.memory(modrm, bounds)?;
            Ok((Bound, vec![gpr(modrm.reg, size)?.into(), mem.into()]))
        }
        0x63 => {
            r.no_operand_size()?;
            let modrm = r.modrm()?;
            let rm = r.rm(modrm, Word)?;
            Ok((Arpl, vec![rm, gpr(modrm.reg, Word)?.into()]))
        }
        0x68 => Ok((Push, vec![r.imm(size)?])),
        0x69 | 0x6B => {
            let modrm = r.modrm()?;
            let src = r.rm(modrm, size)?;
            let imm = r.imm(if opcode == 0x6B { SignedByte } else { size })?;
            Ok((Imul, vec![gpr(modrm.reg, size)?.into(), src, imm]))
        }
        0x6A => {
            r.no_operand_size()?;
            Ok((Push, vec![r.imm(SignedByte)?]))
        }
        0x6C..=0x6F => {
            r.plain_string()?;
            let size = width(r, opcode);
            if opcode < 0x6E {
                Ok((Ins { size, rep }, vec![]))
            } else {
                Ok((Outs { size, rep }, vec![]))
            }
        }
        // 64-67 are prefixes.
        _ => Err(Fault::Unknown),
    }
}

fn row_8(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0x80 | 0x81 | 0x83 => {
            let size = width(r, opcode);
            let modrm = r.modrm()?;
            let dst = r.rm(modrm, size)?;
            let imm_size = match opcode {
                0x80 => Byte,
                0x83 => SignedByte,
                _ => size,
            };
            let imm = r.imm(imm_size)?;
            Ok((Mnemonic::from_alu_selector(modrm.reg), vec![dst, imm]))
        }
        0x84 | 0x85 => rm_reg(r, Test, opcode & 1),
        0x86 | 0x87 => rm_reg(r, Xchg, opcode & 1),
        0x88..=0x8B => rm_reg(r, Mov, opcode & 3),
        0x8C | 0x8E => {
            let modrm = r.modrm()?;
            let seg = Segment::from_code(modrm.reg).ok_or(Fault::Unknown)?;
            let other = if modrm.is_register() {
                gpr(modrm.rm, r.op_size())?.into()
            } else {
                // A word in memory either way.
                r.no_operand_size()?;
                r.memory(modrm, Word)?.into()
            };
            if opcode == 0x8C {
                Ok((Mov, vec![other, seg.into()]))
            } else if seg == Segment::CS {
                Err(Fault::Unknown)
            } else {
                Ok((Mov, vec![seg.into(), other]))
            }
        }
        0x8D => {
            let modrm = r.modrm()?;
            let src = r.memory(modrm, OperandSize::None)?;
            Ok((Lea, vec![gpr(modrm.reg, r.op_size())?.into(), src.into()]))
        }
        0x8F => {
            let modrm = r.modrm()?;
            if modrm.reg != 0 {
                return Err(Fault::Unknown);
            }
            let size = r.op_size();
            Ok((Pop, vec![r.rm(modrm, size)?]))
        }
        // 82 duplicates 80 and is left undecoded.
        _ => Err(Fault::Unknown),
    }
}

fn row_9(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let size = r.op_size();
    match opcode {
        0x90 if r.prefixes.rep == RepPrefix::Rep => Ok((Pause, vec![])),
        0x90 => Ok((Nop, vec![])),
        0x91..=0x97 => Ok((Xchg, vec![accumulator(size)?, gpr(opcode, size)?.into()])),
        0x98 => Ok((Convert { size }, vec![])),
        0x99 => Ok((ConvertDouble { size }, vec![])),
        0x9A => Ok((Call, vec![far_pointer(r)?])),
        0x9B => Ok((Wait, vec![])),
        0x9C => Ok((Pushf { size }, vec![])),
        0x9D => Ok((Popf { size }, vec![])),
        0x9E => Ok((Sahf, vec![])),
        _ => Ok((Lahf, vec![])),
    }
}

/// `ptr16:32` immediate of far CALL/JMP.
fn far_pointer(r: &mut Reader<'_>) -> Result<Operand, Fault> {
    if r.prefixes.operand_size {
        return Err(Fault::Unknown);
    }
    let offset = r.cursor.read_u32()?;
    let selector = r.cursor.read_u16()?;
    Ok(Absolute::new(selector, offset).into())
}

fn row_a(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let size = width(r, opcode);
    let rep = r.prefixes.rep;
    match opcode {
        0xA0..=0xA3 => {
            if r.prefixes.address_size {
                return Err(Fault::Unknown);
            }
            let mut mem = Memory::absolute(r.cursor.read_u32()?, size);
            mem.segment = r.prefixes.segment;
            let acc = accumulator(size)?;
            if opcode < 0xA2 {
                Ok((Mov, vec![acc, mem.into()]))
            } else {
                Ok((Mov, vec![mem.into(), acc]))
            }
        }
        0xA8 | 0xA9 => Ok((Test, vec![accumulator(size)?, r.imm(size)?])),
        _ => {
            r.plain_string()?;
            let m = match opcode {
                0xA4 | 0xA5 => Movs { size, rep },
                0xA6 | 0xA7 => Cmps { size, rep },
                0xAA | 0xAB => Stos { size, rep },
                0xAC | 0xAD => Lods { size, rep },
                _ => Scas { size, rep },
            };
            Ok((m, vec![]))
        }
    }
}

/// Shift group: `C0`/`C1` by imm8, `D0`/`D1` by one, `D2`/`D3` by CL.
fn shift(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let size = width(r, opcode);
    let modrm = r.modrm()?;
    let dst = r.rm(modrm, size)?;
    let count = match opcode {
        0xC0 | 0xC1 => r.imm(Byte)?,
        0xD0 | 0xD1 => Immediate::byte(1).into(),
        _ => Register::CL.into(),
    };
    Ok((Shift(ShiftOp::from_selector(modrm.reg)), vec![dst, count]))
}

/// LES/LDS and the two-byte LSS/LFS/LGS.
pub(crate) fn load_far_pointer(r: &mut Reader<'_>, seg: Segment) -> Result<Decoded, Fault> {
    let size = r.op_size();
    // m16:16 under `66`, m16:32 otherwise.
    let pointer = if size == Word { OperandSize::Dword } else { OperandSize::Fword };
    let modrm = r.modrm()?;
    let src = r.memory(modrm, pointer)?;
    Ok((LoadFarPointer(seg), vec![gpr(modrm.reg, size)?.into(), src.into()]))
}

fn row_c(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xC2 | 0xC3 | 0xC8..=0xCB | 0xCF if r.prefixes.operand_size => Err(Fault::Unknown),
        0xC0 | 0xC1 => shift(r, opcode),
        0xC2 => Ok((Ret { far: false }, vec![r.imm(Word)?])),
        0xC3 => Ok((Ret { far: false }, vec![])),
        0xC4 => load_far_pointer(r, Segment::ES),
        0xC5 => load_far_pointer(r, Segment::DS),
        0xC6 | 0xC7 => {
            let size = width(r, opcode);
            let modrm = r.modrm()?;
            if modrm.reg != 0 {
                return Err(Fault::Unknown);
            }
            let dst = r.rm(modrm, size)?;
            Ok((Mov, vec![dst, r.imm(size)?]))
        }
        0xC8 => {
            let frame = r.imm(Word)?;
            Ok((Enter, vec![frame, r.imm(Byte)?]))
        }
        0xC9 => Ok((Leave, vec![])),
        0xCA => Ok((Ret { far: true }, vec![r.imm(Word)?])),
        0xCB => Ok((Ret { far: true }, vec![])),
        0xCC => Ok((Int3, vec![])),
        0xCD => Ok((Int, vec![r.imm(Byte)?])),
        0xCE => Ok((Into, vec![])),
        _ => Ok((Iret, vec![])),
    }
}

fn row_d(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xD0..=0xD3 => shift(r, opcode),
        0xD4 | 0xD5 => {
            let m = if opcode == 0xD4 { Aam } else { Aad };
            match r.cursor.read_u8()? {
                10 => Ok((m, vec![])),
                base => Ok((m, vec![Immediate::byte(base).into()])),
            }
        }
        0xD7 => {
            r.plain_string()?;
            Ok((Xlat, vec![]))
        }
        0xD8..=0xDF => x87::decode(r, opcode),
        // D6 (SALC) is undocumented.
        _ => Err(Fault::Unknown),
    }
}

fn row_e(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        // With 67 these would count in CX.
        0xE0..=0xE3 if r.prefixes.address_size => Err(Fault::Unknown),
        0xE0 => Ok((Loop(LoopKind::Loopne), vec![r.rel(SignedByte)?])),
        0xE1 => Ok((Loop(LoopKind::Loope), vec![r.rel(SignedByte)?])),
        0xE2 => Ok((Loop(LoopKind::Loop), vec![r.rel(SignedByte)?])),
        0xE3 => Ok((Jecxz, vec![r.rel(SignedByte)?])),
        0xE4 | 0xE5 => {
            let acc = accumulator(width(r, opcode))?;
            Ok((In, vec![acc, r.imm(Byte)?]))
        }
        0xE6 | 0xE7 => {
            let acc = accumulator(width(r, opcode))?;
            Ok((Out, vec![r.imm(Byte)?, acc]))
        }
        0xE8 => Ok((Call, vec![r.rel(OperandSize::Dword)?])),
        0xE9 => Ok((Jmp, vec![r.rel(OperandSize::Dword)?])),
        0xEA => Ok((Jmp, vec![far_pointer(r)?])),
        0xEB => Ok((Jmp, vec![r.rel(SignedByte)?])),
        0xEC | 0xED => Ok((In, vec![accumulator(width(r, opcode))?, Register::DX.into()])),
        _ => Ok((Out, vec![Register::DX.into(), accumulator(width(r, opcode))?])),
    }
}

fn row_f(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    match opcode {
        0xF4 => Ok((Hlt, vec![])),
        0xF5 => Ok((Cmc, vec![])),
        0xF6 | 0xF7 => {
            let size = width(r, opcode);
            let modrm = r.modrm()?;
            let m = match modrm.reg {
                0 => Test,
                2 => Not,
                3 => Neg,
                4 => Mul,
                5 => Imul,
                6 => Div { signed: false },
                7 => Div { signed: true },
                _ => return Err(Fault::Unknown),
            };
            let op = r.rm(modrm, size)?;
            if m == Test {
                Ok((m, vec![op, r.imm(size)?]))
            } else {
                Ok((m, vec![op]))
            }
        }
        0xF8 => Ok((Clc, vec![])),
        0xF9 => Ok((Stc, vec![])),
        0xFA => Ok((Cli, vec![])),
        0xFB => Ok((Sti, vec![])),
        0xFC => Ok((Cld, vec![])),
        0xFD => Ok((Std, vec![])),
        0xFE => {
            let modrm = r.modrm()?;
            let m = match modrm.reg {
                0 => Inc,
                1 => Dec,
                _ => return Err(Fault::Unknown),
            };
            Ok((m, vec![r.rm(modrm, Byte)?]))
        }
        0xFF => {
            let size = r.op_size();
            let modrm = r.modrm()?;
            match modrm.reg {
                0 => Ok((Inc, vec![r.rm(modrm, size)?])),
                1 => Ok((Dec, vec![r.rm(modrm, size)?])),
                2..=5 => {
                    r.no_operand_size()?;
                    let m = if modrm.reg < 4 { Call } else { Jmp };
                    if modrm.reg & 1 == 0 {
                        Ok((m, vec![r.rm(modrm, size)?]))
                    } else {
                        Ok((m, vec![r.memory(modrm, OperandSize::Fword)?.into()]))
                    }
                }
                6 => Ok((Push, vec![r.rm(modrm, size)?])),
                _ => Err(Fault::Unknown),
            }
        }
        // F1 (ICEBP) is undocumented; F0, F2 and F3 are prefixes.
        _ => Err(Fault::Unknown),
    }
}
