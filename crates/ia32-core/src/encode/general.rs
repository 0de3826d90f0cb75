//! General purpose, control transfer and string instructions.

use super::{is_rm, rm_size, width_bit, Encoder};
use crate::error::EncodeError;
use crate::{
    Immediate, Mnemonic, Operand, OperandSize, Register, RegisterClass, RepPrefix,
    Segment,
};

pub(crate) fn encode(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    use Mnemonic::*;

    let m = e.mnemonic();
    if let Some(sel) = m.alu_selector() {
        return alu(e, sel);
    }
    match m {
        Test => test(e),
        Inc => inc_dec(e, 0),
        Dec => inc_dec(e, 1),
        Not => unary(e, 2),
        Neg => unary(e, 3),
        Mul => unary(e, 4),
        Imul => imul(e),
        Div { signed } => unary(e, if signed { 7 } else { 6 }),
        Shift(op) => shift(e, op.selector()),
        DoubleShift { right } => double_shift(e, right),
        Mov => mov(e),
        MovExtend { signed } => mov_extend(e, signed),
        Lea => lea(e),
        Xchg => xchg(e),
        Xadd => exchange_rm(e, &[0x0F, 0xC0]),
        Cmpxchg => exchange_rm(e, &[0x0F, 0xB0]),
        Cmpxchg8b => match e.operands() {
            [op @ Operand::Memory(mem)] if mem.size == OperandSize::Qword => {
                e.opcode(&[0x0F, 0xC7]);
                e.modrm(1, op)
            }
            _ => Err(e.unsupported()),
        },
        Push => push(e),
        Pop => pop(e),
        Pusha { size } => sized(e, size, 0x60),
        Popa { size } => sized(e, size, 0x61),
        Pushf { size } => sized(e, size, 0x9C),
        Popf { size } => sized(e, size, 0x9D),
        Convert { size } => sized(e, size, 0x98),
        ConvertDouble { size } => sized(e, size, 0x99),
        Sahf => fixed(e, &[0x9E]),
        Lahf => fixed(e, &[0x9F]),
        BitTest(op) => bit_test(e, op.selector(), op.register_opcode()),
        BitScan { reverse } => reg_rm(e, &[0x0F, if reverse { 0xBD } else { 0xBC }]),
        Bswap => match e.operands() {
            [Operand::Register(r)] if r.class() == RegisterClass::Gpr32 => {
                e.opcode(&[0x0F, 0xC8 + r.code()]);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Setcc(cond) => match e.operands() {
            [op] if rm_size(op) == Some(OperandSize::Byte) => {
                e.opcode(&[0x0F, 0x90 + cond.code()]);
                e.modrm(0, op)
            }
            _ => Err(e.unsupported()),
        },
        Cmovcc(cond) => reg_rm(e, &[0x0F, 0x40 + cond.code()]),
        Daa => fixed(e, &[0x27]),
        Das => fixed(e, &[0x2F]),
        Aaa => fixed(e, &[0x37]),
        Aas => fixed(e, &[0x3F]),
        Aam => ascii_adjust(e, 0xD4),
        Aad => ascii_adjust(e, 0xD5),
        Xlat => fixed(e, &[0xD7]),
        Bound => match e.operands() {
            [Operand::Register(r), op @ Operand::Memory(mem)]
                if (r.class() == RegisterClass::Gpr32 && mem.size == OperandSize::Qword)
                    || (r.class() == RegisterClass::Gpr16 && mem.size == OperandSize::Dword) =>
            {
                e.size(r.size());
                e.opcode(&[0x62]);
                e.modrm_reg(*r, op)
            }
            _ => Err(e.unsupported()),
        },
        Arpl => match e.operands() {
            [op, Operand::Register(r)]
                if r.class() == RegisterClass::Gpr16 && rm_size(op) == Some(OperandSize::Word) =>
            {
                e.opcode(&[0x63]);
                e.modrm_reg(*r, op)
            }
            _ => Err(e.unsupported()),
        },
        LoadFarPointer(seg) => load_far_pointer(e, seg),
        Nop => fixed(e, &[0x90]),
        Pause => {
            e.rep(Some(0xF3));
            fixed(e, &[0x90])
        }
        Wait => fixed(e, &[0x9B]),
        Clc => fixed(e, &[0xF8]),
        Stc => fixed(e, &[0xF9]),
        Cmc => fixed(e, &[0xF5]),
        Cld => fixed(e, &[0xFC]),
        Std => fixed(e, &[0xFD]),
        Cli => fixed(e, &[0xFA]),
        Sti => fixed(e, &[0xFB]),
        In => port_io(e, false),
        Out => port_io(e, true),

        Jmp => jump(e, false),
        Call => jump(e, true),
        Jcc(cond) => match e.operands() {
            [Operand::Relative(rel)] if rel.size == OperandSize::SignedByte => {
                e.byte(0x70 + cond.code());
                e.relative(rel);
                Ok(())
            }
            [Operand::Relative(rel)] if rel.size == OperandSize::Dword => {
                e.opcode(&[0x0F, 0x80 + cond.code()]);
                e.relative(rel);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Jecxz => short_branch(e, 0xE3),
        Loop(kind) => short_branch(e, kind.opcode()),
        Ret { far } => {
            let base = if far { 0xCA } else { 0xC2 };
            match e.operands() {
                [] => fixed(e, &[base + 1]),
                [Operand::Immediate(imm)] if imm.size() == OperandSize::Word => {
                    e.byte(base);
                    e.imm(imm);
                    Ok(())
                }
                _ => Err(e.unsupported()),
            }
        }
        Iret => fixed(e, &[0xCF]),
        Int3 => fixed(e, &[0xCC]),
        Into => fixed(e, &[0xCE]),
        Int => match e.operands() {
            [Operand::Immediate(imm)] if imm.size() == OperandSize::Byte => {
                e.byte(0xCD);
                e.imm(imm);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Enter => match e.operands() {
            [Operand::Immediate(frame), Operand::Immediate(level)]
                if frame.size() == OperandSize::Word && level.size() == OperandSize::Byte =>
            {
                e.byte(0xC8);
                e.imm(frame);
                e.imm(level);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Leave => fixed(e, &[0xC9]),

        Movs { size, rep } => string(e, 0xA4, size, rep),
        Cmps { size, rep } => string(e, 0xA6, size, rep),
        Stos { size, rep } => string(e, 0xAA, size, rep),
        Lods { size, rep } => string(e, 0xAC, size, rep),
        Scas { size, rep } => string(e, 0xAE, size, rep),
        Ins { size, rep } => string(e, 0x6C, size, rep),
        Outs { size, rep } => string(e, 0x6E, size, rep),

        _ => Err(e.unsupported()),
    }
}

/// Argument-less instruction with a fixed opcode.
pub(crate) fn fixed(e: &mut Encoder<'_>, opcode: &[u8]) -> Result<(), EncodeError> {
    if !e.operands().is_empty() {
        return Err(e.unsupported());
    }
    e.opcode(opcode);
    Ok(())
}

/// Argument-less instruction whose width comes from the mnemonic.
fn sized(e: &mut Encoder<'_>, size: OperandSize, opcode: u8) -> Result<(), EncodeError> {
    if !matches!(size, OperandSize::Word | OperandSize::Dword) {
        return Err(e.unsupported());
    }
    e.size(size);
    fixed(e, &[opcode])
}

/// ADD/OR/ADC/SBB/AND/SUB/XOR/CMP.
fn alu(e: &mut Encoder<'_>, sel: u8) -> Result<(), EncodeError> {
    let ops = e.operands();
    match ops {
        // Short accumulator form, only when the immediate has the
        // register's own width.
        [Operand::Register(r), Operand::Immediate(imm)]
            if r.is_accumulator() && imm.size() == r.size() =>
        {
            let w = width_bit(r.size()).ok_or_else(|| e.unsupported())?;
            e.size(r.size());
            e.byte(sel * 8 + 4 + w);
            e.imm(imm);
            Ok(())
        }
        [dst, Operand::Immediate(imm)] if is_rm(dst) => {
            let size = rm_size(dst).ok_or_else(|| e.unsupported())?;
            let opcode = match (size, imm.size()) {
                (OperandSize::Byte, OperandSize::Byte | OperandSize::SignedByte) => 0x80,
                (OperandSize::Word | OperandSize::Dword, OperandSize::SignedByte) => 0x83,
                (s, i) if s == i && s != OperandSize::Byte && width_bit(s).is_some() => 0x81,
                _ => return Err(e.unsupported()),
            };
            e.size(size);
            e.byte(opcode);
            e.modrm(sel, dst)?;
            e.imm(imm);
            Ok(())
        }
        _ => rm_reg_pair(e, sel * 8),
    }
}

/// The classic four-opcode family: `base+0` r/m8,r8; `base+1` r/m,r;
/// `base+2` r8,r/m8; `base+3` r,r/m.
fn rm_reg_pair(e: &mut Encoder<'_>, base: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [dst, Operand::Register(src)] if src.is_general() && rm_size(dst) == Some(src.size()) => {
            let w = width_bit(src.size()).ok_or_else(|| e.unsupported())?;
            e.size(src.size());
            e.byte(base + w);
            e.modrm_reg(*src, dst)
        }
        [Operand::Register(dst), src @ Operand::Memory(mem)]
            if dst.is_general() && mem.size == dst.size() =>
        {
            let w = width_bit(dst.size()).ok_or_else(|| e.unsupported())?;
            e.size(dst.size());
            e.byte(base + 2 + w);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn test(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(r), Operand::Immediate(imm)]
            if r.is_accumulator() && imm.size() == r.size() =>
        {
            let w = width_bit(r.size()).ok_or_else(|| e.unsupported())?;
            e.size(r.size());
            e.byte(0xA8 + w);
            e.imm(imm);
            Ok(())
        }
        [dst, Operand::Immediate(imm)] if rm_size(dst) == Some(imm.size()) => {
            let w = width_bit(imm.size()).ok_or_else(|| e.unsupported())?;
            e.size(imm.size());
            e.byte(0xF6 + w);
            e.modrm(0, dst)?;
            e.imm(imm);
            Ok(())
        }
        [dst, Operand::Register(src)] if src.is_general() && rm_size(dst) == Some(src.size()) => {
            let w = width_bit(src.size()).ok_or_else(|| e.unsupported())?;
            e.size(src.size());
            e.byte(0x84 + w);
            e.modrm_reg(*src, dst)
        }
        _ => Err(e.unsupported()),
    }
}

fn inc_dec(e: &mut Encoder<'_>, sel: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(r)]
            if matches!(r.class(), RegisterClass::Gpr16 | RegisterClass::Gpr32) =>
        {
            e.size(r.size());
            e.byte(0x40 + sel * 8 + r.code());
            Ok(())
        }
        [op] => {
            let size = rm_size(op).ok_or_else(|| e.unsupported())?;
            let w = width_bit(size).ok_or_else(|| e.unsupported())?;
            e.size(size);
            e.byte(0xFE + w);
            e.modrm(sel, op)
        }
        _ => Err(e.unsupported()),
    }
}

/// Group 3 single-operand forms (`F6`/`F7 /sel`).
fn unary(e: &mut Encoder<'_>, sel: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [op] => {
            let size = rm_size(op).ok_or_else(|| e.unsupported())?;
            let w = width_bit(size).ok_or_else(|| e.unsupported())?;
            e.size(size);
            e.byte(0xF6 + w);
            e.modrm(sel, op)
        }
        _ => Err(e.unsupported()),
    }
}

fn imul(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [_] => unary(e, 5),
        [Operand::Register(dst), src] if wide_gpr(dst) && rm_size(src) == Some(dst.size()) => {
            e.size(dst.size());
            e.opcode(&[0x0F, 0xAF]);
            e.modrm_reg(*dst, src)
        }
        [Operand::Register(dst), src, Operand::Immediate(imm)]
            if wide_gpr(dst) && rm_size(src) == Some(dst.size()) =>
        {
            let opcode = if imm.size() == OperandSize::SignedByte {
                0x6B
            } else if imm.size() == dst.size() {
                0x69
            } else {
                return Err(e.unsupported());
            };
            e.size(dst.size());
            e.byte(opcode);
            e.modrm_reg(*dst, src)?;
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

fn wide_gpr(r: &Register) -> bool {
    matches!(r.class(), RegisterClass::Gpr16 | RegisterClass::Gpr32)
}

/// Group 2: `D0`/`D1` by one, `D2`/`D3` by CL, `C0`/`C1` by imm8.
fn shift(e: &mut Encoder<'_>, sel: u8) -> Result<(), EncodeError> {
    let [dst, count] = e.operands() else {
        return Err(e.unsupported());
    };
    let size = rm_size(dst).ok_or_else(|| e.unsupported())?;
    let w = width_bit(size).ok_or_else(|| e.unsupported())?;
    e.size(size);
    match count {
        Operand::Register(r) if *r == Register::CL => {
            e.byte(0xD2 + w);
            e.modrm(sel, dst)
        }
        Operand::Immediate(imm) if imm.size() == OperandSize::Byte && imm.value() == 1 => {
            e.byte(0xD0 + w);
            e.modrm(sel, dst)
        }
        Operand::Immediate(imm) if imm.size() == OperandSize::Byte => {
            e.byte(0xC0 + w);
            e.modrm(sel, dst)?;
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

fn double_shift(e: &mut Encoder<'_>, right: bool) -> Result<(), EncodeError> {
    let base = if right { 0xAC } else { 0xA4 };
    match e.operands() {
        [dst, Operand::Register(src), count] if wide_gpr(src) && rm_size(dst) == Some(src.size()) => {
            e.size(src.size());
            match count {
                Operand::Immediate(imm) if imm.size() == OperandSize::Byte => {
                    e.opcode(&[0x0F, base]);
                    e.modrm_reg(*src, dst)?;
                    e.imm(imm);
                    Ok(())
                }
                Operand::Register(r) if *r == Register::CL => {
                    e.opcode(&[0x0F, base + 1]);
                    e.modrm_reg(*src, dst)
                }
                _ => Err(e.unsupported()),
            }
        }
        _ => Err(e.unsupported()),
    }
}

fn mov(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(r), Operand::Immediate(imm)]
            if r.is_general() && imm.size() == r.size() =>
        {
            let base = if r.size() == OperandSize::Byte { 0xB0 } else { 0xB8 };
            e.size(r.size());
            e.byte(base + r.code());
            e.imm(imm);
            Ok(())
        }
        [dst @ Operand::Memory(mem), Operand::Immediate(imm)] if mem.size == imm.size() => {
            let w = width_bit(mem.size).ok_or_else(|| e.unsupported())?;
            e.size(mem.size);
            e.byte(0xC6 + w);
            e.modrm(0, dst)?;
            e.imm(imm);
            Ok(())
        }
        // moffs forms
        [Operand::Register(r), Operand::Memory(mem)]
            if r.is_accumulator() && mem.is_absolute() && mem.size == r.size() =>
        {
            let w = width_bit(r.size()).ok_or_else(|| e.unsupported())?;
            e.size(r.size());
            e.byte(0xA0 + w);
            e.imm(&Immediate::dword(mem.disp() as u32));
            Ok(())
        }
        [Operand::Memory(mem), Operand::Register(r)]
            if r.is_accumulator() && mem.is_absolute() && mem.size == r.size() =>
        {
            let w = width_bit(r.size()).ok_or_else(|| e.unsupported())?;
            e.size(r.size());
            e.byte(0xA2 + w);
            e.imm(&Immediate::dword(mem.disp() as u32));
            Ok(())
        }
        [dst, Operand::Segment(seg)] if segment_rm(dst) => {
            if let Operand::Register(r) = dst {
                e.size(r.size());
            }
            e.byte(0x8C);
            e.modrm(seg.code(), dst)
        }
        [Operand::Segment(seg), src] if segment_rm(src) => {
            if let Operand::Register(r) = src {
                e.size(r.size());
            }
            e.byte(0x8E);
            e.modrm(seg.code(), src)
        }
        [Operand::Register(dst), Operand::Register(src)]
            if dst.class() == RegisterClass::Gpr32 && is_system(src) =>
        {
            let opcode = if src.class() == RegisterClass::Control { 0x20 } else { 0x21 };
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*src, &Operand::Register(*dst))
        }
        [Operand::Register(dst), Operand::Register(src)]
            if is_system(dst) && src.class() == RegisterClass::Gpr32 =>
        {
            let opcode = if dst.class() == RegisterClass::Control { 0x22 } else { 0x23 };
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, &Operand::Register(*src))
        }
        _ => rm_reg_pair(e, 0x88),
    }
}

fn is_system(r: &Register) -> bool {
    matches!(r.class(), RegisterClass::Control | RegisterClass::Debug)
}

/// Segment moves take a 16/32-bit register or a word in memory.
fn segment_rm(op: &Operand) -> bool {
    match op {
        Operand::Register(r) => wide_gpr(r),
        Operand::Memory(mem) => mem.size == OperandSize::Word,
        _ => false,
    }
}

fn mov_extend(e: &mut Encoder<'_>, signed: bool) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src] if wide_gpr(dst) => {
            let base = if signed { 0xBE } else { 0xB6 };
            let opcode = match rm_size(src) {
                Some(OperandSize::Byte) => base,
                Some(OperandSize::Word) if dst.class() == RegisterClass::Gpr32 => base + 1,
                _ => return Err(e.unsupported()),
            };
            e.size(dst.size());
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn lea(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src @ Operand::Memory(_)] if wide_gpr(dst) => {
            e.size(dst.size());
            e.byte(0x8D);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn xchg(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        // `90` itself is NOP, so xchg eax, eax takes the long form.
        [Operand::Register(acc), Operand::Register(r)]
            if acc.is_accumulator()
                && wide_gpr(acc)
                && r.class() == acc.class()
                && r.code() != 0 =>
        {
            e.size(acc.size());
            e.byte(0x90 + r.code());
            Ok(())
        }
        [dst, Operand::Register(src)] if src.is_general() && rm_size(dst) == Some(src.size()) => {
            let w = width_bit(src.size()).ok_or_else(|| e.unsupported())?;
            e.size(src.size());
            e.byte(0x86 + w);
            e.modrm_reg(*src, dst)
        }
        _ => Err(e.unsupported()),
    }
}

/// XADD/CMPXCHG: `r/m, reg` with the byte form at `opcode` and the wide
/// form at `opcode+1`.
fn exchange_rm(e: &mut Encoder<'_>, opcode: &[u8; 2]) -> Result<(), EncodeError> {
    match e.operands() {
        [dst, Operand::Register(src)] if src.is_general() && rm_size(dst) == Some(src.size()) => {
            let w = width_bit(src.size()).ok_or_else(|| e.unsupported())?;
            e.size(src.size());
            e.opcode(&[opcode[0], opcode[1] + w]);
            e.modrm_reg(*src, dst)
        }
        _ => Err(e.unsupported()),
    }
}

/// `reg, r/m` forms of a two-byte opcode (BSF, BSR, CMOVcc).
fn reg_rm(e: &mut Encoder<'_>, opcode: &[u8]) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src] if wide_gpr(dst) && rm_size(src) == Some(dst.size()) => {
            e.size(dst.size());
            e.opcode(opcode);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn push(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(r)] if wide_gpr(r) => {
            e.size(r.size());
            e.byte(0x50 + r.code());
            Ok(())
        }
        [op @ Operand::Memory(mem)] if wide_mem(mem.size) => {
            e.size(mem.size);
            e.byte(0xFF);
            e.modrm(6, op)
        }
        [Operand::Immediate(imm)] => {
            match imm.size() {
                OperandSize::SignedByte => e.byte(0x6A),
                OperandSize::Word => {
                    e.size(OperandSize::Word);
                    e.byte(0x68);
                }
                OperandSize::Dword => e.byte(0x68),
                _ => return Err(e.unsupported()),
            }
            e.imm(imm);
            Ok(())
        }
        [Operand::Segment(seg)] => {
            let opcode: &[u8] = match seg {
                Segment::ES => &[0x06],
                Segment::CS => &[0x0E],
                Segment::SS => &[0x16],
                Segment::DS => &[0x1E],
                Segment::FS => &[0x0F, 0xA0],
                Segment::GS => &[0x0F, 0xA8],
            };
            e.opcode(opcode);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

fn pop(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(r)] if wide_gpr(r) => {
            e.size(r.size());
            e.byte(0x58 + r.code());
            Ok(())
        }
        [op @ Operand::Memory(mem)] if wide_mem(mem.size) => {
            e.size(mem.size);
            e.byte(0x8F);
            e.modrm(0, op)
        }
        [Operand::Segment(seg)] => {
            let opcode: &[u8] = match seg {
                Segment::ES => &[0x07],
                Segment::SS => &[0x17],
                Segment::DS => &[0x1F],
                Segment::FS => &[0x0F, 0xA1],
                Segment::GS => &[0x0F, 0xA9],
                Segment::CS => return Err(e.unsupported()),
            };
            e.opcode(opcode);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

fn wide_mem(size: OperandSize) -> bool {
    matches!(size, OperandSize::Word | OperandSize::Dword)
}

fn bit_test(e: &mut Encoder<'_>, sel: u8, register_opcode: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [dst, Operand::Register(src)] if wide_gpr(src) && rm_size(dst) == Some(src.size()) => {
            e.size(src.size());
            e.opcode(&[0x0F, register_opcode]);
            e.modrm_reg(*src, dst)
        }
        [dst, Operand::Immediate(imm)] if imm.size() == OperandSize::Byte => {
            let size = rm_size(dst).filter(|s| wide_mem(*s)).ok_or_else(|| e.unsupported())?;
            e.size(size);
            e.opcode(&[0x0F, 0xBA]);
            e.modrm(sel, dst)?;
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

/// AAM/AAD: the base-10 form prints without an operand.
fn ascii_adjust(e: &mut Encoder<'_>, opcode: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [] => {
            e.opcode(&[opcode, 0x0A]);
            Ok(())
        }
        [Operand::Immediate(imm)] if imm.size() == OperandSize::Byte => {
            e.byte(opcode);
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

fn load_far_pointer(e: &mut Encoder<'_>, seg: Segment) -> Result<(), EncodeError> {
    let opcode: &[u8] = match seg {
        Segment::ES => &[0xC4],
        Segment::DS => &[0xC5],
        Segment::SS => &[0x0F, 0xB2],
        Segment::FS => &[0x0F, 0xB4],
        Segment::GS => &[0x0F, 0xB5],
        Segment::CS => return Err(e.unsupported()),
    };
    match e.operands() {
        // m16:16 for a word register, m16:32 for a dword one.
        [Operand::Register(dst), src @ Operand::Memory(mem)]
            if (dst.class() == RegisterClass::Gpr32 && mem.size == OperandSize::Fword)
                || (dst.class() == RegisterClass::Gpr16 && mem.size == OperandSize::Dword) =>
        {
            e.size(dst.size());
            e.opcode(opcode);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

/// IN/OUT with an imm8 port or DX.
fn port_io(e: &mut Encoder<'_>, out: bool) -> Result<(), EncodeError> {
    let ops = e.operands();
    let (acc, port) = match (out, ops) {
        (false, [Operand::Register(acc), port]) => (acc, port),
        (true, [port, Operand::Register(acc)]) => (acc, port),
        _ => return Err(e.unsupported()),
    };
    if !acc.is_accumulator() {
        return Err(e.unsupported());
    }
    let w = width_bit(acc.size()).ok_or_else(|| e.unsupported())?;
    let direction = if out { 2 } else { 0 };
    e.size(acc.size());
    match port {
        Operand::Immediate(imm) if imm.size() == OperandSize::Byte => {
            e.byte(0xE4 + direction + w);
            e.imm(imm);
            Ok(())
        }
        Operand::Register(r) if *r == Register::DX => {
            e.byte(0xEC + direction + w);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

/// JMP and CALL share their operand forms.
fn jump(e: &mut Encoder<'_>, call: bool) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Relative(rel)] if rel.size == OperandSize::SignedByte && !call => {
            e.byte(0xEB);
            e.relative(rel);
            Ok(())
        }
        [Operand::Relative(rel)] if rel.size == OperandSize::Dword => {
            e.byte(if call { 0xE8 } else { 0xE9 });
            e.relative(rel);
            Ok(())
        }
        [Operand::Absolute(ptr)] => {
            e.byte(if call { 0x9A } else { 0xEA });
            e.opcode(&ptr.to_bytes());
            Ok(())
        }
        [op @ Operand::Memory(mem)] if mem.size == OperandSize::Fword => {
            e.byte(0xFF);
            e.modrm(if call { 3 } else { 5 }, op)
        }
        [op] if rm_size(op) == Some(OperandSize::Dword) => {
            e.byte(0xFF);
            e.modrm(if call { 2 } else { 4 }, op)
        }
        _ => Err(e.unsupported()),
    }
}

/// rel8-only branches (JECXZ, LOOPcc).
fn short_branch(e: &mut Encoder<'_>, opcode: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Relative(rel)] if rel.size == OperandSize::SignedByte => {
            e.byte(opcode);
            e.relative(rel);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

/// String instructions have implicit operands. The byte form sits at
/// `opcode`, the word/dword form at `opcode+1`.
fn string(
    e: &mut Encoder<'_>,
    opcode: u8,
    size: OperandSize,
    rep: RepPrefix,
) -> Result<(), EncodeError> {
    let w = width_bit(size).ok_or_else(|| e.unsupported())?;
    e.rep(rep.byte());
    e.size(size);
    fixed(e, &[opcode + w])
}

#[cfg(test)]
mod tests {
    use crate::{
        Absolute, Condition, Instruction, Memory, Mnemonic, Operand, OperandSize, Register,
        Relative, RepPrefix, Segment, ShiftOp,
    };

    fn enc(mnemonic: Mnemonic, operands: Vec<Operand>) -> Vec<u8> {
        Instruction::new(mnemonic, operands).encode().unwrap()
    }

    const ADD: Mnemonic = Mnemonic::Add { carry: false };

    #[test]
    fn test_mov_reg_imm32() {
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::EAX.into(), Operand::imm32(0x12345678)]),
            vec![0xB8, 0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::BH.into(), Operand::imm8(0x7F)]),
            vec![0xB7, 0x7F]
        );
    }

    #[test]
    fn test_add_al_imm8_short_form() {
        assert_eq!(enc(ADD, vec![Register::AL.into(), Operand::imm8(5)]), vec![0x04, 0x05]);
        assert_eq!(
            enc(Mnemonic::Cmp, vec![Register::EAX.into(), Operand::imm32(0x100)]),
            vec![0x3D, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_alu_group_forms() {
        // adc ecx, -1 with a sign-extended byte
        assert_eq!(
            enc(
                Mnemonic::Add { carry: true },
                vec![Register::ECX.into(), Operand::simm8(-1)]
            ),
            vec![0x83, 0xD1, 0xFF]
        );
        // and byte ptr [ebx], 0x0f
        assert_eq!(
            enc(
                Mnemonic::And,
                vec![Memory::base(Register::EBX, OperandSize::Byte).into(), Operand::imm8(0x0F)]
            ),
            vec![0x80, 0x23, 0x0F]
        );
        // sub edx, 0x1000
        assert_eq!(
            enc(
                Mnemonic::Sub { borrow: false },
                vec![Register::EDX.into(), Operand::imm32(0x1000)]
            ),
            vec![0x81, 0xEA, 0x00, 0x10, 0x00, 0x00]
        );
        // eax with a signed byte avoids the short form
        assert_eq!(enc(ADD, vec![Register::EAX.into(), Operand::simm8(1)]), vec![0x83, 0xC0, 0x01]);
    }

    #[test]
    fn test_cmp_reg_mem() {
        let mem = Memory::base_disp(Register::EAX, 4, OperandSize::Dword);
        assert_eq!(
            enc(Mnemonic::Cmp, vec![Register::EBX.into(), mem.into()]),
            vec![0x3B, 0x58, 0x04]
        );
    }

    #[test]
    fn test_reg_reg_uses_rm_destination() {
        assert_eq!(enc(Mnemonic::Xor, vec![Register::EAX.into(), Register::EAX.into()]), vec![0x31, 0xC0]);
        assert_eq!(enc(Mnemonic::Mov, vec![Register::AX.into(), Register::BX.into()]), vec![0x66, 0x89, 0xD8]);
    }

    #[test]
    fn test_push_pop_forms() {
        assert_eq!(enc(Mnemonic::Push, vec![Register::ECX.into()]), vec![0x51]);
        assert_eq!(enc(Mnemonic::Pop, vec![Register::EDI.into()]), vec![0x5F]);
        assert_eq!(enc(Mnemonic::Push, vec![Operand::simm8(-2)]), vec![0x6A, 0xFE]);
        assert_eq!(
            enc(Mnemonic::Push, vec![Operand::imm32(0x401000)]),
            vec![0x68, 0x00, 0x10, 0x40, 0x00]
        );
        assert_eq!(enc(Mnemonic::Push, vec![Segment::FS.into()]), vec![0x0F, 0xA0]);
        assert!(Instruction::new(Mnemonic::Pop, vec![Segment::CS.into()]).encode().is_err());
    }

    #[test]
    fn test_inc_dec() {
        assert_eq!(enc(Mnemonic::Inc, vec![Register::ESI.into()]), vec![0x46]);
        assert_eq!(enc(Mnemonic::Dec, vec![Register::CX.into()]), vec![0x66, 0x49]);
        // byte registers have no short form
        assert_eq!(enc(Mnemonic::Inc, vec![Register::AL.into()]), vec![0xFE, 0xC0]);
        assert_eq!(enc(Mnemonic::Dec, vec![Register::BL.into()]), vec![0xFE, 0xCB]);
    }

    #[test]
    fn test_shift_forms() {
        let shl = Mnemonic::Shift(ShiftOp::Shl);
        assert_eq!(enc(shl, vec![Register::EAX.into(), Operand::imm8(1)]), vec![0xD1, 0xE0]);
        assert_eq!(enc(shl, vec![Register::EAX.into(), Register::CL.into()]), vec![0xD3, 0xE0]);
        assert_eq!(enc(shl, vec![Register::EAX.into(), Operand::imm8(4)]), vec![0xC1, 0xE0, 0x04]);
        let sar = Mnemonic::Shift(ShiftOp::Sar);
        assert_eq!(enc(sar, vec![Register::DL.into(), Operand::imm8(1)]), vec![0xD0, 0xFA]);
    }

    #[test]
    fn test_mov_moffs_and_segments() {
        let mem = Memory::absolute(0x403000, OperandSize::Dword);
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::EAX.into(), mem.into()]),
            vec![0xA1, 0x00, 0x30, 0x40, 0x00]
        );
        let mem = Memory::absolute(0x18, OperandSize::Dword).with_segment(Segment::FS);
        assert_eq!(
            enc(Mnemonic::Mov, vec![mem.into(), Register::EAX.into()]),
            vec![0x64, 0xA3, 0x18, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::AX.into(), Segment::DS.into()]),
            vec![0x66, 0x8C, 0xD8]
        );
        assert_eq!(
            enc(Mnemonic::Mov, vec![Segment::ES.into(), Register::EAX.into()]),
            vec![0x8E, 0xC0]
        );
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::EAX.into(), Register::cr(0).into()]),
            vec![0x0F, 0x20, 0xC0]
        );
        assert_eq!(
            enc(Mnemonic::Mov, vec![Register::dr(7).into(), Register::EBX.into()]),
            vec![0x0F, 0x23, 0xFB]
        );
    }

    #[test]
    fn test_branches() {
        let jne = Instruction::new(Mnemonic::Jcc(Condition::NotEqual), vec![Relative::short(0x10).into()]);
        assert_eq!(jne.encode().unwrap(), vec![0x75, 0x0E]);
        let je = Instruction::new(Mnemonic::Jcc(Condition::Equal), vec![Relative::near(0x100).into()]);
        assert_eq!(je.encode().unwrap(), vec![0x0F, 0x84, 0xFA, 0x00, 0x00, 0x00]);
        let call = Instruction::new(Mnemonic::Call, vec![Relative::near(0x1000).into()]).at(0x1000);
        assert_eq!(call.encode().unwrap(), vec![0xE8, 0xFB, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            enc(Mnemonic::Jmp, vec![Register::EAX.into()]),
            vec![0xFF, 0xE0]
        );
        assert_eq!(
            enc(Mnemonic::Jmp, vec![Absolute::new(0x08, 0x1000).into()]),
            vec![0xEA, 0x00, 0x10, 0x00, 0x00, 0x08, 0x00]
        );
        assert_eq!(enc(Mnemonic::Ret { far: false }, vec![]), vec![0xC3]);
        assert_eq!(enc(Mnemonic::Ret { far: false }, vec![Operand::imm16(8)]), vec![0xC2, 0x08, 0x00]);
    }

    #[test]
    fn test_string_rep_prefix() {
        let m = Mnemonic::Movs {
            size: OperandSize::Dword,
            rep: RepPrefix::Rep,
        };
        assert_eq!(enc(m, vec![]), vec![0xF3, 0xA5]);
        let m = Mnemonic::Scas {
            size: OperandSize::Byte,
            rep: RepPrefix::Repne,
        };
        assert_eq!(enc(m, vec![]), vec![0xF2, 0xAE]);
        let m = Mnemonic::Stos {
            size: OperandSize::Word,
            rep: RepPrefix::None,
        };
        assert_eq!(enc(m, vec![]), vec![0x66, 0xAB]);
    }

    #[test]
    fn test_lock_prefix() {
        let insn = Instruction::new(
            Mnemonic::Xadd,
            vec![Memory::base(Register::ECX, OperandSize::Dword).into(), Register::EAX.into()],
        )
        .locked();
        assert_eq!(insn.encode().unwrap(), vec![0xF0, 0x0F, 0xC1, 0x01]);
    }

    #[test]
    fn test_xchg_short_form() {
        assert_eq!(enc(Mnemonic::Xchg, vec![Register::EAX.into(), Register::EDX.into()]), vec![0x92]);
        assert_eq!(enc(Mnemonic::Xchg, vec![Register::EAX.into(), Register::EAX.into()]), vec![0x87, 0xC0]);
    }

    #[test]
    fn test_imul_forms() {
        assert_eq!(
            enc(Mnemonic::Imul, vec![Register::EAX.into(), Register::ECX.into()]),
            vec![0x0F, 0xAF, 0xC1]
        );
        assert_eq!(
            enc(
                Mnemonic::Imul,
                vec![Register::EAX.into(), Register::ECX.into(), Operand::simm8(10)]
            ),
            vec![0x6B, 0xC1, 0x0A]
        );
        assert_eq!(enc(Mnemonic::Imul, vec![Register::ECX.into()]), vec![0xF7, 0xE9]);
    }

    #[test]
    fn test_pointer_pairs_follow_register_width() {
        let mem = |size| Operand::from(Memory::base(Register::ESI, size));
        assert_eq!(
            enc(Mnemonic::Bound, vec![Register::EAX.into(), mem(OperandSize::Qword)]),
            vec![0x62, 0x06]
        );
        assert_eq!(
            enc(Mnemonic::Bound, vec![Register::AX.into(), mem(OperandSize::Dword)]),
            vec![0x66, 0x62, 0x06]
        );
        assert_eq!(
            enc(Mnemonic::LoadFarPointer(Segment::DS), vec![Register::AX.into(), mem(OperandSize::Dword)]),
            vec![0x66, 0xC5, 0x06]
        );
        let mismatched = Instruction::new(
            Mnemonic::LoadFarPointer(Segment::DS),
            vec![Register::AX.into(), mem(OperandSize::Fword)],
        );
        assert!(mismatched.encode().is_err());
        let mismatched =
            Instruction::new(Mnemonic::Bound, vec![Register::EAX.into(), mem(OperandSize::Dword)]);
        assert!(mismatched.encode().is_err());
    }

    #[test]
    fn test_mismatched_sizes_rejected() {
        let insn = Instruction::new(Mnemonic::Mov, vec![Register::EAX.into(), Register::BL.into()]);
        assert!(insn.encode().is_err());
        let insn = Instruction::new(ADD, vec![Register::ECX.into(), Operand::imm8(1)]);
        assert!(insn.encode().is_err());
    }
}
