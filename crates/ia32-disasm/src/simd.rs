//! MMX, SSE and SSE2 opcodes of the two-byte map.
//!
//! The mandatory prefix picks the variant. Packed-integer forms use MMX
//! registers without a prefix and XMM registers with `66`; float forms map
//! none/`66`/`F3`/`F2` to ps/pd/ss/sd. Combinations with no instruction
//! behind them decode as unknown.

use crate::cursor::Fault;
use crate::decoder::{Decoded, Reader};
use ia32_core::encode::simd::{conversion_class, packed_int_form, shift_imm_form};
use ia32_core::mnemonic::conversion_by_opcode;
use ia32_core::{
    FenceKind, Mnemonic, ModRm, MovntKind, Operand, OperandSize, PrefetchHint, PshufKind,
    Register, RegisterClass, SseArithOp, SseLogicOp,
};

use Mnemonic::*;
use RegisterClass::{Gpr32, Mmx, Xmm};

pub(crate) fn decode(r: &mut Reader<'_>, opcode: u8) -> Result<Decoded, Fault> {
    let prefix = r.prefixes.mandatory();
    match opcode {
        0x10 | 0x11 => {
            let (m, size) = match prefix {
                None => (MovUnaligned { double: false }, OperandSize::Xmm),
                Some(0x66) => (MovUnaligned { double: true }, OperandSize::Xmm),
                Some(0xF3) => (MovScalar { double: false }, OperandSize::Dword),
                _ => (MovScalar { double: true }, OperandSize::Qword),
            };
            if opcode == 0x10 {
                load(r, m, Xmm, size)
            } else {
                store(r, m, Xmm, size, true)
            }
        }
        0x12 | 0x13 | 0x16 | 0x17 => half_move(r, prefix, opcode),
        0x14 | 0x15 => {
            let double = double_flag(prefix)?;
            load(r, Unpck { high: opcode == 0x15, double }, Xmm, OperandSize::Xmm)
        }
        0x18 => {
            let modrm = r.modrm()?;
            let hint = PrefetchHint::from_selector(modrm.reg).ok_or(Fault::Unknown)?;
            let mem = r.memory(modrm, OperandSize::Byte)?;
            Ok((Prefetch(hint), vec![mem.into()]))
        }
        0x28 | 0x29 => {
            let m = MovAligned { double: double_flag(prefix)? };
            if opcode == 0x28 {
                load(r, m, Xmm, OperandSize::Xmm)
            } else {
                store(r, m, Xmm, OperandSize::Xmm, true)
            }
        }
        0x2B => {
            let kind = if double_flag(prefix)? { MovntKind::Pd } else { MovntKind::Ps };
            store(r, Movnt(kind), Xmm, OperandSize::Xmm, false)
        }
        0x2A | 0x2C | 0x2D | 0x5A | 0x5B | 0xE6 => convert(r, prefix, opcode),
        0x2E | 0x2F => {
            let double = double_flag(prefix)?;
            let size = if double { OperandSize::Qword } else { OperandSize::Dword };
            load(r, Comis { unordered: opcode == 0x2E, double }, Xmm, size)
        }
        0x50 => {
            let double = double_flag(prefix)?;
            let modrm = r.modrm()?;
            let src = register(modrm, Xmm)?;
            Ok((Movmsk { double }, vec![Register::from_field(Gpr32, modrm.reg).into(), src]))
        }
        0x54..=0x57 => {
            let op = SseLogicOp::from_opcode(opcode).ok_or(Fault::Unknown)?;
            let double = double_flag(prefix)?;
            load(r, SseLogic { op, double }, Xmm, OperandSize::Xmm)
        }
        0x51..=0x5F => {
            let op = SseArithOp::from_opcode(opcode).ok_or(Fault::Unknown)?;
            let (packed, double) = float_variant(prefix);
            if double && !op.has_double() {
                return Err(Fault::Unknown);
            }
            load(r, SseArith { op, packed, double }, Xmm, float_size(packed, double))
        }
        0x7E if prefix == Some(0xF3) => load(r, Movq, Xmm, OperandSize::Qword),
        0x6E | 0x7E => {
            let (class, _) = integer_class(prefix)?;
            let modrm = r.modrm()?;
            let vector = Register::from_field(class, modrm.reg).into();
            let other = r.rm(modrm, OperandSize::Dword)?;
            if opcode == 0x6E {
                Ok((Movd, vec![vector, other]))
            } else {
                Ok((Movd, vec![other, vector]))
            }
        }
        0x6F | 0x7F => {
            let (m, class, size) = match prefix {
                None => (Movq, Mmx, OperandSize::Qword),
                Some(0x66) => (Movdq { aligned: true }, Xmm, OperandSize::Xmm),
                Some(0xF3) => (Movdq { aligned: false }, Xmm, OperandSize::Xmm),
                _ => return Err(Fault::Unknown),
            };
            if opcode == 0x6F {
                load(r, m, class, size)
            } else {
                store(r, m, class, size, true)
            }
        }
        0x70 => {
            let (kind, class, size) = match prefix {
                None => (PshufKind::Words, Mmx, OperandSize::Mm),
                Some(0x66) => (PshufKind::Dwords, Xmm, OperandSize::Xmm),
                Some(0xF3) => (PshufKind::HighWords, Xmm, OperandSize::Xmm),
                _ => (PshufKind::LowWords, Xmm, OperandSize::Xmm),
            };
            load_imm(r, Pshuf(kind), class, size)
        }
        0x71..=0x73 => {
            let (class, _) = integer_class(prefix)?;
            let modrm = r.modrm()?;
            let form = shift_imm_form(opcode, modrm.reg).ok_or(Fault::Unknown)?;
            if form.xmm_only && class != Xmm {
                return Err(Fault::Unknown);
            }
            let dst = register(modrm, class)?;
            Ok((form.mnemonic, vec![dst, r.imm(OperandSize::Byte)?]))
        }
        0x77 if prefix.is_none() => Ok((Emms, vec![])),
        0xAE => state_group(r, prefix),
        0xC2 => {
            let (packed, double) = float_variant(prefix);
            load_imm(r, SseCmp { packed, double }, Xmm, float_size(packed, double))
        }
        0xC3 if prefix.is_none() => {
            store(r, Movnt(MovntKind::Dword), Gpr32, OperandSize::Dword, false)
        }
        0xC4 => {
            let (class, _) = integer_class(prefix)?;
            let modrm = r.modrm()?;
            let dst = Register::from_field(class, modrm.reg).into();
            let src = r.rm_class(modrm, Gpr32, OperandSize::Word)?;
            Ok((Pinsrw, vec![dst, src, r.imm(OperandSize::Byte)?]))
        }
        0xC5 => {
            let (class, _) = integer_class(prefix)?;
            let modrm = r.modrm()?;
            let src = register(modrm, class)?;
            let dst = Register::from_field(Gpr32, modrm.reg).into();
            Ok((Pextrw, vec![dst, src, r.imm(OperandSize::Byte)?]))
        }
        0xC6 => {
            let double = double_flag(prefix)?;
            load_imm(r, Shufp { double }, Xmm, OperandSize::Xmm)
        }
        0xD6 if prefix == Some(0x66) => store(r, Movq, Xmm, OperandSize::Qword, true),
        0xD7 => {
            let (class, _) = integer_class(prefix)?;
            let modrm = r.modrm()?;
            let src = register(modrm, class)?;
            Ok((Pmovmskb, vec![Register::from_field(Gpr32, modrm.reg).into(), src]))
        }
        0xE7 => match prefix {
            None => store(r, Movnt(MovntKind::Mmx), Mmx, OperandSize::Mm, false),
            Some(0x66) => store(r, Movnt(MovntKind::Dq), Xmm, OperandSize::Xmm, false),
            _ => Err(Fault::Unknown),
        },
        0xF7 if prefix.is_none() => {
            let modrm = r.modrm()?;
            let src = register(modrm, Mmx)?;
            Ok((Maskmovq, vec![Register::from_field(Mmx, modrm.reg).into(), src]))
        }
        _ => packed_int(r, prefix, opcode),
    }
}

/// Anything left in the map is either a packed-integer form or a hole.
fn packed_int(r: &mut Reader<'_>, prefix: Option<u8>, opcode: u8) -> Result<Decoded, Fault> {
    let form = packed_int_form(opcode).ok_or(Fault::Unknown)?;
    let (class, size) = integer_class(prefix)?;
    if form.xmm_only && class != Xmm {
        return Err(Fault::Unknown);
    }
    load(r, form.mnemonic, class, size)
}

/// Register class and memory width of an integer form: MMX without a
/// prefix, XMM with `66`.
fn integer_class(prefix: Option<u8>) -> Result<(RegisterClass, OperandSize), Fault> {
    match prefix {
        None => Ok((Mmx, OperandSize::Mm)),
        Some(0x66) => Ok((Xmm, OperandSize::Xmm)),
        _ => Err(Fault::Unknown),
    }
}

/// ps/pd forms accept only no prefix or `66`.
fn double_flag(prefix: Option<u8>) -> Result<bool, Fault> {
    match prefix {
        None => Ok(false),
        Some(0x66) => Ok(true),
        _ => Err(Fault::Unknown),
    }
}

/// `(packed, double)` from the mandatory prefix.
fn float_variant(prefix: Option<u8>) -> (bool, bool) {
    match prefix {
        None => (true, false),
        Some(0x66) => (true, true),
        Some(0xF3) => (false, false),
        _ => (false, true),
    }
}

fn float_size(packed: bool, double: bool) -> OperandSize {
    match (packed, double) {
        (true, _) => OperandSize::Xmm,
        (false, false) => OperandSize::Dword,
        (false, true) => OperandSize::Qword,
    }
}

fn register(modrm: ModRm, class: RegisterClass) -> Result<Operand, Fault> {
    if !modrm.is_register() {
        return Err(Fault::Unknown);
    }
    Ok(Register::from_field(class, modrm.rm).into())
}

/// `reg, reg/mem`.
fn load(
    r: &mut Reader<'_>,
    m: Mnemonic,
    class: RegisterClass,
    mem_size: OperandSize,
) -> Result<Decoded, Fault> {
    let modrm = r.modrm()?;
    let src = r.rm_class(modrm, class, mem_size)?;
    Ok((m, vec![Register::from_field(class, modrm.reg).into(), src]))
}

/// `reg/mem, reg`. Non-temporal stores have no register form.
fn store(
    r: &mut Reader<'_>,
    m: Mnemonic,
    class: RegisterClass,
    mem_size: OperandSize,
    allow_register: bool,
) -> Result<Decoded, Fault> {
    let modrm = r.modrm()?;
    let dst = if allow_register {
        r.rm_class(modrm, class, mem_size)?
    } else {
        r.memory(modrm, mem_size)?.into()
    };
    Ok((m, vec![dst, Register::from_field(class, modrm.reg).into()]))
}

/// `reg, reg/mem, imm8`.
fn load_imm(
    r: &mut Reader<'_>,
    m: Mnemonic,
    class: RegisterClass,
    mem_size: OperandSize,
) -> Result<Decoded, Fault> {
    let (m, mut operands) = load(r, m, class, mem_size)?;
    operands.push(r.imm(OperandSize::Byte)?);
    Ok((m, operands))
}

/// `0F 12`/`13`/`16`/`17`: movlps/movhps and their pd forms against
/// memory, movhlps/movlhps between registers.
fn half_move(r: &mut Reader<'_>, prefix: Option<u8>, opcode: u8) -> Result<Decoded, Fault> {
    let double = double_flag(prefix)?;
    let high = opcode >= 0x16;
    let modrm = r.modrm()?;
    let reg = Register::from_field(Xmm, modrm.reg).into();

    if modrm.is_register() {
        return match (opcode, double) {
            (0x12, false) => Ok((Movhlps, vec![reg, register(modrm, Xmm)?])),
            (0x16, false) => Ok((Movlhps, vec![reg, register(modrm, Xmm)?])),
            _ => Err(Fault::Unknown),
        };
    }

    let m = if high { MovHigh { double } } else { MovLow { double } };
    let mem = r.memory(modrm, OperandSize::Qword)?.into();
    if opcode & 1 == 0 {
        Ok((m, vec![reg, mem]))
    } else {
        Ok((m, vec![mem, reg]))
    }
}

fn convert(r: &mut Reader<'_>, prefix: Option<u8>, opcode: u8) -> Result<Decoded, Fault> {
    let row = conversion_by_opcode(prefix, opcode).ok_or(Fault::Unknown)?;
    let modrm = r.modrm()?;
    let dst = Register::from_field(conversion_class(row.to), modrm.reg).into();
    let src = r.rm_class(modrm, conversion_class(row.from), row.source_size)?;
    let m = Cvt {
        from: row.from,
        to: row.to,
        truncate: row.truncate,
    };
    Ok((m, vec![dst, src]))
}

/// `0F AE`: state save/restore and clflush on memory, fences on the
/// register encodings.
fn state_group(r: &mut Reader<'_>, prefix: Option<u8>) -> Result<Decoded, Fault> {
    if prefix.is_some() {
        return Err(Fault::Unknown);
    }
    let modrm = r.modrm()?;
    if modrm.is_register() {
        let kind = match modrm.to_byte() {
            0xE8 => FenceKind::Load,
            0xF0 => FenceKind::Memory,
            0xF8 => FenceKind::Store,
            _ => return Err(Fault::Unknown),
        };
        return Ok((Fence(kind), vec![]));
    }
    let (m, size) = match modrm.reg {
        0 => (Fxsave, OperandSize::None),
        1 => (Fxrstor, OperandSize::None),
        2 => (Ldmxcsr, OperandSize::Dword),
        3 => (Stmxcsr, OperandSize::Dword),
        7 => (Clflush, OperandSize::Byte),
        _ => return Err(Fault::Unknown),
    };
    let mem = r.memory(modrm, size)?;
    Ok((m, vec![mem.into()]))
}
