//! MMX, SSE and SSE2 encodings.
//!
//! All of these sit in the two-byte opcode space. Operand kind and a
//! mandatory prefix pick the variant: integer forms take `66` when their
//! operands are XMM registers, float forms take none/`66`/`F3`/`F2` for
//! packed single/packed double/scalar single/scalar double.

use super::{Encoder, rm_size};
use crate::error::EncodeError;
use crate::mnemonic::conversion;
use crate::{
    CvtType, Lane, Mnemonic, MovntKind, Operand, OperandSize, PmulKind, PshufKind,
    RegisterClass, Saturation,
};

/// A packed-integer `reg, reg/mem` opcode.
#[derive(Debug, Clone, Copy)]
pub struct PackedIntForm {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    /// Only defined for XMM operands.
    pub xmm_only: bool,
}

const fn pi(opcode: u8, mnemonic: Mnemonic) -> PackedIntForm {
    PackedIntForm {
        opcode,
        mnemonic,
        xmm_only: false,
    }
}

const fn pi_xmm(opcode: u8, mnemonic: Mnemonic) -> PackedIntForm {
    PackedIntForm {
        opcode,
        mnemonic,
        xmm_only: true,
    }
}

const fn padd(lane: Lane, saturation: Saturation) -> Mnemonic {
    Mnemonic::Padd { lane, saturation }
}

const fn psub(lane: Lane, saturation: Saturation) -> Mnemonic {
    Mnemonic::Psub { lane, saturation }
}

/// Every `0F xx /r` packed-integer arithmetic, logic, compare and pack form.
pub static PACKED_INT_FORMS: [PackedIntForm; 57] = {
    use Lane::{Byte, Dword, Qword, Word};
    use Saturation::{Signed, Unsigned, Wrap};
    [
        pi(0x60, Mnemonic::Punpckl(Byte)),
        pi(0x61, Mnemonic::Punpckl(Word)),
        pi(0x62, Mnemonic::Punpckl(Dword)),
        pi(0x63, Mnemonic::Packss(Word)),
        pi(0x64, Mnemonic::Pcmpgt(Byte)),
        pi(0x65, Mnemonic::Pcmpgt(Word)),
        pi(0x66, Mnemonic::Pcmpgt(Dword)),
        pi(0x67, Mnemonic::Packuswb),
        pi(0x68, Mnemonic::Punpckh(Byte)),
        pi(0x69, Mnemonic::Punpckh(Word)),
        pi(0x6A, Mnemonic::Punpckh(Dword)),
        pi(0x6B, Mnemonic::Packss(Dword)),
        pi_xmm(0x6C, Mnemonic::Punpckl(Qword)),
        pi_xmm(0x6D, Mnemonic::Punpckh(Qword)),
        pi(0x74, Mnemonic::Pcmpeq(Byte)),
        pi(0x75, Mnemonic::Pcmpeq(Word)),
        pi(0x76, Mnemonic::Pcmpeq(Dword)),
        pi(0xD1, Mnemonic::Psrl(Word)),
        pi(0xD2, Mnemonic::Psrl(Dword)),
        pi(0xD3, Mnemonic::Psrl(Qword)),
        pi(0xD4, padd(Qword, Wrap)),
        pi(0xD5, Mnemonic::Pmul(PmulKind::Low)),
        pi(0xD8, psub(Byte, Unsigned)),
        pi(0xD9, psub(Word, Unsigned)),
        pi(0xDA, Mnemonic::Pmin { signed: false }),
        pi(0xDB, Mnemonic::Pand),
        pi(0xDC, padd(Byte, Unsigned)),
        pi(0xDD, padd(Word, Unsigned)),
        pi(0xDE, Mnemonic::Pmax { signed: false }),
        pi(0xDF, Mnemonic::Pandn),
        pi(0xE0, Mnemonic::Pavg(Byte)),
        pi(0xE1, Mnemonic::Psra(Word)),
        pi(0xE2, Mnemonic::Psra(Dword)),
        pi(0xE3, Mnemonic::Pavg(Word)),
        pi(0xE4, Mnemonic::Pmul(PmulKind::HighUnsigned)),
        pi(0xE5, Mnemonic::Pmul(PmulKind::High)),
        pi(0xE8, psub(Byte, Signed)),
        pi(0xE9, psub(Word, Signed)),
        pi(0xEA, Mnemonic::Pmin { signed: true }),
        pi(0xEB, Mnemonic::Por),
        pi(0xEC, padd(Byte, Signed)),
        pi(0xED, padd(Word, Signed)),
        pi(0xEE, Mnemonic::Pmax { signed: true }),
        pi(0xEF, Mnemonic::Pxor),
        pi(0xF1, Mnemonic::Psll(Word)),
        pi(0xF2, Mnemonic::Psll(Dword)),
        pi(0xF3, Mnemonic::Psll(Qword)),
        pi(0xF4, Mnemonic::Pmul(PmulKind::UnsignedDword)),
        pi(0xF5, Mnemonic::Pmaddwd),
        pi(0xF6, Mnemonic::Psadbw),
        pi(0xF8, psub(Byte, Wrap)),
        pi(0xF9, psub(Word, Wrap)),
        pi(0xFA, psub(Dword, Wrap)),
        pi(0xFB, psub(Qword, Wrap)),
        pi(0xFC, padd(Byte, Wrap)),
        pi(0xFD, padd(Word, Wrap)),
        pi(0xFE, padd(Dword, Wrap)),
    ]
};

/// A shift-by-immediate form: `0F 71`/`72`/`73 /sel ib`.
#[derive(Debug, Clone, Copy)]
pub struct ShiftImmForm {
    pub opcode: u8,
    pub sel: u8,
    pub mnemonic: Mnemonic,
    pub xmm_only: bool,
}

const fn si(opcode: u8, sel: u8, mnemonic: Mnemonic, xmm_only: bool) -> ShiftImmForm {
    ShiftImmForm {
        opcode,
        sel,
        mnemonic,
        xmm_only,
    }
}

pub static SHIFT_IMM_FORMS: [ShiftImmForm; 10] = {
    use Lane::{Dword, Qword, Word};
    [
        si(0x71, 2, Mnemonic::Psrl(Word), false),
        si(0x71, 4, Mnemonic::Psra(Word), false),
        si(0x71, 6, Mnemonic::Psll(Word), false),
        si(0x72, 2, Mnemonic::Psrl(Dword), false),
        si(0x72, 4, Mnemonic::Psra(Dword), false),
        si(0x72, 6, Mnemonic::Psll(Dword), false),
        si(0x73, 2, Mnemonic::Psrl(Qword), false),
        si(0x73, 3, Mnemonic::PshiftDq { right: true }, true),
        si(0x73, 6, Mnemonic::Psll(Qword), false),
        si(0x73, 7, Mnemonic::PshiftDq { right: false }, true),
    ]
};

/// Looks up a packed-integer form by opcode.
pub fn packed_int_form(opcode: u8) -> Option<&'static PackedIntForm> {
    PACKED_INT_FORMS.iter().find(|f| f.opcode == opcode)
}

/// Looks up a shift-by-immediate form.
pub fn shift_imm_form(opcode: u8, sel: u8) -> Option<&'static ShiftImmForm> {
    SHIFT_IMM_FORMS
        .iter()
        .find(|f| f.opcode == opcode && f.sel == sel)
}

/// Mandatory prefix for a float form.
pub fn float_prefix(packed: bool, double: bool) -> Option<u8> {
    match (packed, double) {
        (true, false) => None,
        (true, true) => Some(0x66),
        (false, false) => Some(0xF3),
        (false, true) => Some(0xF2),
    }
}

/// Register class a conversion operand type lives in.
pub fn conversion_class(ty: CvtType) -> RegisterClass {
    match ty {
        CvtType::Pi => RegisterClass::Mmx,
        CvtType::Si => RegisterClass::Gpr32,
        _ => RegisterClass::Xmm,
    }
}

pub(crate) fn encode(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    use Mnemonic::*;

    let m = e.mnemonic();
    if let Some(form) = PACKED_INT_FORMS.iter().find(|f| f.mnemonic == m) {
        // Register-count shifts share mnemonics with the immediate forms.
        if let [_, Operand::Immediate(_)] = e.operands() {
            return shift_imm(e);
        }
        return packed_int(e, form);
    }

    match m {
        PshiftDq { .. } => shift_imm(e),
        Emms => fixed(e, &[0x0F, 0x77]),
        Movd => movd(e),
        Movq => movq(e),
        Movdq { aligned } => {
            let prefix = Some(if aligned { 0x66 } else { 0xF3 });
            load_or_store(e, prefix, 0x6F, 0x7F)
        }
        Pshuf(kind) => {
            let (prefix, class) = match kind {
                PshufKind::Words => (None, RegisterClass::Mmx),
                PshufKind::Dwords => (Some(0x66), RegisterClass::Xmm),
                PshufKind::HighWords => (Some(0xF3), RegisterClass::Xmm),
                PshufKind::LowWords => (Some(0xF2), RegisterClass::Xmm),
            };
            load_imm(e, prefix, 0x70, class)
        }
        Pinsrw => match e.operands() {
            [Operand::Register(dst), src, Operand::Immediate(imm)]
                if imm.size() == OperandSize::Byte && src_is_r32_or_mem(src) =>
            {
                let prefix = integer_prefix(dst.class()).ok_or_else(|| e.unsupported())?;
                e.mandatory(prefix);
                e.opcode(&[0x0F, 0xC4]);
                e.modrm_reg(*dst, src)?;
                e.imm(imm);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Pextrw => match e.operands() {
            [Operand::Register(dst), src @ Operand::Register(r), Operand::Immediate(imm)]
                if dst.class() == RegisterClass::Gpr32 && imm.size() == OperandSize::Byte =>
            {
                let prefix = integer_prefix(r.class()).ok_or_else(|| e.unsupported())?;
                e.mandatory(prefix);
                e.opcode(&[0x0F, 0xC5]);
                e.modrm_reg(*dst, src)?;
                e.imm(imm);
                Ok(())
            }
            _ => Err(e.unsupported()),
        },
        Pmovmskb => match e.operands() {
            [Operand::Register(dst), src @ Operand::Register(r)]
                if dst.class() == RegisterClass::Gpr32 =>
            {
                let prefix = integer_prefix(r.class()).ok_or_else(|| e.unsupported())?;
                e.mandatory(prefix);
                e.opcode(&[0x0F, 0xD7]);
                e.modrm_reg(*dst, src)
            }
            _ => Err(e.unsupported()),
        },
        Maskmovq => match e.operands() {
            [Operand::Register(dst), src @ Operand::Register(r)]
                if dst.class() == RegisterClass::Mmx && r.class() == RegisterClass::Mmx =>
            {
                e.opcode(&[0x0F, 0xF7]);
                e.modrm_reg(*dst, src)
            }
            _ => Err(e.unsupported()),
        },
        Movnt(kind) => {
            let (prefix, opcode, class) = match kind {
                MovntKind::Ps => (None, 0x2B, RegisterClass::Xmm),
                MovntKind::Pd => (Some(0x66), 0x2B, RegisterClass::Xmm),
                MovntKind::Dword => (None, 0xC3, RegisterClass::Gpr32),
                MovntKind::Mmx => (None, 0xE7, RegisterClass::Mmx),
                MovntKind::Dq => (Some(0x66), 0xE7, RegisterClass::Xmm),
            };
            store(e, prefix, opcode, class)
        }

        SseArith { op, packed, double } => {
            if double && !op.has_double() {
                return Err(e.unsupported());
            }
            load(e, float_prefix(packed, double), op.opcode(), RegisterClass::Xmm)
        }
        SseLogic { op, double } => load(e, double_prefix(double), op.opcode(), RegisterClass::Xmm),
        MovAligned { double } => load_or_store(e, double_prefix(double), 0x28, 0x29),
        MovUnaligned { double } => load_or_store(e, double_prefix(double), 0x10, 0x11),
        MovScalar { double } => load_or_store(e, float_prefix(false, double), 0x10, 0x11),
        MovLow { double } => half_move(e, double, 0x12),
        MovHigh { double } => half_move(e, double, 0x16),
        Movhlps => register_pair(e, 0x12),
        Movlhps => register_pair(e, 0x16),
        Unpck { high, double } => {
            load(e, double_prefix(double), if high { 0x15 } else { 0x14 }, RegisterClass::Xmm)
        }
        Movmsk { double } => match e.operands() {
            [Operand::Register(dst), src @ Operand::Register(r)]
                if dst.class() == RegisterClass::Gpr32 && r.class() == RegisterClass::Xmm =>
            {
                e.mandatory(double_prefix(double));
                e.opcode(&[0x0F, 0x50]);
                e.modrm_reg(*dst, src)
            }
            _ => Err(e.unsupported()),
        },
        Comis { unordered, double } => load(
            e,
            double_prefix(double),
            if unordered { 0x2E } else { 0x2F },
            RegisterClass::Xmm,
        ),
        SseCmp { packed, double } => {
            load_imm(e, float_prefix(packed, double), 0xC2, RegisterClass::Xmm)
        }
        Shufp { double } => load_imm(e, double_prefix(double), 0xC6, RegisterClass::Xmm),
        Cvt { from, to, truncate } => {
            let row = conversion(from, to, truncate).ok_or_else(|| e.unsupported())?;
            match e.operands() {
                [Operand::Register(dst), src]
                    if dst.class() == conversion_class(to)
                        && matches_class(src, conversion_class(from)) =>
                {
                    e.mandatory(row.prefix);
                    e.opcode(&[0x0F, row.opcode]);
                    e.modrm_reg(*dst, src)
                }
                _ => Err(e.unsupported()),
            }
        }
        Ldmxcsr => state_memory(e, 0xAE, 2),
        Stmxcsr => state_memory(e, 0xAE, 3),
        Fxsave => state_memory(e, 0xAE, 0),
        Fxrstor => state_memory(e, 0xAE, 1),
        Clflush => state_memory(e, 0xAE, 7),
        Fence(kind) => fixed(e, &[0x0F, 0xAE, kind.modrm()]),
        Prefetch(hint) => state_memory(e, 0x18, hint.selector()),
        _ => Err(e.unsupported()),
    }
}

fn fixed(e: &mut Encoder<'_>, opcode: &[u8]) -> Result<(), EncodeError> {
    super::general::fixed(e, opcode)
}

fn double_prefix(double: bool) -> Option<u8> {
    double.then_some(0x66)
}

/// `66` for XMM integer forms, nothing for MMX.
fn integer_prefix(class: RegisterClass) -> Option<Option<u8>> {
    match class {
        RegisterClass::Mmx => Some(None),
        RegisterClass::Xmm => Some(Some(0x66)),
        _ => None,
    }
}

/// A register of `class` or any memory operand.
fn matches_class(op: &Operand, class: RegisterClass) -> bool {
    match op {
        Operand::Register(r) => r.class() == class,
        Operand::Memory(_) => true,
        _ => false,
    }
}

fn src_is_r32_or_mem(op: &Operand) -> bool {
    match op {
        Operand::Register(r) => r.class() == RegisterClass::Gpr32,
        Operand::Memory(mem) => mem.size == OperandSize::Word,
        _ => false,
    }
}

fn packed_int(e: &mut Encoder<'_>, form: &PackedIntForm) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src] if matches_class(src, dst.class()) => {
            let prefix = integer_prefix(dst.class()).ok_or_else(|| e.unsupported())?;
            if form.xmm_only && prefix.is_none() {
                return Err(e.unsupported());
            }
            e.mandatory(prefix);
            e.opcode(&[0x0F, form.opcode]);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn shift_imm(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    let m = e.mnemonic();
    let form = SHIFT_IMM_FORMS
        .iter()
        .find(|f| f.mnemonic == m)
        .ok_or_else(|| e.unsupported())?;
    match e.operands() {
        [dst @ Operand::Register(r), Operand::Immediate(imm)] if imm.size() == OperandSize::Byte => {
            let prefix = integer_prefix(r.class()).ok_or_else(|| e.unsupported())?;
            if form.xmm_only && prefix.is_none() {
                return Err(e.unsupported());
            }
            e.mandatory(prefix);
            e.opcode(&[0x0F, form.opcode]);
            e.modrm(form.sel, dst)?;
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

/// `reg, reg/mem` with the destination in the reg field.
fn load(
    e: &mut Encoder<'_>,
    prefix: Option<u8>,
    opcode: u8,
    class: RegisterClass,
) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src] if dst.class() == class && matches_class(src, class) => {
            e.mandatory(prefix);
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

/// `mem, reg` with the source in the reg field.
fn store(
    e: &mut Encoder<'_>,
    prefix: Option<u8>,
    opcode: u8,
    class: RegisterClass,
) -> Result<(), EncodeError> {
    match e.operands() {
        [dst @ Operand::Memory(_), Operand::Register(src)] if src.class() == class => {
            e.mandatory(prefix);
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*src, dst)
        }
        _ => Err(e.unsupported()),
    }
}

/// XMM moves with a load opcode and a store opcode. Register pairs use the
/// load form.
fn load_or_store(
    e: &mut Encoder<'_>,
    prefix: Option<u8>,
    load_opcode: u8,
    store_opcode: u8,
) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Memory(_), Operand::Register(_)] => {
            store(e, prefix, store_opcode, RegisterClass::Xmm)
        }
        _ => load(e, prefix, load_opcode, RegisterClass::Xmm),
    }
}

/// `reg, reg/mem, imm8`.
fn load_imm(
    e: &mut Encoder<'_>,
    prefix: Option<u8>,
    opcode: u8,
    class: RegisterClass,
) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src, Operand::Immediate(imm)]
            if dst.class() == class
                && matches_class(src, class)
                && imm.size() == OperandSize::Byte =>
        {
            e.mandatory(prefix);
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, src)?;
            e.imm(imm);
            Ok(())
        }
        _ => Err(e.unsupported()),
    }
}

/// MOVLPS/MOVHPS and their double forms only move to or from memory.
fn half_move(e: &mut Encoder<'_>, double: bool, load_opcode: u8) -> Result<(), EncodeError> {
    let prefix = double_prefix(double);
    match e.operands() {
        [Operand::Register(_), Operand::Memory(_)] => {
            load(e, prefix, load_opcode, RegisterClass::Xmm)
        }
        [Operand::Memory(_), Operand::Register(_)] => {
            store(e, prefix, load_opcode + 1, RegisterClass::Xmm)
        }
        _ => Err(e.unsupported()),
    }
}

/// MOVHLPS/MOVLHPS: the register-register encodings of `0F 12`/`0F 16`.
fn register_pair(e: &mut Encoder<'_>, opcode: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src @ Operand::Register(r)]
            if dst.class() == RegisterClass::Xmm && r.class() == RegisterClass::Xmm =>
        {
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}

fn movd(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    let ops = e.operands();
    let (vector, other, opcode) = match ops {
        [Operand::Register(v), other] if integer_prefix(v.class()).is_some() => (v, other, 0x6E),
        [other, Operand::Register(v)] if integer_prefix(v.class()).is_some() => (v, other, 0x7E),
        _ => return Err(e.unsupported()),
    };
    if rm_size(other) != Some(OperandSize::Dword) {
        return Err(e.unsupported());
    }
    let prefix = integer_prefix(vector.class()).ok_or_else(|| e.unsupported())?;
    e.mandatory(prefix);
    e.opcode(&[0x0F, opcode]);
    e.modrm_reg(*vector, other)
}

fn movq(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src] if dst.class() == RegisterClass::Mmx => {
            if !matches_class(src, RegisterClass::Mmx) {
                return Err(e.unsupported());
            }
            e.opcode(&[0x0F, 0x6F]);
            e.modrm_reg(*dst, src)
        }
        [dst @ Operand::Memory(_), Operand::Register(src)] if src.class() == RegisterClass::Mmx => {
            e.opcode(&[0x0F, 0x7F]);
            e.modrm_reg(*src, dst)
        }
        [Operand::Register(dst), _] if dst.class() == RegisterClass::Xmm => {
            load(e, Some(0xF3), 0x7E, RegisterClass::Xmm)
        }
        [Operand::Memory(_), Operand::Register(_)] => {
            store(e, Some(0x66), 0xD6, RegisterClass::Xmm)
        }
        _ => Err(e.unsupported()),
    }
}

/// Memory-only forms of the `0F AE` and `0F 18` groups.
fn state_memory(e: &mut Encoder<'_>, opcode: u8, sel: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [op @ Operand::Memory(_)] => {
            e.opcode(&[0x0F, opcode]);
            e.modrm(sel, op)
        }
        _ => Err(e.unsupported()),
    }
}
