//! x87 FPU encodings.
//!
//! x87 instructions live under escape opcodes `D8`-`DF`. A ModR/M byte below
//! `C0` is a memory form whose reg field selects the operation; from `C0` up
//! the byte names an ST(i) form (`base + i`) or an argument-less instruction.
//! Both tables below are shared with the decoder.

use super::Encoder;
use crate::error::EncodeError;
use crate::{FcmovCondition, FpuPop, Mnemonic, Operand, OperandSize, Register, RegisterClass};

/// A memory form: `escape /sel` with a fixed operand size.
#[derive(Debug, Clone, Copy)]
pub struct X87MemoryForm {
    pub escape: u8,
    pub sel: u8,
    pub mnemonic: Mnemonic,
    /// `None` for the environment and state images, whose size depends on
    /// the processor mode.
    pub size: OperandSize,
}

/// Operand shape of an ST(i) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackShape {
    /// `st(i)`
    Single,
    /// `st(0), st(i)`
    ToTop,
    /// `st(i), st(0)`
    FromTop,
}

/// A register form: `escape, base+i`.
#[derive(Debug, Clone, Copy)]
pub struct X87RegisterForm {
    pub escape: u8,
    pub base: u8,
    pub mnemonic: Mnemonic,
    pub shape: StackShape,
}

const fn mem(escape: u8, sel: u8, mnemonic: Mnemonic, size: OperandSize) -> X87MemoryForm {
    X87MemoryForm {
        escape,
        sel,
        mnemonic,
        size,
    }
}

const fn reg(escape: u8, base: u8, mnemonic: Mnemonic, shape: StackShape) -> X87RegisterForm {
    X87RegisterForm {
        escape,
        base,
        mnemonic,
        shape,
    }
}

const fn fadd(integer: bool, pop: bool) -> Mnemonic {
    Mnemonic::Fadd { integer, pop }
}

const fn fmul(integer: bool, pop: bool) -> Mnemonic {
    Mnemonic::Fmul { integer, pop }
}

const fn fsub(reverse: bool, integer: bool, pop: bool) -> Mnemonic {
    Mnemonic::Fsub {
        reverse,
        integer,
        pop,
    }
}

const fn fdiv(reverse: bool, integer: bool, pop: bool) -> Mnemonic {
    Mnemonic::Fdiv {
        reverse,
        integer,
        pop,
    }
}

const fn fcom(integer: bool, unordered: bool, pop: FpuPop) -> Mnemonic {
    Mnemonic::Fcom {
        integer,
        unordered,
        pop,
    }
}

/// Every memory form.
pub static X87_MEMORY_FORMS: [X87MemoryForm; 60] = {
    use OperandSize::{Dword, None, Qword, Tbyte, Word};
    [
        // D8: float32 arithmetic
        mem(0xD8, 0, fadd(false, false), Dword),
        mem(0xD8, 1, fmul(false, false), Dword),
        mem(0xD8, 2, fcom(false, false, FpuPop::None), Dword),
        mem(0xD8, 3, fcom(false, false, FpuPop::Pop), Dword),
        mem(0xD8, 4, fsub(false, false, false), Dword),
        mem(0xD8, 5, fsub(true, false, false), Dword),
        mem(0xD8, 6, fdiv(false, false, false), Dword),
        mem(0xD8, 7, fdiv(true, false, false), Dword),
        // D9: float32 load/store, control word, environment
        mem(0xD9, 0, Mnemonic::Fld, Dword),
        mem(0xD9, 2, Mnemonic::Fst { pop: false }, Dword),
        mem(0xD9, 3, Mnemonic::Fst { pop: true }, Dword),
        mem(0xD9, 4, Mnemonic::Fldenv, None),
        mem(0xD9, 5, Mnemonic::Fldcw, Word),
        mem(0xD9, 6, Mnemonic::Fstenv, None),
        mem(0xD9, 7, Mnemonic::Fstcw, Word),
        // DA: int32 arithmetic
        mem(0xDA, 0, fadd(true, false), Dword),
        mem(0xDA, 1, fmul(true, false), Dword),
        mem(0xDA, 2, fcom(true, false, FpuPop::None), Dword),
        mem(0xDA, 3, fcom(true, false, FpuPop::Pop), Dword),
        mem(0xDA, 4, fsub(false, true, false), Dword),
        mem(0xDA, 5, fsub(true, true, false), Dword),
        mem(0xDA, 6, fdiv(false, true, false), Dword),
        mem(0xDA, 7, fdiv(true, true, false), Dword),
        // DB: int32 load/store, float80 load/store
        mem(0xDB, 0, Mnemonic::Fild, Dword),
        mem(0xDB, 1, Mnemonic::Fisttp, Dword),
        mem(0xDB, 2, Mnemonic::Fist { pop: false }, Dword),
        mem(0xDB, 3, Mnemonic::Fist { pop: true }, Dword),
        mem(0xDB, 5, Mnemonic::Fld, Tbyte),
        mem(0xDB, 7, Mnemonic::Fst { pop: true }, Tbyte),
        // DC: float64 arithmetic
        mem(0xDC, 0, fadd(false, false), Qword),
        mem(0xDC, 1, fmul(false, false), Qword),
        mem(0xDC, 2, fcom(false, false, FpuPop::None), Qword),
        mem(0xDC, 3, fcom(false, false, FpuPop::Pop), Qword),
        mem(0xDC, 4, fsub(false, false, false), Qword),
        mem(0xDC, 5, fsub(true, false, false), Qword),
        mem(0xDC, 6, fdiv(false, false, false), Qword),
        mem(0xDC, 7, fdiv(true, false, false), Qword),
        // DD: float64 load/store, state image, status word
        mem(0xDD, 0, Mnemonic::Fld, Qword),
        mem(0xDD, 1, Mnemonic::Fisttp, Qword),
        mem(0xDD, 2, Mnemonic::Fst { pop: false }, Qword),
        mem(0xDD, 3, Mnemonic::Fst { pop: true }, Qword),
        mem(0xDD, 4, Mnemonic::Frstor, None),
        mem(0xDD, 6, Mnemonic::Fsave, None),
        mem(0xDD, 7, Mnemonic::Fstsw, Word),
        // DE: int16 arithmetic
        mem(0xDE, 0, fadd(true, false), Word),
        mem(0xDE, 1, fmul(true, false), Word),
        mem(0xDE, 2, fcom(true, false, FpuPop::None), Word),
        mem(0xDE, 3, fcom(true, false, FpuPop::Pop), Word),
        mem(0xDE, 4, fsub(false, true, false), Word),
        mem(0xDE, 5, fsub(true, true, false), Word),
        mem(0xDE, 6, fdiv(false, true, false), Word),
        mem(0xDE, 7, fdiv(true, true, false), Word),
        // DF: int16/int64 load/store, BCD
        mem(0xDF, 0, Mnemonic::Fild, Word),
        mem(0xDF, 1, Mnemonic::Fisttp, Word),
        mem(0xDF, 2, Mnemonic::Fist { pop: false }, Word),
        mem(0xDF, 3, Mnemonic::Fist { pop: true }, Word),
        mem(0xDF, 4, Mnemonic::Fbld, Tbyte),
        mem(0xDF, 5, Mnemonic::Fild, Qword),
        mem(0xDF, 6, Mnemonic::Fbstp, Tbyte),
        mem(0xDF, 7, Mnemonic::Fist { pop: true }, Qword),
    ]
};

/// Every ST(i) form.
pub static X87_REGISTER_FORMS: [X87RegisterForm; 39] = {
    use StackShape::{FromTop, Single, ToTop};
    [
        reg(0xD8, 0xC0, fadd(false, false), ToTop),
        reg(0xD8, 0xC8, fmul(false, false), ToTop),
        reg(0xD8, 0xD0, fcom(false, false, FpuPop::None), Single),
        reg(0xD8, 0xD8, fcom(false, false, FpuPop::Pop), Single),
        reg(0xD8, 0xE0, fsub(false, false, false), ToTop),
        reg(0xD8, 0xE8, fsub(true, false, false), ToTop),
        reg(0xD8, 0xF0, fdiv(false, false, false), ToTop),
        reg(0xD8, 0xF8, fdiv(true, false, false), ToTop),
        reg(0xD9, 0xC0, Mnemonic::Fld, Single),
        reg(0xD9, 0xC8, Mnemonic::Fxch, Single),
        reg(0xDA, 0xC0, Mnemonic::Fcmov(FcmovCondition::B), ToTop),
        reg(0xDA, 0xC8, Mnemonic::Fcmov(FcmovCondition::E), ToTop),
        reg(0xDA, 0xD0, Mnemonic::Fcmov(FcmovCondition::BE), ToTop),
        reg(0xDA, 0xD8, Mnemonic::Fcmov(FcmovCondition::U), ToTop),
        reg(0xDB, 0xC0, Mnemonic::Fcmov(FcmovCondition::NB), ToTop),
        reg(0xDB, 0xC8, Mnemonic::Fcmov(FcmovCondition::NE), ToTop),
        reg(0xDB, 0xD0, Mnemonic::Fcmov(FcmovCondition::NBE), ToTop),
        reg(0xDB, 0xD8, Mnemonic::Fcmov(FcmovCondition::NU), ToTop),
        reg(0xDB, 0xE8, Mnemonic::Fcomi { unordered: true, pop: false }, ToTop),
        reg(0xDB, 0xF0, Mnemonic::Fcomi { unordered: false, pop: false }, ToTop),
        // DC and DE swap the plain and reverse sub/div rows.
        reg(0xDC, 0xC0, fadd(false, false), FromTop),
        reg(0xDC, 0xC8, fmul(false, false), FromTop),
        reg(0xDC, 0xE0, fsub(true, false, false), FromTop),
        reg(0xDC, 0xE8, fsub(false, false, false), FromTop),
        reg(0xDC, 0xF0, fdiv(true, false, false), FromTop),
        reg(0xDC, 0xF8, fdiv(false, false, false), FromTop),
        reg(0xDD, 0xC0, Mnemonic::Ffree, Single),
        reg(0xDD, 0xD0, Mnemonic::Fst { pop: false }, Single),
        reg(0xDD, 0xD8, Mnemonic::Fst { pop: true }, Single),
        reg(0xDD, 0xE0, fcom(false, true, FpuPop::None), Single),
        reg(0xDD, 0xE8, fcom(false, true, FpuPop::Pop), Single),
        reg(0xDE, 0xC0, fadd(false, true), FromTop),
        reg(0xDE, 0xC8, fmul(false, true), FromTop),
        reg(0xDE, 0xE0, fsub(true, false, true), FromTop),
        reg(0xDE, 0xE8, fsub(false, false, true), FromTop),
        reg(0xDE, 0xF0, fdiv(true, false, true), FromTop),
        reg(0xDE, 0xF8, fdiv(false, false, true), FromTop),
        reg(0xDF, 0xE8, Mnemonic::Fcomi { unordered: true, pop: true }, ToTop),
        reg(0xDF, 0xF0, Mnemonic::Fcomi { unordered: false, pop: true }, ToTop),
    ]
};

/// Looks up the memory form for `escape /sel`.
pub fn memory_form(escape: u8, sel: u8) -> Option<&'static X87MemoryForm> {
    X87_MEMORY_FORMS
        .iter()
        .find(|f| f.escape == escape && f.sel == sel)
}

/// Looks up the ST(i) form for `escape, modrm`.
pub fn register_form(escape: u8, modrm: u8) -> Option<&'static X87RegisterForm> {
    let base = modrm & 0xF8;
    X87_REGISTER_FORMS
        .iter()
        .find(|f| f.escape == escape && f.base == base)
}

pub(crate) fn encode(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    let m = e.mnemonic();
    let ops = e.operands();

    if let Some(pair) = m.x87_nullary() {
        if ops.is_empty() {
            e.opcode(&pair);
            return Ok(());
        }
        return Err(e.unsupported());
    }

    match ops {
        [Operand::Register(r)] if m == Mnemonic::Fstsw && *r == Register::AX => {
            e.opcode(&[0xDF, 0xE0]);
            Ok(())
        }
        [op @ Operand::Memory(memory)] => {
            let form = X87_MEMORY_FORMS
                .iter()
                .find(|f| {
                    f.mnemonic == m && (f.size == memory.size || f.size == OperandSize::None)
                })
                .ok_or_else(|| e.unsupported())?;
            e.byte(form.escape);
            e.modrm(form.sel, op)
        }
        _ => {
            let (shapes, i) = stack_shapes(ops).ok_or_else(|| e.unsupported())?;
            let form = shapes
                .iter()
                .find_map(|shape| {
                    X87_REGISTER_FORMS
                        .iter()
                        .find(|f| f.mnemonic == m && f.shape == *shape)
                })
                .ok_or_else(|| e.unsupported())?;
            e.opcode(&[form.escape, form.base + i]);
            Ok(())
        }
    }
}

/// Classifies ST(i) operands into the shapes they can be encoded with, in
/// order of preference. `st(0), st(0)` fits both two-operand shapes.
fn stack_shapes(ops: &[Operand]) -> Option<(&'static [StackShape], u8)> {
    const SINGLE: &[StackShape] = &[StackShape::Single];
    const TO_TOP: &[StackShape] = &[StackShape::ToTop];
    const FROM_TOP: &[StackShape] = &[StackShape::FromTop];
    const EITHER: &[StackShape] = &[StackShape::ToTop, StackShape::FromTop];

    let st = |op: &Operand| match op {
        Operand::Register(r) if r.class() == RegisterClass::X87 => Some(r.code()),
        _ => None,
    };
    match ops {
        [a] => Some((SINGLE, st(a)?)),
        [a, b] => match (st(a)?, st(b)?) {
            (0, 0) => Some((EITHER, 0)),
            (0, b) => Some((TO_TOP, b)),
            (a, 0) => Some((FROM_TOP, a)),
            _ => None,
        },
        _ => None,
    }
}
