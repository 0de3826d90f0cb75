//! The instruction catalog.
//!
//! One [`Mnemonic`] variant per instruction family. Opcode-specific choices
//! that share an encoding shape (carry, pop, reverse operands, packed vs
//! scalar, lane width, ...) are fields on the variant rather than separate
//! variants.

use crate::{Condition, OperandSize, Segment};
use std::fmt;

/// Shift and rotate operations (group 2). The discriminant is the ModR/M reg
/// field selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Rcl = 2,
    Rcr = 3,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

impl ShiftOp {
    pub fn selector(&self) -> u8 {
        *self as u8
    }

    /// Selector 6 is the undocumented SAL alias of SHL.
    pub fn from_selector(sel: u8) -> Self {
        match sel & 0x7 {
            0 => Self::Rol,
            1 => Self::Ror,
            2 => Self::Rcl,
            3 => Self::Rcr,
            4 | 6 => Self::Shl,
            5 => Self::Shr,
            _ => Self::Sar,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Rol => "rol",
            Self::Ror => "ror",
            Self::Rcl => "rcl",
            Self::Rcr => "rcr",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Sar => "sar",
        }
    }
}

/// Bit test operations. The discriminant is the group 8 selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitOp {
    Bt = 4,
    Bts = 5,
    Btr = 6,
    Btc = 7,
}

impl BitOp {
    pub fn selector(&self) -> u8 {
        *self as u8
    }

    pub fn from_selector(sel: u8) -> Option<Self> {
        match sel & 0x7 {
            4 => Some(Self::Bt),
            5 => Some(Self::Bts),
            6 => Some(Self::Btr),
            7 => Some(Self::Btc),
            _ => None,
        }
    }

    /// Opcode of the `0F xx /r` register form.
    pub fn register_opcode(&self) -> u8 {
        0xA3 + ((self.selector() - 4) << 3)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bt => "bt",
            Self::Bts => "bts",
            Self::Btr => "btr",
            Self::Btc => "btc",
        }
    }
}

/// LOOP variants (`E2`, `E1`, `E0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopKind {
    Loop,
    Loope,
    Loopne,
}

impl LoopKind {
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Loopne => 0xE0,
            Self::Loope => 0xE1,
            Self::Loop => 0xE2,
        }
    }
}

/// REP/REPNE marker carried by string instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepPrefix {
    #[default]
    None,
    /// `F3`
    Rep,
    /// `F2`
    Repne,
}

impl RepPrefix {
    pub fn byte(&self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Rep => Some(0xF3),
            Self::Repne => Some(0xF2),
        }
    }
}

/// x87 pop behaviour for compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpuPop {
    #[default]
    None,
    Pop,
    DoublePop,
}

/// Constants pushed by the `D9 E8`-`D9 EE` loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpuConstant {
    One,
    Log2Ten,
    Log2E,
    Pi,
    Log10Two,
    LnTwo,
    Zero,
}

impl FpuConstant {
    const ALL: [FpuConstant; 7] = [
        Self::One,
        Self::Log2Ten,
        Self::Log2E,
        Self::Pi,
        Self::Log10Two,
        Self::LnTwo,
        Self::Zero,
    ];

    /// Second byte after `D9`.
    pub fn modrm(&self) -> u8 {
        0xE8 + *self as u8
    }

    pub fn from_modrm(byte: u8) -> Option<Self> {
        byte.checked_sub(0xE8)
            .and_then(|i| Self::ALL.get(i as usize).copied())
    }

    fn name(&self) -> &'static str {
        match self {
            Self::One => "fld1",
            Self::Log2Ten => "fldl2t",
            Self::Log2E => "fldl2e",
            Self::Pi => "fldpi",
            Self::Log10Two => "fldlg2",
            Self::LnTwo => "fldln2",
            Self::Zero => "fldz",
        }
    }
}

/// FCMOVcc conditions. `DA` carries the first four, `DB` their negations,
/// each as `base + i` rows (see the x87 register-form table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FcmovCondition {
    B,
    E,
    BE,
    U,
    NB,
    NE,
    NBE,
    NU,
}

impl FcmovCondition {
    fn suffix(&self) -> &'static str {
        match self {
            Self::B => "b",
            Self::E => "e",
            Self::BE => "be",
            Self::U => "u",
            Self::NB => "nb",
            Self::NE => "ne",
            Self::NBE => "nbe",
            Self::NU => "nu",
        }
    }
}

/// Packed integer lane width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lane {
    Byte,
    Word,
    Dword,
    Qword,
}

impl Lane {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Byte => "b",
            Self::Word => "w",
            Self::Dword => "d",
            Self::Qword => "q",
        }
    }
}

/// Packed add/subtract saturation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Saturation {
    #[default]
    Wrap,
    Signed,
    Unsigned,
}

impl Saturation {
    fn infix(&self) -> &'static str {
        match self {
            Self::Wrap => "",
            Self::Signed => "s",
            Self::Unsigned => "us",
        }
    }
}

/// Packed multiply variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PmulKind {
    /// pmullw
    Low,
    /// pmulhw
    High,
    /// pmulhuw
    HighUnsigned,
    /// pmuludq
    UnsignedDword,
}

/// Packed shuffle variants sharing opcode `0F 70`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PshufKind {
    /// pshufw mm (no prefix)
    Words,
    /// pshufd (66)
    Dwords,
    /// pshufhw (F3)
    HighWords,
    /// pshuflw (F2)
    LowWords,
}

/// SSE arithmetic operations sharing the `0F 5x` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SseArithOp {
    Sqrt,
    Rsqrt,
    Rcp,
    Add,
    Mul,
    Sub,
    Min,
    Div,
    Max,
}

impl SseArithOp {
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Sqrt => 0x51,
            Self::Rsqrt => 0x52,
            Self::Rcp => 0x53,
            Self::Add => 0x58,
            Self::Mul => 0x59,
            Self::Sub => 0x5C,
            Self::Min => 0x5D,
            Self::Div => 0x5E,
            Self::Max => 0x5F,
        }
    }

    pub fn from_opcode(op: u8) -> Option<Self> {
        Some(match op {
            0x51 => Self::Sqrt,
            0x52 => Self::Rsqrt,
            0x53 => Self::Rcp,
            0x58 => Self::Add,
            0x59 => Self::Mul,
            0x5C => Self::Sub,
            0x5D => Self::Min,
            0x5E => Self::Div,
            0x5F => Self::Max,
            _ => return None,
        })
    }

    /// Rsqrt and rcp only exist in single precision.
    pub fn has_double(&self) -> bool {
        !matches!(self, Self::Rsqrt | Self::Rcp)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sqrt => "sqrt",
            Self::Rsqrt => "rsqrt",
            Self::Rcp => "rcp",
            Self::Add => "add",
            Self::Mul => "mul",
            Self::Sub => "sub",
            Self::Min => "min",
            Self::Div => "div",
            Self::Max => "max",
        }
    }
}

/// SSE bitwise operations (`0F 54`-`0F 57`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SseLogicOp {
    And,
    Andn,
    Or,
    Xor,
}

impl SseLogicOp {
    pub fn opcode(&self) -> u8 {
        0x54 + *self as u8
    }

    pub fn from_opcode(op: u8) -> Option<Self> {
        Some(match op {
            0x54 => Self::And,
            0x55 => Self::Andn,
            0x56 => Self::Or,
            0x57 => Self::Xor,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Andn => "andn",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }
}

/// Operand formats named in the `cvt*` mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CvtType {
    /// packed dword integers in an MMX register
    Pi,
    /// dword integer in a general register
    Si,
    Ps,
    Pd,
    Ss,
    Sd,
    /// packed dword integers in an XMM register
    Dq,
}

impl CvtType {
    fn name(&self) -> &'static str {
        match self {
            Self::Pi => "pi",
            Self::Si => "si",
            Self::Ps => "ps",
            Self::Pd => "pd",
            Self::Ss => "ss",
            Self::Sd => "sd",
            Self::Dq => "dq",
        }
    }
}

/// Encoding row for one `cvt*` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionEncoding {
    pub from: CvtType,
    pub to: CvtType,
    pub truncate: bool,
    /// Mandatory prefix (66, F2, F3) if any.
    pub prefix: Option<u8>,
    /// Second opcode byte after `0F`.
    pub opcode: u8,
    /// Width of a memory source operand.
    pub source_size: OperandSize,
}

const fn cvt(
    from: CvtType,
    to: CvtType,
    truncate: bool,
    prefix: Option<u8>,
    opcode: u8,
    source_size: OperandSize,
) -> ConversionEncoding {
    ConversionEncoding {
        from,
        to,
        truncate,
        prefix,
        opcode,
        source_size,
    }
}

/// Every supported conversion.
pub static CONVERSIONS: [ConversionEncoding; 22] = {
    use CvtType::*;
    use OperandSize::{Dword, Mm, Qword, Xmm};
    [
        cvt(Pi, Ps, false, None, 0x2A, Mm),
        cvt(Si, Ss, false, Some(0xF3), 0x2A, Dword),
        cvt(Pi, Pd, false, Some(0x66), 0x2A, Mm),
        cvt(Si, Sd, false, Some(0xF2), 0x2A, Dword),
        cvt(Ps, Pi, true, None, 0x2C, Qword),
        cvt(Ss, Si, true, Some(0xF3), 0x2C, Dword),
        cvt(Pd, Pi, true, Some(0x66), 0x2C, Xmm),
        cvt(Sd, Si, true, Some(0xF2), 0x2C, Qword),
        cvt(Ps, Pi, false, None, 0x2D, Qword),
        cvt(Ss, Si, false, Some(0xF3), 0x2D, Dword),
        cvt(Pd, Pi, false, Some(0x66), 0x2D, Xmm),
        cvt(Sd, Si, false, Some(0xF2), 0x2D, Qword),
        cvt(Ps, Pd, false, None, 0x5A, Qword),
        cvt(Pd, Ps, false, Some(0x66), 0x5A, Xmm),
        cvt(Ss, Sd, false, Some(0xF3), 0x5A, Dword),
        cvt(Sd, Ss, false, Some(0xF2), 0x5A, Qword),
        cvt(Dq, Ps, false, None, 0x5B, Xmm),
        cvt(Ps, Dq, false, Some(0x66), 0x5B, Xmm),
        cvt(Ps, Dq, true, Some(0xF3), 0x5B, Xmm),
        cvt(Pd, Dq, true, Some(0x66), 0xE6, Xmm),
        cvt(Dq, Pd, false, Some(0xF3), 0xE6, Qword),
        cvt(Pd, Dq, false, Some(0xF2), 0xE6, Xmm),
    ]
};

/// Looks up the encoding row of a conversion.
pub fn conversion(from: CvtType, to: CvtType, truncate: bool) -> Option<&'static ConversionEncoding> {
    CONVERSIONS
        .iter()
        .find(|c| c.from == from && c.to == to && c.truncate == truncate)
}

/// Looks up a conversion by its mandatory prefix and opcode.
pub fn conversion_by_opcode(prefix: Option<u8>, opcode: u8) -> Option<&'static ConversionEncoding> {
    CONVERSIONS
        .iter()
        .find(|c| c.prefix == prefix && c.opcode == opcode)
}

/// Non-temporal store variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovntKind {
    /// movntps (0F 2B)
    Ps,
    /// movntpd (66 0F 2B)
    Pd,
    /// movnti (0F C3)
    Dword,
    /// movntq (0F E7)
    Mmx,
    /// movntdq (66 0F E7)
    Dq,
}

/// Memory fences (`0F AE` with mod=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FenceKind {
    Load,
    Memory,
    Store,
}

impl FenceKind {
    pub fn modrm(&self) -> u8 {
        match self {
            Self::Load => 0xE8,
            Self::Memory => 0xF0,
            Self::Store => 0xF8,
        }
    }
}

/// Prefetch hints (`0F 18 /0`-`/3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefetchHint {
    Nta,
    T0,
    T1,
    T2,
}

impl PrefetchHint {
    pub fn selector(&self) -> u8 {
        *self as u8
    }

    pub fn from_selector(sel: u8) -> Option<Self> {
        Some(match sel {
            0 => Self::Nta,
            1 => Self::T0,
            2 => Self::T1,
            3 => Self::T2,
            _ => return None,
        })
    }
}

/// One variant per IA-32 instruction family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mnemonic {
    // ---------------------------------------------------------------------
    // General purpose
    // ---------------------------------------------------------------------
    Add { carry: bool },
    Sub { borrow: bool },
    And,
    Or,
    Xor,
    Cmp,
    Test,
    Inc,
    Dec,
    Neg,
    Not,
    Mul,
    Imul,
    Div { signed: bool },
    Shift(ShiftOp),
    DoubleShift { right: bool },
    Mov,
    MovExtend { signed: bool },
    Lea,
    Xchg,
    Xadd,
    Cmpxchg,
    Cmpxchg8b,
    Push,
    Pop,
    /// pusha/pushad
    Pusha { size: OperandSize },
    Popa { size: OperandSize },
    Pushf { size: OperandSize },
    Popf { size: OperandSize },
    /// cbw/cwde
    Convert { size: OperandSize },
    /// cwd/cdq
    ConvertDouble { size: OperandSize },
    Sahf,
    Lahf,
    BitTest(BitOp),
    BitScan { reverse: bool },
    Bswap,
    Setcc(Condition),
    Cmovcc(Condition),
    Daa,
    Das,
    Aaa,
    Aas,
    Aam,
    Aad,
    Xlat,
    Bound,
    Arpl,
    /// lds/les/lss/lfs/lgs
    LoadFarPointer(Segment),
    Nop,
    Pause,
    Wait,
    Clc,
    Stc,
    Cmc,
    Cld,
    Std,
    Cli,
    Sti,
    In,
    Out,

    // ---------------------------------------------------------------------
    // Control transfer
    // ---------------------------------------------------------------------
    Jmp,
    Jcc(Condition),
    Jecxz,
    Loop(LoopKind),
    Call,
    Ret { far: bool },
    Iret,
    Int,
    Int3,
    Into,
    Enter,
    Leave,

    // ---------------------------------------------------------------------
    // String
    // ---------------------------------------------------------------------
    Movs { size: OperandSize, rep: RepPrefix },
    Cmps { size: OperandSize, rep: RepPrefix },
    Scas { size: OperandSize, rep: RepPrefix },
    Lods { size: OperandSize, rep: RepPrefix },
    Stos { size: OperandSize, rep: RepPrefix },
    Ins { size: OperandSize, rep: RepPrefix },
    Outs { size: OperandSize, rep: RepPrefix },

    // ---------------------------------------------------------------------
    // System
    // ---------------------------------------------------------------------
    Hlt,
    Sldt,
    Str,
    Lldt,
    Ltr,
    Verr,
    Verw,
    Sgdt,
    Sidt,
    Lgdt,
    Lidt,
    Smsw,
    Lmsw,
    Invlpg,
    Lar,
    Lsl,
    Clts,
    Invd,
    Wbinvd,
    Ud2,
    Cpuid,
    Rdtsc,
    Rdmsr,
    Wrmsr,
    Rdpmc,
    Sysenter,
    Sysexit,
    Rsm,

    // ---------------------------------------------------------------------
    // x87
    // ---------------------------------------------------------------------
    Fld,
    Fst { pop: bool },
    Fild,
    Fist { pop: bool },
    Fisttp,
    Fbld,
    Fbstp,
    Fadd { integer: bool, pop: bool },
    Fmul { integer: bool, pop: bool },
    Fsub { reverse: bool, integer: bool, pop: bool },
    Fdiv { reverse: bool, integer: bool, pop: bool },
    Fcom { integer: bool, unordered: bool, pop: FpuPop },
    Fcomi { unordered: bool, pop: bool },
    Fcmov(FcmovCondition),
    Fxch,
    Ffree,
    FldConst(FpuConstant),
    Fchs,
    Fabs,
    Ftst,
    Fxam,
    F2xm1,
    Fyl2x,
    Fptan,
    Fpatan,
    Fxtract,
    Fprem { ieee: bool },
    Fdecstp,
    Fincstp,
    Fyl2xp1,
    Fsqrt,
    Fsincos,
    Frndint,
    Fscale,
    Fsin,
    Fcos,
    Fnop,
    Finit,
    Fclex,
    Fldcw,
    Fstcw,
    Fstsw,
    Fldenv,
    Fstenv,
    Frstor,
    Fsave,

    // ---------------------------------------------------------------------
    // MMX and SSE2 integer
    // ---------------------------------------------------------------------
    Emms,
    Movd,
    Movq,
    Movdq { aligned: bool },
    Punpckl(Lane),
    Punpckh(Lane),
    /// packsswb (Word) / packssdw (Dword)
    Packss(Lane),
    Packuswb,
    Pcmpeq(Lane),
    Pcmpgt(Lane),
    Padd { lane: Lane, saturation: Saturation },
    Psub { lane: Lane, saturation: Saturation },
    Pmul(PmulKind),
    Pmaddwd,
    Psadbw,
    Pavg(Lane),
    /// pminsw (signed) / pminub
    Pmin { signed: bool },
    Pmax { signed: bool },
    Pand,
    Pandn,
    Por,
    Pxor,
    Psll(Lane),
    Psrl(Lane),
    Psra(Lane),
    /// pslldq/psrldq
    PshiftDq { right: bool },
    Pshuf(PshufKind),
    Pinsrw,
    Pextrw,
    Pmovmskb,
    Maskmovq,

    // ---------------------------------------------------------------------
    // SSE / SSE2 floating point
    // ---------------------------------------------------------------------
    SseArith { op: SseArithOp, packed: bool, double: bool },
    SseLogic { op: SseLogicOp, double: bool },
    /// movaps/movapd
    MovAligned { double: bool },
    /// movups/movupd
    MovUnaligned { double: bool },
    /// movss/movsd
    MovScalar { double: bool },
    /// movlps/movlpd
    MovLow { double: bool },
    /// movhps/movhpd
    MovHigh { double: bool },
    Movhlps,
    Movlhps,
    Unpck { high: bool, double: bool },
    Movmsk { double: bool },
    Comis { unordered: bool, double: bool },
    SseCmp { packed: bool, double: bool },
    Shufp { double: bool },
    Cvt { from: CvtType, to: CvtType, truncate: bool },
    Movnt(MovntKind),
    Ldmxcsr,
    Stmxcsr,
    Fxsave,
    Fxrstor,
    Fence(FenceKind),
    Clflush,
    Prefetch(PrefetchHint),

    /// Decoder sentinel for unrecognized byte patterns.
    Unknown,
}

impl Mnemonic {
    /// Returns the arithmetic-group selector (ModR/M reg field for `80`-`83`
    /// and the row of the `00`-`3D` opcode block).
    pub fn alu_selector(&self) -> Option<u8> {
        Some(match self {
            Self::Add { carry: false } => 0,
            Self::Or => 1,
            Self::Add { carry: true } => 2,
            Self::Sub { borrow: true } => 3,
            Self::And => 4,
            Self::Sub { borrow: false } => 5,
            Self::Xor => 6,
            Self::Cmp => 7,
            _ => return None,
        })
    }

    /// Inverse of [`Mnemonic::alu_selector`].
    pub fn from_alu_selector(sel: u8) -> Self {
        match sel & 0x7 {
            0 => Self::Add { carry: false },
            1 => Self::Or,
            2 => Self::Add { carry: true },
            3 => Self::Sub { borrow: true },
            4 => Self::And,
            5 => Self::Sub { borrow: false },
            6 => Self::Xor,
            _ => Self::Cmp,
        }
    }

    /// Returns the REP marker of a string instruction.
    pub fn rep(&self) -> Option<RepPrefix> {
        match self {
            Self::Movs { rep, .. }
            | Self::Cmps { rep, .. }
            | Self::Scas { rep, .. }
            | Self::Lods { rep, .. }
            | Self::Stos { rep, .. }
            | Self::Ins { rep, .. }
            | Self::Outs { rep, .. } => Some(*rep),
            _ => None,
        }
    }

    /// Returns true for MOVS/CMPS/SCAS/LODS/STOS/INS/OUTS.
    pub fn is_string(&self) -> bool {
        self.rep().is_some()
    }

    /// Returns true for the x87 families.
    pub fn is_x87(&self) -> bool {
        matches!(
            self,
            Self::Fld
                | Self::Fst { .. }
                | Self::Fild
                | Self::Fist { .. }
                | Self::Fisttp
                | Self::Fbld
                | Self::Fbstp
                | Self::Fadd { .. }
                | Self::Fmul { .. }
                | Self::Fsub { .. }
                | Self::Fdiv { .. }
                | Self::Fcom { .. }
                | Self::Fcomi { .. }
                | Self::Fcmov(_)
                | Self::Fxch
                | Self::Ffree
                | Self::FldConst(_)
                | Self::Fldcw
                | Self::Fstcw
                | Self::Fstsw
                | Self::Fldenv
                | Self::Fstenv
                | Self::Frstor
                | Self::Fsave
        ) || self.x87_nullary().is_some()
    }

    /// Returns the fixed two-byte encoding of an argument-less x87
    /// instruction.
    pub fn x87_nullary(&self) -> Option<[u8; 2]> {
        Some(match self {
            Self::Fnop => [0xD9, 0xD0],
            Self::Fchs => [0xD9, 0xE0],
            Self::Fabs => [0xD9, 0xE1],
            Self::Ftst => [0xD9, 0xE4],
            Self::Fxam => [0xD9, 0xE5],
            Self::FldConst(c) => [0xD9, c.modrm()],
            Self::F2xm1 => [0xD9, 0xF0],
            Self::Fyl2x => [0xD9, 0xF1],
            Self::Fptan => [0xD9, 0xF2],
            Self::Fpatan => [0xD9, 0xF3],
            Self::Fxtract => [0xD9, 0xF4],
            Self::Fprem { ieee: true } => [0xD9, 0xF5],
            Self::Fdecstp => [0xD9, 0xF6],
            Self::Fincstp => [0xD9, 0xF7],
            Self::Fprem { ieee: false } => [0xD9, 0xF8],
            Self::Fyl2xp1 => [0xD9, 0xF9],
            Self::Fsqrt => [0xD9, 0xFA],
            Self::Fsincos => [0xD9, 0xFB],
            Self::Frndint => [0xD9, 0xFC],
            Self::Fscale => [0xD9, 0xFD],
            Self::Fsin => [0xD9, 0xFE],
            Self::Fcos => [0xD9, 0xFF],
            Self::Fcom {
                integer: false,
                unordered: true,
                pop: FpuPop::DoublePop,
            } => [0xDA, 0xE9],
            Self::Fclex => [0xDB, 0xE2],
            Self::Finit => [0xDB, 0xE3],
            Self::Fcom {
                integer: false,
                unordered: false,
                pop: FpuPop::DoublePop,
            } => [0xDE, 0xD9],
            _ => return None,
        })
    }

    /// Maps the second byte of a `D9 Ex/Fx` argument-less instruction back to
    /// its mnemonic.
    pub fn from_x87_nullary(escape: u8, modrm: u8) -> Option<Self> {
        if escape == 0xD9 {
            if let Some(c) = FpuConstant::from_modrm(modrm) {
                return Some(Self::FldConst(c));
            }
        }
        X87_NULLARY
            .iter()
            .copied()
            .find(|m| m.x87_nullary() == Some([escape, modrm]))
    }
}

const X87_NULLARY: [Mnemonic; 25] = [
    Mnemonic::Fnop,
    Mnemonic::Fchs,
    Mnemonic::Fabs,
    Mnemonic::Ftst,
    Mnemonic::Fxam,
    Mnemonic::F2xm1,
    Mnemonic::Fyl2x,
    Mnemonic::Fptan,
    Mnemonic::Fpatan,
    Mnemonic::Fxtract,
    Mnemonic::Fprem { ieee: true },
    Mnemonic::Fdecstp,
    Mnemonic::Fincstp,
    Mnemonic::Fprem { ieee: false },
    Mnemonic::Fyl2xp1,
    Mnemonic::Fsqrt,
    Mnemonic::Fsincos,
    Mnemonic::Frndint,
    Mnemonic::Fscale,
    Mnemonic::Fsin,
    Mnemonic::Fcos,
    Mnemonic::Fcom {
        integer: false,
        unordered: true,
        pop: FpuPop::DoublePop,
    },
    Mnemonic::Fclex,
    Mnemonic::Finit,
    Mnemonic::Fcom {
        integer: false,
        unordered: false,
        pop: FpuPop::DoublePop,
    },
];

fn size_suffix(size: OperandSize) -> &'static str {
    match size {
        OperandSize::Byte | OperandSize::SignedByte => "b",
        OperandSize::Word => "w",
        _ => "d",
    }
}

fn fp_suffix(packed: bool, double: bool) -> &'static str {
    match (packed, double) {
        (true, false) => "ps",
        (true, true) => "pd",
        (false, false) => "ss",
        (false, true) => "sd",
    }
}

fn p_suffix(double: bool) -> &'static str {
    if double {
        "pd"
    } else {
        "ps"
    }
}

fn write_string_op(
    f: &mut fmt::Formatter<'_>,
    base: &str,
    size: OperandSize,
    rep: RepPrefix,
    compares: bool,
) -> fmt::Result {
    match (rep, compares) {
        (RepPrefix::None, _) => {}
        (RepPrefix::Rep, true) => f.write_str("repe ")?,
        (RepPrefix::Rep, false) => f.write_str("rep ")?,
        (RepPrefix::Repne, _) => f.write_str("repne ")?,
    }
    write!(f, "{}{}", base, size_suffix(size))
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: &str = match self {
            Self::Add { carry: false } => "add",
            Self::Add { carry: true } => "adc",
            Self::Sub { borrow: false } => "sub",
            Self::Sub { borrow: true } => "sbb",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Cmp => "cmp",
            Self::Test => "test",
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::Neg => "neg",
            Self::Not => "not",
            Self::Mul => "mul",
            Self::Imul => "imul",
            Self::Div { signed: false } => "div",
            Self::Div { signed: true } => "idiv",
            Self::Shift(op) => op.name(),
            Self::DoubleShift { right: false } => "shld",
            Self::DoubleShift { right: true } => "shrd",
            Self::Mov => "mov",
            Self::MovExtend { signed: false } => "movzx",
            Self::MovExtend { signed: true } => "movsx",
            Self::Lea => "lea",
            Self::Xchg => "xchg",
            Self::Xadd => "xadd",
            Self::Cmpxchg => "cmpxchg",
            Self::Cmpxchg8b => "cmpxchg8b",
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Pusha { size } => {
                return f.write_str(if *size == OperandSize::Word { "pusha" } else { "pushad" })
            }
            Self::Popa { size } => {
                return f.write_str(if *size == OperandSize::Word { "popa" } else { "popad" })
            }
            Self::Pushf { size } => {
                return f.write_str(if *size == OperandSize::Word { "pushf" } else { "pushfd" })
            }
            Self::Popf { size } => {
                return f.write_str(if *size == OperandSize::Word { "popf" } else { "popfd" })
            }
            Self::Convert { size } => {
                return f.write_str(if *size == OperandSize::Word { "cbw" } else { "cwde" })
            }
            Self::ConvertDouble { size } => {
                return f.write_str(if *size == OperandSize::Word { "cwd" } else { "cdq" })
            }
            Self::Sahf => "sahf",
            Self::Lahf => "lahf",
            Self::BitTest(op) => op.name(),
            Self::BitScan { reverse: false } => "bsf",
            Self::BitScan { reverse: true } => "bsr",
            Self::Bswap => "bswap",
            Self::Setcc(cond) => return write!(f, "set{}", cond.suffix()),
            Self::Cmovcc(cond) => return write!(f, "cmov{}", cond.suffix()),
            Self::Daa => "daa",
            Self::Das => "das",
            Self::Aaa => "aaa",
            Self::Aas => "aas",
            Self::Aam => "aam",
            Self::Aad => "aad",
            Self::Xlat => "xlatb",
            Self::Bound => "bound",
            Self::Arpl => "arpl",
            Self::LoadFarPointer(seg) => return write!(f, "l{}", seg.name()),
            Self::Nop => "nop",
            Self::Pause => "pause",
            Self::Wait => "wait",
            Self::Clc => "clc",
            Self::Stc => "stc",
            Self::Cmc => "cmc",
            Self::Cld => "cld",
            Self::Std => "std",
            Self::Cli => "cli",
            Self::Sti => "sti",
            Self::In => "in",
            Self::Out => "out",

            Self::Jmp => "jmp",
            Self::Jcc(cond) => return write!(f, "j{}", cond.suffix()),
            Self::Jecxz => "jecxz",
            Self::Loop(LoopKind::Loop) => "loop",
            Self::Loop(LoopKind::Loope) => "loope",
            Self::Loop(LoopKind::Loopne) => "loopne",
            Self::Call => "call",
            Self::Ret { far: false } => "ret",
            Self::Ret { far: true } => "retf",
            Self::Iret => "iretd",
            Self::Int => "int",
            Self::Int3 => "int3",
            Self::Into => "into",
            Self::Enter => "enter",
            Self::Leave => "leave",

            Self::Movs { size, rep } => return write_string_op(f, "movs", *size, *rep, false),
            Self::Cmps { size, rep } => return write_string_op(f, "cmps", *size, *rep, true),
            Self::Scas { size, rep } => return write_string_op(f, "scas", *size, *rep, true),
            Self::Lods { size, rep } => return write_string_op(f, "lods", *size, *rep, false),
            Self::Stos { size, rep } => return write_string_op(f, "stos", *size, *rep, false),
            Self::Ins { size, rep } => return write_string_op(f, "ins", *size, *rep, false),
            Self::Outs { size, rep } => return write_string_op(f, "outs", *size, *rep, false),

            Self::Hlt => "hlt",
            Self::Sldt => "sldt",
            Self::Str => "str",
            Self::Lldt => "lldt",
            Self::Ltr => "ltr",
            Self::Verr => "verr",
            Self::Verw => "verw",
            Self::Sgdt => "sgdt",
            Self::Sidt => "sidt",
            Self::Lgdt => "lgdt",
            Self::Lidt => "lidt",
            Self::Smsw => "smsw",
            Self::Lmsw => "lmsw",
            Self::Invlpg => "invlpg",
            Self::Lar => "lar",
            Self::Lsl => "lsl",
            Self::Clts => "clts",
            Self::Invd => "invd",
            Self::Wbinvd => "wbinvd",
            Self::Ud2 => "ud2",
            Self::Cpuid => "cpuid",
            Self::Rdtsc => "rdtsc",
            Self::Rdmsr => "rdmsr",
            Self::Wrmsr => "wrmsr",
            Self::Rdpmc => "rdpmc",
            Self::Sysenter => "sysenter",
            Self::Sysexit => "sysexit",
            Self::Rsm => "rsm",

            Self::Fld => "fld",
            Self::Fst { pop: false } => "fst",
            Self::Fst { pop: true } => "fstp",
            Self::Fild => "fild",
            Self::Fist { pop: false } => "fist",
            Self::Fist { pop: true } => "fistp",
            Self::Fisttp => "fisttp",
            Self::Fbld => "fbld",
            Self::Fbstp => "fbstp",
            Self::Fadd { integer, pop } => return write_fpu_arith(f, "add", false, *integer, *pop),
            Self::Fmul { integer, pop } => return write_fpu_arith(f, "mul", false, *integer, *pop),
            Self::Fsub {
                reverse,
                integer,
                pop,
            } => return write_fpu_arith(f, "sub", *reverse, *integer, *pop),
            Self::Fdiv {
                reverse,
                integer,
                pop,
            } => return write_fpu_arith(f, "div", *reverse, *integer, *pop),
            Self::Fcom {
                integer,
                unordered,
                pop,
            } => {
                f.write_str(if *integer { "fi" } else { "f" })?;
                f.write_str(if *unordered { "ucom" } else { "com" })?;
                return f.write_str(match pop {
                    FpuPop::None => "",
                    FpuPop::Pop => "p",
                    FpuPop::DoublePop => "pp",
                });
            }
            Self::Fcomi { unordered, pop } => {
                f.write_str(if *unordered { "fucomi" } else { "fcomi" })?;
                return f.write_str(if *pop { "p" } else { "" });
            }
            Self::Fcmov(cond) => return write!(f, "fcmov{}", cond.suffix()),
            Self::Fxch => "fxch",
            Self::Ffree => "ffree",
            Self::FldConst(c) => c.name(),
            Self::Fchs => "fchs",
            Self::Fabs => "fabs",
            Self::Ftst => "ftst",
            Self::Fxam => "fxam",
            Self::F2xm1 => "f2xm1",
            Self::Fyl2x => "fyl2x",
            Self::Fptan => "fptan",
            Self::Fpatan => "fpatan",
            Self::Fxtract => "fxtract",
            Self::Fprem { ieee: false } => "fprem",
            Self::Fprem { ieee: true } => "fprem1",
            Self::Fdecstp => "fdecstp",
            Self::Fincstp => "fincstp",
            Self::Fyl2xp1 => "fyl2xp1",
            Self::Fsqrt => "fsqrt",
            Self::Fsincos => "fsincos",
            Self::Frndint => "frndint",
            Self::Fscale => "fscale",
            Self::Fsin => "fsin",
            Self::Fcos => "fcos",
            Self::Fnop => "fnop",
            Self::Finit => "fninit",
            Self::Fclex => "fnclex",
            Self::Fldcw => "fldcw",
            Self::Fstcw => "fnstcw",
            Self::Fstsw => "fnstsw",
            Self::Fldenv => "fldenv",
            Self::Fstenv => "fnstenv",
            Self::Frstor => "frstor",
            Self::Fsave => "fnsave",

            Self::Emms => "emms",
            Self::Movd => "movd",
            Self::Movq => "movq",
            Self::Movdq { aligned: true } => "movdqa",
            Self::Movdq { aligned: false } => "movdqu",
            Self::Punpckl(lane) => return write!(f, "punpckl{}", unpack_suffix(*lane)),
            Self::Punpckh(lane) => return write!(f, "punpckh{}", unpack_suffix(*lane)),
            Self::Packss(Lane::Dword) => "packssdw",
            Self::Packss(_) => "packsswb",
            Self::Packuswb => "packuswb",
            Self::Pcmpeq(lane) => return write!(f, "pcmpeq{}", lane.suffix()),
            Self::Pcmpgt(lane) => return write!(f, "pcmpgt{}", lane.suffix()),
            Self::Padd { lane, saturation } => {
                return write!(f, "padd{}{}", saturation.infix(), lane.suffix())
            }
            Self::Psub { lane, saturation } => {
                return write!(f, "psub{}{}", saturation.infix(), lane.suffix())
            }
            Self::Pmul(PmulKind::Low) => "pmullw",
            Self::Pmul(PmulKind::High) => "pmulhw",
            Self::Pmul(PmulKind::HighUnsigned) => "pmulhuw",
            Self::Pmul(PmulKind::UnsignedDword) => "pmuludq",
            Self::Pmaddwd => "pmaddwd",
            Self::Psadbw => "psadbw",
            Self::Pavg(lane) => return write!(f, "pavg{}", lane.suffix()),
            Self::Pmin { signed: true } => "pminsw",
            Self::Pmin { signed: false } => "pminub",
            Self::Pmax { signed: true } => "pmaxsw",
            Self::Pmax { signed: false } => "pmaxub",
            Self::Pand => "pand",
            Self::Pandn => "pandn",
            Self::Por => "por",
            Self::Pxor => "pxor",
            Self::Psll(lane) => return write!(f, "psll{}", lane.suffix()),
            Self::Psrl(lane) => return write!(f, "psrl{}", lane.suffix()),
            Self::Psra(lane) => return write!(f, "psra{}", lane.suffix()),
            Self::PshiftDq { right: false } => "pslldq",
            Self::PshiftDq { right: true } => "psrldq",
            Self::Pshuf(PshufKind::Words) => "pshufw",
            Self::Pshuf(PshufKind::Dwords) => "pshufd",
            Self::Pshuf(PshufKind::HighWords) => "pshufhw",
            Self::Pshuf(PshufKind::LowWords) => "pshuflw",
            Self::Pinsrw => "pinsrw",
            Self::Pextrw => "pextrw",
            Self::Pmovmskb => "pmovmskb",
            Self::Maskmovq => "maskmovq",

            Self::SseArith { op, packed, double } => {
                return write!(f, "{}{}", op.name(), fp_suffix(*packed, *double))
            }
            Self::SseLogic { op, double } => return write!(f, "{}{}", op.name(), p_suffix(*double)),
            Self::MovAligned { double } => return write!(f, "mova{}", p_suffix(*double)),
            Self::MovUnaligned { double } => return write!(f, "movu{}", p_suffix(*double)),
            Self::MovScalar { double: false } => "movss",
            Self::MovScalar { double: true } => "movsd",
            Self::MovLow { double } => return write!(f, "movl{}", p_suffix(*double)),
            Self::MovHigh { double } => return write!(f, "movh{}", p_suffix(*double)),
            Self::Movhlps => "movhlps",
            Self::Movlhps => "movlhps",
            Self::Unpck { high, double } => {
                let half = if *high { "h" } else { "l" };
                return write!(f, "unpck{}{}", half, p_suffix(*double));
            }
            Self::Movmsk { double } => return write!(f, "movmsk{}", p_suffix(*double)),
            Self::Comis { unordered, double } => {
                let u = if *unordered { "u" } else { "" };
                let s = if *double { "sd" } else { "ss" };
                return write!(f, "{}comi{}", u, s);
            }
            Self::SseCmp { packed, double } => return write!(f, "cmp{}", fp_suffix(*packed, *double)),
            Self::Shufp { double } => return write!(f, "shuf{}", p_suffix(*double)),
            Self::Cvt { from, to, truncate } => {
                let t = if *truncate { "t" } else { "" };
                return write!(f, "cvt{}{}2{}", t, from.name(), to.name());
            }
            Self::Movnt(MovntKind::Ps) => "movntps",
            Self::Movnt(MovntKind::Pd) => "movntpd",
            Self::Movnt(MovntKind::Dword) => "movnti",
            Self::Movnt(MovntKind::Mmx) => "movntq",
            Self::Movnt(MovntKind::Dq) => "movntdq",
            Self::Ldmxcsr => "ldmxcsr",
            Self::Stmxcsr => "stmxcsr",
            Self::Fxsave => "fxsave",
            Self::Fxrstor => "fxrstor",
            Self::Fence(FenceKind::Load) => "lfence",
            Self::Fence(FenceKind::Memory) => "mfence",
            Self::Fence(FenceKind::Store) => "sfence",
            Self::Clflush => "clflush",
            Self::Prefetch(PrefetchHint::Nta) => "prefetchnta",
            Self::Prefetch(PrefetchHint::T0) => "prefetcht0",
            Self::Prefetch(PrefetchHint::T1) => "prefetcht1",
            Self::Prefetch(PrefetchHint::T2) => "prefetcht2",

            Self::Unknown => "(bad)",
        };
        f.write_str(text)
    }
}

fn unpack_suffix(lane: Lane) -> &'static str {
    match lane {
        Lane::Byte => "bw",
        Lane::Word => "wd",
        Lane::Dword => "dq",
        Lane::Qword => "qdq",
    }
}

fn write_fpu_arith(
    f: &mut fmt::Formatter<'_>,
    op: &str,
    reverse: bool,
    integer: bool,
    pop: bool,
) -> fmt::Result {
    f.write_str(if integer { "fi" } else { "f" })?;
    f.write_str(op)?;
    if reverse {
        f.write_str("r")?;
    }
    if pop {
        f.write_str("p")?;
    }
    Ok(())
}
