//! IA-32 register representation.
//!
//! A register is a (class, code) pair. The code is the 3-bit value that lands
//! in a ModR/M, SIB or opcode field, so it is always in `0..=7`. Names come
//! from constant tables indexed by class and code.

use crate::error::OperandError;
use crate::operand::OperandSize;

/// Register class (general purpose, x87 stack, vector, system).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// 8-bit general purpose register (al, cl, ..., bh)
    Gpr8,
    /// 16-bit general purpose register (ax, cx, ...)
    Gpr16,
    /// 32-bit general purpose register (eax, ecx, ...)
    Gpr32,
    /// x87 stack slot ST(i)
    X87,
    /// MMX register (mm0-mm7)
    Mmx,
    /// SSE register (xmm0-xmm7)
    Xmm,
    /// Control register (cr0-cr7)
    Control,
    /// Debug register (dr0-dr7)
    Debug,
}

impl RegisterClass {
    /// Returns true for the general purpose classes.
    pub fn is_general(&self) -> bool {
        matches!(self, Self::Gpr8 | Self::Gpr16 | Self::Gpr32)
    }

    /// Returns the operand size a register of this class carries.
    pub fn size(&self) -> OperandSize {
        match self {
            Self::Gpr8 => OperandSize::Byte,
            Self::Gpr16 => OperandSize::Word,
            Self::Gpr32 => OperandSize::Dword,
            Self::X87 => OperandSize::Tbyte,
            Self::Mmx => OperandSize::Mm,
            Self::Xmm => OperandSize::Xmm,
            Self::Control => OperandSize::Control,
            Self::Debug => OperandSize::Debug,
        }
    }

    fn names(&self) -> &'static [&'static str; 8] {
        match self {
            Self::Gpr8 => &GPR8_NAMES,
            Self::Gpr16 => &GPR16_NAMES,
            Self::Gpr32 => &GPR32_NAMES,
            Self::X87 => &X87_NAMES,
            Self::Mmx => &MMX_NAMES,
            Self::Xmm => &XMM_NAMES,
            Self::Control => &CONTROL_NAMES,
            Self::Debug => &DEBUG_NAMES,
        }
    }
}

const GPR8_NAMES: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const GPR16_NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const GPR32_NAMES: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];
const X87_NAMES: [&str; 8] = [
    "st(0)", "st(1)", "st(2)", "st(3)", "st(4)", "st(5)", "st(6)", "st(7)",
];
const MMX_NAMES: [&str; 8] = ["mm0", "mm1", "mm2", "mm3", "mm4", "mm5", "mm6", "mm7"];
const XMM_NAMES: [&str; 8] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7",
];
const CONTROL_NAMES: [&str; 8] = ["cr0", "cr1", "cr2", "cr3", "cr4", "cr5", "cr6", "cr7"];
const DEBUG_NAMES: [&str; 8] = ["dr0", "dr1", "dr2", "dr3", "dr4", "dr5", "dr6", "dr7"];

/// An IA-32 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "(RegisterClass, u8)", into = "(RegisterClass, u8)")
)]
pub struct Register {
    class: RegisterClass,
    code: u8,
}

impl Register {
    pub const AL: Self = Self::fixed(RegisterClass::Gpr8, 0);
    pub const CL: Self = Self::fixed(RegisterClass::Gpr8, 1);
    pub const DL: Self = Self::fixed(RegisterClass::Gpr8, 2);
    pub const BL: Self = Self::fixed(RegisterClass::Gpr8, 3);
    pub const AH: Self = Self::fixed(RegisterClass::Gpr8, 4);
    pub const CH: Self = Self::fixed(RegisterClass::Gpr8, 5);
    pub const DH: Self = Self::fixed(RegisterClass::Gpr8, 6);
    pub const BH: Self = Self::fixed(RegisterClass::Gpr8, 7);

    pub const AX: Self = Self::fixed(RegisterClass::Gpr16, 0);
    pub const CX: Self = Self::fixed(RegisterClass::Gpr16, 1);
    pub const DX: Self = Self::fixed(RegisterClass::Gpr16, 2);
    pub const BX: Self = Self::fixed(RegisterClass::Gpr16, 3);
    pub const SP: Self = Self::fixed(RegisterClass::Gpr16, 4);
    pub const BP: Self = Self::fixed(RegisterClass::Gpr16, 5);
    pub const SI: Self = Self::fixed(RegisterClass::Gpr16, 6);
    pub const DI: Self = Self::fixed(RegisterClass::Gpr16, 7);

    pub const EAX: Self = Self::fixed(RegisterClass::Gpr32, 0);
    pub const ECX: Self = Self::fixed(RegisterClass::Gpr32, 1);
    pub const EDX: Self = Self::fixed(RegisterClass::Gpr32, 2);
    pub const EBX: Self = Self::fixed(RegisterClass::Gpr32, 3);
    pub const ESP: Self = Self::fixed(RegisterClass::Gpr32, 4);
    pub const EBP: Self = Self::fixed(RegisterClass::Gpr32, 5);
    pub const ESI: Self = Self::fixed(RegisterClass::Gpr32, 6);
    pub const EDI: Self = Self::fixed(RegisterClass::Gpr32, 7);

    /// Top of the x87 stack.
    pub const ST0: Self = Self::fixed(RegisterClass::X87, 0);

    const fn fixed(class: RegisterClass, code: u8) -> Self {
        Self { class, code }
    }

    /// Creates a register, rejecting codes outside `0..=7`.
    pub fn new(class: RegisterClass, code: u8) -> Result<Self, OperandError> {
        if code > 7 {
            return Err(OperandError::InvalidRegisterCode(code));
        }
        Ok(Self { class, code })
    }

    /// Creates a register from the low three bits of an encoding field.
    pub const fn from_field(class: RegisterClass, field: u8) -> Self {
        Self {
            class,
            code: field & 0x7,
        }
    }

    /// x87 stack slot ST(i).
    pub const fn st(i: u8) -> Self {
        Self::from_field(RegisterClass::X87, i)
    }

    /// MMX register mmN.
    pub const fn mm(n: u8) -> Self {
        Self::from_field(RegisterClass::Mmx, n)
    }

    /// SSE register xmmN.
    pub const fn xmm(n: u8) -> Self {
        Self::from_field(RegisterClass::Xmm, n)
    }

    /// Control register crN.
    pub const fn cr(n: u8) -> Self {
        Self::from_field(RegisterClass::Control, n)
    }

    /// Debug register drN.
    pub const fn dr(n: u8) -> Self {
        Self::from_field(RegisterClass::Debug, n)
    }

    /// Returns the 3-bit encoding.
    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn class(&self) -> RegisterClass {
        self.class
    }

    /// Returns the operand size this register carries.
    pub fn size(&self) -> OperandSize {
        self.class.size()
    }

    /// Returns the canonical lowercase name.
    pub fn name(&self) -> &'static str {
        self.class.names()[self.code as usize]
    }

    /// Returns the general purpose alias with the same code at another size
    /// (`al`/`ax`/`eax` all have code 0).
    ///
    /// Returns `None` for non-general registers or non-GPR sizes.
    pub fn with_size(&self, size: OperandSize) -> Option<Self> {
        if !self.class.is_general() {
            return None;
        }
        let class = match size {
            OperandSize::Byte | OperandSize::SignedByte => RegisterClass::Gpr8,
            OperandSize::Word => RegisterClass::Gpr16,
            OperandSize::Dword => RegisterClass::Gpr32,
            _ => return None,
        };
        Some(Self {
            class,
            code: self.code,
        })
    }

    /// Returns true for a general purpose register.
    pub fn is_general(&self) -> bool {
        self.class.is_general()
    }

    /// Returns true for al, ax or eax.
    pub fn is_accumulator(&self) -> bool {
        self.class.is_general() && self.code == 0
    }
}

impl TryFrom<(RegisterClass, u8)> for Register {
    type Error = OperandError;

    fn try_from((class, code): (RegisterClass, u8)) -> Result<Self, Self::Error> {
        Self::new(class, code)
    }
}

impl From<Register> for (RegisterClass, u8) {
    fn from(reg: Register) -> Self {
        (reg.class, reg.code)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpr_aliases_share_code() {
        assert_eq!(Register::EAX.with_size(OperandSize::Byte), Some(Register::AL));
        assert_eq!(Register::EAX.with_size(OperandSize::Word), Some(Register::AX));
        assert_eq!(Register::BL.with_size(OperandSize::Dword), Some(Register::EBX));
        assert_eq!(Register::xmm(3).with_size(OperandSize::Dword), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Register::ESP.name(), "esp");
        assert_eq!(Register::BH.name(), "bh");
        assert_eq!(Register::st(3).name(), "st(3)");
        assert_eq!(Register::mm(7).name(), "mm7");
        assert_eq!(Register::cr(0).name(), "cr0");
        assert_eq!(Register::dr(6).to_string(), "dr6");
    }

    #[test]
    fn test_checked_constructor() {
        assert!(Register::new(RegisterClass::Xmm, 7).is_ok());
        assert!(matches!(
            Register::new(RegisterClass::Xmm, 8),
            Err(OperandError::InvalidRegisterCode(8))
        ));
        assert_eq!(Register::from_field(RegisterClass::Gpr32, 0xF9), Register::ECX);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Register::AL.size(), OperandSize::Byte);
        assert_eq!(Register::SI.size(), OperandSize::Word);
        assert_eq!(Register::xmm(0).size(), OperandSize::Xmm);
        assert_eq!(Register::mm(0).size(), OperandSize::Mm);
        assert_eq!(Register::st(0).size(), OperandSize::Tbyte);
    }
}
