//! Instruction operand types.

use crate::error::OperandError;
use crate::Register;

/// Operand width.
///
/// Governs the number of bytes read or written for an operand and the size
/// keyword printed in front of memory references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandSize {
    Byte,
    /// One byte, sign-extended to the destination width.
    SignedByte,
    Word,
    Dword,
    Qword,
    /// 48-bit far pointer in memory.
    Fword,
    /// 80-bit x87 extended precision / packed BCD.
    Tbyte,
    Mm,
    Xmm,
    Control,
    Debug,
    None,
}

impl OperandSize {
    /// Returns the encoded width in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            Self::Byte | Self::SignedByte => 1,
            Self::Word => 2,
            Self::Dword | Self::Control | Self::Debug => 4,
            Self::Fword => 6,
            Self::Qword | Self::Mm => 8,
            Self::Tbyte => 10,
            Self::Xmm => 16,
            Self::None => 0,
        }
    }

    /// Returns the Intel size keyword used for memory references.
    pub fn ptr_annotation(&self) -> &'static str {
        match self {
            Self::Byte | Self::SignedByte => "byte ptr",
            Self::Word => "word ptr",
            Self::Dword | Self::Control | Self::Debug => "dword ptr",
            Self::Qword => "qword ptr",
            Self::Fword => "fword ptr",
            Self::Tbyte => "tbyte ptr",
            Self::Mm => "mmword ptr",
            Self::Xmm => "xmmword ptr",
            Self::None => "",
        }
    }

    /// Returns the inclusive value range accepted for an immediate of this
    /// size, or `None` if immediates cannot have this size.
    pub fn immediate_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((i8::MIN as i64, u8::MAX as i64)),
            Self::SignedByte => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::Word => Some((i16::MIN as i64, u16::MAX as i64)),
            Self::Dword => Some((i32::MIN as i64, u32::MAX as i64)),
            _ => None,
        }
    }
}

/// Immediate value operand.
///
/// Byte, word and dword values are stored in canonical unsigned form; a
/// signed byte keeps its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Immediate {
    value: i64,
    size: OperandSize,
    relative: bool,
}

impl Immediate {
    /// Creates an immediate, rejecting values wider than `size`.
    pub fn new(value: i64, size: OperandSize) -> Result<Self, OperandError> {
        let (min, max) = size
            .immediate_range()
            .ok_or(OperandError::InvalidImmediateSize(size))?;
        if value < min || value > max {
            return Err(OperandError::ImmediateOutOfRange { value, size });
        }
        Ok(Self {
            value: canonical(value, size),
            size,
            relative: false,
        })
    }

    /// An 8-bit immediate.
    pub fn byte(value: u8) -> Self {
        Self {
            value: value as i64,
            size: OperandSize::Byte,
            relative: false,
        }
    }

    /// An 8-bit immediate stored sign-extended.
    pub fn signed_byte(value: i8) -> Self {
        Self {
            value: value as i64,
            size: OperandSize::SignedByte,
            relative: false,
        }
    }

    /// A 16-bit immediate.
    pub fn word(value: u16) -> Self {
        Self {
            value: value as i64,
            size: OperandSize::Word,
            relative: false,
        }
    }

    /// A 32-bit immediate.
    pub fn dword(value: u32) -> Self {
        Self {
            value: value as i64,
            size: OperandSize::Dword,
            relative: false,
        }
    }

    /// Marks the value as an offset, which renders signed.
    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    /// Returns the stored (canonical) value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Width of the immediate as encoded.
    pub fn size(&self) -> OperandSize {
        self.size
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Returns the value reinterpreted as a two's complement number of its
    /// own width.
    pub fn as_signed(&self) -> i64 {
        match self.size {
            OperandSize::Byte => self.value as u8 as i8 as i64,
            OperandSize::Word => self.value as u16 as i16 as i64,
            OperandSize::Dword => self.value as u32 as i32 as i64,
            _ => self.value,
        }
    }

    /// Appends the little-endian encoding to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let raw = (self.value as u64).to_le_bytes();
        buf.extend_from_slice(&raw[..self.size.bytes()]);
    }

    /// Returns the little-endian encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size.bytes());
        self.write_to(&mut buf);
        buf
    }
}

fn canonical(value: i64, size: OperandSize) -> i64 {
    match size {
        OperandSize::Byte => value as u8 as i64,
        OperandSize::Word => value as u16 as i64,
        OperandSize::Dword => value as u32 as i64,
        _ => value,
    }
}

/// Encodes `value` little-endian at the width of `size`.
pub fn encode_immediate(value: i64, size: OperandSize) -> Result<Vec<u8>, OperandError> {
    Ok(Immediate::new(value, size)?.to_bytes())
}

/// Decodes a little-endian immediate of `size` from the front of `bytes`.
///
/// Returns the canonical value, or `None` if `bytes` is too short or `size`
/// is not an immediate size.
pub fn decode_immediate(bytes: &[u8], size: OperandSize) -> Option<i64> {
    size.immediate_range()?;
    let width = size.bytes();
    if bytes.len() < width {
        return None;
    }
    let value = match size {
        OperandSize::SignedByte => bytes[0] as i8 as i64,
        OperandSize::Byte => bytes[0] as i64,
        OperandSize::Word => u16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        _ => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
    };
    Some(value)
}

/// Segment register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segment {
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

impl Segment {
    const ALL: [Segment; 6] = [
        Segment::ES,
        Segment::CS,
        Segment::SS,
        Segment::DS,
        Segment::FS,
        Segment::GS,
    ];

    /// Returns the 3-bit selector code used in the ModR/M reg field.
    pub fn code(&self) -> u8 {
        match self {
            Self::ES => 0,
            Self::CS => 1,
            Self::SS => 2,
            Self::DS => 3,
            Self::FS => 4,
            Self::GS => 5,
        }
    }

    /// Returns the segment for a selector code (6 and 7 are reserved).
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Returns the segment-override prefix byte.
    pub fn prefix(&self) -> u8 {
        match self {
            Self::ES => 0x26,
            Self::CS => 0x2E,
            Self::SS => 0x36,
            Self::DS => 0x3E,
            Self::FS => 0x64,
            Self::GS => 0x65,
        }
    }

    /// Maps a segment-override prefix byte back to its segment.
    pub fn from_prefix(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.prefix() == byte)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ES => "es",
            Self::CS => "cs",
            Self::SS => "ss",
            Self::DS => "ds",
            Self::FS => "fs",
            Self::GS => "gs",
        }
    }
}

/// Memory reference operand: `segment:[base + index*scale + disp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Memory {
    /// Base register (if any).
    pub base: Option<Register>,
    /// Index register (if any).
    pub index: Option<Register>,
    /// Scale factor for index (1, 2, 4, or 8).
    pub scale: u8,
    /// Displacement, a signed byte or a dword.
    pub displacement: Option<Immediate>,
    /// Access size.
    pub size: OperandSize,
    /// Segment override.
    pub segment: Option<Segment>,
}

impl Memory {
    /// Creates a fully specified memory reference and checks it.
    pub fn new(
        base: Option<Register>,
        index: Option<Register>,
        scale: u8,
        displacement: Option<Immediate>,
        size: OperandSize,
    ) -> Result<Self, OperandError> {
        let mem = Self {
            base,
            index,
            scale,
            displacement,
            size,
            segment: None,
        };
        mem.validate()?;
        Ok(mem)
    }

    /// `[base]`
    pub fn base(base: Register, size: OperandSize) -> Self {
        Self {
            base: Some(base),
            index: None,
            scale: 1,
            displacement: None,
            size,
            segment: None,
        }
    }

    /// `[base + disp]`, picking an 8-bit displacement when the value fits.
    pub fn base_disp(base: Register, displacement: i32, size: OperandSize) -> Self {
        Self {
            displacement: compact_displacement(displacement),
            ..Self::base(base, size)
        }
    }

    /// `[address]`
    pub fn absolute(address: u32, size: OperandSize) -> Self {
        Self {
            base: None,
            index: None,
            scale: 1,
            displacement: Some(Immediate::dword(address)),
            size,
            segment: None,
        }
    }

    /// `[base + index*scale + disp]`
    pub fn sib(
        base: Option<Register>,
        index: Register,
        scale: u8,
        displacement: i32,
        size: OperandSize,
    ) -> Result<Self, OperandError> {
        let displacement = if base.is_none() {
            // Index without base always carries a disp32.
            Some(Immediate::dword(displacement as u32))
        } else {
            compact_displacement(displacement)
        };
        Self::new(base, Some(index), scale, displacement, size)
    }

    /// Sets the segment override.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Replaces the access size.
    pub fn with_size(mut self, size: OperandSize) -> Self {
        self.size = size;
        self
    }

    /// Pure absolute addressing: no base, no index, displacement present.
    pub fn is_absolute(&self) -> bool {
        self.base.is_none() && self.index.is_none() && self.displacement.is_some()
    }

    /// Returns the displacement as a signed 32-bit value (0 when absent).
    pub fn disp(&self) -> i32 {
        self.displacement
            .map(|d| d.as_signed() as i32)
            .unwrap_or(0)
    }

    /// Checks the addressing-form invariants.
    pub fn validate(&self) -> Result<(), OperandError> {
        if self.base.is_none() && self.index.is_none() && self.displacement.is_none() {
            return Err(OperandError::EmptyMemory);
        }
        if !matches!(self.scale, 1 | 2 | 4 | 8) {
            return Err(OperandError::InvalidScale(self.scale));
        }
        for reg in self.base.iter().chain(self.index.iter()) {
            if reg.class() != crate::RegisterClass::Gpr32 {
                return Err(OperandError::InvalidAddressRegister(*reg));
            }
        }
        if self.index == Some(Register::ESP) {
            return Err(OperandError::InvalidAddressRegister(Register::ESP));
        }
        if let Some(disp) = self.displacement {
            if !matches!(disp.size(), OperandSize::SignedByte | OperandSize::Dword) {
                return Err(OperandError::InvalidImmediateSize(disp.size()));
            }
        }
        Ok(())
    }
}

fn compact_displacement(value: i32) -> Option<Immediate> {
    if value == 0 {
        None
    } else if let Ok(byte) = i8::try_from(value) {
        Some(Immediate::signed_byte(byte))
    } else {
        Some(Immediate::dword(value as u32))
    }
}

/// Relative branch target.
///
/// Only the resolved target is stored; the encoded offset is derived from the
/// address following the containing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relative {
    /// Resolved absolute target address.
    pub target: u32,
    /// Encoded offset width (SignedByte, Word or Dword).
    pub size: OperandSize,
}

impl Relative {
    pub fn new(target: u32, size: OperandSize) -> Self {
        Self { target, size }
    }

    /// rel8 target.
    pub fn short(target: u32) -> Self {
        Self::new(target, OperandSize::SignedByte)
    }

    /// rel32 target.
    pub fn near(target: u32) -> Self {
        Self::new(target, OperandSize::Dword)
    }

    /// Builds a target from the offset read after an instruction ending at
    /// `next_address`.
    pub fn from_offset(next_address: u32, offset: i32, size: OperandSize) -> Self {
        Self::new(next_address.wrapping_add(offset as u32), size)
    }

    /// Returns the signed offset from `next_address` to the target.
    pub fn offset(&self, next_address: u32) -> i32 {
        self.target.wrapping_sub(next_address) as i32
    }
}

/// Far pointer `selector:offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Absolute {
    pub selector: u16,
    pub offset: u32,
}

impl Absolute {
    pub fn new(selector: u16, offset: u32) -> Self {
        Self { selector, offset }
    }

    /// Encoded form: offset (4 bytes) then selector (2 bytes).
    pub fn to_bytes(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..].copy_from_slice(&self.selector.to_le_bytes());
        out
    }
}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    Immediate(Immediate),
    Register(Register),
    Memory(Memory),
    Segment(Segment),
    Relative(Relative),
    Absolute(Absolute),
}

impl Operand {
    /// Creates a register operand.
    pub fn reg(reg: Register) -> Self {
        Self::Register(reg)
    }

    /// Creates a memory operand.
    pub fn mem(mem: Memory) -> Self {
        Self::Memory(mem)
    }

    pub fn imm8(value: u8) -> Self {
        Self::Immediate(Immediate::byte(value))
    }

    pub fn simm8(value: i8) -> Self {
        Self::Immediate(Immediate::signed_byte(value))
    }

    pub fn imm16(value: u16) -> Self {
        Self::Immediate(Immediate::word(value))
    }

    pub fn imm32(value: u32) -> Self {
        Self::Immediate(Immediate::dword(value))
    }

    /// Returns the width this operand carries.
    pub fn size(&self) -> OperandSize {
        match self {
            Self::Immediate(imm) => imm.size(),
            Self::Register(reg) => reg.size(),
            Self::Memory(mem) => mem.size,
            Self::Segment(_) => OperandSize::Word,
            Self::Relative(rel) => rel.size,
            Self::Absolute(_) => OperandSize::Fword,
        }
    }

    /// Returns true if this is a register operand.
    pub fn is_register(&self) -> bool {
        matches!(self, Self::Register(_))
    }

    /// Returns true if this is an immediate operand.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }

    /// Returns true if this is a memory operand.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Returns the memory reference, if any.
    pub fn as_memory(&self) -> Option<&Memory> {
        match self {
            Self::Memory(mem) => Some(mem),
            _ => None,
        }
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Self::Register(reg)
    }
}

impl From<Memory> for Operand {
    fn from(mem: Memory) -> Self {
        Self::Memory(mem)
    }
}

impl From<Immediate> for Operand {
    fn from(imm: Immediate) -> Self {
        Self::Immediate(imm)
    }
}

impl From<Segment> for Operand {
    fn from(seg: Segment) -> Self {
        Self::Segment(seg)
    }
}

impl From<Relative> for Operand {
    fn from(rel: Relative) -> Self {
        Self::Relative(rel)
    }
}

impl From<Absolute> for Operand {
    fn from(ptr: Absolute) -> Self {
        Self::Absolute(ptr)
    }
}
