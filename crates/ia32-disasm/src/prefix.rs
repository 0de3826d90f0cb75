//! Legacy prefix parsing.

use crate::cursor::ByteCursor;
use ia32_core::{OperandSize, RepPrefix, Segment};

/// Legacy prefixes seen before the opcode.
///
/// Built fresh for every instruction. A later prefix of the same group
/// replaces an earlier one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prefixes {
    /// LOCK prefix (0xF0)
    pub lock: bool,
    /// REP/REPE (0xF3) or REPNE (0xF2)
    pub rep: RepPrefix,
    /// Segment override
    pub segment: Option<Segment>,
    /// Operand size override (0x66)
    pub operand_size: bool,
    /// Address size override (0x67)
    pub address_size: bool,
}

impl Prefixes {
    /// Consumes prefix bytes from the cursor.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Self {
        let mut prefixes = Self::default();

        while let Some(byte) = cursor.peek() {
            match byte {
                0xF0 => prefixes.lock = true,
                0xF2 => prefixes.rep = RepPrefix::Repne,
                0xF3 => prefixes.rep = RepPrefix::Rep,
                0x66 => prefixes.operand_size = true,
                0x67 => prefixes.address_size = true,
                _ => match Segment::from_prefix(byte) {
                    Some(seg) => prefixes.segment = Some(seg),
                    None => break,
                },
            }
            // Peeked above.
            let _ = cursor.read_u8();
        }

        prefixes
    }

    /// Effective width of a word/dword operand.
    pub fn operand_size(&self) -> OperandSize {
        if self.operand_size {
            OperandSize::Word
        } else {
            OperandSize::Dword
        }
    }

    /// Mandatory prefix selecting an SSE variant. `F2` and `F3` outrank
    /// `66`.
    pub fn mandatory(&self) -> Option<u8> {
        match self.rep {
            RepPrefix::Repne => Some(0xF2),
            RepPrefix::Rep => Some(0xF3),
            RepPrefix::None if self.operand_size => Some(0x66),
            RepPrefix::None => None,
        }
    }
}
