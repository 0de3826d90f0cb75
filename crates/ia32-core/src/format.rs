//! Intel-syntax rendering.
//!
//! Text is lowercase with operands separated by a bare comma, e.g.
//! `add dword ptr fs:[eax+ecx*4+0x10],0x1`.

use std::fmt::{self, Write as _};

use crate::{Absolute, Immediate, Instruction, Memory, Operand, OperandSize};

/// Listing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListingOptions {
    /// Print the instruction address in the first column.
    pub show_address: bool,
    /// Print the raw bytes column.
    pub show_bytes: bool,
    /// Number of bytes that fit the bytes column. Longer encodings are
    /// truncated and marked with `..`.
    pub byte_column_width: usize,
    /// Uppercase mnemonics, registers and hex digits.
    pub uppercase: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            show_address: true,
            show_bytes: true,
            byte_column_width: 8,
            uppercase: false,
        }
    }
}

/// Renders `mnemonic op1,op2,op3`.
pub fn format_instruction(insn: &Instruction) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_instruction(&mut out, insn);
    out
}

/// Renders a single operand.
pub fn format_operand(op: &Operand) -> String {
    let mut out = String::new();
    let _ = write_operand(&mut out, op);
    out
}

/// Renders one listing line: address, bytes column, instruction text.
pub fn format_listing_line(insn: &Instruction, options: &ListingOptions) -> String {
    let mut line = String::new();
    if options.show_address {
        let _ = write!(line, "{:08x}:  ", insn.address);
    }
    if options.show_bytes {
        let bytes = insn.bytes().unwrap_or(&[]);
        let width = options.byte_column_width;
        let mut column = String::with_capacity(width * 3 + 2);
        for byte in bytes.iter().take(width) {
            let _ = write!(column, "{:02x} ", byte);
        }
        if bytes.len() > width {
            column.push_str("..");
        }
        let _ = write!(line, "{:<pad$} ", column, pad = width * 3 + 2);
    }
    line.push_str(&format_instruction(insn));
    if options.uppercase {
        line = line.to_uppercase().replace("0X", "0x");
    }
    line.trim_end().to_string()
}

fn write_instruction(f: &mut impl fmt::Write, insn: &Instruction) -> fmt::Result {
    if insn.lock {
        f.write_str("lock ")?;
    }
    write!(f, "{}", insn.mnemonic)?;
    for (i, op) in insn.operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { "," })?;
        write_operand(f, op)?;
    }
    Ok(())
}

fn write_operand(f: &mut impl fmt::Write, op: &Operand) -> fmt::Result {
    match op {
        Operand::Register(reg) => f.write_str(reg.name()),
        Operand::Immediate(imm) => write_immediate(f, imm),
        Operand::Memory(mem) => write_memory(f, mem),
        Operand::Segment(seg) => f.write_str(seg.name()),
        Operand::Relative(rel) => write!(f, "{:#x}", rel.target),
        Operand::Absolute(Absolute { selector, offset }) => {
            write!(f, "{:#x}:{:#x}", selector, offset)
        }
    }
}

fn write_immediate(f: &mut impl fmt::Write, imm: &Immediate) -> fmt::Result {
    if imm.is_relative() || imm.size() == OperandSize::SignedByte {
        write_signed(f, imm.as_signed())
    } else {
        write!(f, "{:#x}", imm.value())
    }
}

fn write_signed(f: &mut impl fmt::Write, value: i64) -> fmt::Result {
    if value < 0 {
        write!(f, "-{:#x}", value.unsigned_abs())
    } else {
        write!(f, "{:#x}", value)
    }
}

fn write_memory(f: &mut impl fmt::Write, mem: &Memory) -> fmt::Result {
    let keyword = mem.size.ptr_annotation();
    if !keyword.is_empty() {
        write!(f, "{} ", keyword)?;
    }
    if let Some(seg) = mem.segment {
        write!(f, "{}:", seg.name())?;
    }
    f.write_char('[')?;
    let mut has_register = false;
    if let Some(base) = mem.base {
        f.write_str(base.name())?;
        has_register = true;
    }
    if let Some(index) = mem.index {
        if has_register {
            f.write_char('+')?;
        }
        f.write_str(index.name())?;
        // Without a base, `*1` tells `[ebp*1]` apart from `[ebp]`.
        if mem.scale > 1 || mem.base.is_none() {
            write!(f, "*{}", mem.scale)?;
        }
        has_register = true;
    }
    match mem.displacement {
        // A bare displacement is an address.
        Some(disp) if !has_register => write!(f, "{:#x}", disp.as_signed() as u32)?,
        Some(disp) => {
            let value = disp.as_signed();
            if value < 0 {
                write!(f, "-{:#x}", value.unsigned_abs())?;
            } else {
                write!(f, "+{:#x}", value)?;
            }
        }
        None => {}
    }
    f.write_char(']')
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operand(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mnemonic, Register, Relative, Segment};

    #[test]
    fn test_memory_rendering() {
        let mem = Memory::sib(Some(Register::EAX), Register::ECX, 4, 0x10, OperandSize::Dword)
            .unwrap()
            .with_segment(Segment::FS);
        assert_eq!(format_operand(&mem.into()), "dword ptr fs:[eax+ecx*4+0x10]");

        let neg = Memory::base_disp(Register::EBP, -8, OperandSize::Byte);
        assert_eq!(format_operand(&neg.into()), "byte ptr [ebp-0x8]");

        let abs = Memory::absolute(0x0040_2000, OperandSize::Word);
        assert_eq!(format_operand(&abs.into()), "word ptr [0x402000]");

        let index_only = Memory::sib(None, Register::EBP, 1, 0, OperandSize::Dword).unwrap();
        assert_eq!(format_operand(&index_only.into()), "dword ptr [ebp*1+0x0]");

        let lea_src = Memory::base(Register::ESI, OperandSize::None);
        assert_eq!(format_operand(&lea_src.into()), "[esi]");
    }

    #[test]
    fn test_immediates() {
        assert_eq!(format_operand(&Operand::imm32(0x1234)), "0x1234");
        assert_eq!(format_operand(&Operand::simm8(-1)), "-0x1");
        assert_eq!(format_operand(&Operand::imm8(0xFF)), "0xff");
        let rel = Immediate::dword(0xFFFF_FFF0).relative();
        assert_eq!(format_operand(&rel.into()), "-0x10");
    }

    #[test]
    fn test_branch_and_far_pointer() {
        assert_eq!(format_operand(&Relative::near(0x401000).into()), "0x401000");
        assert_eq!(format_operand(&Absolute::new(0x1234, 0x5678).into()), "0x1234:0x5678");
    }

    #[test]
    fn test_instruction_text() {
        let insn = Instruction::new(
            Mnemonic::Add { carry: false },
            vec![
                Memory::base(Register::EBX, OperandSize::Dword).into(),
                Operand::reg(Register::EAX),
            ],
        )
        .locked();
        assert_eq!(insn.to_string(), "lock add dword ptr [ebx],eax");
        assert_eq!(Instruction::new(Mnemonic::Nop, vec![]).to_string(), "nop");
    }

    #[test]
    fn test_listing_line() {
        let insn = Instruction::new(
            Mnemonic::Mov,
            vec![Operand::reg(Register::EAX), Operand::imm32(0x12345678)],
        )
        .at(0x1000);
        let line = format_listing_line(&insn, &ListingOptions::default());
        assert_eq!(
            line,
            "00001000:  b8 78 56 34 12             mov eax,0x12345678"
        );

        let narrow = ListingOptions {
            show_address: false,
            byte_column_width: 2,
            uppercase: true,
            ..ListingOptions::default()
        };
        assert_eq!(format_listing_line(&insn, &narrow), "B8 78 .. MOV EAX,0x12345678");
    }
}
