//! Privileged and processor-identification instructions.

use super::general::fixed;
use super::{rm_size, Encoder};
use crate::error::EncodeError;
use crate::{Mnemonic, Operand, OperandSize, RegisterClass};

pub(crate) fn encode(e: &mut Encoder<'_>) -> Result<(), EncodeError> {
    use Mnemonic::*;

    match e.mnemonic() {
        Hlt => fixed(e, &[0xF4]),
        Sldt => descriptor_word(e, 0x00, 0),
        Str => descriptor_word(e, 0x00, 1),
        Lldt => descriptor_word(e, 0x00, 2),
        Ltr => descriptor_word(e, 0x00, 3),
        Verr => descriptor_word(e, 0x00, 4),
        Verw => descriptor_word(e, 0x00, 5),
        Sgdt => table_register(e, 0),
        Sidt => table_register(e, 1),
        Lgdt => table_register(e, 2),
        Lidt => table_register(e, 3),
        Smsw => descriptor_word(e, 0x01, 4),
        Lmsw => descriptor_word(e, 0x01, 6),
        Invlpg => match e.operands() {
            [op @ Operand::Memory(_)] => {
                e.opcode(&[0x0F, 0x01]);
                e.modrm(7, op)
            }
            _ => Err(e.unsupported()),
        },
        Lar => access_rights(e, 0x02),
        Lsl => access_rights(e, 0x03),
        Clts => fixed(e, &[0x0F, 0x06]),
        Invd => fixed(e, &[0x0F, 0x08]),
        Wbinvd => fixed(e, &[0x0F, 0x09]),
        Ud2 => fixed(e, &[0x0F, 0x0B]),
        Wrmsr => fixed(e, &[0x0F, 0x30]),
        Rdtsc => fixed(e, &[0x0F, 0x31]),
        Rdmsr => fixed(e, &[0x0F, 0x32]),
        Rdpmc => fixed(e, &[0x0F, 0x33]),
        Sysenter => fixed(e, &[0x0F, 0x34]),
        Sysexit => fixed(e, &[0x0F, 0x35]),
        Cpuid => fixed(e, &[0x0F, 0xA2]),
        Rsm => fixed(e, &[0x0F, 0xAA]),
        _ => Err(e.unsupported()),
    }
}

/// `0F 00 /sel` and the word forms of `0F 01`: a 16-bit register or a word
/// in memory.
fn descriptor_word(e: &mut Encoder<'_>, opcode: u8, sel: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [op] if rm_size(op) == Some(OperandSize::Word) => {
            e.opcode(&[0x0F, opcode]);
            e.modrm(sel, op)
        }
        _ => Err(e.unsupported()),
    }
}

/// SGDT/SIDT/LGDT/LIDT take a 6-byte pseudo-descriptor.
fn table_register(e: &mut Encoder<'_>, sel: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [op @ Operand::Memory(mem)] if mem.size == OperandSize::Fword => {
            e.opcode(&[0x0F, 0x01]);
            e.modrm(sel, op)
        }
        _ => Err(e.unsupported()),
    }
}

/// LAR/LSL: `reg, r/m16`.
fn access_rights(e: &mut Encoder<'_>, opcode: u8) -> Result<(), EncodeError> {
    match e.operands() {
        [Operand::Register(dst), src]
            if matches!(dst.class(), RegisterClass::Gpr16 | RegisterClass::Gpr32)
                && rm_size(src) == Some(OperandSize::Word) =>
        {
            e.size(dst.size());
            e.opcode(&[0x0F, opcode]);
            e.modrm_reg(*dst, src)
        }
        _ => Err(e.unsupported()),
    }
}
