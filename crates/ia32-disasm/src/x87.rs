//! x87 FPU escape opcodes (`D8`-`DF`).
//!
//! Decoding reads the same tables the encoder uses, so both directions
//! agree on every form.

use crate::cursor::Fault;
use crate::decoder::{Decoded, Reader};
use ia32_core::encode::x87::{memory_form, register_form, StackShape};
use ia32_core::{Mnemonic, ModRm, Register};

pub(crate) fn decode(r: &mut Reader<'_>, escape: u8) -> Result<Decoded, Fault> {
    let byte = r.cursor.read_u8()?;
    let modrm = ModRm::from_byte(byte);

    if !modrm.is_register() {
        let form = memory_form(escape, modrm.reg).ok_or(Fault::Unknown)?;
        let mem = r.memory(modrm, form.size)?;
        return Ok((form.mnemonic, vec![mem.into()]));
    }

    if let Some(m) = Mnemonic::from_x87_nullary(escape, byte) {
        return Ok((m, vec![]));
    }
    if escape == 0xDF && byte == 0xE0 {
        return Ok((Mnemonic::Fstsw, vec![Register::AX.into()]));
    }

    let form = register_form(escape, byte).ok_or(Fault::Unknown)?;
    let st = Register::st(modrm.rm).into();
    let operands = match form.shape {
        StackShape::Single => vec![st],
        StackShape::ToTop => vec![Register::ST0.into(), st],
        StackShape::FromTop => vec![st, Register::ST0.into()],
    };
    Ok((form.mnemonic, operands))
}

#[cfg(test)]
mod tests {
    use crate::{Disassembler, Ia32Disassembler};

    fn text(bytes: &[u8]) -> String {
        let decoded = Ia32Disassembler::new().decode_instruction(bytes, 0).unwrap();
        assert_eq!(decoded.size, bytes.len());
        decoded.instruction.to_string()
    }

    #[test]
    fn test_memory_forms() {
        assert_eq!(text(&[0xD9, 0x45, 0x08]), "fld dword ptr [ebp+0x8]");
        assert_eq!(text(&[0xDD, 0x1C, 0x24]), "fstp qword ptr [esp]");
        assert_eq!(text(&[0xDB, 0x28]), "fld tbyte ptr [eax]");
        assert_eq!(text(&[0xD9, 0x7D, 0xFE]), "fnstcw word ptr [ebp-0x2]");
    }

    #[test]
    fn test_register_forms() {
        assert_eq!(text(&[0xD8, 0xC3]), "fadd st(0),st(3)");
        assert_eq!(text(&[0xDE, 0xE9]), "fsubp st(1),st(0)");
        assert_eq!(text(&[0xD9, 0xCA]), "fxch st(2)");
        assert_eq!(text(&[0xDB, 0xF1]), "fcomi st(0),st(1)");
    }

    #[test]
    fn test_nullary_and_status_word() {
        assert_eq!(text(&[0xD9, 0xE8]), "fld1");
        assert_eq!(text(&[0xDE, 0xD9]), "fcompp");
        assert_eq!(text(&[0xDF, 0xE0]), "fnstsw ax");
        assert_eq!(text(&[0xD9, 0xFE]), "fsin");
    }

    #[test]
    fn test_holes_are_unknown() {
        let decoded = Ia32Disassembler::new()
            .decode_instruction(&[0xD9, 0xD8], 0)
            .unwrap();
        assert!(decoded.instruction.is_unknown());
        assert_eq!(decoded.size, 2);
    }
}
