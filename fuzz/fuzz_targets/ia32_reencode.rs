#![no_main]

use libfuzzer_sys::fuzz_target;
use ia32_core::Instruction;
use ia32_disasm::{Disassembler, Ia32Disassembler};

fuzz_target!(|data: &[u8]| {
    let disasm = Ia32Disassembler::new();
    let Ok(decoded) = disasm.decode_instruction(data, 0x1000) else {
        return;
    };
    let insn = decoded.instruction;
    if insn.is_unknown() {
        return;
    }

    // Encoding may pick a different form than the input, but whatever it
    // emits has to decode back to the same instruction.
    let mut fresh = Instruction::new(insn.mnemonic, insn.operands.clone()).at(0x1000);
    if insn.lock {
        fresh = fresh.locked();
    }
    let Ok(bytes) = fresh.encode() else {
        return;
    };
    let again = disasm
        .decode_instruction(&bytes, 0x1000)
        .expect("encoder output must decode");
    assert_eq!(again.size, bytes.len(), "{}: {:02x?}", insn, bytes);
    assert_eq!(again.instruction.mnemonic, insn.mnemonic, "{:02x?}", bytes);
    assert_eq!(again.instruction.operands, insn.operands, "{:02x?}", bytes);
});
