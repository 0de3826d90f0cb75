#![no_main]

use libfuzzer_sys::fuzz_target;
use ia32_disasm::{Disassembler, Ia32Disassembler};

fuzz_target!(|data: &[u8]| {
    let disasm = Ia32Disassembler::new();

    // Decoding must never panic, and a decoded instruction owns exactly
    // the bytes it consumed.
    if let Ok(decoded) = disasm.decode_instruction(data, 0x1000) {
        assert!(decoded.size >= 1 && decoded.size <= data.len());
        assert_eq!(decoded.instruction.bytes().ok(), Some(&data[..decoded.size]));
        let _ = decoded.instruction.to_string();
    }

    // Whole-buffer disassembly stops at the first truncated instruction.
    let listing = disasm.disassemble(data, 0x0040_0000);
    assert!(listing.end_offset <= data.len());
    if listing.end_offset < data.len() {
        assert!(disasm.decode_instruction(&data[listing.end_offset..], 0).is_err());
    }
});
