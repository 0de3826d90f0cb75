//! Property-based tests for the IA-32 decoder.
//!
//! These tests verify invariants that hold for every byte sequence:
//! - Decoding never panics on arbitrary input
//! - Decoded instruction size is within valid bounds
//! - Decoded instructions keep the exact bytes they were read from
//! - Deterministic decoding (same input → same output)
//! - Every strict prefix of an instruction is reported as truncated

use proptest::prelude::*;

use ia32_disasm::{DecodeError, Disassembler, Ia32Disassembler};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10000))]

    /// Decoding arbitrary bytes should never panic.
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let disasm = Ia32Disassembler::new();
        let _ = disasm.decode_instruction(&bytes, 0x1000);
    }

    /// Successfully decoded instructions have valid size.
    #[test]
    fn decoded_size_is_valid(bytes in prop::collection::vec(any::<u8>(), 1..32)) {
        let disasm = Ia32Disassembler::new();
        if let Ok(decoded) = disasm.decode_instruction(&bytes, 0x1000) {
            prop_assert!(decoded.size >= 1, "Instruction size must be at least 1");
            prop_assert!(decoded.size <= bytes.len(), "Instruction size cannot exceed input length");
        }
    }

    /// The instruction keeps the bytes it consumed, never a re-encoding.
    #[test]
    fn decoded_bytes_are_pinned(bytes in prop::collection::vec(any::<u8>(), 1..32)) {
        let disasm = Ia32Disassembler::new();
        if let Ok(decoded) = disasm.decode_instruction(&bytes, 0x1000) {
            let pinned = decoded.instruction.bytes();
            prop_assert_eq!(pinned.ok(), Some(&bytes[..decoded.size]));
        }
    }

    /// Decoding is deterministic: same input always produces same output.
    #[test]
    fn decode_is_deterministic(bytes in prop::collection::vec(any::<u8>(), 1..32)) {
        let disasm = Ia32Disassembler::new();
        let result1 = disasm.decode_instruction(&bytes, 0x1000);
        let result2 = disasm.decode_instruction(&bytes, 0x1000);
        prop_assert_eq!(result1, result2);
    }

    /// Successfully decoded instructions have valid address.
    #[test]
    fn decoded_address_matches(
        bytes in prop::collection::vec(any::<u8>(), 1..32),
        addr in any::<u32>()
    ) {
        let disasm = Ia32Disassembler::new();
        if let Ok(decoded) = disasm.decode_instruction(&bytes, addr) {
            prop_assert_eq!(decoded.instruction.address, addr);
        }
    }

    /// The only failure is running out of input.
    #[test]
    fn errors_are_truncation(
        bytes in prop::collection::vec(any::<u8>(), 0..32),
        addr in any::<u32>()
    ) {
        let disasm = Ia32Disassembler::new();
        if let Err(err) = disasm.decode_instruction(&bytes, addr) {
            let DecodeError::Truncated { address, needed, available } = err;
            prop_assert_eq!(address, addr);
            prop_assert_eq!(available, bytes.len());
            prop_assert!(needed > available);
        }
    }

    /// Cutting an instruction short anywhere leaves a truncated instruction.
    #[test]
    fn strict_prefixes_are_truncated(bytes in prop::collection::vec(any::<u8>(), 1..32)) {
        let disasm = Ia32Disassembler::new();
        if let Ok(decoded) = disasm.decode_instruction(&bytes, 0x1000) {
            for len in 0..decoded.size {
                let result = disasm.decode_instruction(&bytes[..len], 0x1000);
                prop_assert!(
                    matches!(result, Err(DecodeError::Truncated { .. })),
                    "{:02x?} decoded from {} of {} bytes",
                    &bytes[..len],
                    len,
                    decoded.size
                );
            }
        }
    }

    /// Sequential decoding covers all bytes (no gaps or overlaps).
    #[test]
    fn sequential_decode_covers_all_bytes(bytes in prop::collection::vec(any::<u8>(), 16..128)) {
        let disasm = Ia32Disassembler::new();
        let mut offset = 0;
        let mut covered = vec![false; bytes.len()];

        while offset < bytes.len() {
            match disasm.decode_instruction(&bytes[offset..], 0x1000 + offset as u32) {
                Ok(inst) => {
                    prop_assert!(inst.size > 0, "Decoded size must be positive");
                    for (i, covered_byte) in covered[offset..offset + inst.size].iter_mut().enumerate() {
                        prop_assert!(!*covered_byte, "Byte {} covered twice", offset + i);
                        *covered_byte = true;
                    }
                    offset += inst.size;
                }
                Err(_) => {
                    covered[offset] = true;
                    offset += 1;
                }
            }
        }

        for (i, &c) in covered.iter().enumerate() {
            prop_assert!(c, "Byte {} was not covered", i);
        }
    }

    /// Whole-buffer disassembly stops exactly where decoding first fails.
    #[test]
    fn disassemble_end_offset(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let disasm = Ia32Disassembler::new();
        let listing = disasm.disassemble(&bytes, 0x0040_0000);
        let consumed: usize = listing
            .instructions
            .iter()
            .map(|insn| insn.bytes().map_or(0, |b| b.len()))
            .sum();
        prop_assert_eq!(consumed, listing.end_offset);
        prop_assert!(listing.end_offset <= bytes.len());
        if listing.end_offset < bytes.len() {
            prop_assert!(disasm.decode_instruction(&bytes[listing.end_offset..], 0).is_err());
        }
    }
}

// =============================================================================
// Specific Instruction Pattern Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Any mix of legacy prefixes in front of an opcode should not crash.
    #[test]
    fn prefix_handling(
        prefixes in prop::collection::vec(
            prop::sample::select(vec![0x26u8, 0x2E, 0x36, 0x3E, 0x64, 0x65, 0x66, 0x67, 0xF0, 0xF2, 0xF3]),
            0..5
        ),
        opcode in any::<u8>(),
        rest in prop::collection::vec(any::<u8>(), 0..8)
    ) {
        let disasm = Ia32Disassembler::new();
        let mut bytes = prefixes.clone();
        bytes.push(opcode);
        bytes.extend_from_slice(&rest);
        if let Ok(decoded) = disasm.decode_instruction(&bytes, 0x1000) {
            prop_assert!(decoded.size > prefixes.len());
        }
    }

    /// Two-byte escape sequences should not crash.
    #[test]
    fn escape_sequences(
        mandatory in prop::sample::select(vec![None, Some(0x66u8), Some(0xF2), Some(0xF3)]),
        opcode in any::<u8>(),
        modrm in any::<u8>(),
        extra in prop::collection::vec(any::<u8>(), 0..6)
    ) {
        let disasm = Ia32Disassembler::new();
        let mut bytes: Vec<u8> = mandatory.into_iter().collect();
        bytes.extend_from_slice(&[0x0F, opcode, modrm]);
        bytes.extend_from_slice(&extra);
        let _ = disasm.decode_instruction(&bytes, 0x1000);
    }

    /// x87 escapes: every ModR/M byte either decodes or is unknown.
    #[test]
    fn x87_escapes(escape in 0xD8u8..=0xDF, modrm in any::<u8>(), disp in any::<[u8; 5]>()) {
        let disasm = Ia32Disassembler::new();
        let mut bytes = vec![escape, modrm];
        bytes.extend_from_slice(&disp);
        let decoded = disasm.decode_instruction(&bytes, 0x1000);
        prop_assert!(decoded.is_ok());
    }
}
