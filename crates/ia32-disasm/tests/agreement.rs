//! Encoder/decoder agreement.
//!
//! Instructions built in code must decode back to themselves, and decoded
//! instructions rebuilt without their pinned bytes must decode to the same
//! mnemonic and operands again.

use proptest::prelude::*;

use ia32_core::encode::simd::PACKED_INT_FORMS;
use ia32_core::encode::x87::{StackShape, X87_MEMORY_FORMS, X87_REGISTER_FORMS};
use ia32_core::{
    Condition, Immediate, Instruction, Memory, Mnemonic, Operand, OperandSize, Register,
    RegisterClass, Relative, RepPrefix, Segment, ShiftOp, SseArithOp,
};
use ia32_disasm::{Disassembler, Ia32Disassembler};

const ADDRESS: u32 = 0x0040_1000;

/// Encodes `insn`, decodes the bytes and checks the result matches.
fn assert_agrees(insn: &Instruction) -> Result<(), TestCaseError> {
    let bytes = insn
        .encode()
        .map_err(|e| TestCaseError::fail(format!("{} does not encode: {}", insn, e)))?;
    let decoded = Ia32Disassembler::new()
        .decode_instruction(&bytes, insn.address)
        .map_err(|e| TestCaseError::fail(format!("{:02x?}: {}", bytes, e)))?;
    prop_assert_eq!(decoded.size, bytes.len(), "{:02x?}", bytes);
    prop_assert_eq!(decoded.instruction.mnemonic, insn.mnemonic, "{:02x?}", bytes);
    prop_assert_eq!(&decoded.instruction.operands, &insn.operands, "{:02x?}", bytes);
    prop_assert_eq!(decoded.instruction.lock, insn.lock);
    Ok(())
}

// =============================================================================
// Strategies
// =============================================================================

fn gpr(class: RegisterClass) -> impl Strategy<Value = Register> {
    (0u8..8).prop_map(move |code| Register::from_field(class, code))
}

fn gpr32() -> impl Strategy<Value = Register> {
    gpr(RegisterClass::Gpr32)
}

fn displacement() -> impl Strategy<Value = Option<Immediate>> {
    prop_oneof![
        Just(None),
        any::<i8>().prop_map(|d| Some(Immediate::signed_byte(d))),
        any::<u32>().prop_map(|d| Some(Immediate::dword(d))),
    ]
}

fn segment() -> impl Strategy<Value = Option<Segment>> {
    prop_oneof![
        4 => Just(None),
        1 => prop::sample::select(vec![
            Segment::ES, Segment::CS, Segment::SS, Segment::DS, Segment::FS, Segment::GS,
        ])
        .prop_map(Some),
    ]
}

/// Memory operands in the shape the decoder produces: `[ebp]` always
/// carries its disp8, and a missing base always means disp32.
fn memory(size: OperandSize) -> impl Strategy<Value = Memory> {
    let based = (
        gpr32(),
        prop::option::of((0u8..8).prop_filter("esp is not an index", |c| *c != 4)),
        prop::sample::select(vec![1u8, 2, 4, 8]),
        displacement(),
    )
        .prop_map(move |(base, index, scale, disp)| {
            let disp = match disp {
                None if base == Register::EBP => Some(Immediate::signed_byte(0)),
                d => d,
            };
            Memory {
                base: Some(base),
                index: index.map(|c| Register::from_field(RegisterClass::Gpr32, c)),
                scale: if index.is_some() { scale } else { 1 },
                displacement: disp,
                size,
                segment: None,
            }
        });
    let absolute = any::<u32>().prop_map(move |addr| Memory::absolute(addr, size));
    (prop_oneof![3 => based, 1 => absolute], segment()).prop_map(|(mut mem, seg)| {
        mem.segment = seg;
        mem
    })
}

fn alu_mnemonic() -> impl Strategy<Value = Mnemonic> {
    (0u8..8).prop_map(Mnemonic::from_alu_selector)
}

fn alu() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (alu_mnemonic(), gpr32(), gpr32())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), b.into()])),
        (alu_mnemonic(), memory(OperandSize::Dword), gpr32())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), b.into()])),
        (alu_mnemonic(), gpr32(), memory(OperandSize::Dword))
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), b.into()])),
        (alu_mnemonic(), gpr(RegisterClass::Gpr8), any::<u8>())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), Operand::imm8(b)])),
        (alu_mnemonic(), gpr(RegisterClass::Gpr16), any::<u16>())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), Operand::imm16(b)])),
        (alu_mnemonic(), memory(OperandSize::Dword), any::<i8>())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), Operand::simm8(b)])),
        (alu_mnemonic(), memory(OperandSize::Dword), any::<u32>())
            .prop_map(|(m, a, b)| Instruction::new(m, vec![a.into(), Operand::imm32(b)])),
    ]
}

fn moves() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (gpr32(), any::<u32>())
            .prop_map(|(r, v)| Instruction::new(Mnemonic::Mov, vec![r.into(), Operand::imm32(v)])),
        (memory(OperandSize::Word), gpr(RegisterClass::Gpr16))
            .prop_map(|(m, r)| Instruction::new(Mnemonic::Mov, vec![m.into(), r.into()])),
        (gpr(RegisterClass::Gpr8), memory(OperandSize::Byte))
            .prop_map(|(r, m)| Instruction::new(Mnemonic::Mov, vec![r.into(), m.into()])),
        (gpr32(), memory(OperandSize::None))
            .prop_map(|(r, m)| Instruction::new(Mnemonic::Lea, vec![r.into(), m.into()])),
        (gpr32(), memory(OperandSize::Byte)).prop_map(|(r, m)| {
            Instruction::new(Mnemonic::MovExtend { signed: true }, vec![r.into(), m.into()])
        }),
        gpr32().prop_map(|r| Instruction::new(Mnemonic::Push, vec![r.into()])),
        memory(OperandSize::Dword).prop_map(|m| Instruction::new(Mnemonic::Pop, vec![m.into()])),
    ]
}

fn shifts() -> impl Strategy<Value = Instruction> {
    let op = (0u8..8)
        .prop_filter("/6 is not a shift", |s| *s != 6)
        .prop_map(|s| Mnemonic::Shift(ShiftOp::from_selector(s)));
    prop_oneof![
        (op.clone(), gpr32(), 2u8..32)
            .prop_map(|(m, r, n)| Instruction::new(m, vec![r.into(), Operand::imm8(n)])),
        (op.clone(), memory(OperandSize::Word))
            .prop_map(|(m, mem)| Instruction::new(m, vec![mem.into(), Register::CL.into()])),
        (op, gpr(RegisterClass::Gpr8))
            .prop_map(|(m, r)| Instruction::new(m, vec![r.into(), Operand::imm8(1)])),
    ]
}

fn branches() -> impl Strategy<Value = Instruction> {
    let short = -100i32..100;
    prop_oneof![
        (0u8..16, short.clone()).prop_map(|(cc, off)| {
            let target = ADDRESS.wrapping_add(2).wrapping_add(off as u32);
            Instruction::new(Mnemonic::Jcc(Condition::from_code(cc)), vec![Relative::short(target).into()])
        }),
        (0u8..16, any::<i32>()).prop_map(|(cc, off)| {
            let target = ADDRESS.wrapping_add(6).wrapping_add(off as u32);
            Instruction::new(Mnemonic::Jcc(Condition::from_code(cc)), vec![Relative::near(target).into()])
        }),
        any::<i32>().prop_map(|off| {
            let target = ADDRESS.wrapping_add(5).wrapping_add(off as u32);
            Instruction::new(Mnemonic::Call, vec![Relative::near(target).into()])
        }),
        short.prop_map(|off| {
            let target = ADDRESS.wrapping_add(2).wrapping_add(off as u32);
            Instruction::new(Mnemonic::Jmp, vec![Relative::short(target).into()])
        }),
        memory(OperandSize::Dword).prop_map(|m| Instruction::new(Mnemonic::Jmp, vec![m.into()])),
    ]
}

fn sse_arith() -> impl Strategy<Value = Instruction> {
    let ops = vec![
        SseArithOp::Sqrt,
        SseArithOp::Rsqrt,
        SseArithOp::Rcp,
        SseArithOp::Add,
        SseArithOp::Mul,
        SseArithOp::Sub,
        SseArithOp::Min,
        SseArithOp::Div,
        SseArithOp::Max,
    ];
    (prop::sample::select(ops), any::<bool>(), any::<bool>(), 0u8..8)
        .prop_filter("no double form", |(op, _, double, _)| !*double || op.has_double())
        .prop_flat_map(|(op, packed, double, dst)| {
            let size = match (packed, double) {
                (true, _) => OperandSize::Xmm,
                (false, false) => OperandSize::Dword,
                (false, true) => OperandSize::Qword,
            };
            let src = prop_oneof![
                (0u8..8).prop_map(|n| Operand::from(Register::xmm(n))),
                memory(size).prop_map(Operand::from),
            ];
            src.prop_map(move |src| {
                Instruction::new(
                    Mnemonic::SseArith { op, packed, double },
                    vec![Register::xmm(dst).into(), src],
                )
            })
        })
}

fn packed_integer() -> impl Strategy<Value = Instruction> {
    (0..PACKED_INT_FORMS.len(), any::<bool>(), 0u8..8, 0u8..8).prop_map(|(i, xmm, d, s)| {
        let form = &PACKED_INT_FORMS[i];
        let reg: fn(u8) -> Register = if xmm || form.xmm_only { Register::xmm } else { Register::mm };
        Instruction::new(form.mnemonic, vec![reg(d).into(), reg(s).into()])
    })
}

fn x87() -> impl Strategy<Value = Instruction> {
    let memory_form = (0..X87_MEMORY_FORMS.len())
        .prop_flat_map(|i| {
            let form = &X87_MEMORY_FORMS[i];
            memory(form.size).prop_map(move |m| Instruction::new(form.mnemonic, vec![m.into()]))
        });
    let register_form = (0..X87_REGISTER_FORMS.len(), 0u8..8).prop_map(|(i, n)| {
        let form = &X87_REGISTER_FORMS[i];
        let st = Operand::from(Register::st(n));
        let operands = match form.shape {
            StackShape::Single => vec![st],
            StackShape::ToTop => vec![Register::ST0.into(), st],
            StackShape::FromTop => vec![st, Register::ST0.into()],
        };
        Instruction::new(form.mnemonic, operands)
    });
    prop_oneof![memory_form, register_form]
}

fn any_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![alu(), moves(), shifts(), branches(), sse_arith(), packed_integer(), x87()]
        .prop_map(|insn| insn.at(ADDRESS))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn encoded_instructions_decode_back(insn in any_instruction()) {
        assert_agrees(&insn)?;
    }

    #[test]
    fn locked_memory_operations_keep_lock(
        m in alu_mnemonic(),
        mem in memory(OperandSize::Dword),
        reg in gpr32()
    ) {
        let insn = Instruction::new(m, vec![mem.into(), reg.into()]).locked();
        assert_agrees(&insn)?;
    }

    /// Re-encoding a decoded instruction without its pinned bytes may pick a
    /// different but equivalent form; decoding that form must agree.
    #[test]
    fn decoded_instructions_re_encode(bytes in prop::collection::vec(any::<u8>(), 1..16)) {
        let disasm = Ia32Disassembler::new();
        if let Ok(decoded) = disasm.decode_instruction(&bytes, ADDRESS) {
            let insn = decoded.instruction;
            if !insn.is_unknown() {
                let mut fresh = Instruction::new(insn.mnemonic, insn.operands.clone()).at(ADDRESS);
                if insn.lock {
                    fresh = fresh.locked();
                }
                // Not every decodable operand combination has an encode rule.
                if fresh.encode().is_ok() {
                    assert_agrees(&fresh)?;
                }
            }
        }
    }
}

#[test]
fn string_instructions_keep_rep() {
    let sizes = [OperandSize::Byte, OperandSize::Word, OperandSize::Dword];
    let reps = [RepPrefix::None, RepPrefix::Rep, RepPrefix::Repne];
    for size in sizes {
        for rep in reps {
            for m in [
                Mnemonic::Movs { size, rep },
                Mnemonic::Cmps { size, rep },
                Mnemonic::Scas { size, rep },
                Mnemonic::Lods { size, rep },
                Mnemonic::Stos { size, rep },
                Mnemonic::Ins { size, rep },
                Mnemonic::Outs { size, rep },
            ] {
                let insn = Instruction::new(m, vec![]);
                assert_agrees(&insn).unwrap();
            }
        }
    }
}

#[test]
fn system_and_state_instructions_agree() {
    let mem = |size| Operand::from(Memory::base(Register::EAX, size));
    let cases = vec![
        Instruction::new(Mnemonic::Lgdt, vec![mem(OperandSize::Fword)]),
        Instruction::new(Mnemonic::Ltr, vec![Register::AX.into()]),
        Instruction::new(Mnemonic::Mov, vec![Register::EAX.into(), Register::cr(3).into()]),
        Instruction::new(Mnemonic::Mov, vec![Register::dr(7).into(), Register::ECX.into()]),
        Instruction::new(Mnemonic::Mov, vec![Segment::DS.into(), Register::EAX.into()]),
        Instruction::new(Mnemonic::Push, vec![Segment::GS.into()]),
        Instruction::new(Mnemonic::Cpuid, vec![]),
        Instruction::new(Mnemonic::Cmpxchg8b, vec![mem(OperandSize::Qword)]),
        Instruction::new(Mnemonic::Fxsave, vec![mem(OperandSize::None)]),
        Instruction::new(Mnemonic::Stmxcsr, vec![mem(OperandSize::Dword)]),
        Instruction::new(Mnemonic::Fstsw, vec![Register::AX.into()]),
        Instruction::new(Mnemonic::Aam, vec![]),
        Instruction::new(Mnemonic::Aad, vec![Operand::imm8(16)]),
        Instruction::new(Mnemonic::Xchg, vec![Register::EAX.into(), Register::EAX.into()]),
        Instruction::new(Mnemonic::Pause, vec![]),
    ];
    for insn in &cases {
        assert_agrees(insn).unwrap();
    }
}

/// Decodes `bytes` and, unless the result is unknown, requires the decoded
/// mnemonic and operands to encode and decode back unchanged.
fn assert_decoded_encodes(bytes: &[u8]) {
    let Ok(decoded) = Ia32Disassembler::new().decode_instruction(bytes, ADDRESS) else {
        return;
    };
    let insn = decoded.instruction;
    if insn.is_unknown() {
        return;
    }
    let fresh = Instruction::new(insn.mnemonic, insn.operands.clone()).at(ADDRESS);
    if let Err(e) = fresh.encode() {
        panic!("{:02x?} decodes to {} which does not encode: {}", bytes, insn, e);
    }
    assert_agrees(&fresh).unwrap_or_else(|e| panic!("{:02x?}: {}", bytes, e));
}

const PREFIX_SETS: [&[u8]; 4] = [&[], &[0x66], &[0xF2], &[0xF3]];

#[test]
fn every_x87_form_encodes() {
    for prefixes in PREFIX_SETS {
        for escape in 0xD8u8..=0xDF {
            for modrm in 0u8..=255 {
                let mut bytes = prefixes.to_vec();
                bytes.extend_from_slice(&[escape, modrm, 0x25, 0x00, 0x10, 0x00, 0x00]);
                assert_decoded_encodes(&bytes);
            }
        }
    }
}

#[test]
fn operand_size_forms_encode() {
    let one_byte = [
        0x06u8, 0x07, 0x0E, 0x16, 0x17, 0x1E, 0x1F, 0x62, 0x63, 0x68, 0x6A, 0x8C, 0x8E, 0xC2,
        0xC3, 0xC4, 0xC5, 0xC8, 0xC9, 0xCA, 0xCB, 0xCF, 0xFF,
    ];
    let two_byte = [0xA0u8, 0xA1, 0xA8, 0xA9, 0xB2, 0xB4, 0xB5, 0xB6, 0xB7, 0xBE, 0xBF];
    for prefixes in [&[][..], &[0x66u8][..]] {
        for modrm in 0u8..=255 {
            let tail = [modrm, 0x25, 0x00, 0x10, 0x00, 0x00, 0x00];
            for opcode in one_byte {
                let mut bytes = prefixes.to_vec();
                bytes.push(opcode);
                bytes.extend_from_slice(&tail);
                assert_decoded_encodes(&bytes);
            }
            for opcode in two_byte {
                let mut bytes = prefixes.to_vec();
                bytes.extend_from_slice(&[0x0F, opcode]);
                bytes.extend_from_slice(&tail);
                assert_decoded_encodes(&bytes);
            }
        }
    }
}

#[test]
fn word_pointer_pairs_agree() {
    let mem = |size| Operand::from(Memory::base(Register::ESI, size));
    let cases = vec![
        Instruction::new(Mnemonic::Bound, vec![Register::AX.into(), mem(OperandSize::Dword)]),
        Instruction::new(Mnemonic::Bound, vec![Register::EDX.into(), mem(OperandSize::Qword)]),
        Instruction::new(
            Mnemonic::LoadFarPointer(Segment::SS),
            vec![Register::SP.into(), mem(OperandSize::Dword)],
        ),
        Instruction::new(Mnemonic::Push, vec![Operand::imm16(0x1234)]),
    ];
    for insn in &cases {
        assert_agrees(insn).unwrap();
    }
}
