//! Benchmarks for decoding and encoding performance.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ia32_disasm::{Disassembler, Ia32Disassembler};

/// Sample IA-32 code: a small cdecl function with a mix of integer,
/// control flow, x87 and SSE instructions.
const IA32_CODE: &[u8] = &[
    // Function prologue
    0x55, // push ebp
    0x89, 0xe5, // mov ebp, esp
    0x83, 0xec, 0x10, // sub esp, 0x10
    // Some arithmetic
    0x8b, 0x45, 0x08, // mov eax, [ebp+8]
    0x83, 0xc0, 0x01, // add eax, 1
    0x89, 0x45, 0xfc, // mov [ebp-4], eax
    // Conditional
    0x83, 0x7d, 0xfc, 0x0a, // cmp dword [ebp-4], 10
    0x7e, 0x07, // jle .L1
    0xb8, 0x01, 0x00, 0x00, 0x00, // mov eax, 1
    0xeb, 0x05, // jmp .L2
    // .L1:
    0xb8, 0x00, 0x00, 0x00, 0x00, // mov eax, 0
    // .L2: floating point
    0xd9, 0x45, 0x08, // fld dword [ebp+8]
    0xf3, 0x0f, 0x58, 0xc1, // addss xmm0, xmm1
    0x8d, 0x04, 0x8d, 0x00, 0x00, 0x00, 0x00, // lea eax, [ecx*4+0]
    // Epilogue
    0xc9, // leave
    0xc3, // ret
];

/// Larger code block for throughput testing (repeated pattern).
fn generate_large_ia32_block(size: usize) -> Vec<u8> {
    let pattern = IA32_CODE;
    let mut result = Vec::with_capacity(size);
    while result.len() < size {
        let remaining = size - result.len();
        let to_copy = remaining.min(pattern.len());
        result.extend_from_slice(&pattern[..to_copy]);
    }
    result
}

fn bench_ia32_disassembly(c: &mut Criterion) {
    let disasm = Ia32Disassembler::new();

    let mut group = c.benchmark_group("ia32_disassembly");

    group.bench_function("single_instruction", |b| {
        b.iter(|| {
            let _ = disasm.decode_instruction(black_box(&IA32_CODE[6..9]), 0x1000);
        })
    });

    group.bench_function("small_function", |b| {
        b.iter(|| {
            let _ = disasm.disassemble_block(black_box(IA32_CODE), 0x1000);
        })
    });

    for size in [1024, 4096, 16384, 65536] {
        let code = generate_large_ia32_block(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("throughput", size), &code, |b, code| {
            b.iter(|| {
                let _ = disasm.disassemble(black_box(code), 0x1000);
            })
        });
    }

    group.finish();
}

fn bench_ia32_encoding(c: &mut Criterion) {
    let listing = Ia32Disassembler::new().disassemble(IA32_CODE, 0x1000);

    let mut group = c.benchmark_group("ia32_encoding");

    // `encode` ignores the pinned bytes, so this measures the encoder itself.
    group.bench_function("small_function", |b| {
        b.iter(|| {
            for insn in black_box(&listing.instructions) {
                let _ = insn.encode();
            }
        })
    });

    group.bench_function("pinned_bytes", |b| {
        b.iter(|| {
            for insn in black_box(&listing.instructions) {
                let _ = insn.bytes();
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_ia32_disassembly, bench_ia32_encoding);
criterion_main!(benches);
