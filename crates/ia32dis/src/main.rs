//! ia32dis - listing disassembler for raw IA-32 code
//!
//! Usage:
//!   ia32dis <file>                     Disassemble a flat binary from offset 0
//!   ia32dis <file> --base 401000       Load the code at a virtual address
//!   ia32dis <file> --offset 64 -n 20   Skip a header, stop after 20 instructions
//!   ia32dis --hex "55 89 e5 c3"        Decode bytes given on the command line
//!   ia32dis <file> --json              One JSON object per instruction

use anyhow::{bail, Context, Result};
use clap::Parser;
use ia32_core::{format_instruction, format_listing_line, Instruction, ListingOptions};
use ia32_disasm::Ia32Disassembler;
use log::{LevelFilter, Log, Metadata, Record};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ia32dis")]
#[command(about = "A listing disassembler for raw IA-32 code", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a flat binary containing code
    #[arg(required_unless_present = "hex", conflicts_with = "hex")]
    file: Option<PathBuf>,

    /// Decode hex bytes given on the command line instead of a file
    #[arg(long, value_name = "BYTES")]
    hex: Option<String>,

    /// Virtual address of the first decoded byte (hex)
    #[arg(short, long, value_parser = parse_hex, default_value = "0")]
    base: u32,

    /// Skip this many bytes of the input before decoding
    #[arg(short, long, default_value = "0")]
    offset: usize,

    /// Stop after this many instructions
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Emit one JSON object per line instead of a text listing
    #[arg(long)]
    json: bool,

    /// Omit the raw bytes column
    #[arg(long)]
    no_bytes: bool,

    /// Uppercase mnemonics and registers
    #[arg(long)]
    uppercase: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|e| e.to_string())
}

/// Parses `"55 89e5 c3"` style byte strings. Whitespace and commas are
/// ignored, as is an optional `0x` before each group.
fn parse_hex_bytes(text: &str) -> Result<Vec<u8>> {
    let mut digits = String::with_capacity(text.len());
    for group in text.split(|c: char| c.is_whitespace() || c == ',') {
        digits.push_str(group.strip_prefix("0x").unwrap_or(group));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!("invalid hex digit {:?} in {:?}", bad, text);
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in {:?}", text);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Writes log records to stderr, filtered by `log::max_level()`.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8) {
    // A logger may already be installed when embedded in a test harness.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log_level(verbose));
    }
}

/// One instruction as emitted by `--json`.
#[derive(Serialize)]
struct JsonLine<'a> {
    address: u32,
    bytes: String,
    text: String,
    instruction: &'a Instruction,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data = match (&cli.hex, &cli.file) {
        (Some(hex), _) => parse_hex_bytes(hex)?,
        (None, Some(path)) => {
            fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))?
        }
        (None, None) => bail!("either a file or --hex is required"),
    };

    if cli.offset > data.len() {
        bail!(
            "offset {:#x} is past the end of the input ({:#x} bytes)",
            cli.offset,
            data.len()
        );
    }
    let code = &data[cli.offset..];
    log::debug!("decoding {} bytes at {:#010x}", code.len(), cli.base);

    let listing = Ia32Disassembler::new().disassemble(code, cli.base);
    let count = cli.count.unwrap_or(usize::MAX);

    let options = ListingOptions {
        show_bytes: !cli.no_bytes,
        uppercase: cli.uppercase,
        ..ListingOptions::default()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for insn in listing.instructions.iter().take(count) {
        if cli.json {
            let bytes = insn.bytes().context("decoded instruction lost its bytes")?;
            let line = JsonLine {
                address: insn.address,
                bytes: bytes.iter().map(|b| format!("{:02x}", b)).collect(),
                text: format_instruction(insn),
                instruction: insn,
            };
            serde_json::to_writer(&mut out, &line).context("Failed to write JSON")?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", format_listing_line(insn, &options))?;
        }
    }

    if listing.end_offset < code.len() && listing.instructions.len() <= count {
        log::warn!(
            "truncated instruction at {:#010x} ({} trailing bytes)",
            cli.base.wrapping_add(listing.end_offset as u32),
            code.len() - listing.end_offset
        );
    }

    Ok(())
}
