//! `arsen disasm`: linear disassembly listing.

use std::path::PathBuf;

use arsen_sdk::render::disassembly_line;
use clap::Args;

use super::{Context, parse_address};
use crate::output::print_json;

/// Arguments for the `disasm` command.
#[derive(Args, Debug)]
pub struct DisasmArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Start address; defaults to the entry point.
    #[arg(short, long)]
    pub address: Option<String>,

    /// Number of instructions.
    #[arg(short = 'n', long, default_value_t = 32)]
    pub count: usize,
}

/// Executes the `disasm` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the address is not
/// in an executable section.
pub fn execute(args: &DisasmArgs, ctx: &Context) -> anyhow::Result<()> {
    let (service, binary) = ctx.open(&args.file)?;
    let start = match &args.address {
        Some(text) => parse_address(text)?,
        None => binary.entry_point,
    };
    let instructions = service.disassemble_range(start, args.count)?;
    if ctx.json {
        return print_json(&instructions);
    }
    for insn in &instructions {
        println!("{}", disassembly_line(insn));
    }
    Ok(())
}
