//! `arsen hex`: hex dump of raw file bytes.

use std::path::PathBuf;

use anyhow::bail;
use arsen_sdk::render::hex_dump;
use clap::Args;

use super::{Context, parse_address};

/// Arguments for the `hex` command.
#[derive(Args, Debug)]
pub struct HexArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// File offset to start at (hex with `0x`, or decimal).
    #[arg(short, long, default_value = "0")]
    pub offset: String,

    /// Bytes to show; defaults to the configured display limit.
    #[arg(short, long)]
    pub length: Option<usize>,
}

/// Executes the `hex` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the offset is past
/// the end of the file.
pub fn execute(args: &HexArgs, ctx: &Context) -> anyhow::Result<()> {
    let offset = parse_address(&args.offset)?.value();
    let (_service, binary) = ctx.open(&args.file)?;
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    let Some(data) = binary.raw_data.get(start..) else {
        bail!(
            "offset {offset:#X} is past the end of the file ({} bytes)",
            binary.raw_data.len()
        );
    };
    let length = args.length.unwrap_or(ctx.config.hex.display_limit);
    let dump = hex_dump(data, offset, length, ctx.config.hex.bytes_per_row);
    println!("{}", dump.trim_end());
    Ok(())
}
