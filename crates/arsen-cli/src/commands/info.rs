//! `arsen info`: one-screen summary of a binary.

use serde::Serialize;

use super::{Context, FileArgs};
use crate::output::{format_bytes, print_json};

#[derive(Debug, Serialize)]
struct Info {
    path: String,
    format: String,
    architecture: String,
    endianness: String,
    bitness: u32,
    entry_point: String,
    size: usize,
    sections: usize,
    imports: usize,
    exports: usize,
    sha256: String,
}

/// Executes the `info` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn execute(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, binary) = ctx.open(&args.file)?;
    let info = Info {
        path: binary.path.display().to_string(),
        format: binary.format.to_string(),
        architecture: binary.architecture.to_string(),
        endianness: binary.endianness.to_string(),
        bitness: binary.bitness,
        entry_point: binary.entry_point.to_string(),
        size: binary.raw_data.len(),
        sections: binary.sections.len(),
        imports: binary.imports.len(),
        exports: binary.exports.len(),
        sha256: binary.sha256(),
    };
    if ctx.json {
        return print_json(&info);
    }

    println!("File:          {}", info.path);
    println!("Size:          {}", format_bytes(info.size as u64));
    println!("Format:        {}", info.format);
    println!("Architecture:  {} ({}-bit)", info.architecture, info.bitness);
    println!("Endianness:    {}", info.endianness);
    println!("Entry point:   {}", info.entry_point);
    println!("Sections:      {}", info.sections);
    println!("Imports:       {}", info.imports);
    println!("Exports:       {}", info.exports);
    println!("SHA-256:       {}", info.sha256);
    Ok(())
}
