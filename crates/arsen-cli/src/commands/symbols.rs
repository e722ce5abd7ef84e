//! `arsen imports` and `arsen exports`.

use super::{Context, FileArgs};
use crate::output::{print_json, table};

/// Executes the `imports` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn imports(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, binary) = ctx.open(&args.file)?;
    if ctx.json {
        return print_json(&binary.imports);
    }
    if binary.imports.is_empty() {
        println!("No imports.");
        return Ok(());
    }
    let rows: Vec<[String; 4]> = binary
        .imports
        .iter()
        .map(|i| {
            [
                i.address.to_string(),
                i.library.clone(),
                i.name.clone(),
                i.ordinal.to_string(),
            ]
        })
        .collect();
    println!("{}", table(&["ADDRESS", "LIBRARY", "NAME", "ORDINAL"], &rows));
    Ok(())
}

/// Executes the `exports` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn exports(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, binary) = ctx.open(&args.file)?;
    if ctx.json {
        return print_json(&binary.exports);
    }
    if binary.exports.is_empty() {
        println!("No exports.");
        return Ok(());
    }
    let rows: Vec<[String; 3]> = binary
        .exports
        .iter()
        .map(|e| [e.address.to_string(), e.name.clone(), e.ordinal.to_string()])
        .collect();
    println!("{}", table(&["ADDRESS", "NAME", "ORDINAL"], &rows));
    Ok(())
}
