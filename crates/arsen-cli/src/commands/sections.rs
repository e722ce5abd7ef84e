//! `arsen sections`: the section table.

use arsen_sdk::render::{SECTION_HEADERS, section_row};

use super::{Context, FileArgs};
use crate::output::{print_json, table};

/// Executes the `sections` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn execute(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, binary) = ctx.open(&args.file)?;
    if ctx.json {
        return print_json(&binary.sections);
    }
    if binary.sections.is_empty() {
        println!("No sections.");
        return Ok(());
    }
    let rows: Vec<[String; 6]> = binary.sections.iter().map(section_row).collect();
    println!("{}", table(&SECTION_HEADERS, &rows));
    Ok(())
}
