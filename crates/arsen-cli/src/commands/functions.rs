//! `arsen functions`: detected functions.

use arsen_sdk::render::{FUNCTION_HEADERS, function_row};

use super::{Context, FileArgs};
use crate::output::{print_json, table};

/// Executes the `functions` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn execute(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, _binary, analysis) = ctx.analyze(&args.file)?;
    if ctx.json {
        let functions: Vec<_> = analysis.functions.values().collect();
        return print_json(&functions);
    }
    if analysis.functions.is_empty() {
        println!("No functions found.");
        return Ok(());
    }
    let rows: Vec<[String; 6]> = analysis.functions.values().map(function_row).collect();
    println!("{}", table(&FUNCTION_HEADERS, &rows));
    println!("\n{} functions", rows.len());
    Ok(())
}
