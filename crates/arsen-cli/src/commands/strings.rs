//! `arsen strings`: printable runs found by analysis.

use std::path::PathBuf;

use clap::Args;

use super::Context;
use crate::output::print_json;

/// Arguments for the `strings` command.
#[derive(Args, Debug)]
pub struct StringsArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Shortest run to report; overrides the configuration.
    #[arg(short = 'n', long)]
    pub min_len: Option<usize>,
}

/// Executes the `strings` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded.
pub fn execute(args: &StringsArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut config = ctx.config.clone();
    if let Some(min) = args.min_len {
        config.analysis.min_string_length = min;
    }
    let ctx = Context {
        config,
        json: ctx.json,
    };
    let (_service, _binary, analysis) = ctx.analyze(&args.file)?;
    if ctx.json {
        return print_json(&analysis.strings);
    }
    for s in &analysis.strings {
        println!("{}  {}", s.address, s.text);
    }
    Ok(())
}
