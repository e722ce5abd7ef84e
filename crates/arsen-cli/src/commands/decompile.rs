//! `arsen decompile`: pseudocode for one or all functions.

use std::path::PathBuf;

use clap::Args;

use super::{Context, find_function};

/// Arguments for the `decompile` command.
#[derive(Args, Debug)]
pub struct DecompileArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Function address or name; defaults to the one at the entry point.
    #[arg(short, long, conflicts_with = "all")]
    pub function: Option<String>,

    /// Every detected function.
    #[arg(long)]
    pub all: bool,
}

/// Executes the `decompile` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the function is not
/// found.
pub fn execute(args: &DecompileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (service, binary, analysis) = ctx.analyze(&args.file)?;
    let renderer = service.pseudocode_service();

    if args.all {
        let mut first = true;
        for function in analysis.functions.values() {
            if !first {
                println!();
            }
            first = false;
            println!("// {} @ {}", function.name, function.address);
            println!("{}", renderer.generate(function));
        }
        return Ok(());
    }

    let function = match &args.function {
        Some(query) => find_function(&analysis, query)?,
        None => analysis
            .function_at(binary.entry_point)
            .or_else(|| analysis.functions.values().next())
            .ok_or_else(|| anyhow::anyhow!("no functions found in {}", args.file.display()))?,
    };
    println!("{}", renderer.generate(function));
    Ok(())
}
