//! `arsen tui`: the interactive viewer.

use super::{Context, FileArgs};

/// Executes the `tui` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the terminal fails.
pub fn execute(args: &FileArgs, ctx: &Context) -> anyhow::Result<()> {
    let (service, _binary) = ctx.open(&args.file)?;
    arsen_tui::run(&service)?;
    Ok(())
}
