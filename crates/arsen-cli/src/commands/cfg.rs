//! `arsen cfg`: a function's control-flow graph as levels or DOT.

use std::path::PathBuf;

use arsen_analysis::cfg::ControlFlowGraph;
use arsen_sdk::render::cfg_levels;
use clap::Args;

use super::{Context, find_function};

/// Arguments for the `cfg` command.
#[derive(Args, Debug)]
pub struct CfgArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Function address or name.
    #[arg(short, long)]
    pub function: String,

    /// Emit Graphviz DOT.
    #[arg(long)]
    pub dot: bool,
}

/// Executes the `cfg` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the function is not
/// found.
pub fn execute(args: &CfgArgs, ctx: &Context) -> anyhow::Result<()> {
    let (_service, _binary, analysis) = ctx.analyze(&args.file)?;
    let function = find_function(&analysis, &args.function)?;
    let cfg = ControlFlowGraph::build(function);

    if args.dot {
        print!("{}", cfg.to_dot(function));
        return Ok(());
    }

    println!("{} @ {}", function.name, function.address);
    println!(
        "{} blocks, {} edges, {} loops",
        cfg.block_count(),
        cfg.edge_count(),
        cfg.back_edges().len()
    );
    for (latch, header) in cfg.back_edges() {
        println!("loop: {latch} -> {header}");
    }
    println!();
    for line in cfg_levels(&cfg) {
        println!("{line}");
    }
    Ok(())
}
