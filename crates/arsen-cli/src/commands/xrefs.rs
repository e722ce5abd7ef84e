//! `arsen xrefs`: references to and from one address.

use std::path::PathBuf;

use arsen_common::disassembly::CrossReference;
use clap::Args;
use serde::Serialize;

use super::{Context, parse_address};
use crate::output::print_json;

/// Arguments for the `xrefs` command.
#[derive(Args, Debug)]
pub struct XrefsArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Address to look up.
    #[arg(short, long)]
    pub address: String,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    to: Vec<&'a CrossReference>,
    from: Vec<&'a CrossReference>,
}

/// Executes the `xrefs` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the address is
/// malformed.
pub fn execute(args: &XrefsArgs, ctx: &Context) -> anyhow::Result<()> {
    let address = parse_address(&args.address)?;
    let (_service, _binary, analysis) = ctx.analyze(&args.file)?;
    let report = Report {
        to: analysis.xrefs_to(address).collect(),
        from: analysis.xrefs_from(address).collect(),
    };
    if ctx.json {
        return print_json(&report);
    }

    let name_of = |addr| {
        analysis
            .function_containing(addr)
            .map(|f| format!("  ({})", f.name))
            .unwrap_or_default()
    };
    println!("References to {address}:");
    if report.to.is_empty() {
        println!("  none");
    }
    for x in &report.to {
        println!("  {:<5} from {}{}", x.kind, x.from, name_of(x.from));
    }
    println!("References from {address}:");
    if report.from.is_empty() {
        println!("  none");
    }
    for x in &report.from {
        println!("  {:<5} to {}{}", x.kind, x.to, name_of(x.to));
    }
    Ok(())
}
