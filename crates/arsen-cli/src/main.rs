//! # arsen: binary analysis from the command line
//!
//! Loads PE, ELF, and Mach-O files, disassembles and analyses them, and
//! manages annotation projects. `arsen tui <file>` opens the interactive
//! viewer.

#![allow(clippy::print_stdout)]

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
