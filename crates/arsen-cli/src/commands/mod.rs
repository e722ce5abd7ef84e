//! CLI command definitions and dispatch.

pub mod cfg;
pub mod decompile;
pub mod disasm;
pub mod functions;
pub mod hex;
pub mod info;
pub mod project;
pub mod search;
pub mod sections;
pub mod strings;
pub mod symbols;
pub mod tui;
pub mod xrefs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use arsen_analysis::context::AnalysisResult;
use arsen_common::binary::BinaryFile;
use arsen_common::config::ArsenConfig;
use arsen_common::disassembly::Function;
use arsen_common::types::Address;
use arsen_sdk::BinaryService;
use clap::{Args, Parser, Subcommand};

/// Arsen: static analysis of PE, ELF, and Mach-O binaries.
#[derive(Parser, Debug)]
#[command(name = "arsen", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (YAML). Defaults to ~/.arsen/config.yaml when present.
    #[arg(long, global = true, env = "ARSEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of tables where supported.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarise format, architecture, entry point, and hash.
    Info(FileArgs),
    /// List sections.
    Sections(FileArgs),
    /// List imported symbols.
    Imports(FileArgs),
    /// List exported symbols.
    Exports(FileArgs),
    /// Disassemble linearly from an address.
    Disasm(disasm::DisasmArgs),
    /// List detected functions.
    Functions(FileArgs),
    /// Print pseudocode.
    Decompile(decompile::DecompileArgs),
    /// Show a function's control-flow graph.
    Cfg(cfg::CfgArgs),
    /// List printable strings.
    Strings(strings::StringsArgs),
    /// Show references to and from an address.
    Xrefs(xrefs::XrefsArgs),
    /// Hex dump part of the file.
    Hex(hex::HexArgs),
    /// Search the file for bytes, a masked pattern, or text.
    Search(search::SearchArgs),
    /// Create and edit annotation projects.
    Project(project::ProjectArgs),
    /// Open the interactive viewer.
    Tui(FileArgs),
}

/// A single binary to operate on.
#[derive(Args, Debug)]
pub struct FileArgs {
    /// Path to the binary.
    pub file: PathBuf,
}

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    /// Effective configuration.
    pub config: ArsenConfig,
    /// Emit JSON.
    pub json: bool,
}

impl Context {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => ArsenConfig::load(path)
                .with_context(|| format!("reading configuration {}", path.display()))?,
            None => {
                let default = arsen_common::constants::default_config_file();
                ArsenConfig::load_or_default(default.exists().then_some(default.as_path()))?
            }
        };
        Ok(Self {
            config,
            json: cli.json,
        })
    }

    /// A service with `path` loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn open(&self, path: &Path) -> anyhow::Result<(BinaryService, Arc<BinaryFile>)> {
        let service = BinaryService::new(self.config.clone());
        let binary = service
            .load_binary(path)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((service, binary))
    }

    /// A service with `path` loaded and analysed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or analysed.
    pub fn analyze(
        &self,
        path: &Path,
    ) -> anyhow::Result<(BinaryService, Arc<BinaryFile>, Arc<AnalysisResult>)> {
        let (service, binary) = self.open(path)?;
        let analysis = service.analyze()?;
        Ok((service, binary, analysis))
    }
}

/// Parses an address given as `0x`-prefixed hex or decimal.
///
/// # Errors
///
/// Returns an error if `text` is not a number.
pub fn parse_address(text: &str) -> anyhow::Result<Address> {
    Ok(text.parse::<Address>()?)
}

/// Finds a function by start address, by any address inside it, or by
/// name.
///
/// # Errors
///
/// Returns an error if nothing matches.
pub fn find_function<'a>(analysis: &'a AnalysisResult, query: &str) -> anyhow::Result<&'a Function> {
    let by_address = query.parse::<Address>().ok().and_then(|addr| {
        analysis
            .function_at(addr)
            .or_else(|| analysis.function_containing(addr))
    });
    by_address
        .or_else(|| analysis.function_by_name(query))
        .with_context(|| format!("no function matches {query:?}"))
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    tracing::debug!(command = ?cli.command, json = ctx.json, "dispatching command");
    match cli.command {
        Command::Info(args) => info::execute(&args, &ctx),
        Command::Sections(args) => sections::execute(&args, &ctx),
        Command::Imports(args) => symbols::imports(&args, &ctx),
        Command::Exports(args) => symbols::exports(&args, &ctx),
        Command::Disasm(args) => disasm::execute(&args, &ctx),
        Command::Functions(args) => functions::execute(&args, &ctx),
        Command::Decompile(args) => decompile::execute(&args, &ctx),
        Command::Cfg(args) => cfg::execute(&args, &ctx),
        Command::Strings(args) => strings::execute(&args, &ctx),
        Command::Xrefs(args) => xrefs::execute(&args, &ctx),
        Command::Hex(args) => hex::execute(&args, &ctx),
        Command::Search(args) => search::execute(&args, &ctx),
        Command::Project(args) => project::execute(args, &ctx),
        Command::Tui(args) => tui::execute(&args, &ctx),
    }
}

#[cfg(test)]
#[path = "../../tests/support/elf.rs"]
pub(crate) mod test_support;
