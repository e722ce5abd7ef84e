//! `arsen project`: create and annotate project files.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use arsen_analysis::events::EventBus;
use arsen_common::annotation::{Symbol, SymbolType};
use arsen_common::constants::PROJECT_EXTENSION;
use arsen_common::error::ArsenError;
use arsen_common::types::Address;
use arsen_project::{Project, ProjectService};
use clap::{Args, Subcommand};

use super::{Context, parse_address};
use crate::output::print_json;

/// Arguments for the `project` command.
#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Project operation.
    #[command(subcommand)]
    pub command: ProjectCommand,
}

/// Project operations.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project seeded with the binary's symbols.
    New {
        /// Project name.
        name: String,
        /// Binary to annotate.
        binary: PathBuf,
        /// Output file; defaults to `<name>.arsen.json`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a project's annotations.
    Show {
        /// Project file.
        project: PathBuf,
    },
    /// Name an address.
    Rename {
        /// Project file.
        project: PathBuf,
        /// Address to name.
        address: String,
        /// New name.
        name: String,
    },
    /// Comment an address; empty text removes the comment.
    Comment {
        /// Project file.
        project: PathBuf,
        /// Address to comment.
        address: String,
        /// Comment text.
        text: String,
    },
    /// Bookmark an address.
    Bookmark {
        /// Project file.
        project: PathBuf,
        /// Address to bookmark.
        address: String,
        /// Description.
        description: String,
    },
}

fn open(path: &Path) -> anyhow::Result<ProjectService> {
    let mut service = ProjectService::new(EventBus::new());
    let _ = service
        .load(path)
        .with_context(|| format!("opening project {}", path.display()))?;
    Ok(service)
}

fn create(name: &str, binary: &Path, output: Option<PathBuf>, ctx: &Context) -> anyhow::Result<()> {
    let (_session, loaded, analysis) = ctx.analyze(binary)?;
    let mut projects = ProjectService::new(EventBus::new());
    let _ = projects.create(name, binary);
    projects.attach_binary(&loaded)?;
    let seeded = projects.symbols()?.import_from(&loaded, &analysis);

    let path = output.unwrap_or_else(|| PathBuf::from(format!("{name}{PROJECT_EXTENSION}")));
    projects.save(&path)?;
    println!("Created {} with {seeded} symbols", path.display());
    Ok(())
}

fn show(path: &Path, ctx: &Context) -> anyhow::Result<()> {
    let service = open(path)?;
    let Some(project) = service.current() else {
        anyhow::bail!("no project open");
    };
    if ctx.json {
        return print_json(project);
    }

    let meta = project.metadata();
    println!("Name:       {}", meta.project_name);
    println!("Binary:     {}", meta.binary_path);
    println!("SHA-256:    {}", project.binary_sha256.as_deref().unwrap_or("-"));
    println!("Created:    {}", meta.created.to_rfc3339());
    println!("Modified:   {}", meta.last_modified.to_rfc3339());
    println!("Version:    {}", meta.version);
    println!("Symbols:    {}", project.symbols.len());

    if !project.comments.is_empty() {
        println!("\nComments:");
        for c in project.comments.values() {
            println!("  {}  {}", c.address, c.text);
        }
    }
    if !project.bookmarks.is_empty() {
        println!("\nBookmarks:");
        for b in &project.bookmarks {
            println!("  {}  {}", b.address, b.description);
        }
    }
    Ok(())
}

fn rename(path: &Path, address: &str, name: &str) -> anyhow::Result<()> {
    let address = parse_address(address)?;
    let mut service = open(path)?;
    let mut symbols = service.symbols()?;
    match symbols.rename(address, name) {
        Ok(()) => {}
        Err(ArsenError::NotFound { .. }) => {
            symbols.add(Symbol::new(address, name, SymbolType::Label));
        }
        Err(e) => return Err(e.into()),
    }
    service.save(path)?;
    println!("{address} -> {name}");
    Ok(())
}

fn annotate(
    path: &Path,
    address: &str,
    apply: impl FnOnce(&mut Project, Address),
) -> anyhow::Result<()> {
    let address = parse_address(address)?;
    let mut service = open(path)?;
    let Some(project) = service.current_mut() else {
        anyhow::bail!("no project open");
    };
    apply(project, address);
    service.save(path)?;
    Ok(())
}

/// Executes the `project` command.
///
/// # Errors
///
/// Returns an error if a project or binary cannot be read or written.
pub fn execute(args: ProjectArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        ProjectCommand::New {
            name,
            binary,
            output,
        } => create(&name, &binary, output, ctx),
        ProjectCommand::Show { project } => show(&project, ctx),
        ProjectCommand::Rename {
            project,
            address,
            name,
        } => rename(&project, &address, &name),
        ProjectCommand::Comment {
            project,
            address,
            text,
        } => annotate(&project, &address, |p, addr| p.set_comment(addr, text)),
        ProjectCommand::Bookmark {
            project,
            address,
            description,
        } => annotate(&project, &address, |p, addr| p.add_bookmark(addr, description)),
    }
}
