//! Creating, saving, and loading the current project.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use arsen_analysis::events::{EventBus, EventKind};
use arsen_common::binary::BinaryFile;
use arsen_common::constants::PROJECT_FORMAT_VERSION;
use arsen_common::error::{ArsenError, Result};
use chrono::Utc;
use tempfile::NamedTempFile;

use crate::project::Project;
use crate::symbols::SymbolTable;

fn no_project() -> ArsenError {
    ArsenError::Config {
        message: "no project to save".into(),
    }
}

/// Owns the open project and persists it.
#[derive(Debug)]
pub struct ProjectService {
    current: Option<Project>,
    events: EventBus,
}

impl ProjectService {
    /// A service with no open project.
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self {
            current: None,
            events,
        }
    }

    /// Starts a new project, replacing any open one.
    pub fn create(&mut self, name: impl Into<String>, binary_path: impl Into<PathBuf>) -> &mut Project {
        let project = Project::new(name, binary_path);
        tracing::info!(name = %project.name, id = %project.id, "project created");
        self.current.insert(project)
    }

    /// Records `binary`'s path and hash in the open project.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no project is open.
    pub fn attach_binary(&mut self, binary: &BinaryFile) -> Result<()> {
        let project = self.current.as_mut().ok_or_else(no_project)?;
        project.binary_path.clone_from(&binary.path);
        project.binary_sha256 = Some(binary.sha256());
        Ok(())
    }

    /// Writes the open project to `path` as pretty JSON.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a failed save never leaves a truncated project behind.
    ///
    /// # Errors
    ///
    /// Returns an error if no project is open or the file cannot be written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let project = self.current.as_mut().ok_or_else(no_project)?;
        project.modified = Utc::now();

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArsenError::io(dir, e))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &*project)?;
        tmp.as_file_mut()
            .write_all(b"\n")
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| ArsenError::io(tmp.path(), e))?;
        let _ = tmp.persist(path).map_err(|e| ArsenError::io(path, e.error))?;

        tracing::info!(path = %path.display(), "project saved");
        self.events.publish(EventKind::ProjectSaved {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Reads a project file and makes it current.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or was written
    /// by an incompatible format version.
    pub fn load(&mut self, path: &Path) -> Result<&Project> {
        let content = std::fs::read_to_string(path).map_err(|e| ArsenError::io(path, e))?;
        let project: Project = serde_json::from_str(&content)?;

        let expected = Project::major_version(PROJECT_FORMAT_VERSION);
        if Project::major_version(&project.format_version) != expected {
            return Err(ArsenError::Unsupported {
                message: format!(
                    "project format version {} (expected {expected}.x)",
                    project.format_version
                ),
            });
        }

        tracing::info!(path = %path.display(), name = %project.name, "project loaded");
        self.events.publish(EventKind::ProjectLoaded {
            name: project.name.clone(),
        });
        Ok(self.current.insert(project))
    }

    /// The open project.
    #[must_use]
    pub const fn current(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    /// The open project, mutably.
    pub const fn current_mut(&mut self) -> Option<&mut Project> {
        self.current.as_mut()
    }

    /// Closes the open project without saving.
    pub fn close(&mut self) -> Option<Project> {
        self.current.take()
    }

    /// Whether `binary` has the hash recorded in the open project.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no project is open.
    pub fn verify_binary(&self, binary: &BinaryFile) -> Result<bool> {
        let project = self.current.as_ref().ok_or_else(no_project)?;
        let matches = project
            .binary_sha256
            .as_deref()
            .is_some_and(|recorded| recorded == binary.sha256());
        if !matches {
            tracing::warn!(path = %binary.path.display(), "binary does not match project hash");
        }
        Ok(matches)
    }

    /// Symbol table over the open project.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no project is open.
    pub fn symbols(&mut self) -> Result<SymbolTable<'_>> {
        let project = self.current.as_mut().ok_or_else(no_project)?;
        Ok(SymbolTable::new(&mut project.symbols, &self.events))
    }
}
