//! The persisted project model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use arsen_common::annotation::{Bookmark, Comment, Symbol};
use arsen_common::constants::PROJECT_FORMAT_VERSION;
use arsen_common::types::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User annotations for one binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Binary the project annotates.
    pub binary_path: PathBuf,
    /// Hash of the binary when it was attached.
    #[serde(default)]
    pub binary_sha256: Option<String>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last save time.
    pub modified: DateTime<Utc>,
    /// File format version, `major.minor`.
    pub format_version: String,
    /// Named addresses.
    #[serde(default)]
    pub symbols: BTreeMap<Address, Symbol>,
    /// Comments by address.
    #[serde(default)]
    pub comments: BTreeMap<Address, Comment>,
    /// Bookmarks in creation order.
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

/// Summary shown when listing projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Display name.
    pub project_name: String,
    /// Binary path as text.
    pub binary_path: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last save time.
    pub last_modified: DateTime<Utc>,
    /// File format version.
    pub version: String,
}

impl Project {
    /// A fresh, empty project.
    pub fn new(name: impl Into<String>, binary_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            binary_path: binary_path.into(),
            binary_sha256: None,
            created: now,
            modified: now,
            format_version: PROJECT_FORMAT_VERSION.to_string(),
            symbols: BTreeMap::new(),
            comments: BTreeMap::new(),
            bookmarks: Vec::new(),
        }
    }

    /// Summary of this project.
    #[must_use]
    pub fn metadata(&self) -> ProjectMetadata {
        ProjectMetadata {
            project_name: self.name.clone(),
            binary_path: self.binary_path.display().to_string(),
            created: self.created,
            last_modified: self.modified,
            version: self.format_version.clone(),
        }
    }

    /// Sets the comment at `address`. Empty text removes it.
    pub fn set_comment(&mut self, address: Address, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            let _ = self.comments.remove(&address);
        } else {
            let _ = self.comments.insert(address, Comment { address, text });
        }
    }

    /// The comment at `address`.
    #[must_use]
    pub fn comment(&self, address: Address) -> Option<&str> {
        self.comments.get(&address).map(|c| c.text.as_str())
    }

    /// Adds a bookmark, replacing any existing one at the same address.
    pub fn add_bookmark(&mut self, address: Address, description: impl Into<String>) {
        let bookmark = Bookmark {
            address,
            description: description.into(),
        };
        match self.bookmarks.iter_mut().find(|b| b.address == address) {
            Some(existing) => *existing = bookmark,
            None => self.bookmarks.push(bookmark),
        }
    }

    /// Removes the bookmark at `address`. Returns whether one existed.
    pub fn remove_bookmark(&mut self, address: Address) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.address != address);
        self.bookmarks.len() != before
    }

    /// Major component of the format version.
    pub(crate) fn major_version(version: &str) -> &str {
        version.split('.').next().unwrap_or(version)
    }
}
