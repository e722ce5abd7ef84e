//! # arsen-project
//!
//! A project is the user's work on one binary: symbol names, comments, and
//! bookmarks. Projects are saved as pretty-printed JSON next to the binary
//! they describe and record its SHA-256 so a reopened project can tell
//! whether the file changed underneath it.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod project;
pub mod service;
pub mod symbols;

pub use project::{Project, ProjectMetadata};
pub use service::ProjectService;
pub use symbols::SymbolTable;
