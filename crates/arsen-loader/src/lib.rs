//! # arsen-loader
//!
//! Executable image parsers for the Arsen workspace.
//!
//! Each supported container format implements [`BinaryLoader`]; the
//! [`LoaderRegistry`] sniffs the first bytes of a file and dispatches to
//! the first loader that recognises them.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod elf;
pub mod macho;
pub mod pe;
pub mod reader;

use std::io::Read;
use std::path::Path;

use arsen_common::binary::BinaryFile;
use arsen_common::constants::HEADER_PROBE_LEN;
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::BinaryFormat;

pub use elf::ElfLoader;
pub use macho::MachOLoader;
pub use pe::PeLoader;
pub use reader::ByteReader;

/// A parser for one executable container format.
pub trait BinaryLoader: Send + Sync {
    /// The format this loader handles.
    fn format(&self) -> BinaryFormat;

    /// Returns `true` if the leading bytes of a file look like this format.
    fn supports(&self, header: &[u8]) -> bool;

    /// Parses a complete file image.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` if the image is truncated or
    /// structurally invalid.
    fn parse(&self, path: &Path, data: Vec<u8>) -> Result<BinaryFile>;

    /// Reads `path` from disk and parses it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load(&self, path: &Path) -> Result<BinaryFile> {
        tracing::info!(path = %path.display(), format = %self.format(), "loading binary");
        let data = std::fs::read(path).map_err(|e| ArsenError::io(path, e))?;
        self.parse(path, data)
    }
}

/// Ordered set of loaders consulted when opening a file.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn BinaryLoader>>,
    probe_len: usize,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formats: Vec<BinaryFormat> = self.loaders.iter().map(|l| l.format()).collect();
        f.debug_struct("LoaderRegistry")
            .field("loaders", &formats)
            .field("probe_len", &self.probe_len)
            .finish()
    }
}

impl LoaderRegistry {
    /// Creates a registry with the PE, ELF, and Mach-O loaders, in that order.
    #[must_use]
    pub fn new() -> Self {
        Self::with_probe_len(HEADER_PROBE_LEN)
    }

    /// Creates the default registry with a custom header probe length.
    #[must_use]
    pub fn with_probe_len(probe_len: usize) -> Self {
        let mut registry = Self {
            loaders: Vec::new(),
            probe_len: probe_len.max(4),
        };
        registry.register(Box::new(PeLoader));
        registry.register(Box::new(ElfLoader));
        registry.register(Box::new(MachOLoader));
        registry
    }

    /// Appends a loader; earlier loaders win when several accept a header.
    pub fn register(&mut self, loader: Box<dyn BinaryLoader>) {
        tracing::debug!(format = %loader.format(), "registered loader");
        self.loaders.push(loader);
    }

    /// Returns the first loader that accepts `header`.
    #[must_use]
    pub fn find(&self, header: &[u8]) -> Option<&dyn BinaryLoader> {
        self.loaders
            .iter()
            .find(|l| l.supports(header))
            .map(|l| l.as_ref())
    }

    /// Reads the leading bytes of `path` and selects a loader for them.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// `ArsenError::Unsupported` if no loader accepts the header.
    pub fn probe(&self, path: &Path) -> Result<&dyn BinaryLoader> {
        let file = std::fs::File::open(path).map_err(|e| ArsenError::io(path, e))?;
        let mut header = Vec::with_capacity(self.probe_len);
        let _ = file
            .take(self.probe_len as u64)
            .read_to_end(&mut header)
            .map_err(|e| ArsenError::io(path, e))?;
        self.find(&header).ok_or_else(|| ArsenError::Unsupported {
            message: "no loader found for binary format".into(),
        })
    }

    /// Probes `path` and loads it with the selected loader.
    ///
    /// # Errors
    ///
    /// Returns an error if probing, reading, or parsing fails.
    pub fn load(&self, path: &Path) -> Result<BinaryFile> {
        let loader = self.probe(path)?;
        let binary = loader.load(path)?;
        tracing::info!(
            path = %path.display(),
            format = %binary.format,
            arch = %binary.architecture,
            sections = binary.sections.len(),
            "binary loaded"
        );
        Ok(binary)
    }

    /// Parses an in-memory image, selecting the loader from its first bytes.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Unsupported` if no loader accepts the data, or
    /// the loader's parse error.
    pub fn parse(&self, path: &Path, data: Vec<u8>) -> Result<BinaryFile> {
        let header = &data[..data.len().min(self.probe_len)];
        let loader = self.find(header).ok_or_else(|| ArsenError::Unsupported {
            message: "no loader found for binary format".into(),
        })?;
        loader.parse(path, data)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_dispatches_by_magic() {
        let registry = LoaderRegistry::new();
        assert_eq!(
            registry.find(b"MZ\x90\x00").map(|l| l.format()),
            Some(BinaryFormat::Pe)
        );
        assert_eq!(
            registry.find(b"\x7fELF\x02\x01").map(|l| l.format()),
            Some(BinaryFormat::Elf)
        );
        assert_eq!(
            registry.find(&[0xCF, 0xFA, 0xED, 0xFE]).map(|l| l.format()),
            Some(BinaryFormat::MachO)
        );
        assert!(registry.find(b"#!/bin/sh").is_none());
    }

    #[test]
    fn probe_rejects_unknown_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.sh");
        std::fs::write(&path, b"#!/bin/sh\necho hi\n").expect("write");
        let err = LoaderRegistry::new().probe(&path).err().expect("unsupported");
        assert_eq!(err.to_string(), "unsupported: no loader found for binary format");
    }

    #[test]
    fn probe_missing_file_is_io_error() {
        let err = LoaderRegistry::new()
            .probe(Path::new("/nonexistent/arsen/binary"))
            .err()
            .expect("io error");
        assert!(matches!(err, ArsenError::Io { .. }));
    }
}
