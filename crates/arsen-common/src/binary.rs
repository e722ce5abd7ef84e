//! In-memory model of a loaded executable image.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};

/// A contiguous region of the image (ELF section, PE section, Mach-O section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section name as recorded in the image.
    pub name: String,
    /// Address the section is mapped at.
    pub virtual_address: Address,
    /// Size of the mapped region.
    pub virtual_size: u64,
    /// Offset of the section contents in the file.
    pub file_offset: u64,
    /// Size of the section contents in the file.
    pub raw_size: u64,
    /// Format-specific flag word, kept verbatim for display.
    pub raw_flags: u64,
    /// Normalised access permissions.
    pub permissions: Permissions,
    /// Section contents (may be shorter than `raw_size` for truncated files).
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Section {
    /// Returns `true` if `address` lies in `[virtual_address, virtual_address + virtual_size)`.
    #[must_use]
    pub const fn contains(&self, address: Address) -> bool {
        let start = self.virtual_address.value();
        let addr = address.value();
        addr >= start && addr - start < self.virtual_size
    }

    /// Whether the section holds executable code.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.permissions.execute
    }

    /// Whether the section is readable.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.permissions.read
    }

    /// Whether the section is writable.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.permissions.write
    }

    /// Returns up to `len` bytes of section data starting at `address`.
    #[must_use]
    pub fn read_at(&self, address: Address, len: usize) -> Option<&[u8]> {
        if !self.contains(address) {
            return None;
        }
        let start = usize::try_from(address.value() - self.virtual_address.value()).ok()?;
        if start >= self.data.len() {
            return None;
        }
        let end = start.saturating_add(len).min(self.data.len());
        Some(&self.data[start..end])
    }
}

/// A symbol imported from another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Library the symbol comes from (empty when the format does not say).
    pub library: String,
    /// Imported symbol name, or `#<ordinal>` for ordinal-only imports.
    pub name: String,
    /// Address of the slot the loader patches.
    pub address: Address,
    /// Import ordinal, 0 if not applicable.
    pub ordinal: u32,
}

/// A symbol exported by this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Exported symbol name.
    pub name: String,
    /// Address of the exported symbol.
    pub address: Address,
    /// Export ordinal, 0 if not applicable.
    pub ordinal: u32,
}

/// A fully parsed executable image.
#[derive(Debug, Clone)]
pub struct BinaryFile {
    /// Path the image was loaded from.
    pub path: PathBuf,
    /// Container format.
    pub format: BinaryFormat,
    /// Target architecture.
    pub architecture: Architecture,
    /// Byte order of the image.
    pub endianness: Endianness,
    /// 32 or 64.
    pub bitness: u32,
    /// Program entry point.
    pub entry_point: Address,
    /// Sections in header order.
    pub sections: Vec<Section>,
    /// Imported symbols.
    pub imports: Vec<Import>,
    /// Exported symbols.
    pub exports: Vec<Export>,
    /// The whole file.
    pub raw_data: Vec<u8>,
}

impl BinaryFile {
    /// Returns the first section containing `address`.
    #[must_use]
    pub fn section_by_address(&self, address: Address) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(address))
    }

    /// Returns the first section with the given name.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Maps a file offset to the virtual address it is loaded at, if any
    /// section covers it.
    #[must_use]
    pub fn file_offset_to_address(&self, offset: u64) -> Option<Address> {
        self.sections
            .iter()
            .filter(|s| !s.data.is_empty())
            .find(|s| offset >= s.file_offset && offset - s.file_offset < s.raw_size)
            .map(|s| s.virtual_address.add(offset - s.file_offset))
    }

    /// Lowercase hex SHA-256 of the whole file.
    #[must_use]
    pub fn sha256(&self) -> String {
        let digest = Sha256::digest(&self.raw_data);
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Sections whose permissions include execute.
    pub fn executable_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_executable())
    }
}
