//! PE (Portable Executable) loader.
//!
//! Handles PE32 and PE32+ images. The import and export directories are
//! walked on a best-effort basis: a damaged directory is logged and
//! skipped, it never fails the load.

use std::path::Path;

use arsen_common::binary::{BinaryFile, Export, Import, Section};
use arsen_common::error::Result;
use arsen_common::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};

use crate::BinaryLoader;
use crate::reader::ByteReader;

const FORMAT: &str = "PE";
const PE_SIGNATURE: &[u8] = b"PE\0\0";
const PE32_PLUS_MAGIC: u16 = 0x20B;
const SECTION_HEADER_SIZE: u64 = 40;

const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

const DIRECTORY_EXPORT: u64 = 0;
const DIRECTORY_IMPORT: u64 = 1;

/// Loader for PE32 and PE32+ images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeLoader;

/// Maps the COFF `Machine` field to an architecture.
#[must_use]
pub const fn architecture(machine: u16) -> Architecture {
    match machine {
        0x014C => Architecture::X86,
        0x8664 => Architecture::X86_64,
        0xAA64 => Architecture::Arm64,
        0x01C0 | 0x01C2 | 0x01C4 => Architecture::Arm,
        _ => Architecture::Unknown,
    }
}

/// Normalises section `Characteristics` into permissions.
#[must_use]
pub const fn permissions(characteristics: u32) -> Permissions {
    Permissions {
        read: characteristics & IMAGE_SCN_MEM_READ != 0,
        write: characteristics & IMAGE_SCN_MEM_WRITE != 0,
        execute: characteristics & IMAGE_SCN_MEM_EXECUTE != 0,
    }
}

/// Section header fields needed to translate RVAs.
#[derive(Debug, Clone, Copy)]
struct RvaRange {
    rva: u64,
    span: u64,
    pointer: u64,
}

struct Image<'a> {
    r: ByteReader<'a>,
    image_base: u64,
    is_64: bool,
    ranges: Vec<RvaRange>,
}

/// `image_base + rva`, rejecting images whose base pushes an address past
/// the end of the address space.
fn virtual_address(r: &ByteReader<'_>, image_base: u64, rva: u64) -> Result<Address> {
    image_base
        .checked_add(rva)
        .map(Address::new)
        .ok_or_else(|| r.error(format!("image base {image_base:#x} + RVA {rva:#x} overflows")))
}

impl Image<'_> {
    fn rva_to_offset(&self, rva: u64) -> Option<u64> {
        self.ranges
            .iter()
            .find(|s| rva >= s.rva && rva - s.rva < s.span)
            .map(|s| s.pointer + (rva - s.rva))
    }

    fn offset_of(&self, rva: u64) -> Result<u64> {
        self.rva_to_offset(rva)
            .ok_or_else(|| self.r.error(format!("RVA {rva:#x} is outside every section")))
    }

    fn string_at_rva(&self, rva: u64) -> Result<String> {
        self.r.cstr_at(self.offset_of(rva)?)
    }

    fn imports(&self, dir_rva: u64) -> Result<Vec<Import>> {
        let mut imports = Vec::new();
        let thunk_size: u64 = if self.is_64 { 8 } else { 4 };
        let ordinal_flag: u64 = if self.is_64 { 1 << 63 } else { 1 << 31 };
        let mut descriptor = self.offset_of(dir_rva)?;
        loop {
            let original_first_thunk = u64::from(self.r.u32_at(descriptor)?);
            let name_rva = u64::from(self.r.u32_at(descriptor + 12)?);
            let first_thunk = u64::from(self.r.u32_at(descriptor + 16)?);
            if name_rva == 0 && first_thunk == 0 {
                break;
            }
            let library = self.string_at_rva(name_rva)?;
            let lookup = if original_first_thunk == 0 {
                first_thunk
            } else {
                original_first_thunk
            };
            let mut thunk = self.offset_of(lookup)?;
            let mut index = 0u64;
            loop {
                let mut c = self.r.clone();
                c.seek(thunk);
                let value = c.read_word(self.is_64)?;
                if value == 0 {
                    break;
                }
                let address =
                    virtual_address(&self.r, self.image_base, first_thunk + index * thunk_size)?;
                let import = if value & ordinal_flag != 0 {
                    #[allow(clippy::cast_possible_truncation)]
                    let ordinal = (value & 0xFFFF) as u32;
                    Import {
                        library: library.clone(),
                        name: format!("#{ordinal}"),
                        address,
                        ordinal,
                    }
                } else {
                    // Hint/name entry: a 2-byte hint then the name.
                    let hint_name = self.offset_of(value & 0x7FFF_FFFF)?;
                    Import {
                        library: library.clone(),
                        name: self.r.cstr_at(hint_name + 2)?,
                        address,
                        ordinal: 0,
                    }
                };
                imports.push(import);
                thunk += thunk_size;
                index += 1;
            }
            descriptor += 20;
        }
        Ok(imports)
    }

    fn exports(&self, dir_rva: u64) -> Result<Vec<Export>> {
        let dir = self.offset_of(dir_rva)?;
        let base = self.r.u32_at(dir + 16)?;
        let name_count = self.r.u32_at(dir + 24)?;
        let functions = self.offset_of(u64::from(self.r.u32_at(dir + 28)?))?;
        let names = self.offset_of(u64::from(self.r.u32_at(dir + 32)?))?;
        let ordinals = self.offset_of(u64::from(self.r.u32_at(dir + 36)?))?;

        let mut exports = Vec::with_capacity(name_count.min(4096) as usize);
        for i in 0..u64::from(name_count) {
            let name_rva = u64::from(self.r.u32_at(names + i * 4)?);
            let index = self.r.u16_at(ordinals + i * 2)?;
            let function_rva = u64::from(self.r.u32_at(functions + u64::from(index) * 4)?);
            exports.push(Export {
                name: self.string_at_rva(name_rva)?,
                address: virtual_address(&self.r, self.image_base, function_rva)?,
                ordinal: base.wrapping_add(u32::from(index)),
            });
        }
        Ok(exports)
    }
}

impl BinaryLoader for PeLoader {
    fn format(&self) -> BinaryFormat {
        BinaryFormat::Pe
    }

    fn supports(&self, header: &[u8]) -> bool {
        header.starts_with(b"MZ")
    }

    fn parse(&self, path: &Path, data: Vec<u8>) -> Result<BinaryFile> {
        let r = ByteReader::new(&data, Endianness::Little, FORMAT);
        let pe_offset = u64::from(r.u32_at(0x3C)?);
        if r.slice(pe_offset, 4).ok() != Some(PE_SIGNATURE) {
            return Err(r.error("invalid PE signature"));
        }

        let coff = pe_offset + 4;
        let machine = r.u16_at(coff)?;
        let section_count = r.u16_at(coff + 2)?;
        let optional_size = u64::from(r.u16_at(coff + 16)?);

        let optional = pe_offset + 24;
        let is_64 = r.u16_at(optional)? == PE32_PLUS_MAGIC;
        let entry_rva = u64::from(r.u32_at(optional + 16)?);
        let image_base = if is_64 {
            r.u64_at(optional + 24)?
        } else {
            u64::from(r.u32_at(optional + 28)?)
        };
        let (dir_count_at, dirs_at) = if is_64 {
            (optional + 108, optional + 112)
        } else {
            (optional + 92, optional + 96)
        };
        tracing::debug!(machine, is_64, image_base, section_count, "parsed PE headers");

        let mut sections = Vec::with_capacity(usize::from(section_count));
        let mut ranges = Vec::with_capacity(usize::from(section_count));
        let table = optional + optional_size;
        for i in 0..u64::from(section_count) {
            let at = table + i * SECTION_HEADER_SIZE;
            let name = r.fixed_str_at(at, 8)?;
            let virtual_size = u64::from(r.u32_at(at + 8)?);
            let rva = u64::from(r.u32_at(at + 12)?);
            let raw_size = u64::from(r.u32_at(at + 16)?);
            let pointer = u64::from(r.u32_at(at + 20)?);
            let characteristics = r.u32_at(at + 36)?;
            let span = if virtual_size == 0 { raw_size } else { virtual_size };

            ranges.push(RvaRange {
                rva,
                span: span.max(raw_size),
                pointer,
            });
            sections.push(Section {
                name,
                virtual_address: virtual_address(&r, image_base, rva)?,
                virtual_size: span,
                file_offset: pointer,
                raw_size,
                raw_flags: u64::from(characteristics),
                permissions: permissions(characteristics),
                data: r.slice_clamped(pointer, raw_size).to_vec(),
            });
        }

        let image = Image {
            r: r.clone(),
            image_base,
            is_64,
            ranges,
        };
        let directory_count = u64::from(r.u32_at(dir_count_at).unwrap_or(0));
        let directory = |index: u64| -> Option<u64> {
            if index >= directory_count {
                return None;
            }
            let rva = u64::from(r.u32_at(dirs_at + index * 8).ok()?);
            let size = r.u32_at(dirs_at + index * 8 + 4).ok()?;
            (rva != 0 && size != 0).then_some(rva)
        };

        let imports = directory(DIRECTORY_IMPORT).map_or_else(Vec::new, |rva| {
            image.imports(rva).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed import directory");
                Vec::new()
            })
        });
        let exports = directory(DIRECTORY_EXPORT).map_or_else(Vec::new, |rva| {
            image.exports(rva).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed export directory");
                Vec::new()
            })
        });

        let entry_point = virtual_address(&r, image_base, entry_rva)?;
        Ok(BinaryFile {
            path: path.to_path_buf(),
            format: BinaryFormat::Pe,
            architecture: architecture(machine),
            endianness: Endianness::Little,
            bitness: if is_64 { 64 } else { 32 },
            entry_point,
            sections,
            imports,
            exports,
            raw_data: data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_map() {
        assert_eq!(architecture(0x014C), Architecture::X86);
        assert_eq!(architecture(0x01C4), Architecture::Arm);
        assert_eq!(architecture(0x1234), Architecture::Unknown);
    }

    #[test]
    fn characteristics_map_to_permissions() {
        assert_eq!(permissions(0x6000_0020), Permissions::CODE);
        assert_eq!(permissions(0xC000_0040), Permissions::DATA);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut data = vec![0u8; 0x80];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3C] = 0x40;
        data[0x40..0x44].copy_from_slice(b"NE\0\0");
        let err = PeLoader.parse(Path::new("t.exe"), data).unwrap_err();
        assert_eq!(err.to_string(), "malformed PE image: invalid PE signature");
    }
}
