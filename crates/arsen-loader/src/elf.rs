//! ELF (Executable and Linkable Format) loader.
//!
//! Reads the file header, the section header table, and the static and
//! dynamic symbol tables. Program headers are not consulted.

use std::collections::HashSet;
use std::path::Path;

use arsen_common::binary::{BinaryFile, Export, Import, Section};
use arsen_common::error::Result;
use arsen_common::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};

use crate::BinaryLoader;
use crate::reader::ByteReader;

const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const FORMAT: &str = "ELF";

const SHT_NULL: u32 = 0;
const SHT_SYMTAB: u32 = 2;
const SHT_NOBITS: u32 = 8;
const SHT_DYNSYM: u32 = 11;

const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;
const SHF_EXECINSTR: u64 = 0x4;

const STB_GLOBAL: u8 = 1;
const STB_WEAK: u8 = 2;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;

/// Loader for ELF images, 32- and 64-bit, either byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElfLoader;

#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

/// Maps `e_machine` to an architecture.
#[must_use]
pub const fn architecture(machine: u16) -> Architecture {
    match machine {
        3 => Architecture::X86,
        62 => Architecture::X86_64,
        40 => Architecture::Arm,
        183 => Architecture::Arm64,
        8 => Architecture::Mips,
        20 | 21 => Architecture::PowerPc,
        _ => Architecture::Unknown,
    }
}

/// Normalises `sh_flags` into section permissions.
#[must_use]
pub const fn permissions(flags: u64) -> Permissions {
    Permissions {
        read: flags & SHF_ALLOC != 0,
        write: flags & SHF_WRITE != 0,
        execute: flags & SHF_EXECINSTR != 0,
    }
}

impl BinaryLoader for ElfLoader {
    fn format(&self) -> BinaryFormat {
        BinaryFormat::Elf
    }

    fn supports(&self, header: &[u8]) -> bool {
        header.starts_with(&MAGIC)
    }

    fn parse(&self, path: &Path, data: Vec<u8>) -> Result<BinaryFile> {
        let probe = ByteReader::new(&data, Endianness::Little, FORMAT);
        if probe.slice(0, 4)? != MAGIC {
            return Err(probe.error("invalid ELF magic"));
        }
        let is_64 = probe.u8_at(4)? == 2;
        let endianness = if probe.u8_at(5)? == 1 {
            Endianness::Little
        } else {
            Endianness::Big
        };
        let r = ByteReader::new(&data, endianness, FORMAT);

        let machine = r.u16_at(18)?;
        let (entry, shoff, shentsize, shnum, shstrndx) = if is_64 {
            (
                r.u64_at(0x18)?,
                r.u64_at(0x28)?,
                r.u16_at(0x3A)?,
                r.u16_at(0x3C)?,
                r.u16_at(0x3E)?,
            )
        } else {
            (
                u64::from(r.u32_at(0x18)?),
                u64::from(r.u32_at(0x20)?),
                r.u16_at(0x2E)?,
                r.u16_at(0x30)?,
                r.u16_at(0x32)?,
            )
        };
        tracing::debug!(is_64, machine, shnum, "parsed ELF header");

        let headers = read_section_headers(&r, is_64, shoff, shentsize, shnum)?;
        let strtab = headers.get(usize::from(shstrndx)).copied();

        let mut sections = Vec::with_capacity(headers.len());
        for (index, sh) in headers.iter().enumerate() {
            if sh.kind == SHT_NULL {
                continue;
            }
            let name = strtab
                .and_then(|st| r.cstr_at(st.offset.saturating_add(u64::from(sh.name))).ok())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("SECTION_{index}"));
            let contents = if sh.kind == SHT_NOBITS {
                &[][..]
            } else {
                r.slice_clamped(sh.offset, sh.size)
            };
            sections.push(Section {
                name,
                virtual_address: Address::new(sh.addr),
                virtual_size: sh.size,
                file_offset: sh.offset,
                raw_size: if sh.kind == SHT_NOBITS { 0 } else { sh.size },
                raw_flags: sh.flags,
                permissions: permissions(sh.flags),
                data: contents.to_vec(),
            });
        }

        let (imports, exports) = match read_symbols(&r, is_64, &headers) {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping ELF symbol tables");
                (Vec::new(), Vec::new())
            }
        };

        Ok(BinaryFile {
            path: path.to_path_buf(),
            format: BinaryFormat::Elf,
            architecture: architecture(machine),
            endianness,
            bitness: if is_64 { 64 } else { 32 },
            entry_point: Address::new(entry),
            sections,
            imports,
            exports,
            raw_data: data,
        })
    }
}

fn read_section_headers(
    r: &ByteReader<'_>,
    is_64: bool,
    shoff: u64,
    shentsize: u16,
    shnum: u16,
) -> Result<Vec<SectionHeader>> {
    if shoff == 0 || shnum == 0 {
        return Ok(Vec::new());
    }
    let entsize = if shentsize == 0 {
        if is_64 { 64 } else { 40 }
    } else {
        u64::from(shentsize)
    };
    let mut headers = Vec::with_capacity(usize::from(shnum));
    for i in 0..u64::from(shnum) {
        let mut c = r.clone();
        c.seek(shoff.saturating_add(i * entsize));
        let name = c.read_u32()?;
        let kind = c.read_u32()?;
        let header = if is_64 {
            let flags = c.read_u64()?;
            let addr = c.read_u64()?;
            let offset = c.read_u64()?;
            let size = c.read_u64()?;
            let link = c.read_u32()?;
            c.skip(4 + 8);
            let entsize = c.read_u64()?;
            SectionHeader { name, kind, flags, addr, offset, size, link, entsize }
        } else {
            let flags = u64::from(c.read_u32()?);
            let addr = u64::from(c.read_u32()?);
            let offset = u64::from(c.read_u32()?);
            let size = u64::from(c.read_u32()?);
            let link = c.read_u32()?;
            c.skip(4 + 4);
            let entsize = u64::from(c.read_u32()?);
            SectionHeader { name, kind, flags, addr, offset, size, link, entsize }
        };
        headers.push(header);
    }
    Ok(headers)
}

fn read_symbols(
    r: &ByteReader<'_>,
    is_64: bool,
    headers: &[SectionHeader],
) -> Result<(Vec<Import>, Vec<Export>)> {
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut seen_imports = HashSet::new();
    let mut seen_exports = HashSet::new();

    for table in headers
        .iter()
        .filter(|h| h.kind == SHT_SYMTAB || h.kind == SHT_DYNSYM)
    {
        let Some(strtab) = usize::try_from(table.link).ok().and_then(|i| headers.get(i)) else {
            continue;
        };
        let entsize = if table.entsize == 0 {
            if is_64 { 24 } else { 16 }
        } else {
            table.entsize
        };
        let count = table.size / entsize;
        // Entry 0 is the reserved null symbol.
        for i in 1..count {
            let mut c = r.clone();
            c.seek(table.offset.saturating_add(i * entsize));
            let (name_off, info, shndx, value) = if is_64 {
                let name = c.read_u32()?;
                let info = c.read_u8()?;
                c.skip(1);
                let shndx = c.read_u16()?;
                let value = c.read_u64()?;
                (name, info, shndx, value)
            } else {
                let name = c.read_u32()?;
                let value = u64::from(c.read_u32()?);
                c.skip(4);
                let info = c.read_u8()?;
                c.skip(1);
                let shndx = c.read_u16()?;
                (name, info, shndx, value)
            };
            if name_off == 0 {
                continue;
            }
            let name = r.cstr_at(strtab.offset.saturating_add(u64::from(name_off)))?;
            if name.is_empty() {
                continue;
            }
            let bind = info >> 4;
            let kind = info & 0xF;
            if shndx == 0 {
                if seen_imports.insert(name.clone()) {
                    imports.push(Import {
                        library: String::new(),
                        name,
                        address: Address::new(value),
                        ordinal: 0,
                    });
                }
            } else if matches!(kind, STT_FUNC | STT_OBJECT)
                && matches!(bind, STB_GLOBAL | STB_WEAK)
                && seen_exports.insert(name.clone())
            {
                exports.push(Export {
                    name,
                    address: Address::new(value),
                    ordinal: 0,
                });
            }
        }
    }
    Ok((imports, exports))
}
