//! Mach-O loader.
//!
//! Reads the header and walks the load commands for segments and the
//! `LC_MAIN` entry point. Fat (universal) archives are not handled.

use std::collections::HashMap;
use std::path::Path;

use arsen_common::binary::{BinaryFile, Section};
use arsen_common::error::Result;
use arsen_common::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};

use crate::BinaryLoader;
use crate::reader::ByteReader;

const FORMAT: &str = "Mach-O";

const MH_MAGIC: u32 = 0xFEED_FACE;
const MH_MAGIC_64: u32 = 0xFEED_FACF;
const MH_CIGAM: u32 = 0xCEFA_EDFE;
const MH_CIGAM_64: u32 = 0xCFFA_EDFE;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;
const LC_MAIN: u32 = 0x8000_0028;

const VM_PROT_READ: u32 = 0x1;
const VM_PROT_WRITE: u32 = 0x2;
const VM_PROT_EXECUTE: u32 = 0x4;

const S_ZEROFILL: u32 = 0x1;

/// Loader for thin 32- and 64-bit Mach-O images.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachOLoader;

/// Maps the header `cputype` to an architecture.
#[must_use]
pub const fn architecture(cpu_type: u32) -> Architecture {
    match cpu_type {
        7 => Architecture::X86,
        0x0100_0007 => Architecture::X86_64,
        12 => Architecture::Arm,
        0x0100_000C => Architecture::Arm64,
        18 => Architecture::PowerPc,
        _ => Architecture::Unknown,
    }
}

/// Normalises a segment's `initprot` into permissions.
#[must_use]
pub const fn permissions(initprot: u32) -> Permissions {
    Permissions {
        read: initprot & VM_PROT_READ != 0,
        write: initprot & VM_PROT_WRITE != 0,
        execute: initprot & VM_PROT_EXECUTE != 0,
    }
}

/// Decodes the magic, read little-endian, into byte order and bitness.
fn classify(magic: u32) -> Option<(Endianness, bool)> {
    match magic {
        MH_MAGIC => Some((Endianness::Little, false)),
        MH_MAGIC_64 => Some((Endianness::Little, true)),
        MH_CIGAM => Some((Endianness::Big, false)),
        MH_CIGAM_64 => Some((Endianness::Big, true)),
        _ => None,
    }
}

fn le_magic(header: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = header.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

impl BinaryLoader for MachOLoader {
    fn format(&self) -> BinaryFormat {
        BinaryFormat::MachO
    }

    fn supports(&self, header: &[u8]) -> bool {
        le_magic(header).and_then(classify).is_some()
    }

    fn parse(&self, path: &Path, data: Vec<u8>) -> Result<BinaryFile> {
        let probe = ByteReader::new(&data, Endianness::Little, FORMAT);
        let magic = probe.u32_at(0)?;
        let (endianness, is_64) =
            classify(magic).ok_or_else(|| probe.error(format!("invalid magic {magic:#010x}")))?;
        let r = ByteReader::new(&data, endianness, FORMAT);

        let cpu_type = r.u32_at(4)?;
        let command_count = r.u32_at(16)?;
        let mut at: u64 = if is_64 { 32 } else { 28 };
        tracing::debug!(cpu_type, is_64, command_count, "parsed Mach-O header");

        let mut sections = Vec::new();
        let mut segments: HashMap<String, u64> = HashMap::new();
        let mut entry_offset = None;

        for _ in 0..command_count {
            let (cmd, size) = match (r.u32_at(at), r.u32_at(at + 4)) {
                (Ok(cmd), Ok(size)) if size >= 8 => (cmd, u64::from(size)),
                _ => {
                    tracing::warn!(path = %path.display(), offset = at, "truncated load command list");
                    break;
                }
            };
            match cmd {
                LC_SEGMENT | LC_SEGMENT_64 => {
                    let is_seg64 = cmd == LC_SEGMENT_64;
                    let (name, vmaddr) = read_segment(&r, at, is_seg64, &mut sections)?;
                    let _ = segments.entry(name).or_insert(vmaddr);
                }
                LC_MAIN => entry_offset = Some(r.u64_at(at + 8)?),
                _ => {}
            }
            at += size;
        }

        let text_base = segments.get("__TEXT").copied().unwrap_or(0);
        let entry = entry_offset.map_or(0, |off| text_base.wrapping_add(off));

        Ok(BinaryFile {
            path: path.to_path_buf(),
            format: BinaryFormat::MachO,
            architecture: architecture(cpu_type),
            endianness,
            bitness: if is_64 { 64 } else { 32 },
            entry_point: Address::new(entry),
            sections,
            imports: Vec::new(),
            exports: Vec::new(),
            raw_data: data,
        })
    }
}

/// Reads one segment command and appends its sections. Returns the segment
/// name and base address.
fn read_segment(
    r: &ByteReader<'_>,
    at: u64,
    is_64: bool,
    sections: &mut Vec<Section>,
) -> Result<(String, u64)> {
    let segment = r.fixed_str_at(at + 8, 16)?;
    let mut c = r.clone();
    c.seek(at + 24);
    let vmaddr = c.read_word(is_64)?;
    let _vmsize = c.read_word(is_64)?;
    let _fileoff = c.read_word(is_64)?;
    let _filesize = c.read_word(is_64)?;
    let _maxprot = c.read_u32()?;
    let initprot = c.read_u32()?;
    let nsects = c.read_u32()?;
    let _flags = c.read_u32()?;

    let header_size: u64 = if is_64 { 80 } else { 68 };
    let first = c.position();
    for i in 0..u64::from(nsects) {
        let base = first + i * header_size;
        let name = r.fixed_str_at(base, 16)?;
        let mut s = r.clone();
        s.seek(base + 32);
        let addr = s.read_word(is_64)?;
        let size = s.read_word(is_64)?;
        let offset = u64::from(s.read_u32()?);
        s.skip(12);
        let flags = s.read_u32()?;
        let zerofill = flags & 0xFF == S_ZEROFILL;
        let data = if zerofill || offset == 0 {
            Vec::new()
        } else {
            r.slice_clamped(offset, size).to_vec()
        };
        sections.push(Section {
            name: format!("{segment},{name}"),
            virtual_address: Address::new(addr),
            virtual_size: size,
            file_offset: offset,
            raw_size: if zerofill { 0 } else { size },
            raw_flags: u64::from(flags),
            permissions: permissions(initprot),
            data,
        });
    }
    Ok((segment, vmaddr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_selects_byte_order() {
        assert_eq!(classify(MH_MAGIC_64), Some((Endianness::Little, true)));
        assert_eq!(classify(MH_CIGAM), Some((Endianness::Big, false)));
        assert_eq!(classify(0), None);
    }

    #[test]
    fn supports_reads_magic_little_endian() {
        assert!(MachOLoader.supports(&[0xCF, 0xFA, 0xED, 0xFE, 0x07]));
        assert!(MachOLoader.supports(&[0xFE, 0xED, 0xFA, 0xCE]));
        assert!(!MachOLoader.supports(&[0xCF, 0xFA]));
    }

    #[test]
    fn cpu_map() {
        assert_eq!(architecture(0x0100_000C), Architecture::Arm64);
        assert_eq!(architecture(18), Architecture::PowerPc);
    }
}
