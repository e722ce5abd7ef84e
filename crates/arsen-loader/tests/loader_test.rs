//! Loader tests over synthetic ELF, PE, and Mach-O images built in memory.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_possible_truncation)]

use std::path::Path;

use arsen_common::types::{Address, Architecture, BinaryFormat, Endianness, Permissions};
use arsen_loader::{BinaryLoader, ElfLoader, LoaderRegistry, MachOLoader, PeLoader};

struct Out {
    buf: Vec<u8>,
    big: bool,
}

impl Out {
    fn new(big: bool) -> Self {
        Self { buf: Vec::new(), big }
    }

    fn u16(&mut self, v: u16) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&b);
    }

    fn u32(&mut self, v: u32) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&b);
    }

    fn u64(&mut self, v: u64) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.buf.extend_from_slice(&b);
    }

    fn word(&mut self, is_64: bool, v: u64) {
        if is_64 { self.u64(v) } else { self.u32(v as u32) }
    }

    fn pad_to(&mut self, len: usize) {
        let len = len.max(self.buf.len());
        self.buf.resize(len, 0);
    }

    fn name(&mut self, name: &str, width: usize) {
        let start = self.buf.len();
        self.buf.extend_from_slice(name.as_bytes());
        self.pad_to(start + width);
    }
}

// ---------------------------------------------------------------- ELF

struct ElfSection {
    name: &'static str,
    kind: u32,
    flags: u64,
    addr: u64,
    size: u64,
    link: u32,
    entsize: u64,
    data: Vec<u8>,
}

fn elf_section(name: &'static str, kind: u32, flags: u64, addr: u64, data: Vec<u8>) -> ElfSection {
    ElfSection {
        name,
        kind,
        flags,
        addr,
        size: data.len() as u64,
        link: 0,
        entsize: 0,
        data,
    }
}

fn build_elf(is_64: bool, big: bool, machine: u16, entry: u64, sections: &[ElfSection]) -> Vec<u8> {
    let ehsize: usize = if is_64 { 64 } else { 52 };
    let shentsize: usize = if is_64 { 64 } else { 40 };

    let mut shstr = vec![0u8];
    let mut name_offsets = Vec::new();
    for s in sections {
        name_offsets.push(shstr.len() as u32);
        shstr.extend_from_slice(s.name.as_bytes());
        shstr.push(0);
    }
    let shstr_name = shstr.len() as u32;
    shstr.extend_from_slice(b".shstrtab\0");

    let mut offsets = Vec::new();
    let mut cursor = ehsize.next_multiple_of(16);
    for s in sections {
        offsets.push(cursor);
        cursor = (cursor + s.data.len()).next_multiple_of(16);
    }
    let shstr_offset = cursor;
    let shoff = (cursor + shstr.len()).next_multiple_of(8);
    let shnum = sections.len() + 2;

    let mut out = Out::new(big);
    out.buf
        .extend_from_slice(&[0x7F, b'E', b'L', b'F', if is_64 { 2 } else { 1 }, if big { 2 } else { 1 }, 1]);
    out.pad_to(16);
    out.u16(2);
    out.u16(machine);
    out.u32(1);
    out.word(is_64, entry);
    out.word(is_64, 0);
    out.word(is_64, shoff as u64);
    out.u32(0);
    out.u16(ehsize as u16);
    out.u16(0);
    out.u16(0);
    out.u16(shentsize as u16);
    out.u16(shnum as u16);
    out.u16((shnum - 1) as u16);

    for (s, off) in sections.iter().zip(&offsets) {
        out.pad_to(*off);
        out.buf.extend_from_slice(&s.data);
    }
    out.pad_to(shstr_offset);
    out.buf.extend_from_slice(&shstr);
    out.pad_to(shoff);
    out.pad_to(shoff + shentsize);

    let header = |out: &mut Out, name: u32, kind: u32, flags: u64, addr: u64, off: u64, size: u64, link: u32, entsize: u64| {
        out.u32(name);
        out.u32(kind);
        out.word(is_64, flags);
        out.word(is_64, addr);
        out.word(is_64, off);
        out.word(is_64, size);
        out.u32(link);
        out.u32(0);
        out.word(is_64, 1);
        out.word(is_64, entsize);
    };
    for ((s, off), name) in sections.iter().zip(&offsets).zip(&name_offsets) {
        header(&mut out, *name, s.kind, s.flags, s.addr, *off as u64, s.size, s.link, s.entsize);
    }
    header(&mut out, shstr_name, 3, 0, 0, shstr_offset as u64, shstr.len() as u64, 0, 0);
    out.buf
}

fn elf64_symbol(out: &mut Out, name: u32, info: u8, shndx: u16, value: u64) {
    out.u32(name);
    out.buf.push(info);
    out.buf.push(0);
    out.u16(shndx);
    out.u64(value);
    out.u64(0);
}

fn sample_elf() -> Vec<u8> {
    let strtab = b"\0main\0puts\0helper\0counter\0".to_vec();
    let mut symtab = Out::new(false);
    symtab.pad_to(24);
    elf64_symbol(&mut symtab, 1, 0x12, 1, 0x40_1000); // main: GLOBAL FUNC
    elf64_symbol(&mut symtab, 6, 0x10, 0, 0); // puts: undefined
    elf64_symbol(&mut symtab, 11, 0x02, 1, 0x40_1010); // helper: LOCAL FUNC
    elf64_symbol(&mut symtab, 18, 0x11, 2, 0x40_2000); // counter: GLOBAL OBJECT
    elf64_symbol(&mut symtab, 1, 0x12, 1, 0x40_1000); // duplicate main

    let mut bss = elf_section(".bss", 8, 0x3, 0x40_3000, Vec::new());
    bss.size = 0x100;
    let mut sym = elf_section(".symtab", 2, 0, 0, symtab.buf);
    sym.link = 5;
    sym.entsize = 24;

    build_elf(
        true,
        false,
        62,
        0x40_1000,
        &[
            elf_section(".text", 1, 0x6, 0x40_1000, vec![0x55, 0x48, 0x89, 0xE5, 0xC3]),
            elf_section(".data", 1, 0x3, 0x40_2000, vec![1, 2, 3, 4]),
            bss,
            sym,
            elf_section(".strtab", 3, 0, 0, strtab),
        ],
    )
}

#[test]
fn elf64_header_and_sections() {
    let bin = ElfLoader.parse(Path::new("a.out"), sample_elf()).expect("parse ELF");
    assert_eq!(bin.format, BinaryFormat::Elf);
    assert_eq!(bin.architecture, Architecture::X86_64);
    assert_eq!(bin.endianness, Endianness::Little);
    assert_eq!(bin.bitness, 64);
    assert_eq!(bin.entry_point, Address::new(0x40_1000));

    let names: Vec<&str> = bin.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, [".text", ".data", ".bss", ".symtab", ".strtab", ".shstrtab"]);

    let text = bin.section_by_name(".text").expect("text");
    assert_eq!(text.permissions, Permissions::CODE);
    assert_eq!(text.data, [0x55, 0x48, 0x89, 0xE5, 0xC3]);
    assert!(bin.section_by_name(".data").expect("data").is_writable());

    let bss = bin.section_by_name(".bss").expect("bss");
    assert!(bss.data.is_empty());
    assert_eq!(bss.virtual_size, 0x100);
    assert!(!bin.section_by_name(".strtab").expect("strtab").is_readable());
}

#[test]
fn elf_symbols_become_imports_and_exports() {
    let bin = ElfLoader.parse(Path::new("a.out"), sample_elf()).expect("parse ELF");
    let exports: Vec<(&str, u64)> = bin
        .exports
        .iter()
        .map(|e| (e.name.as_str(), e.address.value()))
        .collect();
    assert_eq!(exports, [("main", 0x40_1000), ("counter", 0x40_2000)]);
    assert_eq!(bin.imports.len(), 1);
    assert_eq!(bin.imports[0].name, "puts");
    assert!(bin.imports[0].library.is_empty());
}

#[test]
fn elf32_big_endian_powerpc() {
    let data = build_elf(
        false,
        true,
        20,
        0x1000_0000,
        &[elf_section(".text", 1, 0x6, 0x1000_0000, vec![0x60, 0, 0, 0, 0x4E, 0x80, 0, 0x20])],
    );
    let bin = ElfLoader.parse(Path::new("ppc.elf"), data).expect("parse ELF32");
    assert_eq!(bin.architecture, Architecture::PowerPc);
    assert_eq!(bin.endianness, Endianness::Big);
    assert_eq!(bin.bitness, 32);
    assert_eq!(bin.entry_point, Address::new(0x1000_0000));
    assert_eq!(bin.sections[0].name, ".text");
    assert!(bin.sections[0].is_executable());
}

#[test]
fn elf_section_past_end_of_file_has_no_data() {
    let mut data = sample_elf();
    // Point .text's sh_offset past the end of the file.
    let shoff = u64::from_le_bytes(data[0x28..0x30].try_into().expect("shoff")) as usize;
    let text_header = shoff + 64;
    data[text_header + 24..text_header + 32].copy_from_slice(&0xFFFF_0000u64.to_le_bytes());
    let bin = ElfLoader.parse(Path::new("a.out"), data).expect("parse ELF");
    assert!(bin.section_by_name(".text").expect("text").data.is_empty());
}

#[test]
fn registry_loads_elf_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sample.elf");
    std::fs::write(&path, sample_elf()).expect("write");
    let registry = LoaderRegistry::new();
    assert_eq!(registry.probe(&path).expect("probe").format(), BinaryFormat::Elf);
    let bin = registry.load(&path).expect("load");
    assert_eq!(bin.path, path);
    assert_eq!(bin.raw_data.len(), sample_elf().len());
}

// ---------------------------------------------------------------- PE

const IMAGE_BASE: u64 = 0x1_4000_0000;

fn put16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut [u8], at: usize, s: &str) {
    buf[at..at + s.len()].copy_from_slice(s.as_bytes());
}

/// PE32+ x86-64 image with `.text` at RVA 0x1000 and `.rdata` at RVA 0x2000
/// holding one import descriptor and an export directory.
fn sample_pe(import_rva: u32) -> Vec<u8> {
    let mut d = vec![0u8; 0x600];
    d[0] = b'M';
    d[1] = b'Z';
    put32(&mut d, 0x3C, 0x80);
    put_str(&mut d, 0x80, "PE\0\0");
    let coff = 0x84;
    put16(&mut d, coff, 0x8664);
    put16(&mut d, coff + 2, 2);
    put16(&mut d, coff + 16, 240);
    let opt = 0x98;
    put16(&mut d, opt, 0x20B);
    put32(&mut d, opt + 16, 0x1000);
    put64(&mut d, opt + 24, IMAGE_BASE);
    put32(&mut d, opt + 108, 16);
    put32(&mut d, opt + 112, 0x2100);
    put32(&mut d, opt + 116, 0x100);
    put32(&mut d, opt + 120, import_rva);
    put32(&mut d, opt + 124, 0x28);

    let sections = opt + 240;
    put_str(&mut d, sections, ".text");
    put32(&mut d, sections + 8, 0x200);
    put32(&mut d, sections + 12, 0x1000);
    put32(&mut d, sections + 16, 0x200);
    put32(&mut d, sections + 20, 0x200);
    put32(&mut d, sections + 36, 0x6000_0020);
    let rdata = sections + 40;
    put_str(&mut d, rdata, ".rdata");
    put32(&mut d, rdata + 8, 0x200);
    put32(&mut d, rdata + 12, 0x2000);
    put32(&mut d, rdata + 16, 0x200);
    put32(&mut d, rdata + 20, 0x400);
    put32(&mut d, rdata + 36, 0x4000_0040);

    d[0x200] = 0xC3;
    let file = |rva: usize| rva - 0x2000 + 0x400;

    // Import descriptor, then a zero terminator.
    put32(&mut d, file(0x2000), 0x2040);
    put32(&mut d, file(0x2000) + 12, 0x2080);
    put32(&mut d, file(0x2000) + 16, 0x2060);
    put64(&mut d, file(0x2040), 0x20A0);
    put64(&mut d, file(0x2048), 0x8000_0000_0000_0007);
    put64(&mut d, file(0x2060), 0x20A0);
    put64(&mut d, file(0x2068), 0x8000_0000_0000_0007);
    put_str(&mut d, file(0x2080), "KERNEL32.dll");
    put_str(&mut d, file(0x20A2), "ExitProcess");

    // Export directory.
    let exp = file(0x2100);
    put32(&mut d, exp + 12, 0x2180);
    put32(&mut d, exp + 16, 1);
    put32(&mut d, exp + 20, 2);
    put32(&mut d, exp + 24, 2);
    put32(&mut d, exp + 28, 0x2140);
    put32(&mut d, exp + 32, 0x2150);
    put32(&mut d, exp + 36, 0x2160);
    put32(&mut d, file(0x2140), 0x1000);
    put32(&mut d, file(0x2144), 0x1010);
    put32(&mut d, file(0x2150), 0x2190);
    put32(&mut d, file(0x2154), 0x21A0);
    put16(&mut d, file(0x2160), 0);
    put16(&mut d, file(0x2162), 1);
    put_str(&mut d, file(0x2180), "test.dll");
    put_str(&mut d, file(0x2190), "alpha");
    put_str(&mut d, file(0x21A0), "beta");
    d
}

#[test]
fn pe_headers_and_sections() {
    let bin = PeLoader.parse(Path::new("t.exe"), sample_pe(0x2000)).expect("parse PE");
    assert_eq!(bin.format, BinaryFormat::Pe);
    assert_eq!(bin.architecture, Architecture::X86_64);
    assert_eq!(bin.bitness, 64);
    assert_eq!(bin.entry_point, Address::new(IMAGE_BASE + 0x1000));

    let text = bin.section_by_name(".text").expect("text");
    assert_eq!(text.virtual_address, Address::new(IMAGE_BASE + 0x1000));
    assert_eq!(text.permissions, Permissions::CODE);
    assert_eq!(text.data.len(), 0x200);
    assert_eq!(text.data[0], 0xC3);
    assert_eq!(
        bin.section_by_name(".rdata").expect("rdata").permissions,
        Permissions::READ_ONLY
    );
    assert_eq!(bin.file_offset_to_address(0x210), Some(Address::new(IMAGE_BASE + 0x1010)));
}

#[test]
fn pe_import_directory() {
    let bin = PeLoader.parse(Path::new("t.exe"), sample_pe(0x2000)).expect("parse PE");
    assert_eq!(bin.imports.len(), 2);
    assert_eq!(bin.imports[0].library, "KERNEL32.dll");
    assert_eq!(bin.imports[0].name, "ExitProcess");
    assert_eq!(bin.imports[0].address, Address::new(IMAGE_BASE + 0x2060));
    assert_eq!(bin.imports[1].name, "#7");
    assert_eq!(bin.imports[1].ordinal, 7);
    assert_eq!(bin.imports[1].address, Address::new(IMAGE_BASE + 0x2068));
}

#[test]
fn pe_export_directory() {
    let bin = PeLoader.parse(Path::new("t.dll"), sample_pe(0x2000)).expect("parse PE");
    let exports: Vec<(&str, u64, u32)> = bin
        .exports
        .iter()
        .map(|e| (e.name.as_str(), e.address.value(), e.ordinal))
        .collect();
    assert_eq!(
        exports,
        [("alpha", IMAGE_BASE + 0x1000, 1), ("beta", IMAGE_BASE + 0x1010, 2)]
    );
}

#[test]
fn pe_bad_import_directory_is_skipped() {
    let bin = PeLoader.parse(Path::new("t.exe"), sample_pe(0x9000)).expect("parse PE");
    assert!(bin.imports.is_empty());
    assert_eq!(bin.exports.len(), 2);
}

#[test]
fn pe_truncated_section_table_is_malformed() {
    let mut data = sample_pe(0x2000);
    data.truncate(0x190);
    let err = PeLoader.parse(Path::new("t.exe"), data).unwrap_err();
    assert!(err.to_string().starts_with("malformed PE image"));
}

#[test]
fn pe_image_base_overflow_is_malformed() {
    let mut data = sample_pe(0x2000);
    put64(&mut data, 0x98 + 24, 0xFFFF_FFFF_FFFF_F000);
    let err = PeLoader.parse(Path::new("t.exe"), data).unwrap_err();
    assert!(err.to_string().starts_with("malformed PE image"));
    assert!(err.to_string().contains("overflows"));
}

// ---------------------------------------------------------------- Mach-O

fn sample_macho() -> Vec<u8> {
    let mut out = Out::new(false);
    out.u32(0xFEED_FACF);
    out.u32(0x0100_000C);
    out.u32(0);
    out.u32(2);
    out.u32(2);
    out.u32(152 + 24);
    out.u32(0);
    out.u32(0);

    out.u32(0x19);
    out.u32(152);
    out.name("__TEXT", 16);
    out.u64(0x1_0000_0000);
    out.u64(0x1000);
    out.u64(0);
    out.u64(0x1000);
    out.u32(5);
    out.u32(5);
    out.u32(1);
    out.u32(0);

    out.name("__text", 16);
    out.name("__TEXT", 16);
    out.u64(0x1_0000_0400);
    out.u64(8);
    out.u32(0x400);
    out.u32(2);
    out.u32(0);
    out.u32(0);
    out.u32(0x8000_0400);
    out.u32(0);
    out.u32(0);
    out.u32(0);

    out.u32(0x8000_0028);
    out.u32(24);
    out.u64(0x400);
    out.u64(0);

    out.pad_to(0x400);
    // nop; ret
    out.buf.extend_from_slice(&[0x1F, 0x20, 0x03, 0xD5, 0xC0, 0x03, 0x5F, 0xD6]);
    out.buf
}

#[test]
fn macho64_segments_and_entry() {
    let bin = MachOLoader.parse(Path::new("a.macho"), sample_macho()).expect("parse Mach-O");
    assert_eq!(bin.format, BinaryFormat::MachO);
    assert_eq!(bin.architecture, Architecture::Arm64);
    assert_eq!(bin.endianness, Endianness::Little);
    assert_eq!(bin.bitness, 64);
    assert_eq!(bin.entry_point, Address::new(0x1_0000_0400));
    assert_eq!(bin.sections.len(), 1);
    let text = &bin.sections[0];
    assert_eq!(text.name, "__TEXT,__text");
    assert_eq!(text.permissions, Permissions::CODE);
    assert_eq!(text.data.len(), 8);
}

#[test]
fn macho_big_endian_without_entry() {
    let mut out = Out::new(true);
    out.u32(0xFEED_FACE);
    out.u32(18);
    out.u32(0);
    out.u32(2);
    out.u32(0);
    out.u32(0);
    out.u32(0);
    let registry = LoaderRegistry::new();
    let bin = registry.parse(Path::new("ppc.macho"), out.buf).expect("parse");
    assert_eq!(bin.format, BinaryFormat::MachO);
    assert_eq!(bin.endianness, Endianness::Big);
    assert_eq!(bin.architecture, Architecture::PowerPc);
    assert_eq!(bin.bitness, 32);
    assert_eq!(bin.entry_point, Address::new(0));
}
