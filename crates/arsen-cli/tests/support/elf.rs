//! A minimal x86-64 ELF with `.text` at 0x401000, shared by the unit and
//! end-to-end tests.
#![allow(clippy::expect_used, clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

/// `.text` contents: a caller at 0x401000 and its callee at 0x40100B.
const CODE: [u8; 14] = [
    0x55, 0x48, 0x89, 0xE5, // push rbp; mov rbp, rsp
    0xE8, 0x02, 0x00, 0x00, 0x00, // call 40100B
    0x5D, 0xC3, // pop rbp; ret
    0x31, 0xC0, 0xC3, // xor eax, eax; ret
];

fn put(out: &mut Vec<u8>, values: &[(u64, usize)]) {
    for &(v, width) in values {
        out.extend_from_slice(&v.to_le_bytes()[..width]);
    }
}

/// The image bytes.
fn elf_image() -> Vec<u8> {
    const SHSTRTAB: &[u8] = b"\0.text\0.shstrtab\0";
    let shstr_offset = 0x40 + CODE.len() as u64;
    let shoff = (shstr_offset + SHSTRTAB.len() as u64).next_multiple_of(8);

    let mut out = vec![0x7F, b'E', b'L', b'F', 2, 1, 1];
    out.resize(16, 0);
    put(
        &mut out,
        &[
            (2, 2),
            (62, 2),
            (1, 4),
            (0x40_1000, 8),
            (0, 8),
            (shoff, 8),
            (0, 4),
            (64, 2),
            (0, 2),
            (0, 2),
            (64, 2),
            (3, 2),
            (2, 2),
        ],
    );
    out.extend_from_slice(&CODE);
    out.extend_from_slice(SHSTRTAB);
    out.resize(shoff as usize, 0);
    out.resize(out.len() + 64, 0);
    for (name, kind, flags, addr, offset, size) in [
        (1, 1, 6, 0x40_1000, 0x40, CODE.len() as u64),
        (7, 3, 0, 0, shstr_offset, SHSTRTAB.len() as u64),
    ] {
        put(
            &mut out,
            &[
                (name, 4),
                (kind, 4),
                (flags, 8),
                (addr, 8),
                (offset, 8),
                (size, 8),
                (0, 4),
                (0, 4),
                (1, 8),
                (0, 8),
            ],
        );
    }
    out
}

/// Writes the image to `dir/tiny.elf`.
pub fn write_elf(dir: &Path) -> PathBuf {
    let path = dir.join("tiny.elf");
    std::fs::write(&path, elf_image()).expect("write elf");
    path
}
