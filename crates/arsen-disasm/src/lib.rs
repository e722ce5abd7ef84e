//! # arsen-disasm
//!
//! Table-driven instruction decoders for the architectures Arsen loads.
//!
//! Every decoder implements [`Disassembler`] and never fails: bytes it
//! cannot make sense of come back as a data directive (`db`, `.word`,
//! `.long`), and reads past the end of the buffer come back as an
//! `invalid` instruction. Use [`create`] to pick a decoder for a binary.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod arm;
pub mod mips;
pub mod powerpc;
pub mod x86;

use arsen_common::disassembly::{Instruction, InstructionType};
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::{Address, Architecture, Endianness};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub use arm::ArmDisassembler;
pub use mips::MipsDisassembler;
pub use powerpc::PowerPcDisassembler;
pub use x86::X86Disassembler;

/// An instruction decoder for one architecture.
pub trait Disassembler: Send + Sync {
    /// Architecture this decoder handles.
    fn architecture(&self) -> Architecture;

    /// Decodes the instruction at `data[offset..]`, which is mapped at
    /// `address`. Never fails.
    fn disassemble(&self, address: Address, data: &[u8], offset: usize) -> Instruction;

    /// Longest encoding this decoder can produce.
    fn max_instruction_size(&self) -> usize;

    /// Decodes up to `count` consecutive instructions starting at `offset`.
    fn disassemble_range(
        &self,
        address: Address,
        data: &[u8],
        offset: usize,
        count: usize,
    ) -> Vec<Instruction> {
        let mut out = Vec::with_capacity(count.min(4096));
        let mut pos = offset;
        let mut addr = address;
        while out.len() < count && pos < data.len() {
            let insn = self.disassemble(addr, data, pos);
            let step = insn.size.max(1);
            pos += step;
            addr = addr.add(step as u64);
            out.push(insn);
        }
        out
    }
}

/// Selects the decoder for `architecture`, reading fixed-width words in
/// `endianness`.
///
/// # Errors
///
/// Returns `ArsenError::Unsupported` for [`Architecture::Unknown`].
pub fn create(architecture: Architecture, endianness: Endianness) -> Result<Box<dyn Disassembler>> {
    tracing::debug!(%architecture, %endianness, "creating disassembler");
    match architecture {
        Architecture::X86 | Architecture::X86_64 => Ok(Box::new(X86Disassembler::new(architecture))),
        Architecture::Arm | Architecture::Arm64 => {
            Ok(Box::new(ArmDisassembler::with_endianness(architecture, endianness)))
        }
        Architecture::Mips => Ok(Box::new(MipsDisassembler::with_endianness(endianness))),
        Architecture::PowerPc => Ok(Box::new(PowerPcDisassembler::with_endianness(endianness))),
        Architecture::Unknown => Err(ArsenError::Unsupported {
            message: format!("no disassembler for architecture: {architecture}"),
        }),
    }
}

/// Reads the 32-bit word at `offset`, or `None` if fewer than four bytes remain.
pub(crate) fn fetch_word(data: &[u8], offset: usize, endianness: Endianness) -> Option<(Vec<u8>, u32)> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    let word = match endianness {
        Endianness::Little => LittleEndian::read_u32(bytes),
        Endianness::Big => BigEndian::read_u32(bytes),
    };
    Some((bytes.to_vec(), word))
}

/// The `invalid` placeholder for a fixed-width decoder: whatever bytes
/// remain, reported with the full word size.
pub(crate) fn invalid_word(address: Address, data: &[u8], offset: usize) -> Instruction {
    let rest = data.get(offset..).unwrap_or_default();
    let mut insn = Instruction::invalid(address, rest.iter().copied().take(4).collect());
    insn.size = 4;
    insn
}

/// A data directive for an undecodable fixed-width word.
pub(crate) fn data_word(address: Address, bytes: Vec<u8>, directive: &str, word: u32) -> Instruction {
    Instruction::new(address, bytes, format!("{directive} 0x{word:08X}"), InstructionType::Normal)
}

/// Sign-extends the low `bits` bits of `value`.
pub(crate) const fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value as i64) << shift) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_decoder() {
        let d = create(Architecture::X86_64, Endianness::Little).expect("x86");
        assert_eq!(d.architecture(), Architecture::X86_64);
        assert_eq!(d.max_instruction_size(), 15);
        let d = create(Architecture::Arm64, Endianness::Little).expect("arm");
        assert_eq!(d.architecture(), Architecture::Arm64);
        let d = create(Architecture::PowerPc, Endianness::Big).expect("ppc");
        assert_eq!(d.max_instruction_size(), 4);
    }

    #[test]
    fn factory_rejects_unknown() {
        let err = create(Architecture::Unknown, Endianness::Little).err().expect("unsupported");
        assert_eq!(err.to_string(), "unsupported: no disassembler for architecture: unknown");
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x00FF_FFFF, 24), -1);
        assert_eq!(sign_extend(0x0080_0000, 24), -0x80_0000);
    }

    #[test]
    fn range_advances_by_size() {
        let d = X86Disassembler::new(Architecture::X86_64);
        let code = [0x55, 0x48, 0x89, 0xE5, 0x90, 0xC3];
        let insns = d.disassemble_range(Address::new(0x1000), &code, 0, 10);
        let text: Vec<String> = insns.iter().map(Instruction::full_text).collect();
        assert_eq!(text, ["push rbp", "mov rbp, rsp", "nop", "ret"]);
        assert_eq!(insns[3].address, Address::new(0x1005));
    }
}
