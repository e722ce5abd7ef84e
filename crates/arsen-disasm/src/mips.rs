//! MIPS32 decoder for jumps, `beq`/`bne`, `nop`, and `jr ra`.
//!
//! Branch delay slots are decoded as ordinary instructions.

use arsen_common::disassembly::{Instruction, InstructionType, Operand};
use arsen_common::types::{Address, Architecture, Endianness};

use crate::{Disassembler, data_word, fetch_word, invalid_word, sign_extend};

const REGISTERS: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7",
    "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];

const JR_RA: u32 = 0x03E0_0008;

/// Decoder for MIPS32 words.
#[derive(Debug, Clone, Copy)]
pub struct MipsDisassembler {
    endianness: Endianness,
}

impl MipsDisassembler {
    /// Big-endian decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_endianness(Endianness::Big)
    }

    /// Decoder reading words in the given byte order.
    #[must_use]
    pub const fn with_endianness(endianness: Endianness) -> Self {
        Self { endianness }
    }
}

impl Default for MipsDisassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn register(index: u32) -> Operand {
    Operand::register(REGISTERS[(index & 0x1F) as usize])
}

impl Disassembler for MipsDisassembler {
    fn architecture(&self) -> Architecture {
        Architecture::Mips
    }

    fn disassemble(&self, address: Address, data: &[u8], offset: usize) -> Instruction {
        let Some((bytes, word)) = fetch_word(data, offset, self.endianness) else {
            return invalid_word(address, data, offset);
        };
        match word {
            0 => return Instruction::new(address, bytes, "nop", InstructionType::Nop),
            JR_RA => {
                return Instruction::new(address, bytes, "jr", InstructionType::Return)
                    .with_operand(Operand::register("ra"));
            }
            _ => {}
        }

        match word >> 26 {
            op @ (2 | 3) => {
                let region = address.add(4).value() & 0xF000_0000;
                let target = Address::new(region | (u64::from(word & 0x03FF_FFFF) << 2));
                let (mnemonic, kind) = if op == 3 {
                    ("jal", InstructionType::Call)
                } else {
                    ("j", InstructionType::Jump)
                };
                Instruction::new(address, bytes, mnemonic, kind).with_target(target)
            }
            op @ (4 | 5) => {
                let rs = (word >> 21) & 0x1F;
                let rt = (word >> 16) & 0x1F;
                let target = address.add(4).offset(sign_extend(word & 0xFFFF, 16) << 2);
                let mnemonic = if op == 4 { "beq" } else { "bne" };
                Instruction::new(address, bytes, mnemonic, InstructionType::ConditionalJump)
                    .with_operand(register(rs))
                    .with_operand(register(rt))
                    .with_target(target)
            }
            _ => data_word(address, bytes, ".word", word),
        }
    }

    fn max_instruction_size(&self) -> usize {
        4
    }
}
