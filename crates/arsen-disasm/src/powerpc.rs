//! PowerPC decoder: `nop`, `blr`, and the I-form and B-form branches.

use arsen_common::disassembly::{Instruction, InstructionType, Operand};
use arsen_common::types::{Address, Architecture, Endianness};

use crate::{Disassembler, data_word, fetch_word, invalid_word, sign_extend};

const NOP: u32 = 0x6000_0000;
const BLR: u32 = 0x4E80_0020;

/// Decoder for 32-bit PowerPC words.
#[derive(Debug, Clone, Copy)]
pub struct PowerPcDisassembler {
    endianness: Endianness,
}

impl PowerPcDisassembler {
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

impl Default for PowerPcDisassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn branch_mnemonic(base: &str, absolute: bool, link: bool) -> String {
    let mut m = base.to_string();
    if link {
        m.push('l');
    }
    if absolute {
        m.push('a');
    }
    m
}

impl Disassembler for PowerPcDisassembler {
    fn architecture(&self) -> Architecture {
        Architecture::PowerPc
    }

    fn disassemble(&self, address: Address, data: &[u8], offset: usize) -> Instruction {
        let Some((bytes, word)) = fetch_word(data, offset, self.endianness) else {
            return invalid_word(address, data, offset);
        };
        match word {
            NOP => return Instruction::new(address, bytes, "nop", InstructionType::Nop),
            BLR => return Instruction::new(address, bytes, "blr", InstructionType::Return),
            _ => {}
        }

        let absolute = word & 0x2 != 0;
        let link = word & 0x1 != 0;
        match word >> 26 {
            18 => {
                let disp = sign_extend(word & 0x03FF_FFFC, 26);
                let target = if absolute { Address::new(0).offset(disp) } else { address.offset(disp) };
                let kind = if link { InstructionType::Call } else { InstructionType::Jump };
                Instruction::new(address, bytes, branch_mnemonic("b", absolute, link), kind)
                    .with_target(target)
            }
            16 => {
                let bo = (word >> 21) & 0x1F;
                let bi = (word >> 16) & 0x1F;
                let disp = sign_extend(word & 0xFFFC, 16);
                let target = if absolute { Address::new(0).offset(disp) } else { address.offset(disp) };
                let kind = if link {
                    InstructionType::Call
                } else {
                    InstructionType::ConditionalJump
                };
                Instruction::new(address, bytes, branch_mnemonic("bc", absolute, link), kind)
                    .with_operand(Operand::immediate(i64::from(bo)))
                    .with_operand(Operand::immediate(i64::from(bi)))
                    .with_target(target)
            }
            _ => data_word(address, bytes, ".long", word),
        }
    }

    fn max_instruction_size(&self) -> usize {
        4
    }
}
