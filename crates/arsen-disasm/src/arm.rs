//! ARM decoder for AArch32 (A32) and AArch64 (A64) branch and hint encodings.

use arsen_common::disassembly::{Instruction, InstructionType, Operand};
use arsen_common::types::{Address, Architecture, Endianness};

use crate::{Disassembler, data_word, fetch_word, invalid_word, sign_extend};

const A32_CONDITIONS: [&str; 14] = [
    "eq", "ne", "cs", "cc", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le",
];

const A64_CONDITIONS: [&str; 16] = [
    "eq", "ne", "hs", "lo", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le", "al", "nv",
];

const A32_AL: u32 = 0xE;

/// Decoder for 32-bit ARM or 64-bit ARM depending on the architecture.
#[derive(Debug, Clone, Copy)]
pub struct ArmDisassembler {
    architecture: Architecture,
    endianness: Endianness,
}

impl ArmDisassembler {
    /// Little-endian decoder for [`Architecture::Arm`] or [`Architecture::Arm64`].
    #[must_use]
    pub const fn new(architecture: Architecture) -> Self {
        Self::with_endianness(architecture, Endianness::Little)
    }

    /// Decoder reading words in the given byte order.
    #[must_use]
    pub const fn with_endianness(architecture: Architecture, endianness: Endianness) -> Self {
        Self {
            architecture,
            endianness,
        }
    }

    fn decode_a32(address: Address, bytes: Vec<u8>, word: u32) -> Instruction {
        match word {
            0xE320_F000 | 0xE1A0_0000 => {
                return Instruction::new(address, bytes, "nop", InstructionType::Nop);
            }
            0xE12F_FF1E => {
                return Instruction::new(address, bytes, "bx", InstructionType::Return)
                    .with_operand(Operand::register("lr"));
            }
            _ => {}
        }

        let cond = word >> 28;
        if (word >> 25) & 0b111 == 0b101 && cond != 0xF {
            let link = (word >> 24) & 1 != 0;
            let target = address.add(8).offset(sign_extend(word & 0x00FF_FFFF, 24) << 2);
            let (mnemonic, kind) = if link {
                ("bl".to_string(), InstructionType::Call)
            } else if cond == A32_AL {
                ("b".to_string(), InstructionType::Jump)
            } else {
                (
                    format!("b{}", A32_CONDITIONS[cond as usize]),
                    InstructionType::ConditionalJump,
                )
            };
            return Instruction::new(address, bytes, mnemonic, kind).with_target(target);
        }
        data_word(address, bytes, ".word", word)
    }

    fn decode_a64(address: Address, bytes: Vec<u8>, word: u32) -> Instruction {
        match word {
            0xD503_201F => return Instruction::new(address, bytes, "nop", InstructionType::Nop),
            0xD65F_03C0 => return Instruction::new(address, bytes, "ret", InstructionType::Return),
            _ => {}
        }

        match word >> 26 {
            0b00_0101 | 0b10_0101 => {
                let target = address.offset(sign_extend(word & 0x03FF_FFFF, 26) << 2);
                let (mnemonic, kind) = if word >> 31 == 1 {
                    ("bl", InstructionType::Call)
                } else {
                    ("b", InstructionType::Jump)
                };
                return Instruction::new(address, bytes, mnemonic, kind).with_target(target);
            }
            _ => {}
        }

        let imm19 = sign_extend((word >> 5) & 0x7_FFFF, 19) << 2;
        if word >> 24 == 0x54 && word & 0x10 == 0 {
            let cond = (word & 0xF) as usize;
            let kind = if cond >= 14 {
                InstructionType::Jump
            } else {
                InstructionType::ConditionalJump
            };
            return Instruction::new(address, bytes, format!("b.{}", A64_CONDITIONS[cond]), kind)
                .with_target(address.offset(imm19));
        }

        if word & 0x7E00_0000 == 0x3400_0000 {
            let mnemonic = if (word >> 24) & 1 == 0 { "cbz" } else { "cbnz" };
            let wide = word >> 31 == 1;
            let rt = word & 0x1F;
            let reg = match (rt, wide) {
                (31, true) => "xzr".to_string(),
                (31, false) => "wzr".to_string(),
                (n, true) => format!("x{n}"),
                (n, false) => format!("w{n}"),
            };
            return Instruction::new(address, bytes, mnemonic, InstructionType::ConditionalJump)
                .with_operand(Operand::register(reg))
                .with_target(address.offset(imm19));
        }

        data_word(address, bytes, ".word", word)
    }
}

impl Disassembler for ArmDisassembler {
    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn disassemble(&self, address: Address, data: &[u8], offset: usize) -> Instruction {
        let Some((bytes, word)) = fetch_word(data, offset, self.endianness) else {
            return invalid_word(address, data, offset);
        };
        if self.architecture == Architecture::Arm64 {
            Self::decode_a64(address, bytes, word)
        } else {
            Self::decode_a32(address, bytes, word)
        }
    }

    fn max_instruction_size(&self) -> usize {
        4
    }
}
