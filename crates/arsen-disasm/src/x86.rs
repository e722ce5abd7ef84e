//! x86 and x86-64 decoder for a common subset of the one-byte opcode map.
//!
//! Covers the instructions compilers emit for prologues, epilogues,
//! arithmetic on registers and stack slots, and direct branches. REX
//! prefixes are honoured in 64-bit mode.

use arsen_common::disassembly::{Instruction, InstructionType, Operand};
use arsen_common::types::{Address, Architecture};

use crate::Disassembler;

const REGS_64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

const REGS_32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];

const CONDITIONS: [&str; 16] = [
    "jo", "jno", "jb", "jae", "je", "jne", "jbe", "ja", "js", "jns", "jp", "jnp", "jl", "jge", "jle",
    "jg",
];

const GROUP_83: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];

/// Decoder for 32- and 64-bit x86.
#[derive(Debug, Clone, Copy)]
pub struct X86Disassembler {
    architecture: Architecture,
}

impl X86Disassembler {
    /// Creates a decoder; [`Architecture::X86_64`] enables REX prefixes and
    /// 64-bit register names.
    #[must_use]
    pub const fn new(architecture: Architecture) -> Self {
        Self { architecture }
    }

    const fn is_64(&self) -> bool {
        matches!(self.architecture, Architecture::X86_64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Rex {
    w: bool,
    r: u8,
    x: u8,
    b: u8,
}

impl Rex {
    const fn from_byte(byte: u8) -> Self {
        Self {
            w: byte & 0x8 != 0,
            r: (byte >> 2) & 1,
            x: (byte >> 1) & 1,
            b: byte & 1,
        }
    }
}

/// Operand direction of a ModRM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// `op r/m, reg`
    RmReg,
    /// `op reg, r/m`
    RegRm,
}

/// Per-instruction decoding state over the remaining bytes.
struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    address: Address,
    is_64: bool,
    rex: Rex,
    rip_relative: bool,
}

impl Decoder<'_> {
    fn next(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn i8(&mut self) -> Option<i64> {
        #[allow(clippy::cast_possible_wrap)]
        self.next().map(|b| i64::from(b as i8))
    }

    fn u16(&mut self) -> Option<u16> {
        let lo = self.next()?;
        let hi = self.next()?;
        Some(u16::from_le_bytes([lo, hi]))
    }

    fn i32(&mut self) -> Option<i64> {
        let raw = self.bytes.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(i64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])))
    }

    fn i64(&mut self) -> Option<i64> {
        let raw: [u8; 8] = self.bytes.get(self.pos..self.pos + 8)?.try_into().ok()?;
        self.pos += 8;
        Some(i64::from_le_bytes(raw))
    }

    fn register(&self, index: u8, wide: bool) -> &'static str {
        let table = if wide { &REGS_64 } else { &REGS_32 };
        table[usize::from(index & 0xF)]
    }

    /// Register used for addressing: full width in 64-bit mode.
    fn address_register(&self, index: u8) -> &'static str {
        self.register(index, self.is_64)
    }

    fn finish(&self, mnemonic: &str, kind: InstructionType) -> Instruction {
        Instruction::new(self.address, self.bytes[..self.pos].to_vec(), mnemonic, kind)
    }

    /// Target of a relative branch whose displacement was just read.
    fn relative_target(&self, rel: i64) -> Address {
        self.address.add(self.pos as u64).offset(rel)
    }

    /// Decodes a ModRM byte (and SIB/displacement). Returns the `reg` field
    /// extended by REX.R and the `r/m` operand.
    fn modrm(&mut self, wide: bool) -> Option<(u8, Operand)> {
        let modrm = self.next()?;
        let mode = modrm >> 6;
        let reg = ((modrm >> 3) & 7) | (self.rex.r << 3);
        let rm = modrm & 7;

        if mode == 3 {
            let name = self.register(rm | (self.rex.b << 3), wide);
            return Some((reg, Operand::register(name)));
        }

        let mut base: Option<u8> = None;
        let mut index: Option<(u8, u8)> = None;
        let mut disp: i64 = 0;
        let mut rip = false;

        if rm == 4 {
            let sib = self.next()?;
            let scale = 1u8 << (sib >> 6);
            let idx = ((sib >> 3) & 7) | (self.rex.x << 3);
            if idx != 4 {
                index = Some((idx, scale));
            }
            if sib & 7 == 5 && mode == 0 {
                disp = self.i32()?;
            } else {
                base = Some((sib & 7) | (self.rex.b << 3));
            }
        } else if rm == 5 && mode == 0 {
            disp = self.i32()?;
            rip = self.is_64;
        } else {
            base = Some(rm | (self.rex.b << 3));
        }

        match mode {
            1 => disp = self.i8()?,
            2 => disp = self.i32()?,
            _ => {}
        }

        let mut parts = Vec::new();
        if rip {
            parts.push("rip".to_string());
        }
        if let Some(b) = base {
            parts.push(self.address_register(b).to_string());
        }
        if let Some((i, scale)) = index {
            let name = self.address_register(i);
            parts.push(if scale == 1 { name.to_string() } else { format!("{name}*{scale}") });
        }
        let text = if parts.is_empty() {
            format!("[0x{disp:X}]")
        } else {
            let mut t = format!("[{}", parts.join("+"));
            if disp > 0 {
                t.push_str(&format!("+0x{disp:X}"));
            } else if disp < 0 {
                t.push_str(&format!("-0x{:X}", disp.unsigned_abs()));
            }
            t.push(']');
            t
        };

        self.rip_relative = rip;
        let operand = if base == Some(5) && index.is_none() {
            Operand::displacement(text, disp)
        } else {
            Operand::memory(text, disp)
        };
        Some((reg, operand))
    }

    fn modrm_op(&mut self, mnemonic: &str, form: Form) -> Option<Instruction> {
        let wide = self.rex.w;
        let (reg, rm) = self.modrm(wide)?;
        let reg = Operand::register(self.register(reg, wide));
        let (first, second) = match form {
            Form::RmReg => (rm, reg),
            Form::RegRm => (reg, rm),
        };
        Some(
            self.finish(mnemonic, InstructionType::Normal)
                .with_operand(first)
                .with_operand(second),
        )
    }

    fn decode(&mut self) -> Option<Instruction> {
        let mut opcode = self.next()?;
        if self.is_64 && (0x40..=0x4F).contains(&opcode) {
            self.rex = Rex::from_byte(opcode);
            opcode = self.next()?;
        }

        let insn = match opcode {
            0x90 => self.finish("nop", InstructionType::Nop),
            0xC3 => self.finish("ret", InstructionType::Return),
            0xC2 => {
                let imm = self.u16()?;
                self.finish("ret", InstructionType::Return)
                    .with_operand(Operand::immediate(i64::from(imm)))
            }
            0xE8 => {
                let rel = self.i32()?;
                let target = self.relative_target(rel);
                self.finish("call", InstructionType::Call).with_target(target)
            }
            0xE9 => {
                let rel = self.i32()?;
                let target = self.relative_target(rel);
                self.finish("jmp", InstructionType::Jump).with_target(target)
            }
            0xEB => {
                let rel = self.i8()?;
                let target = self.relative_target(rel);
                self.finish("jmp", InstructionType::Jump).with_target(target)
            }
            0x70..=0x7F => {
                let rel = self.i8()?;
                let target = self.relative_target(rel);
                self.finish(CONDITIONS[usize::from(opcode - 0x70)], InstructionType::ConditionalJump)
                    .with_target(target)
            }
            0x0F => {
                let second = self.next()?;
                if !(0x80..=0x8F).contains(&second) {
                    return None;
                }
                let rel = self.i32()?;
                let target = self.relative_target(rel);
                self.finish(CONDITIONS[usize::from(second - 0x80)], InstructionType::ConditionalJump)
                    .with_target(target)
            }
            0x50..=0x57 | 0x58..=0x5F => {
                let (mnemonic, base) = if opcode < 0x58 { ("push", 0x50) } else { ("pop", 0x58) };
                let name = self.register((opcode - base) | (self.rex.b << 3), self.is_64);
                self.finish(mnemonic, InstructionType::Normal)
                    .with_operand(Operand::register(name))
            }
            0xB8..=0xBF => {
                let wide = self.rex.w;
                let name = self.register((opcode - 0xB8) | (self.rex.b << 3), wide);
                let imm = if wide { self.i64()? } else { self.i32()? };
                self.finish("mov", InstructionType::Normal)
                    .with_operand(Operand::register(name))
                    .with_operand(Operand::immediate(imm))
            }
            0x89 => self.modrm_op("mov", Form::RmReg)?,
            0x8B => self.modrm_op("mov", Form::RegRm)?,
            0x01 => self.modrm_op("add", Form::RmReg)?,
            0x03 => self.modrm_op("add", Form::RegRm)?,
            0x29 => self.modrm_op("sub", Form::RmReg)?,
            0x2B => self.modrm_op("sub", Form::RegRm)?,
            0x21 => self.modrm_op("and", Form::RmReg)?,
            0x23 => self.modrm_op("and", Form::RegRm)?,
            0x09 => self.modrm_op("or", Form::RmReg)?,
            0x0B => self.modrm_op("or", Form::RegRm)?,
            0x31 => self.modrm_op("xor", Form::RmReg)?,
            0x33 => self.modrm_op("xor", Form::RegRm)?,
            0x39 => self.modrm_op("cmp", Form::RmReg)?,
            0x3B => self.modrm_op("cmp", Form::RegRm)?,
            0x85 => self.modrm_op("test", Form::RmReg)?,
            0x8D => self.modrm_op("lea", Form::RegRm)?,
            0x83 => {
                let wide = self.rex.w;
                let (ext, rm) = self.modrm(wide)?;
                let imm = self.i8()?;
                self.finish(GROUP_83[usize::from(ext & 7)], InstructionType::Normal)
                    .with_operand(rm)
                    .with_operand(Operand::immediate(imm))
            }
            0xCC => self.finish("int3", InstructionType::Normal),
            0xF4 => self.finish("hlt", InstructionType::Normal),
            0xC9 => self.finish("leave", InstructionType::Normal),
            0x99 => self.finish("cdq", InstructionType::Normal),
            _ => return None,
        };
        Some(self.resolve_rip(insn))
    }

    /// Rewrites a RIP-relative operand's value to the absolute address it
    /// refers to, now that the instruction length is known.
    fn resolve_rip(&self, mut insn: Instruction) -> Instruction {
        if self.rip_relative {
            let end = insn.end();
            for op in &mut insn.operands {
                if op.text.starts_with("[rip") {
                    #[allow(clippy::cast_possible_wrap)]
                    let absolute = end.offset(op.value).value() as i64;
                    op.value = absolute;
                }
            }
        }
        insn
    }
}

/// Opcodes with a decoding rule; a failed decode of one of these means the
/// encoding was cut short.
const fn is_known_opcode(opcode: u8) -> bool {
    matches!(
        opcode,
        0x90 | 0xC3
            | 0xC2
            | 0xE8
            | 0xE9
            | 0xEB
            | 0x70..=0x7F
            | 0x0F
            | 0x50..=0x5F
            | 0xB8..=0xBF
            | 0x89
            | 0x8B
            | 0x01
            | 0x03
            | 0x29
            | 0x2B
            | 0x21
            | 0x23
            | 0x09
            | 0x0B
            | 0x31
            | 0x33
            | 0x39
            | 0x3B
            | 0x85
            | 0x8D
            | 0x83
            | 0xCC
            | 0xF4
            | 0xC9
            | 0x99
    )
}

impl Disassembler for X86Disassembler {
    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn disassemble(&self, address: Address, data: &[u8], offset: usize) -> Instruction {
        let Some(bytes) = data.get(offset..).filter(|b| !b.is_empty()) else {
            return Instruction::invalid(address, Vec::new());
        };
        let mut decoder = Decoder {
            bytes,
            pos: 0,
            address,
            is_64: self.is_64(),
            rex: Rex::default(),
            rip_relative: false,
        };
        if let Some(insn) = decoder.decode() {
            return insn;
        }

        let lead = bytes[0];
        let opcode = if self.is_64() && (0x40..=0x4F).contains(&lead) {
            bytes.get(1).copied()
        } else {
            Some(lead)
        };
        let truncated = match opcode {
            None => true,
            Some(0x0F) => {
                let second = if opcode == Some(lead) { 1 } else { 2 };
                bytes.get(second).is_none_or(|b| (0x80..=0x8F).contains(b))
            }
            Some(op) => is_known_opcode(op),
        };
        if truncated {
            Instruction::invalid(address, vec![lead])
        } else {
            Instruction::new(address, vec![lead], format!("db 0x{lead:02X}"), InstructionType::Normal)
        }
    }

    fn max_instruction_size(&self) -> usize {
        15
    }
}
