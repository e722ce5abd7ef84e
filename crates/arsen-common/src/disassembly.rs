//! Decoded instructions, basic blocks, functions, and cross references.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FUNCTION_PREFIX;
use crate::types::Address;

/// Classification of an instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandType {
    /// A register.
    Register,
    /// An immediate value or branch target.
    Immediate,
    /// A memory reference through a base/index/absolute address.
    Memory,
    /// A frame-relative memory slot (`[rbp+disp]`).
    Displacement,
}

/// One operand of a decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operand {
    /// Operand class.
    pub kind: OperandType,
    /// Rendered text, e.g. `rax`, `0x10`, `[rbp-0x8]`.
    pub text: String,
    /// Numeric payload: the immediate or displacement, 0 for registers.
    pub value: i64,
}

impl Operand {
    /// A register operand.
    pub fn register(name: impl Into<String>) -> Self {
        Self {
            kind: OperandType::Register,
            text: name.into(),
            value: 0,
        }
    }

    /// An immediate operand rendered as `0x..` hex.
    #[must_use]
    pub fn immediate(value: i64) -> Self {
        let text = if value < 0 {
            format!("-0x{:X}", value.unsigned_abs())
        } else {
            format!("0x{value:X}")
        };
        Self {
            kind: OperandType::Immediate,
            text,
            value,
        }
    }

    /// A memory operand with explicit text.
    pub fn memory(text: impl Into<String>, value: i64) -> Self {
        Self {
            kind: OperandType::Memory,
            text: text.into(),
            value,
        }
    }

    /// A frame-relative stack slot.
    pub fn displacement(text: impl Into<String>, value: i64) -> Self {
        Self {
            kind: OperandType::Displacement,
            text: text.into(),
            value,
        }
    }
}

/// Control-flow classification of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionType {
    /// Straight-line instruction.
    Normal,
    /// Subroutine call.
    Call,
    /// Unconditional branch.
    Jump,
    /// Conditional branch.
    ConditionalJump,
    /// Return from subroutine.
    Return,
    /// No operation.
    Nop,
    /// Bytes that could not be decoded (truncated or out of range).
    Invalid,
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Address of the first byte.
    pub address: Address,
    /// Raw encoding.
    pub bytes: Vec<u8>,
    /// Lowercase mnemonic.
    pub mnemonic: String,
    /// Operands in assembly order.
    pub operands: Vec<Operand>,
    /// Encoded length in bytes.
    pub size: usize,
    /// Control-flow class.
    pub kind: InstructionType,
    /// Branch or call target, when statically known.
    pub target: Option<Address>,
}

impl Instruction {
    /// Builds an instruction with no operands and no target.
    pub fn new(
        address: Address,
        bytes: Vec<u8>,
        mnemonic: impl Into<String>,
        kind: InstructionType,
    ) -> Self {
        let size = bytes.len();
        Self {
            address,
            bytes,
            mnemonic: mnemonic.into(),
            operands: Vec::new(),
            size,
            kind,
            target: None,
        }
    }

    /// The placeholder produced when decoding runs past the available bytes.
    #[must_use]
    pub fn invalid(address: Address, bytes: Vec<u8>) -> Self {
        let mut insn = Self::new(address, bytes, "invalid", InstructionType::Invalid);
        insn.size = insn.size.max(1);
        insn
    }

    /// Appends an operand.
    #[must_use]
    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    /// Sets the branch target and adds it as an immediate operand.
    #[must_use]
    pub fn with_target(mut self, target: Address) -> Self {
        self.target = Some(target);
        #[allow(clippy::cast_possible_wrap)]
        let value = target.value() as i64;
        self.operands.push(Operand {
            kind: OperandType::Immediate,
            text: format!("0x{:X}", target.value()),
            value,
        });
        self
    }

    /// Mnemonic followed by comma-separated operands.
    #[must_use]
    pub fn full_text(&self) -> String {
        if self.operands.is_empty() {
            return self.mnemonic.clone();
        }
        let ops: Vec<&str> = self.operands.iter().map(|o| o.text.as_str()).collect();
        format!("{} {}", self.mnemonic, ops.join(", "))
    }

    /// Encoding as uppercase hex without separators.
    #[must_use]
    pub fn bytes_hex(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() * 2);
        for b in &self.bytes {
            let _ = write!(out, "{b:02X}");
        }
        out
    }

    /// Address of the byte after this instruction.
    #[must_use]
    pub const fn end(&self) -> Address {
        self.address.add(self.size as u64)
    }

    /// Whether this instruction ends a basic block.
    #[must_use]
    pub const fn is_block_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstructionType::Jump | InstructionType::ConditionalJump | InstructionType::Return
        )
    }
}

/// A maximal straight-line run of instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Address of the first instruction.
    pub start: Address,
    /// Address of the last instruction.
    pub end: Address,
    /// Instructions in address order.
    pub instructions: Vec<Instruction>,
    /// Start addresses of successor blocks.
    pub successors: Vec<Address>,
    /// Start addresses of predecessor blocks.
    pub predecessors: Vec<Address>,
}

impl BasicBlock {
    /// The final instruction of the block.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

/// A detected function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Entry address.
    pub address: Address,
    /// Display name.
    pub name: String,
    /// Span in bytes from the first to the end of the last instruction.
    pub size: u64,
    /// Functions that call this one.
    pub callers: Vec<Address>,
    /// Functions this one calls.
    pub callees: Vec<Address>,
    /// Blocks sorted by start address.
    pub basic_blocks: Vec<BasicBlock>,
}

impl Function {
    /// Creates an empty function with the default name.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            name: default_function_name(address),
            size: 0,
            callers: Vec::new(),
            callees: Vec::new(),
            basic_blocks: Vec::new(),
        }
    }

    /// Whether `address` falls in `[address, address + size)`.
    #[must_use]
    pub const fn contains(&self, address: Address) -> bool {
        let start = self.address.value();
        address.value() >= start && address.value() - start < self.size
    }

    /// Iterates every instruction of every block in address order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.basic_blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Whether the name is still the generated `SUB_` form.
    #[must_use]
    pub fn has_default_name(&self) -> bool {
        self.name == default_function_name(self.address)
    }
}

/// Kind of a cross reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XRefType {
    /// Call instruction.
    Call,
    /// Conditional or unconditional branch.
    Jump,
    /// Memory load from a data section.
    DataRead,
    /// Memory store into a data section.
    DataWrite,
}

impl std::fmt::Display for XRefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Call => "call",
            Self::Jump => "jump",
            Self::DataRead => "read",
            Self::DataWrite => "write",
        };
        f.pad(s)
    }
}

/// A reference from one address to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossReference {
    /// Referencing instruction.
    pub from: Address,
    /// Referenced address.
    pub to: Address,
    /// Reference kind.
    pub kind: XRefType,
}

/// The generated name for an unnamed function: `SUB_` plus 16 hex digits.
#[must_use]
pub fn default_function_name(address: Address) -> String {
    format!("{DEFAULT_FUNCTION_PREFIX}{:016X}", address.value())
}
