//! Code and data cross references.

use arsen_common::disassembly::{CrossReference, InstructionType, OperandType, XRefType};
use arsen_common::error::Result;
use arsen_common::types::Address;

use crate::context::AnalysisContext;
use crate::pass::AnalysisPass;

/// Records branch, call, and data-section references for every
/// swept instruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossReferencePass;

impl AnalysisPass for CrossReferencePass {
    fn name(&self) -> &'static str {
        "Cross Reference Analysis"
    }

    fn execute(&self, context: &mut AnalysisContext) -> Result<()> {
        let binary = &context.binary;
        let mut found = Vec::new();

        for insn in context.instructions.values() {
            if let Some(target) = insn.target {
                let kind = match insn.kind {
                    InstructionType::Call => Some(XRefType::Call),
                    InstructionType::Jump | InstructionType::ConditionalJump => {
                        Some(XRefType::Jump)
                    }
                    _ => None,
                };
                if let Some(kind) = kind {
                    found.push(CrossReference {
                        from: insn.address,
                        to: target,
                        kind,
                    });
                }
            }

            for (index, operand) in insn.operands.iter().enumerate() {
                if operand.kind != OperandType::Memory {
                    continue;
                }
                let Ok(value) = u64::try_from(operand.value) else {
                    continue;
                };
                let to = Address::new(value);
                if !binary
                    .section_by_address(to)
                    .is_some_and(|s| !s.is_executable())
                {
                    continue;
                }
                let kind = if index == 0 && insn.mnemonic == "mov" {
                    XRefType::DataWrite
                } else {
                    XRefType::DataRead
                };
                found.push(CrossReference {
                    from: insn.address,
                    to,
                    kind,
                });
            }
        }

        tracing::debug!(count = found.len(), "cross references collected");
        context.cross_references.extend(found);
        Ok(())
    }
}
