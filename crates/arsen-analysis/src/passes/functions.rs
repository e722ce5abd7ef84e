//! Linear sweep, function start discovery, and basic block construction.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use arsen_common::disassembly::{
    BasicBlock, Function, Instruction, InstructionType, default_function_name,
};
use arsen_common::error::Result;
use arsen_common::types::Address;

use crate::context::AnalysisContext;
use crate::pass::AnalysisPass;

/// Decodes every executable section and carves it into functions.
///
/// Function starts are the entry point, every call target, and every
/// exported address that decoded to an instruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionDetectionPass;

impl AnalysisPass for FunctionDetectionPass {
    fn name(&self) -> &'static str {
        "Function Detection"
    }

    fn execute(&self, context: &mut AnalysisContext) -> Result<()> {
        let binary = Arc::clone(&context.binary);
        let disassembler = arsen_disasm::create(binary.architecture, binary.endianness)?;

        let mut starts = BTreeSet::from([binary.entry_point]);
        for section in binary.executable_sections() {
            let mut offset = 0;
            let mut address = section.virtual_address;
            while offset < section.data.len() {
                let insn = disassembler.disassemble(address, &section.data, offset);
                let step = insn.size.max(1);
                if insn.kind == InstructionType::Call {
                    if let Some(target) = insn.target {
                        let _ = starts.insert(target);
                    }
                }
                context.add_instruction(insn);
                offset += step;
                address = address.add(step as u64);
            }
        }
        starts.extend(binary.exports.iter().map(|e| e.address));
        tracing::debug!(
            instructions = context.instructions.len(),
            candidates = starts.len(),
            "linear sweep complete"
        );

        let limit = context.config.max_function_instructions;
        for start in starts {
            if !context.instructions.contains_key(&start) {
                continue;
            }
            let body = collect(&context.instructions, start, limit);
            let (Some(first), Some(last)) = (body.first(), body.last()) else {
                continue;
            };
            let mut function = Function::new(start);
            function.size = last.address.distance(first.address) + last.size as u64;
            function.name = binary
                .exports
                .iter()
                .find(|e| e.address == start)
                .map_or_else(|| default_function_name(start), |e| e.name.clone());
            function.basic_blocks = build_blocks(&body);
            context.add_function(function);
        }
        tracing::info!(functions = context.functions.len(), "functions detected");
        Ok(())
    }
}

/// Gathers the instructions reachable from `start` without following calls,
/// sorted by address.
fn collect(
    instructions: &BTreeMap<Address, Instruction>,
    start: Address,
    limit: usize,
) -> Vec<Instruction> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::from([start]);
    let mut body = Vec::new();

    while let Some(address) = queue.pop_front() {
        if body.len() >= limit {
            tracing::warn!(%start, limit, "function truncated at instruction limit");
            break;
        }
        if !visited.insert(address) {
            continue;
        }
        let Some(insn) = instructions.get(&address) else {
            continue;
        };
        if matches!(
            insn.kind,
            InstructionType::Jump | InstructionType::ConditionalJump
        ) {
            if let Some(target) = insn.target {
                queue.push_back(target);
            }
        }
        if !matches!(insn.kind, InstructionType::Return | InstructionType::Jump) {
            let next = insn.end();
            if instructions.contains_key(&next) {
                queue.push_back(next);
            }
        }
        body.push(insn.clone());
    }

    body.sort_by_key(|i| i.address);
    body
}

/// Splits a sorted instruction list into blocks and links them.
fn build_blocks(body: &[Instruction]) -> Vec<BasicBlock> {
    let present: BTreeSet<Address> = body.iter().map(|i| i.address).collect();
    let mut leaders = BTreeSet::new();
    if let Some(first) = body.first() {
        let _ = leaders.insert(first.address);
    }
    for insn in body {
        if matches!(
            insn.kind,
            InstructionType::Jump | InstructionType::ConditionalJump
        ) {
            if let Some(target) = insn.target.filter(|t| present.contains(t)) {
                let _ = leaders.insert(target);
            }
        }
        if insn.is_block_terminator() && present.contains(&insn.end()) {
            let _ = leaders.insert(insn.end());
        }
    }

    let mut blocks = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();
    for insn in body {
        if !current.is_empty() && leaders.contains(&insn.address) {
            blocks.push(block(std::mem::take(&mut current), &leaders));
        }
        let terminator = insn.is_block_terminator();
        current.push(insn.clone());
        if terminator {
            blocks.push(block(std::mem::take(&mut current), &leaders));
        }
    }
    if !current.is_empty() {
        blocks.push(block(current, &leaders));
    }

    let starts: BTreeSet<Address> = blocks.iter().map(|b: &BasicBlock| b.start).collect();
    let mut predecessors: BTreeMap<Address, Vec<Address>> = BTreeMap::new();
    for b in &blocks {
        for succ in b.successors.iter().filter(|s| starts.contains(s)) {
            predecessors.entry(*succ).or_default().push(b.start);
        }
    }
    for b in &mut blocks {
        if let Some(mut preds) = predecessors.remove(&b.start) {
            preds.sort_unstable();
            preds.dedup();
            b.predecessors = preds;
        }
    }
    blocks
}

fn block(instructions: Vec<Instruction>, leaders: &BTreeSet<Address>) -> BasicBlock {
    let (start, end) = match (instructions.first(), instructions.last()) {
        (Some(first), Some(last)) => (first.address, last.address),
        _ => (Address::default(), Address::default()),
    };
    let mut successors = Vec::new();
    if let Some(last) = instructions.last() {
        if matches!(
            last.kind,
            InstructionType::Jump | InstructionType::ConditionalJump
        ) {
            if let Some(target) = last.target {
                successors.push(target);
            }
        }
        let falls_through = matches!(
            last.kind,
            InstructionType::ConditionalJump
                | InstructionType::Normal
                | InstructionType::Call
                | InstructionType::Nop
        );
        let next = last.end();
        if falls_through && leaders.contains(&next) && !successors.contains(&next) {
            successors.push(next);
        }
    }
    BasicBlock {
        start,
        end,
        instructions,
        successors,
        predecessors: Vec::new(),
    }
}
