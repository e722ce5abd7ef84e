//! Plain-text views shared by the CLI and the TUI.

use std::fmt::Write as _;

use arsen_analysis::cfg::ControlFlowGraph;
use arsen_common::binary::Section;
use arsen_common::disassembly::{Function, Instruction};

/// Classic offset / hex / ASCII dump of at most `limit` bytes of `data`,
/// with offsets counted from `base`.
///
/// A dump cut short by `limit` ends with a line saying how much was shown.
#[must_use]
pub fn hex_dump(data: &[u8], base: u64, limit: usize, bytes_per_row: usize) -> String {
    let width = bytes_per_row.max(1);
    let shown = &data[..data.len().min(limit)];
    let mut out = String::with_capacity(shown.len() / width * (width * 4 + 12) + 64);

    for (row, chunk) in shown.chunks(width).enumerate() {
        let _ = write!(out, "{:08X}: ", base + (row * width) as u64);
        for b in chunk {
            let _ = write!(out, "{b:02X} ");
        }
        for _ in chunk.len()..width {
            out.push_str("   ");
        }
        out.push(' ');
        out.extend(chunk.iter().map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                char::from(b)
            } else {
                '.'
            }
        }));
        out.push('\n');
    }

    if shown.len() < data.len() {
        let _ = write!(
            out,
            "\n... (showing first {} bytes of {})",
            shown.len(),
            data.len()
        );
    }
    out
}

/// `ADDRESS  BYTES  TEXT` with the encoding padded to 16 columns.
#[must_use]
pub fn disassembly_line(instruction: &Instruction) -> String {
    format!(
        "{}  {:<16}  {}",
        instruction.address,
        instruction.bytes_hex(),
        instruction.full_text()
    )
}

/// Column headings for [`section_row`].
pub const SECTION_HEADERS: [&str; 6] = ["NAME", "ADDRESS", "SIZE", "RAW SIZE", "FLAGS", "PERMS"];

/// Name, address, sizes, raw flags, and permissions of a section.
#[must_use]
pub fn section_row(section: &Section) -> [String; 6] {
    [
        section.name.clone(),
        section.virtual_address.to_string(),
        format!("0x{:X}", section.virtual_size),
        format!("0x{:X}", section.raw_size),
        format!("0x{:08X}", section.raw_flags),
        section.permissions.to_string(),
    ]
}

/// Column headings for [`function_row`].
pub const FUNCTION_HEADERS: [&str; 6] = ["ADDRESS", "NAME", "SIZE", "BLOCKS", "CALLERS", "CALLEES"];

/// Summary columns of a detected function.
#[must_use]
pub fn function_row(function: &Function) -> [String; 6] {
    [
        function.address.to_string(),
        function.name.clone(),
        format!("0x{:X}", function.size),
        function.basic_blocks.len().to_string(),
        function.callers.len().to_string(),
        function.callees.len().to_string(),
    ]
}

/// One line per CFG level, each block followed by its successors.
///
/// ```text
/// level 0: 0x0000000000001000 -> 0x000000000000100D, 0x0000000000001014
/// ```
#[must_use]
pub fn cfg_levels(cfg: &ControlFlowGraph) -> Vec<String> {
    let mut lines = Vec::new();
    for (depth, level) in cfg.levels().iter().enumerate() {
        for (i, &block) in level.iter().enumerate() {
            let prefix = if i == 0 {
                format!("level {depth}: ")
            } else {
                " ".repeat(format!("level {depth}: ").len())
            };
            let successors: Vec<String> = cfg
                .successors(block)
                .iter()
                .map(ToString::to_string)
                .collect();
            if successors.is_empty() {
                lines.push(format!("{prefix}{block}"));
            } else {
                lines.push(format!("{prefix}{block} -> {}", successors.join(", ")));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use arsen_common::disassembly::{BasicBlock, InstructionType, Operand};
    use arsen_common::types::{Address, Permissions};

    #[test]
    fn hex_dump_pads_short_rows() {
        let dump = hex_dump(b"ABC\x00\x7f", 0x10, 100, 4);
        assert_eq!(
            dump,
            "00000010: 41 42 43 00  ABC.\n00000014: 7F           .\n"
        );
    }

    #[test]
    fn hex_dump_reports_truncation() {
        let data = [0xAA_u8; 40];
        let dump = hex_dump(&data, 0, 16, 16);
        assert_eq!(dump.lines().count(), 3);
        assert!(dump.ends_with("\n\n... (showing first 16 bytes of 40)"));
    }

    #[test]
    fn empty_dump_is_empty() {
        assert_eq!(hex_dump(&[], 0, 10, 16), "");
    }

    #[test]
    fn disassembly_line_aligns_columns() {
        let insn = Instruction::new(
            Address::new(0x1000),
            vec![0x48, 0x89, 0xE5],
            "mov",
            InstructionType::Normal,
        )
        .with_operand(Operand::register("rbp"))
        .with_operand(Operand::register("rsp"));
        assert_eq!(
            disassembly_line(&insn),
            "0x0000000000001000  4889E5            mov rbp, rsp"
        );
    }

    #[test]
    fn section_row_formats_numbers() {
        let section = Section {
            name: ".text".into(),
            virtual_address: Address::new(0x1000),
            virtual_size: 0x2A,
            file_offset: 0x400,
            raw_size: 0x200,
            raw_flags: 0x6000_0020,
            permissions: Permissions::CODE,
            data: Vec::new(),
        };
        assert_eq!(
            section_row(&section),
            [".text", "0x0000000000001000", "0x2A", "0x200", "0x60000020", "r-x"]
        );
    }

    #[test]
    fn cfg_levels_list_edges() {
        let insn = |addr: u64, kind| {
            Instruction::new(Address::new(addr), vec![0x90], "x", kind)
        };
        let block = |start: u64, kind, successors: &[u64]| BasicBlock {
            start: Address::new(start),
            end: Address::new(start + 1),
            instructions: vec![insn(start, kind)],
            successors: successors.iter().copied().map(Address::new).collect(),
            predecessors: Vec::new(),
        };
        let mut function = Function::new(Address::new(0x10));
        function.basic_blocks = vec![
            block(0x10, InstructionType::ConditionalJump, &[0x11, 0x12]),
            block(0x11, InstructionType::Normal, &[0x12]),
            block(0x12, InstructionType::Return, &[]),
        ];
        let lines = cfg_levels(&ControlFlowGraph::build(&function));
        assert_eq!(
            lines,
            [
                "level 0: 0x0000000000000010 -> 0x0000000000000011, 0x0000000000000012",
                "level 1: 0x0000000000000011 -> 0x0000000000000012",
                "level 2: 0x0000000000000012",
            ]
        );
    }
}
