//! Function-centred tabs: disassembly, graph, and pseudocode.

use arsen_analysis::cfg::ControlFlowGraph;
use arsen_analysis::pseudocode::{TokenKind, tokenize};
use arsen_common::disassembly::{Instruction, InstructionType};
use arsen_sdk::render::{cfg_levels, disassembly_line};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::placeholder;
use crate::app::App;

fn instruction_style(insn: &Instruction) -> Style {
    match insn.kind {
        InstructionType::Call => Style::new().fg(Color::Cyan),
        InstructionType::Jump | InstructionType::ConditionalJump => Style::new().fg(Color::Yellow),
        InstructionType::Return => Style::new().fg(Color::Red),
        InstructionType::Invalid => Style::new().fg(Color::DarkGray),
        InstructionType::Normal | InstructionType::Nop => Style::new(),
    }
}

fn instruction_line(insn: &Instruction) -> Line<'static> {
    Line::styled(disassembly_line(insn), instruction_style(insn))
}

/// The selected function block by block, or the linear sweep when no
/// function was found.
pub fn disassembly(app: &App) -> Vec<Line<'static>> {
    let Some(function) = app.current_function() else {
        if app.analysis.instructions.is_empty() {
            return placeholder("no code found");
        }
        return app.analysis.instructions.values().map(instruction_line).collect();
    };

    let label = Style::new().fg(Color::Green);
    let mut lines = Vec::new();
    for (i, block) in function.basic_blocks.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        lines.push(Line::styled(format!("{}:", block.start), label));
        lines.extend(block.instructions.iter().map(instruction_line));
    }
    lines
}

/// CFG levels of the selected function.
pub fn graph(app: &App) -> Vec<Line<'static>> {
    let Some(function) = app.current_function() else {
        return placeholder("no functions");
    };
    let cfg = ControlFlowGraph::build(function);
    let mut lines = vec![Line::styled(
        format!(
            "{} blocks, {} edges, {} loops",
            cfg.block_count(),
            cfg.edge_count(),
            cfg.back_edges().len()
        ),
        Style::new().add_modifier(Modifier::BOLD),
    )];
    lines.push(Line::default());
    lines.extend(cfg_levels(&cfg).into_iter().map(Line::raw));
    lines
}

const fn token_style(kind: TokenKind) -> Style {
    match kind {
        TokenKind::Keyword => Style::new().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        TokenKind::Function => Style::new().fg(Color::Cyan),
        TokenKind::Variable => Style::new().fg(Color::LightBlue),
        TokenKind::Number => Style::new().fg(Color::LightGreen),
        TokenKind::Comment => Style::new().fg(Color::DarkGray),
        TokenKind::Operator => Style::new().fg(Color::Yellow),
        TokenKind::Bracket | TokenKind::Plain => Style::new(),
    }
}

/// Highlighted pseudocode of the selected function.
pub fn pseudocode(app: &App) -> Vec<Line<'static>> {
    let Some(code) = app
        .current_function()
        .and_then(|f| app.analysis.pseudocode_for(f.address))
    else {
        return placeholder("no pseudocode");
    };
    code.lines()
        .map(|line| {
            Line::from(
                tokenize(line)
                    .into_iter()
                    .map(|t| Span::styled(t.text, token_style(t.kind)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use arsen_common::config::HexConfig;

    use super::*;
    use crate::ui::test_support::{fixture, text};

    fn app() -> App {
        let (binary, analysis) = fixture();
        App::new(binary, analysis, HexConfig::default())
    }

    #[test]
    fn disassembly_groups_blocks() {
        let lines = text(&disassembly(&app()));
        assert_eq!(lines[0], "0x0000000000001000:");
        assert_eq!(lines[3], "0x0000000000001004  E802000000        call 0x100B");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn pseudocode_keeps_text_and_colours_tokens() {
        let app = app();
        let lines = pseudocode(&app);
        let main = app.current_function().expect("main").address;
        let expected = app.analysis.pseudocode_for(main).expect("code");
        assert_eq!(text(&lines).join("\n"), expected);

        let header = &lines[0].spans;
        assert_eq!(header[0].content, "int");
        assert_eq!(header[0].style.fg, Some(Color::Magenta));
        assert_eq!(header[2].content, "SUB_0000000000001000");
        assert_eq!(header[2].style.fg, Some(Color::Cyan));
    }

    #[test]
    fn graph_summarises_cfg() {
        let lines = text(&graph(&app()));
        assert_eq!(lines[0], "1 blocks, 0 edges, 0 loops");
        assert_eq!(lines[2], "level 0: 0x0000000000001000");
    }
}
