//! Frame layout and per-tab content.
//!
//! Every tab is rendered as a list of lines scrolled by [`App::scroll`],
//! so the same content feeds both drawing and scroll bounds.

mod code;
mod data;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Tabs};

use crate::app::{App, Tab};

const KEY_HELP: &str = " q quit  Tab/S-Tab switch  \u{2191}\u{2193} scroll  PgUp/PgDn page  n/p function ";

/// Lines of the active tab.
pub fn content(app: &App) -> Vec<Line<'static>> {
    match app.tab {
        Tab::Disassembly => code::disassembly(app),
        Tab::Graph => code::graph(app),
        Tab::Pseudocode => code::pseudocode(app),
        Tab::Hex => data::hex(app),
        Tab::Strings => data::strings(app),
        Tab::Sections => data::sections(app),
        Tab::CrossReferences => data::cross_references(app),
    }
}

/// Draws the tab bar, the active tab's `lines`, and the status line.
pub fn render(frame: &mut Frame, app: &App, lines: Vec<Line<'static>>) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let title = format!(
        " arsen: {} ({} {}) ",
        app.binary.path.display(),
        app.binary.format,
        app.binary.architecture
    );
    let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
        .select(app.tab.index())
        .block(Block::bordered().title(title))
        .highlight_style(
            Style::new()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, header);

    let scroll = u16::try_from(app.scroll).unwrap_or(u16::MAX);
    let body_title = match (app.tab, app.current_function()) {
        (Tab::Disassembly | Tab::Graph | Tab::Pseudocode | Tab::CrossReferences, Some(f)) => {
            format!(" {} @ {} ", f.name, f.address)
        }
        _ => format!(" {} ", app.tab.title()),
    };
    frame.render_widget(
        Paragraph::new(lines).block(Block::bordered().title(body_title)).scroll((scroll, 0)),
        body,
    );

    let position = format!(
        " function {}/{} ",
        (app.selected_function + 1).min(app.analysis.functions.len()),
        app.analysis.functions.len()
    );
    let status = Line::from(vec![
        Span::styled(KEY_HELP, Style::new().fg(Color::Black).bg(Color::Gray)),
        Span::raw(position),
    ]);
    frame.render_widget(Paragraph::new(status), footer);
}

fn placeholder(text: &str) -> Vec<Line<'static>> {
    vec![Line::styled(text.to_string(), Style::new().fg(Color::DarkGray))]
}


#[cfg(test)]
mod tests {
    use arsen_common::config::HexConfig;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::ui::test_support::fixture;

    #[test]
    fn frame_shows_tabs_and_function() {
        let (binary, analysis) = fixture();
        let app = App::new(binary, analysis, HexConfig::default());
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        let _ = terminal
            .draw(|frame| render(frame, &app, content(&app)))
            .expect("draw");

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        for needle in ["Disassembly", "Cross-references", "SUB_0000000000001000", "push rbp", "function 1/2"] {
            assert!(screen.contains(needle), "missing {needle:?}");
        }
    }
}
