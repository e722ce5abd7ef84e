//! Binary-wide tabs: hex, strings, sections, and cross references.

use arsen_sdk::render::{SECTION_HEADERS, hex_dump, section_row};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;

use super::placeholder;
use crate::app::App;

pub fn hex(app: &App) -> Vec<Line<'static>> {
    let dump = hex_dump(
        &app.binary.raw_data,
        0,
        app.hex.display_limit,
        app.hex.bytes_per_row,
    );
    if dump.is_empty() {
        return placeholder("empty file");
    }
    dump.lines().map(|l| Line::raw(l.to_string())).collect()
}

pub fn strings(app: &App) -> Vec<Line<'static>> {
    if app.analysis.strings.is_empty() {
        return placeholder("no strings");
    }
    app.analysis
        .strings
        .iter()
        .map(|s| Line::raw(format!("{}  {:?}", s.address, s.text)))
        .collect()
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Left-aligned columns sized to the widest cell.
fn table(headers: &[&str], rows: &[Vec<String>]) -> Vec<Line<'static>> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut lines = vec![Line::styled(
        format_row(headers.iter().copied(), &widths),
        Style::new().add_modifier(Modifier::BOLD),
    )];
    for row in rows {
        lines.push(Line::raw(format_row(row.iter().map(String::as_str), &widths)));
    }
    lines
}

pub fn sections(app: &App) -> Vec<Line<'static>> {
    let rows: Vec<Vec<String>> = app
        .binary
        .sections
        .iter()
        .map(|s| section_row(s).to_vec())
        .collect();
    table(&SECTION_HEADERS, &rows)
}

/// References into the selected function's entry and out of its body.
pub fn cross_references(app: &App) -> Vec<Line<'static>> {
    let Some(function) = app.current_function() else {
        return placeholder("no functions");
    };
    let heading = Style::new().fg(Color::Green);
    let mut lines = vec![Line::styled("References to", heading)];
    let incoming: Vec<_> = app.analysis.xrefs_to(function.address).collect();
    if incoming.is_empty() {
        lines.push(Line::raw("  (none)"));
    }
    for x in incoming {
        let from = app
            .analysis
            .function_containing(x.from)
            .map(|f| format!(" in {}", f.name))
            .unwrap_or_default();
        lines.push(Line::raw(format!("  {} {:<5} from {}{from}", x.to, x.kind, x.from)));
    }

    lines.push(Line::default());
    lines.push(Line::styled("References from", heading));
    let outgoing: Vec<_> = app
        .analysis
        .cross_references
        .iter()
        .filter(|x| x.from == function.address || function.contains(x.from))
        .collect();
    if outgoing.is_empty() {
        lines.push(Line::raw("  (none)"));
    }
    for x in outgoing {
        lines.push(Line::raw(format!("  {} {:<5} to {}", x.from, x.kind, x.to)));
    }
    lines
}
