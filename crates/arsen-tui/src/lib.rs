//! # arsen-tui
//!
//! Interactive terminal viewer for an analysed binary.
//!
//! Built with `ratatui` and `crossterm`, providing:
//! - Per-function disassembly, CFG levels, and highlighted pseudocode.
//! - Hex, strings, and section views of the whole file.
//! - Cross references to and from the selected function.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod app;
pub mod error;
pub mod event;
pub mod ui;

use std::io::Stdout;

use arsen_sdk::BinaryService;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub use app::{App, Tab};
pub use error::TuiError;

/// Border rows around the body plus the tab bar and status line.
const CHROME_ROWS: u16 = 6;

/// Raw mode and the alternate screen, undone on drop.
struct Session {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Session {
    fn enter() -> std::io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let raw = disable_raw_mode();
        let screen = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let cursor = self.terminal.show_cursor();
        if let Err(e) = raw.and(screen).and(cursor) {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    }
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> std::io::Result<()> {
    while app.running {
        let size = terminal.size()?;
        app.page = usize::from(size.height.saturating_sub(CHROME_ROWS)).max(1);
        let lines = ui::content(app);
        app.line_count = lines.len();
        let _ = terminal.draw(|frame| ui::render(frame, app, lines))?;

        match event::next(event::TICK)? {
            event::TerminalEvent::Key(key) => app.handle_key(key),
            event::TerminalEvent::Resize(..) | event::TerminalEvent::Tick => {}
        }
    }
    Ok(())
}

/// Shows the service's current binary until the user quits, analysing it
/// first if needed. The terminal is restored on every exit path.
///
/// # Errors
///
/// Returns an error if nothing is loaded, analysis fails, or the terminal
/// cannot be driven.
pub fn run(service: &BinaryService) -> Result<(), TuiError> {
    let binary = service.current_binary().ok_or(TuiError::NoBinary)?;
    let analysis = match service.current_analysis() {
        Some(analysis) => analysis,
        None => service.analyze()?,
    };
    let mut app = App::new(binary, analysis, service.config().hex.clone());

    tracing::debug!(path = %app.binary.path.display(), "starting viewer");
    let mut session = Session::enter()?;
    let result = event_loop(&mut session.terminal, &mut app);
    drop(session);
    tracing::debug!("viewer closed");
    result.map_err(TuiError::from)
}
