//! Terminal event handling.
//!
//! Polls crossterm for input with a fixed tick so the loop redraws even
//! when no key is pressed.

use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};

/// Redraw interval when the terminal is idle.
pub const TICK: Duration = Duration::from_millis(250);

/// Terminal input events.
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    /// A key was pressed.
    Key(KeyEvent),
    /// The terminal was resized.
    Resize(u16, u16),
    /// Nothing happened within one tick.
    Tick,
}

/// Waits up to `tick` for the next event.
///
/// # Errors
///
/// Returns an error if the terminal cannot be polled or read.
pub fn next(tick: Duration) -> std::io::Result<TerminalEvent> {
    if !event::poll(tick)? {
        return Ok(TerminalEvent::Tick);
    }
    Ok(match event::read()? {
        Event::Key(key) => TerminalEvent::Key(key),
        Event::Resize(width, height) => TerminalEvent::Resize(width, height),
        _ => TerminalEvent::Tick,
    })
}
