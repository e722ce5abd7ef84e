//! TUI application state machine.
//!
//! Holds the analysed binary, the active tab, the selected function, and
//! the scroll position, and maps key presses onto them.

use std::sync::Arc;

use arsen_analysis::context::AnalysisResult;
use arsen_common::binary::BinaryFile;
use arsen_common::config::HexConfig;
use arsen_common::disassembly::Function;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Lines moved by `PgUp`/`PgDn` until the first frame reports its height.
pub const DEFAULT_PAGE: usize = 20;

/// Which view the TUI is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    /// Instructions of the selected function.
    Disassembly,
    /// Basic blocks of the selected function by CFG level.
    Graph,
    /// Pseudocode of the selected function.
    Pseudocode,
    /// Raw file bytes.
    Hex,
    /// Extracted strings.
    Strings,
    /// Section table.
    Sections,
    /// References to and from the selected function.
    CrossReferences,
}

impl Tab {
    /// Every tab in display order.
    pub const ALL: [Self; 7] = [
        Self::Disassembly,
        Self::Graph,
        Self::Pseudocode,
        Self::Hex,
        Self::Strings,
        Self::Sections,
        Self::CrossReferences,
    ];

    /// Label shown in the tab bar.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Disassembly => "Disassembly",
            Self::Graph => "Graph",
            Self::Pseudocode => "Pseudocode",
            Self::Hex => "Hex",
            Self::Strings => "Strings",
            Self::Sections => "Sections",
            Self::CrossReferences => "Cross-references",
        }
    }

    /// Position in [`Tab::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The tab to the right, wrapping.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// The tab to the left, wrapping.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Root application state for the TUI.
#[derive(Debug)]
pub struct App {
    /// Whether the event loop should keep running.
    pub running: bool,
    /// Active tab.
    pub tab: Tab,
    /// Index into the analysis' functions, in address order.
    pub selected_function: usize,
    /// First visible line of the active tab.
    pub scroll: usize,
    /// Lines per page, refreshed from the terminal size.
    pub page: usize,
    /// Lines in the active tab as of the last frame. Bounds scrolling.
    pub line_count: usize,
    /// The binary on display.
    pub binary: Arc<BinaryFile>,
    /// Its analysis.
    pub analysis: Arc<AnalysisResult>,
    /// Hex tab layout.
    pub hex: HexConfig,
}

impl App {
    /// State for a freshly analysed binary, showing the first function.
    #[must_use]
    pub const fn new(binary: Arc<BinaryFile>, analysis: Arc<AnalysisResult>, hex: HexConfig) -> Self {
        Self {
            running: true,
            tab: Tab::Disassembly,
            selected_function: 0,
            scroll: 0,
            page: DEFAULT_PAGE,
            line_count: 0,
            binary,
            analysis,
            hex,
        }
    }

    /// Signals the event loop to stop.
    pub const fn quit(&mut self) {
        self.running = false;
    }

    /// The selected function, if the analysis found any.
    #[must_use]
    pub fn current_function(&self) -> Option<&Function> {
        self.analysis.functions.values().nth(self.selected_function)
    }

    /// Applies one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit(),
            KeyCode::Tab => self.select_tab(self.tab.next()),
            KeyCode::BackTab => self.select_tab(self.tab.previous()),
            KeyCode::Down => self.scroll_by(1),
            KeyCode::Up => self.scroll_back(1),
            KeyCode::PageDown => self.scroll_by(self.page.max(1)),
            KeyCode::PageUp => self.scroll_back(self.page.max(1)),
            KeyCode::Char('n') => self.next_function(),
            KeyCode::Char('p') => self.previous_function(),
            _ => {}
        }
    }

    fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.scroll = 0;
    }

    fn scroll_by(&mut self, lines: usize) {
        let last = self.line_count.saturating_sub(1);
        self.scroll = self.scroll.saturating_add(lines).min(last);
    }

    const fn scroll_back(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    fn next_function(&mut self) {
        if self.selected_function + 1 < self.analysis.functions.len() {
            self.selected_function += 1;
            self.scroll = 0;
        }
    }

    const fn previous_function(&mut self) {
        if self.selected_function > 0 {
            self.selected_function -= 1;
            self.scroll = 0;
        }
    }
}
