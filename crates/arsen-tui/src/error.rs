//! Failures that end a TUI session.

use arsen_common::error::ArsenError;
use thiserror::Error;

/// Why the viewer stopped early.
#[derive(Debug, Error)]
pub enum TuiError {
    /// Terminal setup, drawing, or input failed.
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    /// The binary could not be analysed.
    #[error(transparent)]
    Analysis(#[from] ArsenError),

    /// `run` was called before a binary was loaded.
    #[error("no binary loaded")]
    NoBinary,
}
