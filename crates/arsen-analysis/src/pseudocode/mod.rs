//! Pseudocode generation and presentation.

pub mod generator;
pub mod highlight;
pub mod service;

pub use generator::{NameResolver, NoNames, PseudocodeGenerator};
pub use highlight::{Token, TokenKind, tokenize};
pub use service::PseudocodeService;
