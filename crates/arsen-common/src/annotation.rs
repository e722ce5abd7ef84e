//! User and loader supplied names, comments, and bookmarks.

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    /// Code entry point.
    Function,
    /// Data object.
    Data,
    /// Imported symbol slot.
    Import,
    /// Exported symbol.
    Export,
    /// User label.
    Label,
}

/// A named address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Named address.
    pub address: Address,
    /// Name.
    pub name: String,
    /// Symbol kind.
    pub kind: SymbolType,
}

impl Symbol {
    /// Creates a symbol.
    pub fn new(address: Address, name: impl Into<String>, kind: SymbolType) -> Self {
        Self {
            address,
            name: name.into(),
            kind,
        }
    }
}

/// Free text attached to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Annotated address.
    pub address: Address,
    /// Comment body.
    pub text: String,
}

/// A saved location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Bookmarked address.
    pub address: Address,
    /// Short description.
    pub description: String,
}
