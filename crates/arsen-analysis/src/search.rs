//! Byte, text, and wildcard pattern search over raw file contents.

use arsen_common::binary::BinaryFile;
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Address;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::multispace0,
    combinator::{all_consuming, map_res, value},
    multi::many1,
    sequence::{preceded, terminated},
};
use serde::Serialize;

/// A match in a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// Offset of the first matching byte.
    pub offset: usize,
    /// Length of the match.
    pub length: usize,
}

/// A match in a binary's file contents, with the virtual address it maps
/// to when a section covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinaryMatch {
    /// Position in the file.
    #[serde(flatten)]
    pub matched: SearchMatch,
    /// Mapped address, if any.
    pub address: Option<Address>,
}

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Exact bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Bytes with `None` wildcards, as produced by [`parse_pattern`].
    Pattern(Vec<Option<u8>>),
}

/// Every (possibly overlapping) occurrence of `pattern` in `data`.
#[must_use]
pub fn search_bytes(data: &[u8], pattern: &[u8]) -> Vec<SearchMatch> {
    if pattern.is_empty() || pattern.len() > data.len() {
        return Vec::new();
    }
    data.windows(pattern.len())
        .enumerate()
        .filter(|(_, window)| *window == pattern)
        .map(|(offset, _)| SearchMatch {
            offset,
            length: pattern.len(),
        })
        .collect()
}

/// Every occurrence of `text`'s UTF-8 encoding in `data`.
#[must_use]
pub fn search_text(data: &[u8], text: &str) -> Vec<SearchMatch> {
    search_bytes(data, text.as_bytes())
}

/// Every occurrence of a wildcard pattern in `data`.
#[must_use]
pub fn search_pattern(data: &[u8], pattern: &[Option<u8>]) -> Vec<SearchMatch> {
    if pattern.is_empty() || pattern.len() > data.len() {
        return Vec::new();
    }
    data.windows(pattern.len())
        .enumerate()
        .filter(|(_, window)| {
            window
                .iter()
                .zip(pattern)
                .all(|(byte, want)| want.is_none_or(|w| w == *byte))
        })
        .map(|(offset, _)| SearchMatch {
            offset,
            length: pattern.len(),
        })
        .collect()
}

fn wildcard(input: &str) -> IResult<&str, Option<u8>> {
    value(None, alt((tag("??"), tag("?")))).parse(input)
}

fn hex_byte(input: &str) -> IResult<&str, Option<u8>> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u8::from_str_radix(digits, 16).map(Some),
    )
    .parse(input)
}

fn pattern(input: &str) -> IResult<&str, Vec<Option<u8>>> {
    all_consuming(terminated(
        many1(preceded(multispace0, alt((wildcard, hex_byte)))),
        multispace0,
    ))
    .parse(input)
}

/// Parses a hex byte pattern such as `"48 8B ?? 05"`.
///
/// Bytes are two hex digits; `??` (or `?`) matches any byte. Whitespace
/// between bytes is optional.
///
/// # Errors
///
/// Returns `ArsenError::Config` if the pattern is empty or contains
/// anything else.
pub fn parse_pattern(input: &str) -> Result<Vec<Option<u8>>> {
    pattern(input)
        .map(|(_, bytes)| bytes)
        .map_err(|_| ArsenError::Config {
            message: format!("invalid byte pattern: {input:?}"),
        })
}

/// Runs queries against a binary's file contents.
#[derive(Debug, Clone, Copy)]
pub struct SearchService {
    limit: usize,
}

impl Default for SearchService {
    fn default() -> Self {
        Self { limit: usize::MAX }
    }
}

impl SearchService {
    /// A service returning every match.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of matches returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Searches the whole file and maps each hit to a virtual address.
    #[must_use]
    pub fn search_binary(&self, binary: &BinaryFile, query: &SearchQuery) -> Vec<BinaryMatch> {
        let data = binary.raw_data.as_slice();
        let hits = match query {
            SearchQuery::Bytes(bytes) => search_bytes(data, bytes),
            SearchQuery::Text(text) => search_text(data, text),
            SearchQuery::Pattern(pattern) => search_pattern(data, pattern),
        };
        tracing::debug!(hits = hits.len(), "search complete");
        hits.into_iter()
            .take(self.limit)
            .map(|matched| BinaryMatch {
                matched,
                address: binary.file_offset_to_address(matched.offset as u64),
            })
            .collect()
    }
}
