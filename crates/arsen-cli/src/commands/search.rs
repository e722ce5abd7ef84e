//! `arsen search`: byte, pattern, and text search over the raw file.

use std::path::PathBuf;

use arsen_analysis::search::{SearchQuery, SearchService, parse_pattern};
use clap::{ArgGroup, Args};

use super::Context;
use crate::output::{print_json, table};

/// Arguments for the `search` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("query").required(true).args(["hex", "text"])))]
pub struct SearchArgs {
    /// Path to the binary.
    pub file: PathBuf,

    /// Hex bytes with `??` wildcards, e.g. "48 8B ?? 05".
    #[arg(long)]
    pub hex: Option<String>,

    /// Literal text.
    #[arg(long)]
    pub text: Option<String>,

    /// Stop after this many matches.
    #[arg(long)]
    pub limit: Option<usize>,
}

fn query(args: &SearchArgs) -> anyhow::Result<SearchQuery> {
    if let Some(text) = &args.text {
        return Ok(SearchQuery::Text(text.clone()));
    }
    let pattern = parse_pattern(args.hex.as_deref().unwrap_or_default())?;
    if pattern.iter().all(Option::is_some) {
        return Ok(SearchQuery::Bytes(pattern.into_iter().flatten().collect()));
    }
    Ok(SearchQuery::Pattern(pattern))
}

/// Executes the `search` command.
///
/// # Errors
///
/// Returns an error if the binary cannot be loaded or the pattern is
/// malformed.
pub fn execute(args: &SearchArgs, ctx: &Context) -> anyhow::Result<()> {
    let query = query(args)?;
    let (_service, binary) = ctx.open(&args.file)?;
    let service = args
        .limit
        .map_or_else(SearchService::new, |n| SearchService::new().with_limit(n));
    let matches = service.search_binary(&binary, &query);
    if ctx.json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    let rows: Vec<[String; 3]> = matches
        .iter()
        .map(|m| {
            [
                format!("{:#010X}", m.matched.offset),
                m.matched.length.to_string(),
                m.address.map_or_else(|| "-".to_string(), |a| a.to_string()),
            ]
        })
        .collect();
    println!("{}", table(&["OFFSET", "LENGTH", "ADDRESS"], &rows));
    println!("\n{} matches", matches.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(hex: Option<&str>, text: Option<&str>) -> SearchArgs {
        SearchArgs {
            file: PathBuf::from("x"),
            hex: hex.map(str::to_string),
            text: text.map(str::to_string),
            limit: None,
        }
    }

    #[test]
    fn exact_hex_becomes_byte_query() {
        assert_eq!(
            query(&args(Some("DE AD"), None)).expect("query"),
            SearchQuery::Bytes(vec![0xDE, 0xAD])
        );
        assert_eq!(
            query(&args(Some("DE ?? AD"), None)).expect("query"),
            SearchQuery::Pattern(vec![Some(0xDE), None, Some(0xAD)])
        );
        assert_eq!(
            query(&args(None, Some("GCC"))).expect("query"),
            SearchQuery::Text("GCC".into())
        );
        assert!(query(&args(Some("ZZ"), None)).is_err());
    }
}
