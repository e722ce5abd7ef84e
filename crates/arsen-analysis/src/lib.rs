//! # arsen-analysis
//!
//! The analysis pipeline: an [`AnalysisEngine`] runs a sequence of
//! [`AnalysisPass`]es over a loaded binary, producing functions, basic
//! blocks, cross references, strings, and pseudocode.
//!
//! Also home to the pieces the pipeline shares with the front ends: the
//! [`EventBus`], the bounded [`CacheManager`], per-function
//! [`ControlFlowGraph`]s, and byte [`search`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cache;
pub mod cfg;
pub mod context;
pub mod engine;
pub mod events;
pub mod pass;
pub mod passes;
pub mod pseudocode;
pub mod search;

pub use cache::{BoundedCache, CacheManager};
pub use cfg::ControlFlowGraph;
pub use context::{AnalysisContext, AnalysisResult, ExtractedString};
pub use engine::AnalysisEngine;
pub use events::{ArsenEvent, EventBus, EventKind, EventReceiver};
pub use pass::AnalysisPass;
