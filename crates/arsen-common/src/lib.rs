//! # arsen-common
//!
//! Shared domain types, error definitions, configuration models, and
//! constants used across the entire Arsen workspace.
//!
//! This crate is the leaf of the dependency graph; it depends on no other
//! internal crate and provides the binary, disassembly, and annotation
//! models that every other crate builds upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod annotation;
pub mod binary;
pub mod config;
pub mod constants;
pub mod disassembly;
pub mod error;
pub mod types;
