//! # arsen-sdk
//!
//! Public SDK for using Arsen as a Rust library.
//!
//! Provides three main entry points:
//! - [`BinaryService`](service::BinaryService): loads a binary, runs the
//!   analysis pipeline, and serves cached disassembly.
//! - [`PluginManager`](plugin::PluginManager): hosts in-process
//!   [`Plugin`](plugin::Plugin)s that are handed the service and event bus.
//! - [`render`]: the plain-text views shared by the CLI and the TUI.
//!
//! # Example
//!
//! ```rust,no_run
//! use arsen_common::config::ArsenConfig;
//! use arsen_sdk::service::BinaryService;
//!
//! let service = BinaryService::new(ArsenConfig::default());
//! let binary = service.load_binary("/bin/ls".as_ref()).expect("load");
//! let analysis = service.analyze().expect("analyze");
//! println!("{} functions in {}", analysis.functions.len(), binary.path.display());
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod plugin;
pub mod render;
pub mod service;

pub use plugin::{Plugin, PluginContext, PluginInfo, PluginManager, PseudocodePlugin};
pub use service::BinaryService;
